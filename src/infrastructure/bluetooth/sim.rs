//! Scripted transport for tests.
//!
//! Each queued batch is returned by one `wait_for_notifications` call; once
//! the script runs dry every poll sleeps for its full timeout and returns
//! nothing, unless told to disconnect or to raise a stop handle.

use crate::domain::streaming::StopHandle;
use crate::infrastructure::bluetooth::transport::{
    CharacteristicId, DescriptorId, Notification, Transport, TransportError,
};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

/// A write observed by the simulated band
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimWrite {
    Characteristic {
        id: CharacteristicId,
        bytes: Vec<u8>,
        require_ack: bool,
    },
    Descriptor {
        id: DescriptorId,
        bytes: Vec<u8>,
        require_ack: bool,
    },
}

#[derive(Default)]
pub struct SimTransport {
    script: VecDeque<Vec<Notification>>,
    writes: Vec<SimWrite>,
    polls: usize,
    fail_write: Option<usize>,
    disconnect_when_drained: bool,
    stop_when_drained: Option<StopHandle>,
    stop_at: Option<(Instant, StopHandle)>,
    values: HashMap<CharacteristicId, Vec<u8>>,
}

impl SimTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a poll delivering one notification
    pub fn then(self, characteristic: CharacteristicId, value: impl Into<Vec<u8>>) -> Self {
        self.then_batch(vec![Notification::new(characteristic, value)])
    }

    /// Queue a poll delivering several notifications at once
    pub fn then_batch(mut self, batch: Vec<Notification>) -> Self {
        self.script.push_back(batch);
        self
    }

    /// Queue a poll that delivers nothing (without sleeping)
    pub fn then_nothing(self) -> Self {
        self.then_batch(Vec::new())
    }

    /// Fail the write with this zero-based index
    pub fn fail_write(mut self, index: usize) -> Self {
        self.fail_write = Some(index);
        self
    }

    pub fn disconnect_when_drained(mut self) -> Self {
        self.disconnect_when_drained = true;
        self
    }

    pub fn stop_when_drained(mut self, stop: StopHandle) -> Self {
        self.stop_when_drained = Some(stop);
        self
    }

    /// Raise `stop` on the first poll that ends at or after `after` from now
    pub fn stop_after(mut self, after: Duration, stop: StopHandle) -> Self {
        self.stop_at = Some((Instant::now() + after, stop));
        self
    }

    pub fn with_value(mut self, characteristic: CharacteristicId, value: Vec<u8>) -> Self {
        self.values.insert(characteristic, value);
        self
    }

    pub fn writes(&self) -> &[SimWrite] {
        &self.writes
    }

    pub fn polls(&self) -> usize {
        self.polls
    }

    fn record(&mut self, write: SimWrite) -> Result<(), TransportError> {
        let index = self.writes.len();
        self.writes.push(write);
        if self.fail_write == Some(index) {
            return Err(TransportError::Disconnected);
        }
        Ok(())
    }
}

impl Transport for SimTransport {
    async fn write(
        &mut self,
        characteristic: CharacteristicId,
        bytes: &[u8],
        require_ack: bool,
    ) -> Result<(), TransportError> {
        self.record(SimWrite::Characteristic {
            id: characteristic,
            bytes: bytes.to_vec(),
            require_ack,
        })
    }

    async fn write_descriptor(
        &mut self,
        descriptor: DescriptorId,
        bytes: &[u8],
        require_ack: bool,
    ) -> Result<(), TransportError> {
        self.record(SimWrite::Descriptor {
            id: descriptor,
            bytes: bytes.to_vec(),
            require_ack,
        })
    }

    async fn wait_for_notifications(
        &mut self,
        timeout: Duration,
    ) -> Result<Vec<Notification>, TransportError> {
        self.polls += 1;

        if let Some(batch) = self.script.pop_front() {
            return Ok(batch);
        }
        if self.disconnect_when_drained {
            return Err(TransportError::Disconnected);
        }
        if let Some(stop) = &self.stop_when_drained {
            stop.stop();
        }

        tokio::time::sleep(timeout).await;

        if let Some((at, stop)) = &self.stop_at {
            if Instant::now() >= *at {
                stop.stop();
            }
        }
        Ok(Vec::new())
    }

    async fn read(&mut self, characteristic: CharacteristicId) -> Result<Vec<u8>, TransportError> {
        self.values
            .get(&characteristic)
            .cloned()
            .ok_or(TransportError::MissingCharacteristic(characteristic))
    }
}
