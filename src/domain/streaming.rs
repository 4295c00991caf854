//! Realtime Streaming
//!
//! Arms the raw accelerometer stream, polls notifications until the stop
//! flag is raised and re-arms the band periodically so it keeps sending.
//!
//! ```text
//! arm: 01 01 19, 02 -> sensor control; 01 00 -> measurement descriptor
//! loop:
//!     poll (bounded) -> decode -> queue + callback
//!     every keepalive interval: 01 01 19, 02
//! stop: 00 00 -> measurement descriptor; 03 -> sensor control
//! ```

use crate::domain::models::{CallbackDelivery, Sample};
use crate::domain::session::Session;
use crate::error::{StreamPhase, StreamingFault};
use crate::infrastructure::bluetooth::cipher::CipherOracle;
use crate::infrastructure::bluetooth::protocol::{
    decode_measurement, SensorCommand, ARM_SEQUENCE, NOTIFY_DISABLE, NOTIFY_ENABLE,
};
use crate::infrastructure::bluetooth::transport::{
    CharacteristicId, DescriptorId, Notification, Transport,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

/// Consumer of decoded samples, invoked on the streaming task
pub type SampleCallback = Box<dyn FnMut(Sample) + Send>;

/// Cross-thread stop signal for one streaming run.
///
/// Once raised it stays raised.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl<T: Transport, C: CipherOracle> Session<T, C> {
    /// Stream raw accelerometer samples until [`Session::stop_streaming`]
    /// (or a [`StopHandle`] from [`Session::stop_handle`]) is raised.
    ///
    /// `callback` replaces any callback set before; `None` keeps it. The
    /// callback is cleared when the run ends, whatever the outcome. A
    /// transport failure ends the run with a [`StreamingFault`].
    pub async fn start_streaming(
        &mut self,
        callback: Option<SampleCallback>,
    ) -> Result<(), StreamingFault> {
        if let Some(callback) = callback {
            self.callback = Some(callback);
        }

        let stop = self.stop.clone();
        let result = self.run_stream(&stop).await;

        self.callback = None;
        // the run is over; old handles stay raised, the next run gets a new flag
        stop.stop();
        self.stop = StopHandle::new();

        if let Err(e) = &result {
            warn!("Realtime stream ended: {}", e);
        }
        result
    }

    /// Ask the running stream to finish; observed within one poll interval
    pub fn stop_streaming(&self) {
        self.stop.stop();
    }

    pub fn is_realtime_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    async fn run_stream(&mut self, stop: &StopHandle) -> Result<(), StreamingFault> {
        info!("Enabling accel raw data notification");
        self.arm(StreamPhase::Arming).await?;
        self.transport
            .write_descriptor(DescriptorId::SensorMeasureNotify, &NOTIFY_ENABLE, true)
            .await
            .map_err(|e| StreamingFault::new(StreamPhase::Arming, e))?;
        info!("Start getting sensor data");

        let mut last_arm = Instant::now();
        while !stop.is_stopped() {
            let notifications = self
                .transport
                .wait_for_notifications(self.config.poll_interval)
                .await
                .map_err(|e| StreamingFault::new(StreamPhase::Polling, e))?;

            let mut latest = None;
            for notification in notifications {
                latest = self.dispatch(notification).or(latest);
            }
            if let (Some(sample), Some(callback)) = (latest, self.callback.as_mut()) {
                callback(sample);
            }

            if last_arm.elapsed() >= self.config.keepalive_interval {
                debug!("Re-arming sensor stream");
                self.arm(StreamPhase::Keepalive).await?;
                last_arm = Instant::now();
            }
        }

        info!("Stopping realtime stream");
        self.transport
            .write_descriptor(DescriptorId::SensorMeasureNotify, &NOTIFY_DISABLE, true)
            .await
            .map_err(|e| StreamingFault::new(StreamPhase::Teardown, e))?;
        self.send_sensor_command(SensorCommand::Stop, StreamPhase::Teardown)
            .await
    }

    async fn arm(&mut self, phase: StreamPhase) -> Result<(), StreamingFault> {
        for command in ARM_SEQUENCE {
            self.send_sensor_command(command, phase).await?;
        }
        Ok(())
    }

    async fn send_sensor_command(
        &mut self,
        command: SensorCommand,
        phase: StreamPhase,
    ) -> Result<(), StreamingFault> {
        trace!("Sensor command {:?}", command);
        self.transport
            .write(CharacteristicId::SensorControl, command.as_bytes(), false)
            .await
            .map_err(|e| StreamingFault::new(phase, e))
    }

    /// Queue the samples of one notification; returns the sample still owed
    /// to the callback under `Latest` delivery
    fn dispatch(&mut self, notification: Notification) -> Option<Sample> {
        match notification.characteristic {
            Some(CharacteristicId::SensorMeasure) => {
                let mut latest = None;
                for sample in decode_measurement(&notification.value) {
                    self.queue.enqueue(sample);
                    match self.config.callback_delivery {
                        CallbackDelivery::EveryRecord => {
                            if let Some(callback) = self.callback.as_mut() {
                                callback(sample);
                            }
                        }
                        CallbackDelivery::Latest => latest = Some(sample),
                    }
                }
                latest
            }
            Some(CharacteristicId::Auth) => {
                debug!("Ignoring auth notification while streaming: {:02X?}", notification.value);
                None
            }
            other => {
                warn!(
                    "Unhandled notification from {:?}: {:02X?} len:{}",
                    other,
                    notification.value,
                    notification.value.len()
                );
                None
            }
        }
    }
}
