//! GATT Transport Seam
//!
//! The session core talks to the band only through [`Transport`]. The BLE
//! backend lives in `btle` (behind the `ble` feature); tests drive the core
//! with the scripted transport in `sim`.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Characteristics the session core reads from or writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacteristicId {
    /// Challenge/response channel (write + notify)
    Auth,
    /// Sensor arming and stop commands (write)
    SensorControl,
    /// Raw accelerometer records (notify)
    SensorMeasure,
}

/// Client characteristic configuration descriptors used by the core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorId {
    /// Notification descriptor of [`CharacteristicId::Auth`]
    AuthNotify,
    /// Notification descriptor of [`CharacteristicId::SensorMeasure`]
    SensorMeasureNotify,
}

impl DescriptorId {
    /// The characteristic this descriptor belongs to
    pub fn characteristic(&self) -> CharacteristicId {
        match self {
            Self::AuthNotify => CharacteristicId::Auth,
            Self::SensorMeasureNotify => CharacteristicId::SensorMeasure,
        }
    }
}

/// One value pushed by the band
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Source characteristic, `None` if the backend could not map it
    pub characteristic: Option<CharacteristicId>,
    pub value: Vec<u8>,
}

impl Notification {
    pub fn new(characteristic: CharacteristicId, value: impl Into<Vec<u8>>) -> Self {
        Self {
            characteristic: Some(characteristic),
            value: value.into(),
        }
    }
}

/// Failure reported by the transport collaborator
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("device disconnected")]
    Disconnected,
    #[error("{0:?} is not available on this device")]
    MissingCharacteristic(CharacteristicId),
    #[error("unsupported descriptor value {value:02X?} for {descriptor:?}")]
    UnsupportedDescriptorValue {
        descriptor: DescriptorId,
        value: Vec<u8>,
    },
    #[error("transport backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Capability the core needs from a connected band.
///
/// `wait_for_notifications` must always return within `timeout`; it hands
/// back every notification delivered during the wait, in arrival order.
pub trait Transport: Send {
    fn write(
        &mut self,
        characteristic: CharacteristicId,
        bytes: &[u8],
        require_ack: bool,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn write_descriptor(
        &mut self,
        descriptor: DescriptorId,
        bytes: &[u8],
        require_ack: bool,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn wait_for_notifications(
        &mut self,
        timeout: Duration,
    ) -> impl Future<Output = Result<Vec<Notification>, TransportError>> + Send;

    fn read(
        &mut self,
        characteristic: CharacteristicId,
    ) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;
}
