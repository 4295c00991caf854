//! Mi Band 2 Protocol
//!
//! This module contains the frame layouts for communicating with the band:
//! GATT UUIDs, outgoing command frames and decoders for the auth and
//! sensor measurement notifications.

use crate::domain::models::{AuthEvent, AuthKey, Sample};
use uuid::Uuid;

/// Auth characteristic UUID - challenge/response handshake
pub const AUTH_CHAR_UUID: Uuid = Uuid::from_u128(0x00000009_0000_3512_2118_0009af100700);

/// Sensor control characteristic UUID - where arm/start/stop commands are sent
pub const SENSOR_CONTROL_CHAR_UUID: Uuid =
    Uuid::from_u128(0x00000001_0000_3512_2118_0009af100700);

/// Sensor measurement characteristic UUID - where raw accelerometer data is received
pub const SENSOR_MEASURE_CHAR_UUID: Uuid =
    Uuid::from_u128(0x00000002_0000_3512_2118_0009af100700);

/// Client characteristic configuration descriptor
pub const NOTIFICATION_DESCRIPTOR_UUID: Uuid =
    Uuid::from_u128(0x00002902_0000_1000_8000_00805f9b34fb);

/// Fixed size of every auth frame
pub const AUTH_FRAME_LEN: usize = 18;

/// Descriptor value enabling notifications
pub const NOTIFY_ENABLE: [u8; 2] = [0x01, 0x00];
/// Descriptor value disabling notifications
pub const NOTIFY_DISABLE: [u8; 2] = [0x00, 0x00];

/// Size of the sequence header leading every measurement notification
const MEASUREMENT_HEADER_LEN: usize = 2;
/// One record: x, y, z as little-endian i16
const MEASUREMENT_RECORD_LEN: usize = 6;

const SEND_KEY_OPCODE: [u8; 2] = [0x01, 0x00];
const REQUEST_RANDOM_OPCODE: [u8; 2] = [0x02, 0x00];
const SEND_ENCRYPTED_OPCODE: [u8; 2] = [0x03, 0x00];

/// An outgoing frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command(Vec<u8>);

impl Command {
    /// Build a frame from `opcode` and `payload`, zero-padded to `frame_len`
    fn padded(opcode: &[u8], payload: &[u8], frame_len: usize) -> Self {
        let mut bytes = Vec::with_capacity(frame_len.max(opcode.len() + payload.len()));
        bytes.extend_from_slice(opcode);
        bytes.extend_from_slice(payload);
        if bytes.len() < frame_len {
            bytes.resize(frame_len, 0);
        }
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for Command {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Sensor control commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorCommand {
    /// Enable raw accelerometer mode (configuration byte 0x19)
    EnableRaw,
    /// Start sending measurements
    Start,
    /// Stop sending measurements
    Stop,
}

impl SensorCommand {
    /// Get the raw bytes for this command
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            Self::EnableRaw => &[0x01, 0x01, 0x19],
            Self::Start => &[0x02],
            Self::Stop => &[0x03],
        }
    }
}

/// Commands that (re)arm the raw stream, in order
pub const ARM_SEQUENCE: [SensorCommand; 2] = [SensorCommand::EnableRaw, SensorCommand::Start];

/// `01 00 || key`
pub fn encode_send_key(key: &AuthKey) -> Command {
    Command::padded(&SEND_KEY_OPCODE, key.as_bytes(), AUTH_FRAME_LEN)
}

/// `02 00`
pub fn encode_request_random() -> Command {
    Command::padded(&REQUEST_RANDOM_OPCODE, &[], REQUEST_RANDOM_OPCODE.len())
}

/// `03 00 || ciphertext`
pub fn encode_send_encrypted_random(ciphertext: &[u8; 16]) -> Command {
    Command::padded(&SEND_ENCRYPTED_OPCODE, ciphertext, AUTH_FRAME_LEN)
}

/// Decode a notification from the auth characteristic.
///
/// | Prefix     | Event                 |
/// |------------|-----------------------|
/// | `10 01 01` | SendKeyAck            |
/// | `10 01 04` | SendKeyFail           |
/// | `10 02 01` | RandomNumberReceived  |
/// | `10 02 04` | RequestRandomError    |
/// | `10 03 01` | AuthSuccess           |
/// | `10 03 04` | EncryptionKeyFailed   |
///
/// Anything else, including a random-number response carrying fewer than
/// 16 bytes, decodes to [`AuthEvent::Unknown`].
pub fn decode_auth(bytes: &[u8]) -> AuthEvent {
    let Some(prefix) = bytes.get(..3) else {
        return AuthEvent::Unknown(bytes.to_vec());
    };

    match prefix {
        [0x10, 0x01, 0x01] => AuthEvent::SendKeyAck,
        [0x10, 0x01, 0x04] => AuthEvent::SendKeyFail,
        [0x10, 0x02, 0x01] => match bytes.get(3..19).and_then(|r| <[u8; 16]>::try_from(r).ok()) {
            Some(random) => AuthEvent::RandomNumberReceived(random),
            None => AuthEvent::Unknown(bytes.to_vec()),
        },
        [0x10, 0x02, 0x04] => AuthEvent::RequestRandomError,
        [0x10, 0x03, 0x01] => AuthEvent::AuthSuccess,
        [0x10, 0x03, 0x04] => AuthEvent::EncryptionKeyFailed,
        _ => AuthEvent::Unknown(bytes.to_vec()),
    }
}

/// Decode a measurement notification into samples.
///
/// # Packet Structure
///
/// ```text
/// [0-1]   : Sequence header (ignored)
/// [2-7]   : Record 0 - X, Y, Z (i16 little-endian each)
/// [8-13]  : Record 1
/// ...
/// ```
///
/// A trailing partial record is dropped. Packets shorter than the header
/// yield nothing.
pub fn decode_measurement(bytes: &[u8]) -> impl Iterator<Item = Sample> + '_ {
    bytes
        .get(MEASUREMENT_HEADER_LEN..)
        .unwrap_or(&[])
        .chunks_exact(MEASUREMENT_RECORD_LEN)
        .map(|r| Sample {
            x: i16::from_le_bytes([r[0], r[1]]),
            y: i16::from_le_bytes([r[2], r[3]]),
            z: i16::from_le_bytes([r[4], r[5]]),
        })
}
