use serde::{Deserialize, Serialize};
use std::fmt;

/// Key shared by the Mi Band 2 device family
pub const DEFAULT_AUTH_KEY: [u8; 16] = [
    0xF5, 0xD2, 0x29, 0x87, 0x65, 0x0A, 0x1D, 0x82, 0x05, 0xAB, 0x82, 0xBE, 0xB9, 0x38, 0x59, 0xCF,
];

/// One raw accelerometer reading
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sample {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

impl Sample {
    pub const fn new(x: i16, y: i16, z: i16) -> Self {
        Self { x, y, z }
    }
}

impl From<(i16, i16, i16)> for Sample {
    fn from((x, y, z): (i16, i16, i16)) -> Self {
        Self { x, y, z }
    }
}

impl From<Sample> for (i16, i16, i16) {
    fn from(s: Sample) -> Self {
        (s.x, s.y, s.z)
    }
}

/// 128-bit shared secret used for both send-key and encrypt-random
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthKey([u8; 16]);

impl AuthKey {
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl Default for AuthKey {
    fn default() -> Self {
        Self(DEFAULT_AUTH_KEY)
    }
}

// Never print the secret itself
impl fmt::Debug for AuthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthKey(..)")
    }
}

/// Decoded auth characteristic notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SendKeyAck,
    SendKeyFail,
    RandomNumberReceived([u8; 16]),
    RequestRandomError,
    AuthSuccess,
    EncryptionKeyFailed,
    Unknown(Vec<u8>),
}

/// Handshake state of a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthState {
    #[default]
    Idle,
    KeySendingFailed,
    RequestRandomError,
    AuthOk,
    EncryptionKeyFailed,
    AuthFailed,
}

/// How decoded samples are handed to the streaming callback
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackDelivery {
    /// Only the last sample decoded in each poll cycle
    #[default]
    Latest,
    /// Every decoded sample, in transmission order
    EveryRecord,
}
