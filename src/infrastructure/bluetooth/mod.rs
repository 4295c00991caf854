//! Bluetooth Module
//!
//! Provides BLE communication with the Mi Band 2.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  domain::session::Session                │
//! │        (handshake + realtime streaming over a link)      │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼─────────────┐
//!         │             │             │
//!         ▼             ▼             ▼
//! ┌───────────┐  ┌────────────┐  ┌──────────┐
//! │ Transport │  │  Protocol  │  │  Cipher  │
//! │           │  │            │  │          │
//! │ - GATT    │  │ - UUIDs    │  │ - AES    │
//! │   writes  │  │ - Commands │  │   block  │
//! │ - notify  │  │ - Parsing  │  │          │
//! └───────────┘  └────────────┘  └──────────┘
//! ```
//!
//! ## Modules
//!
//! - [`transport`] - The GATT capability the session consumes
//! - [`protocol`] - Frame layouts, commands, and notification decoding
//! - [`cipher`] - Block cipher oracle for the auth challenge
//! - `btle` - btleplug backed transport (`ble` feature)

pub mod cipher;
pub mod protocol;
pub mod transport;

#[cfg(feature = "ble")]
pub mod btle;

#[cfg(test)]
pub(crate) mod sim;

// Re-export for convenience
pub use cipher::{Aes128Ecb, CipherOracle};
pub use transport::{CharacteristicId, DescriptorId, Notification, Transport, TransportError};

#[cfg(feature = "ble")]
pub use btle::BtleTransport;
