//! # miband_stream
//!
//! Async client for the Mi Band 2 raw accelerometer stream.
//!
//! A [`Session`](domain::session::Session) authenticates against the band
//! with the AES challenge/response handshake, then streams raw
//! accelerometer samples into a bounded [`SampleQueue`](domain::sample_queue::SampleQueue)
//! and an optional callback, re-arming the sensor every minute until
//! stopped.
//!
//! ```no_run
//! # #[cfg(feature = "ble")]
//! # async fn run() -> anyhow::Result<()> {
//! use miband_stream::prelude::*;
//!
//! let transport = BtleTransport::connect("C8:0F:10:AA:BB:CC").await?;
//! let mut session = Session::connect(transport, Aes128Ecb, SessionConfig::default()).await?;
//! session.initialize().await?;
//!
//! let stop = session.stop_handle();
//! tokio::spawn(async move {
//!     tokio::signal::ctrl_c().await.ok();
//!     stop.stop();
//! });
//! session
//!     .start_streaming(Some(Box::new(|s| println!("{:?}", s))))
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! The transport is abstract ([`Transport`](infrastructure::bluetooth::Transport));
//! the btleplug backend is behind the `ble` feature.

pub mod domain;
pub mod error;
pub mod infrastructure;

/// Convenience re-exports
pub mod prelude {
    pub use crate::domain::auth::{authenticate, reauthenticate, Handshake, HandshakeStart};
    pub use crate::domain::models::{AuthEvent, AuthKey, AuthState, CallbackDelivery, Sample};
    pub use crate::domain::sample_queue::SampleQueue;
    pub use crate::domain::session::{Session, SessionConfig};
    pub use crate::domain::streaming::{SampleCallback, StopHandle};
    pub use crate::error::{AuthError, AuthFailureKind, SessionError, StreamPhase, StreamingFault};
    pub use crate::infrastructure::bluetooth::{
        Aes128Ecb, CharacteristicId, CipherOracle, DescriptorId, Notification, Transport,
        TransportError,
    };

    #[cfg(feature = "ble")]
    pub use crate::infrastructure::bluetooth::BtleTransport;
}
