//! Band Session
//!
//! Owns the transport for one connection together with the handshake state,
//! the sample queue and the streaming stop flag. Streaming lives in
//! [`crate::domain::streaming`].

use crate::domain::auth::{Handshake, HandshakeStart};
use crate::domain::models::{AuthKey, AuthState, CallbackDelivery};
use crate::domain::sample_queue::{SampleQueue, DEFAULT_CAPACITY};
use crate::domain::settings::SessionSettings;
use crate::domain::streaming::{SampleCallback, StopHandle};
use crate::error::{AuthError, SessionError};
use crate::infrastructure::bluetooth::cipher::CipherOracle;
use crate::infrastructure::bluetooth::protocol::{NOTIFY_DISABLE, NOTIFY_ENABLE};
use crate::infrastructure::bluetooth::transport::{DescriptorId, Transport};
use std::time::Duration;
use tracing::{debug, info};

/// Runtime configuration of a [`Session`]
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub key: AuthKey,
    pub queue_capacity: usize,
    pub poll_interval: Duration,
    pub keepalive_interval: Duration,
    pub auth_poll_interval: Duration,
    pub auth_timeout: Duration,
    pub settle: Duration,
    pub callback_delivery: CallbackDelivery,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            key: AuthKey::default(),
            queue_capacity: DEFAULT_CAPACITY,
            poll_interval: Duration::from_millis(500),
            keepalive_interval: Duration::from_secs(60),
            auth_poll_interval: Duration::from_millis(100),
            auth_timeout: Duration::from_secs(10),
            settle: Duration::from_millis(100),
            callback_delivery: CallbackDelivery::Latest,
        }
    }
}

impl From<&SessionSettings> for SessionConfig {
    fn from(s: &SessionSettings) -> Self {
        Self {
            key: s.auth_key,
            queue_capacity: s.queue_capacity,
            poll_interval: Duration::from_millis(s.poll_interval_ms),
            keepalive_interval: Duration::from_secs(s.keepalive_interval_secs),
            auth_poll_interval: Duration::from_millis(s.auth_poll_interval_ms),
            auth_timeout: Duration::from_millis(s.auth_timeout_ms),
            settle: Duration::from_millis(s.settle_ms),
            callback_delivery: s.callback_delivery,
        }
    }
}

/// An authenticated (or authenticating) connection to one band
pub struct Session<T, C> {
    pub(crate) transport: T,
    cipher: C,
    pub(crate) config: SessionConfig,
    state: AuthState,
    pub(crate) queue: SampleQueue,
    pub(crate) callback: Option<SampleCallback>,
    pub(crate) stop: StopHandle,
}

impl<T: Transport, C: CipherOracle> Session<T, C> {
    /// Wrap an already connected transport without touching the device
    pub fn new(transport: T, cipher: C, config: SessionConfig) -> Self {
        Self {
            transport,
            cipher,
            queue: SampleQueue::new(config.queue_capacity),
            config,
            state: AuthState::Idle,
            callback: None,
            stop: StopHandle::new(),
        }
    }

    /// Wrap a connected transport, enable auth notifications and let the band settle
    pub async fn connect(transport: T, cipher: C, config: SessionConfig) -> Result<Self, SessionError> {
        let mut session = Self::new(transport, cipher, config);
        session.set_auth_notifications(true).await?;

        let early = session
            .transport
            .wait_for_notifications(session.config.settle)
            .await?;
        if !early.is_empty() {
            debug!("Discarded {} notification(s) while settling", early.len());
        }

        info!("Connected");
        Ok(session)
    }

    async fn set_auth_notifications(&mut self, enabled: bool) -> Result<(), SessionError> {
        let value = if enabled {
            info!("Enabling Auth Service notifications status...");
            NOTIFY_ENABLE
        } else {
            info!("Disabling Auth Service notifications status...");
            NOTIFY_DISABLE
        };
        self.transport
            .write_descriptor(DescriptorId::AuthNotify, &value, true)
            .await?;
        Ok(())
    }

    async fn handshake(&mut self, start: HandshakeStart) -> Result<(), AuthError> {
        let mut handshake = Handshake::new(&self.cipher, &self.config.key, self.config.auth_timeout)
            .start(start)
            .poll_interval(self.config.auth_poll_interval);
        let result = handshake.run(&mut self.transport).await;
        // timeouts and link errors carry no auth event
        if let Some(state) = handshake.outcome() {
            self.state = state;
        }
        result
    }

    /// Full handshake starting with send-key
    pub async fn authenticate(&mut self) -> Result<(), AuthError> {
        self.handshake(HandshakeStart::SendKey).await
    }

    /// Challenge/response only; the band must already hold the key
    pub async fn reauthenticate(&mut self) -> Result<(), AuthError> {
        self.handshake(HandshakeStart::RequestRandom).await
    }

    /// First-time binding: full handshake, then auth notifications are switched off
    pub async fn initialize(&mut self) -> Result<(), SessionError> {
        self.authenticate().await?;
        self.set_auth_notifications(false).await?;
        info!("Initialized");
        Ok(())
    }

    pub fn auth_state(&self) -> AuthState {
        self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.is_authenticated()
    }

    /// Handle to the shared sample buffer
    pub fn sample_queue(&self) -> SampleQueue {
        self.queue.clone()
    }

    /// Stop flag of the current (or next) streaming run
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn set_callback(&mut self, callback: SampleCallback) {
        self.callback = Some(callback);
    }

    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }
}
