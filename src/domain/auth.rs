//! Authentication State Machine
//!
//! Challenge/response handshake proving the client holds the shared key:
//!
//! ```text
//! client                         band
//!   | -- 01 00 || key ----------> |   (send key, first binding only)
//!   | <--------------- 10 01 01 --|
//!   | -- 02 00 -----------------> |   (request random)
//!   | <------ 10 02 01 || r[16] --|
//!   | -- 03 00 || E(key, r) ----> |   (send encrypted random)
//!   | <--------------- 10 03 01 --|   authenticated
//! ```
//!
//! Any `xx xx 04` status, or an unrecognized response, ends the attempt.
//! Retrying is up to the caller.

use crate::domain::models::{AuthEvent, AuthKey, AuthState};
use crate::error::{AuthError, AuthFailureKind};
use crate::infrastructure::bluetooth::cipher::CipherOracle;
use crate::infrastructure::bluetooth::protocol::{
    self, encode_request_random, encode_send_encrypted_random, encode_send_key, Command,
};
use crate::infrastructure::bluetooth::transport::{CharacteristicId, Transport};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, trace};

/// Per-poll wait used by [`authenticate`] and [`reauthenticate`]
pub const DEFAULT_AUTH_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What the client must do after an auth event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStep {
    RequestRandom,
    SendEncrypted([u8; 16]),
    Done,
    Failed(AuthFailureKind),
}

impl AuthState {
    /// Apply one decoded event.
    ///
    /// Intermediate events leave the state untouched and ask for the next
    /// frame; terminal events move to `AuthOk` or a failure state.
    pub fn on_event(self, event: &AuthEvent) -> (AuthState, AuthStep) {
        match event {
            AuthEvent::SendKeyAck => (self, AuthStep::RequestRandom),
            AuthEvent::RandomNumberReceived(random) => (self, AuthStep::SendEncrypted(*random)),
            AuthEvent::AuthSuccess => (AuthState::AuthOk, AuthStep::Done),
            AuthEvent::SendKeyFail => (
                AuthState::KeySendingFailed,
                AuthStep::Failed(AuthFailureKind::KeyRejected),
            ),
            AuthEvent::RequestRandomError => (
                AuthState::RequestRandomError,
                AuthStep::Failed(AuthFailureKind::RandomRequestRejected),
            ),
            AuthEvent::EncryptionKeyFailed => (
                AuthState::EncryptionKeyFailed,
                AuthStep::Failed(AuthFailureKind::EncryptionKeyRejected),
            ),
            AuthEvent::Unknown(_) => (
                AuthState::AuthFailed,
                AuthStep::Failed(AuthFailureKind::UnrecognizedResponse),
            ),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AuthState::Idle)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::AuthOk)
    }
}

/// First frame of a handshake
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HandshakeStart {
    /// Hand the key to the band first (initial binding)
    #[default]
    SendKey,
    /// The band already holds the key; go straight to the challenge
    RequestRandom,
}

/// One handshake attempt
pub struct Handshake<'a, C> {
    cipher: &'a C,
    key: &'a AuthKey,
    start: HandshakeStart,
    timeout: Duration,
    poll_interval: Duration,
    outcome: Option<AuthState>,
}

impl<'a, C: CipherOracle> Handshake<'a, C> {
    pub fn new(cipher: &'a C, key: &'a AuthKey, timeout: Duration) -> Self {
        Self {
            cipher,
            key,
            start: HandshakeStart::default(),
            timeout,
            poll_interval: DEFAULT_AUTH_POLL_INTERVAL,
            outcome: None,
        }
    }

    pub fn start(mut self, start: HandshakeStart) -> Self {
        self.start = start;
        self
    }

    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Terminal state of the last run, `None` if no terminal event arrived
    pub fn outcome(&self) -> Option<AuthState> {
        self.outcome
    }

    /// Drive the handshake until a terminal event or the deadline
    pub async fn run<T: Transport>(&mut self, transport: &mut T) -> Result<(), AuthError> {
        let deadline = Instant::now() + self.timeout;
        let mut state = AuthState::Idle;
        self.outcome = None;

        match self.start {
            HandshakeStart::SendKey => {
                info!("Sending key...");
                send(transport, encode_send_key(self.key)).await?;
            }
            HandshakeStart::RequestRandom => {
                info!("Requesting random number...");
                send(transport, encode_request_random()).await?;
            }
        }

        loop {
            let now = Instant::now();
            if now >= deadline {
                error!("Authentication timed out after {:?}", self.timeout);
                return Err(AuthFailureKind::Timeout.into());
            }

            let wait = self.poll_interval.min(deadline - now);
            for notification in transport.wait_for_notifications(wait).await? {
                if notification.characteristic != Some(CharacteristicId::Auth) {
                    debug!(
                        "Ignoring {:?} notification during handshake",
                        notification.characteristic
                    );
                    continue;
                }

                let event = protocol::decode_auth(&notification.value);
                trace!("Auth notification {:02X?} -> {:?}", notification.value, event);

                let (next, step) = state.on_event(&event);
                state = next;

                match step {
                    AuthStep::RequestRandom => {
                        info!("Requesting random number...");
                        send(transport, encode_request_random()).await?;
                    }
                    AuthStep::SendEncrypted(random) => {
                        info!("Sending encrypted random number");
                        let ciphertext = self.cipher.encrypt_block(self.key.as_bytes(), &random);
                        send(transport, encode_send_encrypted_random(&ciphertext)).await?;
                    }
                    AuthStep::Done => {
                        self.outcome = Some(state);
                        info!("Authenticated");
                        return Ok(());
                    }
                    AuthStep::Failed(kind) => {
                        self.outcome = Some(state);
                        error!("Authentication failed in state {:?}: {}", state, kind);
                        return Err(kind.into());
                    }
                }
            }
        }
    }
}

async fn send<T: Transport>(transport: &mut T, command: Command) -> Result<(), AuthError> {
    trace!("Auth frame {:02X?}", command.as_bytes());
    transport
        .write(CharacteristicId::Auth, command.as_bytes(), false)
        .await?;
    Ok(())
}

/// Full handshake starting from send-key
pub async fn authenticate<T: Transport, C: CipherOracle>(
    transport: &mut T,
    cipher: &C,
    key: &AuthKey,
    timeout: Duration,
) -> Result<(), AuthError> {
    Handshake::new(cipher, key, timeout).run(transport).await
}

/// Handshake for a band that already holds the key
pub async fn reauthenticate<T: Transport, C: CipherOracle>(
    transport: &mut T,
    cipher: &C,
    key: &AuthKey,
    timeout: Duration,
) -> Result<(), AuthError> {
    Handshake::new(cipher, key, timeout)
        .start(HandshakeStart::RequestRandom)
        .run(transport)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::bluetooth::cipher::Aes128Ecb;
    use crate::infrastructure::bluetooth::sim::{SimTransport, SimWrite};

    const TIMEOUT: Duration = Duration::from_secs(5);

    /// XOR "cipher" so expected frames are easy to compute by hand
    struct XorCipher;

    impl CipherOracle for XorCipher {
        fn encrypt_block(&self, key: &[u8; 16], plaintext: &[u8; 16]) -> [u8; 16] {
            core::array::from_fn(|i| key[i] ^ plaintext[i])
        }
    }

    fn random_packet(random: &[u8; 16]) -> Vec<u8> {
        let mut packet = vec![0x10, 0x02, 0x01];
        packet.extend_from_slice(random);
        packet
    }

    fn auth_write(bytes: &[u8]) -> SimWrite {
        SimWrite::Characteristic {
            id: CharacteristicId::Auth,
            bytes: bytes.to_vec(),
            require_ack: false,
        }
    }

    #[test]
    fn test_transitions() {
        let idle = AuthState::Idle;
        assert_eq!(
            idle.on_event(&AuthEvent::SendKeyAck),
            (AuthState::Idle, AuthStep::RequestRandom)
        );
        assert_eq!(
            idle.on_event(&AuthEvent::RandomNumberReceived([7; 16])),
            (AuthState::Idle, AuthStep::SendEncrypted([7; 16]))
        );
        assert_eq!(
            idle.on_event(&AuthEvent::AuthSuccess),
            (AuthState::AuthOk, AuthStep::Done)
        );
        assert_eq!(
            idle.on_event(&AuthEvent::SendKeyFail),
            (
                AuthState::KeySendingFailed,
                AuthStep::Failed(AuthFailureKind::KeyRejected)
            )
        );
        assert_eq!(
            idle.on_event(&AuthEvent::RequestRandomError),
            (
                AuthState::RequestRandomError,
                AuthStep::Failed(AuthFailureKind::RandomRequestRejected)
            )
        );
        assert_eq!(
            idle.on_event(&AuthEvent::EncryptionKeyFailed),
            (
                AuthState::EncryptionKeyFailed,
                AuthStep::Failed(AuthFailureKind::EncryptionKeyRejected)
            )
        );
        assert_eq!(
            idle.on_event(&AuthEvent::Unknown(vec![1, 2, 3])),
            (
                AuthState::AuthFailed,
                AuthStep::Failed(AuthFailureKind::UnrecognizedResponse)
            )
        );
    }

    #[test]
    fn test_terminal_states() {
        assert!(!AuthState::Idle.is_terminal());
        assert!(AuthState::AuthOk.is_terminal());
        assert!(AuthState::AuthOk.is_authenticated());
        assert!(AuthState::EncryptionKeyFailed.is_terminal());
        assert!(!AuthState::AuthFailed.is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_handshake_succeeds() {
        let key = AuthKey::default();
        let mut transport = SimTransport::new()
            .then(CharacteristicId::Auth, [0x10, 0x01, 0x01])
            .then(CharacteristicId::Auth, random_packet(&[0; 16]))
            .then(CharacteristicId::Auth, [0x10, 0x03, 0x01]);

        authenticate(&mut transport, &Aes128Ecb, &key, TIMEOUT)
            .await
            .unwrap();

        let mut encrypted = vec![0x03, 0x00];
        encrypted.extend_from_slice(&Aes128Ecb.encrypt_block(key.as_bytes(), &[0; 16]));
        assert_eq!(
            transport.writes(),
            &[
                auth_write(protocol::encode_send_key(&key).as_bytes()),
                auth_write(&[0x02, 0x00]),
                auth_write(&encrypted),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_encrypted_frame_for_any_random() {
        let key = AuthKey::new([0x5C; 16]);
        for seed in [0u8, 1, 0x7F, 0xFF] {
            let random: [u8; 16] = core::array::from_fn(|i| seed.wrapping_mul(31).wrapping_add(i as u8));
            let mut transport = SimTransport::new()
                .then(CharacteristicId::Auth, random_packet(&random))
                .then(CharacteristicId::Auth, [0x10, 0x03, 0x01]);

            reauthenticate(&mut transport, &XorCipher, &key, TIMEOUT)
                .await
                .unwrap();

            let mut expected = vec![0x03, 0x00];
            expected.extend(random.iter().map(|b| b ^ 0x5C));
            assert_eq!(transport.writes()[1], auth_write(&expected));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_key_rejected() {
        let key = AuthKey::default();
        let mut transport = SimTransport::new().then(CharacteristicId::Auth, [0x10, 0x01, 0x04]);

        let err = authenticate(&mut transport, &Aes128Ecb, &key, TIMEOUT)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), Some(AuthFailureKind::KeyRejected));
        // only the send-key frame went out
        assert_eq!(transport.writes().len(), 1);
        assert!(!transport.writes().contains(&auth_write(&[0x02, 0x00])));
    }

    #[tokio::test(start_paused = true)]
    async fn test_encryption_key_failure_is_terminal() {
        let key = AuthKey::default();
        let mut handshake = Handshake::new(&Aes128Ecb, &key, TIMEOUT);
        let mut transport = SimTransport::new()
            .then(CharacteristicId::Auth, [0x10, 0x01, 0x01])
            .then(CharacteristicId::Auth, random_packet(&[9; 16]))
            .then(CharacteristicId::Auth, [0x10, 0x03, 0x04]);

        let err = handshake.run(&mut transport).await.unwrap_err();

        assert_eq!(err.kind(), Some(AuthFailureKind::EncryptionKeyRejected));
        assert_eq!(handshake.outcome(), Some(AuthState::EncryptionKeyFailed));
        // no automatic key resend
        assert_eq!(transport.writes().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_response_fails() {
        let key = AuthKey::default();
        let mut handshake = Handshake::new(&Aes128Ecb, &key, TIMEOUT);
        let mut transport = SimTransport::new().then(CharacteristicId::Auth, [0x10, 0x09, 0x09]);

        let err = handshake.run(&mut transport).await.unwrap_err();
        assert_eq!(err.kind(), Some(AuthFailureKind::UnrecognizedResponse));
        assert_eq!(handshake.outcome(), Some(AuthState::AuthFailed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_after_empty_polls() {
        let key = AuthKey::default();
        let mut transport = SimTransport::new();
        let started = Instant::now();

        let mut handshake = Handshake::new(&Aes128Ecb, &key, Duration::from_secs(1));
        let err = handshake.run(&mut transport).await.unwrap_err();

        assert_eq!(err.kind(), Some(AuthFailureKind::Timeout));
        assert!(started.elapsed() >= Duration::from_secs(1));
        assert!(started.elapsed() < Duration::from_millis(1100));
        assert!((10..=11).contains(&transport.polls()));
        assert_eq!(handshake.outcome(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ignores_other_characteristics() {
        let key = AuthKey::default();
        let mut transport = SimTransport::new()
            .then(CharacteristicId::SensorMeasure, [0x10, 0x01, 0x04])
            .then(CharacteristicId::Auth, [0x10, 0x01, 0x01])
            .then(CharacteristicId::Auth, random_packet(&[1; 16]))
            .then(CharacteristicId::Auth, [0x10, 0x03, 0x01]);

        authenticate(&mut transport, &Aes128Ecb, &key, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(transport.writes().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_aborts() {
        let key = AuthKey::default();
        let mut transport = SimTransport::new().fail_write(0);

        let err = authenticate(&mut transport, &Aes128Ecb, &key, TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Transport(_)));
        assert_eq!(err.kind(), None);
    }
}
