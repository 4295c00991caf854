use crate::infrastructure::bluetooth::transport::TransportError;
use std::fmt;
use thiserror::Error;

/// Why a handshake attempt ended without authentication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthFailureKind {
    #[error("device rejected the key")]
    KeyRejected,
    #[error("device refused to issue a random number")]
    RandomRequestRejected,
    #[error("device rejected the encrypted random number")]
    EncryptionKeyRejected,
    #[error("unrecognized auth response")]
    UnrecognizedResponse,
    #[error("no terminal auth response before the deadline")]
    Timeout,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authentication failed: {0}")]
    Rejected(#[from] AuthFailureKind),
    #[error("transport failure during authentication: {0}")]
    Transport(#[from] TransportError),
}

impl AuthError {
    /// The device-level failure, if this was not a transport error
    pub fn kind(&self) -> Option<AuthFailureKind> {
        match self {
            Self::Rejected(kind) => Some(*kind),
            Self::Transport(_) => None,
        }
    }
}

/// Stage of the streaming loop a transport failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    Arming,
    Polling,
    Keepalive,
    Teardown,
}

impl fmt::Display for StreamPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Arming => "arming",
            Self::Polling => "polling",
            Self::Keepalive => "keepalive",
            Self::Teardown => "teardown",
        })
    }
}

/// Fatal transport failure that ended a streaming run
#[derive(Debug, Error)]
#[error("streaming aborted during {phase}: {source}")]
pub struct StreamingFault {
    pub phase: StreamPhase,
    #[source]
    pub source: TransportError,
}

impl StreamingFault {
    pub fn new(phase: StreamPhase, source: TransportError) -> Self {
        Self { phase, source }
    }
}

/// Errors surfaced by [`crate::domain::session::Session`]
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Streaming(#[from] StreamingFault),
    #[error(transparent)]
    Transport(#[from] TransportError),
}
