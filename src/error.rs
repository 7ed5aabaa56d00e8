//! Crate-wide error taxonomy.
//!
//! These are kinds, not exceptions: frame-decode and receive-path errors
//! abort processing of the *current* packet and are handed back to the
//! host, which decides whether the connection itself should be torn down.
//! `FreeConnection` is the one variant the host must act on unconditionally
//! — it is a positive, terminal signal, not a failure.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid packet header: {0}")]
    InvalidPacketHeader(&'static str),

    #[error("invalid frame data: {0}")]
    InvalidFrameData(&'static str),

    #[error("invalid stream data: {0}")]
    InvalidStreamData(&'static str),

    #[error("decryption failure")]
    DecryptionFailure,

    /// Not fatal: the caller should simply stop processing this packet.
    #[error("packet ignored")]
    PacketIgnored,

    #[error("version negotiation mismatch")]
    VersionNegotiationMismatch,

    #[error("flow control error")]
    FlowControlError,

    #[error("handshake too large to fit in a single CLIENT_INITIAL")]
    HandshakeTooLarge,

    #[error("stream is closed for writing (fin already sent)")]
    FinClosed,

    #[error("too many open streams")]
    TooManyOpenStreams,

    /// Terminal, positive signal: the connection's work is done and its
    /// resources should be released by the host.
    #[error("connection may be freed")]
    FreeConnection,

    #[error("allocation failed")]
    NoMemory,

    /// Stands in for the handful of sites the draft left unspecified
    /// (`spec.md` §9, Open Questions). Reject and return; do not guess.
    #[error("unspecified by the draft")]
    Unspecified,
}
