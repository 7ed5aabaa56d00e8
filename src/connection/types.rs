//! Adapted from the teacher's `connection/types.rs`, which defined a
//! `Handshake/Connected/Closing/Closed` state enum that never matched the
//! draft's actual handshake phases. The real state machine —
//! `before_server_hello -> before_server_finished -> one_rtt_encrypted`
//! (`spec.md` §4.11) — lives in [`crate::handshake::HandshakeState`];
//! this module re-exports it under the name connection-level code expects.

pub use crate::handshake::HandshakeState as ConnectionState;
