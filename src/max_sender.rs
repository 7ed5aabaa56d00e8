//! Flow-control-limit advertisement controller.
//!
//! New module (the teacher has none). Grounded directly on `spec.md` §4.5
//! and on `quicly.c`'s `quicly_maxsender_t`/`quicly_maxsender_should_send`/
//! `quicly_maxsender_record` callback sites (`original_source/`): a sender
//! tracks the highest limit the peer has acked, the highest it has
//! in-flight, and decides whether advancing the window is worth a new
//! MAX_DATA/MAX_STREAM_DATA frame before committing to sending one.
//!
//! Tokens (`spec.md` §4.5 `record`/`acked`/`lost`) are handed out instead
//! of letting callers match on raw offsets, mirroring the "no pointer
//! offset tricks" Design Note that also governs [`crate::recovery::ack_book`]:
//! whoever holds a token settles exactly one outstanding advertisement.

use crate::primitives::varint::VarInt;

/// Opaque handle to one outstanding (not yet acked or lost) limit
/// advertisement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token(u64);

impl Token {
    /// Tokens ride inside [`crate::recovery::AckEntryKind::MaxData`] /
    /// `MaxStreamData`, which store a `VarInt` rather than this type
    /// directly so the ack book doesn't need to depend on `max_sender`.
    pub fn to_varint(self) -> VarInt {
        VarInt::new_u64(self.0).expect("token counter fits in a VarInt")
    }

    pub fn from_varint(v: VarInt) -> Self {
        Self(v.to_inner())
    }
}

#[derive(Debug)]
struct Inflight {
    token: Token,
    value: u64,
}

#[derive(Debug)]
pub struct MaxSender {
    max_committed: u64,
    max_acked: u64,
    inflight: Vec<Inflight>,
    next_token: u64,
}

impl MaxSender {
    pub fn new(initial: u64) -> Self {
        Self {
            max_committed: initial,
            max_acked: initial,
            inflight: Vec::new(),
            next_token: 0,
        }
    }

    pub fn max_committed(&self) -> u64 {
        self.max_committed
    }

    fn max_inflight(&self) -> u64 {
        self.inflight
            .iter()
            .map(|i| i.value)
            .max()
            .unwrap_or(self.max_acked)
    }

    /// Whether advancing the window to `current_consumed + window` is
    /// worth announcing: the advance over the highest value already
    /// in-flight must clear `min_delta`.
    pub fn should_update(&self, current_consumed: u64, window: u64, min_delta: u64) -> bool {
        let candidate = current_consumed + window;
        let inflight = self.max_inflight();
        candidate >= inflight + min_delta
    }

    /// Issues a token for a new in-flight advertisement of `new_value`.
    pub fn record(&mut self, new_value: u64) -> Token {
        let token = Token(self.next_token);
        self.next_token += 1;
        self.max_committed = self.max_committed.max(new_value);
        self.inflight.push(Inflight {
            token,
            value: new_value,
        });
        token
    }

    /// Settles a token as acknowledged by the peer.
    pub fn acked(&mut self, token: Token) {
        if let Some(pos) = self.inflight.iter().position(|i| i.token == token) {
            let entry = self.inflight.remove(pos);
            self.max_acked = self.max_acked.max(entry.value);
        }
    }

    /// Settles a token as lost; the advertisement must be retried later if
    /// still relevant, so it is simply dropped from in-flight tracking.
    pub fn lost(&mut self, token: Token) {
        self.inflight.retain(|i| i.token != token);
    }
}
