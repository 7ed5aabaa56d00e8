//! The record of in-flight send actions, used to settle or retransmit
//! whatever a packet was carrying once it is acked or declared lost.
//!
//! New module (the teacher has none). Grounded on `quicly.c`'s ack
//! callback sites (`original_source/`: `on_ack_stream`, `on_ack_max_data`,
//! `on_ack_stop_sending`, `on_ack_rst_stream`, ...) for *what* needs
//! settling per frame kind, but deliberately NOT on their dispatch
//! mechanism — the C source reaches each callback by pointer arithmetic
//! into a variable-length struct tacked onto the generic ack-entry header.
//! `spec.md`'s Design Note "Polymorphic ack callbacks" calls this out
//! explicitly: this version uses a plain tagged enum instead, resolved by
//! an ordinary `match` in [`crate::connection`].

use crate::primitives::varint::VarInt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckEntryKind {
    /// A range of stream bytes, identified by stream id and offset/len so
    /// the owning `SendBuffer` can mark it acked or lost.
    Stream { stream_id: u64, offset: u64, len: u64 },
    StreamFin { stream_id: u64 },
    MaxData { token: VarInt },
    MaxStreamData { stream_id: u64, token: VarInt },
    StopSending { stream_id: u64 },
    RstStream { stream_id: u64 },
    /// The ingress ack ranges carried in this packet's own ACK frame; once
    /// acked, those ranges no longer need to be kept for retransmission of
    /// the ACK frame itself.
    AckRangesSent { up_to: u64 },
}

#[derive(Debug)]
struct Entry {
    packet_number: u64,
    sent_at_millis: u64,
    actions: Vec<AckEntryKind>,
}

/// Ordered by packet number (ascending, since packet numbers only
/// increase within an epoch).
#[derive(Debug, Default)]
pub struct AckBook {
    entries: Vec<Entry>,
}

impl AckBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, packet_number: u64, sent_at_millis: u64, actions: Vec<AckEntryKind>) {
        if actions.is_empty() {
            return;
        }
        self.entries.push(Entry {
            packet_number,
            sent_at_millis,
            actions,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn oldest_sent_at(&self) -> Option<u64> {
        self.entries.iter().map(|e| e.sent_at_millis).min()
    }

    /// Walks the entries, removing (and returning, flattened) the actions
    /// carried by any packet number the ranges cover, in packet-number
    /// order. `spec.md` §4.6: "walk ack blocks smallest to largest".
    pub fn settle_acked(&mut self, contains: impl Fn(u64) -> bool) -> Vec<AckEntryKind> {
        let mut settled = Vec::new();
        self.entries.retain(|entry| {
            if contains(entry.packet_number) {
                settled.extend(entry.actions.iter().cloned());
                false
            } else {
                true
            }
        });
        settled
    }

    /// Declares every entry sent before `now_millis - rto_millis` lost,
    /// removing it from the book and returning its actions for
    /// retransmission (`spec.md` §4.9).
    pub fn detect_losses(&mut self, now_millis: u64, rto_millis: u64) -> Vec<AckEntryKind> {
        let mut lost = Vec::new();
        self.entries.retain(|entry| {
            if now_millis.saturating_sub(entry.sent_at_millis) >= rto_millis {
                lost.extend(entry.actions.iter().cloned());
                false
            } else {
                true
            }
        });
        lost
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn settle_acked_removes_only_matching_packet_numbers() {
        let mut book = AckBook::new();
        book.record(1, 0, vec![AckEntryKind::StopSending { stream_id: 4 }]);
        book.record(2, 0, vec![AckEntryKind::RstStream { stream_id: 4 }]);

        let settled = book.settle_acked(|pn| pn == 1);
        assert_eq!(settled, vec![AckEntryKind::StopSending { stream_id: 4 }]);
        assert!(!book.is_empty());

        let settled = book.settle_acked(|pn| pn == 2);
        assert_eq!(settled, vec![AckEntryKind::RstStream { stream_id: 4 }]);
        assert!(book.is_empty());
    }

    #[test]
    fn detect_losses_declares_old_entries_lost() {
        let mut book = AckBook::new();
        book.record(
            1,
            0,
            vec![AckEntryKind::Stream {
                stream_id: 0,
                offset: 0,
                len: 10,
            }],
        );
        book.record(
            2,
            1000,
            vec![AckEntryKind::Stream {
                stream_id: 0,
                offset: 10,
                len: 10,
            }],
        );

        let lost = book.detect_losses(1000, 500);
        assert_eq!(
            lost,
            vec![AckEntryKind::Stream {
                stream_id: 0,
                offset: 0,
                len: 10
            }]
        );
        assert_eq!(book.entries.len(), 1);
    }

    #[test]
    fn empty_actions_are_never_recorded() {
        let mut book = AckBook::new();
        book.record(1, 0, vec![]);
        assert!(book.is_empty());
    }
}
