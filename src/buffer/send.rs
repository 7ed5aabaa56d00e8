//! Per-stream outgoing byte buffer.
//!
//! New module (the teacher has none). Grounded on the retrieved `quiche`
//! snapshot's `stream::SendBuf`/`RangeBuf` for the "data plus three range
//! sets" shape, generalized to use this crate's own [`RangeSet`] rather
//! than re-deriving interval math locally.
//!
//! Invariant (`spec.md` §3): `pending ∪ acked ∪ in_flight` covers exactly
//! the bytes written but not yet confirmed delivered. A byte range can be
//! in at most one of the three at a time.

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::range_set::RangeSet;

/// Removes `[offset, offset + len)` from `set`, splitting any range that
/// only partially overlaps it.
fn subtract_range(set: &RangeSet, offset: u64, len: usize) -> RangeSet {
    let cut_start = offset;
    let cut_end = offset + len as u64;
    let mut remaining = RangeSet::new();
    for r in set.iter() {
        if r.end <= cut_start || r.start >= cut_end {
            remaining.add(r.start, r.end);
        } else {
            if r.start < cut_start {
                remaining.add(r.start, cut_start);
            }
            if r.end > cut_end {
                remaining.add(cut_end, r.end);
            }
        }
    }
    remaining
}

#[derive(Debug, Default)]
pub struct SendBuffer {
    data: Bytes,
    /// Offset of `data[0]` in the stream's overall byte sequence. Bytes
    /// fully acked below this point are dropped from `data` to bound
    /// memory use.
    base_offset: u64,
    in_flight: RangeSet,
    acked: RangeSet,
    /// Highest offset ever handed to the sender in a STREAM frame.
    max_sent: u64,
    /// Set once the caller has written the final byte of the stream; its
    /// offset is `fin_offset`.
    fin_offset: Option<u64>,
    fin_sent: bool,
    fin_acked: bool,
}

impl SendBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends to the stream's write side. Fails if the stream's send side
    /// is already closed (`spec.md` §7 `fin-closed`).
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if self.fin_offset.is_some() {
            return Err(Error::FinClosed);
        }
        let mut owned = Vec::with_capacity(self.data.len() + bytes.len());
        owned.extend_from_slice(&self.data);
        owned.extend_from_slice(bytes);
        self.data = Bytes::from(owned);
        Ok(())
    }

    pub fn close(&mut self) {
        if self.fin_offset.is_none() {
            self.fin_offset = Some(self.base_offset + self.data.len() as u64);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.fin_offset.is_some()
    }

    pub fn fin_offset(&self) -> Option<u64> {
        self.fin_offset
    }

    pub fn max_sent(&self) -> u64 {
        self.max_sent
    }

    /// Total bytes written so far (the stream's write high-water mark).
    pub fn written_len(&self) -> u64 {
        self.base_offset + self.data.len() as u64
    }

    /// The next unsent (and not yet in-flight) byte range, bounded by
    /// `max_len` (packet space) and `window` (the peer's flow-control
    /// limit, `spec.md` §4.8's `max_stream_data`).
    pub fn next_send(&self, max_len: usize, window: u64) -> Option<(u64, &[u8])> {
        let total_len = self.base_offset + self.data.len() as u64;

        // Merge the two claimed-range sets (in flight, acked) into one
        // combined, sorted, non-overlapping view so a single forward pass
        // both skips past the contiguous claimed prefix starting at
        // `base_offset` and bounds the chunk at whichever later claimed
        // range comes next — e.g. a later segment already acked (or still
        // in flight) while an earlier one has just become sendable again.
        let mut claimed = self.in_flight.clone();
        for r in self.acked.iter() {
            claimed.add(r.start, r.end);
        }

        let mut cursor = self.base_offset;
        let mut end_bound = total_len.min(window);
        for r in claimed.iter() {
            if r.start <= cursor && r.end > cursor {
                cursor = r.end;
            } else if r.start > cursor {
                end_bound = end_bound.min(r.start);
                break;
            }
        }

        if cursor >= end_bound {
            return None;
        }

        let len = (end_bound - cursor).min(max_len as u64) as usize;
        if len == 0 {
            return None;
        }
        let start = (cursor - self.base_offset) as usize;
        Some((cursor, &self.data[start..start + len]))
    }

    pub fn on_sent(&mut self, offset: u64, len: usize) {
        self.in_flight.add(offset, offset + len as u64);
        self.max_sent = self.max_sent.max(offset + len as u64);
        if self.fin_offset == Some(offset + len as u64) {
            self.fin_sent = true;
        }
    }

    pub fn on_sent_fin(&mut self) {
        self.fin_sent = true;
    }

    /// True once every data byte has been sent and only the bare FIN flag
    /// (a zero-length STREAM frame at `fin_offset`) remains to be put on
    /// the wire. The sender uses this to emit a FIN-only frame for streams
    /// that close with no trailing data (`spec.md` §4.3: "an EOS that has
    /// been sent... does not need retransmission as bytes, only as the FIN
    /// flag").
    pub fn pending_fin_only(&self) -> bool {
        matches!(self.fin_offset, Some(fin) if fin == self.max_sent && !self.fin_sent)
    }

    /// An ack retires the range from `in_flight` as well as adding it to
    /// `acked` — otherwise a later segment acked ahead of an earlier one
    /// that subsequently times out would leave the same bytes claimed by
    /// both sets, and `next_send` could hand out already-delivered data.
    pub fn on_acked(&mut self, offset: u64, len: usize) {
        self.acked.add(offset, offset + len as u64);
        self.in_flight = subtract_range(&self.in_flight, offset, len);
        self.reclaim();
    }

    pub fn on_fin_acked(&mut self) {
        self.fin_acked = true;
    }

    /// Loss: move the range back from in-flight to pending by simply
    /// dropping it from `in_flight` (anything not in `acked` and not in
    /// `in_flight` is implicitly pending and eligible for `next_send`).
    pub fn on_lost(&mut self, offset: u64, len: usize) {
        self.in_flight = subtract_range(&self.in_flight, offset, len);
    }

    /// A send side is fully retired once every byte (and the FIN, if any)
    /// has been acked.
    pub fn is_fully_acked(&self) -> bool {
        match self.fin_offset {
            None => false,
            Some(fin) => {
                self.fin_acked
                    && self.acked.max().map(|m| m + 1).unwrap_or(0) >= fin
            }
        }
    }

    /// Drops bytes from `data` that are behind every range still needed
    /// (i.e. fully acked and below the lowest still-pending offset).
    fn reclaim(&mut self) {
        let Some(first) = self.acked.first() else {
            return;
        };
        if first.start != self.base_offset {
            return;
        }
        let drop_to = first.end.min(self.written_len());
        let drop_len = (drop_to - self.base_offset) as usize;
        if drop_len > 0 {
            self.data = self.data.slice(drop_len..);
            self.base_offset = drop_to;
        }
    }
}
