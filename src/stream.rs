//! A single QUIC stream: independent send and receive halves, each with
//! its own flow control.
//!
//! New module (the teacher has none); the data model is `spec.md` §3's
//! stream row. [`FrameState`] models the three-way state machine
//! `spec.md` §4.8 describes for STOP_SENDING/RST_STREAM emission:
//! "pending → unacked (on transmit) → acked (on ack); unacked → pending
//! again on loss."

use crate::buffer::{RecvBuffer, SendBuffer};
use crate::error::Result;
use crate::max_sender::MaxSender;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Never requested; distinct from `Acked` so a stream that never sent
    /// a STOP_SENDING/RST_STREAM doesn't read as "acked" (`spec.md` §3
    /// Lifecycles: a stream's send side is destroyable once fully acked
    /// *or* its RST has been acked — never just because RST was never
    /// sent in the first place).
    Idle,
    /// Wanted, but not yet carried by an in-flight packet.
    Pending,
    /// Carried by a packet awaiting acknowledgement.
    Unacked,
    /// Confirmed delivered; nothing left to do.
    Acked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetSignal {
    pub state: FrameState,
    pub reason: u64,
}

impl ResetSignal {
    fn idle() -> Self {
        Self {
            state: FrameState::Idle,
            reason: 0,
        }
    }

    fn request(reason: u64) -> Self {
        Self {
            state: FrameState::Pending,
            reason,
        }
    }

    pub fn wants_send(&self) -> bool {
        self.state == FrameState::Pending
    }

    pub fn on_sent(&mut self) {
        if self.state == FrameState::Pending {
            self.state = FrameState::Unacked;
        }
    }

    pub fn on_acked(&mut self) {
        self.state = FrameState::Acked;
    }

    pub fn on_lost(&mut self) {
        if self.state == FrameState::Unacked {
            self.state = FrameState::Pending;
        }
    }
}

#[derive(Debug)]
pub struct SendSide {
    pub buffer: SendBuffer,
    /// Highest offset the peer has told us we may send (`spec.md` §3
    /// `send.max_stream_data`).
    pub max_stream_data: u64,
    pub stop_sending: ResetSignal,
    pub rst: ResetSignal,
}

impl SendSide {
    fn new() -> Self {
        Self {
            buffer: SendBuffer::new(),
            max_stream_data: 0,
            stop_sending: ResetSignal::idle(),
            rst: ResetSignal::idle(),
        }
    }

    /// The peer asked us to stop sending (STOP_SENDING); arms our own
    /// RST_STREAM emission (`spec.md` §4.10).
    pub fn trigger_stop_sending(&mut self, reason: u64) {
        if self.rst.state == FrameState::Idle {
            self.rst = ResetSignal::request(reason);
        }
    }

    pub fn request_stop_sending(&mut self, reason: u64) {
        self.stop_sending = ResetSignal::request(reason);
    }
}

#[derive(Debug)]
pub struct RecvSide {
    pub buffer: RecvBuffer,
    /// Limit we've advertised to the peer (`spec.md` §3 `recv.window`).
    pub window: u64,
    pub max_stream_data_sender: MaxSender,
}

impl RecvSide {
    fn new(initial_window: u64) -> Self {
        Self {
            buffer: RecvBuffer::new(),
            window: initial_window,
            max_stream_data_sender: MaxSender::new(initial_window),
        }
    }
}

#[derive(Debug)]
pub struct Stream {
    pub stream_id: u64,
    pub send: SendSide,
    pub recv: RecvSide,
    pub close_called: bool,
}

impl Stream {
    pub fn new(stream_id: u64, initial_max_stream_data: u64) -> Self {
        Self {
            stream_id,
            send: SendSide::new(),
            recv: RecvSide::new(initial_max_stream_data),
            close_called: false,
        }
    }

    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.send.buffer.write(data)
    }

    pub fn close(&mut self) {
        self.close_called = true;
        self.send.buffer.close();
    }

    /// A stream is destroyable once `close_called`, the send side is
    /// fully acked or its RST has been acked, and the recv side has
    /// reached EOS (`spec.md` §3).
    pub fn is_destroyable(&self) -> bool {
        if !self.close_called {
            return false;
        }
        let send_done = self.send.buffer.is_fully_acked() || self.send.rst.state == FrameState::Acked;
        let recv_done = self.recv.buffer.is_eos_delivered();
        send_done && recv_done
    }
}
