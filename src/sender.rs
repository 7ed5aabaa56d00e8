//! The packet sender: `spec.md` §4.8's `quicly_send` algorithm.
//!
//! New module (the teacher has none — its own `sender.rs`-shaped logic
//! lived, unwritten, behind `todo!()`s in `connection/connection.rs`).
//! Grounded on `quicly.c`'s `quicly_send`/`prepare_packet`/
//! `commit_send_packet`/`encrypt_packet` (`original_source/`): choose a
//! packet type for the current handshake phase, fill it by priority
//! (acks, then flow-control updates, then stream data), and only then
//! assign it a packet number and protect it. Packet numbers for cleartext
//! packets never travel on the wire at all (`spec.md` §4.7), so they are
//! assigned lazily, at the point a packet is actually committed, to keep
//! the sender's counter in lockstep with the peer's independently
//! incremented receive-side counter.
//!
//! Implemented as free functions over `&mut Connection` rather than
//! methods on a `Sender` type: `send_stream` needs simultaneous access to
//! one stream's state and the connection-wide flow-control counters,
//! which is only straightforward to express as disjoint field borrows
//! inside one function body.

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::handshake::HandshakeState;
use crate::packet::frame::Frame;
use crate::packet::header::{pn_byte_len, Header, LongHeader, ShortHeader};
use crate::packet::types::{PacketNumber, SingleBit};
use crate::protection;
use crate::range_set::RangeSet;
use crate::recovery::AckEntryKind;
use crate::wire::Writer;

use tracing::trace;

/// `spec.md` §4.8: "pad CLIENT_INITIAL to a fixed 1272-byte payload
/// budget (excluding the FNV-1a-64 tag)". Independent of the connection's
/// `max_packet_size`, which only bounds later packets.
const CLIENT_INITIAL_PAD_TO: usize = 1272;

/// The FNV-1a-64 trailer `spec.md` §4.7 appends to cleartext packets.
const CLEARTEXT_TAG_LEN: usize = 8;

/// Budget set aside for the host AEAD's tag on 1-RTT packets. Real AEADs
/// (AES-GCM, ChaCha20-Poly1305) all use a 16-byte tag; hosts with a
/// shorter one simply get a slightly conservative budget.
const AEAD_TAG_OVERHEAD: usize = 16;

/// Generous upper bound on a STREAM frame's header (type + stream id +
/// offset + length, each up to an 8-byte varint) used to budget how much
/// data a send buffer may hand back before the frame is actually encoded.
const STREAM_FRAME_HEADER_BUDGET: usize = 1 + 8 + 8 + 8;

/// Which of the two packets `spec.md` §4.8 builds per `send()` call this
/// is, and which crypto epoch/header shape it uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PacketKind {
    /// The very first packet a client ever sends: `LongPacketType::initial()`,
    /// padded to exactly [`CLIENT_INITIAL_PAD_TO`].
    ClientInitial,
    /// Later client cleartext (Initial/Handshake-epoch) packets, once
    /// `before_server_hello` has been left.
    ClientCleartext,
    /// Every server cleartext packet.
    ServerCleartext,
    /// 1-RTT, short-header, AEAD-protected packets.
    OneRtt,
}

impl PacketKind {
    fn is_short(self) -> bool {
        matches!(self, PacketKind::OneRtt)
    }
}

/// One packet under construction: a payload being filled frame by frame
/// up to a fixed budget, plus the ack-book actions its frames will need
/// to be settled against once the packet is acked or declared lost.
///
/// Holds no packet number or header until [`commit_packet`] — see the
/// module doc comment on lazy packet-number assignment.
struct Building {
    kind: PacketKind,
    payload: Vec<u8>,
    payload_budget: usize,
    actions: Vec<AckEntryKind>,
}

impl Building {
    fn remaining(&self) -> usize {
        self.payload_budget.saturating_sub(self.payload.len())
    }

    /// Probe-encodes `frame` against the remaining budget; appends and
    /// returns `true` on success, otherwise leaves `self` untouched and
    /// returns `false`. Never panics — `Writer::reserve` turns an
    /// overflow into `Error::NoMemory`, which this treats the same as
    /// "doesn't fit" rather than a hard error, since running out of
    /// packet space mid-batch is an ordinary, expected event here.
    fn try_push(&mut self, frame: &Frame) -> bool {
        match encode_probe(frame, self.remaining()) {
            Some(bytes) => {
                self.payload.extend_from_slice(&bytes);
                true
            }
            None => false,
        }
    }
}

fn encode_probe(frame: &Frame, budget: usize) -> Option<Vec<u8>> {
    let mut probe = vec![0u8; budget];
    let mut w = Writer::new(&mut probe);
    if frame.encode_into(&mut w).is_err() {
        return None;
    }
    let len = w.offset();
    probe.truncate(len);
    Some(probe)
}

/// `spec.md` §4.8 step 1: "choose CLIENT_INITIAL if the client has not
/// yet left `before_server_hello`, else CLIENT_CLEARTEXT; the server
/// always builds SERVER_CLEARTEXT" for the first (cleartext-epoch)
/// packet of this `send()` call.
fn choose_cleartext_kind(conn: &Connection) -> PacketKind {
    if conn.ctx.is_client {
        if conn.state() == HandshakeState::BeforeServerHello {
            PacketKind::ClientInitial
        } else {
            PacketKind::ClientCleartext
        }
    } else {
        PacketKind::ServerCleartext
    }
}

fn budget_for(conn: &Connection, header_len: usize, tag_len: usize) -> usize {
    (conn.ctx.max_packet_size as usize)
        .saturating_sub(header_len)
        .saturating_sub(tag_len)
}

fn start_packet(conn: &Connection, kind: PacketKind) -> Building {
    let payload_budget = match kind {
        PacketKind::ClientInitial => CLIENT_INITIAL_PAD_TO,
        PacketKind::ClientCleartext | PacketKind::ServerCleartext => {
            let header_len = 1 + 4 + 1 + conn.dst_cid.cid_len as usize + 1 + conn.src_cid.cid_len as usize;
            budget_for(conn, header_len, CLEARTEXT_TAG_LEN)
        }
        PacketKind::OneRtt => {
            // `next_packet_number` previews exactly what `take_packet_number`
            // will hand out, since at most one 1-RTT packet is committed
            // per `send()` call.
            let pn_preview = conn.one_rtt.next_packet_number as u32;
            let header_len = 1 + conn.dst_cid.cid_len as usize + pn_byte_len(pn_preview);
            budget_for(conn, header_len, AEAD_TAG_OVERHEAD)
        }
    };
    Building {
        kind,
        payload: Vec::new(),
        payload_budget,
        actions: Vec::new(),
    }
}

/// `spec.md` §4.8 step 3/7: "emit pending ACKs". Gated, for the cleartext
/// packet, by `acks_require_encryption` latching once a 1-RTT packet has
/// elicited an ack — past that point acks belong in the 1-RTT epoch, not
/// cleartext. Never attempted for CLIENT_INITIAL (nothing has been
/// received worth acking at that point).
fn emit_acks(building: &mut Building, ranges: &RangeSet) {
    let Some((frame, up_to)) = fit_ack_frame(ranges, building.remaining()) else {
        return;
    };
    if building.try_push(&frame) {
        building.actions.push(AckEntryKind::AckRangesSent { up_to });
    }
}

/// Finds the largest prefix of `ranges` (lowest, earliest intervals
/// first — `spec.md` §4.2's `shrink_to_count`) whose ACK frame encoding
/// fits in `budget`, shrinking one range at a time until it does. The
/// settlement path (`AckEntryKind::AckRangesSent { up_to }` ->
/// `RangeSet::remove_prefix`) only ever removes a contiguous low-end
/// prefix, so a split ACK frame must keep the low end and defer the
/// high end to a later packet, never the reverse.
fn fit_ack_frame(ranges: &RangeSet, budget: usize) -> Option<(Frame, u64)> {
    if ranges.is_empty() {
        return None;
    }
    for keep in (1..=ranges.len()).rev() {
        let mut subset = ranges.clone();
        subset.shrink_to_count(keep);
        let largest = subset.max()?;
        let frame = Frame::Ack {
            largest_acknowledged: largest,
            ack_delay: 0,
            ranges: subset,
        };
        if encode_probe(&frame, budget).is_some() {
            return Some((frame, largest + 1));
        }
    }
    None
}

/// `spec.md` §4.8 step 7: "if the connection-wide flow-control
/// advertisement is worth updating, emit a MAX_DATA frame".
fn maybe_emit_max_data(conn: &mut Connection, building: &mut Building) {
    let current_consumed = conn.ingress_consumed;
    let window = conn.ctx.initial_max_data_bytes();
    let min_delta = window / 2;
    if !conn
        .ingress_max_data
        .should_update(current_consumed, window, min_delta)
    {
        return;
    }
    let new_value = current_consumed + window;
    let frame = Frame::MaxData { maximum_data: new_value };
    if building.try_push(&frame) {
        let token = conn.ingress_max_data.record(new_value);
        building
            .actions
            .push(AckEntryKind::MaxData { token: token.to_varint() });
    }
}

/// `spec.md` §4.8 step 4 (stream 0) / step 7 (every other stream):
/// "STOP_SENDING and RST_STREAM, if owed, take priority over
/// MAX_STREAM_DATA, which takes priority over STREAM data itself".
///
/// Stream 0 carries the TLS handshake and is exempt from both
/// connection-level and per-stream flow control: `egress_max_data_permitted`
/// stays 0 and every stream's `send.max_stream_data` starts at 0 until the
/// handshake negotiates real limits, so the handshake itself must be able
/// to send before either exists.
fn send_stream(conn: &mut Connection, building: &mut Building, stream_id: u64) {
    let is_handshake_stream = stream_id == 0;

    let Some(stream) = conn.streams.get_mut(&stream_id) else {
        return;
    };
    if stream.is_destroyable() {
        return;
    }

    if stream.send.stop_sending.wants_send() {
        let frame = Frame::StopSending {
            stream_id,
            error_code: stream.send.stop_sending.reason,
        };
        if building.try_push(&frame) {
            stream.send.stop_sending.on_sent();
            building.actions.push(AckEntryKind::StopSending { stream_id });
        }
    }

    if stream.send.rst.wants_send() {
        let frame = Frame::RstStream {
            stream_id,
            error_code: stream.send.rst.reason,
            final_offset: stream.send.buffer.max_sent(),
        };
        if building.try_push(&frame) {
            stream.send.rst.on_sent();
            building.actions.push(AckEntryKind::RstStream { stream_id });
        }
    }

    if !is_handshake_stream {
        let current_consumed = stream.recv.buffer.consumed_offset();
        let window = stream.recv.window;
        let min_delta = window / 2;
        if stream
            .recv
            .max_stream_data_sender
            .should_update(current_consumed, window, min_delta)
        {
            let new_value = current_consumed + window;
            let frame = Frame::MaxStreamData {
                stream_id,
                maximum_stream_data: new_value,
            };
            if building.try_push(&frame) {
                let token = stream.recv.max_stream_data_sender.record(new_value);
                building.actions.push(AckEntryKind::MaxStreamData {
                    stream_id,
                    token: token.to_varint(),
                });
            }
        }
    }

    let stream_window = if is_handshake_stream { u64::MAX } else { stream.send.max_stream_data };
    let conn_room = if is_handshake_stream {
        usize::MAX
    } else {
        conn.egress_max_data_permitted
            .saturating_sub(conn.egress_max_data_consumed) as usize
    };

    loop {
        let Some(stream) = conn.streams.get_mut(&stream_id) else {
            break;
        };
        let max_len = building
            .remaining()
            .saturating_sub(STREAM_FRAME_HEADER_BUDGET)
            .min(conn_room);
        if max_len == 0 {
            break;
        }
        let Some((offset, data)) = stream.send.buffer.next_send(max_len, stream_window) else {
            break;
        };
        let data = data.to_vec();
        let len = data.len() as u64;
        let fin = stream.send.buffer.fin_offset() == Some(offset + len);

        let frame = Frame::Stream {
            stream_id,
            offset,
            fin,
            data,
        };
        if !building.try_push(&frame) {
            break;
        }
        stream.send.buffer.on_sent(offset, len as usize);
        if !is_handshake_stream {
            conn.egress_max_data_consumed += len;
        }
        building.actions.push(AckEntryKind::Stream { stream_id, offset, len });
        if fin {
            building.actions.push(AckEntryKind::StreamFin { stream_id });
        }
    }

    let Some(stream) = conn.streams.get_mut(&stream_id) else {
        return;
    };
    if stream.send.buffer.pending_fin_only() {
        let frame = Frame::Stream {
            stream_id,
            offset: stream.send.buffer.written_len(),
            fin: true,
            data: Vec::new(),
        };
        if building.try_push(&frame) {
            stream.send.buffer.on_sent_fin();
            building.actions.push(AckEntryKind::StreamFin { stream_id });
        }
    }
}

fn build_header(conn: &Connection, kind: PacketKind, packet_number: u64) -> Header {
    match kind {
        PacketKind::ClientInitial => Header::Initial(LongHeader::initial(
            conn.protocol_version(),
            conn.dst_cid.clone(),
            conn.src_cid.clone(),
            conn.header_type_specific_bits(),
        )),
        PacketKind::ClientCleartext | PacketKind::ServerCleartext => Header::Long(LongHeader::handshake(
            conn.protocol_version(),
            conn.dst_cid.clone(),
            conn.src_cid.clone(),
            conn.header_type_specific_bits(),
        )),
        PacketKind::OneRtt => Header::Short(ShortHeader::new(
            conn.dst_cid.clone(),
            PacketNumber::new(packet_number as u32),
            SingleBit::zero(),
        )),
    }
}

fn encode_header(header: &Header) -> Result<Vec<u8>> {
    let mut buf = [0u8; 64];
    let mut w = Writer::new(&mut buf);
    header.encode_into(&mut w)?;
    let len = w.offset();
    Ok(buf[..len].to_vec())
}

/// `spec.md` §4.8 step 8: pads CLIENT_INITIAL to exactly 1272 bytes. Each
/// `Frame::Padding` encodes to exactly one zero byte, so padding can be
/// appended directly instead of probe-encoding one frame at a time.
fn pad_client_initial(building: &mut Building) {
    debug_assert_eq!(building.kind, PacketKind::ClientInitial);
    building.payload.resize(building.payload_budget, 0u8);
}

/// Commits `building` to the wire: assigns the real packet number (only
/// now, see the module doc comment), builds and encodes the header,
/// protects the payload (FNV-1a-64 for cleartext, the host AEAD for
/// 1-RTT), and records the packet's actions in the owning epoch's ack
/// book. A packet with nothing in it is simply skipped — not every
/// `send()` call has something to say in both epochs.
fn commit_packet(conn: &mut Connection, out: &mut Vec<u8>, building: Building, now_millis: u64) -> Result<bool> {
    if building.payload.is_empty() {
        return Ok(false);
    }

    let is_short = building.kind.is_short();
    let packet_number = conn.take_packet_number(is_short);
    let header = build_header(conn, building.kind, packet_number);
    let header_bytes = encode_header(&header)?;

    let protected = if is_short {
        conn.host.aead.seal(packet_number, &header_bytes, &building.payload)?
    } else {
        protection::protect_cleartext(&header_bytes, &building.payload)
    };

    out.clear();
    out.extend_from_slice(&header_bytes);
    out.extend_from_slice(&protected);

    let epoch = if is_short { &mut conn.one_rtt } else { &mut conn.cleartext };
    trace!(kind = ?building.kind, packet_number, wire_len = out.len(), "committed outgoing packet");
    epoch.ack_book.record(packet_number, now_millis, building.actions);
    Ok(true)
}

/// `spec.md` §4.8: builds up to two outgoing packets for one `send()`
/// call — one cleartext (Initial/Handshake-epoch), one 1-RTT once keys
/// are installed — and writes each non-empty one into the matching slot
/// of `out`. Returns how many slots were filled. `out` must have at
/// least 2 entries; extra entries are left untouched.
pub fn send(conn: &mut Connection, out: &mut [Vec<u8>], now_millis: u64) -> Result<usize> {
    conn.handle_timeouts(now_millis)?;
    if out.len() < 2 {
        return Err(Error::NoMemory);
    }

    let mut filled = 0usize;

    let cleartext_kind = choose_cleartext_kind(conn);
    let mut building = start_packet(conn, cleartext_kind);

    if cleartext_kind != PacketKind::ClientInitial && !conn.acks_require_encryption {
        emit_acks(&mut building, &conn.cleartext.ingress_acks);
    }

    send_stream(conn, &mut building, 0);

    if cleartext_kind == PacketKind::ClientInitial {
        let stream0 = conn.streams.get(&0).expect("stream 0 always exists");
        if stream0.send.buffer.max_sent() < stream0.send.buffer.written_len() {
            return Err(Error::HandshakeTooLarge);
        }
        pad_client_initial(&mut building);
    }

    if commit_packet(conn, &mut out[filled], building, now_millis)? {
        filled += 1;
    }

    if conn.state() == HandshakeState::OneRttEncrypted {
        let mut building = start_packet(conn, PacketKind::OneRtt);
        emit_acks(&mut building, &conn.one_rtt.ingress_acks);
        maybe_emit_max_data(conn, &mut building);

        let stream_ids: Vec<u64> = conn.streams.keys().copied().filter(|&id| id != 0).collect();
        for stream_id in stream_ids {
            send_stream(conn, &mut building, stream_id);
        }

        if commit_packet(conn, &mut out[filled], building, now_millis)? {
            filled += 1;
        }
    }

    Ok(filled)
}

#[cfg(test)]
mod test {
    use std::cell::RefCell;
    use std::sync::Arc;

    use super::*;
    use crate::context::{Callbacks, Clock, Context, Host, PacketAlloc, Tls, TlsProgress};
    use crate::protection::Aead;

    struct FixedClock;
    impl Clock for FixedClock {
        fn now_millis(&self) -> u64 {
            0
        }
    }

    struct VecAlloc;
    impl PacketAlloc for VecAlloc {
        fn alloc_packet(&self, len: usize) -> Vec<u8> {
            vec![0u8; len]
        }
    }

    struct NoopCallbacks;
    impl Callbacks for NoopCallbacks {
        fn on_stream_open(&self, _stream_id: u64) {}
        fn on_update(&self, _stream_id: u64) {}
        fn set_timeout(&self, _millis: u64) {}
    }

    /// Passes payload through unmodified save for a fixed-size fake tag,
    /// so tests can assert on exact frame bytes without a real cipher.
    struct PlainAead;
    impl Aead for PlainAead {
        fn install_secrets(&self, _client: &[u8], _server: &[u8]) {}
        fn seal(&self, _pn: u64, _header: &[u8], payload: &[u8]) -> Result<Vec<u8>> {
            let mut out = payload.to_vec();
            out.extend_from_slice(&[0u8; AEAD_TAG_OVERHEAD]);
            Ok(out)
        }
        fn open(&self, _pn: u64, _header: &[u8], protected: &[u8]) -> Result<Vec<u8>> {
            if protected.len() < AEAD_TAG_OVERHEAD {
                return Err(Error::DecryptionFailure);
            }
            Ok(protected[..protected.len() - AEAD_TAG_OVERHEAD].to_vec())
        }
    }

    /// A trivial two-message handshake: the first `on_update` call
    /// attaches the peer's transport parameters, the second reports
    /// completion, mirroring `handshake.rs`'s own `FakeTls`.
    struct FakeTls {
        peer_params: Option<Vec<u8>>,
        calls: RefCell<u32>,
    }

    impl Tls for FakeTls {
        fn on_update(&mut self, _input: &[u8]) -> Result<TlsProgress> {
            let mut calls = self.calls.borrow_mut();
            *calls += 1;
            Ok(TlsProgress {
                output: vec![],
                handshake_complete: *calls >= 2,
            })
        }

        fn export_secret(&self, label: &str, _context: &[u8], len: usize) -> Result<Vec<u8>> {
            Ok(vec![label.len() as u8; len])
        }

        fn set_local_transport_parameters(&mut self, _encoded: &[u8]) {}

        fn peer_transport_parameters(&self) -> Option<Vec<u8>> {
            self.peer_params.clone()
        }
    }

    fn test_host() -> Host {
        Host {
            clock: Arc::new(FixedClock),
            alloc: Arc::new(VecAlloc),
            callbacks: Arc::new(NoopCallbacks),
            aead: Arc::new(PlainAead),
        }
    }

    fn sample_peer_params() -> Vec<u8> {
        crate::transport_params::TransportParameters {
            initial_max_stream_data: 16 * 1024,
            initial_max_data_kb: 1024,
            initial_max_stream_id: 100,
            idle_timeout_secs: 30,
            truncate_connection_id: false,
        }
        .encode()
    }

    /// What the server's `HandshakeDriver` expects on `peer_transport_parameters()`:
    /// the client's extension, version header and all (`handshake.rs`).
    fn sample_client_extension() -> Vec<u8> {
        crate::handshake::encode_client_extension(
            crate::PROTOCOL_VERSION,
            &crate::transport_params::TransportParameters {
                initial_max_stream_data: 16 * 1024,
                initial_max_data_kb: 1024,
                initial_max_stream_id: 100,
                idle_timeout_secs: 30,
                truncate_connection_id: false,
            },
        )
    }

    fn new_client() -> Connection {
        let ctx = Arc::new(Context::new_client(8));
        let tls = Box::new(FakeTls {
            peer_params: Some(sample_peer_params()),
            calls: RefCell::new(0),
        });
        Connection::new_client(ctx, test_host(), tls)
    }

    #[test]
    fn client_initial_is_padded_to_fixed_size() {
        let mut conn = new_client();
        let mut out = vec![Vec::new(), Vec::new()];
        let filled = send(&mut conn, &mut out, 0).unwrap();
        assert_eq!(filled, 1);

        let dst_cid_len = 8;
        let header_len = 1 + 4 + 1 + dst_cid_len + 1 + dst_cid_len;
        assert_eq!(out[0].len(), header_len + CLIENT_INITIAL_PAD_TO + CLEARTEXT_TAG_LEN);

        let mut r = crate::wire::Reader::new(&out[0]);
        let header = Header::decode(&mut r, 8).unwrap();
        assert!(matches!(header, Header::Initial(_)));
    }

    #[test]
    fn handshake_too_large_when_stream_zero_does_not_fit() {
        let mut conn = new_client();
        let huge = vec![0u8; CLIENT_INITIAL_PAD_TO * 2];
        conn.stream_write(0, &huge).unwrap();

        let mut out = vec![Vec::new(), Vec::new()];
        let err = send(&mut conn, &mut out, 0).unwrap_err();
        assert!(matches!(err, Error::HandshakeTooLarge));
    }

    /// Drives two in-process connections through the handshake via
    /// `send`/`receive` alone (no direct state manipulation).
    fn drive_handshake(client: &mut Connection, server: &mut Connection) {
        let mut client_out = vec![Vec::new(), Vec::new()];
        let mut server_out = vec![Vec::new(), Vec::new()];

        // CLIENT_INITIAL -> server.
        let n = send(client, &mut client_out, 0).unwrap();
        for pkt in &client_out[..n] {
            server.receive(pkt).unwrap();
        }

        // SERVER_CLEARTEXT (attaches params, not yet complete) -> client.
        let n = send(server, &mut server_out, 0).unwrap();
        for pkt in &server_out[..n] {
            client.receive(pkt).unwrap();
        }

        // CLIENT_CLEARTEXT (second flight) -> server, completes the server.
        let n = send(client, &mut client_out, 0).unwrap();
        for pkt in &client_out[..n] {
            server.receive(pkt).unwrap();
        }

        // SERVER_CLEARTEXT (second flight) -> client, completes the client.
        let n = send(server, &mut server_out, 0).unwrap();
        for pkt in &server_out[..n] {
            client.receive(pkt).unwrap();
        }
    }

    #[test]
    fn one_rtt_stream_data_is_sent_once_handshake_completes() {
        let mut client = new_client();
        let dst_cid = client.src_cid.clone();
        let ctx = Arc::new(Context::new_server(8));
        let tls = Box::new(FakeTls {
            peer_params: Some(sample_client_extension()),
            calls: RefCell::new(0),
        });
        let mut server = Connection::new_server(ctx, test_host(), tls, dst_cid);

        drive_handshake(&mut client, &mut server);
        assert!(client.is_one_rtt());
        assert!(server.is_one_rtt());

        let stream_id = client.open_stream().unwrap();
        client.stream_write(stream_id, b"hello").unwrap();

        let mut out = vec![Vec::new(), Vec::new()];
        let n = send(&mut client, &mut out, 0).unwrap();
        assert!((1..=2).contains(&n));

        for pkt in &out[..n] {
            let mut r = crate::wire::Reader::new(pkt);
            if let Ok(Header::Short(_)) = Header::decode(&mut r, 8) {
                server.receive(pkt).unwrap();
            }
        }

        let data = server.read_stream(stream_id).unwrap();
        assert_eq!(data, b"hello");
    }
}
