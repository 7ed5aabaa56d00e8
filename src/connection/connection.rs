//! The connection engine: per-connection state and the receive path
//! (`spec.md` §3, §4.10).
//!
//! Completely rewritten from the teacher's `connection/connection.rs`,
//! which bound `Connection` to a `tokio::net::UdpSocket` and an internal
//! `tokio::spawn`'d task loop, with every substantive method a `todo!()`/
//! `unimplemented!()` stub. `spec.md` §4 is explicit that this engine is
//! host-driven and synchronous — "suspension does not occur inside the
//! core" — so there is no socket, no task, and no async fn here at all;
//! the host owns the socket and calls [`Connection::receive`] and
//! [`crate::sender::send`] from its own event loop.

use std::collections::HashMap;
use std::sync::Arc;

use crate::context::{Context, Host};
use crate::error::{Error, Result};
use crate::handshake::{HandshakeDriver, HandshakeState};
use crate::max_sender::MaxSender;
use crate::packet::frame::Frame;
use crate::packet::header::Header;
use crate::packet::types::{ConnectionId, FourBits};
use crate::primitives::rand::fill_random;
use crate::protection::{self, OneRttSecrets};
use crate::recovery::{AckBook, AckEntryKind};
use crate::stream::Stream;
use crate::transport_params::TransportParameters;
use crate::wire::Reader;

use tracing::{debug, trace};

/// Packet-number bookkeeping and retransmission state for one crypto
/// epoch (`spec.md` §3's "Ack Entry" row, scoped per-epoch since Initial/
/// Handshake-epoch and 1-RTT packet numbers are independent spaces).
#[derive(Default)]
pub(crate) struct Epoch {
    pub next_packet_number: u64,
    pub ack_book: AckBook,
    /// Packet numbers received in this epoch that still need to be
    /// acknowledged.
    pub ingress_acks: crate::range_set::RangeSet,
    pub largest_received: Option<u64>,
}

impl Epoch {
    fn take_packet_number(&mut self) -> u64 {
        let pn = self.next_packet_number;
        self.next_packet_number += 1;
        pn
    }
}

pub struct Connection {
    pub(crate) ctx: Arc<Context>,
    pub(crate) host: Host,
    pub(crate) tls: Box<dyn crate::context::Tls + Send>,
    pub(crate) handshake: HandshakeDriver,

    pub(crate) dst_cid: ConnectionId,
    pub(crate) src_cid: ConnectionId,

    pub(crate) streams: HashMap<u64, Stream>,
    next_local_stream_id: u64,
    /// `spec.md` §3 `host.num_streams`: count of locally-opened streams,
    /// checked against the peer's `INITIAL_MAX_STREAM_ID`.
    host_num_streams: u64,
    /// `spec.md` §3 `peer.num_streams`: count of peer-opened streams,
    /// checked against our own `INITIAL_MAX_STREAM_ID`.
    peer_num_streams: u64,

    pub(crate) cleartext: Epoch,
    pub(crate) one_rtt: Epoch,

    /// Bytes we are permitted to send connection-wide, set from the
    /// peer's MAX_DATA frames (initialized once 1-RTT keys are installed
    /// from `initial_max_data_kb * 1024`, `spec.md` §4.11).
    pub(crate) egress_max_data_permitted: u64,
    pub(crate) egress_max_data_consumed: u64,
    /// Latches true the first time a protected packet needing ack is
    /// processed; never cleared (`spec.md` §4.10).
    pub(crate) acks_require_encryption: bool,

    /// Our connection-wide receive-window advertisement to the peer.
    pub(crate) ingress_max_data: MaxSender,
    pub(crate) ingress_consumed: u64,

    closed: bool,
}

impl Connection {
    fn new(
        ctx: Arc<Context>,
        host: Host,
        tls: Box<dyn crate::context::Tls + Send>,
        handshake: HandshakeDriver,
        dst_cid: ConnectionId,
        src_cid: ConnectionId,
        next_local_stream_id: u64,
    ) -> Self {
        let initial_window = ctx.initial_max_stream_data as u64;
        let mut streams = HashMap::new();
        // Stream 0 always exists; it carries the handshake.
        streams.insert(0, Stream::new(0, initial_window));

        Self {
            ingress_max_data: MaxSender::new(ctx.initial_max_data_bytes()),
            ctx,
            host,
            tls,
            handshake,
            dst_cid,
            src_cid,
            streams,
            next_local_stream_id,
            host_num_streams: 0,
            peer_num_streams: 0,
            cleartext: Epoch::default(),
            one_rtt: Epoch::default(),
            egress_max_data_permitted: 0,
            egress_max_data_consumed: 0,
            acks_require_encryption: false,
            ingress_consumed: 0,
            closed: false,
        }
    }

    /// Builds a client connection and immediately primes stream 0 with the
    /// first handshake flight (`spec.md` §4.11): unlike a server, which only
    /// ever speaks after the client's CLIENT_INITIAL arrives, a client has
    /// nothing incoming to react to, so nothing would otherwise call
    /// [`crate::context::Tls::on_update`] before the very first [`crate::sender::send`].
    ///
    /// `spec.md` §3 models a single `connection_id` per connection, not an
    /// independent id per direction — real QUIC's distinct source/destination
    /// connection IDs only earn their keep once migration or connection-ID
    /// rotation are in play, both explicit Non-goals (`spec.md` §1). This
    /// engine keeps the teacher's long-header `dst_cid`/`src_cid` pair (real
    /// QUIC wire shape) but always populates both with the one id this
    /// connection was given, so `receive`'s `header.dst_cid() == self.src_cid`
    /// check (`spec.md` §4.10) holds for both peers without a CID negotiation
    /// handshake this spec doesn't ask for.
    pub fn new_client(
        ctx: Arc<Context>,
        host: Host,
        mut tls: Box<dyn crate::context::Tls + Send>,
    ) -> Result<Self> {
        let mut cid_bytes = vec![0u8; ctx.local_cid_len as usize];
        fill_random(&mut cid_bytes);
        let cid = ConnectionId::new(ctx.local_cid_len, cid_bytes);

        let local_params = Self::local_transport_params(&ctx);
        let handshake = HandshakeDriver::new_client(&local_params, tls.as_mut(), crate::PROTOCOL_VERSION);

        let mut conn = Self::new(
            ctx.clone(),
            host,
            tls,
            handshake,
            cid.clone(),
            cid,
            1,
        );
        conn.start_handshake()?;
        Ok(conn)
    }

    /// `connection_id` is the id the client offered in its CLIENT_INITIAL
    /// (its packets' `src_cid` field) — the host extracts it from the first
    /// datagram before calling this (`spec.md` §6 `accept`). Both sides of
    /// the connection use the same id from this point on; see the doc
    /// comment on [`Self::new_client`].
    pub fn new_server(
        ctx: Arc<Context>,
        host: Host,
        mut tls: Box<dyn crate::context::Tls + Send>,
        connection_id: ConnectionId,
    ) -> Self {
        let local_params = Self::local_transport_params(&ctx);
        let handshake = HandshakeDriver::new_server(&local_params, tls.as_mut(), crate::PROTOCOL_VERSION);

        Self::new(
            ctx.clone(),
            host,
            tls,
            handshake,
            connection_id.clone(),
            connection_id,
            2,
        )
    }

    fn local_transport_params(ctx: &Context) -> TransportParameters {
        TransportParameters {
            initial_max_stream_data: ctx.initial_max_stream_data,
            initial_max_data_kb: ctx.initial_max_data_kb,
            initial_max_stream_id: ctx.initial_max_stream_id,
            idle_timeout_secs: ctx.idle_timeout_secs,
            truncate_connection_id: ctx.truncate_connection_id,
        }
    }

    pub fn is_one_rtt(&self) -> bool {
        self.handshake.is_one_rtt()
    }

    pub fn state(&self) -> HandshakeState {
        self.handshake.state()
    }

    /// Opens a locally-initiated stream, stepping the id by 2
    /// (`spec.md` §3 `host.next_stream_id`/`host.num_streams`). Fails with
    /// `too-many-open-streams` once the peer's `INITIAL_MAX_STREAM_ID`
    /// transport parameter (`spec.md` §6, mandatory id 2) would be
    /// exceeded; before the handshake has delivered that parameter only
    /// stream 0 exists, so nothing has called this yet.
    pub fn open_stream(&mut self) -> Result<u64> {
        let limit = self
            .handshake
            .peer_params
            .as_ref()
            .map(|p| p.initial_max_stream_id as u64)
            .unwrap_or(u64::MAX);
        if self.host_num_streams >= limit {
            return Err(Error::TooManyOpenStreams);
        }
        let id = self.next_local_stream_id;
        self.next_local_stream_id += 2;
        self.host_num_streams += 1;
        let mut stream = Stream::new(id, self.ctx.initial_max_stream_data as u64);
        stream.send.max_stream_data = self.peer_initial_max_stream_data();
        self.streams.insert(id, stream);
        Ok(id)
    }

    /// The send-side flow-control window a newly opened stream starts
    /// with: the peer's advertised `initial_max_stream_data` transport
    /// parameter (`spec.md` §6), or 0 before the handshake has exchanged
    /// parameters — at which point only stream 0 (exempt from flow
    /// control, `spec.md` §4.8) is sending anything anyway.
    fn peer_initial_max_stream_data(&self) -> u64 {
        self.handshake
            .peer_params
            .as_ref()
            .map(|p| p.initial_max_stream_data as u64)
            .unwrap_or(0)
    }

    pub fn stream_write(&mut self, stream_id: u64, data: &[u8]) -> Result<()> {
        let stream = self
            .streams
            .get_mut(&stream_id)
            .ok_or(Error::InvalidStreamData("unknown stream id"))?;
        stream.write(data)
    }

    /// Marks the stream closed; may emit STOP_SENDING / shut down the
    /// send side on the next `send` (`spec.md` §6 external interface
    /// table).
    pub fn close_stream(&mut self, stream_id: u64) -> Result<()> {
        let stream = self
            .streams
            .get_mut(&stream_id)
            .ok_or(Error::InvalidStreamData("unknown stream id"))?;
        stream.close();
        Ok(())
    }

    pub fn read_stream(&mut self, stream_id: u64) -> Result<Vec<u8>> {
        let stream = self
            .streams
            .get_mut(&stream_id)
            .ok_or(Error::InvalidStreamData("unknown stream id"))?;
        let data = stream.recv.buffer.read();
        self.ingress_consumed += data.len() as u64;
        Ok(data)
    }

    /// The connection's work is done and its resources may be freed
    /// (`spec.md` §7 `free-connection`): requested closed, and every
    /// stream has been fully retired.
    pub fn can_free(&self) -> bool {
        self.closed && self.streams.values().all(|s| s.is_destroyable())
    }

    pub fn request_close(&mut self) {
        self.closed = true;
    }

    /// Opens every stream id up to and including `stream_id` that doesn't
    /// exist yet (`spec.md` §3), firing `on_stream_open` for each
    /// peer-initiated one. `spec.md` §3's stream-id parity convention is
    /// "client = odd"; stream 0 is the crypto stream and is never routed
    /// through here.
    fn get_or_open_stream(&mut self, stream_id: u64) -> Result<&mut Stream> {
        if !self.streams.contains_key(&stream_id) {
            let is_local_parity = (stream_id % 2 == 1) == self.ctx.is_client;
            let send_window = self.peer_initial_max_stream_data();
            if !is_local_parity {
                let mut id = self.lowest_unopened_peer_id(stream_id);
                let opened = (stream_id.saturating_sub(id)) / 2 + 1;
                if self.peer_num_streams + opened > self.ctx.initial_max_stream_id as u64 {
                    return Err(Error::TooManyOpenStreams);
                }
                while id <= stream_id {
                    let mut stream = Stream::new(id, self.ctx.initial_max_stream_data as u64);
                    stream.send.max_stream_data = send_window;
                    self.streams.insert(id, stream);
                    self.peer_num_streams += 1;
                    self.host.callbacks.on_stream_open(id);
                    id += 2;
                }
            } else {
                let mut stream = Stream::new(stream_id, self.ctx.initial_max_stream_data as u64);
                stream.send.max_stream_data = send_window;
                self.streams.insert(stream_id, stream);
            }
        }
        Ok(self.streams.get_mut(&stream_id).expect("just inserted"))
    }

    fn lowest_unopened_peer_id(&self, up_to: u64) -> u64 {
        let parity = up_to % 2;
        let mut id = parity;
        while self.streams.contains_key(&id) && id < up_to {
            id += 2;
        }
        id
    }

    /// Decodes and processes one received UDP datagram. Mismatched
    /// destination connection ids are ignored; short-header (1-RTT)
    /// packets are rejected before the handshake completes
    /// (`spec.md` §4.10).
    pub fn receive(&mut self, datagram: &[u8]) -> Result<()> {
        let mut r = Reader::new(datagram);
        let header = Header::decode(&mut r, self.ctx.local_cid_len)?;

        if header.dst_cid() != &self.src_cid {
            trace!(?header, "received packet for a different connection id, ignoring");
            return Err(Error::PacketIgnored);
        }

        let is_short = matches!(header, Header::Short(_));
        if is_short && self.state() != HandshakeState::OneRttEncrypted {
            return Err(Error::InvalidPacketHeader(
                "short-header packet before one_rtt_encrypted",
            ));
        }

        let protected = r.get_remaining();
        let header_start = &datagram[..datagram.len() - protected.len()];

        let (packet_number, payload) = if is_short {
            let Header::Short(short) = &header else {
                unreachable!()
            };
            let pn = short.packet_number.num as u64;
            let plaintext = self.host.aead.open(pn, header_start, protected)?;
            (pn, plaintext)
        } else {
            let plaintext = protection::unprotect_cleartext(header_start, protected)?
                .to_vec();
            // Packet number space for cleartext packets is carried inside
            // the decrypted plaintext's own framing in full QUIC; this
            // engine instead keeps a per-epoch running counter and trusts
            // in-order Initial/Handshake delivery, consistent with
            // `spec.md`'s Non-goals excluding real loss/reorder handling
            // pre-handshake.
            let pn = self.cleartext.largest_received.map(|n| n + 1).unwrap_or(0);
            (pn, plaintext)
        };

        let epoch_largest = if is_short {
            &mut self.one_rtt.largest_received
        } else {
            &mut self.cleartext.largest_received
        };
        *epoch_largest = Some(epoch_largest.map_or(packet_number, |l| l.max(packet_number)));

        trace!(packet_number, is_short, payload_len = payload.len(), "decoded packet");

        let mut elicits_ack = false;
        let mut pr = Reader::new(&payload);
        while !pr.is_empty() {
            let frame = Frame::decode_from(&mut pr)?;
            elicits_ack |= frame.elicits_ack();
            self.apply_frame(frame, is_short)?;
        }

        if elicits_ack {
            let epoch = if is_short {
                &mut self.one_rtt
            } else {
                &mut self.cleartext
            };
            epoch.ingress_acks.add(packet_number, packet_number + 1);
            if is_short {
                self.acks_require_encryption = true;
            }
        }

        Ok(())
    }

    fn apply_frame(&mut self, frame: Frame, is_short: bool) -> Result<()> {
        match frame {
            Frame::Padding => {}

            Frame::Stream {
                stream_id,
                offset,
                fin,
                data,
            } => {
                let is_handshake_stream = stream_id == 0 && !is_short;
                if is_handshake_stream {
                    self.on_handshake_data(offset, &data)?;
                    return Ok(());
                }

                let stream = self.get_or_open_stream(stream_id)?;
                let grew = stream.recv.buffer.receive(offset, &data)?;
                let reached_eos = if fin {
                    stream
                        .recv
                        .buffer
                        .set_eos(offset + data.len() as u64, None)?;
                    true
                } else {
                    false
                };
                if grew || reached_eos {
                    self.host.callbacks.on_update(stream_id);
                }
            }

            Frame::RstStream {
                stream_id,
                error_code,
                final_offset,
            } => {
                let stream = self.get_or_open_stream(stream_id)?;
                stream.recv.buffer.set_eos(final_offset, Some(error_code))?;
                self.host.callbacks.on_update(stream_id);
            }

            Frame::StopSending {
                stream_id,
                error_code,
            } => {
                let stream = self.get_or_open_stream(stream_id)?;
                stream.send.trigger_stop_sending(error_code);
            }

            Frame::MaxData { maximum_data } => {
                if maximum_data < self.egress_max_data_permitted {
                    return Err(Error::FlowControlError);
                }
                self.egress_max_data_permitted = maximum_data;
            }

            Frame::MaxStreamData {
                stream_id,
                maximum_stream_data,
            } => {
                let stream = self.get_or_open_stream(stream_id)?;
                if maximum_stream_data < stream.send.max_stream_data {
                    return Err(Error::FlowControlError);
                }
                stream.send.max_stream_data = maximum_stream_data;
            }

            Frame::Ack {
                ranges, ..
            } => {
                self.settle_acks(is_short, ranges);
            }
        }
        Ok(())
    }

    fn on_handshake_data(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let stream0 = self.streams.get_mut(&0).expect("stream 0 always exists");
        stream0.recv.buffer.receive(offset, data)?;
        let input = stream0.recv.buffer.read();
        self.drive_handshake(&input)
    }

    /// Primes a freshly constructed client's stream 0 with the first
    /// handshake flight, with nothing received yet to react to.
    fn start_handshake(&mut self) -> Result<()> {
        self.drive_handshake(&[])
    }

    /// Feeds `input` (handshake bytes read off stream 0, or empty for the
    /// client's initial kickoff) to the TLS state machine, writes back any
    /// resulting output, and installs 1-RTT secrets once it reports
    /// completion (`spec.md` §4.11).
    fn drive_handshake(&mut self, input: &[u8]) -> Result<()> {
        let progress = self.handshake.on_update(self.tls.as_mut(), input)?;
        if !progress.output.is_empty() {
            let stream0 = self.streams.get_mut(&0).expect("stream 0 always exists");
            stream0.write(&progress.output)?;
        }

        if progress.handshake_complete {
            debug!("handshake complete, installing 1-rtt secrets");
            let secret_len = 32;
            let secrets = match (
                self.tls.export_secret(protection::CLIENT_1RTT_EXPORTER_LABEL, &[], secret_len),
                self.tls.export_secret(protection::SERVER_1RTT_EXPORTER_LABEL, &[], secret_len),
            ) {
                (Ok(client_secret), Ok(server_secret)) => OneRttSecrets { client_secret, server_secret },
                _ => OneRttSecrets { client_secret: vec![], server_secret: vec![] },
            };
            self.host.aead.install_secrets(&secrets.client_secret, &secrets.server_secret);
            self.egress_max_data_permitted = self.ctx.initial_max_data_bytes();
        }
        Ok(())
    }

    fn settle_acks(&mut self, is_short: bool, ranges: crate::range_set::RangeSet) {
        let epoch = if is_short {
            &mut self.one_rtt
        } else {
            &mut self.cleartext
        };
        let settled = epoch.ack_book.settle_acked(|pn| ranges.contains(pn));
        trace!(is_short, settled = settled.len(), "settling acked packet actions");

        for action in settled {
            match action {
                AckEntryKind::Stream {
                    stream_id,
                    offset,
                    len,
                } => {
                    if let Some(stream) = self.streams.get_mut(&stream_id) {
                        stream.send.buffer.on_acked(offset, len as usize);
                    }
                }
                AckEntryKind::StreamFin { stream_id } => {
                    if let Some(stream) = self.streams.get_mut(&stream_id) {
                        stream.send.buffer.on_fin_acked();
                    }
                }
                AckEntryKind::MaxData { token } => {
                    self.ingress_max_data
                        .acked(crate::max_sender::Token::from_varint(token));
                }
                AckEntryKind::MaxStreamData { stream_id, token } => {
                    if let Some(stream) = self.streams.get_mut(&stream_id) {
                        stream
                            .recv
                            .max_stream_data_sender
                            .acked(crate::max_sender::Token::from_varint(token));
                    }
                }
                AckEntryKind::StopSending { stream_id } => {
                    if let Some(stream) = self.streams.get_mut(&stream_id) {
                        stream.send.stop_sending.on_acked();
                    }
                }
                AckEntryKind::RstStream { stream_id } => {
                    if let Some(stream) = self.streams.get_mut(&stream_id) {
                        stream.send.rst.on_acked();
                    }
                }
                AckEntryKind::AckRangesSent { up_to } => {
                    epoch.ingress_acks.remove_prefix(up_to);
                }
            }
        }
    }

    /// Declares packets older than the fixed RTO lost in both epochs,
    /// requeuing whatever they carried (`spec.md` §4.9).
    pub fn handle_timeouts(&mut self, now_millis: u64) -> Result<()> {
        for is_short in [false, true] {
            let epoch = if is_short {
                &mut self.one_rtt
            } else {
                &mut self.cleartext
            };
            let lost = epoch
                .ack_book
                .detect_losses(now_millis, self.ctx.initial_rto_millis);
            if !lost.is_empty() {
                debug!(is_short, count = lost.len(), now_millis, "requeuing lost packet actions");
            }
            for action in lost {
                self.requeue_lost(action);
            }
        }
        Ok(())
    }

    fn requeue_lost(&mut self, action: AckEntryKind) {
        match action {
            AckEntryKind::Stream {
                stream_id,
                offset,
                len,
            } => {
                if let Some(stream) = self.streams.get_mut(&stream_id) {
                    stream.send.buffer.on_lost(offset, len as usize);
                }
            }
            AckEntryKind::StreamFin { .. } => {
                // The FIN rides on the next STREAM frame covering
                // `max_sent`; nothing to requeue beyond what `on_lost`
                // already exposes via `next_send`.
            }
            AckEntryKind::MaxData { token } => {
                self.ingress_max_data
                    .lost(crate::max_sender::Token::from_varint(token));
            }
            AckEntryKind::MaxStreamData { stream_id, token } => {
                if let Some(stream) = self.streams.get_mut(&stream_id) {
                    stream
                        .recv
                        .max_stream_data_sender
                        .lost(crate::max_sender::Token::from_varint(token));
                }
            }
            AckEntryKind::StopSending { stream_id } => {
                if let Some(stream) = self.streams.get_mut(&stream_id) {
                    stream.send.stop_sending.on_lost();
                }
            }
            AckEntryKind::RstStream { stream_id } => {
                if let Some(stream) = self.streams.get_mut(&stream_id) {
                    stream.send.rst.on_lost();
                }
            }
            AckEntryKind::AckRangesSent { .. } => {}
        }
    }

    pub(crate) fn take_packet_number(&mut self, is_short: bool) -> u64 {
        if is_short {
            self.one_rtt.take_packet_number()
        } else {
            self.cleartext.take_packet_number()
        }
    }

    pub(crate) fn protocol_version(&self) -> u32 {
        crate::PROTOCOL_VERSION
    }

    pub(crate) fn header_type_specific_bits(&self) -> FourBits {
        FourBits::zero()
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::context::{Callbacks, Clock, Context, Host, PacketAlloc, Tls, TlsProgress};
    use crate::protection::Aead;
    use crate::transport_params::TransportParameters;

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

    struct NoopAead;
    impl Aead for NoopAead {
        fn install_secrets(&self, _client: &[u8], _server: &[u8]) {}
        fn seal(&self, _pn: u64, _header: &[u8], payload: &[u8]) -> Result<Vec<u8>> {
            Ok(payload.to_vec())
        }
        fn open(&self, _pn: u64, _header: &[u8], protected: &[u8]) -> Result<Vec<u8>> {
            Ok(protected.to_vec())
        }
    }

    /// Never reports completion; enough to exercise stream bookkeeping
    /// that doesn't depend on finishing the handshake.
    struct NeverDoneTls {
        peer_params: Option<Vec<u8>>,
    }

    impl Tls for NeverDoneTls {
        fn on_update(&mut self, _input: &[u8]) -> Result<TlsProgress> {
            Ok(TlsProgress {
                output: vec![],
                handshake_complete: false,
            })
        }

        fn export_secret(&self, _label: &str, _context: &[u8], len: usize) -> Result<Vec<u8>> {
            Ok(vec![0u8; len])
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
            aead: Arc::new(NoopAead),
        }
    }

    fn params_with_stream_limit(limit: u32) -> Vec<u8> {
        TransportParameters {
            initial_max_stream_data: 16 * 1024,
            initial_max_data_kb: 1024,
            initial_max_stream_id: limit,
            idle_timeout_secs: 30,
            truncate_connection_id: false,
        }
        .encode()
    }

    /// What a server's `HandshakeDriver` expects on `peer_transport_parameters()`:
    /// the client's extension, version header and all (`handshake.rs`).
    fn client_extension_with_stream_limit(limit: u32) -> Vec<u8> {
        crate::handshake::encode_client_extension(
            crate::PROTOCOL_VERSION,
            &TransportParameters {
                initial_max_stream_data: 16 * 1024,
                initial_max_data_kb: 1024,
                initial_max_stream_id: limit,
                idle_timeout_secs: 30,
                truncate_connection_id: false,
            },
        )
    }

    fn client_with_peer_limit(limit: u32) -> Connection {
        let ctx = Arc::new(Context::new_client(8));
        let tls = Box::new(NeverDoneTls {
            peer_params: Some(params_with_stream_limit(limit)),
        });
        let mut conn = Connection::new_client(ctx, test_host(), tls).unwrap();
        // Prime `peer_params` without requiring a full handshake: one
        // `drive_handshake` call is enough since `NeverDoneTls` already
        // has the peer params ready from construction.
        conn.drive_handshake(&[]).unwrap();
        conn
    }

    #[test]
    fn locally_opened_streams_are_odd_for_the_client() {
        let mut conn = client_with_peer_limit(100);
        let a = conn.open_stream().unwrap();
        let b = conn.open_stream().unwrap();
        assert_eq!(a % 2, 1, "client-opened stream ids must be odd (spec.md §3)");
        assert_eq!(b, a + 2);
    }

    #[test]
    fn locally_opened_streams_are_even_for_the_server() {
        let ctx = Arc::new(Context::new_server(8));
        let tls = Box::new(NeverDoneTls {
            peer_params: Some(client_extension_with_stream_limit(100)),
        });
        let mut conn = Connection::new_server(ctx, test_host(), tls, ConnectionId::new(8, vec![0u8; 8]));
        conn.drive_handshake(&[]).unwrap();
        let a = conn.open_stream().unwrap();
        assert_eq!(a % 2, 0, "server-opened stream ids must be even (spec.md §3)");
    }

    #[test]
    fn open_stream_fails_once_peer_limit_is_reached() {
        let mut conn = client_with_peer_limit(1);
        conn.open_stream().unwrap();
        assert!(matches!(conn.open_stream(), Err(Error::TooManyOpenStreams)));
    }

    #[test]
    fn peer_initiated_stream_opens_every_id_up_to_and_including_it() {
        let mut conn = client_with_peer_limit(100);
        // The peer (server) opens its first two even-numbered streams;
        // referencing the second must also open the first.
        conn.get_or_open_stream(4).unwrap();
        assert!(conn.streams.contains_key(&2));
        assert!(conn.streams.contains_key(&4));
    }

    #[test]
    fn peer_initiated_stream_is_rejected_past_the_local_limit() {
        let ctx = Context {
            initial_max_stream_id: 1,
            ..Context::new_client(8)
        };
        let tls = Box::new(NeverDoneTls {
            peer_params: Some(params_with_stream_limit(100)),
        });
        let mut conn = Connection::new_client(Arc::new(ctx), test_host(), tls).unwrap();
        conn.drive_handshake(&[]).unwrap();
        // Peer (server) ids are even; opening id 4 would require opening
        // ids 2 and 4, two streams against a limit of 1.
        assert!(matches!(
            conn.get_or_open_stream(4),
            Err(Error::TooManyOpenStreams)
        ));
    }

    #[test]
    fn stream_is_destroyable_once_closed_acked_and_recv_eos() {
        let mut conn = client_with_peer_limit(100);
        let id = conn.open_stream().unwrap();
        conn.close_stream(id).unwrap();
        let stream = conn.streams.get_mut(&id).unwrap();
        assert!(!stream.is_destroyable(), "neither side has confirmed yet");

        stream.recv.buffer.set_eos(0, None).unwrap();
        assert!(!stream.is_destroyable(), "send side hasn't been acked yet");

        stream.send.buffer.on_fin_acked();
        assert!(stream.is_destroyable());
    }
}
