//! Host collaborators and the immutable per-connection configuration.
//!
//! New module (the teacher has none): its traits are the Rust realization
//! of `spec.md` §6's "Host-supplied callbacks" list, and `Context` is the
//! redesign `spec.md`'s Design Note "Global context vs. connection
//! context" asks for explicitly: "model the context as an immutable
//! configuration shared by all connections... no mutation after
//! construction", as opposed to the teacher's process-wide globals (the
//! teacher has none of its own to generalize from here, so this follows
//! the Design Note directly). An `Arc<Context>` is cloned into every
//! `Connection` rather than reached for through a global.

use std::sync::Arc;

use crate::error::Result;
use crate::protection::Aead;

/// Wall-clock access, supplied by the host so the engine stays free of any
/// direct dependency on the system clock (and is deterministically
/// testable).
pub trait Clock {
    fn now_millis(&self) -> u64;
}

/// Packet buffer allocation, supplied by the host so it can pool buffers
/// across connections if it wants to.
pub trait PacketAlloc {
    fn alloc_packet(&self, len: usize) -> Vec<u8>;
    fn free_packet(&self, _buf: Vec<u8>) {}
}

/// Per-connection, per-stream, and timer notifications back to the host
/// (`spec.md` §6).
pub trait Callbacks {
    /// A new peer-initiated stream (or the locally-initiated stream the
    /// host just opened) became known to the connection.
    fn on_stream_open(&self, stream_id: u64);

    /// The stream's receive-side contiguous prefix grew, or it reached
    /// EOS. Stream 0's `on_update` is special: it drives the TLS
    /// handshake (`spec.md` §4.11) instead of being forwarded to the host.
    fn on_update(&self, stream_id: u64);

    /// Requests that the host arrange to call back into the connection
    /// (e.g. to run `handle_timeouts`) no later than `millis` from now.
    fn set_timeout(&self, millis: u64);
}

/// The assembled set of host collaborators a connection is constructed
/// with. Grouped into one struct so `Connection::new` takes one argument
/// instead of four.
pub struct Host {
    pub clock: Arc<dyn Clock + Send + Sync>,
    pub alloc: Arc<dyn PacketAlloc + Send + Sync>,
    pub callbacks: Arc<dyn Callbacks + Send + Sync>,
    pub aead: Arc<dyn Aead + Send + Sync>,
}

/// Immutable configuration shared by every connection built from it.
/// Nothing here is mutated after construction; per-connection state that
/// *does* change lives on `Connection` itself.
#[derive(Debug, Clone, Copy)]
pub struct Context {
    pub is_client: bool,
    pub local_cid_len: u8,
    /// `spec.md` §6 transport parameter id 0, bytes.
    pub initial_max_stream_data: u32,
    /// `spec.md` §6 transport parameter id 1, kilobytes.
    pub initial_max_data_kb: u32,
    /// `spec.md` §6 transport parameter id 2.
    pub initial_max_stream_id: u32,
    /// `spec.md` §6 transport parameter id 3, seconds.
    pub idle_timeout_secs: u16,
    /// `spec.md` §6 transport parameter id 4.
    pub truncate_connection_id: bool,
    /// `spec.md` §6 "max_packet_size (MTU)": the datagram budget
    /// [`crate::sender::send`] packs frames into.
    pub max_packet_size: u32,
    /// `spec.md` §6 "initial_rto (ms)", §4.9's fixed retransmission
    /// timeout.
    pub initial_rto_millis: u64,
}

impl Context {
    pub fn new_client(local_cid_len: u8) -> Self {
        Self {
            is_client: true,
            local_cid_len,
            initial_max_stream_data: 16 * 1024,
            initial_max_data_kb: 1024,
            initial_max_stream_id: 100,
            idle_timeout_secs: 30,
            truncate_connection_id: false,
            max_packet_size: 1280,
            initial_rto_millis: crate::recovery::DEFAULT_RTO_MILLIS,
        }
    }

    pub fn new_server(local_cid_len: u8) -> Self {
        Self {
            is_client: false,
            ..Self::new_client(local_cid_len)
        }
    }

    pub fn initial_max_data_bytes(&self) -> u64 {
        self.initial_max_data_kb as u64 * 1024
    }
}

/// A host-supplied TLS engine collaborator; kept separate from [`Host`]
/// since it is per-connection (it carries handshake state) rather than
/// shared, unlike `clock`/`alloc`/`callbacks`/`aead`.
pub trait Tls {
    /// Feeds bytes received on stream 0 to the TLS state machine and
    /// returns any bytes that should be written back to stream 0.
    fn on_update(&mut self, input: &[u8]) -> Result<TlsProgress>;

    fn export_secret(&self, label: &str, context: &[u8], len: usize) -> Result<Vec<u8>>;

    /// Attaches this engine's encoded transport parameters (extension type
    /// 26, `spec.md` §6) to the handshake messages this `Tls` produces.
    fn set_local_transport_parameters(&mut self, encoded: &[u8]);

    /// The peer's transport-parameters extension, once the host's TLS
    /// implementation has parsed it out of the peer's handshake flight.
    fn peer_transport_parameters(&self) -> Option<Vec<u8>>;
}

#[derive(Debug, Default)]
pub struct TlsProgress {
    pub output: Vec<u8>,
    pub handshake_complete: bool,
}
