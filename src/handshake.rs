//! The TLS handshake driver: stream 0's `on_update` callback, specialized
//! (`spec.md` §4.11, Design Note "TLS integration as a stream").
//!
//! New module (the teacher has none). The host supplies the actual TLS
//! state machine through the [`Tls`] trait; this module only drives it,
//! validates the transport-parameter extension, and tracks the connection
//! state machine `before_server_hello -> before_server_finished ->
//! one_rtt_encrypted`.

use crate::context::{Tls, TlsProgress};
use crate::error::{Error, Result};
use crate::transport_params::TransportParameters;
use crate::wire::{Reader, Writer};

use tracing::debug;

/// Encodes the client's transport-parameters extension: the negotiated
/// and initial versions (both the offered version, since this engine
/// never actually negotiates down), followed by the parameter list.
/// Grounded on `examples/original_source/lib/quicly.c:700-740`
/// (`quicly_connect`'s extension construction).
pub fn encode_client_extension(version: u32, params: &TransportParameters) -> Vec<u8> {
    let param_bytes = params.encode();
    let mut buf = vec![0u8; 8 + param_bytes.len()];
    let mut w = Writer::new(&mut buf);
    w.put_u32(version).expect("fixed buffer sized generously");
    w.put_u32(version).expect("fixed buffer sized generously");
    w.put_bytes(&param_bytes).expect("fixed buffer sized generously");
    let len = w.offset();
    buf.truncate(len);
    buf
}

/// Decodes the client's transport-parameters extension, returning the
/// negotiated version, the initial version, and the parameter list.
/// Grounded on `examples/original_source/lib/quicly.c:764-769`
/// (`server_collected_extensions`).
fn decode_client_extension(encoded: &[u8]) -> Result<(u32, u32, TransportParameters)> {
    let mut r = Reader::new(encoded);
    let negotiated_version = r.get_u32()?;
    let initial_version = r.get_u32()?;
    let params = TransportParameters::decode(r.get_remaining())?;
    Ok((negotiated_version, initial_version, params))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    BeforeServerHello,
    BeforeServerFinished,
    OneRttEncrypted,
}

pub struct HandshakeDriver {
    state: HandshakeState,
    is_client: bool,
    /// The protocol version this engine offered (client) or was offered
    /// (server); `spec.md` §4.11 requires negotiated == offered ==
    /// protocol version on the server side, else `version-negotiation-mismatch`.
    offered_version: u32,
    pub peer_params: Option<TransportParameters>,
}

impl HandshakeDriver {
    pub fn new_client(local_params: &TransportParameters, tls: &mut dyn Tls, version: u32) -> Self {
        tls.set_local_transport_parameters(&encode_client_extension(version, local_params));
        Self {
            state: HandshakeState::BeforeServerHello,
            is_client: true,
            offered_version: version,
            peer_params: None,
        }
    }

    pub fn new_server(local_params: &TransportParameters, tls: &mut dyn Tls, version: u32) -> Self {
        tls.set_local_transport_parameters(&local_params.encode());
        Self {
            state: HandshakeState::BeforeServerHello,
            is_client: false,
            offered_version: version,
            peer_params: None,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn is_one_rtt(&self) -> bool {
        self.state == HandshakeState::OneRttEncrypted
    }

    /// Drives the TLS state machine with bytes received on stream 0,
    /// returning bytes (if any) to write back. On the first sign of
    /// progress the peer's transport parameters are validated; when TLS
    /// reports completion, 1-RTT keys become usable and the state
    /// transitions to `one_rtt_encrypted`.
    pub fn on_update(&mut self, tls: &mut dyn Tls, input: &[u8]) -> Result<TlsProgress> {
        let progress = tls.on_update(input)?;

        if self.peer_params.is_none() {
            if let Some(encoded) = tls.peer_transport_parameters() {
                let params = if self.is_client {
                    TransportParameters::decode(&encoded)?
                } else {
                    let (negotiated, initial, params) = decode_client_extension(&encoded)?;
                    self.validate_client_version(negotiated, initial)?;
                    params
                };
                self.peer_params = Some(params);
                if self.state == HandshakeState::BeforeServerHello {
                    debug!(is_client = self.is_client, "peer transport parameters received");
                    self.state = HandshakeState::BeforeServerFinished;
                }
            }
        }

        if progress.handshake_complete {
            debug!(is_client = self.is_client, from = ?self.state, "handshake state -> one_rtt_encrypted");
            self.state = HandshakeState::OneRttEncrypted;
        }

        Ok(progress)
    }

    /// `spec.md` §4.11: the server rejects unless the client's negotiated
    /// and initial versions both equal the version it was offered on.
    fn validate_client_version(&self, negotiated: u32, initial: u32) -> Result<()> {
        if negotiated != self.offered_version || initial != self.offered_version {
            return Err(Error::VersionNegotiationMismatch);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct FakeTls {
        local_params: Option<Vec<u8>>,
        peer_params: Option<Vec<u8>>,
        complete_after: u32,
        calls: u32,
    }

    impl Tls for FakeTls {
        fn on_update(&mut self, _input: &[u8]) -> Result<TlsProgress> {
            self.calls += 1;
            Ok(TlsProgress {
                output: vec![],
                handshake_complete: self.calls >= self.complete_after,
            })
        }

        fn export_secret(&self, label: &str, _context: &[u8], len: usize) -> Result<Vec<u8>> {
            Ok(vec![label.len() as u8; len])
        }

        fn set_local_transport_parameters(&mut self, encoded: &[u8]) {
            self.local_params = Some(encoded.to_vec());
        }

        fn peer_transport_parameters(&self) -> Option<Vec<u8>> {
            self.peer_params.clone()
        }
    }

    fn sample_params() -> TransportParameters {
        TransportParameters {
            initial_max_stream_data: 16384,
            initial_max_data_kb: 1024,
            initial_max_stream_id: 100,
            idle_timeout_secs: 30,
            truncate_connection_id: false,
        }
    }

    #[test]
    fn client_drives_through_states_to_one_rtt() {
        let local = sample_params();
        let mut tls = FakeTls {
            local_params: None,
            peer_params: Some(sample_params().encode()),
            complete_after: 2,
            calls: 0,
        };
        let mut driver = HandshakeDriver::new_client(&local, &mut tls, crate::PROTOCOL_VERSION);
        assert_eq!(driver.state(), HandshakeState::BeforeServerHello);

        driver.on_update(&mut tls, b"server-hello").unwrap();
        assert_eq!(driver.state(), HandshakeState::BeforeServerFinished);
        assert!(driver.peer_params.is_some());

        driver.on_update(&mut tls, b"server-finished").unwrap();
        assert!(driver.is_one_rtt());
    }

    #[test]
    fn local_params_are_attached_before_handshake_starts() {
        let local = sample_params();
        let mut tls = FakeTls {
            local_params: None,
            peer_params: None,
            complete_after: 99,
            calls: 0,
        };
        let _driver = HandshakeDriver::new_server(&local, &mut tls, crate::PROTOCOL_VERSION);
        assert!(tls.local_params.is_some());
    }

    #[test]
    fn server_accepts_client_extension_matching_offered_version() {
        let local = sample_params();
        let mut tls = FakeTls {
            local_params: None,
            peer_params: Some(encode_client_extension(crate::PROTOCOL_VERSION, &sample_params())),
            complete_after: 2,
            calls: 0,
        };
        let mut driver = HandshakeDriver::new_server(&local, &mut tls, crate::PROTOCOL_VERSION);
        driver.on_update(&mut tls, b"client-hello").unwrap();
        assert!(driver.peer_params.is_some());
    }

    #[test]
    fn server_rejects_client_extension_with_mismatched_version() {
        let local = sample_params();
        let mut tls = FakeTls {
            local_params: None,
            peer_params: Some(encode_client_extension(crate::PROTOCOL_VERSION.wrapping_add(1), &sample_params())),
            complete_after: 2,
            calls: 0,
        };
        let mut driver = HandshakeDriver::new_server(&local, &mut tls, crate::PROTOCOL_VERSION);
        let err = driver.on_update(&mut tls, b"client-hello").unwrap_err();
        assert!(matches!(err, Error::VersionNegotiationMismatch));
    }
}
