//! A decoded QUIC packet: header plus the (still-protected, or already
//! unprotected) frame payload.
//!
//! Adapted from the teacher's `packet/packet.rs`. The teacher's
//! `decode_long_header`/`decode_short_header` peeked into the raw `Vec` to
//! compute `end_of_header` by hand before slicing it off; that computation
//! is now just "wherever the cursor stopped" since [`Header::decode`]
//! consumes exactly the header and leaves the cursor at the payload.

use crate::error::Result;
use crate::wire::{Reader, Writer};

use super::header::{Header, LongHeader};
use super::{ConnectionId, FourBits};

#[derive(PartialEq, Debug, Clone)]
pub struct Packet {
    pub header: Header,
    pub payload: Vec<u8>,
}

impl Packet {
    /// Retry and version-negotiation packets carry no frames.
    pub fn contains_frames(&self) -> bool {
        !matches!(self.header, Header::Retry(_))
    }

    pub fn initial(
        version_id: u32,
        dst_cid: ConnectionId,
        src_cid: ConnectionId,
        type_specific_bits: FourBits,
        payload: Vec<u8>,
    ) -> Self {
        let header = Header::Initial(LongHeader::initial(
            version_id,
            dst_cid,
            src_cid,
            type_specific_bits,
        ));
        Self { header, payload }
    }

    pub fn handshake(
        version_id: u32,
        dst_cid: ConnectionId,
        src_cid: ConnectionId,
        type_specific_bits: FourBits,
        payload: Vec<u8>,
    ) -> Self {
        let header = Header::Long(LongHeader::handshake(
            version_id,
            dst_cid,
            src_cid,
            type_specific_bits,
        ));
        Self { header, payload }
    }

    pub fn short(header: Header, payload: Vec<u8>) -> Self {
        debug_assert!(matches!(header, Header::Short(_)));
        Self { header, payload }
    }

    pub fn encode_into(&self, w: &mut Writer) -> Result<()> {
        self.header.encode_into(w)?;
        w.put_bytes(&self.payload)
    }

    /// One UDP datagram carries exactly one packet in this engine
    /// (multi-datagram coalescing is a Non-goal), so the payload is simply
    /// everything the cursor has left after the header.
    pub fn decode(r: &mut Reader, local_cid_len: u8) -> Result<Self> {
        let header = Header::decode(r, local_cid_len)?;
        let payload = r.get_remaining().to_vec();
        Ok(Self { header, payload })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::packet::header::ShortHeader;
    use crate::packet::types::{PacketNumber, SingleBit};
    use crate::primitives::rand::rand;

    fn generate_random_payload() -> Vec<u8> {
        let len = rand(19);
        (0..len).map(|_| rand(255)).collect()
    }

    #[test]
    fn test_long_packet_round_trip() {
        let original = Packet::initial(
            1,
            ConnectionId::new(8, vec![0; 8]),
            ConnectionId::new(8, vec![1; 8]),
            FourBits::from_num(3),
            generate_random_payload(),
        );

        let mut buf = [0u8; 128];
        let mut w = Writer::new(&mut buf);
        original.encode_into(&mut w).unwrap();
        let len = w.offset();

        let mut r = Reader::new(&buf[..len]);
        let decoded = Packet::decode(&mut r, 8).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_short_packet_round_trip() {
        let cid = ConnectionId::new(8, vec![9; 8]);
        let header = Header::Short(ShortHeader::new(
            cid,
            PacketNumber::new(12345),
            SingleBit::one(),
        ));
        let original = Packet::short(header, generate_random_payload());

        let mut buf = [0u8; 128];
        let mut w = Writer::new(&mut buf);
        original.encode_into(&mut w).unwrap();
        let len = w.offset();

        let mut r = Reader::new(&buf[..len]);
        let decoded = Packet::decode(&mut r, 8).unwrap();
        assert_eq!(original, decoded);
    }
}
