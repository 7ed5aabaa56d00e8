//! QUIC transport parameters (`spec.md` §6), carried in the TLS extension
//! of type 26 exchanged during the handshake (`spec.md` §4.11).
//!
//! New module (the teacher has none). Each parameter is a
//! `(id: varint, length: varint, value)` triple, reusing [`VarInt`] for the
//! id/length fields the same way frame encoding does, since `spec.md` only
//! fixes the *value* widths (`u32`, `u16`, a flag) and leaves the
//! container format to the implementation.

use crate::error::{Error, Result};
use crate::primitives::varint::VarInt;
use crate::wire::{Reader, Writer};

pub const TLS_EXTENSION_TYPE: u16 = 26;

const ID_INITIAL_MAX_STREAM_DATA: u64 = 0;
const ID_INITIAL_MAX_DATA: u64 = 1;
const ID_INITIAL_MAX_STREAM_ID: u64 = 2;
const ID_IDLE_TIMEOUT: u64 = 3;
const ID_TRUNCATE_CONNECTION_ID: u64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportParameters {
    pub initial_max_stream_data: u32,
    /// Kilobytes; multiply by 1024 to get the byte limit (`spec.md` §4.11).
    pub initial_max_data_kb: u32,
    pub initial_max_stream_id: u32,
    pub idle_timeout_secs: u16,
    pub truncate_connection_id: bool,
}

impl TransportParameters {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; 64];
        let mut w = Writer::new(&mut buf);
        self.encode_into(&mut w).expect("fixed buffer sized generously");
        let len = w.offset();
        buf.truncate(len);
        buf
    }

    fn encode_into(&self, w: &mut Writer) -> Result<()> {
        put_param(w, ID_INITIAL_MAX_STREAM_DATA, &self.initial_max_stream_data.to_be_bytes())?;
        put_param(w, ID_INITIAL_MAX_DATA, &self.initial_max_data_kb.to_be_bytes())?;
        put_param(w, ID_INITIAL_MAX_STREAM_ID, &self.initial_max_stream_id.to_be_bytes())?;
        put_param(w, ID_IDLE_TIMEOUT, &self.idle_timeout_secs.to_be_bytes())?;
        if self.truncate_connection_id {
            put_param(w, ID_TRUNCATE_CONNECTION_ID, &[])?;
        }
        Ok(())
    }

    /// All four of ids 0-3 are mandatory; a missing one or a duplicate id
    /// fails with `invalid-stream-data` (`spec.md` §6).
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::new(bytes);

        let mut initial_max_stream_data = None;
        let mut initial_max_data_kb = None;
        let mut initial_max_stream_id = None;
        let mut idle_timeout_secs = None;
        let mut truncate_connection_id = false;

        while !r.is_empty() {
            let id = r.get_varint()?.to_inner();
            let len = r.get_varint()?.usize();
            let value = r.get_bytes(len)?;

            match id {
                ID_INITIAL_MAX_STREAM_DATA => {
                    set_once(&mut initial_max_stream_data, read_u32(value)?)?
                }
                ID_INITIAL_MAX_DATA => set_once(&mut initial_max_data_kb, read_u32(value)?)?,
                ID_INITIAL_MAX_STREAM_ID => {
                    set_once(&mut initial_max_stream_id, read_u32(value)?)?
                }
                ID_IDLE_TIMEOUT => set_once(&mut idle_timeout_secs, read_u16(value)?)?,
                ID_TRUNCATE_CONNECTION_ID => {
                    if truncate_connection_id {
                        return Err(Error::InvalidStreamData("duplicate transport parameter"));
                    }
                    truncate_connection_id = true;
                }
                _ => {} // unknown ids outside the allowed bitset are ignored
            }
        }

        Ok(Self {
            initial_max_stream_data: initial_max_stream_data
                .ok_or(Error::InvalidStreamData("missing INITIAL_MAX_STREAM_DATA"))?,
            initial_max_data_kb: initial_max_data_kb
                .ok_or(Error::InvalidStreamData("missing INITIAL_MAX_DATA"))?,
            initial_max_stream_id: initial_max_stream_id
                .ok_or(Error::InvalidStreamData("missing INITIAL_MAX_STREAM_ID"))?,
            idle_timeout_secs: idle_timeout_secs
                .ok_or(Error::InvalidStreamData("missing IDLE_TIMEOUT"))?,
            truncate_connection_id,
        })
    }
}

fn set_once<T>(slot: &mut Option<T>, value: T) -> Result<()> {
    if slot.is_some() {
        return Err(Error::InvalidStreamData("duplicate transport parameter"));
    }
    *slot = Some(value);
    Ok(())
}

fn read_u32(value: &[u8]) -> Result<u32> {
    let arr: [u8; 4] = value
        .try_into()
        .map_err(|_| Error::InvalidStreamData("wrong-sized transport parameter value"))?;
    Ok(u32::from_be_bytes(arr))
}

fn read_u16(value: &[u8]) -> Result<u16> {
    let arr: [u8; 2] = value
        .try_into()
        .map_err(|_| Error::InvalidStreamData("wrong-sized transport parameter value"))?;
    Ok(u16::from_be_bytes(arr))
}

fn put_param(w: &mut Writer, id: u64, value: &[u8]) -> Result<()> {
    w.put_varint(VarInt::new_u64(id)?)?;
    w.put_varint(VarInt::try_from(value.len())?)?;
    w.put_bytes(value)
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample() -> TransportParameters {
        TransportParameters {
            initial_max_stream_data: 16384,
            initial_max_data_kb: 1024,
            initial_max_stream_id: 100,
            idle_timeout_secs: 30,
            truncate_connection_id: false,
        }
    }

    #[test]
    fn round_trips() {
        let params = sample();
        let encoded = params.encode();
        let decoded = TransportParameters::decode(&encoded).unwrap();
        assert_eq!(params, decoded);
    }

    #[test]
    fn round_trips_with_truncate_flag_set() {
        let mut params = sample();
        params.truncate_connection_id = true;
        let encoded = params.encode();
        let decoded = TransportParameters::decode(&encoded).unwrap();
        assert_eq!(params, decoded);
    }

    #[test]
    fn missing_mandatory_id_is_rejected() {
        let params = sample();
        let mut buf = [0u8; 64];
        let mut w = Writer::new(&mut buf);
        put_param(&mut w, ID_INITIAL_MAX_STREAM_DATA, &params.initial_max_stream_data.to_be_bytes()).unwrap();
        put_param(&mut w, ID_INITIAL_MAX_DATA, &params.initial_max_data_kb.to_be_bytes()).unwrap();
        put_param(&mut w, ID_INITIAL_MAX_STREAM_ID, &params.initial_max_stream_id.to_be_bytes()).unwrap();
        // IDLE_TIMEOUT omitted.
        let len = w.offset();
        assert!(TransportParameters::decode(&buf[..len]).is_err());
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let params = sample();
        let mut buf = [0u8; 64];
        let mut w = Writer::new(&mut buf);
        for _ in 0..2 {
            put_param(&mut w, ID_INITIAL_MAX_STREAM_DATA, &params.initial_max_stream_data.to_be_bytes()).unwrap();
        }
        put_param(&mut w, ID_INITIAL_MAX_DATA, &params.initial_max_data_kb.to_be_bytes()).unwrap();
        put_param(&mut w, ID_INITIAL_MAX_STREAM_ID, &params.initial_max_stream_id.to_be_bytes()).unwrap();
        put_param(&mut w, ID_IDLE_TIMEOUT, &params.idle_timeout_secs.to_be_bytes()).unwrap();
        let len = w.offset();
        assert!(TransportParameters::decode(&buf[..len]).is_err());
    }
}
