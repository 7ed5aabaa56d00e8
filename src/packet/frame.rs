//! The frame alphabet this engine implements, plus encode/decode.
//!
//! Adapted from the teacher's `packet/frame.rs`: the teacher's `frame!`
//! invocation enumerated the entire QUIC draft frame alphabet (including
//! NEW_CONNECTION_ID, PATH_CHALLENGE, version-negotiation/migration framing)
//! but only ever produced a `Frame { frame_type, frame_data: Vec<u8> }`
//! shell with no encoder or decoder. This cut keeps just the frames
//! `spec.md` §4.1 names — PADDING, ACK, RST_STREAM (the teacher's
//! `RESET_STREAM`), STOP_SENDING, MAX_DATA, MAX_STREAM_DATA, and the
//! STREAM high-bit family — and gives each a real encoding, grounded on
//! the teacher's descriptive comments (themselves transcribed from the
//! QUIC transport draft) for field order and semantics.
//!
//! The STREAM frame type occupies the low three bits of `0x08..=0x0f`:
//! bit 0x04 = explicit offset present, 0x02 = explicit length present,
//! 0x01 = FIN. This engine always emits explicit offset and length (it
//! never relies on "extends to packet end" for offset), matching
//! `spec.md` §4.1's note that the encoder elides only the length, never
//! the offset.

use crate::error::{Error, Result};
use crate::frame;
use crate::primitives::varint::VarInt;
use crate::range_set::RangeSet;
use crate::wire::{Reader, Writer};

frame! {
    PADDING = 0x00,
    ACK = 0x02,
    RST_STREAM = 0x04,
    STOP_SENDING = 0x05,
    MAX_DATA = 0x10,
    MAX_STREAM_DATA = 0x11,
    STREAM = 0x08,
}

const STREAM_FLAG_OFF: u64 = 0x04;
const STREAM_FLAG_LEN: u64 = 0x02;
const STREAM_FLAG_FIN: u64 = 0x01;
const STREAM_TYPE_MASK: u64 = !0x07;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Padding,
    Ack {
        largest_acknowledged: u64,
        ack_delay: u64,
        ranges: RangeSet,
    },
    RstStream {
        stream_id: u64,
        error_code: u64,
        final_offset: u64,
    },
    StopSending {
        stream_id: u64,
        error_code: u64,
    },
    MaxData {
        maximum_data: u64,
    },
    MaxStreamData {
        stream_id: u64,
        maximum_stream_data: u64,
    },
    Stream {
        stream_id: u64,
        offset: u64,
        fin: bool,
        data: Vec<u8>,
    },
}

impl Frame {
    pub fn encode_into(&self, w: &mut Writer) -> Result<()> {
        match self {
            Frame::Padding => w.put_varint(VarInt::new_u32(FrameType::PADDING as u32)),

            Frame::Ack {
                largest_acknowledged,
                ack_delay,
                ranges,
            } => encode_ack(w, *largest_acknowledged, *ack_delay, ranges),

            Frame::RstStream {
                stream_id,
                error_code,
                final_offset,
            } => {
                w.put_varint(VarInt::new_u32(FrameType::RST_STREAM as u32))?;
                w.put_varint(VarInt::new_u64(*stream_id)?)?;
                w.put_varint(VarInt::new_u64(*error_code)?)?;
                w.put_varint(VarInt::new_u64(*final_offset)?)
            }

            Frame::StopSending {
                stream_id,
                error_code,
            } => {
                w.put_varint(VarInt::new_u32(FrameType::STOP_SENDING as u32))?;
                w.put_varint(VarInt::new_u64(*stream_id)?)?;
                w.put_varint(VarInt::new_u64(*error_code)?)
            }

            Frame::MaxData { maximum_data } => {
                w.put_varint(VarInt::new_u32(FrameType::MAX_DATA as u32))?;
                w.put_varint(VarInt::new_u64(*maximum_data)?)
            }

            Frame::MaxStreamData {
                stream_id,
                maximum_stream_data,
            } => {
                w.put_varint(VarInt::new_u32(FrameType::MAX_STREAM_DATA as u32))?;
                w.put_varint(VarInt::new_u64(*stream_id)?)?;
                w.put_varint(VarInt::new_u64(*maximum_stream_data)?)
            }

            Frame::Stream {
                stream_id,
                offset,
                fin,
                data,
            } => {
                let mut frame_type = FrameType::STREAM as u64 | STREAM_FLAG_OFF | STREAM_FLAG_LEN;
                if *fin {
                    frame_type |= STREAM_FLAG_FIN;
                }
                w.put_varint(VarInt::new_u64(frame_type)?)?;
                w.put_varint(VarInt::new_u64(*stream_id)?)?;
                w.put_varint(VarInt::new_u64(*offset)?)?;
                w.put_varint(VarInt::new_u64(data.len() as u64)?)?;
                w.put_bytes(data)
            }
        }
    }

    pub fn decode_from(r: &mut Reader) -> Result<Self> {
        let frame_type = r.get_varint()?.to_inner();

        if frame_type & STREAM_TYPE_MASK == FrameType::STREAM as u64 {
            return decode_stream(r, frame_type);
        }

        match frame_type {
            v if v == FrameType::PADDING as u64 => Ok(Frame::Padding),
            v if v == FrameType::ACK as u64 => decode_ack(r),
            v if v == FrameType::RST_STREAM as u64 => Ok(Frame::RstStream {
                stream_id: r.get_varint()?.to_inner(),
                error_code: r.get_varint()?.to_inner(),
                final_offset: r.get_varint()?.to_inner(),
            }),
            v if v == FrameType::STOP_SENDING as u64 => Ok(Frame::StopSending {
                stream_id: r.get_varint()?.to_inner(),
                error_code: r.get_varint()?.to_inner(),
            }),
            v if v == FrameType::MAX_DATA as u64 => Ok(Frame::MaxData {
                maximum_data: r.get_varint()?.to_inner(),
            }),
            v if v == FrameType::MAX_STREAM_DATA as u64 => Ok(Frame::MaxStreamData {
                stream_id: r.get_varint()?.to_inner(),
                maximum_stream_data: r.get_varint()?.to_inner(),
            }),
            _ => Err(Error::InvalidFrameData("unknown frame type")),
        }
    }

    /// Whether receiving this frame should schedule its carrying packet
    /// for acknowledgement (`spec.md` §4.10: "PADDING alone does not").
    pub fn elicits_ack(&self) -> bool {
        !matches!(self, Frame::Padding)
    }
}

fn decode_stream(r: &mut Reader, frame_type: u64) -> Result<Frame> {
    let has_offset = frame_type & STREAM_FLAG_OFF != 0;
    let has_len = frame_type & STREAM_FLAG_LEN != 0;
    let fin = frame_type & STREAM_FLAG_FIN != 0;

    let stream_id = r.get_varint()?.to_inner();
    let offset = if has_offset {
        r.get_varint()?.to_inner()
    } else {
        0
    };
    let data = if has_len {
        let len = r.get_varint()?.usize();
        r.get_bytes(len)?.to_vec()
    } else {
        r.get_remaining().to_vec()
    };

    Ok(Frame::Stream {
        stream_id,
        offset,
        fin,
        data,
    })
}

/// Emits largest-acknowledged then `(block_length, gap)` pairs walking the
/// range set from the highest range down, per `spec.md` §4.1.
fn encode_ack(w: &mut Writer, largest_acknowledged: u64, ack_delay: u64, ranges: &RangeSet) -> Result<()> {
    w.put_varint(VarInt::new_u32(FrameType::ACK as u32))?;
    w.put_varint(VarInt::new_u64(largest_acknowledged)?)?;
    w.put_varint(VarInt::new_u64(ack_delay)?)?;
    w.put_varint(VarInt::try_from(ranges.len())?)?;

    let mut iter = ranges.iter().rev();
    let first = iter
        .next()
        .ok_or(Error::InvalidFrameData("empty ack range set"))?;
    w.put_varint(VarInt::new_u64(first.end - 1 - first.start)?)?;

    let mut prev_start = first.start;
    for r in iter {
        let gap = prev_start - r.end - 1;
        w.put_varint(VarInt::new_u64(gap)?)?;
        w.put_varint(VarInt::new_u64(r.end - r.start - 1)?)?;
        prev_start = r.start;
    }
    Ok(())
}

fn decode_ack(r: &mut Reader) -> Result<Frame> {
    let largest_acknowledged = r.get_varint()?.to_inner();
    let ack_delay = r.get_varint()?.to_inner();
    let block_count = r.get_varint()?.to_inner();

    let first_range_len = r.get_varint()?.to_inner();
    let mut ranges = RangeSet::new();
    let mut smallest = largest_acknowledged
        .checked_sub(first_range_len)
        .ok_or(Error::InvalidFrameData("ack range underflow"))?;
    ranges.add(smallest, largest_acknowledged + 1);

    for _ in 1..block_count {
        let gap = r.get_varint()?.to_inner();
        let range_len = r.get_varint()?.to_inner();
        let largest = smallest
            .checked_sub(gap + 2)
            .ok_or(Error::InvalidFrameData("ack range underflow"))?;
        smallest = largest
            .checked_sub(range_len)
            .ok_or(Error::InvalidFrameData("ack range underflow"))?;
        ranges.add(smallest, largest + 1);
    }

    Ok(Frame::Ack {
        largest_acknowledged,
        ack_delay,
        ranges,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    fn round_trip(frame: &Frame) -> Frame {
        let mut buf = [0u8; 256];
        let mut w = Writer::new(&mut buf);
        frame.encode_into(&mut w).unwrap();
        let len = w.offset();
        let mut r = Reader::new(&buf[..len]);
        Frame::decode_from(&mut r).unwrap()
    }

    #[test]
    fn padding_round_trips() {
        assert_eq!(round_trip(&Frame::Padding), Frame::Padding);
    }

    #[test]
    fn stream_round_trips_with_fin() {
        let f = Frame::Stream {
            stream_id: 4,
            offset: 128,
            fin: true,
            data: b"hello world".to_vec(),
        };
        assert_eq!(round_trip(&f), f);
    }

    #[test]
    fn stream_round_trips_without_fin() {
        let f = Frame::Stream {
            stream_id: 0,
            offset: 0,
            fin: false,
            data: b"client hello".to_vec(),
        };
        assert_eq!(round_trip(&f), f);
    }

    #[test]
    fn rst_stream_round_trips() {
        let f = Frame::RstStream {
            stream_id: 7,
            error_code: 1,
            final_offset: 42,
        };
        assert_eq!(round_trip(&f), f);
    }

    #[test]
    fn stop_sending_round_trips() {
        let f = Frame::StopSending {
            stream_id: 3,
            error_code: 0,
        };
        assert_eq!(round_trip(&f), f);
    }

    #[test]
    fn max_data_and_max_stream_data_round_trip() {
        assert_eq!(
            round_trip(&Frame::MaxData { maximum_data: 65536 }),
            Frame::MaxData { maximum_data: 65536 }
        );
        let f = Frame::MaxStreamData {
            stream_id: 4,
            maximum_stream_data: 8192,
        };
        assert_eq!(round_trip(&f), f);
    }

    #[test]
    fn ack_single_range_round_trips() {
        let mut ranges = RangeSet::new();
        ranges.add(0, 5);
        let f = Frame::Ack {
            largest_acknowledged: 4,
            ack_delay: 100,
            ranges,
        };
        assert_eq!(round_trip(&f), f);
    }

    #[test]
    fn ack_multiple_ranges_round_trips() {
        let mut ranges = RangeSet::new();
        ranges.add(0, 3);
        ranges.add(5, 9);
        ranges.add(20, 21);
        let f = Frame::Ack {
            largest_acknowledged: 20,
            ack_delay: 0,
            ranges,
        };
        assert_eq!(round_trip(&f), f);
    }

    #[test]
    fn unknown_frame_type_is_rejected() {
        let buf = [0x7fu8];
        let mut r = Reader::new(&buf);
        assert!(Frame::decode_from(&mut r).is_err());
    }

    #[test]
    fn padding_does_not_elicit_ack_but_others_do() {
        assert!(!Frame::Padding.elicits_ack());
        assert!(Frame::MaxData { maximum_data: 1 }.elicits_ack());
    }
}
