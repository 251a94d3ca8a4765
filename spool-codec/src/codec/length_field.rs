//! Length-field based framing.
//!
//! The general length-prefixed framer: an optional fixed header, a length
//! field of 1, 2, 3, 4 or 8 bytes in either endianness, an additive length
//! adjustment, and an optional strip of leading bytes from the decoded
//! frame. Symmetric configurations round-trip; asymmetric ones cover wire
//! formats where the length field counts more (or less) than the body.
//!
//! The decoder never touches the buffer speculatively: it walks a cursor
//! over the peeked view and consumes only once the whole frame is present,
//! so a short read costs nothing but the peek.

use bytes::{BufMut, Bytes, BytesMut};

use crate::buffer::ConnBuffer;
use crate::codec::Codec;
use crate::error::{CodecError, Result};

/// Endianness of the length field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    BigEndian,
    LittleEndian,
}

/// Outbound framing configuration.
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Endianness of the serialised length field.
    pub byte_order: ByteOrder,
    /// Width of the length field in bytes; one of 1, 2, 3, 4 or 8.
    pub length_field_length: usize,
    /// Compensation added to the frame length before serialising.
    pub length_adjustment: isize,
    /// When set, the width of the length field itself is added to the
    /// serialised value.
    pub length_includes_length_field_length: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            byte_order: ByteOrder::BigEndian,
            length_field_length: 4,
            length_adjustment: 0,
            length_includes_length_field_length: false,
        }
    }
}

/// Inbound framing configuration.
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Endianness of the length field on the wire.
    pub byte_order: ByteOrder,
    /// Number of header bytes before the length field.
    pub length_field_offset: usize,
    /// Width of the length field in bytes; one of 1, 2, 3, 4 or 8.
    pub length_field_length: usize,
    /// Compensation added to the decoded length field value.
    pub length_adjustment: isize,
    /// Leading bytes stripped from the decoded frame before delivery.
    pub initial_bytes_to_strip: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            byte_order: ByteOrder::BigEndian,
            length_field_offset: 0,
            length_field_length: 4,
            length_adjustment: 0,
            initial_bytes_to_strip: 0,
        }
    }
}

/// Length-field based frame codec.
#[derive(Debug, Clone)]
pub struct LengthFieldCodec {
    encoder: EncoderConfig,
    decoder: DecoderConfig,
}

impl LengthFieldCodec {
    /// Create a codec from encoder and decoder configurations.
    pub fn new(encoder: EncoderConfig, decoder: DecoderConfig) -> Self {
        Self { encoder, decoder }
    }
}

impl Codec for LengthFieldCodec {
    fn encode(&self, buf: &[u8]) -> Result<Bytes> {
        let cfg = &self.encoder;
        let mut length = buf.len() as isize + cfg.length_adjustment;
        if cfg.length_includes_length_field_length {
            length += cfg.length_field_length as isize;
        }
        if length < 0 {
            return Err(CodecError::TooLessLength(length));
        }
        let length = length as usize;

        let mut out = BytesMut::with_capacity(cfg.length_field_length + buf.len());
        match cfg.length_field_length {
            1 => {
                if length >= 1 << 8 {
                    return Err(overflow(length, "byte"));
                }
                out.put_u8(length as u8);
            }
            2 => {
                if length >= 1 << 16 {
                    return Err(overflow(length, "short integer"));
                }
                match cfg.byte_order {
                    ByteOrder::BigEndian => out.put_u16(length as u16),
                    ByteOrder::LittleEndian => out.put_u16_le(length as u16),
                }
            }
            3 => {
                if length >= 1 << 24 {
                    return Err(overflow(length, "medium integer"));
                }
                put_uint24(&mut out, cfg.byte_order, length as u32);
            }
            4 => {
                if length > u32::MAX as usize {
                    return Err(overflow(length, "integer"));
                }
                match cfg.byte_order {
                    ByteOrder::BigEndian => out.put_u32(length as u32),
                    ByteOrder::LittleEndian => out.put_u32_le(length as u32),
                }
            }
            8 => match cfg.byte_order {
                ByteOrder::BigEndian => out.put_u64(length as u64),
                ByteOrder::LittleEndian => out.put_u64_le(length as u64),
            },
            width => return Err(CodecError::UnsupportedLength(width)),
        }
        out.extend_from_slice(buf);
        Ok(out.freeze())
    }

    fn decode(&self, conn: &mut ConnBuffer) -> Result<Bytes> {
        let cfg = &self.decoder;
        let src = conn.peek_all();
        let mut pos = 0usize;

        // retained header before the length field
        if cfg.length_field_offset > 0 {
            if src.len() < cfg.length_field_offset {
                return Err(CodecError::UnexpectedEof);
            }
            pos = cfg.length_field_offset;
        }

        let field = read_length_field(&src[pos..], cfg.length_field_length, cfg.byte_order)?;
        pos += cfg.length_field_length;

        // adjusted body length; zero and negative follow the pass-through
        // semantics of a cursor that refuses empty reads
        let msg_length = field as i128 + cfg.length_adjustment as i128;
        if msg_length <= 0 || msg_length as u128 > (src.len() - pos) as u128 {
            return Err(CodecError::UnexpectedEof);
        }
        let msg_length = msg_length as usize;

        let full_length = cfg.length_field_offset + cfg.length_field_length + msg_length;
        if cfg.initial_bytes_to_strip > full_length {
            return Err(CodecError::StripExceedsFrame {
                strip: cfg.initial_bytes_to_strip,
                frame_len: full_length,
            });
        }
        let frame = Bytes::copy_from_slice(&src[cfg.initial_bytes_to_strip..full_length]);
        conn.consume_n(full_length);
        Ok(frame)
    }
}

fn overflow(length: usize, width: &'static str) -> CodecError {
    CodecError::LengthOverflow { length, width }
}

fn read_length_field(src: &[u8], width: usize, order: ByteOrder) -> Result<u64> {
    let take = |n: usize| -> Result<&[u8]> {
        if src.len() < n {
            Err(CodecError::UnexpectedEof)
        } else {
            Ok(&src[..n])
        }
    };
    match width {
        1 => Ok(take(1)?[0] as u64),
        2 => {
            let b = take(2)?;
            Ok(match order {
                ByteOrder::BigEndian => u16::from_be_bytes([b[0], b[1]]) as u64,
                ByteOrder::LittleEndian => u16::from_le_bytes([b[0], b[1]]) as u64,
            })
        }
        3 => {
            let b = take(3)?;
            Ok(read_uint24(order, b))
        }
        4 => {
            let b = take(4)?;
            Ok(match order {
                ByteOrder::BigEndian => u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as u64,
                ByteOrder::LittleEndian => u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as u64,
            })
        }
        8 => {
            let b = take(8)?;
            let mut raw = [0u8; 8];
            raw.copy_from_slice(b);
            Ok(match order {
                ByteOrder::BigEndian => u64::from_be_bytes(raw),
                ByteOrder::LittleEndian => u64::from_le_bytes(raw),
            })
        }
        width => Err(CodecError::UnsupportedLength(width)),
    }
}

// 24-bit fields are three raw bytes, MSB-first under big-endian
fn read_uint24(order: ByteOrder, b: &[u8]) -> u64 {
    match order {
        ByteOrder::LittleEndian => b[0] as u64 | (b[1] as u64) << 8 | (b[2] as u64) << 16,
        ByteOrder::BigEndian => b[2] as u64 | (b[1] as u64) << 8 | (b[0] as u64) << 16,
    }
}

fn put_uint24(out: &mut BytesMut, order: ByteOrder, v: u32) {
    let bytes = match order {
        ByteOrder::LittleEndian => [v as u8, (v >> 8) as u8, (v >> 16) as u8],
        ByteOrder::BigEndian => [(v >> 16) as u8, (v >> 8) as u8, v as u8],
    };
    out.extend_from_slice(&bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symmetric(width: usize, order: ByteOrder) -> LengthFieldCodec {
        LengthFieldCodec::new(
            EncoderConfig {
                byte_order: order,
                length_field_length: width,
                ..Default::default()
            },
            DecoderConfig {
                byte_order: order,
                length_field_length: width,
                initial_bytes_to_strip: width,
                ..Default::default()
            },
        )
    }

    fn feed(conn: &mut ConnBuffer, chunk: &[u8]) {
        conn.spill();
        conn.fill(chunk);
    }

    #[test]
    fn test_encode_big_endian_short() {
        let codec = symmetric(2, ByteOrder::BigEndian);
        let wire = codec.encode(b"hi").unwrap();
        assert_eq!(&wire[..], &[0x00, 0x02, 0x68, 0x69]);
    }

    #[test]
    fn test_encode_little_endian_short() {
        let codec = symmetric(2, ByteOrder::LittleEndian);
        let wire = codec.encode(b"hi").unwrap();
        assert_eq!(&wire[..], &[0x02, 0x00, 0x68, 0x69]);
    }

    #[test]
    fn test_encode_length_is_width_plus_body() {
        for width in [1usize, 2, 3, 4, 8] {
            let codec = symmetric(width, ByteOrder::BigEndian);
            let wire = codec.encode(b"abc").unwrap();
            assert_eq!(wire.len(), width + 3);
        }
    }

    #[test]
    fn test_encode_uint24_byte_layout() {
        let be = symmetric(3, ByteOrder::BigEndian);
        let wire = be.encode(&[0u8; 5]).unwrap();
        assert_eq!(&wire[..3], &[0x00, 0x00, 0x05]);

        let le = symmetric(3, ByteOrder::LittleEndian);
        let wire = le.encode(&[0u8; 5]).unwrap();
        assert_eq!(&wire[..3], &[0x05, 0x00, 0x00]);
    }

    #[test]
    fn test_encode_overflow_names_width() {
        let codec = symmetric(1, ByteOrder::BigEndian);
        match codec.encode(&[0u8; 256]) {
            Err(CodecError::LengthOverflow { length, width }) => {
                assert_eq!(length, 256);
                assert_eq!(width, "byte");
            }
            other => panic!("expected overflow, got {:?}", other),
        }

        let codec = symmetric(2, ByteOrder::BigEndian);
        assert!(matches!(
            codec.encode(&vec![0u8; 65536]),
            Err(CodecError::LengthOverflow {
                width: "short integer",
                ..
            })
        ));
    }

    #[test]
    fn test_encode_negative_adjusted_length() {
        let codec = LengthFieldCodec::new(
            EncoderConfig {
                length_adjustment: -4,
                ..Default::default()
            },
            DecoderConfig::default(),
        );
        assert_eq!(codec.encode(b"ab"), Err(CodecError::TooLessLength(-2)));
    }

    #[test]
    fn test_encode_unsupported_width() {
        let codec = LengthFieldCodec::new(
            EncoderConfig {
                length_field_length: 5,
                ..Default::default()
            },
            DecoderConfig::default(),
        );
        assert_eq!(codec.encode(b"ab"), Err(CodecError::UnsupportedLength(5)));
    }

    #[test]
    fn test_length_includes_field_length() {
        // field value 7 = 3 bytes of body + 4 bytes of field
        let codec = LengthFieldCodec::new(
            EncoderConfig {
                length_field_length: 4,
                length_includes_length_field_length: true,
                ..Default::default()
            },
            DecoderConfig {
                length_field_length: 4,
                length_adjustment: -4,
                initial_bytes_to_strip: 4,
                ..Default::default()
            },
        );
        let wire = codec.encode(b"abc").unwrap();
        assert_eq!(&wire[..], &[0x00, 0x00, 0x00, 0x07, 0x61, 0x62, 0x63]);

        let mut conn = ConnBuffer::new();
        feed(&mut conn, &wire);
        assert_eq!(&codec.decode(&mut conn).unwrap()[..], b"abc");
        assert_eq!(conn.len(), 0);
    }

    #[test]
    fn test_decode_without_strip_keeps_header() {
        let codec = LengthFieldCodec::new(
            EncoderConfig {
                length_field_length: 2,
                ..Default::default()
            },
            DecoderConfig {
                length_field_length: 2,
                ..Default::default()
            },
        );
        let mut conn = ConnBuffer::new();
        feed(&mut conn, &[0x00, 0x02, 0x68, 0x69]);
        let frame = codec.decode(&mut conn).unwrap();
        assert_eq!(&frame[..], &[0x00, 0x02, 0x68, 0x69]);
    }

    #[test]
    fn test_decode_short_header_and_body() {
        let codec = symmetric(2, ByteOrder::BigEndian);
        let mut conn = ConnBuffer::new();

        feed(&mut conn, &[0x00]);
        assert_eq!(codec.decode(&mut conn), Err(CodecError::UnexpectedEof));
        assert_eq!(conn.len(), 1);

        feed(&mut conn, &[0x05, 0x68, 0x65]);
        assert_eq!(codec.decode(&mut conn), Err(CodecError::UnexpectedEof));
        assert_eq!(conn.len(), 4);

        feed(&mut conn, &[0x6C, 0x6C, 0x6F]);
        assert_eq!(&codec.decode(&mut conn).unwrap()[..], b"hello");
        assert_eq!(conn.len(), 0);
    }

    #[test]
    fn test_decode_with_header_offset() {
        // two magic bytes, then a one-byte length
        let codec = LengthFieldCodec::new(
            EncoderConfig::default(),
            DecoderConfig {
                length_field_offset: 2,
                length_field_length: 1,
                ..Default::default()
            },
        );
        let mut conn = ConnBuffer::new();
        feed(&mut conn, &[0xCA, 0xFE, 0x03, b'x', b'y', b'z']);
        let frame = codec.decode(&mut conn).unwrap();
        assert_eq!(&frame[..], &[0xCA, 0xFE, 0x03, b'x', b'y', b'z']);
        assert_eq!(conn.len(), 0);
    }

    #[test]
    fn test_decode_strip_exceeding_frame_fails() {
        let codec = LengthFieldCodec::new(
            EncoderConfig::default(),
            DecoderConfig {
                length_field_length: 1,
                initial_bytes_to_strip: 10,
                ..Default::default()
            },
        );
        let mut conn = ConnBuffer::new();
        feed(&mut conn, &[0x02, b'h', b'i']);
        assert_eq!(
            codec.decode(&mut conn),
            Err(CodecError::StripExceedsFrame {
                strip: 10,
                frame_len: 3
            })
        );
    }

    #[test]
    fn test_decode_unsupported_width_is_fatal() {
        let codec = LengthFieldCodec::new(
            EncoderConfig::default(),
            DecoderConfig {
                length_field_length: 7,
                ..Default::default()
            },
        );
        let mut conn = ConnBuffer::new();
        feed(&mut conn, &[0x00; 16]);
        let err = codec.decode(&mut conn).unwrap_err();
        assert_eq!(err, CodecError::UnsupportedLength(7));
        assert!(!err.is_incomplete());
    }

    #[test]
    fn test_decode_uint24_both_orders() {
        for order in [ByteOrder::BigEndian, ByteOrder::LittleEndian] {
            let codec = symmetric(3, order);
            let wire = codec.encode(b"payload").unwrap();
            let mut conn = ConnBuffer::new();
            feed(&mut conn, &wire);
            assert_eq!(&codec.decode(&mut conn).unwrap()[..], b"payload");
        }
    }

    #[test]
    fn test_decode_eight_byte_field_round_trip() {
        let codec = symmetric(8, ByteOrder::LittleEndian);
        let wire = codec.encode(b"big field").unwrap();
        let mut conn = ConnBuffer::new();
        feed(&mut conn, &wire);
        assert_eq!(&codec.decode(&mut conn).unwrap()[..], b"big field");
    }
}
