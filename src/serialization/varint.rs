//! Variable-length integers
//!
//! Two distinct encodings live here and are not interchangeable:
//!
//! - `VarInt` (Bitcoin `CompactSize`): values < 0xfd in one byte, otherwise a
//!   0xfd/0xfe/0xff marker followed by 2, 4 or 8 little-endian bytes. Used for
//!   every length prefix on the wire.
//! - `CompactVarInt` (Bitcoin Core `VARINT`): base-128, most significant group
//!   first, high bit set on every byte but the last, each continuation group
//!   offset by one so every value has exactly one encoding. Used in disk and
//!   stake records.

use super::{Decodable, Encodable, ReadStream, WriteStream};
use crate::error::SerializationError;
use std::io::{self, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarInt(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompactVarInt(pub u64);

/// Encode a u64 value as a VarInt
///
/// # Examples
///
/// ```
/// use consensus_core::serialization::encode_varint;
///
/// assert_eq!(encode_varint(0), vec![0]);
/// assert_eq!(encode_varint(252), vec![252]);
/// assert_eq!(encode_varint(253), vec![0xfd, 253, 0]);
/// assert_eq!(encode_varint(65535), vec![0xfd, 255, 255]);
/// assert_eq!(encode_varint(65536), vec![0xfe, 0, 0, 1, 0]);
/// ```
pub fn encode_varint(value: u64) -> Vec<u8> {
    let mut result = Vec::with_capacity(varint_len(value));
    if value < 0xfd {
        result.push(value as u8);
    } else if value <= 0xffff {
        result.push(0xfd);
        result.extend_from_slice(&(value as u16).to_le_bytes());
    } else if value <= 0xffff_ffff {
        result.push(0xfe);
        result.extend_from_slice(&(value as u32).to_le_bytes());
    } else {
        result.push(0xff);
        result.extend_from_slice(&value.to_le_bytes());
    }
    result
}

/// Encoded length of `value` as a VarInt.
pub fn varint_len(value: u64) -> usize {
    match value {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

impl Encodable for VarInt {
    fn encode<W: Write>(&self, s: &mut WriteStream<W>) -> io::Result<()> {
        s.write_bytes(&encode_varint(self.0))
    }
}

impl Decodable for VarInt {
    /// Only the shortest encoding of a value is accepted.
    fn decode(s: &mut ReadStream<'_>) -> Result<Self, SerializationError> {
        let marker = s.read_u8()?;
        let value = match marker {
            0xfd => {
                let v = u16::from_le_bytes(s.read_array()?) as u64;
                if v < 0xfd {
                    return Err(SerializationError::NonCanonicalVarInt);
                }
                v
            }
            0xfe => {
                let v = u32::from_le_bytes(s.read_array()?) as u64;
                if v <= 0xffff {
                    return Err(SerializationError::NonCanonicalVarInt);
                }
                v
            }
            0xff => {
                let v = u64::from_le_bytes(s.read_array()?);
                if v <= 0xffff_ffff {
                    return Err(SerializationError::NonCanonicalVarInt);
                }
                v
            }
            small => small as u64,
        };
        Ok(VarInt(value))
    }
}

impl Encodable for CompactVarInt {
    fn encode<W: Write>(&self, s: &mut WriteStream<W>) -> io::Result<()> {
        let mut tmp = [0u8; 10];
        let mut len = 0usize;
        let mut n = self.0;
        loop {
            tmp[len] = (n & 0x7f) as u8 | if len > 0 { 0x80 } else { 0x00 };
            if n <= 0x7f {
                break;
            }
            n = (n >> 7) - 1;
            len += 1;
        }
        tmp[..=len].reverse();
        s.write_bytes(&tmp[..=len])
    }
}

impl Decodable for CompactVarInt {
    fn decode(s: &mut ReadStream<'_>) -> Result<Self, SerializationError> {
        let mut n: u64 = 0;
        loop {
            let byte = s.read_u8()?;
            if n > (u64::MAX >> 7) {
                return Err(SerializationError::CompactVarIntOverflow);
            }
            n = (n << 7) | (byte & 0x7f) as u64;
            if byte & 0x80 != 0 {
                if n == u64::MAX {
                    return Err(SerializationError::CompactVarIntOverflow);
                }
                n += 1;
            } else {
                return Ok(CompactVarInt(n));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::{deserialize, serialize};
    use proptest::prelude::*;

    #[test]
    fn test_varint_boundaries() {
        assert_eq!(serialize(&VarInt(0)), vec![0x00]);
        assert_eq!(serialize(&VarInt(0xfc)), vec![0xfc]);
        assert_eq!(serialize(&VarInt(0xfd)), vec![0xfd, 0xfd, 0x00]);
        assert_eq!(serialize(&VarInt(0xffff)), vec![0xfd, 0xff, 0xff]);
        assert_eq!(serialize(&VarInt(0x1_0000)), vec![0xfe, 0x00, 0x00, 0x01, 0x00]);
        assert_eq!(serialize(&VarInt(0xffff_ffff)), vec![0xfe, 0xff, 0xff, 0xff, 0xff]);
        assert_eq!(
            serialize(&VarInt(0x1_0000_0000)),
            vec![0xff, 0, 0, 0, 0, 1, 0, 0, 0]
        );
    }

    #[test]
    fn test_varint_rejects_non_canonical() {
        assert_eq!(
            deserialize::<VarInt>(&[0xfd, 0xfc, 0x00]),
            Err(SerializationError::NonCanonicalVarInt)
        );
        assert_eq!(
            deserialize::<VarInt>(&[0xfe, 0xff, 0xff, 0x00, 0x00]),
            Err(SerializationError::NonCanonicalVarInt)
        );
        assert_eq!(deserialize::<VarInt>(&[0xfd, 0xff]), Err(SerializationError::EndOfStream));
    }

    #[test]
    fn test_compact_varint_known_encodings() {
        assert_eq!(serialize(&CompactVarInt(0)), vec![0x00]);
        assert_eq!(serialize(&CompactVarInt(127)), vec![0x7f]);
        assert_eq!(serialize(&CompactVarInt(128)), vec![0x80, 0x00]);
        assert_eq!(serialize(&CompactVarInt(255)), vec![0x80, 0x7f]);
        assert_eq!(serialize(&CompactVarInt(256)), vec![0x81, 0x00]);
        assert_eq!(serialize(&CompactVarInt(16383)), vec![0xfe, 0x7f]);
        assert_eq!(serialize(&CompactVarInt(16384)), vec![0xff, 0x00]);
        assert_eq!(serialize(&CompactVarInt(16511)), vec![0xff, 0x7f]);
        assert_eq!(serialize(&CompactVarInt(65535)), vec![0x82, 0xfe, 0x7f]);
    }

    #[test]
    fn test_encodings_differ() {
        assert_ne!(serialize(&VarInt(300)), serialize(&CompactVarInt(300)));
    }

    proptest! {
        #[test]
        fn prop_varint_length_matches(value in any::<u64>()) {
            let bytes = serialize(&VarInt(value));
            prop_assert_eq!(bytes.len(), varint_len(value));
            prop_assert_eq!(deserialize::<VarInt>(&bytes).unwrap().0, value);
        }

        #[test]
        fn prop_compact_varint_decodes_back(value in any::<u64>()) {
            let bytes = serialize(&CompactVarInt(value));
            prop_assert_eq!(deserialize::<CompactVarInt>(&bytes).unwrap().0, value);
        }
    }
}
