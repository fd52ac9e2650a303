//! Wire format serialization/deserialization
//!
//! Every consensus structure is written through a `WriteStream` and read back
//! through a `ReadStream`. Both carry a `SerializationContext` (disk, network
//! or hash mode, protocol version, transaction options) and a byte counter.
//!
//! Integers are little-endian unless the caller opens a big-endian scope with
//! `with_big_endian`. Hash mode streams straight into a double-SHA256 engine
//! so hashed structures are never materialized.

pub mod block;
#[cfg(test)]
pub(crate) mod strategies;
pub mod transaction;
pub mod varint;

pub use varint::{encode_varint, varint_len, CompactVarInt, VarInt};

use crate::crypto::Sha256dEngine;
use crate::error::SerializationError;
use crate::types::{Uint160, Uint256};
use bitflags::bitflags;
use std::io::{self, Write};

/// Protocol version advertised by this implementation
pub const PROTOCOL_VERSION: u32 = 70012;

/// Upper bound on any length prefix read from a stream (32 MiB)
pub const MAX_SIZE: u64 = 0x0200_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializationKind {
    Disk,
    Network,
    Hash,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TransactionOptions: u32 {
        /// Include segregated witness data (BIP144 marker, flag and witness stacks)
        const WITNESS = 1 << 30;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerializationContext {
    pub kind: SerializationKind,
    pub protocol_version: u32,
    pub options: TransactionOptions,
    /// Blocks carry a trailing block signature
    pub proof_of_stake: bool,
}

impl SerializationContext {
    pub fn network() -> Self {
        SerializationContext {
            kind: SerializationKind::Network,
            protocol_version: PROTOCOL_VERSION,
            options: TransactionOptions::WITNESS,
            proof_of_stake: false,
        }
    }

    pub fn disk() -> Self {
        SerializationContext {
            kind: SerializationKind::Disk,
            ..Self::network()
        }
    }

    /// Hash mode excludes witness data unless asked for it.
    pub fn hash() -> Self {
        SerializationContext {
            kind: SerializationKind::Hash,
            protocol_version: PROTOCOL_VERSION,
            options: TransactionOptions::empty(),
            proof_of_stake: false,
        }
    }

    pub fn with_witness(mut self) -> Self {
        self.options.insert(TransactionOptions::WITNESS);
        self
    }

    pub fn without_witness(mut self) -> Self {
        self.options.remove(TransactionOptions::WITNESS);
        self
    }

    pub fn with_proof_of_stake(mut self, proof_of_stake: bool) -> Self {
        self.proof_of_stake = proof_of_stake;
        self
    }

    pub fn allow_witness(&self) -> bool {
        self.options.contains(TransactionOptions::WITNESS)
    }
}

impl Default for SerializationContext {
    fn default() -> Self {
        Self::network()
    }
}

/// Types with a consensus encoding.
pub trait Encodable {
    fn encode<W: Write>(&self, s: &mut WriteStream<W>) -> io::Result<()>;
}

/// Types with a consensus decoding.
pub trait Decodable: Sized {
    fn decode(s: &mut ReadStream<'_>) -> Result<Self, SerializationError>;
}

/// Serializing half of a stream.
pub struct WriteStream<W: Write> {
    inner: W,
    context: SerializationContext,
    processed: u64,
    big_endian: bool,
}

impl<W: Write> WriteStream<W> {
    pub fn new(inner: W, context: SerializationContext) -> Self {
        WriteStream {
            inner,
            context,
            processed: 0,
            big_endian: false,
        }
    }

    pub fn context(&self) -> &SerializationContext {
        &self.context
    }

    /// Bytes written so far.
    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Runs `f` with multi-byte integers written big-endian, restoring the previous order after.
    pub fn with_big_endian<R>(&mut self, f: impl FnOnce(&mut Self) -> io::Result<R>) -> io::Result<R> {
        let previous = self.big_endian;
        self.big_endian = true;
        let result = f(self);
        self.big_endian = previous;
        result
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_all(bytes)?;
        self.processed += bytes.len() as u64;
        Ok(())
    }

    pub fn write_u8(&mut self, v: u8) -> io::Result<()> {
        self.write_bytes(&[v])
    }

    pub fn write_bool(&mut self, v: bool) -> io::Result<()> {
        self.write_u8(v as u8)
    }

    pub fn write_u16(&mut self, v: u16) -> io::Result<()> {
        if self.big_endian {
            self.write_bytes(&v.to_be_bytes())
        } else {
            self.write_bytes(&v.to_le_bytes())
        }
    }

    pub fn write_u32(&mut self, v: u32) -> io::Result<()> {
        if self.big_endian {
            self.write_bytes(&v.to_be_bytes())
        } else {
            self.write_bytes(&v.to_le_bytes())
        }
    }

    pub fn write_u64(&mut self, v: u64) -> io::Result<()> {
        if self.big_endian {
            self.write_bytes(&v.to_be_bytes())
        } else {
            self.write_bytes(&v.to_le_bytes())
        }
    }

    pub fn write_i32(&mut self, v: i32) -> io::Result<()> {
        self.write_u32(v as u32)
    }

    pub fn write_i64(&mut self, v: i64) -> io::Result<()> {
        self.write_u64(v as u64)
    }

    pub fn write_var_int(&mut self, v: u64) -> io::Result<()> {
        VarInt(v).encode(self)
    }

    /// Length-prefixed byte string.
    pub fn write_var_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.write_var_int(bytes.len() as u64)?;
        self.write_bytes(bytes)
    }

    /// VarInt count followed by each item.
    pub fn write_vec<T: Encodable>(&mut self, items: &[T]) -> io::Result<()> {
        self.write_var_int(items.len() as u64)?;
        for item in items {
            item.encode(self)?;
        }
        Ok(())
    }

    pub fn write<T: Encodable>(&mut self, item: &T) -> io::Result<()> {
        item.encode(self)
    }
}

/// Deserializing half of a stream, over a borrowed buffer.
pub struct ReadStream<'a> {
    data: &'a [u8],
    pos: usize,
    context: SerializationContext,
    big_endian: bool,
}

impl<'a> ReadStream<'a> {
    pub fn new(data: &'a [u8], context: SerializationContext) -> Self {
        ReadStream {
            data,
            pos: 0,
            context,
            big_endian: false,
        }
    }

    pub fn context(&self) -> &SerializationContext {
        &self.context
    }

    /// Bytes consumed so far.
    pub fn processed(&self) -> u64 {
        self.pos as u64
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn with_big_endian<R>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<R, SerializationError>,
    ) -> Result<R, SerializationError> {
        let previous = self.big_endian;
        self.big_endian = true;
        let result = f(self);
        self.big_endian = previous;
        result
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], SerializationError> {
        if self.remaining() < len {
            return Err(SerializationError::EndOfStream);
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], SerializationError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, SerializationError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, SerializationError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16, SerializationError> {
        let bytes = self.read_array()?;
        Ok(if self.big_endian {
            u16::from_be_bytes(bytes)
        } else {
            u16::from_le_bytes(bytes)
        })
    }

    pub fn read_u32(&mut self) -> Result<u32, SerializationError> {
        let bytes = self.read_array()?;
        Ok(if self.big_endian {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        })
    }

    pub fn read_u64(&mut self) -> Result<u64, SerializationError> {
        let bytes = self.read_array()?;
        Ok(if self.big_endian {
            u64::from_be_bytes(bytes)
        } else {
            u64::from_le_bytes(bytes)
        })
    }

    pub fn read_i32(&mut self) -> Result<i32, SerializationError> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_i64(&mut self) -> Result<i64, SerializationError> {
        Ok(self.read_u64()? as i64)
    }

    pub fn read_var_int(&mut self) -> Result<u64, SerializationError> {
        Ok(VarInt::decode(self)?.0)
    }

    /// A length prefix, refused above `MAX_SIZE`.
    pub fn read_size(&mut self) -> Result<u64, SerializationError> {
        let size = self.read_var_int()?;
        if size > MAX_SIZE {
            return Err(SerializationError::OversizedVector(size));
        }
        Ok(size)
    }

    pub fn read_var_bytes(&mut self) -> Result<Vec<u8>, SerializationError> {
        let len = self.read_size()? as usize;
        Ok(self.read_bytes(len)?.to_vec())
    }

    /// A fresh vector: VarInt count followed by that many items.
    pub fn read_vec<T: Decodable>(&mut self) -> Result<Vec<T>, SerializationError> {
        let count = self.read_size()? as usize;
        let mut items = Vec::with_capacity(count.min(self.remaining()));
        for _ in 0..count {
            items.push(T::decode(self)?);
        }
        Ok(items)
    }

    pub fn read<T: Decodable>(&mut self) -> Result<T, SerializationError> {
        T::decode(self)
    }
}

macro_rules! impl_int_codec {
    ($ty:ty, $write:ident, $read:ident) => {
        impl Encodable for $ty {
            fn encode<W: Write>(&self, s: &mut WriteStream<W>) -> io::Result<()> {
                s.$write(*self)
            }
        }

        impl Decodable for $ty {
            fn decode(s: &mut ReadStream<'_>) -> Result<Self, SerializationError> {
                s.$read()
            }
        }
    };
}

impl_int_codec!(u8, write_u8, read_u8);
impl_int_codec!(u16, write_u16, read_u16);
impl_int_codec!(u32, write_u32, read_u32);
impl_int_codec!(u64, write_u64, read_u64);
impl_int_codec!(i32, write_i32, read_i32);
impl_int_codec!(i64, write_i64, read_i64);
impl_int_codec!(bool, write_bool, read_bool);

impl Encodable for Uint256 {
    fn encode<W: Write>(&self, s: &mut WriteStream<W>) -> io::Result<()> {
        s.write_bytes(self.as_bytes())
    }
}

impl Decodable for Uint256 {
    fn decode(s: &mut ReadStream<'_>) -> Result<Self, SerializationError> {
        Ok(Uint256::from_bytes(s.read_array()?))
    }
}

impl Encodable for Uint160 {
    fn encode<W: Write>(&self, s: &mut WriteStream<W>) -> io::Result<()> {
        s.write_bytes(self.as_bytes())
    }
}

impl Decodable for Uint160 {
    fn decode(s: &mut ReadStream<'_>) -> Result<Self, SerializationError> {
        Ok(Uint160::from_bytes(s.read_array()?))
    }
}

/// `io::Write` sink feeding a double-SHA256 engine.
#[derive(Default)]
pub struct HashWriter(Sha256dEngine);

impl HashWriter {
    pub fn new() -> Self {
        HashWriter(Sha256dEngine::new())
    }

    pub fn finalize(self) -> Uint256 {
        Uint256::from_bytes(self.0.finalize())
    }
}

impl Write for HashWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.input(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// `io::Write` sink that only counts.
#[derive(Default)]
struct SizeCounter(usize);

impl Write for SizeCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Serializes with the network context (witness included).
pub fn serialize<T: Encodable>(value: &T) -> Vec<u8> {
    serialize_with(value, SerializationContext::network())
}

pub fn serialize_with<T: Encodable>(value: &T, context: SerializationContext) -> Vec<u8> {
    let mut stream = WriteStream::new(Vec::new(), context);
    value
        .encode(&mut stream)
        .expect("in-memory writers don't error");
    stream.into_inner()
}

/// Deserializes with the network context, rejecting trailing bytes.
pub fn deserialize<T: Decodable>(bytes: &[u8]) -> Result<T, SerializationError> {
    deserialize_with(bytes, SerializationContext::network())
}

pub fn deserialize_with<T: Decodable>(
    bytes: &[u8],
    context: SerializationContext,
) -> Result<T, SerializationError> {
    let mut stream = ReadStream::new(bytes, context);
    let value = T::decode(&mut stream)?;
    if !stream.is_empty() {
        return Err(SerializationError::TrailingBytes);
    }
    Ok(value)
}

/// Double-SHA256 of the encoding of `value` under `context`.
pub fn hash_of<T: Encodable>(value: &T, context: SerializationContext) -> Uint256 {
    let mut stream = WriteStream::new(HashWriter::new(), context);
    value
        .encode(&mut stream)
        .expect("hash writers don't error");
    stream.into_inner().finalize()
}

pub fn serialized_size<T: Encodable>(value: &T, context: SerializationContext) -> usize {
    let mut stream = WriteStream::new(SizeCounter::default(), context);
    value
        .encode(&mut stream)
        .expect("size counters don't error");
    stream.into_inner().0
}
