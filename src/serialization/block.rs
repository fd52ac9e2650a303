//! Block, header and coin record formats
//!
//! Header: version (4), previous block hash (32), merkle root (32), time (4),
//! bits (4), nonce (4). A block is the header, the VarInt-prefixed transaction
//! list and, when the context is proof-of-stake, the block signature as var bytes.
//!
//! Coin records (undo data, snapshots) use the disk form: a CompactVarInt code
//! packing height and coinbase/coinstake flags, a CompactVarInt time, the
//! output, and an optional redeem script.

use super::{CompactVarInt, Decodable, Encodable, ReadStream, WriteStream};
use crate::error::SerializationError;
use crate::types::*;
use std::io::{self, Write};

impl Encodable for BlockHeader {
    fn encode<W: Write>(&self, s: &mut WriteStream<W>) -> io::Result<()> {
        s.write_i32(self.version)?;
        s.write(&self.prev_block_hash)?;
        s.write(&self.merkle_root)?;
        s.write_u32(self.time)?;
        s.write_u32(self.bits)?;
        s.write_u32(self.nonce)
    }
}

impl Decodable for BlockHeader {
    fn decode(s: &mut ReadStream<'_>) -> Result<Self, SerializationError> {
        Ok(BlockHeader {
            version: s.read_i32()?,
            prev_block_hash: s.read()?,
            merkle_root: s.read()?,
            time: s.read_u32()?,
            bits: s.read_u32()?,
            nonce: s.read_u32()?,
        })
    }
}

impl Encodable for Block {
    fn encode<W: Write>(&self, s: &mut WriteStream<W>) -> io::Result<()> {
        s.write(&self.header)?;
        s.write_vec(&self.transactions)?;
        if s.context().proof_of_stake {
            s.write_var_bytes(&self.signature)?;
        }
        Ok(())
    }
}

impl Decodable for Block {
    fn decode(s: &mut ReadStream<'_>) -> Result<Self, SerializationError> {
        let header = s.read()?;
        let transactions = s.read_vec()?;
        let signature = if s.context().proof_of_stake {
            s.read_var_bytes()?
        } else {
            Vec::new()
        };
        Ok(Block {
            header,
            transactions,
            signature,
        })
    }
}

impl Encodable for Coin {
    fn encode<W: Write>(&self, s: &mut WriteStream<W>) -> io::Result<()> {
        let code = ((self.height as u64) << 2) | ((self.is_coinstake as u64) << 1) | self.is_coinbase as u64;
        s.write(&CompactVarInt(code))?;
        s.write(&CompactVarInt(self.time as u64))?;
        s.write(&self.output)?;
        match &self.redeem_script {
            Some(script) => {
                s.write_u8(1)?;
                s.write(script)
            }
            None => s.write_u8(0),
        }
    }
}

impl Decodable for Coin {
    fn decode(s: &mut ReadStream<'_>) -> Result<Self, SerializationError> {
        let code = s.read::<CompactVarInt>()?.0;
        let time = s.read::<CompactVarInt>()?.0;
        let output = s.read()?;
        let redeem_script = if s.read_bool()? { Some(s.read()?) } else { None };
        Ok(Coin {
            output,
            height: (code >> 2) as u32,
            is_coinbase: code & 1 != 0,
            is_coinstake: code & 2 != 0,
            time: time as u32,
            redeem_script,
        })
    }
}
