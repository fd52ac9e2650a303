//! Transaction wire format
//!
//! Format (BIP144 when the context allows witness data and any input has one):
//! - Version (4 bytes, little-endian)
//! - [Marker 0x00, Flag 0x01]
//! - Inputs: VarInt count, then prevout hash (32), prevout index (4), scriptSig (var bytes), sequence (4)
//! - Outputs: VarInt count, then value (8), scriptPubKey (var bytes)
//! - [Witness stack per input: VarInt count of var-bytes items]
//! - Lock time (4 bytes, little-endian)

use super::{Decodable, Encodable, ReadStream, WriteStream};
use crate::error::SerializationError;
use crate::script::Script;
use crate::types::*;
use std::io::{self, Write};

impl Encodable for Script {
    fn encode<W: Write>(&self, s: &mut WriteStream<W>) -> io::Result<()> {
        s.write_var_bytes(self.as_bytes())
    }
}

impl Decodable for Script {
    fn decode(s: &mut ReadStream<'_>) -> Result<Self, SerializationError> {
        Ok(Script::from_bytes(s.read_var_bytes()?))
    }
}

impl Encodable for OutPoint {
    fn encode<W: Write>(&self, s: &mut WriteStream<W>) -> io::Result<()> {
        s.write(&self.hash)?;
        s.write_u32(self.n)
    }
}

impl Decodable for OutPoint {
    fn decode(s: &mut ReadStream<'_>) -> Result<Self, SerializationError> {
        Ok(OutPoint {
            hash: s.read()?,
            n: s.read_u32()?,
        })
    }
}

impl Encodable for TxIn {
    /// Witness data is written separately by the transaction encoder.
    fn encode<W: Write>(&self, s: &mut WriteStream<W>) -> io::Result<()> {
        s.write(&self.prevout)?;
        s.write(&self.script_sig)?;
        s.write_u32(self.sequence)
    }
}

impl Decodable for TxIn {
    fn decode(s: &mut ReadStream<'_>) -> Result<Self, SerializationError> {
        Ok(TxIn {
            prevout: s.read()?,
            script_sig: s.read()?,
            sequence: s.read_u32()?,
            witness: Vec::new(),
        })
    }
}

impl Encodable for TxOut {
    fn encode<W: Write>(&self, s: &mut WriteStream<W>) -> io::Result<()> {
        s.write_i64(self.value)?;
        s.write(&self.script_pubkey)
    }
}

impl Decodable for TxOut {
    fn decode(s: &mut ReadStream<'_>) -> Result<Self, SerializationError> {
        Ok(TxOut {
            value: s.read_i64()?,
            script_pubkey: s.read()?,
        })
    }
}

fn write_witness<W: Write>(s: &mut WriteStream<W>, witness: &Witness) -> io::Result<()> {
    s.write_var_int(witness.len() as u64)?;
    for item in witness {
        s.write_var_bytes(item)?;
    }
    Ok(())
}

fn read_witness(s: &mut ReadStream<'_>) -> Result<Witness, SerializationError> {
    let count = s.read_size()? as usize;
    let mut witness = Vec::with_capacity(count.min(s.remaining()));
    for _ in 0..count {
        witness.push(s.read_var_bytes()?);
    }
    Ok(witness)
}

impl Encodable for Transaction {
    fn encode<W: Write>(&self, s: &mut WriteStream<W>) -> io::Result<()> {
        s.write_i32(self.version)?;
        let with_witness = s.context().allow_witness() && self.has_witness();
        if with_witness {
            // Marker (an empty input vector) and flag
            s.write_u8(0x00)?;
            s.write_u8(0x01)?;
        }
        s.write_vec(&self.inputs)?;
        s.write_vec(&self.outputs)?;
        if with_witness {
            for input in &self.inputs {
                write_witness(s, &input.witness)?;
            }
        }
        s.write_u32(self.lock_time)
    }
}

impl Decodable for Transaction {
    fn decode(s: &mut ReadStream<'_>) -> Result<Self, SerializationError> {
        let allow_witness = s.context().allow_witness();
        let version = s.read_i32()?;
        let mut flags = 0u8;
        let mut inputs: Vec<TxIn> = s.read_vec()?;
        let mut outputs = Vec::new();
        if inputs.is_empty() && allow_witness {
            flags = s.read_u8()?;
            if flags != 0 {
                inputs = s.read_vec()?;
                outputs = s.read_vec()?;
            }
        } else {
            outputs = s.read_vec()?;
        }
        if flags & 1 != 0 && allow_witness {
            flags ^= 1;
            for input in inputs.iter_mut() {
                input.witness = read_witness(s)?;
            }
            if inputs.iter().all(|input| input.witness.is_empty()) {
                return Err(SerializationError::SuperfluousWitnessRecord);
            }
        }
        if flags != 0 {
            return Err(SerializationError::UnknownTransactionOptionalData);
        }
        let lock_time = s.read_u32()?;
        Ok(Transaction {
            version,
            inputs,
            outputs,
            lock_time,
        })
    }
}
