//! Core types for consensus validation
//!
//! Hash newtypes store bytes in internal (little-endian) order and display
//! reversed, the way block and transaction ids are conventionally printed.

use crate::crypto;
use crate::error::SerializationError;
use crate::script::{Builder, Script};
use crate::serialization::{self, SerializationContext};
use crate::opcodes::*;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

macro_rules! impl_hash_newtype {
    ($name:ident, $len:expr) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            pub const ZERO: $name = $name([0u8; $len]);

            pub const fn from_bytes(bytes: [u8; $len]) -> Self {
                $name(bytes)
            }

            pub fn from_slice(bytes: &[u8]) -> Option<Self> {
                let array: [u8; $len] = bytes.try_into().ok()?;
                Some($name(array))
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|b| *b == 0)
            }

            /// Parses the reversed (display order) hex form.
            pub fn from_hex(s: &str) -> std::result::Result<Self, SerializationError> {
                let mut bytes = hex::decode(s).map_err(|e| SerializationError::InvalidHex(e.to_string()))?;
                bytes.reverse();
                Self::from_slice(&bytes)
                    .ok_or_else(|| SerializationError::InvalidHex(format!("expected {} bytes", $len)))
            }
        }

        impl Ord for $name {
            /// Numeric order: the last stored byte is the most significant.
            fn cmp(&self, other: &Self) -> Ordering {
                self.0.iter().rev().cmp(other.0.iter().rev())
            }
        }

        impl PartialOrd for $name {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                for byte in self.0.iter().rev() {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = SerializationError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Self::from_hex(s)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

impl_hash_newtype!(Uint256, 32);
impl_hash_newtype!(Uint160, 20);

impl Uint256 {
    /// The integer one: first stored byte 0x01, rest zero.
    pub const ONE: Uint256 = {
        let mut bytes = [0u8; 32];
        bytes[0] = 1;
        Uint256(bytes)
    };

    /// Low 64 bits as an integer.
    pub fn low_u64(&self) -> u64 {
        let mut low = [0u8; 8];
        low.copy_from_slice(&self.0[..8]);
        u64::from_le_bytes(low)
    }
}

/// Witness stack of one input
pub type Witness = Vec<Vec<u8>>;

/// Reference to a transaction output: (txid, index)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutPoint {
    pub hash: Uint256,
    pub n: u32,
}

impl OutPoint {
    pub fn new(hash: Uint256, n: u32) -> Self {
        OutPoint { hash, n }
    }

    /// The prevout of a coinbase input.
    pub fn null() -> Self {
        OutPoint {
            hash: Uint256::ZERO,
            n: u32::MAX,
        }
    }

    pub fn is_null(&self) -> bool {
        self.hash.is_zero() && self.n == u32::MAX
    }
}

impl Default for OutPoint {
    fn default() -> Self {
        OutPoint::null()
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.hash, self.n)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIn {
    pub prevout: OutPoint,
    pub script_sig: Script,
    pub sequence: u32,
    #[serde(default)]
    pub witness: Witness,
}

impl TxIn {
    pub fn new(prevout: OutPoint, script_sig: Script) -> Self {
        TxIn {
            prevout,
            script_sig,
            sequence: u32::MAX,
            witness: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    pub value: i64,
    pub script_pubkey: Script,
}

impl TxOut {
    pub fn new(value: i64, script_pubkey: Script) -> Self {
        TxOut { value, script_pubkey }
    }

    /// Placeholder output used by legacy SIGHASH_SINGLE: value -1, empty script.
    pub fn null() -> Self {
        TxOut {
            value: -1,
            script_pubkey: Script::new(),
        }
    }

    /// Empty output marking a coinstake (first output).
    pub fn is_empty(&self) -> bool {
        self.value == 0 && self.script_pubkey.is_empty()
    }
}

/// Transaction. Hashes are recomputed on every call; nothing is cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
}

impl Transaction {
    /// Id over the serialization without witness data.
    pub fn txid(&self) -> Uint256 {
        serialization::hash_of(self, SerializationContext::hash())
    }

    /// Id over the serialization including witness data.
    pub fn wtxid(&self) -> Uint256 {
        serialization::hash_of(self, SerializationContext::hash().with_witness())
    }

    pub fn has_witness(&self) -> bool {
        self.inputs.iter().any(|input| !input.witness.is_empty())
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].prevout.is_null()
    }

    /// Coinstake: spends at least one real input and starts with an empty marker output.
    pub fn is_coinstake(&self) -> bool {
        !self.inputs.is_empty()
            && !self.inputs[0].prevout.is_null()
            && self.outputs.len() >= 2
            && self.outputs[0].is_empty()
    }

    /// Sum of output values; `None` on overflow.
    pub fn total_out(&self) -> Option<i64> {
        self.outputs.iter().try_fold(0i64, |acc, o| acc.checked_add(o.value))
    }

    pub fn base_size(&self) -> usize {
        serialization::serialized_size(self, SerializationContext::network().without_witness())
    }

    pub fn total_size(&self) -> usize {
        serialization::serialized_size(self, SerializationContext::network())
    }

    /// BIP141 weight: base size * 3 + total size.
    pub fn weight(&self) -> usize {
        self.base_size() * (crate::constants::WITNESS_SCALE_FACTOR - 1) + self.total_size()
    }
}

/// 80-byte block header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: i32,
    pub prev_block_hash: Uint256,
    pub merkle_root: Uint256,
    pub time: u32,
    pub bits: u32,
    pub nonce: u32,
}

impl BlockHeader {
    /// Double-SHA256 of the serialized header.
    pub fn hash(&self) -> Uint256 {
        serialization::hash_of(self, SerializationContext::hash())
    }
}

/// Block: header, transactions and (proof-of-stake networks) the block signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub signature: Vec<u8>,
}

impl Block {
    pub fn hash(&self) -> Uint256 {
        self.header.hash()
    }

    /// Proof-of-stake blocks carry a coinstake as their second transaction.
    pub fn is_proof_of_stake(&self) -> bool {
        self.transactions.len() > 1 && self.transactions[1].is_coinstake()
    }

    pub fn is_proof_of_work(&self) -> bool {
        !self.is_proof_of_stake()
    }
}

/// Spendable output as returned by a coin view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub output: TxOut,
    /// Height of the block that created the output
    pub height: u32,
    pub is_coinbase: bool,
    pub is_coinstake: bool,
    /// Timestamp of the block that created the output
    pub time: u32,
    /// Redeem or witness script, when the output is script-hashed
    #[serde(default)]
    pub redeem_script: Option<Script>,
}

impl Coin {
    pub fn new(output: TxOut, height: u32) -> Self {
        Coin {
            output,
            height,
            is_coinbase: false,
            is_coinstake: false,
            time: 0,
            redeem_script: None,
        }
    }

    pub fn with_redeem_script(mut self, redeem_script: Script) -> Self {
        self.redeem_script = Some(redeem_script);
        self
    }

    /// Script that a signature over this coin commits to.
    ///
    /// Pay-to-witness-key-hash programs are expanded to the equivalent
    /// pay-to-key-hash script.
    pub fn script_code(&self) -> Script {
        let script = self.redeem_script.as_ref().unwrap_or(&self.output.script_pubkey);
        match script.witness_program() {
            Some((0, program)) if program.len() == 20 => Builder::new()
                .push_opcode(OP_DUP)
                .push_opcode(OP_HASH160)
                .push_slice(program)
                .push_opcode(OP_EQUALVERIFY)
                .push_opcode(OP_CHECKSIG)
                .into_script(),
            _ => script.clone(),
        }
    }

    /// Signature hash scheme used when spending this coin.
    pub fn hash_version(&self) -> crate::sighash::HashVersion {
        let spk = &self.output.script_pubkey;
        let witness = spk.is_witness_program()
            || (spk.is_p2sh()
                && self
                    .redeem_script
                    .as_ref()
                    .map_or(false, |redeem| redeem.is_witness_program() || redeem_is_witness_script(spk, redeem)));
        if witness {
            crate::sighash::HashVersion::WitnessV0
        } else {
            crate::sighash::HashVersion::Original
        }
    }
}

/// P2WSH nested in P2SH: the redeem script is the witness script behind the nested program.
fn redeem_is_witness_script(p2sh: &Script, redeem: &Script) -> bool {
    let program = Builder::new().push_opcode(OP_0).push_slice(redeem.sha256().as_bytes()).into_script();
    &p2sh.as_bytes()[2..22] == program.hash160().as_bytes()
}

/// Double-SHA256 of arbitrary bytes, as a `Uint256`.
pub fn hash256(data: &[u8]) -> Uint256 {
    Uint256::from_bytes(crypto::sha256d(data))
}
