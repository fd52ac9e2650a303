//! Standard script templates
//!
//! Templates are recognized by matching the decoded operation sequence; a
//! script never carries its template as a tag. Destinations are a closed enum
//! with free functions to build and extract them.

use crate::opcodes::*;
use crate::script::{Builder, Op, Script};
use crate::types::{Uint160, Uint256};
use serde::{Deserialize, Serialize};

/// Where a standard output pays to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxDestination {
    /// Pay-to-PubKey-Hash
    KeyHash(Uint160),
    /// Pay-to-Witness-PubKey-Hash
    WitnessKeyHash(Uint160),
    /// Pay-to-Script-Hash
    ScriptHash(Uint160),
    /// Pay-to-Witness-Script-Hash
    WitnessScriptHash(Uint256),
}

/// Recognized locking script shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptType {
    NonStandard,
    /// Pay-to-PubKey (legacy)
    PubKey,
    PubKeyHash,
    ScriptHash,
    /// Bare M-of-N multisig
    Multisig,
    /// OP_RETURN data carrier
    NullData,
    WitnessV0KeyHash,
    WitnessV0ScriptHash,
    /// Witness program with a version not yet defined
    WitnessUnknown,
    /// Hot/cold key pair gated by OP_CHECKCOLDSTAKEVERIFY
    ColdStaking,
}

impl ScriptType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptType::NonStandard => "nonstandard",
            ScriptType::PubKey => "pubkey",
            ScriptType::PubKeyHash => "pubkeyhash",
            ScriptType::ScriptHash => "scripthash",
            ScriptType::Multisig => "multisig",
            ScriptType::NullData => "nulldata",
            ScriptType::WitnessV0KeyHash => "witness_v0_keyhash",
            ScriptType::WitnessV0ScriptHash => "witness_v0_scripthash",
            ScriptType::WitnessUnknown => "witness_unknown",
            ScriptType::ColdStaking => "coldstaking",
        }
    }
}

fn is_pubkey_len(len: usize) -> bool {
    len == 33 || len == 65
}

/// Classifies a locking script.
pub fn classify(script: &Script) -> ScriptType {
    if script.is_p2sh() {
        return ScriptType::ScriptHash;
    }
    if let Some((version, program)) = script.witness_program() {
        return match (version, program.len()) {
            (0, 20) => ScriptType::WitnessV0KeyHash,
            (0, 32) => ScriptType::WitnessV0ScriptHash,
            (0, _) => ScriptType::NonStandard,
            _ => ScriptType::WitnessUnknown,
        };
    }
    if script.as_bytes().first() == Some(&OP_RETURN) && Script::from_bytes(script.as_bytes()[1..].to_vec()).is_push_only()
    {
        return ScriptType::NullData;
    }
    if extract_pubkey(script).is_some() {
        return ScriptType::PubKey;
    }
    if extract_key_hash(script).is_some() {
        return ScriptType::PubKeyHash;
    }
    if extract_multisig(script).is_some() {
        return ScriptType::Multisig;
    }
    if extract_cold_staking(script).is_some() {
        return ScriptType::ColdStaking;
    }
    ScriptType::NonStandard
}

/// `<pubkey> OP_CHECKSIG`
pub fn pay_to_pubkey(pubkey: &[u8]) -> Script {
    Builder::new().push_slice(pubkey).push_opcode(OP_CHECKSIG).into_script()
}

pub fn extract_pubkey(script: &Script) -> Option<&[u8]> {
    let ops: Vec<Op<'_>> = script.ops().map(|(_, op)| op).collect();
    match ops.as_slice() {
        [Op::Push { data, .. }, Op::Code(OP_CHECKSIG)] if is_pubkey_len(data.len()) => Some(*data),
        _ => None,
    }
}

/// `OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG`
pub fn pay_to_key_hash(hash: &Uint160) -> Script {
    Builder::new()
        .push_opcode(OP_DUP)
        .push_opcode(OP_HASH160)
        .push_slice(hash.as_bytes())
        .push_opcode(OP_EQUALVERIFY)
        .push_opcode(OP_CHECKSIG)
        .into_script()
}

fn extract_key_hash(script: &Script) -> Option<Uint160> {
    let b = script.as_bytes();
    if b.len() == 25 && b[0] == OP_DUP && b[1] == OP_HASH160 && b[2] == 0x14 && b[23] == OP_EQUALVERIFY && b[24] == OP_CHECKSIG
    {
        Uint160::from_slice(&b[3..23])
    } else {
        None
    }
}

/// `OP_M <pubkey>... OP_N OP_CHECKMULTISIG`
pub fn multisig_script(required: u8, pubkeys: &[Vec<u8>]) -> Script {
    let mut builder = Builder::new().push_opcode(encode_small_int(required));
    for pubkey in pubkeys {
        builder = builder.push_slice(pubkey);
    }
    builder
        .push_opcode(encode_small_int(pubkeys.len() as u8))
        .push_opcode(OP_CHECKMULTISIG)
        .into_script()
}

/// Required signature count and the public keys of a bare multisig script.
pub fn extract_multisig(script: &Script) -> Option<(u8, Vec<&[u8]>)> {
    let ops: Vec<Op<'_>> = script.ops().map(|(_, op)| op).collect();
    let (first, rest) = ops.split_first()?;
    let (last, rest) = rest.split_last()?;
    let (count, keys) = rest.split_last()?;
    if *last != Op::Code(OP_CHECKMULTISIG) {
        return None;
    }
    let required = match first {
        Op::Code(opcode) => decode_small_int(*opcode).filter(|n| *n >= 1)?,
        _ => return None,
    };
    let total = match count {
        Op::Code(opcode) => decode_small_int(*opcode)?,
        _ => return None,
    };
    let mut pubkeys = Vec::with_capacity(keys.len());
    for op in keys {
        match op {
            Op::Push { data, .. } if is_pubkey_len(data.len()) => pubkeys.push(*data),
            _ => return None,
        }
    }
    if pubkeys.len() != total as usize || required > total {
        return None;
    }
    Some((required, pubkeys))
}

/// `OP_DUP OP_HASH160 OP_ROT OP_IF OP_CHECKCOLDSTAKEVERIFY <hot> OP_ELSE <cold> OP_ENDIF OP_EQUALVERIFY OP_CHECKSIG`
///
/// The hot key may only spend into a coinstake; the cold key spends freely.
/// Spent with `<sig> <1> <hot pubkey>` or `<sig> <0> <cold pubkey>`.
pub fn cold_staking_script(hot_key_hash: &Uint160, cold_key_hash: &Uint160) -> Script {
    Builder::new()
        .push_opcode(OP_DUP)
        .push_opcode(OP_HASH160)
        .push_opcode(OP_ROT)
        .push_opcode(OP_IF)
        .push_opcode(OP_CHECKCOLDSTAKEVERIFY)
        .push_slice(hot_key_hash.as_bytes())
        .push_opcode(OP_ELSE)
        .push_slice(cold_key_hash.as_bytes())
        .push_opcode(OP_ENDIF)
        .push_opcode(OP_EQUALVERIFY)
        .push_opcode(OP_CHECKSIG)
        .into_script()
}

/// Hot and cold key hashes of a cold-staking script.
pub fn extract_cold_staking(script: &Script) -> Option<(Uint160, Uint160)> {
    let ops: Vec<Op<'_>> = script.ops().map(|(_, op)| op).collect();
    match ops.as_slice() {
        [Op::Code(OP_DUP), Op::Code(OP_HASH160), Op::Code(OP_ROT), Op::Code(OP_IF), Op::Code(OP_CHECKCOLDSTAKEVERIFY), Op::Push { data: hot, .. }, Op::Code(OP_ELSE), Op::Push { data: cold, .. }, Op::Code(OP_ENDIF), Op::Code(OP_EQUALVERIFY), Op::Code(OP_CHECKSIG)] => {
            Some((Uint160::from_slice(hot)?, Uint160::from_slice(cold)?))
        }
        _ => None,
    }
}

pub fn is_cold_staking(script: &Script) -> bool {
    extract_cold_staking(script).is_some()
}

/// `OP_RETURN <data>`
pub fn null_data(data: &[u8]) -> Script {
    Builder::new().push_opcode(OP_RETURN).push_slice(data).into_script()
}

/// Locking script paying to `destination`.
pub fn script_for_destination(destination: &TxDestination) -> Script {
    match destination {
        TxDestination::KeyHash(hash) => pay_to_key_hash(hash),
        TxDestination::ScriptHash(hash) => Builder::new()
            .push_opcode(OP_HASH160)
            .push_slice(hash.as_bytes())
            .push_opcode(OP_EQUAL)
            .into_script(),
        TxDestination::WitnessKeyHash(hash) => Builder::new().push_opcode(OP_0).push_slice(hash.as_bytes()).into_script(),
        TxDestination::WitnessScriptHash(hash) => {
            Builder::new().push_opcode(OP_0).push_slice(hash.as_bytes()).into_script()
        }
    }
}

/// Destination of a single-destination locking script. Pay-to-pubkey
/// resolves to the key's hash.
pub fn extract_destination(script: &Script) -> Option<TxDestination> {
    if script.is_p2sh() {
        return Uint160::from_slice(&script.as_bytes()[2..22]).map(TxDestination::ScriptHash);
    }
    if let Some((0, program)) = script.witness_program() {
        return match program.len() {
            20 => Uint160::from_slice(program).map(TxDestination::WitnessKeyHash),
            32 => Uint256::from_slice(program).map(TxDestination::WitnessScriptHash),
            _ => None,
        };
    }
    if let Some(hash) = extract_key_hash(script) {
        return Some(TxDestination::KeyHash(hash));
    }
    extract_pubkey(script).map(|pubkey| TxDestination::KeyHash(Uint160::from_bytes(crate::crypto::hash160(pubkey))))
}
