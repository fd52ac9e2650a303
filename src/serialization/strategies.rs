//! Proptest strategies for the wire structures.

use crate::script::Script;
use crate::types::*;
use proptest::prelude::*;

/// Byte lengths where a VarInt prefix changes width, plus the largest push.
pub const BOUNDARY_LENGTHS: [usize; 6] = [0, 0xfc, 0xfd, 0xfe, 0x100, 520];

pub fn create_hash_strategy() -> impl Strategy<Value = Uint256> {
    any::<[u8; 32]>().prop_map(Uint256::from_bytes)
}

pub fn create_script_strategy() -> impl Strategy<Value = Script> {
    prop_oneof![
        3 => prop::collection::vec(any::<u8>(), 0..64),
        1 => prop::sample::select(BOUNDARY_LENGTHS.to_vec())
            .prop_flat_map(|len| prop::collection::vec(any::<u8>(), len)),
    ]
    .prop_map(Script::from_bytes)
}

pub fn create_witness_strategy() -> impl Strategy<Value = Witness> {
    prop::collection::vec(prop::collection::vec(any::<u8>(), 0..80), 0..4)
}

pub fn create_txin_strategy() -> impl Strategy<Value = TxIn> {
    (
        create_hash_strategy(),
        any::<u32>(),
        create_script_strategy(),
        any::<u32>(),
        create_witness_strategy(),
    )
        .prop_map(|(hash, n, script_sig, sequence, witness)| TxIn {
            prevout: OutPoint::new(hash, n),
            script_sig,
            sequence,
            witness,
        })
}

pub fn create_txout_strategy() -> impl Strategy<Value = TxOut> {
    (any::<i64>(), create_script_strategy()).prop_map(|(value, script)| TxOut::new(value, script))
}

/// Transactions with at least one input; an empty input list would read
/// back as a witness marker.
pub fn create_transaction_strategy() -> impl Strategy<Value = Transaction> {
    (
        any::<i32>(),
        prop::collection::vec(create_txin_strategy(), 1..4),
        prop::collection::vec(create_txout_strategy(), 0..4),
        any::<u32>(),
    )
        .prop_map(|(version, inputs, outputs, lock_time)| Transaction {
            version,
            inputs,
            outputs,
            lock_time,
        })
}

pub fn create_header_strategy() -> impl Strategy<Value = BlockHeader> {
    (
        any::<i32>(),
        create_hash_strategy(),
        create_hash_strategy(),
        any::<u32>(),
        any::<u32>(),
        any::<u32>(),
    )
        .prop_map(|(version, prev_block_hash, merkle_root, time, bits, nonce)| BlockHeader {
            version,
            prev_block_hash,
            merkle_root,
            time,
            bits,
            nonce,
        })
}

pub fn create_block_strategy() -> impl Strategy<Value = Block> {
    (
        create_header_strategy(),
        prop::collection::vec(create_transaction_strategy(), 0..4),
        prop::collection::vec(any::<u8>(), 0..80),
    )
        .prop_map(|(header, transactions, signature)| Block {
            header,
            transactions,
            signature,
        })
}

/// `tx` as it reads back from a stream that carries no witness data.
pub fn strip_witness(mut tx: Transaction) -> Transaction {
    for input in &mut tx.inputs {
        input.witness.clear();
    }
    tx
}
