//! Merkle roots over transaction ids
//!
//! An odd level duplicates its last hash, which makes `[a, b, c]` and
//! `[a, b, c, c]` share a root (CVE-2012-2459). The builder reports any level
//! containing an equal adjacent pair as mutated so the caller can reject the
//! block even though the root matches.

use crate::types::{Block, Uint256};

fn hash_pair(left: &Uint256, right: &Uint256) -> Uint256 {
    let mut preimage = [0u8; 64];
    preimage[..32].copy_from_slice(left.as_bytes());
    preimage[32..].copy_from_slice(right.as_bytes());
    crate::types::hash256(&preimage)
}

/// Root over `hashes` and whether any level held a duplicated pair.
/// An empty list has root zero.
pub fn compute_merkle_root(mut hashes: Vec<Uint256>) -> (Uint256, bool) {
    let mut mutated = false;
    while hashes.len() > 1 {
        for pos in (0..hashes.len() - 1).step_by(2) {
            if hashes[pos] == hashes[pos + 1] {
                mutated = true;
            }
        }
        if hashes.len() % 2 == 1 {
            let last = hashes[hashes.len() - 1];
            hashes.push(last);
        }
        let next: Vec<Uint256> = hashes
            .chunks_exact(2)
            .map(|pair| hash_pair(&pair[0], &pair[1]))
            .collect();
        hashes = next;
    }
    (hashes.first().copied().unwrap_or(Uint256::ZERO), mutated)
}

/// Merkle root over the block's transaction ids.
pub fn block_merkle_root(block: &Block) -> (Uint256, bool) {
    compute_merkle_root(block.transactions.iter().map(|tx| tx.txid()).collect())
}

/// Merkle root over witness ids, the coinbase's counted as zero.
pub fn block_witness_merkle_root(block: &Block) -> (Uint256, bool) {
    let leaves = block
        .transactions
        .iter()
        .enumerate()
        .map(|(i, tx)| if i == 0 { Uint256::ZERO } else { tx.wtxid() })
        .collect();
    compute_merkle_root(leaves)
}
