//! Block-level checks
//!
//! Size and weight limits, coinbase placement, the BIP34 height commitment,
//! BIP30 duplicate protection and the coinbase/coinstake reward bounds. The
//! rule pipeline in `rules` decides when each of these runs.

use crate::chain::CoinView;
use crate::config::ConsensusParams;
use crate::error::{ConsensusError, Result};
use crate::script::{Builder, Script};
use crate::serialization::{self, SerializationContext};
use crate::transaction::legacy_sig_op_count;
use crate::types::*;

/// Serialized size without witness data.
pub fn block_base_size(block: &Block) -> usize {
    serialization::serialized_size(block, SerializationContext::network().without_witness())
}

/// Serialized size with witness data.
pub fn block_total_size(block: &Block) -> usize {
    serialization::serialized_size(block, SerializationContext::network())
}

/// GetBlockWeight: ℬ → ℕ
///
/// weight = base size × (scale − 1) + total size
pub fn get_block_weight(block: &Block, params: &ConsensusParams) -> usize {
    block_base_size(block) * (params.witness_scale_factor - 1) + block_total_size(block)
}

/// CheckBlockSize: a block has transactions, and neither the transaction
/// count nor the stripped size, scaled, exceeds the weight limit.
pub fn check_block_size(block: &Block, params: &ConsensusParams) -> Result<()> {
    let scale = params.witness_scale_factor;
    if block.transactions.is_empty()
        || block.transactions.len() * scale > params.max_block_weight
        || block_base_size(block) * scale > params.max_block_weight
    {
        return Err(ConsensusError::BadBlockLength);
    }
    Ok(())
}

pub fn check_block_weight(block: &Block, params: &ConsensusParams) -> Result<()> {
    if get_block_weight(block, params) > params.max_block_weight {
        return Err(ConsensusError::BadBlockWeight);
    }
    Ok(())
}

/// EnsureCoinbase: the first transaction, and only the first, is a coinbase.
pub fn check_coinbase_placement(block: &Block) -> Result<()> {
    match block.transactions.first() {
        Some(first) if first.is_coinbase() => {}
        _ => return Err(ConsensusError::BadCoinbaseMissing),
    }
    if block.transactions.iter().skip(1).any(Transaction::is_coinbase) {
        return Err(ConsensusError::BadMultipleCoinbase);
    }
    Ok(())
}

/// Prefix a BIP34 coinbase scriptSig must start with: the height as a script number push.
pub fn coinbase_height_prefix(height: u32) -> Script {
    Builder::new().push_int(height as i64).into_script()
}

/// CheckCoinbaseHeight: the coinbase scriptSig begins with the block height.
pub fn check_coinbase_height(block: &Block, height: u32) -> Result<()> {
    let expected = coinbase_height_prefix(height);
    let script_sig = block
        .transactions
        .first()
        .and_then(|coinbase| coinbase.inputs.first())
        .map(|input| input.script_sig.as_bytes())
        .ok_or(ConsensusError::BadCoinbaseMissing)?;
    if !script_sig.starts_with(expected.as_bytes()) {
        return Err(ConsensusError::BadCoinbaseHeight);
    }
    Ok(())
}

/// Legacy sig-ops of every transaction in the block.
pub fn block_legacy_sig_op_count(block: &Block) -> u64 {
    block.transactions.iter().map(legacy_sig_op_count).sum()
}

/// BIP30: no transaction may recreate an output that is still unspent.
pub fn check_bip30(block: &Block, coin_view: &dyn CoinView) -> Result<()> {
    for tx in &block.transactions {
        let txid = tx.txid();
        for n in 0..tx.outputs.len() as u32 {
            if coin_view.try_get_unspent(&OutPoint::new(txid, n)).is_some() {
                return Err(ConsensusError::BadTransactionBip30);
            }
        }
    }
    Ok(())
}

/// CheckBlockReward: the coinbase of a proof-of-work block pays at most
/// fees + reward.
pub fn check_coinbase_reward(block: &Block, fees: i64, reward: i64) -> Result<()> {
    let paid = block
        .transactions
        .first()
        .and_then(Transaction::total_out)
        .ok_or(ConsensusError::BadCoinbaseAmount)?;
    if paid > fees.saturating_add(reward) {
        return Err(ConsensusError::BadCoinbaseAmount);
    }
    Ok(())
}

/// CheckStakeReward: a coinstake mints at most fees + reward over what it spends.
pub fn check_coinstake_reward(minted: i64, fees: i64, reward: i64) -> Result<()> {
    if minted > fees.saturating_add(reward) {
        return Err(ConsensusError::BadCoinstakeAmount);
    }
    Ok(())
}

/// New coins created by `tx` at `height` in a block with timestamp `time`.
pub fn created_coins(tx: &Transaction, height: u32, time: u32) -> Vec<(OutPoint, Coin)> {
    let txid = tx.txid();
    let is_coinbase = tx.is_coinbase();
    let is_coinstake = tx.is_coinstake();
    tx.outputs
        .iter()
        .enumerate()
        .filter(|(_, output)| !output.script_pubkey.is_unspendable())
        .map(|(n, output)| {
            let coin = Coin {
                output: output.clone(),
                height,
                is_coinbase,
                is_coinstake,
                time,
                redeem_script: None,
            };
            (OutPoint::new(txid, n as u32), coin)
        })
        .collect()
}
