//! Transaction validation
//!
//! Stateless checks (`check_transaction`), lock-time finality, BIP68 relative
//! lock times, input value accounting and signature-operation cost. None of
//! these functions look anything up: coins and chain position are handed in.

use crate::chain::ChainedHeader;
use crate::config::ConsensusParams;
use crate::constants::*;
use crate::economic::money_range;
use crate::error::{ConsensusError, Result};
use crate::interpreter::ScriptVerify;
use crate::script::Script;
use crate::types::*;
use bitflags::bitflags;
use std::collections::HashSet;

bitflags! {
    /// Lock-time rules in force for a block.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LockTimeFlags: u32 {
        /// Enforce BIP68 relative lock times
        const VERIFY_SEQUENCE = 1 << 0;
        /// Compare time locks against median time past (BIP113)
        const MEDIAN_TIME_PAST = 1 << 1;
    }
}

/// CheckTransaction: 𝒯𝒳 → {valid, invalid}
///
/// A transaction tx = (v, ins, outs, lt) is valid if and only if:
/// 1. |ins| > 0 ∧ |outs| > 0
/// 2. weight of the stripped serialization ≤ max block weight
/// 3. ∀o ∈ outs: 0 ≤ o.value ≤ M_max and Σ o.value ≤ M_max
/// 4. no prevout is spent twice
/// 5. coinbase: 2 ≤ |scriptSig| ≤ 100; otherwise no prevout is null
pub fn check_transaction(tx: &Transaction, params: &ConsensusParams) -> Result<()> {
    if tx.inputs.is_empty() {
        return Err(ConsensusError::BadTransactionNoInput);
    }
    if tx.outputs.is_empty() {
        return Err(ConsensusError::BadTransactionNoOutput);
    }
    if tx.base_size() * params.witness_scale_factor > params.max_block_weight {
        return Err(ConsensusError::BadTransactionOversize);
    }

    let mut value_out = 0i64;
    for output in &tx.outputs {
        if output.value < 0 {
            return Err(ConsensusError::BadTransactionNegativeOutput);
        }
        if output.value > params.max_money {
            return Err(ConsensusError::BadTransactionTooLargeOutput);
        }
        value_out += output.value;
        if !params.money_range(value_out) {
            return Err(ConsensusError::BadTransactionTooLargeTotalOutput);
        }
    }

    let mut seen = HashSet::with_capacity(tx.inputs.len());
    for input in &tx.inputs {
        if !seen.insert(input.prevout) {
            return Err(ConsensusError::BadTransactionDuplicateInputs);
        }
    }

    if tx.is_coinbase() {
        let len = tx.inputs[0].script_sig.len();
        if !(MIN_COINBASE_SCRIPT_SIZE..=MAX_COINBASE_SCRIPT_SIZE).contains(&len) {
            return Err(ConsensusError::BadCoinbaseSize);
        }
    } else if tx.inputs.iter().any(|input| input.prevout.is_null()) {
        return Err(ConsensusError::BadTransactionNullPrevout);
    }
    Ok(())
}

/// IsFinalTx: 𝒯𝒳 × ℕ × ℕ → {true, false}
///
/// 1. lock_time = 0: final
/// 2. lock_time below the threshold is a height, otherwise a time; if it is
///    already past (`< height` or `< time`): final
/// 3. Otherwise final only if every input has a final sequence number
pub fn is_final_tx(tx: &Transaction, height: u32, block_time: i64) -> bool {
    if tx.lock_time == 0 {
        return true;
    }
    let cutoff = if tx.lock_time < LOCKTIME_THRESHOLD {
        height as i64
    } else {
        block_time
    };
    if (tx.lock_time as i64) < cutoff {
        return true;
    }
    tx.inputs.iter().all(|input| input.sequence == SEQUENCE_FINAL)
}

/// Earliest (height, time) at which a transaction may be included, each
/// expressed as the last value that is still too early (-1 = no constraint).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceLock {
    pub min_height: i64,
    pub min_time: i64,
}

/// CalculateSequenceLocks: 𝒯𝒳 × flags × heights × block → lock
///
/// `prev_heights[i]` is the height of the coin spent by input i; `block` is
/// the chained header of the block the transaction is in.
/// 1. Version < 2 or `VERIFY_SEQUENCE` off: no constraint
/// 2. Inputs with the disable flag set contribute nothing
/// 3. Type flag set: coin MTP + (value << 9) − 1 seconds, MTP taken at the
///    block before the coin's
/// 4. Otherwise: coin height + value − 1
pub fn calculate_sequence_locks(
    tx: &Transaction,
    flags: LockTimeFlags,
    prev_heights: &[u32],
    block: &ChainedHeader,
) -> SequenceLock {
    let mut lock = SequenceLock {
        min_height: -1,
        min_time: -1,
    };
    if tx.version < 2 || !flags.contains(LockTimeFlags::VERIFY_SEQUENCE) {
        return lock;
    }

    for (input, &coin_height) in tx.inputs.iter().zip(prev_heights) {
        if input.sequence & SEQUENCE_LOCKTIME_DISABLE_FLAG != 0 {
            continue;
        }
        let value = (input.sequence & SEQUENCE_LOCKTIME_MASK) as i64;
        if input.sequence & SEQUENCE_LOCKTIME_TYPE_FLAG != 0 {
            let coin_time = block
                .ancestor(coin_height.saturating_sub(1))
                .map_or(0, |ancestor| ancestor.median_time_past()) as i64;
            lock.min_time = lock
                .min_time
                .max(coin_time + (value << SEQUENCE_LOCKTIME_GRANULARITY) - 1);
        } else {
            lock.min_height = lock.min_height.max(coin_height as i64 + value - 1);
        }
    }
    lock
}

/// EvaluateSequenceLocks: block × lock → {true, false}
///
/// Satisfied when the block is above `min_height` and the median time past of
/// its parent is above `min_time`.
pub fn evaluate_sequence_locks(block: &ChainedHeader, lock: SequenceLock) -> bool {
    let block_time = block
        .previous
        .as_deref()
        .map_or(0, |previous| previous.median_time_past()) as i64;
    lock.min_height < block.height as i64 && lock.min_time < block_time
}

pub fn sequence_locks(tx: &Transaction, flags: LockTimeFlags, prev_heights: &[u32], block: &ChainedHeader) -> bool {
    evaluate_sequence_locks(block, calculate_sequence_locks(tx, flags, prev_heights, block))
}

/// CheckTxInputs: 𝒯𝒳 × coins × ℕ → fee
///
/// `coins[i]` is the coin spent by input i, already looked up.
/// 1. Coinbase and coinstake outputs must have matured: spend height − coin height ≥ maturity
/// 2. Every input value and the running total stay within the money range
/// 3. Except for coinstakes (which mint their reward), Σ in ≥ Σ out and the
///    fee Σ in − Σ out lies within the money range
///
/// Returns the fee; zero for coinstakes.
pub fn check_tx_inputs(tx: &Transaction, coins: &[Coin], spend_height: u32, params: &ConsensusParams) -> Result<i64> {
    let coinstake_maturity = params
        .pos
        .as_ref()
        .map_or(params.coinbase_maturity, |pos| pos.coinstake_maturity);

    let mut value_in = 0i64;
    for coin in coins {
        let depth = spend_height.saturating_sub(coin.height);
        if coin.is_coinbase && depth < params.coinbase_maturity {
            return Err(ConsensusError::BadTransactionPrematureCoinbaseSpending);
        }
        if coin.is_coinstake && depth < coinstake_maturity {
            return Err(ConsensusError::BadTransactionPrematureCoinstakeSpending);
        }
        value_in = value_in
            .checked_add(coin.output.value)
            .filter(|total| money_range(coin.output.value) && params.money_range(*total))
            .ok_or(ConsensusError::BadTransactionInputValueOutOfRange)?;
    }

    if tx.is_coinstake() {
        return Ok(0);
    }

    let value_out = tx.total_out().ok_or(ConsensusError::BadTransactionTooLargeTotalOutput)?;
    if value_in < value_out {
        return Err(ConsensusError::BadTransactionInBelowOut);
    }
    let fee = value_in - value_out;
    if fee < 0 {
        return Err(ConsensusError::BadTransactionNegativeFee);
    }
    if !params.money_range(fee) {
        return Err(ConsensusError::BadTransactionFeeOutOfRange);
    }
    Ok(fee)
}

/// Legacy (inaccurate) sig-op count over every scriptSig and scriptPubKey.
pub fn legacy_sig_op_count(tx: &Transaction) -> u64 {
    let inputs: u64 = tx.inputs.iter().map(|input| input.script_sig.sig_op_count(false) as u64).sum();
    let outputs: u64 = tx.outputs.iter().map(|output| output.script_pubkey.sig_op_count(false) as u64).sum();
    inputs + outputs
}

/// Accurate sig-ops of the redeem scripts of pay-to-script-hash inputs.
pub fn p2sh_sig_op_count(tx: &Transaction, coins: &[Coin]) -> u64 {
    if tx.is_coinbase() {
        return 0;
    }
    tx.inputs
        .iter()
        .zip(coins)
        .filter(|(_, coin)| coin.output.script_pubkey.is_p2sh())
        .map(|(input, coin)| coin.output.script_pubkey.p2sh_sig_op_count(&input.script_sig) as u64)
        .sum()
}

fn witness_program_sig_ops(version: u8, program: &[u8], witness: &Witness) -> u64 {
    match (version, program.len()) {
        (0, 20) => 1,
        (0, 32) => witness
            .last()
            .map_or(0, |script| Script::from_bytes(script.clone()).sig_op_count(true) as u64),
        _ => 0,
    }
}

/// Sig-ops executed by a witness spend, direct or nested in P2SH.
pub fn witness_sig_op_count(script_sig: &Script, script_pubkey: &Script, witness: &Witness, flags: ScriptVerify) -> u64 {
    if !flags.contains(ScriptVerify::WITNESS) {
        return 0;
    }
    if let Some((version, program)) = script_pubkey.witness_program() {
        return witness_program_sig_ops(version, program, witness);
    }
    if script_pubkey.is_p2sh() && script_sig.is_push_only() {
        if let Some(redeem) = script_sig.last_push() {
            let redeem = Script::from_bytes(redeem.to_vec());
            if let Some((version, program)) = redeem.witness_program() {
                return witness_program_sig_ops(version, program, witness);
            }
        }
    }
    0
}

/// GetTransactionSigOpCost: legacy and P2SH sig-ops count four times, witness sig-ops once.
pub fn transaction_sig_op_cost(tx: &Transaction, coins: &[Coin], flags: ScriptVerify) -> u64 {
    let mut cost = legacy_sig_op_count(tx) * WITNESS_SCALE_FACTOR as u64;
    if tx.is_coinbase() {
        return cost;
    }
    if flags.contains(ScriptVerify::P2SH) {
        cost += p2sh_sig_op_count(tx, coins) * WITNESS_SCALE_FACTOR as u64;
    }
    for (input, coin) in tx.inputs.iter().zip(coins) {
        cost += witness_sig_op_count(&input.script_sig, &coin.output.script_pubkey, &input.witness, flags);
    }
    cost
}
