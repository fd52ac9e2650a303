//! Proof-of-stake rules
//!
//! Only registered on networks with proof-of-stake parameters.

use super::{ConsensusRule, RuleContext, RuleEnv, StatefulRule, StatelessRule};
use crate::chain::CoinView;
use crate::config::PosParams;
use crate::error::{ConsensusError, Result, ValidationError};
use crate::segwit;
use crate::stake::{self, BlockStake};
use crate::standard;
use crate::types::{Transaction, TxOut};

fn pos_params<'a>(env: &RuleEnv<'a>) -> Result<&'a PosParams> {
    env.params.pos.as_ref().ok_or(ConsensusError::BadStakeBlock)
}

/// Block kind is allowed at this height and the transactions fit it: no
/// proof-of-work after the last proof-of-work height, one coinstake at most,
/// and a proof-of-stake coinbase that pays nothing.
pub struct PosBlockTypeRule;

impl ConsensusRule for PosBlockTypeRule {
    fn name(&self) -> &'static str {
        "PosBlockTypeRule"
    }
}

impl StatelessRule for PosBlockTypeRule {
    fn check(&self, ctx: &RuleContext, env: &RuleEnv<'_>) -> Result<()> {
        let pos = pos_params(env)?;
        let block = &ctx.block;
        if block.is_proof_of_work() && ctx.height() > pos.last_pow_block {
            return Err(ConsensusError::ProofOfWorkTooHigh);
        }
        if block.transactions.iter().skip(2).any(Transaction::is_coinstake) {
            return Err(ConsensusError::BadMultipleCoinstake);
        }
        if block.is_proof_of_stake() {
            let commitment = segwit::witness_commitment_index(block);
            let coinbase = &block.transactions[0];
            let pays_nothing = coinbase.outputs.iter().enumerate().all(|(i, output)| {
                output.value == 0 && (output.script_pubkey.is_empty() || Some(i) == commitment)
            });
            if !pays_nothing {
                return Err(ConsensusError::BadStakeBlock);
            }
        }
        Ok(())
    }
}

pub struct PosBlockSignatureRule;

impl ConsensusRule for PosBlockSignatureRule {
    fn name(&self) -> &'static str {
        "PosBlockSignatureRule"
    }
}

impl StatelessRule for PosBlockSignatureRule {
    fn check(&self, ctx: &RuleContext, env: &RuleEnv<'_>) -> Result<()> {
        if !stake::check_block_signature(env.secp, &ctx.block) {
            return Err(ConsensusError::BadBlockSignature);
        }
        Ok(())
    }
}

/// Proof-of-stake block times sit on the timestamp mask, move forward from
/// the parent and stay within the drift allowed ahead of adjusted time.
pub struct PosTimeMaskRule;

impl ConsensusRule for PosTimeMaskRule {
    fn name(&self) -> &'static str {
        "PosTimeMaskRule"
    }
}

impl StatelessRule for PosTimeMaskRule {
    fn check(&self, ctx: &RuleContext, env: &RuleEnv<'_>) -> Result<()> {
        if !ctx.block.is_proof_of_stake() {
            return Ok(());
        }
        let pos = pos_params(env)?;
        let time = ctx.block.header.time;
        if !stake::check_stake_timestamp(time, pos.stake_timestamp_mask) {
            return Err(ConsensusError::StakeTimeViolation);
        }
        if let Some(prev) = ctx.previous() {
            if time <= prev.time() {
                return Err(ConsensusError::BlockTimestampTooEarly);
            }
        }
        if time as u64 > ctx.adjusted_time as u64 + pos.future_drift as u64 {
            return Err(ConsensusError::BlockTimestampTooFar);
        }
        Ok(())
    }
}

/// Only the coinstake may carry empty outputs, and a coinstake must pay
/// somewhere after its marker.
pub struct PosCoinstakeShapeRule;

impl ConsensusRule for PosCoinstakeShapeRule {
    fn name(&self) -> &'static str {
        "PosCoinstakeShapeRule"
    }
}

impl StatelessRule for PosCoinstakeShapeRule {
    fn check(&self, ctx: &RuleContext, _env: &RuleEnv<'_>) -> Result<()> {
        for tx in &ctx.block.transactions {
            if tx.is_coinbase() || tx.is_coinstake() {
                continue;
            }
            if tx.outputs.iter().any(TxOut::is_empty) {
                return Err(ConsensusError::NonCoinstake);
            }
        }
        if ctx.block.is_proof_of_stake() {
            let coinstake = &ctx.block.transactions[1];
            if coinstake.outputs[1..].iter().all(|output| output.script_pubkey.is_empty()) {
                return Err(ConsensusError::EmptyCoinstake);
            }
        }
        Ok(())
    }
}

/// Checks the stake kernel of proof-of-stake blocks and records the stake
/// data (modifier, entropy bit, proof hash) of every block.
pub struct CheckProofOfStakeRule;

impl ConsensusRule for CheckProofOfStakeRule {
    fn name(&self) -> &'static str {
        "CheckProofOfStakeRule"
    }
}

impl StatefulRule for CheckProofOfStakeRule {
    fn run(
        &self,
        ctx: &mut RuleContext,
        env: &RuleEnv<'_>,
        _coin_view: &dyn CoinView,
    ) -> std::result::Result<(), ValidationError> {
        let pos = pos_params(env)?;
        let hash = ctx.hash();
        let mut record = BlockStake::new(&ctx.block);

        if ctx.block.is_proof_of_stake() {
            let prev_stake = ctx
                .previous()
                .and_then(|prev| prev.stake.as_ref())
                .ok_or(ConsensusError::PrevStakeNull)?;
            let prevout = ctx.block.transactions[1].inputs[0].prevout;
            let coin = ctx
                .state
                .input_coins
                .get(1)
                .and_then(|coins| coins.first())
                .ok_or(ConsensusError::ReadTxPrevFailed)?;
            if ctx.height().saturating_sub(coin.height) < pos.stake_min_confirmations {
                return Err(ConsensusError::InvalidStakeDepth.into());
            }
            record.hash_proof =
                stake::check_stake_kernel_hash(prev_stake, ctx.block.header.bits, coin, &prevout, ctx.block.header.time)?;
            record.set_stake_modifier(stake::compute_stake_modifier_v2(Some(prev_stake), &prevout.hash), true);
        } else {
            let prev_stake = ctx.previous().and_then(|prev| prev.stake.as_ref());
            record.set_stake_modifier(stake::compute_stake_modifier_v2(prev_stake, &hash), true);
        }

        record.set_stake_entropy_bit(stake::stake_entropy_bit(&hash));
        ctx.state.stake = Some(record);
        Ok(())
    }
}

/// A coinstake staking a cold-staking coin keeps the stake under the same
/// script: every input spends it, every output pays back to it, and the
/// value does not shrink.
pub struct PosColdStakingRule;

impl ConsensusRule for PosColdStakingRule {
    fn name(&self) -> &'static str {
        "PosColdStakingRule"
    }
}

impl StatefulRule for PosColdStakingRule {
    fn run(
        &self,
        ctx: &mut RuleContext,
        _env: &RuleEnv<'_>,
        _coin_view: &dyn CoinView,
    ) -> std::result::Result<(), ValidationError> {
        if !ctx.block.is_proof_of_stake() {
            return Ok(());
        }
        let coins = match ctx.state.input_coins.get(1) {
            Some(coins) if !coins.is_empty() => coins,
            _ => return Ok(()),
        };
        let script = &coins[0].output.script_pubkey;
        if !standard::is_cold_staking(script) {
            return Ok(());
        }
        if coins.iter().any(|coin| coin.output.script_pubkey != *script) {
            return Err(ConsensusError::BadColdstakeInputs.into());
        }
        let coinstake = &ctx.block.transactions[1];
        if coinstake.outputs.iter().skip(1).any(|output| output.script_pubkey != *script) {
            return Err(ConsensusError::BadColdstakeOutputs.into());
        }
        let value_in: i64 = coins.iter().map(|coin| coin.output.value).sum();
        let value_out = coinstake.total_out().ok_or(ConsensusError::BadColdstakeAmount)?;
        if value_out < value_in {
            return Err(ConsensusError::BadColdstakeAmount.into());
        }
        Ok(())
    }
}
