//! Header rules: chain linkage, time bounds, difficulty and proof of work

use super::{ConsensusRule, RuleContext, RuleEnv, StatelessRule};
use crate::error::{ConsensusError, Result};
use crate::pow;

/// The header builds on the block it names as its parent.
pub struct PrevBlockRule;

impl ConsensusRule for PrevBlockRule {
    fn name(&self) -> &'static str {
        "PrevBlockRule"
    }
}

impl StatelessRule for PrevBlockRule {
    fn check(&self, ctx: &RuleContext, _env: &RuleEnv<'_>) -> Result<()> {
        let expected = ctx.previous().map(|prev| prev.hash).unwrap_or_default();
        if ctx.block.header.prev_block_hash != expected {
            return Err(ConsensusError::BadPrevBlock);
        }
        Ok(())
    }
}

/// Time strictly after the median time past of the parent and no more than
/// the allowed drift ahead of adjusted time.
pub struct HeaderTimeChecksRule;

impl ConsensusRule for HeaderTimeChecksRule {
    fn name(&self) -> &'static str {
        "HeaderTimeChecksRule"
    }
}

impl StatelessRule for HeaderTimeChecksRule {
    fn check(&self, ctx: &RuleContext, env: &RuleEnv<'_>) -> Result<()> {
        let time = ctx.block.header.time;
        if let Some(prev) = ctx.previous() {
            if time <= prev.median_time_past_over(env.params.median_time_span) {
                return Err(ConsensusError::TimeTooOld);
            }
        }
        if time as u64 > ctx.adjusted_time as u64 + env.params.max_future_block_time as u64 {
            return Err(ConsensusError::TimeTooNew);
        }
        Ok(())
    }
}

/// `bits` equals the target the chain requires next.
pub struct CheckDifficultyRule;

impl ConsensusRule for CheckDifficultyRule {
    fn name(&self) -> &'static str {
        "CheckDifficultyRule"
    }
}

impl StatelessRule for CheckDifficultyRule {
    fn check(&self, ctx: &RuleContext, env: &RuleEnv<'_>) -> Result<()> {
        let expected = pow::get_next_target_required(
            ctx.previous(),
            ctx.block.header.time,
            ctx.block.is_proof_of_stake(),
            env.params,
        );
        if ctx.block.header.bits != expected {
            return Err(ConsensusError::BadDiffBits);
        }
        Ok(())
    }
}

/// Proof-of-work blocks hash below their target. Proof-of-stake blocks
/// prove their stake kernel in the full phase instead.
pub struct HeaderProofOfWorkRule;

impl ConsensusRule for HeaderProofOfWorkRule {
    fn name(&self) -> &'static str {
        "HeaderProofOfWorkRule"
    }
}

impl StatelessRule for HeaderProofOfWorkRule {
    fn check(&self, ctx: &RuleContext, env: &RuleEnv<'_>) -> Result<()> {
        if env.params.is_proof_of_stake() && ctx.block.is_proof_of_stake() {
            return Ok(());
        }
        if !pow::check_proof_of_work(&ctx.hash(), ctx.block.header.bits, env.params.pow_limit) {
            return Err(ConsensusError::HighHash);
        }
        Ok(())
    }
}

/// Versions 1, 2 and 3 are retired at the BIP34, BIP66 and BIP65 heights.
pub struct HeaderVersionRule;

impl ConsensusRule for HeaderVersionRule {
    fn name(&self) -> &'static str {
        "HeaderVersionRule"
    }
}

impl StatelessRule for HeaderVersionRule {
    fn check(&self, ctx: &RuleContext, env: &RuleEnv<'_>) -> Result<()> {
        let version = ctx.block.header.version;
        let height = ctx.height();
        let params = env.params;
        if (version < 2 && height >= params.bip34_height)
            || (version < 3 && height >= params.bip66_height)
            || (version < 4 && height >= params.bip65_height)
        {
            return Err(ConsensusError::BadVersion);
        }
        Ok(())
    }
}

pub struct CheckpointsRule;

impl ConsensusRule for CheckpointsRule {
    fn name(&self) -> &'static str {
        "CheckpointsRule"
    }
}

impl StatelessRule for CheckpointsRule {
    fn check(&self, ctx: &RuleContext, env: &RuleEnv<'_>) -> Result<()> {
        match env.params.checkpoints.get(&ctx.height()) {
            Some(expected) if *expected != ctx.hash() => Err(ConsensusError::CheckpointViolation),
            _ => Ok(()),
        }
    }
}
