//! Integrity rules: the block is well formed on its own

use super::{ConsensusRule, RuleContext, RuleEnv, StatelessRule};
use crate::block;
use crate::error::{ConsensusError, Result};
use crate::interpreter::ScriptVerify;
use crate::merkle;
use crate::segwit;

/// Merkle root matches the transactions and the list is not a mutated
/// duplicate of another one with the same root.
pub struct BlockMerkleRootRule;

impl ConsensusRule for BlockMerkleRootRule {
    fn name(&self) -> &'static str {
        "BlockMerkleRootRule"
    }
}

impl StatelessRule for BlockMerkleRootRule {
    fn check(&self, ctx: &RuleContext, _env: &RuleEnv<'_>) -> Result<()> {
        let (root, mutated) = merkle::block_merkle_root(&ctx.block);
        if root != ctx.block.header.merkle_root {
            return Err(ConsensusError::BadMerkleRoot);
        }
        if mutated {
            return Err(ConsensusError::BadTransactionDuplicate);
        }
        Ok(())
    }
}

pub struct EnsureCoinbaseRule;

impl ConsensusRule for EnsureCoinbaseRule {
    fn name(&self) -> &'static str {
        "EnsureCoinbaseRule"
    }
}

impl StatelessRule for EnsureCoinbaseRule {
    fn check(&self, ctx: &RuleContext, _env: &RuleEnv<'_>) -> Result<()> {
        block::check_coinbase_placement(&ctx.block)
    }
}

/// Transaction count, stripped size and full serialized size within limits.
pub struct BlockSizeRule;

impl ConsensusRule for BlockSizeRule {
    fn name(&self) -> &'static str {
        "BlockSizeRule"
    }
}

impl StatelessRule for BlockSizeRule {
    fn check(&self, ctx: &RuleContext, env: &RuleEnv<'_>) -> Result<()> {
        block::check_block_size(&ctx.block, env.params)?;
        if block::block_total_size(&ctx.block) > env.params.max_block_serialized_size {
            return Err(ConsensusError::BadBlockLength);
        }
        Ok(())
    }
}

pub struct WitnessCommitmentsRule;

impl ConsensusRule for WitnessCommitmentsRule {
    fn name(&self) -> &'static str {
        "WitnessCommitmentsRule"
    }
}

impl StatelessRule for WitnessCommitmentsRule {
    fn check(&self, ctx: &RuleContext, _env: &RuleEnv<'_>) -> Result<()> {
        segwit::check_witness_commitment(&ctx.block, ctx.flags.script_flags.contains(ScriptVerify::WITNESS))
    }
}

pub struct BlockWeightRule;

impl ConsensusRule for BlockWeightRule {
    fn name(&self) -> &'static str {
        "BlockWeightRule"
    }
}

impl StatelessRule for BlockWeightRule {
    fn check(&self, ctx: &RuleContext, env: &RuleEnv<'_>) -> Result<()> {
        block::check_block_weight(&ctx.block, env.params)
    }
}
