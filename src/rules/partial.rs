//! Partial rules: transaction checks that need no coins

use super::{ConsensusRule, RuleContext, RuleEnv, StatelessRule};
use crate::block;
use crate::error::{ConsensusError, Result};
use crate::transaction::{self, LockTimeFlags};

pub struct CheckTransactionsRule;

impl ConsensusRule for CheckTransactionsRule {
    fn name(&self) -> &'static str {
        "CheckTransactionsRule"
    }
}

impl StatelessRule for CheckTransactionsRule {
    fn check(&self, ctx: &RuleContext, env: &RuleEnv<'_>) -> Result<()> {
        ctx.block
            .transactions
            .iter()
            .try_for_each(|tx| transaction::check_transaction(tx, env.params))
    }
}

/// Legacy sig-op count, scaled to cost, within the block limit.
pub struct CheckSigOpsRule;

impl ConsensusRule for CheckSigOpsRule {
    fn name(&self) -> &'static str {
        "CheckSigOpsRule"
    }
}

impl StatelessRule for CheckSigOpsRule {
    fn check(&self, ctx: &RuleContext, env: &RuleEnv<'_>) -> Result<()> {
        let cost = block::block_legacy_sig_op_count(&ctx.block) * env.params.witness_scale_factor as u64;
        if cost > env.params.max_block_sigops_cost {
            return Err(ConsensusError::BadBlockSigOps);
        }
        Ok(())
    }
}

/// Every transaction is final at the block's height and lock-time cutoff:
/// the parent's median time past under BIP113, the block time before it.
pub struct TransactionLocktimeRule;

impl ConsensusRule for TransactionLocktimeRule {
    fn name(&self) -> &'static str {
        "TransactionLocktimeRule"
    }
}

impl StatelessRule for TransactionLocktimeRule {
    fn check(&self, ctx: &RuleContext, env: &RuleEnv<'_>) -> Result<()> {
        let block_time = ctx.block.header.time;
        let cutoff = if ctx.flags.lock_time_flags.contains(LockTimeFlags::MEDIAN_TIME_PAST) {
            ctx.previous()
                .map_or(block_time, |prev| prev.median_time_past_over(env.params.median_time_span))
        } else {
            block_time
        };
        let height = ctx.height();
        if ctx
            .block
            .transactions
            .iter()
            .any(|tx| !transaction::is_final_tx(tx, height, cutoff as i64))
        {
            return Err(ConsensusError::BadTransactionNonFinal);
        }
        Ok(())
    }
}

/// BIP34: the coinbase scriptSig starts with the block height.
pub struct CoinbaseHeightRule;

impl ConsensusRule for CoinbaseHeightRule {
    fn name(&self) -> &'static str {
        "CoinbaseHeightRule"
    }
}

impl StatelessRule for CoinbaseHeightRule {
    fn check(&self, ctx: &RuleContext, _env: &RuleEnv<'_>) -> Result<()> {
        if ctx.flags.enforce_bip34 {
            block::check_coinbase_height(&ctx.block, ctx.height())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConsensusParams;
    use crate::deployments::DeploymentFlags;
    use crate::opcodes::*;
    use crate::script::{Builder, Script};
    use crate::types::*;
    use secp256k1::Secp256k1;

    fn coinbase(lock_time: u32, sequence: u32) -> Transaction {
        let mut input = TxIn::new(OutPoint::null(), Builder::new().push_int(0).push_int(0).into_script());
        input.sequence = sequence;
        Transaction {
            version: 1,
            inputs: vec![input],
            outputs: vec![TxOut::new(50, Script::from_bytes(vec![OP_1]))],
            lock_time,
        }
    }

    fn context(transactions: Vec<Transaction>, flags: DeploymentFlags) -> RuleContext {
        let block = Block {
            header: BlockHeader {
                version: 4,
                prev_block_hash: Uint256::ZERO,
                merkle_root: Uint256::ZERO,
                time: 2_000,
                bits: 0x207fffff,
                nonce: 0,
            },
            transactions,
            signature: Vec::new(),
        };
        RuleContext::new(block, None, 0, flags)
    }

    fn check(rule: &dyn StatelessRule, ctx: &RuleContext, params: &ConsensusParams) -> Result<()> {
        let secp = Secp256k1::verification_only();
        rule.check(ctx, &RuleEnv { params, secp: &secp })
    }

    #[test]
    fn test_lock_time_against_block_time() {
        let params = ConsensusParams::regtest();
        let flags = DeploymentFlags::default();
        let final_tx = context(vec![coinbase(0, 0)], flags);
        assert_eq!(check(&TransactionLocktimeRule, &final_tx, &params), Ok(()));
        // Height lock at the genesis height itself is not yet final
        let locked = context(vec![coinbase(1, 0)], flags);
        assert_eq!(
            check(&TransactionLocktimeRule, &locked, &params),
            Err(ConsensusError::BadTransactionNonFinal)
        );
        let sequence_final = context(vec![coinbase(1, u32::MAX)], flags);
        assert_eq!(check(&TransactionLocktimeRule, &sequence_final, &params), Ok(()));
    }

    #[test]
    fn test_sig_op_limit() {
        let mut params = ConsensusParams::regtest();
        let mut tx = coinbase(0, 0);
        tx.outputs[0].script_pubkey = Builder::new().push_opcode(OP_CHECKSIG).push_opcode(OP_CHECKSIG).into_script();
        let ctx = context(vec![tx], DeploymentFlags::default());
        params.max_block_sigops_cost = 8;
        assert_eq!(check(&CheckSigOpsRule, &ctx, &params), Ok(()));
        params.max_block_sigops_cost = 7;
        assert_eq!(check(&CheckSigOpsRule, &ctx, &params), Err(ConsensusError::BadBlockSigOps));
    }

    #[test]
    fn test_coinbase_height_only_when_enforced() {
        let params = ConsensusParams::regtest();
        let mut tx = coinbase(0, 0);
        tx.inputs[0].script_sig = Builder::new().push_int(7).push_int(0).into_script();
        let lax = context(vec![tx.clone()], DeploymentFlags::default());
        assert_eq!(check(&CoinbaseHeightRule, &lax, &params), Ok(()));
        let strict = context(
            vec![tx],
            DeploymentFlags {
                enforce_bip34: true,
                ..DeploymentFlags::default()
            },
        );
        assert_eq!(check(&CoinbaseHeightRule, &strict, &params), Err(ConsensusError::BadCoinbaseHeight));
    }

    #[test]
    fn test_check_transactions_reports_first_failure() {
        let params = ConsensusParams::regtest();
        let mut bad = coinbase(0, 0);
        bad.outputs[0].value = -1;
        let ctx = context(vec![coinbase(0, 0), bad], DeploymentFlags::default());
        assert_eq!(
            check(&CheckTransactionsRule, &ctx, &params),
            Err(ConsensusError::BadTransactionNegativeOutput)
        );
    }
}
