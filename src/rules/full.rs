//! Full rules: everything that needs the coin view

use super::{check_block_reward, ConsensusRule, RuleContext, RuleEnv, StatefulRule};
use crate::block;
use crate::chain::CoinView;
use crate::error::{ConsensusError, ValidationError};
use crate::interpreter;
use crate::sighash::PrecomputedTransactionData;
use crate::transaction;
use crate::types::{OutPoint, Uint256};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};

type RuleResult = std::result::Result<(), ValidationError>;

/// Fetches every coin the block spends from outside itself, so the remaining
/// rules work on one snapshot.
pub struct LoadCoinviewRule;

impl ConsensusRule for LoadCoinviewRule {
    fn name(&self) -> &'static str {
        "LoadCoinviewRule"
    }
}

impl StatefulRule for LoadCoinviewRule {
    fn run(&self, ctx: &mut RuleContext, _env: &RuleEnv<'_>, coin_view: &dyn CoinView) -> RuleResult {
        let in_block: HashSet<Uint256> = ctx.block.transactions.iter().map(|tx| tx.txid()).collect();
        let mut coins = HashMap::new();
        for tx in ctx.block.transactions.iter().filter(|tx| !tx.is_coinbase()) {
            for input in &tx.inputs {
                if in_block.contains(&input.prevout.hash) {
                    continue;
                }
                if let Some(coin) = coin_view.try_get_unspent(&input.prevout) {
                    coins.insert(input.prevout, coin);
                }
            }
        }
        ctx.state.coins = coins;
        Ok(())
    }
}

/// BIP30, while enforced.
pub struct Bip30Rule;

impl ConsensusRule for Bip30Rule {
    fn name(&self) -> &'static str {
        "Bip30Rule"
    }
}

impl StatefulRule for Bip30Rule {
    fn run(&self, ctx: &mut RuleContext, _env: &RuleEnv<'_>, coin_view: &dyn CoinView) -> RuleResult {
        if ctx.flags.enforce_bip30 {
            block::check_bip30(&ctx.block, coin_view)?;
        }
        Ok(())
    }
}

/// Spends every input against the snapshot in block order: coins must exist
/// and be mature, relative lock times must be met, values must balance and
/// the total sig-op cost must fit. Ends with the block reward check.
pub struct CoinViewRule;

impl ConsensusRule for CoinViewRule {
    fn name(&self) -> &'static str {
        "CoinViewRule"
    }
}

impl StatefulRule for CoinViewRule {
    fn run(&self, ctx: &mut RuleContext, env: &RuleEnv<'_>, _coin_view: &dyn CoinView) -> RuleResult {
        let params = env.params;
        let height = ctx.height();
        let time = ctx.block.header.time;
        let flags = ctx.flags;

        let mut available = std::mem::take(&mut ctx.state.coins);
        let mut created_here = HashSet::new();
        let mut created_order = Vec::new();
        let mut spent = Vec::new();
        let mut input_coins = Vec::with_capacity(ctx.block.transactions.len());
        let mut fees = 0i64;
        let mut minted = 0i64;
        let mut sig_op_cost = 0u64;

        for tx in &ctx.block.transactions {
            let mut coins = Vec::with_capacity(tx.inputs.len());
            if !tx.is_coinbase() {
                for input in &tx.inputs {
                    let coin = available
                        .remove(&input.prevout)
                        .ok_or(ConsensusError::BadTransactionMissingInput)?;
                    if !created_here.remove(&input.prevout) {
                        spent.push((input.prevout, coin.clone()));
                    }
                    coins.push(coin);
                }
                let prev_heights: Vec<u32> = coins.iter().map(|coin| coin.height).collect();
                if !transaction::sequence_locks(tx, flags.lock_time_flags, &prev_heights, &ctx.header) {
                    return Err(ConsensusError::BadTransactionNonFinal.into());
                }
            }

            sig_op_cost += transaction::transaction_sig_op_cost(tx, &coins, flags.script_flags);
            if sig_op_cost > params.max_block_sigops_cost {
                return Err(ConsensusError::BadBlockSigOps.into());
            }

            if !tx.is_coinbase() {
                let fee = transaction::check_tx_inputs(tx, &coins, height, params)?;
                if tx.is_coinstake() {
                    let value_in: i64 = coins.iter().map(|coin| coin.output.value).sum();
                    let value_out = tx
                        .total_out()
                        .ok_or(ConsensusError::BadTransactionTooLargeTotalOutput)?;
                    minted = value_out - value_in;
                } else {
                    fees = fees
                        .checked_add(fee)
                        .filter(|total| params.money_range(*total))
                        .ok_or(ConsensusError::BadTransactionFeeOutOfRange)?;
                }
            }

            for (outpoint, coin) in block::created_coins(tx, height, time) {
                created_here.insert(outpoint);
                created_order.push(outpoint);
                available.insert(outpoint, coin);
            }
            input_coins.push(coins);
        }

        let created: Vec<(OutPoint, _)> = created_order
            .into_iter()
            .filter_map(|outpoint| available.remove(&outpoint).map(|coin| (outpoint, coin)))
            .collect();
        ctx.state.input_coins = input_coins;
        ctx.state.spent = spent;
        ctx.state.created = created;
        ctx.state.fees = fees;
        ctx.state.minted = minted;

        check_block_reward(ctx, params)?;
        Ok(())
    }
}

/// Runs every input script, in parallel across the whole block. Stops early
/// when the block's cancellation token fires.
pub struct CheckScriptsRule;

impl ConsensusRule for CheckScriptsRule {
    fn name(&self) -> &'static str {
        "CheckScriptsRule"
    }
}

impl StatefulRule for CheckScriptsRule {
    fn run(&self, ctx: &mut RuleContext, env: &RuleEnv<'_>, _coin_view: &dyn CoinView) -> RuleResult {
        let ctx: &RuleContext = ctx;
        let transactions = &ctx.block.transactions;
        let flags = ctx.flags.script_flags;

        let precomputed: Vec<PrecomputedTransactionData> =
            transactions.par_iter().map(PrecomputedTransactionData::new).collect();
        let jobs: Vec<(usize, usize)> = transactions
            .iter()
            .enumerate()
            .filter(|(_, tx)| !tx.is_coinbase())
            .flat_map(|(t, tx)| (0..tx.inputs.len()).map(move |i| (t, i)))
            .collect();

        jobs.par_iter().try_for_each(|&(t, i)| {
            if ctx.cancellation.is_cancelled() {
                return Err(ValidationError::Cancelled);
            }
            let spent = &ctx.state.input_coins[t][i].output;
            interpreter::verify_input(env.secp, &transactions[t], i, spent, flags, Some(&precomputed[t]))
                .map_err(|err| ValidationError::from(ConsensusError::BadTransactionScriptError(err)))
        })
    }

    fn reads_coin_view(&self) -> bool {
        false
    }
}
