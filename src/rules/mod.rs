//! Consensus rule pipeline
//!
//! A block is validated in four phases, each an ordered list of named rules:
//!
//! 1. header: time bounds, difficulty, proof of work, version, checkpoints
//! 2. integrity: merkle root, coinbase placement, size and weight, witness commitment
//! 3. partial: stateless transaction checks
//! 4. full: coin lookups, fees and rewards, stake kernel, scripts
//!
//! The first failing rule ends validation and its error is returned as is.
//! Phases 1-3 only read the `RuleContext` and can run for many blocks at
//! once. Phase 4 holds the engine's commit lock while its rules read the coin
//! view and while it applies the block's effects, exactly once, after every
//! rule has passed. Script checks run outside the lock; if another block
//! committed meanwhile, the spent coins are checked again before apply.

pub mod full;
pub mod header;
pub mod integrity;
pub mod partial;
pub mod stake;

use crate::chain::{ChainedHeader, CoinView};
use crate::config::ConsensusParams;
use crate::deployments::DeploymentFlags;
use crate::error::{ConsensusError, Result, ValidationError};
use crate::reorganization::UndoData;
use crate::stake::BlockStake;
use crate::types::{Block, Coin, OutPoint, Uint256};
use parking_lot::Mutex;
use rayon::prelude::*;
use secp256k1::{Secp256k1, VerifyOnly};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Shared flag telling in-flight validation of a block to stop.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Working state built up by the full-validation rules.
#[derive(Debug, Clone, Default)]
pub struct ValidationState {
    /// Coins the block spends that already exist in the coin view
    pub coins: HashMap<OutPoint, Coin>,
    /// Coins spent by each transaction, in input order (empty for the coinbase)
    pub input_coins: Vec<Vec<Coin>>,
    /// Coins removed from the coin view, with their contents for undo
    pub spent: Vec<(OutPoint, Coin)>,
    /// Coins added to the coin view
    pub created: Vec<(OutPoint, Coin)>,
    pub fees: i64,
    /// Value a coinstake creates over what it spends
    pub minted: i64,
    pub stake: Option<BlockStake>,
}

/// Everything the rules know about the block under validation.
#[derive(Debug, Clone)]
pub struct RuleContext {
    pub block: Block,
    /// The block's place in the header tree, linked to its parent
    pub header: ChainedHeader,
    /// Network-adjusted current time
    pub adjusted_time: u32,
    pub flags: DeploymentFlags,
    pub cancellation: CancellationToken,
    pub state: ValidationState,
}

impl RuleContext {
    pub fn new(block: Block, prev: Option<&Arc<ChainedHeader>>, adjusted_time: u32, flags: DeploymentFlags) -> Self {
        let header = match prev {
            Some(prev) => ChainedHeader::extend(prev, block.header.clone(), None),
            None => ChainedHeader::genesis(block.header.clone()),
        };
        RuleContext {
            block,
            header,
            adjusted_time,
            flags,
            cancellation: CancellationToken::new(),
            state: ValidationState::default(),
        }
    }

    pub fn height(&self) -> u32 {
        self.header.height
    }

    pub fn hash(&self) -> Uint256 {
        self.header.hash
    }

    pub fn previous(&self) -> Option<&ChainedHeader> {
        self.header.previous.as_deref()
    }

    fn check_cancelled(&self) -> std::result::Result<(), ValidationError> {
        if self.cancellation.is_cancelled() {
            return Err(ValidationError::Cancelled);
        }
        Ok(())
    }
}

/// What rules may consult besides the block.
pub struct RuleEnv<'a> {
    pub params: &'a ConsensusParams,
    pub secp: &'a Secp256k1<VerifyOnly>,
}

pub trait ConsensusRule: Send + Sync {
    fn name(&self) -> &'static str;
}

/// Rule of phases 1-3: reads the context, nothing else.
pub trait StatelessRule: ConsensusRule {
    fn check(&self, ctx: &RuleContext, env: &RuleEnv<'_>) -> Result<()>;
}

/// Rule of phase 4: reads the coin view and fills in `ctx.state`.
pub trait StatefulRule: ConsensusRule {
    fn run(
        &self,
        ctx: &mut RuleContext,
        env: &RuleEnv<'_>,
        coin_view: &dyn CoinView,
    ) -> std::result::Result<(), ValidationError>;

    /// Whether the rule needs the coin view as loaded under the commit lock.
    /// Rules answering `false` only read `ctx.state` and run unlocked.
    fn reads_coin_view(&self) -> bool {
        true
    }
}

/// Result of a successful full validation.
#[derive(Debug, Clone)]
pub struct BlockValidated {
    /// The block's header, with its stake record attached on proof-of-stake networks
    pub header: ChainedHeader,
    pub undo: UndoData,
    /// Stake record of the block on proof-of-stake networks
    pub stake: Option<BlockStake>,
    pub fees: i64,
}

pub struct ConsensusRuleEngine {
    params: ConsensusParams,
    secp: Secp256k1<VerifyOnly>,
    header_rules: Vec<Box<dyn StatelessRule>>,
    integrity_rules: Vec<Box<dyn StatelessRule>>,
    partial_rules: Vec<Box<dyn StatelessRule>>,
    full_rules: Vec<Box<dyn StatefulRule>>,
    commit_lock: Mutex<()>,
}

impl ConsensusRuleEngine {
    pub fn new(params: ConsensusParams) -> Self {
        let pos = params.is_proof_of_stake();

        let header_rules: Vec<Box<dyn StatelessRule>> = vec![
            Box::new(header::PrevBlockRule),
            Box::new(header::HeaderTimeChecksRule),
            Box::new(header::CheckDifficultyRule),
            Box::new(header::HeaderProofOfWorkRule),
            Box::new(header::HeaderVersionRule),
            Box::new(header::CheckpointsRule),
        ];

        let mut integrity_rules: Vec<Box<dyn StatelessRule>> = vec![
            Box::new(integrity::BlockMerkleRootRule),
            Box::new(integrity::EnsureCoinbaseRule),
            Box::new(integrity::BlockSizeRule),
        ];
        if pos {
            integrity_rules.push(Box::new(stake::PosBlockTypeRule));
            integrity_rules.push(Box::new(stake::PosBlockSignatureRule));
        }
        integrity_rules.push(Box::new(integrity::WitnessCommitmentsRule));
        integrity_rules.push(Box::new(integrity::BlockWeightRule));

        let mut partial_rules: Vec<Box<dyn StatelessRule>> = vec![
            Box::new(partial::CheckTransactionsRule),
            Box::new(partial::CheckSigOpsRule),
            Box::new(partial::TransactionLocktimeRule),
            Box::new(partial::CoinbaseHeightRule),
        ];
        if pos {
            partial_rules.push(Box::new(stake::PosTimeMaskRule));
            partial_rules.push(Box::new(stake::PosCoinstakeShapeRule));
        }

        let mut full_rules: Vec<Box<dyn StatefulRule>> = vec![
            Box::new(full::LoadCoinviewRule),
            Box::new(full::Bip30Rule),
            Box::new(full::CoinViewRule),
        ];
        if pos {
            full_rules.push(Box::new(stake::CheckProofOfStakeRule));
            full_rules.push(Box::new(stake::PosColdStakingRule));
        }
        full_rules.push(Box::new(full::CheckScriptsRule));

        ConsensusRuleEngine {
            params,
            secp: Secp256k1::verification_only(),
            header_rules,
            integrity_rules,
            partial_rules,
            full_rules,
            commit_lock: Mutex::new(()),
        }
    }

    pub fn params(&self) -> &ConsensusParams {
        &self.params
    }

    pub fn secp(&self) -> &Secp256k1<VerifyOnly> {
        &self.secp
    }

    /// Rule names in execution order.
    pub fn rule_names(&self) -> Vec<&'static str> {
        let stateless = self
            .header_rules
            .iter()
            .chain(&self.integrity_rules)
            .chain(&self.partial_rules)
            .map(|rule| rule.name());
        stateless.chain(self.full_rules.iter().map(|rule| rule.name())).collect()
    }

    fn env(&self) -> RuleEnv<'_> {
        RuleEnv {
            params: &self.params,
            secp: &self.secp,
        }
    }

    fn run_phase(&self, phase: &'static str, rules: &[Box<dyn StatelessRule>], ctx: &RuleContext) -> Result<()> {
        debug!(phase, height = ctx.height(), hash = %ctx.hash(), "validating block");
        let env = self.env();
        for rule in rules {
            trace!(rule = rule.name(), "running rule");
            if let Err(err) = rule.check(ctx, &env) {
                warn!(rule = rule.name(), code = err.code(), hash = %ctx.hash(), "block rejected");
                return Err(err);
            }
        }
        Ok(())
    }

    pub fn validate_header(&self, ctx: &RuleContext) -> Result<()> {
        self.run_phase("header", &self.header_rules, ctx)
    }

    pub fn validate_integrity(&self, ctx: &RuleContext) -> Result<()> {
        self.run_phase("integrity", &self.integrity_rules, ctx)
    }

    pub fn validate_partial(&self, ctx: &RuleContext) -> Result<()> {
        self.run_phase("partial", &self.partial_rules, ctx)
    }

    /// Phases 1-3 of one block.
    pub fn validate_stateless(&self, ctx: &RuleContext) -> Result<()> {
        self.validate_header(ctx)?;
        self.validate_integrity(ctx)?;
        self.validate_partial(ctx)
    }

    /// Phases 1-3 of many blocks in parallel, results in input order.
    pub fn validate_partial_batch(&self, contexts: &[RuleContext]) -> Vec<Result<()>> {
        contexts.par_iter().map(|ctx| self.validate_stateless(ctx)).collect()
    }

    /// Phase 4. Commits the block's coin changes on success; on any failure,
    /// including cancellation, the coin view is left untouched.
    pub fn full_validation(
        &self,
        ctx: &mut RuleContext,
        coin_view: &dyn CoinView,
    ) -> std::result::Result<BlockValidated, ValidationError> {
        debug!(phase = "full", height = ctx.height(), hash = %ctx.hash(), "validating block");
        ctx.state = ValidationState::default();

        let env = self.env();
        let mut commit = Some(self.commit_lock.lock());
        let mut unlocked_since_load = false;
        for rule in &self.full_rules {
            ctx.check_cancelled()?;
            if rule.reads_coin_view() {
                if commit.is_none() {
                    commit = Some(self.commit_lock.lock());
                }
            } else if commit.take().is_some() {
                unlocked_since_load = true;
            }
            trace!(rule = rule.name(), "running rule");
            if let Err(err) = rule.run(ctx, &env, coin_view) {
                match &err {
                    ValidationError::Consensus(consensus) => {
                        warn!(rule = rule.name(), code = consensus.code(), hash = %ctx.hash(), "block rejected")
                    }
                    ValidationError::Cancelled => debug!(rule = rule.name(), hash = %ctx.hash(), "validation cancelled"),
                }
                return Err(err);
            }
        }

        let _commit = commit.unwrap_or_else(|| self.commit_lock.lock());
        ctx.check_cancelled()?;
        if unlocked_since_load {
            if let Err(err) = ensure_inputs_unspent(ctx, coin_view) {
                warn!(code = err.code(), hash = %ctx.hash(), "coins spent by a concurrent commit");
                return Err(err.into());
            }
        }
        let spent: Vec<OutPoint> = ctx.state.spent.iter().map(|(outpoint, _)| *outpoint).collect();
        coin_view.apply(&spent, &ctx.state.created);
        debug!(
            height = ctx.height(),
            hash = %ctx.hash(),
            spent = spent.len(),
            created = ctx.state.created.len(),
            "block committed"
        );

        let mut header = ctx.header.clone();
        header.stake = ctx.state.stake.clone();
        Ok(BlockValidated {
            header,
            undo: UndoData {
                spent: ctx.state.spent.clone(),
            },
            stake: ctx.state.stake.clone(),
            fees: ctx.state.fees,
        })
    }

    /// All four phases in order.
    pub fn validate_and_commit(
        &self,
        ctx: &mut RuleContext,
        coin_view: &dyn CoinView,
    ) -> std::result::Result<BlockValidated, ValidationError> {
        self.validate_stateless(ctx)?;
        self.full_validation(ctx, coin_view)
    }
}

/// Every coin the block spends is still in `coin_view`, unchanged since it
/// was loaded.
pub(crate) fn ensure_inputs_unspent(ctx: &RuleContext, coin_view: &dyn CoinView) -> Result<()> {
    for (outpoint, coin) in &ctx.state.spent {
        if coin_view.try_get_unspent(outpoint).as_ref() != Some(coin) {
            return Err(ConsensusError::BadTransactionMissingInput);
        }
    }
    Ok(())
}

/// Reward check shared by the coin-view rule: coinbase for proof-of-work
/// blocks, minted value for proof-of-stake blocks.
pub(crate) fn check_block_reward(ctx: &RuleContext, params: &ConsensusParams) -> Result<()> {
    let proof_of_stake = params.is_proof_of_stake() && ctx.block.is_proof_of_stake();
    let reward = crate::economic::block_reward(ctx.height(), proof_of_stake, params);
    if proof_of_stake {
        crate::block::check_coinstake_reward(ctx.state.minted, ctx.state.fees, reward)
    } else {
        crate::block::check_coinbase_reward(&ctx.block, ctx.state.fees, reward)
    }
}
