//! Consensus parameters
//!
//! Everything a rule needs to know about the network it validates for. The
//! library never reads files or the environment: callers build a
//! `ConsensusParams` in code or load one from JSON they already hold.

use crate::constants::*;
use crate::types::Uint256;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One BIP9 deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentParams {
    pub name: String,
    /// Version bit miners set to signal
    pub bit: u8,
    /// Median time past at which signalling starts; `ALWAYS_ACTIVE` skips the state machine
    pub start_time: i64,
    /// Median time past after which a deployment that has not locked in fails
    pub timeout: i64,
}

impl DeploymentParams {
    pub const ALWAYS_ACTIVE: i64 = -1;
    pub const NO_TIMEOUT: i64 = i64::MAX;

    pub fn new(name: &str, bit: u8, start_time: i64, timeout: i64) -> Self {
        DeploymentParams {
            name: name.to_string(),
            bit,
            start_time,
            timeout,
        }
    }

    pub fn always_active(name: &str, bit: u8) -> Self {
        Self::new(name, bit, Self::ALWAYS_ACTIVE, Self::NO_TIMEOUT)
    }
}

/// Deployment indices into `ConsensusParams::deployments`.
pub const DEPLOYMENT_CSV: usize = 0;
pub const DEPLOYMENT_SEGWIT: usize = 1;
pub const DEPLOYMENT_COLDSTAKING: usize = 2;

/// Proof-of-stake parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PosParams {
    /// Last height at which a proof-of-work block is accepted
    #[serde(default = "default_last_pow_block")]
    pub last_pow_block: u32,

    /// Confirmations a coin needs before it may stake
    #[serde(default = "default_stake_min_confirmations")]
    pub stake_min_confirmations: u32,

    /// Confirmations before coinstake outputs may be spent
    #[serde(default = "default_coinstake_maturity")]
    pub coinstake_maturity: u32,

    /// Proof-of-stake block times must have these bits clear (0x0F = 16 second slots)
    #[serde(default = "default_stake_timestamp_mask")]
    pub stake_timestamp_mask: u32,

    /// Seconds a proof-of-stake block may run ahead of adjusted time
    #[serde(default = "default_future_drift")]
    pub future_drift: u32,

    #[serde(default = "default_pos_target_spacing")]
    pub target_spacing: u32,

    #[serde(default = "default_pos_target_timespan")]
    pub target_timespan: u32,

    /// Block reward of a proof-of-stake block, before fees
    #[serde(default = "default_pos_reward")]
    pub pos_reward: i64,

    /// Height of the one-off premine block (0 = none)
    #[serde(default)]
    pub premine_height: u32,

    #[serde(default)]
    pub premine_reward: i64,

    /// Easiest proof-of-stake target (compact)
    #[serde(default = "default_pos_limit")]
    pub pos_limit: u32,
}

fn default_last_pow_block() -> u32 {
    12_500
}

fn default_stake_min_confirmations() -> u32 {
    50
}

fn default_coinstake_maturity() -> u32 {
    50
}

fn default_stake_timestamp_mask() -> u32 {
    STAKE_TIMESTAMP_MASK
}

fn default_future_drift() -> u32 {
    15
}

fn default_pos_target_spacing() -> u32 {
    64
}

fn default_pos_target_timespan() -> u32 {
    16 * 60
}

fn default_pos_reward() -> i64 {
    COIN
}

fn default_pos_limit() -> u32 {
    0x1b00ffff
}

impl Default for PosParams {
    fn default() -> Self {
        PosParams {
            last_pow_block: default_last_pow_block(),
            stake_min_confirmations: default_stake_min_confirmations(),
            coinstake_maturity: default_coinstake_maturity(),
            stake_timestamp_mask: default_stake_timestamp_mask(),
            future_drift: default_future_drift(),
            target_spacing: default_pos_target_spacing(),
            target_timespan: default_pos_target_timespan(),
            pos_reward: default_pos_reward(),
            premine_height: 0,
            premine_reward: 0,
            pos_limit: default_pos_limit(),
        }
    }
}

/// Network consensus parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusParams {
    pub max_block_base_size: usize,
    pub max_block_weight: usize,
    pub max_block_serialized_size: usize,
    pub witness_scale_factor: usize,
    pub max_block_sigops_cost: u64,
    pub coinbase_maturity: u32,
    pub max_money: i64,
    pub subsidy_halving_interval: u32,
    pub initial_subsidy: i64,

    /// Easiest proof-of-work target (compact)
    pub pow_limit: u32,
    pub pow_target_timespan: u32,
    pub pow_target_spacing: u32,
    pub pow_no_retargeting: bool,
    pub pow_allow_min_difficulty_blocks: bool,

    /// P2SH enforced for blocks at or after this time
    pub bip16_time: u32,
    pub bip34_height: u32,
    pub bip65_height: u32,
    pub bip66_height: u32,

    /// Height -> required block hash
    pub checkpoints: BTreeMap<u32, Uint256>,

    pub max_future_block_time: u32,
    pub median_time_span: usize,

    pub miner_confirmation_window: u32,
    pub rule_change_activation_threshold: u32,
    /// Indexed by `DEPLOYMENT_CSV`, `DEPLOYMENT_SEGWIT`, `DEPLOYMENT_COLDSTAKING`
    pub deployments: Vec<DeploymentParams>,

    /// Present on proof-of-stake networks
    pub pos: Option<PosParams>,
}

impl Default for ConsensusParams {
    /// Bitcoin-like main network.
    fn default() -> Self {
        ConsensusParams {
            max_block_base_size: MAX_BLOCK_BASE_SIZE,
            max_block_weight: MAX_BLOCK_WEIGHT,
            max_block_serialized_size: MAX_BLOCK_SERIALIZED_SIZE,
            witness_scale_factor: WITNESS_SCALE_FACTOR,
            max_block_sigops_cost: MAX_BLOCK_SIGOPS_COST,
            coinbase_maturity: COINBASE_MATURITY,
            max_money: MAX_MONEY,
            subsidy_halving_interval: HALVING_INTERVAL,
            initial_subsidy: INITIAL_SUBSIDY,
            pow_limit: MAX_TARGET,
            pow_target_timespan: DIFFICULTY_ADJUSTMENT_INTERVAL * TARGET_TIME_PER_BLOCK,
            pow_target_spacing: TARGET_TIME_PER_BLOCK,
            pow_no_retargeting: false,
            pow_allow_min_difficulty_blocks: false,
            bip16_time: 1_333_238_400,
            bip34_height: 227_931,
            bip65_height: 388_381,
            bip66_height: 363_725,
            checkpoints: BTreeMap::new(),
            max_future_block_time: MAX_FUTURE_BLOCK_TIME,
            median_time_span: MEDIAN_TIME_SPAN,
            miner_confirmation_window: 2016,
            rule_change_activation_threshold: 1916,
            deployments: vec![
                DeploymentParams::new("csv", 0, 1_462_060_800, 1_493_596_800),
                DeploymentParams::new("segwit", 1, 1_479_168_000, 1_510_704_000),
                DeploymentParams::new("coldstaking", 2, 1_700_000_000, DeploymentParams::NO_TIMEOUT),
            ],
            pos: None,
        }
    }
}

impl ConsensusParams {
    /// Regression-test network: trivial difficulty, no retargeting, every soft fork active.
    pub fn regtest() -> Self {
        ConsensusParams {
            pow_limit: 0x207fffff,
            pow_no_retargeting: true,
            pow_allow_min_difficulty_blocks: true,
            subsidy_halving_interval: 150,
            bip16_time: 0,
            bip34_height: 500,
            bip65_height: 1351,
            bip66_height: 1251,
            miner_confirmation_window: 144,
            rule_change_activation_threshold: 108,
            deployments: vec![
                DeploymentParams::always_active("csv", 0),
                DeploymentParams::always_active("segwit", 1),
                DeploymentParams::always_active("coldstaking", 2),
            ],
            ..Self::default()
        }
    }

    /// Regression-test proof-of-stake network.
    pub fn pos_regtest() -> Self {
        ConsensusParams {
            pos: Some(PosParams {
                last_pow_block: 12,
                stake_min_confirmations: 10,
                coinstake_maturity: 10,
                pos_limit: 0x207fffff,
                ..PosParams::default()
            }),
            coinbase_maturity: 10,
            ..Self::regtest()
        }
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn is_proof_of_stake(&self) -> bool {
        self.pos.is_some()
    }

    pub fn deployment(&self, index: usize) -> Option<&DeploymentParams> {
        self.deployments.get(index)
    }

    /// Blocks per proof-of-work retarget window.
    pub fn difficulty_adjustment_interval(&self) -> u32 {
        self.pow_target_timespan / self.pow_target_spacing
    }

    pub fn money_range(&self, value: i64) -> bool {
        (0..=self.max_money).contains(&value)
    }
}
