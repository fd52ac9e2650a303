//! Block rewards and money range

use crate::config::ConsensusParams;
use crate::constants::MAX_MONEY;

/// GetBlockSubsidy: ℕ → ℤ
///
/// Proof-of-work subsidy at `height`.
/// Formula: subsidy = initial × 2^(-⌊h/H⌋), zero from the 64th halving on.
pub fn get_block_subsidy(height: u32, params: &ConsensusParams) -> i64 {
    let halvings = height / params.subsidy_halving_interval;
    if halvings >= 64 {
        return 0;
    }
    params.initial_subsidy >> halvings
}

/// Reward a proof-of-work block may claim before fees, including the one-off
/// premine on proof-of-stake networks.
pub fn get_proof_of_work_reward(height: u32, params: &ConsensusParams) -> i64 {
    match &params.pos {
        Some(pos) if pos.premine_height != 0 && height == pos.premine_height => pos.premine_reward,
        _ => get_block_subsidy(height, params),
    }
}

/// Flat proof-of-stake reward before fees; zero on proof-of-work networks.
pub fn get_proof_of_stake_reward(params: &ConsensusParams) -> i64 {
    params.pos.as_ref().map_or(0, |pos| pos.pos_reward)
}

/// Reward for the block at `height`, by proof type.
pub fn block_reward(height: u32, proof_of_stake: bool, params: &ConsensusParams) -> i64 {
    if proof_of_stake {
        get_proof_of_stake_reward(params)
    } else {
        get_proof_of_work_reward(height, params)
    }
}

/// TotalSupply: ℕ → ℤ
///
/// Sum of proof-of-work subsidies for heights 0..=height, one halving epoch at a time.
pub fn total_supply(height: u32, params: &ConsensusParams) -> i64 {
    let interval = params.subsidy_halving_interval as i64;
    let blocks = height as i64 + 1;
    let mut total = 0i64;
    for halvings in 0..64i64 {
        let epoch_start = halvings * interval;
        if epoch_start >= blocks {
            break;
        }
        let in_epoch = (blocks - epoch_start).min(interval);
        total += in_epoch * (params.initial_subsidy >> halvings);
    }
    total
}

/// `0 ≤ value ≤ MAX_MONEY`
pub fn money_range(value: i64) -> bool {
    (0..=MAX_MONEY).contains(&value)
}
