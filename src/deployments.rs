//! BIP9 version-bits deployments and per-block rule flags
//!
//! Each deployment moves through `Defined → Started → LockedIn → Active` (or
//! `Failed`) one confirmation window at a time. The state of a block depends
//! only on its ancestors, so results are memoized by the hash of the last
//! block of the previous window and can be replayed from any header.

use crate::chain::ChainedHeader;
use crate::config::{
    ConsensusParams, DeploymentParams, DEPLOYMENT_COLDSTAKING, DEPLOYMENT_CSV, DEPLOYMENT_SEGWIT,
};
use crate::constants::{VERSIONBITS_TOP_BITS, VERSIONBITS_TOP_MASK};
use crate::interpreter::ScriptVerify;
use crate::transaction::LockTimeFlags;
use crate::types::{BlockHeader, Uint256};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThresholdState {
    Defined,
    Started,
    LockedIn,
    Active,
    Failed,
}

/// Whether a header version signals for `bit`.
pub fn signals(version: i32, bit: u8) -> bool {
    let version = version as u32;
    version & VERSIONBITS_TOP_MASK == VERSIONBITS_TOP_BITS && version & (1u32 << bit) != 0
}

/// Memoized deployment states keyed by (deployment, last header of the previous window).
#[derive(Debug, Default)]
pub struct ThresholdConditionCache {
    states: Mutex<HashMap<(usize, Uint256), ThresholdState>>,
}

impl ThresholdConditionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// State of deployment `index` for the block whose parent is `prev`.
    pub fn state(&self, params: &ConsensusParams, index: usize, prev: Option<&ChainedHeader>) -> ThresholdState {
        let deployment = match params.deployment(index) {
            Some(deployment) => deployment,
            None => return ThresholdState::Defined,
        };
        if deployment.start_time == DeploymentParams::ALWAYS_ACTIVE {
            return ThresholdState::Active;
        }
        let period = params.miner_confirmation_window;

        // Every block of a window shares the state of the window's first block
        let mut walk = prev.and_then(|prev| {
            prev.height
                .checked_sub((prev.height + 1) % period)
                .and_then(|height| prev.ancestor(height))
        });

        let mut states = self.states.lock();
        let mut to_compute = Vec::new();
        let mut state = loop {
            let header = match walk {
                Some(header) => header,
                None => break ThresholdState::Defined,
            };
            if let Some(cached) = states.get(&(index, header.hash)) {
                break *cached;
            }
            if (header.median_time_past_over(params.median_time_span) as i64) < deployment.start_time {
                states.insert((index, header.hash), ThresholdState::Defined);
                break ThresholdState::Defined;
            }
            to_compute.push(header);
            walk = header.height.checked_sub(period).and_then(|height| header.ancestor(height));
        };

        while let Some(header) = to_compute.pop() {
            let mtp = header.median_time_past_over(params.median_time_span) as i64;
            let next = match state {
                ThresholdState::Defined if mtp >= deployment.timeout => ThresholdState::Failed,
                ThresholdState::Defined if mtp >= deployment.start_time => ThresholdState::Started,
                ThresholdState::Started if mtp >= deployment.timeout => ThresholdState::Failed,
                ThresholdState::Started => {
                    if count_signals(header, period, deployment.bit) >= params.rule_change_activation_threshold {
                        ThresholdState::LockedIn
                    } else {
                        ThresholdState::Started
                    }
                }
                ThresholdState::LockedIn => ThresholdState::Active,
                unchanged => unchanged,
            };
            if next != state {
                info!(
                    deployment = %deployment.name,
                    height = header.height + 1,
                    from = ?state,
                    to = ?next,
                    "deployment state changed"
                );
            }
            states.insert((index, header.hash), next);
            state = next;
        }
        state
    }

    pub fn is_active(&self, params: &ConsensusParams, index: usize, prev: Option<&ChainedHeader>) -> bool {
        self.state(params, index, prev) == ThresholdState::Active
    }
}

/// Signalling headers among the `period` headers ending at `last`.
fn count_signals(last: &ChainedHeader, period: u32, bit: u8) -> u32 {
    let mut count = 0;
    let mut walk = Some(last);
    for _ in 0..period {
        let header = match walk {
            Some(header) => header,
            None => break,
        };
        if signals(header.header.version, bit) {
            count += 1;
        }
        walk = header.previous.as_deref();
    }
    count
}

/// Rules in force for one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeploymentFlags {
    pub script_flags: ScriptVerify,
    pub lock_time_flags: LockTimeFlags,
    pub enforce_bip30: bool,
    pub enforce_bip34: bool,
}

impl DeploymentFlags {
    /// Flags for the block with `header` whose parent is `prev`.
    pub fn for_block(
        prev: Option<&ChainedHeader>,
        header: &BlockHeader,
        params: &ConsensusParams,
        cache: &ThresholdConditionCache,
    ) -> Self {
        let height = prev.map_or(0, |prev| prev.height + 1);
        let mut flags = DeploymentFlags::default();

        if header.time >= params.bip16_time {
            flags.script_flags |= ScriptVerify::P2SH;
        }
        if height >= params.bip66_height {
            flags.script_flags |= ScriptVerify::DERSIG;
        }
        if height >= params.bip65_height {
            flags.script_flags |= ScriptVerify::CHECKLOCKTIMEVERIFY;
        }
        if cache.is_active(params, DEPLOYMENT_CSV, prev) {
            flags.script_flags |= ScriptVerify::CHECKSEQUENCEVERIFY;
            flags.lock_time_flags |= LockTimeFlags::VERIFY_SEQUENCE | LockTimeFlags::MEDIAN_TIME_PAST;
        }
        if cache.is_active(params, DEPLOYMENT_SEGWIT, prev) {
            flags.script_flags |= ScriptVerify::WITNESS | ScriptVerify::NULLDUMMY;
        }
        if cache.is_active(params, DEPLOYMENT_COLDSTAKING, prev) {
            flags.script_flags |= ScriptVerify::CHECKCOLDSTAKEVERIFY;
        }

        flags.enforce_bip34 = height >= params.bip34_height;
        flags.enforce_bip30 = !flags.enforce_bip34;
        flags
    }
}
