//! # Consensus-Core
//!
//! Consensus validation for a Bitcoin-derived proof-of-stake chain: the wire
//! codec, hashing and signature primitives, the script interpreter and
//! signature hashing, and the ordered block rule pipeline on top of them.
//!
//! ## Architecture
//!
//! - `serialization`, `crypto`, `keys`: bytes, hashes and signatures
//! - `script`, `interpreter`, `sighash`, `standard`: spending conditions
//! - `transaction`, `block`, `merkle`, `segwit`, `pow`, `stake`, `economic`: consensus checks
//! - `deployments`, `rules`: which checks apply to a block, and in what order
//! - `chain`, `reorganization`: the header tree and coin view the rules read and write
//!
//! ## Design Principles
//!
//! 1. **Caller-supplied state**: headers and coins arrive through the `ChainIndex`
//!    and `CoinView` traits; nothing here performs I/O
//! 2. **Exact Version Pinning**: consensus-critical dependencies are pinned to exact versions
//! 3. **One verdict per block**: the first failing rule names the error, and a rejected
//!    block changes nothing
//!
//! ## Usage
//!
//! ```rust
//! use consensus_core::{ConsensusEngine, ConsensusParams};
//!
//! let engine = ConsensusEngine::new(ConsensusParams::regtest());
//! assert!(!engine.params().is_proof_of_stake());
//! assert_eq!(engine.rules().rule_names().last(), Some(&"CheckScriptsRule"));
//! ```

pub mod block;
pub mod chain;
pub mod config;
pub mod constants;
pub mod crypto;
pub mod deployments;
pub mod economic;
pub mod error;
pub mod interpreter;
pub mod keys;
pub mod merkle;
pub mod opcodes;
pub mod pow;
pub mod reorganization;
pub mod rules;
pub mod script;
pub mod segwit;
pub mod serialization;
pub mod sighash;
pub mod stake;
pub mod standard;
pub mod transaction;
pub mod types;

// Re-export commonly used types
pub use chain::{ChainIndex, ChainedHeader, CoinView, InMemoryChainIndex, InMemoryCoinView};
pub use config::{ConsensusParams, DeploymentParams, PosParams};
pub use deployments::{DeploymentFlags, ThresholdConditionCache, ThresholdState};
pub use error::{ConsensusError, Result, SerializationError, ValidationError};
pub use interpreter::{ScriptError, ScriptVerify};
pub use reorganization::UndoData;
pub use rules::{BlockValidated, CancellationToken, ConsensusRuleEngine, RuleContext};
pub use script::Script;
pub use types::*;

use std::sync::Arc;

/// Entry point tying the rule engine to deployment tracking.
///
/// One engine serves one network. It is `Sync`: stateless validation of many
/// blocks may run from many threads while full validations take turns.
pub struct ConsensusEngine {
    rules: ConsensusRuleEngine,
    deployments: ThresholdConditionCache,
}

impl ConsensusEngine {
    pub fn new(params: ConsensusParams) -> Self {
        ConsensusEngine {
            rules: ConsensusRuleEngine::new(params),
            deployments: ThresholdConditionCache::new(),
        }
    }

    pub fn params(&self) -> &ConsensusParams {
        self.rules.params()
    }

    pub fn rules(&self) -> &ConsensusRuleEngine {
        &self.rules
    }

    /// Rules in force for the block with `header` built on `prev`.
    pub fn deployment_flags(&self, prev: Option<&ChainedHeader>, header: &BlockHeader) -> DeploymentFlags {
        DeploymentFlags::for_block(prev, header, self.params(), &self.deployments)
    }

    pub fn deployment_state(&self, deployment: usize, prev: Option<&ChainedHeader>) -> ThresholdState {
        self.deployments.state(self.params(), deployment, prev)
    }

    /// Validation context for `block` on top of `prev` (`None` for genesis).
    pub fn context(&self, block: Block, prev: Option<&Arc<ChainedHeader>>, adjusted_time: u32) -> RuleContext {
        let flags = self.deployment_flags(prev.map(|prev| prev.as_ref()), &block.header);
        RuleContext::new(block, prev, adjusted_time, flags)
    }

    /// Context-free checks of a single transaction.
    pub fn validate_transaction(&self, tx: &Transaction) -> Result<()> {
        transaction::check_transaction(tx, self.params())
    }

    /// Runs the spending conditions of input `index` of `tx` against the output it spends.
    pub fn verify_input(
        &self,
        tx: &Transaction,
        index: usize,
        spent: &TxOut,
        flags: ScriptVerify,
    ) -> std::result::Result<(), ScriptError> {
        let precomputed = sighash::PrecomputedTransactionData::new(tx);
        interpreter::verify_input(self.rules.secp(), tx, index, spent, flags, Some(&precomputed))
    }

    /// Header, integrity and partial validation; touches no shared state.
    pub fn check_block(&self, block: Block, prev: Option<&Arc<ChainedHeader>>, adjusted_time: u32) -> Result<()> {
        self.rules.validate_stateless(&self.context(block, prev, adjusted_time))
    }

    /// Full validation of `block` on top of `prev`, committing to `coin_view` on success.
    pub fn connect_block(
        &self,
        block: Block,
        prev: Option<&Arc<ChainedHeader>>,
        adjusted_time: u32,
        coin_view: &dyn CoinView,
    ) -> std::result::Result<BlockValidated, ValidationError> {
        let mut ctx = self.context(block, prev, adjusted_time);
        self.rules.validate_and_commit(&mut ctx, coin_view)
    }

    /// Reverts a connected block using the undo data its connection returned.
    pub fn disconnect_block(&self, block: &Block, height: u32, undo: &UndoData, coin_view: &dyn CoinView) -> Result<()> {
        reorganization::disconnect_block(block, height, undo, coin_view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEPLOYMENT_SEGWIT;

    #[test]
    fn test_engine_is_send_and_sync() {
        fn assert_sync<T: Send + Sync>() {}
        assert_sync::<ConsensusEngine>();
    }

    #[test]
    fn test_regtest_deployments_active_from_genesis() {
        let engine = ConsensusEngine::new(ConsensusParams::regtest());
        assert_eq!(engine.deployment_state(DEPLOYMENT_SEGWIT, None), ThresholdState::Active);
    }

    #[test]
    fn test_validate_transaction() {
        let engine = ConsensusEngine::new(ConsensusParams::regtest());
        let tx = Transaction {
            version: 1,
            inputs: vec![],
            outputs: vec![TxOut::new(1000, Script::from_bytes(vec![0x51]))],
            lock_time: 0,
        };
        assert_eq!(engine.validate_transaction(&tx), Err(ConsensusError::BadTransactionNoInput));
    }
}
