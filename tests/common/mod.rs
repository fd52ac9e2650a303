//! Shared builders for the integration tests: regtest chains with real
//! proof of work and correct merkle roots.

#![allow(dead_code)]

use consensus_core::merkle::block_merkle_root;
use consensus_core::opcodes::OP_TRUE;
use consensus_core::pow::{check_proof_of_work, get_next_target_required};
use consensus_core::script::{Builder, Script};
use consensus_core::*;
use std::sync::Arc;

pub const GENESIS_TIME: u32 = 1_600_000_000;
pub const SPACING: u32 = 60;
pub const REGTEST_BITS: u32 = 0x207fffff;

pub fn anyone_can_spend() -> Script {
    Script::from_bytes(vec![OP_TRUE])
}

pub fn coinbase(height: u32, value: i64) -> Transaction {
    coinbase_to(height, value, anyone_can_spend())
}

pub fn coinbase_to(height: u32, value: i64, script_pubkey: Script) -> Transaction {
    Transaction {
        version: 1,
        inputs: vec![TxIn::new(
            OutPoint::null(),
            Builder::new().push_int(height as i64).push_int(0).into_script(),
        )],
        outputs: vec![TxOut::new(value, script_pubkey)],
        lock_time: 0,
    }
}

pub fn spend(prevout: OutPoint, value: i64) -> Transaction {
    Transaction {
        version: 1,
        inputs: vec![TxIn::new(prevout, Script::new())],
        outputs: vec![TxOut::new(value, anyone_can_spend())],
        lock_time: 0,
    }
}

/// Grinds the nonce until the header meets its own target.
pub fn grind(header: &mut BlockHeader) {
    while !check_proof_of_work(&header.hash(), header.bits, REGTEST_BITS) {
        header.nonce += 1;
    }
}

/// Block on top of `prev` at `time`, carrying the bits the network expects
/// and a valid merkle root. Proof-of-work blocks are ground; proof-of-stake
/// blocks are left for the caller to sign.
pub fn assemble(params: &ConsensusParams, prev: &ChainedHeader, transactions: Vec<Transaction>, time: u32) -> Block {
    let mut block = Block {
        header: BlockHeader {
            version: 4,
            prev_block_hash: prev.hash,
            merkle_root: Uint256::ZERO,
            time,
            bits: 0,
            nonce: 0,
        },
        transactions,
        signature: Vec::new(),
    };
    let proof_of_stake = block.is_proof_of_stake();
    block.header.bits = get_next_target_required(Some(prev), time, proof_of_stake, params);
    block.header.merkle_root = block_merkle_root(&block).0;
    if !proof_of_stake {
        grind(&mut block.header);
    }
    block
}

/// Regtest proof-of-work block one spacing after `prev`.
pub fn mine(prev: &ChainedHeader, transactions: Vec<Transaction>) -> Block {
    assemble(&ConsensusParams::regtest(), prev, transactions, prev.header.time + SPACING)
}

pub fn genesis() -> Arc<ChainedHeader> {
    let mut block = Block {
        header: BlockHeader {
            version: 1,
            prev_block_hash: Uint256::ZERO,
            merkle_root: Uint256::ZERO,
            time: GENESIS_TIME,
            bits: REGTEST_BITS,
            nonce: 0,
        },
        transactions: vec![coinbase(0, 50 * constants::COIN)],
        signature: Vec::new(),
    };
    block.header.merkle_root = block_merkle_root(&block).0;
    grind(&mut block.header);
    Arc::new(ChainedHeader::genesis(block.header))
}

/// Regtest chain driven through the engine, one connected block at a time.
pub struct TestChain {
    pub engine: ConsensusEngine,
    pub coins: InMemoryCoinView,
    pub tip: Arc<ChainedHeader>,
    pub connected: Vec<(Block, UndoData)>,
}

impl TestChain {
    pub fn regtest() -> Self {
        Self::with_params(ConsensusParams::regtest())
    }

    pub fn with_params(params: ConsensusParams) -> Self {
        TestChain {
            engine: ConsensusEngine::new(params),
            coins: InMemoryCoinView::new(),
            tip: genesis(),
            connected: Vec::new(),
        }
    }

    pub fn next_height(&self) -> u32 {
        self.tip.height + 1
    }

    /// Block paying the full subsidy to an anyone-can-spend output, plus `extra`.
    pub fn block_with(&self, extra: Vec<Transaction>) -> Block {
        let height = self.next_height();
        let mut transactions = vec![coinbase(height, 50 * constants::COIN)];
        transactions.extend(extra);
        assemble(self.engine.params(), &self.tip, transactions, self.tip.header.time + SPACING)
    }

    pub fn try_connect(&mut self, block: Block) -> std::result::Result<BlockValidated, ValidationError> {
        let adjusted = block.header.time;
        let validated = self
            .engine
            .connect_block(block.clone(), Some(&self.tip), adjusted, &self.coins)?;
        self.tip = Arc::new(validated.header.clone());
        self.connected.push((block, validated.undo.clone()));
        Ok(validated)
    }

    /// Connects a coinbase-only block and returns the outpoint it created.
    pub fn connect_empty(&mut self) -> OutPoint {
        let block = self.block_with(Vec::new());
        let outpoint = OutPoint::new(block.transactions[0].txid(), 0);
        self.try_connect(block).expect("empty block connects");
        outpoint
    }

    pub fn disconnect_tip(&mut self) {
        let (block, undo) = self.connected.pop().expect("something to disconnect");
        self.engine
            .disconnect_block(&block, self.tip.height, &undo, &self.coins)
            .expect("undo data matches");
        self.tip = Arc::clone(self.tip.previous.as_ref().expect("not at genesis"));
    }
}
