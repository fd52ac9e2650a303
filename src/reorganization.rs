//! Chain reorganization
//!
//! The branch with the most cumulative work is the active chain. Switching
//! branches disconnects the old blocks back to the fork point, restoring the
//! coins they spent from undo data, then connects the new branch through the
//! rule engine.

use crate::block::created_coins;
use crate::chain::{ChainedHeader, CoinView};
use crate::error::{ConsensusError, Result};
use crate::types::{Block, Coin, OutPoint, Uint256};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// Coins a block removed from the coin view, enough to put them back.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UndoData {
    pub spent: Vec<(OutPoint, Coin)>,
}

/// Branch switch from the current tip to a candidate.
#[derive(Debug, Clone)]
pub struct ReorganizationPlan {
    pub fork: Arc<ChainedHeader>,
    /// Old branch, tip first
    pub disconnect: Vec<Arc<ChainedHeader>>,
    /// New branch, lowest first
    pub connect: Vec<Arc<ChainedHeader>>,
}

impl ReorganizationPlan {
    pub fn depth(&self) -> usize {
        self.disconnect.len()
    }
}

/// A candidate replaces the tip only with strictly more work.
pub fn should_reorganize(candidate: &ChainedHeader, tip: &ChainedHeader) -> bool {
    candidate.chain_work > tip.chain_work
}

/// Last header shared by both branches.
pub fn find_fork(a: &Arc<ChainedHeader>, b: &Arc<ChainedHeader>) -> Option<Arc<ChainedHeader>> {
    let height = a.height.min(b.height);
    let mut a = ChainedHeader::ancestor_arc(a, height)?;
    let mut b = ChainedHeader::ancestor_arc(b, height)?;
    while a.hash != b.hash {
        a = Arc::clone(a.previous.as_ref()?);
        b = Arc::clone(b.previous.as_ref()?);
    }
    Some(a)
}

/// Headers above `fork` on the branch ending at `tip`, tip first.
pub fn blocks_to_disconnect(tip: &Arc<ChainedHeader>, fork: &ChainedHeader) -> Vec<Arc<ChainedHeader>> {
    let mut headers = Vec::new();
    let mut walk = Arc::clone(tip);
    while walk.height > fork.height {
        let previous = walk.previous.clone();
        headers.push(walk);
        walk = match previous {
            Some(previous) => previous,
            None => break,
        };
    }
    headers
}

/// Headers above `fork` on the branch ending at `candidate`, lowest first.
pub fn blocks_to_connect(candidate: &Arc<ChainedHeader>, fork: &ChainedHeader) -> Vec<Arc<ChainedHeader>> {
    let mut headers = blocks_to_disconnect(candidate, fork);
    headers.reverse();
    headers
}

pub fn plan_reorganization(tip: &Arc<ChainedHeader>, candidate: &Arc<ChainedHeader>) -> Result<ReorganizationPlan> {
    let fork = find_fork(tip, candidate).ok_or(ConsensusError::BlockNotInChain)?;
    let plan = ReorganizationPlan {
        disconnect: blocks_to_disconnect(tip, &fork),
        connect: blocks_to_connect(candidate, &fork),
        fork,
    };
    info!(
        fork_height = plan.fork.height,
        disconnect = plan.disconnect.len(),
        connect = plan.connect.len(),
        "reorganization planned"
    );
    Ok(plan)
}

/// DisconnectBlock: block × height × undo × coin view → coin view
///
/// 1. Every coin the block left in the view must still be there
/// 2. The undo data must hold exactly the coins the block took from outside itself
/// 3. Remove the created coins and restore the spent ones in one `apply`
pub fn disconnect_block(block: &Block, height: u32, undo: &UndoData, coin_view: &dyn CoinView) -> Result<()> {
    let txids: HashSet<Uint256> = block.transactions.iter().map(|tx| tx.txid()).collect();
    let inputs: Vec<OutPoint> = block
        .transactions
        .iter()
        .filter(|tx| !tx.is_coinbase())
        .flat_map(|tx| tx.inputs.iter().map(|input| input.prevout))
        .collect();
    let spent_in_block: HashSet<OutPoint> = inputs.iter().copied().collect();

    let mut created = Vec::new();
    for tx in &block.transactions {
        for (outpoint, _) in created_coins(tx, height, block.header.time) {
            if spent_in_block.contains(&outpoint) {
                continue;
            }
            if coin_view.try_get_unspent(&outpoint).is_none() {
                return Err(ConsensusError::BadUndoData);
            }
            created.push(outpoint);
        }
    }

    let external: HashSet<OutPoint> = inputs
        .into_iter()
        .filter(|prevout| !txids.contains(&prevout.hash))
        .collect();
    let undone: HashSet<OutPoint> = undo.spent.iter().map(|(outpoint, _)| *outpoint).collect();
    if undone.len() != undo.spent.len() || undone != external {
        return Err(ConsensusError::BadUndoData);
    }

    coin_view.apply(&created, &undo.spent);
    info!(height, hash = %block.hash(), restored = undo.spent.len(), "block disconnected");
    Ok(())
}
