//! Chain and coin-view collaborators
//!
//! The rule pipeline reads the header tree and the unspent output set through
//! the `ChainIndex` and `CoinView` traits; storage lives behind them. The
//! in-memory implementations back the tests and small embedders.

use crate::constants::MEDIAN_TIME_SPAN;
use crate::pow::{self, U256};
use crate::stake::BlockStake;
use crate::types::{BlockHeader, Coin, OutPoint, Uint256};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A header placed in the block tree.
#[derive(Debug, Clone)]
pub struct ChainedHeader {
    pub header: BlockHeader,
    pub hash: Uint256,
    pub height: u32,
    /// Total work of the chain ending at this header
    pub chain_work: U256,
    pub previous: Option<Arc<ChainedHeader>>,
    /// Stake data, once the block has been validated on a proof-of-stake network
    pub stake: Option<BlockStake>,
}

impl ChainedHeader {
    pub fn genesis(header: BlockHeader) -> Self {
        ChainedHeader {
            hash: header.hash(),
            chain_work: pow::get_block_proof(header.bits),
            header,
            height: 0,
            previous: None,
            stake: None,
        }
    }

    /// Child of `previous` carrying `header`.
    pub fn extend(previous: &Arc<ChainedHeader>, header: BlockHeader, stake: Option<BlockStake>) -> Self {
        ChainedHeader {
            hash: header.hash(),
            chain_work: previous.chain_work + pow::get_block_proof(header.bits),
            header,
            height: previous.height + 1,
            previous: Some(Arc::clone(previous)),
            stake,
        }
    }

    pub fn time(&self) -> u32 {
        self.header.time
    }

    pub fn is_proof_of_stake(&self) -> bool {
        self.stake.as_ref().map_or(false, BlockStake::is_proof_of_stake)
    }

    /// Header at `height` on the branch ending here.
    pub fn ancestor(&self, height: u32) -> Option<&ChainedHeader> {
        if height > self.height {
            return None;
        }
        let mut walk = self;
        while walk.height > height {
            walk = walk.previous.as_deref()?;
        }
        Some(walk)
    }

    /// Like `ancestor`, returning a shared handle.
    pub fn ancestor_arc(this: &Arc<ChainedHeader>, height: u32) -> Option<Arc<ChainedHeader>> {
        if height > this.height {
            return None;
        }
        let mut walk = Arc::clone(this);
        while walk.height > height {
            walk = Arc::clone(walk.previous.as_ref()?);
        }
        Some(walk)
    }

    /// Median of the timestamps of this header and up to `span - 1` predecessors.
    pub fn median_time_past_over(&self, span: usize) -> u32 {
        let mut times = Vec::with_capacity(span);
        let mut walk = Some(self);
        while let Some(header) = walk {
            if times.len() == span {
                break;
            }
            times.push(header.header.time);
            walk = header.previous.as_deref();
        }
        times.sort_unstable();
        times[times.len() / 2]
    }

    pub fn median_time_past(&self) -> u32 {
        self.median_time_past_over(MEDIAN_TIME_SPAN)
    }

    /// Last header shared by the branches ending at `self` and `other`.
    pub fn find_fork<'a>(&'a self, other: &'a ChainedHeader) -> Option<&'a ChainedHeader> {
        let height = self.height.min(other.height);
        let mut a = self.ancestor(height)?;
        let mut b = other.ancestor(height)?;
        while a.hash != b.hash {
            a = a.previous.as_deref()?;
            b = b.previous.as_deref()?;
        }
        Some(a)
    }
}

/// Read access to the header tree.
pub trait ChainIndex: Send + Sync {
    /// Header at `height` on the active chain.
    fn header_at(&self, height: u32) -> Option<Arc<ChainedHeader>>;

    fn tip(&self) -> Option<Arc<ChainedHeader>>;

    fn ancestor_of(&self, header: &Arc<ChainedHeader>, height: u32) -> Option<Arc<ChainedHeader>> {
        ChainedHeader::ancestor_arc(header, height)
    }
}

/// Unspent output set.
///
/// Implementations must present one consistent snapshot for the duration of
/// a full validation call; `apply` is the only mutation and lands atomically.
pub trait CoinView: Send + Sync {
    fn try_get_unspent(&self, outpoint: &OutPoint) -> Option<Coin>;

    fn apply(&self, spent: &[OutPoint], created: &[(OutPoint, Coin)]);
}

#[derive(Default)]
struct ChainState {
    headers: HashMap<Uint256, Arc<ChainedHeader>>,
    active: Vec<Arc<ChainedHeader>>,
}

/// Header tree kept in memory, with a movable tip.
#[derive(Default)]
pub struct InMemoryChainIndex {
    state: RwLock<ChainState>,
}

impl InMemoryChainIndex {
    pub fn new(genesis: ChainedHeader) -> Self {
        let index = InMemoryChainIndex::default();
        let genesis = index.insert(genesis);
        index.set_tip(&genesis);
        index
    }

    /// Adds a header to the tree without moving the tip.
    pub fn insert(&self, header: ChainedHeader) -> Arc<ChainedHeader> {
        let header = Arc::new(header);
        self.state.write().headers.insert(header.hash, Arc::clone(&header));
        header
    }

    pub fn get(&self, hash: &Uint256) -> Option<Arc<ChainedHeader>> {
        self.state.read().headers.get(hash).cloned()
    }

    /// Makes the branch ending at `tip` the active chain.
    pub fn set_tip(&self, tip: &Arc<ChainedHeader>) {
        let mut active = Vec::with_capacity(tip.height as usize + 1);
        let mut walk = Some(Arc::clone(tip));
        while let Some(header) = walk {
            walk = header.previous.clone();
            active.push(header);
        }
        active.reverse();
        debug!(height = tip.height, hash = %tip.hash, "chain tip set");
        self.state.write().active = active;
    }

    pub fn height(&self) -> Option<u32> {
        self.tip().map(|tip| tip.height)
    }
}

impl ChainIndex for InMemoryChainIndex {
    fn header_at(&self, height: u32) -> Option<Arc<ChainedHeader>> {
        self.state.read().active.get(height as usize).cloned()
    }

    fn tip(&self) -> Option<Arc<ChainedHeader>> {
        self.state.read().active.last().cloned()
    }
}

/// Unspent output set kept in memory.
#[derive(Default)]
pub struct InMemoryCoinView {
    coins: RwLock<HashMap<OutPoint, Coin>>,
}

impl InMemoryCoinView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, outpoint: OutPoint, coin: Coin) {
        self.coins.write().insert(outpoint, coin);
    }

    pub fn len(&self) -> usize {
        self.coins.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.coins.read().is_empty()
    }

    /// Copy of the whole set, for comparing states.
    pub fn snapshot(&self) -> HashMap<OutPoint, Coin> {
        self.coins.read().clone()
    }
}

impl CoinView for InMemoryCoinView {
    fn try_get_unspent(&self, outpoint: &OutPoint) -> Option<Coin> {
        self.coins.read().get(outpoint).cloned()
    }

    fn apply(&self, spent: &[OutPoint], created: &[(OutPoint, Coin)]) {
        let mut coins = self.coins.write();
        for outpoint in spent {
            coins.remove(outpoint);
        }
        for (outpoint, coin) in created {
            coins.insert(*outpoint, coin.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Script;
    use crate::types::TxOut;

    fn header(prev: &Uint256, time: u32, nonce: u32) -> BlockHeader {
        BlockHeader {
            version: 1,
            prev_block_hash: *prev,
            merkle_root: Uint256::ZERO,
            time,
            bits: 0x207fffff,
            nonce,
        }
    }

    fn build_chain(length: u32, nonce: u32) -> Vec<Arc<ChainedHeader>> {
        let mut chain = vec![Arc::new(ChainedHeader::genesis(header(&Uint256::ZERO, 1000, 0)))];
        for i in 1..length {
            let prev = Arc::clone(&chain[i as usize - 1]);
            chain.push(Arc::new(ChainedHeader::extend(&prev, header(&prev.hash, 1000 + i * 10, nonce), None)));
        }
        chain
    }

    #[test]
    fn test_ancestor_and_work() {
        let chain = build_chain(5, 0);
        let tip = &chain[4];
        assert_eq!(tip.height, 4);
        assert_eq!(tip.ancestor(2).unwrap().hash, chain[2].hash);
        assert!(tip.ancestor(5).is_none());
        assert_eq!(tip.chain_work, U256::from_u64(10));
        assert_eq!(ChainedHeader::ancestor_arc(tip, 0).unwrap().hash, chain[0].hash);
    }

    #[test]
    fn test_median_time_past() {
        let chain = build_chain(20, 0);
        // Times 1000, 1010, ..., 1190; the last eleven are 1090..=1190
        assert_eq!(chain[19].median_time_past(), 1140);
        assert_eq!(chain[0].median_time_past(), 1000);
        assert_eq!(chain[2].median_time_past(), 1010);
    }

    #[test]
    fn test_find_fork() {
        let main = build_chain(6, 0);
        let fork_base = Arc::clone(&main[3]);
        let side1 = Arc::new(ChainedHeader::extend(&fork_base, header(&fork_base.hash, 2000, 99), None));
        let side2 = ChainedHeader::extend(&side1, header(&side1.hash, 2010, 99), None);
        assert_eq!(side2.find_fork(&main[5]).unwrap().hash, fork_base.hash);
        assert_eq!(main[5].find_fork(&main[2]).unwrap().hash, main[2].hash);
    }

    #[test]
    fn test_in_memory_chain_index() {
        let chain = build_chain(4, 0);
        let index = InMemoryChainIndex::new((*chain[0]).clone());
        for header in &chain[1..] {
            index.insert((**header).clone());
        }
        assert_eq!(index.height(), Some(0));
        let tip = index.get(&chain[3].hash).unwrap();
        index.set_tip(&tip);
        assert_eq!(index.height(), Some(3));
        assert_eq!(index.header_at(2).unwrap().hash, chain[2].hash);
        assert_eq!(index.ancestor_of(&tip, 1).unwrap().hash, chain[1].hash);
        assert!(index.header_at(4).is_none());
    }

    #[test]
    fn test_coin_view_apply() {
        let view = InMemoryCoinView::new();
        let a = OutPoint::new(Uint256::ONE, 0);
        let b = OutPoint::new(Uint256::ONE, 1);
        view.insert(a, Coin::new(TxOut::new(5, Script::new()), 1));
        view.apply(&[a], &[(b, Coin::new(TxOut::new(4, Script::new()), 2))]);
        assert!(view.try_get_unspent(&a).is_none());
        assert_eq!(view.try_get_unspent(&b).unwrap().output.value, 4);
        assert_eq!(view.len(), 1);
    }
}
