//! Network parameters: JSON loading and the height-gated rules they switch on.

mod common;

use anyhow::Result;
use common::*;
use consensus_core::*;

#[test]
fn test_params_json_round_trip() -> Result<()> {
    let mut params = ConsensusParams::pos_regtest();
    params.checkpoints.insert(7, Uint256::ONE);
    let json = params.to_json()?;
    assert_eq!(ConsensusParams::from_json(&json)?, params);
    Ok(())
}

#[test]
fn test_partial_json_keeps_defaults() -> Result<()> {
    let params = ConsensusParams::from_json(r#"{"coinbase_maturity": 3, "bip34_height": 1}"#)?;
    let defaults = ConsensusParams::default();
    assert_eq!(params.coinbase_maturity, 3);
    assert_eq!(params.bip34_height, 1);
    assert_eq!(params.max_block_weight, defaults.max_block_weight);
    assert_eq!(params.deployments, defaults.deployments);
    assert!(!params.is_proof_of_stake());
    Ok(())
}

#[test]
fn test_checkpoint_pins_block_hash() -> Result<()> {
    let mut params = ConsensusParams::regtest();
    params.checkpoints.insert(1, Uint256::ONE);
    let mut chain = TestChain::with_params(params);

    let block = chain.block_with(Vec::new());
    let err = chain.try_connect(block).err();
    assert_eq!(err, Some(ConsensusError::CheckpointViolation.into()));

    let mut params = ConsensusParams::regtest();
    let block = chain.block_with(Vec::new());
    params.checkpoints.insert(1, block.hash());
    let mut pinned = TestChain::with_params(params);
    pinned.tip = chain.tip.clone();
    pinned.try_connect(block)?;
    Ok(())
}

#[test]
fn test_coinbase_height_enforced_from_bip34() -> Result<()> {
    let params = ConsensusParams {
        bip34_height: 1,
        ..ConsensusParams::regtest()
    };
    let mut chain = TestChain::with_params(params);
    let engine = &chain.engine;
    let flags = engine.deployment_flags(Some(&chain.tip), &chain.block_with(Vec::new()).header);
    assert!(flags.enforce_bip34);
    assert!(!flags.enforce_bip30);

    let wrong = mine(&chain.tip, vec![coinbase(2, 50 * constants::COIN)]);
    let err = chain.try_connect(wrong).err();
    assert_eq!(err, Some(ConsensusError::BadCoinbaseHeight.into()));

    chain.connect_empty();
    assert_eq!(chain.tip.height, 1);
    Ok(())
}
