//! Segregated witness block commitment (BIP141)
//!
//! A block carrying witness data commits to the witness merkle root in a
//! coinbase output `OP_RETURN 0x24 aa21a9ed <32-byte commitment>`, where the
//! commitment is sha256d(witness root ‖ witness nonce) and the nonce is the
//! single 32-byte witness item of the coinbase input.

use crate::constants::{MIN_WITNESS_COMMITMENT_SIZE, WITNESS_COMMITMENT_HEADER};
use crate::error::{ConsensusError, Result};
use crate::merkle::block_witness_merkle_root;
use crate::script::{Builder, Script};
use crate::opcodes::OP_RETURN;
use crate::types::*;

/// Index of the coinbase output holding the witness commitment; the last one wins.
pub fn witness_commitment_index(block: &Block) -> Option<usize> {
    let coinbase = block.transactions.first()?;
    coinbase.outputs.iter().rposition(|output| {
        let script = output.script_pubkey.as_bytes();
        script.len() >= MIN_WITNESS_COMMITMENT_SIZE && script.starts_with(&WITNESS_COMMITMENT_HEADER)
    })
}

/// sha256d(witness merkle root ‖ nonce)
pub fn compute_witness_commitment(block: &Block, nonce: &[u8; 32]) -> Uint256 {
    let (root, _) = block_witness_merkle_root(block);
    let mut preimage = [0u8; 64];
    preimage[..32].copy_from_slice(root.as_bytes());
    preimage[32..].copy_from_slice(nonce);
    hash256(&preimage)
}

/// Output script carrying `commitment`.
pub fn witness_commitment_script(commitment: &Uint256) -> Script {
    let mut payload = WITNESS_COMMITMENT_HEADER[2..].to_vec();
    payload.extend_from_slice(commitment.as_bytes());
    Builder::new().push_opcode(OP_RETURN).push_slice(&payload).into_script()
}

/// CheckWitnessCommitment: ℬ × enabled → {valid, invalid}
///
/// 1. Witness rules active and a commitment output present:
///    - the coinbase witness is exactly one 32-byte nonce, else `BadWitnessNonceSize`
///    - the committed hash equals sha256d(witness root ‖ nonce), else `BadWitnessMerkleMatch`
/// 2. Otherwise no transaction may carry witness data (`UnexpectedWitness`)
pub fn check_witness_commitment(block: &Block, witness_enabled: bool) -> Result<()> {
    if witness_enabled {
        if let Some(index) = witness_commitment_index(block) {
            let coinbase = &block.transactions[0];
            let witness = &coinbase.inputs[0].witness;
            let nonce: [u8; 32] = match witness.as_slice() {
                [nonce] => nonce
                    .as_slice()
                    .try_into()
                    .map_err(|_| ConsensusError::BadWitnessNonceSize)?,
                _ => return Err(ConsensusError::BadWitnessNonceSize),
            };
            let commitment = compute_witness_commitment(block, &nonce);
            let script = coinbase.outputs[index].script_pubkey.as_bytes();
            if &script[6..38] != commitment.as_bytes() {
                return Err(ConsensusError::BadWitnessMerkleMatch);
            }
            return Ok(());
        }
    }

    if block.transactions.iter().any(Transaction::has_witness) {
        return Err(ConsensusError::UnexpectedWitness);
    }
    Ok(())
}
