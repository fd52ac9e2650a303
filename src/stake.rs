//! Proof-of-stake primitives
//!
//! A staker proves ownership of a coin by spending it in the coinstake (the
//! second transaction of the block) and by finding a kernel whose hash falls
//! under the block target weighted by the coin's value. Per-block stake data
//! (`BlockStake`) is kept alongside the chained header so the next block can
//! derive its stake modifier.

use crate::error::{ConsensusError, Result, SerializationError};
use crate::keys;
use crate::pow::U256;
use crate::serialization::{CompactVarInt, Decodable, Encodable, HashWriter, ReadStream, SerializationContext, WriteStream};
use crate::standard::{self, TxDestination};
use crate::types::{Block, Coin, OutPoint, Uint160, Uint256};
use bitflags::bitflags;
use secp256k1::{Secp256k1, Verification};
use std::io::{self, Write};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BlockFlags: u32 {
        const PROOF_OF_STAKE = 1 << 0;
        /// Entropy bit for the stake modifier
        const STAKE_ENTROPY = 1 << 1;
        /// This block generated a new stake modifier
        const STAKE_MODIFIER = 1 << 2;
    }
}

/// Stake data of one block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockStake {
    pub flags: BlockFlags,
    pub stake_modifier_v2: Uint256,
    /// Coin spent by the coinstake (null for proof-of-work blocks)
    pub prevout_stake: OutPoint,
    pub stake_time: u32,
    /// Kernel hash that met the target (zero for proof-of-work blocks)
    pub hash_proof: Uint256,
}

impl BlockStake {
    /// Stake record for `block` with the type and coinstake fields filled in.
    /// Modifier and proof hash are set by the rules that compute them.
    pub fn new(block: &Block) -> Self {
        let mut stake = BlockStake::default();
        if block.is_proof_of_stake() {
            stake.flags |= BlockFlags::PROOF_OF_STAKE;
            stake.prevout_stake = block.transactions[1].inputs[0].prevout;
            stake.stake_time = block.header.time;
        }
        stake
    }

    pub fn is_proof_of_stake(&self) -> bool {
        self.flags.contains(BlockFlags::PROOF_OF_STAKE)
    }

    pub fn is_proof_of_work(&self) -> bool {
        !self.is_proof_of_stake()
    }

    pub fn stake_entropy_bit(&self) -> bool {
        self.flags.contains(BlockFlags::STAKE_ENTROPY)
    }

    pub fn set_stake_entropy_bit(&mut self, bit: bool) {
        self.flags.set(BlockFlags::STAKE_ENTROPY, bit);
    }

    pub fn generated_stake_modifier(&self) -> bool {
        self.flags.contains(BlockFlags::STAKE_MODIFIER)
    }

    pub fn set_stake_modifier(&mut self, modifier: Uint256, generated: bool) {
        self.stake_modifier_v2 = modifier;
        self.flags.set(BlockFlags::STAKE_MODIFIER, generated);
    }
}

impl Encodable for BlockStake {
    fn encode<W: Write>(&self, s: &mut WriteStream<W>) -> io::Result<()> {
        s.write(&CompactVarInt(self.flags.bits() as u64))?;
        s.write(&self.stake_modifier_v2)?;
        s.write(&self.prevout_stake)?;
        s.write_u32(self.stake_time)?;
        s.write(&self.hash_proof)
    }
}

impl Decodable for BlockStake {
    fn decode(s: &mut ReadStream<'_>) -> std::result::Result<Self, SerializationError> {
        let CompactVarInt(flags) = s.read()?;
        Ok(BlockStake {
            flags: BlockFlags::from_bits_retain(flags as u32),
            stake_modifier_v2: s.read()?,
            prevout_stake: s.read()?,
            stake_time: s.read_u32()?,
            hash_proof: s.read()?,
        })
    }
}

/// Entropy bit of a block: the lowest bit of its hash.
pub fn stake_entropy_bit(block_hash: &Uint256) -> bool {
    block_hash.as_bytes()[0] & 1 == 1
}

/// Proof-of-stake block times sit on `mask + 1` second boundaries.
pub fn check_stake_timestamp(time: u32, mask: u32) -> bool {
    time & mask == 0
}

/// Stake modifier v2 of a block: sha256d(kernel ‖ previous modifier).
///
/// The kernel is the staked prevout hash for proof-of-stake blocks and the
/// block hash for proof-of-work blocks. Genesis (no previous) has modifier zero.
pub fn compute_stake_modifier_v2(prev: Option<&BlockStake>, kernel: &Uint256) -> Uint256 {
    let prev = match prev {
        Some(prev) => prev,
        None => return Uint256::ZERO,
    };
    let mut s = WriteStream::new(HashWriter::new(), SerializationContext::hash());
    s.write(kernel)
        .and_then(|_| s.write(&prev.stake_modifier_v2))
        .expect("in-memory writers don't error");
    s.into_inner().finalize()
}

/// sha256d(modifier ‖ coin time ‖ prevout hash ‖ prevout index ‖ block time)
pub fn stake_kernel_hash(modifier: &Uint256, coin_time: u32, prevout: &OutPoint, block_time: u32) -> Uint256 {
    let mut s = WriteStream::new(HashWriter::new(), SerializationContext::hash());
    s.write(modifier)
        .and_then(|_| s.write_u32(coin_time))
        .and_then(|_| s.write(&prevout.hash))
        .and_then(|_| s.write_u32(prevout.n))
        .and_then(|_| s.write_u32(block_time))
        .expect("in-memory writers don't error");
    s.into_inner().finalize()
}

/// CheckStakeKernelHash: stake × bits × coin × prevout × time → kernel hash
///
/// 1. block time < coin time: `StakeTimeViolation`
/// 2. weighted target = target(bits) × coin value
/// 3. kernel hash > weighted target: `StakeHashInvalidTarget`
///
/// A weighted target wider than 256 bits is met by every kernel.
pub fn check_stake_kernel_hash(
    prev_stake: &BlockStake,
    bits: u32,
    coin: &Coin,
    prevout: &OutPoint,
    block_time: u32,
) -> Result<Uint256> {
    if block_time < coin.time {
        return Err(ConsensusError::StakeTimeViolation);
    }
    let (target, _, _) = U256::from_compact(bits);
    let value = u64::try_from(coin.output.value).unwrap_or(0);
    let kernel = stake_kernel_hash(&prev_stake.stake_modifier_v2, coin.time, prevout, block_time);
    if let Some(weighted_target) = target.checked_mul_u64(value) {
        if U256::from_uint256(&kernel) > weighted_target {
            return Err(ConsensusError::StakeHashInvalidTarget);
        }
    }
    Ok(kernel)
}

/// Public key a proof-of-stake block must be signed with.
///
/// Pay-to-pubkey coinstake outputs name it directly. For key-hash and
/// cold-staking outputs it is the key that signed the first coinstake input
/// (last push of its scriptSig, or last witness item), and it must hash to
/// the key hash the output commits to.
pub fn block_signature_pubkey(block: &Block) -> Option<Vec<u8>> {
    let coinstake = block.transactions.get(1)?;
    let output = coinstake.outputs.get(1)?;
    if let Some(pubkey) = standard::extract_pubkey(&output.script_pubkey) {
        return Some(pubkey.to_vec());
    }

    let expected: Uint160 = match standard::extract_destination(&output.script_pubkey) {
        Some(TxDestination::KeyHash(hash)) | Some(TxDestination::WitnessKeyHash(hash)) => hash,
        _ => standard::extract_cold_staking(&output.script_pubkey).map(|(hot, _)| hot)?,
    };
    let input = coinstake.inputs.first()?;
    let pubkey = match input.script_sig.last_push() {
        Some(pubkey) => pubkey.to_vec(),
        None => input.witness.last()?.clone(),
    };
    if Uint160::from_bytes(crate::crypto::hash160(&pubkey)) != expected {
        return None;
    }
    Some(pubkey)
}

/// CheckBlockSignature: block → {true, false}
///
/// Proof-of-work blocks carry no signature. Proof-of-stake blocks carry a DER
/// ECDSA signature over the block hash by the coinstake key.
pub fn check_block_signature<C: Verification>(secp: &Secp256k1<C>, block: &Block) -> bool {
    if block.is_proof_of_work() {
        return block.signature.is_empty();
    }
    if block.signature.is_empty() {
        return false;
    }
    match block_signature_pubkey(block) {
        Some(pubkey) => keys::verify_ecdsa(secp, &pubkey, &block.signature, block.hash().as_bytes()),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{Builder, Script};
    use crate::serialization::{deserialize, serialize};
    use crate::types::{BlockHeader, Transaction, TxIn, TxOut};
    use secp256k1::{Message, PublicKey, SecretKey};

    fn coinstake_block(stake_output: Script, script_sig: Script) -> Block {
        let coinbase = Transaction {
            version: 1,
            inputs: vec![TxIn::new(OutPoint::null(), Builder::new().push_int(1).push_int(1).into_script())],
            outputs: vec![TxOut::new(0, Script::new())],
            lock_time: 0,
        };
        let coinstake = Transaction {
            version: 1,
            inputs: vec![TxIn::new(OutPoint::new(Uint256::ONE, 0), script_sig)],
            outputs: vec![TxOut::new(0, Script::new()), TxOut::new(10, stake_output)],
            lock_time: 0,
        };
        Block {
            header: BlockHeader {
                version: 1,
                prev_block_hash: Uint256::ZERO,
                merkle_root: Uint256::ZERO,
                time: 1_600_000_000,
                bits: 0x207fffff,
                nonce: 0,
            },
            transactions: vec![coinbase, coinstake],
            signature: Vec::new(),
        }
    }

    fn sign(block: &mut Block, secret: &SecretKey) {
        let secp = Secp256k1::new();
        let message = Message::from_digest_slice(block.hash().as_bytes()).unwrap();
        block.signature = secp.sign_ecdsa(&message, secret).serialize_der().to_vec();
    }

    #[test]
    fn test_new_stake_record() {
        let mut block = coinstake_block(Script::new(), Script::new());
        let stake = BlockStake::new(&block);
        assert!(stake.is_proof_of_stake());
        assert_eq!(stake.prevout_stake, OutPoint::new(Uint256::ONE, 0));
        assert_eq!(stake.stake_time, 1_600_000_000);

        block.transactions.truncate(1);
        let stake = BlockStake::new(&block);
        assert!(stake.is_proof_of_work());
        assert!(stake.prevout_stake.is_null());
        assert_eq!(stake, BlockStake::default());
    }

    #[test]
    fn test_block_stake_encoding() {
        let mut stake = BlockStake {
            prevout_stake: OutPoint::new(Uint256::ONE, 3),
            stake_time: 1234,
            ..BlockStake::default()
        };
        stake.flags = BlockFlags::PROOF_OF_STAKE | BlockFlags::STAKE_MODIFIER;
        let bytes = serialize(&stake);
        assert_eq!(bytes[0], 0x05);
        assert_eq!(bytes.len(), 1 + 32 + 36 + 4 + 32);
        assert_eq!(deserialize::<BlockStake>(&bytes).unwrap(), stake);
    }

    #[test]
    fn test_stake_modifier_chain() {
        let kernel = Uint256::ONE;
        assert_eq!(compute_stake_modifier_v2(None, &kernel), Uint256::ZERO);

        let genesis = BlockStake::default();
        let first = compute_stake_modifier_v2(Some(&genesis), &kernel);
        let mut preimage = kernel.as_bytes().to_vec();
        preimage.extend_from_slice(Uint256::ZERO.as_bytes());
        assert_eq!(first, crate::types::hash256(&preimage));
    }

    #[test]
    fn test_kernel_hash_layout() {
        let prevout = OutPoint::new(Uint256::ONE, 7);
        let mut preimage = Vec::new();
        preimage.extend_from_slice(&[0u8; 32]);
        preimage.extend_from_slice(&100u32.to_le_bytes());
        preimage.extend_from_slice(Uint256::ONE.as_bytes());
        preimage.extend_from_slice(&7u32.to_le_bytes());
        preimage.extend_from_slice(&200u32.to_le_bytes());
        assert_eq!(stake_kernel_hash(&Uint256::ZERO, 100, &prevout, 200), crate::types::hash256(&preimage));
    }

    #[test]
    fn test_kernel_time_violation() {
        let mut coin = Coin::new(TxOut::new(1000, Script::new()), 1);
        coin.time = 500;
        let result = check_stake_kernel_hash(&BlockStake::default(), 0x207fffff, &coin, &OutPoint::new(Uint256::ONE, 0), 499);
        assert_eq!(result, Err(ConsensusError::StakeTimeViolation));
    }

    #[test]
    fn test_kernel_target_weighting() {
        let mut coin = Coin::new(TxOut::new(1, Script::new()), 1);
        coin.time = 100;
        let prevout = OutPoint::new(Uint256::ONE, 0);
        // Target 1 × value 1: practically no kernel meets it
        let result = check_stake_kernel_hash(&BlockStake::default(), 0x01010000, &coin, &prevout, 160);
        assert_eq!(result, Err(ConsensusError::StakeHashInvalidTarget));
        // An easy target times a large value overflows 256 bits and always passes
        coin.output.value = 21_000_000 * crate::constants::COIN;
        assert!(check_stake_kernel_hash(&BlockStake::default(), 0x207fffff, &coin, &prevout, 160).is_ok());
    }

    #[test]
    fn test_timestamp_mask_and_entropy() {
        assert!(check_stake_timestamp(1_600_000_000, 0x0f));
        assert!(!check_stake_timestamp(1_600_000_001, 0x0f));
        assert!(stake_entropy_bit(&Uint256::ONE));
        assert!(!stake_entropy_bit(&Uint256::ZERO));
    }

    #[test]
    fn test_pay_to_pubkey_block_signature() {
        let secp = Secp256k1::new();
        let secret = SecretKey::from_slice(&[0x11; 32]).unwrap();
        let pubkey = PublicKey::from_secret_key(&secp, &secret).serialize();
        let mut block = coinstake_block(standard::pay_to_pubkey(&pubkey), Script::new());
        assert!(block.is_proof_of_stake());
        assert!(!check_block_signature(&secp, &block));
        sign(&mut block, &secret);
        assert!(check_block_signature(&secp, &block));

        let other = SecretKey::from_slice(&[0x22; 32]).unwrap();
        sign(&mut block, &other);
        assert!(!check_block_signature(&secp, &block));
    }

    #[test]
    fn test_key_hash_block_signature_uses_input_key() {
        let secp = Secp256k1::new();
        let secret = SecretKey::from_slice(&[0x33; 32]).unwrap();
        let pubkey = PublicKey::from_secret_key(&secp, &secret).serialize();
        let hash = Uint160::from_bytes(crate::crypto::hash160(&pubkey));
        let script_sig = Builder::new().push_slice(&[0x30; 71]).push_slice(&pubkey).into_script();
        let mut block = coinstake_block(standard::pay_to_key_hash(&hash), script_sig);
        sign(&mut block, &secret);
        assert!(check_block_signature(&secp, &block));

        // Cold staking output: the hot key signs
        let cold = Uint160::from_bytes([9; 20]);
        block.transactions[1].outputs[1].script_pubkey = standard::cold_staking_script(&hash, &cold);
        sign(&mut block, &secret);
        assert!(check_block_signature(&secp, &block));

        // Key that does not hash to the output's key hash
        block.transactions[1].outputs[1].script_pubkey = standard::pay_to_key_hash(&cold);
        sign(&mut block, &secret);
        assert!(!check_block_signature(&secp, &block));
    }

    #[test]
    fn test_proof_of_work_block_must_be_unsigned() {
        let secp = Secp256k1::verification_only();
        let mut block = coinstake_block(Script::new(), Script::new());
        block.transactions.truncate(1);
        assert!(check_block_signature(&secp, &block));
        block.signature = vec![0x30];
        assert!(!check_block_signature(&secp, &block));
    }
}
