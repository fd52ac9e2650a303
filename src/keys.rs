//! Public keys, signatures and extended keys
//!
//! Encoding predicates (strict DER, low-S, defined hash type, public key
//! format) are pure byte checks; the interpreter applies each one only when
//! the matching verification flag is set. Verification itself always parses
//! signatures laxly and normalizes S first, so historical high-S signatures
//! still verify when no flag forbids them.

use crate::crypto;
use crate::error::SerializationError;
use crate::serialization::{Decodable, Encodable, ReadStream, WriteStream};
use secp256k1::ecdsa::Signature;
use secp256k1::{schnorr, Message, PublicKey, Scalar, Secp256k1, SecretKey, Signing, Verification, XOnlyPublicKey};
use std::io::{self, Write};
use thiserror::Error;

/// SIGHASH_ALL .. SIGHASH_SINGLE and the ANYONECANPAY modifier
const SIGHASH_ALL: u8 = 0x01;
const SIGHASH_SINGLE: u8 = 0x03;
const SIGHASH_ANYONECANPAY: u8 = 0x80;

/// BIP32 hardened derivation offset
pub const HARDENED_KEY_START: u32 = 0x8000_0000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("derived key is invalid, retry with the next index")]
    InvalidDerivation,

    #[error("secp256k1: {0}")]
    Secp256k1(#[from] secp256k1::Error),
}

/// 33-byte compressed (02/03) or 65-byte uncompressed (04) public key.
pub fn is_compressed_or_uncompressed_pubkey(pubkey: &[u8]) -> bool {
    match pubkey.first() {
        Some(0x04) => pubkey.len() == 65,
        Some(0x02) | Some(0x03) => pubkey.len() == 33,
        _ => false,
    }
}

pub fn is_compressed_pubkey(pubkey: &[u8]) -> bool {
    pubkey.len() == 33 && matches!(pubkey[0], 0x02 | 0x03)
}

/// BIP66 strict DER check over a signature with its trailing hash-type byte.
///
/// Format: 0x30 [total-length] 0x02 [R-length] [R] 0x02 [S-length] [S] [sighash]
pub fn is_valid_signature_encoding(sig: &[u8]) -> bool {
    // Minimum and maximum size constraints
    if sig.len() < 9 || sig.len() > 73 {
        return false;
    }
    // A signature is of type 0x30 (compound)
    if sig[0] != 0x30 {
        return false;
    }
    // Length covers the entire signature minus the type, length and hash-type bytes
    if sig[1] as usize != sig.len() - 3 {
        return false;
    }
    let len_r = sig[3] as usize;
    if 5 + len_r >= sig.len() {
        return false;
    }
    let len_s = sig[5 + len_r] as usize;
    if len_r + len_s + 7 != sig.len() {
        return false;
    }
    // R: integer, non-empty, non-negative, no unnecessary leading zero
    if sig[2] != 0x02 || len_r == 0 || sig[4] & 0x80 != 0 {
        return false;
    }
    if len_r > 1 && sig[4] == 0x00 && sig[5] & 0x80 == 0 {
        return false;
    }
    // S: same rules
    if sig[len_r + 4] != 0x02 || len_s == 0 || sig[len_r + 6] & 0x80 != 0 {
        return false;
    }
    if len_s > 1 && sig[len_r + 6] == 0x00 && sig[len_r + 7] & 0x80 == 0 {
        return false;
    }
    true
}

/// S is at most half the curve order. `sig` excludes the hash-type byte.
pub fn is_low_s(sig: &[u8]) -> bool {
    match Signature::from_der_lax(sig) {
        Ok(parsed) => {
            let mut normalized = parsed;
            normalized.normalize_s();
            normalized == parsed
        }
        Err(_) => false,
    }
}

/// Hash-type byte (ignoring ANYONECANPAY) is ALL, NONE or SINGLE.
pub fn is_defined_hashtype_signature(sig: &[u8]) -> bool {
    match sig.last() {
        Some(last) => {
            let base = last & !SIGHASH_ANYONECANPAY;
            (SIGHASH_ALL..=SIGHASH_SINGLE).contains(&base)
        }
        None => false,
    }
}

/// ECDSA verification over a 32-byte digest. `sig` is DER without the hash-type byte.
pub fn verify_ecdsa<C: Verification>(secp: &Secp256k1<C>, pubkey: &[u8], sig: &[u8], digest: &[u8; 32]) -> bool {
    let Ok(pubkey) = PublicKey::from_slice(pubkey) else {
        return false;
    };
    let Ok(mut signature) = Signature::from_der_lax(sig) else {
        return false;
    };
    signature.normalize_s();
    let Ok(message) = Message::from_digest_slice(digest) else {
        return false;
    };
    secp.verify_ecdsa(&message, &signature, &pubkey).is_ok()
}

/// BIP340 verification of a 64-byte signature against a 32-byte x-only key.
pub fn verify_schnorr<C: Verification>(secp: &Secp256k1<C>, xonly: &[u8], sig: &[u8], digest: &[u8; 32]) -> bool {
    let Ok(key) = XOnlyPublicKey::from_slice(xonly) else {
        return false;
    };
    let Ok(signature) = schnorr::Signature::from_slice(sig) else {
        return false;
    };
    let Ok(message) = Message::from_digest_slice(digest) else {
        return false;
    };
    secp.verify_schnorr(&signature, &message, &key).is_ok()
}

/// BIP32 extended private key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtKey {
    pub depth: u8,
    pub parent_fingerprint: [u8; 4],
    pub child_number: u32,
    pub chain_code: [u8; 32],
    pub secret_key: SecretKey,
}

impl ExtKey {
    /// Master key from a seed: HMAC-SHA512 keyed with "Bitcoin seed".
    pub fn new_master(seed: &[u8]) -> Result<Self, KeyError> {
        let mac = crypto::hmac_sha512(b"Bitcoin seed", seed);
        let secret_key = SecretKey::from_slice(&mac[..32])?;
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&mac[32..]);
        Ok(ExtKey {
            depth: 0,
            parent_fingerprint: [0; 4],
            child_number: 0,
            chain_code,
            secret_key,
        })
    }

    pub fn public_key<C: Signing>(&self, secp: &Secp256k1<C>) -> PublicKey {
        PublicKey::from_secret_key(secp, &self.secret_key)
    }

    /// First four bytes of HASH160 of the compressed public key.
    pub fn fingerprint<C: Signing>(&self, secp: &Secp256k1<C>) -> [u8; 4] {
        let id = crypto::hash160(&self.public_key(secp).serialize());
        [id[0], id[1], id[2], id[3]]
    }

    /// Private child derivation; indices >= `HARDENED_KEY_START` are hardened.
    pub fn derive_child<C: Signing>(&self, secp: &Secp256k1<C>, index: u32) -> Result<ExtKey, KeyError> {
        let mut data = Vec::with_capacity(37);
        if index >= HARDENED_KEY_START {
            data.push(0x00);
            data.extend_from_slice(&self.secret_key.secret_bytes());
        } else {
            data.extend_from_slice(&self.public_key(secp).serialize());
        }
        data.extend_from_slice(&index.to_be_bytes());
        let mac = crypto::hmac_sha512(&self.chain_code, &data);

        let mut tweak_bytes = [0u8; 32];
        tweak_bytes.copy_from_slice(&mac[..32]);
        let tweak = Scalar::from_be_bytes(tweak_bytes).map_err(|_| KeyError::InvalidDerivation)?;
        let secret_key = self
            .secret_key
            .add_tweak(&tweak)
            .map_err(|_| KeyError::InvalidDerivation)?;
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&mac[32..]);

        Ok(ExtKey {
            depth: self.depth.wrapping_add(1),
            parent_fingerprint: self.fingerprint(secp),
            child_number: index,
            chain_code,
            secret_key,
        })
    }
}

impl Encodable for ExtKey {
    /// 74 bytes: depth, parent fingerprint, child number (big-endian), chain code, 0x00 || key.
    fn encode<W: Write>(&self, s: &mut WriteStream<W>) -> io::Result<()> {
        s.write_u8(self.depth)?;
        s.write_bytes(&self.parent_fingerprint)?;
        s.with_big_endian(|s| s.write_u32(self.child_number))?;
        s.write_bytes(&self.chain_code)?;
        s.write_u8(0x00)?;
        s.write_bytes(&self.secret_key.secret_bytes())
    }
}

impl Decodable for ExtKey {
    fn decode(s: &mut ReadStream<'_>) -> Result<Self, SerializationError> {
        let depth = s.read_u8()?;
        let parent_fingerprint = s.read_array()?;
        let child_number = s.with_big_endian(|s| s.read_u32())?;
        let chain_code = s.read_array()?;
        if s.read_u8()? != 0x00 {
            return Err(SerializationError::InvalidKeyMaterial);
        }
        let key: [u8; 32] = s.read_array()?;
        let secret_key = SecretKey::from_slice(&key).map_err(|_| SerializationError::InvalidKeyMaterial)?;
        Ok(ExtKey {
            depth,
            parent_fingerprint,
            child_number,
            chain_code,
            secret_key,
        })
    }
}
