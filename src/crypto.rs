//! Hash primitives
//!
//! Thin wrappers returning fixed-size arrays so callers never depend on a
//! particular hashing crate's output types.

use bitcoin_hashes::{hmac, sha1, sha256, sha256d, sha512, Hash as BitcoinHash, HashEngine};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// SHA256(SHA256(data))
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    sha256d::Hash::hash(data).into_inner()
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(data));
    out
}

pub fn sha1(data: &[u8]) -> [u8; 20] {
    sha1::Hash::hash(data).into_inner()
}

pub fn ripemd160(data: &[u8]) -> [u8; 20] {
    let mut out = [0u8; 20];
    out.copy_from_slice(&Ripemd160::digest(data));
    out
}

/// RIPEMD160(SHA256(data))
pub fn hash160(data: &[u8]) -> [u8; 20] {
    ripemd160(&Sha256::digest(data))
}

/// HMAC-SHA512, the BIP32 derivation primitive.
pub fn hmac_sha512(key: &[u8], data: &[u8]) -> [u8; 64] {
    let mut engine = hmac::HmacEngine::<sha512::Hash>::new(key);
    engine.input(data);
    hmac::Hmac::<sha512::Hash>::from_engine(engine).into_inner()
}

/// Incremental double-SHA256, fed by the hash-mode serializer.
#[derive(Clone, Default)]
pub struct Sha256dEngine(sha256::HashEngine);

impl Sha256dEngine {
    pub fn new() -> Self {
        Sha256dEngine(sha256d::Hash::engine())
    }

    pub fn input(&mut self, data: &[u8]) {
        self.0.input(data);
    }

    pub fn finalize(self) -> [u8; 32] {
        sha256d::Hash::from_engine(self.0).into_inner()
    }
}
