//! Proof of work and difficulty retargeting
//!
//! Targets travel in the 32-bit "compact" encoding of the header's `bits`
//! field and are expanded into a 256-bit integer for comparison against a
//! header hash. All arithmetic is integer arithmetic; no step rounds through
//! floating point.

use crate::chain::ChainedHeader;
use crate::config::ConsensusParams;
use crate::types::Uint256;
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Not, Shl, Shr, Sub};

/// Unsigned 256-bit integer, four 64-bit words, least significant first.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct U256(pub [u64; 4]);

impl U256 {
    pub const ZERO: U256 = U256([0; 4]);
    pub const ONE: U256 = U256([1, 0, 0, 0]);
    pub const MAX: U256 = U256([u64::MAX; 4]);

    pub fn from_u64(value: u64) -> Self {
        U256([value, 0, 0, 0])
    }

    /// Interprets the hash bytes (storage order) as a little-endian integer.
    pub fn from_uint256(hash: &Uint256) -> Self {
        let bytes = hash.as_bytes();
        let mut words = [0u64; 4];
        for (i, word) in words.iter_mut().enumerate() {
            let mut chunk = [0u8; 8];
            chunk.copy_from_slice(&bytes[i * 8..(i + 1) * 8]);
            *word = u64::from_le_bytes(chunk);
        }
        U256(words)
    }

    pub fn to_uint256(&self) -> Uint256 {
        let mut bytes = [0u8; 32];
        for (i, word) in self.0.iter().enumerate() {
            bytes[i * 8..(i + 1) * 8].copy_from_slice(&word.to_le_bytes());
        }
        Uint256::from_bytes(bytes)
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&word| word == 0)
    }

    pub fn low_u64(&self) -> u64 {
        self.0[0]
    }

    /// Position of the highest set bit plus one; zero for zero.
    pub fn bits(&self) -> u32 {
        for i in (0..4).rev() {
            if self.0[i] != 0 {
                return 64 * i as u32 + (64 - self.0[i].leading_zeros());
            }
        }
        0
    }

    pub fn overflowing_add(self, other: U256) -> (U256, bool) {
        let mut result = [0u64; 4];
        let mut carry = false;
        for i in 0..4 {
            let (sum, c1) = self.0[i].overflowing_add(other.0[i]);
            let (sum, c2) = sum.overflowing_add(carry as u64);
            result[i] = sum;
            carry = c1 || c2;
        }
        (U256(result), carry)
    }

    pub fn checked_add(self, other: U256) -> Option<U256> {
        match self.overflowing_add(other) {
            (value, false) => Some(value),
            (_, true) => None,
        }
    }

    /// Multiplication by a 64-bit factor; `None` if the product needs more than 256 bits.
    pub fn checked_mul_u64(self, factor: u64) -> Option<U256> {
        let mut result = [0u64; 4];
        let mut carry: u128 = 0;
        for i in 0..4 {
            let product = self.0[i] as u128 * factor as u128 + carry;
            result[i] = product as u64;
            carry = product >> 64;
        }
        if carry != 0 {
            None
        } else {
            Some(U256(result))
        }
    }

    /// Shift-and-subtract long division; `None` when dividing by zero.
    pub fn checked_div(self, divisor: U256) -> Option<U256> {
        if divisor.is_zero() {
            return None;
        }
        let num_bits = self.bits();
        let div_bits = divisor.bits();
        if div_bits > num_bits {
            return Some(U256::ZERO);
        }
        let mut shift = num_bits - div_bits;
        let mut div = divisor << shift;
        let mut num = self;
        let mut result = U256::ZERO;
        loop {
            if num >= div {
                num = num - div;
                result.0[(shift / 64) as usize] |= 1 << (shift % 64);
            }
            div = div >> 1;
            if shift == 0 {
                break;
            }
            shift -= 1;
        }
        Some(result)
    }

    /// Expands compact bits. Returns `(value, negative, overflow)`.
    ///
    /// The top byte is a base-256 exponent, the low 23 bits the mantissa and
    /// bit 23 a sign. A set sign bit with a non-zero mantissa, or a mantissa
    /// shifted past 256 bits, is reported rather than silently truncated.
    pub fn from_compact(compact: u32) -> (U256, bool, bool) {
        let size = compact >> 24;
        let mut word = compact & 0x007f_ffff;
        let value = if size <= 3 {
            word >>= 8 * (3 - size);
            U256::from_u64(word as u64)
        } else {
            U256::from_u64(word as u64) << (8 * (size - 3))
        };
        let negative = word != 0 && (compact & 0x0080_0000) != 0;
        let overflow = word != 0
            && (size > 34 || (word > 0xff && size > 33) || (word > 0xffff && size > 32));
        (value, negative, overflow)
    }

    /// Compact encoding of a non-negative value, the inverse of `from_compact`
    /// up to loss of precision below the top three bytes.
    pub fn to_compact(&self) -> u32 {
        let mut size = (self.bits() + 7) / 8;
        let mut compact = if size <= 3 {
            (self.low_u64() << (8 * (3 - size))) as u32
        } else {
            (*self >> (8 * (size - 3))).low_u64() as u32
        };
        // The sign bit is set; move the mantissa down a byte and bump the exponent.
        if compact & 0x0080_0000 != 0 {
            compact >>= 8;
            size += 1;
        }
        compact | (size << 24)
    }
}

impl Shl<u32> for U256 {
    type Output = U256;

    fn shl(self, shift: u32) -> U256 {
        if shift >= 256 {
            return U256::ZERO;
        }
        let mut result = U256::ZERO;
        let word_shift = (shift / 64) as usize;
        let bit_shift = shift % 64;
        for i in 0..4 {
            if i + word_shift < 4 {
                result.0[i + word_shift] |= self.0[i] << bit_shift;
                if bit_shift > 0 && i + word_shift + 1 < 4 {
                    result.0[i + word_shift + 1] |= self.0[i] >> (64 - bit_shift);
                }
            }
        }
        result
    }
}

impl Shr<u32> for U256 {
    type Output = U256;

    fn shr(self, shift: u32) -> U256 {
        if shift >= 256 {
            return U256::ZERO;
        }
        let mut result = U256::ZERO;
        let word_shift = (shift / 64) as usize;
        let bit_shift = shift % 64;
        for i in word_shift..4 {
            result.0[i - word_shift] |= self.0[i] >> bit_shift;
            if bit_shift > 0 && i > word_shift {
                result.0[i - word_shift - 1] |= self.0[i] << (64 - bit_shift);
            }
        }
        result
    }
}

impl Not for U256 {
    type Output = U256;

    fn not(self) -> U256 {
        U256([!self.0[0], !self.0[1], !self.0[2], !self.0[3]])
    }
}

/// Wrapping addition.
impl Add for U256 {
    type Output = U256;

    fn add(self, other: U256) -> U256 {
        self.overflowing_add(other).0
    }
}

/// Wrapping subtraction.
impl Sub for U256 {
    type Output = U256;

    fn sub(self, other: U256) -> U256 {
        self + (!other + U256::ONE)
    }
}

impl PartialOrd for U256 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for U256 {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.iter().rev().cmp(other.0.iter().rev())
    }
}

impl fmt::Display for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for word in self.0.iter().rev() {
            write!(f, "{:016x}", word)?;
        }
        Ok(())
    }
}

impl fmt::Debug for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U256({})", self)
    }
}

/// Expands compact bits into a usable target; `None` for negative, zero or overflowing encodings.
pub fn target_from_compact(bits: u32) -> Option<U256> {
    let (target, negative, overflow) = U256::from_compact(bits);
    if negative || overflow || target.is_zero() {
        None
    } else {
        Some(target)
    }
}

/// CheckProofOfWork: ℋ × bits × limit → {true, false}
///
/// 1. Expand `bits`; reject negative, zero and overflowing targets
/// 2. Reject targets easier than `pow_limit`
/// 3. Accept iff hash ≤ target
pub fn check_proof_of_work(hash: &Uint256, bits: u32, pow_limit: u32) -> bool {
    let target = match target_from_compact(bits) {
        Some(target) => target,
        None => return false,
    };
    let (limit, _, _) = U256::from_compact(pow_limit);
    if target > limit {
        return false;
    }
    U256::from_uint256(hash) <= target
}

/// GetBlockProof: bits → work
///
/// Expected number of hashes to find a block at this target:
/// 2²⁵⁶ / (target + 1), computed as ~target / (target + 1) + 1 so it fits in 256 bits.
pub fn get_block_proof(bits: u32) -> U256 {
    match target_from_compact(bits) {
        Some(target) => (!target)
            .checked_div(target + U256::ONE)
            .map_or(U256::ZERO, |work| work + U256::ONE),
        None => U256::ZERO,
    }
}

/// GetNextWorkRequired: ChainedHeader × time → bits
///
/// Bits the block following `last` must carry.
/// 1. Genesis (no `last`): the pow limit
/// 2. Off a retarget boundary: `last.bits`, except on min-difficulty networks where a block
///    more than two spacings late may use the limit, and otherwise inherits the bits of the
///    last block that was not a min-difficulty exception
/// 3. On a boundary: retarget over the previous `interval` blocks
pub fn get_next_work_required(last: Option<&ChainedHeader>, block_time: u32, params: &ConsensusParams) -> u32 {
    let last = match last {
        Some(last) => last,
        None => return params.pow_limit,
    };
    let interval = params.difficulty_adjustment_interval();

    if (last.height + 1) % interval != 0 {
        if params.pow_allow_min_difficulty_blocks {
            if block_time as i64 > last.header.time as i64 + 2 * params.pow_target_spacing as i64 {
                return params.pow_limit;
            }
            let mut walk = last;
            while let Some(previous) = walk.previous.as_deref() {
                if walk.height % interval == 0 || walk.header.bits != params.pow_limit {
                    break;
                }
                walk = previous;
            }
            return walk.header.bits;
        }
        return last.header.bits;
    }

    let first_height = last.height.saturating_sub(interval - 1);
    let first_time = last
        .ancestor(first_height)
        .map_or(last.header.time, |first| first.header.time);
    calculate_next_work_required(last.header.bits, last.header.time, first_time, params)
}

/// CalculateNextWorkRequired: bits × time × time → bits
///
/// 1. actual = last_time − first_time, clamped to [timespan / 4, timespan × 4]
/// 2. new = target(last_bits) × actual / timespan
/// 3. Return min(new, pow_limit) in compact form
pub fn calculate_next_work_required(
    last_bits: u32,
    last_time: u32,
    first_time: u32,
    params: &ConsensusParams,
) -> u32 {
    if params.pow_no_retargeting {
        return last_bits;
    }
    let timespan = params.pow_target_timespan as i64;
    let actual = (last_time as i64 - first_time as i64).clamp(timespan / 4, timespan * 4);

    let (limit, _, _) = U256::from_compact(params.pow_limit);
    let (target, _, _) = U256::from_compact(last_bits);
    let retargeted = target
        .checked_mul_u64(actual as u64)
        .and_then(|scaled| scaled.checked_div(U256::from_u64(timespan as u64)))
        .unwrap_or(limit);

    if retargeted > limit {
        limit.to_compact()
    } else {
        retargeted.to_compact()
    }
}

/// Most recent header at or below `start` whose proof type matches `proof_of_stake`.
fn last_block_of_kind(start: &ChainedHeader, proof_of_stake: bool) -> &ChainedHeader {
    let mut walk = start;
    while walk.is_proof_of_stake() != proof_of_stake {
        match walk.previous.as_deref() {
            Some(previous) => walk = previous,
            None => break,
        }
    }
    walk
}

/// GetNextTargetRequired: ChainedHeader × kind → bits (proof-of-stake networks)
///
/// Targets on a proof-of-stake network retarget every block, separately for proof-of-work
/// and proof-of-stake blocks.
/// 1. Find the last two blocks of the requested kind
/// 2. Either missing (chain too short): the kind's limit
/// 3. Otherwise `calculate_pos_retarget` over the spacing between them
///
/// Networks without proof-of-stake parameters fall back to `get_next_work_required`.
pub fn get_next_target_required(
    prev: Option<&ChainedHeader>,
    block_time: u32,
    proof_of_stake: bool,
    params: &ConsensusParams,
) -> u32 {
    let (limit, spacing, timespan) = match &params.pos {
        Some(pos) if proof_of_stake => (pos.pos_limit, pos.target_spacing, pos.target_timespan),
        Some(pos) => (params.pow_limit, pos.target_spacing, pos.target_timespan),
        None => return get_next_work_required(prev, block_time, params),
    };

    let prev = match prev {
        Some(prev) => prev,
        None => return limit,
    };
    let last = last_block_of_kind(prev, proof_of_stake);
    let before_last = match last.previous.as_deref() {
        Some(previous) => last_block_of_kind(previous, proof_of_stake),
        None => return limit,
    };
    if before_last.previous.is_none() {
        return limit;
    }
    calculate_pos_retarget(
        last.header.time,
        last.header.bits,
        before_last.header.time,
        limit,
        spacing,
        timespan,
    )
}

/// CalculateRetarget: time × bits × time → bits
///
/// 1. actual = first_time − second_time (0 if negative), capped at 10 × spacing
/// 2. interval = timespan / spacing
/// 3. new = target × ((interval − 1) × spacing + 2 × actual) / ((interval + 1) × spacing)
/// 4. Zero or easier than the limit: the limit
pub fn calculate_pos_retarget(
    first_time: u32,
    first_bits: u32,
    second_time: u32,
    limit_bits: u32,
    spacing: u32,
    timespan: u32,
) -> u32 {
    let spacing = spacing as u64;
    let actual = (first_time as u64).saturating_sub(second_time as u64).min(spacing * 10);
    let interval = timespan as u64 / spacing;

    let (limit, _, _) = U256::from_compact(limit_bits);
    let (target, _, _) = U256::from_compact(first_bits);
    let multiply_by = interval.saturating_sub(1) * spacing + 2 * actual;
    let divide_by = (interval + 1) * spacing;

    let retargeted = target
        .checked_mul_u64(multiply_by)
        .and_then(|scaled| scaled.checked_div(U256::from_u64(divide_by)))
        .unwrap_or(limit);

    if retargeted.is_zero() || retargeted > limit {
        limit.to_compact()
    } else {
        retargeted.to_compact()
    }
}
