//! Error types for consensus validation
//!
//! `ConsensusError` is the closed catalogue of block and transaction rejection
//! reasons. Every variant owns a stable code string (`code()`) that peers, RPC
//! surfaces and logs rely on verbatim, and a human readable message (`Display`).

use crate::interpreter::ScriptError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    // ===== HEADER =====
    #[error("block's timestamp is too early")]
    TimeTooOld,

    #[error("block timestamp too far in the future")]
    TimeTooNew,

    #[error("incorrect proof of work")]
    BadDiffBits,

    #[error("proof of work failed")]
    HighHash,

    #[error("block version rejected")]
    BadVersion,

    #[error("block header hash does not match the checkpointed value")]
    CheckpointViolation,

    #[error("previous block hash does not match the chained header")]
    BadPrevBlock,

    #[error("invalid previous tip")]
    InvalidPrevTip,

    // ===== BLOCK INTEGRITY =====
    #[error("hashMerkleRoot mismatch")]
    BadMerkleRoot,

    #[error("duplicate transaction")]
    BadTransactionDuplicate,

    #[error("first tx is not coinbase")]
    BadCoinbaseMissing,

    #[error("more than one coinbase")]
    BadMultipleCoinbase,

    #[error("size limits failed")]
    BadBlockLength,

    #[error("weight limit failed")]
    BadBlockWeight,

    #[error("out-of-bounds SigOpCount")]
    BadBlockSigOps,

    #[error("invalid witness nonce size")]
    BadWitnessNonceSize,

    #[error("witness merkle commitment mismatch")]
    BadWitnessMerkleMatch,

    #[error("unexpected witness data found")]
    UnexpectedWitness,

    // ===== TRANSACTION (STATELESS) =====
    #[error("transaction has no inputs")]
    BadTransactionNoInput,

    #[error("transaction has no outputs")]
    BadTransactionNoOutput,

    #[error("transaction larger than max block weight")]
    BadTransactionOversize,

    #[error("transaction output negative")]
    BadTransactionNegativeOutput,

    #[error("transaction output too large")]
    BadTransactionTooLargeOutput,

    #[error("transaction total output too large")]
    BadTransactionTooLargeTotalOutput,

    #[error("duplicate inputs")]
    BadTransactionDuplicateInputs,

    #[error("coinbase script size out of range")]
    BadCoinbaseSize,

    #[error("transaction input refers to a null previous output")]
    BadTransactionNullPrevout,

    #[error("non-final transaction")]
    BadTransactionNonFinal,

    #[error("block height mismatch in coinbase")]
    BadCoinbaseHeight,

    // ===== TRANSACTION (STATEFUL) =====
    #[error("tried to overwrite transaction")]
    BadTransactionBip30,

    #[error("input missing or already spent")]
    BadTransactionMissingInput,

    #[error("tried to spend coinbase at depth below maturity")]
    BadTransactionPrematureCoinbaseSpending,

    #[error("tried to spend coinstake at depth below maturity")]
    BadTransactionPrematureCoinstakeSpending,

    #[error("input values out of range")]
    BadTransactionInputValueOutOfRange,

    #[error("value in < value out")]
    BadTransactionInBelowOut,

    #[error("fee is negative")]
    BadTransactionNegativeFee,

    #[error("fee out of range")]
    BadTransactionFeeOutOfRange,

    #[error("coinbase pays too much")]
    BadCoinbaseAmount,

    #[error("coinstake pays too much")]
    BadCoinstakeAmount,

    #[error("script verification failed: {0}")]
    BadTransactionScriptError(ScriptError),

    // ===== PROOF OF STAKE =====
    #[error("coinstake is not the second transaction")]
    NonCoinstake,

    #[error("could not read the staked output")]
    ReadTxPrevFailed,

    #[error("staked output has not reached the minimum depth")]
    InvalidStakeDepth,

    #[error("coinstake time violation")]
    StakeTimeViolation,

    #[error("previous stake modifier is missing")]
    PrevStakeNull,

    #[error("kernel hash does not meet the stake target")]
    StakeHashInvalidTarget,

    #[error("coinstake has no outputs after the marker")]
    EmptyCoinstake,

    #[error("more than one coinstake")]
    BadMultipleCoinstake,

    #[error("coinstake found in a proof of work block")]
    BadStakeBlock,

    #[error("coinstake input signature failed to verify")]
    CoinstakeVerifySignatureFailed,

    #[error("block timestamp is too far in the future of the coinstake")]
    BlockTimestampTooFar,

    #[error("block timestamp is earlier than the previous median")]
    BlockTimestampTooEarly,

    #[error("bad block signature")]
    BadBlockSignature,

    #[error("proof of work block after the last proof of work height")]
    ProofOfWorkTooHigh,

    #[error("could not derive the stake entropy bit")]
    SetStakeEntropyBitFailed,

    #[error("stake modifier could not be computed")]
    ModifierNotFound,

    #[error("cold staking amount decreased")]
    BadColdstakeAmount,

    #[error("cold staking inputs spend different scripts")]
    BadColdstakeInputs,

    #[error("cold staking outputs do not return to the staking script")]
    BadColdstakeOutputs,

    // ===== REORGANIZATION =====
    #[error("undo data does not match the disconnected block")]
    BadUndoData,

    #[error("block is not part of the current chain")]
    BlockNotInChain,
}

impl ConsensusError {
    /// Stable rejection code, shared with peers and RPC consumers.
    pub fn code(&self) -> &'static str {
        use ConsensusError::*;
        match self {
            TimeTooOld => "time-too-old",
            TimeTooNew => "time-too-new",
            BadDiffBits => "bad-diffbits",
            HighHash => "high-hash",
            BadVersion => "bad-version",
            CheckpointViolation => "checkpoint-violation",
            BadPrevBlock => "bad-prevblk",
            InvalidPrevTip => "invalid-prev-tip",
            BadMerkleRoot => "bad-txnmrklroot",
            BadTransactionDuplicate => "bad-txns-duplicate",
            BadCoinbaseMissing => "bad-cb-missing",
            BadMultipleCoinbase => "bad-cb-multiple",
            BadBlockLength => "bad-blk-length",
            BadBlockWeight => "bad-blk-weight",
            BadBlockSigOps => "bad-blk-sigops",
            BadWitnessNonceSize => "bad-witness-nonce-size",
            BadWitnessMerkleMatch => "bad-witness-merkle-match",
            UnexpectedWitness => "unexpected-witness",
            BadTransactionNoInput => "bad-txns-vin-empty",
            BadTransactionNoOutput => "bad-txns-vout-empty",
            BadTransactionOversize => "bad-txns-oversize",
            BadTransactionNegativeOutput => "bad-txns-vout-negative",
            BadTransactionTooLargeOutput => "bad-txns-vout-toolarge",
            BadTransactionTooLargeTotalOutput => "bad-txns-txouttotal-toolarge",
            BadTransactionDuplicateInputs => "bad-txns-inputs-duplicate",
            BadCoinbaseSize => "bad-cb-length",
            BadTransactionNullPrevout => "bad-txns-prevout-null",
            BadTransactionNonFinal => "bad-txns-nonfinal",
            BadCoinbaseHeight => "bad-cb-height",
            BadTransactionBip30 => "bad-txns-BIP30",
            BadTransactionMissingInput => "bad-txns-inputs-missingorspent",
            BadTransactionPrematureCoinbaseSpending => "bad-txns-premature-spend-of-coinbase",
            BadTransactionPrematureCoinstakeSpending => "bad-txns-premature-spend-of-coinstake",
            BadTransactionInputValueOutOfRange => "bad-txns-inputvalues-outofrange",
            BadTransactionInBelowOut => "bad-txns-in-belowout",
            BadTransactionNegativeFee => "bad-txns-fee-negative",
            BadTransactionFeeOutOfRange => "bad-txns-fee-outofrange",
            BadCoinbaseAmount => "bad-cb-amount",
            BadCoinstakeAmount => "bad-cs-amount",
            BadTransactionScriptError(_) => "mandatory-script-verify-flag-failed",
            NonCoinstake => "non-coinstake",
            ReadTxPrevFailed => "read-txPrev-failed",
            InvalidStakeDepth => "invalid-stake-depth",
            StakeTimeViolation => "stake-time-violation",
            PrevStakeNull => "prev-stake-null",
            StakeHashInvalidTarget => "proof-of-stake-hash-invalid-target",
            EmptyCoinstake => "empty-coinstake",
            BadMultipleCoinstake => "bad-cs-multiple",
            BadStakeBlock => "bad-stake-block",
            CoinstakeVerifySignatureFailed => "verify-signature-failed-on-coinstake",
            BlockTimestampTooFar => "block-timestamp-to-far",
            BlockTimestampTooEarly => "block-timestamp-to-early",
            BadBlockSignature => "bad-block-signature",
            ProofOfWorkTooHigh => "proof-of-work-too-heigh",
            SetStakeEntropyBitFailed => "set-stake-entropy-bit-failed",
            ModifierNotFound => "modifier-not-found",
            BadColdstakeAmount => "bad-cold-stake-amount",
            BadColdstakeInputs => "bad-cold-stake-inputs",
            BadColdstakeOutputs => "bad-cold-stake-outputs",
            BadUndoData => "bad-undo-data",
            BlockNotInChain => "block-not-in-chain",
        }
    }
}

/// Outcome of a full validation call that did not produce a verdict about the block.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{}: {}", .0.code(), .0)]
    Consensus(#[from] ConsensusError),

    #[error("validation cancelled before commit")]
    Cancelled,
}

impl ValidationError {
    /// The consensus error behind this failure, if the block was judged.
    pub fn consensus_error(&self) -> Option<&ConsensusError> {
        match self {
            ValidationError::Consensus(err) => Some(err),
            ValidationError::Cancelled => None,
        }
    }
}

/// Decoding failures. Fatal to the current parse; no partial object escapes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SerializationError {
    #[error("end of data")]
    EndOfStream,

    #[error("non-canonical VarInt")]
    NonCanonicalVarInt,

    #[error("CompactVarInt exceeds 64 bits")]
    CompactVarIntOverflow,

    #[error("vector of {0} bytes exceeds the allocation limit")]
    OversizedVector(u64),

    #[error("unknown transaction optional data")]
    UnknownTransactionOptionalData,

    #[error("superfluous witness record")]
    SuperfluousWitnessRecord,

    #[error("data not consumed entirely when deserializing")]
    TrailingBytes,

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("invalid key material")]
    InvalidKeyMaterial,
}

pub type Result<T> = std::result::Result<T, ConsensusError>;
