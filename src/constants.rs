//! Protocol constants shared by the codec, interpreter and rule pipeline

/// Satoshis per coin
pub const COIN: i64 = 100_000_000;

/// Maximum money supply in satoshis
pub const MAX_MONEY: i64 = 21_000_000 * COIN;

/// Maximum script length in bytes
pub const MAX_SCRIPT_SIZE: usize = 10_000;

/// Maximum size of a single stack element
pub const MAX_SCRIPT_ELEMENT_SIZE: usize = 520;

/// Maximum number of non-push operations per script
pub const MAX_OPS_PER_SCRIPT: usize = 201;

/// Maximum combined size of the main and alt stacks
pub const MAX_STACK_SIZE: usize = 1000;

/// Maximum number of public keys per CHECKMULTISIG
pub const MAX_PUBKEYS_PER_MULTISIG: usize = 20;

/// Default byte length of a script number operand
pub const DEFAULT_SCRIPT_NUM_SIZE: usize = 4;

/// Byte length of the CHECKLOCKTIMEVERIFY and CHECKSEQUENCEVERIFY operands
pub const LOCKTIME_SCRIPT_NUM_SIZE: usize = 5;

/// Witness data counts 1/4 towards block weight
pub const WITNESS_SCALE_FACTOR: usize = 4;

/// Maximum block weight
pub const MAX_BLOCK_WEIGHT: usize = 4_000_000;

/// Maximum serialized block size including witness data
pub const MAX_BLOCK_SERIALIZED_SIZE: usize = 4_000_000;

/// Legacy block size limit (stripped size)
pub const MAX_BLOCK_BASE_SIZE: usize = 1_000_000;

/// Maximum sig-op cost per block
pub const MAX_BLOCK_SIGOPS_COST: u64 = 80_000;

/// Lock times below this are block heights, above are UNIX timestamps
pub const LOCKTIME_THRESHOLD: u32 = 500_000_000;

/// Sequence number that disables lock time and relative lock time for an input
pub const SEQUENCE_FINAL: u32 = 0xffff_ffff;

/// BIP68: if set, the sequence number carries no relative lock time
pub const SEQUENCE_LOCKTIME_DISABLE_FLAG: u32 = 1 << 31;

/// BIP68: if set, the relative lock time is in units of 512 seconds
pub const SEQUENCE_LOCKTIME_TYPE_FLAG: u32 = 1 << 22;

/// BIP68: mask extracting the relative lock time value
pub const SEQUENCE_LOCKTIME_MASK: u32 = 0x0000_ffff;

/// BIP68: time-based relative lock times are shifted by this many bits (512 s granularity)
pub const SEQUENCE_LOCKTIME_GRANULARITY: u32 = 9;

/// Blocks a coinbase output must wait before it can be spent
pub const COINBASE_MATURITY: u32 = 100;

/// Number of past headers used for median time past
pub const MEDIAN_TIME_SPAN: usize = 11;

/// Maximum seconds a header may be ahead of adjusted time
pub const MAX_FUTURE_BLOCK_TIME: u32 = 2 * 60 * 60;

/// Halving interval: 210,000 blocks
pub const HALVING_INTERVAL: u32 = 210_000;

/// Initial block subsidy: 50 coins
pub const INITIAL_SUBSIDY: i64 = 50 * COIN;

/// Difficulty adjustment interval: 2016 blocks
pub const DIFFICULTY_ADJUSTMENT_INTERVAL: u32 = 2016;

/// Target time per block: 10 minutes
pub const TARGET_TIME_PER_BLOCK: u32 = 600;

/// Minimum difficulty in compact form
pub const MAX_TARGET: u32 = 0x1d00ffff;

/// Versionbits: top three bits of a signalling header version
pub const VERSIONBITS_TOP_BITS: u32 = 0x2000_0000;

/// Versionbits: mask selecting the top three bits
pub const VERSIONBITS_TOP_MASK: u32 = 0xe000_0000;

/// Coinbase scriptSig length bounds
pub const MIN_COINBASE_SCRIPT_SIZE: usize = 2;
pub const MAX_COINBASE_SCRIPT_SIZE: usize = 100;

/// Witness commitment output prefix: OP_RETURN, push 36, 0xaa21a9ed
pub const WITNESS_COMMITMENT_HEADER: [u8; 6] = [0x6a, 0x24, 0xaa, 0x21, 0xa9, 0xed];

/// Minimum size of a witness commitment output script
pub const MIN_WITNESS_COMMITMENT_SIZE: usize = 38;

/// Proof-of-stake: block and coinstake timestamps must be multiples of (mask + 1)
pub const STAKE_TIMESTAMP_MASK: u32 = 0x0000_000f;
