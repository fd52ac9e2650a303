//! Script interpreter
//!
//! `eval_script` runs one script against a stack; `verify_script` chains the
//! unlocking script, the locking script, P2SH redeem scripts and witness
//! programs. Every encoding rule is gated by its own `ScriptVerify` bit.

use crate::constants::*;
use crate::crypto;
use crate::keys;
use crate::opcodes::*;
use crate::script::{cast_to_bool, Builder, Op, Script, ScriptNum};
use crate::sighash::{signature_hash, HashVersion, PrecomputedTransactionData, SigHashType};
use crate::types::{Transaction, TxOut, Witness};
use bitflags::bitflags;
use secp256k1::{Secp256k1, Verification};
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptError {
    #[error("unknown error")]
    UnknownError,
    #[error("script evaluated without error but finished with a false/empty top stack element")]
    EvalFalse,
    #[error("OP_RETURN was encountered")]
    OpReturn,

    // Limits
    #[error("script is too big")]
    ScriptSize,
    #[error("push value size limit exceeded")]
    PushSize,
    #[error("operation limit exceeded")]
    OpCount,
    #[error("stack size limit exceeded")]
    StackSize,
    #[error("signature count negative or greater than pubkey count")]
    SigCount,
    #[error("pubkey count negative or limit exceeded")]
    PubkeyCount,

    // Failed verify operations
    #[error("script failed an OP_VERIFY operation")]
    Verify,
    #[error("script failed an OP_EQUALVERIFY operation")]
    EqualVerify,
    #[error("script failed an OP_CHECKMULTISIGVERIFY operation")]
    CheckMultiSigVerify,
    #[error("script failed an OP_CHECKSIGVERIFY operation")]
    CheckSigVerify,
    #[error("script failed an OP_NUMEQUALVERIFY operation")]
    NumEqualVerify,

    // Logical/format/canonical errors
    #[error("opcode missing or not understood")]
    BadOpcode,
    #[error("attempted to use a disabled opcode")]
    DisabledOpcode,
    #[error("operation not valid with the current stack size")]
    InvalidStackOperation,
    #[error("operation not valid with the current altstack size")]
    InvalidAltstackOperation,
    #[error("invalid OP_IF construction")]
    UnbalancedConditional,

    // CHECKLOCKTIMEVERIFY and CHECKSEQUENCEVERIFY
    #[error("negative locktime")]
    NegativeLockTime,
    #[error("locktime requirement not satisfied")]
    UnsatisfiedLockTime,

    // Malleability
    #[error("signature hash type missing or not understood")]
    SigHashType,
    #[error("non-canonical DER signature")]
    SigDer,
    #[error("data push larger than necessary")]
    MinimalData,
    #[error("only non-push operators allowed in signatures")]
    SigPushOnly,
    #[error("non-canonical signature: S value is unnecessarily high")]
    SigHighS,
    #[error("dummy CHECKMULTISIG argument must be zero")]
    SigNullDummy,
    #[error("public key is neither compressed or uncompressed")]
    PubkeyType,
    #[error("extra items left on stack after execution")]
    CleanStack,
    #[error("OP_IF/NOTIF argument must be minimal")]
    MinimalIf,
    #[error("signature must be zero for failed CHECK(MULTI)SIG operation")]
    SigNullFail,

    // Softfork safeness
    #[error("NOPx reserved for soft-fork upgrades")]
    DiscourageUpgradableNops,
    #[error("witness version reserved for soft-fork upgrades")]
    DiscourageUpgradableWitnessProgram,

    // Segregated witness
    #[error("witness program has incorrect length")]
    WitnessProgramWrongLength,
    #[error("witness program was passed an empty witness")]
    WitnessProgramWitnessEmpty,
    #[error("witness program hash mismatch")]
    WitnessProgramMismatch,
    #[error("witness requires empty scriptSig")]
    WitnessMalleated,
    #[error("witness requires only-redeemscript scriptSig")]
    WitnessMalleatedP2SH,
    #[error("witness provided for non-witness script")]
    WitnessUnexpected,
    #[error("using non-compressed keys in segwit")]
    WitnessPubkeyType,

    // Cold staking
    #[error("OP_CHECKCOLDSTAKEVERIFY used outside a coinstake")]
    CheckColdStakeVerify,
}

bitflags! {
    /// Script verification flags. Each bit enables one rule independently.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ScriptVerify: u32 {
        /// Evaluate P2SH subscripts (BIP16)
        const P2SH = 1 << 0;
        /// Strict signature and public key encodings
        const STRICTENC = 1 << 1;
        /// Strict DER signatures (BIP66)
        const DERSIG = 1 << 2;
        /// S must be in the lower half of the curve order
        const LOW_S = 1 << 3;
        /// CHECKMULTISIG dummy must be empty (BIP147)
        const NULLDUMMY = 1 << 4;
        /// scriptSig must be push-only
        const SIGPUSHONLY = 1 << 5;
        /// Pushes and numbers must use the minimal encoding
        const MINIMALDATA = 1 << 6;
        /// Fail on NOP1, NOP4-NOP10
        const DISCOURAGE_UPGRADABLE_NOPS = 1 << 7;
        /// Exactly one stack element must remain
        const CLEANSTACK = 1 << 8;
        /// BIP65
        const CHECKLOCKTIMEVERIFY = 1 << 9;
        /// BIP112
        const CHECKSEQUENCEVERIFY = 1 << 10;
        /// Segregated witness (BIP141)
        const WITNESS = 1 << 11;
        /// Fail on unknown witness versions
        const DISCOURAGE_UPGRADABLE_WITNESS_PROGRAM = 1 << 12;
        /// Witness OP_IF/NOTIF arguments must be empty or 0x01
        const MINIMALIF = 1 << 13;
        /// Failed signature checks require empty signatures
        const NULLFAIL = 1 << 14;
        /// Witness public keys must be compressed
        const WITNESS_PUBKEYTYPE = 1 << 15;
        /// OP_NOP10 acts as OP_CHECKCOLDSTAKEVERIFY
        const CHECKCOLDSTAKEVERIFY = 1 << 16;

        /// Enforced by every block
        const MANDATORY = Self::P2SH.bits();

        /// Relay policy
        const STANDARD = Self::MANDATORY.bits()
            | Self::STRICTENC.bits()
            | Self::DERSIG.bits()
            | Self::LOW_S.bits()
            | Self::NULLDUMMY.bits()
            | Self::MINIMALDATA.bits()
            | Self::DISCOURAGE_UPGRADABLE_NOPS.bits()
            | Self::CLEANSTACK.bits()
            | Self::CHECKLOCKTIMEVERIFY.bits()
            | Self::CHECKSEQUENCEVERIFY.bits()
            | Self::WITNESS.bits()
            | Self::DISCOURAGE_UPGRADABLE_WITNESS_PROGRAM.bits()
            | Self::MINIMALIF.bits()
            | Self::NULLFAIL.bits()
            | Self::WITNESS_PUBKEYTYPE.bits();

        /// Policy rules that are not consensus
        const STANDARD_NOT_MANDATORY = Self::STANDARD.bits() & !Self::MANDATORY.bits();
    }
}

/// Context-dependent checks the interpreter delegates to its caller.
///
/// The defaults fail every check, which is what evaluating a script with no
/// transaction context requires.
pub trait SignatureChecker {
    /// `sig` includes the trailing hash-type byte.
    fn check_sig(&self, _sig: &[u8], _pubkey: &[u8], _script_code: &Script, _version: HashVersion) -> bool {
        false
    }

    fn check_lock_time(&self, _lock_time: i64) -> bool {
        false
    }

    fn check_sequence(&self, _sequence: i64) -> bool {
        false
    }

    /// True when the spending transaction is a coinstake.
    fn check_cold_stake(&self) -> bool {
        false
    }
}

/// Checker with no transaction context.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSignatureChecker;

impl SignatureChecker for NullSignatureChecker {}

/// Checker bound to one input of a transaction.
pub struct TransactionSignatureChecker<'a, C: Verification> {
    secp: &'a Secp256k1<C>,
    tx: &'a Transaction,
    input_index: usize,
    amount: i64,
    precomputed: Option<&'a PrecomputedTransactionData>,
}

impl<'a, C: Verification> TransactionSignatureChecker<'a, C> {
    pub fn new(
        secp: &'a Secp256k1<C>,
        tx: &'a Transaction,
        input_index: usize,
        amount: i64,
        precomputed: Option<&'a PrecomputedTransactionData>,
    ) -> Self {
        TransactionSignatureChecker {
            secp,
            tx,
            input_index,
            amount,
            precomputed,
        }
    }
}

impl<'a, C: Verification> SignatureChecker for TransactionSignatureChecker<'a, C> {
    fn check_sig(&self, sig: &[u8], pubkey: &[u8], script_code: &Script, version: HashVersion) -> bool {
        let Some((&hash_type, der)) = sig.split_last() else {
            return false;
        };
        let digest = signature_hash(
            script_code,
            self.tx,
            self.input_index,
            SigHashType::from_u32(hash_type as u32),
            self.amount,
            version,
            self.precomputed,
        );
        keys::verify_ecdsa(self.secp, pubkey, der, digest.as_bytes())
    }

    fn check_lock_time(&self, lock_time: i64) -> bool {
        let tx_lock_time = self.tx.lock_time as i64;
        let threshold = LOCKTIME_THRESHOLD as i64;
        // Both must be heights or both must be times
        if !((tx_lock_time < threshold && lock_time < threshold)
            || (tx_lock_time >= threshold && lock_time >= threshold))
        {
            return false;
        }
        if lock_time > tx_lock_time {
            return false;
        }
        // A final input would bypass the transaction lock time entirely
        self.tx.inputs[self.input_index].sequence != SEQUENCE_FINAL
    }

    fn check_sequence(&self, sequence: i64) -> bool {
        let tx_sequence = self.tx.inputs[self.input_index].sequence as i64;
        if (self.tx.version as u32) < 2 {
            return false;
        }
        if tx_sequence & SEQUENCE_LOCKTIME_DISABLE_FLAG as i64 != 0 {
            return false;
        }
        let mask = (SEQUENCE_LOCKTIME_TYPE_FLAG | SEQUENCE_LOCKTIME_MASK) as i64;
        let type_flag = SEQUENCE_LOCKTIME_TYPE_FLAG as i64;
        let tx_masked = tx_sequence & mask;
        let masked = sequence & mask;
        if !((tx_masked < type_flag && masked < type_flag) || (tx_masked >= type_flag && masked >= type_flag)) {
            return false;
        }
        masked <= tx_masked
    }

    fn check_cold_stake(&self) -> bool {
        self.tx.is_coinstake()
    }
}

fn check_minimal_push(data: &[u8], opcode: u8) -> bool {
    match data.len() {
        0 => opcode == OP_0,
        1 if (1..=16).contains(&data[0]) => false,
        1 if data[0] == 0x81 => false,
        len if len <= 75 => opcode as usize == len,
        len if len <= 255 => opcode == OP_PUSHDATA1,
        len if len <= 65535 => opcode == OP_PUSHDATA2,
        _ => true,
    }
}

fn check_signature_encoding(sig: &[u8], flags: ScriptVerify) -> Result<(), ScriptError> {
    // An empty signature is a compact way to provide an invalid one
    if sig.is_empty() {
        return Ok(());
    }
    if flags.intersects(ScriptVerify::DERSIG | ScriptVerify::LOW_S | ScriptVerify::STRICTENC)
        && !keys::is_valid_signature_encoding(sig)
    {
        return Err(ScriptError::SigDer);
    }
    if flags.contains(ScriptVerify::LOW_S) && !keys::is_low_s(&sig[..sig.len() - 1]) {
        return Err(ScriptError::SigHighS);
    }
    if flags.contains(ScriptVerify::STRICTENC) && !keys::is_defined_hashtype_signature(sig) {
        return Err(ScriptError::SigHashType);
    }
    Ok(())
}

fn check_pubkey_encoding(pubkey: &[u8], flags: ScriptVerify, version: HashVersion) -> Result<(), ScriptError> {
    if flags.contains(ScriptVerify::STRICTENC) && !keys::is_compressed_or_uncompressed_pubkey(pubkey) {
        return Err(ScriptError::PubkeyType);
    }
    if flags.contains(ScriptVerify::WITNESS_PUBKEYTYPE)
        && version == HashVersion::WitnessV0
        && !keys::is_compressed_pubkey(pubkey)
    {
        return Err(ScriptError::WitnessPubkeyType);
    }
    Ok(())
}

/// Fails unless the stack holds at least `n` items.
fn require(stack: &[Vec<u8>], n: usize) -> Result<(), ScriptError> {
    if stack.len() < n {
        Err(ScriptError::InvalidStackOperation)
    } else {
        Ok(())
    }
}

/// The item `depth` positions from the top (1 = top).
fn top(stack: &[Vec<u8>], depth: usize) -> &Vec<u8> {
    &stack[stack.len() - depth]
}

fn pop(stack: &mut Vec<Vec<u8>>) -> Result<Vec<u8>, ScriptError> {
    stack.pop().ok_or(ScriptError::InvalidStackOperation)
}

fn bool_item(value: bool) -> Vec<u8> {
    if value {
        vec![1]
    } else {
        Vec::new()
    }
}

/// EvalScript: Script × Stack × Flags × Checker × HashVersion → Stack'
///
/// Executes `script` against `stack`:
/// 1. Operations run left to right; a malformed push fails with BadOpcode
/// 2. Pushes are limited to 520 bytes, non-push opcodes to 201 per script
/// 3. Disabled opcodes fail even inside an unexecuted branch
/// 4. Only flow control runs inside an unexecuted branch
/// 5. Main and alt stacks together never exceed 1000 items
/// 6. Every IF must be closed by the end of the script
pub fn eval_script(
    stack: &mut Vec<Vec<u8>>,
    script: &Script,
    flags: ScriptVerify,
    checker: &dyn SignatureChecker,
    version: HashVersion,
) -> Result<(), ScriptError> {
    if script.len() > MAX_SCRIPT_SIZE {
        return Err(ScriptError::ScriptSize);
    }
    let require_minimal = flags.contains(ScriptVerify::MINIMALDATA);
    let mut exec_stack: Vec<bool> = Vec::new();
    let mut altstack: Vec<Vec<u8>> = Vec::new();
    let mut op_count = 0usize;
    let mut code_separator_pos = 0usize;

    let mut ops = script.ops();
    while let Some((_, op)) = ops.next() {
        let executing = !exec_stack.contains(&false);

        let (opcode, push) = match op {
            Op::Invalid(_) => return Err(ScriptError::BadOpcode),
            Op::Push { opcode, data } => (opcode, Some(data)),
            Op::Code(opcode) => (opcode, None),
        };

        if let Some(data) = push {
            if data.len() > MAX_SCRIPT_ELEMENT_SIZE {
                return Err(ScriptError::PushSize);
            }
        }

        if opcode > OP_16 {
            op_count += 1;
            if op_count > MAX_OPS_PER_SCRIPT {
                return Err(ScriptError::OpCount);
            }
        }

        if is_disabled(opcode) {
            return Err(ScriptError::DisabledOpcode);
        }

        if let Some(data) = push {
            if executing {
                if require_minimal && !check_minimal_push(data, opcode) {
                    return Err(ScriptError::MinimalData);
                }
                stack.push(data.to_vec());
            }
        } else if executing || (OP_IF..=OP_ENDIF).contains(&opcode) {
            match opcode {
                // ===== PUSH VALUE =====
                OP_1NEGATE | OP_1..=OP_16 => {
                    let n = opcode as i64 - (OP_1 as i64 - 1);
                    stack.push(ScriptNum::encode(n));
                }

                // ===== CONTROL =====
                OP_NOP => {}

                OP_CHECKLOCKTIMEVERIFY => {
                    if !flags.contains(ScriptVerify::CHECKLOCKTIMEVERIFY) {
                        if flags.contains(ScriptVerify::DISCOURAGE_UPGRADABLE_NOPS) {
                            return Err(ScriptError::DiscourageUpgradableNops);
                        }
                    } else {
                        require(stack, 1)?;
                        // 5-byte operand: lock times go up to 2^39-1
                        let lock_time = ScriptNum::decode(top(stack, 1), require_minimal, LOCKTIME_SCRIPT_NUM_SIZE)?;
                        if lock_time < 0 {
                            return Err(ScriptError::NegativeLockTime);
                        }
                        if !checker.check_lock_time(lock_time) {
                            return Err(ScriptError::UnsatisfiedLockTime);
                        }
                    }
                }

                OP_CHECKSEQUENCEVERIFY => {
                    if !flags.contains(ScriptVerify::CHECKSEQUENCEVERIFY) {
                        if flags.contains(ScriptVerify::DISCOURAGE_UPGRADABLE_NOPS) {
                            return Err(ScriptError::DiscourageUpgradableNops);
                        }
                    } else {
                        require(stack, 1)?;
                        let sequence = ScriptNum::decode(top(stack, 1), require_minimal, LOCKTIME_SCRIPT_NUM_SIZE)?;
                        if sequence < 0 {
                            return Err(ScriptError::NegativeLockTime);
                        }
                        // Disable flag set: behaves as a NOP
                        if sequence & SEQUENCE_LOCKTIME_DISABLE_FLAG as i64 == 0 && !checker.check_sequence(sequence) {
                            return Err(ScriptError::UnsatisfiedLockTime);
                        }
                    }
                }

                OP_CHECKCOLDSTAKEVERIFY => {
                    if flags.contains(ScriptVerify::CHECKCOLDSTAKEVERIFY) {
                        if !checker.check_cold_stake() {
                            return Err(ScriptError::CheckColdStakeVerify);
                        }
                    } else if flags.contains(ScriptVerify::DISCOURAGE_UPGRADABLE_NOPS) {
                        return Err(ScriptError::DiscourageUpgradableNops);
                    }
                }

                OP_NOP1 | OP_NOP4 | OP_NOP5 | OP_NOP6 | OP_NOP7 | OP_NOP8 | OP_NOP9 => {
                    if flags.contains(ScriptVerify::DISCOURAGE_UPGRADABLE_NOPS) {
                        return Err(ScriptError::DiscourageUpgradableNops);
                    }
                }

                OP_IF | OP_NOTIF => {
                    let mut value = false;
                    if executing {
                        if stack.is_empty() {
                            return Err(ScriptError::UnbalancedConditional);
                        }
                        let condition = top(stack, 1);
                        if version == HashVersion::WitnessV0 && flags.contains(ScriptVerify::MINIMALIF) {
                            if condition.len() > 1 || (condition.len() == 1 && condition[0] != 1) {
                                return Err(ScriptError::MinimalIf);
                            }
                        }
                        value = cast_to_bool(condition);
                        if opcode == OP_NOTIF {
                            value = !value;
                        }
                        stack.pop();
                    }
                    exec_stack.push(value);
                }

                OP_ELSE => match exec_stack.last_mut() {
                    Some(last) => *last = !*last,
                    None => return Err(ScriptError::UnbalancedConditional),
                },

                OP_ENDIF => {
                    if exec_stack.pop().is_none() {
                        return Err(ScriptError::UnbalancedConditional);
                    }
                }

                OP_VERIFY => {
                    require(stack, 1)?;
                    if !cast_to_bool(top(stack, 1)) {
                        return Err(ScriptError::Verify);
                    }
                    stack.pop();
                }

                OP_RETURN => return Err(ScriptError::OpReturn),

                // ===== STACK =====
                OP_TOALTSTACK => {
                    let item = pop(stack)?;
                    altstack.push(item);
                }

                OP_FROMALTSTACK => {
                    let item = altstack.pop().ok_or(ScriptError::InvalidAltstackOperation)?;
                    stack.push(item);
                }

                OP_2DROP => {
                    require(stack, 2)?;
                    stack.truncate(stack.len() - 2);
                }

                OP_2DUP => {
                    require(stack, 2)?;
                    let a = top(stack, 2).clone();
                    let b = top(stack, 1).clone();
                    stack.push(a);
                    stack.push(b);
                }

                OP_3DUP => {
                    require(stack, 3)?;
                    let a = top(stack, 3).clone();
                    let b = top(stack, 2).clone();
                    let c = top(stack, 1).clone();
                    stack.push(a);
                    stack.push(b);
                    stack.push(c);
                }

                OP_2OVER => {
                    require(stack, 4)?;
                    let a = top(stack, 4).clone();
                    let b = top(stack, 3).clone();
                    stack.push(a);
                    stack.push(b);
                }

                OP_2ROT => {
                    require(stack, 6)?;
                    let at = stack.len() - 6;
                    let a = stack.remove(at);
                    let b = stack.remove(at);
                    stack.push(a);
                    stack.push(b);
                }

                OP_2SWAP => {
                    require(stack, 4)?;
                    let len = stack.len();
                    stack.swap(len - 4, len - 2);
                    stack.swap(len - 3, len - 1);
                }

                OP_IFDUP => {
                    require(stack, 1)?;
                    if cast_to_bool(top(stack, 1)) {
                        let item = top(stack, 1).clone();
                        stack.push(item);
                    }
                }

                OP_DEPTH => {
                    let depth = stack.len() as i64;
                    stack.push(ScriptNum::encode(depth));
                }

                OP_DROP => {
                    pop(stack)?;
                }

                OP_DUP => {
                    require(stack, 1)?;
                    let item = top(stack, 1).clone();
                    stack.push(item);
                }

                OP_NIP => {
                    require(stack, 2)?;
                    let at = stack.len() - 2;
                    stack.remove(at);
                }

                OP_OVER => {
                    require(stack, 2)?;
                    let item = top(stack, 2).clone();
                    stack.push(item);
                }

                OP_PICK | OP_ROLL => {
                    require(stack, 2)?;
                    let n = ScriptNum::decode(top(stack, 1), require_minimal, DEFAULT_SCRIPT_NUM_SIZE)?;
                    stack.pop();
                    if n < 0 || n as usize >= stack.len() {
                        return Err(ScriptError::InvalidStackOperation);
                    }
                    let at = stack.len() - 1 - n as usize;
                    let item = if opcode == OP_ROLL {
                        stack.remove(at)
                    } else {
                        stack[at].clone()
                    };
                    stack.push(item);
                }

                OP_ROT => {
                    require(stack, 3)?;
                    let len = stack.len();
                    stack.swap(len - 3, len - 2);
                    stack.swap(len - 2, len - 1);
                }

                OP_SWAP => {
                    require(stack, 2)?;
                    let len = stack.len();
                    stack.swap(len - 2, len - 1);
                }

                OP_TUCK => {
                    require(stack, 2)?;
                    let item = top(stack, 1).clone();
                    let at = stack.len() - 2;
                    stack.insert(at, item);
                }

                // ===== SPLICE =====
                OP_SIZE => {
                    require(stack, 1)?;
                    let size = top(stack, 1).len() as i64;
                    stack.push(ScriptNum::encode(size));
                }

                // ===== BITWISE LOGIC =====
                OP_EQUAL | OP_EQUALVERIFY => {
                    require(stack, 2)?;
                    let b = pop(stack)?;
                    let a = pop(stack)?;
                    let equal = a == b;
                    stack.push(bool_item(equal));
                    if opcode == OP_EQUALVERIFY {
                        if !equal {
                            return Err(ScriptError::EqualVerify);
                        }
                        stack.pop();
                    }
                }

                // ===== NUMERIC =====
                OP_1ADD | OP_1SUB | OP_NEGATE | OP_ABS | OP_NOT | OP_0NOTEQUAL => {
                    require(stack, 1)?;
                    let n = ScriptNum::decode(top(stack, 1), require_minimal, DEFAULT_SCRIPT_NUM_SIZE)?;
                    let result = match opcode {
                        OP_1ADD => n + 1,
                        OP_1SUB => n - 1,
                        OP_NEGATE => -n,
                        OP_ABS => n.abs(),
                        OP_NOT => (n == 0) as i64,
                        _ => (n != 0) as i64,
                    };
                    stack.pop();
                    stack.push(ScriptNum::encode(result));
                }

                OP_ADD | OP_SUB | OP_BOOLAND | OP_BOOLOR | OP_NUMEQUAL | OP_NUMEQUALVERIFY | OP_NUMNOTEQUAL
                | OP_LESSTHAN | OP_GREATERTHAN | OP_LESSTHANOREQUAL | OP_GREATERTHANOREQUAL | OP_MIN | OP_MAX => {
                    require(stack, 2)?;
                    let a = ScriptNum::decode(top(stack, 2), require_minimal, DEFAULT_SCRIPT_NUM_SIZE)?;
                    let b = ScriptNum::decode(top(stack, 1), require_minimal, DEFAULT_SCRIPT_NUM_SIZE)?;
                    let result = match opcode {
                        OP_ADD => a + b,
                        OP_SUB => a - b,
                        OP_BOOLAND => (a != 0 && b != 0) as i64,
                        OP_BOOLOR => (a != 0 || b != 0) as i64,
                        OP_NUMEQUAL | OP_NUMEQUALVERIFY => (a == b) as i64,
                        OP_NUMNOTEQUAL => (a != b) as i64,
                        OP_LESSTHAN => (a < b) as i64,
                        OP_GREATERTHAN => (a > b) as i64,
                        OP_LESSTHANOREQUAL => (a <= b) as i64,
                        OP_GREATERTHANOREQUAL => (a >= b) as i64,
                        OP_MIN => a.min(b),
                        _ => a.max(b),
                    };
                    stack.truncate(stack.len() - 2);
                    stack.push(ScriptNum::encode(result));
                    if opcode == OP_NUMEQUALVERIFY {
                        if !cast_to_bool(top(stack, 1)) {
                            return Err(ScriptError::NumEqualVerify);
                        }
                        stack.pop();
                    }
                }

                OP_WITHIN => {
                    require(stack, 3)?;
                    let x = ScriptNum::decode(top(stack, 3), require_minimal, DEFAULT_SCRIPT_NUM_SIZE)?;
                    let min = ScriptNum::decode(top(stack, 2), require_minimal, DEFAULT_SCRIPT_NUM_SIZE)?;
                    let max = ScriptNum::decode(top(stack, 1), require_minimal, DEFAULT_SCRIPT_NUM_SIZE)?;
                    stack.truncate(stack.len() - 3);
                    stack.push(bool_item(min <= x && x < max));
                }

                // ===== CRYPTO =====
                OP_RIPEMD160 | OP_SHA1 | OP_SHA256 | OP_HASH160 | OP_HASH256 => {
                    let item = pop(stack)?;
                    let digest = match opcode {
                        OP_RIPEMD160 => crypto::ripemd160(&item).to_vec(),
                        OP_SHA1 => crypto::sha1(&item).to_vec(),
                        OP_SHA256 => crypto::sha256(&item).to_vec(),
                        OP_HASH160 => crypto::hash160(&item).to_vec(),
                        _ => crypto::sha256d(&item).to_vec(),
                    };
                    stack.push(digest);
                }

                OP_CODESEPARATOR => {
                    code_separator_pos = ops.position();
                }

                OP_CHECKSIG | OP_CHECKSIGVERIFY => {
                    require(stack, 2)?;
                    let sig = top(stack, 2).clone();
                    let pubkey = top(stack, 1).clone();

                    // Script code starts after the last executed OP_CODESEPARATOR
                    let mut script_code = script.suffix_from(code_separator_pos);
                    if version == HashVersion::Original {
                        script_code = script_code.find_and_delete(&Builder::new().push_slice(&sig).into_script());
                    }

                    check_signature_encoding(&sig, flags)?;
                    check_pubkey_encoding(&pubkey, flags, version)?;
                    let success = checker.check_sig(&sig, &pubkey, &script_code, version);

                    if !success && flags.contains(ScriptVerify::NULLFAIL) && !sig.is_empty() {
                        return Err(ScriptError::SigNullFail);
                    }

                    stack.truncate(stack.len() - 2);
                    stack.push(bool_item(success));
                    if opcode == OP_CHECKSIGVERIFY {
                        if !success {
                            return Err(ScriptError::CheckSigVerify);
                        }
                        stack.pop();
                    }
                }

                OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY => {
                    // ([dummy] [sig ...] num_of_signatures [pubkey ...] num_of_pubkeys -- bool)
                    let mut i = 1usize;
                    require(stack, i)?;

                    let keys_count = ScriptNum::decode(top(stack, i), require_minimal, DEFAULT_SCRIPT_NUM_SIZE)?;
                    if keys_count < 0 || keys_count as usize > MAX_PUBKEYS_PER_MULTISIG {
                        return Err(ScriptError::PubkeyCount);
                    }
                    let mut keys_count = keys_count as usize;
                    op_count += keys_count;
                    if op_count > MAX_OPS_PER_SCRIPT {
                        return Err(ScriptError::OpCount);
                    }
                    i += 1;
                    let mut ikey = i;
                    // Keys to pop during cleanup, tracked for NULLFAIL
                    let mut ikey2 = keys_count + 2;
                    i += keys_count;
                    require(stack, i)?;

                    let sigs_count = ScriptNum::decode(top(stack, i), require_minimal, DEFAULT_SCRIPT_NUM_SIZE)?;
                    if sigs_count < 0 || sigs_count as usize > keys_count {
                        return Err(ScriptError::SigCount);
                    }
                    let mut sigs_count = sigs_count as usize;
                    i += 1;
                    let mut isig = i;
                    i += sigs_count;
                    require(stack, i)?;

                    let mut script_code = script.suffix_from(code_separator_pos);
                    if version == HashVersion::Original {
                        for k in 0..sigs_count {
                            let sig = top(stack, isig + k);
                            script_code = script_code.find_and_delete(&Builder::new().push_slice(sig).into_script());
                        }
                    }

                    let mut success = true;
                    while success && sigs_count > 0 {
                        let sig = top(stack, isig);
                        let pubkey = top(stack, ikey);

                        check_signature_encoding(sig, flags)?;
                        check_pubkey_encoding(pubkey, flags, version)?;

                        if checker.check_sig(sig, pubkey, &script_code, version) {
                            isig += 1;
                            sigs_count -= 1;
                        }
                        ikey += 1;
                        keys_count -= 1;

                        // More signatures left than keys: cannot succeed
                        if sigs_count > keys_count {
                            success = false;
                        }
                    }

                    // Pop everything but the dummy
                    while i > 1 {
                        i -= 1;
                        if !success
                            && flags.contains(ScriptVerify::NULLFAIL)
                            && ikey2 == 0
                            && !top(stack, 1).is_empty()
                        {
                            return Err(ScriptError::SigNullFail);
                        }
                        if ikey2 > 0 {
                            ikey2 -= 1;
                        }
                        stack.pop();
                    }

                    // The extra item consumed by the historical off-by-one
                    require(stack, 1)?;
                    if flags.contains(ScriptVerify::NULLDUMMY) && !top(stack, 1).is_empty() {
                        return Err(ScriptError::SigNullDummy);
                    }
                    stack.pop();

                    stack.push(bool_item(success));
                    if opcode == OP_CHECKMULTISIGVERIFY {
                        if !success {
                            return Err(ScriptError::CheckMultiSigVerify);
                        }
                        stack.pop();
                    }
                }

                _ => return Err(ScriptError::BadOpcode),
            }
        }

        if stack.len() + altstack.len() > MAX_STACK_SIZE {
            return Err(ScriptError::StackSize);
        }
    }

    if !exec_stack.is_empty() {
        return Err(ScriptError::UnbalancedConditional);
    }
    Ok(())
}

fn verify_witness_program(
    witness: &Witness,
    version: u8,
    program: &[u8],
    flags: ScriptVerify,
    checker: &dyn SignatureChecker,
) -> Result<(), ScriptError> {
    let (mut stack, script) = if version == 0 {
        if program.len() == 32 {
            // P2WSH: last witness item is the script, committed to by SHA256
            let Some((witness_script, items)) = witness.split_last() else {
                return Err(ScriptError::WitnessProgramWitnessEmpty);
            };
            if &crypto::sha256(witness_script)[..] != program {
                return Err(ScriptError::WitnessProgramMismatch);
            }
            (items.to_vec(), Script::from_bytes(witness_script.clone()))
        } else if program.len() == 20 {
            // P2WPKH: exactly a signature and a public key
            if witness.len() != 2 {
                return Err(ScriptError::WitnessProgramMismatch);
            }
            let script = Builder::new()
                .push_opcode(OP_DUP)
                .push_opcode(OP_HASH160)
                .push_slice(program)
                .push_opcode(OP_EQUALVERIFY)
                .push_opcode(OP_CHECKSIG)
                .into_script();
            (witness.clone(), script)
        } else {
            return Err(ScriptError::WitnessProgramWrongLength);
        }
    } else if flags.contains(ScriptVerify::DISCOURAGE_UPGRADABLE_WITNESS_PROGRAM) {
        return Err(ScriptError::DiscourageUpgradableWitnessProgram);
    } else {
        // Unknown versions are anyone-can-spend until a soft fork defines them
        return Ok(());
    };

    if stack.iter().any(|item| item.len() > MAX_SCRIPT_ELEMENT_SIZE) {
        return Err(ScriptError::PushSize);
    }

    eval_script(&mut stack, &script, flags, checker, HashVersion::WitnessV0)?;

    // Witness scripts implicitly require a clean stack
    if stack.len() != 1 {
        return Err(ScriptError::EvalFalse);
    }
    if !cast_to_bool(top(&stack, 1)) {
        return Err(ScriptError::EvalFalse);
    }
    Ok(())
}

/// VerifyScript: ScriptSig × ScriptPubKey × Witness × Flags × Checker → {ok, ScriptError}
///
/// 1. Run scriptSig (must be push-only under SIGPUSHONLY)
/// 2. Run scriptPubKey on the resulting stack; top must be true
/// 3. Native witness program: scriptSig must be empty, run the witness program
/// 4. P2SH: scriptSig must be push-only, run the redeem script on a copy of
///    the scriptSig stack, then its witness program if it is one
/// 5. CLEANSTACK: exactly one item left
/// 6. A witness given to a non-witness spend fails
pub fn verify_script(
    script_sig: &Script,
    script_pubkey: &Script,
    witness: &Witness,
    flags: ScriptVerify,
    checker: &dyn SignatureChecker,
) -> Result<(), ScriptError> {
    if flags.contains(ScriptVerify::SIGPUSHONLY) && !script_sig.is_push_only() {
        return Err(ScriptError::SigPushOnly);
    }

    let mut had_witness = false;
    let mut stack = Vec::new();
    eval_script(&mut stack, script_sig, flags, checker, HashVersion::Original)?;
    let mut p2sh_stack = if flags.contains(ScriptVerify::P2SH) {
        stack.clone()
    } else {
        Vec::new()
    };
    eval_script(&mut stack, script_pubkey, flags, checker, HashVersion::Original)?;
    match stack.last() {
        Some(item) if cast_to_bool(item) => {}
        _ => return Err(ScriptError::EvalFalse),
    }

    if flags.contains(ScriptVerify::WITNESS) {
        if let Some((version, program)) = script_pubkey.witness_program() {
            had_witness = true;
            if !script_sig.is_empty() {
                return Err(ScriptError::WitnessMalleated);
            }
            verify_witness_program(witness, version, program, flags, checker)?;
            // Bypass the cleanstack check for the witness result
            stack.truncate(1);
        }
    }

    if flags.contains(ScriptVerify::P2SH) && script_pubkey.is_p2sh() {
        if !script_sig.is_push_only() {
            return Err(ScriptError::SigPushOnly);
        }
        std::mem::swap(&mut stack, &mut p2sh_stack);

        // Non-empty: an empty stack would have failed the HASH160/EQUAL above
        let redeem_script = Script::from_bytes(pop(&mut stack)?);
        eval_script(&mut stack, &redeem_script, flags, checker, HashVersion::Original)?;
        match stack.last() {
            Some(item) if cast_to_bool(item) => {}
            _ => return Err(ScriptError::EvalFalse),
        }

        if flags.contains(ScriptVerify::WITNESS) {
            if let Some((version, program)) = redeem_script.witness_program() {
                had_witness = true;
                let exact = Builder::new().push_slice(redeem_script.as_bytes()).into_script();
                if *script_sig != exact {
                    return Err(ScriptError::WitnessMalleatedP2SH);
                }
                verify_witness_program(witness, version, program, flags, checker)?;
                stack.truncate(1);
            }
        }
    }

    if flags.contains(ScriptVerify::CLEANSTACK) {
        debug_assert!(flags.contains(ScriptVerify::P2SH | ScriptVerify::WITNESS));
        if stack.len() != 1 {
            return Err(ScriptError::CleanStack);
        }
    }

    if flags.contains(ScriptVerify::WITNESS) && !had_witness && !witness.is_empty() {
        return Err(ScriptError::WitnessUnexpected);
    }

    Ok(())
}

/// Verifies input `input_index` of `tx` spending `spent`.
pub fn verify_input<C: Verification>(
    secp: &Secp256k1<C>,
    tx: &Transaction,
    input_index: usize,
    spent: &TxOut,
    flags: ScriptVerify,
    precomputed: Option<&PrecomputedTransactionData>,
) -> Result<(), ScriptError> {
    let input = &tx.inputs[input_index];
    let checker = TransactionSignatureChecker::new(secp, tx, input_index, spent.value, precomputed);
    verify_script(&input.script_sig, &spent.script_pubkey, &input.witness, flags, &checker)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(script_sig: &str, script_pubkey: &str, flags: ScriptVerify) -> Result<(), ScriptError> {
        let sig: Script = script_sig.parse().unwrap();
        let spk: Script = script_pubkey.parse().unwrap();
        verify_script(&sig, &spk, &Vec::new(), flags, &NullSignatureChecker)
    }

    fn eval(script: &str, flags: ScriptVerify) -> (Result<(), ScriptError>, Vec<Vec<u8>>) {
        let script: Script = script.parse().unwrap();
        let mut stack = Vec::new();
        let result = eval_script(&mut stack, &script, flags, &NullSignatureChecker, HashVersion::Original);
        (result, stack)
    }

    // ===== ARITHMETIC AND STACK =====

    #[test]
    fn test_arithmetic() {
        assert_eq!(run("2 3", "ADD 5 EQUAL", ScriptVerify::empty()), Ok(()));
        assert_eq!(run("2 3", "SUB -1 EQUAL", ScriptVerify::empty()), Ok(()));
        assert_eq!(run("5", "1 10 WITHIN", ScriptVerify::empty()), Ok(()));
        assert_eq!(run("10", "1 10 WITHIN NOT", ScriptVerify::empty()), Ok(()));
        assert_eq!(run("-5", "ABS 5 NUMEQUAL", ScriptVerify::empty()), Ok(()));
        assert_eq!(run("3 7", "MAX 7 NUMEQUALVERIFY 1", ScriptVerify::empty()), Ok(()));
    }

    #[test]
    fn test_stack_operations() {
        let (result, stack) = eval("1 2 3 ROT", ScriptVerify::empty());
        assert_eq!(result, Ok(()));
        assert_eq!(stack, vec![vec![2], vec![3], vec![1]]);

        let (result, stack) = eval("1 2 3 4 2SWAP", ScriptVerify::empty());
        assert_eq!(result, Ok(()));
        assert_eq!(stack, vec![vec![3], vec![4], vec![1], vec![2]]);

        let (result, stack) = eval("7 8 9 2 ROLL", ScriptVerify::empty());
        assert_eq!(result, Ok(()));
        assert_eq!(stack, vec![vec![8], vec![9], vec![7]]);

        let (result, stack) = eval("1 2 TUCK", ScriptVerify::empty());
        assert_eq!(result, Ok(()));
        assert_eq!(stack, vec![vec![2], vec![1], vec![2]]);
    }

    #[test]
    fn test_stack_underflow() {
        assert_eq!(eval("DUP", ScriptVerify::empty()).0, Err(ScriptError::InvalidStackOperation));
        assert_eq!(eval("1 2 PICK", ScriptVerify::empty()).0, Err(ScriptError::InvalidStackOperation));
        assert_eq!(eval("FROMALTSTACK", ScriptVerify::empty()).0, Err(ScriptError::InvalidAltstackOperation));
    }

    #[test]
    fn test_oversized_number_operand() {
        // 5-byte operand to a 4-byte arithmetic op
        assert_eq!(eval("0x050102030405 1ADD", ScriptVerify::empty()).0, Err(ScriptError::UnknownError));
    }

    // ===== FLOW CONTROL =====

    #[test]
    fn test_conditionals() {
        assert_eq!(run("1", "IF 2 ELSE 0 ENDIF", ScriptVerify::empty()), Ok(()));
        assert_eq!(run("0", "IF 0 ELSE 2 ENDIF", ScriptVerify::empty()), Ok(()));
        assert_eq!(run("0", "NOTIF 1 ENDIF", ScriptVerify::empty()), Ok(()));
        assert_eq!(run("1", "IF 1", ScriptVerify::empty()), Err(ScriptError::UnbalancedConditional));
        assert_eq!(run("1", "ENDIF", ScriptVerify::empty()), Err(ScriptError::UnbalancedConditional));
    }

    #[test]
    fn test_unexecuted_branch_skips_bad_opcodes_but_not_disabled_ones() {
        assert_eq!(run("0", "IF RETURN ENDIF 1", ScriptVerify::empty()), Ok(()));
        assert_eq!(run("0", "IF VER ENDIF 1", ScriptVerify::empty()), Ok(()));
        assert_eq!(run("0", "IF CAT ENDIF 1", ScriptVerify::empty()), Err(ScriptError::DisabledOpcode));
        assert_eq!(run("0", "IF VERIF ENDIF 1", ScriptVerify::empty()), Err(ScriptError::BadOpcode));
    }

    #[test]
    fn test_eval_false_and_op_return() {
        assert_eq!(run("0", "", ScriptVerify::empty()), Err(ScriptError::EvalFalse));
        assert_eq!(run("1", "RETURN", ScriptVerify::empty()), Err(ScriptError::OpReturn));
        assert_eq!(run("1", "VERIFY", ScriptVerify::empty()), Err(ScriptError::EvalFalse));
        assert_eq!(run("0", "VERIFY 1", ScriptVerify::empty()), Err(ScriptError::Verify));
    }

    #[test]
    fn test_malformed_push_fails() {
        let spk = Script::from_bytes(vec![OP_1, OP_PUSHDATA2, 0x05]);
        let result = verify_script(&Script::new(), &spk, &Vec::new(), ScriptVerify::empty(), &NullSignatureChecker);
        assert_eq!(result, Err(ScriptError::BadOpcode));
    }

    // ===== LIMITS =====

    #[test]
    fn test_op_count_limit() {
        let mut script = "1".to_string();
        for _ in 0..201 {
            script.push_str(" NOP");
        }
        assert_eq!(eval(&script, ScriptVerify::empty()).0, Ok(()));
        script.push_str(" NOP");
        assert_eq!(eval(&script, ScriptVerify::empty()).0, Err(ScriptError::OpCount));
    }

    #[test]
    fn test_push_size_limit() {
        let ok = Builder::new().push_slice(&[1u8; 520]).into_script();
        let too_big = Builder::new().push_slice(&[1u8; 521]).into_script();
        let mut stack = Vec::new();
        assert_eq!(
            eval_script(&mut stack, &ok, ScriptVerify::empty(), &NullSignatureChecker, HashVersion::Original),
            Ok(())
        );
        assert_eq!(
            eval_script(&mut stack, &too_big, ScriptVerify::empty(), &NullSignatureChecker, HashVersion::Original),
            Err(ScriptError::PushSize)
        );
    }

    #[test]
    fn test_stack_size_limit() {
        let mut script = String::from("1");
        for _ in 0..999 {
            script.push_str(" 1");
        }
        assert_eq!(eval(&script, ScriptVerify::empty()).0, Ok(()));
        script.push_str(" 1");
        assert_eq!(eval(&script, ScriptVerify::empty()).0, Err(ScriptError::StackSize));
    }

    // ===== FLAG ISOLATION =====

    #[test]
    fn test_minimaldata_flag() {
        // 0x01 0x05 should have been OP_5
        assert_eq!(run("0x0105", "5 EQUAL", ScriptVerify::empty()), Ok(()));
        assert_eq!(run("0x0105", "5 EQUAL", ScriptVerify::MINIMALDATA), Err(ScriptError::MinimalData));
        // Non-minimal number operand
        assert_eq!(run("0x020100", "1ADD 2 EQUAL", ScriptVerify::empty()), Ok(()));
        assert_eq!(
            run("0x020100", "1ADD 2 EQUAL", ScriptVerify::MINIMALDATA),
            Err(ScriptError::UnknownError)
        );
    }

    #[test]
    fn test_discourage_upgradable_nops_flag() {
        assert_eq!(run("1", "NOP1", ScriptVerify::empty()), Ok(()));
        assert_eq!(
            run("1", "NOP1", ScriptVerify::DISCOURAGE_UPGRADABLE_NOPS),
            Err(ScriptError::DiscourageUpgradableNops)
        );
        assert_eq!(run("1", "NOP10", ScriptVerify::empty()), Ok(()));
        assert_eq!(
            run("1", "NOP10", ScriptVerify::DISCOURAGE_UPGRADABLE_NOPS),
            Err(ScriptError::DiscourageUpgradableNops)
        );
        // Inside an unexecuted branch the NOP is never examined
        assert_eq!(run("0", "IF NOP1 ENDIF 1", ScriptVerify::DISCOURAGE_UPGRADABLE_NOPS), Ok(()));
    }

    #[test]
    fn test_cold_stake_opcode_is_gated_by_flag() {
        // Without the flag the byte is OP_NOP10
        assert_eq!(run("1", "CHECKCOLDSTAKEVERIFY", ScriptVerify::empty()), Ok(()));
        // With the flag the null checker reports a non-coinstake spend
        assert_eq!(
            run("1", "CHECKCOLDSTAKEVERIFY", ScriptVerify::CHECKCOLDSTAKEVERIFY),
            Err(ScriptError::CheckColdStakeVerify)
        );
    }

    #[test]
    fn test_sigpushonly_flag() {
        assert_eq!(run("1 DUP", "EQUAL", ScriptVerify::empty()), Ok(()));
        assert_eq!(run("1 DUP", "EQUAL", ScriptVerify::SIGPUSHONLY), Err(ScriptError::SigPushOnly));
    }

    #[test]
    fn test_cleanstack_flag() {
        let flags = ScriptVerify::P2SH | ScriptVerify::WITNESS;
        assert_eq!(run("1 1", "", flags), Ok(()));
        assert_eq!(run("1 1", "", flags | ScriptVerify::CLEANSTACK), Err(ScriptError::CleanStack));
    }

    #[test]
    fn test_cltv_flag() {
        // Negative lock time only detected when the opcode is active
        assert_eq!(run("-1", "CHECKLOCKTIMEVERIFY", ScriptVerify::empty()), Ok(()));
        assert_eq!(
            run("-1", "CHECKLOCKTIMEVERIFY", ScriptVerify::CHECKLOCKTIMEVERIFY),
            Err(ScriptError::NegativeLockTime)
        );
        assert_eq!(
            run("0", "CHECKLOCKTIMEVERIFY 1", ScriptVerify::CHECKLOCKTIMEVERIFY),
            Err(ScriptError::UnsatisfiedLockTime)
        );
    }

    #[test]
    fn test_csv_disable_flag_is_nop() {
        // 1 << 31 as a 5-byte script number
        let script_sig = "0x050000008000";
        assert_eq!(run(script_sig, "CHECKSEQUENCEVERIFY", ScriptVerify::CHECKSEQUENCEVERIFY), Ok(()));
        assert_eq!(
            run("1", "CHECKSEQUENCEVERIFY", ScriptVerify::CHECKSEQUENCEVERIFY),
            Err(ScriptError::UnsatisfiedLockTime)
        );
    }

    #[test]
    fn test_sig_encoding_flags_fail_before_checker() {
        let bad_sig = "0x0401020304";
        let pubkey = format!("0x21{}", "02".repeat(33));
        let spk = format!("{} CHECKSIG NOT", pubkey);
        assert_eq!(run(bad_sig, &spk, ScriptVerify::empty()), Ok(()));
        assert_eq!(run(bad_sig, &spk, ScriptVerify::DERSIG), Err(ScriptError::SigDer));
        assert_eq!(run(bad_sig, &spk, ScriptVerify::LOW_S), Err(ScriptError::SigDer));
        assert_eq!(run(bad_sig, &spk, ScriptVerify::STRICTENC), Err(ScriptError::SigDer));
        assert_eq!(run(bad_sig, &spk, ScriptVerify::NULLFAIL), Err(ScriptError::SigNullFail));
    }

    #[test]
    fn test_strictenc_pubkey_type() {
        let bad_pubkey = format!("0x21{}", "05".repeat(33));
        let spk = format!("{} CHECKSIG NOT", bad_pubkey);
        assert_eq!(run("0", &spk, ScriptVerify::empty()), Ok(()));
        assert_eq!(run("0", &spk, ScriptVerify::STRICTENC), Err(ScriptError::PubkeyType));
    }

    #[test]
    fn test_nulldummy_flag() {
        let pubkey = format!("0x21{}", "02".repeat(33));
        // 0-of-1 always succeeds, leaving only the dummy check
        let spk = format!("0 {} 1 CHECKMULTISIG", pubkey);
        assert_eq!(run("1", &spk, ScriptVerify::empty()), Ok(()));
        assert_eq!(run("1", &spk, ScriptVerify::NULLDUMMY), Err(ScriptError::SigNullDummy));
        assert_eq!(run("0", &spk, ScriptVerify::NULLDUMMY), Ok(()));
    }

    #[test]
    fn test_multisig_counts() {
        assert_eq!(run("0", "0 21 CHECKMULTISIG", ScriptVerify::empty()), Err(ScriptError::PubkeyCount));
        assert_eq!(run("0", "2 0 CHECKMULTISIG", ScriptVerify::empty()), Err(ScriptError::SigCount));
        // 0-of-0 succeeds
        assert_eq!(run("0", "0 0 CHECKMULTISIG", ScriptVerify::empty()), Ok(()));
    }

    #[test]
    fn test_p2sh_redeem_script_executed() {
        let redeem = Builder::new().push_int(2).push_opcode(OP_EQUAL).into_script();
        let spk = Builder::new()
            .push_opcode(OP_HASH160)
            .push_slice(redeem.hash160().as_bytes())
            .push_opcode(OP_EQUAL)
            .into_script();
        let good = Builder::new().push_int(2).push_slice(redeem.as_bytes()).into_script();
        let bad = Builder::new().push_int(3).push_slice(redeem.as_bytes()).into_script();
        let no_witness = Vec::new();

        assert_eq!(verify_script(&good, &spk, &no_witness, ScriptVerify::P2SH, &NullSignatureChecker), Ok(()));
        assert_eq!(
            verify_script(&bad, &spk, &no_witness, ScriptVerify::P2SH, &NullSignatureChecker),
            Err(ScriptError::EvalFalse)
        );
        // Before BIP16 only the hash is checked
        assert_eq!(verify_script(&bad, &spk, &no_witness, ScriptVerify::empty(), &NullSignatureChecker), Ok(()));
    }

    #[test]
    fn test_p2sh_requires_push_only_script_sig() {
        let redeem = Builder::new().push_int(1).into_script();
        let spk = Builder::new()
            .push_opcode(OP_HASH160)
            .push_slice(redeem.hash160().as_bytes())
            .push_opcode(OP_EQUAL)
            .into_script();
        let script_sig = Builder::new()
            .push_opcode(OP_NOP)
            .push_slice(redeem.as_bytes())
            .into_script();
        assert_eq!(
            verify_script(&script_sig, &spk, &Vec::new(), ScriptVerify::P2SH, &NullSignatureChecker),
            Err(ScriptError::SigPushOnly)
        );
    }

    #[test]
    fn test_p2wsh_witness_script() {
        let witness_script = Builder::new().push_int(7).push_opcode(OP_EQUAL).into_script();
        let spk = Builder::new()
            .push_opcode(OP_0)
            .push_slice(witness_script.sha256().as_bytes())
            .into_script();
        let flags = ScriptVerify::P2SH | ScriptVerify::WITNESS;

        let witness = vec![vec![7], witness_script.as_bytes().to_vec()];
        assert_eq!(verify_script(&Script::new(), &spk, &witness, flags, &NullSignatureChecker), Ok(()));

        let wrong = vec![vec![8], witness_script.as_bytes().to_vec()];
        assert_eq!(
            verify_script(&Script::new(), &spk, &wrong, flags, &NullSignatureChecker),
            Err(ScriptError::EvalFalse)
        );

        let mismatched = vec![vec![7], vec![OP_1]];
        assert_eq!(
            verify_script(&Script::new(), &spk, &mismatched, flags, &NullSignatureChecker),
            Err(ScriptError::WitnessProgramMismatch)
        );

        assert_eq!(
            verify_script(&Script::new(), &spk, &Vec::new(), flags, &NullSignatureChecker),
            Err(ScriptError::WitnessProgramWitnessEmpty)
        );

        let malleated = Builder::new().push_int(1).into_script();
        assert_eq!(
            verify_script(&malleated, &spk, &witness, flags, &NullSignatureChecker),
            Err(ScriptError::WitnessMalleated)
        );
    }

    #[test]
    fn test_unexpected_witness() {
        let flags = ScriptVerify::P2SH | ScriptVerify::WITNESS;
        let spk = Builder::new().push_int(1).into_script();
        let witness = vec![vec![1]];
        assert_eq!(
            verify_script(&Script::new(), &spk, &witness, flags, &NullSignatureChecker),
            Err(ScriptError::WitnessUnexpected)
        );
        assert_eq!(
            verify_script(&Script::new(), &spk, &witness, ScriptVerify::P2SH, &NullSignatureChecker),
            Ok(())
        );
    }

    #[test]
    fn test_upgradable_witness_version() {
        let spk = Builder::new().push_opcode(OP_1).push_slice(&[0xab; 32]).into_script();
        let flags = ScriptVerify::P2SH | ScriptVerify::WITNESS;
        assert_eq!(verify_script(&Script::new(), &spk, &Vec::new(), flags, &NullSignatureChecker), Ok(()));
        assert_eq!(
            verify_script(
                &Script::new(),
                &spk,
                &Vec::new(),
                flags | ScriptVerify::DISCOURAGE_UPGRADABLE_WITNESS_PROGRAM,
                &NullSignatureChecker
            ),
            Err(ScriptError::DiscourageUpgradableWitnessProgram)
        );
    }

    #[test]
    fn test_minimalif_only_in_witness() {
        let witness_script = Builder::new()
            .push_opcode(OP_IF)
            .push_int(1)
            .push_opcode(OP_ELSE)
            .push_int(0)
            .push_opcode(OP_ENDIF)
            .into_script();
        let spk = Builder::new()
            .push_opcode(OP_0)
            .push_slice(witness_script.sha256().as_bytes())
            .into_script();
        let witness = vec![vec![2], witness_script.as_bytes().to_vec()];
        let flags = ScriptVerify::P2SH | ScriptVerify::WITNESS;
        assert_eq!(verify_script(&Script::new(), &spk, &witness, flags, &NullSignatureChecker), Ok(()));
        assert_eq!(
            verify_script(&Script::new(), &spk, &witness, flags | ScriptVerify::MINIMALIF, &NullSignatureChecker),
            Err(ScriptError::MinimalIf)
        );
    }

    #[test]
    fn test_composite_flag_sets() {
        assert!(ScriptVerify::STANDARD.contains(ScriptVerify::MANDATORY));
        assert!(!ScriptVerify::STANDARD_NOT_MANDATORY.contains(ScriptVerify::P2SH));
        assert!(ScriptVerify::STANDARD_NOT_MANDATORY.contains(ScriptVerify::NULLFAIL));
        assert!(!ScriptVerify::STANDARD.contains(ScriptVerify::CHECKCOLDSTAKEVERIFY));
    }
}
