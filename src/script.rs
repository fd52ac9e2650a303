//! Script value model: bytes, decoded operations, numbers and text form
//!
//! A `Script` is an immutable byte string. Decoding never fails outright: a
//! malformed push yields `Op::Invalid` and ends iteration, so callers decide
//! whether that is fatal.

use crate::constants::*;
use crate::crypto;
use crate::error::SerializationError;
use crate::interpreter::ScriptError;
use crate::opcodes::*;
use crate::types::{Uint160, Uint256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One decoded unit of a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op<'a> {
    /// A data push, including OP_0 (empty data). `opcode` is the push opcode used.
    Push { opcode: u8, data: &'a [u8] },
    /// Any non-push opcode, including OP_1NEGATE and OP_1..OP_16.
    Code(u8),
    /// A push whose declared length runs past the end of the script.
    Invalid(u8),
}

impl<'a> Op<'a> {
    /// The opcode byte of this operation.
    pub fn opcode(&self) -> u8 {
        match *self {
            Op::Push { opcode, .. } => opcode,
            Op::Code(opcode) | Op::Invalid(opcode) => opcode,
        }
    }

    /// Appends the canonical encoding of this operation, using its own push opcode.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        match *self {
            Op::Push { opcode, data } => {
                out.push(opcode);
                match opcode {
                    OP_PUSHDATA1 => out.push(data.len() as u8),
                    OP_PUSHDATA2 => out.extend_from_slice(&(data.len() as u16).to_le_bytes()),
                    OP_PUSHDATA4 => out.extend_from_slice(&(data.len() as u32).to_le_bytes()),
                    _ => {}
                }
                out.extend_from_slice(data);
            }
            Op::Code(opcode) | Op::Invalid(opcode) => out.push(opcode),
        }
    }
}

/// Iterator over the operations of a script, yielding `(offset, op)`.
///
/// Stops after the first `Op::Invalid`.
#[derive(Debug, Clone)]
pub struct Ops<'a> {
    bytes: &'a [u8],
    pos: usize,
    done: bool,
}

impl<'a> Ops<'a> {
    /// Offset of the next operation.
    pub fn position(&self) -> usize {
        self.pos
    }
}

/// Decodes the operation starting at `pos`, returning it and the offset after it.
fn decode_op(bytes: &[u8], pos: usize) -> Option<(Op<'_>, usize)> {
    let opcode = *bytes.get(pos)?;
    let mut cursor = pos + 1;
    if opcode > OP_PUSHDATA4 {
        return Some((Op::Code(opcode), cursor));
    }
    let len = match opcode {
        OP_PUSHDATA1 => {
            let Some(&len) = bytes.get(cursor) else {
                return Some((Op::Invalid(opcode), bytes.len()));
            };
            cursor += 1;
            len as usize
        }
        OP_PUSHDATA2 => {
            if bytes.len() < cursor + 2 {
                return Some((Op::Invalid(opcode), bytes.len()));
            }
            let len = u16::from_le_bytes([bytes[cursor], bytes[cursor + 1]]);
            cursor += 2;
            len as usize
        }
        OP_PUSHDATA4 => {
            if bytes.len() < cursor + 4 {
                return Some((Op::Invalid(opcode), bytes.len()));
            }
            let mut len = [0u8; 4];
            len.copy_from_slice(&bytes[cursor..cursor + 4]);
            cursor += 4;
            u32::from_le_bytes(len) as usize
        }
        direct => direct as usize,
    };
    if bytes.len() - cursor < len {
        return Some((Op::Invalid(opcode), bytes.len()));
    }
    let data = &bytes[cursor..cursor + len];
    Some((Op::Push { opcode, data }, cursor + len))
}

impl<'a> Iterator for Ops<'a> {
    type Item = (usize, Op<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let start = self.pos;
        match decode_op(self.bytes, start) {
            Some((op, next)) => {
                self.pos = next;
                if matches!(op, Op::Invalid(_)) {
                    self.done = true;
                }
                Some((start, op))
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}

/// Immutable script bytes.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Script(Vec<u8>);

impl Script {
    pub fn new() -> Self {
        Script(Vec::new())
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Script(bytes)
    }

    /// Builds a script from decoded operations.
    pub fn from_ops<'a, I: IntoIterator<Item = Op<'a>>>(ops: I) -> Self {
        let mut bytes = Vec::new();
        for op in ops {
            op.encode_into(&mut bytes);
        }
        Script(bytes)
    }

    pub fn from_hex(s: &str) -> std::result::Result<Self, SerializationError> {
        hex::decode(s)
            .map(Script)
            .map_err(|e| SerializationError::InvalidHex(e.to_string()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn ops(&self) -> Ops<'_> {
        Ops {
            bytes: &self.0,
            pos: 0,
            done: false,
        }
    }

    /// HASH160 of the script bytes, as committed to by P2SH.
    pub fn hash160(&self) -> Uint160 {
        Uint160::from_bytes(crypto::hash160(&self.0))
    }

    /// SHA256 of the script bytes, as committed to by P2WSH.
    pub fn sha256(&self) -> Uint256 {
        Uint256::from_bytes(crypto::sha256(&self.0))
    }

    /// True if every operation is a push (opcode <= OP_16) and the script decodes.
    pub fn is_push_only(&self) -> bool {
        self.ops().all(|(_, op)| match op {
            Op::Invalid(_) => false,
            other => other.opcode() <= OP_16,
        })
    }

    /// True if the script decodes completely and is within the size limit.
    pub fn is_valid(&self) -> bool {
        self.len() <= MAX_SCRIPT_SIZE && !self.ops().any(|(_, op)| matches!(op, Op::Invalid(_)))
    }

    /// Provably unspendable outputs: leading OP_RETURN or oversized.
    pub fn is_unspendable(&self) -> bool {
        self.0.first() == Some(&OP_RETURN) || self.len() > MAX_SCRIPT_SIZE
    }

    /// `OP_HASH160 <20 bytes> OP_EQUAL`
    pub fn is_p2sh(&self) -> bool {
        self.0.len() == 23 && self.0[0] == OP_HASH160 && self.0[1] == 0x14 && self.0[22] == OP_EQUAL
    }

    /// Version and program of a witness output: a version opcode followed by one 2..=40 byte push.
    pub fn witness_program(&self) -> Option<(u8, &[u8])> {
        let bytes = &self.0;
        if bytes.len() < 4 || bytes.len() > 42 {
            return None;
        }
        let version = decode_small_int(bytes[0])?;
        if bytes[1] as usize + 2 != bytes.len() {
            return None;
        }
        Some((version, &bytes[2..]))
    }

    pub fn is_witness_program(&self) -> bool {
        self.witness_program().is_some()
    }

    /// Data of the last push, if the script is push-only.
    pub fn last_push(&self) -> Option<&[u8]> {
        let mut last = None;
        for (_, op) in self.ops() {
            match op {
                Op::Push { data, .. } => last = Some(data),
                Op::Code(opcode) if opcode <= OP_16 => last = None,
                _ => return None,
            }
        }
        last
    }

    /// Signature operations in this script.
    ///
    /// With `accurate`, CHECKMULTISIG preceded by OP_1..OP_16 counts as that many
    /// keys; otherwise as the maximum of 20.
    pub fn sig_op_count(&self, accurate: bool) -> u32 {
        let mut count = 0u32;
        let mut last_opcode = OP_INVALIDOPCODE;
        for (_, op) in self.ops() {
            let opcode = match op {
                Op::Invalid(_) => break,
                other => other.opcode(),
            };
            match opcode {
                OP_CHECKSIG | OP_CHECKSIGVERIFY => count += 1,
                OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY => {
                    if accurate && (OP_1..=OP_16).contains(&last_opcode) {
                        count += decode_small_int(last_opcode).unwrap_or(0) as u32;
                    } else {
                        count += MAX_PUBKEYS_PER_MULTISIG as u32;
                    }
                }
                _ => {}
            }
            last_opcode = opcode;
        }
        count
    }

    /// Sig-ops of a P2SH redeem script revealed by `script_sig`; plain accurate count otherwise.
    pub fn p2sh_sig_op_count(&self, script_sig: &Script) -> u32 {
        if !self.is_p2sh() {
            return self.sig_op_count(true);
        }
        match script_sig.last_push() {
            Some(redeem) => Script::from_bytes(redeem.to_vec()).sig_op_count(true),
            None => 0,
        }
    }

    /// Returns a copy with every op-aligned occurrence of `pattern` removed.
    pub fn find_and_delete(&self, pattern: &Script) -> Script {
        let pattern = pattern.as_bytes();
        if pattern.is_empty() {
            return self.clone();
        }
        let bytes = &self.0;
        let mut result = Vec::with_capacity(bytes.len());
        let mut found = false;
        let mut pc = 0usize;
        let mut copied_from = 0usize;
        loop {
            result.extend_from_slice(&bytes[copied_from..pc]);
            while bytes.len() - pc >= pattern.len() && &bytes[pc..pc + pattern.len()] == pattern {
                pc += pattern.len();
                found = true;
            }
            copied_from = pc;
            match decode_op(bytes, pc) {
                Some((Op::Invalid(_), _)) | None => break,
                Some((_, next)) => pc = next,
            }
        }
        if !found {
            return self.clone();
        }
        result.extend_from_slice(&bytes[copied_from..]);
        Script(result)
    }

    /// Returns a copy without OP_CODESEPARATOR operations.
    pub fn without_codeseparators(&self) -> Script {
        let mut result = Vec::with_capacity(self.len());
        let mut ops = self.ops();
        let mut copied = 0;
        while let Some((pos, op)) = ops.next() {
            match op {
                Op::Code(OP_CODESEPARATOR) => {
                    result.extend_from_slice(&self.0[copied..pos]);
                    copied = ops.position();
                }
                Op::Invalid(_) => break,
                _ => {}
            }
        }
        result.extend_from_slice(&self.0[copied..]);
        Script(result)
    }

    /// Script starting right after byte offset `pos`.
    pub fn suffix_from(&self, pos: usize) -> Script {
        Script(self.0[pos.min(self.0.len())..].to_vec())
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Script({})", self)
    }
}

impl fmt::Display for Script {
    /// Mnemonic form: opcodes by name, short pushes as numbers, other pushes as hex.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (_, op) in self.ops() {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            match op {
                Op::Push { data, .. } if data.len() <= 4 => {
                    write!(f, "{}", ScriptNum::decode(data, false, 4).unwrap_or_default())?
                }
                Op::Push { data, .. } => f.write_str(&hex::encode(data))?,
                Op::Code(OP_1NEGATE) => f.write_str("-1")?,
                Op::Code(opcode) if (OP_1..=OP_16).contains(&opcode) => {
                    write!(f, "{}", opcode - (OP_1 - 1))?
                }
                Op::Code(opcode) => match name(opcode) {
                    Some(n) => f.write_str(n)?,
                    None => write!(f, "OP_UNKNOWN_{:#04x}", opcode)?,
                },
                Op::Invalid(_) => f.write_str("[error]")?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("script parse error: {0}")]
pub struct ScriptParseError(String);

impl FromStr for Script {
    type Err = ScriptParseError;

    /// Parses the mnemonic form.
    ///
    /// Tokens: decimal numbers of up to ten characters are pushed as script
    /// numbers, `0x` tokens are inserted as raw bytes, `'text'` is pushed as
    /// data, opcode names are accepted with or without the `OP_` prefix, and
    /// any other even-length hex token is pushed as data.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut builder = Builder::new();
        for token in s.split_whitespace() {
            let digits = token.strip_prefix('-').unwrap_or(token);
            if !digits.is_empty() && digits.len() <= 10 && digits.bytes().all(|b| b.is_ascii_digit()) {
                let n: i64 = token
                    .parse()
                    .map_err(|_| ScriptParseError(format!("bad number {}", token)))?;
                builder = builder.push_int(n);
            } else if let Some(raw) = token.strip_prefix("0x") {
                let bytes = hex::decode(raw)
                    .map_err(|_| ScriptParseError(format!("bad raw bytes {}", token)))?;
                builder = builder.push_raw(&bytes);
            } else if token.len() >= 2 && token.starts_with('\'') && token.ends_with('\'') {
                builder = builder.push_slice(token[1..token.len() - 1].as_bytes());
            } else if let Some(opcode) = from_name(token) {
                builder = builder.push_opcode(opcode);
            } else if let Ok(data) = hex::decode(token) {
                builder = builder.push_slice(&data);
            } else {
                return Err(ScriptParseError(format!("unknown token {}", token)));
            }
        }
        Ok(builder.into_script())
    }
}

impl From<Vec<u8>> for Script {
    fn from(bytes: Vec<u8>) -> Self {
        Script(bytes)
    }
}

impl AsRef<[u8]> for Script {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Incremental script construction.
#[derive(Debug, Default, Clone)]
pub struct Builder(Vec<u8>);

impl Builder {
    pub fn new() -> Self {
        Builder(Vec::new())
    }

    pub fn push_opcode(mut self, opcode: u8) -> Self {
        self.0.push(opcode);
        self
    }

    /// Pushes data with the smallest push opcode that fits.
    pub fn push_slice(mut self, data: &[u8]) -> Self {
        let len = data.len();
        if len < OP_PUSHDATA1 as usize {
            self.0.push(len as u8);
        } else if len <= 0xff {
            self.0.push(OP_PUSHDATA1);
            self.0.push(len as u8);
        } else if len <= 0xffff {
            self.0.push(OP_PUSHDATA2);
            self.0.extend_from_slice(&(len as u16).to_le_bytes());
        } else {
            self.0.push(OP_PUSHDATA4);
            self.0.extend_from_slice(&(len as u32).to_le_bytes());
        }
        self.0.extend_from_slice(data);
        self
    }

    /// Pushes a number, using OP_0/OP_1NEGATE/OP_1..OP_16 where possible.
    pub fn push_int(self, n: i64) -> Self {
        match n {
            0 => self.push_opcode(OP_0),
            -1 => self.push_opcode(OP_1NEGATE),
            1..=16 => self.push_opcode(encode_small_int(n as u8)),
            _ => self.push_slice(&ScriptNum::encode(n)),
        }
    }

    /// Appends bytes verbatim.
    pub fn push_raw(mut self, bytes: &[u8]) -> Self {
        self.0.extend_from_slice(bytes);
        self
    }

    pub fn into_script(self) -> Script {
        Script(self.0)
    }
}

/// Script numbers: little-endian sign-magnitude, sign in the top bit of the last byte.
pub struct ScriptNum;

impl ScriptNum {
    /// Minimal encoding of `n`; zero encodes as the empty array.
    pub fn encode(n: i64) -> Vec<u8> {
        if n == 0 {
            return Vec::new();
        }
        let negative = n < 0;
        let mut abs = n.unsigned_abs();
        let mut out = Vec::with_capacity(9);
        while abs > 0 {
            out.push((abs & 0xff) as u8);
            abs >>= 8;
        }
        let last = out.len() - 1;
        if out[last] & 0x80 != 0 {
            out.push(if negative { 0x80 } else { 0x00 });
        } else if negative {
            out[last] |= 0x80;
        }
        out
    }

    /// Decodes an operand of at most `max_len` bytes.
    ///
    /// Oversized or (with `require_minimal`) non-minimal operands fail with
    /// `ScriptError::UnknownError`.
    pub fn decode(bytes: &[u8], require_minimal: bool, max_len: usize) -> std::result::Result<i64, ScriptError> {
        if bytes.len() > max_len {
            return Err(ScriptError::UnknownError);
        }
        if require_minimal && !Self::is_minimal(bytes) {
            return Err(ScriptError::UnknownError);
        }
        if bytes.is_empty() {
            return Ok(0);
        }
        let mut result: i64 = 0;
        for (i, byte) in bytes.iter().enumerate() {
            result |= (*byte as i64) << (8 * i);
        }
        let last = bytes[bytes.len() - 1];
        if last & 0x80 != 0 {
            let mask = !(0x80i64 << (8 * (bytes.len() - 1)));
            Ok(-(result & mask))
        } else {
            Ok(result)
        }
    }

    /// No superfluous trailing zero byte (other than a needed sign byte).
    pub fn is_minimal(bytes: &[u8]) -> bool {
        match bytes.split_last() {
            None => true,
            Some((last, rest)) => {
                if last & 0x7f != 0 {
                    return true;
                }
                matches!(rest.last(), Some(prev) if prev & 0x80 != 0)
            }
        }
    }
}

/// Truthiness of a stack element: any non-zero byte, ignoring a lone sign bit at the end.
pub fn cast_to_bool(bytes: &[u8]) -> bool {
    for (i, byte) in bytes.iter().enumerate() {
        if *byte != 0 {
            return !(i == bytes.len() - 1 && *byte == 0x80);
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_p2pkh() {
        let script = Script::from_hex("76a9141d0f172a0ecb48aee1be1f2687d2963ae33f71a188ac").unwrap();
        let ops: Vec<_> = script.ops().map(|(_, op)| op).collect();
        assert_eq!(ops.len(), 5);
        assert_eq!(ops[0], Op::Code(OP_DUP));
        assert!(matches!(ops[2], Op::Push { opcode: 0x14, data } if data.len() == 20));
        assert_eq!(ops[4], Op::Code(OP_CHECKSIG));
    }

    #[test]
    fn test_truncated_push_is_invalid_marker() {
        // PUSHDATA1 declaring 5 bytes with only 2 present
        let script = Script::from_bytes(vec![OP_DUP, OP_PUSHDATA1, 0x05, 0xaa, 0xbb]);
        let ops: Vec<_> = script.ops().map(|(_, op)| op).collect();
        assert_eq!(ops, vec![Op::Code(OP_DUP), Op::Invalid(OP_PUSHDATA1)]);
        assert!(!script.is_valid());
        assert!(!script.is_push_only());
    }

    #[test]
    fn test_push_only() {
        let script = Builder::new().push_int(5).push_slice(&[1, 2, 3]).push_opcode(OP_0).into_script();
        assert!(script.is_push_only());
        let script = Builder::new().push_int(5).push_opcode(OP_DUP).into_script();
        assert!(!script.is_push_only());
    }

    #[test]
    fn test_builder_push_slice_encodings() {
        assert_eq!(Builder::new().push_slice(&[]).into_script().as_bytes(), &[0x00]);
        let s = Builder::new().push_slice(&[7u8; 75]).into_script();
        assert_eq!(s.as_bytes()[0], 75);
        let s = Builder::new().push_slice(&[7u8; 76]).into_script();
        assert_eq!(&s.as_bytes()[..2], &[OP_PUSHDATA1, 76]);
        let s = Builder::new().push_slice(&[7u8; 520]).into_script();
        assert_eq!(&s.as_bytes()[..3], &[OP_PUSHDATA2, 0x08, 0x02]);
    }

    #[test]
    fn test_script_num_encoding() {
        assert_eq!(ScriptNum::encode(0), Vec::<u8>::new());
        assert_eq!(ScriptNum::encode(1), vec![0x01]);
        assert_eq!(ScriptNum::encode(-1), vec![0x81]);
        assert_eq!(ScriptNum::encode(127), vec![0x7f]);
        assert_eq!(ScriptNum::encode(128), vec![0x80, 0x00]);
        assert_eq!(ScriptNum::encode(-128), vec![0x80, 0x80]);
        assert_eq!(ScriptNum::encode(255), vec![0xff, 0x00]);
        assert_eq!(ScriptNum::encode(256), vec![0x00, 0x01]);
    }

    #[test]
    fn test_script_num_decoding_rules() {
        assert_eq!(ScriptNum::decode(&[0x80, 0x80], true, 4), Ok(-128));
        assert_eq!(ScriptNum::decode(&[0x01, 0x00], false, 4), Ok(1));
        assert_eq!(ScriptNum::decode(&[0x01, 0x00], true, 4), Err(ScriptError::UnknownError));
        assert_eq!(ScriptNum::decode(&[0x80], true, 4), Err(ScriptError::UnknownError));
        assert_eq!(ScriptNum::decode(&[1, 2, 3, 4, 5], false, 4), Err(ScriptError::UnknownError));
        assert_eq!(ScriptNum::decode(&[1, 2, 3, 4, 5], false, 5), Ok(0x05_0403_0201));
    }

    #[test]
    fn test_cast_to_bool() {
        assert!(!cast_to_bool(&[]));
        assert!(!cast_to_bool(&[0x00, 0x00]));
        assert!(!cast_to_bool(&[0x00, 0x80]));
        assert!(cast_to_bool(&[0x80, 0x00]));
        assert!(cast_to_bool(&[0x01]));
    }

    #[test]
    fn test_find_and_delete_returns_new_script() {
        let script = Script::from_bytes(vec![0x02, 0xaa, 0xbb, OP_DUP, 0x02, 0xaa, 0xbb]);
        let pattern = Script::from_bytes(vec![0x02, 0xaa, 0xbb]);
        let result = script.find_and_delete(&pattern);
        assert_eq!(result.as_bytes(), &[OP_DUP]);
        assert_eq!(script.len(), 7);
    }

    #[test]
    fn test_find_and_delete_is_op_aligned() {
        // The pattern appears inside push data, which must not be touched
        let script = Script::from_bytes(vec![0x03, 0x02, 0xaa, 0xbb, OP_DUP]);
        let pattern = Script::from_bytes(vec![0x02, 0xaa, 0xbb]);
        assert_eq!(script.find_and_delete(&pattern), script);
    }

    #[test]
    fn test_without_codeseparators() {
        let script = Script::from_bytes(vec![OP_1, OP_CODESEPARATOR, OP_DUP, OP_CODESEPARATOR]);
        assert_eq!(script.without_codeseparators().as_bytes(), &[OP_1, OP_DUP]);
    }

    #[test]
    fn test_sig_op_counting() {
        let multisig = Builder::new()
            .push_int(2)
            .push_slice(&[2u8; 33])
            .push_slice(&[3u8; 33])
            .push_slice(&[4u8; 33])
            .push_int(3)
            .push_opcode(OP_CHECKMULTISIG)
            .into_script();
        assert_eq!(multisig.sig_op_count(true), 3);
        assert_eq!(multisig.sig_op_count(false), 20);

        let p2sh = Builder::new()
            .push_opcode(OP_HASH160)
            .push_slice(multisig.hash160().as_bytes())
            .push_opcode(OP_EQUAL)
            .into_script();
        assert!(p2sh.is_p2sh());
        let script_sig = Builder::new().push_opcode(OP_0).push_slice(multisig.as_bytes()).into_script();
        assert_eq!(p2sh.p2sh_sig_op_count(&script_sig), 3);
    }

    #[test]
    fn test_witness_program_detection() {
        let p2wpkh = Builder::new().push_opcode(OP_0).push_slice(&[9u8; 20]).into_script();
        assert_eq!(p2wpkh.witness_program(), Some((0, &[9u8; 20][..])));
        let too_short = Builder::new().push_opcode(OP_0).push_slice(&[9u8; 1]).into_script();
        assert!(too_short.witness_program().is_none());
    }

    #[test]
    fn test_text_form() {
        let script = Script::from_hex("76a9141d0f172a0ecb48aee1be1f2687d2963ae33f71a188ac").unwrap();
        let text = script.to_string();
        assert_eq!(
            text,
            "OP_DUP OP_HASH160 1d0f172a0ecb48aee1be1f2687d2963ae33f71a1 OP_EQUALVERIFY OP_CHECKSIG"
        );
        assert_eq!(text.parse::<Script>().unwrap(), script);
    }

    #[test]
    fn test_parse_numbers_and_raw_bytes() {
        let script: Script = "2 -1 0 1000 0x4c01ff".parse().unwrap();
        assert_eq!(script.as_bytes(), &[OP_2, OP_1NEGATE, OP_0, 0x02, 0xe8, 0x03, 0x4c, 0x01, 0xff]);
        assert!("OP_NOTREAL".parse::<Script>().is_err());
    }
}
