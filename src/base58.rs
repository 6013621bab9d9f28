//! Base58 and Base58Check encoding.
//!
//! Extended keys embedded in wallet files are Base58Check strings whose
//! decoded form is 82 bytes: a 78-byte payload followed by the first 4
//! bytes of double-SHA256 of that payload.

use num_bigint::BigUint;
use sha2::{Digest, Sha256};
use std::fmt;

const ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Checksum length of a Base58Check string, in bytes.
pub const CHECKSUM_LEN: usize = 4;

#[derive(Debug, PartialEq, Eq)]
pub enum Base58Error {
    InvalidCharacter(char),
    ChecksumMismatch,
    /// Decoded data too short to carry a checksum.
    TooShort(usize),
}

impl fmt::Display for Base58Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Base58Error::InvalidCharacter(c) => write!(f, "invalid base58 character {c:?}"),
            Base58Error::ChecksumMismatch => write!(f, "base58check checksum mismatch"),
            Base58Error::TooShort(n) => write!(f, "decoded length {n} too short for a checksum"),
        }
    }
}

impl std::error::Error for Base58Error {}

/// True if `b` is one of the 58 alphabet symbols (digits and letters,
/// excluding `0`, `O`, `I` and `l`).
pub fn is_alphabet_byte(b: u8) -> bool {
    ALPHABET.contains(&b)
}

/// Decode a Base58 string into raw bytes (no checksum handling).
pub fn decode(s: &str) -> Result<Vec<u8>, Base58Error> {
    let zeros = s.bytes().take_while(|&b| b == b'1').count();

    let mut acc = BigUint::default();
    let base = BigUint::from(58u32);
    for ch in s.chars() {
        let digit = ALPHABET
            .iter()
            .position(|&a| a as char == ch)
            .ok_or(Base58Error::InvalidCharacter(ch))?;
        acc = &acc * &base + BigUint::from(digit as u32);
    }

    // BigUint renders zero as [0], which would double-count the leading
    // '1' digits.
    let raw = if acc == BigUint::default() {
        Vec::new()
    } else {
        acc.to_bytes_be()
    };

    let mut bytes = vec![0u8; zeros];
    bytes.extend_from_slice(&raw);
    Ok(bytes)
}

/// Encode raw bytes as a Base58 string. Exact inverse of [`decode`].
pub fn encode(bytes: &[u8]) -> String {
    let zeros = bytes.iter().take_while(|&&b| b == 0).count();

    let mut num = BigUint::from_bytes_be(bytes);
    let base = BigUint::from(58u32);
    let zero = BigUint::default();
    let mut digits = Vec::new();
    while num > zero {
        let rem = &num % &base;
        num = &num / &base;
        let digit = rem.to_u32_digits().first().copied().unwrap_or(0) as usize;
        digits.push(ALPHABET[digit]);
    }

    let mut out = String::with_capacity(zeros + digits.len());
    for _ in 0..zeros {
        out.push('1');
    }
    for &d in digits.iter().rev() {
        out.push(d as char);
    }
    out
}

/// Decode a Base58Check string, verify the trailing 4-byte checksum and
/// return the payload without it.
pub fn decode_check(s: &str) -> Result<Vec<u8>, Base58Error> {
    let bytes = decode(s)?;
    if bytes.len() < CHECKSUM_LEN {
        return Err(Base58Error::TooShort(bytes.len()));
    }
    let (payload, checksum) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
    if checksum != &double_sha256(payload)[..CHECKSUM_LEN] {
        return Err(Base58Error::ChecksumMismatch);
    }
    Ok(payload.to_vec())
}

/// Append the 4-byte checksum to `payload` and Base58-encode the result.
pub fn encode_check(payload: &[u8]) -> String {
    let mut bytes = payload.to_vec();
    bytes.extend_from_slice(&double_sha256(payload)[..CHECKSUM_LEN]);
    encode(&bytes)
}

fn double_sha256(data: &[u8]) -> [u8; 32] {
    let once = Sha256::digest(data);
    Sha256::digest(once).into()
}
