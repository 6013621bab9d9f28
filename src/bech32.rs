//! Bech32 encoding of segwit addresses (BIP173).
//!
//! A witness program is repacked from 8-bit to 5-bit groups, prefixed with
//! the witness version group, and protected by a 30-bit BCH checksum over
//! the expanded human-readable part and the data groups.

use std::fmt;

const CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";
const GENERATOR: [u32; 5] = [0x3b6a57b2, 0x26508e6d, 0x1ea119fa, 0x3d4233dd, 0x2a1462b3];
const CHECKSUM_LEN: usize = 6;

#[derive(Debug, PartialEq, Eq)]
pub enum Bech32Error {
    InvalidCharacter(char),
    ChecksumMismatch,
    /// Nonzero bits left over when unpacking 5-bit groups back to bytes.
    InvalidPadding,
    MissingSeparator,
    InvalidProgramLength(usize),
    InvalidWitnessVersion(u8),
}

impl fmt::Display for Bech32Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bech32Error::InvalidCharacter(c) => write!(f, "invalid bech32 character {c:?}"),
            Bech32Error::ChecksumMismatch => write!(f, "bech32 checksum mismatch"),
            Bech32Error::InvalidPadding => write!(f, "nonzero padding bits"),
            Bech32Error::MissingSeparator => write!(f, "missing '1' separator"),
            Bech32Error::InvalidProgramLength(n) => write!(f, "witness program length {n}"),
            Bech32Error::InvalidWitnessVersion(v) => write!(f, "witness version {v}"),
        }
    }
}

impl std::error::Error for Bech32Error {}

fn polymod(values: &[u8]) -> u32 {
    let mut chk: u32 = 1;
    for &v in values {
        let top = chk >> 25;
        chk = (chk & 0x1ff_ffff) << 5 ^ v as u32;
        for (i, gen) in GENERATOR.iter().enumerate() {
            if (top >> i) & 1 == 1 {
                chk ^= gen;
            }
        }
    }
    chk
}

fn hrp_expand(hrp: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(hrp.len() * 2 + 1);
    out.extend(hrp.bytes().map(|b| b >> 5));
    out.push(0);
    out.extend(hrp.bytes().map(|b| b & 31));
    out
}

fn create_checksum(hrp: &str, data: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut values = hrp_expand(hrp);
    values.extend_from_slice(data);
    values.extend_from_slice(&[0; CHECKSUM_LEN]);
    let pm = polymod(&values) ^ 1;
    let mut checksum = [0u8; CHECKSUM_LEN];
    for (i, group) in checksum.iter_mut().enumerate() {
        *group = ((pm >> (5 * (5 - i))) & 31) as u8;
    }
    checksum
}

/// Repack a bit stream between group sizes, most-significant-bit first.
/// With `pad` the final partial group is filled with zero bits; without it
/// any leftover bits must be zero padding, rejected otherwise.
fn convert_bits(data: &[u8], from: u32, to: u32, pad: bool) -> Result<Vec<u8>, Bech32Error> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let maxv: u32 = (1 << to) - 1;
    let mut out = Vec::with_capacity(data.len() * from as usize / to as usize + 1);
    for &b in data {
        acc = (acc << from) | b as u32;
        bits += from;
        while bits >= to {
            bits -= to;
            out.push(((acc >> bits) & maxv) as u8);
        }
    }
    if pad {
        if bits > 0 {
            out.push(((acc << (to - bits)) & maxv) as u8);
        }
    } else if bits >= from || ((acc << (to - bits)) & maxv) != 0 {
        return Err(Bech32Error::InvalidPadding);
    }
    Ok(out)
}

/// Encode a witness program as a bech32 address.
pub fn encode(hrp: &str, witness_version: u8, program: &[u8]) -> Result<String, Bech32Error> {
    if witness_version > 16 {
        return Err(Bech32Error::InvalidWitnessVersion(witness_version));
    }
    if !(2..=40).contains(&program.len()) {
        return Err(Bech32Error::InvalidProgramLength(program.len()));
    }

    let mut data = vec![witness_version];
    data.extend(convert_bits(program, 8, 5, true)?);
    let checksum = create_checksum(hrp, &data);

    let mut out = String::with_capacity(hrp.len() + 1 + data.len() + CHECKSUM_LEN);
    out.push_str(hrp);
    out.push('1');
    for &group in data.iter().chain(checksum.iter()) {
        out.push(CHARSET[group as usize] as char);
    }
    Ok(out)
}

/// Decode a bech32 address into its human-readable part, witness version
/// and witness program. Exact inverse of [`encode`].
pub fn decode(addr: &str) -> Result<(String, u8, Vec<u8>), Bech32Error> {
    let sep = addr.rfind('1').ok_or(Bech32Error::MissingSeparator)?;
    let (hrp, data_part) = (&addr[..sep], &addr[sep + 1..]);
    // At least the version group plus the checksum must follow.
    if hrp.is_empty() || data_part.len() < 1 + CHECKSUM_LEN {
        return Err(Bech32Error::MissingSeparator);
    }

    let mut data = Vec::with_capacity(data_part.len());
    for ch in data_part.chars() {
        let group = CHARSET
            .iter()
            .position(|&c| c as char == ch)
            .ok_or(Bech32Error::InvalidCharacter(ch))?;
        data.push(group as u8);
    }

    let mut values = hrp_expand(hrp);
    values.extend_from_slice(&data);
    if polymod(&values) != 1 {
        return Err(Bech32Error::ChecksumMismatch);
    }

    let payload = &data[..data.len() - CHECKSUM_LEN];
    let witness_version = payload[0];
    if witness_version > 16 {
        return Err(Bech32Error::InvalidWitnessVersion(witness_version));
    }
    let program = convert_bits(&payload[1..], 5, 8, false)?;
    if !(2..=40).contains(&program.len()) {
        return Err(Bech32Error::InvalidProgramLength(program.len()));
    }
    Ok((hrp.to_string(), witness_version, program))
}
