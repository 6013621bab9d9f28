//! BIP32 hierarchical key derivation over secp256k1.
//!
//! The engine is a pure function from (parent key material, parent chain
//! code, step) to (child key material, child chain code). It never retries
//! an index; callers handle `InvalidChildKey` (see the verify module).

use hmac::{Hmac, Mac};
use num_bigint::BigUint;
use secp256k1::{PublicKey, Scalar, Secp256k1, SecretKey};
use sha2::Sha512;
use std::fmt;

use crate::base58::{self, Base58Error};

type HmacSha512 = Hmac<Sha512>;

pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// Order of the secp256k1 base point; valid private scalars lie in (0, n).
const CURVE_ORDER_HEX: &[u8] =
    b"FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEBAAEDCE6AF48A03BBFD25E8CD0364141";

pub type ChainCode = [u8; 32];

fn curve_order() -> BigUint {
    BigUint::parse_bytes(CURVE_ORDER_HEX, 16).expect("curve order constant is valid hex")
}

/// True if `bytes`, read big-endian, is a valid private scalar.
pub fn is_valid_scalar(bytes: &[u8; 32]) -> bool {
    let value = BigUint::from_bytes_be(bytes);
    value != BigUint::default() && value < curve_order()
}

/// Key material at one derivation depth: a private scalar or a compressed
/// public point. Derivation behavior differs by tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyMaterial {
    Private([u8; 32]),
    Public([u8; 33]),
}

impl KeyMaterial {
    /// The compressed public key for this material, computing scalar * G
    /// for private material.
    pub fn public_bytes(&self) -> Result<[u8; 33], DerivationError> {
        match self {
            KeyMaterial::Public(point) => Ok(*point),
            KeyMaterial::Private(scalar) => {
                let secp = Secp256k1::new();
                let sk = SecretKey::from_slice(scalar)
                    .map_err(|_| DerivationError::InvalidParentKey)?;
                Ok(PublicKey::from_secret_key(&secp, &sk).serialize())
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum DerivationError {
    /// Hardened derivation needs the parent's private scalar.
    MissingPrivateKey,
    /// IL out of range, zero child scalar, or child point at infinity.
    /// The caller should retry with the next index.
    InvalidChildKey,
    /// Parent key material does not parse as a scalar/point.
    InvalidParentKey,
    /// Malformed derivation path text.
    BadPath,
}

impl fmt::Display for DerivationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DerivationError::MissingPrivateKey => {
                write!(f, "hardened derivation requires a private parent key")
            }
            DerivationError::InvalidChildKey => {
                write!(f, "derived child key out of range, retry with the next index")
            }
            DerivationError::InvalidParentKey => write!(f, "invalid parent key material"),
            DerivationError::BadPath => write!(f, "invalid derivation path"),
        }
    }
}

impl std::error::Error for DerivationError {}

/// One step of a derivation path. `index` is the 31-bit child number; the
/// hardened offset is applied during derivation, not stored here.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DerivationStep {
    pub index: u32,
    pub hardened: bool,
}

impl DerivationStep {
    pub fn normal(index: u32) -> Self {
        DerivationStep { index, hardened: false }
    }

    pub fn hardened(index: u32) -> Self {
        DerivationStep { index, hardened: true }
    }
}

/// An ordered sequence of derivation steps from a root key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DerivationPath(pub Vec<DerivationStep>);

impl DerivationPath {
    /// Parse path text like `m/84'/1'/0'/0/0` (`h` and `'` both mark a
    /// hardened step; the leading `m/` is optional).
    pub fn parse(text: &str) -> Result<Self, DerivationError> {
        let rest = text.strip_prefix("m/").or_else(|| text.strip_prefix('m')).unwrap_or(text);
        let mut steps = Vec::new();
        for part in rest.split('/') {
            if part.is_empty() {
                continue;
            }
            let hardened = part.ends_with('\'') || part.ends_with('h');
            let digits = if hardened { &part[..part.len() - 1] } else { part };
            let index: u32 = digits.parse().map_err(|_| DerivationError::BadPath)?;
            if index >= HARDENED_OFFSET {
                return Err(DerivationError::BadPath);
            }
            steps.push(DerivationStep { index, hardened });
        }
        Ok(DerivationPath(steps))
    }

    pub fn steps(&self) -> &[DerivationStep] {
        &self.0
    }
}

/// Derive one child from a parent. Stateless and deterministic.
pub fn derive_child(
    parent: &KeyMaterial,
    chain_code: &ChainCode,
    step: DerivationStep,
) -> Result<(KeyMaterial, ChainCode), DerivationError> {
    let mut data = Vec::with_capacity(37);
    if step.hardened {
        let KeyMaterial::Private(scalar) = parent else {
            return Err(DerivationError::MissingPrivateKey);
        };
        data.push(0x00);
        data.extend_from_slice(scalar);
        data.extend_from_slice(&(step.index | HARDENED_OFFSET).to_be_bytes());
    } else {
        data.extend_from_slice(&parent.public_bytes()?);
        data.extend_from_slice(&step.index.to_be_bytes());
    }

    let mut mac =
        HmacSha512::new_from_slice(chain_code).expect("HMAC accepts any key length");
    mac.update(&data);
    let digest = mac.finalize().into_bytes();
    let (il, ir) = digest.split_at(32);

    let n = curve_order();
    let il_int = BigUint::from_bytes_be(il);
    if il_int >= n {
        return Err(DerivationError::InvalidChildKey);
    }

    let child = match parent {
        KeyMaterial::Private(scalar) => {
            let sum = (il_int + BigUint::from_bytes_be(scalar)) % &n;
            if sum == BigUint::default() {
                return Err(DerivationError::InvalidChildKey);
            }
            let mut child = [0u8; 32];
            let be = sum.to_bytes_be();
            child[32 - be.len()..].copy_from_slice(&be);
            KeyMaterial::Private(child)
        }
        KeyMaterial::Public(point) => {
            let secp = Secp256k1::new();
            let parent_point =
                PublicKey::from_slice(point).map_err(|_| DerivationError::InvalidParentKey)?;
            let mut tweak = [0u8; 32];
            tweak.copy_from_slice(il);
            let tweak =
                Scalar::from_be_bytes(tweak).map_err(|_| DerivationError::InvalidChildKey)?;
            let child = parent_point
                .add_exp_tweak(&secp, &tweak)
                .map_err(|_| DerivationError::InvalidChildKey)?;
            KeyMaterial::Public(child.serialize())
        }
    };

    let mut child_chain_code = [0u8; 32];
    child_chain_code.copy_from_slice(ir);
    Ok((child, child_chain_code))
}

/// Fold a path through [`derive_child`] left to right. No retry policy:
/// the first `InvalidChildKey` propagates.
pub fn derive_path(
    root: &KeyMaterial,
    chain_code: &ChainCode,
    path: &[DerivationStep],
) -> Result<(KeyMaterial, ChainCode), DerivationError> {
    let mut key = *root;
    let mut chain_code = *chain_code;
    for &step in path {
        (key, chain_code) = derive_child(&key, &chain_code, step)?;
    }
    Ok((key, chain_code))
}

// Extended key serialization (BIP32): 78-byte payload wrapped in
// Base58Check with a 4-character type prefix.

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtendedKey {
    pub version: [u8; 4],
    pub depth: u8,
    pub parent_fingerprint: [u8; 4],
    pub child_number: u32,
    pub chain_code: ChainCode,
    pub key: KeyMaterial,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ExtendedKeyError {
    Base58(Base58Error),
    InvalidLength(usize),
    /// keyData must start with 0x00 (private) or 0x02/0x03 (public point).
    InvalidKeyData(u8),
}

impl fmt::Display for ExtendedKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtendedKeyError::Base58(e) => write!(f, "{e}"),
            ExtendedKeyError::InvalidLength(n) => {
                write!(f, "extended key payload is {n} bytes, expected 78")
            }
            ExtendedKeyError::InvalidKeyData(b) => {
                write!(f, "unexpected key data prefix byte 0x{b:02x}")
            }
        }
    }
}

impl std::error::Error for ExtendedKeyError {}

impl From<Base58Error> for ExtendedKeyError {
    fn from(e: Base58Error) -> Self {
        ExtendedKeyError::Base58(e)
    }
}

impl ExtendedKey {
    /// Parse a Base58Check extended key string (xprv/xpub/tprv/tpub).
    pub fn parse(s: &str) -> Result<Self, ExtendedKeyError> {
        let payload = base58::decode_check(s)?;
        if payload.len() != 78 {
            return Err(ExtendedKeyError::InvalidLength(payload.len()));
        }

        let mut version = [0u8; 4];
        version.copy_from_slice(&payload[0..4]);
        let depth = payload[4];
        let mut parent_fingerprint = [0u8; 4];
        parent_fingerprint.copy_from_slice(&payload[5..9]);
        let mut child_number_be = [0u8; 4];
        child_number_be.copy_from_slice(&payload[9..13]);
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&payload[13..45]);

        let key = match payload[45] {
            0x00 => {
                let mut scalar = [0u8; 32];
                scalar.copy_from_slice(&payload[46..78]);
                KeyMaterial::Private(scalar)
            }
            0x02 | 0x03 => {
                let mut point = [0u8; 33];
                point.copy_from_slice(&payload[45..78]);
                KeyMaterial::Public(point)
            }
            other => return Err(ExtendedKeyError::InvalidKeyData(other)),
        };

        Ok(ExtendedKey {
            version,
            depth,
            parent_fingerprint,
            child_number: u32::from_be_bytes(child_number_be),
            chain_code,
            key,
        })
    }
}
