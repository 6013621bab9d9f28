//! Verification harness: scan a blob, re-derive an address along a path
//! and compare it to a known-good value.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
use std::fmt;

use crate::bech32::{self, Bech32Error};
use crate::bip32::{self, ChainCode, DerivationError, DerivationStep, KeyMaterial};
use crate::scanner::{self, ScanResult};

/// How many consecutive indices to try when a derivation step yields an
/// out-of-range child. BIP32 makes this case astronomically rare, so a
/// small bound is enough to tell a retryable miss from a broken input.
pub const INDEX_RETRY_LIMIT: u32 = 4;

/// Outcome of a verification run. `Incomplete` means extraction failed,
/// not that derivation or comparison did.
#[derive(Debug, PartialEq, Eq)]
pub enum Verification {
    Match,
    Mismatch { derived: String },
    Incomplete,
}

#[derive(Debug, PartialEq, Eq)]
pub enum VerifyError {
    Derivation(DerivationError),
    Encoding(Bech32Error),
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyError::Derivation(e) => write!(f, "{e}"),
            VerifyError::Encoding(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for VerifyError {}

impl From<DerivationError> for VerifyError {
    fn from(e: DerivationError) -> Self {
        VerifyError::Derivation(e)
    }
}

impl From<Bech32Error> for VerifyError {
    fn from(e: Bech32Error) -> Self {
        VerifyError::Encoding(e)
    }
}

/// Scan `blob`, derive along `path` from the recovered key material and
/// compare the resulting P2WPKH address against `expected`.
pub fn verify(
    blob: &[u8],
    path: &[DerivationStep],
    hrp: &str,
    expected: &str,
) -> Result<Verification, VerifyError> {
    let ScanResult { master_key, chain_code } = scanner::scan(blob);
    let (Some(master_key), Some(chain_code)) = (master_key, chain_code) else {
        return Ok(Verification::Incomplete);
    };

    let root = KeyMaterial::Private(master_key);
    let derived = derive_address(&root, &chain_code, path, hrp)?;
    if derived == expected {
        Ok(Verification::Match)
    } else {
        Ok(Verification::Mismatch { derived })
    }
}

/// Witness-version-0 bech32 address of the key at `path` below `root`.
pub fn derive_address(
    root: &KeyMaterial,
    chain_code: &ChainCode,
    path: &[DerivationStep],
    hrp: &str,
) -> Result<String, VerifyError> {
    let (key, _) = derive_path_with_retry(root, chain_code, path)?;
    let program = hash160(&key.public_bytes()?);
    Ok(bech32::encode(hrp, 0, &program)?)
}

/// Fold `path` through the derivation engine, bumping the index on
/// `InvalidChildKey` up to [`INDEX_RETRY_LIMIT`] times per step. The retry
/// policy lives here, at the call site, so the engine stays pure.
pub fn derive_path_with_retry(
    root: &KeyMaterial,
    chain_code: &ChainCode,
    path: &[DerivationStep],
) -> Result<(KeyMaterial, ChainCode), VerifyError> {
    let mut key = *root;
    let mut chain_code = *chain_code;
    for &step in path {
        (key, chain_code) = derive_step_with_retry(&key, &chain_code, step)?;
    }
    Ok((key, chain_code))
}

fn derive_step_with_retry(
    parent: &KeyMaterial,
    chain_code: &ChainCode,
    mut step: DerivationStep,
) -> Result<(KeyMaterial, ChainCode), VerifyError> {
    for _ in 0..=INDEX_RETRY_LIMIT {
        match bip32::derive_child(parent, chain_code, step) {
            Err(DerivationError::InvalidChildKey) => step.index += 1,
            other => return other.map_err(VerifyError::Derivation),
        }
    }
    Err(VerifyError::Derivation(DerivationError::InvalidChildKey))
}

/// RIPEMD-160 of SHA-256: the 20-byte witness program of a public key.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    Ripemd160::digest(sha).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bip32::DerivationPath;
    use crate::scanner::{DESCRIPTOR_KEY_MARKER, PRIVATE_KEY_SIGNATURE};

    const MASTER_XPRV: &str = "xprv9s21ZrQH143K2rgqEwd1ACRuWQH2o69zzmZQqtRB7f6k3sQ3szpFtePGM1Qc1HRBpHo1HcGMcn7QFEjCVvnZRdWietSZ33zHSzgfAZWRWnp";

    fn scalar(hex_str: &str) -> [u8; 32] {
        hex::decode(hex_str).unwrap().try_into().unwrap()
    }

    fn synthetic_blob(master_key: &[u8; 32], xprv: &str) -> Vec<u8> {
        let mut blob = vec![0xc4; 23];
        blob.extend_from_slice(DESCRIPTOR_KEY_MARKER);
        blob.extend_from_slice(&[0x00; 9]);
        blob.extend_from_slice(PRIVATE_KEY_SIGNATURE);
        blob.extend_from_slice(master_key);
        blob.extend_from_slice(&[0x00, 0x00, 0x7f]);
        blob.extend_from_slice(xprv.as_bytes());
        blob.push(0x0a);
        blob
    }

    #[test]
    fn derives_expected_address_for_first_wallet() {
        let root = KeyMaterial::Private(scalar(
            "44af427cc3e4eca15633682c50383df02f5598ff70ae972060b32529106efea3",
        ));
        let chain_code =
            scalar("ef9b229fa43b5321834bce029dcca011db64764538f06e5b50b9dd5f38d16678");
        let path = DerivationPath::parse("m/84'/1'/0'/0/0").unwrap();
        let address = derive_address(&root, &chain_code, path.steps(), "alpha").unwrap();
        assert_eq!(address, "alpha1q64c7vmezvqd43l4g0hg8l72uttc0sc5cqrhpqz");
    }

    #[test]
    fn derives_expected_address_for_second_wallet() {
        let root = KeyMaterial::Private(scalar(
            "64c165321a1e49e4305bdfae73df17e3161504d812e811638a99d137ca8c44aa",
        ));
        let chain_code =
            scalar("503b9544e02e1a101abc2982e513c16d71fb3f103bbad3974c27ba9983aa130a");
        let path = DerivationPath::parse("m/84'/1'/0'/0/1").unwrap();
        let address = derive_address(&root, &chain_code, path.steps(), "alpha").unwrap();
        assert_eq!(address, "alpha1qw0nylklglj2trsn4saeqy6wnzjwcwdp27a3zmf");
    }

    #[test]
    fn verifies_end_to_end_from_synthetic_blob() {
        let blob = synthetic_blob(
            &scalar("64c165321a1e49e4305bdfae73df17e3161504d812e811638a99d137ca8c44aa"),
            MASTER_XPRV,
        );
        let path = DerivationPath::parse("m/84'/1'/0'/0/1").unwrap();
        assert_eq!(
            verify(&blob, path.steps(), "alpha", "alpha1qw0nylklglj2trsn4saeqy6wnzjwcwdp27a3zmf")
                .unwrap(),
            Verification::Match
        );
    }

    #[test]
    fn reports_mismatch_with_derived_address() {
        let blob = synthetic_blob(
            &scalar("64c165321a1e49e4305bdfae73df17e3161504d812e811638a99d137ca8c44aa"),
            MASTER_XPRV,
        );
        let path = DerivationPath::parse("m/84'/1'/0'/0/0").unwrap();
        match verify(&blob, path.steps(), "alpha", "alpha1qw0nylklglj2trsn4saeqy6wnzjwcwdp27a3zmf")
            .unwrap()
        {
            Verification::Mismatch { derived } => {
                assert!(derived.starts_with("alpha1"));
            }
            other => panic!("expected Mismatch, got {other:?}"),
        }
    }

    #[test]
    fn incomplete_when_extraction_fails() {
        let path = DerivationPath::parse("m/84'/1'/0'/0/0").unwrap();
        assert_eq!(
            verify(&[], path.steps(), "alpha", "alpha1q...").unwrap(),
            Verification::Incomplete
        );

        // Scalar present but no embedded extended key.
        let mut blob = vec![0x01; 5];
        blob.extend_from_slice(DESCRIPTOR_KEY_MARKER);
        blob.extend_from_slice(PRIVATE_KEY_SIGNATURE);
        blob.extend_from_slice(&scalar(
            "64c165321a1e49e4305bdfae73df17e3161504d812e811638a99d137ca8c44aa",
        ));
        assert_eq!(
            verify(&blob, path.steps(), "alpha", "alpha1q...").unwrap(),
            Verification::Incomplete
        );
    }

    #[test]
    fn hardened_path_from_public_root_fails() {
        let root = KeyMaterial::Private(scalar(
            "64c165321a1e49e4305bdfae73df17e3161504d812e811638a99d137ca8c44aa",
        ));
        let public = KeyMaterial::Public(root.public_bytes().unwrap());
        let chain_code =
            scalar("503b9544e02e1a101abc2982e513c16d71fb3f103bbad3974c27ba9983aa130a");
        let path = DerivationPath::parse("m/84'").unwrap();
        assert_eq!(
            derive_path_with_retry(&public, &chain_code, path.steps()),
            Err(VerifyError::Derivation(DerivationError::MissingPrivateKey))
        );
    }
}
