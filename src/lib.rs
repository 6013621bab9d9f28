//! Recover HD wallet key material from a raw wallet blob and check the
//! recovery by re-deriving addresses.
//!
//! The blob has no usable schema, so extraction is a byte-pattern heuristic
//! (see [`scanner`]). Everything downstream of the scanner is exact: BIP32
//! child derivation over secp256k1, Base58Check for embedded extended keys,
//! and bech32 for the final witness addresses.

pub mod base58;
pub mod bech32;
pub mod bip32;
pub mod descriptor;
pub mod scanner;
pub mod verify;

pub use bip32::{ChainCode, DerivationPath, DerivationStep, ExtendedKey, KeyMaterial};
pub use scanner::{scan, ScanResult};
pub use verify::{derive_address, verify, Verification};
