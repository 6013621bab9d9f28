//! Heuristic extraction of master key material from a raw wallet blob.
//!
//! The blob format is underspecified, so both searches are best-effort
//! byte-pattern scans. False negatives are possible if the layout drifts
//! from the two fixed signatures; false positives are guarded only by the
//! curve-order bound on scalar candidates and the depth-0 filter on
//! embedded extended keys. Absence is a normal outcome, not an error.

use crate::base58;
use crate::bip32::{self, ExtendedKey};

/// ASCII marker of a descriptor-key record.
pub const DESCRIPTOR_KEY_MARKER: &[u8] = b"walletdescriptorkey";

/// Byte signature immediately preceding the 32 raw scalar bytes.
pub const PRIVATE_KEY_SIGNATURE: &[u8] = &[0xd3, 0x02, 0x01, 0x01, 0x04, 0x20];

/// How far past an anchor the signature may start.
pub const SIGNATURE_WINDOW: usize = 200;

/// Textual prefixes of embedded extended keys.
pub const EXTENDED_KEY_PREFIXES: [&[u8; 4]; 4] = [b"xpub", b"xprv", b"tpub", b"tprv"];

/// Longest base58 run considered, prefix included.
pub const MAX_EXTENDED_KEY_LEN: usize = 120;

/// Runs at or below this length are too short to be an extended key.
pub const MIN_EXTENDED_KEY_LEN: usize = 100;

/// Blob-format constants for the scalar search, parameterized so the
/// heuristic can be swapped if the wallet format revision changes.
#[derive(Clone, Copy, Debug)]
pub struct ScanParams {
    pub anchor: &'static [u8],
    pub signature: &'static [u8],
    pub window: usize,
}

impl Default for ScanParams {
    fn default() -> Self {
        ScanParams {
            anchor: DESCRIPTOR_KEY_MARKER,
            signature: PRIVATE_KEY_SIGNATURE,
            window: SIGNATURE_WINDOW,
        }
    }
}

/// Outcome of one scan. Either field may be absent independently.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ScanResult {
    pub master_key: Option<[u8; 32]>,
    pub chain_code: Option<[u8; 32]>,
}

/// Scan `blob` with the default wallet-format parameters.
pub fn scan(blob: &[u8]) -> ScanResult {
    scan_with(&ScanParams::default(), blob)
}

/// Scan `blob` for a master private scalar and a root chain code. The two
/// searches are independent of each other.
pub fn scan_with(params: &ScanParams, blob: &[u8]) -> ScanResult {
    ScanResult {
        master_key: find_master_key(params, blob),
        chain_code: find_master_chain_code(blob),
    }
}

/// First valid scalar candidate, by anchor order then position within the
/// window after each anchor.
fn find_master_key(params: &ScanParams, blob: &[u8]) -> Option<[u8; 32]> {
    let mut from = 0;
    while let Some(anchor) = find_pattern(blob, params.anchor, from) {
        let start = anchor + params.anchor.len();
        let end = (anchor + params.window).min(blob.len());
        for pos in start..end {
            let Some(window) = blob.get(pos..pos + params.signature.len() + 32) else {
                break;
            };
            if &window[..params.signature.len()] != params.signature {
                continue;
            }
            let mut candidate = [0u8; 32];
            candidate.copy_from_slice(&window[params.signature.len()..]);
            if bip32::is_valid_scalar(&candidate) {
                return Some(candidate);
            }
        }
        from = anchor + 1;
    }
    None
}

/// Chain code of the first embedded extended key that parses at depth 0.
fn find_master_chain_code(blob: &[u8]) -> Option<[u8; 32]> {
    let mut from = 0;
    while let Some(at) = next_extended_key_prefix(blob, from) {
        let run = read_base58_run(blob, at);
        if run.len() > MIN_EXTENDED_KEY_LEN {
            if let Ok(key) = ExtendedKey::parse(&run) {
                if key.depth == 0 {
                    return Some(key.chain_code);
                }
            }
        }
        from = at + 4;
    }
    None
}

fn find_pattern(blob: &[u8], pattern: &[u8], from: usize) -> Option<usize> {
    if pattern.is_empty() || blob.len() < pattern.len() || from + pattern.len() > blob.len() {
        return None;
    }
    blob[from..]
        .windows(pattern.len())
        .position(|w| w == pattern)
        .map(|i| from + i)
}

fn next_extended_key_prefix(blob: &[u8], from: usize) -> Option<usize> {
    if blob.len() < 4 {
        return None;
    }
    (from..=blob.len() - 4).find(|&i| {
        EXTENDED_KEY_PREFIXES
            .iter()
            .any(|prefix| &blob[i..i + 4] == prefix.as_slice())
    })
}

/// The run of base58-alphabet bytes starting at `start`, capped at
/// [`MAX_EXTENDED_KEY_LEN`] characters.
fn read_base58_run(blob: &[u8], start: usize) -> String {
    blob[start..]
        .iter()
        .take(MAX_EXTENDED_KEY_LEN)
        .take_while(|&&b| base58::is_alphabet_byte(b))
        .map(|&b| b as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCALAR: [u8; 32] = [
        0x64, 0xc1, 0x65, 0x32, 0x1a, 0x1e, 0x49, 0xe4, 0x30, 0x5b, 0xdf, 0xae, 0x73, 0xdf,
        0x17, 0xe3, 0x16, 0x15, 0x04, 0xd8, 0x12, 0xe8, 0x11, 0x63, 0x8a, 0x99, 0xd1, 0x37,
        0xca, 0x8c, 0x44, 0xaa,
    ];

    const MASTER_XPRV: &str = "xprv9s21ZrQH143K2rgqEwd1ACRuWQH2o69zzmZQqtRB7f6k3sQ3szpFtePGM1Qc1HRBpHo1HcGMcn7QFEjCVvnZRdWietSZ33zHSzgfAZWRWnp";

    // Valid Base58Check xpub at depth 3; the scanner must skip it.
    const DEPTH3_XPUB: &str = "xpub6BemYiVEULcbp2B8jpHuBLCzeqJxzj7aX5LdZsD55sH8FQ4jUo9VBb95VNJTVcxZnUPr9TtaHtCTZ1XuJXfZQfBgjhaCbTBtx6UKTkW9sur";

    fn blob_with_key(scalar: &[u8; 32], gap: usize) -> Vec<u8> {
        let mut blob = vec![0x07; 11];
        blob.extend_from_slice(DESCRIPTOR_KEY_MARKER);
        blob.extend(std::iter::repeat(0x41).take(gap));
        blob.extend_from_slice(PRIVATE_KEY_SIGNATURE);
        blob.extend_from_slice(scalar);
        blob.extend_from_slice(&[0x00, 0x99]);
        blob
    }

    #[test]
    fn recovers_scalar_after_anchor() {
        let blob = blob_with_key(&SCALAR, 40);
        assert_eq!(scan(&blob).master_key, Some(SCALAR));
    }

    #[test]
    fn ignores_signature_outside_window() {
        let blob = blob_with_key(&SCALAR, SIGNATURE_WINDOW + 8);
        assert_eq!(scan(&blob).master_key, None);
    }

    #[test]
    fn skips_out_of_range_candidate() {
        // First anchor carries an invalid scalar (all 0xff >= n), second a
        // valid one; the second must win.
        let mut blob = blob_with_key(&[0xff; 32], 4);
        blob.extend_from_slice(&blob_with_key(&SCALAR, 4));
        assert_eq!(scan(&blob).master_key, Some(SCALAR));
    }

    #[test]
    fn empty_or_anchor_free_blob_finds_nothing() {
        assert_eq!(scan(&[]), ScanResult::default());
        let noise = vec![0x5a; 4096];
        assert_eq!(scan(&noise), ScanResult::default());
    }

    #[test]
    fn scan_is_idempotent() {
        let mut blob = blob_with_key(&SCALAR, 12);
        blob.extend_from_slice(MASTER_XPRV.as_bytes());
        blob.push(0x00);
        assert_eq!(scan(&blob), scan(&blob));
    }

    #[test]
    fn recovers_chain_code_from_depth_zero_key() {
        let mut blob = vec![0xee; 17];
        blob.extend_from_slice(MASTER_XPRV.as_bytes());
        blob.push(0x00);
        assert_eq!(
            scan(&blob).chain_code.map(|cc| cc.to_vec()),
            Some(
                hex::decode("503b9544e02e1a101abc2982e513c16d71fb3f103bbad3974c27ba9983aa130a")
                    .unwrap()
            )
        );
    }

    #[test]
    fn skips_extended_keys_at_nonzero_depth() {
        let mut blob = Vec::new();
        blob.extend_from_slice(DEPTH3_XPUB.as_bytes());
        blob.push(0x00);
        assert_eq!(scan(&blob).chain_code, None);

        blob.extend_from_slice(MASTER_XPRV.as_bytes());
        blob.push(0x00);
        let expected: [u8; 32] =
            hex::decode("503b9544e02e1a101abc2982e513c16d71fb3f103bbad3974c27ba9983aa130a")
                .unwrap()
                .try_into()
                .unwrap();
        assert_eq!(scan(&blob).chain_code, Some(expected));
    }

    #[test]
    fn ignores_short_base58_runs() {
        let mut blob = Vec::new();
        blob.extend_from_slice(b"xpubTooShort");
        blob.push(0xff);
        assert_eq!(scan(&blob).chain_code, None);
    }

    #[test]
    fn searches_are_independent() {
        // Scalar only, no extended key anywhere.
        let blob = blob_with_key(&SCALAR, 3);
        let result = scan(&blob);
        assert_eq!(result.master_key, Some(SCALAR));
        assert_eq!(result.chain_code, None);
    }
}
