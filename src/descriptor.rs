//! Helpers over descriptor-wallet key-value records.
//!
//! The descriptor wallet itself is an external store (SQLite-backed) that
//! hands back raw record bytes; this module only interprets them. Record
//! keys are length-prefixed ASCII type tags, so descriptor records are
//! selected by the byte prefix `0x10 || "walletdescriptor"`.

use crate::bip32::ExtendedKey;
use crate::scanner::{EXTENDED_KEY_PREFIXES, MAX_EXTENDED_KEY_LEN, MIN_EXTENDED_KEY_LEN};
use crate::base58;

/// Byte prefix of a descriptor record key (0x10 is the tag length).
pub const DESCRIPTOR_RECORD_PREFIX: &[u8] = b"\x10walletdescriptor";

/// Textual descriptor payloads of the descriptor records in `records`.
/// Only key-hash descriptors (`pkh(`/`wpkh(`) are kept.
pub fn descriptor_strings<'a, I>(records: I) -> Vec<String>
where
    I: IntoIterator<Item = (&'a [u8], &'a [u8])>,
{
    records
        .into_iter()
        .filter(|(key, _)| key.starts_with(DESCRIPTOR_RECORD_PREFIX))
        .filter_map(|(_, value)| descriptor_text(value))
        .collect()
}

/// Extended-key tokens (xpub/xprv/tpub/tprv plus base58 run) embedded in a
/// descriptor string.
pub fn extended_key_tokens(descriptor: &str) -> Vec<String> {
    let bytes = descriptor.as_bytes();
    let mut tokens = Vec::new();
    let mut from = 0;
    while let Some(at) = next_prefix(bytes, from) {
        let run: String = bytes[at..]
            .iter()
            .take(MAX_EXTENDED_KEY_LEN)
            .take_while(|&&b| base58::is_alphabet_byte(b))
            .map(|&b| b as char)
            .collect();
        from = at + run.len().max(4);
        if run.len() > MIN_EXTENDED_KEY_LEN {
            tokens.push(run);
        }
    }
    tokens
}

/// Root chain code recovered from the store: bytes 13..45 of the first
/// embedded extended key that parses at depth 0.
pub fn master_chain_code<'a, I>(records: I) -> Option<[u8; 32]>
where
    I: IntoIterator<Item = (&'a [u8], &'a [u8])>,
{
    descriptor_strings(records)
        .iter()
        .flat_map(|d| extended_key_tokens(d))
        .filter_map(|token| ExtendedKey::parse(&token).ok())
        .find(|key| key.depth == 0)
        .map(|key| key.chain_code)
}

// The value payload leads with a one-byte length indicator before the
// descriptor text.
fn descriptor_text(value: &[u8]) -> Option<String> {
    let body = value.get(1..)?;
    let text: String = body
        .iter()
        .take_while(|&&b| b != 0)
        .map(|&b| b as char)
        .collect();
    if text.contains("pkh(") {
        Some(text)
    } else {
        None
    }
}

fn next_prefix(bytes: &[u8], from: usize) -> Option<usize> {
    if bytes.len() < 4 {
        return None;
    }
    (from..=bytes.len() - 4).find(|&i| {
        EXTENDED_KEY_PREFIXES
            .iter()
            .any(|prefix| &bytes[i..i + 4] == prefix.as_slice())
    })
}
