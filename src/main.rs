use std::env;
use std::fs;
use std::process::ExitCode;

use recover::bip32::{DerivationPath, DerivationStep, KeyMaterial};
use recover::verify::derive_address;

const DEFAULT_WALLET_PATH: &str = "wallet.dat";
const ADDRESS_HRP: &str = "alpha";
const RECEIVE_BRANCH: &str = "m/84'/1'/0'/0";
const ADDRESS_COUNT: u32 = 5;

fn main() -> ExitCode {
    let path = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_WALLET_PATH.to_string());

    let blob = match fs::read(&path) {
        Ok(blob) => blob,
        Err(e) => {
            eprintln!("failed to read {path}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = recover::scan(&blob);
    match result.master_key {
        Some(key) => println!("master private key: {}", hex::encode(key)),
        None => println!("master private key: not found"),
    }
    match result.chain_code {
        Some(cc) => println!("master chain code:  {}", hex::encode(cc)),
        None => println!("master chain code:  not found"),
    }

    let (Some(master_key), Some(chain_code)) = (result.master_key, result.chain_code) else {
        eprintln!("extraction incomplete, cannot derive addresses");
        return ExitCode::FAILURE;
    };

    let branch = match DerivationPath::parse(RECEIVE_BRANCH) {
        Ok(branch) => branch,
        Err(e) => {
            eprintln!("bad receive branch {RECEIVE_BRANCH}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let root = KeyMaterial::Private(master_key);
    println!("\nfirst {ADDRESS_COUNT} receive addresses ({RECEIVE_BRANCH}/*):");
    for i in 0..ADDRESS_COUNT {
        let mut steps = branch.steps().to_vec();
        steps.push(DerivationStep::normal(i));
        match derive_address(&root, &chain_code, &steps, ADDRESS_HRP) {
            Ok(address) => println!("  {RECEIVE_BRANCH}/{i}: {address}"),
            Err(e) => {
                eprintln!("derivation failed at index {i}: {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}
