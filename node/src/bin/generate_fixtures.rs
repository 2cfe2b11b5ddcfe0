//! Fixture generation for a local node run
//!
//! Usage: cargo run --bin generate-fixtures -- --accounts 4 --output configs/local
//!
//! This generates:
//! - config.yaml with default admission and gas settings
//! - genesis.yaml with funded accounts (alternating Ed25519 and Secp256k1 keys)
//! - transactions.yaml with signed transfers between those accounts

use anyhow::{Context, Result};
use clap::Parser;
use std::{fs, path::PathBuf};
use turnstile_node::{
    defaults::{
        DEFAULT_BLOCK_SIZE, DEFAULT_CHECK_CONCURRENCY, DEFAULT_ED25519_VERIFY_COST,
        DEFAULT_GAS_BASE_PERMILLE, DEFAULT_GAS_SHIFT, DEFAULT_LOG_LEVEL,
        DEFAULT_MAX_MEMO_CHARACTERS, DEFAULT_MEMPOOL_MAX_BACKLOG,
        DEFAULT_MEMPOOL_MAX_TRANSACTIONS, DEFAULT_SECP256K1_VERIFY_COST, DEFAULT_WORKER_THREADS,
    },
    Config, Genesis, GenesisAccount, Transactions,
};
use turnstile_types::{
    execution::{Fee, Msg, StdTx, Transaction},
    Coins, PrivateKey,
};

#[derive(Parser, Debug)]
#[command(name = "generate-fixtures")]
#[command(about = "Generate config, genesis and signed transactions for a local run")]
struct Args {
    /// Number of genesis accounts
    #[arg(short, long, default_value_t = 4)]
    accounts: u64,

    /// Transfers signed by each account (sequences 0..N)
    #[arg(short, long, default_value_t = 3)]
    transfers: u64,

    /// Output directory for the generated files
    #[arg(short, long, default_value = "configs/local")]
    output: PathBuf,

    /// Seed for key derivation (use different seeds for different runs)
    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    #[arg(long, default_value = "turnstile-local")]
    chain_id: String,

    /// Denomination used for balances and fees
    #[arg(long, default_value = "uiris")]
    denom: String,

    /// Balance of every genesis account
    #[arg(long, default_value_t = 1_000_000)]
    balance: u128,

    /// Fee paid by every transfer
    #[arg(long, default_value_t = 10)]
    fee: u128,

    /// Gas declared by every transfer
    #[arg(long, default_value_t = 50_000)]
    gas: u64,

    /// Also emit a replayed and an out-of-gas transaction
    #[arg(long)]
    include_invalid: bool,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("generate-fixtures failed: {err:#}");
        std::process::exit(1);
    }
}

fn key(seed: u64, index: u64) -> PrivateKey {
    let seed = seed.wrapping_add(index);
    if index % 2 == 0 {
        PrivateKey::ed25519_from_seed(seed)
    } else {
        PrivateKey::secp256k1_from_seed(seed)
    }
}

fn write_yaml<T: serde::Serialize>(path: PathBuf, value: &T) -> Result<()> {
    let contents = serde_yaml::to_string(value).context("Failed to serialize")?;
    fs::write(&path, contents).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("  wrote {}", path.display());
    Ok(())
}

fn run() -> Result<()> {
    let args = Args::parse();
    anyhow::ensure!(args.accounts > 0, "--accounts must be > 0");

    println!(
        "Generating {} accounts with {} transfers each",
        args.accounts, args.transfers
    );
    fs::create_dir_all(&args.output).with_context(|| {
        format!(
            "Failed to create output directory {}",
            args.output.display()
        )
    })?;

    let keys: Vec<_> = (0..args.accounts).map(|i| key(args.seed, i)).collect();
    let genesis = Genesis {
        accounts: keys
            .iter()
            .map(|key| GenesisAccount {
                address: key.public_key().address().to_string(),
                coins: Coins::single(args.denom.clone(), args.balance).to_string(),
                sequence: 0,
            })
            .collect(),
    };

    // Account numbers follow genesis order.
    let mut transactions = Vec::new();
    for (account_number, key) in keys.iter().enumerate() {
        let recipient = keys[(account_number + 1) % keys.len()].public_key().address();
        for sequence in 0..args.transfers {
            let msgs = vec![Msg::Send {
                from: key.public_key().address(),
                to: recipient,
                amount: Coins::single(args.denom.clone(), 1),
            }];
            let fee = Fee::new(args.gas, Coins::single(args.denom.clone(), args.fee));
            transactions.push(Transaction::Std(StdTx::sign(
                &args.chain_id,
                msgs,
                fee,
                format!("transfer {sequence}"),
                &[(key, account_number as u64, sequence)],
            )));
        }
    }
    if args.include_invalid {
        if let Some(first) = transactions.first().cloned() {
            transactions.push(first);
        }
        let key = &keys[0];
        let msgs = vec![Msg::Send {
            from: key.public_key().address(),
            to: key.public_key().address(),
            amount: Coins::single(args.denom.clone(), 1),
        }];
        // Below a single Ed25519 verification.
        let fee = Fee::new(1, Coins::single(args.denom.clone(), args.fee));
        transactions.push(Transaction::Std(StdTx::sign(
            &args.chain_id,
            msgs,
            fee,
            "",
            &[(key, 0, args.transfers)],
        )));
    }

    let config = Config {
        chain_id: args.chain_id.clone(),
        log_level: DEFAULT_LOG_LEVEL.to_string(),
        log_json: false,
        worker_threads: DEFAULT_WORKER_THREADS,
        check_concurrency: DEFAULT_CHECK_CONCURRENCY,
        minimum_fees: Coins::single(args.denom.clone(), args.fee).to_string(),
        max_memo_characters: DEFAULT_MAX_MEMO_CHARACTERS,
        ed25519_verify_cost: DEFAULT_ED25519_VERIFY_COST,
        secp256k1_verify_cost: DEFAULT_SECP256K1_VERIFY_COST,
        gas_base_permille: DEFAULT_GAS_BASE_PERMILLE,
        gas_shift: DEFAULT_GAS_SHIFT,
        block_size: DEFAULT_BLOCK_SIZE,
        mempool_max_backlog: DEFAULT_MEMPOOL_MAX_BACKLOG,
        mempool_max_transactions: DEFAULT_MEMPOOL_MAX_TRANSACTIONS,
    };

    write_yaml(args.output.join("config.yaml"), &config)?;
    write_yaml(args.output.join("genesis.yaml"), &genesis)?;
    write_yaml(
        args.output.join("transactions.yaml"),
        &Transactions::encode(&transactions),
    )?;

    println!();
    println!("Run with:");
    println!(
        "  cargo run --bin turnstile-node -- --config {0}/config.yaml --genesis {0}/genesis.yaml --transactions {0}/transactions.yaml",
        args.output.display()
    );
    Ok(())
}
