use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use commonware_runtime::{tokio, Metrics, Runner, ThreadPool};
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::{error, info, Level};
use turnstile_execution::{collected_fees, gas::silence_out_of_gas_panics};
use turnstile_node::{
    application::{self, Application},
    Config, Genesis, Transactions, ValidatedConfig,
};
use turnstile_types::{execution::Transaction, Account};

fn load_yaml<T: DeserializeOwned>(path: &str, what: &str) -> Result<T> {
    let contents = std::fs::read_to_string(Path::new(path))
        .with_context(|| format!("Could not read {what} file {path}"))?;
    serde_yaml::from_str(&contents).with_context(|| format!("Could not parse {what} file {path}"))
}

fn init_logging(level: Level, json: bool) {
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_max_level(level)
            .init();
    } else {
        tracing_subscriber::fmt().with_max_level(level).init();
    }
}

fn print_dry_run_report(
    config: &ValidatedConfig,
    accounts: &[Account],
    transactions: &[Transaction],
) {
    println!("dry-run report");
    println!("  chain_id: {}", config.chain_id);
    println!(
        "  ante: ed25519_verify_cost={} secp256k1_verify_cost={} gas_base_permille={} gas_shift={} max_memo_characters={}",
        config.ante.gas.ed25519_verify_cost,
        config.ante.gas.secp256k1_verify_cost,
        config.ante.gas.base_permille,
        config.ante.gas.shift,
        config.ante.max_memo_characters
    );
    println!("  minimum_fees: [{}]", config.minimum_fees);
    println!(
        "  mempool: max_backlog={} max_transactions={}",
        config.mempool_max_backlog, config.mempool_max_transactions
    );
    println!(
        "  blocks: block_size={} check_concurrency={}",
        config.block_size, config.check_concurrency
    );
    println!("  genesis accounts: {}", accounts.len());
    println!("  transactions: {}", transactions.len());
}

fn main() {
    if let Err(err) = main_result() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

fn main_result() -> Result<()> {
    // Parse arguments
    let matches = Command::new("turnstile-node")
        .about("Admit transactions and commit them in blocks.")
        .arg(Arg::new("config").long("config").required(true))
        .arg(Arg::new("genesis").long("genesis").required(true))
        .arg(Arg::new("transactions").long("transactions").required(false))
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("Validate config/genesis/transactions and exit without executing")
                .action(ArgAction::SetTrue),
        )
        .get_matches();
    let dry_run = matches.get_flag("dry-run");

    // Load config
    let config_file = matches
        .get_one::<String>("config")
        .context("missing --config")?;
    let config: Config = load_yaml(config_file, "config")?;
    let config = config.validate().context("Invalid config")?;

    // Load genesis
    let genesis_file = matches
        .get_one::<String>("genesis")
        .context("missing --genesis")?;
    let genesis: Genesis = load_yaml(genesis_file, "genesis")?;
    let accounts = genesis.accounts().context("Invalid genesis")?;

    // Load transactions
    let transactions = match matches.get_one::<String>("transactions") {
        Some(file) => load_yaml::<Transactions>(file, "transactions")?
            .decode()
            .context("Invalid transactions")?,
        None => Vec::new(),
    };

    if dry_run {
        print_dry_run_report(&config, &accounts, &transactions);
        println!("config ok");
        return Ok(());
    }

    init_logging(config.log_level, config.log_json);
    silence_out_of_gas_panics();
    info!(config = ?config, "loaded config");

    // Initialize runtime
    let cfg = tokio::Config::default().with_worker_threads(config.worker_threads);
    let executor = tokio::Runner::new(cfg);

    // Start runtime
    executor.start(|context| async move {
        let context = context.with_label("turnstile");
        let result: Result<()> = async {
            let pool = ThreadPool::new(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(config.check_concurrency.get())
                    .build()
                    .context("failed to create admission pool")?,
            );
            let app_config = application::Config::from_validated(&config)?;
            let mut app =
                Application::init(context.with_label("application"), app_config, accounts)
                    .await?;

            let outcomes = app.admit(pool, transactions)?;
            let admitted = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
            info!(
                admitted,
                rejected = outcomes.len() - admitted,
                queued = app.mempool().len(),
                "admitted transactions"
            );

            while let Some(result) = app.produce_block().await? {
                info!(
                    height = result.height,
                    transactions = result.outcomes.len(),
                    accepted = result.accepted(),
                    "produced block"
                );
            }

            let fees = collected_fees(app.state()).await?;
            info!(
                height = app.height().saturating_sub(1),
                collected_fees = %fees,
                "mempool drained"
            );
            println!("{}", context.encode());
            Ok(())
        }
        .await;

        if let Err(e) = &result {
            error!(?e, "node failed");
        }
        result
    })
}
