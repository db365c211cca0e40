//! Algo Payroll CLI — pay hourly employees in ALGO and generate fixed-payout
//! escrow contracts.
//!
//! # Commands
//!
//! | Command | Purpose |
//! |---------|---------|
//! | `new-account` | Generate a key pair and print its address and mnemonic |
//! | `balance [address]` | ALGO (or `--asset`) balance; defaults to the employer |
//! | `pay <receiver> <algos>` | Send one payment and wait for confirmation |
//! | `pay-asset <receiver> <asset-id> <amount>` | Send one asset transfer |
//! | `run-payroll --roster <csv> --hours <h>` | Pay everyone on the roster |
//! | `generate-escrow <csv>` | Emit and compile one escrow per row |
//!
//! # Credentials
//!
//! The employer's 25-word mnemonic is read from `--mnemonic` or the
//! `EMPLOYER_MNEMONIC` environment variable (a `.env` file in the working
//! directory is loaded first).  Commands that only read public data never
//! need it.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;

use algo_payroll::algod::{AlgodClient, DEFAULT_WAIT_ROUNDS};
use algo_payroll::config::{Endpoint, Network, ENV_EMPLOYER_MNEMONIC};
use algo_payroll::crypto::{Account, Address};
use algo_payroll::escrow::{self, AlgodTealCompiler, GoalDockerCompiler, DEFAULT_CONTAINER};
use algo_payroll::payroll::{self, PayrollManager};
use algo_payroll::{report, roster};

// ── Warning banner ────────────────────────────────────────────────────────────

const MNEMONIC_WARNING: &str = "\
+------------------------------------------------------------------+
|                *** KEEP THIS MNEMONIC SECRET ***                 |
|                                                                  |
|  Anyone holding these 25 words controls every asset in the       |
|  account.  There is NO recovery if they are lost or leaked.      |
|                                                                  |
|  Write them down offline.  Never commit them or a .env file      |
|  that contains them to version control.                          |
+------------------------------------------------------------------+";

// ── CLI definition ────────────────────────────────────────────────────────────

/// Algo Payroll — hourly payroll and escrow generation on Algorand.
#[derive(Parser)]
#[command(name = "algo-payroll")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Network to use: localnet, testnet or mainnet.
    #[arg(long, global = true, default_value = "testnet")]
    network: String,

    /// algod URL, overriding the network's default endpoint.
    #[arg(long, global = true, env = "ALGOD_URL")]
    algod_url: Option<String>,

    /// algod API token, overriding the network's default token.
    #[arg(long, global = true, env = "ALGOD_TOKEN", hide_env_values = true)]
    algod_token: Option<String>,

    /// Employer 25-word mnemonic.
    #[arg(long, global = true, env = "EMPLOYER_MNEMONIC", hide_env_values = true)]
    mnemonic: Option<String>,

    /// Rounds to wait for each confirmation.
    #[arg(
        long,
        global = true,
        default_value_t = DEFAULT_WAIT_ROUNDS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    wait_rounds: u64,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new account and print its address and mnemonic.
    NewAccount,

    /// Show an account balance.
    Balance {
        /// Account to query; defaults to the employer.
        address: Option<String>,

        /// Report the holding of this asset instead of ALGO.
        #[arg(long)]
        asset: Option<u64>,
    },

    /// Send a single ALGO payment and wait for confirmation.
    Pay {
        /// Receiving account address.
        receiver: String,

        /// Amount in whole ALGO (e.g. 2.5).
        amount: f64,

        /// Note attached to the transaction.
        #[arg(long)]
        note: Option<String>,
    },

    /// Send a single asset transfer and wait for confirmation.
    PayAsset {
        /// Receiving account address (must have opted in to the asset).
        receiver: String,

        /// Asset id.
        asset_id: u64,

        /// Amount in the asset's base units.
        amount: u64,

        /// Note attached to the transaction.
        #[arg(long)]
        note: Option<String>,
    },

    /// Pay every employee on a roster for the given hours.
    ///
    /// The roster is a CSV with columns address,hourly_rate[,name].  Payments
    /// are sent one at a time; the first failure stops the run.
    RunPayroll {
        /// Roster CSV file.
        #[arg(long)]
        roster: PathBuf,

        /// Hours worked by every employee this period.
        #[arg(long)]
        hours: f64,

        /// Note attached to every payment.
        #[arg(long)]
        note: Option<String>,

        /// Print the amounts without sending anything.
        #[arg(long)]
        dry_run: bool,

        /// Send all payments as one atomic group (at most 16 employees).
        #[arg(long, conflicts_with = "dry_run")]
        atomic: bool,
    },

    /// Generate and compile one fixed-payout escrow per CSV row.
    ///
    /// Input columns: employee_address,fixed_payout_microalgos.  Writes
    /// <input>_compiled.csv with an escrow_address column.
    GenerateEscrow {
        /// Input CSV file.
        input: PathBuf,

        /// Directory for the generated .teal programs.
        #[arg(long, default_value = "contracts")]
        out_dir: PathBuf,

        /// How to compile the TEAL programs.
        #[arg(long, value_enum, default_value_t = CompilerKind::Docker)]
        compiler: CompilerKind,

        /// Container running algod, for the docker compiler.
        #[arg(long, default_value = DEFAULT_CONTAINER)]
        container: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum CompilerKind {
    /// `goal clerk compile` inside the localnet container.
    Docker,
    /// The node's /v2/teal/compile endpoint.
    Algod,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    // A missing .env file is normal.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let network: Network = cli.network.parse()?;
    let endpoint = Endpoint::resolve(network, cli.algod_url.as_deref(), cli.algod_token.as_deref());

    match cli.command {
        Commands::NewAccount => cmd_new_account(),
        Commands::Balance { address, asset } => {
            cmd_balance(&endpoint, cli.mnemonic.as_deref(), address.as_deref(), asset)
        }
        Commands::Pay {
            receiver,
            amount,
            note,
        } => {
            let manager = connect(&endpoint, cli.mnemonic.as_deref(), cli.wait_rounds)?;
            cmd_pay(&manager, &receiver, amount, note.as_deref())
        }
        Commands::PayAsset {
            receiver,
            asset_id,
            amount,
            note,
        } => {
            let manager = connect(&endpoint, cli.mnemonic.as_deref(), cli.wait_rounds)?;
            cmd_pay_asset(&manager, &receiver, asset_id, amount, note.as_deref())
        }
        Commands::RunPayroll {
            roster,
            hours,
            note,
            dry_run,
            atomic,
        } => {
            if dry_run {
                cmd_preview_payroll(&roster, hours)
            } else {
                let mut manager = connect(&endpoint, cli.mnemonic.as_deref(), cli.wait_rounds)?;
                cmd_run_payroll(&mut manager, &roster, hours, note.as_deref(), atomic)
            }
        }
        Commands::GenerateEscrow {
            input,
            out_dir,
            compiler,
            container,
        } => cmd_generate_escrow(&endpoint, &input, &out_dir, compiler, &container),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

fn connect(
    endpoint: &Endpoint,
    mnemonic: Option<&str>,
    wait_rounds: u64,
) -> Result<PayrollManager<AlgodClient>> {
    let mnemonic = require_mnemonic(mnemonic)?;
    Ok(PayrollManager::connect(mnemonic, endpoint)?.with_wait_rounds(wait_rounds))
}

// ── Command implementations ───────────────────────────────────────────────────

/// `new-account` — generate a key pair offline.
fn cmd_new_account() -> Result<()> {
    let account = Account::generate();

    println!("Address  : {}", account.address());
    println!("Mnemonic : {}", account.mnemonic());
    println!();
    println!("{}", MNEMONIC_WARNING);
    Ok(())
}

/// `balance [address] [--asset id]`.
fn cmd_balance(
    endpoint: &Endpoint,
    mnemonic: Option<&str>,
    address: Option<&str>,
    asset: Option<u64>,
) -> Result<()> {
    // Resolve the address before touching the network so typos fail fast.
    let address: Address = match address {
        Some(a) => a.parse()?,
        None => Account::from_mnemonic(require_mnemonic(mnemonic)?)
            .context("Failed to recover employer account from mnemonic")?
            .address(),
    };

    let client = AlgodClient::new(&endpoint.url, &endpoint.token)?;
    match asset {
        Some(asset_id) => {
            let balance = payroll::asset_balance(&client, asset_id, &address)?;
            println!("{}: {} (asset {})", address, balance, asset_id);
        }
        None => {
            let balance = payroll::algo_balance(&client, &address)?;
            println!("{}: {:.6} ALGO", address, balance);
        }
    }
    Ok(())
}

/// `pay <receiver> <amount>`.
fn cmd_pay(
    manager: &PayrollManager<AlgodClient>,
    receiver: &str,
    amount: f64,
    note: Option<&str>,
) -> Result<()> {
    let receiver: Address = receiver.parse()?;
    let txid = manager.send_payment(&receiver, amount, note)?;
    println!("Transaction confirmed: {}", txid);
    Ok(())
}

/// `pay-asset <receiver> <asset-id> <amount>`.
fn cmd_pay_asset(
    manager: &PayrollManager<AlgodClient>,
    receiver: &str,
    asset_id: u64,
    amount: u64,
    note: Option<&str>,
) -> Result<()> {
    let receiver: Address = receiver.parse()?;
    let txid = manager.send_asset_payment(&receiver, asset_id, amount, note)?;
    println!("Transaction confirmed: {}", txid);
    Ok(())
}

/// `run-payroll --dry-run` — compute amounts from the roster only.
fn cmd_preview_payroll(roster_path: &Path, hours: f64) -> Result<()> {
    let employees = roster::read_employees(roster_path)?;
    let lines = payroll::compute_payroll(&employees, hours)?;

    println!("{}", report::payroll_table(&lines));
    print_total(&lines)?;
    println!("Dry run: no transactions were sent.");
    Ok(())
}

/// `run-payroll` — pay every roster entry.
fn cmd_run_payroll(
    manager: &mut PayrollManager<AlgodClient>,
    roster_path: &Path,
    hours: f64,
    note: Option<&str>,
    atomic: bool,
) -> Result<()> {
    let count = roster::load_into(manager, roster_path)?;
    if count == 0 {
        bail!("Roster '{}' has no employees", roster_path.display());
    }

    let before = manager.get_balance(None)?;
    info!("Employer balance before payroll: {:.6} ALGO", before);

    let lines = if atomic {
        manager.run_payroll_atomic(hours, note)?
    } else {
        manager.run_payroll(hours, note)?
    };

    println!("{}", report::payroll_table(&lines));
    print_total(&lines)?;

    let after = manager.get_balance(None)?;
    println!("Employer balance: {:.6} → {:.6} ALGO", before, after);
    Ok(())
}

/// `generate-escrow <csv>`.
fn cmd_generate_escrow(
    endpoint: &Endpoint,
    input: &Path,
    out_dir: &Path,
    compiler: CompilerKind,
    container: &str,
) -> Result<()> {
    let records = match compiler {
        CompilerKind::Docker => {
            escrow::generate_escrows(input, out_dir, &GoalDockerCompiler::new(container))?
        }
        CompilerKind::Algod => {
            let client = AlgodClient::new(&endpoint.url, &endpoint.token)?;
            escrow::generate_escrows(input, out_dir, &AlgodTealCompiler::new(&client))?
        }
    };

    println!("{}", report::escrow_table(&records));
    println!(
        "Compiled {} escrow(s) → {}",
        records.len(),
        escrow::compiled_output_path(input).display()
    );
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn require_mnemonic(mnemonic: Option<&str>) -> Result<&str> {
    match mnemonic {
        Some(m) if !m.trim().is_empty() => Ok(m),
        _ => bail!(
            "No employer mnemonic provided.\n\
             Pass --mnemonic or set {} (a .env file is also read).",
            ENV_EMPLOYER_MNEMONIC
        ),
    }
}

fn print_total(lines: &[payroll::PayrollLine]) -> Result<()> {
    let total = report::total_amount(lines).context("Payroll total overflows")?;
    println!("{} payment(s), total {}", lines.len(), total);
    Ok(())
}
