//! Per-employee escrow logic signatures.
//!
//! Each escrow approves exactly one kind of spend: a payment of a fixed
//! amount to a fixed receiver.  The generated TEAL is compiled by an external
//! tool to learn the escrow's address (the hash of the program bytes).
//!
//! # Files
//!
//! | File | Columns |
//! |------|---------|
//! | input CSV | `employee_address`, `fixed_payout_microalgos` |
//! | `<input>_compiled.csv` | input columns + `escrow_address` |
//! | `<out_dir>/escrow_<ADDR6>_<row>.teal` | one TEAL program per input row |

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::algod::AlgodApi;
use crate::crypto::Address;

/// TEAL version emitted for escrow programs.
pub const TEAL_VERSION: u32 = 6;

/// Container name of the algod node started by `algokit localnet start`.
pub const DEFAULT_CONTAINER: &str = "algokit_sandbox_algod";

/// Directory inside the container that compiled programs are copied to.
pub const DEFAULT_REMOTE_DIR: &str = "/root";

// ── Program template ──────────────────────────────────────────────────────────

/// TEAL that approves only `txn.Receiver == receiver && txn.Amount == payout`.
pub fn build_escrow(receiver: &Address, payout_microalgos: u64) -> String {
    format!(
        "#pragma version {TEAL_VERSION}\n\
         txn Receiver\n\
         addr {receiver}\n\
         ==\n\
         txn Amount\n\
         int {payout_microalgos}\n\
         ==\n\
         &&\n\
         return\n"
    )
}

// ── Compilers ─────────────────────────────────────────────────────────────────

/// Turns a TEAL program into the address of its logic-signature account.
pub trait EscrowCompiler {
    /// `teal_path` is the program already written to disk; `source` is its
    /// contents.
    fn compile(&self, teal_path: &Path, source: &str) -> Result<Address>;
}

/// Runs an external program and returns its stdout.
pub trait CommandRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<String>;
}

/// [`CommandRunner`] backed by [`std::process::Command`].
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<String> {
        debug!("exec {} {}", program, args.join(" "));
        let output = Command::new(program)
            .args(args)
            .output()
            .with_context(|| format!("Failed to run '{}'. Is it installed and on PATH?", program))?;

        if !output.status.success() {
            bail!(
                "'{} {}' exited with {}: {}",
                program,
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        String::from_utf8(output.stdout)
            .with_context(|| format!("'{}' wrote non-UTF-8 output", program))
    }
}

/// Compiles with `goal clerk compile` inside the localnet algod container.
pub struct GoalDockerCompiler<R = SystemRunner> {
    container: String,
    remote_dir: String,
    runner: R,
}

impl GoalDockerCompiler<SystemRunner> {
    pub fn new(container: &str) -> Self {
        Self::with_runner(container, SystemRunner)
    }
}

impl<R: CommandRunner> GoalDockerCompiler<R> {
    pub fn with_runner(container: &str, runner: R) -> Self {
        GoalDockerCompiler {
            container: container.to_owned(),
            remote_dir: DEFAULT_REMOTE_DIR.to_owned(),
            runner,
        }
    }
}

impl<R: CommandRunner> EscrowCompiler for GoalDockerCompiler<R> {
    fn compile(&self, teal_path: &Path, _source: &str) -> Result<Address> {
        let file_name = teal_path
            .file_name()
            .with_context(|| format!("'{}' has no file name", teal_path.display()))?
            .to_string_lossy();
        let remote = format!("{}/{}", self.remote_dir, file_name);

        self.runner
            .run(
                "docker",
                &[
                    "cp".to_owned(),
                    teal_path.display().to_string(),
                    format!("{}:{}", self.container, remote),
                ],
            )
            .with_context(|| format!("Failed to copy {} into {}", file_name, self.container))?;

        let stdout = self
            .runner
            .run(
                "docker",
                &[
                    "exec".to_owned(),
                    self.container.clone(),
                    "goal".to_owned(),
                    "clerk".to_owned(),
                    "compile".to_owned(),
                    remote,
                ],
            )
            .with_context(|| format!("goal clerk compile failed for {}", file_name))?;

        parse_goal_output(&stdout)
    }
}

/// Extract the address from `goal clerk compile` output (`<file>: <ADDRESS>`).
pub fn parse_goal_output(stdout: &str) -> Result<Address> {
    let line = stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .context("goal clerk compile produced no output")?;
    let (_, addr) = line
        .rsplit_once(": ")
        .with_context(|| format!("Unexpected goal output: '{}'", line))?;
    addr.trim()
        .parse()
        .with_context(|| format!("goal returned an invalid address: '{}'", addr))
}

/// Compiles through the node's `/v2/teal/compile` endpoint.  Requires
/// `EnableDeveloperAPI` on the node.
pub struct AlgodTealCompiler<'a, C: ?Sized> {
    client: &'a C,
}

impl<'a, C: AlgodApi + ?Sized> AlgodTealCompiler<'a, C> {
    pub fn new(client: &'a C) -> Self {
        AlgodTealCompiler { client }
    }
}

impl<C: AlgodApi + ?Sized> EscrowCompiler for AlgodTealCompiler<'_, C> {
    fn compile(&self, teal_path: &Path, source: &str) -> Result<Address> {
        let compiled = self
            .client
            .compile_teal(source)
            .with_context(|| format!("algod failed to compile {}", teal_path.display()))?;
        Ok(compiled.hash)
    }
}

// ── CSV pipeline ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct EscrowInput {
    employee_address: String,
    fixed_payout_microalgos: u64,
}

const OUTPUT_HEADERS: [&str; 3] = ["employee_address", "fixed_payout_microalgos", "escrow_address"];

#[derive(Debug, Serialize)]
struct EscrowOutput<'a> {
    employee_address: &'a str,
    fixed_payout_microalgos: u64,
    escrow_address: String,
}

/// One generated escrow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscrowRecord {
    pub employee: Address,
    pub payout_microalgos: u64,
    pub teal_path: PathBuf,
    pub escrow: Address,
}

/// `employees.csv` → `employees_compiled.csv`, in the same directory.
pub fn compiled_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "escrows".to_owned());
    input.with_file_name(format!("{}_compiled.csv", stem))
}

fn read_inputs(input: &Path) -> Result<Vec<EscrowInput>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(input)
        .with_context(|| format!("Cannot open '{}'", input.display()))?;
    reader
        .deserialize()
        .enumerate()
        .map(|(i, row)| {
            row.with_context(|| {
                format!("Malformed row at line {} of '{}'", i + 2, input.display())
            })
        })
        .collect()
}

/// Generate, save and compile one escrow per row of `input`, then write the
/// compiled CSV next to it.
///
/// # Errors
/// An unreadable input, an invalid address, or a failed compile aborts the
/// run before the output CSV is written.
pub fn generate_escrows<E: EscrowCompiler + ?Sized>(
    input: &Path,
    out_dir: &Path,
    compiler: &E,
) -> Result<Vec<EscrowRecord>> {
    let rows = read_inputs(input)?;
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Cannot create directory '{}'", out_dir.display()))?;

    let mut records = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let employee: Address = row
            .employee_address
            .parse()
            .with_context(|| format!("Row {}: bad employee address", i + 1))?;

        let teal = build_escrow(&employee, row.fixed_payout_microalgos);
        let teal_path = out_dir.join(format!("escrow_{}_{}.teal", employee.short(6), i));
        fs::write(&teal_path, &teal)
            .with_context(|| format!("Cannot write '{}'", teal_path.display()))?;

        let escrow = compiler.compile(&teal_path, &teal)?;
        info!(
            "Generated escrow for {}... → {} ({})",
            employee.short(10),
            teal_path.display(),
            escrow
        );

        records.push(EscrowRecord {
            employee,
            payout_microalgos: row.fixed_payout_microalgos,
            teal_path,
            escrow,
        });
    }

    let output = compiled_output_path(input);
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(&output)
        .with_context(|| format!("Cannot create '{}'", output.display()))?;
    writer.write_record(OUTPUT_HEADERS)?;
    for (row, record) in rows.iter().zip(&records) {
        writer.serialize(EscrowOutput {
            employee_address: &row.employee_address,
            fixed_payout_microalgos: row.fixed_payout_microalgos,
            escrow_address: record.escrow.to_string(),
        })?;
    }
    writer
        .flush()
        .with_context(|| format!("Cannot write '{}'", output.display()))?;

    info!("Wrote {} escrow(s) to {}", records.len(), output.display());
    Ok(records)
}
