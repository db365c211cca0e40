//! Employer-side payroll: an employee rate table plus payment dispatch.
//!
//! Payments are strictly serial.  [`PayrollManager::run_payroll`] waits for
//! each payment to confirm before sending the next and stops at the first
//! failure; payments already confirmed stay confirmed and nothing is retried.

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use log::{info, warn};

use crate::algod::{wait_for_confirmation, AlgodApi, AlgodClient, DEFAULT_WAIT_ROUNDS};
use crate::amount::{scale_asset_amount, MicroAlgos};
use crate::config::Endpoint;
use crate::crypto::{Account, Address};
use crate::transaction::{
    broadcast_group, broadcast_transaction, build_asset_transfer_txn, group_with_fees,
    sign_transaction, Transaction, MAX_GROUP_SIZE,
};

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Employee {
    pub address: Address,
    /// Whole ALGO per hour.
    pub hourly_rate: f64,
    pub name: Option<String>,
}

impl Employee {
    /// Validate the address and rate of a new employee record.
    pub fn new(address: &str, hourly_rate: f64, name: Option<&str>) -> Result<Self> {
        let address: Address = address.parse()?;
        if !hourly_rate.is_finite() || hourly_rate < 0.0 {
            bail!(
                "Hourly rate for {} must be a non-negative number, got {}",
                address,
                hourly_rate
            );
        }
        Ok(Employee {
            address,
            hourly_rate,
            name: name.map(str::to_owned),
        })
    }

    /// Name if known, otherwise the first ten characters of the address.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{}…", self.address.short(10)),
        }
    }

    pub fn pay_for(&self, hours: f64) -> Result<MicroAlgos> {
        MicroAlgos::from_algos(self.hourly_rate * hours)
            .with_context(|| format!("Cannot compute pay for {}", self.address))
    }
}

/// One employee's share of a payroll run.
#[derive(Debug, Clone, PartialEq)]
pub struct PayrollLine {
    pub employee: Employee,
    pub hours: f64,
    pub amount: MicroAlgos,
    /// `None` for previews.
    pub txid: Option<String>,
}

// ── Queries ───────────────────────────────────────────────────────────────────

/// ALGO balance of `address` (microAlgos / 1e6).
pub fn algo_balance<C: AlgodApi + ?Sized>(client: &C, address: &Address) -> Result<f64> {
    let info = client
        .account_info(address)
        .with_context(|| format!("Failed to fetch account {}", address))?;
    Ok(MicroAlgos(info.amount).to_algos())
}

/// Holding of `asset_id` scaled by the asset's decimals.  Accounts that have
/// not opted in report zero.
pub fn asset_balance<C: AlgodApi + ?Sized>(
    client: &C,
    asset_id: u64,
    address: &Address,
) -> Result<f64> {
    let info = client
        .account_info(address)
        .with_context(|| format!("Failed to fetch account {}", address))?;
    let Some(units) = info.asset_amount(asset_id) else {
        return Ok(0.0);
    };
    let asset = client
        .asset_info(asset_id)
        .with_context(|| format!("Failed to fetch asset {}", asset_id))?;
    Ok(scale_asset_amount(units, asset.params.decimals))
}

/// Per-employee amounts for `hours` worked.
pub fn compute_payroll<'a, I>(employees: I, hours: f64) -> Result<Vec<PayrollLine>>
where
    I: IntoIterator<Item = &'a Employee>,
{
    if !hours.is_finite() || hours < 0.0 {
        bail!("Hours must be a non-negative number, got {}", hours);
    }
    employees
        .into_iter()
        .map(|e| {
            Ok(PayrollLine {
                employee: e.clone(),
                hours,
                amount: e.pay_for(hours)?,
                txid: None,
            })
        })
        .collect()
}

// ── Manager ───────────────────────────────────────────────────────────────────

pub struct PayrollManager<C> {
    client: C,
    employer: Account,
    employees: BTreeMap<Address, Employee>,
    wait_rounds: u64,
}

impl PayrollManager<AlgodClient> {
    /// Recover the employer account and connect to `endpoint`.
    pub fn connect(employer_mnemonic: &str, endpoint: &Endpoint) -> Result<Self> {
        let employer = Account::from_mnemonic(employer_mnemonic)
            .context("Failed to recover employer account from mnemonic")?;
        let client = AlgodClient::new(&endpoint.url, &endpoint.token)?;

        info!("Connected to {} as {}", endpoint.network, employer.address());
        Ok(Self::with_client(client, employer))
    }
}

impl<C: AlgodApi> PayrollManager<C> {
    pub fn with_client(client: C, employer: Account) -> Self {
        PayrollManager {
            client,
            employer,
            employees: BTreeMap::new(),
            wait_rounds: DEFAULT_WAIT_ROUNDS,
        }
    }

    /// Rounds to wait for each confirmation before giving up.
    pub fn with_wait_rounds(mut self, rounds: u64) -> Self {
        self.wait_rounds = rounds;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn employer_address(&self) -> Address {
        self.employer.address()
    }

    // ── Balances ──────────────────────────────────────────────────────────────

    /// ALGO balance of `address`, or of the employer when `None`.
    pub fn get_balance(&self, address: Option<&Address>) -> Result<f64> {
        let address = address.copied().unwrap_or_else(|| self.employer.address());
        algo_balance(&self.client, &address)
    }

    /// Asset holding of `address`, or of the employer when `None`.
    pub fn get_asset_balance(&self, asset_id: u64, address: Option<&Address>) -> Result<f64> {
        let address = address.copied().unwrap_or_else(|| self.employer.address());
        asset_balance(&self.client, asset_id, &address)
    }

    // ── Employee table ────────────────────────────────────────────────────────

    /// Add an employee, replacing any existing entry for the same address.
    pub fn add_employee(&mut self, address: &str, hourly_rate: f64, name: Option<&str>) -> Result<()> {
        self.insert_employee(Employee::new(address, hourly_rate, name)?);
        Ok(())
    }

    pub fn insert_employee(&mut self, employee: Employee) {
        let address = employee.address;
        if self.employees.insert(address, employee).is_some() {
            warn!("Replaced existing entry for {}", address);
        }
    }

    pub fn remove_employee(&mut self, address: &str) -> Result<Employee> {
        let address: Address = address.parse()?;
        self.employees
            .remove(&address)
            .with_context(|| format!("Employee {} is not on the payroll", address))
    }

    pub fn employee(&self, address: &Address) -> Option<&Employee> {
        self.employees.get(address)
    }

    pub fn employee_count(&self) -> usize {
        self.employees.len()
    }

    // ── Payments ──────────────────────────────────────────────────────────────

    /// Pay `amount_algos` to `receiver` and wait for confirmation.
    pub fn send_payment(
        &self,
        receiver: &Address,
        amount_algos: f64,
        note: Option<&str>,
    ) -> Result<String> {
        self.pay_micro(receiver, MicroAlgos::from_algos(amount_algos)?, note)
    }

    /// Pay exactly `amount` to `receiver` and wait for confirmation.
    pub fn pay_micro(
        &self,
        receiver: &Address,
        amount: MicroAlgos,
        note: Option<&str>,
    ) -> Result<String> {
        let params = self
            .client
            .suggested_params()
            .context("Failed to fetch suggested params")?;
        let txn = Transaction::payment(&params, self.employer.address(), *receiver, amount, note)?;
        let txid = self.submit_and_confirm(txn)?;

        info!("Paid {} to {} (txid {})", amount, receiver, txid);
        Ok(txid)
    }

    /// Transfer `amount` base units of `asset_id` and wait for confirmation.
    pub fn send_asset_payment(
        &self,
        receiver: &Address,
        asset_id: u64,
        amount: u64,
        note: Option<&str>,
    ) -> Result<String> {
        let txn = build_asset_transfer_txn(
            &self.client,
            self.employer.address(),
            *receiver,
            asset_id,
            amount,
            note,
        )?;
        let txid = self.submit_and_confirm(txn)?;

        info!(
            "Transferred {} units of asset {} to {} (txid {})",
            amount, asset_id, receiver, txid
        );
        Ok(txid)
    }

    fn submit_and_confirm(&self, txn: Transaction) -> Result<String> {
        let signed = sign_transaction(txn, &self.employer)?;
        let txid = broadcast_transaction(&self.client, &signed)?;
        let pending = wait_for_confirmation(&self.client, &txid, self.wait_rounds)?;
        if let Some(round) = pending.confirmed_round {
            info!("{} confirmed in round {}", txid, round);
        }
        Ok(txid)
    }

    /// Per-employee amounts for `hours` worked, without touching the network.
    pub fn preview_payroll(&self, hours: f64) -> Result<Vec<PayrollLine>> {
        compute_payroll(self.employees.values(), hours)
    }

    /// Pay every employee for `hours`, one confirmed payment at a time.
    ///
    /// # Errors
    /// The first failed payment aborts the run; earlier payments are not
    /// rolled back.
    pub fn run_payroll(&self, hours: f64, note: Option<&str>) -> Result<Vec<PayrollLine>> {
        let mut lines = self.preview_payroll(hours)?;
        if lines.is_empty() {
            warn!("Payroll is empty, nothing to send");
            return Ok(lines);
        }

        info!("Running payroll for {} employee(s), {} hours", lines.len(), hours);
        for (i, line) in lines.iter_mut().enumerate() {
            let txid = self
                .pay_micro(&line.employee.address, line.amount, note)
                .with_context(|| {
                    format!(
                        "Payroll aborted at {} ({} of {} paid)",
                        line.employee.label(),
                        i,
                        self.employees.len()
                    )
                })?;
            line.txid = Some(txid);
        }
        Ok(lines)
    }

    /// Pay every employee in a single atomic group: either all payments
    /// commit or none do.
    pub fn run_payroll_atomic(&self, hours: f64, note: Option<&str>) -> Result<Vec<PayrollLine>> {
        let mut lines = self.preview_payroll(hours)?;
        if lines.is_empty() {
            warn!("Payroll is empty, nothing to send");
            return Ok(lines);
        }
        if lines.len() > MAX_GROUP_SIZE {
            bail!(
                "Atomic payroll supports at most {} employees, roster has {}",
                MAX_GROUP_SIZE,
                lines.len()
            );
        }

        let params = self
            .client
            .suggested_params()
            .context("Failed to fetch suggested params")?;
        let txns = lines
            .iter()
            .map(|l| {
                Transaction::payment(
                    &params,
                    self.employer.address(),
                    l.employee.address,
                    l.amount,
                    note,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        let signed = group_with_fees(txns, &params)?
            .into_iter()
            .map(|t| sign_transaction(t, &self.employer))
            .collect::<Result<Vec<_>>>()?;

        let first = broadcast_group(&self.client, &signed)?;
        wait_for_confirmation(&self.client, &first, self.wait_rounds)?;

        for (line, stx) in lines.iter_mut().zip(&signed) {
            line.txid = Some(stx.id()?);
        }
        info!("Atomic payroll of {} payments confirmed", lines.len());
        Ok(lines)
    }
}
