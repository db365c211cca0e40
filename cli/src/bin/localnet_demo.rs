//! End-to-end payroll against a local Algorand network.
//!
//! Reads `LOCALNET_MNEMONIC`, `EMPLOYEE_1` and `EMPLOYEE_2` from the
//! environment (or `.env`), pays both employees for five hours and prints
//! balances before and after.

use anyhow::Result;

use algo_payroll::config::{
    require_env, Network, ENV_EMPLOYEE_1, ENV_EMPLOYEE_2, ENV_LOCALNET_MNEMONIC,
};
use algo_payroll::crypto::Address;
use algo_payroll::payroll::PayrollManager;
use algo_payroll::{algod::AlgodClient, report};

const HOURS: f64 = 5.0;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mnemonic = require_env(ENV_LOCALNET_MNEMONIC)?;
    let employee1: Address = require_env(ENV_EMPLOYEE_1)?.parse()?;
    let employee2: Address = require_env(ENV_EMPLOYEE_2)?.parse()?;

    let mut payroll = PayrollManager::connect(&mnemonic, &Network::Localnet.endpoint())?;

    print_balances(&payroll, "before", &employee1, &employee2)?;

    payroll.add_employee(&employee1.to_string(), 100.0, Some("Employee 1"))?;
    payroll.add_employee(&employee2.to_string(), 50.0, Some("Employee 2"))?;
    let lines = payroll.run_payroll(HOURS, Some("Weekly payroll"))?;

    println!("{}", report::payroll_table(&lines));
    let txids: Vec<&str> = lines.iter().filter_map(|l| l.txid.as_deref()).collect();
    println!("Transaction IDs: {:?}", txids);

    print_balances(&payroll, "after", &employee1, &employee2)?;
    Ok(())
}

fn print_balances(
    payroll: &PayrollManager<AlgodClient>,
    when: &str,
    employee1: &Address,
    employee2: &Address,
) -> Result<()> {
    println!("Employer balance {}: {:.6} ALGO", when, payroll.get_balance(None)?);
    println!(
        "Employee 1 balance {}: {:.6} ALGO",
        when,
        payroll.get_balance(Some(employee1))?
    );
    println!(
        "Employee 2 balance {}: {:.6} ALGO",
        when,
        payroll.get_balance(Some(employee2))?
    );
    Ok(())
}
