//! Employee roster CSV.
//!
//! ```text
//! address,hourly_rate,name
//! 66MDNQQLL2A3LXHSEZWJ7PZGIWRP3NBNBPO62K3BCSP2VMFNQABCJFQQHQ,100.0,Alice
//! AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAY5HFKQ,50.0,
//! ```
//!
//! `name` may be empty or the column omitted entirely.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::algod::AlgodApi;
use crate::payroll::{Employee, PayrollManager};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RosterEntry {
    pub address: String,
    pub hourly_rate: f64,
    #[serde(default)]
    pub name: Option<String>,
}

/// Read every row of a roster file.
pub fn read_roster(path: &Path) -> Result<Vec<RosterEntry>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Cannot open roster '{}'", path.display()))?;

    let mut entries = Vec::new();
    for (i, row) in reader.deserialize::<RosterEntry>().enumerate() {
        // Line 1 is the header.
        let mut entry = row.with_context(|| {
            format!("Malformed roster row at line {} of '{}'", i + 2, path.display())
        })?;
        entry.name = entry.name.filter(|n| !n.is_empty());
        entries.push(entry);
    }
    Ok(entries)
}

/// Read and validate every roster row as an [`Employee`].
pub fn read_employees(path: &Path) -> Result<Vec<Employee>> {
    read_roster(path)?
        .iter()
        .map(|entry| {
            Employee::new(&entry.address, entry.hourly_rate, entry.name.as_deref())
                .with_context(|| format!("Invalid roster entry for '{}'", entry.address))
        })
        .collect()
}

/// Add every roster row to `manager`; returns the number of rows loaded.
pub fn load_into<C: AlgodApi>(manager: &mut PayrollManager<C>, path: &Path) -> Result<usize> {
    let employees = read_employees(path)?;
    let count = employees.len();
    for employee in employees {
        manager.insert_employee(employee);
    }
    Ok(count)
}
