//! Terminal tables for payroll runs and escrow generation.
//!
//! # Example output
//!
//! ```text
//! ╭────────────┬──────────────────────┬───────┬────────────────┬──────────────────────╮
//! │ Employee   ┆ Address              ┆ Hours ┆ Amount         ┆ Transaction          │
//! ╞════════════╪══════════════════════╪═══════╪════════════════╪══════════════════════╡
//! │ Alice      ┆ 66MDNQQLL2A3LXHSEZWJ… ┆ 5     ┆ 500.000000 ALGO ┆ 7XKQ3SHGMZ2B4ZT2…    │
//! ╰────────────┴──────────────────────┴───────┴────────────────┴──────────────────────╯
//! ```

use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, CellAlignment, Table};

use crate::amount::MicroAlgos;
use crate::escrow::EscrowRecord;
use crate::payroll::PayrollLine;

fn new_table<const N: usize>(header: [&str; N]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(header.to_vec());
    table
}

/// Payroll lines, one row per employee.  Previews show `(dry run)` in the
/// transaction column.
pub fn payroll_table(lines: &[PayrollLine]) -> Table {
    let mut table = new_table(["Employee", "Address", "Hours", "Amount", "Transaction"]);
    for line in lines {
        table.add_row(vec![
            Cell::new(line.employee.name.as_deref().unwrap_or("-")),
            Cell::new(truncate(&line.employee.address.to_string(), 20)),
            Cell::new(line.hours.to_string()).set_alignment(CellAlignment::Right),
            Cell::new(line.amount.to_string()).set_alignment(CellAlignment::Right),
            Cell::new(
                line.txid
                    .as_deref()
                    .map(|t| truncate(t, 16))
                    .unwrap_or_else(|| "(dry run)".to_owned()),
            ),
        ]);
    }
    table
}

pub fn escrow_table(records: &[EscrowRecord]) -> Table {
    let mut table = new_table(["Employee", "Payout", "Escrow address", "Program"]);
    for r in records {
        table.add_row(vec![
            Cell::new(truncate(&r.employee.to_string(), 20)),
            Cell::new(MicroAlgos(r.payout_microalgos).to_string())
                .set_alignment(CellAlignment::Right),
            Cell::new(r.escrow.to_string()),
            Cell::new(r.teal_path.display().to_string()),
        ]);
    }
    table
}

/// Sum of all line amounts; `None` on overflow.
pub fn total_amount(lines: &[PayrollLine]) -> Option<MicroAlgos> {
    lines
        .iter()
        .try_fold(MicroAlgos::ZERO, |acc, l| acc.checked_add(l.amount))
}

/// Truncate a string and append "…" if longer than `max` characters.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_owned()
    } else {
        let head: String = s.chars().take(max).collect();
        format!("{}…", head)
    }
}
