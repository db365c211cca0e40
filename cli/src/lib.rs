//! Algo Payroll — hourly payroll and escrow generation on Algorand.
//!
//! The crate is glue around an algod node: look up a rate, multiply by
//! hours, build a transaction, sign it, submit it, wait for it to confirm.
//!
//! | Module | Role |
//! |--------|------|
//! | [`crypto`] | addresses, mnemonics, ed25519 accounts |
//! | [`amount`] | microAlgo amounts |
//! | [`algod`] | blocking REST client and the [`algod::AlgodApi`] trait |
//! | [`transaction`] | build, encode, group, sign, broadcast |
//! | [`payroll`] | employee table and payment dispatch |
//! | [`roster`] | employee CSV loader |
//! | [`escrow`] | per-employee TEAL escrows and their compiled addresses |
//! | [`report`] | terminal tables |
//! | [`config`] | network endpoints and environment variables |

pub mod algod;
pub mod amount;
pub mod config;
pub mod crypto;
pub mod escrow;
pub mod payroll;
pub mod report;
pub mod roster;
pub mod transaction;

#[cfg(test)]
mod testing;
