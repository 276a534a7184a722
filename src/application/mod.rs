//! Application layer orchestrating expenses and their settlement.
//!
//! `LedgerService` is the primary entry point. It wires the pure split
//! calculator and settlement state machine to the storage ports and the user
//! directory.

pub mod ledger;
