//! Outer surfaces driving the ledger.

pub mod csv;
