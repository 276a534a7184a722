//! Ledger domain: entities, the split calculator, the settlement state
//! machine, and the ports the application layer depends on.

pub mod balance;
pub mod calculator;
pub mod expense;
pub mod ids;
pub mod money;
pub mod ports;
pub mod settlement;
pub mod user;
