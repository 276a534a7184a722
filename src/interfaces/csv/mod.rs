//! CSV command stream in, balance report out.

pub mod balance_writer;
pub mod command_reader;
pub mod command_runner;
