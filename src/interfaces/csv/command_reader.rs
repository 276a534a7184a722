use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandType {
    Register,
    Contribute,
    Benefit,
    Split,
    Accept,
    Reject,
    Pay,
    AcceptPayment,
    Delete,
}

/// One row of the command stream.
///
/// Columns a command does not use are left empty. `expense` is a free-form
/// label grouping `contribute`/`benefit` rows into a draft until `split`.
/// An `amount` that is present but not a decimal fails the whole row.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Command {
    #[serde(rename = "type")]
    pub r#type: CommandType,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub expense: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub user: Option<u64>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub balance: Option<u64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub phone: Option<String>,
}

/// Reads commands from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming and flexible record lengths, so
/// trailing empty columns may be omitted.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes commands; a malformed row yields an error and the
    /// stream continues with the next one.
    pub fn commands(self) -> impl Iterator<Item = Result<Command>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(LedgerError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reader_valid_stream() {
        let data = "type, expense, user, amount, balance, phone\n\
                    register, , 1, , , +15550000001\n\
                    contribute, dinner, 1, 30.00, ,\n\
                    accept_payment, , 1, , 4,";
        let commands: Vec<Result<Command>> = CommandReader::new(data.as_bytes()).commands().collect();

        assert_eq!(commands.len(), 3);
        let register = commands[0].as_ref().unwrap();
        assert_eq!(register.r#type, CommandType::Register);
        assert_eq!(register.phone.as_deref(), Some("+15550000001"));
        assert_eq!(register.expense, None);

        let contribute = commands[1].as_ref().unwrap();
        assert_eq!(contribute.expense.as_deref(), Some("dinner"));
        assert_eq!(contribute.amount, Some(dec!(30.00)));

        let confirm = commands[2].as_ref().unwrap();
        assert_eq!(confirm.r#type, CommandType::AcceptPayment);
        assert_eq!(confirm.balance, Some(4));
    }

    #[test]
    fn test_reader_short_rows() {
        let data = "type, expense, user, amount, balance, phone\nsplit, dinner, 1";
        let commands: Vec<Result<Command>> = CommandReader::new(data.as_bytes()).commands().collect();
        let split = commands[0].as_ref().unwrap();
        assert_eq!(split.r#type, CommandType::Split);
        assert_eq!(split.user, Some(1));
        assert_eq!(split.amount, None);
    }

    #[test]
    fn test_reader_malformed_line() {
        let data = "type, expense, user, amount, balance, phone\n\
                    refund, , 1, , ,\n\
                    pay, , 2, , 1,";
        let commands: Vec<Result<Command>> = CommandReader::new(data.as_bytes()).commands().collect();

        assert!(matches!(commands[0], Err(LedgerError::CsvError(_))));
        assert!(commands[1].is_ok());
    }

    #[test]
    fn test_reader_rejects_unparsable_amount() {
        let data = "type, expense, user, amount, balance, phone\n\
                    contribute, dinner, 1, not_a_number, ,\n\
                    contribute, dinner, 1, , ,";
        let commands: Vec<Result<Command>> = CommandReader::new(data.as_bytes()).commands().collect();

        assert!(matches!(commands[0], Err(LedgerError::CsvError(_))));
        assert_eq!(commands[1].as_ref().unwrap().amount, None);
    }
}
