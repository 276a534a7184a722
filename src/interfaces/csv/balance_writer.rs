use crate::domain::balance::Balance;
use crate::domain::money::Scale;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct BalanceRow {
    balance: u64,
    expense: u64,
    creditor: u64,
    debtor: u64,
    amount: Decimal,
    creditor_consent: String,
    debtor_consent: String,
    payment: String,
    deletion: String,
}

impl BalanceRow {
    fn new(balance: &Balance, scale: Scale) -> Self {
        Self {
            balance: balance.id.0,
            expense: balance.expense_id.0,
            creditor: balance.creditor_id.0,
            debtor: balance.debtor_id.0,
            amount: scale.to_major(balance.amount.value()),
            creditor_consent: balance.creditor.to_string(),
            debtor_consent: balance.debtor.to_string(),
            payment: balance.payment.to_string(),
            deletion: balance.deletion.to_string(),
        }
    }
}

/// Writes balances as CSV, converting minor units back to major units.
pub struct BalanceWriter<W: Write> {
    writer: csv::Writer<W>,
    scale: Scale,
}

impl<W: Write> BalanceWriter<W> {
    pub fn new(sink: W, scale: Scale) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
            scale,
        }
    }

    /// Writes the header followed by one row per balance, then flushes.
    pub fn write_balances(&mut self, balances: impl IntoIterator<Item = Balance>) -> Result<()> {
        let mut wrote_any = false;
        for balance in balances {
            self.writer.serialize(BalanceRow::new(&balance, self.scale))?;
            wrote_any = true;
        }
        if !wrote_any {
            self.writer.write_record([
                "balance",
                "expense",
                "creditor",
                "debtor",
                "amount",
                "creditor_consent",
                "debtor_consent",
                "payment",
                "deletion",
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::balance::{ConsentState, NewBalance};
    use crate::domain::ids::{BalanceId, ExpenseId, UserId};

    fn balance(amount: u64) -> Balance {
        NewBalance::new(
            ExpenseId(1),
            UserId(1),
            UserId(2),
            amount,
        )
        .unwrap()
        .into_balance(BalanceId(1))
    }

    fn render(balances: Vec<Balance>, scale: Scale) -> String {
        let mut out = Vec::new();
        BalanceWriter::new(&mut out, scale)
            .write_balances(balances)
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_writes_header_and_rows() {
        let mut accepted = balance(1000);
        accepted.creditor = ConsentState::Accepted;

        let output = render(vec![accepted], Scale::default());
        let mut lines = output.lines();
        assert_eq!(
            lines.next(),
            Some("balance,expense,creditor,debtor,amount,creditor_consent,debtor_consent,payment,deletion")
        );
        assert_eq!(lines.next(), Some("1,1,1,2,10,accepted,pending,unpaid,none"));
    }

    #[test]
    fn test_scale_controls_major_units() {
        let output = render(vec![balance(1005)], Scale::new(3).unwrap());
        assert!(output.contains(",1.005,"));
    }

    #[test]
    fn test_empty_output_still_has_header() {
        let output = render(Vec::new(), Scale::default());
        assert!(output.starts_with("balance,expense,creditor"));
        assert_eq!(output.lines().count(), 1);
    }
}
