//! Property-based tests for the split calculator.
//!
//! Contributors take user ids 1..=20 and beneficiaries 21..=40 so the two
//! groups never overlap.

use proptest::prelude::*;
use splitledger::domain::calculator::{Split, compute};
use splitledger::domain::ids::{ExpenseId, UserId};
use splitledger::error::LedgerError;
use std::collections::BTreeMap;

fn split_strategy() -> impl Strategy<Value = Split> {
    (
        prop::collection::btree_map(1u64..=20, 0u64..=100_000, 1..8),
        prop::collection::btree_set(21u64..=40, 0..8),
    )
        .prop_map(|(contributions, beneficiaries)| {
            Split::new(
                contributions.into_iter().map(|(id, c)| (UserId(id), c)),
                beneficiaries.into_iter().map(UserId),
            )
        })
}

fn total(split: &Split) -> u64 {
    split.contributions.values().sum()
}

proptest! {
    #[test]
    fn prop_balances_cover_every_shortfall(split in split_strategy()) {
        prop_assume!(total(&split) >= split.participants() as u64);

        let share = split.fair_share().unwrap();
        let shortfalls = split.shortfalls(share);
        let excesses = split.excesses(share);
        let balances = compute(&split, ExpenseId(1)).unwrap();

        let mut owed: BTreeMap<UserId, u64> = BTreeMap::new();
        let mut lent: BTreeMap<UserId, u64> = BTreeMap::new();
        for balance in &balances {
            prop_assert_ne!(balance.creditor_id, balance.debtor_id);
            prop_assert!(balance.amount.value() > 0);
            *owed.entry(balance.debtor_id).or_default() += balance.amount.value();
            *lent.entry(balance.creditor_id).or_default() += balance.amount.value();
        }

        // every debtor owes exactly their shortfall
        prop_assert_eq!(&owed, &shortfalls);
        // no creditor lends more than their excess
        for (creditor, amount) in &lent {
            prop_assert!(*amount <= excesses[creditor]);
        }

        let allocated: u64 = balances.iter().map(|b| b.amount.value()).sum();
        let excess: u64 = excesses.values().sum();
        let remainder = total(&split) - share * split.participants() as u64;
        let idle = split.contributions.values().filter(|c| **c == 0).count() as u64;
        prop_assert_eq!(excess - allocated, remainder + share * idle);
    }

    #[test]
    fn prop_low_contribution_iff_share_is_zero(split in split_strategy()) {
        let result = compute(&split, ExpenseId(1));
        if total(&split) < split.participants() as u64 {
            let is_low = matches!(result, Err(LedgerError::LowContribution { .. }));
            prop_assert!(is_low);
        } else {
            prop_assert!(result.is_ok());
        }
    }

    #[test]
    fn prop_output_is_deterministic(split in split_strategy()) {
        let first = compute(&split, ExpenseId(7));
        let second = compute(&split.clone(), ExpenseId(7));
        match (first, second) {
            (Ok(a), Ok(b)) => prop_assert_eq!(a, b),
            (Err(_), Err(_)) => {}
            _ => prop_assert!(false, "results diverged"),
        }
    }
}
