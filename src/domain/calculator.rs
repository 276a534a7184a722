//! Splits one expense into pairwise balances.
//!
//! Every participant's fair share is the integer average of all contributions
//! over contributors and beneficiaries. Contributors above the share become
//! creditors for their excess; under-paying contributors and beneficiaries
//! form the shortfall pool. Creditors are then matched greedily against the
//! pool. This is a netting pass, not a minimum-transaction settlement: with
//! `C` creditors and `D` debtors it may emit up to `C * D` balances.
//!
//! Iteration runs in ascending user id order so equal input always yields the
//! same balances.

use super::balance::NewBalance;
use super::ids::{ExpenseId, UserId};
use crate::error::{LedgerError, Result};
use std::collections::{BTreeMap, BTreeSet};

/// A validated split request with contacts already resolved to user ids.
///
/// Contributors and beneficiaries are expected to be disjoint; the caller
/// validates that before computing.
#[derive(Debug, Clone, Default)]
pub struct Split {
    pub contributions: BTreeMap<UserId, u64>,
    pub beneficiaries: BTreeSet<UserId>,
}

impl Split {
    pub fn new(
        contributions: impl IntoIterator<Item = (UserId, u64)>,
        beneficiaries: impl IntoIterator<Item = UserId>,
    ) -> Self {
        Self {
            contributions: contributions.into_iter().collect(),
            beneficiaries: beneficiaries.into_iter().collect(),
        }
    }

    pub fn participants(&self) -> usize {
        self.contributions.len() + self.beneficiaries.len()
    }

    /// Sum of all contributions, failing on `u64` overflow.
    pub fn total(&self) -> Result<u64> {
        self.contributions
            .values()
            .try_fold(0u64, |acc, amount| acc.checked_add(*amount))
            .ok_or_else(|| {
                LedgerError::InvariantViolation("contribution total overflows".to_string())
            })
    }

    /// The integer average every participant is expected to carry.
    pub fn fair_share(&self) -> Result<u64> {
        let total = self.total()?;
        let participants = self.participants();
        let share = match participants {
            0 => 0,
            n => total / n as u64,
        };
        if share == 0 {
            return Err(LedgerError::LowContribution {
                total,
                participants,
            });
        }
        Ok(share)
    }

    /// Amount each debtor owes before any allocation, ordered by user id.
    ///
    /// Contributors who paid something below the fair share owe the
    /// difference; beneficiaries owe the full share. A contributor who paid
    /// nothing is not placed in the pool.
    pub fn shortfalls(&self, fair_share: u64) -> BTreeMap<UserId, u64> {
        let mut pool: BTreeMap<UserId, u64> = self
            .contributions
            .iter()
            .filter(|(_, amount)| **amount > 0 && **amount < fair_share)
            .map(|(user, amount)| (*user, fair_share - amount))
            .collect();
        for beneficiary in &self.beneficiaries {
            pool.insert(*beneficiary, fair_share);
        }
        pool
    }

    /// Amount each net creditor paid above the fair share, ordered by user id.
    pub fn excesses(&self, fair_share: u64) -> BTreeMap<UserId, u64> {
        self.contributions
            .iter()
            .filter(|(_, amount)| **amount > fair_share)
            .map(|(user, amount)| (*user, amount - fair_share))
            .collect()
    }
}

/// Computes the balances for one expense.
///
/// Fails with [`LedgerError::LowContribution`] when the fair share rounds
/// down to zero. The emitted amounts sum to the total shortfall; any integer
/// division remainder stays with the creditors.
pub fn compute(split: &Split, expense_id: ExpenseId) -> Result<Vec<NewBalance>> {
    let fair_share = split.fair_share()?;
    let mut pool = split.shortfalls(fair_share);
    let mut balances = Vec::new();

    for (creditor, mut excess) in split.excesses(fair_share) {
        for (debtor, owed) in pool.iter_mut() {
            if excess == 0 {
                break;
            }
            if *owed == 0 {
                continue;
            }
            let allocated = excess.min(*owed);
            balances.push(NewBalance::new(expense_id, creditor, *debtor, allocated)?);
            excess -= allocated;
            *owed -= allocated;
        }
    }

    Ok(balances)
}
