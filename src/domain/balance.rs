use super::ids::{BalanceId, ExpenseId, UserId};
use super::money::Amount;
use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of a balance a user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Party {
    Creditor,
    Debtor,
}

impl Party {
    pub fn counterpart(self) -> Self {
        match self {
            Party::Creditor => Party::Debtor,
            Party::Debtor => Party::Creditor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentState {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentState {
    #[default]
    Unpaid,
    /// The debtor reported the payment; the creditor has not confirmed it.
    Paid,
    /// The creditor confirmed receiving the payment.
    Confirmed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletionState {
    #[default]
    None,
    Requested(Party),
    /// Both parties asked for removal; the record must be deleted.
    Agreed,
}

impl fmt::Display for ConsentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConsentState::Pending => "pending",
            ConsentState::Accepted => "accepted",
            ConsentState::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

impl fmt::Display for PaymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentState::Unpaid => "unpaid",
            PaymentState::Paid => "paid",
            PaymentState::Confirmed => "confirmed",
        };
        f.write_str(s)
    }
}

impl fmt::Display for DeletionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeletionState::None => f.write_str("none"),
            DeletionState::Requested(Party::Creditor) => f.write_str("requested_by_creditor"),
            DeletionState::Requested(Party::Debtor) => f.write_str("requested_by_debtor"),
            DeletionState::Agreed => f.write_str("agreed"),
        }
    }
}

/// A balance computed for an expense but not yet persisted.
///
/// Construction enforces the entity invariants, so every `NewBalance` that
/// reaches a store already has distinct parties and a positive amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBalance {
    pub expense_id: ExpenseId,
    pub creditor_id: UserId,
    pub debtor_id: UserId,
    pub amount: Amount,
}

impl NewBalance {
    pub fn new(
        expense_id: ExpenseId,
        creditor_id: UserId,
        debtor_id: UserId,
        amount: u64,
    ) -> Result<Self> {
        if creditor_id == debtor_id {
            return Err(LedgerError::InvariantViolation(format!(
                "user {} cannot owe themselves",
                creditor_id
            )));
        }
        let amount = Amount::new(amount).map_err(|_| {
            LedgerError::InvariantViolation(format!(
                "balance between {} and {} must have a positive amount",
                creditor_id, debtor_id
            ))
        })?;
        Ok(Self {
            expense_id,
            creditor_id,
            debtor_id,
            amount,
        })
    }

    /// Attaches the identity assigned by a store.
    pub fn into_balance(self, id: BalanceId) -> Balance {
        Balance {
            id,
            expense_id: self.expense_id,
            creditor_id: self.creditor_id,
            debtor_id: self.debtor_id,
            amount: self.amount,
            creditor: ConsentState::Pending,
            debtor: ConsentState::Pending,
            payment: PaymentState::Unpaid,
            deletion: DeletionState::None,
            version: 0,
        }
    }
}

/// A single pairwise obligation: `debtor_id` owes `creditor_id` the `amount`.
///
/// Consent, payment and deletion are independent axes. A balance can be
/// accepted by both parties and still unpaid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub id: BalanceId,
    pub expense_id: ExpenseId,
    pub creditor_id: UserId,
    pub debtor_id: UserId,
    pub amount: Amount,
    pub creditor: ConsentState,
    pub debtor: ConsentState,
    pub payment: PaymentState,
    pub deletion: DeletionState,
    /// Optimistic concurrency stamp, bumped by the store on every update.
    pub version: u64,
}

impl Balance {
    /// Returns which side `user` is on, if any.
    pub fn party_of(&self, user: UserId) -> Option<Party> {
        if user == self.creditor_id {
            Some(Party::Creditor)
        } else if user == self.debtor_id {
            Some(Party::Debtor)
        } else {
            None
        }
    }

    pub fn user(&self, party: Party) -> UserId {
        match party {
            Party::Creditor => self.creditor_id,
            Party::Debtor => self.debtor_id,
        }
    }

    pub fn consent(&self, party: Party) -> ConsentState {
        match party {
            Party::Creditor => self.creditor,
            Party::Debtor => self.debtor,
        }
    }

    pub(crate) fn set_consent(&mut self, party: Party, state: ConsentState) {
        match party {
            Party::Creditor => self.creditor = state,
            Party::Debtor => self.debtor = state,
        }
    }

    pub fn creditor_accepted(&self) -> bool {
        self.creditor == ConsentState::Accepted
    }

    pub fn creditor_rejected(&self) -> bool {
        self.creditor == ConsentState::Rejected
    }

    pub fn debtor_accepted(&self) -> bool {
        self.debtor == ConsentState::Accepted
    }

    pub fn debtor_rejected(&self) -> bool {
        self.debtor == ConsentState::Rejected
    }

    pub fn is_paid(&self) -> bool {
        matches!(self.payment, PaymentState::Paid | PaymentState::Confirmed)
    }

    pub fn is_payment_accepted(&self) -> bool {
        self.payment == PaymentState::Confirmed
    }

    pub fn deletion_requested_by(&self, party: Party) -> bool {
        match self.deletion {
            DeletionState::None => false,
            DeletionState::Requested(requester) => requester == party,
            DeletionState::Agreed => true,
        }
    }

    /// True once the debt no longer needs attention from either party.
    pub fn is_settled(&self) -> bool {
        self.payment == PaymentState::Confirmed
    }
}
