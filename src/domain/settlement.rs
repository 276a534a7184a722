//! Per-balance settlement transitions.
//!
//! Each operation checks that the actor is a party to the balance, then
//! mutates one axis of its state. When the counterpart is an unregistered
//! placeholder the operation also resolves the counterpart's side, since no
//! real user will ever act for them.
//!
//! Operations mutate the balance in place and leave it untouched on error.
//! Persisting the result (with a version check) is the caller's job.

use super::balance::{Balance, ConsentState, DeletionState, Party, PaymentState};
use super::ids::UserId;
use super::user::Registration;
use crate::error::{LedgerError, Result};

/// Registration status of both parties of a balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registrations {
    pub creditor: Registration,
    pub debtor: Registration,
}

impl Registrations {
    pub fn both_registered() -> Self {
        Self {
            creditor: Registration::Registered,
            debtor: Registration::Registered,
        }
    }

    pub fn of(&self, party: Party) -> Registration {
        match party {
            Party::Creditor => self.creditor,
            Party::Debtor => self.debtor,
        }
    }
}

/// Result of a deletion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionDecision {
    /// Only one party asked so far; the balance stays.
    Pending,
    /// Both parties asked; the caller should delete the record.
    Proceed,
}

fn party_for(balance: &Balance, actor: UserId, action: &'static str) -> Result<Party> {
    balance
        .party_of(actor)
        .ok_or(LedgerError::PermissionDenied {
            actor,
            balance: balance.id,
            action,
        })
}

fn require_party(
    balance: &Balance,
    actor: UserId,
    expected: Party,
    action: &'static str,
) -> Result<()> {
    match balance.party_of(actor) {
        Some(party) if party == expected => Ok(()),
        _ => Err(LedgerError::PermissionDenied {
            actor,
            balance: balance.id,
            action,
        }),
    }
}

fn decide(
    balance: &mut Balance,
    actor: UserId,
    registrations: Registrations,
    state: ConsentState,
    action: &'static str,
) -> Result<()> {
    let party = party_for(balance, actor, action)?;
    balance.set_consent(party, state);

    let counterpart = party.counterpart();
    if !registrations.of(counterpart).is_registered() {
        balance.set_consent(counterpart, state);
    }
    Ok(())
}

/// Records the actor's acceptance of the balance.
///
/// Accepting clears an earlier rejection. Calling it again is a no-op.
pub fn accept(balance: &mut Balance, actor: UserId, registrations: Registrations) -> Result<()> {
    decide(balance, actor, registrations, ConsentState::Accepted, "accept")
}

/// Records the actor's rejection of the balance.
pub fn reject(balance: &mut Balance, actor: UserId, registrations: Registrations) -> Result<()> {
    decide(balance, actor, registrations, ConsentState::Rejected, "reject")
}

/// Marks the balance as paid. Only the debtor may pay.
///
/// An unregistered creditor can never confirm, so the payment is confirmed
/// on their behalf.
pub fn pay(balance: &mut Balance, payer: UserId, creditor: Registration) -> Result<()> {
    require_party(balance, payer, Party::Debtor, "pay")?;

    balance.payment = if creditor.is_registered() {
        match balance.payment {
            PaymentState::Confirmed => PaymentState::Confirmed,
            PaymentState::Unpaid | PaymentState::Paid => PaymentState::Paid,
        }
    } else {
        PaymentState::Confirmed
    };
    Ok(())
}

/// Confirms receipt of the payment. Only the creditor may confirm.
///
/// A registered debtor must have paid first. An unregistered debtor can never
/// pay through the system, so the creditor settles on their behalf and the
/// balance becomes both paid and confirmed.
pub fn accept_payment(balance: &mut Balance, acceptor: UserId, debtor: Registration) -> Result<()> {
    require_party(balance, acceptor, Party::Creditor, "accept payment for")?;

    if debtor.is_registered() && balance.payment == PaymentState::Unpaid {
        return Err(LedgerError::NotYetPaid(balance.id));
    }
    balance.payment = PaymentState::Confirmed;
    Ok(())
}

/// Two-phase removal: the balance is deleted only when both parties ask.
pub fn request_deletion(balance: &mut Balance, requester: UserId) -> Result<DeletionDecision> {
    let party = party_for(balance, requester, "delete")?;

    match balance.deletion {
        DeletionState::Agreed => Ok(DeletionDecision::Proceed),
        DeletionState::Requested(other) if other == party.counterpart() => {
            balance.deletion = DeletionState::Agreed;
            Ok(DeletionDecision::Proceed)
        }
        DeletionState::None | DeletionState::Requested(_) => {
            balance.deletion = DeletionState::Requested(party);
            Ok(DeletionDecision::Pending)
        }
    }
}
