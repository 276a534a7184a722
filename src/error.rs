use crate::domain::ids::{BalanceId, ExpenseId, UserId};
use miette::Diagnostic;
use thiserror::Error;

/// Broad classification of a [`LedgerError`].
///
/// `User` errors are safe to show to the person who triggered them,
/// `Invariant` errors point at an upstream validation bug, and `Persistence`
/// errors come from the storage backend and may be retryable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    User,
    Invariant,
    Persistence,
}

#[derive(Error, Diagnostic, Debug)]
pub enum LedgerError {
    #[error("expense total {total} is too low to split among {participants} participants")]
    #[diagnostic(code(ledger::low_contribution))]
    LowContribution { total: u64, participants: usize },

    #[error("user {actor} is not permitted to {action} balance {balance}")]
    #[diagnostic(code(ledger::permission_denied))]
    PermissionDenied {
        actor: UserId,
        balance: BalanceId,
        action: &'static str,
    },

    #[error("user {actor} is not permitted to modify expense {expense}")]
    #[diagnostic(code(ledger::permission_denied))]
    ExpensePermissionDenied { actor: UserId, expense: ExpenseId },

    #[error("balance {0} is not paid yet")]
    #[diagnostic(code(ledger::not_yet_paid))]
    NotYetPaid(BalanceId),

    #[error("name: {0}")]
    #[diagnostic(code(ledger::invalid_name))]
    InvalidName(String),

    #[error("description: {0}")]
    #[diagnostic(code(ledger::invalid_description))]
    InvalidDescription(String),

    #[error("contributions cannot be empty")]
    #[diagnostic(code(ledger::empty_contributors))]
    EmptyContributors,

    #[error("invalid contribution: {0}")]
    #[diagnostic(code(ledger::invalid_contribution))]
    InvalidContribution(String),

    #[error("{0} appears more than once among contributors and beneficiaries")]
    #[diagnostic(code(ledger::overlapping_participants))]
    OverlappingParticipants(String),

    #[error("creator {0} must be a contributor or a beneficiary")]
    #[diagnostic(code(ledger::creator_not_participant))]
    CreatorNotParticipant(UserId),

    #[error("invalid phone number: {0}")]
    #[diagnostic(code(ledger::invalid_phone_number))]
    InvalidPhoneNumber(String),

    #[error("invalid amount: {0}")]
    #[diagnostic(code(ledger::invalid_amount))]
    InvalidAmount(String),

    #[error("invalid command: {0}")]
    #[diagnostic(code(ledger::invalid_command))]
    InvalidCommand(String),

    #[error("invalid page: {0}")]
    #[diagnostic(code(ledger::invalid_page))]
    InvalidPage(String),

    #[error("{0} not found")]
    #[diagnostic(code(ledger::not_found))]
    NotFound(String),

    #[error("invariant violated: {0}")]
    #[diagnostic(code(ledger::invariant))]
    InvariantViolation(String),

    #[error("balance {id} was modified concurrently (expected version {expected}, found {found})")]
    #[diagnostic(code(ledger::version_conflict))]
    VersionConflict {
        id: BalanceId,
        expected: u64,
        found: u64,
    },

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    InternalError(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::LowContribution { .. }
            | LedgerError::PermissionDenied { .. }
            | LedgerError::ExpensePermissionDenied { .. }
            | LedgerError::NotYetPaid(_)
            | LedgerError::InvalidName(_)
            | LedgerError::InvalidDescription(_)
            | LedgerError::EmptyContributors
            | LedgerError::InvalidContribution(_)
            | LedgerError::OverlappingParticipants(_)
            | LedgerError::CreatorNotParticipant(_)
            | LedgerError::InvalidPhoneNumber(_)
            | LedgerError::InvalidAmount(_)
            | LedgerError::InvalidCommand(_)
            | LedgerError::InvalidPage(_)
            | LedgerError::NotFound(_) => ErrorKind::User,
            LedgerError::InvariantViolation(_) => ErrorKind::Invariant,
            _ => ErrorKind::Persistence,
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
