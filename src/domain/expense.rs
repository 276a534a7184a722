use super::calculator::Split;
use super::ids::{ExpenseId, UserId};
use super::user::{ContactRef, User};
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 400;

const FORBIDDEN_NAME_CHARS: &[char] = &[
    '*', '/', '!', '@', '#', '$', '%', '^', '&', '(', ')', '_', '+', '-', '=', '{', '}', '[', ']',
    ';', ':', '\'', '\\', '?', '"', '.', '>', '<', '|',
];

/// A shared expense. Immutable once its balances exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub creator_id: UserId,
    pub name: String,
    pub description: String,
    pub total_amount: u64,
    pub created_at: DateTime<Utc>,
}

/// An expense ready to be stored; the store assigns its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewExpense {
    pub creator_id: UserId,
    pub name: String,
    pub description: String,
    pub total_amount: u64,
    pub created_at: DateTime<Utc>,
}

impl NewExpense {
    pub fn into_expense(self, id: ExpenseId) -> Expense {
        Expense {
            id,
            creator_id: self.creator_id,
            name: self.name,
            description: self.description,
            total_amount: self.total_amount,
            created_at: self.created_at,
        }
    }
}

/// An expense as submitted by a user, with participants not yet resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpenseRequest {
    pub name: String,
    pub description: String,
    /// Contribution rows in minor units, as entered. Rows for the same
    /// contact are summed by [`ExpenseRequest::contributed`].
    pub contributions: Vec<(ContactRef, u64)>,
    /// Participants who paid nothing and owe a full share.
    pub beneficiaries: Vec<ContactRef>,
}

impl ExpenseRequest {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn contribute(mut self, who: impl Into<ContactRef>, amount: u64) -> Self {
        self.contributions.push((who.into(), amount));
        self
    }

    pub fn benefit(mut self, who: impl Into<ContactRef>) -> Self {
        self.beneficiaries.push(who.into());
        self
    }

    /// Amount paid per contact, failing when a contact's rows overflow `u64`.
    pub fn contributed(&self) -> Result<BTreeMap<ContactRef, u64>> {
        let mut totals: BTreeMap<ContactRef, u64> = BTreeMap::new();
        for (who, amount) in &self.contributions {
            let entry = totals.entry(who.clone()).or_insert(0);
            *entry = entry.checked_add(*amount).ok_or_else(|| {
                LedgerError::InvalidContribution(format!("{} total overflows", who))
            })?;
        }
        Ok(totals)
    }

    /// Every contact referenced by the request, contributors first.
    pub fn contacts(&self) -> Vec<ContactRef> {
        let contributors: BTreeSet<&ContactRef> =
            self.contributions.iter().map(|(who, _)| who).collect();
        contributors
            .into_iter()
            .chain(self.beneficiaries.iter())
            .cloned()
            .collect()
    }

    pub fn total(&self) -> Result<u64> {
        self.contributions
            .iter()
            .try_fold(0u64, |acc, (_, amount)| acc.checked_add(*amount))
            .ok_or_else(|| LedgerError::InvalidContribution("total overflows".to_string()))
    }

    /// Checks the request before anything is resolved or stored.
    pub fn validate(&self, creator: &User) -> Result<()> {
        validate_name(&self.name)?;
        validate_description(&self.description)?;

        if self.contributions.is_empty() {
            return Err(LedgerError::EmptyContributors);
        }
        if let Some((who, _)) = self.contributions.iter().find(|(_, amount)| *amount == 0) {
            return Err(LedgerError::InvalidContribution(format!("{} must be positive", who)));
        }
        let contributed = self.contributed()?;
        self.total()?;

        let mut seen: BTreeSet<&ContactRef> = contributed.keys().collect();
        for beneficiary in &self.beneficiaries {
            if !seen.insert(beneficiary) {
                return Err(LedgerError::OverlappingParticipants(beneficiary.to_string()));
            }
        }

        let by_id = ContactRef::User(creator.id);
        let by_phone = ContactRef::Phone(creator.phone.clone());
        if !seen.contains(&by_id) && !seen.contains(&by_phone) {
            return Err(LedgerError::CreatorNotParticipant(creator.id));
        }
        Ok(())
    }

    /// Maps the request onto resolved user ids.
    ///
    /// Two different contacts can resolve to the same user (an id and that
    /// user's phone number), so disjointness is checked again here.
    pub fn resolve(&self, ids: &HashMap<ContactRef, UserId>) -> Result<Split> {
        let lookup = |contact: &ContactRef| {
            ids.get(contact)
                .copied()
                .ok_or_else(|| LedgerError::NotFound(contact.to_string()))
        };

        let mut split = Split::default();
        for (contact, amount) in self.contributed()? {
            let id = lookup(&contact)?;
            if split.contributions.insert(id, amount).is_some() {
                return Err(LedgerError::OverlappingParticipants(contact.to_string()));
            }
        }
        for contact in &self.beneficiaries {
            let id = lookup(contact)?;
            if split.contributions.contains_key(&id) || !split.beneficiaries.insert(id) {
                return Err(LedgerError::OverlappingParticipants(contact.to_string()));
            }
        }
        Ok(split)
    }
}

pub fn validate_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::InvalidName("name is required".to_string()));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(LedgerError::InvalidName(format!(
            "name is longer than {} characters",
            MAX_NAME_LEN
        )));
    }
    if let Some(c) = trimmed.chars().find(|c| FORBIDDEN_NAME_CHARS.contains(c)) {
        return Err(LedgerError::InvalidName(format!(
            "name contains forbidden character '{}'",
            c
        )));
    }
    if trimmed.to_lowercase().contains("union") {
        return Err(LedgerError::InvalidName(
            "name contains a forbidden word".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_description(description: &str) -> Result<()> {
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(LedgerError::InvalidDescription(format!(
            "description is longer than {} characters",
            MAX_DESCRIPTION_LEN
        )));
    }
    Ok(())
}
