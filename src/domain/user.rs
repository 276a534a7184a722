use super::ids::UserId;
use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Whether a user completed signup or is a placeholder created from a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Registration {
    Registered,
    Unregistered,
}

impl Registration {
    pub fn is_registered(self) -> bool {
        self == Registration::Registered
    }
}

/// A normalized phone number: optional leading `+` followed by 9 to 15 digits.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn parse(raw: &str) -> Result<Self> {
        let compact: String = raw
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-'))
            .collect();
        let digits = compact.strip_prefix('+').unwrap_or(&compact);
        if !(9..=15).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(LedgerError::InvalidPhoneNumber(raw.to_string()));
        }
        Ok(Self(compact))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for PhoneNumber {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(phone: PhoneNumber) -> Self {
        phone.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub phone: PhoneNumber,
    pub registration: Registration,
}

impl User {
    pub fn is_registered(&self) -> bool {
        self.registration.is_registered()
    }
}

/// How an expense refers to a participant before resolution.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactRef {
    User(UserId),
    Phone(PhoneNumber),
}

impl fmt::Display for ContactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContactRef::User(id) => write!(f, "user {}", id),
            ContactRef::Phone(phone) => write!(f, "contact {}", phone),
        }
    }
}

impl From<UserId> for ContactRef {
    fn from(id: UserId) -> Self {
        ContactRef::User(id)
    }
}

impl From<PhoneNumber> for ContactRef {
    fn from(phone: PhoneNumber) -> Self {
        ContactRef::Phone(phone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_number_normalization() {
        let phone = PhoneNumber::parse(" +98 912-123-4567 ").unwrap();
        assert_eq!(phone.as_str(), "+989121234567");
    }

    #[test]
    fn test_phone_number_rejects_garbage() {
        assert!(matches!(
            PhoneNumber::parse("12345"),
            Err(LedgerError::InvalidPhoneNumber(_))
        ));
        assert!(PhoneNumber::parse("+98912abc4567").is_err());
        assert!(PhoneNumber::parse("").is_err());
    }

    #[test]
    fn test_contact_ref_display() {
        assert_eq!(ContactRef::User(UserId(4)).to_string(), "user 4");
        let phone: ContactRef = PhoneNumber::parse("09121234567").unwrap().into();
        assert_eq!(phone.to_string(), "contact 09121234567");
    }

    #[test]
    fn test_registration() {
        assert!(Registration::Registered.is_registered());
        assert!(!Registration::Unregistered.is_registered());
    }
}
