use super::balance::{Balance, NewBalance};
use super::expense::{Expense, NewExpense};
use super::ids::{BalanceId, ExpenseId, UserId};
use super::user::{ContactRef, PhoneNumber, User};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use std::collections::HashMap;

/// One page of a listing. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    page: u32,
    limit: u32,
}

impl Page {
    pub const MAX_LIMIT: u32 = 100;

    pub fn new(page: u32, limit: u32) -> Result<Self> {
        if page == 0 {
            return Err(LedgerError::InvalidPage("page starts at 1".to_string()));
        }
        if limit == 0 || limit > Self::MAX_LIMIT {
            return Err(LedgerError::InvalidPage(format!(
                "limit must be between 1 and {}",
                Self::MAX_LIMIT
            )));
        }
        Ok(Self { page, limit })
    }

    /// Everything, for internal sweeps that must see every record.
    pub fn all() -> Self {
        Self {
            page: 1,
            limit: u32::MAX,
        }
    }

    pub fn offset(&self) -> usize {
        (self.page as usize - 1).saturating_mul(self.limit as usize)
    }

    pub fn limit(&self) -> usize {
        self.limit as usize
    }
}

impl Default for Page {
    fn default() -> Self {
        Self { page: 1, limit: 20 }
    }
}

/// Persistence contract for balances.
///
/// `update` must reject a balance whose `version` differs from the stored one
/// and bump the version on success; that check is what serializes concurrent
/// creditor and debtor actions on the same balance.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Stores every balance of one expense, or none of them.
    async fn create_batch(&self, balances: Vec<NewBalance>) -> Result<Vec<Balance>>;
    /// Returns the balance only when `requesting_user` is one of its parties.
    async fn get(&self, id: BalanceId, requesting_user: UserId) -> Result<Option<Balance>>;
    async fn update(&self, balance: Balance) -> Result<Balance>;
    async fn delete(&self, id: BalanceId) -> Result<()>;
    /// Balances where `user` is creditor or debtor, ordered by id.
    async fn list_by_user(&self, user: UserId, page: Page) -> Result<Vec<Balance>>;
    async fn list_by_expense(&self, expense: ExpenseId) -> Result<Vec<Balance>>;
    async fn delete_by_expense(&self, expense: ExpenseId) -> Result<()>;
    /// Every stored balance, ordered by id.
    async fn all(&self) -> Result<Vec<Balance>>;
}

#[async_trait]
pub trait ExpenseStore: Send + Sync {
    async fn create(&self, expense: NewExpense) -> Result<Expense>;
    async fn get(&self, id: ExpenseId) -> Result<Option<Expense>>;
    async fn delete(&self, id: ExpenseId) -> Result<()>;
    async fn list_by_creator(&self, creator: UserId, page: Page) -> Result<Vec<Expense>>;
}

/// Identity collaborator: maps contacts to users and knows who signed up.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Resolves every contact to a user id, creating unregistered placeholders
    /// for phone numbers never seen before. Unknown user ids are an error.
    async fn resolve(&self, contacts: &[ContactRef]) -> Result<HashMap<ContactRef, UserId>>;
    async fn get(&self, id: UserId) -> Result<Option<User>>;
    /// Marks the owner of `phone` as registered, creating the user if needed.
    async fn register(&self, phone: PhoneNumber) -> Result<User>;
}

pub type LedgerStoreBox = Box<dyn LedgerStore>;
pub type ExpenseStoreBox = Box<dyn ExpenseStore>;
pub type UserDirectoryBox = Box<dyn UserDirectory>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_offset() {
        let page = Page::new(3, 10).unwrap();
        assert_eq!(page.offset(), 20);
        assert_eq!(page.limit(), 10);
        assert_eq!(Page::default().offset(), 0);
    }

    #[test]
    fn test_page_validation() {
        assert!(matches!(Page::new(0, 10), Err(LedgerError::InvalidPage(_))));
        assert!(Page::new(1, 0).is_err());
        assert!(Page::new(1, Page::MAX_LIMIT + 1).is_err());
    }
}
