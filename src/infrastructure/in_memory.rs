use crate::domain::balance::{Balance, NewBalance};
use crate::domain::expense::{Expense, NewExpense};
use crate::domain::ids::{BalanceId, ExpenseId, UserId};
use crate::domain::ports::{ExpenseStore, LedgerStore, Page, UserDirectory};
use crate::domain::user::{ContactRef, PhoneNumber, Registration, User};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

struct Table<K, V> {
    rows: BTreeMap<K, V>,
    last_id: u64,
}

impl<K, V> Default for Table<K, V> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            last_id: 0,
        }
    }
}

impl<K, V> Table<K, V> {
    fn next_id(&mut self) -> u64 {
        self.last_id += 1;
        self.last_id
    }
}

fn paginate<T>(items: impl Iterator<Item = T>, page: Page) -> Vec<T> {
    items.skip(page.offset()).take(page.limit()).collect()
}

/// A thread-safe in-memory store for balances.
///
/// Cloning shares the underlying table. Ids are assigned sequentially from 1.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    table: Arc<RwLock<Table<BalanceId, Balance>>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn create_batch(&self, balances: Vec<NewBalance>) -> Result<Vec<Balance>> {
        if let Some(first) = balances.first()
            && balances.iter().any(|b| b.expense_id != first.expense_id)
        {
            return Err(LedgerError::InvariantViolation(
                "a batch must belong to a single expense".to_string(),
            ));
        }

        let mut table = self.table.write().await;
        let created: Vec<Balance> = balances
            .into_iter()
            .map(|new| new.into_balance(BalanceId(table.next_id())))
            .collect();
        for balance in &created {
            table.rows.insert(balance.id, balance.clone());
        }
        Ok(created)
    }

    async fn get(&self, id: BalanceId, requesting_user: UserId) -> Result<Option<Balance>> {
        let table = self.table.read().await;
        Ok(table
            .rows
            .get(&id)
            .filter(|b| b.party_of(requesting_user).is_some())
            .cloned())
    }

    async fn update(&self, mut balance: Balance) -> Result<Balance> {
        let mut table = self.table.write().await;
        let stored = table
            .rows
            .get_mut(&balance.id)
            .ok_or_else(|| LedgerError::NotFound(format!("balance {}", balance.id)))?;
        if stored.version != balance.version {
            return Err(LedgerError::VersionConflict {
                id: balance.id,
                expected: balance.version,
                found: stored.version,
            });
        }
        balance.version += 1;
        *stored = balance.clone();
        Ok(balance)
    }

    async fn delete(&self, id: BalanceId) -> Result<()> {
        let mut table = self.table.write().await;
        table
            .rows
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| LedgerError::NotFound(format!("balance {}", id)))
    }

    async fn list_by_user(&self, user: UserId, page: Page) -> Result<Vec<Balance>> {
        let table = self.table.read().await;
        Ok(paginate(
            table
                .rows
                .values()
                .filter(|b| b.party_of(user).is_some())
                .cloned(),
            page,
        ))
    }

    async fn list_by_expense(&self, expense: ExpenseId) -> Result<Vec<Balance>> {
        let table = self.table.read().await;
        Ok(table
            .rows
            .values()
            .filter(|b| b.expense_id == expense)
            .cloned()
            .collect())
    }

    async fn delete_by_expense(&self, expense: ExpenseId) -> Result<()> {
        let mut table = self.table.write().await;
        table.rows.retain(|_, b| b.expense_id != expense);
        Ok(())
    }

    async fn all(&self) -> Result<Vec<Balance>> {
        let table = self.table.read().await;
        Ok(table.rows.values().cloned().collect())
    }
}

/// A thread-safe in-memory store for expenses.
#[derive(Default, Clone)]
pub struct InMemoryExpenseStore {
    table: Arc<RwLock<Table<ExpenseId, Expense>>>,
}

impl InMemoryExpenseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExpenseStore for InMemoryExpenseStore {
    async fn create(&self, expense: NewExpense) -> Result<Expense> {
        let mut table = self.table.write().await;
        let expense = expense.into_expense(ExpenseId(table.next_id()));
        table.rows.insert(expense.id, expense.clone());
        Ok(expense)
    }

    async fn get(&self, id: ExpenseId) -> Result<Option<Expense>> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn delete(&self, id: ExpenseId) -> Result<()> {
        self.table
            .write()
            .await
            .rows
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| LedgerError::NotFound(format!("expense {}", id)))
    }

    async fn list_by_creator(&self, creator: UserId, page: Page) -> Result<Vec<Expense>> {
        let table = self.table.read().await;
        Ok(paginate(
            table
                .rows
                .values()
                .filter(|e| e.creator_id == creator)
                .cloned(),
            page,
        ))
    }
}

#[derive(Default)]
struct Directory {
    users: Table<UserId, User>,
    by_phone: HashMap<PhoneNumber, UserId>,
}

impl Directory {
    fn find_or_insert(&mut self, phone: &PhoneNumber) -> UserId {
        if let Some(id) = self.by_phone.get(phone) {
            return *id;
        }
        let id = UserId(self.users.next_id());
        self.users.rows.insert(
            id,
            User {
                id,
                phone: phone.clone(),
                registration: Registration::Unregistered,
            },
        );
        self.by_phone.insert(phone.clone(), id);
        id
    }
}

/// In-memory user directory keyed by id and by phone number.
#[derive(Default, Clone)]
pub struct InMemoryUserDirectory {
    directory: Arc<RwLock<Directory>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn resolve(&self, contacts: &[ContactRef]) -> Result<HashMap<ContactRef, UserId>> {
        let mut directory = self.directory.write().await;
        for contact in contacts {
            if let ContactRef::User(id) = contact
                && !directory.users.rows.contains_key(id)
            {
                return Err(LedgerError::NotFound(contact.to_string()));
            }
        }

        let mut resolved = HashMap::with_capacity(contacts.len());
        for contact in contacts {
            let id = match contact {
                ContactRef::User(id) => *id,
                ContactRef::Phone(phone) => directory.find_or_insert(phone),
            };
            resolved.insert(contact.clone(), id);
        }
        Ok(resolved)
    }

    async fn get(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.directory.read().await.users.rows.get(&id).cloned())
    }

    async fn register(&self, phone: PhoneNumber) -> Result<User> {
        let mut directory = self.directory.write().await;
        let id = directory.find_or_insert(&phone);
        let user = directory
            .users
            .rows
            .get_mut(&id)
            .ok_or_else(|| LedgerError::NotFound(format!("user {}", id)))?;
        user.registration = Registration::Registered;
        Ok(user.clone())
    }
}
