use crate::domain::balance::{Balance, NewBalance};
use crate::domain::expense::{Expense, NewExpense};
use crate::domain::ids::{BalanceId, ExpenseId, UserId};
use crate::domain::ports::{ExpenseStore, LedgerStore, Page, UserDirectory};
use crate::domain::user::{ContactRef, PhoneNumber, Registration, User};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for balances, keyed by big-endian balance id.
pub const CF_BALANCES: &str = "balances";
/// Column Family for expenses, keyed by big-endian expense id.
pub const CF_EXPENSES: &str = "expenses";
/// Column Family for users, keyed by big-endian user id.
pub const CF_USERS: &str = "users";
/// Column Family mapping normalized phone numbers to user ids.
pub const CF_PHONES: &str = "phones";
/// Column Family holding the id sequences.
pub const CF_META: &str = "meta";

const BALANCE_SEQ: &[u8] = b"balance_seq";
const EXPENSE_SEQ: &[u8] = b"expense_seq";
const USER_SEQ: &[u8] = b"user_seq";

impl From<rocksdb::Error> for LedgerError {
    fn from(e: rocksdb::Error) -> Self {
        LedgerError::InternalError(Box::new(e))
    }
}

fn corrupted(what: &str) -> LedgerError {
    LedgerError::InternalError(Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("corrupted {}", what),
    )))
}

fn decode_u64(bytes: &[u8]) -> Result<u64> {
    let raw: [u8; 8] = bytes.try_into().map_err(|_| corrupted("id"))?;
    Ok(u64::from_be_bytes(raw))
}

/// A persistent store implementing every ledger port on one RocksDB instance.
///
/// Each entity lives in its own Column Family. Writes that read before they
/// write (sequences, version checks) are serialized through `write_lock`;
/// multi-key writes go through a single `WriteBatch` so they land atomically.
///
/// `Clone` shares the underlying `Arc<DB>`.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at `path`, creating missing column families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = [CF_BALANCES, CF_EXPENSES, CF_USERS, CF_PHONES, CF_META]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, families)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            LedgerError::InternalError(Box::new(std::io::Error::other(format!(
                "{} column family not found",
                name
            ))))
        })
    }

    fn get_json<T: DeserializeOwned>(&self, family: &str, key: &[u8]) -> Result<Option<T>> {
        match self.db.get_cf(self.cf(family)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(
        &self,
        batch: &mut WriteBatch,
        family: &str,
        key: &[u8],
        value: &T,
    ) -> Result<()> {
        batch.put_cf(self.cf(family)?, key, serde_json::to_vec(value)?);
        Ok(())
    }

    /// Deserializes every value of a column family, in key order.
    fn scan<T: DeserializeOwned>(&self, family: &str) -> Result<Vec<T>> {
        self.db
            .iterator_cf(self.cf(family)?, IteratorMode::Start)
            .map(|item| -> Result<T> {
                let (_key, value) = item?;
                Ok(serde_json::from_slice(&value)?)
            })
            .collect()
    }

    fn current_seq(&self, key: &[u8]) -> Result<u64> {
        match self.db.get_cf(self.cf(CF_META)?, key)? {
            Some(bytes) => decode_u64(&bytes),
            None => Ok(0),
        }
    }

    fn user_by_phone(&self, phone: &PhoneNumber) -> Result<Option<UserId>> {
        match self.db.get_cf(self.cf(CF_PHONES)?, phone.as_str().as_bytes())? {
            Some(bytes) => Ok(Some(UserId(decode_u64(&bytes)?))),
            None => Ok(None),
        }
    }

    /// Stages a new unregistered user in `batch`. Caller holds `write_lock`.
    fn stage_user(&self, batch: &mut WriteBatch, id: UserId, phone: &PhoneNumber) -> Result<User> {
        let user = User {
            id,
            phone: phone.clone(),
            registration: Registration::Unregistered,
        };
        self.put_json(batch, CF_USERS, &id.0.to_be_bytes(), &user)?;
        batch.put_cf(
            self.cf(CF_PHONES)?,
            phone.as_str().as_bytes(),
            id.0.to_be_bytes(),
        );
        batch.put_cf(self.cf(CF_META)?, USER_SEQ, id.0.to_be_bytes());
        Ok(user)
    }
}

#[async_trait]
impl LedgerStore for RocksDBStore {
    async fn create_batch(&self, balances: Vec<NewBalance>) -> Result<Vec<Balance>> {
        if let Some(first) = balances.first()
            && balances.iter().any(|b| b.expense_id != first.expense_id)
        {
            return Err(LedgerError::InvariantViolation(
                "a batch must belong to a single expense".to_string(),
            ));
        }

        let _guard = self.write_lock.lock().await;
        let mut seq = self.current_seq(BALANCE_SEQ)?;
        let mut batch = WriteBatch::default();
        let mut created = Vec::with_capacity(balances.len());
        for new in balances {
            seq += 1;
            let balance = new.into_balance(BalanceId(seq));
            self.put_json(&mut batch, CF_BALANCES, &seq.to_be_bytes(), &balance)?;
            created.push(balance);
        }
        batch.put_cf(self.cf(CF_META)?, BALANCE_SEQ, seq.to_be_bytes());
        self.db.write(batch)?;
        Ok(created)
    }

    async fn get(&self, id: BalanceId, requesting_user: UserId) -> Result<Option<Balance>> {
        let balance: Option<Balance> = self.get_json(CF_BALANCES, &id.0.to_be_bytes())?;
        Ok(balance.filter(|b| b.party_of(requesting_user).is_some()))
    }

    async fn update(&self, mut balance: Balance) -> Result<Balance> {
        let _guard = self.write_lock.lock().await;
        let key = balance.id.0.to_be_bytes();
        let stored: Balance = self
            .get_json(CF_BALANCES, &key)?
            .ok_or_else(|| LedgerError::NotFound(format!("balance {}", balance.id)))?;
        if stored.version != balance.version {
            return Err(LedgerError::VersionConflict {
                id: balance.id,
                expected: balance.version,
                found: stored.version,
            });
        }
        balance.version += 1;
        self.db
            .put_cf(self.cf(CF_BALANCES)?, key, serde_json::to_vec(&balance)?)?;
        Ok(balance)
    }

    async fn delete(&self, id: BalanceId) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let cf = self.cf(CF_BALANCES)?;
        let key = id.0.to_be_bytes();
        if self.db.get_pinned_cf(cf, key)?.is_none() {
            return Err(LedgerError::NotFound(format!("balance {}", id)));
        }
        self.db.delete_cf(cf, key)?;
        Ok(())
    }

    async fn list_by_user(&self, user: UserId, page: Page) -> Result<Vec<Balance>> {
        Ok(self
            .scan::<Balance>(CF_BALANCES)?
            .into_iter()
            .filter(|b| b.party_of(user).is_some())
            .skip(page.offset())
            .take(page.limit())
            .collect())
    }

    async fn list_by_expense(&self, expense: ExpenseId) -> Result<Vec<Balance>> {
        Ok(self
            .scan::<Balance>(CF_BALANCES)?
            .into_iter()
            .filter(|b| b.expense_id == expense)
            .collect())
    }

    async fn delete_by_expense(&self, expense: ExpenseId) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let cf = self.cf(CF_BALANCES)?;
        let mut batch = WriteBatch::default();
        for balance in self.scan::<Balance>(CF_BALANCES)? {
            if balance.expense_id == expense {
                batch.delete_cf(cf, balance.id.0.to_be_bytes());
            }
        }
        self.db.write(batch)?;
        Ok(())
    }

    async fn all(&self) -> Result<Vec<Balance>> {
        self.scan(CF_BALANCES)
    }
}

#[async_trait]
impl ExpenseStore for RocksDBStore {
    async fn create(&self, expense: NewExpense) -> Result<Expense> {
        let _guard = self.write_lock.lock().await;
        let id = self.current_seq(EXPENSE_SEQ)? + 1;
        let expense = expense.into_expense(ExpenseId(id));
        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_EXPENSES, &id.to_be_bytes(), &expense)?;
        batch.put_cf(self.cf(CF_META)?, EXPENSE_SEQ, id.to_be_bytes());
        self.db.write(batch)?;
        Ok(expense)
    }

    async fn get(&self, id: ExpenseId) -> Result<Option<Expense>> {
        self.get_json(CF_EXPENSES, &id.0.to_be_bytes())
    }

    async fn delete(&self, id: ExpenseId) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let cf = self.cf(CF_EXPENSES)?;
        let key = id.0.to_be_bytes();
        if self.db.get_pinned_cf(cf, key)?.is_none() {
            return Err(LedgerError::NotFound(format!("expense {}", id)));
        }
        self.db.delete_cf(cf, key)?;
        Ok(())
    }

    async fn list_by_creator(&self, creator: UserId, page: Page) -> Result<Vec<Expense>> {
        Ok(self
            .scan::<Expense>(CF_EXPENSES)?
            .into_iter()
            .filter(|e| e.creator_id == creator)
            .skip(page.offset())
            .take(page.limit())
            .collect())
    }
}

#[async_trait]
impl UserDirectory for RocksDBStore {
    async fn resolve(&self, contacts: &[ContactRef]) -> Result<HashMap<ContactRef, UserId>> {
        let _guard = self.write_lock.lock().await;
        let users = self.cf(CF_USERS)?;
        for contact in contacts {
            if let ContactRef::User(id) = contact
                && self.db.get_pinned_cf(users, id.0.to_be_bytes())?.is_none()
            {
                return Err(LedgerError::NotFound(contact.to_string()));
            }
        }

        let mut seq = self.current_seq(USER_SEQ)?;
        let mut batch = WriteBatch::default();
        let mut staged: HashMap<PhoneNumber, UserId> = HashMap::new();
        let mut resolved = HashMap::with_capacity(contacts.len());
        for contact in contacts {
            let id = match contact {
                ContactRef::User(id) => *id,
                ContactRef::Phone(phone) => match self.user_by_phone(phone)? {
                    Some(id) => id,
                    None => match staged.get(phone) {
                        Some(id) => *id,
                        None => {
                            seq += 1;
                            let user = self.stage_user(&mut batch, UserId(seq), phone)?;
                            staged.insert(phone.clone(), user.id);
                            user.id
                        }
                    },
                },
            };
            resolved.insert(contact.clone(), id);
        }
        self.db.write(batch)?;
        Ok(resolved)
    }

    async fn get(&self, id: UserId) -> Result<Option<User>> {
        self.get_json(CF_USERS, &id.0.to_be_bytes())
    }

    async fn register(&self, phone: PhoneNumber) -> Result<User> {
        let _guard = self.write_lock.lock().await;
        let mut batch = WriteBatch::default();
        let mut user = match self.user_by_phone(&phone)? {
            Some(id) => self
                .get_json::<User>(CF_USERS, &id.0.to_be_bytes())?
                .ok_or_else(|| corrupted("phone index"))?,
            None => {
                let id = UserId(self.current_seq(USER_SEQ)? + 1);
                self.stage_user(&mut batch, id, &phone)?
            }
        };
        user.registration = Registration::Registered;
        self.put_json(&mut batch, CF_USERS, &user.id.0.to_be_bytes(), &user)?;
        self.db.write(batch)?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::balance::ConsentState;
    use chrono::Utc;
    use tempfile::tempdir;

    fn new_balance(expense: u64, creditor: u64, debtor: u64, amount: u64) -> NewBalance {
        NewBalance::new(
            ExpenseId(expense),
            UserId(creditor),
            UserId(debtor),
            amount,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_rocksdb_open_cf() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).expect("Failed to open RocksDB");

        for name in [CF_BALANCES, CF_EXPENSES, CF_USERS, CF_PHONES, CF_META] {
            assert!(store.db.cf_handle(name).is_some());
        }
    }

    #[tokio::test]
    async fn test_rocksdb_balances_survive_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = RocksDBStore::open(dir.path()).unwrap();
            let created = store
                .create_batch(vec![new_balance(1, 1, 2, 500)])
                .await
                .unwrap();
            let mut balance = created[0].clone();
            balance.creditor = ConsentState::Accepted;
            store.update(balance).await.unwrap();
        }

        let store = RocksDBStore::open(dir.path()).unwrap();
        let balance = LedgerStore::get(&store, BalanceId(1), UserId(2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(balance.creditor, ConsentState::Accepted);
        assert_eq!(balance.version, 1);

        let next = store
            .create_batch(vec![new_balance(2, 1, 3, 100)])
            .await
            .unwrap();
        assert_eq!(next[0].id, BalanceId(2));
    }

    #[tokio::test]
    async fn test_rocksdb_update_checks_version() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        let created = store
            .create_batch(vec![new_balance(1, 1, 2, 500)])
            .await
            .unwrap();

        store.update(created[0].clone()).await.unwrap();
        assert!(matches!(
            store.update(created[0].clone()).await,
            Err(LedgerError::VersionConflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_rocksdb_expenses_and_cascade() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        let expense = ExpenseStore::create(
            &store,
            NewExpense {
                creator_id: UserId(1),
                name: "Dinner".to_string(),
                description: String::new(),
                total_amount: 1000,
                created_at: Utc::now(),
            },
        )
        .await
        .unwrap();
        store
            .create_batch(vec![new_balance(expense.id.0, 1, 2, 500)])
            .await
            .unwrap();

        store.delete_by_expense(expense.id).await.unwrap();
        ExpenseStore::delete(&store, expense.id).await.unwrap();
        assert!(LedgerStore::all(&store).await.unwrap().is_empty());
        assert!(ExpenseStore::get(&store, expense.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rocksdb_directory() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        let phone = PhoneNumber::parse("+15550009999").unwrap();
        let contact = ContactRef::Phone(phone.clone());

        let resolved = store
            .resolve(&[contact.clone(), contact.clone()])
            .await
            .unwrap();
        let id = resolved[&contact];
        let placeholder = UserDirectory::get(&store, id).await.unwrap().unwrap();
        assert!(!placeholder.is_registered());

        let user = store.register(phone).await.unwrap();
        assert_eq!(user.id, id);
        assert!(user.is_registered());

        assert!(
            store
                .resolve(&[ContactRef::User(UserId(99))])
                .await
                .is_err()
        );
    }
}
