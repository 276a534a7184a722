use crate::domain::balance::Balance;
use crate::domain::calculator;
use crate::domain::expense::{Expense, ExpenseRequest, NewExpense};
use crate::domain::ids::{BalanceId, ExpenseId, UserId};
use crate::domain::ports::{ExpenseStoreBox, LedgerStoreBox, Page, UserDirectoryBox};
use crate::domain::settlement::{self, DeletionDecision, Registrations};
use crate::domain::user::{PhoneNumber, Registration, User};
use crate::error::{LedgerError, Result};
use chrono::Utc;
use tracing::{debug, info, warn};

/// How many times a settlement action is re-applied after losing a race with
/// the other party on the same balance.
const MAX_ATTEMPTS: usize = 3;

/// Outcome of a deletion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionOutcome {
    /// The request was recorded; the other party has not asked yet.
    Pending(Balance),
    /// Both parties asked and the balance was removed.
    Deleted(BalanceId),
}

/// What a user is owed and owes across balances not yet confirmed as paid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserSummary {
    pub owed_to_user: u64,
    pub owed_by_user: u64,
}

impl UserSummary {
    pub fn net(&self) -> i128 {
        i128::from(self.owed_to_user) - i128::from(self.owed_by_user)
    }
}

/// The entry point for creating expenses and settling their balances.
///
/// `LedgerService` owns the storage backends and the user directory. The
/// split calculator and settlement state machine stay pure; this layer loads,
/// applies, and persists, re-applying an action when a concurrent update on
/// the same balance wins the version check.
pub struct LedgerService {
    balances: LedgerStoreBox,
    expenses: ExpenseStoreBox,
    users: UserDirectoryBox,
}

impl LedgerService {
    pub fn new(
        balances: LedgerStoreBox,
        expenses: ExpenseStoreBox,
        users: UserDirectoryBox,
    ) -> Self {
        Self {
            balances,
            expenses,
            users,
        }
    }

    pub async fn register_user(&self, phone: PhoneNumber) -> Result<User> {
        let user = self.users.register(phone).await?;
        info!(user = %user.id, "user registered");
        Ok(user)
    }

    pub async fn user(&self, id: UserId) -> Result<User> {
        self.users
            .get(id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("user {}", id)))
    }

    /// Validates the request, stores the expense and all of its balances.
    ///
    /// Contacts that are not users yet become unregistered placeholders. If
    /// the balances cannot be stored the expense record is removed again.
    pub async fn create_expense(
        &self,
        creator: UserId,
        request: ExpenseRequest,
    ) -> Result<(Expense, Vec<Balance>)> {
        let creator = self.user(creator).await?;
        request.validate(&creator)?;

        let ids = self.users.resolve(&request.contacts()).await?;
        let split = request.resolve(&ids)?;
        split.fair_share()?;

        let expense = self
            .expenses
            .create(NewExpense {
                creator_id: creator.id,
                name: request.name.trim().to_string(),
                description: request.description.clone(),
                total_amount: request.total()?,
                created_at: Utc::now(),
            })
            .await?;

        let stored = match calculator::compute(&split, expense.id) {
            Ok(computed) => self.balances.create_batch(computed).await,
            Err(e) => Err(e),
        };
        let balances = match stored {
            Ok(balances) => balances,
            Err(e) => {
                warn!(expense = %expense.id, error = %e, "discarding expense without balances");
                if let Err(cleanup) = self.expenses.delete(expense.id).await {
                    warn!(expense = %expense.id, error = %cleanup, "failed to discard expense");
                }
                return Err(e);
            }
        };

        info!(
            expense = %expense.id,
            creator = %creator.id,
            total = expense.total_amount,
            balances = balances.len(),
            "expense created"
        );
        Ok((expense, balances))
    }

    /// Removes an expense and every balance derived from it. Creator only.
    pub async fn delete_expense(&self, actor: UserId, expense_id: ExpenseId) -> Result<()> {
        let expense = self.expense(expense_id).await?;
        if expense.creator_id != actor {
            warn!(expense = %expense_id, actor = %actor, "expense deletion denied");
            return Err(LedgerError::ExpensePermissionDenied {
                actor,
                expense: expense_id,
            });
        }
        self.balances.delete_by_expense(expense_id).await?;
        self.expenses.delete(expense_id).await?;
        info!(expense = %expense_id, "expense deleted");
        Ok(())
    }

    pub async fn expense(&self, id: ExpenseId) -> Result<Expense> {
        self.expenses
            .get(id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("expense {}", id)))
    }

    pub async fn expenses_created_by(&self, creator: UserId, page: Page) -> Result<Vec<Expense>> {
        self.expenses.list_by_creator(creator, page).await
    }

    /// Balances of one expense, visible to its creator and to its parties.
    pub async fn expense_balances(
        &self,
        actor: UserId,
        expense_id: ExpenseId,
    ) -> Result<Vec<Balance>> {
        let expense = self.expense(expense_id).await?;
        let balances = self.balances.list_by_expense(expense_id).await?;
        let involved = expense.creator_id == actor
            || balances.iter().any(|b| b.party_of(actor).is_some());
        if !involved {
            return Err(LedgerError::ExpensePermissionDenied {
                actor,
                expense: expense_id,
            });
        }
        Ok(balances)
    }

    pub async fn balances_for(&self, user: UserId, page: Page) -> Result<Vec<Balance>> {
        self.balances.list_by_user(user, page).await
    }

    pub async fn balance(&self, id: BalanceId, actor: UserId) -> Result<Balance> {
        self.balances
            .get(id, actor)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("balance {}", id)))
    }

    pub async fn summary_for(&self, user: UserId) -> Result<UserSummary> {
        let balances = self.balances.list_by_user(user, Page::all()).await?;
        balances
            .iter()
            .filter(|b| !b.is_settled())
            .try_fold(UserSummary::default(), |mut acc, b| -> Result<UserSummary> {
                let side = if b.creditor_id == user {
                    &mut acc.owed_to_user
                } else {
                    &mut acc.owed_by_user
                };
                *side = side.checked_add(b.amount.value()).ok_or_else(|| {
                    LedgerError::InvariantViolation(format!("summary for user {} overflows", user))
                })?;
                Ok(acc)
            })
    }

    /// Every stored balance, for reporting.
    pub async fn all_balances(&self) -> Result<Vec<Balance>> {
        self.balances.all().await
    }

    pub async fn accept(&self, id: BalanceId, actor: UserId) -> Result<Balance> {
        self.mutate(id, actor, "accepted", |balance, registrations| {
            settlement::accept(balance, actor, registrations)
        })
        .await
    }

    pub async fn reject(&self, id: BalanceId, actor: UserId) -> Result<Balance> {
        self.mutate(id, actor, "rejected", |balance, registrations| {
            settlement::reject(balance, actor, registrations)
        })
        .await
    }

    pub async fn pay(&self, id: BalanceId, actor: UserId) -> Result<Balance> {
        self.mutate(id, actor, "paid", |balance, registrations| {
            settlement::pay(balance, actor, registrations.creditor)
        })
        .await
    }

    pub async fn accept_payment(&self, id: BalanceId, actor: UserId) -> Result<Balance> {
        self.mutate(id, actor, "payment accepted", |balance, registrations| {
            settlement::accept_payment(balance, actor, registrations.debtor)
        })
        .await
    }

    pub async fn request_deletion(&self, id: BalanceId, actor: UserId) -> Result<DeletionOutcome> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut balance = self.balance(id, actor).await?;
            let decision = settlement::request_deletion(&mut balance, actor)
                .inspect_err(|e| warn!(balance = %id, actor = %actor, error = %e, "deletion denied"))?;

            if decision == DeletionDecision::Proceed {
                self.balances.delete(id).await?;
                info!(balance = %id, "balance deleted by mutual request");
                return Ok(DeletionOutcome::Deleted(id));
            }

            match self.balances.update(balance).await {
                Ok(updated) => {
                    debug!(balance = %id, actor = %actor, "deletion requested");
                    return Ok(DeletionOutcome::Pending(updated));
                }
                Err(LedgerError::VersionConflict { .. }) if attempt < MAX_ATTEMPTS => {
                    warn!(balance = %id, attempt, "version conflict, retrying deletion request");
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn registration_of(&self, user: UserId) -> Result<Registration> {
        Ok(self.user(user).await?.registration)
    }

    async fn registrations(&self, balance: &Balance) -> Result<Registrations> {
        Ok(Registrations {
            creditor: self.registration_of(balance.creditor_id).await?,
            debtor: self.registration_of(balance.debtor_id).await?,
        })
    }

    async fn mutate<F>(
        &self,
        id: BalanceId,
        actor: UserId,
        transition: &'static str,
        apply: F,
    ) -> Result<Balance>
    where
        F: Fn(&mut Balance, Registrations) -> Result<()> + Send + Sync,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut balance = self.balance(id, actor).await?;
            let registrations = self.registrations(&balance).await?;
            apply(&mut balance, registrations).inspect_err(|e| {
                warn!(balance = %id, actor = %actor, error = %e, "settlement action rejected")
            })?;

            match self.balances.update(balance).await {
                Ok(updated) => {
                    debug!(balance = %id, actor = %actor, version = updated.version, "balance {}", transition);
                    return Ok(updated);
                }
                Err(LedgerError::VersionConflict { .. }) if attempt < MAX_ATTEMPTS => {
                    warn!(balance = %id, attempt, "version conflict, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }
}
