use super::command_reader::{Command, CommandType};
use crate::application::ledger::LedgerService;
use crate::domain::balance::Balance;
use crate::domain::expense::ExpenseRequest;
use crate::domain::ids::{BalanceId, UserId};
use crate::domain::money::Scale;
use crate::domain::user::{ContactRef, PhoneNumber};
use crate::error::{LedgerError, Result};
use std::collections::HashMap;
use tracing::debug;

fn missing(field: &str, command: &Command) -> LedgerError {
    LedgerError::InvalidCommand(format!("{:?} is missing {}", command.r#type, field))
}

/// Applies CSV commands to a [`LedgerService`].
///
/// `contribute` and `benefit` rows accumulate drafts keyed by their expense
/// label; `split` submits the draft. Everything else maps one-to-one onto a
/// service operation.
pub struct CommandRunner {
    service: LedgerService,
    scale: Scale,
    drafts: HashMap<String, ExpenseRequest>,
}

impl CommandRunner {
    pub fn new(service: LedgerService, scale: Scale) -> Self {
        Self {
            service,
            scale,
            drafts: HashMap::new(),
        }
    }

    pub fn service(&self) -> &LedgerService {
        &self.service
    }

    pub async fn apply(&mut self, command: Command) -> Result<()> {
        match command.r#type {
            CommandType::Register => {
                let raw = command
                    .phone
                    .as_deref()
                    .ok_or_else(|| missing("phone", &command))?;
                self.service.register_user(PhoneNumber::parse(raw)?).await?;
            }
            CommandType::Contribute => {
                let label = Self::label(&command)?;
                let contact = Self::contact(&command)?;
                let amount = command
                    .amount
                    .ok_or_else(|| missing("amount", &command))?;
                let minor = self.scale.to_minor(amount)?;
                let draft = self.take_draft(&label);
                self.drafts.insert(label, draft.contribute(contact, minor));
            }
            CommandType::Benefit => {
                let label = Self::label(&command)?;
                let contact = Self::contact(&command)?;
                let draft = self.take_draft(&label);
                self.drafts.insert(label, draft.benefit(contact));
            }
            CommandType::Split => {
                let label = Self::label(&command)?;
                let creator = Self::actor(&command)?;
                let draft = self
                    .drafts
                    .remove(&label)
                    .ok_or_else(|| LedgerError::NotFound(format!("expense draft '{}'", label)))?;
                self.service.create_expense(creator, draft).await?;
            }
            CommandType::Accept => {
                let (id, actor) = Self::target(&command)?;
                self.service.accept(id, actor).await?;
            }
            CommandType::Reject => {
                let (id, actor) = Self::target(&command)?;
                self.service.reject(id, actor).await?;
            }
            CommandType::Pay => {
                let (id, actor) = Self::target(&command)?;
                self.service.pay(id, actor).await?;
            }
            CommandType::AcceptPayment => {
                let (id, actor) = Self::target(&command)?;
                self.service.accept_payment(id, actor).await?;
            }
            CommandType::Delete => {
                let (id, actor) = Self::target(&command)?;
                self.service.request_deletion(id, actor).await?;
            }
        }
        debug!(command = ?command.r#type, "command applied");
        Ok(())
    }

    /// Drafts never submitted with `split` are dropped.
    pub async fn into_balances(self) -> Result<Vec<Balance>> {
        self.service.all_balances().await
    }

    fn take_draft(&mut self, label: &str) -> ExpenseRequest {
        self.drafts
            .remove(label)
            .unwrap_or_else(|| ExpenseRequest::new(label, ""))
    }

    fn label(command: &Command) -> Result<String> {
        command
            .expense
            .clone()
            .ok_or_else(|| missing("expense", command))
    }

    fn actor(command: &Command) -> Result<UserId> {
        command
            .user
            .map(UserId)
            .ok_or_else(|| missing("user", command))
    }

    fn contact(command: &Command) -> Result<ContactRef> {
        match (&command.phone, command.user) {
            (Some(phone), _) => Ok(ContactRef::Phone(PhoneNumber::parse(phone)?)),
            (None, Some(user)) => Ok(ContactRef::User(UserId(user))),
            (None, None) => Err(missing("user or phone", command)),
        }
    }

    fn target(command: &Command) -> Result<(BalanceId, UserId)> {
        let id = command
            .balance
            .map(BalanceId)
            .ok_or_else(|| missing("balance", command))?;
        Ok((id, Self::actor(command)?))
    }
}
