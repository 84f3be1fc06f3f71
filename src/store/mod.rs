use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
    access::UserId,
    account::{Account, AccountError, AccountNumber, AccountType},
    transaction::{Transaction, TransactionId},
};

pub mod in_memory;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("No free account number found after {attempts} attempts")]
    AccountNumbersExhausted { attempts: usize },
    #[error("Account {0} is not locked by this unit of work")]
    AccountNotLocked(AccountNumber),
    #[error(transparent)]
    Account(#[from] AccountError),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Fields of an account before a number has been allocated for it.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub owner: UserId,
    pub account_type: AccountType,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Read access to committed (and, inside a unit of work, staged) transfers.
pub trait TransferHistory {
    /// Sum of successful transfers out of `account` with `start <= timestamp < end`.
    fn transferred_between(
        &self,
        account: &AccountNumber,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Decimal, StoreError>;
}

pub trait AccountStore: Send + Sync {
    fn get_by_number(&self, number: &AccountNumber) -> Result<Option<Account>, StoreError>;

    fn get_by_number_for_user(
        &self,
        number: &AccountNumber,
        owner: UserId,
    ) -> Result<Option<Account>, StoreError>;

    /// Accounts of `owner`, oldest first.
    fn accounts_for_user(&self, owner: UserId) -> Result<Vec<Account>, StoreError>;

    /// Persists a new account under a freshly allocated, unused account number.
    fn create(&self, account: NewAccount) -> Result<Account, StoreError>;
}

/// Append-only transaction records.
pub trait TransactionLedger: TransferHistory + Send + Sync {
    fn append(&self, transaction: Transaction) -> Result<(), StoreError>;

    fn get(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError>;

    /// Records where `account` is source or destination, in insertion order.
    fn for_account(&self, account: &AccountNumber) -> Result<Vec<Transaction>, StoreError>;

    fn count(&self) -> Result<usize, StoreError>;
}

/// Writes staged against a set of locked accounts.
///
/// Nothing is visible to other readers until the unit commits, and a unit
/// that ends in an error or a panic leaves no trace.
pub trait UnitOfWork: TransferHistory {
    fn account(&self, number: &AccountNumber) -> Result<&Account, StoreError>;

    fn apply_delta(&mut self, number: &AccountNumber, delta: Decimal)
    -> Result<&Account, StoreError>;

    fn append_transaction(&mut self, transaction: Transaction);
}

pub trait LedgerStore: AccountStore + TransactionLedger {
    /// Runs `work` while holding exclusive locks on `accounts`, acquired in
    /// ascending account number order. Staged writes are committed together
    /// when `work` returns `Ok`, and discarded otherwise.
    fn with_transaction<R, E, F>(&self, accounts: &[&AccountNumber], work: F) -> Result<R, E>
    where
        F: FnOnce(&mut dyn UnitOfWork) -> Result<R, E>,
        E: From<StoreError>;
}
