use std::{
    collections::{BTreeSet, HashMap},
    sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::{
    access::UserId,
    account::{Account, AccountNumber},
    transaction::{Transaction, TransactionId},
};

use super::{
    AccountStore, LedgerStore, NewAccount, StoreError, TransactionLedger, TransferHistory,
    UnitOfWork,
};

pub const DEFAULT_ALLOCATION_ATTEMPTS: usize = 8;

type NumberSource = Box<dyn Fn() -> AccountNumber + Send + Sync>;

#[derive(Default)]
struct Tables {
    accounts: HashMap<AccountNumber, Account>,
    transactions: Vec<Transaction>,
    by_id: HashMap<TransactionId, usize>,
    /// (source account) -> (timestamp, position in `transactions`)
    outgoing: HashMap<AccountNumber, BTreeSet<(DateTime<Utc>, usize)>>,
}

impl Tables {
    fn push(&mut self, transaction: Transaction) {
        let position = self.transactions.len();
        self.by_id.insert(transaction.id(), position);
        if let Some(source) = transaction.from_account() {
            self.outgoing
                .entry(source.clone())
                .or_default()
                .insert((transaction.timestamp(), position));
        }
        self.transactions.push(transaction);
    }

    fn transferred_between(
        &self,
        account: &AccountNumber,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Decimal {
        let Some(index) = self.outgoing.get(account) else {
            return Decimal::ZERO;
        };
        index
            .range((start, 0)..(end, 0))
            .map(|(_, position)| &self.transactions[*position])
            .filter(|tx| tx.is_success())
            .map(Transaction::amount)
            .sum()
    }
}

/// Process-local ledger storage.
///
/// Writers serialize on per-account row locks, taken in ascending account
/// number order. Committed state lives behind a single table lock, so a
/// reader never sees half of a commit.
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    row_locks: Mutex<HashMap<AccountNumber, Arc<Mutex<()>>>>,
    next_number: NumberSource,
    allocation_attempts: usize,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOCATION_ATTEMPTS)
    }
}

impl InMemoryStore {
    pub fn new(allocation_attempts: usize) -> Self {
        Self::with_number_source(allocation_attempts, AccountNumber::generate)
    }

    pub fn with_number_source<F>(allocation_attempts: usize, source: F) -> Self
    where
        F: Fn() -> AccountNumber + Send + Sync + 'static,
    {
        Self {
            tables: RwLock::default(),
            row_locks: Mutex::default(),
            next_number: Box::new(source),
            allocation_attempts,
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|err| StoreError::Unavailable(err.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|err| StoreError::Unavailable(err.to_string()))
    }

    /// Row locks for `accounts`, sorted and deduplicated.
    fn row_locks_for(&self, accounts: &[&AccountNumber]) -> Vec<Arc<Mutex<()>>> {
        let mut numbers = accounts.to_vec();
        numbers.sort();
        numbers.dedup();
        let mut registry = self
            .row_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        numbers
            .into_iter()
            .map(|number| registry.entry(number.clone()).or_default().clone())
            .collect()
    }
}

impl TransferHistory for InMemoryStore {
    fn transferred_between(
        &self,
        account: &AccountNumber,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Decimal, StoreError> {
        Ok(self.read()?.transferred_between(account, start, end))
    }
}

impl AccountStore for InMemoryStore {
    fn get_by_number(&self, number: &AccountNumber) -> Result<Option<Account>, StoreError> {
        Ok(self.read()?.accounts.get(number).cloned())
    }

    fn get_by_number_for_user(
        &self,
        number: &AccountNumber,
        owner: UserId,
    ) -> Result<Option<Account>, StoreError> {
        Ok(self
            .read()?
            .accounts
            .get(number)
            .filter(|account| account.owner() == owner)
            .cloned())
    }

    fn accounts_for_user(&self, owner: UserId) -> Result<Vec<Account>, StoreError> {
        let mut accounts: Vec<Account> = self
            .read()?
            .accounts
            .values()
            .filter(|account| account.owner() == owner)
            .cloned()
            .collect();
        accounts.sort_by(|a, b| {
            (a.created_at(), a.number()).cmp(&(b.created_at(), b.number()))
        });
        Ok(accounts)
    }

    fn create(&self, new: NewAccount) -> Result<Account, StoreError> {
        let mut tables = self.write()?;
        for attempt in 1..=self.allocation_attempts {
            let number = (self.next_number)();
            if tables.accounts.contains_key(&number) {
                warn!(%number, attempt, "Account number already allocated, drawing another");
                continue;
            }
            let account = Account::open(
                number.clone(),
                new.owner,
                new.account_type,
                new.balance,
                new.created_at,
            );
            tables.accounts.insert(number, account.clone());
            return Ok(account);
        }
        Err(StoreError::AccountNumbersExhausted {
            attempts: self.allocation_attempts,
        })
    }
}

impl TransactionLedger for InMemoryStore {
    fn append(&self, transaction: Transaction) -> Result<(), StoreError> {
        self.write()?.push(transaction);
        Ok(())
    }

    fn get(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .by_id
            .get(&id)
            .map(|position| tables.transactions[*position].clone()))
    }

    fn for_account(&self, account: &AccountNumber) -> Result<Vec<Transaction>, StoreError> {
        Ok(self
            .read()?
            .transactions
            .iter()
            .filter(|tx| tx.from_account() == Some(account) || tx.to_account() == Some(account))
            .cloned()
            .collect())
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.transactions.len())
    }
}

impl LedgerStore for InMemoryStore {
    fn with_transaction<R, E, F>(&self, accounts: &[&AccountNumber], work: F) -> Result<R, E>
    where
        F: FnOnce(&mut dyn UnitOfWork) -> Result<R, E>,
        E: From<StoreError>,
    {
        let rows = self.row_locks_for(accounts);
        // a poisoned row lock guards no data, staged writes of the panicking unit were dropped
        let _held: Vec<MutexGuard<'_, ()>> = rows
            .iter()
            .map(|row| row.lock().unwrap_or_else(PoisonError::into_inner))
            .collect();

        let staged: HashMap<AccountNumber, Account> = {
            let tables = self.read()?;
            accounts
                .iter()
                .filter_map(|number| tables.accounts.get(*number))
                .map(|account| (account.number().clone(), account.clone()))
                .collect()
        };
        let mut unit = InMemoryUnit {
            store: self,
            staged,
            pending: Vec::new(),
        };
        let output = work(&mut unit)?;

        let InMemoryUnit {
            staged, pending, ..
        } = unit;
        let mut tables = self.write()?;
        debug!(
            accounts = staged.len(),
            transactions = pending.len(),
            "Committing unit of work"
        );
        tables.accounts.extend(staged);
        for transaction in pending {
            tables.push(transaction);
        }
        Ok(output)
    }
}

struct InMemoryUnit<'s> {
    store: &'s InMemoryStore,
    staged: HashMap<AccountNumber, Account>,
    pending: Vec<Transaction>,
}

impl TransferHistory for InMemoryUnit<'_> {
    fn transferred_between(
        &self,
        account: &AccountNumber,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Decimal, StoreError> {
        let committed = self.store.transferred_between(account, start, end)?;
        let staged: Decimal = self
            .pending
            .iter()
            .filter(|tx| tx.is_success() && tx.from_account() == Some(account))
            .filter(|tx| tx.timestamp() >= start && tx.timestamp() < end)
            .map(Transaction::amount)
            .sum();
        Ok(committed + staged)
    }
}

impl UnitOfWork for InMemoryUnit<'_> {
    fn account(&self, number: &AccountNumber) -> Result<&Account, StoreError> {
        self.staged
            .get(number)
            .ok_or_else(|| StoreError::AccountNotLocked(number.clone()))
    }

    fn apply_delta(
        &mut self,
        number: &AccountNumber,
        delta: Decimal,
    ) -> Result<&Account, StoreError> {
        let account = self
            .staged
            .get_mut(number)
            .ok_or_else(|| StoreError::AccountNotLocked(number.clone()))?;
        account.apply_delta(delta)?;
        Ok(account)
    }

    fn append_transaction(&mut self, transaction: Transaction) {
        self.pending.push(transaction);
    }
}
