use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::access::UserId;

/// Number of digits in a generated account number.
pub const ACCOUNT_NUMBER_DIGITS: usize = 12;

const ACCOUNT_NUMBER_MODULUS: u128 = 1_000_000_000_000;

/// Externally visible account identifier.
///
/// Generated numbers are always [`ACCOUNT_NUMBER_DIGITS`] digits long, but any
/// string supplied by a caller can be used for a lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountNumber(String);

impl AccountNumber {
    /// Draws a fresh 12-digit number from a random UUID.
    pub fn generate() -> Self {
        let value = Uuid::new_v4().as_u128() % ACCOUNT_NUMBER_MODULUS;
        Self(format!("{value:0width$}", width = ACCOUNT_NUMBER_DIGITS))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountNumber {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for AccountNumber {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Savings,
    Current,
    #[serde(rename = "fd")]
    FixedDeposit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccountError {
    #[error("Insufficient funds: balance {balance} cannot cover {requested}")]
    InsufficientFunds { balance: Decimal, requested: Decimal },
    #[error("Balance of account {0} would overflow")]
    BalanceOverflow(AccountNumber),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    number: AccountNumber,
    owner: UserId,
    account_type: AccountType,
    balance: Decimal,
    created_at: DateTime<Utc>,
}

impl Account {
    pub fn open(
        number: AccountNumber,
        owner: UserId,
        account_type: AccountType,
        balance: Decimal,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            number,
            owner,
            account_type,
            balance,
            created_at,
        }
    }

    pub fn number(&self) -> &AccountNumber {
        &self.number
    }

    pub fn owner(&self) -> UserId {
        self.owner
    }

    pub fn account_type(&self) -> AccountType {
        self.account_type
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Moves the balance by `delta`, refusing any change that would leave it negative.
    /// The account is untouched when an error is returned.
    pub fn apply_delta(&mut self, delta: Decimal) -> Result<(), AccountError> {
        let balance = self
            .balance
            .checked_add(delta)
            .ok_or_else(|| AccountError::BalanceOverflow(self.number.clone()))?;
        if balance < Decimal::ZERO {
            return Err(AccountError::InsufficientFunds {
                balance: self.balance,
                requested: -delta,
            });
        }
        self.balance = balance;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::prelude::Zero;
    use rust_decimal_macros::dec;

    use super::*;

    fn account(balance: Decimal) -> Account {
        Account::open(
            AccountNumber::from("100000000001"),
            7,
            AccountType::Savings,
            balance,
            Utc::now(),
        )
    }

    #[test]
    fn generated_numbers_are_twelve_digits() {
        for _ in 0..64 {
            let number = AccountNumber::generate();
            assert_eq!(number.as_str().len(), ACCOUNT_NUMBER_DIGITS);
            assert!(number.as_str().chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn apply_deltas() {
        let mut acc = account(dec!(100.00));
        acc.apply_delta(dec!(25.50)).unwrap();
        assert_eq!(acc.balance(), dec!(125.50));
        acc.apply_delta(dec!(-125.50)).unwrap();
        assert_eq!(acc.balance(), Decimal::zero());
    }

    #[test]
    fn debit_beyond_balance_is_refused() {
        let mut acc = account(dec!(100.00));
        let err = acc.apply_delta(dec!(-150.00)).unwrap_err();
        assert_eq!(
            err,
            AccountError::InsufficientFunds {
                balance: dec!(100.00),
                requested: dec!(150.00),
            }
        );
        // state is kept as it was
        assert_eq!(acc.balance(), dec!(100.00));
    }

    #[test]
    fn overflow_is_reported() {
        let mut acc = account(Decimal::MAX);
        let err = acc.apply_delta(dec!(1)).unwrap_err();
        assert!(matches!(err, AccountError::BalanceOverflow(_)));
        assert_eq!(acc.balance(), Decimal::MAX);
    }

    #[test]
    fn account_type_wire_names() {
        let parsed: AccountType = serde_json::from_str("\"fd\"").unwrap();
        assert_eq!(parsed, AccountType::FixedDeposit);
        assert_eq!(
            serde_json::to_string(&AccountType::Savings).unwrap(),
            "\"savings\""
        );
    }
}
