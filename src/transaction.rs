use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::account::AccountNumber;

pub type TransactionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Success,
    Failed,
}

/// Business rule that stopped a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("Sender account not found.")]
    SenderNotFound,
    #[error("Recipient account not found.")]
    RecipientNotFound,
    #[error("Insufficient funds.")]
    InsufficientFunds,
    #[error("Daily limit exceeded.")]
    DailyLimitExceeded,
}

impl RejectReason {
    /// Machine readable reason reported to callers.
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::SenderNotFound => "sender_not_found",
            RejectReason::RecipientNotFound => "recipient_not_found",
            RejectReason::InsufficientFunds => "insufficient_funds",
            RejectReason::DailyLimitExceeded => "daily_limit_exceeded",
        }
    }
}

/// Immutable record of one transfer attempt.
///
/// A successful record always references both accounts, a failed one carries
/// the reason and whatever accounts were resolved before the rejection.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    id: TransactionId,
    from_account: Option<AccountNumber>,
    to_account: Option<AccountNumber>,
    amount: Decimal,
    status: TransactionStatus,
    reason: Option<RejectReason>,
    timestamp: DateTime<Utc>,
}

impl Transaction {
    pub fn succeeded(
        from_account: AccountNumber,
        to_account: AccountNumber,
        amount: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            from_account: Some(from_account),
            to_account: Some(to_account),
            amount,
            status: TransactionStatus::Success,
            reason: None,
            timestamp,
        }
    }

    pub fn failed(
        from_account: Option<AccountNumber>,
        to_account: Option<AccountNumber>,
        amount: Decimal,
        reason: RejectReason,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            from_account,
            to_account,
            amount,
            status: TransactionStatus::Failed,
            reason: Some(reason),
            timestamp,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn from_account(&self) -> Option<&AccountNumber> {
        self.from_account.as_ref()
    }

    pub fn to_account(&self) -> Option<&AccountNumber> {
        self.to_account.as_ref()
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status == TransactionStatus::Success
    }

    pub fn reason(&self) -> Option<RejectReason> {
        self.reason
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn failed_record_keeps_reason_and_resolved_accounts() {
        let tx = Transaction::failed(
            Some(AccountNumber::from("111111111111")),
            None,
            dec!(10.00),
            RejectReason::RecipientNotFound,
            Utc::now(),
        );
        assert_eq!(tx.status(), TransactionStatus::Failed);
        assert!(!tx.is_success());
        assert_eq!(tx.reason(), Some(RejectReason::RecipientNotFound));
        assert_eq!(tx.from_account().unwrap().as_str(), "111111111111");
        assert!(tx.to_account().is_none());
    }

    #[test]
    fn records_get_distinct_ids() {
        let now = Utc::now();
        let a = Transaction::succeeded("1".into(), "2".into(), dec!(1), now);
        let b = Transaction::succeeded("1".into(), "2".into(), dec!(1), now);
        assert_ne!(a.id(), b.id());
        assert!(a.reason().is_none());
    }

    #[test]
    fn reason_codes_and_messages() {
        assert_eq!(RejectReason::InsufficientFunds.code(), "insufficient_funds");
        assert_eq!(
            RejectReason::DailyLimitExceeded.to_string(),
            "Daily limit exceeded."
        );
        assert_eq!(RejectReason::SenderNotFound.code(), "sender_not_found");
    }
}
