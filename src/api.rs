use std::net::IpAddr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    access::UserId,
    account::{Account, AccountNumber, AccountType},
    audit::AuditEvent,
    transaction::{Transaction, TransactionId, TransactionStatus},
};

pub const TRANSFER_COMPLETED: &str = "Transfer completed successfully.";

#[derive(Debug, Clone, Deserialize)]
pub struct TransferRequest {
    pub from_account: Option<String>,
    pub to_account: Option<String>,
    pub amount: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferResponse {
    pub transaction_id: TransactionId,
    pub status: TransactionStatus,
    pub message: String,
}

impl From<&Transaction> for TransferResponse {
    fn from(transaction: &Transaction) -> Self {
        Self {
            transaction_id: transaction.id(),
            status: transaction.status(),
            message: TRANSFER_COMPLETED.to_owned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAccountRequest {
    pub account_type: Option<AccountType>,
    pub initial_deposit: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountView {
    pub account_number: AccountNumber,
    pub account_type: AccountType,
    pub balance: Decimal,
}

impl From<&Account> for AccountView {
    fn from(account: &Account) -> Self {
        Self {
            account_number: account.number().clone(),
            account_type: account.account_type(),
            balance: account.balance(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AuditEntryView {
    pub user_id: Option<UserId>,
    pub action: String,
    pub ip_address: Option<IpAddr>,
    pub timestamp: DateTime<Utc>,
}

impl From<AuditEvent> for AuditEntryView {
    fn from(event: AuditEvent) -> Self {
        Self {
            user_id: event.actor,
            action: event.action,
            ip_address: event.origin,
            timestamp: event.timestamp,
        }
    }
}
