use std::sync::Arc;

use thiserror::Error;
use tracing::error;

use crate::{
    access::{self, AccessError, Capability, RequestContext, UserRegistry},
    api::{AuditEntryView, ErrorResponse},
    audit::{AuditError, AuditEvent, AuditSink},
    command::CommandError,
    limit::{Clock, LimitPolicy, SystemClock},
    store::{LedgerStore, StoreError},
    transaction::RejectReason,
};

pub mod onboarding;
pub mod provisioning;
pub mod transfer;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Rejected(#[from] RejectReason),
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("Internal error: {0}")]
    Internal(#[from] StoreError),
    #[error("Internal error: {0}")]
    Audit(#[from] AuditError),
}

impl LedgerError {
    /// Machine readable category of the failure.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::Rejected(reason) => reason.code(),
            LedgerError::Access(AccessError::Unauthenticated) => "unauthenticated",
            LedgerError::Access(AccessError::KycNotVerified) => "kyc_not_verified",
            LedgerError::Access(AccessError::Forbidden) => "forbidden",
            LedgerError::Access(AccessError::UnknownUser(_)) => "unknown_user",
            LedgerError::Access(AccessError::AlreadyRegistered(_)) => "already_registered",
            LedgerError::Command(_) => "invalid_request",
            LedgerError::Internal(_) | LedgerError::Audit(_) => "internal_error",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            LedgerError::Rejected(_)
            | LedgerError::Command(_)
            | LedgerError::Access(AccessError::AlreadyRegistered(_)) => 400,
            LedgerError::Access(AccessError::Unauthenticated) => 401,
            LedgerError::Access(AccessError::UnknownUser(_)) => 404,
            LedgerError::Access(_) => 403,
            LedgerError::Internal(_) | LedgerError::Audit(_) => 500,
        }
    }

    pub fn is_rejection(&self) -> bool {
        matches!(self, LedgerError::Rejected(_))
    }
}

impl From<&LedgerError> for ErrorResponse {
    fn from(err: &LedgerError) -> Self {
        Self {
            error: err.to_string(),
        }
    }
}

/// Entry point for every money-moving and account-creating operation.
///
/// Capability checks go through the [`UserRegistry`], every outcome is reported
/// to the [`AuditSink`], and state lives in the [`LedgerStore`].
pub struct LedgerProcessor<S> {
    store: Arc<S>,
    users: Arc<dyn UserRegistry>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    policy: LimitPolicy,
}

impl<S> LedgerProcessor<S>
where
    S: LedgerStore,
{
    pub fn new(
        store: Arc<S>,
        users: Arc<dyn UserRegistry>,
        audit: Arc<dyn AuditSink>,
        policy: LimitPolicy,
    ) -> Self {
        Self {
            store,
            users,
            audit,
            clock: Arc::new(SystemClock),
            policy,
        }
    }

    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        Self { clock, ..self }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn policy(&self) -> &LimitPolicy {
        &self.policy
    }

    /// Audit trail, newest first. Requires the auditor capability.
    pub fn audit_log(&self, ctx: &RequestContext) -> Result<Vec<AuditEntryView>, LedgerError> {
        access::require(self.users.as_ref(), ctx, Capability::Auditor)?;
        let events = self.audit.list()?;
        Ok(events.into_iter().map(AuditEntryView::from).collect())
    }

    /// Sink failures are logged and swallowed, the triggering operation stands.
    fn emit(&self, ctx: &RequestContext, action: String) {
        let event = AuditEvent {
            actor: ctx.actor,
            action,
            origin: ctx.origin,
            timestamp: self.clock.now(),
        };
        if let Err(err) = self.audit.record(event.clone()) {
            error!(
                %err,
                actor = ?event.actor,
                action = %event.action,
                "Failed to record audit event"
            );
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use chrono::{DateTime, FixedOffset, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::{
        access::{Role, UserDirectory, UserId},
        account::{Account, AccountType},
        audit::{AuditError, AuditEvent, AuditSink, InMemoryAuditLog},
        limit::{Clock, LimitPolicy, ManualClock},
        store::{AccountStore, NewAccount, in_memory::InMemoryStore},
    };

    use super::LedgerProcessor;

    pub(crate) struct Harness {
        pub processor: LedgerProcessor<InMemoryStore>,
        pub store: Arc<InMemoryStore>,
        pub directory: Arc<UserDirectory>,
        pub audit: Arc<InMemoryAuditLog>,
        pub clock: Arc<ManualClock>,
    }

    pub(crate) struct BrokenAuditSink;

    impl AuditSink for BrokenAuditSink {
        fn record(&self, _event: AuditEvent) -> Result<(), AuditError> {
            Err(AuditError::Unavailable("disk full".into()))
        }

        fn list(&self) -> Result<Vec<AuditEvent>, AuditError> {
            Err(AuditError::Unavailable("disk full".into()))
        }
    }

    pub(crate) fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    impl Harness {
        pub(crate) fn new() -> Self {
            let store = Arc::new(InMemoryStore::default());
            let directory = Arc::new(UserDirectory::default());
            let audit = Arc::new(InMemoryAuditLog::default());
            let clock = Arc::new(ManualClock::new(at("2024-06-01T10:00:00Z")));
            let policy = LimitPolicy::new(dec!(5000.00), FixedOffset::east_opt(0).unwrap());
            let processor =
                LedgerProcessor::new(store.clone(), directory.clone(), audit.clone(), policy)
                    .with_clock(clock.clone());
            Self {
                processor,
                store,
                directory,
                audit,
                clock,
            }
        }

        pub(crate) fn customer(&self, user: UserId) {
            self.directory.register(user, Role::Customer);
            self.directory.set_kyc_verified(user, true).unwrap();
        }

        pub(crate) fn admin(&self, user: UserId) {
            self.directory.register(user, Role::Admin);
        }

        /// Processor sharing this harness' state but auditing into a failing sink.
        pub(crate) fn without_audit(&self) -> LedgerProcessor<InMemoryStore> {
            LedgerProcessor::new(
                self.store.clone(),
                self.directory.clone(),
                Arc::new(BrokenAuditSink),
                *self.processor.policy(),
            )
            .with_clock(self.clock.clone())
        }

        /// Seeds an account directly in the store, bypassing the audit trail.
        pub(crate) fn account(&self, owner: UserId, balance: Decimal) -> Account {
            self.store
                .create(NewAccount {
                    owner,
                    account_type: AccountType::Savings,
                    balance,
                    created_at: self.now(),
                })
                .unwrap()
        }

        pub(crate) fn balance(&self, account: &Account) -> Decimal {
            self.store
                .get_by_number(account.number())
                .unwrap()
                .unwrap()
                .balance()
        }

        pub(crate) fn now(&self) -> DateTime<Utc> {
            self.clock.now()
        }
    }
}
