//! Drives a [`LedgerProcessor`] from a CSV script, so the ledger can be
//! exercised end to end without an HTTP front.

use std::{
    io::{Read, Write},
    sync::Arc,
};

use anyhow::{Context, Result};
use thiserror::Error;

use crate::{
    access::{RequestContext, Role, UserDirectory},
    account::AccountNumber,
    api::{OpenAccountRequest, TransferRequest},
    audit::InMemoryAuditLog,
    config::LedgerConfig,
    processor::{LedgerError, LedgerProcessor},
    store::{AccountStore, in_memory::InMemoryStore},
};
use csv_parser::{CsvStepParser, Step, StepKind};
use csv_printer::{AccountRow, print_accounts};

pub mod csv_parser;
pub mod csv_printer;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Malformed row: {0}")]
    Parse(#[from] csv::Error),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("Column `{0}` is required for this step")]
    MissingField(&'static str),
    #[error("Label `{0}` is already bound to an account")]
    DuplicateLabel(String),
}

impl ScriptError {
    /// Business refusals, as opposed to problems with the script itself.
    pub fn is_rejection(&self) -> bool {
        matches!(self, ScriptError::Ledger(err) if err.is_rejection())
    }
}

pub struct Service<'w, R, W: 'w> {
    pub input: R,
    pub output: &'w mut W,
    pub config: LedgerConfig,
    pub error_printer: Box<dyn FnMut(u64, ScriptError)>,
}

impl<'w, R, W> Service<'w, R, W>
where
    R: Read,
    W: Write + 'w,
{
    pub fn run(mut self) -> Result<()> {
        let directory = Arc::new(UserDirectory::default());
        let store = Arc::new(InMemoryStore::new(self.config.account_number_attempts));
        let processor = LedgerProcessor::new(
            store.clone(),
            directory.clone(),
            Arc::new(InMemoryAuditLog::default()),
            self.config.limit_policy()?,
        );

        let mut labels = Vec::new();
        for (line, row) in CsvStepParser::new(self.input) {
            let applied = row
                .map_err(ScriptError::from)
                .and_then(|step| apply_step(&processor, &directory, &mut labels, step));
            if let Err(err) = applied {
                (self.error_printer)(line, err);
            }
        }

        let rows = labels
            .into_iter()
            .map(|(label, number)| -> Result<AccountRow> {
                let account = store
                    .get_by_number(&number)?
                    .with_context(|| format!("Account `{number}` vanished from the store"))?;
                Ok(AccountRow {
                    label,
                    account_number: number,
                    owner: account.owner(),
                    account_type: account.account_type(),
                    balance: account.balance(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        print_accounts(self.output, rows)
    }
}

fn apply_step(
    processor: &LedgerProcessor<InMemoryStore>,
    directory: &UserDirectory,
    labels: &mut Vec<(String, AccountNumber)>,
    step: Step,
) -> Result<(), ScriptError> {
    let origin = RequestContext::client_ip(step.origin.as_deref(), None);
    let ctx = RequestContext::user(step.user).with_origin(origin);
    match step.kind {
        StepKind::Register => match step.role.unwrap_or_default() {
            Role::Customer => processor.register_user(&ctx, step.user)?,
            // staff accounts are provisioned, not self-registered
            staff => directory.register(step.user, staff),
        },
        StepKind::Verify | StepKind::Reject => {
            let subject = step.subject.ok_or(ScriptError::MissingField("subject"))?;
            processor.review_kyc(&ctx, subject, step.kind == StepKind::Verify)?;
        }
        StepKind::Open => {
            let label = step.account.ok_or(ScriptError::MissingField("account"))?;
            if labels.iter().any(|(bound, _)| *bound == label) {
                return Err(ScriptError::DuplicateLabel(label));
            }
            let view = processor.submit_open_account(
                &ctx,
                &OpenAccountRequest {
                    account_type: step.account_type,
                    initial_deposit: step.amount,
                },
            )?;
            labels.push((label, view.account_number));
        }
        StepKind::Transfer => {
            let request = TransferRequest {
                from_account: step.account.map(|label| resolve_label(labels, label)),
                to_account: step.to.map(|label| resolve_label(labels, label)),
                amount: step.amount,
            };
            processor.submit_transfer(&ctx, &request)?;
        }
    }
    Ok(())
}

/// Unbound labels are passed through as literal account numbers.
fn resolve_label(labels: &[(String, AccountNumber)], label: String) -> String {
    match labels.iter().find(|(bound, _)| *bound == label) {
        Some((_, number)) => number.to_string(),
        None => label,
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use crate::{
        access::{AccessError, AccessGate, Capability},
        audit::AuditSink,
        limit::LimitPolicy,
    };

    use super::*;

    struct Fixture {
        processor: LedgerProcessor<InMemoryStore>,
        directory: Arc<UserDirectory>,
        audit: Arc<InMemoryAuditLog>,
        labels: Vec<(String, AccountNumber)>,
    }

    impl Fixture {
        fn new() -> Self {
            let directory = Arc::new(UserDirectory::default());
            let audit = Arc::new(InMemoryAuditLog::default());
            let processor = LedgerProcessor::new(
                Arc::new(InMemoryStore::default()),
                directory.clone(),
                audit.clone(),
                LimitPolicy::new(dec!(5000.00), chrono::FixedOffset::east_opt(0).unwrap()),
            );
            Self {
                processor,
                directory,
                audit,
                labels: Vec::new(),
            }
        }

        fn run(&mut self, script: &str) -> Vec<Result<(), ScriptError>> {
            let header = "type,user,account,to,amount,account_type,role,subject,origin\n";
            let input = format!("{header}{script}");
            CsvStepParser::new(input.as_bytes())
                .map(|(_, row)| {
                    let step = row?;
                    apply_step(&self.processor, &self.directory, &mut self.labels, step)
                })
                .collect()
        }
    }

    #[test]
    fn onboarding_steps_are_audited_with_origin() {
        let mut f = Fixture::new();
        let results = f.run(
            "\
register,100,,,,,admin
register,1,,,,,,,\"203.0.113.7, 10.0.0.1\"
verify,100,,,,,,1,198.51.100.2
",
        );
        assert!(results.iter().all(Result::is_ok));
        assert!(f.directory.grants(1, Capability::KycVerified));

        let events = f.audit.list().unwrap();
        let actions: Vec<_> = events.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions.len(), 2);
        assert!(actions.contains(&"User registered"));
        assert!(actions.contains(&"KYC verified for user 1"));

        let registered = events.iter().find(|e| e.actor == Some(1)).unwrap();
        assert_eq!(registered.origin, Some("203.0.113.7".parse().unwrap()));
        let reviewed = events.iter().find(|e| e.actor == Some(100)).unwrap();
        assert_eq!(reviewed.origin, Some("198.51.100.2".parse().unwrap()));
    }

    #[test]
    fn reject_step_and_review_errors() {
        let mut f = Fixture::new();
        let results = f.run(
            "\
register,100,,,,,admin
register,1
verify,100,,,,,,1
reject,100,,,,,,1
verify,1,,,,,,1
verify,100
",
        );
        assert!(results[..4].iter().all(Result::is_ok));
        assert!(!f.directory.grants(1, Capability::KycVerified));
        assert!(matches!(
            results[4],
            Err(ScriptError::Ledger(LedgerError::Access(AccessError::Forbidden)))
        ));
        assert!(matches!(results[5], Err(ScriptError::MissingField("subject"))));
        assert_eq!(f.audit.len(), 3);
    }
}
