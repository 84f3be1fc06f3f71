use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{error, info, instrument, warn};

use crate::{
    access::{self, Capability, RequestContext, UserId},
    account::{Account, AccountNumber},
    api::{TransferRequest, TransferResponse},
    command::TransferCommand,
    limit,
    store::{LedgerStore, StoreError, UnitOfWork},
    transaction::{RejectReason, Transaction},
};

use super::{LedgerError, LedgerProcessor};

/// Result of a transfer attempt. Both variants carry the persisted record.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferOutcome {
    Completed(Transaction),
    Rejected {
        reason: RejectReason,
        record: Transaction,
    },
}

impl TransferOutcome {
    pub fn record(&self) -> &Transaction {
        match self {
            TransferOutcome::Completed(record) | TransferOutcome::Rejected { record, .. } => {
                record
            }
        }
    }
}

impl<S> LedgerProcessor<S>
where
    S: LedgerStore,
{
    /// Validates a raw request, then runs [`Self::transfer`].
    pub fn submit_transfer(
        &self,
        ctx: &RequestContext,
        request: &TransferRequest,
    ) -> Result<TransferResponse, LedgerError> {
        access::require(self.users.as_ref(), ctx, Capability::Authenticated)?;
        let command = match TransferCommand::parse(request) {
            Ok(command) => command,
            Err(err) => {
                warn!(%err, "Malformed transfer request");
                self.emit(ctx, format!("Transfer failed: {err}"));
                return Err(err.into());
            }
        };
        let transaction = self.transfer(ctx, &command)?;
        Ok(TransferResponse::from(&transaction))
    }

    /// Moves `command.amount` from an account of the caller to any existing account.
    ///
    /// Every attempt that reaches the ledger leaves exactly one transaction
    /// record and one audit event, whether it succeeds or is rejected.
    #[instrument(
        skip_all,
        fields(from = %command.from_account, to = %command.to_account, amount = %command.amount)
    )]
    pub fn transfer(
        &self,
        ctx: &RequestContext,
        command: &TransferCommand,
    ) -> Result<Transaction, LedgerError> {
        let actor = access::require(self.users.as_ref(), ctx, Capability::Authenticated)?;
        match self.settle(actor, command) {
            Ok(TransferOutcome::Completed(transaction)) => {
                info!(transaction_id = %transaction.id(), "Transfer committed");
                self.emit(
                    ctx,
                    format!(
                        "Transferred {} from {} to {}",
                        command.amount, command.from_account, command.to_account
                    ),
                );
                Ok(transaction)
            }
            Ok(TransferOutcome::Rejected { reason, record }) => {
                warn!(reason = reason.code(), transaction_id = %record.id(), "Transfer rejected");
                self.emit(ctx, format!("Transfer failed: {reason}"));
                Err(reason.into())
            }
            Err(err) => {
                error!(%err, "Transfer aborted, no balance was changed");
                self.emit(ctx, "Transfer failed: internal error".to_string());
                Err(err.into())
            }
        }
    }

    /// Resolves both accounts, then decides and records the attempt in one unit
    /// of work holding the locks of every resolved account.
    fn settle(
        &self,
        actor: UserId,
        command: &TransferCommand,
    ) -> Result<TransferOutcome, StoreError> {
        let amount = command.amount;
        let sender = self
            .store
            .get_by_number_for_user(&command.from_account, actor)?;
        let recipient = match sender {
            Some(_) => self.store.get_by_number(&command.to_account)?,
            None => None,
        };
        let locked: Vec<&AccountNumber> = sender
            .iter()
            .chain(recipient.iter())
            .map(Account::number)
            .collect();

        self.store.with_transaction(&locked, |unit| {
            let now = self.clock.now();
            let reject = |from: Option<&Account>, to: Option<&Account>, reason| {
                TransferOutcome::Rejected {
                    reason,
                    record: Transaction::failed(
                        from.map(|a| a.number().clone()),
                        to.map(|a| a.number().clone()),
                        amount,
                        reason,
                        now,
                    ),
                }
            };

            let outcome = match (&sender, &recipient) {
                (None, _) => reject(None, None, RejectReason::SenderNotFound),
                (Some(from), None) => reject(Some(from), None, RejectReason::RecipientNotFound),
                (Some(from), Some(to)) => {
                    match self.check_funds(unit, from.number(), amount, now)? {
                        Ok(()) => {
                            unit.apply_delta(from.number(), -amount)?;
                            unit.apply_delta(to.number(), amount)?;
                            TransferOutcome::Completed(Transaction::succeeded(
                                from.number().clone(),
                                to.number().clone(),
                                amount,
                                now,
                            ))
                        }
                        Err(reason) => reject(Some(from), Some(to), reason),
                    }
                }
            };
            unit.append_transaction(outcome.record().clone());
            Ok(outcome)
        })
    }

    /// Balance and daily limit checks, run while the sender is locked.
    fn check_funds(
        &self,
        unit: &dyn UnitOfWork,
        from: &AccountNumber,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Result<(), RejectReason>, StoreError> {
        if unit.account(from)?.balance() < amount {
            return Ok(Err(RejectReason::InsufficientFunds));
        }
        let today = self.policy.calendar_date(now);
        let transferred = limit::daily_transferred_total(unit, &self.policy, from, today)?;
        if !self.policy.permits(transferred, amount) {
            return Ok(Err(RejectReason::DailyLimitExceeded));
        }
        Ok(Ok(()))
    }
}
