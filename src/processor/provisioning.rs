use tracing::{info, instrument, warn};

use crate::{
    access::{self, Capability, RequestContext},
    account::Account,
    api::{AccountView, OpenAccountRequest},
    command::OpenAccountCommand,
    store::{LedgerStore, NewAccount},
};

use super::{LedgerError, LedgerProcessor};

impl<S> LedgerProcessor<S>
where
    S: LedgerStore,
{
    pub fn submit_open_account(
        &self,
        ctx: &RequestContext,
        request: &OpenAccountRequest,
    ) -> Result<AccountView, LedgerError> {
        access::require(self.users.as_ref(), ctx, Capability::Authenticated)?;
        let command = OpenAccountCommand::parse(request)?;
        let account = self.open_account(ctx, &command)?;
        Ok(AccountView::from(&account))
    }

    /// Opens an account for the caller with the initial deposit as its balance.
    /// Only KYC-verified users may open accounts.
    #[instrument(skip_all, fields(account_type = ?command.account_type))]
    pub fn open_account(
        &self,
        ctx: &RequestContext,
        command: &OpenAccountCommand,
    ) -> Result<Account, LedgerError> {
        let owner = match access::require(self.users.as_ref(), ctx, Capability::KycVerified) {
            Ok(owner) => owner,
            Err(err) => {
                warn!(%err, actor = ?ctx.actor, "Account creation denied");
                if ctx.actor.is_some() {
                    self.emit(ctx, format!("Account creation failed: {err}"));
                }
                return Err(err.into());
            }
        };

        let account = self.store.create(NewAccount {
            owner,
            account_type: command.account_type,
            balance: command.initial_deposit,
            created_at: self.clock.now(),
        })?;
        info!(account = %account.number(), owner, balance = %account.balance(), "Account opened");
        self.emit(ctx, format!("Created bank account {}", account.number()));
        Ok(account)
    }

    /// The caller's own accounts, oldest first.
    pub fn list_accounts(&self, ctx: &RequestContext) -> Result<Vec<AccountView>, LedgerError> {
        let owner = access::require(self.users.as_ref(), ctx, Capability::Authenticated)?;
        let accounts = self.store.accounts_for_user(owner)?;
        Ok(accounts.iter().map(AccountView::from).collect())
    }
}
