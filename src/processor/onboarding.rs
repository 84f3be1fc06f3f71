use tracing::{info, instrument};

use crate::{
    access::{self, Capability, RequestContext, UserId},
    store::LedgerStore,
};

use super::{LedgerError, LedgerProcessor};

impl<S> LedgerProcessor<S>
where
    S: LedgerStore,
{
    /// Self-registration. The new user starts as an unverified customer and is the
    /// actor of the audit event.
    #[instrument(skip(self, ctx))]
    pub fn register_user(&self, ctx: &RequestContext, user: UserId) -> Result<(), LedgerError> {
        self.users.enroll(user)?;
        info!("User registered");
        self.emit(
            &RequestContext::user(user).with_origin(ctx.origin),
            "User registered".to_string(),
        );
        Ok(())
    }

    /// Applies the outcome of a KYC review. Admins only.
    #[instrument(skip(self, ctx))]
    pub fn review_kyc(
        &self,
        ctx: &RequestContext,
        user: UserId,
        verified: bool,
    ) -> Result<(), LedgerError> {
        access::require(self.users.as_ref(), ctx, Capability::Admin)?;
        self.users.set_kyc_verified(user, verified)?;
        let status = if verified { "verified" } else { "rejected" };
        info!(status, "KYC reviewed");
        self.emit(ctx, format!("KYC {status} for user {user}"));
        Ok(())
    }
}
