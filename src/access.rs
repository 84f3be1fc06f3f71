use std::{
    collections::HashMap,
    net::IpAddr,
    sync::{PoisonError, RwLock},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub type UserId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Customer,
    Admin,
    Auditor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Authenticated,
    KycVerified,
    Auditor,
    Admin,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("Authentication credentials were not provided.")]
    Unauthenticated,
    #[error("User KYC is not verified. Cannot create account.")]
    KycNotVerified,
    #[error("You do not have permission to perform this action.")]
    Forbidden,
    #[error("User {0} is not registered")]
    UnknownUser(UserId),
    #[error("User {0} is already registered")]
    AlreadyRegistered(UserId),
}

/// Answers capability questions about a user.
pub trait AccessGate: Send + Sync {
    fn grants(&self, user: UserId, capability: Capability) -> bool;
}

/// Write side of the identity collaborator: self-registration and KYC review outcomes.
pub trait UserRegistry: AccessGate {
    fn enroll(&self, user: UserId) -> Result<(), AccessError>;

    fn set_kyc_verified(&self, user: UserId, verified: bool) -> Result<(), AccessError>;
}

/// Caller identity and network origin of one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub actor: Option<UserId>,
    pub origin: Option<IpAddr>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(actor: UserId) -> Self {
        Self {
            actor: Some(actor),
            origin: None,
        }
    }

    pub fn with_origin(self, origin: Option<IpAddr>) -> Self {
        Self { origin, ..self }
    }

    /// Resolves the client address: the first `X-Forwarded-For` hop wins over
    /// the socket address.
    pub fn client_ip(forwarded_for: Option<&str>, remote_addr: Option<IpAddr>) -> Option<IpAddr> {
        forwarded_for
            .and_then(|header| header.split(',').next())
            .and_then(|hop| hop.trim().parse().ok())
            .or(remote_addr)
    }
}

/// Checks that the request is authenticated and the actor holds `capability`.
pub fn require<G>(
    gate: &G,
    ctx: &RequestContext,
    capability: Capability,
) -> Result<UserId, AccessError>
where
    G: AccessGate + ?Sized,
{
    let actor = ctx.actor.ok_or(AccessError::Unauthenticated)?;
    if !gate.grants(actor, Capability::Authenticated) {
        return Err(AccessError::Unauthenticated);
    }
    if gate.grants(actor, capability) {
        return Ok(actor);
    }
    debug!(actor, ?capability, "Capability denied");
    match capability {
        Capability::Authenticated => Err(AccessError::Unauthenticated),
        Capability::KycVerified => Err(AccessError::KycNotVerified),
        Capability::Auditor | Capability::Admin => Err(AccessError::Forbidden),
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct UserProfile {
    role: Role,
    kyc_verified: bool,
}

/// In-memory registry of known users, standing in for the identity and KYC services.
#[derive(Debug, Default)]
pub struct UserDirectory {
    users: RwLock<HashMap<UserId, UserProfile>>,
}

impl UserDirectory {
    /// Registers a user, or updates the role of an existing one. Staff accounts are
    /// provisioned this way, customers come in through [`UserDirectory::enroll`].
    pub fn register(&self, user: UserId, role: Role) {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        users.entry(user).or_default().role = role;
    }

    /// Adds a new unverified customer.
    pub fn enroll(&self, user: UserId) -> Result<(), AccessError> {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        if users.contains_key(&user) {
            return Err(AccessError::AlreadyRegistered(user));
        }
        users.insert(user, UserProfile::default());
        Ok(())
    }

    /// Records the outcome of a KYC review.
    pub fn set_kyc_verified(&self, user: UserId, verified: bool) -> Result<(), AccessError> {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        let profile = users.get_mut(&user).ok_or(AccessError::UnknownUser(user))?;
        profile.kyc_verified = verified;
        Ok(())
    }
}

impl AccessGate for UserDirectory {
    fn grants(&self, user: UserId, capability: Capability) -> bool {
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        let Some(profile) = users.get(&user) else {
            return false;
        };
        match capability {
            Capability::Authenticated => true,
            Capability::KycVerified => profile.kyc_verified,
            Capability::Auditor => profile.role == Role::Auditor,
            Capability::Admin => profile.role == Role::Admin,
        }
    }
}

impl UserRegistry for UserDirectory {
    fn enroll(&self, user: UserId) -> Result<(), AccessError> {
        UserDirectory::enroll(self, user)
    }

    fn set_kyc_verified(&self, user: UserId, verified: bool) -> Result<(), AccessError> {
        UserDirectory::set_kyc_verified(self, user, verified)
    }
}
