/// Users, roles and the capability checks guarding every operation.
pub mod access;

/// Bank accounts and the balance rules they enforce.
pub mod account;

/// Wire shapes of requests and responses.
pub mod api;

/// Append-only trail of security relevant actions.
pub mod audit;

/// Validated commands built from raw requests.
pub mod command;

pub mod config;

/// Daily outgoing limit, calendar dates and the clock they are measured with.
pub mod limit;

pub mod logging;

/// Transfer engine, account provisioning and user onboarding.
/// Coordinates access checks, limit checks, storage and auditing.
pub mod processor;

/// Account and transaction storage, plus the "in memory" implementation.
///
/// NOTE: every balance change goes through [`store::LedgerStore::with_transaction`],
/// so a durable backend only has to provide the same row locking and
/// all-or-nothing commit.
pub mod store;

/// Immutable records of transfer attempts.
pub mod transaction;

/// Runs ledger scripts from CSV. Lives in the library so the
/// integration tests can drive it too.
pub mod bin_utils;
