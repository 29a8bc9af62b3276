//! External collaborator traits: lease pool and credential storage
//!
//! The daemon talks to a matchmaking/lease service to resolve `$DYNAMIC`
//! destinations and to a credential store to fetch delegated credentials
//! at dispatch time. Deployments without either plug in the no-op
//! implementations.

use async_trait::async_trait;

use crate::error::ExecutionResult;

/// A transfer directory leased from the pool for one dynamic destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeasedDestination {
    /// Full URL of the leased transfer directory, protocol included
    pub url: String,
}

/// Matchmaking service handing out destination leases
#[async_trait]
pub trait LeaseService: Send + Sync {
    /// Whether any lease could currently be granted. Cheap pre-check
    /// consulted before a dispatch sweep touches dynamic jobs.
    async fn are_matches_available(&self) -> bool;

    /// Lease a transfer directory able to speak `protocol`. `None` means
    /// no match found, which reschedules the job without consuming a retry.
    async fn get_transfer_directory(
        &self,
        protocol: &str,
    ) -> ExecutionResult<Option<LeasedDestination>>;

    /// Return a lease after the transfer using it completed.
    async fn return_transfer_destination(&self, url: &str) -> ExecutionResult<()>;

    /// Report a lease whose transfer failed, so the pool can quarantine it.
    async fn fail_transfer_destination(&self, url: &str) -> ExecutionResult<()>;
}

/// Credential store queried by name at every dispatch
#[async_trait]
pub trait CredentialService: Send + Sync {
    /// Fetch the named credential for an owner. `None` when the store has
    /// no such credential; dispatch proceeds without one.
    async fn fetch(&self, owner: &str, cred_name: &str) -> ExecutionResult<Option<Vec<u8>>>;
}

/// Lease service for deployments without a matchmaker. Never grants a
/// lease, so `$DYNAMIC` jobs reschedule indefinitely.
pub struct NoopLeaseService;

#[async_trait]
impl LeaseService for NoopLeaseService {
    async fn are_matches_available(&self) -> bool {
        false
    }

    async fn get_transfer_directory(
        &self,
        _protocol: &str,
    ) -> ExecutionResult<Option<LeasedDestination>> {
        Ok(None)
    }

    async fn return_transfer_destination(&self, _url: &str) -> ExecutionResult<()> {
        Ok(())
    }

    async fn fail_transfer_destination(&self, _url: &str) -> ExecutionResult<()> {
        Ok(())
    }
}

/// Credential store that never has credentials.
pub struct NoopCredentialService;

#[async_trait]
impl CredentialService for NoopCredentialService {
    async fn fetch(&self, _owner: &str, _cred_name: &str) -> ExecutionResult<Option<Vec<u8>>> {
        Ok(None)
    }
}
