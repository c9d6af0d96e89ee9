//! # Installation Credentials
//!
//! Boundary to the external credential store that maps a tenant to the token
//! issued when the application was installed into that tenant.
//!
//! The store is consulted once per dispatch by the
//! [`ContextBuilder`](crate::context::ContextBuilder) and may be queried
//! concurrently by many in-flight dispatches, so implementations must be safe
//! for concurrent reads.

use crate::{error::CredentialError, TenantId};
use async_trait::async_trait;
use std::fmt;
use zeroize::Zeroizing;

pub mod memory;

pub use memory::InMemoryCredentialStore;

/// Installation token for one tenant.
///
/// The token is zeroed when dropped and never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialToken(Zeroizing<String>);

impl CredentialToken {
    /// Wrap a raw token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(Zeroizing::new(token.into()))
    }

    /// Get the token (only for immediate use, e.g. an `Authorization` header).
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    /// Check if token is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for CredentialToken {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for CredentialToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialToken")
            .field("length", &self.0.len())
            .field("value", &"<REDACTED>")
            .finish()
    }
}

/// Lookup of installation credentials by tenant.
///
/// # Errors
///
/// * `CredentialError::NotFound` - no credential is installed for the tenant
/// * `CredentialError::Unavailable` - the store could not answer
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Find the credential installed for `tenant_id`.
    async fn find(&self, tenant_id: &TenantId) -> Result<CredentialToken, CredentialError>;
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
