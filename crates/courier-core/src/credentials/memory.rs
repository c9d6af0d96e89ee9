//! # In-Memory Credential Store
//!
//! Thread-safe in-memory implementation for statically configured
//! installations, development and testing.

use super::{CredentialStore, CredentialToken};
use crate::{error::CredentialError, TenantId};
use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};
use tracing::debug;

/// Thread-safe in-memory credential store.
///
/// Uses RwLock so concurrent lookups do not contend with each other.
#[derive(Clone, Default)]
pub struct InMemoryCredentialStore {
    credentials: Arc<RwLock<HashMap<TenantId, CredentialToken>>>,
}

impl InMemoryCredentialStore {
    /// Create new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create store pre-populated with installations
    pub fn with_credentials(
        credentials: impl IntoIterator<Item = (TenantId, CredentialToken)>,
    ) -> Self {
        Self {
            credentials: Arc::new(RwLock::new(credentials.into_iter().collect())),
        }
    }

    /// Install (or replace) the credential for a tenant.
    pub fn install(
        &self,
        tenant_id: TenantId,
        token: CredentialToken,
    ) -> Result<(), CredentialError> {
        let mut credentials = self.credentials.write().map_err(|_| poisoned())?;
        credentials.insert(tenant_id, token);
        Ok(())
    }

    /// Remove the credential for a tenant, returning whether one existed.
    pub fn uninstall(&self, tenant_id: &TenantId) -> Result<bool, CredentialError> {
        let mut credentials = self.credentials.write().map_err(|_| poisoned())?;
        Ok(credentials.remove(tenant_id).is_some())
    }

    /// Number of installed tenants
    pub fn len(&self) -> usize {
        self.credentials.read().map(|c| c.len()).unwrap_or(0)
    }

    /// Check if no tenant is installed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> CredentialError {
    CredentialError::Unavailable {
        message: "credential map lock poisoned".to_string(),
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find(&self, tenant_id: &TenantId) -> Result<CredentialToken, CredentialError> {
        let credentials = self.credentials.read().map_err(|_| poisoned())?;

        match credentials.get(tenant_id) {
            Some(token) => Ok(token.clone()),
            None => {
                debug!(tenant_id = %tenant_id, "No credential installed for tenant");
                Err(CredentialError::NotFound {
                    tenant_id: tenant_id.to_string(),
                })
            }
        }
    }
}

impl std::fmt::Debug for InMemoryCredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCredentialStore")
            .field("installations", &self.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
