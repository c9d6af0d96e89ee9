//! Per-dispatch execution context.
//!
//! An [`ExecutionContext`] is built once per inbound request by the
//! [`ContextBuilder`] after the tenant's credential has been resolved. It is
//! owned by exactly one dispatch and is never mutated in place: middleware
//! produce updated copies with [`ExecutionContext::with_assign`] and
//! [`ExecutionContext::halted_with`].

use crate::{
    credentials::{CredentialStore, CredentialToken},
    error::{ContextError, CredentialError},
    events::Event,
    TenantId,
};
use serde_json::Value;
use std::{collections::HashMap, fmt, sync::Arc};
use tracing::{error, warn};
use url::Url;

/// Default base URL of the platform's web API.
pub const DEFAULT_API_BASE_URL: &str = "https://slack.com/api/";

// ============================================================================
// API Client Handle
// ============================================================================

/// Outbound API handle bound to one tenant's credential.
///
/// Cloning is cheap; the underlying connection pool is shared.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    token: CredentialToken,
}

impl ApiClient {
    /// Create a client handle.
    ///
    /// A trailing `/` is added to `base_url` when missing so that method names
    /// join onto the full path.
    pub fn new(http: reqwest::Client, mut base_url: Url, token: CredentialToken) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Self {
            http,
            base_url,
            token,
        }
    }

    /// Get the API base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Get the credential the client is bound to.
    pub fn token(&self) -> &CredentialToken {
        &self.token
    }

    /// Get the shared HTTP client.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Build the URL of an API method, e.g. `chat.postMessage`.
    pub fn endpoint(&self, method: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(method.trim_start_matches('/'))
    }

    /// Start an authenticated POST to an API method.
    pub fn post(&self, method: &str) -> Result<reqwest::RequestBuilder, url::ParseError> {
        let url = self.endpoint(method)?;
        Ok(self.http.post(url).bearer_auth(self.token.expose_secret()))
    }
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("token", &"<REDACTED>")
            .finish()
    }
}

// ============================================================================
// Execution Context
// ============================================================================

/// State carried through middleware and handlers for one dispatch.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    tenant_id: TenantId,
    user_id: Option<String>,
    channel_id: Option<String>,
    client: ApiClient,
    assigns: HashMap<String, Value>,
    halted: bool,
    halt_reason: Option<String>,
}

impl ExecutionContext {
    /// Create a fresh, non-halted context with no assigns.
    pub fn new(
        tenant_id: TenantId,
        user_id: Option<String>,
        channel_id: Option<String>,
        client: ApiClient,
    ) -> Self {
        Self {
            tenant_id,
            user_id,
            channel_id,
            client,
            assigns: HashMap::new(),
            halted: false,
            halt_reason: None,
        }
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn channel_id(&self) -> Option<&str> {
        self.channel_id.as_deref()
    }

    /// Get the tenant's installation credential.
    pub fn credential_token(&self) -> &CredentialToken {
        self.client.token()
    }

    /// Get the API client bound to the tenant's credential.
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Look up a value assigned by middleware.
    pub fn assign(&self, key: &str) -> Option<&Value> {
        self.assigns.get(key)
    }

    /// Get all assigned values.
    pub fn assigns(&self) -> &HashMap<String, Value> {
        &self.assigns
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Reason given by the middleware that halted the dispatch.
    pub fn halt_reason(&self) -> Option<&str> {
        self.halt_reason.as_deref()
    }

    /// Return a copy with `key` set to `value`.
    pub fn with_assign(&self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut next = self.clone();
        next.assigns.insert(key.into(), value.into());
        next
    }

    /// Return a halted copy.
    pub fn halted_with(&self, reason: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.halted = true;
        next.halt_reason = Some(reason.into());
        next
    }
}

// ============================================================================
// Context Builder
// ============================================================================

/// Resolves tenants to credentials and assembles execution contexts.
#[derive(Clone)]
pub struct ContextBuilder {
    store: Arc<dyn CredentialStore>,
    http: reqwest::Client,
    api_base_url: Url,
}

impl ContextBuilder {
    /// Create a builder that binds API clients to `api_base_url`.
    pub fn new(store: Arc<dyn CredentialStore>, api_base_url: Url) -> Self {
        Self {
            store,
            http: reqwest::Client::new(),
            api_base_url,
        }
    }

    /// Use a preconfigured HTTP client (timeouts, proxies, user agent).
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Build the context for a dispatch.
    ///
    /// `user_id` and `channel_id` are taken from the event, falling back to
    /// the raw payload for shapes that carry them outside the typed view.
    ///
    /// # Errors
    ///
    /// * `ContextError::UnknownTenant` - no credential is installed for the tenant
    /// * `ContextError::CredentialStore` - the store failed to answer
    pub async fn build(
        &self,
        tenant_id: &TenantId,
        raw_payload: &Value,
        event: &Event,
    ) -> Result<ExecutionContext, ContextError> {
        let token = match self.store.find(tenant_id).await {
            Ok(token) => token,
            Err(CredentialError::NotFound { .. }) => {
                warn!(tenant_id = %tenant_id, "No credential installed for tenant, dropping dispatch");
                return Err(ContextError::UnknownTenant {
                    tenant_id: tenant_id.to_string(),
                });
            }
            Err(e) => {
                error!(tenant_id = %tenant_id, error = %e, "Credential store lookup failed");
                return Err(ContextError::CredentialStore(e));
            }
        };

        let user_id = event
            .user_id()
            .map(str::to_string)
            .or_else(|| id_from_payload(raw_payload, "user_id", "user"));
        let channel_id = event
            .channel_id()
            .map(str::to_string)
            .or_else(|| id_from_payload(raw_payload, "channel_id", "channel"));

        let client = ApiClient::new(self.http.clone(), self.api_base_url.clone(), token);

        Ok(ExecutionContext::new(
            tenant_id.clone(),
            user_id,
            channel_id,
            client,
        ))
    }

    /// Identify the tenant from the payload and build its context.
    ///
    /// A payload with no identifiable tenant fails as `UnknownTenant`.
    pub async fn resolve(
        &self,
        raw_payload: &Value,
        event: &Event,
    ) -> Result<ExecutionContext, ContextError> {
        let Some(tenant_id) = tenant_id_from_payload(raw_payload) else {
            warn!(kind = %event.kind(), "Payload does not identify a tenant");
            return Err(ContextError::UnknownTenant {
                tenant_id: String::new(),
            });
        };

        self.build(&tenant_id, raw_payload, event).await
    }
}

impl fmt::Debug for ContextBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextBuilder")
            .field("api_base_url", &self.api_base_url.as_str())
            .finish()
    }
}

/// Identify the tenant that sent a raw payload.
///
/// Checked in order: `team_id`, `team.id`, `user.team_id`,
/// `authorizations[0].team_id`. Empty values are skipped.
pub fn tenant_id_from_payload(raw: &Value) -> Option<TenantId> {
    let candidates = [
        raw.get("team_id"),
        raw.get("team").and_then(|team| team.get("id")),
        raw.get("user").and_then(|user| user.get("team_id")),
        raw.get("authorizations")
            .and_then(|auths| auths.get(0))
            .and_then(|auth| auth.get("team_id")),
    ];

    candidates
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .find_map(|id| TenantId::new(id).ok())
}

fn id_from_payload(raw: &Value, flat_key: &str, object_key: &str) -> Option<String> {
    raw.get(flat_key)
        .and_then(Value::as_str)
        .or_else(|| {
            raw.get(object_key)
                .and_then(|object| object.get("id"))
                .and_then(Value::as_str)
        })
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
