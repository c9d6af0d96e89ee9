//! Inbound request signature verification.
//!
//! The platform signs every request with HMAC-SHA256 over the basestring
//! `v0:{timestamp}:{raw body}` and sends the result as `v0=<lowercase hex>`.
//! Verification recomputes that value with the application's signing secret,
//! compares it in constant time, and rejects requests whose timestamp is too
//! far from the current time to bound replay exposure.
//!
//! # Security
//!
//! - Constant-time comparison of the signature (`subtle`)
//! - The signing secret is zeroed on drop and redacted from `Debug`
//! - Secrets and signature values are never logged
//! - Every failure except staleness collapses into one generic error

use crate::error::AuthError;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// Version prefix of the signing scheme.
pub const SIGNATURE_VERSION: &str = "v0";

/// Default maximum distance between the request timestamp and now.
pub const DEFAULT_FRESHNESS_WINDOW_SECONDS: i64 = 300;

// ============================================================================
// Signing Secret
// ============================================================================

/// Application signing secret shared with the platform.
#[derive(Clone)]
pub struct SigningSecret(Zeroizing<Vec<u8>>);

impl SigningSecret {
    /// Wrap raw secret bytes.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self(Zeroizing::new(secret.into()))
    }

    /// Get the secret bytes (only for immediate use).
    pub fn expose(&self) -> &[u8] {
        &self.0
    }

    /// Check if the secret is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for SigningSecret {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes().to_vec())
    }
}

impl From<String> for SigningSecret {
    fn from(value: String) -> Self {
        Self::new(value.into_bytes())
    }
}

// Security: Don't expose secrets in debug output
impl std::fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningSecret")
            .field("length", &self.0.len())
            .field("value", &"<REDACTED>")
            .finish()
    }
}

// ============================================================================
// Signing and Verification
// ============================================================================

/// Compute the signature header value for a request.
///
/// # Examples
///
/// ```rust
/// use courier_core::verification::{sign, SigningSecret};
///
/// let secret = SigningSecret::from("8f742231b10e8888abcd99yyyzzz85a5");
/// let signature = sign(&secret, "1531420618", b"token=xyz&team_id=T1");
/// assert!(signature.starts_with("v0="));
/// assert_eq!(signature.len(), 3 + 64);
/// ```
pub fn sign(secret: &SigningSecret, timestamp: &str, body: &[u8]) -> String {
    format!("{}={}", SIGNATURE_VERSION, hex::encode(compute_digest(secret, timestamp, body)))
}

/// Verify a request with the default 300 second freshness window.
///
/// See [`RequestVerifier::verify`].
pub fn verify(
    raw_body: &[u8],
    timestamp_header: Option<&str>,
    signature_header: Option<&str>,
    secret: &SigningSecret,
    now: DateTime<Utc>,
) -> Result<(), AuthError> {
    RequestVerifier::new(secret.clone()).verify(raw_body, timestamp_header, signature_header, now)
}

fn compute_digest(secret: &SigningSecret, timestamp: &str, body: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length, so construction cannot fail here.
    let mut mac = match HmacSha256::new_from_slice(secret.expose()) {
        Ok(mac) => mac,
        Err(_) => return Vec::new(),
    };

    mac.update(SIGNATURE_VERSION.as_bytes());
    mac.update(b":");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);

    mac.finalize().into_bytes().to_vec()
}

/// Validates inbound request signatures and freshness.
///
/// # Examples
///
/// ```rust
/// use courier_core::verification::{sign, RequestVerifier, SigningSecret};
/// use chrono::Utc;
///
/// let secret = SigningSecret::from("shhh");
/// let verifier = RequestVerifier::new(secret.clone());
///
/// let now = Utc::now();
/// let timestamp = now.timestamp().to_string();
/// let body = br#"{"type":"event_callback"}"#;
/// let signature = sign(&secret, &timestamp, body);
///
/// assert!(verifier.verify(body, Some(&timestamp), Some(&signature), now).is_ok());
/// ```
#[derive(Clone)]
pub struct RequestVerifier {
    secret: SigningSecret,
    freshness_window: Duration,
}

impl RequestVerifier {
    /// Create a verifier with the default freshness window.
    pub fn new(secret: SigningSecret) -> Self {
        Self {
            secret,
            freshness_window: Duration::seconds(DEFAULT_FRESHNESS_WINDOW_SECONDS),
        }
    }

    /// Override the freshness window.
    pub fn with_freshness_window(mut self, window: Duration) -> Self {
        self.freshness_window = window;
        self
    }

    /// Get the configured freshness window
    pub fn freshness_window(&self) -> Duration {
        self.freshness_window
    }

    /// Verify a request.
    ///
    /// # Arguments
    ///
    /// * `raw_body` - The request body exactly as received
    /// * `timestamp_header` - Request timestamp header (unix seconds)
    /// * `signature_header` - Request signature header (`v0=<hex>`)
    /// * `now` - Current time, injected for testability
    ///
    /// # Errors
    ///
    /// * `AuthError::StaleTimestamp` - the timestamp is more than the freshness
    ///   window away from `now`, in either direction
    /// * `AuthError::InvalidSignature` - anything else: missing headers,
    ///   unparsable timestamp, or mismatched signature
    pub fn verify(
        &self,
        raw_body: &[u8],
        timestamp_header: Option<&str>,
        signature_header: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let (timestamp, signature) = match (timestamp_header, signature_header) {
            (Some(t), Some(s)) => (t, s.trim()),
            _ => return Err(AuthError::InvalidSignature),
        };

        let issued_at: i64 = timestamp
            .trim()
            .parse()
            .map_err(|_| AuthError::InvalidSignature)?;

        // Freshness is not timing-sensitive; only the comparison below is.
        let age = now
            .timestamp()
            .checked_sub(issued_at)
            .map(i64::unsigned_abs)
            .ok_or(AuthError::StaleTimestamp)?;
        if age > self.freshness_window.num_seconds().unsigned_abs() {
            return Err(AuthError::StaleTimestamp);
        }

        // The base string carries the header exactly as sent.
        let expected = sign(&self.secret, timestamp, raw_body);
        if constant_time_compare(expected.as_bytes(), signature.as_bytes()) {
            Ok(())
        } else {
            Err(AuthError::InvalidSignature)
        }
    }
}

/// Constant-time comparison of two signatures.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    // Length is not secret: every valid signature has the same length.
    if a.len() != b.len() {
        return false;
    }

    a.ct_eq(b).into()
}

impl std::fmt::Debug for RequestVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestVerifier")
            .field("secret", &"<REDACTED>")
            .field("freshness_window_seconds", &self.freshness_window.num_seconds())
            .finish()
    }
}

#[cfg(test)]
#[path = "verification_tests.rs"]
mod tests;
