//! User directory — profile lookup and token verification upstream.
//!
//! Two narrow seams over the same upstream API: [`UserDirectory`] resolves
//! a uid to a profile for display names, and [`IdentityVerifier`] checks an
//! identity token and returns the verified uid. Both are best-effort from
//! the caller's point of view; failures degrade, they never take the
//! connection down.

use crate::config::UpstreamConfig;
use serde::{Deserialize, Serialize};

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by directory operations.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// The HTTP request to the upstream API failed.
    #[error("directory request failed: {0}")]
    Request(String),

    /// The upstream API returned a non-success HTTP status.
    #[error("directory response error: status {status}")]
    Status { status: u16, body: String },

    /// The upstream response body could not be deserialized.
    #[error("directory response parse failed: {0}")]
    Parse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

// =============================================================================
// TYPES
// =============================================================================

/// Profile record for a known identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryUser {
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Result of a successful token verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedIdentity {
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
}

// =============================================================================
// TRAITS
// =============================================================================

/// Async uid-to-profile lookup. Enables stubbing in tests.
#[async_trait::async_trait]
pub trait UserDirectory: Send + Sync {
    /// Fetch the profile stored for `uid`.
    ///
    /// # Errors
    ///
    /// Returns a [`DirectoryError`] if the upstream request fails, the
    /// uid is unknown, or the response is malformed.
    async fn lookup_user(&self, uid: &str) -> Result<DirectoryUser, DirectoryError>;
}

/// Async identity-token verification. Enables stubbing in tests.
#[async_trait::async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verify `token` and return the identity it proves.
    ///
    /// # Errors
    ///
    /// Returns a [`DirectoryError`] if the token is invalid, expired, or
    /// the upstream request fails.
    async fn verify_token(&self, token: &str) -> Result<VerifiedIdentity, DirectoryError>;
}

// =============================================================================
// HTTP CLIENT
// =============================================================================

/// One client implements both seams; the endpoints share a base URL.
pub struct HttpDirectory {
    http: reqwest::Client,
    base_url: String,
}

impl HttpDirectory {
    /// # Errors
    ///
    /// Returns [`DirectoryError::HttpClientBuild`] if the HTTP client
    /// cannot be constructed.
    pub fn new(config: &UpstreamConfig) -> Result<Self, DirectoryError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| DirectoryError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: config.base_url.clone() })
    }

    async fn post_json<B: serde::Serialize, R: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, DirectoryError> {
        let url = format!("{}{path}", self.base_url);

        let response =
            self.http.post(&url).json(body).send().await.map_err(|e| DirectoryError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| DirectoryError::Request(e.to_string()))?;
        if status != 200 {
            return Err(DirectoryError::Status { status, body: text });
        }

        serde_json::from_str(&text).map_err(|e| DirectoryError::Parse(e.to_string()))
    }
}

#[derive(Serialize)]
struct LookupRequest<'a> {
    uid: &'a str,
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    token: &'a str,
}

#[async_trait::async_trait]
impl UserDirectory for HttpDirectory {
    async fn lookup_user(&self, uid: &str) -> Result<DirectoryUser, DirectoryError> {
        self.post_json("/api/users/lookupByUid", &LookupRequest { uid }).await
    }
}

#[async_trait::async_trait]
impl IdentityVerifier for HttpDirectory {
    async fn verify_token(&self, token: &str) -> Result<VerifiedIdentity, DirectoryError> {
        self.post_json("/api/auth/verify", &VerifyRequest { token }).await
    }
}

#[cfg(test)]
#[path = "directory_test.rs"]
mod tests;
