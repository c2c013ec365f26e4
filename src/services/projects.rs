//! Project store — persistent access-control documents bound to rooms.
//!
//! A project is the durable record behind a room: who owns it, whether it
//! is private, and which identities collaborate at which role. Rooms with
//! no project record are open sessions. The store itself lives behind an
//! upstream HTTP API; this module owns the trait seam and the client.

use crate::config::UpstreamConfig;
use crate::protocol::Role;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by project store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The HTTP request to the upstream API failed.
    #[error("project request failed: {0}")]
    Request(String),

    /// The upstream API returned a non-success HTTP status.
    #[error("project response error: status {status}")]
    Status { status: u16, body: String },

    /// The upstream response body could not be deserialized.
    #[error("project response parse failed: {0}")]
    Parse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

// =============================================================================
// PROJECT MODEL
// =============================================================================

/// Collaborator role as stored on a project document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollabRole {
    Editor,
    Viewer,
}

impl CollabRole {
    #[must_use]
    pub fn as_role(self) -> Role {
        match self {
            Self::Editor => Role::Editor,
            Self::Viewer => Role::Viewer,
        }
    }
}

/// Collaborator set, in either of the two formats found in stored
/// documents. Older projects hold a plain id list; every id in that
/// format counts as an editor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Collaborators {
    Roles(HashMap<String, CollabRole>),
    Legacy(Vec<String>),
}

impl Default for Collaborators {
    fn default() -> Self {
        Self::Roles(HashMap::new())
    }
}

impl Collaborators {
    fn role_of(&self, user_id: &str) -> Option<Role> {
        match self {
            Self::Roles(map) => map.get(user_id).copied().map(CollabRole::as_role),
            Self::Legacy(list) => list.iter().any(|id| id == user_id).then_some(Role::Editor),
        }
    }
}

/// A stored project document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub owner_id: String,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub collaborators: Collaborators,
}

impl Project {
    /// The role this project grants `user_id`, if any. Ownership wins
    /// over any collaborator entry.
    #[must_use]
    pub fn role_of(&self, user_id: &str) -> Option<Role> {
        if user_id == self.owner_id {
            return Some(Role::Owner);
        }
        self.collaborators.role_of(user_id)
    }
}

// =============================================================================
// STORE TRAIT
// =============================================================================

/// Async lookup of the project bound to a room. Enables stubbing in tests.
#[async_trait::async_trait]
pub trait ProjectStore: Send + Sync {
    /// Fetch the project bound to `room_id`, or `None` when the room has
    /// no project record.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the upstream request fails or the
    /// response is malformed.
    async fn find_by_room(&self, room_id: &str) -> Result<Option<Project>, StoreError>;
}

// =============================================================================
// HTTP CLIENT
// =============================================================================

pub struct HttpProjectStore {
    http: reqwest::Client,
    base_url: String,
}

impl HttpProjectStore {
    /// # Errors
    ///
    /// Returns [`StoreError::HttpClientBuild`] if the HTTP client cannot
    /// be constructed.
    pub fn new(config: &UpstreamConfig) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| StoreError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: config.base_url.clone() })
    }
}

#[async_trait::async_trait]
impl ProjectStore for HttpProjectStore {
    async fn find_by_room(&self, room_id: &str) -> Result<Option<Project>, StoreError> {
        let url = format!("{}/api/projects/by-room/{room_id}", self.base_url);

        let response = self.http.get(&url).send().await.map_err(|e| StoreError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        if status == 404 {
            return Ok(None);
        }

        let text = response.text().await.map_err(|e| StoreError::Request(e.to_string()))?;
        if status != 200 {
            return Err(StoreError::Status { status, body: text });
        }

        let project: Project = serde_json::from_str(&text).map_err(|e| StoreError::Parse(e.to_string()))?;
        Ok(Some(project))
    }
}

#[cfg(test)]
#[path = "projects_test.rs"]
mod tests;
