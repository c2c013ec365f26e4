//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the live room registry plus the upstream collaborator seams
//! (project store, user directory, token verifier). The registry is a
//! read-mostly map of room id to an independently locked `RoomState`, so
//! traffic in one room never serializes against another; the outer map
//! lock is only taken to look up or create an entry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, RwLock, mpsc};
use uuid::Uuid;

use crate::protocol::{PresenceRecord, ServerEvent, Stroke};
use crate::services::directory::{IdentityVerifier, UserDirectory};
use crate::services::projects::ProjectStore;

/// Live room registry. Outer lock guards the map shape only; each room
/// carries its own mutex for history and membership.
pub type Rooms = Arc<RwLock<HashMap<String, Arc<Mutex<RoomState>>>>>;

// =============================================================================
// SESSION HANDLE
// =============================================================================

/// One attached connection as a room sees it: the identity it resolved
/// at registration and the channel that reaches its socket.
pub struct SessionHandle {
    pub identity: String,
    pub tx: mpsc::Sender<ServerEvent>,
}

// =============================================================================
// ROOM STATE
// =============================================================================

/// Per-room live state: stroke history, presence roster, and attached
/// sessions. All mutation happens under the room's own mutex so history
/// order and fan-out order agree for every observer.
pub struct RoomState {
    /// Strokes in arrival order. Replayed verbatim to late joiners.
    pub history: Vec<Stroke>,
    /// Presence keyed by identity. One entry per identity, however many
    /// connections that identity has attached.
    pub members: HashMap<String, PresenceRecord>,
    /// Attached connections keyed by connection id.
    pub sessions: HashMap<Uuid, SessionHandle>,
    /// When the last session detached. `None` while occupied; the
    /// sweeper evicts rooms idle past the TTL.
    pub idle_since: Option<Instant>,
}

impl RoomState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            history: Vec::new(),
            members: HashMap::new(),
            sessions: HashMap::new(),
            idle_since: Some(Instant::now()),
        }
    }

    /// Presence roster in stable order for replies and tests.
    #[must_use]
    pub fn roster(&self) -> Vec<PresenceRecord> {
        let mut roster: Vec<PresenceRecord> = self.members.values().cloned().collect();
        roster.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        roster
    }
}

impl Default for RoomState {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum — all inner fields are Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub rooms: Rooms,
    pub projects: Arc<dyn ProjectStore>,
    pub directory: Arc<dyn UserDirectory>,
    pub verifier: Arc<dyn IdentityVerifier>,
}

impl AppState {
    #[must_use]
    pub fn new(
        projects: Arc<dyn ProjectStore>,
        directory: Arc<dyn UserDirectory>,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> Self {
        Self { rooms: Arc::new(RwLock::new(HashMap::new())), projects, directory, verifier }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use super::*;
    use crate::protocol::{Point, Role, StrokeKind};
    use crate::services::directory::{DirectoryError, DirectoryUser, VerifiedIdentity};
    use crate::services::projects::{Project, StoreError};

    /// Project store stub: hands back one configured project for every
    /// room, or fails when told to.
    #[derive(Default)]
    pub struct StubProjectStore {
        pub project: Option<Project>,
        pub fail: bool,
    }

    #[async_trait::async_trait]
    impl ProjectStore for StubProjectStore {
        async fn find_by_room(&self, _room_id: &str) -> Result<Option<Project>, StoreError> {
            if self.fail {
                return Err(StoreError::Request("stub store offline".into()));
            }
            Ok(self.project.clone())
        }
    }

    /// Directory stub: uid -> email for lookups, token -> uid for
    /// verification. Anything absent errors the way the upstream would.
    #[derive(Default)]
    pub struct StubDirectory {
        pub emails: HashMap<String, String>,
        pub names: HashMap<String, String>,
        pub tokens: HashMap<String, String>,
        pub fail_lookups: bool,
    }

    #[async_trait::async_trait]
    impl UserDirectory for StubDirectory {
        async fn lookup_user(&self, uid: &str) -> Result<DirectoryUser, DirectoryError> {
            if self.fail_lookups {
                return Err(DirectoryError::Request("stub directory offline".into()));
            }
            let email = self.emails.get(uid).cloned();
            let display_name = self.names.get(uid).cloned();
            if email.is_none() && display_name.is_none() {
                return Err(DirectoryError::Status { status: 404, body: "user not found".into() });
            }
            Ok(DirectoryUser { uid: uid.to_string(), email, display_name })
        }
    }

    #[async_trait::async_trait]
    impl IdentityVerifier for StubDirectory {
        async fn verify_token(&self, token: &str) -> Result<VerifiedIdentity, DirectoryError> {
            match self.tokens.get(token) {
                Some(uid) => Ok(VerifiedIdentity {
                    uid: uid.clone(),
                    email: self.emails.get(uid).cloned(),
                    email_verified: true,
                }),
                None => Err(DirectoryError::Status { status: 401, body: "invalid token".into() }),
            }
        }
    }

    /// Create a test `AppState` with empty stubs: no projects bound to
    /// any room, no known users or tokens.
    #[must_use]
    pub fn test_app_state() -> AppState {
        AppState::new(
            Arc::new(StubProjectStore::default()),
            Arc::new(StubDirectory::default()),
            Arc::new(StubDirectory::default()),
        )
    }

    /// Create a test `AppState` with a chosen project store and directory.
    /// The directory stub serves both lookup and verification.
    #[must_use]
    pub fn test_app_state_with(projects: StubProjectStore, directory: StubDirectory) -> AppState {
        let directory = Arc::new(directory);
        AppState::new(Arc::new(projects), directory.clone(), directory)
    }

    /// Create a dummy `Stroke` for testing.
    #[must_use]
    pub fn dummy_stroke(id: &str, author_id: &str) -> Stroke {
        Stroke {
            id: id.into(),
            author_id: author_id.into(),
            kind: StrokeKind::Freehand,
            geometry: vec![Point { x: 0.1, y: 0.2 }, Point { x: 0.15, y: 0.25 }],
            color: "#1a1a1a".into(),
            width: 2.0,
            filled: None,
            text: None,
        }
    }

    /// Create a dummy `PresenceRecord` for testing.
    #[must_use]
    pub fn presence(user_id: &str, role: Role) -> PresenceRecord {
        PresenceRecord {
            user_id: user_id.into(),
            display_name: format!("Test {user_id}"),
            role,
            is_authenticated: !user_id.starts_with("user-"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Role;

    #[test]
    fn room_state_new_is_empty_and_idle() {
        let room = RoomState::new();
        assert!(room.history.is_empty());
        assert!(room.members.is_empty());
        assert!(room.sessions.is_empty());
        assert!(room.idle_since.is_some());
    }

    #[test]
    fn roster_is_sorted_by_user_id() {
        let mut room = RoomState::new();
        for uid in ["charlie", "alice", "bob"] {
            room.members.insert(uid.to_string(), test_helpers::presence(uid, Role::Editor));
        }
        let roster = room.roster();
        let ids: Vec<&str> = roster.iter().map(|p| p.user_id.as_str()).collect();
        assert_eq!(ids, vec!["alice", "bob", "charlie"]);
    }
}
