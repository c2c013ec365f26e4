//! Per-connection session state.
//!
//! Owned by one socket task and never shared, so registration and room
//! attachment read as plain field updates. The ordering rules live here:
//! a session must register before joining, and must hold an attachment
//! before drawing flows through it.

use crate::protocol::Role;
use uuid::Uuid;

/// Identity fixed at registration for the life of the connection.
#[derive(Debug, Clone)]
pub struct RegisteredUser {
    pub identity: String,
    pub display_name: String,
    pub is_authenticated: bool,
}

/// The room a session is currently attached to, with the role granted
/// at join time. Role changes upstream apply on the next join.
#[derive(Debug, Clone)]
pub struct ActiveRoom {
    pub room_id: String,
    pub role: Role,
}

/// Lifecycle state for one WebSocket connection.
pub struct Session {
    pub connection_id: Uuid,
    pub user: Option<RegisteredUser>,
    /// A session is in at most one room; a successful join replaces any
    /// previous attachment.
    pub room: Option<ActiveRoom>,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self { connection_id: Uuid::new_v4(), user: None, room: None }
    }

    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.user.is_some()
    }

    /// Whether this session is attached to `room_id` right now.
    #[must_use]
    pub fn in_room(&self, room_id: &str) -> bool {
        self.room.as_ref().is_some_and(|active| active.room_id == room_id)
    }

    /// Identity for access checks: the account id when authenticated,
    /// `None` for guests so they never match a project membership.
    #[must_use]
    pub fn access_identity(&self) -> Option<&str> {
        self.user.as_ref().filter(|u| u.is_authenticated).map(|u| u.identity.as_str())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
