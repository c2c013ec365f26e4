//! Room access rules — who may enter a room, and with what role.
//!
//! DESIGN
//! ======
//! Evaluated fresh on every join; nothing here is cached, so collaborator
//! changes upstream take effect on the next join attempt. The decision is
//! infallible by construction: when the project store cannot answer, the
//! room is treated as private and entry is refused rather than guessed.

use crate::protocol::Role;
use crate::services::projects::ProjectStore;

pub const REASON_AUTH_REQUIRED: &str = "Authentication required for private rooms";
pub const REASON_NOT_COLLABORATOR: &str = "You don't have permission to access this private room";
pub const REASON_UNVERIFIED: &str = "Room access could not be verified";

/// Outcome of an access check for one identity against one room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Granted {
        role: Role,
        is_private: bool,
        /// Present when the room is bound to a project.
        project_id: Option<String>,
    },
    Denied {
        reason: String,
        is_private: bool,
    },
}

/// Evaluate whether `identity` may enter `room_id`.
///
/// `identity` carries the account id only for authenticated users; guests
/// pass `None` and can never match a project membership. Rooms with no
/// project record are open drawing sessions where everyone is a guest.
pub async fn check_access(store: &dyn ProjectStore, room_id: &str, identity: Option<&str>) -> AccessDecision {
    let project = match store.find_by_room(room_id).await {
        Ok(found) => found,
        Err(error) => {
            tracing::warn!(%room_id, %error, "project lookup failed, denying access");
            return AccessDecision::Denied { reason: REASON_UNVERIFIED.to_string(), is_private: true };
        }
    };

    let Some(project) = project else {
        return AccessDecision::Granted { role: Role::Guest, is_private: false, project_id: None };
    };

    let member_role = identity.and_then(|uid| project.role_of(uid));

    if project.is_private {
        if identity.is_none() {
            return AccessDecision::Denied { reason: REASON_AUTH_REQUIRED.to_string(), is_private: true };
        }
        return match member_role {
            Some(role) => {
                AccessDecision::Granted { role, is_private: true, project_id: Some(project.id) }
            }
            None => {
                AccessDecision::Denied { reason: REASON_NOT_COLLABORATOR.to_string(), is_private: true }
            }
        };
    }

    // Public project: members keep their stored role, everyone else
    // draws as a guest.
    AccessDecision::Granted {
        role: member_role.unwrap_or(Role::Guest),
        is_private: false,
        project_id: Some(project.id),
    }
}

#[cfg(test)]
#[path = "access_test.rs"]
mod tests;
