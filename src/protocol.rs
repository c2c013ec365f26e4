//! Wire protocol — the event vocabulary spoken over each WebSocket.
//!
//! DESIGN
//! ======
//! Every message is one JSON text frame `{"event": <name>, "data": <payload>}`.
//! Inbound frames parse into `ClientEvent`, outbound frames serialize from
//! `ServerEvent`; the WS handler routes on the variant and never inspects
//! raw JSON. Stroke geometry is normalized to `0..1` so replay is correct
//! on any canvas size; the server treats it as opaque.

use serde::{Deserialize, Serialize};

// =============================================================================
// STROKES
// =============================================================================

/// A single point in normalized canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Drawing tool that produced a stroke. Determines how many geometry points
/// a client renders (freehand: many, line/rectangle/circle: two, text: one).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrokeKind {
    Freehand,
    Line,
    Rectangle,
    Circle,
    Text,
}

/// One immutable drawing operation. Append and whole-stroke undo are the
/// only mutations a room's history supports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stroke {
    /// Client-assigned id, unique within a room.
    pub id: String,
    pub author_id: String,
    pub kind: StrokeKind,
    pub geometry: Vec<Point>,
    pub color: String,
    pub width: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

// =============================================================================
// ROLES & PRESENCE
// =============================================================================

/// Permission level within a room. `Guest` is only ever granted on rooms
/// without a private project binding, where it draws like an editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Editor,
    Viewer,
    Guest,
}

impl Role {
    /// Whether this role may mutate room history (draw/undo).
    #[must_use]
    pub fn can_edit(self) -> bool {
        !matches!(self, Role::Viewer)
    }
}

/// Live-membership entry for one identity currently attached to a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRecord {
    pub user_id: String,
    pub display_name: String,
    pub role: Role,
    pub is_authenticated: bool,
}

// =============================================================================
// INBOUND EVENTS
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPayload {
    /// Previously issued identity to resume, if the client has one.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Identity token to verify through the external trust service.
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawPayload {
    pub room_id: String,
    pub stroke: Stroke,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoPayload {
    pub room_id: String,
    pub stroke_id: String,
}

/// Events a client may send. Anything else on the wire answers `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    Register(RegisterPayload),
    /// Payload is the bare room id.
    Join(String),
    Draw(DrawPayload),
    Undo(UndoPayload),
}

// =============================================================================
// OUTBOUND EVENTS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredPayload {
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomJoinedPayload {
    pub room_id: String,
    pub role: Role,
    pub is_private: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomAccessDeniedPayload {
    pub room_id: String,
    pub reason: String,
    pub is_private: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLeftPayload {
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

/// Events the server may send. `history`, `room-user-list`, and
/// `room-joined` go only to a joiner; `user-joined`, `user-left`, `draw`,
/// and `undo` fan out to the rest of the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    Registered(RegisteredPayload),
    History(Vec<Stroke>),
    RoomUserList(Vec<PresenceRecord>),
    RoomJoined(RoomJoinedPayload),
    RoomAccessDenied(RoomAccessDeniedPayload),
    UserJoined(PresenceRecord),
    UserLeft(UserLeftPayload),
    Draw(Stroke),
    /// Payload is the bare stroke id; clients apply a local removal.
    Undo(String),
    Error(ErrorPayload),
}

impl ServerEvent {
    /// Build an `error` event from a message.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorPayload { message: message.into() })
    }

    /// Event name as it appears on the wire. Used for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Registered(_) => "registered",
            Self::History(_) => "history",
            Self::RoomUserList(_) => "room-user-list",
            Self::RoomJoined(_) => "room-joined",
            Self::RoomAccessDenied(_) => "room-access-denied",
            Self::UserJoined(_) => "user-joined",
            Self::UserLeft(_) => "user-left",
            Self::Draw(_) => "draw",
            Self::Undo(_) => "undo",
            Self::Error(_) => "error",
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
