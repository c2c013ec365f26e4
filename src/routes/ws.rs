//! WebSocket handler — the event loop behind every client connection.
//!
//! DESIGN
//! ======
//! On upgrade, a fresh `Session` enters a `select!` loop:
//! - Incoming client events → parse + dispatch by event name
//! - Events fanned out by room peers → forward to this client
//!
//! Handler functions validate session state, call into the services, and
//! return the events owed to the sender. Fan-out to the rest of a room is
//! NOT their job: it happens inside the room registry, under the room
//! lock, so history order and delivery order always agree.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → session is `Connected`, only `register` is accepted
//! 2. `register` → identity + display name fixed for the connection
//! 3. `join` → access check, then attach + replay (history, roster)
//! 4. `draw`/`undo` → gated on membership and role, then relayed
//! 5. Close → leave the active room, notifying remaining members
//!
//! Each connection is one task, so a disconnect cannot interleave with
//! that connection's own in-flight join: cleanup always runs after the
//! handler finishes, and never resurrects presence.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::protocol::{
    ClientEvent, DrawPayload, PresenceRecord, RegisterPayload, RegisteredPayload, RoomAccessDeniedPayload,
    RoomJoinedPayload, ServerEvent, UndoPayload,
};
use crate::services::access::{self, AccessDecision};
use crate::services::identity;
use crate::services::room::{self, AppendOutcome};
use crate::services::session::{ActiveRoom, RegisteredUser, Session};
use crate::state::AppState;

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_session(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_session(mut socket: WebSocket, state: AppState) {
    let mut session = Session::new();

    // Per-connection channel for events fanned out by room peers.
    let (client_tx, mut client_rx) = mpsc::channel::<ServerEvent>(256);

    info!(connection_id = %session.connection_id, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break };
                let Ok(msg) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        dispatch(&state, &mut socket, &mut session, &client_tx, &text).await;
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(event) = client_rx.recv() => {
                if send_event(&mut socket, &event).await.is_err() {
                    break;
                }
            }
        }
    }

    disconnect(&state, &mut session).await;
}

/// Transport-close cleanup. A session that never registered or never
/// joined has nothing to undo.
async fn disconnect(state: &AppState, session: &mut Session) {
    if let Some(active) = session.room.take() {
        room::leave(state, &active.room_id, session.connection_id).await;
    }
    match &session.user {
        Some(user) => {
            info!(connection_id = %session.connection_id, user_id = %user.identity, "ws: client disconnected");
        }
        None => {
            info!(connection_id = %session.connection_id, "ws: client disconnected before registering");
        }
    }
}

// =============================================================================
// EVENT DISPATCH
// =============================================================================

/// Parse an incoming event, dispatch to its handler, send sender replies.
async fn dispatch(
    state: &AppState,
    socket: &mut WebSocket,
    session: &mut Session,
    client_tx: &mpsc::Sender<ServerEvent>,
    text: &str,
) {
    let replies = process_inbound_text(state, session, client_tx, text).await;
    for event in replies {
        let _ = send_event(socket, &event).await;
    }
}

/// Process one inbound text event and return the events for the sender.
///
/// This keeps the websocket transport concerns separate from event
/// handling, so tests can exercise the whole dispatch path without a
/// socket.
async fn process_inbound_text(
    state: &AppState,
    session: &mut Session,
    client_tx: &mpsc::Sender<ServerEvent>,
    text: &str,
) -> Vec<ServerEvent> {
    let event: ClientEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(e) => {
            warn!(connection_id = %session.connection_id, error = %e, "ws: invalid inbound event");
            return vec![ServerEvent::error(format!("invalid event: {e}"))];
        }
    };

    match event {
        ClientEvent::Register(payload) => handle_register(state, session, payload).await,
        ClientEvent::Join(room_id) => handle_join(state, session, client_tx, &room_id).await,
        ClientEvent::Draw(payload) => handle_draw(state, session, payload).await,
        ClientEvent::Undo(payload) => handle_undo(state, session, payload).await,
    }
}

// =============================================================================
// REGISTER
// =============================================================================

async fn handle_register(state: &AppState, session: &mut Session, payload: RegisterPayload) -> Vec<ServerEvent> {
    // Identity is immutable per connection: a repeat register re-acks it.
    if let Some(user) = &session.user {
        return vec![ServerEvent::Registered(RegisteredPayload { user_id: user.identity.clone() })];
    }

    // A token, when supplied, is the strongest claim; verify it upstream.
    if let Some(token) = payload.token.as_deref().filter(|t| !t.is_empty()) {
        match state.verifier.verify_token(token).await {
            Ok(verified) => {
                let display_name = match verified.email.clone().filter(|e| !e.is_empty()) {
                    Some(email) => email,
                    None => identity::display_name(state.directory.as_ref(), &verified.uid, true).await,
                };
                info!(
                    connection_id = %session.connection_id,
                    user_id = %verified.uid,
                    email_verified = verified.email_verified,
                    "registered verified user"
                );
                session.user = Some(RegisteredUser {
                    identity: verified.uid.clone(),
                    display_name,
                    is_authenticated: true,
                });
                return vec![ServerEvent::Registered(RegisteredPayload { user_id: verified.uid })];
            }
            Err(error) => {
                warn!(
                    connection_id = %session.connection_id,
                    %error,
                    "token verification failed, falling back to supplied id"
                );
            }
        }
    }

    let (identity, is_authenticated) = identity::resolve(payload.user_id.as_deref());
    let display_name = identity::display_name(state.directory.as_ref(), &identity, is_authenticated).await;
    info!(connection_id = %session.connection_id, user_id = %identity, is_authenticated, "user registered");
    session.user = Some(RegisteredUser { identity: identity.clone(), display_name, is_authenticated });
    vec![ServerEvent::Registered(RegisteredPayload { user_id: identity })]
}

// =============================================================================
// JOIN
// =============================================================================

async fn handle_join(
    state: &AppState,
    session: &mut Session,
    client_tx: &mpsc::Sender<ServerEvent>,
    room_id: &str,
) -> Vec<ServerEvent> {
    let Some(user) = session.user.clone() else {
        warn!(connection_id = %session.connection_id, %room_id, "ws: join before register");
        return vec![ServerEvent::error("Must register before joining room")];
    };

    // Fresh decision on every join; collaborator changes apply next join.
    let decision = access::check_access(state.projects.as_ref(), room_id, session.access_identity()).await;

    let (role, is_private, project_id) = match decision {
        AccessDecision::Granted { role, is_private, project_id } => (role, is_private, project_id),
        AccessDecision::Denied { reason, is_private } => {
            info!(connection_id = %session.connection_id, %room_id, %reason, "room access denied");
            // Session stays registered; no room state was touched.
            return vec![ServerEvent::RoomAccessDenied(RoomAccessDeniedPayload {
                room_id: room_id.to_string(),
                reason,
                is_private,
            })];
        }
    };

    // Switching rooms detaches from the old one first.
    if let Some(active) = session.room.take() {
        if active.room_id != room_id {
            room::leave(state, &active.room_id, session.connection_id).await;
        }
    }

    let presence = PresenceRecord {
        user_id: user.identity.clone(),
        display_name: user.display_name.clone(),
        role,
        is_authenticated: user.is_authenticated,
    };
    let snapshot = room::join(state, room_id, session.connection_id, presence, client_tx.clone()).await;

    // Room id and role attach together; a draw can never observe one
    // without the other.
    session.room = Some(ActiveRoom { room_id: room_id.to_string(), role });

    vec![
        ServerEvent::RoomJoined(RoomJoinedPayload {
            room_id: room_id.to_string(),
            role,
            is_private,
            project_id,
        }),
        ServerEvent::History(snapshot.history),
        ServerEvent::RoomUserList(snapshot.members),
    ]
}

// =============================================================================
// DRAW / UNDO
// =============================================================================

async fn handle_draw(state: &AppState, session: &Session, payload: DrawPayload) -> Vec<ServerEvent> {
    if !session.is_registered() {
        warn!(connection_id = %session.connection_id, "ws: draw before register");
        return vec![ServerEvent::error("Must register before drawing")];
    }
    let Some(active) = &session.room else {
        warn!(connection_id = %session.connection_id, "ws: draw before join");
        return vec![ServerEvent::error("Join a room before drawing")];
    };
    if active.room_id != payload.room_id {
        warn!(
            connection_id = %session.connection_id,
            joined = %active.room_id,
            target = %payload.room_id,
            "ws: draw for a room the session is not in"
        );
        return vec![ServerEvent::error(format!("Not joined to room {}", payload.room_id))];
    }
    if !active.role.can_edit() {
        warn!(connection_id = %session.connection_id, room_id = %payload.room_id, "ws: viewer attempted draw");
        return vec![ServerEvent::error("Viewers cannot draw in this room")];
    }

    let stroke_id = payload.stroke.id.clone();
    let outcome = room::append_stroke(state, &payload.room_id, session.connection_id, payload.stroke).await;
    if outcome == AppendOutcome::DuplicateId {
        info!(room_id = %payload.room_id, %stroke_id, "ignored duplicate stroke id");
    }
    Vec::new()
}

async fn handle_undo(state: &AppState, session: &Session, payload: UndoPayload) -> Vec<ServerEvent> {
    if !session.is_registered() {
        warn!(connection_id = %session.connection_id, "ws: undo before register");
        return vec![ServerEvent::error("Must register before undoing")];
    }
    let Some(active) = &session.room else {
        warn!(connection_id = %session.connection_id, "ws: undo before join");
        return vec![ServerEvent::error("Join a room before undoing")];
    };
    if active.room_id != payload.room_id {
        warn!(
            connection_id = %session.connection_id,
            joined = %active.room_id,
            target = %payload.room_id,
            "ws: undo for a room the session is not in"
        );
        return vec![ServerEvent::error(format!("Not joined to room {}", payload.room_id))];
    }
    if !active.role.can_edit() {
        warn!(connection_id = %session.connection_id, room_id = %payload.room_id, "ws: viewer attempted undo");
        return vec![ServerEvent::error("Viewers cannot undo in this room")];
    }

    // Removal of an unknown id is idempotent; the relay still goes out.
    room::remove_stroke(state, &payload.room_id, session.connection_id, &payload.stroke_id).await;
    Vec::new()
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_event(socket: &mut WebSocket, event: &ServerEvent) -> Result<(), ()> {
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, event = event.name(), "ws: failed to serialize event");
            return Err(());
        }
    };
    if let ServerEvent::Error(payload) = event {
        warn!(message = %payload.message, "ws: send error event");
    }
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
