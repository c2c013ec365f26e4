//! Room registry — membership, history replication, and fan-out.
//!
//! DESIGN
//! ======
//! Rooms are created on first use and live entirely in memory. Every
//! mutation (join, leave, append, undo) and its fan-out happen under the
//! room's own mutex, so all observers see history changes in the same
//! order and a joiner's snapshot can never miss or double-receive an
//! event. Fan-out uses `try_send` and never awaits under the lock.
//!
//! Lock order is always registry map, then room. The idle sweeper takes
//! the map write lock and only `try_lock`s each room, so it cannot
//! deadlock against traffic and a busy room is simply skipped.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::info;
use uuid::Uuid;

use crate::config::env_parse;
use crate::protocol::{PresenceRecord, ServerEvent, Stroke, UserLeftPayload};
use crate::state::{AppState, RoomState, SessionHandle};

const DEFAULT_ROOM_IDLE_TTL_SECS: u64 = 3600;
const DEFAULT_ROOM_SWEEP_INTERVAL_SECS: u64 = 60;

// =============================================================================
// TYPES
// =============================================================================

/// What a joiner gets back: the replayable history and the roster as of
/// the instant it was attached.
pub struct JoinSnapshot {
    pub history: Vec<Stroke>,
    pub members: Vec<PresenceRecord>,
}

/// Result of an append attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    /// A stroke with this id already exists; the room is unchanged.
    DuplicateId,
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Get or create the room `room_id`. The common path is a read-lock hit;
/// creation upgrades to the write lock.
pub async fn room_handle(state: &AppState, room_id: &str) -> Arc<Mutex<RoomState>> {
    {
        let rooms = state.rooms.read().await;
        if let Some(room) = rooms.get(room_id) {
            return room.clone();
        }
    }

    let mut rooms = state.rooms.write().await;
    rooms.entry(room_id.to_string()).or_insert_with(|| Arc::new(Mutex::new(RoomState::new()))).clone()
}

/// Look up `room_id` without creating it.
pub async fn existing_room(state: &AppState, room_id: &str) -> Option<Arc<Mutex<RoomState>>> {
    let rooms = state.rooms.read().await;
    rooms.get(room_id).cloned()
}

// =============================================================================
// JOIN / LEAVE
// =============================================================================

/// Attach a connection to a room and announce it to everyone else.
///
/// The presence record replaces any existing entry for the same identity,
/// so a rejoin refreshes display name and role for observers. The
/// returned snapshot is taken under the same lock that registered the
/// sender, so events fanned out after this call are exactly the events
/// the joiner has not yet seen.
pub async fn join(
    state: &AppState,
    room_id: &str,
    connection_id: Uuid,
    presence: PresenceRecord,
    tx: mpsc::Sender<ServerEvent>,
) -> JoinSnapshot {
    let handle = room_handle(state, room_id).await;
    let mut room = handle.lock().await;

    room.idle_since = None;
    let identity = presence.user_id.clone();
    room.members.insert(identity.clone(), presence.clone());
    room.sessions.insert(connection_id, SessionHandle { identity: identity.clone(), tx });

    fan_out(&room, &ServerEvent::UserJoined(presence), Some(connection_id));

    info!(%room_id, user_id = %identity, %connection_id, sessions = room.sessions.len(), "joined room");
    JoinSnapshot { history: room.history.clone(), members: room.roster() }
}

/// Detach a connection from a room. Presence drops and `user-left` fans
/// out only when this was the identity's last attached connection; a
/// second tab keeps the user present.
pub async fn leave(state: &AppState, room_id: &str, connection_id: Uuid) {
    let Some(handle) = existing_room(state, room_id).await else {
        return;
    };
    let mut room = handle.lock().await;

    let Some(removed) = room.sessions.remove(&connection_id) else {
        return;
    };

    let identity_still_attached = room.sessions.values().any(|s| s.identity == removed.identity);
    if !identity_still_attached {
        room.members.remove(&removed.identity);
        fan_out(&room, &ServerEvent::UserLeft(UserLeftPayload { user_id: removed.identity.clone() }), None);
    }

    if room.sessions.is_empty() {
        room.idle_since = Some(Instant::now());
    }

    info!(
        %room_id,
        user_id = %removed.identity,
        %connection_id,
        remaining = room.sessions.len(),
        "left room"
    );
}

// =============================================================================
// HISTORY
// =============================================================================

/// Append a stroke to the room history and relay it to every other
/// session. A stroke id already in the history is ignored without
/// fan-out, so a client retrying a send cannot duplicate it.
pub async fn append_stroke(
    state: &AppState,
    room_id: &str,
    connection_id: Uuid,
    stroke: Stroke,
) -> AppendOutcome {
    let handle = room_handle(state, room_id).await;
    let mut room = handle.lock().await;

    if room.history.iter().any(|s| s.id == stroke.id) {
        return AppendOutcome::DuplicateId;
    }

    room.history.push(stroke.clone());
    fan_out(&room, &ServerEvent::Draw(stroke), Some(connection_id));
    AppendOutcome::Appended
}

/// Remove a stroke by id and relay the undo to every other session.
/// Returns whether anything was removed. The relay goes out even for an
/// id the history no longer holds — receivers treat an unknown id as a
/// no-op, and the sender's local state already dropped it.
pub async fn remove_stroke(state: &AppState, room_id: &str, connection_id: Uuid, stroke_id: &str) -> bool {
    let Some(handle) = existing_room(state, room_id).await else {
        return false;
    };
    let mut room = handle.lock().await;

    let removed = match room.history.iter().position(|s| s.id == stroke_id) {
        Some(index) => {
            room.history.remove(index);
            true
        }
        None => false,
    };

    fan_out(&room, &ServerEvent::Undo(stroke_id.to_string()), Some(connection_id));
    removed
}

// =============================================================================
// FAN-OUT
// =============================================================================

/// Send an event to every session in the room, optionally excluding one.
fn fan_out(room: &RoomState, event: &ServerEvent, exclude: Option<Uuid>) {
    for (connection_id, session) in &room.sessions {
        if exclude == Some(*connection_id) {
            continue;
        }
        // Best-effort: if a client's channel is full, skip it.
        let _ = session.tx.try_send(event.clone());
    }
}

// =============================================================================
// SWEEPER
// =============================================================================

/// Spawn the background task that evicts rooms left empty past the idle
/// TTL. Returns a handle for shutdown.
pub fn spawn_room_sweeper(state: AppState) -> JoinHandle<()> {
    let ttl = Duration::from_secs(env_parse("ROOM_IDLE_TTL_SECS", DEFAULT_ROOM_IDLE_TTL_SECS));
    let interval = Duration::from_secs(env_parse("ROOM_SWEEP_INTERVAL_SECS", DEFAULT_ROOM_SWEEP_INTERVAL_SECS));
    info!(ttl_secs = ttl.as_secs(), interval_secs = interval.as_secs(), "room sweeper configured");

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let evicted = sweep_idle_rooms(&state, ttl).await;
            if evicted > 0 {
                info!(evicted, "swept idle rooms");
            }
        }
    })
}

/// One sweep pass. Returns how many rooms were evicted.
pub(crate) async fn sweep_idle_rooms(state: &AppState, ttl: Duration) -> usize {
    let mut rooms = state.rooms.write().await;
    let before = rooms.len();

    rooms.retain(|room_id, handle| {
        // A room we cannot lock right now has live traffic; keep it.
        let Ok(room) = handle.try_lock() else {
            return true;
        };
        let expired = room.sessions.is_empty() && room.idle_since.is_some_and(|since| since.elapsed() >= ttl);
        if expired {
            info!(%room_id, strokes = room.history.len(), "evicting idle room");
        }
        !expired
    });

    before - rooms.len()
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
