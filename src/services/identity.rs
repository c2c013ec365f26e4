//! Identity resolution — who a connection is before any room decision.
//!
//! Identities come in two flavors. Guest ids are minted here and carry the
//! `user-` prefix; anything else is treated as an upstream account id. The
//! flag riding alongside the id is what the access rules key on, so the
//! prefix check is the single source of that distinction.

use crate::services::directory::UserDirectory;
use rand::Rng;

/// Prefix that marks a server-minted guest identity.
pub const GUEST_PREFIX: &str = "user-";

const GUEST_SUFFIX_LEN: usize = 9;
const GUEST_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Trailing id characters shown in a guest's display name.
const GUEST_TAG_LEN: usize = 5;
/// Leading id characters shown when a profile lookup comes up empty.
const FALLBACK_TAG_LEN: usize = 8;

// =============================================================================
// RESOLUTION
// =============================================================================

/// Resolve a registration into `(identity, is_authenticated)`.
///
/// A supplied non-empty id is honored verbatim so reconnecting clients
/// keep their identity; an absent or empty one gets a fresh guest id.
#[must_use]
pub fn resolve(supplied: Option<&str>) -> (String, bool) {
    match supplied {
        Some(id) if !id.is_empty() => (id.to_string(), !id.starts_with(GUEST_PREFIX)),
        _ => (generate_guest_id(), false),
    }
}

/// Mint a guest id: `user-<unix millis>-<9 random base36 chars>`.
#[must_use]
pub fn generate_guest_id() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..GUEST_SUFFIX_LEN)
        .map(|_| {
            let idx = rng.random_range(0..GUEST_ALPHABET.len());
            GUEST_ALPHABET[idx] as char
        })
        .collect();
    format!("{GUEST_PREFIX}{}-{suffix}", now_ms())
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

// =============================================================================
// DISPLAY NAMES
// =============================================================================

/// Human-readable name for an identity. Guests render from their id tail;
/// authenticated users resolve through the directory — email first, then
/// the profile name, then an id-derived tag.
/// Never errors: a directory outage degrades the name, not the session.
pub async fn display_name(directory: &dyn UserDirectory, identity: &str, is_authenticated: bool) -> String {
    if !is_authenticated {
        return format!("Guest-{}", tail(identity, GUEST_TAG_LEN));
    }

    match directory.lookup_user(identity).await {
        Ok(user) => user
            .email
            .filter(|e| !e.is_empty())
            .or_else(|| user.display_name.filter(|n| !n.is_empty()))
            .unwrap_or_else(|| fallback_name(identity)),
        Err(error) => {
            tracing::warn!(%identity, %error, "user lookup failed, using fallback display name");
            fallback_name(identity)
        }
    }
}

fn fallback_name(identity: &str) -> String {
    format!("User-{}", head(identity, FALLBACK_TAG_LEN))
}

// Char-based slicing: ids are client-supplied, so byte offsets could split
// a multi-byte character.
fn head(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

fn tail(s: &str, n: usize) -> String {
    let len = s.chars().count();
    s.chars().skip(len.saturating_sub(n)).collect()
}

#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;
