use super::*;

fn registered(identity: &str, is_authenticated: bool) -> Session {
    let mut session = Session::new();
    session.user = Some(RegisteredUser {
        identity: identity.into(),
        display_name: format!("Test {identity}"),
        is_authenticated,
    });
    session
}

#[test]
fn new_session_is_unregistered_and_roomless() {
    let session = Session::new();
    assert!(!session.is_registered());
    assert!(session.room.is_none());
    assert!(!session.in_room("anywhere"));
}

#[test]
fn sessions_get_distinct_connection_ids() {
    assert_ne!(Session::new().connection_id, Session::new().connection_id);
}

#[test]
fn in_room_matches_only_the_attached_room() {
    let mut session = registered("acct-1", true);
    session.room = Some(ActiveRoom { room_id: "room-1".into(), role: Role::Editor });

    assert!(session.in_room("room-1"));
    assert!(!session.in_room("room-2"));
}

#[test]
fn access_identity_exposes_only_authenticated_accounts() {
    assert_eq!(registered("acct-1", true).access_identity(), Some("acct-1"));
    assert_eq!(registered("user-1700000000000-ab12cd34e", false).access_identity(), None);
    assert_eq!(Session::new().access_identity(), None);
}
