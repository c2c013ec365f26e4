use super::*;
use crate::services::projects::{CollabRole, Collaborators, Project};
use crate::state::test_helpers::StubProjectStore;

fn private_project(owner: &str) -> Project {
    Project {
        id: "proj-1".into(),
        owner_id: owner.into(),
        is_private: true,
        collaborators: Collaborators::default(),
    }
}

fn with_collaborator(mut project: Project, uid: &str, role: CollabRole) -> Project {
    let Collaborators::Roles(ref mut map) = project.collaborators else {
        panic!("expected role-map collaborators");
    };
    map.insert(uid.into(), role);
    project
}

#[tokio::test]
async fn unbound_room_admits_everyone_as_guest() {
    let store = StubProjectStore::default();

    for identity in [None, Some("acct-1")] {
        let decision = check_access(&store, "room-1", identity).await;
        assert_eq!(
            decision,
            AccessDecision::Granted { role: Role::Guest, is_private: false, project_id: None }
        );
    }
}

#[tokio::test]
async fn private_room_requires_authentication() {
    let store = StubProjectStore { project: Some(private_project("owner-1")), fail: false };

    let decision = check_access(&store, "room-1", None).await;
    assert_eq!(
        decision,
        AccessDecision::Denied { reason: REASON_AUTH_REQUIRED.to_string(), is_private: true }
    );
}

#[tokio::test]
async fn private_room_rejects_non_collaborator() {
    let store = StubProjectStore { project: Some(private_project("owner-1")), fail: false };

    let decision = check_access(&store, "room-1", Some("stranger")).await;
    assert_eq!(
        decision,
        AccessDecision::Denied { reason: REASON_NOT_COLLABORATOR.to_string(), is_private: true }
    );
}

#[tokio::test]
async fn private_room_admits_owner_with_owner_role() {
    let store = StubProjectStore { project: Some(private_project("owner-1")), fail: false };

    let decision = check_access(&store, "room-1", Some("owner-1")).await;
    assert_eq!(
        decision,
        AccessDecision::Granted {
            role: Role::Owner,
            is_private: true,
            project_id: Some("proj-1".into())
        }
    );
}

#[tokio::test]
async fn private_room_admits_collaborators_at_their_stored_role() {
    let project = with_collaborator(
        with_collaborator(private_project("owner-1"), "editor-1", CollabRole::Editor),
        "viewer-1",
        CollabRole::Viewer,
    );
    let store = StubProjectStore { project: Some(project), fail: false };

    let editor = check_access(&store, "room-1", Some("editor-1")).await;
    assert!(matches!(editor, AccessDecision::Granted { role: Role::Editor, .. }));

    let viewer = check_access(&store, "room-1", Some("viewer-1")).await;
    assert!(matches!(viewer, AccessDecision::Granted { role: Role::Viewer, .. }));
}

#[tokio::test]
async fn legacy_collaborator_list_grants_editor() {
    let project = Project {
        collaborators: Collaborators::Legacy(vec!["old-timer".into()]),
        ..private_project("owner-1")
    };
    let store = StubProjectStore { project: Some(project), fail: false };

    let decision = check_access(&store, "room-1", Some("old-timer")).await;
    assert!(matches!(decision, AccessDecision::Granted { role: Role::Editor, is_private: true, .. }));
}

#[tokio::test]
async fn public_project_admits_stranger_as_guest_and_keeps_member_roles() {
    let project = with_collaborator(
        Project { is_private: false, ..private_project("owner-1") },
        "viewer-1",
        CollabRole::Viewer,
    );
    let store = StubProjectStore { project: Some(project), fail: false };

    let stranger = check_access(&store, "room-1", Some("stranger")).await;
    assert_eq!(
        stranger,
        AccessDecision::Granted {
            role: Role::Guest,
            is_private: false,
            project_id: Some("proj-1".into())
        }
    );

    let guest = check_access(&store, "room-1", None).await;
    assert!(matches!(guest, AccessDecision::Granted { role: Role::Guest, .. }));

    let viewer = check_access(&store, "room-1", Some("viewer-1")).await;
    assert!(matches!(viewer, AccessDecision::Granted { role: Role::Viewer, is_private: false, .. }));
}

#[tokio::test]
async fn store_failure_denies_and_reports_private() {
    let store = StubProjectStore { project: None, fail: true };

    let decision = check_access(&store, "room-1", Some("owner-1")).await;
    assert_eq!(
        decision,
        AccessDecision::Denied { reason: REASON_UNVERIFIED.to_string(), is_private: true }
    );
}

#[test]
fn project_role_lookup_prefers_ownership() {
    // An owner listed (wrongly) as a viewer still owns the project.
    let project = with_collaborator(private_project("owner-1"), "owner-1", CollabRole::Viewer);
    assert_eq!(project.role_of("owner-1"), Some(Role::Owner));
}
