use super::*;
use serde_json::json;

#[test]
fn project_parses_role_map_collaborators() {
    let project: Project = serde_json::from_value(json!({
        "id": "p1",
        "ownerId": "o1",
        "isPrivate": true,
        "collaborators": {"u1": "editor", "u2": "viewer"}
    }))
    .unwrap();

    assert!(project.is_private);
    assert_eq!(project.role_of("o1"), Some(Role::Owner));
    assert_eq!(project.role_of("u1"), Some(Role::Editor));
    assert_eq!(project.role_of("u2"), Some(Role::Viewer));
    assert_eq!(project.role_of("stranger"), None);
}

#[test]
fn project_parses_legacy_list_collaborators_as_editors() {
    let project: Project = serde_json::from_value(json!({
        "id": "p1",
        "ownerId": "o1",
        "collaborators": ["u1", "u2"]
    }))
    .unwrap();

    assert!(matches!(project.collaborators, Collaborators::Legacy(_)));
    assert_eq!(project.role_of("u1"), Some(Role::Editor));
    assert_eq!(project.role_of("u2"), Some(Role::Editor));
    assert_eq!(project.role_of("u3"), None);
}

#[test]
fn project_defaults_missing_fields() {
    let project: Project = serde_json::from_value(json!({
        "id": "p1",
        "ownerId": "o1"
    }))
    .unwrap();

    assert!(!project.is_private, "isPrivate should default to false");
    assert_eq!(project.role_of("anyone"), None);
    assert!(matches!(project.collaborators, Collaborators::Roles(ref m) if m.is_empty()));
}

#[test]
fn empty_collaborator_map_is_untagged_as_roles_not_legacy() {
    let project: Project = serde_json::from_value(json!({
        "id": "p1",
        "ownerId": "o1",
        "collaborators": {}
    }))
    .unwrap();
    assert!(matches!(project.collaborators, Collaborators::Roles(_)));
}

#[test]
fn collab_role_maps_onto_room_role() {
    assert_eq!(CollabRole::Editor.as_role(), Role::Editor);
    assert_eq!(CollabRole::Viewer.as_role(), Role::Viewer);
}

#[test]
fn store_error_messages_name_the_failure() {
    let err = StoreError::Status { status: 500, body: "boom".into() };
    assert_eq!(err.to_string(), "project response error: status 500");

    let err = StoreError::Request("connection refused".into());
    assert!(err.to_string().contains("connection refused"));
}
