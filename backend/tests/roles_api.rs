mod support;

use console_backend::{models::role::capabilities, types::UserId};
use serde_json::json;
use support::{admin, console_request, send, TestConsole};

#[tokio::test]
async fn role_lifecycle_is_audited_and_reversible() {
    let console = TestConsole::new().await;
    let session = admin();
    let router = console.router();

    let (status, body) = send(
        &router,
        console_request(
            &session,
            json!({
                "action": "create_role",
                "name": "auditor",
                "display_name": "Auditor",
                "capabilities": [capabilities::VIEW_AUDIT_LOG]
            }),
            true,
        ),
    )
    .await;
    assert_eq!(status, 200, "{body}");
    let role_id = body["role"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &router,
        console_request(
            &session,
            json!({
                "action": "update_role",
                "role_id": role_id,
                "display_name": "Senior Auditor",
                "description": "Reads and exports logs",
                "capabilities": [capabilities::VIEW_AUDIT_LOG, capabilities::ROLLBACK_CHANGES]
            }),
            true,
        ),
    )
    .await;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["role"]["display_name"], "Senior Auditor");

    let update_id = console.store.audit_records().await.last().unwrap().id;
    let (status, body) = send(
        &router,
        console_request(&session, json!({"action": "rollback_change", "log_id": update_id}), true),
    )
    .await;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["restored"]["display_name"], "Auditor");
    assert_eq!(body["restored"]["capabilities"], json!([capabilities::VIEW_AUDIT_LOG]));

    let (status, _) = send(
        &router,
        console_request(&session, json!({"action": "delete_role", "role_id": role_id}), true),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(console.store.audit_records().await.len(), 4);
}

#[tokio::test]
async fn unknown_capabilities_and_duplicate_names_are_refused() {
    let console = TestConsole::new().await;
    console.seed_role("auditor", false, &[]).await;
    let session = admin();
    let router = console.router();

    let (status, body) = send(
        &router,
        console_request(
            &session,
            json!({"action": "create_role", "name": "auditor", "display_name": "Again"}),
            true,
        ),
    )
    .await;
    assert_eq!(status, 409);
    assert_eq!(body["code"], "CONFLICT");

    let (status, body) = send(
        &router,
        console_request(
            &session,
            json!({
                "action": "create_role",
                "name": "launcher",
                "display_name": "Launcher",
                "capabilities": ["launch_rockets"]
            }),
            true,
        ),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, _) = send(
        &router,
        console_request(
            &session,
            json!({"action": "create_role", "name": "Bad-Name", "display_name": "Bad"}),
            true,
        ),
    )
    .await;
    assert_eq!(status, 400);
    assert!(console.store.audit_records().await.is_empty());
}

#[tokio::test]
async fn system_roles_cannot_be_deleted_or_renamed() {
    let console = TestConsole::new().await;
    let system = console.seed_role("admin", true, &[]).await;
    let session = admin();
    let router = console.router();

    let (status, _) = send(
        &router,
        console_request(&session, json!({"action": "delete_role", "role_id": system.id}), true),
    )
    .await;
    assert_eq!(status, 403);

    let (status, _) = send(
        &router,
        console_request(
            &session,
            json!({
                "action": "update_role",
                "role_id": system.id,
                "name": "root",
                "display_name": "Root"
            }),
            true,
        ),
    )
    .await;
    assert_eq!(status, 403);
    assert!(console.store.audit_records().await.is_empty());
}

#[tokio::test]
async fn assigned_roles_block_deletion_until_removed() {
    let console = TestConsole::new().await;
    let role = console.seed_role("support", false, &[]).await;
    let user_id = UserId::new();
    let session = admin();
    let router = console.router();

    let (status, body) = send(
        &router,
        console_request(
            &session,
            json!({"action": "assign_role", "user_id": user_id, "role_id": role.id}),
            true,
        ),
    )
    .await;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["assignment"]["assigned_by"], "admin-1");

    let (status, _) = send(
        &router,
        console_request(&session, json!({"action": "delete_role", "role_id": role.id}), true),
    )
    .await;
    assert_eq!(status, 409);

    let (status, _) = send(
        &router,
        console_request(
            &session,
            json!({"action": "remove_role", "user_id": user_id, "role_id": role.id}),
            true,
        ),
    )
    .await;
    assert_eq!(status, 200);

    let (status, _) = send(
        &router,
        console_request(&session, json!({"action": "delete_role", "role_id": role.id}), true),
    )
    .await;
    assert_eq!(status, 200);

    let records = console.store.audit_records().await;
    assert_eq!(records.len(), 3);
    assert_eq!(
        records[0].object_id.as_deref(),
        Some(format!("{}:{}", user_id, role.id).as_str())
    );
}

#[tokio::test]
async fn past_expiry_is_a_validation_error() {
    let console = TestConsole::new().await;
    let role = console.seed_role("support", false, &[]).await;
    let session = admin();
    let (status, body) = send(
        &console.router(),
        console_request(
            &session,
            json!({
                "action": "assign_role",
                "user_id": UserId::new(),
                "role_id": role.id,
                "expires_at": "2001-01-01T00:00:00Z"
            }),
            true,
        ),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}
