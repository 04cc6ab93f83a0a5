//! User and team administration over HTTP.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{fixtures, TestConfig, TestFixture};
use daemonview_core::{
    audit::AuditFilter,
    team::TeamStore,
    ticket::{Priority, TicketStore},
    user::UserRole,
};

// ============================================================================
// Users
// ============================================================================

#[tokio::test]
async fn test_create_and_fetch_user() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            "/api/v1/users",
            json!({
                "username": "dana",
                "email": "dana@example.com",
                "password": "correct horse",
                "role": "viewer"
            }),
        )
        .await;

    assert_status!(response, StatusCode::CREATED);
    assert_json_path!(response.body, "username", json!("dana"));
    assert_json_path!(response.body, "role", json!("viewer"));
    assert!(response.body.get("password_hash").is_none());
    assert!(response.body.get("password").is_none());

    let id = response.body["id"].as_i64().unwrap();
    let response = fixture.get(&format!("/api/v1/users/{}", id)).await;
    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "email", json!("dana@example.com"));

    let response = fixture.get("/api/v1/users").await;
    assert_eq!(response.body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_duplicate_username_conflicts() {
    let fixture = TestFixture::new().await;
    fixture.create_user("dana", "pw", UserRole::Agent);

    let response = fixture
        .post(
            "/api/v1/users",
            json!({ "username": "dana", "email": "other@example.com", "password": "pw" }),
        )
        .await;

    assert_status!(response, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_create_user_rejects_blank_password() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            "/api/v1/users",
            json!({ "username": "eli", "email": "eli@example.com", "password": "" }),
        )
        .await;

    assert_status!(response, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_user() {
    let fixture = TestFixture::new().await;
    let user = fixture.create_user("farah", "pw", UserRole::Viewer);
    let path = format!("/api/v1/users/{}", user.id);

    let response = fixture.put(&path, json!({ "role": "agent" })).await;
    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "role", json!("agent"));
    assert_json_path!(response.body, "email", json!("farah@example.com"));

    let response = fixture.put(&path, json!({})).await;
    assert_status!(response, StatusCode::BAD_REQUEST);

    let response = fixture
        .put("/api/v1/users/999", json!({ "email": "x@example.com" }))
        .await;
    assert_status!(response, StatusCode::NOT_FOUND);

    let records = fixture
        .wait_for_audit(AuditFilter::new().with_event_type("user_updated"), 1)
        .await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].user_id.as_deref(), Some("anonymous"));
}

#[tokio::test]
async fn test_delete_user() {
    let fixture = TestFixture::new().await;
    let user = fixture.create_user("gus", "pw", UserRole::Agent);
    let path = format!("/api/v1/users/{}", user.id);

    let response = fixture.delete(&path).await;
    assert_status!(response, StatusCode::NO_CONTENT);

    let response = fixture.get(&path).await;
    assert_status!(response, StatusCode::NOT_FOUND);

    let response = fixture.delete(&path).await;
    assert_status!(response, StatusCode::NOT_FOUND);

    let records = fixture
        .wait_for_audit(AuditFilter::new().with_event_type("user_deleted"), 1)
        .await;
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn test_delete_user_unassigns_their_tickets() {
    let fixture = TestFixture::new().await;
    let tech = fixture.create_user("ines", "pw", UserRole::Agent);
    let ticket = fixture
        .stores
        .tickets
        .create(fixtures::ticket_request("Scanner offline", Priority::Medium))
        .unwrap();
    let ticket_path = format!("/api/v1/tickets/{}", ticket.id);

    let response = fixture
        .put(&ticket_path, json!({ "assigned_to_name": "ines" }))
        .await;
    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "assigned_to", json!(tech.id));

    let response = fixture.delete(&format!("/api/v1/users/{}", tech.id)).await;
    assert_status!(response, StatusCode::NO_CONTENT);

    let response = fixture.get(&ticket_path).await;
    assert_status!(response, StatusCode::OK);
    assert!(response.body.get("assigned_to").is_none());

    let response = fixture
        .get(&format!("/api/v1/tickets?assigned_to={}", tech.id))
        .await;
    assert_json_path!(response.body, "total", json!(0));

    let records = fixture
        .wait_for_audit(AuditFilter::new().with_event_type("user_deleted"), 1)
        .await;
    let data = serde_json::to_value(&records[0].data).unwrap();
    assert_eq!(data["tickets_unassigned"], json!(1));
}

#[tokio::test]
async fn test_deleted_user_session_is_revoked() {
    let fixture = TestFixture::with_config(TestConfig::with_sessions()).await;
    fixture.create_user("root", "rootpw", UserRole::Admin);
    let victim = fixture.create_user("hana", "hanapw", UserRole::Agent);

    let admin_token = fixture.login("root", "rootpw").await;
    let victim_token = fixture.login("hana", "hanapw").await;

    let response = fixture
        .send("GET", "/api/v1/auth/me", None, Some(&victim_token))
        .await;
    assert_status!(response, StatusCode::OK);

    let response = fixture
        .send(
            "DELETE",
            &format!("/api/v1/users/{}", victim.id),
            None,
            Some(&admin_token),
        )
        .await;
    assert_status!(response, StatusCode::NO_CONTENT);

    let response = fixture
        .send("GET", "/api/v1/auth/me", None, Some(&victim_token))
        .await;
    assert_status!(response, StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Teams
// ============================================================================

#[tokio::test]
async fn test_team_crud() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            "/api/v1/teams",
            json!({ "name": "Network", "description": "Switches and VPN" }),
        )
        .await;
    assert_status!(response, StatusCode::CREATED);
    assert_json_path!(response.body, "members", json!([]));
    let team_id = response.body["id"].as_i64().unwrap();
    let path = format!("/api/v1/teams/{}", team_id);

    let response = fixture
        .post("/api/v1/teams", json!({ "name": "Network" }))
        .await;
    assert_status!(response, StatusCode::CONFLICT);

    let response = fixture.put(&path, json!({ "name": "Networking" })).await;
    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "name", json!("Networking"));
    assert_json_path!(response.body, "description", json!("Switches and VPN"));

    let response = fixture.get("/api/v1/teams").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body.as_array().unwrap().len(), 1);

    let response = fixture.delete(&path).await;
    assert_status!(response, StatusCode::NO_CONTENT);

    let response = fixture.get(&path).await;
    assert_status!(response, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_blank_team_name_rejected() {
    let fixture = TestFixture::new().await;

    let response = fixture.post("/api/v1/teams", json!({ "name": "  " })).await;

    assert_status!(response, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_members_follow_their_team() {
    let fixture = TestFixture::new().await;
    let response = fixture
        .post("/api/v1/teams", json!({ "name": "Desktop" }))
        .await;
    let team_id = response.body["id"].as_i64().unwrap();
    let members_path = format!("/api/v1/teams/{}/members", team_id);

    let response = fixture
        .post(
            &members_path,
            json!({ "name": "Ivy", "email": "ivy@example.com", "role": "lead" }),
        )
        .await;
    assert_status!(response, StatusCode::CREATED);
    assert_json_path!(response.body, "team_id", json!(team_id));
    let ivy = response.body["id"].as_i64().unwrap();

    let response = fixture
        .post(
            &members_path,
            json!({ "name": "Jon", "email": "jon@example.com", "role": "support" }),
        )
        .await;
    assert_status!(response, StatusCode::CREATED);
    let jon = response.body["id"].as_i64().unwrap();

    let response = fixture
        .put(
            &format!("{}/{}", members_path, jon),
            json!({ "role": "engineer" }),
        )
        .await;
    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "role", json!("engineer"));
    assert_json_path!(response.body, "name", json!("Jon"));

    let response = fixture.get(&format!("/api/v1/teams/{}", team_id)).await;
    let names: Vec<&str> = response.body["members"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Ivy", "Jon"]);

    let response = fixture.delete(&format!("{}/{}", members_path, ivy)).await;
    assert_status!(response, StatusCode::NO_CONTENT);

    let response = fixture.delete(&format!("{}/{}", members_path, ivy)).await;
    assert_status!(response, StatusCode::NOT_FOUND);

    let response = fixture
        .delete(&format!("/api/v1/teams/{}", team_id))
        .await;
    assert_status!(response, StatusCode::NO_CONTENT);

    // Members go with the team
    assert!(fixture
        .stores
        .teams
        .list_teams()
        .unwrap()
        .is_empty());
    let records = fixture
        .wait_for_audit(AuditFilter::new().with_event_type("team_deleted"), 1)
        .await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].data.event_type(), "team_deleted");
    let data = serde_json::to_value(&records[0].data).unwrap();
    assert_eq!(data["members_removed"], json!(1));
}

#[tokio::test]
async fn test_member_on_unknown_team() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            "/api/v1/teams/42/members",
            json!({ "name": "Kim", "email": "kim@example.com", "role": "analyst" }),
        )
        .await;
    assert_status!(response, StatusCode::NOT_FOUND);

    let response = fixture
        .put("/api/v1/teams/42/members/1", json!({ "name": "Kim" }))
        .await;
    assert_status!(response, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_member_role_must_be_known() {
    let fixture = TestFixture::new().await;
    let response = fixture
        .post("/api/v1/teams", json!({ "name": "Security" }))
        .await;
    let team_id = response.body["id"].as_i64().unwrap();

    let response = fixture
        .post(
            &format!("/api/v1/teams/{}/members", team_id),
            json!({ "name": "Lou", "email": "lou@example.com", "role": "manager" }),
        )
        .await;

    // Rejected by the JSON extractor before reaching the store
    assert!(response.status.is_client_error());
}

// ============================================================================
// Authorization
// ============================================================================

#[tokio::test]
async fn test_non_admin_can_read_but_not_write() {
    let fixture = TestFixture::with_config(TestConfig::with_sessions()).await;
    fixture.create_user("val", "valpw", UserRole::Viewer);
    let token = fixture.login("val", "valpw").await;

    let response = fixture
        .send("GET", "/api/v1/users", None, Some(&token))
        .await;
    assert_status!(response, StatusCode::OK);

    let response = fixture
        .send("GET", "/api/v1/teams", None, Some(&token))
        .await;
    assert_status!(response, StatusCode::OK);

    let response = fixture
        .send(
            "POST",
            "/api/v1/users",
            Some(json!({ "username": "mallory", "email": "m@example.com", "password": "pw" })),
            Some(&token),
        )
        .await;
    assert_status!(response, StatusCode::FORBIDDEN);

    let response = fixture
        .send(
            "POST",
            "/api/v1/teams",
            Some(json!({ "name": "Shadow IT" })),
            Some(&token),
        )
        .await;
    assert_status!(response, StatusCode::FORBIDDEN);
    assert!(fixture.stores.teams.list_teams().unwrap().is_empty());
}
