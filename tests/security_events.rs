mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use common::{event_body, TestApp};

const INGEST: &str = "/api/security-events";

#[tokio::test]
async fn ingestion_scenario() -> Result<()> {
    let t = TestApp::new().await?;
    let admin = t.admin("root@example.com").await?;
    let owner = t.user("Owner", "owner@example.com").await?;
    let project_id = t.create_project(&owner.access_token, "Storefront").await?;
    let key = t.issue_key(&owner.access_token, project_id).await?;
    let body = event_body("203.0.113.7").to_string();

    // no key
    let (status, _) = t.with_api_key(INGEST, None, &body).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // blocked project
    assert_eq!(t.set_project_flag(&admin.access_token, project_id, "blocked", true).await?, StatusCode::OK);
    let (status, resp) = t.with_api_key(INGEST, Some(&key), &body).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(resp["message"], "Project is blocked and cannot access API");

    // unblocked
    assert_eq!(t.set_project_flag(&admin.access_token, project_id, "blocked", false).await?, StatusCode::OK);
    let (status, resp) = t.with_api_key(INGEST, Some(&key), &body).await?;
    assert_eq!(status, StatusCode::CREATED, "{resp}");
    assert_eq!(resp["data"]["project_id"], project_id.to_string());
    assert_eq!(resp["data"]["severity"], "High");
    assert_eq!(resp["data"]["action_taken"], "Blocked IP");

    Ok(())
}

#[tokio::test]
async fn key_is_checked_before_the_body() -> Result<()> {
    let t = TestApp::new().await?;

    let (status, resp) = t.with_api_key(INGEST, Some(&"f".repeat(64)), "{not json").await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp["error"], "authentication");

    let (status, resp) = t.with_api_key(INGEST, None, "{not json").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["message"], "API key is required");

    Ok(())
}

#[tokio::test]
async fn payload_preview_is_truncated_and_scrubbed() -> Result<()> {
    let t = TestApp::new().await?;
    let owner = t.user("Owner", "owner@example.com").await?;
    let project_id = t.create_project(&owner.access_token, "Storefront").await?;
    let key = t.issue_key(&owner.access_token, project_id).await?;

    let mut preview = "x".repeat(600);
    preview.push('\0');
    preview.push_str(&"y".repeat(599));
    assert_eq!(preview.chars().count(), 1200);

    let mut body = event_body("198.51.100.4");
    body["payload_preview"] = json!(preview);

    let (status, resp) = t.with_api_key(INGEST, Some(&key), &body.to_string()).await?;
    assert_eq!(status, StatusCode::CREATED, "{resp}");

    let stored = resp["data"]["payload_preview"].as_str().expect("payload_preview");
    assert!(stored.chars().count() <= 1000);
    assert!(!stored.contains('\0'));
    assert!(stored.starts_with("xxx"));

    Ok(())
}

#[tokio::test]
async fn defaults_and_validation() -> Result<()> {
    let t = TestApp::new().await?;
    let owner = t.user("Owner", "owner@example.com").await?;
    let project_id = t.create_project(&owner.access_token, "Storefront").await?;
    let key = t.issue_key(&owner.access_token, project_id).await?;

    let minimal = json!({
        "ip_address": "2001:db8::1",
        "attack_type": "XSS",
        "target_endpoint": "/search"
    });
    let (status, resp) = t.with_api_key(INGEST, Some(&key), &minimal.to_string()).await?;
    assert_eq!(status, StatusCode::CREATED, "{resp}");
    assert_eq!(resp["data"]["severity"], "Medium");
    assert_eq!(resp["data"]["action_taken"], "Logged");

    let (status, resp) = t
        .with_api_key(INGEST, Some(&key), &event_body("not-an-ip").to_string())
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["message"], "Invalid IP address format");

    let mut bad_severity = event_body("203.0.113.7");
    bad_severity["severity"] = json!("Apocalyptic");
    let (status, resp) = t.with_api_key(INGEST, Some(&key), &bad_severity.to_string()).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["error"], "validation");

    Ok(())
}

#[tokio::test]
async fn body_cannot_claim_another_project() -> Result<()> {
    let t = TestApp::new().await?;
    let owner = t.user("Owner", "owner@example.com").await?;
    let mine = t.create_project(&owner.access_token, "Mine").await?;
    let other = t.create_project(&owner.access_token, "Other").await?;
    let key = t.issue_key(&owner.access_token, mine).await?;

    let mut body = event_body("203.0.113.7");
    body["project_id"] = json!(other);
    let (status, _) = t.with_api_key(INGEST, Some(&key), &body.to_string()).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    body["project_id"] = json!(mine);
    let (status, _) = t.with_api_key(INGEST, Some(&key), &body.to_string()).await?;
    assert_eq!(status, StatusCode::CREATED);

    Ok(())
}

#[tokio::test]
async fn event_queries_follow_project_read_access() -> Result<()> {
    let t = TestApp::new().await?;
    let admin = t.admin("root@example.com").await?;
    let owner = t.user("Owner", "owner@example.com").await?;
    let viewer = t.user("Viewer", "viewer@example.com").await?;
    let outsider = t.user("Outsider", "outsider@example.com").await?;

    let project_id = t.create_project(&owner.access_token, "Storefront").await?;
    let quiet_id = t.create_project(&owner.access_token, "Quiet").await?;
    t.add_member(&owner.access_token, project_id, viewer.user_id, "viewer").await?;
    let key = t.issue_key(&owner.access_token, project_id).await?;

    for ip in ["203.0.113.7", "203.0.113.8"] {
        let (status, _) = t.with_api_key(INGEST, Some(&key), &event_body(ip).to_string()).await?;
        assert_eq!(status, StatusCode::CREATED);
    }

    let count = |body: &serde_json::Value| body["data"].as_array().map(Vec::len).unwrap_or(usize::MAX);

    let by_project = format!("/api/security-events/project/{project_id}");
    let (status, body) = t.request("GET", &by_project, Some(&viewer.access_token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(count(&body), 2);

    let (status, _) = t.request("GET", &by_project, Some(&outsider.access_token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // a project with no events is an empty list, not a 404
    let (status, body) = t
        .request("GET", &format!("/api/security-events/project/{quiet_id}"), Some(&owner.access_token), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(count(&body), 0);

    let (_, body) = t.request("GET", INGEST, Some(&outsider.access_token), None).await?;
    assert_eq!(count(&body), 0);
    let (_, body) = t.request("GET", INGEST, Some(&viewer.access_token), None).await?;
    assert_eq!(count(&body), 2);
    let (_, body) = t.request("GET", INGEST, Some(&admin.access_token), None).await?;
    assert_eq!(count(&body), 2);

    // blocking hides the events from tenants but not from admins
    assert_eq!(t.set_project_flag(&admin.access_token, project_id, "blocked", true).await?, StatusCode::OK);
    let (_, body) = t.request("GET", INGEST, Some(&owner.access_token), None).await?;
    assert_eq!(count(&body), 0);
    let (status, _) = t.request("GET", &by_project, Some(&owner.access_token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = t.request("GET", &by_project, Some(&admin.access_token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(count(&body), 2);

    Ok(())
}
