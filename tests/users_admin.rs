mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use common::TestApp;

#[tokio::test]
async fn only_admins_list_and_delete_users() -> Result<()> {
    let t = TestApp::new().await?;
    let admin = t.admin("root@example.com").await?;
    let ada = t.user("Ada", "ada@example.com").await?;
    let bob = t.user("Bob", "bob@example.com").await?;

    let (status, body) = t.request("GET", "/api/users", Some(&ada.access_token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "authorization");

    let (status, body) = t.request("GET", "/api/users", Some(&admin.access_token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(3));

    let (status, _) = t
        .request("DELETE", &format!("/api/users/{}", bob.user_id), Some(&ada.access_token), None)
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t
        .request("DELETE", &format!("/api/users/{}", bob.user_id), Some(&admin.access_token), None)
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = t
        .request("GET", &format!("/api/users/{}", bob.user_id), Some(&admin.access_token), None)
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // the deleted account's token no longer resolves to anyone
    let (status, _) = t.request("GET", "/api/projects", Some(&bob.access_token), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn users_read_and_edit_only_themselves() -> Result<()> {
    let t = TestApp::new().await?;
    let admin = t.admin("root@example.com").await?;
    let ada = t.user("Ada", "ada@example.com").await?;
    let bob = t.user("Bob", "bob@example.com").await?;

    let (status, _) = t
        .request("GET", &format!("/api/users/{}", ada.user_id), Some(&ada.access_token), None)
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = t
        .request("GET", &format!("/api/users/{}", bob.user_id), Some(&ada.access_token), None)
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = t
        .request(
            "PUT",
            &format!("/api/users/{}", ada.user_id),
            Some(&ada.access_token),
            Some(json!({"name": "Ada King"})),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["name"], "Ada King");
    assert_eq!(body["data"]["email"], "ada@example.com");

    // taking someone else's email is a conflict
    let (status, body) = t
        .request(
            "PUT",
            &format!("/api/users/{}", ada.user_id),
            Some(&ada.access_token),
            Some(json!({"email": "bob@example.com"})),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "conflict");

    let (status, _) = t
        .request(
            "PUT",
            &format!("/api/users/{}", bob.user_id),
            Some(&admin.access_token),
            Some(json!({"name": "Robert"})),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn blocking_is_admin_only() -> Result<()> {
    let t = TestApp::new().await?;
    let admin = t.admin("root@example.com").await?;
    let ada = t.user("Ada", "ada@example.com").await?;

    let (status, _) = t
        .request(
            "PUT",
            &format!("/api/users/{}/block", admin.user_id),
            Some(&ada.access_token),
            Some(json!({"blocked": true})),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t
        .request(
            "PUT",
            &format!("/api/users/{}/block", admin.user_id),
            Some(&admin.access_token),
            Some(json!({"blocked": true})),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn blank_display_name_is_rejected() -> Result<()> {
    let t = TestApp::new().await?;
    let ada = t.user("Ada", "ada@example.com").await?;
    let uri = format!("/api/users/{}", ada.user_id);

    let (status, body) = t
        .request("PUT", &uri, Some(&ada.access_token), Some(json!({"name": "   "})))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["message"], "Name must not be empty");

    let (status, body) = t.request("GET", &uri, Some(&ada.access_token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Ada");

    Ok(())
}
