mod common;

use anyhow::Result;
use axum::http::StatusCode;

use common::TestApp;

#[tokio::test]
async fn health_endpoint_reports_db_ok() -> Result<()> {
    let t = TestApp::new().await?;

    let (status, body) = t.request("GET", "/api/health", None, None).await?;
    assert_eq!(status, StatusCode::OK, "health endpoint did not return 200");
    assert_eq!(body["db_ok"], true, "expected db_ok: true, got: {}", body);

    Ok(())
}

#[tokio::test]
async fn openapi_document_lists_every_surface() -> Result<()> {
    let t = TestApp::new().await?;

    let (status, doc) = t.request("GET", "/api-docs/openapi.json", None, None).await?;
    assert_eq!(status, StatusCode::OK);

    let paths = doc["paths"].as_object().expect("paths object");
    for path in [
        "/api/auth/login",
        "/api/auth/refresh",
        "/api/users/{id}/block",
        "/api/projects/{id}/api-key",
        "/api/projects/validate-key",
        "/api/security-events",
        "/api/security-events/project/{project_id}",
    ] {
        assert!(paths.contains_key(path), "missing {path}");
    }

    let schemes = &doc["components"]["securitySchemes"];
    assert_eq!(schemes["bearerAuth"]["scheme"], "bearer");
    assert_eq!(schemes["apiKeyAuth"]["name"], "x-api-key");

    Ok(())
}

#[tokio::test]
async fn unknown_routes_are_not_found() -> Result<()> {
    let t = TestApp::new().await?;
    let (status, _) = t.request("GET", "/api/nope", None, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}
