#![allow(dead_code)]

use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`
use uuid::Uuid;

use project_guard::db::users::{self, NewUser};
use project_guard::models::user::GlobalRole;
use project_guard::utils::hash_password;
use project_guard::{create_app, AppConfig};

pub const PASSWORD: &str = "S3cureP@ss";

pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    _dir: TempDir,
}

pub struct Session {
    pub user_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        Self::with_config(AppConfig::with_secret("test-secret")).await
    }

    pub async fn with_config(config: AppConfig) -> Result<Self> {
        let dir = tempfile::tempdir().context("failed to create tempdir")?;
        let db_path = dir.path().join("test.db");

        let opts = SqliteConnectOptions::new()
            .filename(db_path.as_path())
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePool::connect_with(opts).await?;

        let migrator =
            sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
        migrator.run(&pool).await?;

        let app = create_app(pool.clone(), &config).await?;

        Ok(Self { app, pool, _dir: dir })
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header("content-type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        self.send(builder.body(body)?).await
    }

    /// POST with an `x-api-key` header and a raw body.
    pub async fn with_api_key(&self, uri: &str, key: Option<&str>, body: &str) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(key) = key {
            builder = builder.header("x-api-key", key);
        }
        self.send(builder.body(Body::from(body.to_string()))?).await
    }

    pub async fn send(&self, req: Request<Body>) -> Result<(StatusCode, Value)> {
        let resp = self.app.clone().oneshot(req).await?;
        let status = resp.status();
        let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).with_context(|| format!("non-JSON body: {:?}", bytes))?
        };
        Ok((status, value))
    }

    pub async fn register(&self, name: &str, email: &str) -> Result<Uuid> {
        let (status, body) = self
            .request(
                "POST",
                "/api/auth/register",
                None,
                Some(json!({
                    "name": name,
                    "email": email,
                    "password": PASSWORD,
                    "confirm_password": PASSWORD
                })),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        uuid_at(&body, "/data/id")
    }

    pub async fn login(&self, email: &str) -> Result<Session> {
        let (status, body) = self
            .request(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({ "email": email, "password": PASSWORD })),
            )
            .await?;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");

        Ok(Session {
            user_id: uuid_at(&body, "/data/user/id")?,
            access_token: str_at(&body, "/data/access_token")?,
            refresh_token: str_at(&body, "/data/refresh_token")?,
        })
    }

    pub async fn user(&self, name: &str, email: &str) -> Result<Session> {
        self.register(name, email).await?;
        self.login(email).await
    }

    /// Admins cannot self-register; they are seeded straight into the store.
    pub async fn admin(&self, email: &str) -> Result<Session> {
        let password_hash = hash_password(PASSWORD)?;
        users::insert(
            &self.pool,
            NewUser {
                name: "Platform Admin",
                email,
                password_hash: &password_hash,
                role: GlobalRole::Admin,
            },
        )
        .await?;
        self.login(email).await
    }

    pub async fn create_project(&self, token: &str, name: &str) -> Result<Uuid> {
        let (status, body) = self
            .request(
                "POST",
                "/api/projects",
                Some(token),
                Some(json!({
                    "name": name,
                    "description": "Public checkout service",
                    "tech_stack": {"language": "rust"}
                })),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "create project failed: {body}");
        uuid_at(&body, "/data/id")
    }

    pub async fn add_member(&self, token: &str, project_id: Uuid, user_id: Uuid, role: &str) -> Result<()> {
        let (status, body) = self
            .request(
                "POST",
                &format!("/api/projects/{project_id}/members"),
                Some(token),
                Some(json!({ "user_id": user_id, "role": role })),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "add member failed: {body}");
        Ok(())
    }

    pub async fn issue_key(&self, token: &str, project_id: Uuid) -> Result<String> {
        let (status, body) = self
            .request("POST", &format!("/api/projects/{project_id}/api-key"), Some(token), None)
            .await?;
        assert_eq!(status, StatusCode::CREATED, "issue key failed: {body}");
        str_at(&body, "/data/api_key")
    }

    pub async fn set_project_flag(&self, token: &str, project_id: Uuid, flag: &str, value: bool) -> Result<StatusCode> {
        let (path, field) = match flag {
            "blocked" => ("blocked", "blocked"),
            _ => ("active", "is_active"),
        };
        let mut payload = serde_json::Map::new();
        payload.insert(field.to_string(), Value::Bool(value));
        let (status, _) = self
            .request(
                "PUT",
                &format!("/api/projects/{project_id}/{path}"),
                Some(token),
                Some(Value::Object(payload)),
            )
            .await?;
        Ok(status)
    }
}

pub fn str_at(body: &Value, pointer: &str) -> Result<String> {
    body.pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
        .with_context(|| format!("missing {pointer} in {body}"))
}

pub fn uuid_at(body: &Value, pointer: &str) -> Result<Uuid> {
    Ok(Uuid::parse_str(&str_at(body, pointer)?)?)
}

pub fn event_body(ip: &str) -> Value {
    json!({
        "ip_address": ip,
        "country": "NL",
        "attack_type": "SQLi",
        "target_endpoint": "/api/login",
        "payload_preview": "' OR 1=1 --",
        "severity": "High",
        "action_taken": "Blocked IP",
        "user_agent": "sqlmap/1.7"
    })
}
