use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::gate::{ApiKeyContext, API_KEY_HEADER};
use crate::models;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
	paths(
		routes::health::health,
		routes::auth::register,
		routes::auth::login,
		routes::auth::refresh,
		routes::auth::logout,
		routes::auth::me,
		routes::users::list_users,
		routes::users::get_user,
		routes::users::update_user,
		routes::users::delete_user,
		routes::users::set_user_blocked,
		routes::projects::create_project,
		routes::projects::list_projects,
		routes::projects::get_project,
		routes::projects::update_project,
		routes::projects::delete_project,
		routes::projects::set_project_active,
		routes::projects::set_project_blocked,
		routes::projects::issue_project_api_key,
		routes::projects::add_member,
		routes::projects::remove_member,
		routes::projects::validate_api_key,
		routes::security_events::ingest_event,
		routes::security_events::list_events,
		routes::security_events::list_project_events
	),
	components(
		schemas(
			routes::health::HealthResponse,
			models::user::GlobalRole,
			models::user::User,
			models::user::RegisterRequest,
			models::user::LoginRequest,
			models::user::LoginResponse,
			models::user::RefreshRequest,
			models::user::AccessGrant,
			models::user::UserUpdateRequest,
			routes::users::BlockRequest,
			models::project::MemberRole,
			models::project::Member,
			models::project::Project,
			models::project::ProjectCreateRequest,
			models::project::ProjectUpdateRequest,
			models::project::MemberAddRequest,
			models::project::ApiKeyIssued,
			routes::projects::ActiveRequest,
			routes::projects::BlockedRequest,
			ApiKeyContext,
			models::security_event::Severity,
			models::security_event::ActionTaken,
			models::security_event::SecurityEvent,
			models::security_event::SecurityEventCreateRequest
		)
	),
	modifiers(&SecurityAddon),
	tags(
		(name = "Health", description = "Liveness and database reachability"),
		(name = "Auth", description = "Sessions: register, login, refresh, logout"),
		(name = "Users", description = "User administration"),
		(name = "Projects", description = "Projects, members and API keys"),
		(name = "Security Events", description = "Attack telemetry ingestion and queries")
	)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
	fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
		let components = openapi.components.get_or_insert_with(Default::default);
		components.add_security_scheme(
			"bearerAuth",
			SecurityScheme::Http(
				HttpBuilder::new()
					.scheme(HttpAuthScheme::Bearer)
					.bearer_format("JWT")
					.build(),
			),
		);
		components.add_security_scheme(
			"apiKeyAuth",
			SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(API_KEY_HEADER))),
		);
	}
}

/// Every success body is wrapped in the `{success, message, data}` envelope.
/// The per-handler annotations describe `data`; this pass records the
/// wrapping and the local server entry.
pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = serde_json::to_value(ApiDoc::openapi())?;

	describe_envelope(&mut doc);
	ensure_servers(&mut doc, port);

	Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> Router {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.persist_authorization(true);

	let doc = Arc::new(doc);

	let json_route = get(move || {
		let doc = Arc::clone(&doc);
		async move { Json((*doc).clone()) }
	});

	Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/swagger-ui").config(swagger_config))
}

fn describe_envelope(doc: &mut Value) {
	let Some(paths) = doc.get_mut("paths").and_then(Value::as_object_mut) else { return; };

	for item in paths.values_mut() {
		let Some(operations) = item.as_object_mut() else { continue; };
		for operation in operations.values_mut() {
			let Some(responses) = operation.get_mut("responses").and_then(Value::as_object_mut) else { continue; };
			for (status, response) in responses.iter_mut() {
				if !status.starts_with('2') {
					wrap_error(response);
					continue;
				}
				let Some(app_json) = response
					.get_mut("content")
					.and_then(|content| content.get_mut("application/json"))
					.and_then(Value::as_object_mut)
				else {
					continue;
				};
				if let Some(data) = app_json.remove("schema") {
					app_json.insert("schema".to_string(), envelope(Some(data)));
				}
			}
		}
	}
}

fn envelope(data: Option<Value>) -> Value {
	let mut properties = json!({
		"success": {"type": "boolean", "example": true},
		"message": {"type": "string"}
	});
	if let Some(data) = data {
		properties["data"] = data;
	}
	json!({
		"type": "object",
		"required": ["success", "message"],
		"properties": properties
	})
}

fn wrap_error(response: &mut Value) {
	let Some(obj) = response.as_object_mut() else { return; };
	obj.entry("content").or_insert_with(|| {
		json!({
			"application/json": {
				"schema": {
					"type": "object",
					"required": ["success", "message", "error"],
					"properties": {
						"success": {"type": "boolean", "example": false},
						"message": {"type": "string"},
						"error": {
							"type": "string",
							"enum": ["validation", "authentication", "authorization", "not_found", "conflict", "dependency"]
						}
					}
				}
			}
		})
	});
}

fn ensure_servers(doc: &mut Value, port: u16) {
	let server_url = format!("http://localhost:{port}");

	match doc.get_mut("servers") {
		Some(Value::Array(arr)) => {
			let has = arr.iter().any(|v| v.get("url").and_then(Value::as_str) == Some(server_url.as_str()));
			if !has {
				arr.push(json!({ "url": server_url }));
			}
		}
		_ => {
			doc["servers"] = json!([{ "url": server_url }]);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn envelope_wraps_data_schema() {
		let wrapped = envelope(Some(json!({"$ref": "#/components/schemas/User"})));
		assert_eq!(wrapped["properties"]["data"]["$ref"], "#/components/schemas/User");
		assert_eq!(wrapped["required"], json!(["success", "message"]));
	}
}
