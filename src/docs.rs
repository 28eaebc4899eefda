use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Map, Value};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::authz::AuthorizationDecision;
use crate::models;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
	paths(
		routes::auth::register,
		routes::auth::login,
		routes::auth::me,
		routes::roles::list_roles,
		routes::roles::get_role,
		routes::roles::create_role,
		routes::roles::update_permissions,
		routes::roles::rename_role,
		routes::roles::delete_role,
		routes::users::list_users,
		routes::users::list_pending,
		routes::users::approve_user,
		routes::users::set_status,
		routes::authz::check,
		routes::health::health
	),
	components(
		schemas(
			models::user::User,
			models::user::UserStatus,
			models::user::AuthResponse,
			models::user::LoginRequest,
			models::user::RegisterRequest,
			models::user::ApproveRequest,
			models::user::StatusRequest,
			models::role::Role,
			models::role::Resource,
			models::role::Action,
			models::role::DataReach,
			models::role::ResourcePermission,
			models::role::PermissionMatrix,
			models::role::RoleCreateRequest,
			models::role::RolePermissionsRequest,
			models::role::RoleRenameRequest,
			AuthorizationDecision,
			routes::health::HealthResponse
		)
	),
	tags(
		(name = "Auth", description = "Registration and login"),
		(name = "Roles", description = "Role registry administration"),
		(name = "Users", description = "Approval and account status"),
		(name = "Authorization", description = "Permission checks for clients"),
		(name = "Health", description = "Liveness")
	)
)]
pub struct ApiDoc;

pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = serde_json::to_value(ApiDoc::openapi())?;
	let Some(root) = doc.as_object_mut() else {
		anyhow::bail!("OpenAPI root must be an object");
	};

	ensure_security_components(root);
	ensure_global_security(root);
	ensure_servers(root, port);
	add_examples(root);

	Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> anyhow::Result<Router> {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.persist_authorization(true);

	let doc_json = Arc::new(serde_json::to_value(&doc)?);

	let json_route = get(move || {
		let doc_json = Arc::clone(&doc_json);
		async move { Json((*doc_json).clone()) }
	});

	Ok(Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config)))
}

fn object_entry<'a>(parent: &'a mut Map<String, Value>, key: &str) -> Option<&'a mut Map<String, Value>> {
	parent
		.entry(key)
		.or_insert_with(|| Value::Object(Map::new()))
		.as_object_mut()
}

fn ensure_security_components(root: &mut Map<String, Value>) {
	let Some(components) = object_entry(root, "components") else { return; };
	let Some(schemes) = object_entry(components, "securitySchemes") else { return; };

	schemes.insert(
		"bearerAuth".to_string(),
		json!({
			"type": "http",
			"scheme": "bearer",
			"bearerFormat": "JWT"
		}),
	);
}

fn ensure_global_security(root: &mut Map<String, Value>) {
	root.entry("security")
		.or_insert_with(|| json!([{ "bearerAuth": [] }]));
}

fn ensure_servers(root: &mut Map<String, Value>, port: u16) {
	let server_url = format!("http://localhost:{}", port);

	match root.get_mut("servers") {
		Some(Value::Array(arr)) => {
			let has = arr.iter().any(|v| v.get("url").and_then(Value::as_str) == Some(server_url.as_str()));
			if !has {
				arr.push(json!({ "url": server_url }));
			}
		}
		_ => {
			root.insert("servers".to_string(), json!([{ "url": server_url }]));
		}
	}
}

fn add_examples(root: &mut Map<String, Value>) {
	let Some(paths) = root.get_mut("paths").and_then(Value::as_object_mut) else { return; };

	for item in paths.values_mut() {
		let Some(operations) = item.as_object_mut() else { continue; };
		for operation in operations.values_mut() {
			apply_request_examples(operation);
		}
	}
}

fn apply_request_examples(operation: &mut Value) {
	let Some(app_json) = operation
		.pointer_mut("/requestBody/content/application~1json")
		.and_then(Value::as_object_mut)
	else {
		return;
	};
	let Some(reference) = app_json.get("schema").and_then(|s| s.get("$ref")).and_then(Value::as_str) else { return; };

	let example = match reference {
		"#/components/schemas/RegisterRequest" => Some(json!({
			"username": "m.okafor",
			"password": "S3cureP@ssw0rd",
			"requestedRole": "operator",
			"registrationCode": "PLANT-7"
		})),
		"#/components/schemas/RoleCreateRequest" => Some(json!({
			"name": "line_supervisor",
			"displayName": "Line Supervisor",
			"permissions": {
				"Tasks": {"canView": true, "canEdit": true},
				"Reports": {"canView": true, "canEdit": false}
			},
			"dataReach": "department"
		})),
		"#/components/schemas/RolePermissionsRequest" => Some(json!({
			"permissions": {
				"Products": {"canView": true, "canEdit": false}
			},
			"dataReach": "group"
		})),
		"#/components/schemas/ApproveRequest" => Some(json!({
			"role": "operator",
			"departmentId": "00000000-0000-0000-0000-000000000000",
			"groupId": null
		})),
		_ => None,
	};

	if let Some(example) = example {
		app_json.insert("example".to_string(), example);
	}
}
