//! API documentation endpoints, mounted only when `DOCS_ENABLED=true`.
//!
//! - `GET /docs` - redirects to the OpenAPI document
//! - `GET /docs/openapi.json` - OpenAPI 3 description of `/api/v1`
//!
//! With auth enabled the document declares an OAuth2 authorization-code
//! scheme whose endpoints are derived from `AUTH_ISSUER`, so API explorers
//! can obtain tokens from the identity provider directly.

use axum::Json;
use axum::extract::State;
use axum::response::Redirect;
use serde_json::{Value, json};
use tracing::instrument;

use crate::config::Config;
use crate::state::AppState;

pub const OPENAPI_PATH: &str = "/docs/openapi.json";

#[instrument]
pub async fn docs_redirect() -> Redirect {
    Redirect::temporary(OPENAPI_PATH)
}

#[instrument(skip(state))]
pub async fn openapi_document(State(state): State<AppState>) -> Json<Value> {
    Json(openapi_spec(&state.config))
}

/// Build the OpenAPI document for the current configuration.
pub fn openapi_spec(config: &Config) -> Value {
    let mut spec = json!({
        "openapi": "3.0.3",
        "info": {
            "title": "Taskboard API",
            "description": "Projects and tasks REST API",
            "version": env!("CARGO_PKG_VERSION"),
        },
        "servers": [{ "url": "/api/v1" }],
        "paths": paths(),
        "components": {
            "schemas": schemas(),
        },
    });

    if config.auth_enabled {
        let issuer = config
            .auth_issuer
            .as_deref()
            .unwrap_or_default()
            .trim_end_matches('/');

        let mut scheme = json!({
            "type": "oauth2",
            "flows": {
                "authorizationCode": {
                    "authorizationUrl": format!("{issuer}/protocol/openid-connect/auth"),
                    "tokenUrl": format!("{issuer}/protocol/openid-connect/token"),
                    "scopes": {
                        "openid": "OpenID Connect",
                        "profile": "Basic profile",
                        "email": "Email address",
                    },
                },
            },
        });
        if let Some(client_id) = &config.auth_client_id {
            scheme["x-client-id"] = json!(client_id);
        }

        spec["components"]["securitySchemes"] = json!({ "BearerAuth": scheme });
        spec["security"] = json!([{ "BearerAuth": ["openid", "profile", "email"] }]);
    }

    spec
}

fn error_responses(codes: &[&str]) -> Value {
    let mut responses = serde_json::Map::new();
    for code in codes {
        responses.insert(
            (*code).to_string(),
            json!({
                "description": error_description(code),
                "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Error" } } },
            }),
        );
    }
    Value::Object(responses)
}

fn error_description(code: &str) -> &'static str {
    match code {
        "400" => "Invalid request",
        "401" => "Missing or invalid bearer token",
        "404" => "Not found",
        "429" => "Rate limit exceeded",
        _ => "Internal server error",
    }
}

fn with_errors(mut ok: Value, codes: &[&str]) -> Value {
    if let (Some(ok), Value::Object(errors)) = (ok.as_object_mut(), error_responses(codes)) {
        ok.extend(errors);
    }
    ok
}

fn json_body(schema: &str) -> Value {
    json!({
        "required": true,
        "content": { "application/json": { "schema": { "$ref": format!("#/components/schemas/{schema}") } } },
    })
}

fn json_response(description: &str, schema: Value) -> Value {
    json!({
        "description": description,
        "content": { "application/json": { "schema": schema } },
    })
}

fn schema_ref(name: &str) -> Value {
    json!({ "$ref": format!("#/components/schemas/{name}") })
}

fn id_param() -> Value {
    json!({
        "name": "id",
        "in": "path",
        "required": true,
        "schema": { "type": "string", "format": "uuid" },
    })
}

fn paths() -> Value {
    let common = ["401", "429", "500"];
    let with_id = ["400", "401", "404", "429", "500"];

    json!({
        "/projects": {
            "get": {
                "tags": ["projects"],
                "summary": "List projects",
                "parameters": [
                    { "name": "page", "in": "query", "schema": { "type": "integer", "minimum": 1 } },
                    { "name": "limit", "in": "query", "schema": { "type": "integer", "minimum": 1, "maximum": 100 } },
                ],
                "responses": with_errors(
                    json!({ "200": json_response(
                        "All projects, or a page when both page and limit are given",
                        json!({ "oneOf": [
                            { "type": "array", "items": schema_ref("Project") },
                            schema_ref("ProjectPage"),
                        ] }),
                    ) }),
                    &common,
                ),
            },
            "post": {
                "tags": ["projects"],
                "summary": "Create a project",
                "requestBody": json_body("ProjectRequest"),
                "responses": with_errors(
                    json!({ "201": json_response("Created project", schema_ref("Project")) }),
                    &["400", "401", "429", "500"],
                ),
            },
        },
        "/projects/{id}": {
            "parameters": [id_param()],
            "get": {
                "tags": ["projects"],
                "summary": "Get a project",
                "responses": with_errors(json!({ "200": json_response("Project", schema_ref("Project")) }), &with_id),
            },
            "put": {
                "tags": ["projects"],
                "summary": "Replace a project's name and description",
                "requestBody": json_body("ProjectRequest"),
                "responses": with_errors(json!({ "200": json_response("Updated project", schema_ref("Project")) }), &with_id),
            },
            "delete": {
                "tags": ["projects"],
                "summary": "Delete a project",
                "responses": with_errors(json!({ "204": { "description": "Deleted" } }), &with_id),
            },
        },
        "/projects/{id}/tasks": {
            "parameters": [id_param()],
            "get": {
                "tags": ["tasks"],
                "summary": "List a project's tasks",
                "responses": with_errors(
                    json!({ "200": json_response("Tasks", json!({ "type": "array", "items": schema_ref("Task") })) }),
                    &["400", "401", "429", "500"],
                ),
            },
            "post": {
                "tags": ["tasks"],
                "summary": "Create a task in a project",
                "requestBody": json_body("CreateTaskRequest"),
                "responses": with_errors(
                    json!({ "201": json_response("Created task", schema_ref("Task")) }),
                    &["400", "401", "429", "500"],
                ),
            },
        },
        "/tasks/{id}": {
            "parameters": [id_param()],
            "get": {
                "tags": ["tasks"],
                "summary": "Get a task",
                "responses": with_errors(json!({ "200": json_response("Task", schema_ref("Task")) }), &with_id),
            },
            "put": {
                "tags": ["tasks"],
                "summary": "Partially update a task",
                "requestBody": json_body("UpdateTaskRequest"),
                "responses": with_errors(json!({ "200": json_response("Updated task", schema_ref("Task")) }), &with_id),
            },
            "delete": {
                "tags": ["tasks"],
                "summary": "Delete a task",
                "responses": with_errors(json!({ "204": { "description": "Deleted" } }), &with_id),
            },
        },
    })
}

fn schemas() -> Value {
    let status = json!({ "type": "string", "enum": ["TODO", "IN_PROGRESS", "DONE"] });
    let timestamp = json!({ "type": "string", "format": "date-time" });

    json!({
        "Error": {
            "type": "object",
            "properties": { "error": { "type": "string" } },
        },
        "Project": {
            "type": "object",
            "properties": {
                "id": { "type": "string", "format": "uuid" },
                "name": { "type": "string" },
                "description": { "type": "string" },
                "createdAt": timestamp,
                "updatedAt": timestamp,
            },
        },
        "ProjectPage": {
            "type": "object",
            "properties": {
                "data": { "type": "array", "items": schema_ref("Project") },
                "total": { "type": "integer" },
                "page": { "type": "integer" },
                "limit": { "type": "integer" },
            },
        },
        "ProjectRequest": {
            "type": "object",
            "required": ["name"],
            "properties": {
                "name": { "type": "string" },
                "description": { "type": "string" },
            },
        },
        "Task": {
            "type": "object",
            "properties": {
                "id": { "type": "string", "format": "uuid" },
                "projectId": { "type": "string", "format": "uuid" },
                "title": { "type": "string" },
                "status": status,
                "dueDate": timestamp,
                "description": { "type": "string" },
                "createdAt": timestamp,
                "updatedAt": timestamp,
            },
        },
        "CreateTaskRequest": {
            "type": "object",
            "required": ["title"],
            "properties": {
                "title": { "type": "string" },
                "status": status,
                "due_date": timestamp,
                "description": { "type": "string" },
            },
        },
        "UpdateTaskRequest": {
            "type": "object",
            "properties": {
                "title": { "type": "string" },
                "status": status,
                "due_date": timestamp,
                "description": { "type": "string" },
            },
        },
    })
}
