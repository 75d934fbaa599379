//! User Preferences Lambda - Stores one preferences record per user.
//!
//! Endpoints:
//! - GET /preferences - Get the caller's preferences (empty if never saved)
//! - POST /preferences - Replace the caller's preferences
//! - OPTIONS /preferences - CORS preflight

use lambda_http::http::Method;
use lambda_http::{run, service_fn, Body, Error, Request, RequestExt, Response};
use serde_json::{Map, Value};
use shared::http::{error_response, json_response, preflight_response, MessageBody};
use shared::{
    extract_user_from_context, parse_body, Config, PgPreferencesStore, PreferencesRecord,
    PreferencesStore, SavePreferencesRequest, SavePreferencesResponse,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const UNAUTHORIZED_MESSAGE: &str = "Unauthorized - User ID not found in token";
const ALLOWED_METHODS: &str = "GET, POST, OPTIONS";

/// Application state
struct AppState {
    store: Arc<dyn PreferencesStore>,
    allow_origin: String,
}

impl AppState {
    async fn new() -> Result<Self, Error> {
        let config = Config::from_env()?;

        let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.aws_region.clone()))
            .load()
            .await;
        let secrets_client = aws_sdk_secretsmanager::Client::new(&aws_config);

        let credentials =
            shared::get_database_credentials(&secrets_client, &config.db_secret_arn).await?;
        let pool = shared::db::create_pool(&config, &credentials).await?;

        let store = PgPreferencesStore::new(pool, config.preferences_table.clone());
        store.migrate().await?;

        Ok(Self {
            store: Arc::new(store),
            allow_origin: config.cors_allow_origin,
        })
    }
}

/// Resolve the caller's subject claim.
///
/// REST API authorizers put claims in `authorizer.claims`, HTTP API JWT
/// authorizers in `authorizer.jwt.claims`. Requests no authorizer vouched
/// for have no subject, whatever their `Authorization` header says.
fn resolve_subject(event: &Request) -> Option<String> {
    let authorizer = event
        .request_context_ref()
        .and_then(|context| context.authorizer())?;

    if let Some(user) = authorizer
        .fields
        .get("claims")
        .and_then(|claims| extract_user_from_context(claims).ok())
    {
        return Some(user.user_id);
    }

    authorizer
        .jwt
        .as_ref()
        .and_then(|jwt| jwt.claims.get("sub"))
        .filter(|sub| !sub.is_empty())
        .cloned()
}

/// Accept `{}` for a missing or null `preferences` field; anything but an
/// object is rejected.
fn preferences_object(request: SavePreferencesRequest) -> shared::Result<Map<String, Value>> {
    match request.preferences {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map),
        Some(other) => Err(shared::Error::Validation(format!(
            "Invalid request body: preferences must be an object, got {}",
            json_type_name(&other)
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn failure_response(origin: &str, e: shared::Error) -> Result<Response<Body>, Error> {
    let status = e.status_code();
    match e {
        shared::Error::Validation(message) | shared::Error::Auth(message) => {
            warn!("Rejected request ({}): {}", status, message);
            error_response(status, origin, message)
        }
        e => {
            error!("Preferences store failure: {}", e);
            json_response(
                status,
                origin,
                &MessageBody::with_error("Internal server error", e.to_string()),
            )
        }
    }
}

async fn dispatch(
    state: &AppState,
    method: &Method,
    path: &str,
    subject: Option<String>,
    body: &Body,
) -> Result<Response<Body>, Error> {
    let origin = state.allow_origin.as_str();

    if path.trim_end_matches('/') != "/preferences" {
        return error_response(404, origin, "Not found");
    }

    if method == Method::OPTIONS {
        return preflight_response(origin, ALLOWED_METHODS);
    }

    let Some(user_id) = subject else {
        return error_response(401, origin, UNAUTHORIZED_MESSAGE);
    };

    match *method {
        Method::GET => {
            let record = match state.store.get(&user_id).await {
                Ok(record) => record.unwrap_or_else(|| PreferencesRecord::empty(&user_id)),
                Err(e) => return failure_response(origin, e),
            };

            info!(
                "Loaded preferences for {} ({} keys)",
                user_id,
                record.preferences.len()
            );
            json_response(200, origin, &record)
        }

        Method::POST => {
            let request: SavePreferencesRequest = parse_body!(body, origin);
            let preferences = match preferences_object(request) {
                Ok(preferences) => preferences,
                Err(e) => return failure_response(origin, e),
            };

            let record = match state.store.put(&user_id, preferences).await {
                Ok(record) => record,
                Err(e) => return failure_response(origin, e),
            };

            let Some(updated_at) = record.updated_at else {
                return failure_response(
                    origin,
                    shared::Error::Internal("store returned a record without updatedAt".to_string()),
                );
            };

            info!("Saved preferences for {} at {}", user_id, updated_at);
            json_response(
                200,
                origin,
                &SavePreferencesResponse {
                    message: "Preferences updated successfully".to_string(),
                    preferences: record.preferences,
                    updated_at,
                },
            )
        }

        _ => error_response(405, origin, "Method not allowed"),
    }
}

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    let raw_path = event.uri().path();
    // Strip /api stage prefix if present (API Gateway REST API includes stage in path)
    let path = raw_path.strip_prefix("/api").unwrap_or(raw_path);
    let method = event.method();

    info!("Received request: method={}, path={} (raw: {})", method, path, raw_path);

    let subject = resolve_subject(&event);
    dispatch(&state, method, path, subject, event.body()).await
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let state = Arc::new(AppState::new().await?);

    run(service_fn(move |event| {
        let state = Arc::clone(&state);
        async move { handler(state, event).await }
    }))
    .await
}
