//! HTTP helpers for Lambda functions.

use lambda_http::{Body, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Message-only response body, e.g. `{"message": "Method not allowed"}`.
#[derive(Debug, Serialize)]
pub struct MessageBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MessageBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error: None,
        }
    }

    pub fn with_error(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error: Some(error.into()),
        }
    }
}

/// Create a JSON response with the given status code and data.
///
/// Every response carries the cross-origin header so browsers on any
/// allowed origin can read it.
pub fn json_response<T: Serialize>(
    status: u16,
    allow_origin: &str,
    data: &T,
) -> Result<Response<Body>, lambda_http::Error> {
    let response = Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .header("access-control-allow-origin", allow_origin)
        .body(Body::from(serde_json::to_string(data)?))
        .map_err(Box::new)?;

    Ok(response)
}

/// Create an error response with the given status code and message.
pub fn error_response(
    status: u16,
    allow_origin: &str,
    message: impl Into<String>,
) -> Result<Response<Body>, lambda_http::Error> {
    json_response(status, allow_origin, &MessageBody::new(message))
}

/// Answer a CORS preflight request.
pub fn preflight_response(
    allow_origin: &str,
    allow_methods: &str,
) -> Result<Response<Body>, lambda_http::Error> {
    let response = Response::builder()
        .status(204)
        .header("access-control-allow-origin", allow_origin)
        .header("access-control-allow-methods", allow_methods)
        .header("access-control-allow-headers", "authorization, content-type")
        .body(Body::Empty)
        .map_err(Box::new)?;

    Ok(response)
}

/// Parse request body as JSON, returning a 400 response on failure.
///
/// An empty body parses as JSON `{}` so callers can rely on field defaults.
/// Returns `Ok(Ok(T))` on successful parse, `Ok(Err(Response))` on parse error (400),
/// or `Err(lambda_http::Error)` on serialization failure.
pub fn parse_json_body<T: DeserializeOwned>(
    body: &Body,
    allow_origin: &str,
) -> Result<Result<T, Response<Body>>, lambda_http::Error> {
    let bytes: &[u8] = body.as_ref();
    let bytes = if bytes.iter().all(u8::is_ascii_whitespace) {
        b"{}".as_slice()
    } else {
        bytes
    };

    match serde_json::from_slice(bytes) {
        Ok(parsed) => Ok(Ok(parsed)),
        Err(e) => {
            let response =
                error_response(400, allow_origin, format!("Invalid request body: {}", e))?;
            Ok(Err(response))
        }
    }
}

/// Macro to parse request body, returning early with 400 on parse error.
///
/// Usage:
/// ```ignore
/// let request: MyRequest = parse_body!(event.body(), &config.cors_allow_origin);
/// ```
#[macro_export]
macro_rules! parse_body {
    ($body:expr, $origin:expr) => {
        match shared::http::parse_json_body($body, $origin)? {
            Ok(parsed) => parsed,
            Err(response) => return Ok(response),
        }
    };
}
