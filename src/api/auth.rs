//! Optional HTTP Basic gate in front of `/mcp`

use axum::extract::{Request, State};
use axum::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine;
use std::sync::Arc;

use crate::config::Credentials;

pub async fn require_basic_auth(
    State(expected): State<Arc<Credentials>>,
    request: Request,
    next: Next,
) -> Response {
    let supplied = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_basic);

    match supplied {
        Some(creds) if credentials_match(&creds, &expected) => next.run(request).await,
        _ => {
            tracing::warn!(path = %request.uri().path(), "Rejected request without valid credentials");
            (
                StatusCode::UNAUTHORIZED,
                [(WWW_AUTHENTICATE, "Basic realm=\"workflow-mcp\"")],
                "Unauthorized",
            )
                .into_response()
        }
    }
}

fn parse_basic(header: &str) -> Option<Credentials> {
    let (scheme, encoded) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (username, password) = text.split_once(':')?;
    Some(Credentials {
        username: username.to_string(),
        password: password.to_string(),
    })
}

fn credentials_match(supplied: &Credentials, expected: &Credentials) -> bool {
    // Evaluate both halves so timing does not reveal which one differed.
    let user = constant_time_eq(supplied.username.as_bytes(), expected.username.as_bytes());
    let pass = constant_time_eq(supplied.password.as_bytes(), expected.password.as_bytes());
    user & pass
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
