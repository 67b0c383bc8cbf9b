//! Forward-auth decode endpoint.
//!
//! # Responsibilities
//! - Skip validation for paths outside the configured API prefixes
//! - Report unauthenticated requests with `{validated-header}: false`
//! - Decode bearer tokens and project claims onto response headers
//! - Reject undecodable tokens with 401

use axum::{
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
};

use crate::http::server::AppState;

/// Header set by the fronting proxy with the original request URI.
pub const X_FORWARDED_URI: &str = "x-forwarded-uri";

const BEARER_PREFIX: &str = "Bearer ";

pub async fn decode_token(State(state): State<AppState>, uri: Uri, headers: HeaderMap) -> Response {
    let settings = &state.decode;

    let path = headers
        .get(X_FORWARDED_URI)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_else(|| uri.path());
    if !requires_validation(&settings.validate_api_paths, path) {
        tracing::debug!(path = %path, "path not subject to validation");
        return StatusCode::OK.into_response();
    }

    let Some(auth_value) = headers.get(settings.auth_header.as_str()) else {
        tracing::debug!(header = %settings.auth_header, "no auth header, early exit");
        return validated(&settings.token_validated_header, false, HeaderMap::new());
    };
    let Ok(auth_value) = auth_value.to_str() else {
        tracing::warn!(header = %settings.auth_header, "auth header is not valid text");
        return StatusCode::UNAUTHORIZED.into_response();
    };
    let token = auth_value.strip_prefix(BEARER_PREFIX).unwrap_or(auth_value);

    let decoded = match state.decoder.decode(token).await {
        Ok(decoded) => decoded,
        Err(e) => {
            tracing::warn!(error = %e, "unable to decode token");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    };

    if let Some(username) = &decoded.username {
        tracing::Span::current().record("user", username.as_str());
    }

    let mut claim_headers = HeaderMap::new();
    for (name, value) in &decoded.headers {
        match (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str())) {
            (Ok(name), Ok(value)) => {
                claim_headers.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "claim cannot be sent as a header, skipping"),
        }
    }
    validated(&settings.token_validated_header, true, claim_headers)
}

/// Whether `path` falls under one of the validated prefixes; no prefixes means all paths.
pub fn requires_validation(prefixes: &[String], path: &str) -> bool {
    prefixes.is_empty() || prefixes.iter().any(|prefix| path.starts_with(prefix.as_str()))
}

fn validated(header: &str, value: bool, mut headers: HeaderMap) -> Response {
    let flag = if value { "true" } else { "false" };
    match HeaderName::try_from(header) {
        Ok(name) => {
            headers.insert(name, HeaderValue::from_static(flag));
        }
        Err(e) => tracing::error!(header = %header, error = %e, "invalid token validated header name"),
    }
    (StatusCode::OK, headers).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_validation() {
        let prefixes = vec!["/api/prometheus/".to_string(), "/api/hypercloud/".to_string()];

        assert!(requires_validation(&prefixes, "/api/prometheus/query?q=up"));
        assert!(requires_validation(&prefixes, "/api/hypercloud/namespaces"));
        assert!(!requires_validation(&prefixes, "/static/app.js"));
        assert!(!requires_validation(&prefixes, "/api/prometheus"));
        assert!(requires_validation(&[], "/anything"));
    }
}
