// ABOUTME: Discovery endpoints: published JWKS and authorization-server metadata
// ABOUTME: Advertises the FAPI posture: PAR required, certificate-bound tokens

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Trellis Data Trust

use crate::context::ServerResources;
use crate::tokens::jwks::published_jwks;
use axum::extract::State;
use axum::Json;
use serde_json::json;
use std::sync::Arc;

/// GET /.well-known/jwks.json
pub async fn jwks(State(resources): State<Arc<ServerResources>>) -> Json<serde_json::Value> {
    let set = published_jwks(&resources.signing_key);
    Json(serde_json::to_value(set).unwrap_or_else(|_| json!({ "keys": [] })))
}

/// GET /.well-known/oauth-authorization-server (RFC 8414)
pub async fn oauth_metadata(
    State(resources): State<Arc<ServerResources>>,
) -> Json<serde_json::Value> {
    let issuer = &resources.config.issuer_url;
    let public = &resources.config.unprotected_url;
    Json(json!({
        "issuer": issuer,
        "authorization_endpoint": format!("{issuer}/api/v1/authorize"),
        "token_endpoint": format!("{issuer}/api/v1/authorize/token"),
        "pushed_authorization_request_endpoint": format!("{issuer}/api/v1/par"),
        "introspection_endpoint": format!("{issuer}/api/v1/authorize/introspect"),
        "revocation_endpoint": format!("{issuer}/api/v1/authorize/revoke"),
        "jwks_uri": format!("{public}/.well-known/jwks.json"),
        "response_types_supported": ["code"],
        "grant_types_supported": ["authorization_code", "refresh_token"],
        "code_challenge_methods_supported": ["S256"],
        "token_endpoint_auth_methods_supported": ["tls_client_auth"],
        "require_pushed_authorization_requests": true,
        "tls_client_certificate_bound_access_tokens": true,
    }))
}
