// ABOUTME: Introspection endpoint: verifies a server-issued token against the presented cert
// ABOUTME: Local-key verification; resource servers may also verify via the published JWKS

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Trellis Data Trust

use crate::context::ServerResources;
use crate::errors::AppResult;
use crate::routes::maybe_cert;
use crate::tokens::introspection::{check_token, VerificationMode};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::{Form, Json};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct IntrospectRequest {
    pub token: String,
}

/// POST /api/v1/authorize/introspect
///
/// Every failure is a 401 with its own error code; a passing token answers
/// with its full claim set and `active: true`.
pub async fn introspect(
    State(resources): State<Arc<ServerResources>>,
    headers: HeaderMap,
    Form(request): Form<IntrospectRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let cert = maybe_cert(&headers, &resources);
    let claims = check_token(
        &request.token,
        cert.as_ref(),
        VerificationMode::LocalIntrospection {
            key: &resources.signing_key,
        },
    )
    .await?;

    let mut body = serde_json::Map::new();
    body.insert("active".to_owned(), serde_json::Value::Bool(true));
    body.extend(claims);
    Ok(Json(serde_json::Value::Object(body)))
}
