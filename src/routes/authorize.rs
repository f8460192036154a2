// ABOUTME: Authorize redirect: consumes a request_uri and forwards to the upstream server
// ABOUTME: Only staged parameters reach the redirect; browser-supplied ones are ignored

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Trellis Data Trust

use crate::constants::REQUEST_URI_PREFIX;
use crate::context::ServerResources;
use crate::errors::{AppError, AppResult};
use axum::extract::{Query, State};
use axum::http::{header::LOCATION, StatusCode};
use axum::response::Response;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    pub request_uri: String,
}

/// GET /api/v1/authorize?request_uri=urn:ietf:params:oauth:request_uri:...
///
/// 302 to the upstream authorization endpoint with the staged parameters
/// reattached. An unknown or expired request_uri is a 400; the browser has
/// nothing useful to retry with.
pub async fn authorize(
    State(resources): State<Arc<ServerResources>>,
    Query(query): Query<AuthorizeQuery>,
) -> AppResult<Response> {
    let token = query
        .request_uri
        .strip_prefix(REQUEST_URI_PREFIX)
        .ok_or_else(|| AppError::invalid_input("request_uri is not a recognized URN"))?;

    let staged = resources
        .par
        .retrieve(token)
        .await?
        .ok_or_else(|| AppError::invalid_input("request_uri is invalid or has expired"))?;

    let mut location = url::Url::parse(&resources.config.upstream.authorization_endpoint)
        .map_err(|e| AppError::config(format!("invalid upstream authorization endpoint: {e}")))?;
    {
        let mut pairs = location.query_pairs_mut();
        pairs.append_pair("response_type", &staged.response_type);
        pairs.append_pair("client_id", &resources.config.upstream.client_id);
        pairs.append_pair("redirect_uri", &staged.redirect_uri);
        pairs.append_pair("code_challenge", &staged.code_challenge);
        pairs.append_pair("code_challenge_method", &staged.code_challenge_method);
        if let Some(scope) = &staged.scope {
            pairs.append_pair("scope", scope);
        }
        if let Some(state) = &staged.state {
            pairs.append_pair("state", state);
        }
    }

    info!(client_id = %staged.client_id, "forwarding authorization request upstream");
    Response::builder()
        .status(StatusCode::FOUND)
        .header(LOCATION, location.as_str())
        .body(axum::body::Body::empty())
        .map_err(|e| AppError::internal(format!("failed to build redirect: {e}")))
}
