// ABOUTME: Pushed authorization request endpoint (RFC 9126)
// ABOUTME: Stages client parameters and answers with an opaque request_uri

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Trellis Data Trust

use crate::constants::{PAR_ADVERTISED_EXPIRES_IN, REQUEST_URI_PREFIX};
use crate::context::ServerResources;
use crate::errors::{AppError, AppResult};
use crate::par::ParRequest;
use crate::routes::require_cert;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::{Form, Json};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct ParResponse {
    pub request_uri: String,
    pub expires_in: u64,
}

/// POST /api/v1/par
///
/// Clients authenticate by mTLS alone; the staged parameters are replayed at
/// the authorize step, so nothing the browser later carries can alter them.
pub async fn push_authorization_request(
    State(resources): State<Arc<ServerResources>>,
    headers: HeaderMap,
    Form(request): Form<ParRequest>,
) -> AppResult<(StatusCode, Json<ParResponse>)> {
    require_cert(&headers, &resources)?;

    if request.response_type != "code" {
        return Err(AppError::invalid_input("response_type must be \"code\""));
    }
    if request.code_challenge_method != "S256" {
        return Err(AppError::invalid_input(
            "code_challenge_method must be \"S256\"",
        ));
    }

    let token = crate::par::ParStore::issue_token();
    resources.par.store(&token, &request).await?;

    info!(client_id = %request.client_id, "authorization request staged");
    Ok((
        StatusCode::CREATED,
        Json(ParResponse {
            request_uri: format!("{REQUEST_URI_PREFIX}{token}"),
            expires_in: PAR_ADVERTISED_EXPIRES_IN,
        }),
    ))
}
