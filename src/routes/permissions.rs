// ABOUTME: Permission lookup by refresh token
// ABOUTME: Providers resolve the grant backing a token they hold

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Trellis Data Trust

use crate::context::ServerResources;
use crate::errors::{AppError, AppResult};
use crate::permissions::Permission;
use crate::routes::require_cert;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct PermissionQuery {
    pub refresh_token: String,
}

/// POST /api/v1/permissions
pub async fn lookup(
    State(resources): State<Arc<ServerResources>>,
    headers: HeaderMap,
    Json(query): Json<PermissionQuery>,
) -> AppResult<Json<Permission>> {
    require_cert(&headers, &resources)?;
    let permission = resources
        .ledger
        .get_by_refresh_token(&query.refresh_token)
        .await?
        .ok_or_else(|| AppError::not_found("Permission"))?;
    Ok(Json(permission))
}
