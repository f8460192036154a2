// ABOUTME: Evidence lookup by the stable id minted at issuance
// ABOUTME: The audit trail endpoint for dispute resolution

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Trellis Data Trust

use crate::context::ServerResources;
use crate::errors::{AppError, AppResult};
use crate::permissions::Permission;
use axum::extract::{Path, State};
use axum::Json;
use std::sync::Arc;

/// GET /api/v1/evidence/:evidence_id
pub async fn lookup(
    State(resources): State<Arc<ServerResources>>,
    Path(evidence_id): Path<String>,
) -> AppResult<Json<Permission>> {
    let permission = resources
        .ledger
        .get_by_evidence_id(&evidence_id)
        .await?
        .ok_or_else(|| AppError::not_found("Evidence record"))?;
    Ok(Json(permission))
}
