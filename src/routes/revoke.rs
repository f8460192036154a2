// ABOUTME: Revocation endpoint: ledger first, then async notification, then upstream
// ABOUTME: A queue failure is logged but never fails the revocation itself

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Trellis Data Trust

use crate::context::ServerResources;
use crate::errors::AppResult;
use crate::revocation::RevocationMessage;
use crate::routes::require_cert;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::{Form, Json};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Deserialize)]
pub struct RevokeRequest {
    pub token: String,
    /// RFC 7009 hint forwarded to the upstream revocation endpoint
    #[serde(default)]
    pub token_type_hint: Option<String>,
}

impl RevokeRequest {
    fn hint(&self) -> &str {
        self.token_type_hint.as_deref().unwrap_or("refresh_token")
    }
}

/// POST /api/v1/authorize/revoke
///
/// Order matters: the ledger row is flipped before anything else, so the
/// grant is revoked even if notification or the upstream call fails. An
/// unknown token is a 400; upstream failures pass their status through.
pub async fn revoke(
    State(resources): State<Arc<ServerResources>>,
    headers: HeaderMap,
    Form(request): Form<RevokeRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let cert = require_cert(&headers, &resources)?;
    cert.require_role(&resources.config.provider_role)?;

    let permission = resources.ledger.revoke(&request.token).await?;

    match RevocationMessage::from_permission(&permission) {
        Some(message) => {
            if let Err(e) = resources.queue.enqueue(&message).await {
                error!(
                    client = %permission.client,
                    evidence_id = %permission.evidence_id,
                    error = %e,
                    "failed to enqueue revocation message"
                );
            }
        }
        None => error!(
            evidence_id = %permission.evidence_id,
            "revoked permission carries no revocation timestamp"
        ),
    }

    resources
        .upstream
        .revoke(&request.token, request.hint())
        .await?;

    info!(
        account = %permission.account,
        client = %permission.client,
        "permission revoked and upstream notified"
    );
    Ok(Json(json!({ "status": "success" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hint_defaults_to_refresh_token() {
        let request: RevokeRequest = serde_json::from_value(json!({ "token": "rt-1" })).unwrap();
        assert_eq!(request.hint(), "refresh_token");
    }

    #[test]
    fn test_explicit_hint_is_forwarded_verbatim() {
        let request: RevokeRequest = serde_json::from_value(json!({
            "token": "at-1",
            "token_type_hint": "access_token",
        }))
        .unwrap();
        assert_eq!(request.hint(), "access_token");
    }
}
