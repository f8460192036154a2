// ABOUTME: Token endpoint: exchanges grants upstream and issues certificate-bound tokens
// ABOUTME: Records every successful issuance in the permission ledger

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Trellis Data Trust

use crate::context::ServerResources;
use crate::errors::{AppError, AppResult};
use crate::permissions::Permission;
use crate::routes::require_cert;
use crate::tokens::enhancer;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::{Form, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub grant_type: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub code_verifier: Option<String>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// POST /api/v1/authorize/token
///
/// The presented certificate must carry the provider role; the issued token
/// is bound to that certificate regardless of what the upstream token said.
pub async fn token(
    State(resources): State<Arc<ServerResources>>,
    headers: HeaderMap,
    Form(request): Form<TokenRequest>,
) -> AppResult<Json<TokenResponse>> {
    let cert = require_cert(&headers, &resources)?;
    cert.require_role(&resources.config.provider_role)?;

    let upstream = match request.grant_type.as_str() {
        "authorization_code" => {
            let code = request
                .code
                .as_deref()
                .ok_or_else(|| AppError::invalid_input("code is required"))?;
            let verifier = request
                .code_verifier
                .as_deref()
                .ok_or_else(|| AppError::invalid_input("code_verifier is required"))?;
            let redirect_uri = request
                .redirect_uri
                .as_deref()
                .unwrap_or(&resources.config.redirect_uri);
            resources
                .upstream
                .exchange_code(code, verifier, redirect_uri)
                .await?
        }
        "refresh_token" => {
            let refresh_token = request
                .refresh_token
                .as_deref()
                .ok_or_else(|| AppError::invalid_input("refresh_token is required"))?;
            resources.upstream.refresh(refresh_token).await?
        }
        other => {
            return Err(AppError::invalid_input(format!(
                "unsupported grant_type: {other}"
            )))
        }
    };

    let claims = enhancer::enhance(
        &resources.verifier,
        &upstream.access_token,
        &cert,
        resources.upstream.jwks_url(),
        resources.issuer_override(),
    )
    .await?;
    let access_token = enhancer::sign(&claims, &resources.signing_key)?;

    // A ledger write failure loses the evidence trail but never fails the
    // issuance the client already paid for upstream
    match &upstream.refresh_token {
        Some(refresh_token) => match Permission::from_claims(&claims, refresh_token) {
            Ok(permission) => {
                if let Err(e) = resources.ledger.put(&permission).await {
                    warn!(error = %e, "failed to record permission");
                } else {
                    info!(
                        account = %permission.account,
                        client = %permission.client,
                        "permission recorded"
                    );
                }
            }
            Err(e) => warn!(error = %e, "token claims do not form a permission record"),
        },
        None => warn!("upstream issued no refresh token, permission not recorded"),
    }

    Ok(Json(TokenResponse {
        access_token,
        token_type: "Bearer",
        refresh_token: upstream.refresh_token.clone(),
    }))
}
