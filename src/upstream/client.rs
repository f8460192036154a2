// ABOUTME: HTTP client for the upstream authorization server's OAuth2 endpoints
// ABOUTME: Token grants and revocation over form-encoded POSTs with HTTP Basic auth
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Trellis Data Trust

use crate::config::environment::UpstreamConfig;
use crate::errors::{AppError, AppResult};
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

/// Raw token pair issued by the upstream server
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
}

/// Client for the upstream token and revocation endpoints
pub struct UpstreamClient {
    http: reqwest::Client,
    config: UpstreamConfig,
    client_secret: String,
}

impl UpstreamClient {
    #[must_use]
    pub fn new(config: UpstreamConfig, client_secret: String) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            config,
            client_secret,
        }
    }

    /// Exchange an authorization code for a raw token pair
    ///
    /// # Errors
    ///
    /// Returns an upstream error carrying the upstream HTTP status for
    /// passthrough to the caller.
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> AppResult<UpstreamTokenResponse> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("code_verifier", code_verifier),
            ("redirect_uri", redirect_uri),
            ("client_id", &self.config.client_id),
        ])
        .await
    }

    /// Exchange a refresh token for a fresh raw token pair
    ///
    /// # Errors
    ///
    /// Returns an upstream error carrying the upstream HTTP status.
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<UpstreamTokenResponse> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", &self.config.client_id),
        ])
        .await
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> AppResult<UpstreamTokenResponse> {
        let response = self
            .http
            .post(&self.config.token_endpoint)
            .basic_auth(&self.config.client_id, Some(&self.client_secret))
            .form(form)
            .send()
            .await
            .map_err(|e| AppError::upstream(format!("token endpoint unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::upstream_status(status.as_u16(), body));
        }
        response
            .json()
            .await
            .map_err(|e| AppError::upstream(format!("token response is malformed: {e}")))
    }

    /// Revoke a token at the upstream revocation endpoint
    ///
    /// # Errors
    ///
    /// Returns an upstream error carrying the upstream HTTP status.
    pub async fn revoke(&self, token: &str, token_type_hint: &str) -> AppResult<()> {
        let response = self
            .http
            .post(&self.config.revocation_endpoint)
            .basic_auth(&self.config.client_id, Some(&self.client_secret))
            .form(&[("token", token), ("token_type_hint", token_type_hint)])
            .send()
            .await
            .map_err(|e| AppError::upstream(format!("revocation endpoint unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::upstream_status(status.as_u16(), body));
        }
        info!("upstream token revoked");
        Ok(())
    }

    /// JWKS URL of the upstream issuer
    #[must_use]
    pub fn jwks_url(&self) -> &str {
        &self.config.jwks_url
    }
}
