// ABOUTME: Shared server resources constructed once at startup
// ABOUTME: Config, signing key, verifier, upstream client, PAR store, ledger, queue

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Trellis Data Trust

use crate::config::ServerConfig;
use crate::errors::{AppError, AppResult};
use crate::keystore::{Keystore, SigningKey};
use crate::par::ParStore;
use crate::permissions::PermissionLedger;
use crate::revocation::RevocationQueue;
use crate::upstream::{UpstreamClient, UpstreamVerifier};
use tracing::info;

/// Everything a request handler needs, built once and shared behind an `Arc`
pub struct ServerResources {
    pub config: ServerConfig,
    pub signing_key: SigningKey,
    pub verifier: UpstreamVerifier,
    pub upstream: UpstreamClient,
    pub par: ParStore,
    pub ledger: PermissionLedger,
    pub queue: RevocationQueue,
}

impl ServerResources {
    /// Resolve secrets and connect every backing service
    ///
    /// # Errors
    ///
    /// Fails fast on any unresolvable secret or unreachable backing service;
    /// the server never starts partially wired.
    pub async fn build(config: ServerConfig, keystore: &Keystore) -> AppResult<Self> {
        let signing_key = keystore.load_signing_key(&config.signing_key)?;
        info!(kid = %signing_key.kid, "signing key loaded");

        let client_secret = resolve_client_secret(&config, keystore)?;
        let upstream = UpstreamClient::new(config.upstream.clone(), client_secret);
        let verifier = UpstreamVerifier::new();

        let par = ParStore::connect(&config.redis_url).await?;
        let ledger = PermissionLedger::connect(&config.database_url, &config.ledger_table).await?;
        ledger.ensure_table().await?;

        // Enqueue-side queue handle; workers open their own connection so
        // their blocking reads never stall this one
        let queue = RevocationQueue::connect(&config.redis_url, "api").await?;
        queue.ensure_group().await?;

        Ok(Self {
            config,
            signing_key,
            verifier,
            upstream,
            par,
            ledger,
            queue,
        })
    }

    /// Issuer override applied to enhanced tokens, when configured
    #[must_use]
    pub fn issuer_override(&self) -> Option<&str> {
        self.config
            .override_issuer
            .then_some(self.config.issuer_url.as_str())
    }
}

fn resolve_client_secret(config: &ServerConfig, keystore: &Keystore) -> AppResult<String> {
    if let Some(secret) = &config.upstream.client_secret {
        return Ok(secret.clone());
    }
    let param = config
        .upstream
        .client_secret_param
        .as_deref()
        .ok_or_else(|| {
            AppError::config("neither UPSTREAM_CLIENT_SECRET nor UPSTREAM_CLIENT_SECRET_PARAM set")
        })?;
    keystore
        .secret(param)
        .ok_or_else(|| AppError::config(format!("client secret parameter {param} not found")))
}
