// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Handles environment variables, deployment modes, and runtime configuration parsing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Trellis Data Trust

//! Environment-based configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;

/// Environment type for security and logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
    Testing,
}

impl Environment {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    #[must_use]
    pub const fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Upstream authorization server endpoints and client credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the upstream authorization server
    pub base_url: String,
    /// Token endpoint (defaults to `{base_url}/oauth2/token`)
    pub token_endpoint: String,
    /// Authorization endpoint used for the authorize redirect
    /// (defaults to `{base_url}/oauth2/auth`)
    pub authorization_endpoint: String,
    /// Revocation endpoint (defaults to `{base_url}/oauth2/revoke`)
    pub revocation_endpoint: String,
    /// JWKS document URL (defaults to `{base_url}/.well-known/jwks.json`)
    pub jwks_url: String,
    /// OAuth2 client id registered with the upstream server
    pub client_id: String,
    /// Client secret, when provided directly in the environment
    pub client_secret: Option<String>,
    /// Secret-store parameter holding the client secret, resolved at startup
    pub client_secret_param: Option<String>,
}

/// Server configuration, read once at startup from the environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen port
    pub http_port: u16,
    /// This server's issuer URL (the mTLS-protected origin)
    pub issuer_url: String,
    /// Public origin for endpoints that do not require mTLS
    pub unprotected_url: String,
    /// Deployment environment
    pub environment: Environment,
    /// Log level string passed to the tracing filter
    pub log_level: String,
    /// Upstream authorization server
    pub upstream: UpstreamConfig,
    /// Redirect URI registered for the authorization-code flow
    pub redirect_uri: String,
    /// Redis connection URL backing the PAR store and revocation stream
    pub redis_url: String,
    /// Database URL for the permission ledger
    pub database_url: String,
    /// Ledger table name
    pub ledger_table: String,
    /// Signing-key reference: secret-store parameter or local PEM path
    pub signing_key: String,
    /// Role URI a client certificate must carry to obtain tokens
    pub provider_role: String,
    /// Header conveying the transport-asserted client certificate
    pub cert_header: String,
    /// Re-issue tokens under this server's issuer URL instead of relaying
    /// the upstream `iss`
    pub override_issuer: bool,
    /// Reference to the server's own mTLS client certificate bundle, used
    /// when fetching directory documents and delivering messages
    pub mtls_bundle: Option<String>,
    /// Reference to the private key matching `mtls_bundle`
    pub mtls_key: Option<String>,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or malformed
    pub fn from_env() -> Result<Self> {
        let http_port = env_or("PORT", "8080")
            .parse()
            .context("PORT must be a valid port number")?;

        let upstream_base = env::var("UPSTREAM_OAUTH_URL")
            .context("UPSTREAM_OAUTH_URL environment variable is required")?;

        let upstream = UpstreamConfig {
            token_endpoint: env_or(
                "UPSTREAM_TOKEN_ENDPOINT",
                &format!("{upstream_base}/oauth2/token"),
            ),
            authorization_endpoint: env_or(
                "UPSTREAM_AUTHORIZATION_ENDPOINT",
                &format!("{upstream_base}/oauth2/auth"),
            ),
            revocation_endpoint: env_or(
                "UPSTREAM_REVOCATION_ENDPOINT",
                &format!("{upstream_base}/oauth2/revoke"),
            ),
            jwks_url: env_or(
                "UPSTREAM_JWKS_URL",
                &format!("{upstream_base}/.well-known/jwks.json"),
            ),
            client_id: env::var("UPSTREAM_CLIENT_ID")
                .context("UPSTREAM_CLIENT_ID environment variable is required")?,
            client_secret: env::var("UPSTREAM_CLIENT_SECRET").ok(),
            client_secret_param: env::var("UPSTREAM_CLIENT_SECRET_PARAM").ok(),
            base_url: upstream_base,
        };

        Ok(Self {
            http_port,
            issuer_url: env_or("ISSUER_URL", "https://mtls.auth.trellis.org"),
            unprotected_url: env_or("UNPROTECTED_URL", "https://auth.trellis.org"),
            environment: Environment::from_str_or_default(&env_or("ENV", "dev")),
            log_level: env_or("LOG_LEVEL", "info"),
            upstream,
            redirect_uri: env_or("REDIRECT_URI", "https://accounting.trellis.org/callback"),
            redis_url: env_or("REDIS_URL", "redis://redis:6379"),
            database_url: env_or("DATABASE_URL", "sqlite:data/trellis-auth.db?mode=rwc"),
            ledger_table: env_or("PERMISSIONS_TABLE", "permissions"),
            signing_key: env::var("JWT_SIGNING_KEY")
                .context("JWT_SIGNING_KEY environment variable is required")?,
            provider_role: env_or(
                "PROVIDER_ROLE",
                "https://registry.core.trust.trellis.org/scheme/data-sharing/role/provider",
            ),
            cert_header: env_or("CLIENT_CERT_HEADER", "x-amzn-mtls-clientcert"),
            override_issuer: env_or("OVERRIDE_ISSUER", "true") == "true",
            mtls_bundle: env::var("MTLS_CLIENT_BUNDLE").ok(),
            mtls_key: env::var("MTLS_CLIENT_KEY").ok(),
        })
    }
}
