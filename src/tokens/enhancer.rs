// ABOUTME: The certificate-binding engine: merges upstream claims with the presented cert
// ABOUTME: Re-signs the result as a server-issued ES256 JWT with cnf.x5t#S256
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Trellis Data Trust

//! # Token enhancer
//!
//! Takes a verified upstream token and the client's transport-asserted
//! certificate, and produces a certificate-bound token signed with this
//! server's own key. The thumbprint is always recomputed from the presented
//! certificate: a token stolen without the matching private key must be
//! useless, so no client-supplied binding value is ever trusted.

use crate::constants::SIGNING_KID;
use crate::directory::ClientCert;
use crate::errors::{AppError, AppResult};
use crate::keystore::SigningKey;
use crate::tokens::Claims;
use crate::upstream::UpstreamVerifier;
use jsonwebtoken::{Algorithm, Header};
use serde_json::json;
use tracing::info;

/// Merge certificate-derived claims into verified upstream claims
///
/// Sets `cnf.x5t#S256` to the presented certificate's thumbprint and
/// `client_id` to the directory application identifier (authoritative: it is
/// transport-bound, unlike whatever the upstream token asserted). When
/// `issuer_override` is set, `iss` is replaced with this server's issuer URL.
///
/// # Errors
///
/// Fails when the certificate carries no application identifier.
pub fn bind_certificate(
    claims: &mut Claims,
    cert: &ClientCert,
    issuer_override: Option<&str>,
) -> AppResult<()> {
    claims.insert(
        "cnf".to_owned(),
        json!({ "x5t#S256": cert.thumbprint() }),
    );
    claims.insert("client_id".to_owned(), json!(cert.application()?));
    if let Some(issuer) = issuer_override {
        claims.insert("iss".to_owned(), json!(issuer));
    }
    Ok(())
}

/// Verify an upstream token and bind it to the presented certificate
///
/// # Errors
///
/// Any verification failure aborts the whole operation; there is no partial
/// enhancement.
pub async fn enhance(
    verifier: &UpstreamVerifier,
    upstream_token: &str,
    cert: &ClientCert,
    jwks_url: &str,
    issuer_override: Option<&str>,
) -> AppResult<Claims> {
    info!("creating enhanced access token");
    let mut claims = verifier.decode_with_jwks(upstream_token, jwks_url).await?;
    bind_certificate(&mut claims, cert, issuer_override)?;
    Ok(claims)
}

/// Sign claims as a server-issued ES256 JWT with the fixed key id header
///
/// # Errors
///
/// A signing failure is fatal for the request (HTTP 5xx), never retried
/// inline.
pub fn sign(claims: &Claims, key: &SigningKey) -> AppResult<String> {
    let mut header = Header::new(Algorithm::ES256);
    header.kid = Some(SIGNING_KID.to_owned());
    jsonwebtoken::encode(&header, claims, key.encoding_key())
        .map_err(|e| AppError::internal(format!("failed to sign access token: {e}")))
}
