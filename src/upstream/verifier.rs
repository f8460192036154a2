// ABOUTME: Upstream token verification against a fetched JWKS document
// ABOUTME: Caches JWKS per URL with refresh-on-unknown-kid and maps expiry to a distinct error
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Trellis Data Trust

//! # Upstream token verifier
//!
//! Verification flow:
//!
//! 1. Decode the JWT header (no verification) to obtain `kid`.
//! 2. Fetch the JWKS document (cached; refreshed once on unknown `kid`).
//! 3. Verify signature and temporal claims with the algorithm taken from the
//!    JWKS key entry, never from client input, so `alg=none` and algorithm
//!    confusion are structurally impossible.
//!
//! Expired tokens surface as a distinguished time error so the HTTP boundary
//! can tell "get a fresh token" apart from "this token is garbage".

use crate::constants::{DOCUMENT_FETCH_TIMEOUT_SECS, JWKS_CACHE_TTL_SECS};
use crate::errors::{AppError, AppResult};
use dashmap::DashMap;
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};
use std::time::{Duration, Instant};
use tracing::debug;

/// Claims of a decoded token, kept as an open map so every upstream claim
/// survives the enhancement round trip
pub type Claims = Map<String, Value>;

struct CachedJwks {
    keys: JwkSet,
    fetched_at: Instant,
}

impl CachedJwks {
    fn is_stale(&self) -> bool {
        self.fetched_at.elapsed() >= Duration::from_secs(JWKS_CACHE_TTL_SECS)
    }
}

/// JWKS cache, one entry per JWKS URL
pub struct JwksCache {
    inner: DashMap<String, CachedJwks>,
    http: reqwest::Client,
}

impl JwksCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(DOCUMENT_FETCH_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Return the cached JWKS for `jwks_url`, fetching when absent or stale
    async fn get_or_fetch(&self, jwks_url: &str, force_refresh: bool) -> AppResult<JwkSet> {
        if !force_refresh {
            if let Some(cached) = self.inner.get(jwks_url) {
                if !cached.is_stale() {
                    return Ok(cached.keys.clone());
                }
            }
        }

        debug!(jwks_url, "fetching JWKS");
        let jwks: JwkSet = self
            .http
            .get(jwks_url)
            .header("User-Agent", "trellis-auth/0.2")
            .send()
            .await
            .map_err(|e| AppError::upstream(format!("could not fetch JWKS: {e}")))?
            .json()
            .await
            .map_err(|e| AppError::upstream(format!("JWKS document is malformed: {e}")))?;

        self.inner.insert(
            jwks_url.to_owned(),
            CachedJwks {
                keys: jwks.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(jwks)
    }
}

impl Default for JwksCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Verifies upstream-issued bearer tokens
pub struct UpstreamVerifier {
    jwks_cache: JwksCache,
}

impl UpstreamVerifier {
    #[must_use]
    pub fn new() -> Self {
        Self {
            jwks_cache: JwksCache::new(),
        }
    }

    /// Verify `token` against the JWKS at `jwks_url` and return its claims
    ///
    /// # Errors
    ///
    /// - [`crate::ErrorCode::AccessTokenDecoding`] for malformed tokens,
    ///   unknown key ids, or signature failures
    /// - [`crate::ErrorCode::AccessTokenTime`] for expired or not-yet-valid
    ///   tokens
    /// - [`crate::ErrorCode::UpstreamError`] when the JWKS cannot be fetched
    pub async fn decode_with_jwks(&self, token: &str, jwks_url: &str) -> AppResult<Claims> {
        let header = jsonwebtoken::decode_header(token)
            .map_err(|e| AppError::token_decoding(format!("Invalid token: {e}")))?;
        let kid = header
            .kid
            .ok_or_else(|| AppError::token_decoding("Token header has no key ID"))?;

        let (key, algorithm) = self.find_key(&kid, jwks_url).await?;

        // The algorithm comes from the JWKS entry, not the token header
        let mut validation = Validation::new(algorithm);
        validation.validate_aud = false;
        validation.leeway = 0;

        let data = jsonwebtoken::decode::<Claims>(token, &key, &validation).map_err(|e| {
            use jsonwebtoken::errors::ErrorKind;
            match e.kind() {
                ErrorKind::ExpiredSignature => AppError::token_time("Token has expired"),
                ErrorKind::ImmatureSignature => {
                    AppError::token_time("Token is not yet valid")
                }
                _ => AppError::token_decoding(format!("Invalid token: {e}")),
            }
        })?;
        Ok(data.claims)
    }

    /// Find a decoding key by `kid`, refreshing the JWKS once if not found
    async fn find_key(&self, kid: &str, jwks_url: &str) -> AppResult<(DecodingKey, Algorithm)> {
        let jwks = self.jwks_cache.get_or_fetch(jwks_url, false).await?;
        if let Some(found) = key_from_jwks(&jwks, kid)? {
            return Ok(found);
        }

        debug!(kid, "key ID not in cached JWKS, refreshing");
        let jwks = self.jwks_cache.get_or_fetch(jwks_url, true).await?;
        key_from_jwks(&jwks, kid)?
            .ok_or_else(|| AppError::token_decoding(format!("Key ID not found: {kid}")))
    }
}

impl Default for UpstreamVerifier {
    fn default() -> Self {
        Self::new()
    }
}

fn key_from_jwks(jwks: &JwkSet, kid: &str) -> AppResult<Option<(DecodingKey, Algorithm)>> {
    let Some(jwk) = jwks.find(kid) else {
        return Ok(None);
    };
    let key = DecodingKey::from_jwk(jwk)
        .map_err(|e| AppError::token_decoding(format!("Unusable JWKS key entry: {e}")))?;
    Ok(Some((key, algorithm_for(jwk)?)))
}

/// Derive the verification algorithm from the JWKS entry itself
fn algorithm_for(jwk: &Jwk) -> AppResult<Algorithm> {
    if let Some(alg) = jwk.common.key_algorithm {
        if let Ok(algorithm) = alg.to_string().parse() {
            return Ok(algorithm);
        }
    }
    match &jwk.algorithm {
        AlgorithmParameters::EllipticCurve(_) => Ok(Algorithm::ES256),
        AlgorithmParameters::RSA(_) => Ok(Algorithm::RS256),
        AlgorithmParameters::OctetKeyPair(_) => Ok(Algorithm::EdDSA),
        AlgorithmParameters::OctetKey(_) => {
            Err(AppError::token_decoding("Symmetric JWKS keys are not accepted"))
        }
    }
}
