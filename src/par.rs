// ABOUTME: Pushed-authorization-request staging store with write-once short-TTL semantics
// ABOUTME: Opaque 160-bit tokens mapped to staged parameters in redis, 60 second expiry
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Trellis Data Trust

//! # PAR store
//!
//! Stages a client's pushed authorization parameters under an unguessable
//! opaque token until the authorize redirect step consumes them. Entries are
//! write-once and expire after 60 seconds; expiry bounds the replay window
//! for an intercepted `request_uri`. Missing, expired and malformed entries
//! all surface uniformly as "not found".

use crate::constants::{PAR_KEY_PREFIX, PAR_STORE_TTL_SECS, PAR_TOKEN_BYTES};
use crate::errors::{AppError, AppResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Parameters staged by a pushed authorization request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParRequest {
    pub response_type: String,
    pub client_id: String,
    pub code_challenge: String,
    pub code_challenge_method: String,
    pub redirect_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// Redis-backed PAR store
#[derive(Clone)]
pub struct ParStore {
    manager: ConnectionManager,
}

impl ParStore {
    /// Connect to the backing redis instance
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub async fn connect(redis_url: &str) -> AppResult<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| AppError::config(format!("invalid redis URL: {e}")))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::internal(format!("failed to connect to redis: {e}")))?;
        Ok(Self { manager })
    }

    /// Issue a fresh opaque token: 20 random bytes, base64url unpadded
    #[must_use]
    pub fn issue_token() -> String {
        let mut bytes = [0u8; PAR_TOKEN_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Stage `request` under `token` with the store TTL
    ///
    /// # Errors
    ///
    /// Returns a storage error if the write fails.
    pub async fn store(&self, token: &str, request: &ParRequest) -> AppResult<()> {
        let payload = serde_json::to_string(request)
            .map_err(|e| AppError::internal(format!("failed to serialize PAR entry: {e}")))?;
        let mut conn = self.manager.clone();
        conn.set_ex::<_, _, ()>(format!("{PAR_KEY_PREFIX}{token}"), payload, PAR_STORE_TTL_SECS)
            .await
            .map_err(|e| AppError::storage(format!("failed to store PAR entry: {e}")))?;
        Ok(())
    }

    /// Retrieve the staged parameters for `token`
    ///
    /// Returns `None` uniformly for unknown, expired and malformed entries;
    /// callers treat all three as "invalid or expired request_uri".
    ///
    /// # Errors
    ///
    /// Returns a storage error only when redis itself fails.
    pub async fn retrieve(&self, token: &str) -> AppResult<Option<ParRequest>> {
        let mut conn = self.manager.clone();
        let payload: Option<String> = conn
            .get(format!("{PAR_KEY_PREFIX}{token}"))
            .await
            .map_err(|e| AppError::storage(format!("failed to read PAR entry: {e}")))?;

        Ok(payload.as_deref().and_then(decode_entry))
    }
}

/// Decode a stored entry; malformed payloads collapse to `None`
fn decode_entry(json: &str) -> Option<ParRequest> {
    match serde_json::from_str(json) {
        Ok(request) => Some(request),
        Err(e) => {
            warn!(error = %e, "malformed PAR entry, treating as not found");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_token_entropy() {
        let token = ParStore::issue_token();
        // 20 bytes base64url-unpadded is 27 characters
        assert_eq!(token.len(), 27);
        assert!(!token.contains('='));
        assert_ne!(token, ParStore::issue_token());
    }

    #[test]
    fn test_decode_entry_accepts_stored_shape() {
        let json = r#"{
            "response_type": "code",
            "client_id": "https://directory.trellis.org/application/acme",
            "code_challenge": "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM",
            "code_challenge_method": "S256",
            "redirect_uri": "https://accounting.trellis.org/callback"
        }"#;
        let request = decode_entry(json).unwrap();
        assert_eq!(request.response_type, "code");
        assert!(request.scope.is_none());
    }

    #[test]
    fn test_malformed_entries_collapse_to_none() {
        // truncated JSON, wrong shape, and non-JSON all read as not found
        assert!(decode_entry("{\"response_type\": \"code\"").is_none());
        assert!(decode_entry("{\"unexpected\": true}").is_none());
        assert!(decode_entry("plain text").is_none());
    }

    #[test]
    fn test_par_request_round_trip() {
        let request = ParRequest {
            response_type: "code".to_owned(),
            client_id: "https://directory.trellis.org/application/acme".to_owned(),
            code_challenge: "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM".to_owned(),
            code_challenge_method: "S256".to_owned(),
            redirect_uri: "https://accounting.trellis.org/callback".to_owned(),
            scope: Some("profile".to_owned()),
            state: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(serde_json::from_str::<ParRequest>(&json).unwrap(), request);
        // absent optionals stay off the wire
        assert!(!json.contains("state"));
    }
}
