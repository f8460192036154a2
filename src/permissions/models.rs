// ABOUTME: The Permission record: one grant of account data to a client application
// ABOUTME: Built from enhanced token claims at issuance time, camelCase on the wire

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Trellis Data Trust

use crate::errors::{AppError, AppResult};
use crate::tokens::Claims;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A grant of one account's data to one client application
///
/// The (account, client) pair is the natural key; re-granting replaces the
/// previous record wholesale, including clearing any earlier revocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    /// Upstream issuer the grant was obtained from
    pub oauth_issuer: String,
    /// Client application URI, from the directory certificate
    pub client: String,
    /// License URI governing the grant
    pub license: String,
    /// Account identifier (upstream `sub`)
    pub account: String,
    /// When the grant was last (re-)issued
    pub last_granted: DateTime<Utc>,
    /// When the grant lapses
    pub expires: DateTime<Utc>,
    /// Refresh token held by the client for this grant
    pub refresh_token: String,
    /// Set once the account holder withdraws the grant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked: Option<DateTime<Utc>>,
    /// Earliest point of data covered by the grant
    pub data_available_from: DateTime<Utc>,
    /// `iat` of the issued access token
    pub token_issued_at: DateTime<Utc>,
    /// `exp` of the issued access token
    pub token_expires: DateTime<Utc>,
    /// Stable evidence record identifier, minted at issuance
    pub evidence_id: String,
}

impl Permission {
    /// Build a permission record from enhanced token claims
    ///
    /// The license comes from the first scope token (`scp` array or
    /// space-separated `scope` string). A fresh evidence id is minted here;
    /// it never changes for the life of the record.
    ///
    /// # Errors
    ///
    /// Fails when a required claim (`iss`, `client_id`, `sub`, `iat`, `exp`,
    /// scope) is missing or malformed.
    pub fn from_claims(claims: &Claims, refresh_token: &str) -> AppResult<Self> {
        let issuer = required_str(claims, "iss")?;
        let client = required_str(claims, "client_id")?;
        let account = required_str(claims, "sub")?;
        let issued_at = required_timestamp(claims, "iat")?;
        let expires = required_timestamp(claims, "exp")?;
        let license = first_scope(claims)
            .ok_or_else(|| AppError::invalid_input("Token has no scope claim"))?;

        Ok(Self {
            oauth_issuer: issuer.to_owned(),
            client: client.to_owned(),
            license,
            account: account.to_owned(),
            last_granted: issued_at,
            expires,
            refresh_token: refresh_token.to_owned(),
            revoked: None,
            // data availability starts when the grant is recorded, not at
            // the token's iat
            data_available_from: Utc::now(),
            token_issued_at: issued_at,
            token_expires: expires,
            evidence_id: Uuid::new_v4().to_string(),
        })
    }
}

fn required_str<'a>(claims: &'a Claims, name: &str) -> AppResult<&'a str> {
    claims
        .get(name)
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| AppError::invalid_input(format!("Token has no {name} claim")))
}

fn required_timestamp(claims: &Claims, name: &str) -> AppResult<DateTime<Utc>> {
    let secs = claims
        .get(name)
        .and_then(serde_json::Value::as_i64)
        .ok_or_else(|| AppError::invalid_input(format!("Token has no {name} claim")))?;
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| AppError::invalid_input(format!("Token {name} claim out of range")))
}

/// First scope token, whether `scp` is a JSON array or `scope` a
/// space-separated string
fn first_scope(claims: &Claims) -> Option<String> {
    if let Some(scp) = claims.get("scp").and_then(serde_json::Value::as_array) {
        return scp.first()?.as_str().map(ToOwned::to_owned);
    }
    claims
        .get("scope")
        .and_then(serde_json::Value::as_str)?
        .split_whitespace()
        .next()
        .map(ToOwned::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims_fixture() -> Claims {
        serde_json::from_value(json!({
            "iss": "https://oauth.trellis.org",
            "client_id": "https://directory.trellis.org/application/acme",
            "sub": "account-123",
            "iat": 1_750_000_000,
            "exp": 1_750_003_600,
            "scp": ["https://registry.trellis.org/license/standard", "profile"],
        }))
        .unwrap()
    }

    #[test]
    fn test_from_claims() {
        let before = Utc::now();
        let permission = Permission::from_claims(&claims_fixture(), "refresh-abc").unwrap();
        assert_eq!(permission.account, "account-123");
        assert_eq!(
            permission.license,
            "https://registry.trellis.org/license/standard"
        );
        assert_eq!(permission.refresh_token, "refresh-abc");
        assert_eq!(permission.token_issued_at.timestamp(), 1_750_000_000);
        assert_eq!(permission.token_expires.timestamp(), 1_750_003_600);
        assert!(permission.revoked.is_none());
        assert!(Uuid::parse_str(&permission.evidence_id).is_ok());
        // availability starts at recording time, not at the token's iat
        assert!(permission.data_available_from >= before);
        assert!(permission.data_available_from > permission.token_issued_at);
    }

    #[test]
    fn test_from_claims_scope_string_fallback() {
        let mut claims = claims_fixture();
        claims.remove("scp");
        claims.insert(
            "scope".to_owned(),
            json!("https://registry.trellis.org/license/basic profile"),
        );
        let permission = Permission::from_claims(&claims, "r").unwrap();
        assert_eq!(
            permission.license,
            "https://registry.trellis.org/license/basic"
        );
    }

    #[test]
    fn test_from_claims_missing_sub() {
        let mut claims = claims_fixture();
        claims.remove("sub");
        let err = Permission::from_claims(&claims, "r").unwrap_err();
        assert_eq!(err.code, crate::errors::ErrorCode::InvalidInput);
    }

    #[test]
    fn test_wire_shape_is_camel_case() {
        let permission = Permission::from_claims(&claims_fixture(), "refresh-abc").unwrap();
        let json = serde_json::to_value(&permission).unwrap();
        assert!(json.get("oauthIssuer").is_some());
        assert!(json.get("lastGranted").is_some());
        assert!(json.get("evidenceId").is_some());
        // unrevoked records omit the field entirely
        assert!(json.get("revoked").is_none());
    }
}
