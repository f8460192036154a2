// ABOUTME: Published JWKS document for this server's ES256 signing key
// ABOUTME: P-256 public coordinates under the fixed key id
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Trellis Data Trust

use crate::constants::SIGNING_ALG;
use crate::keystore::SigningKey;
use serde::{Deserialize, Serialize};

/// JWK entry for the published JWKS endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonWebKey {
    /// Key type (always "EC")
    pub kty: String,
    /// Curve (always "P-256")
    pub crv: String,
    /// Key ID for rotation tracking
    pub kid: String,
    /// Public key use (always "sig")
    #[serde(rename = "use")]
    pub key_use: String,
    /// Algorithm (ES256)
    pub alg: String,
    /// X coordinate (base64url, unpadded, 32 bytes big-endian)
    pub x: String,
    /// Y coordinate (base64url, unpadded, 32 bytes big-endian)
    pub y: String,
}

/// JWKS container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonWebKeySet {
    pub keys: Vec<JsonWebKey>,
}

/// Build the JWKS document published at `/.well-known/jwks.json`
#[must_use]
pub fn published_jwks(key: &SigningKey) -> JsonWebKeySet {
    JsonWebKeySet {
        keys: vec![JsonWebKey {
            kty: "EC".to_owned(),
            crv: "P-256".to_owned(),
            kid: key.kid.clone(),
            key_use: "sig".to_owned(),
            alg: SIGNING_ALG.to_owned(),
            x: key.jwk_x.clone(),
            y: key.jwk_y.clone(),
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::tests::test_key_pem;

    #[test]
    fn test_published_jwks_shape() {
        let key = SigningKey::from_pem(&test_key_pem()).unwrap();
        let set = published_jwks(&key);
        assert_eq!(set.keys.len(), 1);

        let json = serde_json::to_value(&set).unwrap();
        let entry = &json["keys"][0];
        assert_eq!(entry["kty"], "EC");
        assert_eq!(entry["crv"], "P-256");
        assert_eq!(entry["kid"], "1");
        assert_eq!(entry["use"], "sig");
        assert_eq!(entry["alg"], "ES256");
        // 32-byte coordinates, base64url unpadded
        assert_eq!(entry["x"].as_str().unwrap().len(), 43);
        assert_eq!(entry["y"].as_str().unwrap().len(), 43);
    }
}
