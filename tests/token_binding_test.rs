// ABOUTME: End-to-end certificate binding: bind, sign, verify, and every failure mode
// ABOUTME: Exercises the issue path and the check-token mirror against real certificates

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Trellis Data Trust

mod common;

use chrono::Utc;
use common::{directory_cert, provider_cert, ACME_APPLICATION, PROVIDER_ROLE};
use serde_json::json;
use trellis_auth::directory::ClientCert;
use trellis_auth::keystore::SigningKey;
use trellis_auth::tokens::enhancer::{bind_certificate, sign};
use trellis_auth::tokens::introspection::{check_token, VerificationMode};
use trellis_auth::tokens::Claims;
use trellis_auth::ErrorCode;

fn signing_key() -> SigningKey {
    SigningKey::from_pem(&common::signing_key_pem()).unwrap()
}

fn base_claims() -> Claims {
    let now = Utc::now().timestamp();
    serde_json::from_value(json!({
        "iss": "https://oauth.trellis.org",
        "sub": "account-123",
        "iat": now - 10,
        "exp": now + 3600,
        "scp": ["https://registry.trellis.org/license/standard"],
    }))
    .unwrap()
}

fn issue(claims: &mut Claims, cert: &ClientCert, key: &SigningKey) -> String {
    bind_certificate(claims, cert, Some("https://mtls.auth.trellis.org")).unwrap();
    sign(claims, key).unwrap()
}

#[tokio::test]
async fn bound_token_verifies_with_matching_certificate() {
    let key = signing_key();
    let cert = provider_cert();
    let token = issue(&mut base_claims(), &cert, &key);

    let claims = check_token(
        &token,
        Some(&cert),
        VerificationMode::LocalIntrospection { key: &key },
    )
    .await
    .unwrap();

    assert_eq!(claims["client_id"], ACME_APPLICATION);
    assert_eq!(claims["iss"], "https://mtls.auth.trellis.org");
    assert_eq!(claims["cnf"]["x5t#S256"], cert.thumbprint());
}

#[tokio::test]
async fn bound_token_rejects_different_certificate() {
    let key = signing_key();
    let issued_with = provider_cert();
    // same application, different key pair, so a different thumbprint
    let presented = directory_cert(Some(ACME_APPLICATION), &[PROVIDER_ROLE]);
    assert_ne!(issued_with.thumbprint(), presented.thumbprint());

    let token = issue(&mut base_claims(), &issued_with, &key);
    let err = check_token(
        &token,
        Some(&presented),
        VerificationMode::LocalIntrospection { key: &key },
    )
    .await
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::AccessTokenCertificate);
}

#[tokio::test]
async fn token_without_binding_claim_is_rejected() {
    let key = signing_key();
    let cert = provider_cert();
    let mut claims = base_claims();
    // a client_id claim alone is not a binding
    claims.insert("client_id".to_owned(), json!(ACME_APPLICATION));
    let token = sign(&claims, &key).unwrap();

    let err = check_token(
        &token,
        Some(&cert),
        VerificationMode::LocalIntrospection { key: &key },
    )
    .await
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::AccessTokenCertificate);
}

#[tokio::test]
async fn missing_certificate_is_rejected_before_decoding() {
    let key = signing_key();
    let err = check_token(
        "not-even-a-token",
        None,
        VerificationMode::LocalIntrospection { key: &key },
    )
    .await
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::CertificateMissing);
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let key = signing_key();
    let cert = provider_cert();
    let mut claims = base_claims();
    let now = Utc::now().timestamp();
    claims.insert("exp".to_owned(), json!(now - 60));
    let token = issue(&mut claims, &cert, &key);

    let err = check_token(
        &token,
        Some(&cert),
        VerificationMode::LocalIntrospection { key: &key },
    )
    .await
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::AccessTokenTime);
}

#[tokio::test]
async fn future_issued_token_is_rejected() {
    let key = signing_key();
    let cert = provider_cert();
    let mut claims = base_claims();
    let now = Utc::now().timestamp();
    claims.insert("iat".to_owned(), json!(now + 600));
    let token = issue(&mut claims, &cert, &key);

    let err = check_token(
        &token,
        Some(&cert),
        VerificationMode::LocalIntrospection { key: &key },
    )
    .await
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::AccessTokenTime);
}

#[tokio::test]
async fn client_id_mismatch_is_rejected() {
    let key = signing_key();
    let cert = provider_cert();
    let mut claims = base_claims();
    bind_certificate(&mut claims, &cert, None).unwrap();
    claims.insert(
        "client_id".to_owned(),
        json!("https://directory.trellis.org/application/other"),
    );
    let token = sign(&claims, &key).unwrap();

    let err = check_token(
        &token,
        Some(&cert),
        VerificationMode::LocalIntrospection { key: &key },
    )
    .await
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::AccessTokenAudience);
}

#[tokio::test]
async fn tampered_token_fails_signature_check() {
    let key = signing_key();
    let cert = provider_cert();
    let token = issue(&mut base_claims(), &cert, &key);
    let tampered = format!("{}A", &token[..token.len() - 1]);

    let err = check_token(
        &tampered,
        Some(&cert),
        VerificationMode::LocalIntrospection { key: &key },
    )
    .await
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::AccessTokenDecoding);
}

#[test]
fn thumbprints_are_deterministic_per_certificate() {
    let a = provider_cert();
    let b = provider_cert();
    assert_eq!(a.thumbprint(), a.thumbprint());
    assert_ne!(a.thumbprint(), b.thumbprint());
}

#[test]
fn certificate_without_application_refuses_to_identify() {
    let cert = directory_cert(None, &[PROVIDER_ROLE]);
    let err = cert.application().unwrap_err();
    assert_eq!(err.code, ErrorCode::CertificateMissing);
}

#[test]
fn role_enforcement_distinguishes_missing_from_wrong() {
    let no_roles = directory_cert(Some(ACME_APPLICATION), &[]);
    assert_eq!(
        no_roles.require_role(PROVIDER_ROLE).unwrap_err().code,
        ErrorCode::CertificateRoleMissing
    );

    let consumer = directory_cert(
        Some(ACME_APPLICATION),
        &["https://registry.core.trust.trellis.org/scheme/data-sharing/role/consumer"],
    );
    assert_eq!(
        consumer.require_role(PROVIDER_ROLE).unwrap_err().code,
        ErrorCode::CertificateRole
    );

    provider_cert().require_role(PROVIDER_ROLE).unwrap();
}
