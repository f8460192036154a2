// ABOUTME: Permission ledger behavior against an in-memory sqlite database
// ABOUTME: Upsert semantics, all three lookup keys, and revocation monotonicity

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Trellis Data Trust

use chrono::{Duration, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use trellis_auth::permissions::{Permission, PermissionLedger};
use trellis_auth::ErrorCode;
use uuid::Uuid;

async fn ledger() -> PermissionLedger {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let ledger = PermissionLedger::from_pool(pool, "permissions").unwrap();
    ledger.ensure_table().await.unwrap();
    ledger
}

fn permission(account: &str, client: &str, refresh_token: &str) -> Permission {
    let now = Utc::now();
    Permission {
        oauth_issuer: "https://oauth.trellis.org".to_owned(),
        client: client.to_owned(),
        license: "https://registry.trellis.org/license/standard".to_owned(),
        account: account.to_owned(),
        last_granted: now,
        expires: now + Duration::days(90),
        refresh_token: refresh_token.to_owned(),
        revoked: None,
        data_available_from: now - Duration::days(365),
        token_issued_at: now,
        token_expires: now + Duration::hours(1),
        evidence_id: Uuid::new_v4().to_string(),
    }
}

#[tokio::test]
async fn round_trips_by_every_lookup_key() {
    let ledger = ledger().await;
    let stored = permission("account-1", "https://directory.trellis.org/application/acme", "rt-1");
    ledger.put(&stored).await.unwrap();

    let by_pair = ledger
        .get("account-1", "https://directory.trellis.org/application/acme")
        .await
        .unwrap()
        .unwrap();
    let by_token = ledger.get_by_refresh_token("rt-1").await.unwrap().unwrap();
    let by_evidence = ledger
        .get_by_evidence_id(&stored.evidence_id)
        .await
        .unwrap()
        .unwrap();

    // sqlite TEXT storage keeps sub-second precision, so full equality holds
    assert_eq!(by_pair, stored);
    assert_eq!(by_token, stored);
    assert_eq!(by_evidence, stored);
}

#[tokio::test]
async fn missing_records_are_none_not_errors() {
    let ledger = ledger().await;
    assert!(ledger.get("nobody", "nothing").await.unwrap().is_none());
    assert!(ledger.get_by_refresh_token("rt-x").await.unwrap().is_none());
    assert!(ledger.get_by_evidence_id("ev-x").await.unwrap().is_none());
}

#[tokio::test]
async fn regrant_replaces_the_record_for_the_pair() {
    let ledger = ledger().await;
    let client = "https://directory.trellis.org/application/acme";
    let first = permission("account-1", client, "rt-old");
    ledger.put(&first).await.unwrap();

    let second = permission("account-1", client, "rt-new");
    ledger.put(&second).await.unwrap();

    let current = ledger.get("account-1", client).await.unwrap().unwrap();
    assert_eq!(current.refresh_token, "rt-new");
    assert_eq!(current.evidence_id, second.evidence_id);
    // the old refresh token no longer resolves
    assert!(ledger.get_by_refresh_token("rt-old").await.unwrap().is_none());
}

#[tokio::test]
async fn revoke_sets_the_timestamp_and_returns_the_record() {
    let ledger = ledger().await;
    let stored = permission("account-1", "https://directory.trellis.org/application/acme", "rt-1");
    ledger.put(&stored).await.unwrap();

    let revoked = ledger.revoke("rt-1").await.unwrap();
    assert!(revoked.revoked.is_some());
    assert_eq!(revoked.evidence_id, stored.evidence_id);

    // the flip is durable
    let reread = ledger.get_by_refresh_token("rt-1").await.unwrap().unwrap();
    assert_eq!(reread.revoked, revoked.revoked);

    // revoking twice stays revoked
    let again = ledger.revoke("rt-1").await.unwrap();
    assert!(again.revoked.is_some());
}

#[tokio::test]
async fn hostile_table_names_are_rejected_at_construction() {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let err = PermissionLedger::from_pool(pool, "permissions; DROP TABLE permissions").unwrap_err();
    assert_eq!(err.code, ErrorCode::ConfigError);
}

#[tokio::test]
async fn revoking_an_unknown_token_is_a_revocation_error() {
    let ledger = ledger().await;
    let err = ledger.revoke("rt-unknown").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::PermissionRevocation);
    assert_eq!(err.http_status(), 400);
}

#[tokio::test]
async fn regrant_after_revocation_clears_the_flag() {
    let ledger = ledger().await;
    let client = "https://directory.trellis.org/application/acme";
    ledger.put(&permission("account-1", client, "rt-1")).await.unwrap();
    ledger.revoke("rt-1").await.unwrap();

    ledger.put(&permission("account-1", client, "rt-2")).await.unwrap();
    let current = ledger.get("account-1", client).await.unwrap().unwrap();
    assert!(current.revoked.is_none());
}
