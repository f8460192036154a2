// ABOUTME: Revocation message lifecycle: from ledger record through the retry policy
// ABOUTME: Walks a message through repeated failures until abandonment

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Trellis Data Trust

use chrono::{Duration, Utc};
use trellis_auth::constants::MAX_DELIVERY_RETRIES;
use trellis_auth::permissions::Permission;
use trellis_auth::revocation::message::backoff;
use trellis_auth::revocation::worker::{next_action, WorkerAction};
use trellis_auth::revocation::RevocationMessage;
use uuid::Uuid;

fn revoked_permission() -> Permission {
    let now = Utc::now();
    Permission {
        oauth_issuer: "https://oauth.trellis.org".to_owned(),
        client: "https://directory.trellis.org/application/acme".to_owned(),
        license: "https://registry.trellis.org/license/standard".to_owned(),
        account: "account-1".to_owned(),
        last_granted: now - Duration::days(30),
        expires: now + Duration::days(60),
        refresh_token: "rt-1".to_owned(),
        revoked: Some(now),
        data_available_from: now - Duration::days(365),
        token_issued_at: now - Duration::days(30),
        token_expires: now - Duration::days(30) + Duration::hours(1),
        evidence_id: Uuid::new_v4().to_string(),
    }
}

#[test]
fn only_revoked_permissions_produce_messages() {
    let mut permission = revoked_permission();
    let message = RevocationMessage::from_permission(&permission).unwrap();
    assert_eq!(message.retry_count, 0);
    assert!(message.next_retry_at.is_none());
    assert_eq!(message.revoked, permission.revoked.unwrap());

    permission.revoked = None;
    assert!(RevocationMessage::from_permission(&permission).is_none());
}

#[test]
fn envelope_carries_the_ledger_record() {
    let permission = revoked_permission();
    let message = RevocationMessage::from_permission(&permission).unwrap();
    let envelope = message.envelope();

    assert_eq!(envelope["body"]["account"], permission.account);
    assert_eq!(envelope["body"]["client"], permission.client);
    assert_eq!(envelope["body"]["license"], permission.license);
    assert_eq!(envelope["body"]["refreshToken"], permission.refresh_token);
    assert_eq!(envelope["body"]["evidenceId"], permission.evidence_id);
    assert_eq!(
        envelope["body"]["revoked"],
        permission.revoked.unwrap().to_rfc3339()
    );
}

/// Walk a message through repeated delivery failures: each failure defers it
/// by the backoff, each elapsed backoff makes it eligible again, and the
/// ceiling abandons it.
#[test]
fn failed_deliveries_escalate_to_abandonment() {
    let permission = revoked_permission();
    let mut message = RevocationMessage::from_permission(&permission).unwrap();
    let mut now = Utc::now();

    for attempt in 0..MAX_DELIVERY_RETRIES {
        assert_eq!(
            next_action(Some(&message), now),
            WorkerAction::Attempt,
            "attempt {attempt} should run"
        );

        // delivery fails; the retry is scheduled with the next backoff
        message = message.next_attempt(now);
        assert_eq!(message.retry_count, attempt + 1);
        assert_eq!(
            message.next_retry_at,
            Some(now + Duration::seconds(backoff(attempt) as i64))
        );

        // too early: the worker defers
        if message.retry_count < MAX_DELIVERY_RETRIES {
            assert_eq!(next_action(Some(&message), now), WorkerAction::Defer);
        }

        // backoff elapses
        now += Duration::seconds(backoff(attempt) as i64 + 1);
    }

    assert_eq!(next_action(Some(&message), now), WorkerAction::Abandon);
}

#[test]
fn stream_payload_round_trips_with_retry_state() {
    let permission = revoked_permission();
    let message = RevocationMessage::from_permission(&permission)
        .unwrap()
        .next_attempt(Utc::now());

    let payload = serde_json::to_string(&message).unwrap();
    let decoded: RevocationMessage = serde_json::from_str(&payload).unwrap();
    assert_eq!(decoded, message);
    assert_eq!(decoded.retry_count, 1);
}

#[test]
fn legacy_payloads_without_retry_fields_still_decode() {
    // messages enqueued before a worker restart may predate the retry fields
    let payload = serde_json::json!({
        "account": "account-1",
        "client": "https://directory.trellis.org/application/acme",
        "license": "https://registry.trellis.org/license/standard",
        "revoked": "2025-06-01T12:00:00Z",
        "refresh_token": "rt-1",
        "evidence_id": "ev-1",
    });
    let decoded: RevocationMessage = serde_json::from_value(payload).unwrap();
    assert_eq!(decoded.retry_count, 0);
    assert!(decoded.next_retry_at.is_none());
}
