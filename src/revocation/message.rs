// ABOUTME: The revocation message carried on the stream and delivered to clients
// ABOUTME: Trust-framework envelope shape plus retry bookkeeping fields

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Trellis Data Trust

use crate::constants::{BACKOFF_BASE_SECS, BACKOFF_CAP_SECS, REVOKE_MESSAGE_SUBJECT, TRUST_FRAMEWORK_URL};
use crate::permissions::Permission;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// A pending revocation notification
///
/// `retry_count` and `next_retry_at` travel with the message; the stream
/// itself stays a plain FIFO and all retry policy lives in the payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RevocationMessage {
    pub account: String,
    pub client: String,
    pub license: String,
    pub revoked: DateTime<Utc>,
    pub refresh_token: String,
    pub evidence_id: String,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_retry_at: Option<DateTime<Utc>>,
}

impl RevocationMessage {
    /// Build the first-attempt message for a just-revoked permission
    ///
    /// Returns `None` when the record carries no revocation timestamp; only
    /// revoked permissions produce messages.
    #[must_use]
    pub fn from_permission(permission: &Permission) -> Option<Self> {
        Some(Self {
            account: permission.account.clone(),
            client: permission.client.clone(),
            license: permission.license.clone(),
            revoked: permission.revoked?,
            refresh_token: permission.refresh_token.clone(),
            evidence_id: permission.evidence_id.clone(),
            retry_count: 0,
            next_retry_at: None,
        })
    }

    /// The trust-framework envelope posted to the client's delivery endpoint
    #[must_use]
    pub fn envelope(&self) -> serde_json::Value {
        json!({
            "message": TRUST_FRAMEWORK_URL,
            "subject": REVOKE_MESSAGE_SUBJECT,
            "body": {
                "account": self.account,
                "client": self.client,
                "license": self.license,
                "revoked": self.revoked.to_rfc3339(),
                "refreshToken": self.refresh_token,
                "evidenceId": self.evidence_id,
            },
        })
    }

    /// The message to re-enqueue after a failed delivery attempt
    #[must_use]
    pub fn next_attempt(&self, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.retry_count = self.retry_count + 1;
        next.next_retry_at = Some(now + chrono::Duration::seconds(backoff(self.retry_count) as i64));
        next
    }
}

/// Delay before retry `n + 1`: 1s, 2s, 4s, ... capped at five minutes
#[must_use]
pub fn backoff(retry_count: u32) -> u64 {
    BACKOFF_BASE_SECS
        .checked_shl(retry_count)
        .unwrap_or(BACKOFF_CAP_SECS)
        .min(BACKOFF_CAP_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn message_fixture() -> RevocationMessage {
        RevocationMessage {
            account: "account-123".to_owned(),
            client: "https://directory.trellis.org/application/acme".to_owned(),
            license: "https://registry.trellis.org/license/standard".to_owned(),
            revoked: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
            refresh_token: "refresh-abc".to_owned(),
            evidence_id: "6f8b0a3e-0000-4000-8000-000000000000".to_owned(),
            retry_count: 0,
            next_retry_at: None,
        }
    }

    #[test]
    fn test_backoff_schedule() {
        assert_eq!(backoff(0), 1);
        assert_eq!(backoff(1), 2);
        assert_eq!(backoff(4), 16);
        assert_eq!(backoff(8), 256);
        assert_eq!(backoff(9), 300);
        assert_eq!(backoff(63), 300);
        assert_eq!(backoff(200), 300);
    }

    #[test]
    fn test_next_attempt_increments_and_schedules() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let first = message_fixture().next_attempt(now);
        assert_eq!(first.retry_count, 1);
        assert_eq!(first.next_retry_at, Some(now + chrono::Duration::seconds(1)));

        let second = first.next_attempt(now);
        assert_eq!(second.retry_count, 2);
        assert_eq!(second.next_retry_at, Some(now + chrono::Duration::seconds(2)));
    }

    #[test]
    fn test_envelope_shape() {
        let envelope = message_fixture().envelope();
        assert_eq!(envelope["message"], TRUST_FRAMEWORK_URL);
        assert_eq!(envelope["subject"], REVOKE_MESSAGE_SUBJECT);
        assert_eq!(envelope["body"]["account"], "account-123");
        assert_eq!(envelope["body"]["refreshToken"], "refresh-abc");
        // retry bookkeeping never leaks into the delivered envelope
        assert!(envelope["body"].get("retryCount").is_none());
    }
}
