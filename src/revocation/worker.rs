// ABOUTME: The revocation worker loop: read, decide, deliver or reschedule, ack
// ABOUTME: Ack only ever follows delivery or a successful re-enqueue

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Trellis Data Trust

//! # Revocation worker
//!
//! Drains the revocation stream. For each entry the worker decides one of
//! four actions, in order: drop undecodable payloads, abandon messages past
//! the retry ceiling, defer messages whose backoff has not elapsed, or
//! attempt delivery. A failed attempt re-enqueues the message with an
//! incremented retry count before acking the old entry; if the re-enqueue
//! itself fails the old entry stays unacked in the pending list.
//!
//! Startup begins in recovery mode: the consumer's own pending list is
//! drained first, so entries read-but-not-acked by a previous incarnation
//! (crash, or shutdown racing an in-flight batch) are processed instead of
//! sitting pending forever. Once a recovery read comes back empty the worker
//! switches to reading new entries.

use crate::constants::MAX_DELIVERY_RETRIES;
use crate::revocation::{DeliveryResolver, RevocationMessage, RevocationQueue};
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

const READ_BATCH_SIZE: usize = 10;

/// What to do with one stream entry
#[derive(Debug, PartialEq, Eq)]
pub enum WorkerAction {
    /// Undecodable payload; ack so it does not wedge the group
    Drop,
    /// Retry ceiling reached; log and ack
    Abandon,
    /// Backoff has not elapsed; re-append unchanged and ack the old entry
    Defer,
    /// Attempt delivery now
    Attempt,
}

/// Decide the action for one entry; pure so the retry policy is testable
#[must_use]
pub fn next_action(message: Option<&RevocationMessage>, now: DateTime<Utc>) -> WorkerAction {
    let Some(message) = message else {
        return WorkerAction::Drop;
    };
    if message.retry_count >= MAX_DELIVERY_RETRIES {
        return WorkerAction::Abandon;
    }
    match message.next_retry_at {
        Some(at) if at > now => WorkerAction::Defer,
        _ => WorkerAction::Attempt,
    }
}

/// Which stream position the worker reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Drain this consumer's pending list left by a previous incarnation
    Recovery,
    /// Read entries never delivered to the group
    Live,
}

/// Mode transition after a batch: recovery ends only on an empty read
///
/// Recovery must run to exhaustion before live reads start; a live worker
/// never returns to recovery, because anything it reads from now on is
/// either acked or deliberately left pending for the next incarnation.
#[must_use]
pub fn after_batch(mode: ReadMode, drained: usize) -> ReadMode {
    match mode {
        ReadMode::Recovery if drained == 0 => ReadMode::Live,
        other => other,
    }
}

/// Run the worker until the shutdown signal flips
pub async fn run(
    queue: RevocationQueue,
    resolver: DeliveryResolver,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("revocation worker started");
    let mut mode = ReadMode::Recovery;
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            batch = async {
                match mode {
                    ReadMode::Recovery => queue.read_pending(READ_BATCH_SIZE).await,
                    ReadMode::Live => queue.read_batch(READ_BATCH_SIZE).await,
                }
            } => {
                let entries = match batch {
                    Ok(entries) => entries,
                    Err(e) => {
                        error!(error = %e, "stream read failed, backing off");
                        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                        continue;
                    }
                };
                if mode == ReadMode::Recovery && !entries.is_empty() {
                    info!(count = entries.len(), "recovering entries left pending by a previous run");
                }
                mode = after_batch(mode, entries.len());
                for entry in entries {
                    process_entry(&queue, &resolver, entry).await;
                }
            }
        }
    }
    info!("revocation worker stopped");
}

async fn process_entry(
    queue: &RevocationQueue,
    resolver: &DeliveryResolver,
    entry: crate::revocation::queue::QueueEntry,
) {
    let now = Utc::now();
    let Some(message) = entry.message.as_ref() else {
        warn!(entry = %entry.id, "dropping undecodable entry");
        ack(queue, &entry.id).await;
        return;
    };
    match next_action(Some(message), now) {
        WorkerAction::Drop => {
            ack(queue, &entry.id).await;
        }
        WorkerAction::Abandon => {
            error!(
                client = %message.client,
                evidence_id = %message.evidence_id,
                retries = message.retry_count,
                "abandoning revocation message after retry ceiling"
            );
            ack(queue, &entry.id).await;
        }
        WorkerAction::Defer => {
            debug!(
                client = %message.client,
                next_retry_at = ?message.next_retry_at,
                "deferring message, backoff not elapsed"
            );
            // re-append unchanged before acking so the message survives a
            // crash in between
            if queue.enqueue(message).await.is_ok() {
                ack(queue, &entry.id).await;
            }
        }
        WorkerAction::Attempt => {
            if attempt_delivery(resolver, message).await {
                ack(queue, &entry.id).await;
            } else {
                let retry = message.next_attempt(now);
                warn!(
                    client = %message.client,
                    retry_count = retry.retry_count,
                    "delivery failed, rescheduling"
                );
                // never ack a failed attempt unless its retry is safely
                // enqueued
                if queue.enqueue(&retry).await.is_ok() {
                    ack(queue, &entry.id).await;
                } else {
                    error!(entry = %entry.id, "failed to re-enqueue, leaving entry pending");
                }
            }
        }
    }
}

async fn attempt_delivery(resolver: &DeliveryResolver, message: &RevocationMessage) -> bool {
    let Some(url) = resolver.resolve_delivery_url(&message.client).await else {
        return false;
    };
    resolver.deliver(&url, &message.envelope()).await
}

async fn ack(queue: &RevocationQueue, entry_id: &str) {
    if let Err(e) = queue.ack(entry_id).await {
        error!(entry = %entry_id, error = %e, "failed to ack entry");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn message(retry_count: u32, next_retry_at: Option<DateTime<Utc>>) -> RevocationMessage {
        RevocationMessage {
            account: "account-123".to_owned(),
            client: "https://directory.trellis.org/application/acme".to_owned(),
            license: "https://registry.trellis.org/license/standard".to_owned(),
            revoked: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
            refresh_token: "refresh-abc".to_owned(),
            evidence_id: "evidence-1".to_owned(),
            retry_count,
            next_retry_at,
        }
    }

    #[test]
    fn test_undecodable_entries_are_dropped() {
        assert_eq!(next_action(None, Utc::now()), WorkerAction::Drop);
    }

    #[test]
    fn test_fresh_message_is_attempted() {
        let m = message(0, None);
        assert_eq!(next_action(Some(&m), Utc::now()), WorkerAction::Attempt);
    }

    #[test]
    fn test_elapsed_backoff_is_attempted() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let m = message(2, Some(now - chrono::Duration::seconds(1)));
        assert_eq!(next_action(Some(&m), now), WorkerAction::Attempt);
    }

    #[test]
    fn test_pending_backoff_is_deferred() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let m = message(2, Some(now + chrono::Duration::seconds(30)));
        assert_eq!(next_action(Some(&m), now), WorkerAction::Defer);
    }

    #[test]
    fn test_recovery_runs_until_pending_list_is_empty() {
        // non-empty recovery reads keep draining the pending list
        assert_eq!(after_batch(ReadMode::Recovery, 10), ReadMode::Recovery);
        assert_eq!(after_batch(ReadMode::Recovery, 1), ReadMode::Recovery);
        // only an empty read proves the previous incarnation's entries are gone
        assert_eq!(after_batch(ReadMode::Recovery, 0), ReadMode::Live);
    }

    #[test]
    fn test_live_mode_never_returns_to_recovery() {
        assert_eq!(after_batch(ReadMode::Live, 0), ReadMode::Live);
        assert_eq!(after_batch(ReadMode::Live, 10), ReadMode::Live);
    }

    #[test]
    fn test_retry_ceiling_abandons() {
        let m = message(MAX_DELIVERY_RETRIES, None);
        assert_eq!(next_action(Some(&m), Utc::now()), WorkerAction::Abandon);
        // the ceiling wins even when a retry is scheduled
        let m = message(
            MAX_DELIVERY_RETRIES + 3,
            Some(Utc::now() + chrono::Duration::hours(1)),
        );
        assert_eq!(next_action(Some(&m), Utc::now()), WorkerAction::Abandon);
    }
}
