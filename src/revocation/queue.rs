// ABOUTME: Revocation message queue over a redis stream with a consumer group
// ABOUTME: At-least-once semantics; messages are acked only after delivery or re-enqueue

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Trellis Data Trust

//! # Revocation queue
//!
//! A redis stream with one consumer group shared by all workers. Each entry
//! carries a single `payload` field holding the JSON-encoded
//! [`RevocationMessage`]. A worker never acks an entry until the message has
//! either been delivered or re-enqueued as a fresh entry, so a crash between
//! read and ack leaves the entry in the consumer's pending list. Redis does
//! not redeliver pending entries on its own: a restarted worker must drain
//! its pending list via [`RevocationQueue::read_pending`] before reading new
//! entries.

use crate::constants::{REVOCATION_GROUP, REVOCATION_STREAM, WORKER_POLL_BLOCK_MS};
use crate::errors::{AppError, AppResult};
use crate::revocation::RevocationMessage;
use redis::aio::ConnectionManager;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use tracing::warn;

/// A stream entry as read by a worker
///
/// `message` is `None` when the payload could not be decoded; the worker
/// acks such entries so they do not wedge the group.
#[derive(Debug)]
pub struct QueueEntry {
    pub id: String,
    pub message: Option<RevocationMessage>,
}

/// Redis-stream revocation queue
///
/// Workers construct their own instance so blocking reads never stall the
/// connection used by request handlers for enqueueing.
#[derive(Clone)]
pub struct RevocationQueue {
    manager: ConnectionManager,
    consumer: String,
}

impl RevocationQueue {
    /// Connect to the backing redis instance
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub async fn connect(redis_url: &str, consumer: &str) -> AppResult<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| AppError::config(format!("invalid redis URL: {e}")))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::internal(format!("failed to connect to redis: {e}")))?;
        Ok(Self {
            manager,
            consumer: consumer.to_owned(),
        })
    }

    /// Create the stream and consumer group if they do not exist
    ///
    /// # Errors
    ///
    /// Returns a queue error if group creation fails for any reason other
    /// than the group already existing.
    pub async fn ensure_group(&self) -> AppResult<()> {
        let mut conn = self.manager.clone();
        let result: Result<(), redis::RedisError> = conn
            .xgroup_create_mkstream(REVOCATION_STREAM, REVOCATION_GROUP, "$")
            .await;
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.to_string().contains("BUSYGROUP") => Ok(()),
            Err(e) => Err(AppError::queue(format!(
                "failed to create consumer group: {e}"
            ))),
        }
    }

    /// Append a message to the stream
    ///
    /// # Errors
    ///
    /// Returns a queue error if the append fails.
    pub async fn enqueue(&self, message: &RevocationMessage) -> AppResult<()> {
        let payload = serde_json::to_string(message)
            .map_err(|e| AppError::internal(format!("failed to serialize message: {e}")))?;
        let mut conn = self.manager.clone();
        conn.xadd::<_, _, _, _, ()>(REVOCATION_STREAM, "*", &[("payload", payload)])
            .await
            .map_err(|e| AppError::queue(format!("failed to enqueue message: {e}")))?;
        Ok(())
    }

    /// Read up to `count` new entries for this consumer, blocking briefly
    ///
    /// # Errors
    ///
    /// Returns a queue error if the read fails.
    pub async fn read_batch(&self, count: usize) -> AppResult<Vec<QueueEntry>> {
        let options = StreamReadOptions::default()
            .group(REVOCATION_GROUP, &self.consumer)
            .count(count)
            .block(WORKER_POLL_BLOCK_MS as usize);
        self.read_with(&options, ">").await
    }

    /// Read up to `count` entries from this consumer's pending list
    ///
    /// XREADGROUP with an explicit id returns entries that were delivered to
    /// this consumer but never acked. Returns immediately; an empty result
    /// means the pending list is drained.
    ///
    /// # Errors
    ///
    /// Returns a queue error if the read fails.
    pub async fn read_pending(&self, count: usize) -> AppResult<Vec<QueueEntry>> {
        let options = StreamReadOptions::default()
            .group(REVOCATION_GROUP, &self.consumer)
            .count(count);
        self.read_with(&options, "0").await
    }

    async fn read_with(&self, options: &StreamReadOptions, id: &str) -> AppResult<Vec<QueueEntry>> {
        let mut conn = self.manager.clone();
        let reply: StreamReadReply = conn
            .xread_options(&[REVOCATION_STREAM], &[id], options)
            .await
            .map_err(|e| AppError::queue(format!("failed to read stream: {e}")))?;

        let mut entries = Vec::new();
        for stream in reply.keys {
            for id in stream.ids {
                let message = id
                    .get::<String>("payload")
                    .and_then(|payload| match serde_json::from_str(&payload) {
                        Ok(message) => Some(message),
                        Err(e) => {
                            warn!(entry = %id.id, error = %e, "undecodable stream entry");
                            None
                        }
                    });
                entries.push(QueueEntry {
                    id: id.id.clone(),
                    message,
                });
            }
        }
        Ok(entries)
    }

    /// Acknowledge a processed entry
    ///
    /// # Errors
    ///
    /// Returns a queue error if the ack fails.
    pub async fn ack(&self, entry_id: &str) -> AppResult<()> {
        let mut conn = self.manager.clone();
        conn.xack::<_, _, _, ()>(REVOCATION_STREAM, REVOCATION_GROUP, &[entry_id])
            .await
            .map_err(|e| AppError::queue(format!("failed to ack entry: {e}")))?;
        Ok(())
    }
}
