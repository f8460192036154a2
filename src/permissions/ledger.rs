// ABOUTME: Durable permission ledger over sqlite
// ABOUTME: Keyed by (account, client) with lookup indexes on refresh token and evidence id

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Trellis Data Trust

//! # Permission ledger
//!
//! One row per (account, client) pair. `put` is an upsert: re-granting
//! replaces the record wholesale, including clearing a prior revocation.
//! Revocation is a read-modify-write of the full record; the last writer
//! wins, which is acceptable because a revoked flag set twice is still
//! revoked.
//!
//! Timestamps are stored as RFC 3339 TEXT so rows are greppable and the
//! ledger stays portable across sqlite tooling.

use crate::errors::{AppError, AppResult, ErrorCode};
use crate::permissions::Permission;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::{debug, info};

/// Sqlite-backed permission ledger
#[derive(Clone, Debug)]
pub struct PermissionLedger {
    pool: SqlitePool,
    table: String,
}

impl PermissionLedger {
    /// Open (or create) the ledger database
    ///
    /// # Errors
    ///
    /// Returns a config error for an unusable table name, or a storage error
    /// if the database cannot be opened.
    pub async fn connect(database_url: &str, table: &str) -> AppResult<Self> {
        validate_table_name(table)?;
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| AppError::storage(format!("failed to open ledger database: {e}")))?;
        Ok(Self {
            pool,
            table: table.to_owned(),
        })
    }

    /// Wrap an existing pool, used by tests with `sqlite::memory:`
    ///
    /// # Errors
    ///
    /// Returns a config error for an unusable table name.
    pub fn from_pool(pool: SqlitePool, table: &str) -> AppResult<Self> {
        validate_table_name(table)?;
        Ok(Self {
            pool,
            table: table.to_owned(),
        })
    }

    /// Create the ledger table and lookup indexes if they do not exist
    ///
    /// # Errors
    ///
    /// Returns a storage error if schema creation fails.
    pub async fn ensure_table(&self) -> AppResult<()> {
        let create = format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                account TEXT NOT NULL,
                client TEXT NOT NULL,
                oauth_issuer TEXT NOT NULL,
                license TEXT NOT NULL,
                last_granted TEXT NOT NULL,
                expires TEXT NOT NULL,
                refresh_token TEXT NOT NULL,
                revoked TEXT,
                data_available_from TEXT NOT NULL,
                token_issued_at TEXT NOT NULL,
                token_expires TEXT NOT NULL,
                evidence_id TEXT NOT NULL,
                PRIMARY KEY (account, client)
            )",
            table = self.table
        );
        sqlx::query(&create)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::storage(format!("failed to create ledger table: {e}")))?;

        for (suffix, column) in [("refresh_token", "refresh_token"), ("evidence", "evidence_id")] {
            let index = format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_{suffix} ON {table} ({column})",
                table = self.table
            );
            sqlx::query(&index)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::storage(format!("failed to create ledger index: {e}")))?;
        }

        info!(table = %self.table, "permission ledger ready");
        Ok(())
    }

    /// Insert or replace the record for (account, client)
    ///
    /// # Errors
    ///
    /// Returns a storage error if the write fails.
    pub async fn put(&self, permission: &Permission) -> AppResult<()> {
        let sql = format!(
            "INSERT OR REPLACE INTO {table} (
                account, client, oauth_issuer, license, last_granted, expires,
                refresh_token, revoked, data_available_from, token_issued_at,
                token_expires, evidence_id
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            table = self.table
        );
        sqlx::query(&sql)
            .bind(&permission.account)
            .bind(&permission.client)
            .bind(&permission.oauth_issuer)
            .bind(&permission.license)
            .bind(permission.last_granted.to_rfc3339())
            .bind(permission.expires.to_rfc3339())
            .bind(&permission.refresh_token)
            .bind(permission.revoked.map(|t| t.to_rfc3339()))
            .bind(permission.data_available_from.to_rfc3339())
            .bind(permission.token_issued_at.to_rfc3339())
            .bind(permission.token_expires.to_rfc3339())
            .bind(&permission.evidence_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::storage(format!("failed to write permission: {e}")))?;

        debug!(account = %permission.account, client = %permission.client, "permission recorded");
        Ok(())
    }

    /// Look up the record for (account, client)
    ///
    /// # Errors
    ///
    /// Returns a storage error if the read fails.
    pub async fn get(&self, account: &str, client: &str) -> AppResult<Option<Permission>> {
        let sql = format!(
            "SELECT * FROM {table} WHERE account = ? AND client = ?",
            table = self.table
        );
        let row = sqlx::query(&sql)
            .bind(account)
            .bind(client)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::storage(format!("failed to read permission: {e}")))?;
        row.map(|r| row_to_permission(&r)).transpose()
    }

    /// Look up the record holding this refresh token
    ///
    /// # Errors
    ///
    /// Returns a storage error if the read fails.
    pub async fn get_by_refresh_token(&self, refresh_token: &str) -> AppResult<Option<Permission>> {
        let sql = format!(
            "SELECT * FROM {table} WHERE refresh_token = ?",
            table = self.table
        );
        let row = sqlx::query(&sql)
            .bind(refresh_token)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::storage(format!("failed to read permission: {e}")))?;
        row.map(|r| row_to_permission(&r)).transpose()
    }

    /// Look up the record with this evidence id
    ///
    /// # Errors
    ///
    /// Returns a storage error if the read fails.
    pub async fn get_by_evidence_id(&self, evidence_id: &str) -> AppResult<Option<Permission>> {
        let sql = format!(
            "SELECT * FROM {table} WHERE evidence_id = ?",
            table = self.table
        );
        let row = sqlx::query(&sql)
            .bind(evidence_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::storage(format!("failed to read permission: {e}")))?;
        row.map(|r| row_to_permission(&r)).transpose()
    }

    /// Mark the record holding this refresh token as revoked
    ///
    /// Returns the updated record so the caller can construct the outbound
    /// revocation message from it.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorCode::PermissionRevocation`] when no record holds
    /// the token or the ledger write fails.
    pub async fn revoke(&self, refresh_token: &str) -> AppResult<Permission> {
        let mut permission = self
            .get_by_refresh_token(refresh_token)
            .await?
            .ok_or_else(|| AppError::permission_revocation("Permission not found"))?;

        permission.revoked = Some(Utc::now());
        self.put(&permission).await.map_err(|e| {
            AppError::new(
                ErrorCode::PermissionRevocation,
                format!("Failed to record revocation: {e}"),
            )
        })?;

        info!(
            account = %permission.account,
            client = %permission.client,
            "permission revoked"
        );
        Ok(permission)
    }
}

/// The table name is interpolated into SQL, so it is restricted to a safe
/// identifier charset at construction time
fn validate_table_name(table: &str) -> AppResult<()> {
    let valid = !table.is_empty()
        && !table.starts_with(|c: char| c.is_ascii_digit())
        && table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(AppError::config(format!(
            "ledger table name {table:?} must match [A-Za-z_][A-Za-z0-9_]*"
        )))
    }
}

fn row_to_permission(row: &SqliteRow) -> AppResult<Permission> {
    Ok(Permission {
        account: column(row, "account")?,
        client: column(row, "client")?,
        oauth_issuer: column(row, "oauth_issuer")?,
        license: column(row, "license")?,
        last_granted: timestamp_column(row, "last_granted")?,
        expires: timestamp_column(row, "expires")?,
        refresh_token: column(row, "refresh_token")?,
        revoked: optional_timestamp_column(row, "revoked")?,
        data_available_from: timestamp_column(row, "data_available_from")?,
        token_issued_at: timestamp_column(row, "token_issued_at")?,
        token_expires: timestamp_column(row, "token_expires")?,
        evidence_id: column(row, "evidence_id")?,
    })
}

fn column(row: &SqliteRow, name: &str) -> AppResult<String> {
    row.try_get(name)
        .map_err(|e| AppError::storage(format!("ledger column {name}: {e}")))
}

fn timestamp_column(row: &SqliteRow, name: &str) -> AppResult<DateTime<Utc>> {
    let text: String = column(row, name)?;
    parse_timestamp(name, &text)
}

fn optional_timestamp_column(row: &SqliteRow, name: &str) -> AppResult<Option<DateTime<Utc>>> {
    let text: Option<String> = row
        .try_get(name)
        .map_err(|e| AppError::storage(format!("ledger column {name}: {e}")))?;
    text.map(|t| parse_timestamp(name, &t)).transpose()
}

fn parse_timestamp(name: &str, text: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| AppError::storage(format!("ledger column {name} is not RFC 3339: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name_charset() {
        validate_table_name("permissions").unwrap();
        validate_table_name("permissions_v2").unwrap();
        validate_table_name("_staging").unwrap();

        for bad in ["", "2fast", "permissions; DROP TABLE x", "perm-issions", "a.b"] {
            let err = validate_table_name(bad).unwrap_err();
            assert_eq!(err.code, crate::errors::ErrorCode::ConfigError, "{bad:?}");
        }
    }
}
