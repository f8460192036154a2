// ABOUTME: Unified error handling with domain error codes and HTTP mapping
// ABOUTME: Certificate, token, key, storage and queue failures map to status codes in one place
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Trellis Data Trust

//! # Unified Error Handling
//!
//! Internal components raise typed errors close to the point of detection;
//! the HTTP status mapping happens exactly once, in the [`axum::response::IntoResponse`]
//! implementation. Collaborator errors (redis, sqlx, reqwest) are translated
//! into this closed set of codes at the adapter boundary and never leak
//! across component boundaries.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Standard error codes used throughout the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Client certificate (1000-1999)
    #[serde(rename = "CERTIFICATE_MISSING")]
    CertificateMissing = 1000,
    #[serde(rename = "CERTIFICATE_ROLE_MISSING")]
    CertificateRoleMissing = 1001,
    #[serde(rename = "CERTIFICATE_ROLE")]
    CertificateRole = 1002,

    // Access tokens (2000-2999)
    #[serde(rename = "ACCESS_TOKEN_DECODING")]
    AccessTokenDecoding = 2000,
    #[serde(rename = "ACCESS_TOKEN_TIME")]
    AccessTokenTime = 2001,
    #[serde(rename = "ACCESS_TOKEN_CERTIFICATE")]
    AccessTokenCertificate = 2002,
    #[serde(rename = "ACCESS_TOKEN_AUDIENCE")]
    AccessTokenAudience = 2003,

    // Validation (3000-3999)
    #[serde(rename = "INVALID_INPUT")]
    InvalidInput = 3000,

    // Resources (4000-4999)
    #[serde(rename = "RESOURCE_NOT_FOUND")]
    ResourceNotFound = 4000,
    #[serde(rename = "PERMISSION_REVOCATION")]
    PermissionRevocation = 4001,

    // External services (5000-5999)
    #[serde(rename = "UPSTREAM_ERROR")]
    UpstreamError = 5000,

    // Configuration & keys (6000-6999)
    #[serde(rename = "KEY_NOT_FOUND")]
    KeyNotFound = 6000,
    #[serde(rename = "CONFIG_ERROR")]
    ConfigError = 6001,

    // Internal (9000-9999)
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError = 9000,
    #[serde(rename = "STORAGE_ERROR")]
    StorageError = 9001,
    #[serde(rename = "QUEUE_ERROR")]
    QueueError = 9002,
}

impl ErrorCode {
    /// Get the HTTP status code for this error
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            // 401 Unauthorized: no certificate-bound client can be identified,
            // or the presented token fails verification
            Self::CertificateMissing
            | Self::CertificateRoleMissing
            | Self::CertificateRole
            | Self::AccessTokenDecoding
            | Self::AccessTokenTime
            | Self::AccessTokenCertificate
            | Self::AccessTokenAudience => 401,

            // 400 Bad Request
            Self::InvalidInput | Self::PermissionRevocation => 400,

            // 404 Not Found
            Self::ResourceNotFound => 404,

            // 502 Bad Gateway (default; upstream errors may carry a passthrough status)
            Self::UpstreamError => 502,

            // 500 Internal Server Error
            Self::KeyNotFound
            | Self::ConfigError
            | Self::InternalError
            | Self::StorageError
            | Self::QueueError => 500,
        }
    }

    /// Get a user-facing description of this error
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::CertificateMissing => "No client certificate presented",
            Self::CertificateRoleMissing => "Client certificate does not include role information",
            Self::CertificateRole => "Client certificate does not include the required role",
            Self::AccessTokenDecoding => "The access token could not be decoded or verified",
            Self::AccessTokenTime => "The access token is outside its validity window",
            Self::AccessTokenCertificate => "The access token is not bound to the presented certificate",
            Self::AccessTokenAudience => "The access token audience or client does not match",
            Self::InvalidInput => "The provided input is invalid",
            Self::ResourceNotFound => "The requested resource was not found",
            Self::PermissionRevocation => "The permission could not be revoked",
            Self::UpstreamError => "The upstream authorization server returned an error",
            Self::KeyNotFound => "A required signing key could not be located",
            Self::ConfigError => "Configuration error encountered",
            Self::InternalError => "An internal server error occurred",
            Self::StorageError => "Storage operation failed",
            Self::QueueError => "Queue operation failed",
        }
    }
}

/// Unified error type for the application
#[derive(Debug, Error)]
#[error("{}: {message}", .code.description())]
pub struct AppError {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Status override for upstream passthrough responses
    pub status_override: Option<u16>,
    /// Source error for error chaining
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new error with the given code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status_override: None,
            source: None,
        }
    }

    /// Attach a source error for chaining
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the HTTP status code for this error
    #[must_use]
    pub fn http_status(&self) -> u16 {
        self.status_override.unwrap_or_else(|| self.code.http_status())
    }

    pub fn certificate_missing() -> Self {
        Self::new(ErrorCode::CertificateMissing, "No client certificate presented")
    }

    pub fn certificate_role_missing() -> Self {
        Self::new(
            ErrorCode::CertificateRoleMissing,
            "Client certificate does not include role information",
        )
    }

    pub fn certificate_role(role: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::CertificateRole,
            format!("Client certificate does not include role {}", role.into()),
        )
    }

    pub fn token_decoding(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AccessTokenDecoding, message)
    }

    pub fn token_time(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AccessTokenTime, message)
    }

    pub fn token_certificate(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AccessTokenCertificate, message)
    }

    pub fn token_audience(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AccessTokenAudience, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ResourceNotFound,
            format!("{} not found", resource.into()),
        )
    }

    pub fn permission_revocation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PermissionRevocation, message)
    }

    /// Upstream failure whose HTTP status is passed through to the caller
    pub fn upstream_status(status: u16, message: impl Into<String>) -> Self {
        let mut err = Self::new(ErrorCode::UpstreamError, message);
        err.status_override = Some(status);
        err
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamError, message)
    }

    pub fn key_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::KeyNotFound, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StorageError, message)
    }

    pub fn queue(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::QueueError, message)
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// HTTP error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorResponseDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponseDetails {
    pub code: ErrorCode,
    pub message: String,
}

impl From<&AppError> for ErrorResponse {
    fn from(error: &AppError) -> Self {
        Self {
            error: ErrorResponseDetails {
                code: error.code,
                message: error.message.clone(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Binding mismatches may indicate token theft with a different
        // certificate, so they always get a warning in the log
        match self.code {
            ErrorCode::AccessTokenCertificate => {
                warn!(message = %self.message, "certificate binding check failed");
            }
            ErrorCode::KeyNotFound | ErrorCode::ConfigError | ErrorCode::InternalError => {
                tracing::error!(code = ?self.code, message = %self.message, "request failed");
            }
            _ => {}
        }
        let status = StatusCode::from_u16(self.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse::from(&self);
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_http_status() {
        assert_eq!(ErrorCode::CertificateMissing.http_status(), 401);
        assert_eq!(ErrorCode::AccessTokenCertificate.http_status(), 401);
        assert_eq!(ErrorCode::PermissionRevocation.http_status(), 400);
        assert_eq!(ErrorCode::ResourceNotFound.http_status(), 404);
        assert_eq!(ErrorCode::KeyNotFound.http_status(), 500);
        assert_eq!(ErrorCode::UpstreamError.http_status(), 502);
    }

    #[test]
    fn test_upstream_status_passthrough() {
        let err = AppError::upstream_status(403, "upstream said no");
        assert_eq!(err.http_status(), 403);
        assert_eq!(err.code, ErrorCode::UpstreamError);
    }

    #[test]
    fn test_error_response_shape() {
        let err = AppError::permission_revocation("Permission not found");
        let body = ErrorResponse::from(&err);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"]["code"], "PERMISSION_REVOCATION");
        assert_eq!(json["error"]["message"], "Permission not found");
    }
}
