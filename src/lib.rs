// ABOUTME: Main library entry point for the Trellis authorization server
// ABOUTME: Wires certificate-bound token issuance, PAR, the permission ledger and revocation messaging
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Trellis Data Trust

#![deny(unsafe_code)]

//! # Trellis Auth
//!
//! A FAPI-aligned `OAuth2`/OIDC authorization-server profile for a data-sharing
//! trust framework. Clients authenticate with mutual-TLS certificates issued by
//! the trust-framework directory; access tokens are re-signed by this server
//! with an RFC 8705 `cnf.x5t#S256` binding to the presented certificate.
//!
//! ## Subsystems
//!
//! - **Keystore**: signing-key resolution from a secret store with local-file
//!   fallback, P-256 enforced at load time
//! - **Directory adapter**: certificate parsing, thumbprints, application and
//!   role extensions
//! - **Upstream**: JWKS-based verification of upstream-issued tokens plus the
//!   upstream token/revocation endpoints
//! - **Tokens**: the certificate-binding engine (enhance/sign) and the
//!   check-token mirror path used by resource servers
//! - **PAR store**: write-once, short-TTL staging of pushed authorization
//!   requests
//! - **Permission ledger**: durable record of each granted permission, with
//!   revocation
//! - **Revocation queue & worker**: at-least-once delivery of revocation
//!   notifications to client applications, with retry/backoff

pub mod config;
pub mod constants;
pub mod context;
pub mod directory;
pub mod errors;
pub mod keystore;
pub mod logging;
pub mod par;
pub mod permissions;
pub mod revocation;
pub mod routes;
pub mod tokens;
pub mod upstream;

pub use config::environment::ServerConfig;
pub use context::ServerResources;
pub use errors::{AppError, AppResult, ErrorCode};
