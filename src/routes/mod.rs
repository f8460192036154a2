// ABOUTME: HTTP surface: router assembly and shared request helpers
// ABOUTME: mTLS-derived certificate extraction happens here, once, per request

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Trellis Data Trust

//! # HTTP routes
//!
//! The TLS terminator in front of this server forwards the client's verified
//! certificate in a header (`x-amzn-mtls-clientcert` by default). Handlers
//! that need a certificate-bound client go through [`require_cert`]; the
//! header name comes from configuration so other terminators work too.

pub mod authorize;
pub mod evidence;
pub mod introspect;
pub mod par;
pub mod permissions;
pub mod revoke;
pub mod token;
pub mod well_known;

use crate::context::ServerResources;
use crate::directory::ClientCert;
use crate::errors::{AppError, AppResult};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Assemble the full router over shared server resources
pub fn router(resources: Arc<ServerResources>) -> Router {
    Router::new()
        .route("/.well-known/jwks.json", get(well_known::jwks))
        .route(
            "/.well-known/oauth-authorization-server",
            get(well_known::oauth_metadata),
        )
        .route("/api/v1/par", post(par::push_authorization_request))
        .route("/api/v1/authorize", get(authorize::authorize))
        .route("/api/v1/authorize/token", post(token::token))
        .route("/api/v1/authorize/introspect", post(introspect::introspect))
        .route("/api/v1/authorize/revoke", post(revoke::revoke))
        .route("/api/v1/permissions", post(permissions::lookup))
        .route("/api/v1/evidence/:evidence_id", get(evidence::lookup))
        .layer(TraceLayer::new_for_http())
        .with_state(resources)
}

/// Parse the transport-asserted client certificate, failing when absent
pub(crate) fn require_cert(
    headers: &HeaderMap,
    resources: &ServerResources,
) -> AppResult<ClientCert> {
    let value = headers
        .get(&resources.config.cert_header)
        .ok_or_else(AppError::certificate_missing)?;
    let text = value
        .to_str()
        .map_err(|_| AppError::certificate_missing())?;
    ClientCert::from_header(text)
}

/// Parse the certificate if the header is present at all
pub(crate) fn maybe_cert(headers: &HeaderMap, resources: &ServerResources) -> Option<ClientCert> {
    require_cert(headers, resources).ok()
}
