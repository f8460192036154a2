// ABOUTME: Upstream authorization-server integration
// ABOUTME: JWKS-based token verification plus the token and revocation endpoints
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Trellis Data Trust

pub mod client;
pub mod verifier;

pub use client::{UpstreamClient, UpstreamTokenResponse};
pub use verifier::{JwksCache, UpstreamVerifier};
