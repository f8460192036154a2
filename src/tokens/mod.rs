// ABOUTME: Server-issued token handling: certificate binding, signing, verification, JWKS
// ABOUTME: The protocol core implementing RFC 8705 certificate-bound access tokens
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Trellis Data Trust

pub mod enhancer;
pub mod introspection;
pub mod jwks;

pub use crate::upstream::verifier::Claims;
pub use introspection::VerificationMode;
