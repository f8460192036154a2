// ABOUTME: Protocol and operational constants shared across the server
// ABOUTME: Key ids, TTLs, retry policy, directory OIDs and message vocabulary
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Trellis Data Trust

/// Key id published in the JWKS and embedded in every signed token header.
/// Change when rotating the signing key.
pub const SIGNING_KID: &str = "1";

/// Signing algorithm for server-issued tokens.
pub const SIGNING_ALG: &str = "ES256";

/// PAR opaque token entropy: 20 bytes = 160 bits.
pub const PAR_TOKEN_BYTES: usize = 20;

/// Internal lifetime of a staged pushed authorization request.
pub const PAR_STORE_TTL_SECS: u64 = 60;

/// `expires_in` advertised in the PAR response (RFC 9126). Intentionally
/// distinct from the 60s store TTL; the shorter internal window bounds replay.
pub const PAR_ADVERTISED_EXPIRES_IN: u64 = 600;

/// Prefix for PAR keys in redis.
pub const PAR_KEY_PREFIX: &str = "par:";

/// `request_uri` URN prefix (RFC 9126 section 2.2).
pub const REQUEST_URI_PREFIX: &str = "urn:ietf:params:oauth:request_uri:";

/// Delivery attempts before a revocation message is abandoned.
pub const MAX_DELIVERY_RETRIES: u32 = 5;

/// Exponential backoff base for redelivery.
pub const BACKOFF_BASE_SECS: u64 = 1;

/// Exponential backoff ceiling for redelivery.
pub const BACKOFF_CAP_SECS: u64 = 300;

/// Redis stream holding revocation messages.
pub const REVOCATION_STREAM: &str = "revocation-messages";

/// Consumer group shared by all revocation workers.
pub const REVOCATION_GROUP: &str = "revocation-workers";

/// Bounded block on stream reads so workers observe shutdown promptly.
pub const WORKER_POLL_BLOCK_MS: u64 = 1000;

/// Timeout for JWKS and directory document fetches.
pub const DOCUMENT_FETCH_TIMEOUT_SECS: u64 = 10;

/// Timeout for revocation message delivery.
pub const DELIVERY_TIMEOUT_SECS: u64 = 30;

/// How long a fetched upstream JWKS stays cached.
pub const JWKS_CACHE_TTL_SECS: u64 = 3600;

/// Directory certificate extension carrying role URIs
/// (DER SEQUENCE OF UTF8String).
pub const OID_DIRECTORY_ROLES: &[u64] = &[1, 3, 6, 1, 4, 1, 62329, 1, 1];

/// Directory certificate extension carrying the application URI
/// (DER UTF8String).
pub const OID_DIRECTORY_APPLICATION: &[u64] = &[1, 3, 6, 1, 4, 1, 62329, 1, 2];

/// Trust-framework message vocabulary.
pub const TRUST_FRAMEWORK_URL: &str = "https://registry.core.trust.trellis.org/trust-framework";

/// Subject URI identifying a revocation message.
pub const REVOKE_MESSAGE_SUBJECT: &str = "https://registry.trust.trellis.org/message/revoke";

/// Predicate naming an application's message-delivery endpoint in its
/// directory document.
pub const MESSAGE_DELIVERY_PREDICATE: &str = "messageDelivery";
