// ABOUTME: Resolves a client's message-delivery endpoint from its directory document
// ABOUTME: Posts revocation envelopes there; a never-throw boundary for the worker loop

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Trellis Data Trust

//! # Delivery resolver
//!
//! The client identifier on a permission is a directory URI. Fetching it
//! yields the application's directory document, which names a
//! `messageDelivery` endpoint. Documents are served as JSON-LD or RDF/XML
//! depending on the directory deployment, so both are handled: JSON-LD is
//! parsed structurally and RDF/XML by a targeted attribute scan.
//!
//! Everything here returns `Option` or `bool` rather than an error. The
//! worker treats any failure as "delivery did not happen" and applies its
//! retry policy; distinguishing failure causes buys it nothing.

use crate::constants::{DELIVERY_TIMEOUT_SECS, DOCUMENT_FETCH_TIMEOUT_SECS, MESSAGE_DELIVERY_PREDICATE};
use crate::errors::{AppError, AppResult};
use reqwest::header::ACCEPT;
use std::time::Duration;
use tracing::{debug, warn};

const DIRECTORY_ACCEPT: &str = "application/ld+json, application/rdf+xml";

/// Fetches directory documents and delivers revocation envelopes
pub struct DeliveryResolver {
    http: reqwest::Client,
}

impl DeliveryResolver {
    /// Build the resolver, presenting `identity_pem` as a client certificate
    /// when the directory or delivery endpoints require mTLS
    ///
    /// # Errors
    ///
    /// Fails when the identity PEM cannot be loaded or the client cannot be
    /// constructed.
    pub fn new(identity_pem: Option<&[u8]>) -> AppResult<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(DELIVERY_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(DOCUMENT_FETCH_TIMEOUT_SECS));
        if let Some(pem) = identity_pem {
            let identity = reqwest::Identity::from_pem(pem)
                .map_err(|e| AppError::config(format!("invalid mTLS identity: {e}")))?;
            builder = builder.identity(identity);
        }
        let http = builder
            .build()
            .map_err(|e| AppError::internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }

    /// Resolve the message-delivery endpoint from a client's directory URI
    ///
    /// Returns `None` when the document cannot be fetched or names no
    /// delivery endpoint.
    pub async fn resolve_delivery_url(&self, client_uri: &str) -> Option<String> {
        let response = self
            .http
            .get(client_uri)
            .header(ACCEPT, DIRECTORY_ACCEPT)
            .timeout(Duration::from_secs(DOCUMENT_FETCH_TIMEOUT_SECS))
            .send()
            .await;

        let response = match response {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                warn!(client = %client_uri, status = %r.status(), "directory document fetch failed");
                return None;
            }
            Err(e) => {
                warn!(client = %client_uri, error = %e, "directory document fetch failed");
                return None;
            }
        };

        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => {
                warn!(client = %client_uri, error = %e, "failed to read directory document");
                return None;
            }
        };

        let url = delivery_url_from_document(&body);
        if url.is_none() {
            warn!(client = %client_uri, "directory document names no delivery endpoint");
        }
        url
    }

    /// Post a revocation envelope to the delivery endpoint
    ///
    /// Returns `true` only on a 2xx response.
    pub async fn deliver(&self, url: &str, envelope: &serde_json::Value) -> bool {
        match self.http.post(url).json(envelope).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(url = %url, "revocation message delivered");
                true
            }
            Ok(response) => {
                warn!(url = %url, status = %response.status(), "delivery endpoint rejected message");
                false
            }
            Err(e) => {
                warn!(url = %url, error = %e, "delivery request failed");
                false
            }
        }
    }
}

/// Extract the delivery endpoint from a directory document body
///
/// Tries JSON-LD first; anything that does not parse as JSON falls back to
/// the RDF/XML scan.
#[must_use]
pub fn delivery_url_from_document(body: &str) -> Option<String> {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(document) => delivery_url_from_json_ld(&document),
        Err(_) => delivery_url_from_rdf_xml(body),
    }
}

/// Walk a JSON-LD document for the message-delivery predicate
///
/// The predicate may appear under its short name or a full IRI suffix, and
/// the object may be a bare string, an `@id` node, or an array of either.
fn delivery_url_from_json_ld(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Object(map) => {
            for (key, object) in map {
                if key == MESSAGE_DELIVERY_PREDICATE
                    || key.ends_with(&format!("/{MESSAGE_DELIVERY_PREDICATE}"))
                    || key.ends_with(&format!("#{MESSAGE_DELIVERY_PREDICATE}"))
                {
                    if let Some(url) = node_id(object) {
                        return Some(url);
                    }
                }
            }
            map.values().find_map(delivery_url_from_json_ld)
        }
        serde_json::Value::Array(items) => items.iter().find_map(delivery_url_from_json_ld),
        _ => None,
    }
}

fn node_id(object: &serde_json::Value) -> Option<String> {
    match object {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Object(map) => map
            .get("@id")
            .and_then(serde_json::Value::as_str)
            .map(ToOwned::to_owned),
        serde_json::Value::Array(items) => items.iter().find_map(node_id),
        _ => None,
    }
}

/// Scan RDF/XML for the delivery predicate's `rdf:resource` attribute
fn delivery_url_from_rdf_xml(body: &str) -> Option<String> {
    let start = body.find(MESSAGE_DELIVERY_PREDICATE)?;
    let tail = &body[start..];
    let element_end = tail.find('>')?;
    let element = &tail[..element_end];
    let resource = element.find("rdf:resource=")?;
    let after = &element[resource + "rdf:resource=".len()..];
    let quote = after.chars().next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    let rest = &after[1..];
    let close = rest.find(quote)?;
    Some(rest[..close].to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_ld_bare_string() {
        let doc = json!({
            "@id": "https://directory.trellis.org/application/acme",
            "messageDelivery": "https://acme.example.org/messages"
        });
        assert_eq!(
            delivery_url_from_json_ld(&doc).as_deref(),
            Some("https://acme.example.org/messages")
        );
    }

    #[test]
    fn test_json_ld_id_node_with_full_iri() {
        let doc = json!({
            "@graph": [{
                "@id": "https://directory.trellis.org/application/acme",
                "https://registry.trellis.org/vocab#messageDelivery": {
                    "@id": "https://acme.example.org/messages"
                }
            }]
        });
        assert_eq!(
            delivery_url_from_json_ld(&doc).as_deref(),
            Some("https://acme.example.org/messages")
        );
    }

    #[test]
    fn test_rdf_xml_resource_attribute() {
        let doc = r#"<?xml version="1.0"?>
            <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
                     xmlns:reg="https://registry.trellis.org/vocab#">
              <rdf:Description rdf:about="https://directory.trellis.org/application/acme">
                <reg:messageDelivery rdf:resource="https://acme.example.org/messages"/>
              </rdf:Description>
            </rdf:RDF>"#;
        assert_eq!(
            delivery_url_from_document(doc).as_deref(),
            Some("https://acme.example.org/messages")
        );
    }

    #[test]
    fn test_document_without_predicate() {
        assert!(delivery_url_from_document("{\"name\": \"acme\"}").is_none());
        assert!(delivery_url_from_document("<rdf:RDF></rdf:RDF>").is_none());
        assert!(delivery_url_from_document("not a document at all").is_none());
    }
}
