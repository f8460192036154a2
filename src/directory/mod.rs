// ABOUTME: Thin adapter over the trust-framework certificate profile
// ABOUTME: Parses client certificates and extracts thumbprints, application ids and roles
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Trellis Data Trust

//! # Directory certificate adapter
//!
//! The trust-framework directory issues client certificates that embed the
//! holder's application URI and role memberships as private extensions. This
//! module parses the transport-asserted certificate header and exposes the
//! derived values the rest of the server needs: the SHA-256 thumbprint used
//! for RFC 8705 binding, the application identifier, and a role predicate.

use crate::constants::{OID_DIRECTORY_APPLICATION, OID_DIRECTORY_ROLES};
use crate::errors::{AppError, AppResult, ErrorCode};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};
use x509_parser::der_parser::ber::BerObjectContent;
use x509_parser::der_parser::oid::Oid;
use x509_parser::der_parser::parse_der;
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::parse_x509_certificate;

/// A client certificate presented via the transport header, with the
/// directory-derived values extracted eagerly. Never persisted.
#[derive(Debug, Clone)]
pub struct ClientCert {
    der: Vec<u8>,
    application: Option<String>,
    roles: Vec<String>,
}

impl ClientCert {
    /// Parse a certificate from the URL-encoded PEM header value
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::CertificateMissing`] when the value is empty or
    /// not a parseable certificate.
    pub fn from_header(header_value: &str) -> AppResult<Self> {
        let decoded = urlencoding::decode(header_value)
            .map_err(|_| AppError::certificate_missing())?;
        let pem_text = decoded.trim();
        if !pem_text.contains("BEGIN CERTIFICATE") {
            return Err(AppError::certificate_missing());
        }
        let (_, pem) = parse_x509_pem(pem_text.as_bytes())
            .map_err(|_| AppError::certificate_missing())?;
        Self::from_der(pem.contents)
    }

    /// Parse a certificate from DER bytes
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::CertificateMissing`] when the bytes are not a
    /// valid X.509 certificate.
    pub fn from_der(der: Vec<u8>) -> AppResult<Self> {
        let (_, cert) =
            parse_x509_certificate(&der).map_err(|_| AppError::certificate_missing())?;

        let roles_oid = Oid::from(OID_DIRECTORY_ROLES)
            .map_err(|_| AppError::internal("invalid roles OID"))?;
        let application_oid = Oid::from(OID_DIRECTORY_APPLICATION)
            .map_err(|_| AppError::internal("invalid application OID"))?;

        let mut application = None;
        let mut roles = Vec::new();
        for ext in cert.extensions() {
            if ext.oid == roles_oid {
                roles = decode_roles(ext.value)?;
            } else if ext.oid == application_oid {
                application = Some(decode_utf8string(ext.value)?);
            }
        }

        drop(cert);
        Ok(Self {
            der,
            application,
            roles,
        })
    }

    /// SHA-256 thumbprint of the DER encoding, base64url without padding
    ///
    /// Deterministic and content-addressed: identical certificate bytes
    /// always produce the identical thumbprint string.
    #[must_use]
    pub fn thumbprint(&self) -> String {
        let digest = Sha256::digest(&self.der);
        URL_SAFE_NO_PAD.encode(digest)
    }

    /// The globally unique directory application identifier embedded in the
    /// certificate
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::CertificateMissing`] when the certificate does
    /// not carry the application extension: no certificate-bound client can
    /// be identified from it.
    pub fn application(&self) -> AppResult<&str> {
        self.application.as_deref().ok_or_else(|| {
            AppError::new(
                ErrorCode::CertificateMissing,
                "Client certificate does not include an application identifier",
            )
        })
    }

    /// Role URIs embedded in the certificate
    #[must_use]
    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    /// Enforce that the certificate carries `role`
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::CertificateRoleMissing`] when the certificate has
    /// no role extension at all, [`ErrorCode::CertificateRole`] when the
    /// required role is absent.
    pub fn require_role(&self, role: &str) -> AppResult<()> {
        if self.roles.is_empty() {
            return Err(AppError::certificate_role_missing());
        }
        if self.roles.iter().any(|r| r == role) {
            Ok(())
        } else {
            Err(AppError::certificate_role(role))
        }
    }
}

/// Decode a DER UTF8String extension value
fn decode_utf8string(der_bytes: &[u8]) -> AppResult<String> {
    let (_, obj) = parse_der(der_bytes)
        .map_err(|_| AppError::certificate_missing())?;
    match obj.content {
        BerObjectContent::UTF8String(s) => Ok(s.to_owned()),
        _ => Err(AppError::certificate_missing()),
    }
}

/// Decode a DER SEQUENCE OF UTF8String extension value
fn decode_roles(der_bytes: &[u8]) -> AppResult<Vec<String>> {
    let (_, obj) = parse_der(der_bytes)
        .map_err(|_| AppError::certificate_role_missing())?;
    let seq = obj
        .as_sequence()
        .map_err(|_| AppError::certificate_role_missing())?;
    let mut roles = Vec::with_capacity(seq.len());
    for item in seq {
        match &item.content {
            BerObjectContent::UTF8String(s) => roles.push((*s).to_owned()),
            _ => return Err(AppError::certificate_role_missing()),
        }
    }
    Ok(roles)
}

/// Encode a string as a DER UTF8String (the directory's application
/// extension payload)
#[must_use]
pub fn encode_utf8string(value: &str) -> Vec<u8> {
    let mut out = vec![0x0c];
    push_der_length(&mut out, value.len());
    out.extend_from_slice(value.as_bytes());
    out
}

/// Encode role URIs as a DER SEQUENCE OF UTF8String (the directory's roles
/// extension payload)
#[must_use]
pub fn encode_roles(roles: &[&str]) -> Vec<u8> {
    let mut body = Vec::new();
    for role in roles {
        body.extend_from_slice(&encode_utf8string(role));
    }
    let mut out = vec![0x30];
    push_der_length(&mut out, body.len());
    out.extend_from_slice(&body);
    out
}

fn push_der_length(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
    } else if len <= 0xff {
        out.push(0x81);
        out.push(len as u8);
    } else {
        out.push(0x82);
        out.push((len >> 8) as u8);
        out.push((len & 0xff) as u8);
    }
}
