//! Certificate records and their derived metadata

use crate::algorithm::KeyAlgorithm;
use crate::key::PrivateKeyHandle;
use openssl::error::ErrorStack;
use openssl::hash::MessageDigest;
use openssl::x509::{X509, X509Ref};
use serde::Serialize;
use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use thiserror::Error;
use ::time::OffsetDateTime;
use x509_parser::extensions::GeneralName;
use x509_parser::prelude::*;

pub const OID_SERVER_AUTH: &str = "1.3.6.1.5.5.7.3.1";
pub const OID_CLIENT_AUTH: &str = "1.3.6.1.5.5.7.3.2";
pub const OID_CODE_SIGNING: &str = "1.3.6.1.5.5.7.3.3";
pub const OID_EMAIL_PROTECTION: &str = "1.3.6.1.5.5.7.3.4";
pub const OID_TIME_STAMPING: &str = "1.3.6.1.5.5.7.3.8";
pub const OID_OCSP_SIGNING: &str = "1.3.6.1.5.5.7.3.9";
pub const OID_ANY_EXTENDED_KEY_USAGE: &str = "2.5.29.37.0";

/// Errors that can occur while reading a certificate into a record
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Failed to encode certificate: {0}")]
    Encode(#[from] ErrorStack),

    #[error("Failed to parse certificate: {0}")]
    Parse(String),
}

/// One certificate entry enumerated from a store.
///
/// The record owns the certificate, any chain certificates that were stored
/// alongside it, and the handle to its private key. Dropping the record
/// releases all of them.
pub struct CertificateRecord {
    certificate: X509,
    chain_hints: Vec<X509>,
    private_key: Option<Box<dyn PrivateKeyHandle>>,
    thumbprint: String,
    subject: String,
    common_name: Option<String>,
    issuer: String,
    subject_alternative_names: Vec<String>,
    ip_addresses: Vec<IpAddr>,
    not_before: OffsetDateTime,
    not_after: OffsetDateTime,
    extended_key_usage: Option<BTreeSet<String>>,
    public_key_algorithm_oid: String,
    signature_algorithm: String,
}

impl CertificateRecord {
    /// Build a record from a parsed certificate.
    pub fn new(
        certificate: X509,
        chain_hints: Vec<X509>,
        private_key: Option<Box<dyn PrivateKeyHandle>>,
    ) -> Result<Self, RecordError> {
        let der = certificate.to_der()?;
        let (_, parsed) =
            X509Certificate::from_der(&der).map_err(|e| RecordError::Parse(e.to_string()))?;

        let thumbprint = hex::encode_upper(&*certificate.digest(MessageDigest::sha1())?);

        let common_name = parsed
            .subject()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .map(str::to_string);

        let mut subject_alternative_names = Vec::new();
        let mut ip_addresses = Vec::new();
        let san = parsed
            .subject_alternative_name()
            .map_err(|e| RecordError::Parse(e.to_string()))?;
        if let Some(san) = san {
            for name in &san.value.general_names {
                match name {
                    GeneralName::DNSName(dns) => subject_alternative_names.push(dns.to_string()),
                    GeneralName::IPAddress(bytes) => {
                        if let Some(ip) = ip_from_bytes(bytes) {
                            ip_addresses.push(ip);
                        }
                    }
                    _ => {}
                }
            }
        }

        let extended_key_usage = parsed
            .extended_key_usage()
            .map_err(|e| RecordError::Parse(e.to_string()))?
            .map(|eku| {
                let eku = eku.value;
                let mut oids = BTreeSet::new();
                let flags = [
                    (eku.any, OID_ANY_EXTENDED_KEY_USAGE),
                    (eku.server_auth, OID_SERVER_AUTH),
                    (eku.client_auth, OID_CLIENT_AUTH),
                    (eku.code_signing, OID_CODE_SIGNING),
                    (eku.email_protection, OID_EMAIL_PROTECTION),
                    (eku.time_stamping, OID_TIME_STAMPING),
                    (eku.ocsp_signing, OID_OCSP_SIGNING),
                ];
                for (present, oid) in flags {
                    if present {
                        oids.insert(oid.to_string());
                    }
                }
                for other in &eku.other {
                    oids.insert(other.to_id_string());
                }
                oids
            });

        let signature_algorithm = certificate
            .signature_algorithm()
            .object()
            .nid()
            .short_name()
            .map(str::to_string)
            .unwrap_or_else(|_| parsed.signature_algorithm.algorithm.to_id_string());

        Ok(Self {
            thumbprint,
            subject: parsed.subject().to_string(),
            common_name,
            issuer: parsed.issuer().to_string(),
            subject_alternative_names,
            ip_addresses,
            not_before: parsed.validity().not_before.to_datetime(),
            not_after: parsed.validity().not_after.to_datetime(),
            extended_key_usage,
            public_key_algorithm_oid: parsed.public_key().algorithm.algorithm.to_id_string(),
            signature_algorithm,
            certificate,
            chain_hints,
            private_key,
        })
    }

    pub fn certificate(&self) -> &X509Ref {
        &self.certificate
    }

    /// Certificates stored together with this one, in storage order.
    pub fn chain_hints(&self) -> &[X509] {
        &self.chain_hints
    }

    pub fn has_private_key(&self) -> bool {
        self.private_key.is_some()
    }

    pub fn private_key_mut(&mut self) -> Option<&mut (dyn PrivateKeyHandle + 'static)> {
        self.private_key.as_deref_mut()
    }

    /// Uppercase hex SHA-1 fingerprint of the DER encoding.
    pub fn thumbprint(&self) -> &str {
        &self.thumbprint
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn common_name(&self) -> Option<&str> {
        self.common_name.as_deref()
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn subject_alternative_names(&self) -> &[String] {
        &self.subject_alternative_names
    }

    pub fn ip_addresses(&self) -> &[IpAddr] {
        &self.ip_addresses
    }

    pub fn not_before(&self) -> OffsetDateTime {
        self.not_before
    }

    pub fn not_after(&self) -> OffsetDateTime {
        self.not_after
    }

    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() > self.not_after
    }

    /// `None` when the certificate has no Extended Key Usage extension.
    pub fn extended_key_usage(&self) -> Option<&BTreeSet<String>> {
        self.extended_key_usage.as_ref()
    }

    pub fn public_key_algorithm_oid(&self) -> &str {
        &self.public_key_algorithm_oid
    }

    pub fn key_algorithm(&self) -> KeyAlgorithm {
        KeyAlgorithm::from_oid(&self.public_key_algorithm_oid)
    }

    pub fn signature_algorithm(&self) -> &str {
        &self.signature_algorithm
    }

    pub fn summary(&self) -> CertificateSummary {
        let key_algorithm = self.key_algorithm();
        CertificateSummary {
            thumbprint: self.thumbprint.clone(),
            subject: self.subject.clone(),
            issuer: self.issuer.clone(),
            not_before: self.not_before,
            not_after: self.not_after,
            signature_algorithm: self.signature_algorithm.clone(),
            public_key_algorithm: if key_algorithm.is_supported() {
                key_algorithm.to_string()
            } else {
                self.public_key_algorithm_oid.clone()
            },
            subject_alternative_names: self.subject_alternative_names.clone(),
            has_private_key: self.has_private_key(),
        }
    }
}

impl std::fmt::Debug for CertificateRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateRecord")
            .field("thumbprint", &self.thumbprint)
            .field("subject", &self.subject)
            .field("subject_alternative_names", &self.subject_alternative_names)
            .field("not_after", &self.not_after)
            .field("has_private_key", &self.has_private_key())
            .finish_non_exhaustive()
    }
}

/// Listing view of a certificate record.
#[derive(Debug, Clone, Serialize)]
pub struct CertificateSummary {
    pub thumbprint: String,
    pub subject: String,
    pub issuer: String,
    #[serde(with = "::time::serde::rfc3339")]
    pub not_before: OffsetDateTime,
    #[serde(with = "::time::serde::rfc3339")]
    pub not_after: OffsetDateTime,
    pub signature_algorithm: String,
    pub public_key_algorithm: String,
    pub subject_alternative_names: Vec<String>,
    pub has_private_key: bool,
}

fn ip_from_bytes(bytes: &[u8]) -> Option<IpAddr> {
    if let Ok(octets) = <[u8; 4]>::try_from(bytes) {
        return Some(IpAddr::V4(Ipv4Addr::from(octets)));
    }
    if let Ok(octets) = <[u8; 16]>::try_from(bytes) {
        return Some(IpAddr::V6(Ipv6Addr::from(octets)));
    }
    None
}

/// Strip separators and case from a user-supplied thumbprint.
pub fn normalize_thumbprint(thumbprint: &str) -> String {
    thumbprint
        .chars()
        .filter(|c| !matches!(c, ':' | ' ' | '-'))
        .map(|c| c.to_ascii_uppercase())
        .collect()
}
