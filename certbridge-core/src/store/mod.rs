//! Certificate store adapters
//!
//! A store enumerates certificate records for a (name, location) pair and
//! supplies the chain resolver for a location. Records are handed out by
//! value; the caller drops them (and their key handles) when done.

mod directory;
mod memory;

pub use directory::DirectoryStore;
pub use memory::MemoryStore;

use crate::chain::ChainResolver;
use crate::key::{PemKeyHandle, PrivateKeyHandle};
use crate::location::{StoreLocation, StoreSelector};
use crate::record::CertificateRecord;
use openssl::x509::X509;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while reading a certificate store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Certificate store not found: {0}")]
    StoreNotFound(StoreSelector),

    #[error("Failed to read certificate store {selector}: {source}")]
    Io {
        selector: StoreSelector,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid certificate entry '{entry}': {reason}")]
    InvalidEntry { entry: String, reason: String },
}

/// Source of certificate records.
pub trait CertificateStore: Send + Sync {
    /// All entries of one store, in a stable order.
    fn enumerate(&self, selector: &StoreSelector) -> Result<Vec<CertificateRecord>, StoreError>;

    /// Chain resolver backed by the trust stores visible from `location`.
    fn chain_resolver(&self, location: StoreLocation)
    -> Result<Box<dyn ChainResolver>, StoreError>;
}

/// Locations whose trust stores apply to `location`. The user scope also
/// sees machine-wide anchors.
pub(crate) fn trust_scopes(location: StoreLocation) -> &'static [StoreLocation] {
    match location {
        StoreLocation::LocalMachine => &[StoreLocation::LocalMachine],
        StoreLocation::CurrentUser => &[StoreLocation::CurrentUser, StoreLocation::LocalMachine],
    }
}

const CERTIFICATE_TAGS: [&str; 3] = ["CERTIFICATE", "X509 CERTIFICATE", "TRUSTED CERTIFICATE"];

/// Decode every certificate in `contents`, which is PEM text or a single DER
/// certificate.
pub(crate) fn parse_certificates(entry: &str, contents: &[u8]) -> Result<Vec<X509>, StoreError> {
    let invalid = |reason: String| StoreError::InvalidEntry {
        entry: entry.to_string(),
        reason,
    };

    if !contents.windows(11).any(|w| w == b"-----BEGIN ") {
        return X509::from_der(contents)
            .map(|cert| vec![cert])
            .map_err(|e| invalid(e.to_string()));
    }

    pem::parse_many(contents)
        .map_err(|e| invalid(e.to_string()))?
        .iter()
        .filter(|block| CERTIFICATE_TAGS.contains(&block.tag()))
        .map(|block| X509::from_der(block.contents()).map_err(|e| invalid(e.to_string())))
        .collect()
}

fn has_key_block(contents: &[u8]) -> bool {
    pem::parse_many(contents)
        .map(|blocks| blocks.iter().any(|b| b.tag().ends_with("PRIVATE KEY")))
        .unwrap_or(false)
}

/// Build a record from one stored entry.
///
/// The first certificate is the leaf and the rest are chain hints. The key
/// comes from `contents` itself or, failing that, from `key_file`. A
/// plaintext key that does not belong to the leaf is dropped.
pub(crate) fn load_entry(
    entry: &str,
    contents: &[u8],
    key_file: Option<&[u8]>,
    passphrase: Option<&Arc<[u8]>>,
) -> Result<CertificateRecord, StoreError> {
    let mut certificates = parse_certificates(entry, contents)?.into_iter();
    let leaf = certificates.next().ok_or_else(|| StoreError::InvalidEntry {
        entry: entry.to_string(),
        reason: "no certificate found".to_string(),
    })?;
    let chain_hints: Vec<X509> = certificates.collect();

    let key_source = if has_key_block(contents) {
        Some(contents)
    } else {
        key_file
    };
    let private_key = match key_source {
        Some(pem) => match PemKeyHandle::from_pem(pem, passphrase.cloned()) {
            Ok(handle) if handle.matches_certificate(&leaf) == Some(false) => {
                tracing::warn!(entry, "Private key does not match certificate, ignoring key");
                None
            }
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!(entry, "Failed to load private key: {}", e);
                None
            }
        },
        None => None,
    };

    CertificateRecord::new(
        leaf,
        chain_hints,
        private_key.map(|handle| Box::new(handle) as Box<dyn PrivateKeyHandle>),
    )
    .map_err(|e| StoreError::InvalidEntry {
        entry: entry.to_string(),
        reason: e.to_string(),
    })
}
