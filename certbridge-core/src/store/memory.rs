//! In-memory certificate store
//!
//! Holds PEM (or DER) entries per selector with the same loading rules as
//! [`super::DirectoryStore`]. Used by tests and embedders that already have
//! certificates in hand.

use super::{CertificateStore, StoreError, load_entry, parse_certificates, trust_scopes};
use crate::chain::{ChainResolver, X509ChainResolver};
use crate::location::{StoreLocation, StoreName, StoreSelector};
use crate::record::CertificateRecord;
use openssl::x509::X509;
use std::collections::HashMap;
use std::sync::Arc;

struct MemoryEntry {
    name: String,
    contents: Vec<u8>,
    key: Option<Vec<u8>>,
}

#[derive(Default)]
pub struct MemoryStore {
    stores: HashMap<StoreSelector, Vec<MemoryEntry>>,
    passphrase: Option<Arc<[u8]>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_passphrase(mut self, passphrase: impl AsRef<[u8]>) -> Self {
        self.passphrase = Some(Arc::from(passphrase.as_ref()));
        self
    }

    /// Make an empty store exist.
    pub fn create_store(&mut self, selector: StoreSelector) -> &mut Self {
        self.stores.entry(selector).or_default();
        self
    }

    /// Append an entry. `contents` may carry certificates and a key.
    pub fn add(
        &mut self,
        selector: StoreSelector,
        name: impl Into<String>,
        contents: impl Into<Vec<u8>>,
    ) -> &mut Self {
        self.push(selector, name.into(), contents.into(), None)
    }

    /// Append an entry whose key is held separately.
    pub fn add_with_key(
        &mut self,
        selector: StoreSelector,
        name: impl Into<String>,
        contents: impl Into<Vec<u8>>,
        key: impl Into<Vec<u8>>,
    ) -> &mut Self {
        self.push(selector, name.into(), contents.into(), Some(key.into()))
    }

    fn push(
        &mut self,
        selector: StoreSelector,
        name: String,
        contents: Vec<u8>,
        key: Option<Vec<u8>>,
    ) -> &mut Self {
        self.stores
            .entry(selector)
            .or_default()
            .push(MemoryEntry {
                name,
                contents,
                key,
            });
        self
    }

    fn all_certificates(&self, selector: StoreSelector) -> Vec<X509> {
        let Some(entries) = self.stores.get(&selector) else {
            return Vec::new();
        };
        entries
            .iter()
            .filter_map(|entry| match parse_certificates(&entry.name, &entry.contents) {
                Ok(certs) => Some(certs),
                Err(e) => {
                    tracing::warn!(store = %selector, "Skipping trust entry: {}", e);
                    None
                }
            })
            .flatten()
            .collect()
    }
}

impl CertificateStore for MemoryStore {
    fn enumerate(&self, selector: &StoreSelector) -> Result<Vec<CertificateRecord>, StoreError> {
        let entries = self
            .stores
            .get(selector)
            .ok_or(StoreError::StoreNotFound(*selector))?;

        Ok(entries
            .iter()
            .filter_map(|entry| {
                load_entry(
                    &entry.name,
                    &entry.contents,
                    entry.key.as_deref(),
                    self.passphrase.as_ref(),
                )
                .map_err(|e| tracing::warn!(store = %selector, "Skipping certificate entry: {}", e))
                .ok()
            })
            .collect())
    }

    fn chain_resolver(
        &self,
        location: StoreLocation,
    ) -> Result<Box<dyn ChainResolver>, StoreError> {
        let mut trusted = Vec::new();
        let mut intermediates = Vec::new();
        for &scope in trust_scopes(location) {
            for name in [StoreName::Root, StoreName::AuthRoot] {
                trusted.extend(self.all_certificates(StoreSelector::new(name, scope)));
            }
            intermediates.extend(
                self.all_certificates(StoreSelector::new(StoreName::CertificateAuthority, scope)),
            );
        }
        Ok(Box::new(X509ChainResolver::new(trusted, intermediates)))
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("stores", &self.stores.len())
            .field("has_passphrase", &self.passphrase.is_some())
            .finish()
    }
}
