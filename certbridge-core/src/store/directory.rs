//! Filesystem-backed certificate store
//!
//! Layout: `<location root>/<store dir>/<entry>.{pem,crt,cer,der}` with an
//! optional sibling `<entry>.key`.

use super::{CertificateStore, StoreError, load_entry, parse_certificates, trust_scopes};
use crate::chain::{ChainResolver, X509ChainResolver};
use crate::location::{StoreLocation, StoreName, StoreSelector};
use crate::record::CertificateRecord;
use openssl::x509::X509;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const ENTRY_EXTENSIONS: [&str; 4] = ["pem", "crt", "cer", "der"];

/// Certificate stores laid out as directories, one root per location.
pub struct DirectoryStore {
    machine_root: PathBuf,
    user_root: Option<PathBuf>,
    passphrase: Option<Arc<[u8]>>,
    use_system_trust: bool,
}

impl DirectoryStore {
    pub fn new(machine_root: impl Into<PathBuf>) -> Self {
        Self {
            machine_root: machine_root.into(),
            user_root: None,
            passphrase: None,
            use_system_trust: true,
        }
    }

    pub fn with_user_root(mut self, user_root: impl Into<PathBuf>) -> Self {
        self.user_root = Some(user_root.into());
        self
    }

    /// Passphrase that unlocks encrypted keys when their export policy is
    /// relaxed.
    pub fn with_passphrase(mut self, passphrase: impl AsRef<[u8]>) -> Self {
        self.passphrase = Some(Arc::from(passphrase.as_ref()));
        self
    }

    pub fn with_system_trust(mut self, enabled: bool) -> Self {
        self.use_system_trust = enabled;
        self
    }

    fn location_root(&self, location: StoreLocation) -> Option<&Path> {
        match location {
            StoreLocation::LocalMachine => Some(self.machine_root.as_path()),
            StoreLocation::CurrentUser => self.user_root.as_deref(),
        }
    }

    pub fn store_dir(&self, selector: &StoreSelector) -> Option<PathBuf> {
        self.location_root(selector.location())
            .map(|root| root.join(selector.name().dir_name()))
    }

    /// Certificate files of a store, sorted by file name.
    fn entry_paths(&self, selector: &StoreSelector) -> Result<Vec<PathBuf>, StoreError> {
        let dir = self
            .store_dir(selector)
            .filter(|dir| dir.is_dir())
            .ok_or(StoreError::StoreNotFound(*selector))?;

        let read_dir = std::fs::read_dir(&dir).map_err(|source| StoreError::Io {
            selector: *selector,
            source,
        })?;

        let mut paths = Vec::new();
        for entry in read_dir {
            let path = entry
                .map_err(|source| StoreError::Io {
                    selector: *selector,
                    source,
                })?
                .path();
            let is_entry = path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ENTRY_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
            if is_entry {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn load_path(&self, path: &Path) -> Result<CertificateRecord, StoreError> {
        let entry = path.display().to_string();
        let read_error = |e: std::io::Error| StoreError::InvalidEntry {
            entry: entry.clone(),
            reason: e.to_string(),
        };

        let contents = std::fs::read(path).map_err(read_error)?;
        let key_path = path.with_extension("key");
        let key_file = if key_path.is_file() {
            Some(std::fs::read(&key_path).map_err(read_error)?)
        } else {
            None
        };

        load_entry(
            &entry,
            &contents,
            key_file.as_deref(),
            self.passphrase.as_ref(),
        )
    }

    /// Every certificate in a store, leaf or not. Missing stores are empty.
    fn all_certificates(&self, selector: StoreSelector) -> Vec<X509> {
        let paths = match self.entry_paths(&selector) {
            Ok(paths) => paths,
            Err(StoreError::StoreNotFound(_)) => return Vec::new(),
            Err(e) => {
                tracing::warn!("Skipping trust store {}: {}", selector, e);
                return Vec::new();
            }
        };

        let mut certificates = Vec::new();
        for path in paths {
            let parsed = std::fs::read(&path)
                .map_err(|e| e.to_string())
                .and_then(|contents| {
                    parse_certificates(&path.display().to_string(), &contents)
                        .map_err(|e| e.to_string())
                });
            match parsed {
                Ok(certs) => certificates.extend(certs),
                Err(e) => tracing::warn!(path = %path.display(), "Skipping trust entry: {}", e),
            }
        }
        certificates
    }
}

impl CertificateStore for DirectoryStore {
    fn enumerate(&self, selector: &StoreSelector) -> Result<Vec<CertificateRecord>, StoreError> {
        let paths = self.entry_paths(selector)?;

        let mut records = Vec::with_capacity(paths.len());
        for path in paths {
            match self.load_path(&path) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(store = %selector, "Skipping certificate entry: {}", e),
            }
        }

        tracing::debug!(store = %selector, count = records.len(), "Enumerated certificate store");
        Ok(records)
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

        Ok(Box::new(
            X509ChainResolver::new(trusted, intermediates).with_system_trust(self.use_system_trust),
        ))
    }
}

impl std::fmt::Debug for DirectoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryStore")
            .field("machine_root", &self.machine_root)
            .field("user_root", &self.user_root)
            .field("has_passphrase", &self.passphrase.is_some())
            .field("use_system_trust", &self.use_system_trust)
            .finish()
    }
}
