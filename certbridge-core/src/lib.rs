//! certbridge core - certificate selection and PEM export
//!
//! Picks the best certificate for a hostname out of a certificate store,
//! builds its trust chain and serializes key, leaf and chain into one PEM
//! bundle. The HTTP front end lives in `certbridge-server`.

mod algorithm;
mod chain;
mod export;
mod hints;
mod hostname;
mod key;
mod location;
mod record;
mod selector;
mod service;
pub mod store;
mod usability;

#[cfg(test)]
mod test_support;

pub use algorithm::KeyAlgorithm;
pub use chain::{ChainElement, ChainError, ChainResolver, X509ChainResolver, build_chain};
pub use export::{CertificateBundle, ExportError, PemBlock, PemBlockKind, export_bundle};
pub use hints::{CipherSuite, HintError, SignatureScheme, TlsHints};
pub use hostname::{matches_hostname, name_matches};
pub use key::{KeyHandleError, PemKeyHandle, PrivateKeyHandle};
pub use location::{SelectorParseError, StoreLocation, StoreName, StoreSelector};
pub use record::{CertificateRecord, CertificateSummary, RecordError, normalize_thumbprint};
pub use selector::{SelectionPolicy, select_best, select_best_with, select_by_thumbprint};
pub use service::{CertificateService, ServiceError};
pub use store::{CertificateStore, DirectoryStore, MemoryStore, StoreError};
pub use usability::is_usable;
