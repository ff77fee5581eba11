//! Request pipeline: enumerate, select, build the chain, export.
//!
//! Every call works on freshly enumerated records and drops all of them,
//! selected or not, before it returns.

use crate::chain::build_chain;
use crate::export::{CertificateBundle, ExportError, export_bundle};
use crate::hints::TlsHints;
use crate::location::StoreSelector;
use crate::record::{CertificateRecord, CertificateSummary};
use crate::selector::{SelectionPolicy, select_best_with, select_by_thumbprint};
use crate::store::{CertificateStore, StoreError};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

#[derive(Clone)]
pub struct CertificateService {
    store: Arc<dyn CertificateStore>,
    policy: SelectionPolicy,
}

impl CertificateService {
    pub fn new(store: Arc<dyn CertificateStore>) -> Self {
        Self {
            store,
            policy: SelectionPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: SelectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    /// Bundle for the best certificate serving `host`. `Ok(None)` when no
    /// usable certificate matches.
    pub fn bundle_for_host(
        &self,
        selector: &StoreSelector,
        host: &str,
        hints: &TlsHints,
    ) -> Result<Option<CertificateBundle>, ServiceError> {
        if !hints.is_empty() {
            tracing::debug!(
                host,
                signature_schemes = ?hints.signature_schemes,
                cipher_suites = ?hints.cipher_suites,
                "Handshake hints"
            );
        }

        let candidates = self.store.enumerate(selector)?;
        let candidate_count = candidates.len();
        let Some(mut selected) = select_best_with(candidates, host, hints, self.policy) else {
            tracing::info!(store = %selector, host, candidate_count, "No certificate found");
            return Ok(None);
        };

        tracing::debug!(
            store = %selector,
            host,
            thumbprint = %selected.thumbprint(),
            not_after = %selected.not_after(),
            "Selected certificate"
        );
        self.export(selector, &mut selected).map(Some)
    }

    /// Bundle for the certificate with `thumbprint`, regardless of hostname
    /// or usability.
    pub fn bundle_for_thumbprint(
        &self,
        selector: &StoreSelector,
        thumbprint: &str,
    ) -> Result<Option<CertificateBundle>, ServiceError> {
        let candidates = self.store.enumerate(selector)?;
        let Some(mut selected) = select_by_thumbprint(candidates, thumbprint) else {
            tracing::info!(store = %selector, thumbprint, "No certificate with thumbprint");
            return Ok(None);
        };

        tracing::debug!(store = %selector, thumbprint = %selected.thumbprint(), "Selected certificate");
        self.export(selector, &mut selected).map(Some)
    }

    /// Summaries of every entry in a store.
    pub fn list(&self, selector: &StoreSelector) -> Result<Vec<CertificateSummary>, ServiceError> {
        Ok(self
            .store
            .enumerate(selector)?
            .iter()
            .map(CertificateRecord::summary)
            .collect())
    }

    fn export(
        &self,
        selector: &StoreSelector,
        record: &mut CertificateRecord,
    ) -> Result<CertificateBundle, ServiceError> {
        if record.is_expired() {
            tracing::warn!(
                thumbprint = %record.thumbprint(),
                not_after = %record.not_after(),
                "Serving expired certificate"
            );
        }

        let resolver = self.store.chain_resolver(selector.location())?;
        let chain = build_chain(record, resolver.as_ref());

        export_bundle(record, &chain).map_err(|e| {
            tracing::warn!(
                store = %selector,
                thumbprint = %record.thumbprint(),
                "Certificate export failed: {}", e
            );
            ServiceError::Export(e)
        })
    }
}

impl std::fmt::Debug for CertificateService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateService")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
