//! Trust chain construction
//!
//! Chains are built leaf-first. Resolution is delegated to a
//! [`ChainResolver`]; whatever it cannot resolve degrades to a shorter chain,
//! never to an error.

use crate::record::CertificateRecord;
use openssl::error::ErrorStack;
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::{X509, X509Ref, X509StoreContext, X509VerifyResult};
use thiserror::Error;

/// Longest chain the issuer walk will follow.
const MAX_CHAIN_DEPTH: usize = 10;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("Chain could not be resolved: {0}")]
    Unresolved(String),
}

/// One certificate of a built chain.
#[derive(Clone)]
pub struct ChainElement {
    certificate: X509,
}

impl ChainElement {
    pub fn new(certificate: X509) -> Self {
        Self { certificate }
    }

    pub fn certificate(&self) -> &X509Ref {
        &self.certificate
    }

    pub fn subject(&self) -> String {
        self.certificate
            .subject_name()
            .entries()
            .filter_map(|entry| {
                let key = entry.object().nid().short_name().ok()?;
                let value = String::from_utf8_lossy(entry.data().as_slice());
                Some(format!("{}={}", key, value))
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn to_pem(&self) -> Result<String, ErrorStack> {
        let pem = self.certificate.to_pem()?;
        Ok(String::from_utf8_lossy(&pem).into_owned())
    }
}

impl std::fmt::Debug for ChainElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainElement")
            .field("subject", &self.subject())
            .finish()
    }
}

/// Platform capability that finds the issuers of a certificate.
pub trait ChainResolver: Send + Sync {
    /// Return the chain for `leaf`, leaf first. `bundled` holds certificates
    /// that were stored together with the leaf.
    fn resolve(&self, leaf: &X509Ref, bundled: &[X509]) -> Result<Vec<X509>, ChainError>;
}

/// Build the chain for `record`. The result always starts with the record's
/// own certificate; a resolver failure yields a leaf-only chain.
pub fn build_chain(record: &CertificateRecord, resolver: &dyn ChainResolver) -> Vec<ChainElement> {
    let leaf = record.certificate();
    let chain = match resolver.resolve(leaf, record.chain_hints()) {
        Ok(chain) if chain.first().is_some_and(|first| same_certificate(first, leaf)) => chain,
        Ok(_) => {
            tracing::debug!(
                thumbprint = %record.thumbprint(),
                "Resolver returned a chain not rooted at the leaf, using leaf only"
            );
            vec![leaf.to_owned()]
        }
        Err(e) => {
            tracing::debug!(
                thumbprint = %record.thumbprint(),
                "Chain resolution failed, using leaf only: {}", e
            );
            vec![leaf.to_owned()]
        }
    };

    chain.into_iter().map(ChainElement::new).collect()
}

/// OpenSSL chain resolver over a set of trusted roots and untrusted
/// intermediates.
///
/// A verified path is preferred. When verification fails (unknown root,
/// expired intermediate, ...) the resolver falls back to walking issuers by
/// name and signature so the exported chain still carries every certificate
/// the store knows about.
pub struct X509ChainResolver {
    trusted: Vec<X509>,
    intermediates: Vec<X509>,
    use_system_trust: bool,
}

impl X509ChainResolver {
    pub fn new(trusted: Vec<X509>, intermediates: Vec<X509>) -> Self {
        Self {
            trusted,
            intermediates,
            use_system_trust: false,
        }
    }

    /// Also trust OpenSSL's default certificate locations.
    pub fn with_system_trust(mut self, enabled: bool) -> Self {
        self.use_system_trust = enabled;
        self
    }

    fn verified_chain(
        &self,
        leaf: &X509Ref,
        bundled: &[X509],
    ) -> Result<Option<Vec<X509>>, ErrorStack> {
        let mut builder = X509StoreBuilder::new()?;
        if self.use_system_trust {
            builder.set_default_paths()?;
        }
        for root in &self.trusted {
            builder.add_cert(root.clone())?;
        }
        let store = builder.build();

        let mut untrusted = Stack::new()?;
        for cert in bundled.iter().chain(&self.intermediates) {
            untrusted.push(cert.clone())?;
        }

        let mut context = X509StoreContext::new()?;
        context.init(&store, leaf, &untrusted, |context| {
            if !context.verify_cert()? {
                tracing::trace!(
                    "Chain verification failed: {}",
                    context.error().error_string()
                );
                return Ok(None);
            }
            Ok(context
                .chain()
                .map(|chain| chain.iter().map(X509Ref::to_owned).collect()))
        })
    }

    fn walked_chain(&self, leaf: &X509Ref, bundled: &[X509]) -> Vec<X509> {
        let pool: Vec<&X509> = bundled
            .iter()
            .chain(&self.intermediates)
            .chain(&self.trusted)
            .collect();

        let mut chain = vec![leaf.to_owned()];
        while chain.len() < MAX_CHAIN_DEPTH {
            let next = {
                let current = &chain[chain.len() - 1];
                if is_self_issued(current) {
                    break;
                }
                pool.iter()
                    .find(|candidate| {
                        candidate.issued(current) == X509VerifyResult::OK
                            && signed_by(current, candidate)
                            && !chain.iter().any(|seen| same_certificate(seen, candidate))
                    })
                    .map(|issuer| (*issuer).clone())
            };
            match next {
                Some(issuer) => chain.push(issuer),
                None => break,
            }
        }
        chain
    }
}

impl ChainResolver for X509ChainResolver {
    fn resolve(&self, leaf: &X509Ref, bundled: &[X509]) -> Result<Vec<X509>, ChainError> {
        match self.verified_chain(leaf, bundled) {
            Ok(Some(chain)) if !chain.is_empty() => return Ok(chain),
            Ok(_) => {}
            Err(e) => tracing::debug!("Chain verification could not run: {}", e),
        }
        Ok(self.walked_chain(leaf, bundled))
    }
}

fn same_certificate(a: &X509Ref, b: &X509Ref) -> bool {
    match (a.to_der(), b.to_der()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn is_self_issued(cert: &X509Ref) -> bool {
    cert.issued(cert) == X509VerifyResult::OK
}

fn signed_by(cert: &X509Ref, issuer: &X509Ref) -> bool {
    issuer
        .public_key()
        .and_then(|key| cert.verify(&key))
        .unwrap_or(false)
}
