//! Best-certificate selection

use crate::hints::TlsHints;
use crate::hostname::matches_hostname;
use crate::record::{CertificateRecord, normalize_thumbprint};
use crate::usability::is_usable;

/// Extra selection rules on top of usability and hostname matching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionPolicy {
    /// Drop candidates whose key cannot sign with any offered signature
    /// scheme. Off by default: the hints are then informational only.
    pub enforce_signature_schemes: bool,
}

/// Pick the usable certificate for `host` with the latest expiry.
///
/// Candidates that are not picked are dropped here. Ties on `not_after` go to
/// the earliest candidate.
pub fn select_best<I>(candidates: I, host: &str) -> Option<CertificateRecord>
where
    I: IntoIterator<Item = CertificateRecord>,
{
    select_best_with(candidates, host, &TlsHints::default(), SelectionPolicy::default())
}

/// [`select_best`] with handshake hints and a selection policy.
pub fn select_best_with<I>(
    candidates: I,
    host: &str,
    hints: &TlsHints,
    policy: SelectionPolicy,
) -> Option<CertificateRecord>
where
    I: IntoIterator<Item = CertificateRecord>,
{
    candidates
        .into_iter()
        .filter(|candidate| is_usable(candidate) && matches_hostname(candidate, host))
        .filter(|candidate| {
            !policy.enforce_signature_schemes || hints.accepts(&candidate.key_algorithm())
        })
        .fold(None, |best, candidate| match best {
            Some(best) if best.not_after() >= candidate.not_after() => Some(best),
            _ => Some(candidate),
        })
}

/// Find the certificate with the given thumbprint. No usability or hostname
/// filtering applies: the caller named the certificate explicitly.
pub fn select_by_thumbprint<I>(candidates: I, thumbprint: &str) -> Option<CertificateRecord>
where
    I: IntoIterator<Item = CertificateRecord>,
{
    let wanted = normalize_thumbprint(thumbprint);
    if wanted.is_empty() {
        return None;
    }
    candidates
        .into_iter()
        .find(|candidate| candidate.thumbprint() == wanted)
}
