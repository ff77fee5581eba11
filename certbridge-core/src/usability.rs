//! Server-authentication eligibility

use crate::record::{CertificateRecord, OID_ANY_EXTENDED_KEY_USAGE, OID_SERVER_AUTH};
use std::collections::BTreeSet;

/// Whether `record` can serve TLS: it must carry a private key, and its
/// Extended Key Usage (when present and non-empty) must allow server
/// authentication. A missing extension places no restriction on usage
/// (RFC 5280 §4.2.1.12).
pub fn is_usable(record: &CertificateRecord) -> bool {
    record.has_private_key() && allows_server_auth(record.extended_key_usage())
}

pub(crate) fn allows_server_auth(extended_key_usage: Option<&BTreeSet<String>>) -> bool {
    match extended_key_usage {
        None => true,
        Some(oids) => {
            oids.is_empty()
                || oids.contains(OID_SERVER_AUTH)
                || oids.contains(OID_ANY_EXTENDED_KEY_USAGE)
        }
    }
}
