//! Hostname matching against certificate names

use crate::record::CertificateRecord;
use std::net::IpAddr;

/// Whether `record` covers `host`.
///
/// DNS hosts match the subject common name or any DNS SAN, exactly or
/// through a single-label `*.` wildcard. IP hosts only match IP SANs.
pub fn matches_hostname(record: &CertificateRecord, host: &str) -> bool {
    let host = host.strip_suffix('.').unwrap_or(host);
    if host.is_empty() {
        return false;
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return record.ip_addresses().contains(&ip);
    }

    record
        .common_name()
        .into_iter()
        .chain(record.subject_alternative_names().iter().map(String::as_str))
        .any(|pattern| name_matches(pattern, host))
}

/// Match one certificate name against a host. Wildcards cover exactly one
/// non-empty leftmost label.
pub fn name_matches(pattern: &str, host: &str) -> bool {
    let pattern = pattern.strip_suffix('.').unwrap_or(pattern);
    if pattern.is_empty() {
        return false;
    }

    if let Some(suffix) = pattern.strip_prefix("*.") {
        let Some((label, rest)) = host.split_once('.') else {
            return false;
        };
        return !label.is_empty() && !suffix.is_empty() && rest.eq_ignore_ascii_case(suffix);
    }

    pattern.eq_ignore_ascii_case(host)
}
