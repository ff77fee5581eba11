//! TLS handshake hints forwarded by the proxy.
//!
//! Caddy sends the client's offered signature schemes and cipher suites as
//! comma-separated hex code lists. They are informational unless the
//! selection policy asks for signature-scheme enforcement.

use crate::algorithm::KeyAlgorithm;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HintError {
    #[error("Invalid {field} entry '{value}': expected a 16-bit hex code")]
    Invalid { field: &'static str, value: String },
}

/// IANA TLS SignatureScheme code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignatureScheme(pub u16);

impl SignatureScheme {
    /// Key family able to produce signatures for this scheme. `None` for
    /// EdDSA, RSASSA-PSS keys and unknown codes.
    pub fn key_algorithm(self) -> Option<KeyAlgorithm> {
        match self.0 {
            // TLS 1.3 rsa_pss_rsae_*
            0x0804..=0x0806 => Some(KeyAlgorithm::Rsa),
            // ecdsa_brainpool*_tls13
            0x081a..=0x081c => Some(KeyAlgorithm::Ec),
            code => {
                let [hash, signature] = code.to_be_bytes();
                if !(0x01..=0x06).contains(&hash) {
                    return None;
                }
                // TLS 1.2 (hash, signature) pairs: rsa_pkcs1_*, dsa_*, ecdsa_*
                match signature {
                    0x01 => Some(KeyAlgorithm::Rsa),
                    0x02 => Some(KeyAlgorithm::Dsa),
                    0x03 => Some(KeyAlgorithm::Ec),
                    _ => None,
                }
            }
        }
    }
}

impl fmt::Display for SignatureScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

/// IANA TLS cipher suite code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CipherSuite(pub u16);

impl fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

/// Handshake parameters accompanying a certificate request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsHints {
    pub signature_schemes: Vec<SignatureScheme>,
    pub cipher_suites: Vec<CipherSuite>,
}

impl TlsHints {
    pub fn parse(
        signature_schemes: Option<&str>,
        cipher_suites: Option<&str>,
    ) -> Result<Self, HintError> {
        Ok(Self {
            signature_schemes: parse_hex_list("signature_schemes", signature_schemes)?
                .into_iter()
                .map(SignatureScheme)
                .collect(),
            cipher_suites: parse_hex_list("cipher_suites", cipher_suites)?
                .into_iter()
                .map(CipherSuite)
                .collect(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.signature_schemes.is_empty() && self.cipher_suites.is_empty()
    }

    /// Whether a key of `algorithm` can sign with one of the offered schemes.
    /// Always true when no schemes were offered.
    pub fn accepts(&self, algorithm: &KeyAlgorithm) -> bool {
        self.signature_schemes.is_empty()
            || self
                .signature_schemes
                .iter()
                .any(|scheme| scheme.key_algorithm().as_ref() == Some(algorithm))
    }
}

fn parse_hex_list(field: &'static str, value: Option<&str>) -> Result<Vec<u16>, HintError> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };

    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            let digits = item
                .strip_prefix("0x")
                .or_else(|| item.strip_prefix("0X"))
                .unwrap_or(item);
            u16::from_str_radix(digits, 16).map_err(|_| HintError::Invalid {
                field,
                value: item.to_string(),
            })
        })
        .collect()
}
