//! Public key algorithm classification

use std::fmt;

pub const OID_RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
pub const OID_DSA: &str = "1.2.840.10040.4.1";
pub const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";

/// Key family of a certificate, derived from its public key algorithm OID.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyAlgorithm {
    Rsa,
    Dsa,
    Ec,
    /// Any other algorithm; carries the OID for diagnostics.
    Unsupported(String),
}

impl KeyAlgorithm {
    pub fn from_oid(oid: &str) -> Self {
        match oid {
            OID_RSA_ENCRYPTION => Self::Rsa,
            OID_DSA => Self::Dsa,
            OID_EC_PUBLIC_KEY => Self::Ec,
            other => Self::Unsupported(other.to_string()),
        }
    }

    pub fn oid(&self) -> &str {
        match self {
            Self::Rsa => OID_RSA_ENCRYPTION,
            Self::Dsa => OID_DSA,
            Self::Ec => OID_EC_PUBLIC_KEY,
            Self::Unsupported(oid) => oid,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported(_))
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rsa => write!(f, "RSA"),
            Self::Dsa => write!(f, "DSA"),
            Self::Ec => write!(f, "EC"),
            Self::Unsupported(oid) => write!(f, "unsupported algorithm {}", oid),
        }
    }
}
