//! Private key handles and their export policy.
//!
//! A store hands out one [`PrivateKeyHandle`] per certificate record. The
//! handle decides whether its key may be written out in plaintext and knows
//! how to lift that restriction for its own lifetime.

use crate::algorithm::KeyAlgorithm;
use openssl::error::ErrorStack;
use openssl::pkey::{Id, PKey, PKeyRef, Private};
use openssl::x509::X509Ref;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by a private key handle
#[derive(Debug, Error)]
pub enum KeyHandleError {
    #[error("Plaintext export not permitted: {0}")]
    PolicyDenied(String),

    #[error("Private key is {actual} but the certificate declares {expected}")]
    AlgorithmMismatch {
        expected: KeyAlgorithm,
        actual: String,
    },

    #[error("No private key block found")]
    Missing,

    #[error("Invalid key data: {0}")]
    Invalid(String),

    #[error("OpenSSL error: {0}")]
    Crypto(#[from] ErrorStack),
}

/// Capability to export one certificate's private key.
pub trait PrivateKeyHandle: Send {
    /// Whether the key can currently be exported in plaintext.
    fn allows_plaintext_export(&self) -> bool;

    /// Permit plaintext export for this handle. The change is not persisted
    /// and ends when the handle is dropped.
    fn relax_export_policy(&mut self) -> Result<(), KeyHandleError>;

    /// Serialize the key using the PEM encoding for `algorithm`: PKCS#1 for
    /// RSA, PKCS#8 for DSA, SEC1 for EC.
    fn export_pem(&self, algorithm: &KeyAlgorithm) -> Result<String, KeyHandleError>;

    /// Whether the key belongs to `certificate`. `None` when the handle cannot
    /// tell yet, e.g. while the key is still encrypted.
    fn matches_certificate(&self, certificate: &X509Ref) -> Option<bool>;
}

enum KeyState {
    Plaintext(PKey<Private>),
    /// Encrypted at rest; `pem` still holds the ciphertext.
    Sealed {
        pem: Vec<u8>,
        passphrase: Option<Arc<[u8]>>,
    },
}

/// OpenSSL-backed key handle loaded from PEM text.
///
/// Plaintext keys are exportable as loaded. Encrypted keys start out sealed
/// and are unlocked by [`PrivateKeyHandle::relax_export_policy`] using the
/// store passphrase.
pub struct PemKeyHandle {
    state: KeyState,
}

impl PemKeyHandle {
    /// Load the first private key found in `pem`. Certificate blocks in the
    /// same buffer are skipped.
    pub fn from_pem(pem: &[u8], passphrase: Option<Arc<[u8]>>) -> Result<Self, KeyHandleError> {
        let blocks = pem::parse_many(pem).map_err(|e| KeyHandleError::Invalid(e.to_string()))?;
        let key_block = blocks
            .iter()
            .find(|block| block.tag().ends_with("PRIVATE KEY"))
            .ok_or(KeyHandleError::Missing)?;

        let encrypted = key_block.tag() == "ENCRYPTED PRIVATE KEY"
            || key_block
                .headers()
                .get("Proc-Type")
                .is_some_and(|value| value.contains("ENCRYPTED"));

        let state = if encrypted {
            KeyState::Sealed {
                pem: pem.to_vec(),
                passphrase,
            }
        } else {
            KeyState::Plaintext(PKey::private_key_from_pem(pem)?)
        };
        Ok(Self { state })
    }

    pub fn from_pkey(key: PKey<Private>) -> Self {
        Self {
            state: KeyState::Plaintext(key),
        }
    }

    /// The decoded key, if it is not sealed.
    pub fn plaintext_key(&self) -> Option<&PKeyRef<Private>> {
        match &self.state {
            KeyState::Plaintext(key) => Some(key),
            KeyState::Sealed { .. } => None,
        }
    }
}

impl std::fmt::Debug for PemKeyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PemKeyHandle")
            .field("sealed", &matches!(self.state, KeyState::Sealed { .. }))
            .finish()
    }
}

impl PrivateKeyHandle for PemKeyHandle {
    fn allows_plaintext_export(&self) -> bool {
        matches!(self.state, KeyState::Plaintext(_))
    }

    fn relax_export_policy(&mut self) -> Result<(), KeyHandleError> {
        let KeyState::Sealed { pem, passphrase } = &self.state else {
            return Ok(());
        };
        let Some(passphrase) = passphrase else {
            return Err(KeyHandleError::PolicyDenied(
                "key is encrypted and no store passphrase is configured".to_string(),
            ));
        };

        let key = PKey::private_key_from_pem_passphrase(pem, passphrase).map_err(|e| {
            KeyHandleError::PolicyDenied(format!("failed to unlock encrypted key: {}", e))
        })?;
        self.state = KeyState::Plaintext(key);
        Ok(())
    }

    fn export_pem(&self, algorithm: &KeyAlgorithm) -> Result<String, KeyHandleError> {
        let KeyState::Plaintext(key) = &self.state else {
            return Err(KeyHandleError::PolicyDenied(
                "key is still encrypted".to_string(),
            ));
        };

        let id = key.id();
        let pem = match algorithm {
            KeyAlgorithm::Rsa if id == Id::RSA => key.rsa()?.private_key_to_pem()?,
            KeyAlgorithm::Dsa if id == Id::DSA => key.private_key_to_pem_pkcs8()?,
            KeyAlgorithm::Ec if id == Id::EC => key.ec_key()?.private_key_to_pem()?,
            expected => {
                return Err(KeyHandleError::AlgorithmMismatch {
                    expected: expected.clone(),
                    actual: key_type_name(id),
                });
            }
        };

        String::from_utf8(pem).map_err(|e| KeyHandleError::Invalid(e.to_string()))
    }

    fn matches_certificate(&self, certificate: &X509Ref) -> Option<bool> {
        let key = self.plaintext_key()?;
        Some(
            certificate
                .public_key()
                .map(|public| public.public_eq(key))
                .unwrap_or(false),
        )
    }
}

fn key_type_name(id: Id) -> String {
    if id == Id::RSA {
        "RSA".to_string()
    } else if id == Id::DSA {
        "DSA".to_string()
    } else if id == Id::EC {
        "EC".to_string()
    } else if id == Id::ED25519 {
        "Ed25519".to_string()
    } else {
        format!("key type {}", id.as_raw())
    }
}
