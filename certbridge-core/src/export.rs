//! PEM bundle export: private key, leaf, then the rest of the chain.

use crate::chain::ChainElement;
use crate::record::CertificateRecord;
use std::fmt;
use thiserror::Error;

/// Errors that can occur while exporting a certificate bundle
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Unsupported public key algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Certificate has no private key")]
    MissingPrivateKey,

    #[error("Private key is not exportable: {0}")]
    KeyNotExportable(String),

    #[error("Private key export failed: {0}")]
    KeyExportFailed(String),

    #[error("Certificate encoding failed: {0}")]
    CertificateEncoding(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PemBlockKind {
    PrivateKey,
    Certificate,
}

/// One newline-terminated PEM block.
#[derive(Clone)]
pub struct PemBlock {
    kind: PemBlockKind,
    text: String,
}

impl PemBlock {
    fn new(kind: PemBlockKind, text: String) -> Self {
        let mut text = text;
        let content_len = text.trim_end_matches(['\r', '\n']).len();
        text.truncate(content_len);
        text.push('\n');
        Self { kind, text }
    }

    pub fn kind(&self) -> PemBlockKind {
        self.kind
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// The exported key and certificates, in handshake order.
///
/// Always exactly one private key block, first, followed by the leaf and then
/// the remaining chain certificates.
#[derive(Clone)]
pub struct CertificateBundle {
    blocks: Vec<PemBlock>,
}

impl CertificateBundle {
    pub fn new(private_key_pem: String, leaf_pem: String, chain_pems: Vec<String>) -> Self {
        let mut blocks = Vec::with_capacity(chain_pems.len() + 2);
        blocks.push(PemBlock::new(PemBlockKind::PrivateKey, private_key_pem));
        blocks.push(PemBlock::new(PemBlockKind::Certificate, leaf_pem));
        blocks.extend(
            chain_pems
                .into_iter()
                .map(|pem| PemBlock::new(PemBlockKind::Certificate, pem)),
        );
        Self { blocks }
    }

    pub fn blocks(&self) -> &[PemBlock] {
        &self.blocks
    }

    pub fn private_key(&self) -> &PemBlock {
        &self.blocks[0]
    }

    /// Leaf first.
    pub fn certificates(&self) -> &[PemBlock] {
        &self.blocks[1..]
    }

    pub fn to_pem_string(&self) -> String {
        self.blocks.iter().map(PemBlock::text).collect()
    }
}

impl fmt::Display for CertificateBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for block in &self.blocks {
            f.write_str(block.text())?;
        }
        Ok(())
    }
}

// Never print key material.
impl fmt::Debug for CertificateBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateBundle")
            .field("certificates", &self.certificates().len())
            .finish_non_exhaustive()
    }
}

/// Serialize `record`'s private key, its certificate and the chain after it.
///
/// `chain` is the output of [`crate::chain::build_chain`]; its first element
/// is the leaf and is not repeated. Nothing is returned unless every block
/// serialized.
pub fn export_bundle(
    record: &mut CertificateRecord,
    chain: &[ChainElement],
) -> Result<CertificateBundle, ExportError> {
    let algorithm = record.key_algorithm();
    if !algorithm.is_supported() {
        return Err(ExportError::UnsupportedAlgorithm(algorithm.oid().to_string()));
    }

    let leaf_pem = record
        .certificate()
        .to_pem()
        .map(|pem| String::from_utf8_lossy(&pem).into_owned())
        .map_err(|e| ExportError::CertificateEncoding(e.to_string()))?;
    let chain_pems = chain
        .iter()
        .skip(1)
        .map(ChainElement::to_pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ExportError::CertificateEncoding(e.to_string()))?;

    let leaf = record.certificate().to_owned();
    let key = record
        .private_key_mut()
        .ok_or(ExportError::MissingPrivateKey)?;
    if !key.allows_plaintext_export() {
        key.relax_export_policy()
            .map_err(|e| ExportError::KeyNotExportable(e.to_string()))?;
    }
    if key.matches_certificate(&leaf) == Some(false) {
        return Err(ExportError::KeyExportFailed(
            "private key does not match certificate".to_string(),
        ));
    }
    let key_pem = key
        .export_pem(&algorithm)
        .map_err(|e| ExportError::KeyExportFailed(e.to_string()))?;

    Ok(CertificateBundle::new(key_pem, leaf_pem, chain_pems))
}
