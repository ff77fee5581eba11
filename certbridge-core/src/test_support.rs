//! Certificate fixtures for unit tests

use crate::key::PemKeyHandle;
use crate::record::CertificateRecord;
use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::dsa::Dsa;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{Id, PKey, PKeyRef, Private};
use openssl::rsa::Rsa;
use openssl::x509::extension::{
    BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAlternativeName,
};
use openssl::x509::{X509, X509Builder, X509NameBuilder, X509Ref};
use time::OffsetDateTime;

#[derive(Clone, Copy)]
enum Eku {
    Absent,
    ServerAuth,
    ClientAuthOnly,
}

/// Builder-style description of a test certificate.
#[derive(Clone)]
pub(crate) struct CertSpec {
    common_name: String,
    dns: Vec<String>,
    ips: Vec<String>,
    not_after: Option<i64>,
    eku: Eku,
    ca: bool,
}

impl CertSpec {
    pub fn leaf(common_name: &str) -> Self {
        Self {
            common_name: common_name.to_string(),
            dns: Vec::new(),
            ips: Vec::new(),
            not_after: None,
            eku: Eku::Absent,
            ca: false,
        }
    }

    pub fn ca(common_name: &str) -> Self {
        Self {
            ca: true,
            ..Self::leaf(common_name)
        }
    }

    pub fn dns(mut self, names: &[&str]) -> Self {
        self.dns.extend(names.iter().map(|n| n.to_string()));
        self
    }

    pub fn ip(mut self, ip: &str) -> Self {
        self.ips.push(ip.to_string());
        self
    }

    pub fn expires_at(mut self, unix_timestamp: i64) -> Self {
        self.not_after = Some(unix_timestamp);
        self
    }

    pub fn server_auth(mut self) -> Self {
        self.eku = Eku::ServerAuth;
        self
    }

    pub fn client_auth_only(mut self) -> Self {
        self.eku = Eku::ClientAuthOnly;
        self
    }
}

pub(crate) fn ec_key() -> PKey<Private> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
}

pub(crate) fn rsa_key() -> PKey<Private> {
    PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap()
}

pub(crate) fn dsa_key() -> PKey<Private> {
    PKey::from_dsa(Dsa::generate(1024).unwrap()).unwrap()
}

pub(crate) fn ed25519_key() -> PKey<Private> {
    PKey::generate_ed25519().unwrap()
}

/// Issue a certificate for `key`. Self-signed when `issuer` is `None`.
pub(crate) fn issue(
    spec: &CertSpec,
    key: &PKeyRef<Private>,
    issuer: Option<(&X509Ref, &PKeyRef<Private>)>,
) -> X509 {
    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();

    let mut serial = BigNum::new().unwrap();
    serial.rand(64, MsbOption::MAYBE_ZERO, false).unwrap();
    builder
        .set_serial_number(&serial.to_asn1_integer().unwrap())
        .unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", &spec.common_name).unwrap();
    let name = name.build();
    builder.set_subject_name(&name).unwrap();
    match issuer {
        Some((issuer_cert, _)) => builder.set_issuer_name(issuer_cert.subject_name()).unwrap(),
        None => builder.set_issuer_name(&name).unwrap(),
    }
    builder.set_pubkey(key).unwrap();

    let now = OffsetDateTime::now_utc().unix_timestamp();
    let not_after = spec.not_after.unwrap_or(now + 365 * 86_400);
    builder
        .set_not_before(&Asn1Time::from_unix(now - 3_600).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::from_unix(not_after).unwrap())
        .unwrap();

    if spec.ca {
        builder
            .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
            .unwrap();
        builder
            .append_extension(
                KeyUsage::new()
                    .critical()
                    .key_cert_sign()
                    .crl_sign()
                    .build()
                    .unwrap(),
            )
            .unwrap();
    }

    if !spec.dns.is_empty() || !spec.ips.is_empty() {
        let mut san = SubjectAlternativeName::new();
        for dns in &spec.dns {
            san.dns(dns);
        }
        for ip in &spec.ips {
            san.ip(ip);
        }
        let extension = {
            let context = builder.x509v3_context(issuer.map(|(cert, _)| cert), None);
            san.build(&context).unwrap()
        };
        builder.append_extension(extension).unwrap();
    }

    match spec.eku {
        Eku::Absent => {}
        Eku::ServerAuth => builder
            .append_extension(ExtendedKeyUsage::new().server_auth().build().unwrap())
            .unwrap(),
        Eku::ClientAuthOnly => builder
            .append_extension(ExtendedKeyUsage::new().client_auth().build().unwrap())
            .unwrap(),
    }

    let signing_key = issuer.map(|(_, key)| key).unwrap_or(key);
    let digest = if signing_key.id() == Id::ED25519 {
        MessageDigest::null()
    } else {
        MessageDigest::sha256()
    };
    builder.sign(signing_key, digest).unwrap();
    builder.build()
}

/// A self-signed record holding its own plaintext key.
pub(crate) fn record_with_key(spec: &CertSpec, key: PKey<Private>) -> CertificateRecord {
    let cert = issue(spec, &key, None);
    CertificateRecord::new(cert, Vec::new(), Some(Box::new(PemKeyHandle::from_pkey(key)))).unwrap()
}

/// Root, intermediate and a leaf signed by the intermediate.
pub(crate) struct TestChain {
    pub root: X509,
    pub intermediate: X509,
    pub leaf: X509,
    pub leaf_key: PKey<Private>,
}

pub(crate) fn three_level_chain(leaf: &CertSpec) -> TestChain {
    let root_key = ec_key();
    let root = issue(&CertSpec::ca("certbridge test root"), &root_key, None);

    let intermediate_key = ec_key();
    let intermediate = issue(
        &CertSpec::ca("certbridge test intermediate"),
        &intermediate_key,
        Some((&root, &root_key)),
    );

    let leaf_key = ec_key();
    let leaf = issue(leaf, &leaf_key, Some((&intermediate, &intermediate_key)));

    TestChain {
        root,
        intermediate,
        leaf,
        leaf_key,
    }
}
