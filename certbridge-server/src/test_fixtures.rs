//! rcgen-generated certificates for router tests

use certbridge_core::{CertificateRecord, MemoryStore, StoreLocation, StoreName, StoreSelector};
use openssl::x509::X509;
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, Issuer, KeyPair,
    KeyUsagePurpose,
};

pub fn machine(name: StoreName) -> StoreSelector {
    StoreSelector::new(name, StoreLocation::LocalMachine)
}

/// A certificate and its PKCS#8 key.
pub struct Fixture {
    pub cert_pem: String,
    pub key_pem: String,
}

impl Fixture {
    pub fn self_signed(names: &[&str]) -> Self {
        let key = KeyPair::generate().unwrap();
        let cert = leaf_params(names).self_signed(&key).unwrap();
        Self {
            cert_pem: cert.pem(),
            key_pem: key.serialize_pem(),
        }
    }

    pub fn add_to(&self, store: &mut MemoryStore, selector: StoreSelector) {
        store.add_with_key(
            selector,
            self.thumbprint(),
            self.cert_pem.clone(),
            self.key_pem.clone(),
        );
    }

    pub fn thumbprint(&self) -> String {
        let cert = X509::from_pem(self.cert_pem.as_bytes()).unwrap();
        CertificateRecord::new(cert, Vec::new(), None)
            .unwrap()
            .thumbprint()
            .to_string()
    }
}

pub struct ChainFixture {
    pub root_pem: String,
    pub intermediate_pem: String,
    pub leaf: Fixture,
}

fn leaf_params(names: &[&str]) -> CertificateParams {
    let mut params =
        CertificateParams::new(names.iter().map(|n| n.to_string()).collect::<Vec<_>>()).unwrap();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, names[0]);
    params.distinguished_name = dn;
    params
}

fn ca_params(common_name: &str) -> CertificateParams {
    let mut params = CertificateParams::default();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, common_name);
    params.distinguished_name = dn;
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
    params
}

/// Root, intermediate and a leaf for `host` signed by the intermediate.
pub fn three_level_chain(host: &str) -> ChainFixture {
    let root_key = KeyPair::generate().unwrap();
    let root_params = ca_params("certbridge test root");
    let root = root_params.self_signed(&root_key).unwrap();
    let root_issuer = Issuer::new(root_params, root_key);

    let intermediate_key = KeyPair::generate().unwrap();
    let intermediate_params = ca_params("certbridge test intermediate");
    let intermediate = intermediate_params
        .signed_by(&intermediate_key, &root_issuer)
        .unwrap();
    let intermediate_issuer = Issuer::new(intermediate_params, intermediate_key);

    let leaf_key = KeyPair::generate().unwrap();
    let leaf = leaf_params(&[host])
        .signed_by(&leaf_key, &intermediate_issuer)
        .unwrap();

    ChainFixture {
        root_pem: root.pem(),
        intermediate_pem: intermediate.pem(),
        leaf: Fixture {
            cert_pem: leaf.pem(),
            key_pem: leaf_key.serialize_pem(),
        },
    }
}
