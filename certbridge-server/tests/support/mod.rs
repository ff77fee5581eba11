use std::fs;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, Issuer, KeyPair,
    KeyUsagePurpose,
};
use tempfile::TempDir;

pub fn can_bind_local_ports() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

fn pick_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// A running `certbridge-server` with its own machine and user store roots.
pub struct TestServer {
    child: Option<Child>,
    pub port: u16,
    machine_dir: TempDir,
    user_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Stores are populated by `setup` before the process starts.
    pub fn start(setup: impl FnOnce(&Path, &Path)) -> Self {
        Self::start_with_args(setup, &[])
    }

    pub fn start_with_args(setup: impl FnOnce(&Path, &Path), extra_args: &[&str]) -> Self {
        let machine_dir = TempDir::new().unwrap();
        let user_dir = TempDir::new().unwrap();
        setup(machine_dir.path(), user_dir.path());

        let port = pick_port();
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_certbridge-server"));
        cmd.args([
            "--listen",
            &format!("127.0.0.1:{}", port),
            "--machine-store-dir",
            machine_dir.path().to_string_lossy().as_ref(),
            "--user-store-dir",
            user_dir.path().to_string_lossy().as_ref(),
            "--no-system-trust",
        ])
        .args(extra_args)
        .env("RUST_LOG", "warn")
        .env_remove("CERTBRIDGE_KEY_PASSPHRASE")
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
        let mut child = cmd.spawn().expect("failed to start certbridge-server");

        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if let Ok(Some(status)) = child.try_wait() {
                panic!("certbridge-server exited early: {}", status);
            }
            if TcpStream::connect(("127.0.0.1", port)).is_ok() {
                return Self {
                    child: Some(child),
                    port,
                    machine_dir,
                    user_dir,
                };
            }
            thread::sleep(Duration::from_millis(100));
        }

        let _ = child.kill();
        let _ = child.wait();
        panic!("certbridge-server never started listening");
    }

    pub fn machine_dir(&self) -> &Path {
        self.machine_dir.path()
    }

    pub fn user_dir(&self) -> &Path {
        self.user_dir.path()
    }

    pub fn http_get(&self, path: &str) -> HttpResponse {
        let mut stream = TcpStream::connect(("127.0.0.1", self.port)).expect("connect http");
        stream.set_read_timeout(Some(Duration::from_secs(10))).ok();

        let request = format!(
            "GET {} HTTP/1.1\r\nHost: 127.0.0.1\r\nConnection: close\r\n\r\n",
            path
        );
        stream.write_all(request.as_bytes()).unwrap();

        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).unwrap();
        HttpResponse::parse(&String::from_utf8_lossy(&buf))
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    fn parse(raw: &str) -> Self {
        let (head, body) = raw.split_once("\r\n\r\n").unwrap_or((raw, ""));
        let mut lines = head.lines();
        let status = lines
            .next()
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|code| code.parse().ok())
            .unwrap_or(0);
        let headers = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
            .collect();
        let chunked = raw
            .to_ascii_lowercase()
            .contains("transfer-encoding: chunked");
        let body = if chunked {
            dechunk(body)
        } else {
            body.to_string()
        };
        Self {
            status,
            headers,
            body,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Labels of the PEM blocks in the body, in order.
    pub fn pem_labels(&self) -> Vec<String> {
        self.body
            .lines()
            .filter_map(|line| line.strip_prefix("-----BEGIN "))
            .map(|rest| rest.trim_end_matches('-').to_string())
            .collect()
    }
}

fn dechunk(mut body: &str) -> String {
    let mut out = String::new();
    while let Some((size, rest)) = body.split_once("\r\n") {
        let Ok(size) = usize::from_str_radix(size.trim(), 16) else {
            break;
        };
        if size == 0 || rest.len() < size {
            break;
        }
        out.push_str(&rest[..size]);
        body = rest[size..].trim_start_matches("\r\n");
    }
    out
}

pub fn store_dir(root: &Path, store: &str) -> PathBuf {
    let dir = root.join(store);
    fs::create_dir_all(&dir).unwrap();
    dir
}

pub struct Issued {
    pub cert_pem: String,
    pub key_pem: String,
}

#[allow(dead_code)]
impl Issued {
    /// Write `<name>.crt` and `<name>.key` into `dir`.
    pub fn write_to(&self, dir: &Path, name: &str) {
        self.write_cert(dir, name);
        fs::write(dir.join(format!("{name}.key")), &self.key_pem).unwrap();
    }

    /// Write only `<name>.crt`.
    pub fn write_cert(&self, dir: &Path, name: &str) {
        fs::write(dir.join(format!("{name}.crt")), &self.cert_pem).unwrap();
    }
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

#[allow(dead_code)]
pub fn self_signed(names: &[&str], not_after: time::OffsetDateTime) -> Issued {
    self_signed_with_key(names, not_after, KeyPair::generate().unwrap())
}

#[allow(dead_code)]
pub fn self_signed_ed25519(names: &[&str]) -> Issued {
    let key = KeyPair::generate_for(&rcgen::PKCS_ED25519).unwrap();
    self_signed_with_key(names, time::OffsetDateTime::now_utc() + time::Duration::days(90), key)
}

fn self_signed_with_key(names: &[&str], not_after: time::OffsetDateTime, key: KeyPair) -> Issued {
    let mut params = leaf_params(names);
    params.not_after = not_after;
    let cert = params.self_signed(&key).unwrap();
    Issued {
        cert_pem: cert.pem(),
        key_pem: key.serialize_pem(),
    }
}

pub struct Chain {
    pub root: Issued,
    pub intermediate: Issued,
    pub leaf: Issued,
}

#[allow(dead_code)]
pub fn chain_for(host: &str) -> Chain {
    let root_key = KeyPair::generate().unwrap();
    let root_params = ca_params("certbridge e2e root");
    let root = root_params.self_signed(&root_key).unwrap();
    let root_key_pem = root_key.serialize_pem();
    let root_issuer = Issuer::new(root_params, root_key);

    let intermediate_key = KeyPair::generate().unwrap();
    let intermediate_params = ca_params("certbridge e2e intermediate");
    let intermediate = intermediate_params
        .signed_by(&intermediate_key, &root_issuer)
        .unwrap();
    let intermediate_key_pem = intermediate_key.serialize_pem();
    let intermediate_issuer = Issuer::new(intermediate_params, intermediate_key);

    let leaf_key = KeyPair::generate().unwrap();
    let leaf = leaf_params(&[host])
        .signed_by(&leaf_key, &intermediate_issuer)
        .unwrap();

    Chain {
        root: Issued {
            cert_pem: root.pem(),
            key_pem: root_key_pem,
        },
        intermediate: Issued {
            cert_pem: intermediate.pem(),
            key_pem: intermediate_key_pem,
        },
        leaf: Issued {
            cert_pem: leaf.pem(),
            key_pem: leaf_key.serialize_pem(),
        },
    }
}
