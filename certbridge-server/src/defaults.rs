use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Address Caddy's `get_certificate http` directive is pointed at.
pub const DEFAULT_LISTEN: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 27510);

pub const DEFAULT_MACHINE_STORE_DIR: &str = "/etc/certbridge/stores";

pub const PEM_CHAIN_CONTENT_TYPE: &str = "application/pem-certificate-chain";
