use crate::defaults::{DEFAULT_LISTEN, DEFAULT_MACHINE_STORE_DIR};
use crate::paths;
use certbridge_core::{DirectoryStore, SelectionPolicy};
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// certbridge - certificate endpoint for Caddy's `get_certificate http`
#[derive(Parser, Debug)]
#[command(name = "certbridge-server")]
#[command(version)]
#[command(about = "Serve certificates and keys from a certificate store to Caddy")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "CERTBRIDGE_LISTEN", default_value_t = DEFAULT_LISTEN)]
    pub listen: SocketAddr,

    /// Root directory of the machine-wide stores
    #[arg(long, env = "CERTBRIDGE_MACHINE_STORE_DIR")]
    pub machine_store_dir: Option<PathBuf>,

    /// Root directory of the current user's stores
    #[arg(long, env = "CERTBRIDGE_USER_STORE_DIR")]
    pub user_store_dir: Option<PathBuf>,

    /// Passphrase for encrypted private keys
    #[arg(long, env = "CERTBRIDGE_KEY_PASSPHRASE", hide_env_values = true)]
    pub key_passphrase: Option<String>,

    /// Do not trust the system CA bundle when building chains
    #[arg(long)]
    pub no_system_trust: bool,

    /// Skip certificates whose key cannot sign with any offered signature scheme
    #[arg(long)]
    pub enforce_signature_schemes: bool,

    /// Log output format
    #[arg(long, value_enum, env = "CERTBRIDGE_LOG_FORMAT", default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Settings after defaults have been applied.
#[derive(Clone)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    pub machine_store_dir: PathBuf,
    pub user_store_dir: Option<PathBuf>,
    pub key_passphrase: Option<String>,
    pub use_system_trust: bool,
    pub policy: SelectionPolicy,
}

impl ServerConfig {
    /// Fill in defaults. `exe` is the running binary, used to find a source
    /// checkout in debug builds.
    pub fn from_args(args: Args, exe: Option<&Path>) -> Self {
        let machine_store_dir = args.machine_store_dir.unwrap_or_else(|| {
            if cfg!(debug_assertions)
                && let Some(exe) = exe
                && let Some(p) = paths::debug_default_machine_store_from_exe(exe)
            {
                return p;
            }
            PathBuf::from(DEFAULT_MACHINE_STORE_DIR)
        });

        Self {
            listen: args.listen,
            machine_store_dir,
            user_store_dir: args.user_store_dir.or_else(paths::default_user_store_dir),
            key_passphrase: args.key_passphrase,
            use_system_trust: !args.no_system_trust,
            policy: SelectionPolicy {
                enforce_signature_schemes: args.enforce_signature_schemes,
            },
        }
    }

    pub fn is_loopback(&self) -> bool {
        self.listen.ip().is_loopback()
    }

    pub fn store(&self) -> DirectoryStore {
        let mut store = DirectoryStore::new(&self.machine_store_dir)
            .with_system_trust(self.use_system_trust);
        if let Some(user) = &self.user_store_dir {
            store = store.with_user_root(user);
        }
        if let Some(passphrase) = &self.key_passphrase {
            store = store.with_passphrase(passphrase);
        }
        store
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("listen", &self.listen)
            .field("machine_store_dir", &self.machine_store_dir)
            .field("user_store_dir", &self.user_store_dir)
            .field("key_passphrase", &self.key_passphrase.as_ref().map(|_| "<redacted>"))
            .field("use_system_trust", &self.use_system_trust)
            .field("policy", &self.policy)
            .finish()
    }
}
