//! Store selectors: which logical certificate pool a request reads from.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Returned when a store name or location string is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorParseError {
    #[error("Unknown store location: {0}")]
    UnknownLocation(String),

    #[error("Unknown store name: {0}")]
    UnknownName(String),
}

/// Scope of a certificate store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StoreLocation {
    /// Machine-wide certificates.
    #[default]
    LocalMachine,
    /// Certificates belonging to the account the service runs as.
    CurrentUser,
}

impl StoreLocation {
    pub const ALL: [StoreLocation; 2] = [StoreLocation::LocalMachine, StoreLocation::CurrentUser];

    /// Short name used in URLs.
    pub fn as_path_segment(self) -> &'static str {
        match self {
            Self::LocalMachine => "machine",
            Self::CurrentUser => "user",
        }
    }
}

impl FromStr for StoreLocation {
    type Err = SelectorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "machine" | "localmachine" | "local_machine" => Ok(Self::LocalMachine),
            "user" | "currentuser" | "current_user" => Ok(Self::CurrentUser),
            _ => Err(SelectorParseError::UnknownLocation(s.to_string())),
        }
    }
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalMachine => write!(f, "LocalMachine"),
            Self::CurrentUser => write!(f, "CurrentUser"),
        }
    }
}

/// Logical store names, following the system store names of the Windows
/// certificate store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StoreName {
    /// Personal certificates, usually the ones with private keys.
    #[default]
    My,
    /// Trusted root certification authorities.
    Root,
    /// Intermediate certification authorities.
    CertificateAuthority,
    /// Third-party root certification authorities.
    AuthRoot,
    TrustedPeople,
    TrustedPublisher,
    AddressBook,
    /// Revoked or explicitly distrusted certificates.
    Disallowed,
}

impl StoreName {
    pub const ALL: [StoreName; 8] = [
        StoreName::My,
        StoreName::Root,
        StoreName::CertificateAuthority,
        StoreName::AuthRoot,
        StoreName::TrustedPeople,
        StoreName::TrustedPublisher,
        StoreName::AddressBook,
        StoreName::Disallowed,
    ];

    /// Directory name of this store below a location root.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::My => "my",
            Self::Root => "root",
            Self::CertificateAuthority => "ca",
            Self::AuthRoot => "authroot",
            Self::TrustedPeople => "trustedpeople",
            Self::TrustedPublisher => "trustedpublisher",
            Self::AddressBook => "addressbook",
            Self::Disallowed => "disallowed",
        }
    }
}

impl FromStr for StoreName {
    type Err = SelectorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        if lowered == "certificateauthority" {
            return Ok(Self::CertificateAuthority);
        }
        Self::ALL
            .into_iter()
            .find(|name| name.dir_name() == lowered)
            .ok_or_else(|| SelectorParseError::UnknownName(s.to_string()))
    }
}

impl fmt::Display for StoreName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::My => "My",
            Self::Root => "Root",
            Self::CertificateAuthority => "CertificateAuthority",
            Self::AuthRoot => "AuthRoot",
            Self::TrustedPeople => "TrustedPeople",
            Self::TrustedPublisher => "TrustedPublisher",
            Self::AddressBook => "AddressBook",
            Self::Disallowed => "Disallowed",
        };
        f.write_str(name)
    }
}

/// Identifies one logical certificate pool: a store name within a location.
///
/// Selectors are plain values; once built they are never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StoreSelector {
    name: StoreName,
    location: StoreLocation,
}

impl StoreSelector {
    pub fn new(name: StoreName, location: StoreLocation) -> Self {
        Self { name, location }
    }

    pub fn name(&self) -> StoreName {
        self.name
    }

    pub fn location(&self) -> StoreLocation {
        self.location
    }
}

impl fmt::Display for StoreSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\\{}", self.location, self.name)
    }
}
