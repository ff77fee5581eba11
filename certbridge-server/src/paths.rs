use std::path::{Path, PathBuf};

/// If `certbridge-server` is being run from a path under a `target/` directory, return that
/// `target/` directory path.
pub fn target_dir_from_exe(exe_path: &Path) -> Option<PathBuf> {
    let mut cur = exe_path;
    loop {
        if cur.file_name().is_some_and(|n| n == "target") {
            return Some(cur.to_path_buf());
        }
        cur = cur.parent()?;
    }
}

/// Repo root (the parent of `target/`) when running from a source checkout.
pub fn repo_root_from_exe(exe_path: &Path) -> Option<PathBuf> {
    target_dir_from_exe(exe_path)?
        .parent()
        .map(|p| p.to_path_buf())
}

/// Machine store root for debug builds when running from a source checkout.
///
/// Example: `{repo}/local-dev/certbridge/machine`
pub fn debug_default_machine_store_from_exe(exe_path: &Path) -> Option<PathBuf> {
    repo_root_from_exe(exe_path).map(|root| root.join("local-dev").join("certbridge").join("machine"))
}

/// Per-user store root: `$XDG_DATA_HOME/certbridge/stores` or the platform
/// equivalent.
pub fn default_user_store_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("certbridge").join("stores"))
}
