use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use upgrade_harness_core::config::{load_request, GenerationRequest};
use upgrade_harness_core::proxy::SnapshotStorage;

/// A request file together with the storage snapshot it points to, if any.
pub struct LoadedRequest {
    pub path: PathBuf,
    pub request: GenerationRequest,
    pub storage: Option<SnapshotStorage>,
}

/// Load and validate a request file and its storage snapshot (delegates to core helpers).
pub fn load_request_with_storage(path: &str) -> Result<LoadedRequest> {
    let path = PathBuf::from(path);
    let request = load_request(&path)?;
    let storage = match request.snapshot_path(&path) {
        Some(snapshot) => Some(SnapshotStorage::load(&snapshot)?),
        None => None,
    };
    Ok(LoadedRequest { path, request, storage })
}

/// Fail if any of `paths` exists, unless `force` is set.
pub fn ensure_writable(paths: &[PathBuf], force: bool) -> Result<()> {
    match paths.first() {
        Some(existing) if !force => Err(anyhow!(
            "Output already exists at {} (rerun with --force to overwrite)",
            existing.display()
        )),
        _ => Ok(()),
    }
}

/// Write a text file, naming `what` in the error.
pub fn write_text(path: &Path, contents: &str, what: &str) -> Result<()> {
    fs::write(path, contents)
        .with_context(|| format!("Failed to write {what} at {}", path.display()))
}

/// Helper to print whether a file exists.
pub fn print_file_status(label: &str, path: &Path) {
    let exists = path.is_file();
    println!("- {label}: {} ({})", if exists { "OK" } else { "MISSING" }, path.display());
}
