use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::codegen::Gap;
use crate::fuzzer::CONFIG_FILE_NAME;

/// Logical layout of a generation output directory.
///
/// This does *not* perform any IO itself. The CLI or other frontends are
/// responsible for creating directories and writing files.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    /// Root output directory.
    pub root: PathBuf,
    /// Generated harness (`<ContractName>.sol`).
    pub harness_path: PathBuf,
    /// Fuzzer configuration.
    pub config_path: PathBuf,
    /// Corpus directory handed to the fuzzer.
    pub corpus_dir: PathBuf,
    /// Run metadata (JSON).
    pub metadata_path: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl AsRef<Path>, contract_name: &str) -> Self {
        let root = root.as_ref().to_path_buf();
        let harness_path = root.join(format!("{contract_name}.sol"));
        let config_path = root.join(CONFIG_FILE_NAME);
        let corpus_dir = root.join("corpus");
        let metadata_path = root.join("run_metadata.json");
        Self { root, harness_path, config_path, corpus_dir, metadata_path }
    }

    /// Files a run writes, in write order.
    pub fn files(&self) -> [&Path; 3] {
        [self.harness_path.as_path(), self.config_path.as_path(), self.metadata_path.as_path()]
    }

    /// Output files that already exist.
    pub fn existing_files(&self) -> Vec<PathBuf> {
        self.files().iter().filter(|p| p.exists()).map(|p| p.to_path_buf()).collect()
    }

    /// Corpus directory as written into the fuzzer config, relative to `root`
    /// when possible.
    pub fn corpus_dir_relative_string(&self) -> String {
        match self.corpus_dir.strip_prefix(&self.root) {
            Ok(rel) => rel.to_string_lossy().to_string(),
            Err(_) => self.corpus_dir.to_string_lossy().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Harness written without gaps.
    Succeeded,
    /// Harness written, but some parts need manual review.
    Incomplete,
    Failed,
}

impl RunStatus {
    pub fn from_gaps(gaps: &[Gap]) -> Self {
        if gaps.is_empty() {
            RunStatus::Succeeded
        } else {
            RunStatus::Incomplete
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Succeeded => "succeeded",
            RunStatus::Incomplete => "incomplete",
            RunStatus::Failed => "failed",
        }
    }
}

/// Record of a generation run, stored as `run_metadata.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub contract_name: String,
    pub mode: String,
    pub request_hash: String,
    pub harness_hash: Option<String>,
    pub started_at: String,
    pub finished_at: String,
    pub status: RunStatus,
    #[serde(default)]
    pub gaps: Vec<Gap>,
}
