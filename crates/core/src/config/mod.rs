//! Generation options and request files.
//!
//! A request file (YAML or JSON, chosen by extension) bundles every input of a
//! run: the participant descriptors, the classified diff, harness options,
//! fuzzer settings and an optional storage snapshot.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codegen::HarnessInput;
use crate::model::{ContractDescriptor, DescriptorError, DescriptorRecord, DiffResult};

pub const DEFAULT_SOLC_VERSION: &str = "0.8.0";
pub const DEFAULT_CONTRACT_NAME: &str = "DiffFuzzUpgrades";
pub const DEFAULT_CAMPAIGN_LENGTH: u64 = 1_000_000_000_000;
pub const DEFAULT_SEQ_LEN: u32 = 100;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid descriptor for {role}: {source}")]
    Descriptor {
        role: String,
        #[source]
        source: DescriptorError,
    },
    #[error("invalid option {field}: {reason}")]
    InvalidOption { field: &'static str, reason: String },
}

/// Deployment topology of the harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Fresh deployment of every participant in the harness constructor.
    #[default]
    Deploy,
    /// Attach to already deployed contracts on two forks of a live network.
    Fork,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Deploy => "deploy",
            Mode::Fork => "fork",
        }
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deploy" => Ok(Mode::Deploy),
            "fork" => Ok(Mode::Fork),
            other => Err(format!("unknown mode {other:?} (expected deploy or fork)")),
        }
    }
}

/// Live network information used in fork mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInfo {
    #[serde(default)]
    pub block: Option<u64>,
    #[serde(default)]
    pub timestamp: Option<u64>,
    #[serde(default)]
    pub rpc_url: Option<String>,
}

fn default_solc_version() -> String {
    DEFAULT_SOLC_VERSION.to_string()
}

fn default_contract_name() -> String {
    DEFAULT_CONTRACT_NAME.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarnessOptions {
    #[serde(default)]
    pub mode: Mode,
    #[serde(default = "default_solc_version")]
    pub solc_version: String,
    /// Add an `upgradeV2()` entry point and start with V2's proxy pinned to V1.
    #[serde(default)]
    pub fuzz_upgrade: bool,
    /// Also wrap functions guarded by access-control modifiers.
    #[serde(default)]
    pub include_protected: bool,
    /// Pick V1's or V2's call encoding from the live implementation slot.
    #[serde(default)]
    pub live_dispatch: bool,
    #[serde(default = "default_contract_name")]
    pub contract_name: String,
    #[serde(default)]
    pub network: Option<NetworkInfo>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Deploy,
            solc_version: default_solc_version(),
            fuzz_upgrade: false,
            include_protected: false,
            live_dispatch: false,
            contract_name: default_contract_name(),
            network: None,
        }
    }
}

impl HarnessOptions {
    pub fn fork() -> Self {
        Self { mode: Mode::Fork, ..Self::default() }
    }

    pub fn block(&self) -> Option<u64> {
        self.network.as_ref().and_then(|n| n.block)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_identifier(&self.contract_name) {
            return Err(ConfigError::InvalidOption {
                field: "contract_name",
                reason: format!("{:?} is not a valid Solidity identifier", self.contract_name),
            });
        }
        let version_ok = self
            .solc_version
            .split('.')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()));
        if !version_ok {
            return Err(ConfigError::InvalidOption {
                field: "solc_version",
                reason: format!("{:?} is not a dotted version number", self.solc_version),
            });
        }
        Ok(())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn default_campaign_length() -> u64 {
    DEFAULT_CAMPAIGN_LENGTH
}

fn default_seq_len() -> u32 {
    DEFAULT_SEQ_LEN
}

/// Settings for the generated fuzzer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuzzerSettings {
    #[serde(default = "default_campaign_length")]
    pub campaign_length: u64,
    #[serde(default = "default_seq_len")]
    pub seq_len: u32,
    #[serde(default)]
    pub contract_addr: Option<String>,
    /// Corpus directory; defaults to the `corpus` directory of the output layout.
    #[serde(default)]
    pub corpus_dir: Option<String>,
    /// Sender addresses for fork mode (e.g. token holders).
    #[serde(default)]
    pub senders: Vec<String>,
}

impl Default for FuzzerSettings {
    fn default() -> Self {
        Self {
            campaign_length: DEFAULT_CAMPAIGN_LENGTH,
            seq_len: DEFAULT_SEQ_LEN,
            contract_addr: None,
            corpus_dir: None,
            senders: Vec::new(),
        }
    }
}

/// Complete input of one generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub v1: DescriptorRecord,
    pub v2: DescriptorRecord,
    #[serde(default)]
    pub proxy: Option<DescriptorRecord>,
    #[serde(default)]
    pub targets: Vec<DescriptorRecord>,
    #[serde(default)]
    pub tainted_contracts: Vec<DescriptorRecord>,
    #[serde(default)]
    pub diff: DiffResult,
    #[serde(default)]
    pub options: HarnessOptions,
    /// JSON storage snapshot, relative to the request file.
    #[serde(default)]
    pub storage_snapshot: Option<PathBuf>,
    #[serde(default)]
    pub fuzzer: FuzzerSettings,
}

impl GenerationRequest {
    /// Check options and descriptor shapes without consuming the request.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.options.validate()?;
        self.clone().into_input().map(|_| ())
    }

    /// Build the descriptors. V1 and V2 default to the `V1`/`V2` suffixes; every
    /// other participant has no suffix.
    pub fn into_input(self) -> Result<HarnessInput, ConfigError> {
        let v1 = build("v1", self.v1, "V1")?;
        let v2 = build("v2", self.v2, "V2")?;
        // Whatever is supplied in the proxy role is treated as a proxy.
        let proxy = self
            .proxy
            .map(|record| build("proxy", record, "").map(ContractDescriptor::as_proxy))
            .transpose()?;
        let targets = self
            .targets
            .into_iter()
            .enumerate()
            .map(|(i, record)| build(&format!("targets[{i}]"), record, ""))
            .collect::<Result<Vec<_>, _>>()?;
        let tainted_contracts = self
            .tainted_contracts
            .into_iter()
            .enumerate()
            .map(|(i, record)| build(&format!("tainted_contracts[{i}]"), record, ""))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(HarnessInput { v1, v2, proxy, targets, tainted_contracts, diff: self.diff })
    }

    /// Snapshot path resolved against the directory holding the request file.
    pub fn snapshot_path(&self, request_path: &Path) -> Option<PathBuf> {
        let snapshot = self.storage_snapshot.as_ref()?;
        if snapshot.is_absolute() {
            return Some(snapshot.clone());
        }
        let base = request_path.parent().unwrap_or_else(|| Path::new("."));
        Some(base.join(snapshot))
    }
}

fn build(
    role: &str,
    record: DescriptorRecord,
    suffix: &str,
) -> Result<ContractDescriptor, ConfigError> {
    ContractDescriptor::from_record(record, suffix)
        .map_err(|source| ConfigError::Descriptor { role: role.to_string(), source })
}

/// Load a request from a `.yaml`/`.yml` or `.json` file.
pub fn load_request(path: &Path) -> Result<GenerationRequest> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read request file: {}", path.display()))?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase();
    let request: GenerationRequest = match ext.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&raw)
            .with_context(|| format!("Failed to parse YAML request: {}", path.display()))?,
        "json" => serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse JSON request: {}", path.display()))?,
        other => bail!(
            "Unsupported request file extension {:?} for {} (expected .yaml, .yml or .json)",
            other,
            path.display()
        ),
    };
    request.validate().with_context(|| format!("Invalid request file: {}", path.display()))?;
    Ok(request)
}
