use std::fs;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};
use upgrade_harness_core::codegen::{GenerationError, HarnessGenerator};
use upgrade_harness_core::config::{HarnessOptions, Mode};
use upgrade_harness_core::fuzzer::EchidnaConfig;
use upgrade_harness_core::output::{OutputLayout, RunMetadata, RunStatus};
use upgrade_harness_core::proxy::StorageReader;

use crate::commands::{ensure_writable, load_request_with_storage, write_text};
use crate::{canonicalize_or_current, sha256_bytes, sha256_file};

/// Command-line overrides applied on top of the request's options.
#[derive(Debug, Default, Clone)]
pub struct GenerateOverrides {
    pub mode: Option<Mode>,
    pub solc_version: Option<String>,
    pub contract_name: Option<String>,
    pub fuzz_upgrade: bool,
    pub include_protected: bool,
    pub live_dispatch: bool,
}

impl GenerateOverrides {
    pub fn apply(&self, options: &mut HarnessOptions) {
        if let Some(mode) = self.mode {
            options.mode = mode;
        }
        if let Some(version) = &self.solc_version {
            options.solc_version = version.clone();
        }
        if let Some(name) = &self.contract_name {
            options.contract_name = name.clone();
        }
        options.fuzz_upgrade |= self.fuzz_upgrade;
        options.include_protected |= self.include_protected;
        options.live_dispatch |= self.live_dispatch;
    }
}

/// Generate the harness, fuzzer config and run metadata for a request.
pub fn generate_command(
    request: &str,
    out: &str,
    force: bool,
    overrides: &GenerateOverrides,
) -> Result<()> {
    let started_at = Utc::now().to_rfc3339();
    let loaded = load_request_with_storage(request)?;
    let request_hash = sha256_file(&loaded.path)?;

    let mut options = loaded.request.options.clone();
    overrides.apply(&mut options);
    options.validate().context("Invalid harness options")?;

    let out_root = canonicalize_or_current(out)?;
    let layout = OutputLayout::new(&out_root, &options.contract_name);
    ensure_writable(&layout.existing_files(), force)?;
    fs::create_dir_all(&layout.root)
        .with_context(|| format!("Failed to create output dir: {}", layout.root.display()))?;

    if options.mode == Mode::Fork && loaded.storage.is_none() {
        warn!("fork mode without a storage snapshot; only the oracle slot can be used");
    }
    let reader = loaded.storage.as_ref().map(|s| s as &dyn StorageReader);
    let fuzzer = loaded.request.fuzzer.clone();
    let input = loaded.request.into_input().context("Invalid request descriptors")?;

    let generator = HarnessGenerator::new(options.clone());
    let harness = match generator.generate(&input, reader) {
        Ok(harness) => harness,
        Err(err) => {
            let contract = match &err {
                GenerationError::MalformedInput { contract, .. } => contract.clone(),
            };
            let metadata = RunMetadata {
                contract_name: options.contract_name.clone(),
                mode: options.mode.as_str().to_string(),
                request_hash,
                harness_hash: None,
                started_at,
                finished_at: Utc::now().to_rfc3339(),
                status: RunStatus::Failed,
                gaps: Vec::new(),
            };
            write_metadata(&layout, &metadata)?;
            return Err(anyhow::Error::new(err)
                .context(format!("Harness generation failed for contract {contract}")));
        }
    };

    write_text(&layout.harness_path, &harness.source, "harness")?;

    let config = EchidnaConfig::new(
        &fuzzer,
        options.mode,
        options.network.as_ref(),
        &layout.corpus_dir_relative_string(),
    );
    let yaml = config.to_yaml().context("Failed to serialize fuzzer config")?;
    write_text(&layout.config_path, &yaml, "fuzzer config")?;
    fs::create_dir_all(&layout.corpus_dir).with_context(|| {
        format!("Failed to create corpus dir: {}", layout.corpus_dir.display())
    })?;

    let metadata = RunMetadata {
        contract_name: harness.contract_name.clone(),
        mode: options.mode.as_str().to_string(),
        request_hash,
        harness_hash: Some(sha256_bytes(harness.source.as_bytes())),
        started_at,
        finished_at: Utc::now().to_rfc3339(),
        status: RunStatus::from_gaps(&harness.gaps),
        gaps: harness.gaps.clone(),
    };
    write_metadata(&layout, &metadata)?;
    info!(status = metadata.status.as_str(), "run complete");

    println!("Generated differential harness:");
    println!("  Contract: {}", harness.contract_name);
    println!("  Mode: {}", options.mode.as_str());
    println!("  Harness: {}", layout.harness_path.display());
    println!("  Fuzzer config: {}", layout.config_path.display());
    println!("  Corpus dir: {}", layout.corpus_dir.display());
    if let Some(resolution) = &harness.slot {
        println!(
            "  Implementation slot: {} ({})",
            resolution.slot.slot_literal(),
            resolution.source
        );
    }
    println!("  Status: {}", metadata.status.as_str());
    if !harness.gaps.is_empty() {
        println!("  Gaps ({}):", harness.gaps.len());
        for gap in &harness.gaps {
            println!("    - [{}] {}: {}", gap.kind.as_str(), gap.subject, gap.detail);
        }
    }

    Ok(())
}

fn write_metadata(layout: &OutputLayout, metadata: &RunMetadata) -> Result<()> {
    let json = serde_json::to_string_pretty(metadata)?;
    write_text(&layout.metadata_path, &json, "run metadata")
}
