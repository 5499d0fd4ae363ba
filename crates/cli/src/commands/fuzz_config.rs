use std::fs;

use anyhow::{Context, Result};
use upgrade_harness_core::config::{FuzzerSettings, Mode, DEFAULT_CONTRACT_NAME};
use upgrade_harness_core::fuzzer::EchidnaConfig;
use upgrade_harness_core::output::OutputLayout;

use crate::canonicalize_or_current;
use crate::commands::{ensure_writable, write_text};

/// Write only the fuzzer configuration for a deploy-mode harness.
pub fn config_command(out: &str, settings: &FuzzerSettings, force: bool) -> Result<()> {
    let out_root = canonicalize_or_current(out)?;
    let layout = OutputLayout::new(&out_root, DEFAULT_CONTRACT_NAME);
    let existing: Vec<_> =
        layout.existing_files().into_iter().filter(|p| *p == layout.config_path).collect();
    ensure_writable(&existing, force)?;
    fs::create_dir_all(&layout.root)
        .with_context(|| format!("Failed to create output dir: {}", layout.root.display()))?;

    let config =
        EchidnaConfig::new(settings, Mode::Deploy, None, &layout.corpus_dir_relative_string());
    let yaml = config.to_yaml().context("Failed to serialize fuzzer config")?;
    write_text(&layout.config_path, &yaml, "fuzzer config")?;

    println!("Wrote fuzzer config:");
    println!("  Path: {}", layout.config_path.display());
    println!("  Test limit: {}", config.test_limit);
    println!("  Sequence length: {}", config.seq_len);
    println!("  Corpus dir: {}", config.corpus_dir);
    Ok(())
}
