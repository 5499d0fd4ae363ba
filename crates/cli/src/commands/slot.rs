use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use upgrade_harness_core::proxy::{SlotError, SlotResolution, SlotResolver, StorageReader};

use crate::commands::load_request_with_storage;

#[derive(Debug, Serialize)]
pub struct SlotReport {
    pub proxy: String,
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<SlotResolution>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<String>,
}

/// Run the implementation-slot probe chain for the request's proxy.
///
/// A missing slot is reported, not treated as an error.
pub fn resolve_slot_command(request: &str, json: bool) -> Result<()> {
    let loaded = load_request_with_storage(request)?;
    let block = loaded.request.options.block();
    let input = loaded.request.into_input().context("Invalid request descriptors")?;
    let proxy = input
        .proxy
        .as_ref()
        .ok_or_else(|| anyhow!("Request {} has no proxy descriptor", loaded.path.display()))?;

    let reader = loaded.storage.as_ref().map(|s| s as &dyn StorageReader);
    let report = match SlotResolver::new().resolve(proxy, reader, block) {
        Ok(resolution) => SlotReport {
            proxy: proxy.name().to_string(),
            found: true,
            resolution: Some(resolution),
            attempts: Vec::new(),
        },
        Err(SlotError::NotFound { proxy, attempts }) => {
            SlotReport { proxy, found: false, resolution: None, attempts }
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    match &report.resolution {
        Some(resolution) => {
            println!("Implementation slot for {}:", report.proxy);
            println!("  Slot: {}", resolution.slot.slot_literal());
            println!("  Source: {}", resolution.source);
            println!(
                "  Offset: {} byte(s), size: {} bit(s)",
                resolution.slot.offset, resolution.slot.size
            );
            match resolution.implementation {
                Some(address) => println!("  Implementation: {}", address.to_checksum(None)),
                None => println!("  Implementation: (not read)"),
            }
        }
        None => {
            println!("No implementation slot found for {}:", report.proxy);
            for attempt in &report.attempts {
                println!("  - {attempt}");
            }
        }
    }
    Ok(())
}
