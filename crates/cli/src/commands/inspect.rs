use anyhow::{Context, Result};
use serde::Serialize;
use upgrade_harness_core::codegen::HarnessInput;
use upgrade_harness_core::config::HarnessOptions;
use upgrade_harness_core::model::{ContractDescriptor, DiffResult};

use crate::commands::{load_request_with_storage, print_file_status};

#[derive(Debug, Serialize)]
pub struct ParticipantSummary {
    pub role: String,
    pub name: String,
    pub interface: String,
    pub functions: usize,
    pub is_proxy: bool,
    pub path: Option<String>,
    pub address: Option<String>,
}

impl ParticipantSummary {
    fn new(role: &str, contract: &ContractDescriptor) -> Self {
        Self {
            role: role.to_string(),
            name: contract.name().to_string(),
            interface: contract.interface_name().to_string(),
            functions: contract.functions().len(),
            is_proxy: contract.is_proxy(),
            path: contract.path().map(str::to_string),
            address: contract.address().map(|a| a.to_checksum(None)),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DiffSummary {
    pub new_functions: usize,
    pub modified_functions: usize,
    pub tainted_functions: usize,
    pub tainted_variables: usize,
    pub tainted_contracts: usize,
    pub missing_variables: usize,
    pub new_variables: usize,
}

impl From<&DiffResult> for DiffSummary {
    fn from(diff: &DiffResult) -> Self {
        Self {
            new_functions: diff.new_functions.len(),
            modified_functions: diff.modified_functions.len(),
            tainted_functions: diff.tainted_functions.len(),
            tainted_variables: diff.tainted_variables.len(),
            tainted_contracts: diff.tainted_contracts.len(),
            missing_variables: diff.missing_variables.len(),
            new_variables: diff.new_variables.len(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InspectReport {
    pub participants: Vec<ParticipantSummary>,
    pub diff: DiffSummary,
    pub options: HarnessOptions,
    pub storage_snapshot: Option<String>,
}

fn participants(input: &HarnessInput) -> Vec<ParticipantSummary> {
    let mut out =
        vec![ParticipantSummary::new("v1", &input.v1), ParticipantSummary::new("v2", &input.v2)];
    if let Some(proxy) = &input.proxy {
        out.push(ParticipantSummary::new("proxy", proxy));
    }
    out.extend(input.targets.iter().map(|c| ParticipantSummary::new("target", c)));
    out.extend(input.tainted_contracts.iter().map(|c| ParticipantSummary::new("tainted", c)));
    out
}

/// Print the participants, diff summary and options of a request.
pub fn inspect_command(request: &str, json: bool) -> Result<()> {
    let loaded = load_request_with_storage(request)?;
    let snapshot = loaded.request.snapshot_path(&loaded.path);
    let options = loaded.request.options.clone();
    let input = loaded.request.into_input().context("Invalid request descriptors")?;

    let report = InspectReport {
        participants: participants(&input),
        diff: DiffSummary::from(&input.diff),
        options,
        storage_snapshot: snapshot.as_ref().map(|p| p.display().to_string()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Generation Request");
    println!("==================");
    println!("File: {}", loaded.path.display());
    println!("Mode: {}", report.options.mode.as_str());
    println!("Harness contract: {}", report.options.contract_name);
    println!("Solidity: ^{}", report.options.solc_version);
    println!();

    println!("Participants:");
    for p in &report.participants {
        let location = p.address.as_deref().or(p.path.as_deref()).unwrap_or("-");
        println!(
            "  [{}] {} as {} ({} function(s){}) {}",
            p.role,
            p.name,
            p.interface,
            p.functions,
            if p.is_proxy { ", proxy" } else { "" },
            location
        );
    }
    println!();

    let d = &report.diff;
    println!("Diff:");
    println!("  New functions: {}", d.new_functions);
    println!("  Modified functions: {}", d.modified_functions);
    println!("  Tainted functions: {}", d.tainted_functions);
    println!("  Tainted variables: {}", d.tainted_variables);
    println!("  Tainted contracts: {}", d.tainted_contracts);
    println!("  Missing variables: {}", d.missing_variables);
    println!("  New variables: {}", d.new_variables);

    if let Some(path) = &snapshot {
        println!();
        print_file_status("Storage snapshot", path);
    }
    Ok(())
}
