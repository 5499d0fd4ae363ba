//! Harness synthesis.
//!
//! [`HarnessGenerator`] turns a set of contract descriptors and a classified
//! diff into one self-contained Solidity contract. Output is assembled in a
//! fixed order:
//!
//! 1. header (license + pragma, followed by a summary of any gaps),
//! 2. imports (deploy mode only),
//! 3. participant interfaces and the `IHevm` cheat-code interface,
//! 4. the harness contract: state, constructor, optional `upgradeV2()`,
//!    function wrappers, variable wrappers, additional-target wrappers.
//!
//! Generation is a pure function of its inputs: identical inputs give
//! byte-identical output. Anything the generator cannot express is recorded as
//! a [`Gap`], flagged inline in the source and logged.

pub mod encoder;
pub mod similarity;

mod constructor;
mod functions;
mod interfaces;
mod variables;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{HarnessOptions, Mode};
use crate::model::{ContractDescriptor, DiffResult, SlotInfo};
use crate::proxy::{SlotResolution, SlotResolver, StorageReader};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("malformed input for contract {contract}: {reason}")]
    MalformedInput { contract: String, reason: String },
}

/// Category of something the harness could not express.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapKind {
    /// A diff entry matched no function (or several) in its contract.
    UnmatchedEntry,
    SlotNotFound,
    /// A new function has no plausible V1 predecessor.
    AmbiguousMatch,
    UnsupportedType,
    MissingAddress,
    /// Deploy mode participant without a source path to import from.
    MissingSource,
    /// A new function was paired with a V1 function by name similarity only.
    UnverifiedPairing,
    /// A participant was left out of the harness.
    DroppedParticipant,
}

impl GapKind {
    pub fn as_str(self) -> &'static str {
        match self {
            GapKind::UnmatchedEntry => "unmatched_entry",
            GapKind::SlotNotFound => "slot_not_found",
            GapKind::AmbiguousMatch => "ambiguous_match",
            GapKind::UnsupportedType => "unsupported_type",
            GapKind::MissingAddress => "missing_address",
            GapKind::MissingSource => "missing_source",
            GapKind::UnverifiedPairing => "unverified_pairing",
            GapKind::DroppedParticipant => "dropped_participant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gap {
    pub kind: GapKind,
    /// Contract, function or variable the gap is about.
    pub subject: String,
    pub detail: String,
}

impl Gap {
    pub fn new(kind: GapKind, subject: impl Into<String>, detail: impl Into<String>) -> Self {
        Self { kind, subject: subject.into(), detail: detail.into() }
    }
}

/// All participants and the diff of one run.
#[derive(Debug, Clone)]
pub struct HarnessInput {
    pub v1: ContractDescriptor,
    pub v2: ContractDescriptor,
    pub proxy: Option<ContractDescriptor>,
    /// Extra contracts the fuzzer should also drive.
    pub targets: Vec<ContractDescriptor>,
    /// Contracts reached through taint analysis.
    pub tainted_contracts: Vec<ContractDescriptor>,
    pub diff: DiffResult,
}

impl HarnessInput {
    pub fn new(v1: ContractDescriptor, v2: ContractDescriptor, diff: DiffResult) -> Self {
        Self { v1, v2, proxy: None, targets: Vec::new(), tainted_contracts: Vec::new(), diff }
    }

    pub fn with_proxy(mut self, proxy: ContractDescriptor) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn with_targets(mut self, targets: Vec<ContractDescriptor>) -> Self {
        self.targets = targets;
        self
    }

    pub fn with_tainted_contracts(mut self, contracts: Vec<ContractDescriptor>) -> Self {
        self.tainted_contracts = contracts;
        self
    }
}

/// Generated harness and everything it could not cover.
#[derive(Debug, Clone)]
pub struct Harness {
    pub source: String,
    pub contract_name: String,
    pub gaps: Vec<Gap>,
    pub slot: Option<SlotResolution>,
}

impl Harness {
    pub fn file_name(&self) -> String {
        format!("{}.sol", self.contract_name)
    }
}

/// Which of the two compared versions a statement belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    V1,
    V2,
}

impl Side {
    pub(crate) fn suffix(self) -> &'static str {
        match self {
            Side::V1 => "V1",
            Side::V2 => "V2",
        }
    }

    pub(crate) fn fork(self) -> &'static str {
        match self {
            Side::V1 => "fork1",
            Side::V2 => "fork2",
        }
    }
}

/// Read-only view of a run shared by the emitters.
pub(crate) struct Context<'a> {
    pub v1: &'a ContractDescriptor,
    pub v2: &'a ContractDescriptor,
    pub proxy: Option<&'a ContractDescriptor>,
    pub slot: Option<SlotInfo>,
    pub targets: Vec<&'a ContractDescriptor>,
    /// Taint-discovered contracts not already tracked as V1, V2, proxy or target.
    pub tainted: Vec<&'a ContractDescriptor>,
    pub diff: &'a DiffResult,
    pub options: &'a HarnessOptions,
    /// `upgradeV2()` is emitted and V2's proxy starts pinned to V1.
    pub upgrade: bool,
}

impl<'a> Context<'a> {
    pub(crate) fn is_fork(&self) -> bool {
        self.options.mode == Mode::Fork
    }

    pub(crate) fn is_primary(&self, contract: &ContractDescriptor) -> bool {
        std::ptr::eq(contract, self.v1) || std::ptr::eq(contract, self.v2)
    }

    pub(crate) fn primary(&self, side: Side) -> &'a ContractDescriptor {
        match side {
            Side::V1 => self.v1,
            Side::V2 => self.v2,
        }
    }

    /// Identifier of `contract`'s instance on `side`.
    ///
    /// V1 and V2 always carry the side suffix. Other participants are deployed
    /// twice in deploy mode and exist once (on both forks) in fork mode.
    pub(crate) fn instance(&self, contract: &ContractDescriptor, side: Side) -> String {
        let base = contract.instance_base();
        if self.is_primary(contract) || !self.is_fork() {
            format!("{}{}", base, side.suffix())
        } else {
            base
        }
    }

    /// Instance receiving the low-level calls of the V1/V2 comparison.
    pub(crate) fn call_target(&self, side: Side) -> String {
        match self.proxy {
            Some(proxy) => self.instance(proxy, side),
            None => self.instance(self.primary(side), side),
        }
    }

    /// Non-primary participants in declaration order: targets, tainted, proxy.
    pub(crate) fn extra_participants(&self) -> impl Iterator<Item = &'a ContractDescriptor> + '_ {
        self.targets.iter().copied().chain(self.tainted.iter().copied()).chain(self.proxy)
    }

    pub(crate) fn participant(&self, name: &str) -> Option<&'a ContractDescriptor> {
        self.tainted
            .iter()
            .copied()
            .chain(self.targets.iter().copied())
            .chain(self.proxy)
            .find(|c| c.name() == name)
    }
}

/// Mutable bookkeeping while emitting.
#[derive(Debug, Default)]
pub(crate) struct Emission {
    gaps: Vec<Gap>,
    wrappers: BTreeSet<String>,
}

impl Emission {
    pub(crate) fn gap(
        &mut self,
        kind: GapKind,
        subject: impl Into<String>,
        detail: impl Into<String>,
    ) {
        let gap = Gap::new(kind, subject, detail);
        warn!(kind = gap.kind.as_str(), subject = %gap.subject, "{}", gap.detail);
        self.gaps.push(gap);
    }

    /// Reserve a wrapper signature. Returns `false` if it was already emitted.
    pub(crate) fn claim_wrapper(&mut self, name: &str, param_types: &[String]) -> bool {
        self.wrappers.insert(format!("{}({})", name, param_types.join(",")))
    }
}

/// Inline marker for a gap, indented for the contract body.
pub(crate) fn gap_comment(kind: GapKind, detail: &str) -> String {
    format!("    // TODO({}): {}\n", kind.as_str(), detail)
}

pub(crate) fn section(title: &str) -> String {
    format!("\n    /*** {} ***/\n\n", title)
}

/// Harness generator configured with options and a slot resolver.
pub struct HarnessGenerator {
    options: HarnessOptions,
    resolver: SlotResolver,
}

impl HarnessGenerator {
    pub fn new(options: HarnessOptions) -> Self {
        Self { options, resolver: SlotResolver::new() }
    }

    pub fn with_resolver(mut self, resolver: SlotResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn options(&self) -> &HarnessOptions {
        &self.options
    }

    pub fn generate(
        &self,
        input: &HarnessInput,
        reader: Option<&dyn StorageReader>,
    ) -> Result<Harness, GenerationError> {
        for primary in [&input.v1, &input.v2] {
            if primary.functions().is_empty() {
                return Err(GenerationError::MalformedInput {
                    contract: primary.name().to_string(),
                    reason: "contract has no callable functions".to_string(),
                });
            }
        }

        let options = &self.options;
        let mut emission = Emission::default();
        info!(
            v1 = input.v1.name(),
            v2 = input.v2.name(),
            mode = options.mode.as_str(),
            "generating differential harness"
        );

        let proxy = match &input.proxy {
            Some(proxy) if !proxy.is_proxy() => {
                emission.gap(
                    GapKind::DroppedParticipant,
                    proxy.name(),
                    format!("{} is not marked as a proxy and was ignored", proxy.name()),
                );
                None
            }
            other => other.as_ref(),
        };

        let mut resolution = None;
        if let Some(proxy) = proxy {
            match self.resolver.resolve(proxy, reader, options.block()) {
                Ok(found) => resolution = Some(found),
                Err(err) => emission.gap(GapKind::SlotNotFound, proxy.name(), err.to_string()),
            }
        }

        let upgrade = options.fuzz_upgrade && proxy.is_some();
        if options.fuzz_upgrade && proxy.is_none() {
            warn!("fuzz_upgrade requested without a proxy; upgrade function not generated");
        }

        let targets = keep_callable(&input.targets, "target", &mut emission, |_| false);
        // Tainted contracts named by the diff report their own drop where their
        // wrappers would have been.
        let reported_at_wrappers = |name: &str| input.diff.tainted_contract(name).is_some();
        let tainted = keep_callable(
            &input.tainted_contracts,
            "tainted contract",
            &mut emission,
            reported_at_wrappers,
        )
        .into_iter()
        .filter(|c| {
            c.name() != input.v1.name()
                && c.name() != input.v2.name()
                && proxy.map_or(true, |p| p.name() != c.name())
                && !targets.iter().any(|t| t.name() == c.name())
        })
        .collect();

        let ctx = Context {
            v1: &input.v1,
            v2: &input.v2,
            proxy,
            slot: resolution.as_ref().map(|r| r.slot.clone()),
            targets,
            tainted,
            diff: &input.diff,
            options,
            upgrade,
        };

        if !input.diff.missing_variables.is_empty() || !input.diff.new_variables.is_empty() {
            info!(
                missing = input.diff.missing_variables.len(),
                new = input.diff.new_variables.len(),
                "state variable layout changed; no wrappers are generated for these"
            );
        }

        let source = assemble(&ctx, &mut emission);
        info!(gaps = emission.gaps.len(), "harness generated");
        Ok(Harness {
            source,
            contract_name: options.contract_name.clone(),
            gaps: emission.gaps,
            slot: resolution,
        })
    }
}

/// Generate a harness with the default probe chain.
pub fn generate_harness(
    input: &HarnessInput,
    options: &HarnessOptions,
    reader: Option<&dyn StorageReader>,
) -> Result<Harness, GenerationError> {
    HarnessGenerator::new(options.clone()).generate(input, reader)
}

fn keep_callable<'a>(
    contracts: &'a [ContractDescriptor],
    role: &str,
    emission: &mut Emission,
    reported_elsewhere: impl Fn(&str) -> bool,
) -> Vec<&'a ContractDescriptor> {
    let mut kept = Vec::with_capacity(contracts.len());
    for contract in contracts {
        if contract.functions().is_empty() {
            if reported_elsewhere(contract.name()) {
                debug!(contract = contract.name(), role, "dropping contract without functions");
                continue;
            }
            emission.gap(
                GapKind::DroppedParticipant,
                contract.name(),
                format!("{} {} has no callable functions and was left out", role, contract.name()),
            );
        } else {
            kept.push(contract);
        }
    }
    kept
}

fn assemble(ctx: &Context<'_>, emission: &mut Emission) -> String {
    let imports = if ctx.is_fork() { String::new() } else { constructor::imports(ctx, emission) };
    let interfaces = interfaces::participant_interfaces(ctx);

    let mut body = String::new();
    body.push_str(&format!("contract {} {{\n", ctx.options.contract_name));
    body.push_str(&constructor::state_declarations(ctx));
    body.push_str(&constructor::constructor(ctx, emission));
    if ctx.upgrade {
        body.push_str(&constructor::upgrade_function(ctx));
    }
    body.push_str(&functions::diff_wrappers(ctx, emission));
    body.push_str(&variables::variable_wrappers(ctx, emission));
    body.push_str(&functions::target_wrappers(ctx, emission));
    body.push_str("}\n");

    let mut source = header(ctx, &emission.gaps);
    source.push_str(&imports);
    source.push_str(&interfaces);
    source.push_str(interfaces::HEVM_INTERFACE);
    source.push_str(&body);
    source
}

fn header(ctx: &Context<'_>, gaps: &[Gap]) -> String {
    let mut out = String::from("// SPDX-License-Identifier: AGPL-3.0\n");
    out.push_str(&format!("pragma solidity ^{};\n\n", ctx.options.solc_version));
    if !gaps.is_empty() {
        out.push_str(&format!("// {} gap(s) need manual review:\n", gaps.len()));
        for gap in gaps {
            let kind = gap.kind.as_str();
            out.push_str(&format!("//   - [{}] {}: {}\n", kind, gap.subject, gap.detail));
        }
        out.push('\n');
    }
    out
}
