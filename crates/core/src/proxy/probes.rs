use alloy_primitives::{B256, U256};
use tracing::debug;

use super::{
    decode_address, slot_word, ProbeContext, ProbeOutcome, ProbeSource, SlotProbe, SlotResolution,
    EIP1967_IMPLEMENTATION_SLOT, ZEPPELINOS_IMPLEMENTATION_SLOT,
};
use crate::model::SlotInfo;

/// Name fragments that mark a state variable as a likely implementation pointer.
const IMPLEMENTATION_HINTS: [&str; 2] = ["implementation", "target"];

/// Uses the slot reported by the diff oracle.
///
/// Without storage access the reported slot is accepted as is. With storage
/// access the stored value must decode to a non-zero address.
pub struct OracleSlotProbe;

impl SlotProbe for OracleSlotProbe {
    fn name(&self) -> &'static str {
        "oracle"
    }

    fn probe(&self, ctx: &ProbeContext<'_>) -> ProbeOutcome {
        let Some(slot) = ctx.proxy.implementation_slot() else {
            return ProbeOutcome::Inconclusive("oracle reported no implementation slot".into());
        };
        if !ctx.can_read() {
            return ProbeOutcome::Found(SlotResolution {
                slot: slot.clone(),
                source: ProbeSource::Oracle,
                implementation: None,
            });
        }
        match ctx.read(slot_word(slot.slot)) {
            Ok(word) => match decode_address(word, slot.offset, slot.size) {
                Some(implementation) => ProbeOutcome::Found(SlotResolution {
                    slot: slot.clone(),
                    source: ProbeSource::Oracle,
                    implementation: Some(implementation),
                }),
                None => ProbeOutcome::Inconclusive(format!(
                    "oracle slot {} does not hold an address",
                    slot.slot_literal()
                )),
            },
            Err(reason) => ProbeOutcome::Inconclusive(reason),
        }
    }
}

/// Reads a well-known fixed slot and accepts it if it holds an address.
fn probe_fixed_slot(ctx: &ProbeContext<'_>, slot: B256, source: ProbeSource) -> ProbeOutcome {
    let word = match ctx.read(slot) {
        Ok(word) => word,
        Err(reason) => return ProbeOutcome::Inconclusive(reason),
    };
    match decode_address(word, 0, 256) {
        Some(implementation) => ProbeOutcome::Found(SlotResolution {
            slot: SlotInfo::implementation_slot(U256::from_be_bytes(slot.0)),
            source,
            implementation: Some(implementation),
        }),
        None => ProbeOutcome::Inconclusive(format!("slot {slot} does not hold an address")),
    }
}

/// EIP-1967 `eip1967.proxy.implementation` slot.
pub struct Eip1967Probe;

impl SlotProbe for Eip1967Probe {
    fn name(&self) -> &'static str {
        "eip1967"
    }

    fn probe(&self, ctx: &ProbeContext<'_>) -> ProbeOutcome {
        probe_fixed_slot(ctx, EIP1967_IMPLEMENTATION_SLOT, ProbeSource::Eip1967)
    }
}

/// Legacy ZeppelinOS `org.zeppelinos.proxy.implementation` slot.
pub struct ZeppelinOsProbe;

impl SlotProbe for ZeppelinOsProbe {
    fn name(&self) -> &'static str {
        "zeppelinos"
    }

    fn probe(&self, ctx: &ProbeContext<'_>) -> ProbeOutcome {
        probe_fixed_slot(ctx, ZEPPELINOS_IMPLEMENTATION_SLOT, ProbeSource::ZeppelinOs)
    }
}

/// Scans state variables named like an implementation pointer, in declaration
/// order.
pub struct NamedVariableProbe;

impl SlotProbe for NamedVariableProbe {
    fn name(&self) -> &'static str {
        "named-variable"
    }

    fn probe(&self, ctx: &ProbeContext<'_>) -> ProbeOutcome {
        if !ctx.can_read() {
            return ProbeOutcome::Inconclusive("no storage access for variable scan".into());
        }
        let candidates = ctx.proxy.state_variables().iter().filter(|var| {
            let lower = var.name.to_lowercase();
            IMPLEMENTATION_HINTS.iter().any(|hint| lower.contains(hint))
        });
        let mut checked = 0usize;
        for var in candidates {
            checked += 1;
            let word = match ctx.read(slot_word(var.slot)) {
                Ok(word) => word,
                Err(reason) => {
                    debug!(variable = %var.name, %reason, "skipping candidate variable");
                    continue;
                }
            };
            if let Some(implementation) = decode_address(word, var.offset, var.size) {
                return ProbeOutcome::Found(SlotResolution {
                    slot: var.clone(),
                    source: ProbeSource::NamedVariable(var.name.clone()),
                    implementation: Some(implementation),
                });
            }
        }
        ProbeOutcome::Inconclusive(format!(
            "none of {checked} candidate variable(s) holds an address"
        ))
    }
}
