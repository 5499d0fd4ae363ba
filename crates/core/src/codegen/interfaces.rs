use std::collections::BTreeSet;

use super::encoder::is_reference_type;
use super::Context;
use crate::model::{canonical_type, ContractDescriptor, FunctionDescriptor};

/// Cheat-code interface of the fuzzing VM and its well-known address.
pub(crate) const HEVM_INTERFACE: &str = "\
interface IHevm {
    function warp(uint256 newTimestamp) external;
    function roll(uint256 newNumber) external;
    function load(address where, bytes32 slot) external returns (bytes32);
    function store(address where, bytes32 slot, bytes32 value) external;
    function sign(uint256 privateKey, bytes32 digest) external returns (uint8 v, bytes32 r, bytes32 s);
    function addr(uint256 privateKey) external returns (address);
    function ffi(string[] calldata inputs) external returns (bytes memory result);
    function prank(address newSender) external;
    function createFork() external returns (uint256);
    function selectFork(uint256 forkId) external;
}

";

pub(crate) const HEVM_ADDRESS: &str = "0x7109709ECfa91a80626fF3989D68f67F5b1DD12D";

/// Interfaces for V1, V2, targets, tainted contracts and the proxy, each
/// emitted once per interface name.
pub(crate) fn participant_interfaces(ctx: &Context<'_>) -> String {
    let mut seen = BTreeSet::new();
    let mut out = String::new();
    let participants = [ctx.v1, ctx.v2]
        .into_iter()
        .chain(ctx.targets.iter().copied())
        .chain(ctx.tainted.iter().copied())
        .chain(ctx.proxy);
    for contract in participants {
        if seen.insert(contract.interface_name().to_string()) {
            out.push_str(&render_interface(contract));
        }
    }
    out
}

fn render_interface(contract: &ContractDescriptor) -> String {
    if let Some(source) = contract.interface() {
        return format!("{}\n\n", source.trim_end());
    }
    let mut out = format!("interface {} {{\n", contract.interface_name());
    for func in contract.functions() {
        out.push_str(&render_declaration(func));
    }
    out.push_str("}\n\n");
    out
}

fn render_declaration(func: &FunctionDescriptor) -> String {
    let inputs: Vec<String> = func.inputs.iter().map(|ty| located(ty, "calldata")).collect();
    let outputs: Vec<String> = func.outputs.iter().map(|ty| located(ty, "memory")).collect();
    if outputs.is_empty() {
        format!("    function {}({}) external;\n", func.name, inputs.join(", "))
    } else {
        format!(
            "    function {}({}) external returns ({});\n",
            func.name,
            inputs.join(", "),
            outputs.join(", ")
        )
    }
}

/// Type with a data location attached when the type needs one.
fn located(ty: &str, location: &str) -> String {
    let ty = canonical_type(ty);
    if is_reference_type(&ty) {
        format!("{ty} {location}")
    } else {
        ty
    }
}
