//! Imports, state declarations, constructor and the upgrade entry point.

use std::collections::BTreeSet;

use super::interfaces::HEVM_ADDRESS;
use super::{gap_comment, section, Context, Emission, GapKind, Side};
use crate::model::{ContractDescriptor, SlotInfo};

/// Placeholder for addresses that must be filled in by hand. It is left
/// undeclared so the harness does not compile until it is replaced.
pub const MISSING_TARGET_ADDRESS: &str = "MISSING_TARGET_ADDRESS";

/// Name under which a participant's contract is imported in deploy mode.
fn import_alias(ctx: &Context<'_>, contract: &ContractDescriptor, side: Side) -> String {
    if ctx.is_primary(contract) {
        format!("{}_{}", contract.name(), side.suffix())
    } else {
        contract.name().to_string()
    }
}

/// Import statements for every participant deployed by the constructor.
pub(crate) fn imports(ctx: &Context<'_>, emission: &mut Emission) -> String {
    let mut out = String::new();
    let mut seen = BTreeSet::new();
    let participants = [(ctx.v1, Side::V1), (ctx.v2, Side::V2)]
        .into_iter()
        .chain(ctx.extra_participants().map(|c| (c, Side::V1)));
    for (contract, side) in participants {
        let alias = import_alias(ctx, contract, side);
        if !seen.insert(alias.clone()) {
            continue;
        }
        match contract.path() {
            Some(path) if alias == contract.name() => {
                out.push_str(&format!("import {{ {} }} from \"{}\";\n", contract.name(), path));
            }
            Some(path) => {
                out.push_str(&format!(
                    "import {{ {} as {} }} from \"{}\";\n",
                    contract.name(),
                    alias,
                    path
                ));
            }
            None => {
                let detail =
                    format!("source path of {} is unknown; add its import", contract.name());
                emission.gap(GapKind::MissingSource, contract.name(), detail.clone());
                let kind = GapKind::MissingSource.as_str();
                out.push_str(&format!("// TODO({}): {}\n", kind, detail));
            }
        }
    }
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

/// Instance declarations of the harness contract.
pub(crate) fn state_declarations(ctx: &Context<'_>) -> String {
    let mut out = format!("    IHevm hevm = IHevm({});\n\n", HEVM_ADDRESS);
    for side in [Side::V1, Side::V2] {
        let contract = ctx.primary(side);
        let instance = ctx.instance(contract, side);
        out.push_str(&format!("    {} {};\n", contract.interface_name(), instance));
    }
    for contract in ctx.extra_participants() {
        if ctx.is_fork() {
            out.push_str(&format!(
                "    {} {};\n",
                contract.interface_name(),
                ctx.instance(contract, Side::V1)
            ));
        } else {
            for side in [Side::V1, Side::V2] {
                out.push_str(&format!(
                    "    {} {};\n",
                    contract.interface_name(),
                    ctx.instance(contract, side)
                ));
            }
        }
    }
    if ctx.is_fork() {
        out.push_str("    uint256 fork1;\n");
        out.push_str("    uint256 fork2;\n");
    }
    out
}

/// Constructor opening line. Constructor visibility was dropped in solc 0.7.
fn constructor_open(ctx: &Context<'_>) -> &'static str {
    let mut parts = ctx.options.solc_version.split('.').map(|p| p.parse::<u32>().unwrap_or(0));
    let major = parts.next().unwrap_or(0);
    let minor = parts.next().unwrap_or(0);
    if (major, minor) < (0, 7) {
        "    constructor() public {\n"
    } else {
        "    constructor() {\n"
    }
}

pub(crate) fn constructor(ctx: &Context<'_>, emission: &mut Emission) -> String {
    let mut out = String::from("\n");
    out.push_str(constructor_open(ctx));
    if ctx.is_fork() {
        out.push_str(&fork_body(ctx, emission));
    } else {
        out.push_str(&deploy_body(ctx));
    }
    out.push_str("    }\n");
    out
}

fn deploy_body(ctx: &Context<'_>) -> String {
    let mut out = String::new();
    for side in [Side::V1, Side::V2] {
        let contract = ctx.primary(side);
        out.push_str(&deploy_line(ctx, contract, side));
    }
    if let Some(proxy) = ctx.proxy {
        out.push_str(&deploy_line(ctx, proxy, Side::V1));
        out.push_str(&deploy_line(ctx, proxy, Side::V2));
        out.push_str(&pin_implementations(ctx, proxy));
    }
    for contract in ctx.targets.iter().chain(ctx.tainted.iter()) {
        out.push_str(&deploy_line(ctx, contract, Side::V1));
        out.push_str(&deploy_line(ctx, contract, Side::V2));
    }
    out
}

fn deploy_line(ctx: &Context<'_>, contract: &ContractDescriptor, side: Side) -> String {
    format!(
        "        {} = {}(address(new {}()));\n",
        ctx.instance(contract, side),
        contract.interface_name(),
        import_alias(ctx, contract, side)
    )
}

fn fork_body(ctx: &Context<'_>, emission: &mut Emission) -> String {
    let mut out = String::new();
    if let Some(network) = &ctx.options.network {
        if let Some(block) = network.block {
            out.push_str(&format!("        hevm.roll({});\n", block));
        }
        if let Some(timestamp) = network.timestamp {
            out.push_str(&format!("        hevm.warp({});\n", timestamp));
        }
    }
    out.push_str("        fork1 = hevm.createFork();\n");
    out.push_str("        fork2 = hevm.createFork();\n");
    for side in [Side::V1, Side::V2] {
        out.push_str(&attach_line(ctx, emission, ctx.primary(side), side));
    }
    if let Some(proxy) = ctx.proxy {
        out.push_str(&attach_line(ctx, emission, proxy, Side::V1));
        out.push_str(&pin_implementations(ctx, proxy));
    }
    for contract in ctx.targets.iter().chain(ctx.tainted.iter()) {
        out.push_str(&attach_line(ctx, emission, contract, Side::V1));
    }
    out
}

fn attach_line(
    ctx: &Context<'_>,
    emission: &mut Emission,
    contract: &ContractDescriptor,
    side: Side,
) -> String {
    let instance = ctx.instance(contract, side);
    match contract.address() {
        Some(address) => format!(
            "        {} = {}({});\n",
            instance,
            contract.interface_name(),
            address.to_checksum(None)
        ),
        None => {
            let detail = format!("deployed address of {} was not provided", contract.name());
            emission.gap(GapKind::MissingAddress, contract.name(), detail.clone());
            format!(
                "    {}        {} = {}({});\n",
                gap_comment(GapKind::MissingAddress, &detail),
                instance,
                contract.interface_name(),
                MISSING_TARGET_ADDRESS
            )
        }
    }
}

/// `hevm.store` writing an implementation address into a proxy slot.
fn store_implementation(proxy_instance: &str, slot: &SlotInfo, implementation: &str) -> String {
    let word = format!("uint256(uint160(address({})))", implementation);
    let value = match slot.offset {
        0 => word,
        offset => format!("({} << {})", word, u32::from(offset) * 8),
    };
    let mut out = String::from("        hevm.store(\n");
    out.push_str(&format!("            address({}),\n", proxy_instance));
    out.push_str(&format!("            bytes32(uint256({})),\n", slot.slot_literal()));
    out.push_str(&format!("            bytes32({})\n", value));
    out.push_str("        );\n");
    out
}

/// Point each side's proxy at its implementation. With upgrade fuzzing the V2
/// side starts at V1 and moves to V2 in `upgradeV2()`.
/// In fork mode each store happens on its own fork.
fn pin_implementations(ctx: &Context<'_>, proxy: &ContractDescriptor) -> String {
    let Some(slot) = &ctx.slot else {
        return format!(
            "    {}",
            gap_comment(
                GapKind::SlotNotFound,
                "set the proxy implementations here; the implementation slot was not found"
            )
        );
    };
    let mut out = String::new();
    for side in [Side::V1, Side::V2] {
        let implementation_side = if ctx.upgrade { Side::V1 } else { side };
        let implementation = ctx.instance(ctx.primary(implementation_side), implementation_side);
        if ctx.is_fork() {
            out.push_str(&format!("        hevm.selectFork({});\n", side.fork()));
        }
        out.push_str(&store_implementation(&ctx.instance(proxy, side), slot, &implementation));
    }
    out
}

/// `upgradeV2()`: repoint the V2 side's proxy at V2.
pub(crate) fn upgrade_function(ctx: &Context<'_>) -> String {
    let mut out = section("Upgrade Function");
    out.push_str("    // Replace with the project's real upgrade procedure if it does more than\n");
    out.push_str("    // switch the implementation.\n");
    out.push_str("    function upgradeV2() external virtual {\n");
    match (ctx.proxy, &ctx.slot) {
        (Some(proxy), Some(slot)) => {
            if ctx.is_fork() {
                out.push_str(&format!("        hevm.selectFork({});\n", Side::V2.fork()));
            }
            let implementation = ctx.instance(ctx.v2, Side::V2);
            let proxy_instance = ctx.instance(proxy, Side::V2);
            out.push_str(&store_implementation(&proxy_instance, slot, &implementation));
        }
        _ => {
            out.push_str(&format!(
                "    {}",
                gap_comment(
                    GapKind::SlotNotFound,
                    "add the upgrade logic here; the implementation slot was not found"
                )
            ));
        }
    }
    out.push_str("    }\n");
    out
}
