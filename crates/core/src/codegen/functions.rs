//! Function wrappers.
//!
//! Each wrapper calls the same function on the V2 side and then on the V1 side
//! with identical arguments, and asserts that both calls either revert or
//! return identical bytes.

use tracing::debug;

use super::encoder::{call_args, encode_call, param_types, wrapper_params};
use super::similarity::{ratio, similar};
use super::{gap_comment, section, Context, Emission, GapKind, Side};
use crate::model::{ContractDescriptor, FunctionDescriptor, FunctionRef};

/// Modifier names treated as access control.
pub const PROTECTED_MODIFIERS: [&str; 6] =
    ["onlyOwner", "onlyAdmin", "ifOwner", "ifAdmin", "adminOnly", "ownerOnly"];

pub fn is_access_controlled(modifiers: &[String]) -> bool {
    modifiers.iter().any(|m| PROTECTED_MODIFIERS.contains(&m.as_str()))
}

/// One side of a comparison: what to call and where.
struct CallSide<'a> {
    side: Side,
    contract: &'a ContractDescriptor,
    func: &'a FunctionDescriptor,
    target: String,
}

struct Wrapper<'a> {
    name: String,
    v1: CallSide<'a>,
    v2: CallSide<'a>,
    /// Skip `prank` so calls come from the harness itself.
    protected: bool,
    /// Choose V2's calldata from the live implementation slot.
    dispatch: bool,
}

enum MatchFailure {
    Missing,
    Ambiguous(usize),
}

/// Find the single function of `contract` an entry refers to, by name and
/// arity, falling back to exact parameter types among same-arity overloads.
fn match_function<'a>(
    contract: &'a ContractDescriptor,
    entry: &FunctionRef,
) -> Result<&'a FunctionDescriptor, MatchFailure> {
    let candidates: Vec<&FunctionDescriptor> = contract
        .functions_named(&entry.name)
        .into_iter()
        .filter(|f| f.arity() == entry.arity())
        .collect();
    match candidates.as_slice() {
        [] => Err(MatchFailure::Missing),
        [only] => Ok(*only),
        many => {
            let signature = entry.signature();
            let exact: Vec<&FunctionDescriptor> =
                many.iter().copied().filter(|f| f.canonical_signature() == signature).collect();
            match exact.as_slice() {
                [only] => Ok(*only),
                _ => Err(MatchFailure::Ambiguous(many.len())),
            }
        }
    }
}

fn record_unmatched(
    emission: &mut Emission,
    contract: &ContractDescriptor,
    entry: &FunctionRef,
    failure: MatchFailure,
) -> String {
    let detail = match failure {
        MatchFailure::Missing => format!(
            "{} has no function {} taking {} argument(s); not compared",
            contract.name(),
            entry.name,
            entry.arity()
        ),
        MatchFailure::Ambiguous(n) => format!(
            "{} has {} overloads of {} taking {} argument(s); not compared",
            contract.name(),
            n,
            entry.name,
            entry.arity()
        ),
    };
    let subject = format!("{}.{}", contract.name(), entry.signature());
    emission.gap(GapKind::UnmatchedEntry, subject, detail.clone());
    format!("{}\n", gap_comment(GapKind::UnmatchedEntry, &detail))
}

fn is_eligible(ctx: &Context<'_>, entry: &FunctionRef, category: &str) -> bool {
    if !entry.is_entry_point() {
        debug!(function = %entry.name, category, "skipping non-external function");
        return false;
    }
    if !ctx.options.include_protected && is_access_controlled(&entry.modifiers) {
        debug!(function = %entry.name, category, "skipping access-controlled function");
        return false;
    }
    true
}

/// Access control declared on the function or on its diff entry.
fn is_guarded(func: &FunctionDescriptor, entry: Option<&FunctionRef>) -> bool {
    func.protected
        || is_access_controlled(&func.modifiers)
        || entry.map_or(false, |e| is_access_controlled(&e.modifiers))
}

fn skip_protected(ctx: &Context<'_>, func: &FunctionDescriptor) -> bool {
    if is_guarded(func, None) && !ctx.options.include_protected {
        debug!(function = %func.name, "skipping access-controlled function");
        return true;
    }
    false
}

fn wants_dispatch(ctx: &Context<'_>) -> bool {
    ctx.options.live_dispatch && ctx.proxy.is_some() && ctx.slot.is_some()
}

/// Wrappers for the V1/V2 diff: modified, tainted, new, then tainted
/// dependent contracts.
pub(crate) fn diff_wrappers(ctx: &Context<'_>, emission: &mut Emission) -> String {
    let mut out = section("Modified Functions");
    for entry in &ctx.diff.modified_functions {
        if is_eligible(ctx, entry, "modified") {
            out.push_str(&changed_function(ctx, emission, entry));
        }
    }

    out.push_str(&section("Tainted Functions"));
    for entry in &ctx.diff.tainted_functions {
        if is_eligible(ctx, entry, "tainted") {
            out.push_str(&changed_function(ctx, emission, entry));
        }
    }

    out.push_str(&section("New Functions"));
    for entry in &ctx.diff.new_functions {
        if is_eligible(ctx, entry, "new") {
            out.push_str(&new_function(ctx, emission, entry));
        }
    }

    out.push_str(&tainted_contract_wrappers(ctx, emission));
    out
}

/// A function present in both versions.
fn changed_function(ctx: &Context<'_>, emission: &mut Emission, entry: &FunctionRef) -> String {
    let v2_func = match match_function(ctx.v2, entry) {
        Ok(func) => func,
        Err(failure) => return record_unmatched(emission, ctx.v2, entry, failure),
    };
    if skip_protected(ctx, v2_func) {
        return String::new();
    }
    // V1 may lack the function when only its callees changed. V2's shape is
    // then reused and encoded by selector.
    let v1_func = match_function(ctx.v1, entry).unwrap_or(v2_func);
    let wrapper = primary_wrapper(ctx, v1_func, v2_func, is_guarded(v2_func, Some(entry)));
    render(ctx, emission, &wrapper)
}

fn primary_wrapper<'a>(
    ctx: &Context<'a>,
    v1_func: &'a FunctionDescriptor,
    v2_func: &'a FunctionDescriptor,
    protected: bool,
) -> Wrapper<'a> {
    Wrapper {
        name: format!("{}_{}", ctx.v2.name(), v2_func.name),
        v1: CallSide {
            side: Side::V1,
            contract: ctx.v1,
            func: v1_func,
            target: ctx.call_target(Side::V1),
        },
        v2: CallSide {
            side: Side::V2,
            contract: ctx.v2,
            func: v2_func,
            target: ctx.call_target(Side::V2),
        },
        protected,
        dispatch: wants_dispatch(ctx),
    }
}

/// A function that only exists in V2, compared against the most similarly
/// named V1 function.
fn new_function(ctx: &Context<'_>, emission: &mut Emission, entry: &FunctionRef) -> String {
    let v2_func = match match_function(ctx.v2, entry) {
        Ok(func) => func,
        Err(failure) => return record_unmatched(emission, ctx.v2, entry, failure),
    };
    if skip_protected(ctx, v2_func) {
        return String::new();
    }
    let new_name = entry
        .canonical_name
        .clone()
        .unwrap_or_else(|| format!("{}.{}", ctx.v2.name(), v2_func.canonical_signature()));

    let Some((v1_func, score)) = closest_predecessor(ctx.v1, &v2_func.name) else {
        let detail = format!(
            "new function {} has no similarly named function in {}; not compared",
            new_name,
            ctx.v1.name()
        );
        emission.gap(GapKind::AmbiguousMatch, new_name, detail.clone());
        return format!("{}\n", gap_comment(GapKind::AmbiguousMatch, &detail));
    };

    let old_name = format!("{}.{}", ctx.v1.name(), v1_func.canonical_signature());
    let wrapper = primary_wrapper(ctx, v1_func, v2_func, is_guarded(v2_func, Some(entry)));
    let body = render(ctx, emission, &wrapper);
    if body.is_empty() {
        return body;
    }
    emission.gap(
        GapKind::UnverifiedPairing,
        new_name.clone(),
        format!("paired with {} by name similarity ({:.2})", old_name, score),
    );
    let mut out = gap_comment(
        GapKind::UnverifiedPairing,
        &format!("{} is new in {}. It is compared against", new_name, ctx.v2.name()),
    );
    out.push_str(&format!("    // {}, the closest V1 name (similarity {:.2}).\n", old_name, score));
    out.push_str("    // Check the pairing by hand, especially when the argument lists differ.\n");
    out.push_str(&body);
    out
}

/// Most similar V1 function above the similarity threshold; the first one
/// declared wins ties.
fn closest_predecessor<'a>(
    v1: &'a ContractDescriptor,
    name: &str,
) -> Option<(&'a FunctionDescriptor, f64)> {
    let mut best: Option<(&FunctionDescriptor, f64)> = None;
    for candidate in v1.functions().iter().filter(|f| similar(&f.name, name)) {
        let score = ratio(&candidate.name.to_lowercase(), &name.to_lowercase());
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((candidate, score));
        }
    }
    best
}

/// Dependent contracts affected by the upgrade: compare their V1-side and
/// V2-side instances.
fn tainted_contract_wrappers(ctx: &Context<'_>, emission: &mut Emission) -> String {
    let mut out = String::new();
    let mut emitted_header = false;
    for tainted in &ctx.diff.tainted_contracts {
        if tainted.name == ctx.v1.name() || tainted.name == ctx.v2.name() {
            continue;
        }
        if !emitted_header {
            out.push_str(&section("Tainted External Contracts"));
            emitted_header = true;
        }
        let Some(contract) = ctx.participant(&tainted.name) else {
            let detail = format!(
                "tainted contract {} has no descriptor with callable functions; not compared",
                tainted.name
            );
            emission.gap(GapKind::DroppedParticipant, tainted.name.clone(), detail.clone());
            out.push_str(&format!("{}\n", gap_comment(GapKind::DroppedParticipant, &detail)));
            continue;
        };
        for entry in &tainted.tainted_functions {
            if !is_eligible(ctx, entry, "tainted contract") {
                continue;
            }
            let func = match match_function(contract, entry) {
                Ok(func) => func,
                Err(failure) => {
                    out.push_str(&record_unmatched(emission, contract, entry, failure));
                    continue;
                }
            };
            if skip_protected(ctx, func) {
                continue;
            }
            let wrapper =
                participant_wrapper(ctx, contract, func, is_guarded(func, Some(entry)));
            out.push_str(&render(ctx, emission, &wrapper));
        }
    }
    out
}

fn participant_wrapper<'a>(
    ctx: &Context<'_>,
    contract: &'a ContractDescriptor,
    func: &'a FunctionDescriptor,
    protected: bool,
) -> Wrapper<'a> {
    Wrapper {
        name: format!("{}_{}", contract.name(), func.name),
        v1: CallSide { side: Side::V1, contract, func, target: ctx.instance(contract, Side::V1) },
        v2: CallSide { side: Side::V2, contract, func, target: ctx.instance(contract, Side::V2) },
        protected,
        dispatch: false,
    }
}

/// Wrappers for additional targets that are neither tainted contracts nor the
/// proxy. When the diff names tainted contracts, only functions whose
/// signature matches one of their tainted functions are wrapped.
pub(crate) fn target_wrappers(ctx: &Context<'_>, emission: &mut Emission) -> String {
    if ctx.targets.is_empty() {
        return String::new();
    }
    let tainted_signatures: Vec<String> = ctx
        .diff
        .tainted_contracts
        .iter()
        .flat_map(|c| c.tainted_functions.iter().map(FunctionRef::signature))
        .collect();
    let filter_by_taint = !ctx.diff.tainted_contracts.is_empty();

    let mut out = section("Additional Targets");
    for target in ctx.targets.iter().copied() {
        let covered = ctx.diff.tainted_contract(target.name()).is_some()
            || ctx.proxy.map_or(false, |p| p.name() == target.name());
        if covered {
            continue;
        }
        for func in target.functions() {
            if skip_protected(ctx, func) {
                continue;
            }
            if filter_by_taint && !tainted_signatures.contains(&func.canonical_signature()) {
                continue;
            }
            let wrapper = participant_wrapper(ctx, target, func, is_guarded(func, None));
            out.push_str(&render(ctx, emission, &wrapper));
        }
    }
    out
}

fn render(ctx: &Context<'_>, emission: &mut Emission, wrapper: &Wrapper<'_>) -> String {
    let wider = if wrapper.v1.func.arity() > wrapper.v2.func.arity() {
        wrapper.v1.func
    } else {
        wrapper.v2.func
    };
    if !emission.claim_wrapper(&wrapper.name, &param_types(wider)) {
        debug!(wrapper = %wrapper.name, "wrapper already emitted");
        return String::new();
    }

    let mut out =
        format!("    function {}({}) public virtual {{\n", wrapper.name, wrapper_params(wider));
    out.push_str(&render_call(ctx, wrapper, &wrapper.v2));
    out.push_str(&render_call(ctx, wrapper, &wrapper.v1));
    out.push_str("        assert(successV1 == successV2);\n");
    out.push_str("        assert((!successV1 && !successV2) ||\n");
    out.push_str("            keccak256(outputV1) == keccak256(outputV2));\n");
    out.push_str("    }\n\n");
    out
}

fn render_call(ctx: &Context<'_>, wrapper: &Wrapper<'_>, call: &CallSide<'_>) -> String {
    let suffix = call.side.suffix();
    let args = call_args(call.func.arity());
    let mut out = String::new();
    if ctx.is_fork() {
        out.push_str(&format!("        hevm.selectFork({});\n", call.side.fork()));
    }
    let calldata = match (&ctx.slot, wrapper.dispatch && call.side == Side::V2) {
        (Some(slot), true) => {
            let v1_args = call_args(wrapper.v1.func.arity());
            let v1_impl = ctx.instance(ctx.v1, Side::V1);
            let word = format!("uint256(implSlot{suffix})");
            let shifted = match slot.offset {
                0 => word,
                offset => format!("({} >> {})", word, u32::from(offset) * 8),
            };
            out.push_str(&format!(
                "        bytes32 implSlot{} = hevm.load(address({}), bytes32(uint256({})));\n",
                suffix,
                call.target,
                slot.slot_literal()
            ));
            out.push_str(&format!(
                "        bytes memory callData{} = address(uint160({})) == address({})\n",
                suffix, shifted, v1_impl
            ));
            out.push_str(&format!(
                "            ? {}\n",
                encode_call(wrapper.v1.contract, wrapper.v1.func, &v1_args)
            ));
            let own = encode_call(call.contract, call.func, &args);
            out.push_str(&format!("            : {};\n", own));
            format!("callData{suffix}")
        }
        _ => encode_call(call.contract, call.func, &args),
    };
    if !wrapper.protected {
        out.push_str("        hevm.prank(msg.sender);\n");
    }
    out.push_str(&format!(
        "        (bool success{s}, bytes memory output{s}) = address({t}).call(\n",
        s = suffix,
        t = call.target
    ));
    out.push_str(&format!("            {}\n", calldata));
    out.push_str("        );\n");
    out
}
