//! Call-site encoding: wrapper parameter lists, argument tuples and selector
//! expressions for a single function.

use alloy_primitives::hex;

use crate::model::{canonical_type, ContractDescriptor, FunctionDescriptor};

/// Synthetic name of the `index`-th parameter: `a`..`z`, then `a1`..`z1`, `a2`...
pub fn param_name(index: usize) -> String {
    let letter = char::from(b'a' + (index % 26) as u8);
    match index / 26 {
        0 => letter.to_string(),
        round => format!("{letter}{round}"),
    }
}

/// Whether values of `ty` need a data location when used as a parameter.
pub fn is_reference_type(ty: &str) -> bool {
    let ty = canonical_type(ty);
    ty == "string" || ty == "bytes" || ty.ends_with(']')
}

/// Declaration of a parameter or local of type `ty` in memory.
pub fn memory_decl(ty: &str, name: &str) -> String {
    let ty_name = canonical_type(ty);
    if is_reference_type(&ty_name) {
        format!("{ty_name} memory {name}")
    } else {
        format!("{ty_name} {name}")
    }
}

/// Typed parameter list of a wrapper, without parentheses: `uint256 a, string memory b`.
pub fn wrapper_params(func: &FunctionDescriptor) -> String {
    func.inputs
        .iter()
        .enumerate()
        .map(|(i, ty)| memory_decl(ty, &param_name(i)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parameter types of a wrapper, used to detect duplicate wrappers.
pub fn param_types(func: &FunctionDescriptor) -> Vec<String> {
    func.inputs.iter().map(|ty| canonical_type(ty)).collect()
}

/// Argument names for a call taking `arity` parameters.
pub fn call_args(arity: usize) -> Vec<String> {
    (0..arity).map(param_name).collect()
}

/// Selector of `func` as seen through `contract`'s interface.
///
/// `I<Iface>.<name>.selector` when the interface declares exactly this
/// function under that name; otherwise the computed `bytes4` literal, which
/// stays unambiguous for overloads.
pub fn selector_expr(contract: &ContractDescriptor, func: &FunctionDescriptor) -> String {
    let unique = match contract.functions_named(&func.name).as_slice() {
        [only] => only.canonical_signature() == func.canonical_signature(),
        _ => false,
    };
    if unique {
        format!("{}.{}.selector", contract.interface_name(), func.name)
    } else {
        format!("bytes4(0x{})", hex::encode(func.selector()))
    }
}

/// `abi.encodeWithSelector(...)` expression calling `func` with `args`.
pub fn encode_call(
    contract: &ContractDescriptor,
    func: &FunctionDescriptor,
    args: &[String],
) -> String {
    let selector = selector_expr(contract, func);
    if args.is_empty() {
        format!("abi.encodeWithSelector({selector})")
    } else {
        format!("abi.encodeWithSelector({selector}, {})", args.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_location_added_for_reference_types() {
        assert_eq!(memory_decl("string", "a"), "string memory a");
        assert_eq!(memory_decl("uint[] calldata", "b"), "uint256[] memory b");
        assert_eq!(memory_decl("bytes32", "c"), "bytes32 c");
    }
}
