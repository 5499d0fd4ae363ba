//! State variable wrappers: read a tainted public variable through its getter
//! on both sides and assert the values are equal.

use tracing::debug;

use super::encoder::{is_reference_type, memory_decl, param_name};
use super::{gap_comment, section, Context, Emission, GapKind, Side};
use crate::model::{canonical_type, VariableRef, VariableType};

/// How a getter is called and what it returns.
struct Getter {
    /// Wrapper parameter list, without parentheses.
    params: String,
    /// Wrapper parameter types, used to detect duplicate wrappers.
    param_types: Vec<String>,
    /// Call expression appended to the instance, e.g. `balances(a)`.
    call: String,
    /// Solidity type of the returned value.
    value_type: String,
}

pub(crate) fn variable_wrappers(ctx: &Context<'_>, emission: &mut Emission) -> String {
    let mut out = section("Tainted Variables");
    for var in &ctx.diff.tainted_variables {
        if !var.visibility.is_external() {
            debug!(variable = %var.name, "skipping non-public variable");
            continue;
        }
        let getter = match getter(var) {
            Ok(getter) => getter,
            Err(reason) => {
                let subject = format!("{}.{}", ctx.v1.name(), var.name);
                let detail = format!("{subject} {reason}; not compared");
                emission.gap(GapKind::UnsupportedType, subject, detail.clone());
                out.push_str(&format!("{}\n", gap_comment(GapKind::UnsupportedType, &detail)));
                continue;
            }
        };
        let name = format!("{}_{}", ctx.v1.name(), var.name);
        if !emission.claim_wrapper(&name, &getter.param_types) {
            continue;
        }
        out.push_str(&render(ctx, &name, &getter));
    }
    out
}

/// Keys a public getter takes, collected while unwrapping mappings and arrays.
#[derive(Default)]
struct Keys {
    params: Vec<(String, String)>,
    mapping_keys: usize,
    indices: usize,
}

impl Keys {
    fn mapping_key(&mut self, ty: &str) {
        let name = param_name(self.mapping_keys);
        self.mapping_keys += 1;
        self.params.push((canonical_type(ty), name));
    }

    fn index(&mut self) {
        let name = INDEX_NAMES
            .get(self.indices)
            .map(|n| n.to_string())
            .unwrap_or_else(|| format!("i{}", self.indices));
        self.indices += 1;
        self.params.push(("uint256".to_string(), name));
    }
}

const INDEX_NAMES: [&str; 3] = ["i", "j", "k"];

fn getter(var: &VariableRef) -> Result<Getter, String> {
    let mut keys = Keys::default();
    let value_type = match &var.ty {
        VariableType::Scalar { .. } if var.contract_typed => "address".to_string(),
        VariableType::Scalar { ty } => unwrap_value(ty, &mut keys)?,
        VariableType::DynamicArray { element } => {
            keys.index();
            unwrap_value(element, &mut keys)?
        }
        VariableType::Mapping { key, value } => {
            keys.mapping_key(key);
            unwrap_value(value, &mut keys)?
        }
        VariableType::Struct { .. } => return Err("is struct-typed".to_string()),
    };

    let call = if keys.params.is_empty() {
        var.getter()
    } else {
        let args: Vec<&str> = keys.params.iter().map(|(_, n)| n.as_str()).collect();
        format!("{}({})", var.name, args.join(", "))
    };
    let params = keys
        .params
        .iter()
        .map(|(ty, n)| memory_decl(ty, n))
        .collect::<Vec<_>>()
        .join(", ");
    let param_types = keys.params.into_iter().map(|(ty, _)| ty).collect();
    Ok(Getter { params, param_types, call, value_type })
}

/// Follow nested mappings and arrays down to the value the getter returns.
/// Struct values cannot be compared and are rejected.
fn unwrap_value(ty: &str, keys: &mut Keys) -> Result<String, String> {
    let ty = ty.trim();
    if ty.starts_with("struct ") {
        return Err("holds struct values".to_string());
    }
    if let Some((key, value)) = split_mapping(ty) {
        keys.mapping_key(key);
        return unwrap_value(value, keys);
    }
    if let Some(element) = ty.strip_suffix(']').and_then(|t| t.rfind('[').map(|i| &t[..i])) {
        keys.index();
        return unwrap_value(element, keys);
    }
    Ok(canonical_type(ty))
}

/// Split `mapping(K => V)` into its key and value types.
fn split_mapping(ty: &str) -> Option<(&str, &str)> {
    let inner = ty.strip_prefix("mapping")?.trim_start().strip_prefix('(')?.strip_suffix(')')?;
    let (key, value) = inner.split_once("=>")?;
    Some((key.trim(), value.trim()))
}

/// Target through which a side's variable is read: the proxy cast to that
/// side's interface when a proxy is present, the implementation otherwise.
fn read_target(ctx: &Context<'_>, side: Side) -> String {
    let contract = ctx.primary(side);
    match ctx.proxy {
        Some(proxy) => {
            format!("{}(address({}))", contract.interface_name(), ctx.instance(proxy, side))
        }
        None => ctx.instance(contract, side),
    }
}

fn equality(value_type: &str, left: &str, right: &str) -> String {
    if is_reference_type(value_type) {
        format!("keccak256(abi.encode({left})) == keccak256(abi.encode({right}))")
    } else {
        format!("{left} == {right}")
    }
}

fn render(ctx: &Context<'_>, name: &str, getter: &Getter) -> String {
    let v1 = format!("{}.{}", read_target(ctx, Side::V1), getter.call);
    let v2 = format!("{}.{}", read_target(ctx, Side::V2), getter.call);
    let mut out = format!("    function {}({}) public {{\n", name, getter.params);
    if ctx.is_fork() {
        out.push_str(&format!("        hevm.selectFork({});\n", Side::V1.fork()));
        out.push_str(&format!("        {} = {};\n", memory_decl(&getter.value_type, "a1"), v1));
        out.push_str(&format!("        hevm.selectFork({});\n", Side::V2.fork()));
        out.push_str(&format!("        {} = {};\n", memory_decl(&getter.value_type, "a2"), v2));
        out.push_str(&format!("        assert({});\n", equality(&getter.value_type, "a1", "a2")));
    } else {
        out.push_str(&format!("        assert({});\n", equality(&getter.value_type, &v1, &v2)));
    }
    out.push_str("    }\n\n");
    out
}
