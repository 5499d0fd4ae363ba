//! Core data model for contracts under comparison.
//!
//! A harness is generated from:
//! - one `ContractDescriptor` per participant (V1, V2, proxy, extra targets,
//!   taint-discovered contracts),
//! - a single `DiffResult` classifying what changed between V1 and V2.
//!
//! Descriptors are built once from their serde records and are read-only for
//! the rest of a run. The only interior state is the memoized proxy slot
//! resolution.

mod diff;
mod naming;

use std::cell::OnceCell;
use std::str::FromStr;

use alloy_primitives::{keccak256, Address, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::proxy::{SlotError, SlotResolution};

pub use diff::{
    DiffResult, FunctionKind, FunctionRef, TaintedContract, VariableRef, VariableType, Visibility,
};
pub use naming::camel_case;

/// Errors raised while turning descriptor records into descriptors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("contract descriptor has an empty name")]
    EmptyName,
    #[error("contract {contract} has a function with an empty name")]
    EmptyFunctionName { contract: String },
    #[error("contract {contract} has an invalid address {value:?}: {reason}")]
    InvalidAddress { contract: String, value: String, reason: String },
}

/// Storage location of a state variable (or of a proxy's implementation pointer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotInfo {
    pub name: String,
    #[serde(rename = "type", alias = "type_string")]
    pub type_string: String,
    #[serde(with = "slot_number")]
    pub slot: U256,
    /// Size of the value in bits.
    #[serde(default = "default_slot_size")]
    pub size: u16,
    /// Byte offset of the value inside its slot, counted from the low-order end.
    #[serde(default)]
    pub offset: u8,
}

fn default_slot_size() -> u16 {
    256
}

impl SlotInfo {
    pub fn new(
        name: impl Into<String>,
        type_string: impl Into<String>,
        slot: U256,
        size: u16,
        offset: u8,
    ) -> Self {
        Self { name: name.into(), type_string: type_string.into(), slot, size, offset }
    }

    /// Slot holding a full 160-bit address at offset 0, as used by the
    /// standardized proxy layouts.
    pub fn implementation_slot(slot: U256) -> Self {
        Self::new("IMPLEMENTATION_SLOT", "address", slot, 160, 0)
    }

    /// Hex literal of the slot number, usable directly in Solidity source.
    pub fn slot_literal(&self) -> String {
        format!("0x{:x}", self.slot)
    }
}

/// Serde adapter accepting slot numbers as JSON/YAML integers or as decimal or
/// `0x`-prefixed strings. Always written back as a hex string.
mod slot_number {
    use std::str::FromStr;

    use alloy_primitives::U256;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(u64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(slot: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{:x}", slot))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Ok(U256::from(n)),
            Repr::Text(text) => U256::from_str(text.trim())
                .map_err(|e| D::Error::custom(format!("invalid slot number {text:?}: {e}"))),
        }
    }
}

/// A callable entry point of a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    /// Whether the function is guarded by an access-control check.
    #[serde(default)]
    pub protected: bool,
    #[serde(default)]
    pub modifiers: Vec<String>,
    #[serde(default)]
    pub oracle_ref: Option<String>,
}

impl FunctionDescriptor {
    pub fn new(name: impl Into<String>, inputs: Vec<String>, outputs: Vec<String>) -> Self {
        Self {
            name: name.into(),
            inputs,
            outputs,
            protected: false,
            modifiers: Vec::new(),
            oracle_ref: None,
        }
    }

    pub fn protected(mut self) -> Self {
        self.protected = true;
        self
    }

    pub fn with_modifiers(mut self, modifiers: Vec<String>) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn arity(&self) -> usize {
        self.inputs.len()
    }

    /// ABI signature used for selector computation, e.g. `transfer(address,uint256)`.
    pub fn canonical_signature(&self) -> String {
        canonical_signature(&self.name, &self.inputs)
    }

    /// First four bytes of the keccak-256 hash of the canonical signature.
    pub fn selector(&self) -> [u8; 4] {
        let hash = keccak256(self.canonical_signature().as_bytes());
        let mut out = [0u8; 4];
        out.copy_from_slice(&hash[..4]);
        out
    }
}

/// Build an ABI signature from a name and a list of (possibly decorated) types.
pub fn canonical_signature(name: &str, inputs: &[String]) -> String {
    let types: Vec<String> = inputs.iter().map(|t| canonical_type(t)).collect();
    format!("{}({})", name, types.join(","))
}

/// Normalize a Solidity type for ABI signatures.
///
/// Drops data-location keywords and parameter names, and expands the `uint`,
/// `int` and `byte` aliases (including inside array types).
pub fn canonical_type(ty: &str) -> String {
    let base = ty.split_whitespace().next().unwrap_or("");
    let (head, dims) = match base.find('[') {
        Some(idx) => base.split_at(idx),
        None => (base, ""),
    };
    let head = match head {
        "uint" => "uint256",
        "int" => "int256",
        "byte" => "bytes1",
        other => other,
    };
    format!("{head}{dims}")
}

/// Serde shape of a contract descriptor, as supplied by the diff oracle or a
/// request file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DescriptorRecord {
    pub name: String,
    #[serde(default)]
    pub suffix: Option<String>,
    #[serde(default)]
    pub interface_name: Option<String>,
    /// Full interface source. Synthesized from `functions` when absent.
    #[serde(default)]
    pub interface: Option<String>,
    #[serde(default)]
    pub functions: Vec<FunctionDescriptor>,
    #[serde(default)]
    pub is_proxy: bool,
    #[serde(default)]
    pub implementation_slot: Option<SlotInfo>,
    #[serde(default)]
    pub state_variables: Vec<SlotInfo>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub oracle_ref: Option<String>,
}

/// One participant of the harness.
///
/// Fields are private so that the suffix and derived interface name stay
/// consistent with the name they were computed from.
#[derive(Debug, Clone)]
pub struct ContractDescriptor {
    name: String,
    suffix: String,
    interface_name: String,
    interface: Option<String>,
    functions: Vec<FunctionDescriptor>,
    is_proxy: bool,
    implementation_slot: Option<SlotInfo>,
    state_variables: Vec<SlotInfo>,
    path: Option<String>,
    address: Option<Address>,
    oracle_ref: Option<String>,
    resolution: OnceCell<Result<SlotResolution, SlotError>>,
}

impl ContractDescriptor {
    /// Create a descriptor with the given display name, suffix and functions.
    ///
    /// The interface name defaults to `I<name><suffix>`.
    pub fn new(
        name: impl Into<String>,
        suffix: impl Into<String>,
        functions: Vec<FunctionDescriptor>,
    ) -> Result<Self, DescriptorError> {
        let name = name.into();
        let suffix = suffix.into();
        if name.trim().is_empty() {
            return Err(DescriptorError::EmptyName);
        }
        if functions.iter().any(|f| f.name.trim().is_empty()) {
            return Err(DescriptorError::EmptyFunctionName { contract: name });
        }
        let interface_name = format!("I{}{}", name, suffix);
        Ok(Self {
            name,
            suffix,
            interface_name,
            interface: None,
            functions,
            is_proxy: false,
            implementation_slot: None,
            state_variables: Vec::new(),
            path: None,
            address: None,
            oracle_ref: None,
            resolution: OnceCell::new(),
        })
    }

    /// Build a descriptor from its serde record. `default_suffix` applies when
    /// the record does not carry its own.
    pub fn from_record(
        record: DescriptorRecord,
        default_suffix: &str,
    ) -> Result<Self, DescriptorError> {
        let suffix = record.suffix.unwrap_or_else(|| default_suffix.to_string());
        let mut descriptor = Self::new(record.name, suffix, record.functions)?;
        if let Some(interface_name) = record.interface_name.filter(|n| !n.trim().is_empty()) {
            descriptor.interface_name = interface_name;
        }
        if let Some(raw) = record.address.filter(|a| !a.trim().is_empty()) {
            let address = parse_address(&descriptor.name, &raw)?;
            descriptor = descriptor.with_address(address);
        }
        descriptor.interface = record.interface;
        descriptor.is_proxy = record.is_proxy;
        descriptor.implementation_slot = record.implementation_slot;
        descriptor.state_variables = record.state_variables;
        descriptor.path = record.path;
        descriptor.oracle_ref = record.oracle_ref;
        Ok(descriptor)
    }

    pub fn as_proxy(mut self) -> Self {
        self.is_proxy = true;
        self
    }

    pub fn with_interface(mut self, source: impl Into<String>) -> Self {
        self.interface = Some(source.into());
        self
    }

    pub fn with_implementation_slot(mut self, slot: SlotInfo) -> Self {
        self.implementation_slot = Some(slot);
        self
    }

    pub fn with_state_variables(mut self, variables: Vec<SlotInfo>) -> Self {
        self.state_variables = variables;
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn interface_name(&self) -> &str {
        &self.interface_name
    }

    pub fn interface(&self) -> Option<&str> {
        self.interface.as_deref()
    }

    pub fn functions(&self) -> &[FunctionDescriptor] {
        &self.functions
    }

    pub fn is_proxy(&self) -> bool {
        self.is_proxy
    }

    pub fn implementation_slot(&self) -> Option<&SlotInfo> {
        self.implementation_slot.as_ref()
    }

    pub fn state_variables(&self) -> &[SlotInfo] {
        &self.state_variables
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn address(&self) -> Option<Address> {
        self.address
    }

    pub fn oracle_ref(&self) -> Option<&str> {
        self.oracle_ref.as_deref()
    }

    /// Base identifier for instances of this contract in generated code.
    pub fn instance_base(&self) -> String {
        camel_case(&self.name)
    }

    /// Functions with the given name, in declaration order.
    pub fn functions_named(&self, name: &str) -> Vec<&FunctionDescriptor> {
        self.functions.iter().filter(|f| f.name == name).collect()
    }

    /// Whether more than one function shares `name`.
    pub fn is_overloaded(&self, name: &str) -> bool {
        self.functions_named(name).len() > 1
    }

    pub(crate) fn resolution_cell(&self) -> &OnceCell<Result<SlotResolution, SlotError>> {
        &self.resolution
    }
}

fn parse_address(contract: &str, raw: &str) -> Result<Address, DescriptorError> {
    Address::from_str(raw.trim()).map_err(|e| DescriptorError::InvalidAddress {
        contract: contract.to_string(),
        value: raw.to_string(),
        reason: e.to_string(),
    })
}
