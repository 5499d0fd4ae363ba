use serde::{Deserialize, Serialize};

use super::canonical_signature;

/// Solidity visibility of a function or state variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    External,
    Internal,
    Private,
}

impl Visibility {
    pub fn is_external(self) -> bool {
        matches!(self, Visibility::Public | Visibility::External)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionKind {
    #[default]
    Regular,
    Constructor,
    Fallback,
    Receive,
}

/// A function as reported by the diff oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionRef {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<String>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub modifiers: Vec<String>,
    #[serde(default)]
    pub kind: FunctionKind,
    /// Fully qualified name such as `Token.transfer(address,uint256)`.
    #[serde(default)]
    pub canonical_name: Option<String>,
}

impl FunctionRef {
    pub fn new(name: impl Into<String>, parameters: Vec<String>) -> Self {
        Self {
            name: name.into(),
            parameters,
            visibility: Visibility::Public,
            modifiers: Vec::new(),
            kind: FunctionKind::Regular,
            canonical_name: None,
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_modifiers(mut self, modifiers: Vec<String>) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_kind(mut self, kind: FunctionKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    /// Callable from outside the contract by an ordinary message call.
    pub fn is_entry_point(&self) -> bool {
        self.visibility.is_external() && self.kind == FunctionKind::Regular
    }

    pub fn signature(&self) -> String {
        canonical_signature(&self.name, &self.parameters)
    }
}

/// Shape of a state variable, as far as wrapper generation cares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VariableType {
    Scalar { ty: String },
    DynamicArray { element: String },
    Mapping { key: String, value: String },
    Struct { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableRef {
    pub name: String,
    pub ty: VariableType,
    #[serde(default)]
    pub visibility: Visibility,
    /// Getter call as written in Solidity, e.g. `owner()`.
    #[serde(default)]
    pub full_name: Option<String>,
    /// Scalar whose type is a contract; its getter returns an address.
    #[serde(default)]
    pub contract_typed: bool,
}

impl VariableRef {
    pub fn new(name: impl Into<String>, ty: VariableType) -> Self {
        Self {
            name: name.into(),
            ty,
            visibility: Visibility::Public,
            full_name: None,
            contract_typed: false,
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn contract_typed(mut self) -> Self {
        self.contract_typed = true;
        self
    }

    pub fn getter(&self) -> String {
        match &self.full_name {
            Some(full) if !full.trim().is_empty() => full.clone(),
            _ => format!("{}()", self.name),
        }
    }
}

/// A dependent contract whose behavior is affected by the upgrade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaintedContract {
    pub name: String,
    #[serde(default)]
    pub tainted_functions: Vec<FunctionRef>,
    #[serde(default)]
    pub tainted_variables: Vec<VariableRef>,
}

/// Classified differences between V1 and V2.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    #[serde(default)]
    pub new_functions: Vec<FunctionRef>,
    #[serde(default)]
    pub modified_functions: Vec<FunctionRef>,
    #[serde(default)]
    pub tainted_functions: Vec<FunctionRef>,
    #[serde(default)]
    pub tainted_variables: Vec<VariableRef>,
    #[serde(default)]
    pub tainted_contracts: Vec<TaintedContract>,
    /// Reported only; no wrappers are generated for these.
    #[serde(default)]
    pub missing_variables: Vec<VariableRef>,
    #[serde(default)]
    pub new_variables: Vec<VariableRef>,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.new_functions.is_empty()
            && self.modified_functions.is_empty()
            && self.tainted_functions.is_empty()
            && self.tainted_variables.is_empty()
            && self.tainted_contracts.is_empty()
    }

    pub fn tainted_contract(&self, name: &str) -> Option<&TaintedContract> {
        self.tainted_contracts.iter().find(|c| c.name == name)
    }
}
