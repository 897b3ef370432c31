//! PU-002: Expression model — the tagged union behind every declared value.
//!
//! Terraform's configuration JSON carries attribute values in two shapes:
//! `{"constant_value": ...}` and `{"references": ["var.x", ...]}`. Both
//! collapse into one sum type here, plus the third variant produced by the
//! resolver once a reference has been traced to a concrete target.

use serde_json::Value;

/// A declared or resolved attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// A literal value, known at plan time
    Constant(Value),

    /// Raw, unresolved reference expressions as Terraform emitted them
    References(Vec<String>),

    /// A reference already traced to its target (idempotent under resolution)
    Resolved(ResolvedReference),
}

/// A reference traced to a concrete resource/attribute target.
///
/// `module_address == None` means the target lives in the root scope.
/// A value beginning with `local.` marks a local-variable origin, which later
/// passes must treat as unsupported for linking.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedReference {
    /// The reference text, e.g. `aws_lambda_layer_version.l.arn`
    pub value: String,

    /// Address of the module the reference was resolved in, if not root
    pub module_address: Option<String>,
}

impl ResolvedReference {
    pub fn new(value: impl Into<String>, module_address: Option<String>) -> Self {
        ResolvedReference {
            value: value.into(),
            module_address,
        }
    }

    /// True when the reference originates from a `local.` value.
    pub fn is_local_origin(&self) -> bool {
        self.value.starts_with("local.")
    }

    /// True when the reference targets a `data` block.
    pub fn is_data_source(&self) -> bool {
        self.value.starts_with("data.")
    }

    /// The reference text qualified by its owning module address. Stable
    /// across resolution sites, so it doubles as a join key.
    pub fn qualified(&self) -> String {
        match &self.module_address {
            Some(m) => format!("{}.{}", m, self.value),
            None => self.value.clone(),
        }
    }
}

/// One element of a resolver result: either a literal or a traced pointer.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedValue {
    Constant(Value),
    Reference(ResolvedReference),
}

/// Parse one raw configuration expression into an `Expression`.
///
/// Anything that is neither of Terraform's two leaf shapes (nested block
/// expressions, for instance) is kept verbatim as a constant; the builders
/// that need block internals read the planned values instead.
pub fn parse_expression(raw: &Value) -> Expression {
    if let Some(obj) = raw.as_object() {
        if let Some(constant) = obj.get("constant_value") {
            return Expression::Constant(constant.clone());
        }
        if let Some(refs) = obj.get("references").and_then(Value::as_array) {
            let refs: Vec<String> = refs
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
            return Expression::References(refs);
        }
    }
    Expression::Constant(raw.clone())
}
