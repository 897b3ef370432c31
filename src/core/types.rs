//! PU-001: All types from the puente specification.
//!
//! Defines the Terraform plan-document input schema (`terraform show -json`),
//! the translated serverless-template output schema, and the in-flight
//! translation types. Input types derive Deserialize only; the plan document
//! is consumed, never written back.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Plan document — input
// ============================================================================

/// A full `terraform show -json` plan document.
#[derive(Debug, Clone, Deserialize)]
pub struct TerraformPlan {
    /// Materialized resource values, recursively per module
    pub planned_values: PlannedValues,

    /// Declared configuration (expressions, module calls, variables, outputs)
    pub configuration: Configuration,

    /// Externally supplied root input values
    #[serde(default)]
    pub variables: IndexMap<String, RootVariable>,
}

/// The `planned_values` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PlannedValues {
    pub root_module: PlannedModule,
}

/// One module node in `planned_values` — resources plus nested child modules.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlannedModule {
    /// Full module address ("module.a.module.b"); absent on the root
    #[serde(default)]
    pub address: Option<String>,

    #[serde(default)]
    pub resources: Vec<PlannedResource>,

    #[serde(default)]
    pub child_modules: Vec<PlannedModule>,
}

/// A resource with materialized (post-plan) values.
#[derive(Debug, Clone, Deserialize)]
pub struct PlannedResource {
    /// Full address, including any enclosing module path
    pub address: String,

    /// Terraform resource type ("aws_lambda_function")
    #[serde(rename = "type")]
    pub resource_type: String,

    pub name: String,

    /// "managed" or "data"
    #[serde(default)]
    pub mode: String,

    /// Provider source ("registry.terraform.io/hashicorp/aws")
    #[serde(default)]
    pub provider_name: String,

    /// Materialized attribute values; post-apply-only values are absent
    #[serde(default)]
    pub values: serde_json::Map<String, Value>,
}

impl PlannedResource {
    /// True for `data` blocks — read-only lookups not created by Terraform.
    pub fn is_data_source(&self) -> bool {
        self.mode == "data"
    }
}

/// The `configuration` section.
#[derive(Debug, Clone, Deserialize)]
pub struct Configuration {
    pub root_module: ConfigModuleDecl,
}

/// Declared contents of one module: resource expressions, module calls,
/// variable defaults, output expressions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigModuleDecl {
    #[serde(default)]
    pub resources: Vec<ConfigResourceDecl>,

    #[serde(default)]
    pub module_calls: IndexMap<String, ModuleCall>,

    #[serde(default)]
    pub variables: IndexMap<String, VariableDecl>,

    #[serde(default)]
    pub outputs: IndexMap<String, OutputDecl>,
}

/// A declared resource. The address here is local to its module.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigResourceDecl {
    pub address: String,

    #[serde(rename = "type")]
    pub resource_type: String,

    /// Raw attribute expressions ({"constant_value": ...} / {"references": [...]})
    #[serde(default)]
    pub expressions: serde_json::Map<String, Value>,
}

/// A `module "name" { ... }` call block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModuleCall {
    /// Input expressions passed to the child, evaluated in the caller's scope
    #[serde(default)]
    pub expressions: serde_json::Map<String, Value>,

    /// The called module's own declarations
    #[serde(default)]
    pub module: ConfigModuleDecl,
}

/// A declared variable (only its default matters here).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VariableDecl {
    #[serde(default)]
    pub default: Option<Value>,
}

/// A declared output.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputDecl {
    #[serde(default)]
    pub expression: Value,
}

/// A top-level input value for a root variable.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RootVariable {
    #[serde(default)]
    pub value: Value,
}

// ============================================================================
// Provider / annotation conventions
// ============================================================================

/// Provider source suffix identifying AWS-managed resources.
pub const AWS_PROVIDER_SUFFIX: &str = "hashicorp/aws";

/// Provider source suffix identifying the null provider.
pub const NULL_PROVIDER_SUFFIX: &str = "hashicorp/null";

/// Name prefix marking a `null_resource` as a sam-metadata annotation.
pub const SAM_METADATA_PREFIX: &str = "sam_metadata_";

/// Sentinel for a build artifact only known after `terraform apply`.
pub const REMOTE_ARTIFACT_SENTINEL: &str = "__puente_remote_artifact__";

// Metadata keys on translated resources.
pub const METADATA_SOURCE_ID: &str = "SamResourceId";
pub const METADATA_SKIP_BUILD: &str = "SkipBuild";
pub const METADATA_BUILD_METHOD: &str = "BuildMethod";
pub const METADATA_CONTEXT_PATH: &str = "ContextPath";
pub const METADATA_WORKING_DIR: &str = "WorkingDirectory";
pub const METADATA_PROJECT_ROOT: &str = "ProjectRootDirectory";

// ============================================================================
// Translated output
// ============================================================================

/// One translated resource. Properties are rewritten in place by the linker;
/// metadata is rewritten in place by the enrichment pass.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedResource {
    /// Target schema type ("AWS::Lambda::Function")
    pub resource_type: String,

    /// Originating Terraform type ("aws_lambda_function")
    pub source_type: String,

    /// Full source address, module path included
    pub source_address: String,

    /// Generated logical ID (unique across the whole output)
    pub logical_id: String,

    /// Target attribute values
    pub properties: IndexMap<String, Value>,

    /// Build metadata (SamResourceId, SkipBuild, enrichment keys)
    pub metadata: IndexMap<String, Value>,
}

/// A sam-metadata annotation collected during the translation walk.
/// Consumed exactly once by the enrichment pass.
#[derive(Debug, Clone)]
pub struct AnnotationResource {
    /// Full address of the annotation resource itself
    pub address: String,

    /// Address of the enclosing module (None for the root)
    pub module_address: Option<String>,

    /// Local address of the annotation within its module, for config lookup
    pub local_address: String,

    /// Declared triggers from the planned values
    pub triggers: IndexMap<String, Value>,
}

impl AnnotationResource {
    /// A trigger's string value, if declared and a string.
    pub fn trigger_str(&self, key: &str) -> Option<&str> {
        self.triggers.get(key).and_then(Value::as_str)
    }
}

// ============================================================================
// Template — output
// ============================================================================

/// The translated template document.
#[derive(Debug, Clone, Serialize)]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,

    #[serde(rename = "Resources")]
    pub resources: IndexMap<String, TemplateResource>,
}

/// One resource block in the output template.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateResource {
    #[serde(rename = "Type")]
    pub resource_type: String,

    #[serde(rename = "Properties")]
    pub properties: IndexMap<String, Value>,

    #[serde(rename = "Metadata")]
    pub metadata: IndexMap<String, Value>,
}

impl Template {
    /// Assemble the final document from translated resources, keyed by
    /// logical ID in translation order.
    pub fn from_resources(resources: &IndexMap<String, TranslatedResource>) -> Self {
        let mut out = IndexMap::new();
        for (logical_id, r) in resources {
            out.insert(
                logical_id.clone(),
                TemplateResource {
                    resource_type: r.resource_type.clone(),
                    properties: r.properties.clone(),
                    metadata: r.metadata.clone(),
                },
            );
        }
        Template {
            format_version: "2010-09-09".to_string(),
            resources: out,
        }
    }
}

// ============================================================================
// Address helpers
// ============================================================================

/// Strip a trailing `[index]` from a resource address.
/// `aws_lambda_function.f[0]` → `aws_lambda_function.f`.
pub fn strip_index(address: &str) -> &str {
    match address.rfind('[') {
        Some(i) if address.ends_with(']') => &address[..i],
        _ => address,
    }
}

/// Local (module-relative) part of a full resource address:
/// `module.a.module.b.aws_lambda_function.f` → `aws_lambda_function.f`.
pub fn local_address(full: &str) -> &str {
    let mut rest = full;
    while let Some(tail) = rest.strip_prefix("module.") {
        match tail.find('.') {
            Some(dot) => rest = &tail[dot + 1..],
            None => break,
        }
    }
    rest
}

/// The enclosing module address of a full resource address, if any.
/// `module.a.aws_lambda_function.f` → `Some("module.a")`.
pub fn enclosing_module_address(full: &str) -> Option<String> {
    let local = local_address(full);
    if local.len() == full.len() {
        return None;
    }
    Some(full[..full.len() - local.len() - 1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pu001_plan_parse_minimal() {
        let json = r#"{
            "planned_values": {"root_module": {"resources": []}},
            "configuration": {"root_module": {}}
        }"#;
        let plan: TerraformPlan = serde_json::from_str(json).unwrap();
        assert!(plan.planned_values.root_module.resources.is_empty());
        assert!(plan.variables.is_empty());
    }

    #[test]
    fn test_pu001_plan_parse_resource() {
        let json = r#"{
            "planned_values": {"root_module": {"resources": [{
                "address": "aws_lambda_function.f",
                "type": "aws_lambda_function",
                "name": "f",
                "mode": "managed",
                "provider_name": "registry.terraform.io/hashicorp/aws",
                "values": {"function_name": "my-fn"}
            }]}},
            "configuration": {"root_module": {"resources": [{
                "address": "aws_lambda_function.f",
                "type": "aws_lambda_function",
                "expressions": {"function_name": {"constant_value": "my-fn"}}
            }]}}
        }"#;
        let plan: TerraformPlan = serde_json::from_str(json).unwrap();
        let r = &plan.planned_values.root_module.resources[0];
        assert_eq!(r.resource_type, "aws_lambda_function");
        assert!(!r.is_data_source());
        assert_eq!(r.values["function_name"], "my-fn");
        let c = &plan.configuration.root_module.resources[0];
        assert_eq!(c.expressions["function_name"]["constant_value"], "my-fn");
    }

    #[test]
    fn test_pu001_data_source_mode() {
        let json = r#"{
            "address": "data.archive_file.zip",
            "type": "archive_file",
            "name": "zip",
            "mode": "data"
        }"#;
        let r: PlannedResource = serde_json::from_str(json).unwrap();
        assert!(r.is_data_source());
    }

    #[test]
    fn test_pu001_nested_child_modules() {
        let json = r#"{
            "address": "module.a",
            "resources": [],
            "child_modules": [{"address": "module.a.module.b"}]
        }"#;
        let m: PlannedModule = serde_json::from_str(json).unwrap();
        assert_eq!(m.child_modules[0].address.as_deref(), Some("module.a.module.b"));
    }

    #[test]
    fn test_pu001_strip_index() {
        assert_eq!(strip_index("aws_lambda_function.f[0]"), "aws_lambda_function.f");
        assert_eq!(strip_index("aws_lambda_function.f"), "aws_lambda_function.f");
        assert_eq!(strip_index("a[12]"), "a");
    }

    #[test]
    fn test_pu001_local_address() {
        assert_eq!(local_address("aws_lambda_function.f"), "aws_lambda_function.f");
        assert_eq!(
            local_address("module.a.aws_lambda_function.f"),
            "aws_lambda_function.f"
        );
        assert_eq!(
            local_address("module.a.module.b.null_resource.sam_metadata_f"),
            "null_resource.sam_metadata_f"
        );
    }

    #[test]
    fn test_pu001_enclosing_module_address() {
        assert_eq!(enclosing_module_address("aws_lambda_function.f"), None);
        assert_eq!(
            enclosing_module_address("module.a.aws_lambda_function.f").as_deref(),
            Some("module.a")
        );
        assert_eq!(
            enclosing_module_address("module.a.module.b.aws_lambda_function.f").as_deref(),
            Some("module.a.module.b")
        );
    }

    #[test]
    fn test_pu001_template_assemble_order() {
        let mut resources = IndexMap::new();
        resources.insert(
            "FnA1234ABCD".to_string(),
            TranslatedResource {
                resource_type: "AWS::Lambda::Function".to_string(),
                source_type: "aws_lambda_function".to_string(),
                source_address: "aws_lambda_function.a".to_string(),
                logical_id: "FnA1234ABCD".to_string(),
                properties: IndexMap::new(),
                metadata: IndexMap::new(),
            },
        );
        let template = Template::from_resources(&resources);
        assert_eq!(template.format_version, "2010-09-09");
        let json = serde_json::to_string(&template).unwrap();
        assert!(json.contains("\"AWSTemplateFormatVersion\":\"2010-09-09\""));
        assert!(json.contains("\"FnA1234ABCD\""));
        assert!(json.contains("\"Type\":\"AWS::Lambda::Function\""));
    }

    #[test]
    fn test_pu001_annotation_trigger_str() {
        let mut triggers = IndexMap::new();
        triggers.insert(
            "resource_type".to_string(),
            Value::String("ZIP_LAMBDA_FUNCTION".to_string()),
        );
        triggers.insert("count".to_string(), Value::from(3));
        let a = AnnotationResource {
            address: "null_resource.sam_metadata_f".to_string(),
            module_address: None,
            local_address: "null_resource.sam_metadata_f".to_string(),
            triggers,
        };
        assert_eq!(a.trigger_str("resource_type"), Some("ZIP_LAMBDA_FUNCTION"));
        assert_eq!(a.trigger_str("count"), None);
        assert_eq!(a.trigger_str("missing"), None);
    }
}
