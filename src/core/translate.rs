//! PU-006: Resource translation — per-type property builders and the
//! module walk that produces the template's resource collection.
//!
//! Each supported Terraform type carries a fixed table of (target attribute,
//! builder) pairs. Builders are pure: they read the materialized planned
//! values and fall back to the reference resolver when a value is only
//! available post-apply. The walk itself is an iterative work-list over
//! planned modules, so deeply nested module trees cannot overflow the stack.

use super::expr::ResolvedValue;
use super::logical_id::logical_id;
use super::modtree::{ConfigResource, ModuleTree};
use super::resolver::resolve_resource_attribute;
use super::types::*;
use indexmap::IndexMap;
use serde_json::{json, Value};
use std::collections::VecDeque;

// ============================================================================
// Registry
// ============================================================================

/// Everything a builder may need: materialized values, the declared resource,
/// and the module tree for resolver fallback.
pub struct BuildCtx<'a> {
    pub values: &'a serde_json::Map<String, Value>,
    pub resource: &'a ConfigResource,
    pub tree: &'a ModuleTree,
}

/// One target attribute builder.
#[derive(Clone, Copy)]
pub enum Builder {
    /// Copy a same-meaning source key verbatim
    Passthrough(&'static str),

    /// Type-specific structural rule
    Custom(fn(&BuildCtx) -> Result<Option<Value>, String>),
}

impl Builder {
    fn build(&self, ctx: &BuildCtx) -> Result<Option<Value>, String> {
        match self {
            Builder::Passthrough(key) => {
                Ok(ctx.values.get(*key).filter(|v| !v.is_null()).cloned())
            }
            Builder::Custom(f) => f(ctx),
        }
    }
}

/// Translation rules for one Terraform resource type.
pub struct Translator {
    pub source_type: &'static str,
    pub target_type: &'static str,
    pub builders: &'static [(&'static str, Builder)],
}

/// The closed set of supported type translations. Constructed explicitly and
/// passed into the pipeline entry point; nothing here is process-global.
pub struct TranslatorRegistry {
    translators: Vec<Translator>,
}

impl TranslatorRegistry {
    /// The standard AWS serverless translation set.
    pub fn standard() -> Self {
        TranslatorRegistry {
            translators: vec![
                Translator {
                    source_type: "aws_lambda_function",
                    target_type: "AWS::Lambda::Function",
                    builders: FUNCTION_BUILDERS,
                },
                Translator {
                    source_type: "aws_lambda_layer_version",
                    target_type: "AWS::Lambda::LayerVersion",
                    builders: LAYER_BUILDERS,
                },
                Translator {
                    source_type: "aws_apigatewayv2_api",
                    target_type: "AWS::ApiGatewayV2::Api",
                    builders: API_BUILDERS,
                },
                Translator {
                    source_type: "aws_apigatewayv2_route",
                    target_type: "AWS::ApiGatewayV2::Route",
                    builders: ROUTE_BUILDERS,
                },
            ],
        }
    }

    pub fn get(&self, source_type: &str) -> Option<&Translator> {
        self.translators.iter().find(|t| t.source_type == source_type)
    }
}

const FUNCTION_BUILDERS: &[(&str, Builder)] = &[
    ("FunctionName", Builder::Passthrough("function_name")),
    ("Runtime", Builder::Passthrough("runtime")),
    ("Handler", Builder::Passthrough("handler")),
    ("MemorySize", Builder::Passthrough("memory_size")),
    ("Timeout", Builder::Passthrough("timeout")),
    ("Role", Builder::Passthrough("role")),
    ("PackageType", Builder::Passthrough("package_type")),
    ("Architectures", Builder::Passthrough("architectures")),
    // Already-known layer ARNs; the linker merges generated references in.
    ("Layers", Builder::Passthrough("layers")),
    ("Environment", Builder::Custom(build_environment)),
    ("Code", Builder::Custom(build_function_code)),
];

const LAYER_BUILDERS: &[(&str, Builder)] = &[
    ("LayerName", Builder::Passthrough("layer_name")),
    ("Description", Builder::Passthrough("description")),
    ("CompatibleRuntimes", Builder::Passthrough("compatible_runtimes")),
    ("Content", Builder::Custom(build_layer_content)),
];

const API_BUILDERS: &[(&str, Builder)] = &[
    ("Name", Builder::Passthrough("name")),
    ("ProtocolType", Builder::Passthrough("protocol_type")),
    ("Description", Builder::Passthrough("description")),
];

const ROUTE_BUILDERS: &[(&str, Builder)] = &[
    ("ApiId", Builder::Passthrough("api_id")),
    ("RouteKey", Builder::Passthrough("route_key")),
    ("Target", Builder::Passthrough("target")),
];

// ============================================================================
// Composite builders
// ============================================================================

/// `environment[0].variables` flattened into `{ "Variables": {...} }`.
fn build_environment(ctx: &BuildCtx) -> Result<Option<Value>, String> {
    let vars = ctx
        .values
        .get("environment")
        .and_then(Value::as_array)
        .and_then(|blocks| blocks.first())
        .and_then(|block| block.get("variables"))
        .filter(|v| v.is_object());
    Ok(vars.map(|v| json!({ "Variables": v })))
}

/// Function code: a local zip path, an image URI, or the remote-artifact
/// sentinel when the plan cannot tell us yet.
fn build_function_code(ctx: &BuildCtx) -> Result<Option<Value>, String> {
    let package_type = ctx
        .values
        .get("package_type")
        .and_then(Value::as_str)
        .unwrap_or("Zip");
    if package_type == "Image" {
        return Ok(Some(match artifact_path(ctx, "image_uri")? {
            Some(uri) => json!({ "ImageUri": uri }),
            None => Value::String(REMOTE_ARTIFACT_SENTINEL.to_string()),
        }));
    }
    Ok(Some(match artifact_path(ctx, "filename")? {
        Some(path) => Value::String(path),
        None => Value::String(REMOTE_ARTIFACT_SENTINEL.to_string()),
    }))
}

/// Layer content: same rule as zip function code.
fn build_layer_content(ctx: &BuildCtx) -> Result<Option<Value>, String> {
    Ok(Some(match artifact_path(ctx, "filename")? {
        Some(path) => Value::String(path),
        None => Value::String(REMOTE_ARTIFACT_SENTINEL.to_string()),
    }))
}

/// A build-artifact path: materialized value first, then any constant the
/// resolver can trace. Sibling/cross-module pointers mean the artifact only
/// exists after apply, so the caller falls back to the sentinel.
fn artifact_path(ctx: &BuildCtx, attribute: &str) -> Result<Option<String>, String> {
    if let Some(s) = ctx.values.get(attribute).and_then(Value::as_str) {
        return Ok(Some(s.to_string()));
    }
    for v in resolve_resource_attribute(ctx.tree, ctx.resource, attribute)? {
        if let ResolvedValue::Constant(Value::String(s)) = v {
            return Ok(Some(s));
        }
    }
    Ok(None)
}

/// Join key for an artifact that is only a resolved reference — the content
/// comes from a companion resource (an archive data source, for instance) and
/// only the pointer is known offline. Local-origin references carry no
/// stable target and are skipped.
fn artifact_reference(ctx: &BuildCtx, attribute: &str) -> Result<Option<String>, String> {
    for v in resolve_resource_attribute(ctx.tree, ctx.resource, attribute)? {
        if let ResolvedValue::Reference(r) = v {
            if r.is_local_origin() {
                continue;
            }
            return Ok(Some(r.qualified()));
        }
    }
    Ok(None)
}

/// Which source attribute carries the build artifact for a given type.
fn artifact_attribute(source_type: &str) -> Option<&'static str> {
    match source_type {
        "aws_lambda_function" | "aws_lambda_layer_version" => Some("filename"),
        _ => None,
    }
}

// ============================================================================
// Translation walk
// ============================================================================

/// Resources skipped by the walk, by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkippedCounts {
    pub data_sources: usize,
    pub other_provider: usize,
    pub unsupported_type: usize,
}

/// Everything the walk produces; linker and enrichment passes mutate the
/// `resources` map in place.
#[derive(Debug, Default)]
pub struct TranslationOutput {
    /// Logical ID → translated resource, in translation order
    pub resources: IndexMap<String, TranslatedResource>,

    /// Full source address → logical ID
    pub logical_ids: IndexMap<String, String>,

    /// Content hash of a build-artifact join key (a literal path, or the
    /// qualified reference pointing at its content source) → logical IDs
    pub artifact_index: IndexMap<String, Vec<String>>,

    /// Collected sam-metadata annotations
    pub annotations: Vec<AnnotationResource>,

    pub skipped: SkippedCounts,
}

/// Content hash used to join annotations to resources by artifact path.
pub fn artifact_hash(path: &str) -> String {
    format!("blake3:{}", blake3::hash(path.as_bytes()).to_hex())
}

fn is_annotation(r: &PlannedResource) -> bool {
    r.resource_type == "null_resource"
        && r.provider_name.ends_with(NULL_PROVIDER_SUFFIX)
        && r.name.starts_with(SAM_METADATA_PREFIX)
}

fn is_aws_provider(r: &PlannedResource) -> bool {
    r.provider_name.ends_with(AWS_PROVIDER_SUFFIX) || r.provider_name == "aws"
}

/// Walk the planned values and translate every supported resource.
pub fn translate(
    plan: &TerraformPlan,
    tree: &ModuleTree,
    registry: &TranslatorRegistry,
) -> Result<TranslationOutput, String> {
    let mut out = TranslationOutput::default();

    let mut work: VecDeque<&PlannedModule> = VecDeque::new();
    work.push_back(&plan.planned_values.root_module);

    while let Some(planned) = work.pop_front() {
        let module_id = tree.find_module(planned.address.as_deref())?;

        for pr in &planned.resources {
            if pr.is_data_source() {
                out.skipped.data_sources += 1;
                continue;
            }
            if is_annotation(pr) {
                out.annotations.push(collect_annotation(pr, planned.address.as_deref()));
                continue;
            }
            if !is_aws_provider(pr) {
                out.skipped.other_provider += 1;
                continue;
            }
            let Some(translator) = registry.get(&pr.resource_type) else {
                out.skipped.unsupported_type += 1;
                continue;
            };

            let local = strip_index(local_address(&pr.address));
            let config = tree.resource(module_id, local).ok_or_else(|| {
                format!(
                    "planned resource '{}' has no configuration declaration",
                    pr.address
                )
            })?;
            let ctx = BuildCtx {
                values: &pr.values,
                resource: config,
                tree,
            };

            let mut properties = IndexMap::new();
            for (attribute, builder) in translator.builders {
                if let Some(value) = builder.build(&ctx)? {
                    properties.insert(attribute.to_string(), value);
                }
            }

            let mut metadata = IndexMap::new();
            metadata.insert(METADATA_SOURCE_ID.to_string(), json!(pr.address));
            metadata.insert(METADATA_SKIP_BUILD.to_string(), json!(true));

            let id = logical_id(&pr.address);
            if let Some(attr) = artifact_attribute(&pr.resource_type) {
                let key = match artifact_path(&ctx, attr)? {
                    Some(path) => Some(path),
                    None => artifact_reference(&ctx, attr)?,
                };
                if let Some(key) = key {
                    out.artifact_index
                        .entry(artifact_hash(&key))
                        .or_default()
                        .push(id.clone());
                }
            }

            out.logical_ids.insert(pr.address.clone(), id.clone());
            out.resources.insert(
                id.clone(),
                TranslatedResource {
                    resource_type: translator.target_type.to_string(),
                    source_type: pr.resource_type.clone(),
                    source_address: pr.address.clone(),
                    logical_id: id,
                    properties,
                    metadata,
                },
            );
        }

        for child in &planned.child_modules {
            work.push_back(child);
        }
    }

    Ok(out)
}

fn collect_annotation(r: &PlannedResource, module_address: Option<&str>) -> AnnotationResource {
    let mut triggers = IndexMap::new();
    if let Some(obj) = r.values.get("triggers").and_then(Value::as_object) {
        for (k, v) in obj {
            triggers.insert(k.clone(), v.clone());
        }
    }
    AnnotationResource {
        address: r.address.clone(),
        module_address: module_address.map(str::to_string),
        local_address: strip_index(local_address(&r.address)).to_string(),
        triggers,
    }
}

/// Final full-output validation: a resource still holding the remote-artifact
/// sentinel and not marked buildable cannot be translated offline.
pub fn check_unresolved_artifacts(out: &TranslationOutput) -> Result<(), String> {
    for r in out.resources.values() {
        let skip_build = r
            .metadata
            .get(METADATA_SKIP_BUILD)
            .and_then(Value::as_bool)
            .unwrap_or(true);
        if !skip_build {
            continue;
        }
        let pending = ["Code", "Content"].iter().any(|key| {
            matches!(r.properties.get(*key),
                Some(Value::String(s)) if s == REMOTE_ARTIFACT_SENTINEL)
        });
        if pending {
            return Err(format!(
                "resource '{}' depends on a build artifact only known after apply; \
                 run 'terraform apply' first, or declare a sam metadata resource for it",
                r.source_address
            ));
        }
    }
    Ok(())
}
