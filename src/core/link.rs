//! PU-007: Resource linking — pairing translated sources with translated
//! destinations through resolved references.
//!
//! One generic pass, parameterized by a `LinkSpec`, per relationship kind:
//! function→layer and route→gateway. Each source's link attribute is resolved
//! against the module tree, data-source pointers are dropped, local-origin
//! pointers are fatal, and exactly one distinct generated destination may
//! remain. References to resources created outside this tool are kept as-is.

use super::expr::ResolvedValue;
use super::modtree::ModuleTree;
use super::resolver::resolve_resource_attribute;
use super::translate::TranslationOutput;
use super::types::{local_address, strip_index, TranslatedResource};
use serde_json::{json, Value};

/// A resolved link destination.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkTarget {
    /// A destination translated in this run, referenced by logical ID
    GeneratedId(String),

    /// A pre-existing value (literal ARN/ID, or a reference this run
    /// does not manage), used as-is
    Existing(Value),
}

/// One linkable relationship kind.
pub struct LinkSpec {
    /// Terraform type of the source side
    pub source_type: &'static str,

    /// Terraform type of the destination side
    pub dest_type: &'static str,

    /// Source attribute holding the reference expression
    pub link_attribute: &'static str,

    /// Target field rewritten on the source's translated output
    pub field: &'static str,

    /// Field rewrite rule; merges, never overwrites collections wholesale
    pub rewrite: fn(&mut TranslatedResource, &'static str, &[LinkTarget]),
}

/// The standard relationship set.
pub fn standard_link_specs() -> Vec<LinkSpec> {
    vec![
        LinkSpec {
            source_type: "aws_lambda_function",
            dest_type: "aws_lambda_layer_version",
            link_attribute: "layers",
            field: "Layers",
            rewrite: rewrite_list_field,
        },
        LinkSpec {
            source_type: "aws_apigatewayv2_route",
            dest_type: "aws_apigatewayv2_api",
            link_attribute: "api_id",
            field: "ApiId",
            rewrite: rewrite_scalar_field,
        },
    ]
}

/// Run one linking pass over all translated sources of the spec's type.
pub fn link_pass(
    spec: &LinkSpec,
    tree: &ModuleTree,
    out: &mut TranslationOutput,
) -> Result<(), String> {
    let source_ids: Vec<String> = out
        .resources
        .values()
        .filter(|r| r.source_type == spec.source_type)
        .map(|r| r.logical_id.clone())
        .collect();

    for id in source_ids {
        let source_address = out.resources[&id].source_address.clone();
        let targets = resolve_link_targets(spec, tree, out, &source_address)?;
        if targets.is_empty() {
            continue;
        }
        let resource = out
            .resources
            .get_mut(&id)
            .ok_or_else(|| format!("translated resource '{}' vanished mid-pass", id))?;
        (spec.rewrite)(resource, spec.field, &targets);
    }
    Ok(())
}

fn resolve_link_targets(
    spec: &LinkSpec,
    tree: &ModuleTree,
    out: &TranslationOutput,
    source_address: &str,
) -> Result<Vec<LinkTarget>, String> {
    let module_address = super::types::enclosing_module_address(source_address);
    let module = tree.find_module(module_address.as_deref())?;
    let local = strip_index(local_address(source_address));
    let config = tree.resource(module, local).ok_or_else(|| {
        format!(
            "translated resource '{}' has no configuration declaration",
            source_address
        )
    })?;

    let resolved = resolve_resource_attribute(tree, config, spec.link_attribute)?;

    let mut existing: Vec<LinkTarget> = Vec::new();
    // (full destination address, logical id), distinct, in resolution order
    let mut generated: Vec<(String, String)> = Vec::new();

    for value in resolved {
        match value {
            ResolvedValue::Constant(Value::Null) => {}
            ResolvedValue::Constant(Value::Array(items)) => {
                for item in items {
                    existing.push(LinkTarget::Existing(item));
                }
            }
            ResolvedValue::Constant(v) => existing.push(LinkTarget::Existing(v)),
            ResolvedValue::Reference(r) => {
                if r.is_data_source() {
                    // Read-only lookups are not created by this run.
                    continue;
                }
                if r.is_local_origin() {
                    return Err(format!(
                        "resource '{}' links '{}' through '{}'{}; \
                         local variables are not supported for linking",
                        source_address,
                        spec.link_attribute,
                        r.value,
                        r.module_address
                            .as_deref()
                            .map(|m| format!(" (in {})", m))
                            .unwrap_or_default(),
                    ));
                }
                let Some(base) = destination_base(&r.value, spec.dest_type) else {
                    continue;
                };
                let full = match &r.module_address {
                    Some(m) => format!("{}.{}", m, base),
                    None => base,
                };
                match out.logical_ids.get(&full) {
                    Some(lid) => {
                        if !generated.iter().any(|(_, existing_id)| existing_id == lid) {
                            generated.push((full, lid.clone()));
                        }
                    }
                    // Destination created outside this tool: keep the
                    // reference text as-is.
                    None => existing.push(LinkTarget::Existing(Value::String(r.value.clone()))),
                }
            }
        }
    }

    if generated.len() > 1 {
        let addresses: Vec<&str> = generated.iter().map(|(a, _)| a.as_str()).collect();
        return Err(format!(
            "resource '{}' resolves to multiple {} destinations: {}; \
             run 'terraform apply' and translate the applied plan instead",
            source_address,
            spec.dest_type,
            addresses.join(", ")
        ));
    }

    let mut targets: Vec<LinkTarget> = generated
        .into_iter()
        .map(|(_, lid)| LinkTarget::GeneratedId(lid))
        .collect();
    targets.extend(existing);
    Ok(targets)
}

/// `aws_lambda_layer_version.l[0].arn` → `aws_lambda_layer_version.l[0]`,
/// provided the reference is of the expected destination type.
fn destination_base(reference: &str, dest_type: &str) -> Option<String> {
    let rest = reference.strip_prefix(dest_type)?.strip_prefix('.')?;
    let name = match rest.find('.') {
        Some(dot) => &rest[..dot],
        None => rest,
    };
    if name.is_empty() {
        return None;
    }
    Some(format!("{}.{}", dest_type, name))
}

/// Merge targets into a list-valued field (e.g. `Layers`), keeping whatever
/// the translation pass already put there and skipping duplicates.
fn rewrite_list_field(resource: &mut TranslatedResource, field: &'static str, targets: &[LinkTarget]) {
    let mut items = match resource.properties.shift_remove(field) {
        Some(Value::Array(items)) => items,
        Some(Value::Null) | None => Vec::new(),
        Some(single) => vec![single],
    };
    for target in targets {
        let value = match target {
            LinkTarget::GeneratedId(id) => json!({ "Ref": id }),
            LinkTarget::Existing(v) => v.clone(),
        };
        if !items.contains(&value) {
            items.push(value);
        }
    }
    resource.properties.insert(field.to_string(), Value::Array(items));
}

/// Set a scalar field (e.g. `ApiId`) from the first resolved target.
/// Target order is deterministic: the generated destination (at most one,
/// enforced upstream) precedes existing references, which keep resolution
/// order.
fn rewrite_scalar_field(resource: &mut TranslatedResource, field: &'static str, targets: &[LinkTarget]) {
    let Some(target) = targets.first() else {
        return;
    };
    let value = match target {
        LinkTarget::GeneratedId(id) => json!({ "Ref": id }),
        LinkTarget::Existing(v) => v.clone(),
    };
    resource.properties.insert(field.to_string(), value);
}
