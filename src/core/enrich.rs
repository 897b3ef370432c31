//! PU-008: Metadata enrichment from sam-metadata annotations, plus build-rule
//! synthesis.
//!
//! Annotations are matched to translated resources by explicit name or by a
//! BLAKE3 content hash of the shared build-artifact path. A match flips the
//! resource to independently-buildable and yields one Makefile rule whose
//! script argument is a jq path locating the artifact inside the plan
//! document, built by walking the enclosing module chain from the root.

use super::expr::ResolvedValue;
use super::logical_id::logical_id;
use super::modtree::ModuleTree;
use super::resolver::resolve_resource_attribute;
use super::translate::{artifact_hash, TranslationOutput};
use super::types::*;
use serde_json::{json, Value};

/// One synthesized Makefile rule.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildRule {
    pub logical_id: String,

    /// jq expression locating the artifact path in `terraform show -json`
    pub expression: String,
}

/// Expected translation of one annotation's declared resource_type trigger.
struct ExpectedShape {
    target_type: &'static str,
    package_type: Option<&'static str>,
}

fn expected_shape(annotation: &AnnotationResource, trigger: &str) -> Result<ExpectedShape, String> {
    match trigger {
        "ZIP_LAMBDA_FUNCTION" => Ok(ExpectedShape {
            target_type: "AWS::Lambda::Function",
            package_type: Some("Zip"),
        }),
        "IMAGE_LAMBDA_FUNCTION" => Ok(ExpectedShape {
            target_type: "AWS::Lambda::Function",
            package_type: Some("Image"),
        }),
        "LAMBDA_LAYER" => Ok(ExpectedShape {
            target_type: "AWS::Lambda::LayerVersion",
            package_type: None,
        }),
        other => Err(format!(
            "sam metadata resource '{}' declares unknown resource_type '{}'",
            annotation.address, other
        )),
    }
}

/// Apply every collected annotation, consuming the collection, and return the
/// synthesized build rules in annotation order.
pub fn enrich(
    tree: &ModuleTree,
    out: &mut TranslationOutput,
    project_root: &str,
    build_dir: &str,
) -> Result<Vec<BuildRule>, String> {
    let annotations = std::mem::take(&mut out.annotations);
    let mut rules = Vec::new();

    for annotation in &annotations {
        let trigger = annotation.trigger_str("resource_type").ok_or_else(|| {
            format!(
                "sam metadata resource '{}' is missing the 'resource_type' trigger",
                annotation.address
            )
        })?;
        let expected = expected_shape(annotation, trigger)?;
        let matches = locate_matches(tree, out, annotation)?;

        let context_path = annotation
            .trigger_str("docker_context")
            .or_else(|| annotation.trigger_str("original_source_code"))
            .map(str::to_string);

        for lid in &matches {
            let resource = out
                .resources
                .get_mut(lid)
                .ok_or_else(|| format!("translated resource '{}' vanished mid-pass", lid))?;
            validate_shape(annotation, trigger, &expected, resource)?;

            resource
                .metadata
                .insert(METADATA_SKIP_BUILD.to_string(), json!(false));
            resource
                .metadata
                .insert(METADATA_BUILD_METHOD.to_string(), json!("makefile"));
            if let Some(path) = &context_path {
                resource
                    .metadata
                    .insert(METADATA_CONTEXT_PATH.to_string(), json!(path));
            }
            resource
                .metadata
                .insert(METADATA_WORKING_DIR.to_string(), json!(build_dir));
            resource
                .metadata
                .insert(METADATA_PROJECT_ROOT.to_string(), json!(project_root));

            rules.push(BuildRule {
                logical_id: lid.clone(),
                expression: artifact_expression(annotation),
            });
        }
    }

    Ok(rules)
}

/// Logical IDs of the resources this annotation enriches: the explicitly
/// named one, or every resource sharing the annotation's artifact key.
fn locate_matches(
    tree: &ModuleTree,
    out: &TranslationOutput,
    annotation: &AnnotationResource,
) -> Result<Vec<String>, String> {
    if let Some(name) = annotation.trigger_str("resource_name") {
        let full = match &annotation.module_address {
            Some(m) => format!("{}.{}", m, name),
            None => name.to_string(),
        };
        let lid = logical_id(&full);
        if out.resources.contains_key(&lid) {
            return Ok(vec![lid]);
        }
        // count/for_each instances carry the index in their planned address.
        let indexed: Vec<String> = out
            .logical_ids
            .iter()
            .filter(|(address, _)| strip_index(address) == full)
            .map(|(_, lid)| lid.clone())
            .collect();
        if indexed.is_empty() {
            return Err(format!(
                "sam metadata resource '{}' names resource '{}', but no translated resource matches it",
                annotation.address, full
            ));
        }
        return Ok(indexed);
    }

    let keys = annotation_artifact_keys(tree, annotation)?;
    for key in &keys {
        if let Some(lids) = out.artifact_index.get(&artifact_hash(key)) {
            return Ok(lids.clone());
        }
    }
    Err(format!(
        "sam metadata resource '{}': no translated resource uses build artifact '{}'",
        annotation.address, keys[0]
    ))
}

/// Candidate join keys for the annotation's artifact: the materialized
/// trigger path first, then constant or reference values the resolver can
/// trace through the declared triggers expression.
fn annotation_artifact_keys(
    tree: &ModuleTree,
    annotation: &AnnotationResource,
) -> Result<Vec<String>, String> {
    if let Some(path) = annotation.trigger_str("built_output_path") {
        return Ok(vec![path.to_string()]);
    }

    let module = tree.find_module(annotation.module_address.as_deref())?;
    let config = tree
        .resource(module, &annotation.local_address)
        .ok_or_else(|| {
            format!(
                "sam metadata resource '{}' has no configuration declaration",
                annotation.address
            )
        })?;
    let mut keys = Vec::new();
    for value in resolve_resource_attribute(tree, config, "triggers")? {
        match value {
            ResolvedValue::Constant(Value::Object(map)) => {
                if let Some(path) = map.get("built_output_path").and_then(Value::as_str) {
                    keys.push(path.to_string());
                }
            }
            ResolvedValue::Reference(r) if !r.is_local_origin() => keys.push(r.qualified()),
            _ => {}
        }
    }
    if keys.is_empty() {
        return Err(format!(
            "sam metadata resource '{}' has no resolvable 'built_output_path' trigger",
            annotation.address
        ));
    }
    Ok(keys)
}

fn validate_shape(
    annotation: &AnnotationResource,
    trigger: &str,
    expected: &ExpectedShape,
    resource: &TranslatedResource,
) -> Result<(), String> {
    if resource.resource_type != expected.target_type {
        return Err(format!(
            "sam metadata resource '{}' declares '{}', but resource '{}' translated to '{}'",
            annotation.address, trigger, resource.source_address, resource.resource_type
        ));
    }
    if let Some(mode) = expected.package_type {
        let actual = resource
            .properties
            .get("PackageType")
            .and_then(Value::as_str)
            .unwrap_or("Zip");
        if actual != mode {
            return Err(format!(
                "sam metadata resource '{}' declares '{}' (package type {}), \
                 but resource '{}' is packaged as {}",
                annotation.address, trigger, mode, resource.source_address, actual
            ));
        }
    }
    Ok(())
}

/// jq expression locating this annotation's `built_output_path` inside the
/// plan document, descending the module chain from the root.
fn artifact_expression(annotation: &AnnotationResource) -> String {
    let mut expr = String::from(".planned_values.root_module");
    for prefix in module_chain(annotation.module_address.as_deref()) {
        expr.push_str(&format!(
            " | .child_modules[] | select(.address == \"{}\")",
            prefix
        ));
    }
    expr.push_str(&format!(
        " | .resources[] | select(.address == \"{}\") | .values.triggers.built_output_path",
        annotation.address
    ));
    expr
}

/// Progressive prefixes of a module address:
/// `module.a.module.b` → `["module.a", "module.a.module.b"]`.
fn module_chain(address: Option<&str>) -> Vec<String> {
    let Some(address) = address else {
        return Vec::new();
    };
    let parts: Vec<&str> = address.split('.').collect();
    parts
        .chunks(2)
        .scan(String::new(), |acc, pair| {
            if !acc.is_empty() {
                acc.push('.');
            }
            acc.push_str(&pair.join("."));
            Some(acc.clone())
        })
        .collect()
}
