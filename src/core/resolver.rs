//! PU-004: Scope-aware reference resolution.
//!
//! Walks declared expressions to concrete values or sibling-resource pointers:
//! `var.X` climbs into the caller's scope through the module's bindings,
//! `module.N.OUT` descends into a child module's output expression,
//! `local.X` is surfaced as a local-origin pointer (unsupported for linking),
//! and bare `TYPE.NAME[.ATTR]` becomes a pointer at a sibling resource.
//! A missing attribute is an empty result, never an error.

use super::expr::{Expression, ResolvedReference, ResolvedValue};
use super::modtree::{ConfigResource, ModuleId, ModuleTree};
use super::types::strip_index;

/// Resolve one attribute of a declared resource.
pub fn resolve_resource_attribute(
    tree: &ModuleTree,
    resource: &ConfigResource,
    attribute: &str,
) -> Result<Vec<ResolvedValue>, String> {
    match resource.attributes.get(attribute) {
        Some(expr) => resolve_expression(tree, resource.module, expr),
        None => Ok(Vec::new()),
    }
}

/// Resolve one output of a module.
pub fn resolve_module_output(
    tree: &ModuleTree,
    module: ModuleId,
    output: &str,
) -> Result<Vec<ResolvedValue>, String> {
    match tree.node(module).outputs.get(output) {
        Some(expr) => resolve_expression(tree, module, expr),
        None => Ok(Vec::new()),
    }
}

/// Resolve an expression in the scope of `ctx`.
pub fn resolve_expression(
    tree: &ModuleTree,
    ctx: ModuleId,
    expr: &Expression,
) -> Result<Vec<ResolvedValue>, String> {
    match expr {
        Expression::Constant(v) => Ok(vec![ResolvedValue::Constant(v.clone())]),
        // Idempotent: an already-resolved reference passes through unchanged.
        Expression::Resolved(r) => Ok(vec![ResolvedValue::Reference(r.clone())]),
        Expression::References(refs) => {
            let mut out = Vec::new();
            for reference in dedup_references(refs) {
                out.extend(resolve_reference(tree, ctx, &reference)?);
            }
            Ok(out)
        }
    }
}

fn resolve_reference(
    tree: &ModuleTree,
    ctx: ModuleId,
    reference: &str,
) -> Result<Vec<ResolvedValue>, String> {
    if let Some(rest) = reference.strip_prefix("var.") {
        return resolve_variable(tree, ctx, leading_name(rest));
    }

    if reference.starts_with("local.") {
        // Local values cannot be traced offline; tag with the owning module
        // so linking passes can name the scope in their diagnostics.
        let module_address = tree.node(ctx).address.clone();
        return Ok(vec![ResolvedValue::Reference(ResolvedReference::new(
            reference, module_address,
        ))]);
    }

    if reference.starts_with("module.") {
        return resolve_module_reference(tree, ctx, reference);
    }

    // Bare TYPE.NAME[.ATTR] — a sibling-resource pointer, scoped to the
    // current module (unscoped when resolved in the root).
    let module_address = tree.node(ctx).address.clone();
    Ok(vec![ResolvedValue::Reference(ResolvedReference::new(
        reference, module_address,
    ))])
}

fn resolve_variable(
    tree: &ModuleTree,
    ctx: ModuleId,
    name: &str,
) -> Result<Vec<ResolvedValue>, String> {
    let Some(expr) = tree.node(ctx).variables.get(name) else {
        return Ok(Vec::new());
    };
    // The bound expression came from the caller's module-call block, so any
    // references inside it live in the parent's scope.
    let caller = tree.node(ctx).parent.unwrap_or(ctx);
    resolve_expression(tree, caller, expr)
}

fn resolve_module_reference(
    tree: &ModuleTree,
    ctx: ModuleId,
    reference: &str,
) -> Result<Vec<ResolvedValue>, String> {
    let mut parts = reference.splitn(3, '.');
    let _ = parts.next(); // "module"
    let name = parts.next().unwrap_or("");
    let output = parts.next().unwrap_or("");
    if name.is_empty() || output.is_empty() {
        return Err(format!("malformed module reference '{}'", reference));
    }
    let name = strip_index(name);
    let output = leading_name(output);

    let child = *tree.node(ctx).children.get(name).ok_or_else(|| {
        format!(
            "reference '{}' names child module '{}', but it is not declared",
            reference, name
        )
    })?;
    resolve_module_output(tree, child, output)
}

/// Collapse overlapping reference forms to the most specific one:
/// of `a[0].arn`, `a[0]` and `a`, only `a[0].arn` survives. A reference is
/// dropped when another reference in the set extends it.
pub fn dedup_references(refs: &[String]) -> Vec<String> {
    refs.iter()
        .filter(|r| {
            !refs.iter().any(|other| {
                other.len() > r.len()
                    && other.starts_with(r.as_str())
                    && matches!(other.as_bytes()[r.len()], b'.' | b'[')
            })
        })
        .cloned()
        .collect()
}

/// First path segment of a reference tail: `name[0].attr` → `name`.
fn leading_name(s: &str) -> &str {
    let end = s.find(['.', '[']).unwrap_or(s.len());
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::TerraformPlan;
    use serde_json::json;

    fn tree_from(config: serde_json::Value, variables: serde_json::Value) -> ModuleTree {
        let plan: TerraformPlan = serde_json::from_value(json!({
            "planned_values": {"root_module": {}},
            "configuration": config,
            "variables": variables,
        }))
        .unwrap();
        ModuleTree::build(&plan.configuration, &plan.variables)
    }

    #[test]
    fn test_pu004_dedup_prefix_forms() {
        let refs = vec![
            "aws_lambda_layer_version.l[0].arn".to_string(),
            "aws_lambda_layer_version.l[0]".to_string(),
            "aws_lambda_layer_version.l".to_string(),
        ];
        assert_eq!(
            dedup_references(&refs),
            vec!["aws_lambda_layer_version.l[0].arn".to_string()]
        );
    }

    #[test]
    fn test_pu004_dedup_keeps_distinct_roots() {
        let refs = vec![
            "aws_lambda_layer_version.one.arn".to_string(),
            "aws_lambda_layer_version.one".to_string(),
            "aws_lambda_layer_version.two.arn".to_string(),
        ];
        let kept = dedup_references(&refs);
        assert_eq!(kept.len(), 2);
        assert!(kept.contains(&"aws_lambda_layer_version.one.arn".to_string()));
        assert!(kept.contains(&"aws_lambda_layer_version.two.arn".to_string()));
    }

    #[test]
    fn test_pu004_dedup_no_false_prefix() {
        // "ab" is not an extension of "a" at a path boundary
        let refs = vec!["var.a".to_string(), "var.ab".to_string()];
        assert_eq!(dedup_references(&refs).len(), 2);
    }

    #[test]
    fn test_pu004_constant_passthrough() {
        let tree = tree_from(
            json!({"root_module": {"resources": [{
                "address": "aws_lambda_function.f",
                "type": "aws_lambda_function",
                "expressions": {"timeout": {"constant_value": 30}}
            }]}}),
            json!({}),
        );
        let r = tree.resource(tree.root(), "aws_lambda_function.f").unwrap();
        let got = resolve_resource_attribute(&tree, r, "timeout").unwrap();
        assert_eq!(got, vec![ResolvedValue::Constant(json!(30))]);
    }

    #[test]
    fn test_pu004_missing_attribute_is_empty() {
        let tree = tree_from(
            json!({"root_module": {"resources": [{
                "address": "aws_lambda_function.f",
                "type": "aws_lambda_function",
                "expressions": {}
            }]}}),
            json!({}),
        );
        let r = tree.resource(tree.root(), "aws_lambda_function.f").unwrap();
        assert!(resolve_resource_attribute(&tree, r, "filename").unwrap().is_empty());
    }

    #[test]
    fn test_pu004_variable_from_root_value() {
        let tree = tree_from(
            json!({"root_module": {
                "variables": {"code_path": {"default": "fallback.zip"}},
                "resources": [{
                    "address": "aws_lambda_function.f",
                    "type": "aws_lambda_function",
                    "expressions": {"filename": {"references": ["var.code_path"]}}
                }]
            }}),
            json!({"code_path": {"value": "supplied.zip"}}),
        );
        let r = tree.resource(tree.root(), "aws_lambda_function.f").unwrap();
        let got = resolve_resource_attribute(&tree, r, "filename").unwrap();
        assert_eq!(got, vec![ResolvedValue::Constant(json!("supplied.zip"))]);
    }

    #[test]
    fn test_pu004_variable_climbs_to_parent_scope() {
        // Child's var.fn_zip is bound to the caller's var.root_zip, which the
        // root resolves from its own default.
        let tree = tree_from(
            json!({"root_module": {
                "variables": {"root_zip": {"default": "from-root.zip"}},
                "module_calls": {"app": {
                    "expressions": {"fn_zip": {"references": ["var.root_zip"]}},
                    "module": {
                        "variables": {"fn_zip": {}},
                        "resources": [{
                            "address": "aws_lambda_function.f",
                            "type": "aws_lambda_function",
                            "expressions": {"filename": {"references": ["var.fn_zip"]}}
                        }]
                    }
                }}
            }}),
            json!({}),
        );
        let app = tree.find_module(Some("module.app")).unwrap();
        let r = tree.resource(app, "aws_lambda_function.f").unwrap();
        let got = resolve_resource_attribute(&tree, r, "filename").unwrap();
        assert_eq!(got, vec![ResolvedValue::Constant(json!("from-root.zip"))]);
    }

    #[test]
    fn test_pu004_undeclared_variable_is_empty() {
        let tree = tree_from(
            json!({"root_module": {"resources": [{
                "address": "aws_lambda_function.f",
                "type": "aws_lambda_function",
                "expressions": {"filename": {"references": ["var.ghost"]}}
            }]}}),
            json!({}),
        );
        let r = tree.resource(tree.root(), "aws_lambda_function.f").unwrap();
        assert!(resolve_resource_attribute(&tree, r, "filename").unwrap().is_empty());
    }

    #[test]
    fn test_pu004_local_reference_tagged_with_module() {
        let tree = tree_from(
            json!({"root_module": {"module_calls": {"app": {"module": {
                "resources": [{
                    "address": "aws_lambda_function.f",
                    "type": "aws_lambda_function",
                    "expressions": {"layers": {"references": ["local.layer_arn"]}}
                }]
            }}}}}),
            json!({}),
        );
        let app = tree.find_module(Some("module.app")).unwrap();
        let r = tree.resource(app, "aws_lambda_function.f").unwrap();
        let got = resolve_resource_attribute(&tree, r, "layers").unwrap();
        match &got[0] {
            ResolvedValue::Reference(r) => {
                assert!(r.is_local_origin());
                assert_eq!(r.module_address.as_deref(), Some("module.app"));
            }
            other => panic!("expected reference, got {:?}", other),
        }
    }

    #[test]
    fn test_pu004_module_output_chain() {
        // Function references module.layers.arn, whose output points at a
        // layer resource declared inside that child module.
        let tree = tree_from(
            json!({"root_module": {
                "resources": [{
                    "address": "aws_lambda_function.f",
                    "type": "aws_lambda_function",
                    "expressions": {"layers": {"references": ["module.layers.arn", "module.layers"]}}
                }],
                "module_calls": {"layers": {"module": {
                    "resources": [{
                        "address": "aws_lambda_layer_version.l",
                        "type": "aws_lambda_layer_version",
                        "expressions": {}
                    }],
                    "outputs": {"arn": {"expression":
                        {"references": ["aws_lambda_layer_version.l.arn", "aws_lambda_layer_version.l"]}}}
                }}}
            }}),
            json!({}),
        );
        let r = tree.resource(tree.root(), "aws_lambda_function.f").unwrap();
        let got = resolve_resource_attribute(&tree, r, "layers").unwrap();
        assert_eq!(
            got,
            vec![ResolvedValue::Reference(ResolvedReference::new(
                "aws_lambda_layer_version.l.arn",
                Some("module.layers".to_string()),
            ))]
        );
    }

    #[test]
    fn test_pu004_missing_child_module_is_error() {
        let tree = tree_from(
            json!({"root_module": {"resources": [{
                "address": "aws_lambda_function.f",
                "type": "aws_lambda_function",
                "expressions": {"layers": {"references": ["module.ghost.arn"]}}
            }]}}),
            json!({}),
        );
        let r = tree.resource(tree.root(), "aws_lambda_function.f").unwrap();
        let err = resolve_resource_attribute(&tree, r, "layers").unwrap_err();
        assert!(err.contains("ghost"));
        assert!(err.contains("not declared"));
    }

    #[test]
    fn test_pu004_malformed_module_reference() {
        let tree = tree_from(
            json!({"root_module": {"resources": [{
                "address": "aws_lambda_function.f",
                "type": "aws_lambda_function",
                "expressions": {"layers": {"references": ["module.only_name"]}}
            }]}}),
            json!({}),
        );
        let r = tree.resource(tree.root(), "aws_lambda_function.f").unwrap();
        let err = resolve_resource_attribute(&tree, r, "layers").unwrap_err();
        assert!(err.contains("malformed"));
    }

    #[test]
    fn test_pu004_sibling_reference_unscoped_in_root() {
        let tree = tree_from(
            json!({"root_module": {"resources": [{
                "address": "aws_lambda_function.f",
                "type": "aws_lambda_function",
                "expressions": {"layers": {"references":
                    ["aws_lambda_layer_version.l.arn", "aws_lambda_layer_version.l"]}}
            }]}}),
            json!({}),
        );
        let r = tree.resource(tree.root(), "aws_lambda_function.f").unwrap();
        let got = resolve_resource_attribute(&tree, r, "layers").unwrap();
        assert_eq!(
            got,
            vec![ResolvedValue::Reference(ResolvedReference::new(
                "aws_lambda_layer_version.l.arn",
                None,
            ))]
        );
    }

    #[test]
    fn test_pu004_resolved_is_idempotent() {
        let tree = tree_from(json!({"root_module": {}}), json!({}));
        let resolved = Expression::Resolved(ResolvedReference::new(
            "aws_lambda_layer_version.l.arn",
            Some("module.x".to_string()),
        ));
        let once = resolve_expression(&tree, tree.root(), &resolved).unwrap();
        assert_eq!(
            once,
            vec![ResolvedValue::Reference(ResolvedReference::new(
                "aws_lambda_layer_version.l.arn",
                Some("module.x".to_string()),
            ))]
        );
    }
}
