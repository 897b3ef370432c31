//! PU-010: The translation pipeline — build tree, translate, link, enrich,
//! validate, assemble.
//!
//! One synchronous run per invocation; every map and tree is built fresh and
//! discarded at the end. Any error aborts the whole run before anything is
//! written, so callers never see partial output.

use super::enrich::{enrich, BuildRule};
use super::link::{link_pass, LinkSpec};
use super::modtree::ModuleTree;
use super::translate::{check_unresolved_artifacts, translate, TranslatorRegistry};
use super::types::{Template, TerraformPlan};

/// Caller-supplied paths recorded into enriched build metadata.
#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings<'a> {
    /// Root of the terraform project (where `terraform show` runs)
    pub project_root: &'a str,

    /// Directory the build artifacts land in
    pub build_dir: &'a str,
}

/// Run the whole translate→link→enrich sequence over one plan document.
///
/// The registry and link specs are passed in explicitly; there is no
/// process-global state to populate.
pub fn run_pipeline(
    plan: &TerraformPlan,
    registry: &TranslatorRegistry,
    link_specs: &[LinkSpec],
    settings: PipelineSettings<'_>,
) -> Result<(Template, Vec<BuildRule>), String> {
    let tree = ModuleTree::build(&plan.configuration, &plan.variables);
    let mut out = translate(plan, &tree, registry)?;

    for spec in link_specs {
        link_pass(spec, &tree, &mut out)?;
    }

    let rules = enrich(&tree, &mut out, settings.project_root, settings.build_dir)?;
    check_unresolved_artifacts(&out)?;

    Ok((Template::from_resources(&out.resources), rules))
}
