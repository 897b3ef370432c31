//! PU-011: CLI subcommands — translate, validate.

use crate::core::emit::{self, TemplateFormat};
use crate::core::link::standard_link_specs;
use crate::core::modtree::ModuleTree;
use crate::core::pipeline::{run_pipeline, PipelineSettings};
use crate::core::translate::{translate, TranslatorRegistry};
use crate::core::types::TerraformPlan;
use clap::Subcommand;
use std::path::{Path, PathBuf};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Translate a terraform plan into a serverless template plus build files
    Translate {
        /// Path to the `terraform show -json` output
        #[arg(short, long, default_value = "plan.json")]
        plan: PathBuf,

        /// Output directory for template and build files
        #[arg(short, long, default_value = ".puente")]
        output_dir: PathBuf,

        /// Template format: json or yaml
        #[arg(long, default_value = "json")]
        format: String,

        /// Terraform project root (default: the plan file's directory)
        #[arg(long)]
        project_root: Option<PathBuf>,
    },

    /// Inspect a plan file and report what would be translated
    Validate {
        /// Path to the `terraform show -json` output
        #[arg(short, long, default_value = "plan.json")]
        plan: PathBuf,
    },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Translate {
            plan,
            output_dir,
            format,
            project_root,
        } => cmd_translate(&plan, &output_dir, &format, project_root.as_deref()),
        Commands::Validate { plan } => cmd_validate(&plan),
    }
}

/// Parse a plan document from disk.
pub fn parse_plan_file(path: &Path) -> Result<TerraformPlan, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    serde_json::from_str(&content)
        .map_err(|e| format!("plan parse error in {}: {}", path.display(), e))
}

fn cmd_translate(
    plan_path: &Path,
    output_dir: &Path,
    format: &str,
    project_root: Option<&Path>,
) -> Result<(), String> {
    let format = TemplateFormat::from_name(format)?;
    let plan = parse_plan_file(plan_path)?;

    let project_root = match project_root {
        Some(p) => p.to_path_buf(),
        None => default_project_root(plan_path),
    };
    let project_root = project_root.to_string_lossy();
    let build_dir = output_dir.to_string_lossy();
    let settings = PipelineSettings {
        project_root: &project_root,
        build_dir: &build_dir,
    };

    let (template, rules) = run_pipeline(
        &plan,
        &TranslatorRegistry::standard(),
        &standard_link_specs(),
        settings,
    )?;
    emit::write_outputs(&template, &rules, output_dir, format)?;

    println!(
        "Translated {} resource(s), {} buildable",
        template.resources.len(),
        rules.len()
    );
    println!("  Wrote: {}", output_dir.join(format.file_name()).display());
    println!("  Wrote: {}", output_dir.join("Makefile").display());
    Ok(())
}

/// The plan file's directory; a bare file name has an empty parent, which
/// must not leak into recorded metadata paths.
fn default_project_root(plan_path: &Path) -> PathBuf {
    match plan_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn cmd_validate(plan_path: &Path) -> Result<(), String> {
    let plan = parse_plan_file(plan_path)?;
    let tree = ModuleTree::build(&plan.configuration, &plan.variables);
    let out = translate(&plan, &tree, &TranslatorRegistry::standard())?;

    println!(
        "OK: {} module(s), {} translatable resource(s), {} annotation(s)",
        tree.len(),
        out.resources.len(),
        out.annotations.len()
    );
    println!(
        "  Skipped: {} data source(s), {} other-provider, {} unsupported type(s)",
        out.skipped.data_sources, out.skipped.other_provider, out.skipped.unsupported_type
    );
    Ok(())
}
