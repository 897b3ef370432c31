//! PU-009: Output artifact emission — template document, Makefile, companion
//! extraction script, and the backend override pinning local state.
//!
//! Nothing here runs before the whole translate→link→enrich sequence has
//! succeeded, so a failed run never leaves a partial document behind.

use super::enrich::BuildRule;
use super::types::Template;
use std::path::Path;

/// Template serialization format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateFormat {
    Json,
    Yaml,
}

impl TemplateFormat {
    pub fn from_name(name: &str) -> Result<Self, String> {
        match name {
            "json" => Ok(TemplateFormat::Json),
            "yaml" => Ok(TemplateFormat::Yaml),
            other => Err(format!("unknown template format '{}' (json or yaml)", other)),
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            TemplateFormat::Json => "template.json",
            TemplateFormat::Yaml => "template.yaml",
        }
    }
}

/// Companion script invoked by every synthesized Makefile target.
pub const EXTRACT_SCRIPT_NAME: &str = "extract_artifact.sh";

pub const EXTRACT_SCRIPT: &str = r#"#!/bin/sh
# Copy a terraform-built artifact into the build directory.
# The expression is a jq path over `terraform show -json` output.
set -eu

EXPRESSION=""
DIRECTORY=""
while [ $# -gt 0 ]; do
    case "$1" in
        --expression) EXPRESSION="$2"; shift 2 ;;
        --directory) DIRECTORY="$2"; shift 2 ;;
        *) echo "unknown option: $1" >&2; exit 2 ;;
    esac
done
if [ -z "$EXPRESSION" ] || [ -z "$DIRECTORY" ]; then
    echo "usage: extract_artifact.sh --expression <jq-path> --directory <dest>" >&2
    exit 2
fi

ARTIFACT=$(terraform show -json | jq -r "$EXPRESSION")
if [ -z "$ARTIFACT" ] || [ "$ARTIFACT" = "null" ]; then
    echo "artifact path not found in plan output" >&2
    exit 1
fi

mkdir -p "$DIRECTORY"
if [ -d "$ARTIFACT" ]; then
    cp -R "$ARTIFACT"/. "$DIRECTORY"/
else
    cp "$ARTIFACT" "$DIRECTORY"/
fi
"#;

/// Override file pinning terraform state to a throwaway location while the
/// synthesized build targets run `terraform show`.
pub const BACKEND_OVERRIDE_NAME: &str = "z_puente_backend_override.tf";

pub const BACKEND_OVERRIDE: &str = r#"terraform {
  backend "local" {
    path = "./.puente/terraform.tfstate"
  }
}
"#;

/// Render the Makefile: one `build-<LogicalId>` target per rule.
pub fn render_makefile(rules: &[BuildRule]) -> String {
    let mut out = String::from("# Generated by puente. One target per independently buildable resource.\n");
    for rule in rules {
        out.push_str(&format!(
            "\nbuild-{}:\n\tsh ./{} --expression '{}' --directory \"$(ARTIFACTS_DIR)\"\n",
            rule.logical_id, EXTRACT_SCRIPT_NAME, rule.expression
        ));
    }
    out
}

/// Render the template document in the requested format.
pub fn render_template(template: &Template, format: TemplateFormat) -> Result<String, String> {
    match format {
        TemplateFormat::Json => serde_json::to_string_pretty(template)
            .map(|s| s + "\n")
            .map_err(|e| format!("cannot serialize template: {}", e)),
        TemplateFormat::Yaml => serde_yaml_ng::to_string(template)
            .map_err(|e| format!("cannot serialize template: {}", e)),
    }
}

/// Write every output artifact into `dir`, the template last.
pub fn write_outputs(
    template: &Template,
    rules: &[BuildRule],
    dir: &Path,
    format: TemplateFormat,
) -> Result<(), String> {
    std::fs::create_dir_all(dir)
        .map_err(|e| format!("cannot create output directory {}: {}", dir.display(), e))?;

    write_file(&dir.join("Makefile"), &render_makefile(rules))?;
    write_file(&dir.join(EXTRACT_SCRIPT_NAME), EXTRACT_SCRIPT)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let script = dir.join(EXTRACT_SCRIPT_NAME);
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
            .map_err(|e| format!("cannot chmod {}: {}", script.display(), e))?;
    }
    write_file(&dir.join(BACKEND_OVERRIDE_NAME), BACKEND_OVERRIDE)?;

    write_file(&dir.join(format.file_name()), &render_template(template, format)?)
}

fn write_file(path: &Path, content: &str) -> Result<(), String> {
    std::fs::write(path, content).map_err(|e| format!("cannot write {}: {}", path.display(), e))
}
