//! Puente — bridge Terraform plans to serverless templates.
//!
//! Reads `terraform show -json` output, resolves cross-module references,
//! and emits a CloudFormation-shaped template plus the Makefile build rules
//! that extract local build artifacts from the plan.

pub mod cli;
pub mod core;
