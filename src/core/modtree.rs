//! PU-003: Module tree construction from the configuration section.
//!
//! The tree is an index-based arena: nodes own nothing but plain data, the
//! parent link is an index, and traversal is either parent→child through the
//! `children` map or an explicit upward walk through `parent`. Built once per
//! translation run, immutable afterwards.

use super::expr::{parse_expression, Expression};
use super::types::{strip_index, ConfigModuleDecl, Configuration, RootVariable};
use indexmap::IndexMap;
use serde_json::Value;

pub type ModuleId = usize;

/// One module scope: variables, resources, outputs, child modules.
#[derive(Debug, Clone)]
pub struct Module {
    /// Full address ("module.a.module.b"); None for the root
    pub address: Option<String>,

    /// Enclosing module, for upward variable resolution
    pub parent: Option<ModuleId>,

    /// Variable name → bound expression (caller binding, default, or null)
    pub variables: IndexMap<String, Expression>,

    /// Local resource address → declared resource
    pub resources: IndexMap<String, ConfigResource>,

    /// Child module name → node
    pub children: IndexMap<String, ModuleId>,

    /// Output name → declared expression
    pub outputs: IndexMap<String, Expression>,
}

/// A declared resource inside one module scope.
#[derive(Debug, Clone)]
pub struct ConfigResource {
    /// Local address, e.g. `aws_lambda_function.f`
    pub address: String,

    /// Terraform resource type
    pub resource_type: String,

    /// Owning module
    pub module: ModuleId,

    /// Attribute name → declared expression
    pub attributes: IndexMap<String, Expression>,
}

impl ConfigResource {
    /// Full address, derivable from the owning module's address.
    pub fn full_address(&self, tree: &ModuleTree) -> String {
        match tree.node(self.module).address.as_deref() {
            Some(m) => format!("{}.{}", m, self.address),
            None => self.address.clone(),
        }
    }
}

/// The whole module tree. Root is always node 0.
#[derive(Debug, Clone)]
pub struct ModuleTree {
    nodes: Vec<Module>,
}

impl ModuleTree {
    /// Build the tree from the configuration section plus the externally
    /// supplied root input values. Pure transform; inputs are not mutated.
    pub fn build(
        configuration: &Configuration,
        root_values: &IndexMap<String, RootVariable>,
    ) -> ModuleTree {
        let mut root_bindings = IndexMap::new();
        for (name, var) in root_values {
            root_bindings.insert(name.clone(), Expression::Constant(var.value.clone()));
        }

        let mut tree = ModuleTree { nodes: Vec::new() };
        tree.build_module(&configuration.root_module, None, None, root_bindings);
        tree
    }

    fn build_module(
        &mut self,
        decl: &ConfigModuleDecl,
        address: Option<String>,
        parent: Option<ModuleId>,
        bindings: IndexMap<String, Expression>,
    ) -> ModuleId {
        let id = self.nodes.len();
        self.nodes.push(Module {
            address: address.clone(),
            parent,
            variables: IndexMap::new(),
            resources: IndexMap::new(),
            children: IndexMap::new(),
            outputs: IndexMap::new(),
        });

        // Variables: caller binding wins, then declared default, then null.
        for (name, var) in &decl.variables {
            let bound = match bindings.get(name) {
                Some(expr) => expr.clone(),
                None => match &var.default {
                    Some(default) => Expression::Constant(default.clone()),
                    None => Expression::Constant(Value::Null),
                },
            };
            self.nodes[id].variables.insert(name.clone(), bound);
        }

        // Resources: parse each declared attribute expression.
        for res in &decl.resources {
            let mut attributes = IndexMap::new();
            for (attr, raw) in &res.expressions {
                attributes.insert(attr.clone(), parse_expression(raw));
            }
            self.nodes[id].resources.insert(
                res.address.clone(),
                ConfigResource {
                    address: res.address.clone(),
                    resource_type: res.resource_type.clone(),
                    module: id,
                    attributes,
                },
            );
        }

        // Child modules: the call block's expressions become the child's
        // input bindings, evaluated later in this (the caller's) scope.
        for (name, call) in &decl.module_calls {
            let child_address = match &address {
                Some(a) => format!("{}.module.{}", a, name),
                None => format!("module.{}", name),
            };
            let mut child_bindings = IndexMap::new();
            for (var, raw) in &call.expressions {
                child_bindings.insert(var.clone(), parse_expression(raw));
            }
            let child = self.build_module(&call.module, Some(child_address), Some(id), child_bindings);
            self.nodes[id].children.insert(name.clone(), child);
        }

        // Outputs last; they may reference anything above.
        for (name, out) in &decl.outputs {
            let expr = parse_expression(&out.expression);
            self.nodes[id].outputs.insert(name.clone(), expr);
        }

        id
    }

    pub fn root(&self) -> ModuleId {
        0
    }

    pub fn node(&self, id: ModuleId) -> &Module {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Locate a module node by its full address ("module.a.module.b").
    /// count/for_each instance addresses ("module.a[0]") collapse onto the one
    /// declared module. A missing module is a plan-document inconsistency,
    /// not a user error.
    pub fn find_module(&self, address: Option<&str>) -> Result<ModuleId, String> {
        let Some(address) = address else {
            return Ok(self.root());
        };
        let mut current = self.root();
        let mut segments = address.split('.');
        loop {
            match (segments.next(), segments.next()) {
                (None, _) => return Ok(current),
                (Some("module"), Some(name)) if !name.is_empty() => {
                    let name = strip_index(name);
                    current = *self.node(current).children.get(name).ok_or_else(|| {
                        format!(
                            "plan references module '{}' but configuration does not declare it",
                            address
                        )
                    })?;
                }
                _ => return Err(format!("malformed module address '{}'", address)),
            }
        }
    }

    /// Look up a declared resource by its local address within a module.
    pub fn resource(&self, module: ModuleId, local_address: &str) -> Option<&ConfigResource> {
        self.node(module).resources.get(local_address)
    }
}
