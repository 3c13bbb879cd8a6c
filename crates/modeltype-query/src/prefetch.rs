//! Prefetch trees and their flattening into eager-load paths.
//!
//! A prefetch tree names related objects to load alongside each row:
//!
//! ```json
//! "parent"
//! ["parent", "one_to_one_target"]
//! {"parent": {"parent": "name"}}
//! ```
//!
//! Flattening walks the tree against the model registry and yields
//! `__`-joined paths (`parent__parent__name`). Leaves naming nothing on the
//! current model are dropped, while a mapping key naming nothing is an error.

use std::collections::BTreeMap;

use modeltype_core::{ModelTypeError, ModelTypeResult};
use modeltype_db::lookups::LOOKUP_SEP;
use modeltype_db::{Field, ModelDef, ModelRegistry};
use serde::{Deserialize, Serialize};

/// A nested description of related objects to load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrefetchTree {
    /// A single field or property name.
    Field(String),
    /// Several sibling names.
    Fields(Vec<String>),
    /// Relation names mapped to the tree to load on the related model.
    Nested(BTreeMap<String, PrefetchTree>),
}

impl PrefetchTree {
    /// Creates a one-level mapping `{relation: subtree}`.
    pub fn nested(relation: impl Into<String>, subtree: Self) -> Self {
        Self::Nested(BTreeMap::from([(relation.into(), subtree)]))
    }
}

impl From<&str> for PrefetchTree {
    fn from(name: &str) -> Self {
        Self::Field(name.to_string())
    }
}

/// Flattens prefetch trees against a model registry.
#[derive(Debug, Clone, Copy)]
pub struct PrefetchTreeResolver<'a> {
    registry: &'a ModelRegistry,
}

impl<'a> PrefetchTreeResolver<'a> {
    /// Creates a resolver over `registry`.
    pub const fn new(registry: &'a ModelRegistry) -> Self {
        Self { registry }
    }

    /// Flattens `tree` rooted at `model` into eager-load paths.
    ///
    /// Returns `None` when nothing in the tree resolves, so callers can tell
    /// an empty result apart from no prefetch at all.
    ///
    /// # Errors
    ///
    /// Returns `FieldDoesNotExist` when a mapping key names no field on the
    /// model reached so far, and `BadRequest` when it names a field that is
    /// not a relation.
    pub fn flatten(&self, tree: &PrefetchTree, model: &str) -> ModelTypeResult<Option<Vec<String>>> {
        let model = self.registry.model(model)?;
        let mut paths = Vec::new();
        self.flatten_into(tree, model, "", &mut paths)?;
        tracing::debug!(model = %model.name, paths = ?paths, "Flattened prefetch tree");
        Ok(if paths.is_empty() { None } else { Some(paths) })
    }

    fn flatten_into(
        &self,
        tree: &PrefetchTree,
        model: &ModelDef,
        prefix: &str,
        paths: &mut Vec<String>,
    ) -> ModelTypeResult<()> {
        match tree {
            PrefetchTree::Field(name) => {
                if let Some(path) = Self::leaf(model, prefix, name) {
                    paths.push(path);
                }
            }
            PrefetchTree::Fields(names) => {
                paths.extend(names.iter().filter_map(|name| Self::leaf(model, prefix, name)));
            }
            PrefetchTree::Nested(children) => {
                for (relation, subtree) in children {
                    let field = model.get_field(relation).ok_or_else(|| {
                        ModelTypeError::FieldDoesNotExist(format!(
                            "{} has no field named '{relation}'",
                            model.name
                        ))
                    })?;
                    if field.is_many_to_many() {
                        tracing::trace!(model = %model.name, field = %relation, "Skipping many-to-many prefetch");
                        continue;
                    }
                    let related = field.related_model().ok_or_else(|| {
                        ModelTypeError::BadRequest(format!(
                            "Cannot prefetch through '{relation}' on {}: not a relation",
                            model.name
                        ))
                    })?;
                    let related = self.registry.model(related)?;
                    let prefix = format!("{prefix}{relation}{LOOKUP_SEP}");
                    self.flatten_into(subtree, related, &prefix, paths)?;
                }
            }
        }
        Ok(())
    }

    fn leaf(model: &ModelDef, prefix: &str, name: &str) -> Option<String> {
        let known = match model.get_field(name) {
            Some(Field::ManyToMany(_)) => false,
            Some(_) => true,
            None => model.properties.iter().any(|p| p == name),
        };
        if known {
            Some(format!("{prefix}{name}"))
        } else {
            tracing::debug!(model = %model.name, leaf = name, "Dropping unresolvable prefetch leaf");
            None
        }
    }
}
