//! Applying list request modifiers to a base queryable.
//!
//! Steps run in a fixed order, each skipped when not requested:
//!
//! 1. the boolean query
//! 2. ordering
//! 3. distinct-on
//! 4. eager loading of every flattened prefetch path
//!
//! Prefetch paths are resolved from the base model before any filtering.

use modeltype_core::ModelTypeResult;
use modeltype_db::{ModelRegistry, OrderBy, Queryable};

use crate::predicate::BooleanQuery;
use crate::prefetch::{PrefetchTree, PrefetchTreeResolver};
use crate::request::ListParams;

/// Builds a refined queryable from request modifiers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerysetBuilder {
    query: Option<BooleanQuery>,
    order_by: Vec<String>,
    distinct: Vec<String>,
    prefetch_trees: Vec<PrefetchTree>,
}

impl QuerysetBuilder {
    /// Creates a builder that leaves the queryable unchanged.
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes every modifier from `params`.
    pub fn from_params(params: &ListParams) -> Self {
        Self {
            query: params.query.clone(),
            order_by: params.order_by.clone().unwrap_or_default(),
            distinct: params.distinct.clone().unwrap_or_default(),
            prefetch_trees: params.prefetch.clone().unwrap_or_default(),
        }
    }

    /// Sets the boolean query.
    #[must_use]
    pub fn query(mut self, query: BooleanQuery) -> Self {
        self.query = Some(query);
        self
    }

    /// Sets the ordering terms.
    #[must_use]
    pub fn order_by<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order_by = terms.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the distinct-on fields.
    #[must_use]
    pub fn distinct<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.distinct = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the prefetch trees.
    #[must_use]
    pub fn prefetch_trees(mut self, trees: Vec<PrefetchTree>) -> Self {
        self.prefetch_trees = trees;
        self
    }

    /// Flattens every prefetch tree against `model` and merges the paths,
    /// dropping duplicates.
    pub fn prefetch_paths(&self, registry: &ModelRegistry, model: &str) -> ModelTypeResult<Vec<String>> {
        let resolver = PrefetchTreeResolver::new(registry);
        let mut merged: Vec<String> = Vec::new();
        for tree in &self.prefetch_trees {
            for path in resolver.flatten(tree, model)?.into_iter().flatten() {
                if !merged.contains(&path) {
                    merged.push(path);
                }
            }
        }
        Ok(merged)
    }

    /// Applies the modifiers to `base`.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` for malformed query values or ordering
    /// terms, and the prefetch errors of [`PrefetchTreeResolver::flatten`].
    pub fn build<T: Queryable>(&self, base: T, registry: &ModelRegistry) -> ModelTypeResult<T> {
        let related = self.prefetch_paths(registry, base.model_name())?;

        let mut queryable = base;
        if let Some(query) = &self.query {
            queryable = query.apply_to(queryable)?;
        }
        if !self.order_by.is_empty() {
            let terms = self
                .order_by
                .iter()
                .map(|term| OrderBy::parse(term))
                .collect::<ModelTypeResult<Vec<_>>>()?;
            queryable = queryable.order_by(terms);
        }
        if !self.distinct.is_empty() {
            queryable = queryable.distinct_on(self.distinct.clone());
        }
        if !related.is_empty() {
            queryable = queryable.select_related(related);
        }
        tracing::debug!(
            model = queryable.model_name(),
            ordered = !self.order_by.is_empty(),
            distinct = !self.distinct.is_empty(),
            "Built queryset"
        );
        Ok(queryable)
    }
}
