//! Boolean queries sent by generated client querysets.
//!
//! A [`BooleanQuery`] is a small boolean algebra: a conjunction of filters, a
//! negated conjunction of exclusions, and an `or` list of further queries.
//! Compiling it yields either direct filter/exclude steps (leaf queries) or a
//! single disjunctive [`Q`] applied in one `filter` call.
//!
//! Children are only expanded at the node that declares them. When a node is
//! compiled as a subexpression of its parent, its own children are ignored.

use modeltype_core::{ModelTypeError, ModelTypeResult, ValidationError};
use modeltype_db::{Q, Queryable, Record};
use serde::{Deserialize, Serialize};

/// A structured query: `(filters AND NOT exclude) OR children...`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BooleanQuery {
    /// Compound lookup keys every row must match.
    pub filters: Record,
    /// Compound lookup keys a row must not match as a whole.
    pub exclude: Record,
    /// Alternative queries OR-ed with this one.
    #[serde(rename = "or", alias = "or_")]
    pub children: Vec<BooleanQuery>,
}

/// The result of compiling a [`BooleanQuery`].
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledQuery {
    /// Filter by `filter`, then exclude by `exclude` if present.
    Direct {
        /// The conjunction of the query's filters.
        filter: Q,
        /// The conjunction of the query's exclusions, if any were given.
        exclude: Option<Q>,
    },
    /// Filter once by a combined predicate.
    Combined(Q),
}

impl BooleanQuery {
    /// Creates a query from filters alone.
    pub fn new(filters: Record) -> Self {
        Self {
            filters,
            ..Self::default()
        }
    }

    /// Sets the exclusions.
    #[must_use]
    pub fn exclude(mut self, exclude: Record) -> Self {
        self.exclude = exclude;
        self
    }

    /// Appends an OR-ed child query.
    #[must_use]
    pub fn or(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// Parses a query from its JSON text, ignoring a leading byte-order mark.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` keyed by `query` for malformed JSON or a
    /// value that is not a query object.
    pub fn from_json(text: &str) -> ModelTypeResult<Self> {
        let text = text.trim_start_matches('\u{feff}');
        serde_json::from_str(text).map_err(|e| {
            ModelTypeError::ValidationError(ValidationError::for_field(
                "query",
                format!("Invalid query: {e}"),
                "invalid",
            ))
        })
    }

    /// Returns this node's own clause: `filters AND NOT exclude`.
    pub fn own_clause(&self) -> ModelTypeResult<Q> {
        let filter = Q::from_mapping(&self.filters)?;
        if self.exclude.is_empty() {
            return Ok(filter);
        }
        Ok(filter & !Q::from_mapping(&self.exclude)?)
    }

    /// Compiles this query.
    ///
    /// As a subexpression only the node's own clause is returned. At top level
    /// a leaf query compiles to direct filter/exclude steps and a query with
    /// children compiles to the OR of its own clause and each child's clause.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` when a value does not fit its operator.
    pub fn compile(&self, as_subexpression: bool) -> ModelTypeResult<CompiledQuery> {
        if as_subexpression {
            return self.own_clause().map(CompiledQuery::Combined);
        }
        if self.children.is_empty() {
            let filter = Q::from_mapping(&self.filters)?;
            let exclude = if self.exclude.is_empty() {
                None
            } else {
                Some(Q::from_mapping(&self.exclude)?)
            };
            return Ok(CompiledQuery::Direct { filter, exclude });
        }

        let mut combined = self.own_clause()?;
        for child in &self.children {
            combined = combined | child.own_clause()?;
        }
        Ok(CompiledQuery::Combined(combined))
    }

    /// Applies this query to `queryable`.
    pub fn apply_to<T: Queryable>(&self, queryable: T) -> ModelTypeResult<T> {
        let compiled = self.compile(false)?;
        tracing::debug!(
            model = queryable.model_name(),
            children = self.children.len(),
            "Applying boolean query"
        );
        Ok(compiled.apply_to(queryable))
    }
}

impl CompiledQuery {
    /// Applies the compiled steps to `queryable`.
    pub fn apply_to<T: Queryable>(self, queryable: T) -> T {
        match self {
            Self::Direct { filter, exclude } => {
                let queryable = queryable.filter(filter);
                match exclude {
                    Some(exclude) => queryable.exclude(exclude),
                    None => queryable,
                }
            }
            Self::Combined(q) => queryable.filter(q),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modeltype_db::{ConcreteField, FieldKind, InMemoryDatabase, ModelDef, ModelRegistry};
    use serde_json::json;
    use std::sync::Arc;

    fn record(value: serde_json::Value) -> Record {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    fn db_with(numbers: &[i64]) -> InMemoryDatabase {
        let registry = ModelRegistry::builder()
            .register(
                ModelDef::new("Row")
                    .field(ConcreteField::new("a", FieldKind::IntegerField).nullable())
                    .field(ConcreteField::new("b", FieldKind::IntegerField).nullable()),
            )
            .build()
            .unwrap();
        let db = InMemoryDatabase::new(Arc::new(registry));
        for n in numbers {
            db.insert_json("Row", json!({"a": n, "b": n % 2})).unwrap();
        }
        db
    }

    async fn a_values(db: &InMemoryDatabase, query: &BooleanQuery) -> Vec<i64> {
        let qs = query.apply_to(db.queryset("Row").unwrap()).unwrap();
        qs.fetch()
            .await
            .unwrap()
            .iter()
            .filter_map(|r| r["a"].as_i64())
            .collect()
    }

    #[test]
    fn test_deserialize_accepts_or_aliases() {
        let q: BooleanQuery =
            serde_json::from_value(json!({"filters": {"a": 1}, "or_": [{"filters": {"a": 2}}]}))
                .unwrap();
        assert_eq!(q.children.len(), 1);
        assert!(q.exclude.is_empty());

        let q: BooleanQuery = serde_json::from_value(json!({"or": [{}]})).unwrap();
        assert_eq!(q.children, vec![BooleanQuery::default()]);
    }

    #[test]
    fn test_from_json_strips_bom() {
        let q = BooleanQuery::from_json("\u{feff}{\"filters\": {\"a\": 1}}").unwrap();
        assert_eq!(q.filters["a"], 1);
        let err = BooleanQuery::from_json("{not json").unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(BooleanQuery::from_json("[1, 2]").is_err());
    }

    #[test]
    fn test_leaf_compiles_direct() {
        let q = BooleanQuery::new(record(json!({"a": 1})));
        match q.compile(false).unwrap() {
            CompiledQuery::Direct { exclude, .. } => assert!(exclude.is_none()),
            CompiledQuery::Combined(_) => panic!("expected direct steps"),
        }
        let q = q.exclude(record(json!({"b": 0})));
        assert!(matches!(
            q.compile(false).unwrap(),
            CompiledQuery::Direct { exclude: Some(_), .. }
        ));
    }

    #[test]
    fn test_subexpression_ignores_children() {
        let q = BooleanQuery::new(record(json!({"a": 1})))
            .or(BooleanQuery::new(record(json!({"a": 2}))));
        let CompiledQuery::Combined(clause) = q.compile(true).unwrap() else {
            panic!("expected a combined clause");
        };
        assert_eq!(clause, q.own_clause().unwrap());
    }

    #[test]
    fn test_malformed_value_is_validation_error() {
        let q = BooleanQuery::new(record(json!({"a__in": 3})));
        let err = q.compile(false).unwrap_err();
        assert!(matches!(err, ModelTypeError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_leaf_equals_filter_minus_exclude() {
        let db = db_with(&[1, 2, 3, 4, 5, 6]);
        let q = BooleanQuery::new(record(json!({"a__gte": 2})))
            .exclude(record(json!({"b": 0, "a__lt": 5})));
        // a >= 2 minus (even and a < 5)
        assert_eq!(a_values(&db, &q).await, vec![3, 5, 6]);
    }

    #[tokio::test]
    async fn test_or_composition() {
        let db = db_with(&[1, 2, 3]);
        let q: BooleanQuery = serde_json::from_value(json!({
            "filters": {"a": 1},
            "exclude": {},
            "or": [{"filters": {"a": 2}, "exclude": {}, "or": []}]
        }))
        .unwrap();
        assert_eq!(a_values(&db, &q).await, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_grandchildren_are_not_expanded() {
        let db = db_with(&[1, 2, 3]);
        let q: BooleanQuery = serde_json::from_value(json!({
            "filters": {"a": 1},
            "or": [{"filters": {"a": 2}, "or": [{"filters": {"a": 3}}]}]
        }))
        .unwrap();
        assert_eq!(a_values(&db, &q).await, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_empty_query_matches_everything() {
        let db = db_with(&[1, 2, 3]);
        assert_eq!(a_values(&db, &BooleanQuery::default()).await, vec![1, 2, 3]);
    }
}
