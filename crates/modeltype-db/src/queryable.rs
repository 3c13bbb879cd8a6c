//! The `Queryable` contract consumed by the query layer.
//!
//! Builder steps are synchronous and lazy: each consumes the queryable and
//! returns a refined one, touching no data. Terminal steps are `async` and are
//! the only points where a data store is consulted. Any backend satisfying this
//! trait can sit behind the query builder and payload builder.

use std::fmt;

use async_trait::async_trait;
use modeltype_core::{ModelTypeError, ModelTypeResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::lookups::Q;
use crate::pagination::Paginator;

/// A row, keyed by field name (or attname for forward relations).
pub type Record = serde_json::Map<String, Value>;

/// An ORDER BY term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    /// The field path to order by.
    pub field: String,
    /// Whether to sort in descending order.
    pub descending: bool,
}

impl OrderBy {
    /// Creates an ascending ORDER BY term.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    /// Creates a descending ORDER BY term.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }

    /// Parses a sign-prefixed field name: `"-name"` is descending, `"name"`
    /// and `"+name"` ascending.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty field name.
    pub fn parse(term: &str) -> ModelTypeResult<Self> {
        let (field, descending) = if let Some(rest) = term.strip_prefix('-') {
            (rest, true)
        } else {
            (term.strip_prefix('+').unwrap_or(term), false)
        };
        if field.is_empty() {
            return Err(ModelTypeError::invalid(format!(
                "Invalid ordering term '{term}'"
            )));
        }
        Ok(Self {
            field: field.to_string(),
            descending,
        })
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descending {
            write!(f, "-{}", self.field)
        } else {
            f.write_str(&self.field)
        }
    }
}

/// One page of materialized rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    /// The rows on this page.
    pub items: Vec<Record>,
    /// The 1-based number of the page actually returned.
    pub number: usize,
    /// Total matching rows before pagination.
    pub total_count: usize,
    /// Total number of pages.
    pub total_pages: usize,
}

/// A lazily refined, asynchronously evaluated collection of rows of one model.
#[async_trait]
pub trait Queryable: Send + Sync + Sized {
    /// Returns the name of the model whose rows this yields.
    fn model_name(&self) -> &str;

    /// Keeps rows matching `q`.
    #[must_use]
    fn filter(self, q: Q) -> Self;

    /// Drops rows matching `q`.
    #[must_use]
    fn exclude(self, q: Q) -> Self {
        self.filter(!q)
    }

    /// Keeps rows matching any of `qs`.
    #[must_use]
    fn or_filter(self, qs: Vec<Q>) -> Self {
        let combined = qs.into_iter().reduce(|acc, q| acc | q);
        match combined {
            Some(q) => self.filter(q),
            None => self,
        }
    }

    /// Replaces the ordering.
    #[must_use]
    fn order_by(self, terms: Vec<OrderBy>) -> Self;

    /// Keeps the first row for each distinct tuple of `fields`, or for each
    /// distinct row when `fields` is empty.
    #[must_use]
    fn distinct_on(self, fields: Vec<String>) -> Self;

    /// Eagerly loads the related rows along `paths`.
    #[must_use]
    fn select_related(self, paths: Vec<String>) -> Self;

    /// Narrows each row to `fields`.
    #[must_use]
    fn project(self, fields: Vec<String>) -> Self;

    /// Materializes every row.
    async fn fetch(&self) -> ModelTypeResult<Vec<Record>>;

    /// Fetches the single row whose primary key equals `pk`.
    ///
    /// # Errors
    ///
    /// Returns `DoesNotExist` when no row matches.
    async fn get(&self, pk: &Value) -> ModelTypeResult<Record>;

    /// Counts matching rows.
    async fn count(&self) -> ModelTypeResult<usize> {
        Ok(self.fetch().await?.len())
    }

    /// Returns whether any row matches.
    async fn exists(&self) -> ModelTypeResult<bool> {
        Ok(self.count().await? > 0)
    }

    /// Returns page `number` of `page_size` rows. Out-of-range page numbers
    /// are clamped to the last page.
    async fn paginate(&self, number: usize, page_size: usize) -> ModelTypeResult<Page> {
        let rows = self.fetch().await?;
        let paginator = Paginator::new(rows, page_size);
        let total_count = paginator.count();
        let total_pages = paginator.num_pages();
        let page = paginator.get_page(number);
        Ok(Page {
            number: page.number(),
            total_count,
            total_pages,
            items: page.into_object_list(),
        })
    }
}

/// The write side of a data store, and the source of its querysets.
///
/// Writes take values keyed by field name or attname. They do not run
/// model validators; the request handlers do that before writing.
#[async_trait]
pub trait ModelStore: Send + Sync {
    /// The queryset type this store produces.
    type QuerySet: Queryable;

    /// Returns an unfiltered queryset over `model`.
    fn queryset(&self, model: &str) -> ModelTypeResult<Self::QuerySet>;

    /// Stores a new row and returns it with defaults and its primary key.
    async fn create(&self, model: &str, values: Record) -> ModelTypeResult<Record>;

    /// Overwrites the given columns of the row whose primary key is `pk` and
    /// returns the updated row.
    ///
    /// # Errors
    ///
    /// Returns `DoesNotExist` when no row matches.
    async fn update(&self, model: &str, pk: &Value, values: Record) -> ModelTypeResult<Record>;

    /// Removes the row whose primary key is `pk`.
    ///
    /// # Errors
    ///
    /// Returns `DoesNotExist` when no row matches.
    async fn delete(&self, model: &str, pk: &Value) -> ModelTypeResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_by_parse() {
        assert_eq!(OrderBy::parse("-name").unwrap(), OrderBy::desc("name"));
        assert_eq!(OrderBy::parse("name").unwrap(), OrderBy::asc("name"));
        assert_eq!(OrderBy::parse("+name").unwrap(), OrderBy::asc("name"));
        assert_eq!(
            OrderBy::parse("parent__name").unwrap(),
            OrderBy::asc("parent__name")
        );
        assert!(OrderBy::parse("-").is_err());
        assert!(OrderBy::parse("").is_err());
    }

    #[test]
    fn test_order_by_display() {
        assert_eq!(OrderBy::desc("name").to_string(), "-name");
        assert_eq!(OrderBy::asc("name").to_string(), "name");
    }
}
