//! # modeltype-db
//!
//! Model metadata and the data-access contract for modeltype. Provides the
//! [`Field`](fields::Field) tagged union, [`ModelDef`](model::ModelDef) and the
//! [`ModelRegistry`](model::ModelRegistry), field classification via
//! [`ModelInspector`](inspector::ModelInspector), the [`Q`](lookups::Q)
//! predicate algebra, and the [`Queryable`](queryable::Queryable) trait with
//! an in-memory implementation.
//!
//! ## Module Overview
//!
//! - [`fields`] - Field kinds and the `Field` union
//! - [`model`] - Model definitions, registry, and model pools
//! - [`inspector`] - Concrete / forward / reverse / many-to-many classification
//! - [`lookups`] - Lookup operators, compound keys, and `Q` objects
//! - [`queryable`] - The `Queryable` and `ModelStore` traits, `OrderBy`, and `Record`
//! - [`pagination`] - Page arithmetic
//! - [`memory`] - In-memory `Queryable` backend
//! - [`validators`] - Model validators
//! - [`methods`] - Model method declarations and handlers

// These clippy lints are intentionally allowed for the db crate:
// - doc_markdown: backtick requirements for documentation items are too strict
// - missing_const_for_fn: many accessors may grow non-const bodies
// - option_if_let_else: nested match reads better for relation traversal
// - match_same_arms: operator tables list each arm explicitly
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::result_large_err)]

pub mod fields;
pub mod inspector;
pub mod lookups;
pub mod memory;
pub mod methods;
pub mod model;
pub mod pagination;
pub mod queryable;
pub mod validators;

pub use fields::{Choice, ConcreteField, Field, FieldKind, ForwardRelationField, ManyToManyField, ReverseRelationField};
pub use inspector::ModelInspector;
pub use lookups::{Lookup, LookupType, Pattern, Q};
pub use memory::{InMemoryDatabase, MemoryQuerySet};
pub use model::{ModelDef, ModelPool, ModelRegistry};
pub use methods::{MethodDef, MethodHandler};
pub use queryable::{ModelStore, OrderBy, Page, Queryable, Record};
pub use validators::ModelValidator;
