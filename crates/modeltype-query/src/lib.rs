//! # modeltype-query
//!
//! Runtime query translation for modeltype. Interprets the structured list
//! requests sent by generated client querysets and applies them to any
//! [`Queryable`](modeltype_db::Queryable).
//!
//! ## Module Overview
//!
//! - [`predicate`] - `BooleanQuery`: filters, exclusions, and OR branches
//! - [`prefetch`] - Prefetch trees and their flattening into eager-load paths
//! - [`builder`] - `QuerysetBuilder`: query, ordering, distinct, prefetch
//! - [`payload`] - `PayloadBuilder`, `ModelSerializer`, and response shapes
//! - [`request`] - `ListParams` parsing
//! - [`handlers`] - List, get, write, and model method handlers

#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::result_large_err)]

pub mod builder;
pub mod handlers;
pub mod payload;
pub mod predicate;
pub mod prefetch;
pub mod request;

pub use builder::QuerysetBuilder;
pub use handlers::RequestContext;
pub use payload::{ModelSerializer, Payload, PayloadBuilder};
pub use predicate::{BooleanQuery, CompiledQuery};
pub use prefetch::{PrefetchTree, PrefetchTreeResolver};
pub use request::ListParams;
