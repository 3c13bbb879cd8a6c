//! # modeltype-transpile
//!
//! TypeScript generation for modeltype registries. For each model of a pool
//! this crate produces a field interface, a lookups type, a prefetch-key
//! union, a queryset interface, and a field schema table, then publishes
//! them as `models.ts` and `schema.json`.
//!
//! ## Module Overview
//!
//! - [`field_type`] - `FieldTypeMap`: field kinds to TypeScript types
//! - [`lookup`] - `LookupResolver`: lookup keys per field
//! - [`literal`] - JSON values as TypeScript literals
//! - [`model_type`] - `ModelTypeTranspiler` and the per-model unit
//! - [`render`] - TypeScript text rendering
//! - [`transpiler`] - Generation runs and artifact publishing

#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::result_large_err)]

pub mod field_type;
pub mod literal;
pub mod lookup;
pub mod model_type;
pub mod render;
pub mod transpiler;

pub use field_type::FieldTypeMap;
pub use lookup::{LookupResolver, LookupSpec};
pub use model_type::{
    FieldSchema, MethodSignature, ModelTypeTranspiler, ModelTypeUnit, ReverseRelationAccessor,
    TypeDeclaration, UnitNames,
};
pub use transpiler::{Artifacts, TranspileReport, Transpiler, MODULE_FILE, SCHEMA_FILE};
