//! # modeltype
//!
//! Typed client schema generation and structured query translation for
//! model registries.
//!
//! This is the meta-crate that re-exports the sub-crates behind features.
//! Depend on `modeltype` for everything, or on individual crates for
//! finer-grained control.

/// Errors, settings, and logging.
pub use modeltype_core as core;

/// Model definitions, registries, lookups, and the data-store contracts.
#[cfg(feature = "db")]
pub use modeltype_db as db;

/// Request parsing, queryset building, and response payloads.
#[cfg(feature = "query")]
pub use modeltype_query as query;

/// TypeScript generation.
#[cfg(feature = "transpile")]
pub use modeltype_transpile as transpile;

/// Management commands (CLI).
#[cfg(feature = "cli")]
pub use modeltype_cli as cli;

pub use modeltype_core::{ModelTypeError, ModelTypeResult, Settings};

/// Re-exports for `use modeltype::prelude::*`.
pub mod prelude {
    pub use modeltype_core::{ModelTypeError, ModelTypeResult, Settings, ValidationError};

    #[cfg(feature = "db")]
    pub use modeltype_db::{
        ConcreteField, Field, FieldKind, ForwardRelationField, InMemoryDatabase, ManyToManyField,
        MethodDef, MethodHandler, ModelDef, ModelRegistry, ModelStore, Queryable, Q,
    };

    #[cfg(feature = "query")]
    pub use modeltype_query::{BooleanQuery, ListParams, Payload, QuerysetBuilder, RequestContext};

    #[cfg(feature = "transpile")]
    pub use modeltype_transpile::Transpiler;
}
