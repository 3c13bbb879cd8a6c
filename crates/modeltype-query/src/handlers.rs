//! Request handlers.
//!
//! Each handler runs inside a request span and wires the queryset builder to
//! the payload builder for one model. Transport concerns stay with the
//! caller: handlers take parsed [`ListParams`] and return a [`Payload`].
//!
//! Writes go through a [`ModelStore`]. Submitted values lose their read-only
//! fields and pass the model's validators before anything is stored, and the
//! stored row is read back with the request's `prefetch` and `values`.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use modeltype_core::logging::request_span;
use modeltype_core::{ModelTypeError, ModelTypeResult, Settings};
use modeltype_db::lookups::LOOKUP_SEP;
use modeltype_db::{ModelDef, ModelRegistry, ModelStore, Q, Queryable, Record};
use serde_json::Value;
use tracing::Instrument;

use crate::builder::QuerysetBuilder;
use crate::payload::{ModelSerializer, Payload, PayloadBuilder};
use crate::prefetch::PrefetchTree;
use crate::request::ListParams;

/// What a handler needs besides the request itself.
#[derive(Debug)]
pub struct RequestContext<'a> {
    /// The models the request may touch.
    pub registry: &'a ModelRegistry,
    /// Page-size defaults and limits.
    pub settings: &'a Settings,
    request_id: Option<String>,
    issued: AtomicU64,
}

impl<'a> RequestContext<'a> {
    /// Creates a context that numbers its requests `req-1`, `req-2`, ...
    pub fn new(registry: &'a ModelRegistry, settings: &'a Settings) -> Self {
        Self {
            registry,
            settings,
            request_id: None,
            issued: AtomicU64::new(0),
        }
    }

    /// Tags every request handled with this context with `request_id`.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Returns the id for the next request handled with this context.
    pub fn next_request_id(&self) -> String {
        match &self.request_id {
            Some(id) => id.clone(),
            None => format!("req-{}", self.issued.fetch_add(1, Ordering::Relaxed) + 1),
        }
    }
}

/// Runs `work` in a request span and logs its outcome.
async fn traced<F>(
    ctx: &RequestContext<'_>,
    model: &str,
    action: &'static str,
    work: F,
) -> ModelTypeResult<Payload>
where
    F: Future<Output = ModelTypeResult<Payload>>,
{
    let span = request_span(&ctx.next_request_id(), model);
    async move {
        let result = work.await;
        match &result {
            Ok(_) => tracing::debug!(action, "Request handled"),
            Err(e) => tracing::info!(action, status = e.status_code(), error = %e, "Request failed"),
        }
        result
    }
    .instrument(span)
    .await
}

/// Handles a list request against `base`.
///
/// # Errors
///
/// Propagates validation, prefetch, and data-store errors.
pub async fn list<T: Queryable>(
    ctx: &RequestContext<'_>,
    base: T,
    params: &ListParams,
) -> ModelTypeResult<Payload> {
    let model_name = base.model_name().to_string();
    traced(ctx, &model_name, "list", async move {
        let model = ctx.registry.model(base.model_name())?;
        let serializer = ModelSerializer::for_model(model);
        let queryable = QuerysetBuilder::from_params(params).build(base, ctx.registry)?;
        PayloadBuilder::from_params(params, ctx.settings)
            .payload(queryable, &serializer)
            .await
    })
    .await
}

/// Handles a get-by-primary-key request against `base`. Only the `prefetch`
/// and `values` parameters apply.
///
/// # Errors
///
/// Returns `DoesNotExist` when no row has primary key `pk`.
pub async fn get<T: Queryable>(
    ctx: &RequestContext<'_>,
    base: T,
    pk: &Value,
    params: &ListParams,
) -> ModelTypeResult<Payload> {
    let model_name = base.model_name().to_string();
    traced(ctx, &model_name, "get", async move {
        instance(ctx, base, pk, params).await.map(Payload::Instance)
    })
    .await
}

/// Creates a row of `model` from `values`.
///
/// # Errors
///
/// Returns a `ValidationError` for validator rejections and values the store
/// cannot write.
pub async fn create<S: ModelStore>(
    ctx: &RequestContext<'_>,
    store: &S,
    model: &str,
    values: Record,
    params: &ListParams,
) -> ModelTypeResult<Payload> {
    traced(ctx, model, "create", async move {
        let def = ctx.registry.model(model)?;
        let row = create_row(ctx, store, def, values).await?;
        let pk = primary_key(def, &row)?;
        instance(ctx, store.queryset(model)?, &pk, params)
            .await
            .map(Payload::Instance)
    })
    .await
}

/// Overwrites the submitted fields of the row whose primary key is `pk`.
///
/// Validators see the stored row with the submitted values applied, so a
/// partial update is checked against the values it leaves in place.
///
/// # Errors
///
/// Returns `DoesNotExist` when no row matches and a `ValidationError` for
/// validator rejections.
pub async fn update<S: ModelStore>(
    ctx: &RequestContext<'_>,
    store: &S,
    model: &str,
    pk: &Value,
    values: Record,
    params: &ListParams,
) -> ModelTypeResult<Payload> {
    traced(ctx, model, "update", async move {
        let def = ctx.registry.model(model)?;
        let changes: Record = writable(def, values)
            .into_iter()
            .map(|(key, value)| (def.column(&key).unwrap_or(key), value))
            .collect();
        let mut merged = store.queryset(model)?.get(pk).await?;
        merged.extend(changes.clone());
        ctx.registry.validate(model, &merged)?;

        let row = store.update(model, pk, changes).await?;
        let pk = primary_key(def, &row)?;
        instance(ctx, store.queryset(model)?, &pk, params)
            .await
            .map(Payload::Instance)
    })
    .await
}

/// Deletes the row whose primary key is `pk`.
///
/// # Errors
///
/// Returns `DoesNotExist` when no row matches.
pub async fn delete<S: ModelStore>(
    ctx: &RequestContext<'_>,
    store: &S,
    model: &str,
    pk: &Value,
) -> ModelTypeResult<Payload> {
    traced(ctx, model, "delete", async move {
        ctx.registry.model(model)?;
        store.delete(model, pk).await?;
        Ok(Payload::Deleted {})
    })
    .await
}

/// Returns the single row matching `lookup`, creating it when none does.
///
/// A new row takes the plain field entries of `lookup` overlaid with
/// `defaults`; entries with an operator or a relation path are used only
/// for matching.
///
/// # Errors
///
/// Returns `MultipleObjectsReturned` when more than one row matches, and
/// the errors of [`create`] when a row is created.
pub async fn get_or_create<S: ModelStore>(
    ctx: &RequestContext<'_>,
    store: &S,
    model: &str,
    lookup: Record,
    defaults: Record,
    params: &ListParams,
) -> ModelTypeResult<Payload> {
    traced(ctx, model, "get_or_create", async move {
        let def = ctx.registry.model(model)?;
        let rows = store
            .queryset(model)?
            .filter(Q::from_mapping(&lookup)?)
            .fetch()
            .await?;
        let (row, created) = match rows.as_slice() {
            [] => {
                let mut values: Record = lookup
                    .into_iter()
                    .filter(|(key, _)| !key.contains(LOOKUP_SEP))
                    .collect();
                values.extend(defaults);
                (create_row(ctx, store, def, values).await?, true)
            }
            [row] => (row.clone(), false),
            _ => {
                return Err(ModelTypeError::MultipleObjectsReturned(format!(
                    "{} rows of {model} match the lookup",
                    rows.len()
                )))
            }
        };
        let pk = primary_key(def, &row)?;
        let row = instance(ctx, store.queryset(model)?, &pk, params).await?;
        Ok(Payload::GetOrCreate(row, created))
    })
    .await
}

/// Calls the method `name` declared on `model`: an instance method on the
/// row whose primary key is `pk`, or a static method when `pk` is `None`.
///
/// # Errors
///
/// Returns `DoesNotExist` for an undeclared method or a missing row,
/// `BadRequest` when `pk` does not match the method's kind, a
/// `ValidationError` for bad arguments, and `ImproperlyConfigured` when no
/// handler is registered.
pub async fn call_method<S: ModelStore>(
    ctx: &RequestContext<'_>,
    store: &S,
    model: &str,
    name: &str,
    pk: Option<&Value>,
    args: Record,
) -> ModelTypeResult<Payload> {
    traced(ctx, model, "call_method", async move {
        let def = ctx.registry.model(model)?;
        let method = def.get_method(name).ok_or_else(|| {
            ModelTypeError::DoesNotExist(format!("{model} has no method '{name}'"))
        })?;
        match (method.is_static, pk) {
            (true, Some(_)) => {
                return Err(ModelTypeError::BadRequest(format!(
                    "'{model}.{name}' is static and takes no primary key"
                )))
            }
            (false, None) => {
                return Err(ModelTypeError::BadRequest(format!(
                    "'{model}.{name}' needs the primary key of a row"
                )))
            }
            _ => {}
        }
        let handler = ctx.registry.method_handler(model, name).ok_or_else(|| {
            ModelTypeError::ImproperlyConfigured(format!("No handler for '{model}.{name}'"))
        })?;
        let args = method.bind_args(args)?;
        let row = match pk {
            Some(pk) => Some(store.queryset(model)?.get(pk).await?),
            None => None,
        };
        tracing::debug!(method = name, "Calling model method");
        handler.call(row.as_ref(), &args).map(Payload::Output)
    })
    .await
}

/// Fetches and serializes one row with the `prefetch` and `values` of
/// `params`.
async fn instance<T: Queryable>(
    ctx: &RequestContext<'_>,
    base: T,
    pk: &Value,
    params: &ListParams,
) -> ModelTypeResult<Record> {
    let model = ctx.registry.model(base.model_name())?;
    let serializer = ModelSerializer::for_model(model);
    let trees: Vec<PrefetchTree> = params.prefetch.clone().unwrap_or_default();
    let queryable = QuerysetBuilder::new()
        .prefetch_trees(trees)
        .build(base, ctx.registry)?;
    match PayloadBuilder::from_params(params, ctx.settings)
        .payload_one(queryable, pk, &serializer)
        .await?
    {
        Payload::Instance(row) => Ok(row),
        _ => Err(ModelTypeError::DatabaseError(
            "expected a single serialized row".to_string(),
        )),
    }
}

async fn create_row<S: ModelStore>(
    ctx: &RequestContext<'_>,
    store: &S,
    def: &ModelDef,
    values: Record,
) -> ModelTypeResult<Record> {
    let values = writable(def, values);
    ctx.registry.validate(&def.name, &values)?;
    store.create(&def.name, values).await
}

/// Drops submitted values for read-only fields. Unknown names are kept so
/// the store can reject them.
fn writable(def: &ModelDef, values: Record) -> Record {
    values
        .into_iter()
        .filter(|(key, _)| !def.get_field_or_attname(key).is_some_and(|f| f.is_read_only()))
        .collect()
}

fn primary_key(def: &ModelDef, row: &Record) -> ModelTypeResult<Value> {
    let column = def.pk_column()?;
    row.get(&column).cloned().ok_or_else(|| {
        ModelTypeError::DatabaseError(format!("Stored {} row has no '{column}'", def.name))
    })
}
