//! In-memory [`Queryable`] backend.
//!
//! [`InMemoryDatabase`] stores JSON rows per model behind an
//! `Arc<RwLock<...>>` and evaluates [`Q`] trees against them, following
//! forward and reverse relation chains through the [`ModelRegistry`]. It
//! backs the test suites and the command-line tools; production deployments
//! put their own data store behind the `Queryable` trait.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use modeltype_db::fields::{ConcreteField, FieldKind};
//! use modeltype_db::memory::InMemoryDatabase;
//! use modeltype_db::model::{ModelDef, ModelRegistry};
//! use serde_json::json;
//!
//! let registry = ModelRegistry::builder()
//!     .register(ModelDef::new("Thing").field(ConcreteField::new("name", FieldKind::CharField)))
//!     .build()
//!     .unwrap();
//! let db = InMemoryDatabase::new(Arc::new(registry));
//! let row = db.insert_json("Thing", json!({"name": "1"})).unwrap();
//! assert_eq!(row["id"], 1);
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use modeltype_core::{ModelTypeError, ModelTypeResult, ValidationError};
use serde_json::Value;

use crate::fields::{Field, FieldKind};
use crate::lookups::{values_equal, LOOKUP_SEP, Q};
use crate::model::{ModelDef, ModelRegistry};
use crate::queryable::{ModelStore, OrderBy, Queryable, Record};

/// Storage for one model's rows.
#[derive(Debug, Clone)]
struct ModelTable {
    rows: Vec<Record>,
    /// Auto-incrementing ID counter.
    next_id: u64,
}

impl ModelTable {
    const fn new() -> Self {
        Self {
            rows: Vec::new(),
            next_id: 1,
        }
    }

    fn position(&self, pk_column: &str, pk: &Value) -> Option<usize> {
        self.rows
            .iter()
            .position(|r| r.get(pk_column).is_some_and(|v| values_equal(v, pk)))
    }
}

/// A thread-safe store of JSON rows for every model in a registry.
#[derive(Debug, Clone)]
pub struct InMemoryDatabase {
    registry: Arc<ModelRegistry>,
    tables: Arc<RwLock<HashMap<String, ModelTable>>>,
}

impl InMemoryDatabase {
    /// Creates an empty database for the models in `registry`.
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self {
            registry,
            tables: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Returns the model registry.
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Inserts a row after running the model's validators.
    ///
    /// Forward relations may be given by name or attname. Omitted fields are
    /// stored as NULL (an empty array for many-to-many); an omitted auto
    /// primary key is assigned from the table's counter.
    ///
    /// # Errors
    ///
    /// Returns `ImproperlyConfigured` for an unknown model and
    /// `ValidationError` for unknown fields, duplicate or missing primary
    /// keys, and validator rejections.
    pub fn insert(&self, model: &str, values: Record) -> ModelTypeResult<Record> {
        self.registry.validate(model, &values)?;
        self.store_row(model, values)
    }

    fn store_row(&self, model: &str, values: Record) -> ModelTypeResult<Record> {
        let def = self.registry.model(model)?;
        let mut row = to_columns(def, values)?;
        for field in &def.fields {
            let (column, default) = match field {
                Field::Concrete(f) => (f.name.clone(), Value::Null),
                Field::ForwardRelation(f) => (f.attname(), Value::Null),
                Field::ManyToMany(f) => (f.name.clone(), Value::Array(Vec::new())),
                Field::ReverseRelation(_) => continue,
            };
            row.entry(column).or_insert(default);
        }

        let pk_column = def.pk_column()?;
        let auto_pk = matches!(
            def.get_field(&pk_column),
            Some(Field::Concrete(f)) if f.kind.is_auto()
        );

        let mut tables = self.write_tables()?;
        let table = tables.entry(model.to_string()).or_insert_with(ModelTable::new);

        match row.get(&pk_column) {
            Some(Value::Null) | None if auto_pk => {
                row.insert(pk_column.clone(), Value::from(table.next_id));
                table.next_id += 1;
            }
            Some(Value::Null) | None => {
                return Err(ValidationError::for_field(
                    pk_column,
                    "A primary key value is required.",
                    "required",
                )
                .into());
            }
            Some(pk) => {
                if table.position(&pk_column, pk).is_some() {
                    return Err(duplicate_pk(pk_column));
                }
                if let Some(n) = pk.as_u64() {
                    table.next_id = table.next_id.max(n + 1);
                }
            }
        }

        table.rows.push(row.clone());
        tracing::trace!(model, "Row inserted");
        Ok(row)
    }

    /// Inserts a row given as a JSON object.
    pub fn insert_json(&self, model: &str, values: Value) -> ModelTypeResult<Record> {
        match values {
            Value::Object(map) => self.insert(model, map),
            _ => Err(ModelTypeError::invalid("Expected a JSON object.")),
        }
    }

    /// Returns the number of rows stored for `model`.
    pub fn row_count(&self, model: &str) -> ModelTypeResult<usize> {
        let tables = self.read_tables()?;
        Ok(tables.get(model).map_or(0, |t| t.rows.len()))
    }

    /// Returns an unfiltered queryset over `model`.
    pub fn queryset(&self, model: &str) -> ModelTypeResult<MemoryQuerySet> {
        self.registry.model(model)?;
        Ok(MemoryQuerySet {
            db: self.clone(),
            model: model.to_string(),
            filters: Vec::new(),
            ordering: Vec::new(),
            distinct: None,
            related: Vec::new(),
            projection: None,
        })
    }

    fn read_tables(
        &self,
    ) -> ModelTypeResult<std::sync::RwLockReadGuard<'_, HashMap<String, ModelTable>>> {
        self.tables
            .read()
            .map_err(|_| ModelTypeError::DatabaseError("table lock poisoned".to_string()))
    }

    fn write_tables(
        &self,
    ) -> ModelTypeResult<std::sync::RwLockWriteGuard<'_, HashMap<String, ModelTable>>> {
        self.tables
            .write()
            .map_err(|_| ModelTypeError::DatabaseError("table lock poisoned".to_string()))
    }
}

/// Maps submitted keys to storage columns.
fn to_columns(def: &ModelDef, values: Record) -> ModelTypeResult<Record> {
    let mut row = Record::new();
    for (key, value) in values {
        let many = matches!(def.get_field(&key), Some(Field::ManyToMany(_)));
        match def.column(&key) {
            Some(column) if !many || value.is_array() || value.is_null() => {
                row.insert(column, value);
            }
            _ => {
                return Err(ValidationError::for_field(
                    key,
                    format!("'{}' has no writable field with this name.", def.name),
                    "invalid",
                )
                .into())
            }
        }
    }
    Ok(row)
}

fn duplicate_pk(pk_column: String) -> ModelTypeError {
    ValidationError::for_field(
        pk_column,
        "A row with this primary key already exists.",
        "unique",
    )
    .into()
}

/// Checks that every segment of `path` resolves starting from `model`.
fn validate_path(registry: &ModelRegistry, model: &str, path: &str) -> ModelTypeResult<()> {
    let segments: Vec<&str> = path.split(LOOKUP_SEP).collect();
    let mut current = model.to_string();
    for (i, segment) in segments.iter().enumerate() {
        let last = i + 1 == segments.len();
        let def = registry.model(&current)?;
        let unresolvable = || {
            ModelTypeError::FieldDoesNotExist(format!(
                "Cannot resolve '{path}': '{}' has no field '{segment}'",
                def.name
            ))
        };
        match def.get_field_or_attname(segment) {
            Some(Field::Concrete(f)) => {
                // JSON fields allow key traversal below them.
                if last || matches!(f.kind, FieldKind::JsonField) {
                    return Ok(());
                }
                return Err(ModelTypeError::FieldDoesNotExist(format!(
                    "Cannot resolve '{path}': '{}' is not a relation",
                    f.name
                )));
            }
            Some(Field::ForwardRelation(f)) => {
                if *segment == f.attname() && !last {
                    return Err(unresolvable());
                }
                current.clone_from(&f.to);
            }
            Some(Field::ReverseRelation(f)) => current.clone_from(&f.related_model),
            Some(Field::ManyToMany(f)) => current.clone_from(&f.to),
            None => return Err(unresolvable()),
        }
    }
    Ok(())
}

/// Compares two optional JSON values for ordering. Missing and NULL values
/// sort first.
fn compare_json_values(a: Option<&Value>, b: Option<&Value>) -> std::cmp::Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => std::cmp::Ordering::Equal,
        (None, Some(_)) => std::cmp::Ordering::Less,
        (Some(_), None) => std::cmp::Ordering::Greater,
        (Some(a), Some(b)) => {
            if let (Some(a_str), Some(b_str)) = (a.as_str(), b.as_str()) {
                a_str.cmp(b_str)
            } else if let (Some(a_num), Some(b_num)) = (a.as_f64(), b.as_f64()) {
                a_num.partial_cmp(&b_num).unwrap_or(std::cmp::Ordering::Equal)
            } else if let (Some(a_bool), Some(b_bool)) = (a.as_bool(), b.as_bool()) {
                a_bool.cmp(&b_bool)
            } else {
                a.to_string().cmp(&b.to_string())
            }
        }
    }
}

/// A borrowed, consistent view of every table used while evaluating a query.
struct Snapshot<'t> {
    registry: &'t ModelRegistry,
    tables: &'t HashMap<String, ModelTable>,
}

impl<'t> Snapshot<'t> {
    fn rows(&self, model: &str) -> &'t [Record] {
        self.tables.get(model).map_or(&[], |t| t.rows.as_slice())
    }

    fn pk_column(&self, model: &str) -> Option<String> {
        self.registry.get(model).and_then(|def| def.pk_column().ok())
    }

    fn rows_with_pk(&self, model: &str, keys: &[Value]) -> Vec<&'t Record> {
        let Some(pk) = self.pk_column(model) else {
            return Vec::new();
        };
        self.rows(model)
            .iter()
            .filter(|r| {
                r.get(&pk)
                    .is_some_and(|v| keys.iter().any(|k| values_equal(k, v)))
            })
            .collect()
    }

    fn reverse_rows(
        &self,
        model: &str,
        rows: &[&Record],
        related_model: &str,
        field_name: &str,
    ) -> Vec<&'t Record> {
        let Some(pk) = self.pk_column(model) else {
            return Vec::new();
        };
        let keys: Vec<&Value> = rows.iter().filter_map(|r| r.get(&pk)).collect();
        let fk = format!("{field_name}_id");
        self.rows(related_model)
            .iter()
            .filter(|r| {
                r.get(&fk)
                    .is_some_and(|v| !v.is_null() && keys.iter().any(|k| values_equal(k, v)))
            })
            .collect()
    }

    /// Returns every value reachable from `row` through `path`.
    fn resolve(&self, model: &str, row: &Record, path: &str) -> Vec<Value> {
        let segments: Vec<&str> = path.split(LOOKUP_SEP).collect();
        let mut rows: Vec<&Record> = vec![row];
        let mut current = model.to_string();

        for (i, segment) in segments.iter().enumerate() {
            let last = i + 1 == segments.len();
            let Some(def) = self.registry.get(&current) else {
                return Vec::new();
            };
            match def.get_field_or_attname(segment) {
                Some(Field::Concrete(f)) => {
                    return rows
                        .iter()
                        .map(|r| {
                            let mut value = r.get(&f.name).cloned().unwrap_or(Value::Null);
                            for key in &segments[i + 1..] {
                                value = value.get(*key).cloned().unwrap_or(Value::Null);
                            }
                            value
                        })
                        .collect();
                }
                Some(Field::ForwardRelation(f)) => {
                    let keys: Vec<Value> = rows
                        .iter()
                        .map(|r| r.get(&f.attname()).cloned().unwrap_or(Value::Null))
                        .collect();
                    if last {
                        return keys;
                    }
                    rows = self.rows_with_pk(&f.to, &keys);
                    current.clone_from(&f.to);
                }
                Some(Field::ReverseRelation(f)) => {
                    let related =
                        self.reverse_rows(&current, &rows, &f.related_model, &f.field_name);
                    if last {
                        let pk = self.pk_column(&f.related_model).unwrap_or_default();
                        return related.iter().filter_map(|r| r.get(&pk)).cloned().collect();
                    }
                    rows = related;
                    current.clone_from(&f.related_model);
                }
                Some(Field::ManyToMany(f)) => {
                    let keys: Vec<Value> = rows
                        .iter()
                        .filter_map(|r| r.get(&f.name).and_then(Value::as_array))
                        .flatten()
                        .cloned()
                        .collect();
                    if last {
                        return keys;
                    }
                    rows = self.rows_with_pk(&f.to, &keys);
                    current.clone_from(&f.to);
                }
                None => return Vec::new(),
            }
        }
        Vec::new()
    }

    /// Embeds the related rows named by `segments` into `row`, merging with
    /// anything already embedded by an earlier path.
    fn embed(&self, model: &str, row: &mut Record, segments: &[&str]) {
        let Some((segment, rest)) = segments.split_first() else {
            return;
        };
        let Some(def) = self.registry.get(model) else {
            return;
        };
        match def.get_field(segment) {
            Some(Field::ForwardRelation(f)) => {
                if !matches!(row.get(&f.name), Some(Value::Object(_))) {
                    let key = row.get(&f.attname()).cloned().unwrap_or(Value::Null);
                    let related = self
                        .rows_with_pk(&f.to, std::slice::from_ref(&key))
                        .first()
                        .map_or(Value::Null, |r| Value::Object((*r).clone()));
                    row.insert(f.name.clone(), related);
                }
                if let Some(Value::Object(related)) = row.get_mut(&f.name) {
                    self.embed(&f.to, related, rest);
                }
            }
            Some(Field::ReverseRelation(f)) => {
                if !row.contains_key(&f.name) {
                    let related: Vec<Value> = self
                        .reverse_rows(model, &[&*row], &f.related_model, &f.field_name)
                        .into_iter()
                        .map(|r| Value::Object(r.clone()))
                        .collect();
                    let value = if f.one_to_one {
                        related.into_iter().next().unwrap_or(Value::Null)
                    } else {
                        Value::Array(related)
                    };
                    row.insert(f.name.clone(), value);
                }
                match row.get_mut(&f.name) {
                    Some(Value::Object(related)) => self.embed(&f.related_model, related, rest),
                    Some(Value::Array(items)) => {
                        for item in items {
                            if let Value::Object(related) = item {
                                self.embed(&f.related_model, related, rest);
                            }
                        }
                    }
                    _ => {}
                }
            }
            // Concrete leaves are already on the row; many-to-many is never embedded.
            _ => {}
        }
    }
}

/// A lazily refined query over one model's rows in an [`InMemoryDatabase`].
#[derive(Debug, Clone)]
pub struct MemoryQuerySet {
    db: InMemoryDatabase,
    model: String,
    filters: Vec<Q>,
    ordering: Vec<OrderBy>,
    distinct: Option<Vec<String>>,
    related: Vec<String>,
    projection: Option<Vec<String>>,
}

impl MemoryQuerySet {
    /// Returns the eager-load paths requested so far.
    pub fn related_paths(&self) -> &[String] {
        &self.related
    }

    /// Returns the ordering requested so far.
    pub fn ordering(&self) -> &[OrderBy] {
        &self.ordering
    }

    /// Returns the projection requested so far.
    pub fn projection(&self) -> Option<&[String]> {
        self.projection.as_deref()
    }

    fn validate_paths(&self) -> ModelTypeResult<()> {
        let registry = self.db.registry();
        let filter_paths = self.filters.iter().flat_map(Q::field_paths);
        let order_paths = self.ordering.iter().map(|o| o.field.as_str());
        let distinct_paths = self.distinct.iter().flatten().map(String::as_str);
        let projection_paths = self.projection.iter().flatten().map(String::as_str);
        filter_paths
            .chain(order_paths)
            .chain(distinct_paths)
            .chain(projection_paths)
            .try_for_each(|path| validate_path(registry, &self.model, path))
    }

    /// Filters, orders, and de-duplicates rows without shaping them.
    fn matching(&self, snapshot: &Snapshot<'_>) -> Vec<Record> {
        let mut rows: Vec<&Record> = snapshot
            .rows(&self.model)
            .iter()
            .filter(|row| {
                self.filters
                    .iter()
                    .all(|q| q.evaluate(&|path: &str| snapshot.resolve(&self.model, row, path)))
            })
            .collect();

        if !self.ordering.is_empty() {
            rows.sort_by(|a, b| {
                for term in &self.ordering {
                    let va = snapshot.resolve(&self.model, a, &term.field);
                    let vb = snapshot.resolve(&self.model, b, &term.field);
                    let cmp = compare_json_values(va.first(), vb.first());
                    let cmp = if term.descending { cmp.reverse() } else { cmp };
                    if cmp.is_ne() {
                        return cmp;
                    }
                }
                std::cmp::Ordering::Equal
            });
        }

        if let Some(fields) = &self.distinct {
            let mut seen = HashSet::new();
            rows.retain(|row| {
                let key = if fields.is_empty() {
                    Value::Object((*row).clone()).to_string()
                } else {
                    let values: Vec<Value> = fields
                        .iter()
                        .map(|f| {
                            snapshot
                                .resolve(&self.model, row, f)
                                .into_iter()
                                .next()
                                .unwrap_or(Value::Null)
                        })
                        .collect();
                    Value::Array(values).to_string()
                };
                seen.insert(key)
            });
        }

        rows.into_iter().cloned().collect()
    }

    /// Applies eager loading and projection to one row.
    fn shape(&self, snapshot: &Snapshot<'_>, row: Record) -> Record {
        let original = row.clone();
        let mut row = row;
        for path in &self.related {
            let segments: Vec<&str> = path.split(LOOKUP_SEP).collect();
            snapshot.embed(&self.model, &mut row, &segments);
        }
        let Some(fields) = &self.projection else {
            return row;
        };
        fields
            .iter()
            .map(|name| {
                let value = row.get(name).cloned().unwrap_or_else(|| {
                    snapshot
                        .resolve(&self.model, &original, name)
                        .into_iter()
                        .next()
                        .unwrap_or(Value::Null)
                });
                (name.clone(), value)
            })
            .collect()
    }

    fn evaluate(&self, shaped: bool) -> ModelTypeResult<Vec<Record>> {
        self.validate_paths()?;
        let tables = self.db.read_tables()?;
        let snapshot = Snapshot {
            registry: self.db.registry(),
            tables: &tables,
        };
        let rows = self.matching(&snapshot);
        tracing::trace!(model = %self.model, rows = rows.len(), "Evaluated in-memory query");
        if !shaped {
            return Ok(rows);
        }
        Ok(rows
            .into_iter()
            .map(|row| self.shape(&snapshot, row))
            .collect())
    }
}

#[async_trait]
impl Queryable for MemoryQuerySet {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn filter(mut self, q: Q) -> Self {
        self.filters.push(q);
        self
    }

    fn order_by(mut self, terms: Vec<OrderBy>) -> Self {
        self.ordering = terms;
        self
    }

    fn distinct_on(mut self, fields: Vec<String>) -> Self {
        self.distinct = Some(fields);
        self
    }

    fn select_related(mut self, paths: Vec<String>) -> Self {
        for path in paths {
            if !self.related.contains(&path) {
                self.related.push(path);
            }
        }
        self
    }

    fn project(mut self, fields: Vec<String>) -> Self {
        self.projection = Some(fields);
        self
    }

    async fn fetch(&self) -> ModelTypeResult<Vec<Record>> {
        self.evaluate(true)
    }

    async fn get(&self, pk: &Value) -> ModelTypeResult<Record> {
        self.validate_paths()?;
        let tables = self.db.read_tables()?;
        let snapshot = Snapshot {
            registry: self.db.registry(),
            tables: &tables,
        };
        let pk_name = snapshot.pk_column(&self.model).ok_or_else(|| {
            ModelTypeError::ImproperlyConfigured(format!("Model '{}' has no primary key", self.model))
        })?;
        let mut found = self
            .matching(&snapshot)
            .into_iter()
            .filter(|row| row.get(&pk_name).is_some_and(|v| values_equal(v, pk)));
        match (found.next(), found.next()) {
            (Some(row), None) => Ok(self.shape(&snapshot, row)),
            (Some(_), Some(_)) => Err(ModelTypeError::MultipleObjectsReturned(format!(
                "{} matching pk={pk}",
                self.model
            ))),
            (None, _) => Err(ModelTypeError::DoesNotExist(format!(
                "{} matching pk={pk}",
                self.model
            ))),
        }
    }

    async fn count(&self) -> ModelTypeResult<usize> {
        Ok(self.evaluate(false)?.len())
    }
}

#[async_trait]
impl ModelStore for InMemoryDatabase {
    type QuerySet = MemoryQuerySet;

    fn queryset(&self, model: &str) -> ModelTypeResult<MemoryQuerySet> {
        Self::queryset(self, model)
    }

    async fn create(&self, model: &str, values: Record) -> ModelTypeResult<Record> {
        self.store_row(model, values)
    }

    async fn update(&self, model: &str, pk: &Value, values: Record) -> ModelTypeResult<Record> {
        let def = self.registry.model(model)?;
        let changes = to_columns(def, values)?;
        let pk_column = def.pk_column()?;

        let mut tables = self.write_tables()?;
        let table = tables.get_mut(model).ok_or_else(|| no_row(model, pk))?;
        let index = table
            .position(&pk_column, pk)
            .ok_or_else(|| no_row(model, pk))?;
        if let Some(new_pk) = changes.get(&pk_column) {
            if new_pk.is_null() {
                return Err(ValidationError::for_field(
                    pk_column,
                    "A primary key value is required.",
                    "required",
                )
                .into());
            }
            if table
                .position(&pk_column, new_pk)
                .is_some_and(|other| other != index)
            {
                return Err(duplicate_pk(pk_column));
            }
        }

        let row = &mut table.rows[index];
        row.extend(changes);
        tracing::trace!(model, "Row updated");
        Ok(row.clone())
    }

    /// Rows that refer to the deleted one are left as they are.
    async fn delete(&self, model: &str, pk: &Value) -> ModelTypeResult<()> {
        let pk_column = self.registry.model(model)?.pk_column()?;
        let mut tables = self.write_tables()?;
        let table = tables.get_mut(model).ok_or_else(|| no_row(model, pk))?;
        let index = table
            .position(&pk_column, pk)
            .ok_or_else(|| no_row(model, pk))?;
        table.rows.remove(index);
        tracing::trace!(model, "Row deleted");
        Ok(())
    }
}

fn no_row(model: &str, pk: &Value) -> ModelTypeError {
    ModelTypeError::DoesNotExist(format!("{model} matching pk={pk}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{ConcreteField, ForwardRelationField, ManyToManyField};
    use crate::lookups::Lookup;
    use crate::validators::ModelValidator;
    use serde_json::json;

    fn registry() -> ModelRegistry {
        ModelRegistry::builder()
            .register(
                ModelDef::new("Thing")
                    .field(ConcreteField::new("name", FieldKind::CharField).nullable())
                    .field(ConcreteField::new("number", FieldKind::IntegerField).nullable())
                    .field(ConcreteField::new("data", FieldKind::JsonField).nullable())
                    .field(ManyToManyField::new("tags", "Tag")),
            )
            .register(ModelDef::new("Tag").field(ConcreteField::new("label", FieldKind::CharField)))
            .register(
                ModelDef::new("ThingChild")
                    .field(ConcreteField::new("name", FieldKind::CharField).nullable())
                    .field(
                        ForwardRelationField::foreign_key("parent", "Thing")
                            .nullable()
                            .related_name("children"),
                    ),
            )
            .register(
                ModelDef::new("ThingChildChild").field(
                    ForwardRelationField::foreign_key("parent", "ThingChild")
                        .related_name("children"),
                ),
            )
            .validator(
                "Thing",
                ModelValidator::new(["number"], |values| match values["number"].as_i64() {
                    Some(n) if n < 0 => Err(ValidationError::for_field(
                        "number",
                        "Must not be negative.",
                        "min_value",
                    )),
                    _ => Ok(()),
                }),
            )
            .build()
            .unwrap()
    }

    fn seeded() -> InMemoryDatabase {
        let db = InMemoryDatabase::new(Arc::new(registry()));
        db.insert_json("Thing", json!({"name": "1", "number": 10, "data": {"k": "a"}}))
            .unwrap();
        db.insert_json("Thing", json!({"name": "2", "number": 20, "data": {"k": "b"}}))
            .unwrap();
        db.insert_json("Thing", json!({"name": "3"})).unwrap();
        db.insert_json("ThingChild", json!({"name": "c1", "parent": 1}))
            .unwrap();
        db.insert_json("ThingChild", json!({"name": "c2", "parent_id": 1}))
            .unwrap();
        db.insert_json("ThingChild", json!({"name": "c3", "parent": 2}))
            .unwrap();
        db.insert_json("ThingChildChild", json!({"parent": 3}))
            .unwrap();
        db
    }

    fn names(rows: &[Record]) -> Vec<&str> {
        rows.iter().filter_map(|r| r["name"].as_str()).collect()
    }

    #[test]
    fn test_insert_assigns_pk_and_fills_nulls() {
        let db = seeded();
        assert_eq!(db.row_count("Thing").unwrap(), 3);
        let row = db.insert_json("Thing", json!({})).unwrap();
        assert_eq!(row["id"], 4);
        assert_eq!(row["name"], Value::Null);
        assert_eq!(row["tags"], json!([]));
    }

    #[test]
    fn test_insert_rejects_unknown_field_and_duplicate_pk() {
        let db = seeded();
        assert!(db.insert_json("Thing", json!({"nope": 1})).is_err());
        assert!(db.insert_json("Thing", json!({"children": []})).is_err());
        let err = db.insert_json("Thing", json!({"id": 1})).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert!(db.insert_json("Missing", json!({})).is_err());
    }

    #[test]
    fn test_insert_runs_validators() {
        let db = seeded();
        let err = db.insert_json("Thing", json!({"number": -1})).unwrap_err();
        assert!(matches!(err, ModelTypeError::ValidationError(_)));
        assert_eq!(db.row_count("Thing").unwrap(), 3);
    }

    #[tokio::test]
    async fn test_filter_exclude() {
        let db = seeded();
        let rows = db
            .queryset("Thing")
            .unwrap()
            .filter(Q::lookup("number__gte", json!(10)).unwrap())
            .exclude(Q::lookup("name", json!("2")).unwrap())
            .fetch()
            .await
            .unwrap();
        assert_eq!(names(&rows), vec!["1"]);
    }

    #[tokio::test]
    async fn test_or_filter() {
        let db = seeded();
        let rows = db
            .queryset("Thing")
            .unwrap()
            .or_filter(vec![
                Q::lookup("name", json!("1")).unwrap(),
                Q::lookup("number__isnull", json!(true)).unwrap(),
            ])
            .fetch()
            .await
            .unwrap();
        assert_eq!(names(&rows), vec!["1", "3"]);
    }

    #[tokio::test]
    async fn test_forward_and_reverse_chains() {
        let db = seeded();
        let rows = db
            .queryset("ThingChild")
            .unwrap()
            .filter(Q::lookup("parent__name__in", json!(["2"])).unwrap())
            .fetch()
            .await
            .unwrap();
        assert_eq!(names(&rows), vec!["c3"]);

        let rows = db
            .queryset("Thing")
            .unwrap()
            .filter(Q::lookup("children__name", json!("c2")).unwrap())
            .fetch()
            .await
            .unwrap();
        assert_eq!(names(&rows), vec!["1"]);

        let rows = db
            .queryset("Thing")
            .unwrap()
            .filter(Q::lookup("children__isnull", json!(true)).unwrap())
            .fetch()
            .await
            .unwrap();
        assert_eq!(names(&rows), vec!["3"]);

        let rows = db
            .queryset("Thing")
            .unwrap()
            .filter(Q::lookup("children__children__isnull", json!(false)).unwrap())
            .fetch()
            .await
            .unwrap();
        assert_eq!(names(&rows), vec!["2"]);
    }

    #[tokio::test]
    async fn test_json_key_traversal() {
        let db = seeded();
        let rows = db
            .queryset("Thing")
            .unwrap()
            .filter(Q::lookup("data__k", json!("b")).unwrap())
            .fetch()
            .await
            .unwrap();
        assert_eq!(names(&rows), vec!["2"]);
    }

    #[tokio::test]
    async fn test_unknown_path_is_field_error() {
        let db = seeded();
        let err = db
            .queryset("Thing")
            .unwrap()
            .filter(Q::filter("nope", Lookup::Exact(json!(1))))
            .fetch()
            .await
            .unwrap_err();
        assert!(matches!(err, ModelTypeError::FieldDoesNotExist(_)));

        let err = db
            .queryset("Thing")
            .unwrap()
            .filter(Q::lookup("name__foo", json!(1)).unwrap())
            .count()
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_ordering_and_distinct() {
        let db = seeded();
        let rows = db
            .queryset("Thing")
            .unwrap()
            .order_by(vec![OrderBy::desc("name")])
            .fetch()
            .await
            .unwrap();
        assert_eq!(names(&rows), vec!["3", "2", "1"]);

        let rows = db
            .queryset("ThingChild")
            .unwrap()
            .order_by(vec![OrderBy::asc("parent__name"), OrderBy::desc("name")])
            .distinct_on(vec!["parent_id".to_string()])
            .fetch()
            .await
            .unwrap();
        assert_eq!(names(&rows), vec!["c2", "c3"]);
    }

    #[tokio::test]
    async fn test_select_related_embeds() {
        let db = seeded();
        let rows = db
            .queryset("ThingChild")
            .unwrap()
            .select_related(vec!["parent".to_string()])
            .fetch()
            .await
            .unwrap();
        assert_eq!(rows[0]["parent"]["name"], "1");
        assert_eq!(rows[0]["parent_id"], 1);

        let rows = db
            .queryset("Thing")
            .unwrap()
            .select_related(vec!["children__children".to_string()])
            .filter(Q::lookup("id", json!(2)).unwrap())
            .fetch()
            .await
            .unwrap();
        let children = rows[0]["children"].as_array().unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0]["children"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_projection() {
        let db = seeded();
        let rows = db
            .queryset("ThingChild")
            .unwrap()
            .project(vec!["name".to_string(), "parent__name".to_string()])
            .fetch()
            .await
            .unwrap();
        assert_eq!(rows[0], json!({"name": "c1", "parent__name": "1"}).as_object().unwrap().clone());
    }

    #[tokio::test]
    async fn test_get_count_exists_paginate() {
        let db = seeded();
        let qs = db.queryset("Thing").unwrap();
        assert_eq!(qs.get(&json!(2)).await.unwrap()["name"], "2");
        assert!(matches!(
            qs.get(&json!(99)).await.unwrap_err(),
            ModelTypeError::DoesNotExist(_)
        ));
        assert_eq!(qs.count().await.unwrap(), 3);
        assert!(qs.exists().await.unwrap());

        let page = qs.paginate(2, 2).await.unwrap();
        assert_eq!(page.total_count, 3);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.number, 2);
        assert_eq!(names(&page.items), vec!["3"]);

        let none = qs.filter(Q::lookup("name", json!("x")).unwrap());
        assert!(!none.exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_store_create_skips_validators() {
        let db = seeded();
        let row = ModelStore::create(&db, "Thing", Record::from_iter([("number".into(), json!(-5))]))
            .await
            .unwrap();
        assert_eq!(row["id"], 4);
        assert_eq!(row["number"], -5);
    }

    #[tokio::test]
    async fn test_store_update() {
        let db = seeded();
        let changes = json!({"name": "renamed", "parent": 2});
        let row = db
            .update("ThingChild", &json!(1), changes.as_object().unwrap().clone())
            .await
            .unwrap();
        assert_eq!(row["name"], "renamed");
        assert_eq!(row["parent_id"], 2);
        assert!(row.get("parent").is_none());
        let qs = db.queryset("ThingChild").unwrap();
        assert_eq!(qs.get(&json!(1)).await.unwrap()["name"], "renamed");

        let err = db.update("ThingChild", &json!(99), Record::new()).await.unwrap_err();
        assert!(matches!(err, ModelTypeError::DoesNotExist(_)));
        let clash = json!({"id": 2}).as_object().unwrap().clone();
        let err = db.update("ThingChild", &json!(1), clash).await.unwrap_err();
        assert!(err.to_string().contains("already exists"));
        let unknown = json!({"children": []}).as_object().unwrap().clone();
        assert!(db.update("Thing", &json!(1), unknown).await.is_err());
    }

    #[tokio::test]
    async fn test_store_delete() {
        let db = seeded();
        db.delete("Thing", &json!(2)).await.unwrap();
        assert_eq!(db.row_count("Thing").unwrap(), 2);
        assert_eq!(db.row_count("ThingChild").unwrap(), 3);
        let err = db.delete("Thing", &json!(2)).await.unwrap_err();
        assert_eq!(err.status_code(), 404);
        let row = db.insert_json("Thing", json!({})).unwrap();
        assert_eq!(row["id"], 4);
    }
}
