//! Response payloads and row serialization.
//!
//! [`PayloadBuilder`] picks exactly one response shape per request, checked
//! in this order: paginated, exists, count, full data. A field subset
//! narrows the [`ModelSerializer`] rather than the query.

use modeltype_core::{ModelTypeError, ModelTypeResult, Settings, ValidationError};
use modeltype_db::{Field, ModelDef, ModelInspector, Queryable, Record};
use serde::Serialize;
use serde_json::Value;

use crate::request::ListParams;

/// Serializes rows of one model using an explicit field list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSerializer {
    model: String,
    fields: Vec<String>,
    // Relation objects passed through when present on a row.
    relations: Vec<String>,
    // Computed on the model, never stored on a row.
    properties: Vec<String>,
    subset: bool,
}

impl ModelSerializer {
    /// Builds the default serializer for `model`: concrete field names and
    /// forward relation attnames, plus prefetched relations and properties
    /// when a row carries them.
    pub fn for_model(model: &ModelDef) -> Self {
        let inspector = ModelInspector::new(model);
        let relations = model
            .fields
            .iter()
            .filter(|f| matches!(f, Field::ForwardRelation(_) | Field::ReverseRelation(_)))
            .map(|f| f.name().to_string())
            .collect();
        Self {
            model: model.name.clone(),
            fields: inspector.serializable_names(),
            relations,
            properties: model.properties.clone(),
            subset: false,
        }
    }

    /// Returns the serialized field names.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Returns the serialized names a data store can project: everything
    /// but properties.
    pub fn stored_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|name| !self.properties.contains(*name))
            .cloned()
            .collect()
    }

    fn knows(&self, name: &String) -> bool {
        self.fields.contains(name) || self.relations.contains(name) || self.properties.contains(name)
    }

    /// Narrows this serializer to `fields`, in the given order.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` keyed by each name the serializer does
    /// not know.
    pub fn subset(&self, fields: &[String]) -> ModelTypeResult<Self> {
        if let Some(first) = fields.iter().find(|name| !self.knows(name)) {
            return Err(ModelTypeError::ValidationError(ValidationError::for_field(
                first.as_str(),
                format!("{} has no field named '{first}'.", self.model),
                "invalid",
            )));
        }
        Ok(Self {
            model: self.model.clone(),
            fields: fields.to_vec(),
            relations: self.relations.clone(),
            properties: self.properties.clone(),
            subset: true,
        })
    }

    /// Serializes one row.
    pub fn serialize(&self, row: &Record) -> Record {
        let mut out: Record = self
            .fields
            .iter()
            .map(|name| (name.clone(), row.get(name).cloned().unwrap_or(Value::Null)))
            .collect();
        if !self.subset {
            for name in self.relations.iter().chain(&self.properties) {
                if let Some(value) = row.get(name) {
                    out.insert(name.clone(), value.clone());
                }
            }
        }
        out
    }

    /// Serializes many rows.
    pub fn serialize_many(&self, rows: &[Record]) -> Vec<Record> {
        rows.iter().map(|row| self.serialize(row)).collect()
    }
}

/// A response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    /// One page of rows with page arithmetic.
    Paginated {
        /// Matching rows before pagination.
        num_results: usize,
        /// Total number of pages.
        num_pages: usize,
        /// The page returned.
        page: usize,
        /// The serialized rows on the page.
        data: Vec<Record>,
    },
    /// Whether any row matched.
    Exists(bool),
    /// How many rows matched.
    Count(usize),
    /// Every matching row.
    Data(Vec<Record>),
    /// A single row.
    Instance(Record),
    /// The row found or created, and whether it was created.
    GetOrCreate(Record, bool),
    /// Acknowledges a deletion as an empty object.
    Deleted {},
    /// The result of a model method.
    Output(Value),
}

impl Payload {
    /// Converts the payload to its JSON response body.
    pub fn into_json(self) -> ModelTypeResult<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Chooses and builds the response payload for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadBuilder {
    values: Vec<String>,
    page: Option<usize>,
    page_size: usize,
    exists: bool,
    count: bool,
}

impl PayloadBuilder {
    /// Creates a builder returning the full collection.
    pub fn new(page_size: usize) -> Self {
        Self {
            values: Vec::new(),
            page: None,
            page_size: page_size.max(1),
            exists: false,
            count: false,
        }
    }

    /// Takes the payload modifiers from `params`.
    pub fn from_params(params: &ListParams, settings: &Settings) -> Self {
        Self {
            values: params.values.clone().unwrap_or_default(),
            page: params.page,
            page_size: params.page_size(settings).max(1),
            exists: params.exists,
            count: params.count,
        }
    }

    /// Restricts output to `values`.
    #[must_use]
    pub fn values(mut self, values: Vec<String>) -> Self {
        self.values = values;
        self
    }

    /// Requests page `page`.
    #[must_use]
    pub const fn page(mut self, page: usize) -> Self {
        self.page = Some(page);
        self
    }

    /// Requests an existence check.
    #[must_use]
    pub const fn exists(mut self, exists: bool) -> Self {
        self.exists = exists;
        self
    }

    /// Requests a count.
    #[must_use]
    pub const fn count(mut self, count: bool) -> Self {
        self.count = count;
        self
    }

    fn serializer(&self, serializer: &ModelSerializer) -> ModelTypeResult<ModelSerializer> {
        if self.values.is_empty() {
            Ok(serializer.clone())
        } else {
            serializer.subset(&self.values)
        }
    }

    /// Evaluates `queryable` into the requested payload shape.
    pub async fn payload<T: Queryable>(
        &self,
        queryable: T,
        serializer: &ModelSerializer,
    ) -> ModelTypeResult<Payload> {
        let serializer = self.serializer(serializer)?;
        let queryable = if self.values.is_empty() {
            queryable
        } else {
            queryable.project(serializer.stored_fields())
        };

        if let Some(number) = self.page {
            let page = queryable.paginate(number, self.page_size).await?;
            tracing::debug!(
                page = page.number,
                pages = page.total_pages,
                "Returning paginated payload"
            );
            return Ok(Payload::Paginated {
                num_results: page.total_count,
                num_pages: page.total_pages,
                page: page.number,
                data: serializer.serialize_many(&page.items),
            });
        }
        if self.exists {
            tracing::debug!("Returning existence payload");
            return Ok(Payload::Exists(queryable.exists().await?));
        }
        if self.count {
            tracing::debug!("Returning count payload");
            return Ok(Payload::Count(queryable.count().await?));
        }
        let rows = queryable.fetch().await?;
        tracing::debug!(rows = rows.len(), "Returning full payload");
        Ok(Payload::Data(serializer.serialize_many(&rows)))
    }

    /// Fetches the row whose primary key is `pk` and serializes it.
    pub async fn payload_one<T: Queryable>(
        &self,
        queryable: T,
        pk: &Value,
        serializer: &ModelSerializer,
    ) -> ModelTypeResult<Payload> {
        let serializer = self.serializer(serializer)?;
        let row = queryable.get(pk).await?;
        Ok(Payload::Instance(serializer.serialize(&row)))
    }
}
