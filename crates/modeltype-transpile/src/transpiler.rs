//! Generation runs.
//!
//! A [`Transpiler`] builds the unit of every model in its pool, renders the
//! TypeScript module and the JSON schema document, and publishes both into
//! the destination directory. Every unit is built before anything touches
//! the filesystem. Each artifact is written to a temporary file in the
//! destination and renamed into place. When any rename fails, the artifacts
//! already published by the run are rolled back to their previous contents,
//! so a failed run never leaves a partial set of artifacts behind.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use modeltype_core::logging::generation_span;
use modeltype_core::{ModelTypeError, ModelTypeResult, Settings};
use modeltype_db::{ModelPool, ModelRegistry};
use serde::Serialize;
use tempfile::{NamedTempFile, TempPath};

use crate::field_type::FieldTypeMap;
use crate::model_type::{ModelTypeTranspiler, ModelTypeUnit};
use crate::render::render_module;

/// The generated TypeScript module.
pub const MODULE_FILE: &str = "models.ts";

/// The generated JSON schema document.
pub const SCHEMA_FILE: &str = "schema.json";

/// The body of [`SCHEMA_FILE`].
#[derive(Debug, Serialize)]
pub struct SchemaDocument<'u> {
    pub models: &'u [ModelTypeUnit],
}

/// Rendered artifacts, not yet written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    pub module: String,
    pub schema: String,
}

/// The outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranspileReport {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub written: Vec<PathBuf>,
    pub models: usize,
}

/// Generates and publishes artifacts for a pool of models.
#[derive(Debug, Clone)]
pub struct Transpiler<'a> {
    registry: &'a ModelRegistry,
    models: Option<Vec<String>>,
    types: FieldTypeMap,
    dest: PathBuf,
}

impl<'a> Transpiler<'a> {
    /// Creates a transpiler over every model of `registry`, using the type
    /// overrides and destination from `settings`.
    pub fn new(registry: &'a ModelRegistry, settings: &Settings) -> Self {
        Self {
            registry,
            models: None,
            types: FieldTypeMap::from_settings(settings),
            dest: settings.transpile_dest.clone(),
        }
    }

    /// Restricts the pool to the named models.
    #[must_use]
    pub fn with_models<S: Into<String>>(mut self, models: impl IntoIterator<Item = S>) -> Self {
        self.models = Some(models.into_iter().map(Into::into).collect());
        self
    }

    /// Overrides the destination directory.
    #[must_use]
    pub fn with_dest(mut self, dest: impl Into<PathBuf>) -> Self {
        self.dest = dest.into();
        self
    }

    /// Returns the destination directory.
    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Returns the pool this transpiler generates for.
    ///
    /// # Errors
    ///
    /// Returns `ImproperlyConfigured` when a requested model is not registered.
    pub fn pool(&self) -> ModelTypeResult<ModelPool<'a>> {
        match &self.models {
            Some(names) => self.registry.pool(names),
            None => Ok(self.registry.full_pool()),
        }
    }

    /// Builds the unit of every pool model, in registration order.
    pub fn units(&self) -> ModelTypeResult<Vec<ModelTypeUnit>> {
        let pool = self.pool()?;
        let transpiler = ModelTypeTranspiler::new(&pool, &self.types);
        pool.models().map(|model| transpiler.transpile(model)).collect()
    }

    /// Builds and renders every artifact without writing anything.
    pub fn render(&self) -> ModelTypeResult<Artifacts> {
        let units = self.units()?;
        let schema = serde_json::to_string_pretty(&SchemaDocument { models: &units })?;
        Ok(Artifacts {
            module: render_module(&units),
            schema,
        })
    }

    /// Runs generation and publishes the artifacts.
    ///
    /// # Errors
    ///
    /// Returns the first unit error (nothing is written in that case), or an
    /// `IoError` when the destination cannot be written.
    pub fn transpile(&self) -> ModelTypeResult<TranspileReport> {
        let generated_at = Utc::now();
        let run_id = generated_at.format("%Y%m%dT%H%M%S%.3fZ").to_string();
        let models = self.pool()?.len();
        let span = generation_span(&run_id, models);
        let _guard = span.enter();

        let artifacts = self.render().map_err(|e| {
            tracing::error!(error = %e, "Generation aborted");
            e
        })?;

        std::fs::create_dir_all(&self.dest)?;
        let staged = vec![
            (MODULE_FILE, stage(&self.dest, &artifacts.module)?),
            (SCHEMA_FILE, stage(&self.dest, &artifacts.schema)?),
        ];
        let written = publish(&self.dest, staged).map_err(|e| {
            tracing::error!(error = %e, "Publishing aborted");
            e
        })?;

        tracing::info!(
            dest = %self.dest.display(),
            models,
            files = written.len(),
            "Generated artifacts"
        );
        Ok(TranspileReport {
            run_id,
            generated_at,
            written,
            models,
        })
    }
}

fn stage(dir: &Path, contents: &str) -> ModelTypeResult<NamedTempFile> {
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    Ok(file)
}

/// An artifact renamed into place, with the file it replaced.
struct Published {
    path: PathBuf,
    previous: Option<TempPath>,
}

/// Renames every staged file into `dir`, all or nothing.
fn publish(dir: &Path, staged: Vec<(&str, NamedTempFile)>) -> ModelTypeResult<Vec<PathBuf>> {
    let mut published: Vec<Published> = Vec::with_capacity(staged.len());
    for (name, file) in staged {
        let path = dir.join(name);
        match replace(dir, &path, file) {
            Ok(previous) => published.push(Published { path, previous }),
            Err(e) => {
                roll_back(published);
                return Err(e);
            }
        }
    }
    Ok(published.into_iter().map(|p| p.path).collect())
}

/// Moves the current file at `path` aside, then renames `file` over it. The
/// moved-aside file is put back if the rename fails.
fn replace(dir: &Path, path: &Path, file: NamedTempFile) -> ModelTypeResult<Option<TempPath>> {
    let previous = if path.is_file() {
        let slot = tempfile::Builder::new()
            .prefix(".modeltype-previous")
            .tempfile_in(dir)?
            .into_temp_path();
        std::fs::rename(path, &slot)?;
        Some(slot)
    } else {
        None
    };
    if let Err(e) = file.persist(path) {
        if let Some(slot) = &previous {
            restore(slot, path);
        }
        return Err(ModelTypeError::IoError(e.error));
    }
    Ok(previous)
}

fn roll_back(published: Vec<Published>) {
    for Published { path, previous } in published.into_iter().rev() {
        match previous {
            Some(slot) => restore(&slot, &path),
            None => {
                if let Err(e) = std::fs::remove_file(&path) {
                    tracing::warn!(path = %path.display(), error = %e, "Could not remove artifact");
                }
            }
        }
    }
}

fn restore(slot: &TempPath, path: &Path) {
    if let Err(e) = std::fs::rename(slot, path) {
        tracing::warn!(path = %path.display(), error = %e, "Could not restore artifact");
    }
}
