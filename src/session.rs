//! Explicit session context: a store of parsed datasets keyed by an opaque
//! identifier, plus the configuration every pipeline call runs with.
//!
//! A dataset is registered once; its schema is detected on the rows in file
//! order (the first row decides metric columns) and the rows are then sorted
//! chronologically when the time column allows it.

use std::{collections::BTreeMap, path::Path};

use anyhow::Result;
use heck::ToSnakeCase;
use log::{debug, info};
use thiserror::Error;

use crate::{
    config::AnalysisConfig,
    data::Dataset,
    ingest::{self, IngestOptions},
    io_utils,
    schema::{self, DetectedSchema},
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("dataset '{0}' was not found")]
    NotFound(String),
    #[error("schema for dataset '{0}' has not been computed yet")]
    NotComputed(String),
}

pub trait DatasetStore {
    fn insert(&mut self, id: &str, dataset: Dataset);
    fn dataset(&self, id: &str) -> Result<&Dataset, StoreError>;
    fn attach_schema(&mut self, id: &str, schema: DetectedSchema) -> Result<(), StoreError>;
    fn schema(&self, id: &str) -> Result<&DetectedSchema, StoreError>;
}

#[derive(Debug, Default)]
struct Entry {
    dataset: Dataset,
    schema: Option<DetectedSchema>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, Entry>,
}

impl DatasetStore for MemoryStore {
    fn insert(&mut self, id: &str, dataset: Dataset) {
        self.entries.insert(
            id.to_string(),
            Entry {
                dataset,
                schema: None,
            },
        );
    }

    fn dataset(&self, id: &str) -> Result<&Dataset, StoreError> {
        self.entries
            .get(id)
            .map(|entry| &entry.dataset)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn attach_schema(&mut self, id: &str, schema: DetectedSchema) -> Result<(), StoreError> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        entry.schema = Some(schema);
        Ok(())
    }

    fn schema(&self, id: &str) -> Result<&DetectedSchema, StoreError> {
        let entry = self
            .entries
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        entry
            .schema
            .as_ref()
            .ok_or_else(|| StoreError::NotComputed(id.to_string()))
    }
}

/// Identifier derived from a file name: `Enrolment Data 2024.csv` becomes
/// `enrolment_data_2024`. Standard input is `stdin`.
pub fn dataset_id(path: &Path) -> String {
    if io_utils::is_dash(path) {
        return "stdin".to_string();
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_snake_case())
        .unwrap_or_default();
    if stem.is_empty() {
        "dataset".to_string()
    } else {
        stem
    }
}

pub struct Session<S = MemoryStore> {
    store: S,
    config: AnalysisConfig,
}

impl Session<MemoryStore> {
    pub fn new(config: AnalysisConfig) -> Self {
        Self::with_store(MemoryStore::default(), config)
    }
}

impl<S: DatasetStore> Session<S> {
    pub fn with_store(store: S, config: AnalysisConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Detects the schema of `dataset`, orders its rows, and stores both.
    pub fn register(&mut self, id: &str, mut dataset: Dataset) -> Result<&DetectedSchema, StoreError> {
        let detected = schema::detect(&dataset);
        if self.config.sort_by_time
            && let Some(idx) = detected
                .time_column
                .as_deref()
                .and_then(|name| dataset.column_index(name))
            && dataset.sort_chronologically(idx)
        {
            debug!("Sorted '{id}' chronologically by column {idx}");
        }
        self.store.insert(id, dataset);
        self.store.attach_schema(id, detected)?;
        self.store.schema(id)
    }

    /// Reads a CSV file and registers it under an identifier derived from its
    /// name, which is returned.
    pub fn load_file(&mut self, path: &Path, options: IngestOptions) -> Result<String> {
        let dataset = ingest::load_dataset(path, options)?;
        let id = dataset_id(path);
        let detected = self.register(&id, dataset)?;
        info!(
            "Registered '{id}': {} row(s), {} metric column(s), {}",
            detected.row_count,
            detected.metric_columns.len(),
            detected.data_type
        );
        Ok(id)
    }

    /// The dataset and its schema, ready for pipeline calls.
    pub fn get(&self, id: &str) -> Result<(&Dataset, &DetectedSchema), StoreError> {
        Ok((self.store.dataset(id)?, self.store.schema(id)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;

    #[test]
    fn unknown_id_is_not_found() {
        let session = Session::new(AnalysisConfig::default());
        assert_eq!(
            session.get("missing").unwrap_err(),
            StoreError::NotFound("missing".to_string())
        );
    }

    #[test]
    fn dataset_without_schema_is_not_computed() {
        let mut store = MemoryStore::default();
        store.insert("raw", Dataset::default());
        assert!(store.dataset("raw").is_ok());
        assert_eq!(
            store.schema("raw").unwrap_err(),
            StoreError::NotComputed("raw".to_string())
        );
    }

    #[test]
    fn register_sorts_rows_after_detection() {
        let dataset = Dataset::from_raw(
            &["Year", "Count"],
            &[vec!["2022", "30"], vec!["2020", "10"], vec!["2021", "20"]],
        );
        let mut session = Session::new(AnalysisConfig::default());
        session.register("counts", dataset).expect("register");
        let (stored, detected) = session.get("counts").expect("stored");
        assert_eq!(detected.metric_columns, vec!["Count"]);
        assert_eq!(stored.value(0, 0), Some(&Value::Number(2020.0)));
    }

    #[test]
    fn register_can_keep_file_order() {
        let dataset = Dataset::from_raw(&["Year", "Count"], &[vec!["2022", "30"], vec!["2020", "10"]]);
        let config = AnalysisConfig {
            sort_by_time: false,
            ..AnalysisConfig::default()
        };
        let mut session = Session::new(config);
        session.register("counts", dataset).expect("register");
        let (stored, _) = session.get("counts").expect("stored");
        assert_eq!(stored.value(0, 0), Some(&Value::Number(2022.0)));
    }

    #[test]
    fn ids_come_from_file_names() {
        assert_eq!(dataset_id(Path::new("data/Enrolment Data 2024.csv")), "enrolment_data_2024");
        assert_eq!(dataset_id(Path::new("-")), "stdin");
    }
}
