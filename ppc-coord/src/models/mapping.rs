//! Column mapping validation
//!
//! A mapping assigns each detected source column name to a target schema
//! field. Validity only requires that every required field for the dataset
//! type receives at least one source column; unmapped source columns are
//! permitted and dropped downstream by the engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::job::DatasetType;

/// Source column name → target schema field name, one mapping per job.
///
/// BTreeMap keeps serialization order stable, so the dispatched payload and
/// anything hashed over it do not depend on insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnMapping(pub BTreeMap<String, String>);

impl ColumnMapping {
    /// Target fields this mapping assigns (may contain duplicates' worth of
    /// sources; each source maps to exactly one target by construction)
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.0.values().map(|s| s.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Outcome of validating a mapping against a dataset type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingValidation {
    pub valid: bool,
    /// Required fields with no assigned source column, in declaration order
    pub missing: Vec<String>,
}

/// Required target fields per dataset type
pub fn required_fields(dataset_type: DatasetType) -> &'static [&'static str] {
    match dataset_type {
        DatasetType::Shutdowns => &["company_id", "start_date", "end_date"],
        DatasetType::Needs => &["company_id", "item_name", "item_category", "quantity"],
        DatasetType::Suppliers => &["supplier_name"],
    }
}

/// Validate a mapping: valid iff every required field for the dataset type
/// appears at least once among the mapped target values.
pub fn validate(mapping: &ColumnMapping, dataset_type: DatasetType) -> MappingValidation {
    let missing: Vec<String> = required_fields(dataset_type)
        .iter()
        .filter(|field| !mapping.targets().any(|t| t == **field))
        .map(|field| field.to_string())
        .collect();

    MappingValidation {
        valid: missing.is_empty(),
        missing,
    }
}
