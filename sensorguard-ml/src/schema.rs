//! Dataset schema.
//!
//! Loaded from YAML and checked once at load time. `columns` lists the
//! layout after ingestion has removed `drop_columns`.
//!
//! ```yaml
//! columns:
//!   - class: object
//!   - aa_000: int64
//!   - name: ab_000
//!     dtype: float64
//! numerical_columns: [aa_000, ab_000]
//! drop_columns: [br_000]
//! ```

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// One declared column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub dtype: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawColumn {
    Spec(ColumnSpec),
    Short(BTreeMap<String, String>),
}

#[derive(Debug, Deserialize)]
struct RawSchema {
    columns: Vec<RawColumn>,
    numerical_columns: Vec<String>,
    #[serde(default)]
    drop_columns: Vec<String>,
}

/// Validated schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaConfig {
    pub columns: Vec<ColumnSpec>,
    pub numerical_columns: Vec<String>,
    pub drop_columns: Vec<String>,
}

impl SchemaConfig {
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::schema(format!("cannot read schema {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, PipelineError> {
        let raw: RawSchema = serde_yaml::from_str(text)
            .map_err(|e| PipelineError::schema(format!("invalid schema file: {e}")))?;

        let mut columns = Vec::with_capacity(raw.columns.len());
        for column in raw.columns {
            match column {
                RawColumn::Spec(spec) => columns.push(spec),
                RawColumn::Short(map) => {
                    if map.len() != 1 {
                        return Err(PipelineError::schema(format!(
                            "column entry must have exactly one name, found {}",
                            map.len()
                        )));
                    }
                    columns.extend(
                        map.into_iter()
                            .map(|(name, dtype)| ColumnSpec { name, dtype }),
                    );
                }
            }
        }

        let schema = Self {
            columns,
            numerical_columns: raw.numerical_columns,
            drop_columns: raw.drop_columns,
        };
        schema.check()?;
        Ok(schema)
    }

    fn check(&self) -> Result<(), PipelineError> {
        if self.columns.is_empty() {
            return Err(PipelineError::schema("schema declares no columns"));
        }
        let mut declared = HashSet::new();
        for column in &self.columns {
            if !declared.insert(column.name.as_str()) {
                return Err(PipelineError::schema(format!(
                    "column '{}' is declared twice",
                    column.name
                )));
            }
        }
        if let Some(missing) = self
            .numerical_columns
            .iter()
            .find(|c| !declared.contains(c.as_str()))
        {
            return Err(PipelineError::schema(format!(
                "numerical column '{missing}' is not declared in columns"
            )));
        }
        if let Some(dropped) = self
            .drop_columns
            .iter()
            .find(|c| declared.contains(c.as_str()))
        {
            return Err(PipelineError::schema(format!(
                "drop column '{dropped}' is also declared in columns"
            )));
        }
        Ok(())
    }

    pub fn expected_column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SCHEMA: &str = "
columns:
  - class: object
  - aa_000: int64
  - name: ab_000
    dtype: float64
numerical_columns:
  - aa_000
  - ab_000
drop_columns:
  - br_000
";

    #[test]
    fn test_parses_both_column_forms() {
        let schema = SchemaConfig::from_yaml_str(SCHEMA).unwrap();
        assert_eq!(schema.expected_column_count(), 3);
        assert_eq!(
            schema.column_names().collect::<Vec<_>>(),
            vec!["class", "aa_000", "ab_000"]
        );
        assert_eq!(schema.columns[2].dtype, "float64");
        assert_eq!(schema.drop_columns, vec!["br_000".to_string()]);
    }

    #[test]
    fn test_missing_key_fails_fast() {
        let err = SchemaConfig::from_yaml_str("columns:\n  - a: int64\n").unwrap_err();
        assert!(matches!(err, PipelineError::Schema(_)));
    }

    #[test]
    fn test_undeclared_numerical_column_is_rejected() {
        let err = SchemaConfig::from_yaml_str(
            "columns:\n  - a: int64\nnumerical_columns: [a, b]\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("'b'"));
    }

    #[test]
    fn test_drop_column_overlapping_columns_is_rejected() {
        let err = SchemaConfig::from_yaml_str(
            "columns:\n  - a: int64\nnumerical_columns: [a]\ndrop_columns: [a]\n",
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::Schema(_)));
    }

    #[test]
    fn test_empty_columns_is_rejected() {
        assert!(SchemaConfig::from_yaml_str("columns: []\nnumerical_columns: []\n").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("schema.yaml");
        std::fs::write(&path, SCHEMA).unwrap();
        let schema = SchemaConfig::load(&path).unwrap();
        assert_eq!(schema.numerical_columns.len(), 2);
        assert!(SchemaConfig::load(&dir.path().join("missing.yaml")).is_err());
    }
}
