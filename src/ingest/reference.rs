use crate::ingest::row::HeaderIndex;
use crate::logging::REPORT_TARGET;
use crate::models::LookupTable;
use csv::ReaderBuilder;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Separator between the parts of a composite key.
pub const COMPOSITE_DELIMITER: &str = "|";

/// How a lookup key is built from the columns of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyRule {
    Column(String),
    /// Single column, lowercased.
    Lowercase(String),
    /// Several columns, whitespace runs replaced by `_`, joined by
    /// [`COMPOSITE_DELIMITER`]. Absent or blank parts are skipped.
    Composite(Vec<String>),
}

impl KeyRule {
    /// One column → `Column`, several → `Composite`.
    pub fn from_columns(columns: &[String]) -> Self {
        match columns {
            [single] => KeyRule::Column(single.clone()),
            many => KeyRule::Composite(many.to_vec()),
        }
    }

    pub fn columns(&self) -> Vec<&str> {
        match self {
            KeyRule::Column(column) | KeyRule::Lowercase(column) => vec![column.as_str()],
            KeyRule::Composite(columns) => columns.iter().map(String::as_str).collect(),
        }
    }

    /// Builds the key from a field accessor. Returns `None` for blank keys.
    pub fn key<'a, F>(&self, field: F) -> Option<String>
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        let key = match self {
            KeyRule::Column(column) => field(column)?.trim().to_string(),
            KeyRule::Lowercase(column) => field(column)?.trim().to_lowercase(),
            KeyRule::Composite(columns) => columns
                .iter()
                .filter_map(|column| field(column))
                .map(|part| part.split_whitespace().collect::<Vec<_>>().join("_"))
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(COMPOSITE_DELIMITER),
        };
        if key.is_empty() { None } else { Some(key) }
    }
}

#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("CSV file error: {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("{path} has no `{value_column}` column or none of the key columns {key_columns:?}")]
    MissingColumns {
        path: String,
        value_column: String,
        key_columns: Vec<String>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct ReferenceTable {
    pub entries: LookupTable,
    /// Data rows read, including the skipped ones.
    pub rows: usize,
    pub skipped: usize,
}

/// Loads a small lookup CSV (header row first) into memory. Later rows
/// overwrite earlier rows with the same key.
pub fn load_reference_table(
    path: &Path,
    key: &KeyRule,
    value_column: &str,
) -> Result<ReferenceTable, ReferenceError> {
    let read_error = |source: csv::Error| ReferenceError::Read {
        path: path.display().to_string(),
        source,
    };
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(read_error)?;
    let index = HeaderIndex::new(reader.headers().map_err(read_error)?);

    let any_key_column = key.columns().iter().any(|column| index.contains(column));
    if !index.contains(value_column) || !any_key_column {
        return Err(ReferenceError::MissingColumns {
            path: path.display().to_string(),
            value_column: value_column.to_string(),
            key_columns: key.columns().iter().map(|c| c.to_string()).collect(),
        });
    }

    let mut table = ReferenceTable::default();
    for record in reader.records() {
        let record = record.map_err(read_error)?;
        table.rows += 1;
        let row = index.row(&record);
        let entry = key
            .key(|column| row.get(column))
            .zip(row.non_empty(value_column));
        match entry {
            Some((k, v)) => {
                table.entries.insert(k, v.to_string());
            }
            None => {
                table.skipped += 1;
                debug!(row = table.rows, path = %path.display(), "reference row without key or value skipped");
            }
        }
    }

    info!(
        target: REPORT_TARGET,
        path = %path.display(),
        rows = table.rows,
        entries = table.entries.len(),
        "Done reading csv file with {} entries.",
        table.entries.len()
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::write_file;

    #[test]
    fn category_map_uses_from_and_to() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "category-mapping.csv",
            "from,to\nElectronics,ELEC\nGarden,GARDEN\n,ORPHAN\nElectronics,ELECTRONICS\n",
        );
        let table = load_reference_table(&path, &KeyRule::Column("from".into()), "to").unwrap();
        assert_eq!(table.rows, 4);
        assert_eq!(table.skipped, 1);
        assert_eq!(table.entries.len(), 2);
        assert_eq!(table.entries["Electronics"], "ELECTRONICS");
    }

    #[test]
    fn variance_keys_are_lowercased() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "variance-mapping.csv",
            "Variance,Type\nRed,Color\nXL,Size\n",
        );
        let table =
            load_reference_table(&path, &KeyRule::Lowercase("Variance".into()), "Type").unwrap();
        assert_eq!(table.entries.get("red").map(String::as_str), Some("Color"));
        assert_eq!(table.entries.get("xl").map(String::as_str), Some("Size"));
        assert!(table.entries.get("Red").is_none());
    }

    #[test]
    fn composite_keys_normalize_whitespace_and_skip_absent_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "composite.csv",
            "Department,Aisle,to\nHome  Garden,Outdoor Lights,7\n",
        );
        let rule = KeyRule::Composite(vec![
            "Department".into(),
            "Shelf".into(),
            "Aisle".into(),
        ]);
        let table = load_reference_table(&path, &rule, "to").unwrap();
        assert_eq!(table.entries["Home_Garden|Outdoor_Lights"], "7");
    }

    #[test]
    fn missing_value_column_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "bad.csv", "from,target\nA,B\n");
        let err = load_reference_table(&path, &KeyRule::Column("from".into()), "to").unwrap_err();
        assert!(matches!(err, ReferenceError::MissingColumns { .. }));
    }

    #[test]
    fn unreadable_table_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_reference_table(
            &dir.path().join("nope.csv"),
            &KeyRule::Column("from".into()),
            "to",
        )
        .unwrap_err();
        assert!(matches!(err, ReferenceError::Read { .. }));
    }
}
