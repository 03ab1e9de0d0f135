use crate::logging::REPORT_TARGET;
use csv::{ReaderBuilder, StringRecord};
use std::{fmt, path::Path};
use thiserror::Error;
use tracing::info;

/// One structural problem found while scanning the input. Line 0 is the
/// header; data rows are numbered from 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineError {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for LineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("CSV file error: {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("{}", join_lines(.errors))]
    Invalid { errors: Vec<LineError> },
}

impl ValidationError {
    pub fn line_errors(&self) -> &[LineError] {
        match self {
            ValidationError::Invalid { errors } => errors,
            ValidationError::Read { .. } => &[],
        }
    }
}

fn join_lines(errors: &[LineError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationSummary {
    /// Data rows seen, header excluded.
    pub records: usize,
}

/// Streams `path` once, checking the header against `expected` and every
/// data row's column count. Structural problems are collected and reported
/// together; a read failure aborts immediately.
pub fn validate_csv(path: &Path, expected: &[String]) -> Result<ValidationSummary, ValidationError> {
    let read_error = |source: csv::Error| ValidationError::Read {
        path: path.display().to_string(),
        source,
    };
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(read_error)?;

    let mut errors = Vec::new();
    let mut records = 0usize;
    let mut saw_header = false;
    let mut record = StringRecord::new();

    while reader.read_record(&mut record).map_err(read_error)? {
        if !saw_header {
            saw_header = true;
            check_header(&record, expected, &mut errors);
            continue;
        }
        records += 1;
        if record.len() != expected.len() {
            errors.push(LineError {
                line: records,
                message: format!(
                    "Line {records} currently has {} columns. Proper format requires {} columns. Row content: {}",
                    record.len(),
                    expected.len(),
                    record.iter().collect::<Vec<_>>().join(",")
                ),
            });
        }
    }

    if !saw_header {
        errors.push(LineError {
            line: 0,
            message: format!(
                "Line 0 (header): file is empty. File headers should be: {}",
                expected.join(",")
            ),
        });
    }

    info!(
        target: REPORT_TARGET,
        records,
        line_errors = errors.len(),
        "Done reading csv file containing {records} records."
    );

    if errors.is_empty() {
        Ok(ValidationSummary { records })
    } else {
        Err(ValidationError::Invalid { errors })
    }
}

fn check_header(header: &StringRecord, expected: &[String], errors: &mut Vec<LineError>) {
    let width = header.len().max(expected.len());
    for idx in 0..width {
        let found = header.get(idx);
        let wanted = expected.get(idx).map(String::as_str);
        if found == wanted {
            continue;
        }
        errors.push(LineError {
            line: 0,
            message: format!(
                "Line 0 (header): column {} is {}, expected {}. File headers should be: {}",
                idx + 1,
                describe(found),
                describe(wanted),
                expected.join(",")
            ),
        });
    }
}

fn describe(value: Option<&str>) -> String {
    match value {
        Some(v) => format!("\"{v}\""),
        None => "missing".to_string(),
    }
}
