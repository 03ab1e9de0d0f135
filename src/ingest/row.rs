use csv::StringRecord;
use std::collections::HashMap;

/// Column name → position, built once from a header record.
#[derive(Debug, Clone)]
pub struct HeaderIndex {
    names: Vec<String>,
    positions: HashMap<String, usize>,
}

impl HeaderIndex {
    pub fn new(headers: &StringRecord) -> Self {
        let names: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
        let mut positions = HashMap::with_capacity(names.len());
        for (idx, name) in names.iter().enumerate() {
            // duplicate headers resolve to the first occurrence
            positions.entry(name.clone()).or_insert(idx);
        }
        Self { names, positions }
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    pub fn row<'a>(&'a self, record: &'a StringRecord) -> RowView<'a> {
        RowView {
            index: self,
            record,
        }
    }
}

/// Header-addressed access to one CSV record.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    index: &'a HeaderIndex,
    record: &'a StringRecord,
}

impl<'a> RowView<'a> {
    /// Raw field value; `None` when the column is not in the header.
    pub fn get(&self, column: &str) -> Option<&'a str> {
        self.index
            .position(column)
            .and_then(|idx| self.record.get(idx))
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.index.contains(column)
    }

    /// Trimmed field value, `None` when absent or blank.
    pub fn non_empty(&self, column: &str) -> Option<&'a str> {
        self.get(column)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn columns(&self) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        let record = self.record;
        self.index
            .names
            .iter()
            .enumerate()
            .filter_map(move |(idx, name)| record.get(idx).map(|value| (name.as_str(), value)))
    }
}
