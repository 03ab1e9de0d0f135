use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use uuid::Uuid;

/// Reference lookup loaded from a mapping CSV (category or variance map).
pub type LookupTable = HashMap<String, String>;

/// Trimmed remote category name → catalog category ID.
pub type CategoryIdMap = HashMap<String, i64>;

/// Immutable inputs of a single loader run.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    /// Base URL of the catalog service, scheme included.
    pub host: String,
    pub access_token: String,
    pub source_id: String,
    pub csv_file: PathBuf,
    pub product_headers: Vec<String>,
    /// Row columns combined into the category lookup key.
    pub category_fields: Vec<String>,
    pub batch_size: usize,
    pub category_mapping: PathBuf,
    pub variance_mapping: PathBuf,
}

impl RunContext {
    /// Parameters echoed into the report at the start of a run. The access
    /// token is never written out in full.
    pub fn describe(&self) -> Value {
        json!({
            "run_id": self.run_id.to_string(),
            "host": self.host,
            "accessToken": redact(&self.access_token),
            "sourceId": self.source_id,
            "csvFile": self.csv_file.display().to_string(),
            "batchSize": self.batch_size,
        })
    }
}

fn redact(token: &str) -> String {
    let visible: String = token.chars().take(4).collect();
    format!("{visible}…")
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageDescriptor {
    pub image_type: Option<String>,
    pub image_path: String,
    pub image_name: Option<String>,
    pub image_size: u64,
}

/// One sellable unit as sent to `/loadProducts`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VariantRecord {
    pub line_number: usize,
    #[serde(skip)]
    pub group_key: String,
    pub category_id: Option<i64>,
    pub product_name: String,
    pub manufacturer: String,
    pub short_description: String,
    pub long_description: String,
    pub sku: String,
    pub manufacturer_sku: Option<String>,
    pub supplier_sku: Option<String>,
    pub cost_price: String,
    pub sale_price: Option<String>,
    pub weight: String,
    /// Always set once the variant has passed validation.
    pub quantity: Option<i64>,
    pub barcode: Option<String>,
    #[serde(rename = "serialNo")]
    pub serial_number: Option<String>,
    pub variance: Option<String>,
    pub variance_value: Option<String>,
    pub images: Vec<ImageDescriptor>,
    pub attributes: BTreeMap<String, String>,
    pub is_displayed: bool,
    pub format: String,
    #[serde(rename = "teaIdAtSource")]
    pub id_at_source: i64,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub meta_keyword: Option<String>,
    pub status_only: String,
}

/// Variants sharing a grouping key. Never empty.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProductRecord {
    pub name: String,
    pub variants: Vec<VariantRecord>,
}

impl ProductRecord {
    pub fn new(first: VariantRecord) -> Self {
        Self {
            name: first.group_key.clone(),
            variants: vec![first],
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BatchUploadResult {
    /// 1-based position of the batch in upload order.
    pub index: usize,
    pub size: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct StageReport {
    pub name: String,
    pub elapsed_ms: u128,
    pub timestamp: DateTime<Utc>,
    pub output: Value,
}

impl StageReport {
    pub fn new(name: &str, elapsed_ms: u128, output: Value) -> Self {
        Self {
            name: name.to_string(),
            elapsed_ms,
            timestamp: Utc::now(),
            output,
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub stages: Vec<StageReport>,
}

impl RunReport {
    #[cfg(test)]
    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|stage| stage.name == name)
    }
}
