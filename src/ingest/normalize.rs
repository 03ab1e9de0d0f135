use crate::ingest::reference::KeyRule;
use crate::ingest::resources::{resource_extension, resource_name, strip_markup};
use crate::ingest::row::{HeaderIndex, RowView};
use crate::logging::{LOG_TARGET, REPORT_TARGET};
use crate::models::{
    CategoryIdMap, ImageDescriptor, LookupTable, ProductRecord, VariantRecord,
};
use csv::ReaderBuilder;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use thiserror::Error;
use tracing::{error, info, warn};

/// Column names of the export that map onto variant fields.
pub mod columns {
    pub const NAME: &str = "Name";
    pub const PARENT_KEY: &str = "ParentKey";
    pub const PRICE: &str = "Price";
    pub const SALE_PRICE: &str = "SalePrice";
    pub const WEIGHT: &str = "Weight";
    pub const MANUFACTURER: &str = "Manufacturer";
    pub const SKU: &str = "Sku";
    pub const MANUFACTURER_SKU: &str = "ManufacturerSku";
    pub const SUPPLIER_SKU: &str = "SupplierSku";
    pub const SUMMARY: &str = "Summary";
    pub const DESCRIPTION: &str = "Description";
    pub const CATEGORIES: &str = "Categories";
    pub const IMAGE_URL: &str = "ImageUrl";
    pub const SUB_IMAGE_URL: &str = "Sub_ImageUrl";
    pub const OPTION: &str = "option";
    pub const QUANTITY: &str = "Quantity";
    pub const BARCODE: &str = "Barcode";
    pub const SERIAL_NO: &str = "SerialNo";

    pub const KNOWN: [&str; 18] = [
        NAME,
        PARENT_KEY,
        PRICE,
        SALE_PRICE,
        WEIGHT,
        MANUFACTURER,
        SKU,
        MANUFACTURER_SKU,
        SUPPLIER_SKU,
        SUMMARY,
        DESCRIPTION,
        CATEGORIES,
        IMAGE_URL,
        SUB_IMAGE_URL,
        OPTION,
        QUANTITY,
        BARCODE,
        SERIAL_NO,
    ];
}

pub const PLACEHOLDER_SERIAL: &str = "NOSERIAL";
pub const PLACEHOLDER_QUANTITY: i64 = 0;

/// The reference data every variant is resolved against.
#[derive(Debug, Clone, Copy)]
pub struct Lookups<'a> {
    pub category_key: &'a KeyRule,
    pub category_map: &'a LookupTable,
    pub variance_map: &'a LookupTable,
    pub category_ids: &'a CategoryIdMap,
}

/// Category ID for a raw source key: CategoryMap first, then the remote
/// name → ID table. A numeric mapping target is taken as the ID itself.
pub fn resolve_category_id(
    source_key: &str,
    category_map: &LookupTable,
    category_ids: &CategoryIdMap,
) -> Option<i64> {
    let target = category_map.get(source_key)?.trim();
    category_ids
        .get(target)
        .copied()
        .or_else(|| target.parse::<i64>().ok())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub line: usize,
    pub product: String,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("CSV file error: {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// Result of the second pass over the input.
#[derive(Debug, Clone, Default)]
pub struct NormalizedCatalog {
    pub products: Vec<ProductRecord>,
    pub diagnostics: Vec<Diagnostic>,
    pub rows: usize,
}

impl NormalizedCatalog {
    pub fn variant_count(&self) -> usize {
        self.products.iter().map(|p| p.variants.len()).sum()
    }

    pub fn rejected(&self) -> usize {
        self.count(Severity::Rejected)
    }

    pub fn warnings(&self) -> usize {
        self.count(Severity::Warning)
    }

    fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

/// Turns rows into variants and groups the accepted ones into products.
pub struct Normalizer<'a> {
    lookups: Lookups<'a>,
    known: HashSet<&'a str>,
    catalog: NormalizedCatalog,
}

impl<'a> Normalizer<'a> {
    pub fn new(lookups: Lookups<'a>) -> Self {
        let mut known: HashSet<&'a str> = columns::KNOWN.into_iter().collect();
        known.extend(lookups.category_key.columns());
        Self {
            lookups,
            known,
            catalog: NormalizedCatalog::default(),
        }
    }

    /// Processes the row at 1-based `line`.
    pub fn ingest(&mut self, line: usize, row: &RowView<'_>) {
        self.catalog.rows += 1;
        let mut variant = self.build_variant(line, row);
        if self.check(&mut variant) {
            insert_variant(&mut self.catalog.products, variant);
        }
    }

    pub fn finish(self) -> NormalizedCatalog {
        self.catalog
    }

    pub fn build_variant(&self, line: usize, row: &RowView<'_>) -> VariantRecord {
        let text = |column: &str| row.get(column).unwrap_or_default().to_string();
        let optional = |column: &str| row.non_empty(column).map(str::to_string);

        let category_id = self
            .lookups
            .category_key
            .key(|column| row.get(column))
            .and_then(|key| {
                resolve_category_id(&key, self.lookups.category_map, self.lookups.category_ids)
            });

        let option = row.non_empty(columns::OPTION);
        let variance = option.and_then(|value| {
            self.lookups
                .variance_map
                .get(&value.to_lowercase())
                .cloned()
        });
        let variance_value = variance
            .as_ref()
            .and(option)
            .map(str::to_string);

        let images = [columns::IMAGE_URL, columns::SUB_IMAGE_URL]
            .into_iter()
            .filter_map(|column| row.non_empty(column))
            .map(|url| ImageDescriptor {
                image_type: resource_extension(url),
                image_path: url.to_string(),
                image_name: resource_name(url),
                image_size: 0,
            })
            .collect();

        let attributes: BTreeMap<String, String> = row
            .columns()
            .filter(|(name, value)| !self.known.contains(name) && !value.trim().is_empty())
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();

        let product_name = text(columns::NAME);
        let group_key = row
            .non_empty(columns::PARENT_KEY)
            .map(str::to_string)
            .unwrap_or_else(|| product_name.clone());

        VariantRecord {
            line_number: line,
            group_key,
            category_id,
            product_name,
            manufacturer: text(columns::MANUFACTURER),
            short_description: strip_markup(&text(columns::SUMMARY)),
            long_description: strip_markup(&text(columns::DESCRIPTION)),
            sku: text(columns::SKU),
            manufacturer_sku: optional(columns::MANUFACTURER_SKU),
            supplier_sku: optional(columns::SUPPLIER_SKU),
            cost_price: text(columns::PRICE),
            // exports without a SalePrice column sell at Price
            sale_price: if row.has_column(columns::SALE_PRICE) {
                optional(columns::SALE_PRICE)
            } else {
                optional(columns::PRICE)
            },
            weight: text(columns::WEIGHT),
            quantity: row
                .non_empty(columns::QUANTITY)
                .and_then(|value| value.parse::<i64>().ok()),
            barcode: optional(columns::BARCODE),
            serial_number: optional(columns::SERIAL_NO),
            variance,
            variance_value,
            images,
            attributes,
            is_displayed: true,
            format: String::new(),
            id_at_source: 0,
            meta_title: None,
            meta_description: None,
            meta_keyword: None,
            status_only: "0".to_string(),
        }
    }

    /// Field-level validation and auto-repair. Returns whether the variant
    /// may enter a product.
    pub fn check(&mut self, variant: &mut VariantRecord) -> bool {
        if variant.category_id.is_none() {
            self.reject(variant, "missing_category", "does not have a category");
            return false;
        }
        if variant.sku.trim().is_empty() {
            self.reject(variant, "missing_sku", "does not have a SKU");
            return false;
        }

        if variant.short_description.is_empty() {
            self.warn(variant, "does not have a short description.".to_string());
        }
        if variant.long_description.is_empty() {
            self.warn(variant, "does not have a long description.".to_string());
        }
        if variant.images.is_empty() {
            self.warn(variant, "does not have any images.".to_string());
        }
        if variant.serial_number.is_none() {
            variant.serial_number = Some(PLACEHOLDER_SERIAL.to_string());
            self.warn(
                variant,
                format!("does not have a serial number; using {PLACEHOLDER_SERIAL}."),
            );
        }
        if variant.quantity.is_none() {
            variant.quantity = Some(PLACEHOLDER_QUANTITY);
            self.warn(
                variant,
                format!("does not have a quantity; defaulting to {PLACEHOLDER_QUANTITY}."),
            );
        }
        if variant.sale_price.is_none() {
            variant.is_displayed = false;
            self.warn(
                variant,
                "does not have a sale price; it will be uploaded hidden.".to_string(),
            );
        }
        true
    }

    fn reject(&mut self, variant: &VariantRecord, reason: &'static str, what: &str) {
        let message = format!(
            "Line No. {} Item : {} will not be uploaded since it {what}.",
            variant.line_number, variant.product_name
        );
        error!(
            target: REPORT_TARGET,
            line = variant.line_number,
            product = %variant.product_name,
            reason,
            "{message}"
        );
        crate::metrics::variant_rejected(reason);
        self.catalog.diagnostics.push(Diagnostic {
            line: variant.line_number,
            product: variant.product_name.clone(),
            severity: Severity::Rejected,
            message,
        });
    }

    fn warn(&mut self, variant: &VariantRecord, what: String) {
        let message = format!(
            "Line No. {} Item : {} {what}",
            variant.line_number, variant.product_name
        );
        warn!(target: LOG_TARGET, line = variant.line_number, "{message}");
        self.catalog.diagnostics.push(Diagnostic {
            line: variant.line_number,
            product: variant.product_name.clone(),
            severity: Severity::Warning,
            message,
        });
    }
}

/// Appends to the product with the same grouping key or starts a new one.
pub fn insert_variant(products: &mut Vec<ProductRecord>, variant: VariantRecord) {
    match products
        .iter_mut()
        .find(|product| product.name == variant.group_key)
    {
        Some(product) => product.variants.push(variant),
        None => products.push(ProductRecord::new(variant)),
    }
}

/// Second pass over the primary input: header-addressed rows, numbered from 1.
pub fn normalize_file(path: &Path, lookups: Lookups<'_>) -> Result<NormalizedCatalog, NormalizeError> {
    let read_error = |source: csv::Error| NormalizeError::Read {
        path: path.display().to_string(),
        source,
    };
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(read_error)?;
    let index = HeaderIndex::new(reader.headers().map_err(read_error)?);

    let mut normalizer = Normalizer::new(lookups);
    for (offset, record) in reader.records().enumerate() {
        let record = record.map_err(read_error)?;
        normalizer.ingest(offset + 1, &index.row(&record));
    }
    let catalog = normalizer.finish();

    info!(
        target: REPORT_TARGET,
        rows = catalog.rows,
        products = catalog.products.len(),
        rejected = catalog.rejected(),
        warnings = catalog.warnings(),
        "Done reading csv file containing {} rows with {} valid products.",
        catalog.rows,
        catalog.products.len()
    );
    Ok(catalog)
}
