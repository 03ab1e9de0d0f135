use crate::http::normalize_base_url;
use crate::logging::LOG_TARGET;
use crate::models::RunContext;
use std::path::PathBuf;
use tracing::warn;
use uuid::Uuid;

pub const DEFAULT_PRODUCT_HEADERS: [&str; 11] = [
    "Name",
    "Price",
    "Weight",
    "Manufacturer",
    "Sku",
    "Summary",
    "Description",
    "Categories",
    "ImageUrl",
    "Sub_ImageUrl",
    "option",
];

const DEFAULT_BATCH_SIZE: usize = 5;

/// Process-level settings read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub batch_size: usize,
    pub category_mapping: PathBuf,
    pub variance_mapping: PathBuf,
    pub product_headers: Vec<String>,
    pub category_fields: Vec<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            category_mapping: PathBuf::from("config/category-mapping.csv"),
            variance_mapping: PathBuf::from("config/variance-mapping.csv"),
            product_headers: DEFAULT_PRODUCT_HEADERS
                .iter()
                .map(|h| h.to_string())
                .collect(),
            category_fields: vec!["Categories".to_string()],
        }
    }
}

impl LoaderConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            batch_size: batch_size_from(std::env::var("LOADER_BATCH_SIZE").ok().as_deref()),
            category_mapping: std::env::var("CATEGORY_MAPPING_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.category_mapping),
            variance_mapping: std::env::var("VARIANCE_MAPPING_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.variance_mapping),
            product_headers: env_list("PRODUCT_HEADERS").unwrap_or(defaults.product_headers),
            category_fields: env_list("CATEGORY_FIELDS").unwrap_or(defaults.category_fields),
        }
    }

    /// Read on its own so logging can be installed before the rest of the
    /// configuration is parsed.
    pub fn report_log_from_env() -> Option<PathBuf> {
        std::env::var("REPORT_LOG_PATH")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
    }

    pub fn run_context(
        &self,
        url: &str,
        access_token: &str,
        source_id: &str,
        csv_file: PathBuf,
    ) -> RunContext {
        RunContext {
            run_id: Uuid::new_v4(),
            host: normalize_base_url(url),
            access_token: access_token.to_string(),
            source_id: source_id.to_string(),
            csv_file,
            product_headers: self.product_headers.clone(),
            category_fields: self.category_fields.clone(),
            batch_size: self.batch_size,
            category_mapping: self.category_mapping.clone(),
            variance_mapping: self.variance_mapping.clone(),
        }
    }
}

/// `LOADER_BATCH_SIZE` must be a positive integer; anything else falls back
/// to the default with a warning.
fn batch_size_from(raw: Option<&str>) -> usize {
    let Some(raw) = raw else {
        return DEFAULT_BATCH_SIZE;
    };
    match raw.trim().parse::<usize>() {
        Ok(size) if size >= 1 => size,
        _ => {
            warn!(
                target: LOG_TARGET,
                value = raw,
                default = DEFAULT_BATCH_SIZE,
                "invalid LOADER_BATCH_SIZE, using default"
            );
            DEFAULT_BATCH_SIZE
        }
    }
}

fn env_list(key: &str) -> Option<Vec<String>> {
    let raw = std::env::var(key).ok()?;
    let items: Vec<String> = raw
        .split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect();
    if items.is_empty() { None } else { Some(items) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_size_falls_back_on_invalid_values() {
        assert_eq!(batch_size_from(None), DEFAULT_BATCH_SIZE);
        assert_eq!(batch_size_from(Some("0")), DEFAULT_BATCH_SIZE);
        assert_eq!(batch_size_from(Some("ten")), DEFAULT_BATCH_SIZE);
        assert_eq!(batch_size_from(Some(" 8 ")), 8);
    }

    #[test]
    fn run_context_carries_config() {
        let config = LoaderConfig {
            batch_size: 7,
            ..LoaderConfig::default()
        };
        let ctx = config.run_context("localhost:9000", "secret-token", "src-1", "in.csv".into());
        assert_eq!(ctx.host, "http://localhost:9000");
        assert_eq!(ctx.batch_size, 7);
        assert_eq!(ctx.product_headers.len(), DEFAULT_PRODUCT_HEADERS.len());
        let described = ctx.describe();
        assert_eq!(described["accessToken"], "secr…");
    }
}
