use crate::catalog::{
    CatalogClient, CatalogError, SOURCE_CATEGORY, TARGET_CATEGORY, build_category_id_map,
    upload_in_batches,
};
use crate::http::build_client;
use crate::ingest::normalize::NormalizeError;
use crate::ingest::reference::ReferenceError;
use crate::ingest::validate::ValidationError;
use crate::ingest::{
    Diagnostic, KeyRule, Lookups, NormalizedCatalog, load_reference_table, normalize_file,
    validate_csv,
};
use crate::logging::{LOG_TARGET, REPORT_TARGET};
use crate::models::{
    BatchUploadResult, CategoryIdMap, LookupTable, ProductRecord, RunContext, RunReport,
    StageReport,
};
use reqwest::Client;
use serde_json::{Value, json};
use std::{collections::BTreeMap, future::Future, time::Instant};
use thiserror::Error;
use tracing::info;

/// What a run does with its input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    /// Validate, normalize and upload a product file.
    ProductLoad,
    /// Publish a source-category map for the run's source.
    CategoryMap,
}

impl Job {
    pub fn stages(self) -> &'static [Stage] {
        match self {
            Job::ProductLoad => &[
                Stage::Validate,
                Stage::CategoryMapping,
                Stage::VarianceMapping,
                Stage::CategoryIds,
                Stage::ParseDetails,
                Stage::Persist,
            ],
            Job::CategoryMap => &[
                Stage::Validate,
                Stage::LoadSourceMapping,
                Stage::PublishCategoryMap,
            ],
        }
    }

    pub fn expected_header(self, ctx: &RunContext) -> Vec<String> {
        match self {
            Job::ProductLoad => ctx.product_headers.clone(),
            Job::CategoryMap => vec![SOURCE_CATEGORY.to_string(), TARGET_CATEGORY.to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validate,
    CategoryMapping,
    VarianceMapping,
    CategoryIds,
    ParseDetails,
    Persist,
    LoadSourceMapping,
    PublishCategoryMap,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Validate => "validate",
            Stage::CategoryMapping => "category_mapping",
            Stage::VarianceMapping => "variance_mapping",
            Stage::CategoryIds => "category_ids",
            Stage::ParseDetails => "parse_details",
            Stage::Persist => "persist",
            Stage::LoadSourceMapping => "load_source_mapping",
            Stage::PublishCategoryMap => "publish_category_map",
        }
    }

    async fn execute(self, state: &mut RunState) -> Result<Value, PipelineError> {
        let stage = self.name();
        match self {
            Stage::Validate => {
                let expected = state.job.expected_header(&state.ctx);
                info!(target: REPORT_TARGET, file = %state.ctx.csv_file.display(), "Validating csv file.");
                let summary = validate_csv(&state.ctx.csv_file, &expected)
                    .map_err(|err| validation_error(stage, err))?;
                Ok(json!({ "records": summary.records, "columns": expected.len() }))
            }
            Stage::CategoryMapping => {
                let table = load_reference_table(
                    &state.ctx.category_mapping,
                    &KeyRule::Column("from".to_string()),
                    "to",
                )
                .map_err(|err| reference_error(stage, err))?;
                state.category_map = table.entries;
                Ok(json!({ "entries": state.category_map.len(), "skipped": table.skipped }))
            }
            Stage::VarianceMapping => {
                let table = load_reference_table(
                    &state.ctx.variance_mapping,
                    &KeyRule::Lowercase("Variance".to_string()),
                    "Type",
                )
                .map_err(|err| reference_error(stage, err))?;
                state.variance_map = table.entries;
                Ok(json!({ "entries": state.variance_map.len(), "skipped": table.skipped }))
            }
            Stage::CategoryIds => {
                let entries = state
                    .client
                    .fetch_parent_categories()
                    .await
                    .map_err(|err| catalog_error(stage, err))?;
                let ids = build_category_id_map(&entries);
                let output = json!({ "received": entries.len(), "distinct": ids.len() });
                state.category_ids = Some(ids);
                Ok(output)
            }
            Stage::ParseDetails => {
                let category_ids = state.category_ids.as_ref().ok_or_else(|| {
                    PipelineError::internal(stage, "category IDs must be fetched before parsing rows")
                })?;
                let lookups = Lookups {
                    category_key: &state.category_key,
                    category_map: &state.category_map,
                    variance_map: &state.variance_map,
                    category_ids,
                };
                let catalog = normalize_file(&state.ctx.csv_file, lookups)
                    .map_err(|err: NormalizeError| PipelineError::internal(stage, err.to_string()))?;
                let output = json!({
                    "rows": catalog.rows,
                    "products": catalog.products.len(),
                    "variants": catalog.variant_count(),
                    "rejected": catalog.rejected(),
                    "warnings": catalog.warnings(),
                });
                state.catalog = catalog;
                Ok(output)
            }
            Stage::Persist => {
                let uploads = upload_in_batches(
                    &state.client,
                    &state.catalog.products,
                    state.ctx.batch_size,
                )
                .await
                .map_err(|err| catalog_error(stage, err))?;
                let failed = uploads.iter().filter(|batch| !batch.success).count();
                let output = json!({ "batches": uploads.len(), "failed": failed });
                state.uploads = uploads;
                Ok(output)
            }
            Stage::LoadSourceMapping => {
                let table = load_reference_table(
                    &state.ctx.csv_file,
                    &KeyRule::Column(SOURCE_CATEGORY.to_string()),
                    TARGET_CATEGORY,
                )
                .map_err(|err| reference_error(stage, err))?;
                state.source_map = table.entries.into_iter().collect();
                Ok(json!({ "entries": state.source_map.len(), "skipped": table.skipped }))
            }
            Stage::PublishCategoryMap => {
                state
                    .client
                    .publish_category_map(&state.ctx.source_id, &state.source_map)
                    .await
                    .map_err(|err| catalog_error(stage, err))?;
                Ok(json!({ "published": state.source_map.len() }))
            }
        }
    }
}

fn validation_error(stage: &'static str, err: ValidationError) -> PipelineError {
    match err {
        ValidationError::Invalid { .. } => PipelineError::invalid_input(stage, err.to_string()),
        ValidationError::Read { .. } => PipelineError::internal(stage, err.to_string()),
    }
}

fn reference_error(stage: &'static str, err: ReferenceError) -> PipelineError {
    match err {
        ReferenceError::MissingColumns { .. } => {
            PipelineError::invalid_input(stage, err.to_string())
        }
        ReferenceError::Read { .. } => PipelineError::internal(stage, err.to_string()),
    }
}

fn catalog_error(stage: &'static str, err: CatalogError) -> PipelineError {
    PipelineError::internal(stage, err.to_string())
}

/// Everything a single run reads and produces. Created per run and dropped
/// when it ends.
struct RunState {
    job: Job,
    ctx: RunContext,
    client: CatalogClient,
    category_key: KeyRule,
    category_map: LookupTable,
    variance_map: LookupTable,
    category_ids: Option<CategoryIdMap>,
    catalog: NormalizedCatalog,
    uploads: Vec<BatchUploadResult>,
    source_map: BTreeMap<String, String>,
}

impl RunState {
    fn new(job: Job, ctx: RunContext, http: Client) -> Self {
        let client = CatalogClient::for_run(&ctx, http);
        let category_key = KeyRule::from_columns(&ctx.category_fields);
        Self {
            job,
            ctx,
            client,
            category_key,
            category_map: LookupTable::new(),
            variance_map: LookupTable::new(),
            category_ids: None,
            catalog: NormalizedCatalog::default(),
            uploads: Vec::new(),
            source_map: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: RunReport,
    pub rows: usize,
    pub products: Vec<ProductRecord>,
    pub diagnostics: Vec<Diagnostic>,
    pub uploads: Vec<BatchUploadResult>,
}

impl RunOutcome {
    pub fn failed_batches(&self) -> usize {
        self.uploads.iter().filter(|batch| !batch.success).count()
    }
}

#[derive(Clone)]
pub struct Pipeline {
    http: Client,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::with_http(build_client())
    }

    pub fn with_http(http: Client) -> Self {
        Self { http }
    }

    /// Runs every stage of `job` in order. The first fatal error ends the run;
    /// batches already uploaded stay uploaded.
    pub async fn run(&self, ctx: RunContext, job: Job) -> Result<RunOutcome, PipelineError> {
        info!(
            target: REPORT_TARGET,
            job = ?job,
            "Loading {} with the following parameters: {}",
            ctx.csv_file.display(),
            ctx.describe()
        );
        let run_id = ctx.run_id.to_string();
        let mut state = RunState::new(job, ctx, self.http.clone());
        let mut stages = Vec::with_capacity(job.stages().len());

        for stage in job.stages() {
            info!(target: LOG_TARGET, stage = stage.name(), "stage started");
            self.capture_stage(stage.name(), &mut stages, stage.execute(&mut state))
                .await?;
        }

        let rejected = state.catalog.rejected();
        let warnings = state.catalog.warnings();
        let outcome = RunOutcome {
            report: RunReport { run_id, stages },
            rows: state.catalog.rows,
            products: state.catalog.products,
            diagnostics: state.catalog.diagnostics,
            uploads: state.uploads,
        };
        info!(
            target: REPORT_TARGET,
            rows = outcome.rows,
            products = outcome.products.len(),
            rejected,
            warnings,
            batches = outcome.uploads.len(),
            failed_batches = outcome.failed_batches(),
            "Processing completed."
        );
        Ok(outcome)
    }

    async fn capture_stage<Fut>(
        &self,
        name: &'static str,
        stages: &mut Vec<StageReport>,
        fut: Fut,
    ) -> Result<(), PipelineError>
    where
        Fut: Future<Output = Result<Value, PipelineError>>,
    {
        let started = Instant::now();
        let output = fut.await?;
        let elapsed_ms = started.elapsed().as_millis();
        crate::metrics::stage_elapsed(name, elapsed_ms);
        stages.push(StageReport::new(name, elapsed_ms, output));
        Ok(())
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Error)]
#[error("stage `{stage}` failed: {message}")]
pub struct PipelineError {
    stage: &'static str,
    message: String,
    kind: PipelineErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineErrorKind {
    InvalidInput,
    Internal,
}

impl PipelineError {
    pub fn invalid_input(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            kind: PipelineErrorKind::InvalidInput,
        }
    }

    pub fn internal(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            kind: PipelineErrorKind::Internal,
        }
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    pub fn kind(&self) -> PipelineErrorKind {
        self.kind
    }

    pub fn detail(&self) -> &str {
        &self.message
    }
}
