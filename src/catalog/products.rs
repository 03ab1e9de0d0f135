use crate::catalog::client::{CatalogClient, CatalogError};
use crate::logging::REPORT_TARGET;
use crate::metrics;
use crate::models::{BatchUploadResult, ProductRecord};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::{error, info};

pub const LOAD_PRODUCTS_PATH: &str = "/loadProducts";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoadProductsRequest<'a> {
    access_token: &'a str,
    products: &'a [ProductRecord],
}

#[derive(Debug, Deserialize)]
struct LoadProductsResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Outcome of a single 200 response from `/loadProducts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Saved,
    Failed(String),
}

/// Splits `count` items into consecutive ranges of `size`; the last range
/// holds the remainder.
pub fn plan_batches(count: usize, size: usize) -> Vec<Range<usize>> {
    let size = size.max(1);
    (0..count)
        .step_by(size)
        .map(|start| start..(start + size).min(count))
        .collect()
}

impl CatalogClient {
    /// Uploads one batch. Transport errors and non-200 statuses are returned as
    /// errors; a 200 that does not report success is a [`BatchOutcome::Failed`].
    pub async fn load_products(
        &self,
        products: &[ProductRecord],
    ) -> Result<BatchOutcome, CatalogError> {
        let body = self
            .post_json(
                LOAD_PRODUCTS_PATH,
                &LoadProductsRequest {
                    access_token: self.access_token(),
                    products,
                },
            )
            .await?;

        let outcome = match serde_json::from_str::<LoadProductsResponse>(&body) {
            Ok(LoadProductsResponse {
                response: Some(status),
                ..
            }) if status == "Success" => BatchOutcome::Saved,
            Ok(payload) => BatchOutcome::Failed(
                payload
                    .message
                    .or(payload.response)
                    .unwrap_or_else(|| "no response status".into()),
            ),
            Err(err) => BatchOutcome::Failed(format!("undecodable response: {err}")),
        };
        Ok(outcome)
    }
}

/// Uploads `products` sequentially in batches of `batch_size`. A batch that
/// the service refuses is recorded and the remaining batches still go out.
pub async fn upload_in_batches(
    client: &CatalogClient,
    products: &[ProductRecord],
    batch_size: usize,
) -> Result<Vec<BatchUploadResult>, CatalogError> {
    if products.is_empty() {
        info!(target: REPORT_TARGET, "No products to upload.");
        return Ok(Vec::new());
    }

    let plan = plan_batches(products.len(), batch_size);
    let last = plan.len();
    let mut results = Vec::with_capacity(last);
    for (position, range) in plan.into_iter().enumerate() {
        let index = position + 1;
        let size = range.len();
        if index == last && size < batch_size {
            info!(target: REPORT_TARGET, "Loading last batch.");
        } else {
            info!(target: REPORT_TARGET, "Loading batch: {index}");
        }

        let result = match client.load_products(&products[range]).await? {
            BatchOutcome::Saved => {
                info!(target: REPORT_TARGET, batch = index, size, "Successfully saved products.");
                BatchUploadResult {
                    index,
                    size,
                    success: true,
                    message: None,
                }
            }
            BatchOutcome::Failed(message) => {
                error!(
                    target: REPORT_TARGET,
                    batch = index,
                    size,
                    "Transaction completed with the following errors:\n{message}"
                );
                BatchUploadResult {
                    index,
                    size,
                    success: false,
                    message: Some(message),
                }
            }
        };
        metrics::batch_uploaded(index, size, result.success);
        results.push(result);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubBehavior, StubCatalog, sample_product};

    #[test]
    fn plan_covers_remainder_in_last_batch() {
        assert_eq!(plan_batches(12, 5), vec![0..5, 5..10, 10..12]);
        assert_eq!(plan_batches(10, 5), vec![0..5, 5..10]);
        assert_eq!(plan_batches(3, 5), vec![0..3]);
        assert!(plan_batches(0, 5).is_empty());
    }

    #[tokio::test]
    async fn batches_go_out_in_order_with_token() {
        let stub = StubCatalog::start(StubBehavior::default()).await;
        let client = CatalogClient::new(&stub.base_url, "secret");
        let products: Vec<_> = (1..=7).map(|n| sample_product(&format!("P{n}"), n)).collect();

        let results = upload_in_batches(&client, &products, 3).await.unwrap();
        assert_eq!(results.iter().map(|r| r.size).collect::<Vec<_>>(), vec![3, 3, 1]);
        assert!(results.iter().all(|r| r.success));
        assert_eq!(stub.upload_sizes(), vec![3, 3, 1]);

        let uploads = stub.uploads();
        assert_eq!(uploads[0]["accessToken"], "secret");
        let names: Vec<String> = uploads
            .iter()
            .flat_map(|body| body["products"].as_array().cloned().unwrap_or_default())
            .map(|product| product["name"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(names, vec!["P1", "P2", "P3", "P4", "P5", "P6", "P7"]);
    }

    #[tokio::test]
    async fn refused_batch_does_not_stop_the_upload() {
        let stub = StubCatalog::start(StubBehavior {
            failing_batches: vec![2],
            ..StubBehavior::default()
        })
        .await;
        let client = CatalogClient::new(&stub.base_url, "t");
        let products: Vec<_> = (1..=6).map(|n| sample_product(&format!("P{n}"), n)).collect();

        let results = upload_in_batches(&client, &products, 2).await.unwrap();
        assert_eq!(results.len(), 3);
        assert!(results[0].success);
        assert!(!results[1].success);
        assert_eq!(results[1].message.as_deref(), Some("duplicate sku"));
        assert!(results[2].success);
    }

    #[tokio::test]
    async fn non_200_upload_is_fatal() {
        let stub = StubCatalog::start(StubBehavior {
            upload_status: 500,
            ..StubBehavior::default()
        })
        .await;
        let client = CatalogClient::new(&stub.base_url, "t");
        let products = vec![sample_product("P1", 1)];
        let err = upload_in_batches(&client, &products, 5).await.unwrap_err();
        assert!(matches!(err, CatalogError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn empty_product_list_makes_no_calls() {
        let stub = StubCatalog::start(StubBehavior::default()).await;
        let client = CatalogClient::new(&stub.base_url, "t");
        let results = upload_in_batches(&client, &[], 5).await.unwrap();
        assert!(results.is_empty());
        assert!(stub.uploads().is_empty());
    }
}
