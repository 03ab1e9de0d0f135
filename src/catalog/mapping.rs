use crate::catalog::client::{CatalogClient, CatalogError};
use crate::logging::REPORT_TARGET;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

pub const CATEGORY_MAP_PATH: &str = "/categoryMap";
pub const SOURCE_CATEGORY: &str = "source_category";
pub const TARGET_CATEGORY: &str = "tea_category";

#[derive(Debug, Serialize)]
struct CategoryMapRequest<'a> {
    access_token: &'a str,
    source_id: &'a str,
    map: &'a BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct CategoryMapResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl CatalogClient {
    /// Publishes a source-category → catalog-category map for `source_id`.
    /// Anything but a `Success` response fails the call.
    pub async fn publish_category_map(
        &self,
        source_id: &str,
        map: &BTreeMap<String, String>,
    ) -> Result<(), CatalogError> {
        let endpoint = CATEGORY_MAP_PATH;
        let body = self
            .post_json(
                endpoint,
                &CategoryMapRequest {
                    access_token: self.access_token(),
                    source_id,
                    map,
                },
            )
            .await?;
        let payload: CategoryMapResponse =
            serde_json::from_str(&body).map_err(|err| CatalogError::InvalidBody {
                endpoint,
                message: err.to_string(),
            })?;

        match payload.response.as_deref() {
            Some("Success") => {
                info!(target: REPORT_TARGET, entries = map.len(), "Successfully saved category map.");
                Ok(())
            }
            other => Err(CatalogError::Rejected {
                endpoint,
                message: payload
                    .message
                    .or_else(|| other.map(str::to_string))
                    .unwrap_or_else(|| "no response status".into()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubBehavior, StubCatalog};
    use serde_json::json;

    fn sample_map() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("Lamps".to_string(), "Lighting".to_string()),
            ("Sofas".to_string(), "Furniture".to_string()),
        ])
    }

    #[tokio::test]
    async fn map_is_posted_with_snake_case_fields() {
        let stub = StubCatalog::start(StubBehavior::default()).await;
        let client = CatalogClient::new(&stub.base_url, "tok");
        client.publish_category_map("17", &sample_map()).await.unwrap();

        let requests = stub.requests_to(CATEGORY_MAP_PATH);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0]["access_token"], "tok");
        assert_eq!(requests[0]["source_id"], "17");
        assert_eq!(requests[0]["map"]["Lamps"], "Lighting");
    }

    #[tokio::test]
    async fn refused_map_is_an_error() {
        let stub = StubCatalog::start(StubBehavior {
            category_map: json!({"response": "Error", "message": "unknown source"}),
            ..StubBehavior::default()
        })
        .await;
        let client = CatalogClient::new(&stub.base_url, "tok");
        let err = client.publish_category_map("17", &sample_map()).await.unwrap_err();
        assert!(matches!(err, CatalogError::Rejected { .. }));
        assert!(err.to_string().contains("unknown source"));
    }
}
