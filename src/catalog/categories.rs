use crate::catalog::client::{CatalogClient, CatalogError};
use crate::logging::REPORT_TARGET;
use crate::models::CategoryIdMap;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, PickFirst, serde_as};
use tracing::info;

pub const PARENT_CATEGORIES_PATH: &str = "/getParentCategories";

#[serde_as]
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CategoryEntry {
    pub name: String,
    /// Some deployments send the ID as a string.
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub category_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ParentCategoriesRequest<'a> {
    access_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct ParentCategoriesResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    categories: Option<Vec<CategoryEntry>>,
}

impl CatalogClient {
    pub async fn fetch_parent_categories(&self) -> Result<Vec<CategoryEntry>, CatalogError> {
        let endpoint = PARENT_CATEGORIES_PATH;
        let body = self
            .post_json(
                endpoint,
                &ParentCategoriesRequest {
                    access_token: self.access_token(),
                },
            )
            .await?;

        if body.trim().is_empty() {
            return Err(CatalogError::InvalidBody {
                endpoint,
                message: "empty body".into(),
            });
        }
        let payload: ParentCategoriesResponse =
            serde_json::from_str(&body).map_err(|err| CatalogError::InvalidBody {
                endpoint,
                message: err.to_string(),
            })?;

        if payload.response.as_deref() == Some("Error") {
            return Err(CatalogError::Rejected {
                endpoint,
                message: payload
                    .message
                    .unwrap_or_else(|| "Failed to retrieve category IDs.".into()),
            });
        }

        let categories = payload.categories.ok_or_else(|| CatalogError::InvalidBody {
            endpoint,
            message: "missing `categories`".into(),
        })?;
        info!(
            target: REPORT_TARGET,
            count = categories.len(),
            "Successfully retrieved {} Category IDs.",
            categories.len()
        );
        Ok(categories)
    }
}

/// Trimmed name → ID. When two entries share a trimmed name the later one
/// in the response wins.
pub fn build_category_id_map(entries: &[CategoryEntry]) -> CategoryIdMap {
    let mut map = CategoryIdMap::with_capacity(entries.len());
    for entry in entries {
        map.insert(entry.name.trim().to_string(), entry.category_id);
    }
    map
}
