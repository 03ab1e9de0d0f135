use crate::models::RunContext;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("unexpected error calling {endpoint}: {message}")]
    Request {
        endpoint: &'static str,
        message: String,
    },
    #[error("unexpected status code {status} from {endpoint}")]
    Status { endpoint: &'static str, status: u16 },
    #[error("invalid response from {endpoint}: {message}")]
    InvalidBody {
        endpoint: &'static str,
        message: String,
    },
    #[error("{endpoint} reported an error: {message}")]
    Rejected {
        endpoint: &'static str,
        message: String,
    },
}

/// JSON-over-HTTP access to the remote catalog service.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    base_url: String,
    access_token: String,
    http: Client,
}

impl CatalogClient {
    #[cfg(test)]
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self::with_http(base_url, access_token, crate::http::build_client())
    }

    pub fn with_http(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
        http: Client,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            http,
        }
    }

    pub fn for_run(ctx: &RunContext, http: Client) -> Self {
        Self::with_http(ctx.host.clone(), ctx.access_token.clone(), http)
    }

    pub(crate) fn access_token(&self) -> &str {
        &self.access_token
    }

    /// POSTs `body` to `endpoint` and returns the raw body of a 200 response.
    /// Anything other than 200 is an error.
    pub(crate) async fn post_json<B: Serialize>(
        &self,
        endpoint: &'static str,
        body: &B,
    ) -> Result<String, CatalogError> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(target: "loader", %url, "Sending request");
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|err| CatalogError::Request {
                endpoint,
                message: err.to_string(),
            })?;

        if response.status() != StatusCode::OK {
            return Err(CatalogError::Status {
                endpoint,
                status: response.status().as_u16(),
            });
        }

        response.text().await.map_err(|err| CatalogError::Request {
            endpoint,
            message: err.to_string(),
        })
    }
}
