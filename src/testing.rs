use crate::config::LoaderConfig;
use crate::models::{ProductRecord, RunContext, VariantRecord};
use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("write fixture");
    path
}

/// Canned responses for [`StubCatalog`].
#[derive(Debug, Clone)]
pub struct StubBehavior {
    pub categories: Value,
    pub categories_status: u16,
    /// 1-based upload calls answered with an `Error` response.
    pub failing_batches: Vec<usize>,
    pub upload_status: u16,
    pub category_map: Value,
}

impl Default for StubBehavior {
    fn default() -> Self {
        Self {
            categories: json!({
                "response": "Success",
                "categories": [
                    {"name": "ELEC", "category_id": 42},
                    {"name": "GARDEN", "category_id": 9}
                ]
            }),
            categories_status: 200,
            failing_batches: Vec::new(),
            upload_status: 200,
            category_map: json!({"response": "Success"}),
        }
    }
}

struct StubState {
    behavior: StubBehavior,
    requests: Mutex<Vec<(String, Value)>>,
}

impl StubState {
    fn record(&self, path: &str, body: Value) -> usize {
        let mut requests = self.requests.lock().expect("stub lock");
        requests.push((path.to_string(), body));
        requests.iter().filter(|(p, _)| p == path).count()
    }
}

/// In-process catalog service bound to an ephemeral local port.
pub struct StubCatalog {
    pub base_url: String,
    state: Arc<StubState>,
}

impl StubCatalog {
    pub async fn start(behavior: StubBehavior) -> Self {
        let state = Arc::new(StubState {
            behavior,
            requests: Mutex::new(Vec::new()),
        });
        let app = Router::new()
            .route("/getParentCategories", post(parent_categories))
            .route("/loadProducts", post(load_products))
            .route("/categoryMap", post(category_map))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub");
        let addr = listener.local_addr().expect("stub addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    pub fn requests(&self) -> Vec<(String, Value)> {
        self.state.requests.lock().expect("stub lock").clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<Value> {
        self.requests()
            .into_iter()
            .filter(|(p, _)| p == path)
            .map(|(_, body)| body)
            .collect()
    }

    pub fn uploads(&self) -> Vec<Value> {
        self.requests_to("/loadProducts")
    }

    pub fn upload_sizes(&self) -> Vec<usize> {
        self.uploads()
            .iter()
            .map(|body| body["products"].as_array().map_or(0, Vec::len))
            .collect()
    }
}

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::OK)
}

async fn parent_categories(
    State(state): State<Arc<StubState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.record("/getParentCategories", body);
    (
        status(state.behavior.categories_status),
        Json(state.behavior.categories.clone()),
    )
}

async fn load_products(
    State(state): State<Arc<StubState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let call = state.record("/loadProducts", body);
    let response = if state.behavior.failing_batches.contains(&call) {
        json!({"response": "Error", "message": "duplicate sku"})
    } else {
        json!({"response": "Success"})
    };
    (status(state.behavior.upload_status), Json(response))
}

async fn category_map(
    State(state): State<Arc<StubState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.record("/categoryMap", body);
    (StatusCode::OK, Json(state.behavior.category_map.clone()))
}

pub fn sample_product(name: &str, line: usize) -> ProductRecord {
    ProductRecord::new(VariantRecord {
        line_number: line,
        group_key: name.to_string(),
        category_id: Some(42),
        product_name: name.to_string(),
        manufacturer: "Acme".to_string(),
        short_description: "short".to_string(),
        long_description: "long".to_string(),
        sku: format!("SKU-{line}"),
        manufacturer_sku: None,
        supplier_sku: None,
        cost_price: "10.00".to_string(),
        sale_price: Some("10.00".to_string()),
        weight: "1".to_string(),
        quantity: Some(1),
        barcode: None,
        serial_number: Some("SN".to_string()),
        variance: None,
        variance_value: None,
        images: Vec::new(),
        attributes: BTreeMap::new(),
        is_displayed: true,
        format: String::new(),
        id_at_source: 0,
        meta_title: None,
        meta_description: None,
        meta_keyword: None,
        status_only: "0".to_string(),
    })
}

/// Run context pointing at `base_url` with mapping tables written into `dir`:
/// `Electronics → ELEC`, `Garden → GARDEN`, variances `red → Color`, `xl → Size`.
pub fn fixture_context(base_url: &str, dir: &Path, csv_file: PathBuf, batch_size: usize) -> RunContext {
    let category_mapping = write_file(
        dir,
        "category-mapping.csv",
        "from,to\nElectronics,ELEC\nGarden,GARDEN\n",
    );
    let variance_mapping = write_file(dir, "variance-mapping.csv", "Variance,Type\nRed,Color\nXL,Size\n");
    let config = LoaderConfig {
        batch_size,
        category_mapping,
        variance_mapping,
        ..LoaderConfig::default()
    };
    config.run_context(base_url, "test-token", "source-1", csv_file)
}
