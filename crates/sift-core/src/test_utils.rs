//! Test utilities for sift-core
//!
//! Provides a mock processing service speaking the real HTTP contract, for
//! integration tests and for running the CLI without a backend.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::analytics::SpendingInsights;
use crate::models::{Amount, Receipt, ReceiptId, ReceiptStatus};

#[derive(Default)]
struct ServerState {
    receipts: Vec<Receipt>,
    /// Uploaded bytes per receipt id, for duplicate detection
    uploads: HashMap<ReceiptId, Vec<u8>>,
    next_id: i64,
    requests: Vec<String>,
    insights: Option<SpendingInsights>,
    insights_down: bool,
}

type Shared = Arc<Mutex<ServerState>>;

fn lock(state: &Shared) -> MutexGuard<'_, ServerState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// Mock receipt processing server
///
/// "OCR" reads the upload as text: lines of `key: value` for merchant,
/// date, total, category and payment_method. Re-uploading identical bytes
/// is flagged as a duplicate of the first upload.
pub struct MockReceiptServer {
    addr: SocketAddr,
    state: Shared,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockReceiptServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(ServerState {
            next_id: 1,
            ..Default::default()
        }));

        let app = Router::new()
            .route("/process", post(handle_process))
            .route("/duplicate-pair/:id", get(handle_duplicate_pair))
            .route("/receipt/:id", get(handle_receipt))
            .route("/receipts", get(handle_list))
            .route("/approve/:id", post(handle_approve))
            .route("/reject/:id", post(handle_reject))
            .route("/analytics/spending", get(handle_insights))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Store a receipt directly, assigning an id when it has none
    pub fn seed(&self, mut receipt: Receipt) -> ReceiptId {
        let mut state = lock(&self.state);
        let id = receipt.id.clone().unwrap_or_else(|| {
            let id = ReceiptId::from(state.next_id);
            receipt.id = Some(id.clone());
            id
        });
        if let Ok(n) = id.as_str().parse::<i64>() {
            state.next_id = state.next_id.max(n + 1);
        }
        state.receipts.push(receipt);
        id
    }

    pub fn set_insights(&self, insights: SpendingInsights) {
        lock(&self.state).insights = Some(insights);
    }

    /// Make the insights endpoint answer 503
    pub fn take_insights_down(&self) {
        lock(&self.state).insights_down = true;
    }

    /// `"METHOD /path"` for every request received, in order
    pub fn requests(&self) -> Vec<String> {
        lock(&self.state).requests.clone()
    }

    pub fn receipt(&self, id: &ReceiptId) -> Option<Receipt> {
        lock(&self.state)
            .receipts
            .iter()
            .find(|r| r.id.as_ref() == Some(id))
            .cloned()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockReceiptServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn error(status: StatusCode, detail: impl Into<String>) -> Response {
    (status, Json(json!({ "detail": detail.into() }))).into_response()
}

fn not_found(id: &str) -> Response {
    error(StatusCode::NOT_FOUND, format!("Receipt {} not found", id))
}

/// Pull receipt fields out of `key: value` lines
fn extract_receipt(text: &str) -> Receipt {
    let mut receipt = Receipt {
        raw_text: text.to_string(),
        ..Default::default()
    };
    let mut fields = serde_json::Map::new();
    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim().to_string();
        match key.as_str() {
            "merchant" => receipt.merchant = Some(value.clone()),
            "date" => receipt.date = Some(value.clone()),
            "total" => receipt.total = Some(Amount::from(value.as_str())),
            "category" => receipt.category = Some(value.clone()),
            "payment_method" => receipt.payment_method = Some(value.clone()),
            _ => continue,
        }
        fields.insert(key, Value::String(value));
    }
    receipt.parsed_fields = Value::Object(fields);
    receipt
}

async fn handle_process(State(state): State<Shared>, mut multipart: Multipart) -> Response {
    let mut upload = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some("file") => match field.bytes().await {
                Ok(bytes) => upload = Some(bytes.to_vec()),
                Err(e) => return error(StatusCode::BAD_REQUEST, e.to_string()),
            },
            Ok(Some(_)) => continue,
            Ok(None) => break,
            Err(e) => return error(StatusCode::BAD_REQUEST, e.to_string()),
        }
    }

    let mut state = lock(&state);
    state.requests.push("POST /process".to_string());

    let Some(bytes) = upload else {
        return error(StatusCode::UNPROCESSABLE_ENTITY, "No file uploaded");
    };
    if bytes.is_empty() {
        return error(StatusCode::UNPROCESSABLE_ENTITY, "Uploaded file is empty");
    }

    let duplicate_of = state
        .receipts
        .iter()
        .filter_map(|r| r.id.clone())
        .find(|id| state.uploads.get(id) == Some(&bytes));

    let id = ReceiptId::from(state.next_id);
    state.next_id += 1;

    let mut receipt = extract_receipt(&String::from_utf8_lossy(&bytes));
    receipt.id = Some(id.clone());
    receipt.is_duplicate = duplicate_of.is_some();
    receipt.duplicate_of = duplicate_of.clone();
    if duplicate_of.is_some() {
        receipt.fraud_flags.push("duplicate_upload".to_string());
    }

    state.uploads.insert(id.clone(), bytes);
    state.receipts.push(receipt.clone());

    Json(json!({
        "id": id,
        "result": receipt,
        "duplicate": duplicate_of.is_some(),
        "duplicate_of": duplicate_of,
        "status": ReceiptStatus::Pending,
    }))
    .into_response()
}

async fn handle_duplicate_pair(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    let mut state = lock(&state);
    state.requests.push(format!("GET /duplicate-pair/{}", id));

    let find = |id: &ReceiptId| {
        state
            .receipts
            .iter()
            .find(|r| r.id.as_ref() == Some(id))
            .cloned()
    };
    let Some(duplicate) = find(&ReceiptId::from(id.as_str())) else {
        return not_found(&id);
    };
    let Some(original) = duplicate.duplicate_of.as_ref().and_then(find) else {
        return error(StatusCode::NOT_FOUND, format!("Receipt {} has no original", id));
    };
    Json(json!({ "original": original, "duplicate": duplicate })).into_response()
}

async fn handle_receipt(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    let mut state = lock(&state);
    state.requests.push(format!("GET /receipt/{}", id));

    let wanted = ReceiptId::from(id.as_str());
    match state.receipts.iter().find(|r| r.id.as_ref() == Some(&wanted)) {
        Some(receipt) => Json(json!({ "result": receipt })).into_response(),
        None => not_found(&id),
    }
}

async fn handle_list(State(state): State<Shared>) -> Response {
    let mut state = lock(&state);
    state.requests.push("GET /receipts".to_string());
    Json(json!({ "receipts": state.receipts })).into_response()
}

fn resolve(state: &Shared, id: &str, status: ReceiptStatus) -> Response {
    let mut state = lock(state);
    let action = match status {
        ReceiptStatus::Rejected => "reject",
        _ => "approve",
    };
    state.requests.push(format!("POST /{}/{}", action, id));

    let wanted = ReceiptId::from(id);
    let Some(receipt) = state
        .receipts
        .iter_mut()
        .find(|r| r.id.as_ref() == Some(&wanted))
    else {
        return not_found(id);
    };
    if receipt.status.is_terminal() {
        return error(
            StatusCode::CONFLICT,
            format!("Receipt {} is already {}", id, receipt.status.as_str()),
        );
    }
    receipt.status = status;
    Json(json!({ "message": format!("Receipt {} {}", id, status.as_str()) })).into_response()
}

async fn handle_approve(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    resolve(&state, &id, ReceiptStatus::Approved)
}

async fn handle_reject(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    resolve(&state, &id, ReceiptStatus::Rejected)
}

async fn handle_insights(State(state): State<Shared>) -> Response {
    let mut state = lock(&state);
    state.requests.push("GET /analytics/spending".to_string());

    if state.insights_down {
        return error(StatusCode::SERVICE_UNAVAILABLE, "Insight model unavailable");
    }
    let insights = state.insights.clone().unwrap_or_default();
    Json(json!({ "ai_insights": insights })).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_receipt() {
        let receipt = extract_receipt("Merchant: Corner Store\nTotal: 18.20\nCategory: Food\nnoise");
        assert_eq!(receipt.merchant.as_deref(), Some("Corner Store"));
        assert_eq!(receipt.amount(), 18.2);
        assert_eq!(receipt.category.as_deref(), Some("Food"));
        assert_eq!(receipt.parsed_fields["total"], "18.20");
    }

    #[tokio::test]
    async fn test_mock_server_lists_seeded_receipts() {
        let server = MockReceiptServer::start().await;
        server.seed(Receipt {
            merchant: Some("Cafe".into()),
            ..Default::default()
        });

        let body: Value = reqwest::get(format!("{}/receipts", server.url()))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["receipts"][0]["merchant"], "Cafe");
        assert_eq!(body["receipts"][0]["id"], 1);
        assert_eq!(server.requests(), vec!["GET /receipts"]);
    }
}
