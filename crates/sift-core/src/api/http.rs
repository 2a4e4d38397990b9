//! HTTP implementation of the processing service contract

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::analytics::insights::SpendingInsights;
use crate::config::{ClientConfig, EndpointConfig};
use crate::error::{Error, Result};
use crate::models::{DuplicateContext, Receipt, ReceiptId, SelectedFile};

use super::{
    ActionResponse, InsightsEnvelope, ProgressFn, ReceiptApi, ReceiptEnvelope,
    ReceiptListResponse, SubmitResponse, UploadProgress,
};

/// reqwest client for the processing service
///
/// Every path comes from `EndpointConfig`, so one client serves any
/// deployment layout. Submit uses the long submit timeout (upload plus
/// server-side OCR), all other calls the shorter request timeout.
#[derive(Clone)]
pub struct HttpReceiptApi {
    http_client: Client,
    config: ClientConfig,
}

impl HttpReceiptApi {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http_client = Client::builder().build()?;
        Ok(Self {
            http_client,
            config,
        })
    }

    /// Client for a server URL with default settings
    pub fn for_url(base_url: &str) -> Result<Self> {
        Self::new(ClientConfig::for_url(base_url))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn endpoint(&self, template: &str, id: Option<&ReceiptId>) -> Result<String> {
        Ok(match id {
            Some(id) => self.config.url(&EndpointConfig::with_id(template, id)?),
            None => self.config.url(template),
        })
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::from_transport(e, what))?;
        check_status(response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String, what: &str) -> Result<T> {
        debug!(url = %url, "GET {}", what);
        let request = self
            .http_client
            .get(&url)
            .header("Accept", "application/json")
            .timeout(self.config.request_timeout);
        let response = self.send(request, what).await?;
        read_json(response, what).await
    }

    async fn post_action(&self, url: String, what: &str) -> Result<ActionResponse> {
        debug!(url = %url, "POST {}", what);
        let request = self
            .http_client
            .post(&url)
            .header("Accept", "application/json")
            .timeout(self.config.request_timeout);
        let response = self.send(request, what).await?;
        // An empty 2xx body is still a success
        let body = response
            .text()
            .await
            .map_err(|e| Error::from_transport(e, what))?;
        if body.trim().is_empty() {
            return Ok(ActionResponse::default());
        }
        Ok(serde_json::from_str(&body)?)
    }
}

/// Chunk boundaries `(start, end)` covering `total` bytes
fn chunk_ranges(total: usize, chunk: usize) -> Vec<(usize, usize)> {
    let chunk = chunk.max(1);
    (0..total)
        .step_by(chunk)
        .map(|start| (start, (start + chunk).min(total)))
        .collect()
}

/// Turn a non-2xx response into `Error::Api`, preferring the server's
/// `detail` field for the message
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = extract_detail(&body)
        .unwrap_or_else(|| format!("Request failed with status code {}", status.as_u16()));

    debug!(status = status.as_u16(), detail = %detail, "Processing service error");

    Err(Error::Api {
        status: status.as_u16(),
        detail,
    })
}

/// `detail` from an error body. Strings are used as-is; FastAPI-style
/// validation lists are joined by their `msg` fields.
fn extract_detail(body: &str) -> Option<String> {
    use serde_json::Value;

    let value: Value = serde_json::from_str(body).ok()?;
    let detail = value.get("detail")?;
    let text = match detail {
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            let msgs: Vec<&str> = items
                .iter()
                .filter_map(|i| i.get("msg").and_then(Value::as_str))
                .collect();
            if msgs.is_empty() {
                detail.to_string()
            } else {
                msgs.join("; ")
            }
        }
        Value::Null => return None,
        other => other.to_string(),
    };
    (!text.trim().is_empty()).then_some(text)
}

async fn read_json<T: DeserializeOwned>(response: Response, what: &str) -> Result<T> {
    let body = response
        .text()
        .await
        .map_err(|e| Error::from_transport(e, what))?;
    serde_json::from_str(&body)
        .map_err(|e| Error::InvalidData(format!("Unexpected {} response: {}", what, e)))
}

#[async_trait]
impl ReceiptApi for HttpReceiptApi {
    async fn submit(&self, file: &SelectedFile, progress: ProgressFn) -> Result<SubmitResponse> {
        let bytes = file.bytes().clone();
        let total = bytes.len() as u64;
        let ranges = chunk_ranges(bytes.len(), self.config.upload_chunk_size);

        let stream = futures::stream::iter(ranges).map(move |(start, end)| {
            let piece = bytes[start..end].to_vec();
            progress(UploadProgress {
                sent: end as u64,
                total,
            });
            Ok::<_, std::io::Error>(piece)
        });

        let part = Part::stream_with_length(reqwest::Body::wrap_stream(stream), total)
            .file_name(file.name().to_string())
            .mime_str(file.mime_type())?;
        let form = Form::new().part("file", part);

        let url = self.endpoint(&self.config.endpoints.submit, None)?;
        debug!(url = %url, file = file.name(), bytes = total, "Submitting receipt");

        let request = self
            .http_client
            .post(&url)
            .multipart(form)
            .timeout(self.config.submit_timeout);
        let response = self.send(request, "Receipt submission").await?;
        read_json(response, "submit").await
    }

    async fn duplicate_pair(&self, id: &ReceiptId) -> Result<DuplicateContext> {
        let url = self.endpoint(&self.config.endpoints.duplicate_pair, Some(id))?;
        self.get_json(url, "duplicate pair").await
    }

    async fn receipt(&self, id: &ReceiptId) -> Result<Receipt> {
        let url = self.endpoint(&self.config.endpoints.receipt, Some(id))?;
        let envelope: ReceiptEnvelope = self.get_json(url, "receipt").await?;
        Ok(envelope.result)
    }

    async fn list_receipts(&self) -> Result<Vec<Receipt>> {
        let url = self.endpoint(&self.config.endpoints.list, None)?;
        let list: ReceiptListResponse = self.get_json(url, "receipt list").await?;
        Ok(list.into_receipts())
    }

    async fn approve(&self, id: &ReceiptId) -> Result<ActionResponse> {
        let url = self.endpoint(&self.config.endpoints.approve, Some(id))?;
        self.post_action(url, "approve").await
    }

    async fn reject(&self, id: &ReceiptId) -> Result<ActionResponse> {
        let url = self.endpoint(&self.config.endpoints.reject, Some(id))?;
        self.post_action(url, "reject").await
    }

    async fn spending_insights(&self) -> Result<SpendingInsights> {
        let url = self.endpoint(&self.config.endpoints.insights, None)?;
        let envelope: InsightsEnvelope = self.get_json(url, "spending insights").await?;
        envelope
            .ai_insights
            .ok_or_else(|| Error::InvalidData("Response carried no insights".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_ranges() {
        assert_eq!(chunk_ranges(10, 4), vec![(0, 4), (4, 8), (8, 10)]);
        assert_eq!(chunk_ranges(4, 4), vec![(0, 4)]);
        assert_eq!(chunk_ranges(3, 0), vec![(0, 1), (1, 2), (2, 3)]);
        assert!(chunk_ranges(0, 4).is_empty());
    }

    #[test]
    fn test_extract_detail() {
        assert_eq!(
            extract_detail(r#"{"detail": "Unsupported file"}"#),
            Some("Unsupported file".to_string())
        );
        assert_eq!(
            extract_detail(r#"{"detail": [{"loc": ["body", "file"], "msg": "field required"}]}"#),
            Some("field required".to_string())
        );
        assert_eq!(extract_detail(r#"{"error": "x"}"#), None);
        assert_eq!(extract_detail(r#"{"detail": null}"#), None);
        assert_eq!(extract_detail("<html>502</html>"), None);
    }

    #[test]
    fn test_endpoint_urls() {
        let api = HttpReceiptApi::for_url("http://127.0.0.1:8000/").unwrap();
        let id = ReceiptId::from(42);
        assert_eq!(
            api.endpoint(&api.config.endpoints.duplicate_pair, Some(&id)).unwrap(),
            "http://127.0.0.1:8000/duplicate-pair/42"
        );
        assert_eq!(
            api.endpoint(&api.config.endpoints.list, None).unwrap(),
            "http://127.0.0.1:8000/receipts"
        );
        assert_eq!(
            api.endpoint(&api.config.endpoints.approve, Some(&ReceiptId::from("x/../7")))
                .unwrap(),
            "http://127.0.0.1:8000/approve/x%2F..%2F7"
        );
    }
}
