//! OCR job polling and the HTTP OCR service client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{OcrPage, OcrProvider, OcrStatus};
use crate::error::ProviderError;

/// Drives an OCR job to completion and collects its text.
pub struct OcrPoller {
    provider: Arc<dyn OcrProvider>,
    interval: Duration,
}

impl OcrPoller {
    pub fn new(provider: Arc<dyn OcrProvider>, interval: Duration) -> Self {
        Self { provider, interval }
    }

    pub async fn start_job(&self, blob_key: &str) -> Result<String, ProviderError> {
        let job_id = self.provider.start_job(blob_key).await?;
        info!("Started OCR job {} for {}", job_id, blob_key);
        Ok(job_id)
    }

    /// Polls until the job leaves `InProgress`, following pagination tokens.
    ///
    /// Each page contributes its lines joined by `\n` plus a trailing `\n`.
    /// There is no deadline here; callers bound the wait.
    pub async fn wait_for_completion(&self, job_id: &str) -> Result<String, ProviderError> {
        let mut full_text = String::new();
        let mut next_token: Option<String> = None;

        loop {
            let page = self
                .provider
                .get_page(job_id, next_token.as_deref())
                .await?;

            match page.status {
                OcrStatus::Succeeded => {
                    full_text.push_str(&page.lines.join("\n"));
                    full_text.push('\n');

                    match page.next_token {
                        Some(token) => next_token = Some(token),
                        None => return Ok(full_text),
                    }
                }
                OcrStatus::Failed => {
                    return Err(ProviderError::OcrJobFailed {
                        job_id: job_id.to_string(),
                    });
                }
                OcrStatus::InProgress => {
                    debug!("OCR job {} in progress, retrying in {:?}", job_id, self.interval);
                    tokio::time::sleep(self.interval).await;
                }
            }
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartJobRequest<'a> {
    document_key: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartJobResponse {
    job_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobPageResponse {
    status: String,
    #[serde(default)]
    lines: Vec<String>,
    #[serde(default)]
    next_token: Option<String>,
}

impl JobPageResponse {
    fn into_page(self, endpoint: &str) -> Result<OcrPage, ProviderError> {
        let status = match self.status.as_str() {
            "IN_PROGRESS" => OcrStatus::InProgress,
            "SUCCEEDED" => OcrStatus::Succeeded,
            "FAILED" => OcrStatus::Failed,
            other => {
                return Err(ProviderError::UnexpectedResponse {
                    endpoint: endpoint.to_string(),
                    reason: format!("unknown job status '{}'", other),
                })
            }
        };
        Ok(OcrPage {
            status,
            lines: self.lines,
            next_token: self.next_token.filter(|t| !t.is_empty()),
        })
    }
}

/// Client for an asynchronous OCR service.
///
/// `POST {base}/jobs` with `{"documentKey": ...}` starts a job and returns
/// `{"jobId": ...}`. `GET {base}/jobs/{id}` returns
/// `{"status": "IN_PROGRESS" | "SUCCEEDED" | "FAILED", "lines": [...], "nextToken": ...}`.
pub struct HttpOcrProvider {
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl HttpOcrProvider {
    pub fn new(base_url: &str, api_key: Option<SecretString>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key.expose_secret()),
            None => request,
        }
    }

    async fn send(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| ProviderError::Http {
                endpoint: endpoint.to_string(),
                source: e,
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::BadStatus {
                endpoint: endpoint.to_string(),
                status,
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl OcrProvider for HttpOcrProvider {
    async fn start_job(&self, blob_key: &str) -> Result<String, ProviderError> {
        let endpoint = format!("{}/jobs", self.base_url);
        let request = self.client.post(&endpoint).json(&StartJobRequest {
            document_key: blob_key,
        });

        let response: StartJobResponse = self
            .send(&endpoint, request)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::UnexpectedResponse {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            })?;
        Ok(response.job_id)
    }

    async fn get_page(
        &self,
        job_id: &str,
        next_token: Option<&str>,
    ) -> Result<OcrPage, ProviderError> {
        let endpoint = format!("{}/jobs/{}", self.base_url, job_id);
        let mut request = self.client.get(&endpoint);
        if let Some(token) = next_token {
            request = request.query(&[("nextToken", token)]);
        }

        let page: JobPageResponse = self
            .send(&endpoint, request)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::UnexpectedResponse {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            })?;
        page.into_page(&endpoint)
    }

    fn name(&self) -> &str {
        "http-ocr"
    }
}
