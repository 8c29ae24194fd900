//! LLM extraction over an OpenAI-compatible chat completions endpoint.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::Extractor;
use crate::error::ProviderError;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatResponse {
    fn first_content(self) -> Option<String> {
        self.choices.into_iter().next()?.message.content
    }
}

/// Sends the prompt as the system message and the OCR text as the user message.
pub struct ChatExtractor {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<SecretString>,
    max_tokens: u32,
    temperature: f32,
}

impl ChatExtractor {
    pub fn new(base_url: &str, model: &str, api_key: Option<SecretString>) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.to_string(),
            api_key,
            max_tokens: 4000,
            temperature: 0.0,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn build_request<'a>(&'a self, text: &str, prompt: &str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: prompt.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: format!("Here is the document text:\n{}", text),
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

#[async_trait]
impl Extractor for ChatExtractor {
    async fn extract(&self, text: &str, prompt: &str) -> Result<String, ProviderError> {
        let request = self.build_request(text, prompt);

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder.send().await.map_err(|e| ProviderError::Http {
            endpoint: self.endpoint.clone(),
            source: e,
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::BadStatus {
                endpoint: self.endpoint.clone(),
                status,
                body,
            });
        }

        let body: ChatResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::UnexpectedResponse {
                    endpoint: self.endpoint.clone(),
                    reason: e.to_string(),
                })?;

        body.first_content()
            .ok_or_else(|| ProviderError::Extraction("model returned no content".to_string()))
    }

    fn name(&self) -> &str {
        &self.model
    }
}
