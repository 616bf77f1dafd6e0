//! LibreTranslate HTTP client.
//!
//! LibreTranslate serves Argos Translate models over a small JSON API.
//! Alternatives are requested so the user gets several candidates.

use super::traits::*;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'static str,
    alternatives: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
    #[serde(default)]
    alternatives: Vec<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

/// LibreTranslate client
#[derive(Clone)]
pub struct LibreTranslateClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    alternatives: u8,
}

impl LibreTranslateClient {
    pub fn new(
        endpoint: &str,
        api_key: Option<String>,
        alternatives: u8,
        timeout: Duration,
    ) -> TranslationResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TranslationError::Network(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            alternatives,
        })
    }
}

#[async_trait]
impl Translator for LibreTranslateClient {
    async fn translate(&self, from: &str, to: &str, text: &str) -> TranslationResult<Translation> {
        let request = TranslateRequest {
            q: text.trim(),
            source: from,
            target: to,
            format: "text",
            alternatives: self.alternatives,
            api_key: self.api_key.as_deref(),
        };

        let response = self
            .http
            .post(format!("{}/translate", self.endpoint))
            .json(&request)
            .send()
            .await
            .map_err(|e| TranslationError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorResponse>()
                .await
                .map(|e| e.error)
                .unwrap_or_else(|_| status.to_string());
            if status == reqwest::StatusCode::BAD_REQUEST {
                tracing::debug!(from, to, %message, "translation pair rejected");
                return Err(TranslationError::UnsupportedPair {
                    from: from.to_string(),
                    to: to.to_string(),
                });
            }
            return Err(TranslationError::Protocol(message));
        }

        let body: TranslateResponse = response
            .json()
            .await
            .map_err(|e| TranslationError::Protocol(e.to_string()))?;

        let candidates = std::iter::once(body.translated_text)
            .chain(body.alternatives)
            .map(Candidate::plain)
            .collect();

        Ok(Translation {
            word: text.trim().to_string(),
            language_from: from.to_string(),
            language_to: to.to_string(),
            candidates,
        }
        .dedup())
    }
}
