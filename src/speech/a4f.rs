use crate::error::{Result, ShortreelError};
use crate::speech::{SpeechRequest, SpeechSynthesizer};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

/// Default A4F endpoint (OpenAI-compatible).
pub const DEFAULT_BASE_URL: &str = "https://api.a4f.co/v1";

/// Client for an OpenAI-compatible `/audio/speech` endpoint.
///
/// The service answers with WAV (PCM) bytes. Each call is a single attempt.
pub struct A4fClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl A4fClient {
    /// Create a new client with the given API key.
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the client at a different server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/speech", self.base_url)
    }
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    error: ApiError,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    message: String,
    #[serde(default)]
    r#type: Option<String>,
}

#[async_trait]
impl SpeechSynthesizer for A4fClient {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>> {
        debug!(
            "Requesting speech: model={}, voice={}, {} chars",
            request.model,
            request.voice,
            request.input.chars().count()
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        debug!("Speech API response status: {}", status);

        if status.is_success() {
            let bytes = response.bytes().await?;
            if bytes.is_empty() {
                return Err(ShortreelError::UpstreamService(
                    "Speech API returned an empty body".to_string(),
                ));
            }
            return Ok(bytes.to_vec());
        }

        let error_body = response.text().await.unwrap_or_default();

        if let Ok(api_error) = serde_json::from_str::<ApiErrorResponse>(&error_body) {
            let kind = api_error.error.r#type.unwrap_or_else(|| "error".to_string());
            return Err(ShortreelError::UpstreamService(format!(
                "{} ({kind}, HTTP {status})",
                api_error.error.message
            )));
        }

        Err(ShortreelError::UpstreamService(format!(
            "HTTP {status}: {}",
            error_body.trim()
        )))
    }

    fn name(&self) -> &'static str {
        "A4F"
    }
}
