use base64::Engine;
use finstate_sync_core::VisionConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::instrument;

/// Instruction sent on every call, never supplied by the agent. Asks for
/// exactly the row-label column plus the three newest data columns, with
/// the numeric-format invariants spec.md §4.4 requires.
const VISION_PROMPT: &str = "Return a markdown table containing exactly the leftmost \
row-label column plus the three newest data columns visible in this screenshot. \
Preserve column headers exactly as shown. Preserve numeric formatting: use \
parentheses for negative values and a dash for blank cells. Do not round or \
abbreviate any number — write every value fully, with no \"B\"/\"M\"/\"K\" \
suffixes. Output only the markdown table, no commentary.";

#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("vision endpoint returned an error: {0}")]
    ApiError(String),

    #[error("transport error calling vision endpoint: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Serialize)]
struct VisionRequest<'a> {
    model: &'a str,
    max_output_tokens: u32,
    messages: Vec<VisionMessage<'a>>,
}

#[derive(Serialize)]
struct VisionMessage<'a> {
    role: &'a str,
    content: Vec<VisionContentBlock<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum VisionContentBlock<'a> {
    #[serde(rename = "text")]
    Text { text: &'a str },
    #[serde(rename = "image")]
    Image { image_base64: String },
}

#[derive(Deserialize)]
struct VisionApiResponse {
    output_text: Option<String>,
    error: Option<VisionApiError>,
}

#[derive(Deserialize)]
struct VisionApiError {
    message: String,
}

/// Calls a chat-with-image endpoint with the session's latest screenshot and
/// the fixed prompt above, returning the raw markdown table text.
pub struct VisionClient {
    http: Client,
    config: VisionConfig,
    model: String,
}

impl VisionClient {
    pub fn new(config: VisionConfig, model: String, call_timeout: Duration) -> Self {
        let http = Client::builder()
            .timeout(call_timeout)
            .build()
            .expect("reqwest client builds with static configuration");
        VisionClient {
            http,
            config,
            model,
        }
    }

    /// Sends `screenshot_bytes` (PNG) plus the fixed prompt to the vision
    /// endpoint, asking for at least 12,000 output tokens so large tables
    /// are not truncated.
    #[instrument(skip(self, screenshot_bytes))]
    pub async fn extract_table(&self, screenshot_bytes: &[u8]) -> Result<String, VisionError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(screenshot_bytes);

        let request = VisionRequest {
            model: &self.model,
            max_output_tokens: self.config.max_output_tokens.max(12_000),
            messages: vec![VisionMessage {
                role: "user",
                content: vec![
                    VisionContentBlock::Text { text: VISION_PROMPT },
                    VisionContentBlock::Image {
                        image_base64: encoded,
                    },
                ],
            }],
        };

        let response = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<VisionApiResponse>()
            .await?;

        if let Some(error) = response.error {
            return Err(VisionError::ApiError(error.message));
        }

        Ok(response.output_text.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(endpoint: String) -> VisionConfig {
        VisionConfig {
            api_key: "vision-key".to_string(),
            endpoint,
            max_output_tokens: 12_000,
        }
    }

    #[tokio::test]
    async fn extract_table_returns_markdown_on_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/vision")
            .with_status(200)
            .with_body(r#"{"output_text": "| Revenue | 394328000000 |"}"#)
            .create_async()
            .await;

        let client = VisionClient::new(
            test_config(format!("{}/vision", server.url())),
            "vision-model".to_string(),
            Duration::from_secs(5),
        );

        let table = client.extract_table(b"fake-png-bytes").await.unwrap();
        assert!(table.contains("394328000000"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn extract_table_surfaces_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/vision")
            .with_status(200)
            .with_body(r#"{"error": {"message": "image too large"}}"#)
            .create_async()
            .await;

        let client = VisionClient::new(
            test_config(format!("{}/vision", server.url())),
            "vision-model".to_string(),
            Duration::from_secs(5),
        );

        let err = client.extract_table(b"fake-png-bytes").await.unwrap_err();
        assert!(matches!(err, VisionError::ApiError(_)));
    }
}
