use finstate_sync_core::WebSearchConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::instrument;

/// Pinned in the system message on every call: the agent's query is the only
/// free-form part of the request.
const NUMERIC_FORMAT_INSTRUCTION: &str = "You are a financial-data search assistant. \
Render every number fully written as an absolute integer — never use \"B\"/\"M\"/\"K\" \
abbreviations or decimal-shortened forms. Cite your sources.";

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search endpoint returned an error: {0}")]
    ApiError(String),

    #[error("transport error calling search endpoint: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    messages: Vec<SearchMessage<'a>>,
}

#[derive(Serialize)]
struct SearchMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct SearchApiResponse {
    answer_text: Option<String>,
    citations: Option<Vec<String>>,
    error: Option<SearchApiError>,
}

#[derive(Deserialize)]
struct SearchApiError {
    message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub answer_text: String,
    pub citations: Vec<String>,
}

/// Calls the secondary chat-style search API, used sparingly by the agent
/// for validation or gap-filling — the vision-extracted table remains the
/// primary data source.
pub struct WebSearchClient {
    http: Client,
    config: WebSearchConfig,
}

impl WebSearchClient {
    pub fn new(config: WebSearchConfig, call_timeout: Duration) -> Self {
        let http = Client::builder()
            .timeout(call_timeout)
            .build()
            .expect("reqwest client builds with static configuration");
        WebSearchClient { http, config }
    }

    #[instrument(skip(self))]
    pub async fn search(&self, query: &str) -> Result<SearchResult, SearchError> {
        let request = SearchRequest {
            messages: vec![
                SearchMessage {
                    role: "system",
                    content: NUMERIC_FORMAT_INSTRUCTION,
                },
                SearchMessage {
                    role: "user",
                    content: query,
                },
            ],
        };

        let response = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<SearchApiResponse>()
            .await?;

        if let Some(error) = response.error {
            return Err(SearchError::ApiError(error.message));
        }

        Ok(SearchResult {
            answer_text: response.answer_text.unwrap_or_default(),
            citations: response.citations.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(endpoint: String) -> WebSearchConfig {
        WebSearchConfig {
            api_key: "search-key".to_string(),
            endpoint,
        }
    }

    #[tokio::test]
    async fn search_returns_answer_and_citations() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/search")
            .with_status(200)
            .with_body(
                r#"{"answer_text": "Q4 2025 revenue was 394328000000", "citations": ["https://example.com"]}"#,
            )
            .create_async()
            .await;

        let client = WebSearchClient::new(
            test_config(format!("{}/search", server.url())),
            Duration::from_secs(5),
        );

        let result = client.search("ZM Q4 2025 revenue").await.unwrap();
        assert!(result.answer_text.contains("394328000000"));
        assert_eq!(result.citations.len(), 1);
    }

    #[tokio::test]
    async fn search_surfaces_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/search")
            .with_status(200)
            .with_body(r#"{"error": {"message": "rate limited"}}"#)
            .create_async()
            .await;

        let client = WebSearchClient::new(
            test_config(format!("{}/search", server.url())),
            Duration::from_secs(5),
        );

        let err = client.search("anything").await.unwrap_err();
        assert!(matches!(err, SearchError::ApiError(_)));
    }
}
