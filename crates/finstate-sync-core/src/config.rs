use serde::{Deserialize, Serialize};
use std::env;

/// Process-wide configuration, loaded once from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub ingress: IngressConfig,
    pub financial_site: FinancialSiteConfig,
    pub vision: VisionConfig,
    pub web_search: WebSearchConfig,
    pub object_store: ObjectStoreConfig,
    pub llm: LlmConfig,
    pub agent: AgentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngressConfig {
    /// Bearer token the dispatcher must present on the ingress endpoint.
    pub bearer_secret: String,
    /// Upper bound on tickers processed concurrently across all batches.
    pub max_concurrent_tickers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialSiteConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub webdriver_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    pub api_key: String,
    pub endpoint: String,
    pub max_output_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    pub api_key: String,
    pub endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    pub public_base_url: String,
    pub authenticated_base_url: String,
    pub service_credential: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Per-file tool-call iteration budget. Spec fixes the default at 15.
    pub max_iterations: u32,
    /// Per-ticker wall-clock budget, in seconds.
    pub ticker_timeout_seconds: u64,
    /// Per-external-call timeout, in seconds.
    pub call_timeout_seconds: u64,
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// `.env` if present.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("SERVER_PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .unwrap_or(8080),
            },
            ingress: IngressConfig {
                bearer_secret: env::var("INGRESS_BEARER_SECRET").unwrap_or_default(),
                max_concurrent_tickers: env::var("MAX_CONCURRENT_TICKERS")
                    .unwrap_or_else(|_| "8".to_string())
                    .parse()
                    .unwrap_or(8),
            },
            financial_site: FinancialSiteConfig {
                base_url: env::var("FINANCIAL_SITE_BASE_URL")
                    .unwrap_or_else(|_| "https://stockanalysis.com".to_string()),
                username: env::var("FINANCIAL_SITE_USERNAME").unwrap_or_default(),
                password: env::var("FINANCIAL_SITE_PASSWORD").unwrap_or_default(),
                webdriver_url: env::var("WEBDRIVER_URL")
                    .unwrap_or_else(|_| "http://localhost:9515".to_string()),
            },
            vision: VisionConfig {
                api_key: env::var("VISION_API_KEY").unwrap_or_default(),
                endpoint: env::var("VISION_API_ENDPOINT").unwrap_or_default(),
                max_output_tokens: env::var("VISION_MAX_OUTPUT_TOKENS")
                    .unwrap_or_else(|_| "12000".to_string())
                    .parse()
                    .unwrap_or(12_000),
            },
            web_search: WebSearchConfig {
                api_key: env::var("WEB_SEARCH_API_KEY").unwrap_or_default(),
                endpoint: env::var("WEB_SEARCH_API_ENDPOINT").unwrap_or_default(),
            },
            object_store: ObjectStoreConfig {
                public_base_url: env::var("OBJECT_STORE_PUBLIC_BASE_URL").unwrap_or_default(),
                authenticated_base_url: env::var("OBJECT_STORE_AUTH_BASE_URL").unwrap_or_default(),
                service_credential: env::var("OBJECT_STORE_SERVICE_CREDENTIAL")
                    .unwrap_or_default(),
            },
            llm: LlmConfig {
                api_key: env::var("LLM_API_KEY").unwrap_or_default(),
                model: env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
            },
            agent: AgentConfig {
                max_iterations: env::var("MAX_ITERATIONS")
                    .unwrap_or_else(|_| "15".to_string())
                    .parse()
                    .unwrap_or(15),
                ticker_timeout_seconds: env::var("TICKER_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "1800".to_string())
                    .parse()
                    .unwrap_or(1800),
                call_timeout_seconds: env::var("CALL_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .unwrap_or(30),
            },
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            ingress: IngressConfig {
                bearer_secret: "test-bearer-secret".to_string(),
                max_concurrent_tickers: 8,
            },
            financial_site: FinancialSiteConfig {
                base_url: "https://stockanalysis.com".to_string(),
                username: String::new(),
                password: String::new(),
                webdriver_url: "http://localhost:9515".to_string(),
            },
            vision: VisionConfig {
                api_key: String::new(),
                endpoint: String::new(),
                max_output_tokens: 12_000,
            },
            web_search: WebSearchConfig {
                api_key: String::new(),
                endpoint: String::new(),
            },
            object_store: ObjectStoreConfig {
                public_base_url: String::new(),
                authenticated_base_url: String::new(),
                service_credential: String::new(),
            },
            llm: LlmConfig {
                api_key: String::new(),
                model: "gpt-4o".to_string(),
            },
            agent: AgentConfig {
                max_iterations: 15,
                ticker_timeout_seconds: 1800,
                call_timeout_seconds: 30,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_fixes_max_iterations_at_fifteen() {
        let config = Config::default();
        assert_eq!(config.agent.max_iterations, 15);
    }

    #[test]
    fn default_config_has_sane_timeouts() {
        let config = Config::default();
        assert_eq!(config.agent.ticker_timeout_seconds, 1800);
        assert_eq!(config.agent.call_timeout_seconds, 30);
    }
}
