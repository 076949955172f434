// Copyright (c) 2024 FinstateSync. All rights reserved.
// Licensed under the Microsoft Reference Source License (MS-RSL).
// See LICENSE file for complete terms and conditions.

//! Binary entrypoint: loads configuration, initializes structured logging,
//! builds the orchestrator and its LLM backend, and serves the ingress HTTP
//! surface.

mod routes;

use std::sync::Arc;

use finstate_sync_core::Config;
use finstate_sync_llm::OpenAiChatBackend;
use finstate_sync_orchestrator::Orchestrator;
use tokio::sync::Semaphore;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub struct AppState {
    pub config: Config,
    pub orchestrator: Arc<Orchestrator>,
    pub semaphore: Arc<Semaphore>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env().expect("failed to load configuration");
    info!(host = %config.server.host, port = config.server.port, "starting finstate-sync-backend");

    let chat_backend = Arc::new(OpenAiChatBackend::new(
        config.llm.api_key.clone(),
        config.llm.model.clone(),
    ));
    let semaphore = Arc::new(Semaphore::new(config.ingress.max_concurrent_tickers));
    let orchestrator = Arc::new(Orchestrator::new(config.clone(), chat_backend));

    let addr: std::net::SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .expect("invalid SERVER_HOST/SERVER_PORT configuration");

    let state = Arc::new(AppState {
        config,
        orchestrator,
        semaphore,
    });

    warp::serve(routes::routes(state)).run(addr).await;
}
