// Copyright (c) 2024 FinstateSync. All rights reserved.
// Licensed under the Microsoft Reference Source License (MS-RSL).
// See LICENSE file for complete terms and conditions.

//! # finstate-sync Orchestrator
//!
//! The per-ticker agent controller: downloads the fixed six-file set,
//! drives a bounded tool-call loop per file against a chat LLM whose
//! toolset binds to the object store, spreadsheet mutator, browser session,
//! and vision/search clients, then uploads changed files and reports a
//! terminal status callback.

mod callback;
mod prompts;
mod run;
mod tools;

pub use run::Orchestrator;
pub use tools::tool_definitions;

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use finstate_sync_core::{Config, Timing};
    use finstate_sync_llm::{
        ChatBackend, ChatBackendError, ChatRequest, ChatResponse, FinishReason,
    };
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    /// A chat backend stub that always ends the tool loop immediately, used
    /// to exercise the "no data available" path without a live LLM.
    struct ImmediateStopBackend {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChatBackend for ImmediateStopBackend {
        async fn send(&self, _request: ChatRequest) -> Result<ChatResponse, ChatBackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ChatResponse {
                text_blocks: vec!["Nothing to do.".to_string()],
                tool_calls: Vec::new(),
                finish_reason: FinishReason::Stop,
                opaque_vendor_fields: None,
            })
        }
    }

    #[tokio::test]
    async fn run_ticker_with_all_files_missing_reports_completed_with_zero_updates() {
        let mut server = mockito::Server::new_async().await;
        // Every object-store download 404s, so every file is recorded as
        // skipped and the agent is never invoked.
        let buckets = [
            "financials-quarterly-income",
            "financials-quarterly-balance",
            "financials-quarterly-cashflow",
            "financials-annual-income",
            "financials-annual-balance",
            "financials-annual-cashflow",
        ];
        let mut download_mocks = Vec::new();
        for bucket in buckets {
            let mock = server
                .mock("GET", mockito::Matcher::Regex(format!("^/{bucket}/.*")))
                .with_status(404)
                .create_async()
                .await;
            download_mocks.push(mock);
        }

        let callback_mock = server
            .mock("POST", "/callback")
            .with_status(200)
            .create_async()
            .await;

        let mut config = Config::default();
        config.object_store.public_base_url = server.url();
        config.object_store.authenticated_base_url = server.url();
        config.agent.ticker_timeout_seconds = 30;

        let chat = Arc::new(ImmediateStopBackend {
            calls: AtomicUsize::new(0),
        });
        let orchestrator = Orchestrator::new(config, chat.clone());

        let job = finstate_sync_core::TickerJob {
            ticker: "NOPE".to_string(),
            report_date: chrono::NaiveDate::from_ymd_opt(2026, 2, 28).unwrap(),
            fiscal_period_end: Some(chrono::NaiveDate::from_ymd_opt(2026, 1, 31).unwrap()),
            timing: Timing::AfterHours,
            callback_url: format!("{}/callback", server.url()),
        };

        orchestrator.run_ticker(job).await;

        assert_eq!(chat.calls.load(Ordering::SeqCst), 0);
        callback_mock.assert();
    }
}
