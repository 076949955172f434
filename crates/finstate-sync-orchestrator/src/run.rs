//! The per-ticker agent controller: steps 1-4 of spec.md §4.5.2, the Q4-gate
//! of §4.5.4, and terminal callback reporting.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use finstate_sync_browser::BrowserSession;
use finstate_sync_clients::{SearchError, VisionClient, VisionError, WebSearchClient};
use finstate_sync_core::{
    AgentContext, AppError, CallbackPayload, Config, NoteCategory, RunStatus, RunSummary,
    TargetFile, TickerJob, FILE_ORDER,
};
use finstate_sync_llm::{ChatBackend, ChatMessage, ChatRequest, ToolCall};
use finstate_sync_objectstore::{ObjectStoreClient, ObjectStoreConfig as StoreClientConfig};
use finstate_sync_spreadsheet::{MutatorError, SpreadsheetMutator};
use reqwest::Client as HttpClient;
use tracing::{info, instrument, warn};

use crate::callback::post_callback;
use crate::prompts::{initial_user_message, system_prompt};
use crate::tools::{self, *};

/// Owns the stateless collaborators shared across every ticker run: object
/// store, vision/search clients, and the chat backend. One instance serves
/// the whole process; `run_ticker` is safe to call concurrently for
/// different tickers (no shared mutable state between runs).
pub struct Orchestrator {
    config: Config,
    object_store: ObjectStoreClient,
    vision: VisionClient,
    search: WebSearchClient,
    chat: Arc<dyn ChatBackend>,
    callback_http: HttpClient,
}

impl Orchestrator {
    pub fn new(config: Config, chat: Arc<dyn ChatBackend>) -> Self {
        let object_store = ObjectStoreClient::new(StoreClientConfig {
            public_base_url: config.object_store.public_base_url.clone(),
            authenticated_base_url: config.object_store.authenticated_base_url.clone(),
            service_credential: config.object_store.service_credential.clone(),
        });
        let call_timeout = Duration::from_secs(config.agent.call_timeout_seconds);
        let vision = VisionClient::new(config.vision.clone(), config.llm.model.clone(), call_timeout);
        let search = WebSearchClient::new(config.web_search.clone(), call_timeout);
        let callback_http = HttpClient::builder()
            .timeout(call_timeout)
            .build()
            .expect("reqwest client builds with static configuration");

        Orchestrator {
            config,
            object_store,
            vision,
            search,
            chat,
            callback_http,
        }
    }

    /// Runs one ticker to completion and posts its terminal callback.
    /// Never panics or propagates an error out — every failure mode resolves
    /// into a `failed` callback payload.
    #[instrument(skip(self, job), fields(ticker = %job.ticker))]
    pub async fn run_ticker(&self, job: TickerJob) {
        let ticker_timeout = Duration::from_secs(self.config.agent.ticker_timeout_seconds);
        let callback_url = job.callback_url.clone();
        let (ticker, report_date, timing) = (job.ticker.clone(), job.report_date, job.timing);

        let outcome = tokio::time::timeout(ticker_timeout, self.run_ticker_inner(job)).await;

        let payload = match outcome {
            Ok(Ok(summary)) => CallbackPayload {
                ticker,
                report_date,
                timing,
                status: RunStatus::Completed,
                files_updated: summary.files_updated,
                data_sources_used: summary.data_sources_used,
                error_message: None,
            },
            Ok(Err(err)) => {
                err.log_with_context("ticker run failed");
                CallbackPayload {
                    ticker,
                    report_date,
                    timing,
                    status: RunStatus::Failed,
                    files_updated: 0,
                    data_sources_used: Vec::new(),
                    error_message: Some(err.to_string()),
                }
            }
            Err(_) => {
                warn!("ticker run exceeded its wall-clock budget");
                CallbackPayload {
                    ticker,
                    report_date,
                    timing,
                    status: RunStatus::Failed,
                    files_updated: 0,
                    data_sources_used: Vec::new(),
                    error_message: Some(
                        AppError::TimeoutExceeded(ticker_timeout).to_string(),
                    ),
                }
            }
        };

        post_callback(
            &self.callback_http,
            &callback_url,
            &self.config.ingress.bearer_secret,
            &payload,
        )
        .await;
    }

    async fn run_ticker_inner(&self, job: TickerJob) -> Result<RunSummary, AppError> {
        let working_dir = std::env::temp_dir().join(format!(
            "finstate-sync-{}-{}",
            job.ticker.to_lowercase(),
            job.report_date
        ));
        std::fs::create_dir_all(&working_dir)
            .map_err(|e| AppError::Internal(format!("failed to create working dir: {e}")))?;

        let mut context = AgentContext::new(job.clone(), working_dir.clone());
        let mut browser: Option<BrowserSession> = None;
        let mut mutators: HashMap<&'static str, SpreadsheetMutator> = HashMap::new();

        let outcome = self.process_all_files(&mut context, &mut browser, &mut mutators).await;

        if let Some(session) = browser.take() {
            if let Err(err) = session.close().await {
                warn!(error = %err, "failed to close browser session cleanly");
            }
        }
        if std::fs::remove_dir_all(&working_dir).is_err() {
            warn!(path = %working_dir.display(), "failed to remove ticker working directory");
        }

        outcome?;

        for bucket in context.files_written.clone() {
            if let Some(mutator) = mutators.get(bucket) {
                let scratch = std::env::temp_dir().join(format!("{}-{}-save.xlsx", bucket, job.ticker));
                let bytes = mutator
                    .save_to_bytes(&scratch)
                    .map_err(|e| AppError::Internal(format!("failed to serialize {bucket}: {e}")))?;
                let _ = std::fs::remove_file(&scratch);
                self.object_store
                    .upload(bucket, &format!("{}.xlsx", job.ticker_upper()), bytes)
                    .await
                    .map_err(|e| AppError::TransportError(e.to_string()))?;
            }
        }

        Ok(RunSummary {
            files_updated: context.files_written.len() as u32,
            data_sources_used: context.data_sources_used.into_iter().collect(),
        })
    }

    async fn process_all_files(
        &self,
        context: &mut AgentContext,
        browser: &mut Option<BrowserSession>,
        mutators: &mut HashMap<&'static str, SpreadsheetMutator>,
    ) -> Result<(), AppError> {
        for file in FILE_ORDER.iter() {
            if file.is_annual() && context.should_skip_annual_file() {
                context.add_note(
                    NoteCategory::FileSkipped,
                    format!("{} skipped: detected quarter is not Q4", file.bucket),
                );
                continue;
            }

            let key = format!("{}.xlsx", context.job.ticker_upper());
            let bytes = match self.object_store.download(file.bucket, &key).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    context.add_note(
                        NoteCategory::FileSkipped,
                        format!("{} not available: {err}", file.bucket),
                    );
                    continue;
                }
            };

            let scratch_path = context.working_dir.join(format!("{}.xlsx", file.bucket));
            let mutator = SpreadsheetMutator::load_from_bytes(&bytes, &scratch_path)
                .map_err(|e| AppError::Internal(format!("failed to load {}: {e}", file.bucket)))?;
            mutators.insert(file.bucket, mutator);

            context.current_file = Some(*file);
            if let Err(err) = self.process_file(context, browser, mutators, file).await {
                if err.is_recoverable_tool_error() {
                    context.add_note(NoteCategory::Error, err.to_string());
                } else {
                    return Err(err);
                }
            }

            if context.cells_written_for(file.bucket) > 0 {
                context.add_note(NoteCategory::FileCompleted, file.bucket.to_string());
            } else {
                warn!(bucket = file.bucket, "no cells written, skipping upload");
                context.files_written.remove(file.bucket);
            }
        }
        Ok(())
    }

    async fn process_file(
        &self,
        context: &mut AgentContext,
        browser: &mut Option<BrowserSession>,
        mutators: &mut HashMap<&'static str, SpreadsheetMutator>,
        file: &TargetFile,
    ) -> Result<(), AppError> {
        let grid = mutators
            .get(file.bucket)
            .expect("mutator was just inserted for this file")
            .read_structure("Sheet1")
            .map_err(|e| AppError::Internal(e.to_string()))?;

        let effective_period_end = context.job.effective_period_end().to_string();
        let column_insertion_expected = grid
            .row_1
            .get(1)
            .map(|cell| cell.as_str() != effective_period_end)
            .unwrap_or(true);
        let mut history = vec![
            ChatMessage::system(system_prompt(context, file)),
            ChatMessage::user(initial_user_message(&grid, column_insertion_expected)),
        ];

        let tool_defs = tools::tool_definitions();
        let max_iterations = self.config.agent.max_iterations;

        for iteration in 0..max_iterations {
            let response = self
                .chat
                .send(ChatRequest {
                    messages: history.clone(),
                    tools: tool_defs.clone(),
                    max_output_tokens: 4096,
                    thinking: false,
                })
                .await
                .map_err(|e| AppError::VendorError(e.to_string()))?;

            let assistant_text = response.text_blocks.join("\n");
            history.push(ChatMessage {
                role: finstate_sync_llm::Role::Assistant,
                text: assistant_text,
                tool_calls: response.tool_calls.clone(),
                tool_call_id: None,
                opaque_vendor_fields: response.opaque_vendor_fields.clone(),
            });

            if !response.has_tool_calls() {
                return Ok(());
            }

            for call in &response.tool_calls {
                let result_json = self.dispatch_tool(context, browser, mutators, file, call).await;
                history.push(ChatMessage::tool_result(
                    call.id.clone(),
                    result_json.to_string(),
                ));
            }

            if iteration + 1 == max_iterations {
                return Err(AppError::IterationBudgetExceeded(file.bucket.to_string()));
            }
        }

        Ok(())
    }

    async fn dispatch_tool(
        &self,
        context: &mut AgentContext,
        browser: &mut Option<BrowserSession>,
        mutators: &mut HashMap<&'static str, SpreadsheetMutator>,
        file: &TargetFile,
        call: &ToolCall,
    ) -> serde_json::Value {
        let result = self
            .dispatch_tool_inner(context, browser, mutators, file, call)
            .await;
        match result {
            Ok(value) => value,
            Err(err) => err.to_tool_result_json(),
        }
    }

    async fn dispatch_tool_inner(
        &self,
        context: &mut AgentContext,
        browser: &mut Option<BrowserSession>,
        mutators: &mut HashMap<&'static str, SpreadsheetMutator>,
        file: &TargetFile,
        call: &ToolCall,
    ) -> Result<serde_json::Value, AppError> {
        let mutator = mutators
            .get_mut(file.bucket)
            .ok_or_else(|| AppError::Internal(format!("no open workbook for {}", file.bucket)))?;

        match call.name.as_str() {
            tools::ANALYZE_EXCEL => {
                let grid = mutator
                    .read_structure("Sheet1")
                    .map_err(mutator_error_to_app_error)?;
                Ok(serde_json::to_value(grid).unwrap_or_default())
            }

            tools::BROWSE_STOCKANALYSIS => {
                if browser.is_none() {
                    let session = BrowserSession::connect(
                        &self.config.financial_site.webdriver_url,
                        &self.config.financial_site.base_url,
                        &self.config.financial_site.username,
                        &self.config.financial_site.password,
                    )
                    .await
                    .map_err(|e| AppError::LoginFailed(e.to_string()))?;
                    *browser = Some(session);
                }
                let session = browser.as_mut().expect("just populated");

                session
                    .ensure_logged_in()
                    .await
                    .map_err(|e| AppError::LoginFailed(e.to_string()))?;
                session
                    .navigate_to_financials(
                        &context.job.ticker_upper(),
                        file.statement_type,
                        file.period,
                        file.data_type,
                    )
                    .await
                    .map_err(|e| AppError::NavigationFailed(e.to_string()))?;
                session
                    .select_raw_units()
                    .await
                    .map_err(|e| AppError::NavigationFailed(e.to_string()))?;
                session
                    .screenshot()
                    .await
                    .map_err(|e| AppError::NavigationFailed(e.to_string()))?;

                context.record_data_source(format!("stockanalysis:{}", file.bucket));
                Ok(serde_json::json!({ "ok": true }))
            }

            tools::EXTRACT_PAGE_WITH_VISION => {
                let session = browser
                    .as_ref()
                    .ok_or_else(|| AppError::NavigationFailed("no browser session yet".to_string()))?;
                let screenshot = session
                    .latest_screenshot()
                    .ok_or_else(|| AppError::ExtractionFailed("no screenshot captured yet".to_string()))?;

                let table = self
                    .vision
                    .extract_table(screenshot)
                    .await
                    .map_err(vision_error_to_app_error)?;
                context.record_data_source("vision-extractor");
                Ok(serde_json::json!({ "markdown_table": table }))
            }

            tools::WEB_SEARCH => {
                let args: WebSearchArgs = serde_json::from_value(call.arguments.clone())
                    .map_err(|e| AppError::Internal(format!("bad web_search args: {e}")))?;
                let result = self
                    .search
                    .search(&args.query)
                    .await
                    .map_err(search_error_to_app_error)?;
                context.record_data_source("web-search");
                Ok(serde_json::to_value(result).unwrap_or_default())
            }

            tools::NOTE_FINDING => {
                let args: NoteFindingArgs = serde_json::from_value(call.arguments.clone())
                    .map_err(|e| AppError::Internal(format!("bad note_finding args: {e}")))?;
                context.add_note(parse_note_category(&args.category), args.message);
                Ok(serde_json::json!({ "ok": true }))
            }

            tools::INSERT_NEW_PERIOD_COLUMN => {
                let args: InsertNewPeriodColumnArgs = serde_json::from_value(call.arguments.clone())
                    .map_err(|e| AppError::Internal(format!("bad insert_new_period_column args: {e}")))?;

                // Date header override, per spec.md §4.5.1: the agent's value
                // is advisory only.
                let effective_date_header = context.job.effective_period_end().to_string();
                let row_map = mutator
                    .insert_new_period_column(&args.sheet, &effective_date_header, &args.period_header)
                    .map_err(mutator_error_to_app_error)?;

                if !file.is_annual() && context.detected_quarter.is_none() {
                    context.detected_quarter = Some(args.period_header.clone());
                }

                Ok(serde_json::json!({ "row_map": row_map }))
            }

            tools::UPDATE_EXCEL_CELL => {
                let args: UpdateExcelCellArgs = serde_json::from_value(call.arguments.clone())
                    .map_err(|e| AppError::Internal(format!("bad update_excel_cell args: {e}")))?;
                mutator
                    .update_cell(&args.sheet, &args.cell_reference, &args.value)
                    .map_err(mutator_error_to_app_error)?;
                context.increment_cells_written(file.bucket);
                Ok(serde_json::json!({ "ok": true }))
            }

            tools::SAVE_ALL_FILES => Ok(serde_json::json!({ "ok": true })),

            other => Err(AppError::Internal(format!("unknown tool: {other}"))),
        }
    }
}

fn parse_note_category(raw: &str) -> NoteCategory {
    match raw {
        "data_gathered" => NoteCategory::DataGathered,
        "empty_cells" => NoteCategory::EmptyCells,
        "validation" => NoteCategory::Validation,
        "decision" => NoteCategory::Decision,
        "file_skipped" => NoteCategory::FileSkipped,
        "file_completed" => NoteCategory::FileCompleted,
        _ => NoteCategory::Error,
    }
}

fn mutator_error_to_app_error(err: MutatorError) -> AppError {
    match err {
        MutatorError::InvalidReference(r) => AppError::InvalidReference(r),
        MutatorError::CellConflict(r) => AppError::CellConflict(r),
        MutatorError::AlreadyInserted(s) => AppError::AlreadyPerformed(s),
        other => AppError::Internal(other.to_string()),
    }
}

fn vision_error_to_app_error(err: VisionError) -> AppError {
    match err {
        VisionError::ApiError(m) => AppError::ExtractionFailed(m),
        VisionError::Transport(e) => AppError::ExtractionFailed(e.to_string()),
    }
}

fn search_error_to_app_error(err: SearchError) -> AppError {
    match err {
        SearchError::ApiError(m) => AppError::VendorError(m),
        SearchError::Transport(e) => AppError::VendorError(e.to_string()),
    }
}
