// Copyright (c) 2024 FinstateSync. All rights reserved.
// Licensed under the Microsoft Reference Source License (MS-RSL).
// See LICENSE file for complete terms and conditions.

//! # finstate-sync Browser
//!
//! A long-lived headless-browser wrapper, owned exclusively by one ticker's
//! agent context, that logs in once to the financial-data site, navigates to
//! per-ticker statement pages, toggles raw-units display, and captures
//! full-page screenshots. Built on `thirtyfour`'s WebDriver client, the way
//! the corpus's browser-automation examples drive a remote chromedriver/
//! geckodriver session.

use std::path::PathBuf;
use std::time::Duration;

use finstate_sync_core::{DataType, Period, StatementType};
use thirtyfour::prelude::*;
use tracing::{info, instrument, warn};

const LOGIN_WAIT_TIMEOUT: Duration = Duration::from_secs(15);
const TABLE_WAIT_TIMEOUT: Duration = Duration::from_secs(15);
const LOGIN_RETRY_LIMIT: u32 = 2;

#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("login failed after {0} attempts")]
    LoginFailed(u32),

    #[error("navigation failed: {0}")]
    NavigationFailed(String),

    #[error("webdriver transport error: {0}")]
    Transport(#[from] thirtyfour::error::WebDriverError),
}

/// Persists across every tool call of one ticker run. Lazily connects to the
/// remote WebDriver on first use; the orchestrator is responsible for
/// calling `close` on every exit path (success, failure, or panic unwind via
/// a guard).
pub struct BrowserSession {
    driver: WebDriver,
    base_url: String,
    username: String,
    password: String,
    logged_in: bool,
    latest_screenshot: Option<Vec<u8>>,
}

impl BrowserSession {
    /// Connects to the WebDriver endpoint. Does not log in yet — login is
    /// deferred to `ensure_logged_in`, called lazily by the first browse
    /// tool invocation.
    #[instrument(skip(password))]
    pub async fn connect(
        webdriver_url: &str,
        base_url: &str,
        username: &str,
        password: &str,
    ) -> Result<Self, BrowserError> {
        let caps = DesiredCapabilities::chrome();
        let driver = WebDriver::new(webdriver_url, caps).await?;
        info!(webdriver_url, "connected browser session");
        Ok(BrowserSession {
            driver,
            base_url: base_url.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            logged_in: false,
            latest_screenshot: None,
        })
    }

    /// Logs in if not already logged in this session. Fills the email and
    /// password fields by their stable element ids, clicks the submit
    /// control by accessible name (the site's button carries no
    /// `type="submit"`), then waits until the URL leaves the login path.
    /// Retries twice; on the second failure captures a debug screenshot and
    /// returns `LoginFailed`.
    #[instrument(skip(self))]
    pub async fn ensure_logged_in(&mut self) -> Result<(), BrowserError> {
        if self.logged_in {
            return Ok(());
        }

        let login_url = format!("{}/login/", self.base_url);
        let mut last_attempt = 0;

        for attempt in 1..=LOGIN_RETRY_LIMIT {
            last_attempt = attempt;
            match self.attempt_login(&login_url).await {
                Ok(()) => {
                    self.logged_in = true;
                    info!(attempt, "login succeeded");
                    return Ok(());
                }
                Err(err) => {
                    warn!(attempt, error = %err, "login attempt failed");
                    if attempt == LOGIN_RETRY_LIMIT {
                        if let Ok(bytes) = self.driver.screenshot_as_png().await {
                            let debug_path =
                                std::env::temp_dir().join(format!("login-failure-{attempt}.png"));
                            let _ = std::fs::write(&debug_path, bytes);
                            warn!(path = %debug_path.display(), "wrote login failure screenshot");
                        }
                    }
                }
            }
        }

        Err(BrowserError::LoginFailed(last_attempt))
    }

    async fn attempt_login(&self, login_url: &str) -> Result<(), BrowserError> {
        self.driver.goto(login_url).await?;

        let email_field = self.driver.find(By::Id("email")).await?;
        email_field.send_keys(&self.username).await?;

        let password_field = self.driver.find(By::Id("password")).await?;
        password_field.send_keys(&self.password).await?;

        let submit_button = self
            .driver
            .find(By::XPath(
                "//button[@aria-label='Log In' or text()='Log In']",
            ))
            .await?;
        submit_button.click().await?;

        self.driver
            .query(By::Tag("body"))
            .wait(LOGIN_WAIT_TIMEOUT, Duration::from_millis(250))
            .first()
            .await?;

        let url = self.driver.current_url().await?;
        if url.as_str().contains("/login/") {
            return Err(BrowserError::NavigationFailed(
                "still on login page after submit".to_string(),
            ));
        }
        Ok(())
    }

    /// Builds the statement URL deterministically and waits for the data
    /// table to render. Appends `?p=quarterly` for quarterly periods and
    /// `&type=as-reported` for as-reported data (the only data type the
    /// agent's tool surface exposes).
    #[instrument(skip(self))]
    pub async fn navigate_to_financials(
        &mut self,
        ticker: &str,
        statement_type: StatementType,
        period: Period,
        data_type: DataType,
    ) -> Result<(), BrowserError> {
        let url = build_financials_url(&self.base_url, ticker, statement_type, period, data_type);
        self.driver.goto(&url).await?;

        self.driver
            .query(By::Css("table"))
            .wait(TABLE_WAIT_TIMEOUT, Duration::from_millis(250))
            .first()
            .await
            .map_err(|_| BrowserError::NavigationFailed(format!("data table never appeared at {url}")))?;

        info!(url, "navigated to financials page");
        Ok(())
    }

    /// Opens the units dropdown (addressed by its `title` attribute) and
    /// selects "Raw" so figures render as absolute integers. Silent if
    /// already in raw mode.
    #[instrument(skip(self))]
    pub async fn select_raw_units(&mut self) -> Result<(), BrowserError> {
        let dropdown = match self.driver.find(By::Css("[title='Units']")).await {
            Ok(el) => el,
            Err(_) => {
                info!("units dropdown not present, assuming already raw");
                return Ok(());
            }
        };
        dropdown.click().await?;

        if let Ok(raw_option) = self.driver.find(By::XPath("//*[text()='Raw']")).await {
            raw_option.click().await?;
        }
        Ok(())
    }

    /// Captures the full page as PNG bytes and caches them on the session.
    /// Reuses whatever state the last `navigate_to_financials` call left the
    /// page in.
    #[instrument(skip(self))]
    pub async fn screenshot(&mut self) -> Result<Vec<u8>, BrowserError> {
        let bytes = self.driver.screenshot_as_png().await?;
        self.latest_screenshot = Some(bytes.clone());
        Ok(bytes)
    }

    pub fn latest_screenshot(&self) -> Option<&[u8]> {
        self.latest_screenshot.as_deref()
    }

    /// Tears down the underlying WebDriver session. Must be called on every
    /// exit path by the orchestrator.
    #[instrument(skip(self))]
    pub async fn close(self) -> Result<(), BrowserError> {
        self.driver.quit().await?;
        Ok(())
    }
}

fn build_financials_url(
    base_url: &str,
    ticker: &str,
    statement_type: StatementType,
    period: Period,
    data_type: DataType,
) -> String {
    let suffix = match statement_type {
        StatementType::Income => "",
        StatementType::Balance => "/balance-sheet",
        StatementType::CashFlow => "/cash-flow-statement",
    };

    let mut url = format!(
        "{base_url}/stocks/{}/financials{suffix}",
        ticker.to_lowercase()
    );

    let mut query = Vec::new();
    if matches!(period, Period::Quarterly) {
        query.push("p=quarterly");
    }
    if matches!(data_type, DataType::AsReported) {
        query.push("type=as-reported");
    }

    if !query.is_empty() {
        url.push('?');
        url.push_str(&query.join("&"));
    }
    url
}

/// A scratch path a debug screenshot would be written to, exposed so the
/// orchestrator can surface it in logs/notes without reaching into
/// `std::env::temp_dir` itself.
pub fn debug_screenshot_dir() -> PathBuf {
    std::env::temp_dir()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_for_quarterly_income_as_reported() {
        let url = build_financials_url(
            "https://stockanalysis.com",
            "ZM",
            StatementType::Income,
            Period::Quarterly,
            DataType::AsReported,
        );
        assert_eq!(
            url,
            "https://stockanalysis.com/stocks/zm/financials?p=quarterly&type=as-reported"
        );
    }

    #[test]
    fn url_for_annual_balance_sheet() {
        let url = build_financials_url(
            "https://stockanalysis.com",
            "AAPL",
            StatementType::Balance,
            Period::Annual,
            DataType::AsReported,
        );
        assert_eq!(
            url,
            "https://stockanalysis.com/stocks/aapl/financials/balance-sheet?type=as-reported"
        );
    }

    #[test]
    fn url_for_annual_cashflow_lowercases_ticker() {
        let url = build_financials_url(
            "https://stockanalysis.com",
            "PLTR",
            StatementType::CashFlow,
            Period::Annual,
            DataType::AsReported,
        );
        assert_eq!(
            url,
            "https://stockanalysis.com/stocks/pltr/financials/cash-flow-statement?type=as-reported"
        );
    }
}
