use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Whether an earnings release happened before market open or after market
/// close. Drives no branching logic today but is echoed back in the
/// callback, per the external identity invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timing {
    PreMarket,
    AfterHours,
}

/// One unit of ingress work: a single ticker's earnings event.
///
/// The tuple `(ticker, report_date, timing)` is this job's external
/// identity and must be echoed verbatim in the terminal callback.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TickerJob {
    #[validate(length(min = 1, max = 10))]
    pub ticker: String,
    pub report_date: NaiveDate,
    pub fiscal_period_end: Option<NaiveDate>,
    pub timing: Timing,
    #[validate(url)]
    pub callback_url: String,
}

impl TickerJob {
    /// The column-header date this run should write into the newly inserted
    /// column. `fiscal_period_end` is authoritative; `report_date`
    /// substitutes when it is absent.
    pub fn effective_period_end(&self) -> NaiveDate {
        self.fiscal_period_end.unwrap_or(self.report_date)
    }

    /// Upper-cased ticker symbol, as used in object-store keys and the
    /// financial-site URL.
    pub fn ticker_upper(&self) -> String {
        self.ticker.to_uppercase()
    }

    /// Lower-cased ticker symbol, as used in the financial-site URL path.
    pub fn ticker_lower(&self) -> String {
        self.ticker.to_lowercase()
    }
}

/// The ingress envelope the dispatcher posts: a batch of ticker jobs sharing
/// one callback URL.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct IngestRequest {
    #[validate(length(min = 1))]
    #[validate(nested)]
    pub tickers: Vec<TickerJobInput>,
    #[validate(url)]
    pub callback_url: String,
}

/// A single ticker entry inside an [`IngestRequest`], before the shared
/// `callback_url` has been folded in to produce a standalone [`TickerJob`].
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TickerJobInput {
    #[validate(length(min = 1, max = 10))]
    pub ticker: String,
    pub report_date: NaiveDate,
    pub fiscal_period_end: Option<NaiveDate>,
    pub timing: Timing,
}

impl TickerJobInput {
    pub fn into_job(self, callback_url: String) -> TickerJob {
        TickerJob {
            ticker: self.ticker,
            report_date: self.report_date,
            fiscal_period_end: self.fiscal_period_end,
            timing: self.timing,
            callback_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job() -> TickerJob {
        TickerJob {
            ticker: "ZM".to_string(),
            report_date: NaiveDate::from_ymd_opt(2026, 2, 28).unwrap(),
            fiscal_period_end: Some(NaiveDate::from_ymd_opt(2026, 1, 31).unwrap()),
            timing: Timing::AfterHours,
            callback_url: "https://dispatcher.example.com/callback".to_string(),
        }
    }

    #[test]
    fn effective_period_end_prefers_fiscal_period_end() {
        let job = sample_job();
        assert_eq!(
            job.effective_period_end(),
            NaiveDate::from_ymd_opt(2026, 1, 31).unwrap()
        );
    }

    #[test]
    fn effective_period_end_falls_back_to_report_date() {
        let mut job = sample_job();
        job.fiscal_period_end = None;
        assert_eq!(job.effective_period_end(), job.report_date);
    }

    #[test]
    fn ticker_case_helpers() {
        let mut job = sample_job();
        job.ticker = "zm".to_string();
        assert_eq!(job.ticker_upper(), "ZM");
        assert_eq!(job.ticker_lower(), "zm");
    }
}
