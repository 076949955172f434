use serde::{Deserialize, Serialize};

/// Which of the three financial statements a target file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementType {
    Income,
    Balance,
    CashFlow,
}

/// Quarterly vs. annual reporting period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Quarterly,
    Annual,
}

/// The financial-data site's display-format toggle. Only `AsReported` is
/// exposed to the agent's `browse_stockanalysis` tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataType {
    AsReported,
}

/// One of the six object-store buckets this run may touch, mapped to the
/// browse parameters the browser session needs to reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetFile {
    pub bucket: &'static str,
    pub statement_type: StatementType,
    pub period: Period,
    pub data_type: DataType,
}

impl TargetFile {
    pub const fn new(bucket: &'static str, statement_type: StatementType, period: Period) -> Self {
        TargetFile {
            bucket,
            statement_type,
            period,
            data_type: DataType::AsReported,
        }
    }

    pub fn is_annual(&self) -> bool {
        matches!(self.period, Period::Annual)
    }
}

/// The fixed processing order: quarterly files first (income, balance,
/// cash-flow), then the corresponding annual files. Quarterly files are
/// always processed; annual files are gated on the detected quarter (§4.5.4).
pub const FILE_ORDER: [TargetFile; 6] = [
    TargetFile::new(
        "financials-quarterly-income",
        StatementType::Income,
        Period::Quarterly,
    ),
    TargetFile::new(
        "financials-quarterly-balance",
        StatementType::Balance,
        Period::Quarterly,
    ),
    TargetFile::new(
        "financials-quarterly-cashflow",
        StatementType::CashFlow,
        Period::Quarterly,
    ),
    TargetFile::new(
        "financials-annual-income",
        StatementType::Income,
        Period::Annual,
    ),
    TargetFile::new(
        "financials-annual-balance",
        StatementType::Balance,
        Period::Annual,
    ),
    TargetFile::new(
        "financials-annual-cashflow",
        StatementType::CashFlow,
        Period::Annual,
    ),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_order_is_quarterly_before_annual() {
        let first_annual = FILE_ORDER.iter().position(|f| f.is_annual()).unwrap();
        assert!(FILE_ORDER[..first_annual].iter().all(|f| !f.is_annual()));
    }

    #[test]
    fn file_order_has_six_entries_matching_the_bucket_naming_scheme() {
        assert_eq!(FILE_ORDER.len(), 6);
        for file in FILE_ORDER.iter() {
            let expected_period = if file.is_annual() { "annual" } else { "quarterly" };
            assert!(file.bucket.contains(expected_period));
        }
    }
}
