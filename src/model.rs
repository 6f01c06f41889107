// Core structs: PricePoint, Series, FluctuationReport, HistoryRange
use crate::error::AnalysisError;
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

/// Derived column aligned by index with the base series. `None` marks a missing value.
pub type Column = Vec<Option<f64>>;

static PERIOD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(d|wk|mo|y)|ytd|max)$").expect("static period regex"));

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub ticker: String,
    pub points: Vec<PricePoint>,
    pub moving_average: Option<Column>,
    pub rsi: Option<Column>,
    pub std_deviation: Option<Column>,
}

impl Series {
    /// Builds a series from raw points, sorting by timestamp and dropping duplicate timestamps.
    pub fn new(ticker: impl Into<String>, mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.timestamp);
        points.dedup_by_key(|p| p.timestamp);
        Self {
            ticker: ticker.into(),
            points,
            moving_average: None,
            rsi: None,
            std_deviation: None,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FluctuationReport {
    pub max_close: f64,
    pub min_close: f64,
    pub percentage_change: f64,
    pub exceeded: bool,
}

impl FluctuationReport {
    pub fn message(&self, threshold: f64) -> String {
        if self.exceeded {
            format!(
                "Strong fluctuation: closing price moved {:.2}% (threshold {:.2}%).",
                self.percentage_change, threshold
            )
        } else {
            format!(
                "Price fluctuation of {:.2}% is within normal range (threshold {:.2}%).",
                self.percentage_change, threshold
            )
        }
    }
}

/// Bounds of the history to fetch: a named relative period or an explicit date pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryRange {
    Period(String),
    Dates { start: NaiveDate, end: NaiveDate },
}

impl HistoryRange {
    /// Picks the range from optional inputs. A non-empty period wins over dates.
    pub fn resolve(
        period: Option<&str>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Self, AnalysisError> {
        if let Some(period) = period.map(str::trim).filter(|p| !p.is_empty()) {
            return Self::period(period);
        }
        match (start, end) {
            (Some(start), Some(end)) if start <= end => Ok(HistoryRange::Dates { start, end }),
            (Some(start), Some(end)) => Err(AnalysisError::unavailable(format!(
                "start date {start} is after end date {end}"
            ))),
            _ => Err(AnalysisError::unavailable(
                "neither a period nor a complete date range was supplied",
            )),
        }
    }

    pub fn period(period: &str) -> Result<Self, AnalysisError> {
        let period = period.trim().to_lowercase();
        if !PERIOD_RE.is_match(&period) {
            return Err(AnalysisError::invalid(format!(
                "unrecognised period '{period}' (expected e.g. 5d, 1mo, 1y, ytd, max)"
            )));
        }
        Ok(HistoryRange::Period(period))
    }

    /// Fragment used in output file names.
    pub fn label(&self) -> String {
        match self {
            HistoryRange::Period(p) => p.clone(),
            HistoryRange::Dates { start, end } => format!("{start}_to_{end}"),
        }
    }
}

impl fmt::Display for HistoryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryRange::Period(p) => write!(f, "period {p}"),
            HistoryRange::Dates { start, end } => write!(f, "{start} to {end}"),
        }
    }
}

/// Raw user parameters for one fetch: a ticker plus a period or a date pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    pub ticker: String,
    pub period: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl HistoryRequest {
    pub fn range(&self) -> Result<HistoryRange, AnalysisError> {
        HistoryRange::resolve(self.period.as_deref(), self.start_date, self.end_date)
    }
}

/// `{ticker}_{period}_stock_price_chart.png` or `{ticker}_{start}_to_{end}_stock_price_chart.png`.
pub fn chart_filename(ticker: &str, range: &HistoryRange) -> String {
    format!("{}_{}_stock_price_chart.png", ticker, range.label())
}
