use crate::error::AnalysisError;
use crate::model::HistoryRequest;
use crate::plot::ChartStyle;
use anyhow::Result;
use chrono::NaiveDate;
use regex::Regex;
use std::io::{BufRead, Write};
use std::sync::LazyLock;

static TICKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9^][A-Z0-9.\-=]{0,14}$").expect("static ticker regex"));

pub fn normalize_ticker(input: &str) -> Result<String, AnalysisError> {
    let ticker = input.trim().to_uppercase();
    if !TICKER_RE.is_match(&ticker) {
        return Err(AnalysisError::invalid(format!("'{}' is not a ticker symbol", input.trim())));
    }
    Ok(ticker)
}

pub fn parse_date(input: &str) -> Result<NaiveDate, AnalysisError> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|e| AnalysisError::invalid(format!("'{}' is not a YYYY-MM-DD date: {e}", input.trim())))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartMode {
    Static,
    Interactive,
}

impl ChartMode {
    pub fn parse(input: &str) -> Result<Self, AnalysisError> {
        match input.trim().to_lowercase().as_str() {
            "" | "s" | "static" => Ok(ChartMode::Static),
            "i" | "interactive" => Ok(ChartMode::Interactive),
            other => Err(AnalysisError::invalid(format!("unknown chart mode '{other}'"))),
        }
    }
}

/// Line-oriented prompts over any reader/writer pair.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn ask(&mut self, question: &str) -> Result<String> {
        write!(self.output, "{question}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            anyhow::bail!("input closed");
        }
        Ok(line.trim().to_string())
    }

    /// Asks for the ticker, then a period; an empty period switches to a start/end date pair.
    pub fn history_request(&mut self) -> Result<HistoryRequest> {
        let ticker = normalize_ticker(&self.ask("Enter a stock ticker (e.g. 'AAPL' for Apple Inc): ")?)?;
        let period = self.ask(
            "Enter a period for the data (e.g. '1mo' for one month), or press Enter to give specific dates: ",
        )?;

        if !period.is_empty() {
            return Ok(HistoryRequest {
                ticker,
                period: Some(period),
                start_date: None,
                end_date: None,
            });
        }

        let start = parse_date(&self.ask("Enter the start date (YYYY-MM-DD): ")?)?;
        let end = parse_date(&self.ask("Enter the end date (YYYY-MM-DD): ")?)?;
        Ok(HistoryRequest {
            ticker,
            period: None,
            start_date: Some(start),
            end_date: Some(end),
        })
    }

    /// Empty answer means no export.
    pub fn export_path(&mut self) -> Result<Option<String>> {
        let path = self.ask("Export the data to CSV? Enter a file name, or press Enter to skip: ")?;
        Ok((!path.is_empty()).then_some(path))
    }

    /// Unknown style names fall back to `fallback` with a notice.
    pub fn chart_style(&mut self, fallback: ChartStyle) -> Result<ChartStyle> {
        let answer = self.ask(&format!(
            "Choose a chart style ({}), or press Enter for the default: ",
            ChartStyle::NAMES.join(", ")
        ))?;
        if answer.is_empty() {
            return Ok(fallback);
        }
        match answer.parse() {
            Ok(style) => Ok(style),
            Err(e) => {
                writeln!(self.output, "{e}; using the default style.")?;
                Ok(fallback)
            }
        }
    }

    pub fn chart_mode(&mut self) -> Result<ChartMode> {
        let answer = self.ask("Chart type: [s]tatic image or [i]nteractive terminal chart (Enter for static): ")?;
        Ok(ChartMode::parse(&answer)?)
    }
}
