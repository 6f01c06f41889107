//! This module contains the core analysis pipeline logic.

use crate::error::AnalysisError;
use crate::history::SeriesSource;
use crate::indicators;
use crate::model::{FluctuationReport, HistoryRequest, Series};
use crate::signals;
use crate::storage_utils::IndicatorConfig;
use tracing::info;

#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub series: Series,
    pub average_price: f64,
    pub std_deviation: f64,
    pub fluctuation: FluctuationReport,
}

/// Runs the full analysis pipeline:
/// 1. Fetches the price history for the requested ticker and range.
/// 2. Adds the moving average and measures average price and fluctuation.
/// 3. Adds RSI, standard deviation and the rolling volatility band.
pub async fn run_analysis_pipeline<S: SeriesSource>(
    source: &S,
    request: &HistoryRequest,
    settings: &IndicatorConfig,
) -> Result<AnalysisOutcome, AnalysisError> {
    // Step 1: Fetch history
    let series = source
        .fetch(
            &request.ticker,
            request.period.as_deref(),
            request.start_date,
            request.end_date,
        )
        .await?;

    // Step 2: Moving average and signals
    let series = indicators::add_moving_average(series, settings.window_size)?;
    let average_price = signals::calculate_average_price(&series)?;
    let fluctuation = signals::fluctuation_report(&series, settings.threshold())?;

    // Step 3: Momentum and volatility
    let series = indicators::calculate_rsi(series, settings.rsi_period)?;
    let std_deviation = indicators::calculate_standard_deviation(&series)?;
    let series = indicators::add_volatility_band(series, settings.window_size.max(2))?;

    info!(
        ticker = %series.ticker,
        points = series.len(),
        average_price,
        std_deviation,
        percentage_change = fluctuation.percentage_change,
        "analysis complete"
    );

    Ok(AnalysisOutcome {
        series,
        average_price,
        std_deviation,
        fluctuation,
    })
}
