use crate::error::AnalysisError;
use crate::model::{FluctuationReport, Series};
use tracing::debug;

pub const DEFAULT_FLUCTUATION_THRESHOLD: f64 = 10.0;

/// Mean close rounded to two decimals.
pub fn calculate_average_price(series: &Series) -> Result<f64, AnalysisError> {
    if series.is_empty() {
        return Err(AnalysisError::invalid("cannot average an empty series"));
    }
    let mean = series.points.iter().map(|p| p.close).sum::<f64>() / series.len() as f64;
    Ok((mean * 100.0).round() / 100.0)
}

pub fn fluctuation_report(series: &Series, threshold: f64) -> Result<FluctuationReport, AnalysisError> {
    if series.is_empty() {
        return Err(AnalysisError::invalid(
            "cannot measure fluctuations of an empty series",
        ));
    }

    let (min_close, max_close) = series
        .points
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p.close), hi.max(p.close))
        });

    if min_close == 0.0 {
        return Err(AnalysisError::invalid(
            "minimum closing price is zero, percentage change is undefined",
        ));
    }

    let percentage_change = (max_close - min_close) / min_close * 100.0;
    debug!(
        ticker = %series.ticker,
        min_close, max_close, percentage_change, "fluctuation measured"
    );

    Ok(FluctuationReport {
        max_close,
        min_close,
        percentage_change,
        exceeded: percentage_change > threshold,
    })
}

/// Prints whether close moved more than `threshold` percent between its extremes.
pub fn notify_if_strong_fluctuations(series: &Series, threshold: f64) -> Result<bool, AnalysisError> {
    let report = fluctuation_report(series, threshold)?;
    println!("{}", report.message(threshold));
    Ok(report.exceeded)
}
