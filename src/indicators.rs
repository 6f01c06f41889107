use crate::error::AnalysisError;
use crate::model::{Column, Series};
use ta::Next;
use ta::indicators::SimpleMovingAverage;

pub const DEFAULT_MA_WINDOW: usize = 5;
pub const DEFAULT_RSI_PERIOD: usize = 2;

fn check_window(series: &Series, window_size: usize, what: &str) -> Result<(), AnalysisError> {
    if window_size == 0 {
        return Err(AnalysisError::invalid(format!("{what} window must be positive")));
    }
    if window_size > series.len() {
        return Err(AnalysisError::invalid(format!(
            "{what} window {window_size} exceeds series length {}",
            series.len()
        )));
    }
    Ok(())
}

/// Rolling mean of close over `window_size` points. Entries before the window fills are missing.
pub fn add_moving_average(mut series: Series, window_size: usize) -> Result<Series, AnalysisError> {
    check_window(&series, window_size, "moving average")?;
    let mut sma = SimpleMovingAverage::new(window_size)
        .map_err(|e| AnalysisError::invalid(format!("{e:?}")))?;

    let column: Column = series
        .points
        .iter()
        .enumerate()
        .map(|(i, point)| {
            let value = sma.next(point.close);
            (i + 1 >= window_size).then_some(value)
        })
        .collect();

    series.moving_average = Some(column);
    Ok(series)
}

/// RSI from the average gain and average loss of one window.
fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    // rolling sums can drift a hair below zero
    let (gain, loss) = (avg_gain.max(0.0), avg_loss.max(0.0));
    match (gain > 0.0, loss > 0.0) {
        (_, true) => 100.0 - 100.0 / (1.0 + gain / loss),
        (true, false) => 100.0,
        (false, false) => 50.0,
    }
}

/// RSI over close with simple rolling averages of the last `period` up and down moves.
/// The first `period` entries are missing.
pub fn calculate_rsi(mut series: Series, period: usize) -> Result<Series, AnalysisError> {
    if period == 0 {
        return Err(AnalysisError::invalid("RSI period must be positive"));
    }
    if series.len() <= period {
        return Err(AnalysisError::invalid(format!(
            "RSI period {period} needs more than {period} points, series has {}",
            series.len()
        )));
    }
    let mut gains = SimpleMovingAverage::new(period)
        .map_err(|e| AnalysisError::invalid(format!("{e:?}")))?;
    let mut losses = SimpleMovingAverage::new(period)
        .map_err(|e| AnalysisError::invalid(format!("{e:?}")))?;

    let closes = series.closes();
    let mut column: Column = vec![None];
    column.extend(closes.windows(2).enumerate().map(|(i, w)| {
        let change = w[1] - w[0];
        let avg_gain = gains.next(change.max(0.0));
        let avg_loss = losses.next((-change).max(0.0));
        // move i ends at bar i + 1; the window is full once `period` moves are in
        (i + 1 >= period).then(|| rsi_value(avg_gain, avg_loss))
    }));

    series.rsi = Some(column);
    Ok(series)
}

fn sample_std_dev(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    variance.sqrt()
}

/// Sample standard deviation (divisor n-1) of close.
pub fn calculate_standard_deviation(series: &Series) -> Result<f64, AnalysisError> {
    if series.len() < 2 {
        return Err(AnalysisError::invalid(
            "standard deviation needs at least two points",
        ));
    }
    Ok(sample_std_dev(&series.closes()))
}

/// Rolling sample standard deviation of close, stored as the `std_deviation` column.
pub fn add_volatility_band(mut series: Series, window_size: usize) -> Result<Series, AnalysisError> {
    check_window(&series, window_size, "volatility band")?;
    if window_size < 2 {
        return Err(AnalysisError::invalid(
            "volatility band window must cover at least two points",
        ));
    }
    let closes = series.closes();
    let mut column: Column = vec![None; window_size - 1];
    column.extend(closes.windows(window_size).map(|w| Some(sample_std_dev(w))));

    series.std_deviation = Some(column);
    Ok(series)
}
