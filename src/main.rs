mod analysis;
mod comfy_table;
mod error;
mod export;
mod history;
mod indicators;
mod model;
mod plot;
mod prompt;
mod signals;
mod storage_utils;
mod tui;

use anyhow::Result;
use error::AnalysisError;
use history::YahooSource;
use plot::ChartStyle;
use prompt::{ChartMode, Prompter};
use std::io;
use storage_utils::AsyncStorageManager;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const EXAMPLE_TICKERS: &str = "AAPL (Apple Inc), GOOGL (Alphabet Inc), MSFT (Microsoft Corporation), AMZN (Amazon.com Inc), TSLA (Tesla Inc)";
const EXAMPLE_PERIODS: &str = "5d, 1mo, 3mo, 6mo, 1y, 2y, 5y, 10y, ytd, max";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    if let Err(e) = clearscreen::clear() {
        warn!("Could not clear the screen: {}", e);
    }

    // Step 1: Load configuration
    let storage = AsyncStorageManager::new_relative("storage").await?;
    let config = storage.load_or_init_config().await?;
    info!("Loaded config from {:?}", storage.base_dir);

    println!("Welcome to the stock data charting tool.");
    println!("Some tickers you could look at: {}.", EXAMPLE_TICKERS);
    println!("Common periods: {}.\n", EXAMPLE_PERIODS);

    // Step 2: Collect parameters
    let stdin = io::stdin();
    let mut prompter = Prompter::new(stdin.lock(), io::stdout());
    let request = prompter.history_request()?;

    // Step 3: Fetch and analyze
    let source = YahooSource::new(config.source.clone())?;
    let outcome = match analysis::run_analysis_pipeline(&source, &request, &config.indicators).await {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("Error analyzing {}: {}", request.ticker, e);
            if matches!(e, AnalysisError::InvalidInput(_)) {
                eprintln!(
                    "The indicators need at least {} price points; try a longer period.",
                    config.indicators.window_size.max(config.indicators.rsi_period + 1)
                );
            }
            return Err(e.into());
        }
    };
    let range = request.range()?;

    println!(
        "\nAverage closing price for the selected range: {:.2}",
        outcome.average_price
    );
    signals::notify_if_strong_fluctuations(&outcome.series, config.indicators.threshold())?;

    // Step 4: Display results
    comfy_table::run(&outcome);

    if let Some(path) = prompter.export_path()? {
        export::export_data_to_csv(&outcome.series, &path)?;
        println!("Data exported to {}", path);
    }

    // Step 5: Render the chart
    match prompter.chart_mode()? {
        ChartMode::Static => {
            let default_style: ChartStyle = config.chart.default_style.parse().unwrap_or_else(|e| {
                warn!("Ignoring configured chart style: {}", e);
                ChartStyle::default()
            });
            let style = prompter.chart_style(default_style)?;
            let filename = model::chart_filename(&request.ticker, &range);
            plot::create_and_save_plot(
                &outcome.series,
                &filename,
                config.chart.width,
                config.chart.height,
                style,
            )?;
            println!("Chart saved as {}", filename);
        }
        ChartMode::Interactive => {
            let title = format!("{} ({})", request.ticker, range);
            tui::run_tui(&source, &request, &config.indicators, outcome, title).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::HistoryRange;

    #[test]
    fn hinted_periods_are_valid_and_span_several_days() {
        for period in EXAMPLE_PERIODS.split(", ") {
            assert!(HistoryRange::period(period).is_ok(), "{period}");
            assert_ne!(period, "1d");
        }
    }
}
