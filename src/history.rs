use crate::error::AnalysisError;
use crate::model::{HistoryRange, PricePoint, Series};
use crate::storage_utils::SourceConfig;
use chrono::{DateTime, NaiveDate, NaiveTime};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Supplier of price history for one ticker.
pub trait SeriesSource {
    async fn fetch_range(&self, ticker: &str, range: &HistoryRange) -> Result<Series, AnalysisError>;

    /// Resolves the optional period/date inputs and fetches the matching history.
    async fn fetch(
        &self,
        ticker: &str,
        period: Option<&str>,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Series, AnalysisError> {
        let range = HistoryRange::resolve(period, start_date, end_date)?;
        self.fetch_range(ticker, &range).await
    }
}

// --- Yahoo chart payload ---

#[derive(Deserialize, Debug)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Deserialize, Debug)]
struct ChartBody {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Deserialize, Debug)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Deserialize, Debug)]
struct ChartIndicators {
    quote: Vec<Quote>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct Quote {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<u64>>,
}

#[derive(Deserialize, Debug)]
struct ChartError {
    code: String,
    description: String,
}

fn parse_chart(ticker: &str, body: &[u8]) -> Result<Series, AnalysisError> {
    let response: ChartResponse = serde_json::from_slice(body)
        .map_err(|e| AnalysisError::unavailable(format!("malformed chart payload: {e}")))?;

    if let Some(err) = response.chart.error {
        return Err(AnalysisError::unavailable(format!(
            "{}: {}",
            err.code, err.description
        )));
    }

    let data = response
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| AnalysisError::unavailable(format!("no history returned for {ticker}")))?;

    let timestamps = data.timestamp.unwrap_or_default();
    let quote = data.indicators.quote.into_iter().next().unwrap_or_default();

    let mut skipped = 0usize;
    let points: Vec<PricePoint> = timestamps
        .iter()
        .enumerate()
        .filter_map(|(i, &ts)| {
            let at = |col: &Vec<Option<f64>>| col.get(i).copied().flatten();
            let point = match (
                DateTime::from_timestamp(ts, 0),
                at(&quote.open),
                at(&quote.high),
                at(&quote.low),
                at(&quote.close),
            ) {
                (Some(timestamp), Some(open), Some(high), Some(low), Some(close)) => Some(PricePoint {
                    timestamp,
                    open,
                    high,
                    low,
                    close,
                    volume: quote.volume.get(i).copied().flatten().unwrap_or(0),
                }),
                _ => None,
            };
            if point.is_none() {
                skipped += 1;
            }
            point
        })
        .collect();

    if skipped > 0 {
        debug!("Skipped {} incomplete rows for {}", skipped, ticker);
    }
    if points.is_empty() {
        return Err(AnalysisError::unavailable(format!(
            "no complete price rows for {ticker}"
        )));
    }

    Ok(Series::new(ticker, points))
}

/// Turns a chart response into a series. Any non-success status is `DataUnavailable`,
/// carrying Yahoo's own error description when the body has one.
fn check_response(ticker: &str, status: StatusCode, body: &[u8]) -> Result<Series, AnalysisError> {
    if status.is_success() {
        return parse_chart(ticker, body);
    }
    warn!("History request for {} failed with {}", ticker, status);
    // Yahoo reports unknown tickers as 404 with an error payload
    let reported = serde_json::from_slice::<ChartResponse>(body)
        .ok()
        .and_then(|r| r.chart.error);
    Err(match reported {
        Some(err) => AnalysisError::unavailable(format!("{}: {}", err.code, err.description)),
        None => AnalysisError::unavailable(format!(
            "history request for {ticker} returned {status}"
        )),
    })
}

/// Query parameters for the chart endpoint. The end date is exclusive.
fn range_query(range: &HistoryRange, interval: &str) -> Vec<(&'static str, String)> {
    let mut query = vec![("interval", interval.to_string())];
    match range {
        HistoryRange::Period(period) => query.push(("range", period.clone())),
        HistoryRange::Dates { start, end } => {
            let to_ts = |d: &NaiveDate| d.and_time(NaiveTime::MIN).and_utc().timestamp();
            query.push(("period1", to_ts(start).to_string()));
            query.push(("period2", to_ts(end).to_string()));
        }
    }
    query
}

/// Daily history from the Yahoo Finance chart API.
#[derive(Clone)]
pub struct YahooSource {
    client: Client,
    config: SourceConfig,
}

impl YahooSource {
    pub fn new(config: SourceConfig) -> Result<Self, AnalysisError> {
        let client = Client::builder().user_agent(&config.user_agent).build()?;
        Ok(Self { client, config })
    }
}

impl SeriesSource for YahooSource {
    async fn fetch_range(&self, ticker: &str, range: &HistoryRange) -> Result<Series, AnalysisError> {
        let url = format!("{}/{}", self.config.base_url, ticker);
        let query = range_query(range, &self.config.interval);
        info!("Fetching {} history ({})", ticker, range);

        let response = self.client.get(&url).query(&query).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        let series = check_response(ticker, status, &body)?;
        info!("Received {} price points for {}", series.len(), ticker);
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{
        "chart": {
            "result": [{
                "meta": { "symbol": "AAPL" },
                "timestamp": [1704412800, 1704240000, 1704326400, 1704499200],
                "indicators": {
                    "quote": [{
                        "open":   [183.0, 187.1, 184.2, null],
                        "high":   [184.5, 188.4, 185.9, 186.0],
                        "low":    [182.1, 183.9, 183.4, 184.0],
                        "close":  [184.2, 185.6, 184.3, 185.1],
                        "volume": [58414500, null, 58953100, 6000]
                    }]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn parses_and_orders_points() {
        let series = parse_chart("AAPL", PAYLOAD.as_bytes()).unwrap();
        assert_eq!(series.ticker, "AAPL");
        // the row with a null open is dropped
        assert_eq!(series.len(), 3);
        assert_eq!(series.closes(), vec![185.6, 184.3, 184.2]);
        assert_eq!(series.points[0].volume, 0);
        assert!(series.points.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert!(series.moving_average.is_none());
    }

    #[test]
    fn error_payload_is_data_unavailable() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let err = parse_chart("NOPE", body.as_bytes()).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::DataUnavailable("Not Found: No data found, symbol may be delisted".into())
        );
    }

    #[test]
    fn garbage_is_data_unavailable() {
        assert!(matches!(
            parse_chart("X", b"<html>rate limited</html>"),
            Err(AnalysisError::DataUnavailable(_))
        ));
    }

    #[test]
    fn not_found_keeps_yahoo_description() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let err = check_response("NOPE", StatusCode::NOT_FOUND, body.as_bytes()).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::DataUnavailable("Not Found: No data found, symbol may be delisted".into())
        );
    }

    #[test]
    fn server_error_without_json_reports_status() {
        let err = check_response("AAPL", StatusCode::INTERNAL_SERVER_ERROR, b"<html>oops</html>").unwrap_err();
        match err {
            AnalysisError::DataUnavailable(msg) => assert!(msg.contains("500"), "{msg}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn error_status_with_valid_payload_is_still_unavailable() {
        assert!(matches!(
            check_response("AAPL", StatusCode::TOO_MANY_REQUESTS, PAYLOAD.as_bytes()),
            Err(AnalysisError::DataUnavailable(_))
        ));
    }

    #[test]
    fn success_status_parses_body() {
        let series = check_response("AAPL", StatusCode::OK, PAYLOAD.as_bytes()).unwrap();
        assert_eq!(series.len(), 3);
    }

    #[test]
    fn query_uses_range_or_epoch_bounds() {
        let q = range_query(&HistoryRange::Period("1mo".into()), "1d");
        assert_eq!(q, vec![("interval", "1d".to_string()), ("range", "1mo".to_string())]);

        let dates = HistoryRange::Dates {
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        };
        let q = range_query(&dates, "1d");
        assert_eq!(q[1], ("period1", "1704067200".to_string()));
        assert_eq!(q[2], ("period2", "1704153600".to_string()));
    }
}
