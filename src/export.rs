use crate::model::Series;
use anyhow::Result;
use serde::Serialize;
use std::path::Path;
use tracing::info;

#[derive(Serialize, Debug)]
struct ExportRow {
    date: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: u64,
    moving_average: Option<f64>,
    rsi: Option<f64>,
    std_deviation: Option<f64>,
}

fn column_value(column: &Option<Vec<Option<f64>>>, i: usize) -> Option<f64> {
    column.as_ref().and_then(|c| c.get(i).copied().flatten())
}

/// Day precision for daily or coarser bars, full UTC time when several bars share a day.
fn date_format(series: &Series) -> &'static str {
    let intraday = series
        .points
        .windows(2)
        .any(|w| w[0].timestamp.date_naive() == w[1].timestamp.date_naive());
    if intraday { "%Y-%m-%d %H:%M:%S" } else { "%Y-%m-%d" }
}

/// Writes the series with its derived columns. Missing values become empty fields.
pub fn export_data_to_csv<P: AsRef<Path>>(series: &Series, path: P) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path.as_ref())?;
    let format = date_format(series);
    for (i, point) in series.points.iter().enumerate() {
        wtr.serialize(ExportRow {
            date: point.timestamp.format(format).to_string(),
            open: point.open,
            high: point.high,
            low: point.low,
            close: point.close,
            volume: point.volume,
            moving_average: column_value(&series.moving_average, i),
            rsi: column_value(&series.rsi, i),
            std_deviation: column_value(&series.std_deviation, i),
        })?;
    }
    wtr.flush()?;
    info!("Exported {} rows to {:?}", series.len(), path.as_ref());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::add_moving_average;
    use crate::model::tests::series_from_closes;
    use chrono::{TimeZone, Utc};

    #[test]
    fn writes_header_and_blank_missing_values() {
        let series = add_moving_average(series_from_closes(&[1.0, 2.0, 3.0]), 2).unwrap();
        let path = std::env::temp_dir().join(format!("stock-charter-export-{}.csv", std::process::id()));

        export_data_to_csv(&series, &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(
            lines[0],
            "date,open,high,low,close,volume,moving_average,rsi,std_deviation"
        );
        assert_eq!(lines[1], "2024-01-01,1.0,1.0,1.0,1.0,1000,,,");
        assert_eq!(lines[3], "2024-01-03,3.0,3.0,3.0,3.0,1000,2.5,,");
        assert_eq!(lines.len(), 4);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn hourly_bars_keep_their_time() {
        let mut series = series_from_closes(&[1.0, 2.0, 3.0]);
        for (i, point) in series.points.iter_mut().enumerate() {
            point.timestamp = Utc.with_ymd_and_hms(2024, 1, 2, 14 + i as u32, 30, 0).unwrap();
        }
        let path = std::env::temp_dir().join(format!("stock-charter-hourly-{}.csv", std::process::id()));

        export_data_to_csv(&series, &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let dates: Vec<&str> = content
            .lines()
            .skip(1)
            .map(|l| l.split(',').next().unwrap())
            .collect();

        assert_eq!(
            dates,
            vec!["2024-01-02 14:30:00", "2024-01-02 15:30:00", "2024-01-02 16:30:00"]
        );

        let _ = std::fs::remove_file(&path);
    }
}
