use crate::analysis::AnalysisOutcome;
use crate::model::Series;
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ContentArrangement, Table, modifiers::UTF8_ROUND_CORNERS,
    presets::UTF8_BORDERS_ONLY,
};

const TAIL_ROWS: usize = 10;

fn format_optional(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.2}", v))
}

fn column_at(column: &Option<Vec<Option<f64>>>, i: usize) -> Option<f64> {
    column.as_ref().and_then(|c| c.get(i).copied().flatten())
}

fn bold(text: &str) -> Cell {
    Cell::new(text).add_attribute(Attribute::Bold)
}

pub fn statistics_table(outcome: &AnalysisOutcome) -> Table {
    let report = &outcome.fluctuation;
    let alert_cell = if report.exceeded {
        Cell::new("STRONG").fg(Color::Red).add_attribute(Attribute::Bold)
    } else {
        Cell::new("normal").fg(Color::Green)
    };

    let mut table = Table::new();
    table
        .load_preset(UTF8_BORDERS_ONLY)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![bold("Statistic"), bold("Value").set_alignment(CellAlignment::Right)]);

    let rows = [
        ("Average close", format!("{:.2}", outcome.average_price)),
        ("Std deviation (sample)", format!("{:.4}", outcome.std_deviation)),
        ("Max close", format!("{:.2}", report.max_close)),
        ("Min close", format!("{:.2}", report.min_close)),
        ("Max/min change (%)", format!("{:.2}%", report.percentage_change)),
    ];
    for (label, value) in rows {
        table.add_row(vec![
            Cell::new(label).fg(Color::DarkGrey),
            Cell::new(value).set_alignment(CellAlignment::Right),
        ]);
    }
    table.add_row(vec![
        Cell::new("Fluctuation").fg(Color::DarkGrey),
        alert_cell.set_alignment(CellAlignment::Right),
    ]);
    table
}

/// Last rows of the enriched series; RSI cells are coloured at the 30/70 levels.
pub fn recent_rows_table(series: &Series) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_BORDERS_ONLY)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            bold("Date"),
            bold("Close").set_alignment(CellAlignment::Right),
            bold("Moving Avg").set_alignment(CellAlignment::Right),
            bold("RSI").set_alignment(CellAlignment::Right),
            bold("Std Dev").set_alignment(CellAlignment::Right),
        ]);

    let start = series.len().saturating_sub(TAIL_ROWS);
    for (i, point) in series.points.iter().enumerate().skip(start) {
        let rsi = column_at(&series.rsi, i);
        let rsi_color = match rsi {
            Some(v) if v >= 70.0 => Color::Red,
            Some(v) if v <= 30.0 => Color::Green,
            _ => Color::Reset,
        };
        table.add_row(vec![
            Cell::new(point.timestamp.format("%d-%m-%Y").to_string()).fg(Color::DarkGrey),
            Cell::new(format!("{:.2}", point.close)).set_alignment(CellAlignment::Right),
            Cell::new(format_optional(column_at(&series.moving_average, i)))
                .fg(Color::Cyan)
                .set_alignment(CellAlignment::Right),
            Cell::new(format_optional(rsi))
                .fg(rsi_color)
                .set_alignment(CellAlignment::Right),
            Cell::new(format_optional(column_at(&series.std_deviation, i)))
                .set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

pub fn run(outcome: &AnalysisOutcome) {
    let series = &outcome.series;
    let title = format!("{} ({} price points)", series.ticker, series.len());
    println!(
        "\n{}\n{}\n{}",
        title,
        statistics_table(outcome),
        recent_rows_table(series)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{add_moving_average, calculate_rsi};
    use crate::model::FluctuationReport;
    use crate::model::tests::series_from_closes;

    #[test]
    fn recent_rows_keep_only_the_tail() {
        let closes: Vec<f64> = (1..=25).map(f64::from).collect();
        let series = add_moving_average(series_from_closes(&closes), 5).unwrap();
        let series = calculate_rsi(series, 2).unwrap();
        let table = recent_rows_table(&series);
        assert_eq!(table.row_iter().count(), TAIL_ROWS);
        let rendered = table.to_string();
        assert!(rendered.contains("25.00"));
        assert!(rendered.contains("23.00"), "moving average of last window");
    }

    #[test]
    fn statistics_show_alert_state() {
        let outcome = AnalysisOutcome {
            series: series_from_closes(&[100.0, 110.0]),
            average_price: 105.0,
            std_deviation: 7.0711,
            fluctuation: FluctuationReport {
                max_close: 110.0,
                min_close: 100.0,
                percentage_change: 10.0,
                exceeded: true,
            },
        };
        let rendered = statistics_table(&outcome).to_string();
        assert!(rendered.contains("STRONG"));
        assert!(rendered.contains("10.00%"));
        assert!(rendered.contains("105.00"));
    }

    #[test]
    fn missing_values_render_as_dash() {
        assert_eq!(format_optional(None), "-");
        assert_eq!(format_optional(Some(1.234)), "1.23");
    }
}
