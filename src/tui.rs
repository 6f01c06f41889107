use crate::analysis::{self, AnalysisOutcome};
use crate::history::SeriesSource;
use crate::model::HistoryRequest;
use crate::storage_utils::IndicatorConfig;
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    widgets::{Axis, Block, Borders, Chart, Clear, Dataset, GraphType, Paragraph, block::Title},
};
use std::io;
use std::time::Duration;
use tracing::warn;

// --- App State ---

struct App {
    outcome: AnalysisOutcome,
    title: String,
    show_average: bool,
    show_band: bool,
    cursor: usize,
    is_refreshing: bool,
    status: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum Action {
    Continue,
    Refresh,
    Quit,
}

impl App {
    fn new(outcome: AnalysisOutcome, title: String) -> Self {
        let cursor = outcome.series.len().saturating_sub(1);
        Self {
            outcome,
            title,
            show_average: true,
            show_band: true,
            cursor,
            is_refreshing: false,
            status: None,
        }
    }

    fn set_outcome(&mut self, outcome: AnalysisOutcome) {
        self.cursor = self.cursor.min(outcome.series.len().saturating_sub(1));
        self.outcome = outcome;
        self.is_refreshing = false;
        self.status = None;
    }
}

// --- Chart data ---

fn indexed(values: impl Iterator<Item = Option<f64>>) -> Vec<(f64, f64)> {
    values
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i as f64, v)))
        .collect()
}

fn column_points(column: &Option<Vec<Option<f64>>>) -> Vec<(f64, f64)> {
    column
        .as_ref()
        .map(|c| indexed(c.iter().copied()))
        .unwrap_or_default()
}

/// Upper and lower edges of the moving average ± standard deviation band.
fn band_points(outcome: &AnalysisOutcome) -> (Vec<(f64, f64)>, Vec<(f64, f64)>) {
    let series = &outcome.series;
    let (Some(ma), Some(sd)) = (&series.moving_average, &series.std_deviation) else {
        return (Vec::new(), Vec::new());
    };
    let pairs = || ma.iter().zip(sd).map(|(m, s)| m.zip(*s));
    (
        indexed(pairs().map(|p| p.map(|(m, s)| m + s))),
        indexed(pairs().map(|p| p.map(|(m, s)| m - s))),
    )
}

fn value_bounds<'a>(sets: impl IntoIterator<Item = &'a Vec<(f64, f64)>>) -> [f64; 2] {
    let (lo, hi) = sets
        .into_iter()
        .flatten()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, y)| {
            (lo.min(y), hi.max(y))
        });
    if !lo.is_finite() {
        return [0.0, 1.0];
    }
    let pad = ((hi - lo) * 0.05).max(0.01);
    [lo - pad, hi + pad]
}

// --- TUI ---

/// Shows the enriched series as an interactive terminal chart until the user quits.
pub async fn run_tui<S: SeriesSource>(
    source: &S,
    request: &HistoryRequest,
    settings: &IndicatorConfig,
    outcome: AnalysisOutcome,
    title: String,
) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(outcome, title);
    let res = run_app(&mut terminal, &mut app, source, request, settings).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    res
}

async fn run_app<B: Backend, S: SeriesSource>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    source: &S,
    request: &HistoryRequest,
    settings: &IndicatorConfig,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if app.is_refreshing {
            match analysis::run_analysis_pipeline(source, request, settings).await {
                Ok(outcome) => app.set_outcome(outcome),
                Err(e) => {
                    warn!("Refresh failed: {}", e);
                    app.is_refreshing = false;
                    app.status = Some(format!("Refresh failed: {e}"));
                }
            }
            continue;
        }

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                match handle_key_event(key, app) {
                    Action::Quit => return Ok(()),
                    Action::Refresh => app.is_refreshing = true,
                    Action::Continue => {}
                }
            }
            // Resize events need no handling; the next draw picks up the new size.
        }
    }
}

fn handle_key_event(key: KeyEvent, app: &mut App) -> Action {
    if key.kind != KeyEventKind::Press {
        return Action::Continue;
    }
    let last = app.outcome.series.len().saturating_sub(1);
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => return Action::Quit,
        KeyCode::F(5) if !app.is_refreshing => return Action::Refresh,
        KeyCode::Char('m') => app.show_average = !app.show_average,
        KeyCode::Char('v') => app.show_band = !app.show_band,
        KeyCode::Left => app.cursor = app.cursor.saturating_sub(1),
        KeyCode::Right => app.cursor = (app.cursor + 1).min(last),
        KeyCode::Home => app.cursor = 0,
        KeyCode::End => app.cursor = last,
        _ => {}
    }
    Action::Continue
}

fn cursor_line(app: &App) -> Line<'static> {
    let series = &app.outcome.series;
    let Some(point) = series.points.get(app.cursor) else {
        return Line::from("No data");
    };
    let at = |c: &Option<Vec<Option<f64>>>| {
        c.as_ref()
            .and_then(|c| c.get(app.cursor).copied().flatten())
            .map_or_else(|| "-".to_string(), |v| format!("{:.2}", v))
    };
    Line::from(vec![
        Span::styled(
            point.timestamp.format("%d-%m-%Y").to_string(),
            Style::default().fg(Color::Yellow),
        ),
        Span::raw(format!("  close {:.2}", point.close)),
        Span::styled(format!("  ma {}", at(&series.moving_average)), Style::default().fg(Color::Magenta)),
        Span::styled(format!("  rsi {}", at(&series.rsi)), Style::default().fg(Color::Green)),
        Span::raw(format!("  sd {}", at(&series.std_deviation))),
    ])
}

fn axis_labels(bounds: [f64; 2]) -> Vec<Span<'static>> {
    let mid = (bounds[0] + bounds[1]) / 2.0;
    [bounds[0], mid, bounds[1]]
        .iter()
        .map(|v| Span::raw(format!("{:.2}", v)))
        .collect()
}

fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::vertical([
        Constraint::Length(3),
        Constraint::Percentage(62),
        Constraint::Min(6),
        Constraint::Length(1),
    ])
    .split(f.size());

    let report = &app.outcome.fluctuation;
    let alert = if report.exceeded {
        Span::styled(
            format!(" {:.2}% swing ", report.percentage_change),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )
    } else {
        Span::raw(format!(" {:.2}% swing ", report.percentage_change))
    };
    f.render_widget(
        Paragraph::new(cursor_line(app)).block(
            Block::default()
                .borders(Borders::ALL)
                .title(app.title.clone())
                .title(Title::from(alert).alignment(Alignment::Right)),
        ),
        chunks[0],
    );

    // Price chart
    let series = &app.outcome.series;
    let closes = indexed(series.points.iter().map(|p| Some(p.close)));
    let average = column_points(&series.moving_average);
    let (upper, lower) = band_points(&app.outcome);
    let x_bounds = [0.0, series.len().saturating_sub(1).max(1) as f64];
    let cursor_x = app.cursor as f64;

    let mut visible = vec![&closes];
    if app.show_average {
        visible.push(&average);
    }
    if app.show_band {
        visible.push(&upper);
        visible.push(&lower);
    }
    let y_bounds = value_bounds(visible);
    let marker = [(cursor_x, y_bounds[0]), (cursor_x, y_bounds[1])];

    let mut datasets = vec![
        Dataset::default()
            .name("Close")
            .marker(ratatui::symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Cyan))
            .data(&closes),
    ];
    if app.show_average {
        datasets.push(
            Dataset::default()
                .name("Moving Average")
                .marker(ratatui::symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::Magenta))
                .data(&average),
        );
    }
    if app.show_band {
        for (name, data) in [("+1 sd", &upper), ("-1 sd", &lower)] {
            datasets.push(
                Dataset::default()
                    .name(name)
                    .marker(ratatui::symbols::Marker::Dot)
                    .graph_type(GraphType::Line)
                    .style(Style::default().fg(Color::DarkGray))
                    .data(data),
            );
        }
    }
    datasets.push(
        Dataset::default()
            .marker(ratatui::symbols::Marker::Dot)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Yellow))
            .data(&marker),
    );

    f.render_widget(
        Chart::new(datasets)
            .block(Block::default().borders(Borders::ALL).title("Close Price"))
            .x_axis(Axis::default().bounds(x_bounds))
            .y_axis(
                Axis::default()
                    .bounds(y_bounds)
                    .labels(axis_labels(y_bounds))
                    .style(Style::default().fg(Color::Gray)),
            ),
        chunks[1],
    );

    // RSI chart
    let rsi = column_points(&series.rsi);
    let upper_guide = [(x_bounds[0], 70.0), (x_bounds[1], 70.0)];
    let lower_guide = [(x_bounds[0], 30.0), (x_bounds[1], 30.0)];
    let rsi_marker = [(cursor_x, 0.0), (cursor_x, 100.0)];
    let rsi_datasets = vec![
        Dataset::default()
            .graph_type(GraphType::Line)
            .marker(ratatui::symbols::Marker::Dot)
            .style(Style::default().fg(Color::DarkGray))
            .data(&upper_guide),
        Dataset::default()
            .graph_type(GraphType::Line)
            .marker(ratatui::symbols::Marker::Dot)
            .style(Style::default().fg(Color::DarkGray))
            .data(&lower_guide),
        Dataset::default()
            .name("RSI")
            .marker(ratatui::symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Green))
            .data(&rsi),
        Dataset::default()
            .marker(ratatui::symbols::Marker::Dot)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Yellow))
            .data(&rsi_marker),
    ];
    f.render_widget(
        Chart::new(rsi_datasets)
            .block(Block::default().borders(Borders::ALL).title("RSI"))
            .x_axis(Axis::default().bounds(x_bounds))
            .y_axis(
                Axis::default()
                    .bounds([0.0, 100.0])
                    .labels(vec![Span::raw("0"), Span::raw("50"), Span::raw("100")])
                    .style(Style::default().fg(Color::Gray)),
            ),
        chunks[2],
    );

    let help = app.status.clone().unwrap_or_else(|| {
        "←/→ move  m moving average  v volatility band  F5 refresh  q quit".to_string()
    });
    f.render_widget(
        Paragraph::new(help)
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray)),
        chunks[3],
    );

    if app.is_refreshing {
        let area = centered_rect(60, 20, chunks[1]);
        f.render_widget(Clear, area);
        f.render_widget(
            Paragraph::new("Running analysis pipeline...\nPlease wait.")
                .block(Block::default().title("Refreshing").borders(Borders::ALL))
                .alignment(Alignment::Center),
            area,
        );
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .split(r);
    Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{add_moving_average, add_volatility_band};
    use crate::model::FluctuationReport;
    use crate::model::tests::series_from_closes;
    use crossterm::event::KeyModifiers;
    use ratatui::backend::TestBackend;

    fn outcome() -> AnalysisOutcome {
        let series = add_moving_average(series_from_closes(&[1.0, 3.0, 2.0, 4.0]), 2).unwrap();
        let series = add_volatility_band(series, 2).unwrap();
        AnalysisOutcome {
            series,
            average_price: 2.5,
            std_deviation: 1.29,
            fluctuation: FluctuationReport {
                max_close: 4.0,
                min_close: 1.0,
                percentage_change: 300.0,
                exceeded: true,
            },
        }
    }

    fn press(app: &mut App, code: KeyCode) -> Action {
        handle_key_event(KeyEvent::new(code, KeyModifiers::NONE), app)
    }

    #[test]
    fn keys_move_cursor_and_toggle_overlays() {
        let mut app = App::new(outcome(), "TEST".into());
        assert_eq!(app.cursor, 3);

        press(&mut app, KeyCode::Right);
        assert_eq!(app.cursor, 3);
        press(&mut app, KeyCode::Left);
        press(&mut app, KeyCode::Left);
        assert_eq!(app.cursor, 1);
        press(&mut app, KeyCode::Home);
        assert_eq!(app.cursor, 0);

        press(&mut app, KeyCode::Char('m'));
        press(&mut app, KeyCode::Char('v'));
        assert!(!app.show_average && !app.show_band);

        assert_eq!(press(&mut app, KeyCode::F(5)), Action::Refresh);
        app.is_refreshing = true;
        assert_eq!(press(&mut app, KeyCode::F(5)), Action::Continue);
        assert_eq!(press(&mut app, KeyCode::Esc), Action::Quit);
    }

    #[test]
    fn band_edges_skip_missing_entries() {
        let (upper, lower) = band_points(&outcome());
        assert_eq!(upper.len(), 3);
        assert_eq!(upper[0].0, 1.0);
        assert!(upper.iter().zip(&lower).all(|(u, l)| u.1 >= l.1));
    }

    #[test]
    fn bounds_pad_the_value_range() {
        let data = vec![(0.0, 10.0), (1.0, 20.0)];
        let [lo, hi] = value_bounds([&data]);
        assert!(lo < 10.0 && hi > 20.0);
        assert_eq!(value_bounds(Vec::<&Vec<(f64, f64)>>::new()), [0.0, 1.0]);
    }

    #[test]
    fn renders_into_test_backend() {
        let app = App::new(outcome(), "TEST 1mo".into());
        let mut terminal = Terminal::new(TestBackend::new(100, 40)).unwrap();
        terminal.draw(|f| ui(f, &app)).unwrap();
        let buffer = terminal.backend().buffer();
        let text: String = buffer.content.iter().map(|c| c.symbol()).collect();
        assert!(text.contains("TEST 1mo"));
        assert!(text.contains("Close Price"));
        assert!(text.contains("RSI"));
    }
}
