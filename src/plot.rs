//! Static chart rendering.
//!
//! A [`Figure`] owns its canvas, size and palette; callers create one per chart
//! and pass it to the drawing functions.

use crate::error::AnalysisError;
use crate::model::Series;
use anyhow::Result;
use image::{Rgb, RgbImage};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Named colour schemes selectable at the style prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChartStyle {
    #[default]
    Default,
    Ggplot,
    Bmh,
    FiveThirtyEight,
    DarkBackground,
}

impl ChartStyle {
    pub const NAMES: [&'static str; 5] = ["default", "ggplot", "bmh", "fivethirtyeight", "dark_background"];

    pub fn palette(self) -> Palette {
        match self {
            ChartStyle::Default => Palette {
                background: Rgb([255, 255, 255]),
                panel: Rgb([255, 255, 255]),
                grid: Rgb([225, 225, 225]),
                axis: Rgb([0, 0, 0]),
                close: Rgb([31, 119, 180]),
                average: Rgb([255, 127, 14]),
                band: Rgb([214, 230, 245]),
                rsi: Rgb([44, 160, 44]),
            },
            ChartStyle::Ggplot => Palette {
                background: Rgb([255, 255, 255]),
                panel: Rgb([229, 229, 229]),
                grid: Rgb([255, 255, 255]),
                axis: Rgb([85, 85, 85]),
                close: Rgb([226, 74, 51]),
                average: Rgb([52, 138, 189]),
                band: Rgb([240, 200, 190]),
                rsi: Rgb([152, 142, 213]),
            },
            ChartStyle::Bmh => Palette {
                background: Rgb([238, 238, 238]),
                panel: Rgb([238, 238, 238]),
                grid: Rgb([178, 178, 178]),
                axis: Rgb([188, 188, 188]),
                close: Rgb([52, 138, 189]),
                average: Rgb([166, 6, 40]),
                band: Rgb([200, 215, 230]),
                rsi: Rgb([70, 120, 33]),
            },
            ChartStyle::FiveThirtyEight => Palette {
                background: Rgb([240, 240, 240]),
                panel: Rgb([240, 240, 240]),
                grid: Rgb([203, 203, 203]),
                axis: Rgb([240, 240, 240]),
                close: Rgb([0, 143, 213]),
                average: Rgb([252, 79, 48]),
                band: Rgb([205, 225, 240]),
                rsi: Rgb([109, 144, 79]),
            },
            ChartStyle::DarkBackground => Palette {
                background: Rgb([0, 0, 0]),
                panel: Rgb([0, 0, 0]),
                grid: Rgb([60, 60, 60]),
                axis: Rgb([255, 255, 255]),
                close: Rgb([141, 211, 199]),
                average: Rgb([254, 255, 179]),
                band: Rgb([40, 60, 70]),
                rsi: Rgb([251, 128, 114]),
            },
        }
    }
}

impl FromStr for ChartStyle {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "default" | "classic" => Ok(ChartStyle::Default),
            "ggplot" => Ok(ChartStyle::Ggplot),
            "bmh" => Ok(ChartStyle::Bmh),
            "fivethirtyeight" => Ok(ChartStyle::FiveThirtyEight),
            "dark_background" => Ok(ChartStyle::DarkBackground),
            other => Err(AnalysisError::invalid(format!(
                "unknown chart style '{other}' (available: {})",
                ChartStyle::NAMES.join(", ")
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub background: Rgb<u8>,
    pub panel: Rgb<u8>,
    pub grid: Rgb<u8>,
    pub axis: Rgb<u8>,
    pub close: Rgb<u8>,
    pub average: Rgb<u8>,
    pub band: Rgb<u8>,
    pub rsi: Rgb<u8>,
}

/// Pixel rectangle of one chart panel.
#[derive(Debug, Clone, Copy)]
struct Panel {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl Panel {
    fn x_at(&self, i: usize, count: usize) -> i64 {
        let span = count.saturating_sub(1).max(1) as f64;
        self.x as i64 + (i as f64 / span * (self.width - 1) as f64).round() as i64
    }

    fn y_at(&self, value: f64, lo: f64, hi: f64) -> i64 {
        let span = if hi > lo { hi - lo } else { 1.0 };
        let t = ((value - lo) / span).clamp(0.0, 1.0);
        self.y as i64 + ((1.0 - t) * (self.height - 1) as f64).round() as i64
    }
}

pub struct Figure {
    pub width: u32,
    pub height: u32,
    pub palette: Palette,
    canvas: RgbImage,
}

impl Figure {
    pub fn new(width: u32, height: u32, style: ChartStyle) -> Self {
        let width = width.max(200);
        let height = height.max(160);
        let palette = style.palette();
        let canvas = RgbImage::from_pixel(width, height, palette.background);
        Self {
            width,
            height,
            palette,
            canvas,
        }
    }

    /// Splits the canvas like an 8-row grid: price on rows 0..5, RSI on rows 6..8.
    fn panels(&self) -> (Panel, Panel) {
        let margin = 30;
        let row = (self.height - 2 * margin) / 8;
        let inner_width = self.width - 2 * margin;
        let price = Panel {
            x: margin,
            y: margin,
            width: inner_width,
            height: row * 5,
        };
        let rsi = Panel {
            x: margin,
            y: margin + row * 6,
            width: inner_width,
            height: row * 2,
        };
        (price, rsi)
    }

    pub fn canvas(&self) -> &RgbImage {
        &self.canvas
    }

    fn put(&mut self, x: i64, y: i64, color: Rgb<u8>) {
        if x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height {
            self.canvas.put_pixel(x as u32, y as u32, color);
        }
    }

    /// Bresenham line, thickened by one pixel vertically.
    fn line(&mut self, (x0, y0): (i64, i64), (x1, y1): (i64, i64), color: Rgb<u8>) {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let (mut x, mut y, mut err) = (x0, y0, dx + dy);
        loop {
            self.put(x, y, color);
            self.put(x, y + 1, color);
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    fn fill_panel(&mut self, panel: Panel, gridlines: &[f64], lo: f64, hi: f64) {
        for y in panel.y..panel.y + panel.height {
            for x in panel.x..panel.x + panel.width {
                self.canvas.put_pixel(x, y, self.palette.panel);
            }
        }
        let grid = self.palette.grid;
        for &level in gridlines {
            let y = panel.y_at(level, lo, hi);
            let right = (panel.x + panel.width - 1) as i64;
            self.line((panel.x as i64, y), (right, y), grid);
        }
        let axis = self.palette.axis;
        let bottom = (panel.y + panel.height - 1) as i64;
        self.line((panel.x as i64, panel.y as i64), (panel.x as i64, bottom), axis);
        let right = (panel.x + panel.width - 1) as i64;
        self.line((panel.x as i64, bottom), (right, bottom), axis);
    }

    /// Draws `values` as connected segments, breaking the line at missing entries.
    fn polyline(&mut self, panel: Panel, values: &[Option<f64>], lo: f64, hi: f64, color: Rgb<u8>) {
        let count = values.len();
        let mut prev: Option<(i64, i64)> = None;
        for (i, value) in values.iter().enumerate() {
            match value {
                Some(v) => {
                    let pt = (panel.x_at(i, count), panel.y_at(*v, lo, hi));
                    self.line(prev.unwrap_or(pt), pt, color);
                    prev = Some(pt);
                }
                None => prev = None,
            }
        }
    }

    /// Shades the moving average ± one rolling standard deviation.
    fn band(&mut self, panel: Panel, mean: &[Option<f64>], spread: &[Option<f64>], lo: f64, hi: f64) {
        let count = mean.len();
        let color = self.palette.band;
        for (i, (m, s)) in mean.iter().zip(spread).enumerate() {
            if let (Some(m), Some(s)) = (m, s) {
                let x = panel.x_at(i, count);
                let top = panel.y_at(m + s, lo, hi);
                let bottom = panel.y_at(m - s, lo, hi);
                self.line((x, top), (x, bottom), color);
            }
        }
    }

    /// Price panel (close, moving average, volatility band) above an RSI panel.
    pub fn draw_series(&mut self, series: &Series) {
        let (price_panel, rsi_panel) = self.panels();
        let closes: Vec<Option<f64>> = series.points.iter().map(|p| Some(p.close)).collect();

        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        let mut widen = |v: f64| {
            lo = lo.min(v);
            hi = hi.max(v);
        };
        series.points.iter().for_each(|p| widen(p.close));
        if let (Some(ma), Some(sd)) = (&series.moving_average, &series.std_deviation) {
            for (m, s) in ma.iter().zip(sd) {
                if let (Some(m), Some(s)) = (m, s) {
                    widen(m + s);
                    widen(m - s);
                }
            }
        }
        if !lo.is_finite() {
            lo = 0.0;
            hi = 1.0;
        }
        let pad = ((hi - lo) * 0.05).max(1e-6);
        let (lo, hi) = (lo - pad, hi + pad);
        let quarters: Vec<f64> = (1..4).map(|q| lo + (hi - lo) * q as f64 / 4.0).collect();

        self.fill_panel(price_panel, &quarters, lo, hi);
        if let (Some(ma), Some(sd)) = (&series.moving_average, &series.std_deviation) {
            self.band(price_panel, ma, sd, lo, hi);
        }
        self.polyline(price_panel, &closes, lo, hi, self.palette.close);
        if let Some(ma) = &series.moving_average {
            self.polyline(price_panel, ma, lo, hi, self.palette.average);
        }

        self.fill_panel(rsi_panel, &[30.0, 50.0, 70.0], 0.0, 100.0);
        if let Some(rsi) = &series.rsi {
            self.polyline(rsi_panel, rsi, 0.0, 100.0, self.palette.rsi);
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.canvas().save(path.as_ref())?;
        info!("Saved chart to {:?}", path.as_ref());
        Ok(())
    }
}

/// Renders `series` to a PNG at `path` on a fresh figure.
pub fn create_and_save_plot<P: AsRef<Path>>(
    series: &Series,
    path: P,
    width: u32,
    height: u32,
    style: ChartStyle,
) -> Result<()> {
    let mut figure = Figure::new(width, height, style);
    figure.draw_series(series);
    figure.save(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{add_moving_average, add_volatility_band, calculate_rsi};
    use crate::model::tests::series_from_closes;

    fn enriched() -> Series {
        let closes = [10.0, 11.0, 10.5, 12.0, 13.0, 12.5, 14.0, 13.5, 15.0];
        let series = add_moving_average(series_from_closes(&closes), 3).unwrap();
        let series = calculate_rsi(series, 2).unwrap();
        add_volatility_band(series, 3).unwrap()
    }

    #[test]
    fn styles_parse_case_insensitively() {
        assert_eq!("GGPlot".parse::<ChartStyle>().unwrap(), ChartStyle::Ggplot);
        assert_eq!("".parse::<ChartStyle>().unwrap(), ChartStyle::Default);
        assert_eq!("fivethirtyeight".parse::<ChartStyle>().unwrap(), ChartStyle::FiveThirtyEight);
        assert!(matches!(
            "seaborn-pastel".parse::<ChartStyle>(),
            Err(AnalysisError::InvalidInput(_))
        ));
    }

    #[test]
    fn every_named_style_parses() {
        for name in ChartStyle::NAMES {
            assert!(name.parse::<ChartStyle>().is_ok(), "{name}");
        }
    }

    #[test]
    fn drawing_uses_series_colours() {
        let mut figure = Figure::new(400, 320, ChartStyle::Default);
        figure.draw_series(&enriched());
        let palette = figure.palette;
        let pixels: Vec<&Rgb<u8>> = figure.canvas().pixels().collect();

        for color in [palette.close, palette.average, palette.rsi, palette.band] {
            assert!(pixels.iter().any(|p| **p == color), "missing {color:?}");
        }
    }

    #[test]
    fn single_point_series_does_not_panic() {
        let mut figure = Figure::new(10, 10, ChartStyle::DarkBackground);
        figure.draw_series(&series_from_closes(&[5.0]));
        assert_eq!(figure.canvas().dimensions(), (200, 160));
    }

    #[test]
    fn saves_png() {
        let path = std::env::temp_dir().join(format!("stock-charter-plot-{}.png", std::process::id()));
        create_and_save_plot(&enriched(), &path, 300, 240, ChartStyle::Bmh).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..4], b"\x89PNG");
        let _ = std::fs::remove_file(&path);
    }
}
