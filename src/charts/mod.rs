//! SVG charts drawn with plotters and embedded in the dashboard pages
//!
//! Every chart renders into an in-memory `SVGBackend` and comes back as a
//! responsive `<svg>` element.

pub mod distribution;
pub mod scatter;
pub mod heatmap;
pub mod choropleth;

pub use distribution::{bar_chart, histogram_with_box};
pub use scatter::{scatter_chart, ScatterGroup};
pub use heatmap::correlation_heatmap;
pub use choropleth::{choropleth, MapArea};

use crate::error::{DashboardError, Result};
use plotters::coord::Shift;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

pub const WIDTH: u32 = 900;
pub const HEIGHT: u32 = 520;
pub(crate) const FONT: &str = "sans-serif";

/// Qualitative palette for categorical series
pub const CATEGORY_COLORS: [RGBColor; 10] = [
    RGBColor(0x63, 0x6e, 0xfa),
    RGBColor(0xef, 0x55, 0x3b),
    RGBColor(0x00, 0xcc, 0x96),
    RGBColor(0xab, 0x63, 0xfa),
    RGBColor(0xff, 0xa1, 0x5a),
    RGBColor(0x19, 0xd3, 0xf3),
    RGBColor(0xff, 0x66, 0x92),
    RGBColor(0xb6, 0xe8, 0x80),
    RGBColor(0xff, 0x97, 0xff),
    RGBColor(0xfe, 0xcb, 0x52),
];

pub fn category_color(index: usize) -> RGBColor {
    CATEGORY_COLORS[index % CATEGORY_COLORS.len()]
}

/// Sequential palette used for choropleths
pub const PLASMA: [RGBColor; 5] = [
    RGBColor(13, 8, 135),
    RGBColor(126, 3, 168),
    RGBColor(204, 71, 120),
    RGBColor(248, 149, 64),
    RGBColor(240, 249, 33),
];

/// Diverging palette used for correlations
pub const COOLWARM: [RGBColor; 5] = [
    RGBColor(59, 76, 192),
    RGBColor(141, 176, 254),
    RGBColor(221, 221, 221),
    RGBColor(244, 152, 122),
    RGBColor(180, 4, 38),
];

/// Fill for cells without a value
pub const MISSING_COLOR: RGBColor = RGBColor(0xcc, 0xcc, 0xcc);

fn lerp(a: RGBColor, b: RGBColor, t: f64) -> RGBColor {
    let mix = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * t).round() as u8;
    RGBColor(mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2))
}

/// Piecewise-linear color ramp over `t` in [0, 1]
pub fn ramp(stops: &[RGBColor], t: f64) -> RGBColor {
    match stops {
        [] => BLACK,
        [only] => *only,
        _ => {
            let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
            let seg = t * (stops.len() - 1) as f64;
            let i = (seg.floor() as usize).min(stops.len() - 2);
            lerp(stops[i], stops[i + 1], seg - i as f64)
        }
    }
}

/// Perceived brightness, used to pick a readable label color
pub fn is_dark(color: &RGBColor) -> bool {
    0.299 * color.0 as f64 + 0.587 * color.1 as f64 + 0.114 * (color.2 as f64) < 140.0
}

/// Compact number text for axis ticks and labels
pub fn tick_label(v: f64) -> String {
    let a = v.abs();
    if a == 0.0 {
        "0".to_string()
    } else if a >= 1e6 {
        format!("{:.1}M", v / 1e6)
    } else if a >= 1e3 {
        format!("{:.1}k", v / 1e3)
    } else if a >= 1.0 {
        format!("{:.2}", v)
    } else {
        format!("{:.4}", v)
    }
}

/// Value range with a zero-width span widened so scales stay finite
pub(crate) fn padded_range(lo: f64, hi: f64, pad: f64) -> std::ops::Range<f64> {
    if hi > lo {
        let margin = (hi - lo) * pad;
        (lo - margin)..(hi + margin)
    } else {
        (lo - 0.5)..(hi + 0.5)
    }
}

pub(crate) type DrawResult = std::result::Result<(), DrawingAreaErrorKind<std::io::Error>>;

fn chart_error(e: impl std::fmt::Display) -> DashboardError {
    DashboardError::Chart(e.to_string())
}

/// Draw onto a white SVG canvas of the given size and return the markup
pub(crate) fn render_svg(
    width: u32,
    height: u32,
    draw: impl FnOnce(&DrawingArea<SVGBackend<'_>, Shift>) -> DrawResult,
) -> Result<String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(chart_error)?;
        draw(&root).map_err(chart_error)?;
        root.present().map_err(chart_error)?;
    }
    Ok(make_svg_responsive(svg, width, height))
}

fn make_svg_responsive(svg: String, width: u32, height: u32) -> String {
    let needle = format!("width=\"{width}\" height=\"{height}\"");
    if !svg.contains(&needle) {
        return svg;
    }
    let scaled = if svg.contains("viewBox=") {
        "width=\"100%\" preserveAspectRatio=\"xMidYMid meet\"".to_string()
    } else {
        format!("viewBox=\"0 0 {width} {height}\" width=\"100%\" preserveAspectRatio=\"xMidYMid meet\"")
    };
    svg.replacen(&needle, &scaled, 1)
}

pub(crate) fn centered(size: u32, color: &RGBColor) -> TextStyle<'static> {
    (FONT, size)
        .into_font()
        .color(color)
        .pos(Pos::new(HPos::Center, VPos::Center))
}

/// Vertical color scale with tick labels, filling a narrow drawing area
pub(crate) fn color_bar(
    area: &DrawingArea<SVGBackend<'_>, Shift>,
    caption: &str,
    lo: f64,
    hi: f64,
    stops: &[RGBColor],
) -> DrawResult {
    const STEPS: i32 = 60;
    let (_, height) = area.dim_in_pixel();
    let (x0, x1) = (16, 36);
    let top = 50;
    let bottom = (height as i32 - 50).max(top + STEPS);
    let step = (bottom - top) as f64 / STEPS as f64;

    area.draw(&Text::new(caption.to_string(), (x0, top - 24), (FONT, 13).into_font()))?;
    for i in 0..STEPS {
        // Top of the bar is the high end of the scale
        let t = 1.0 - (i as f64 + 0.5) / STEPS as f64;
        let y0 = top + (i as f64 * step).floor() as i32;
        let y1 = top + ((i + 1) as f64 * step).ceil() as i32;
        area.draw(&Rectangle::new([(x0, y0), (x1, y1)], ramp(stops, t).filled()))?;
    }

    let label_style = TextStyle::from((FONT, 11).into_font()).pos(Pos::new(HPos::Left, VPos::Center));
    for k in 0..5 {
        let t = k as f64 / 4.0;
        let value = lo + (hi - lo) * t;
        let y = bottom - ((bottom - top) as f64 * t).round() as i32;
        area.draw(&Text::new(tick_label(value), (x1 + 6, y), label_style.clone()))?;
    }
    Ok(())
}
