//! Bar chart of category counts and histogram with a box plot strip

use super::{category_color, padded_range, render_svg, tick_label, FONT, HEIGHT, WIDTH};
use crate::error::Result;
use crate::stats;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

const BAR_COLOR: RGBColor = RGBColor(0x63, 0x6e, 0xfa);
const BOX_COLOR: RGBColor = RGBColor(0x1f, 0x3b, 0x8c);

/// Vertical bars, one per label, annotated with the share of the total
///
/// Shares are printed with three decimals above each bar.
pub fn bar_chart(title: &str, variable: &str, counts: &[(String, usize)]) -> Result<String> {
    let total: usize = counts.iter().map(|(_, n)| n).sum();
    let max = counts.iter().map(|(_, n)| *n).max().unwrap_or(0);
    let y_top = (max as f64 * 1.15).max(1.0);
    let n = counts.len().max(1) as i32;

    render_svg(WIDTH, HEIGHT, |root| {
        let mut chart = ChartBuilder::on(root)
            .caption(title, (FONT, 20))
            .margin(12)
            .x_label_area_size(50)
            .y_label_area_size(60)
            .build_cartesian_2d((0..n).into_segmented(), 0f64..y_top)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(counts.len().max(1))
            .x_label_formatter(&|v| match v {
                SegmentValue::CenterOf(i) => counts
                    .get(*i as usize)
                    .map(|(label, _)| label.clone())
                    .unwrap_or_default(),
                _ => String::new(),
            })
            .y_label_formatter(&|v| tick_label(*v))
            .x_desc(variable)
            .y_desc("count")
            .draw()?;

        chart.draw_series(counts.iter().enumerate().map(|(i, (_, count))| {
            let i = i as i32;
            let mut bar = Rectangle::new(
                [(SegmentValue::Exact(i), 0.0), (SegmentValue::Exact(i + 1), *count as f64)],
                category_color(i as usize).filled(),
            );
            bar.set_margin(0, 0, 6, 6);
            bar
        }))?;

        let share_style = TextStyle::from((FONT, 12).into_font()).pos(Pos::new(HPos::Center, VPos::Bottom));
        chart.draw_series(counts.iter().enumerate().map(|(i, (_, count))| {
            let share = if total > 0 { *count as f64 / total as f64 } else { 0.0 };
            Text::new(
                format!("{:.3}", share),
                (SegmentValue::CenterOf(i as i32), *count as f64),
                share_style.clone(),
            )
        }))?;
        Ok(())
    })
}

/// Histogram of the values with a horizontal box plot above it
///
/// The box spans the quartiles; whiskers reach the furthest values within
/// 1.5 IQR and points beyond them are drawn as outliers.
pub fn histogram_with_box(title: &str, variable: &str, values: &[f64], bins: usize) -> Result<String> {
    let bins = stats::histogram(values, bins);
    let summary = stats::box_summary(values);
    let x_range = match (bins.first(), bins.last()) {
        (Some(first), Some(last)) => first.start..last.end,
        _ => padded_range(0.0, 0.0, 0.0),
    };
    let max_count = bins.iter().map(|b| b.count).max().unwrap_or(0);
    let y_top = (max_count as f64 * 1.1).max(1.0);

    render_svg(WIDTH, HEIGHT, |root| {
        let root = root.titled(title, (FONT, 20))?;
        let (upper, lower) = root.split_vertically(100);

        let mut strip = ChartBuilder::on(&upper)
            .margin(8)
            .y_label_area_size(60)
            .build_cartesian_2d(x_range.clone(), 0f64..1f64)?;
        if let Some(b) = summary {
            let line = ShapeStyle::from(&BOX_COLOR).stroke_width(2);
            strip.draw_series(std::iter::once(Rectangle::new([(b.q1, 0.2), (b.q3, 0.8)], BOX_COLOR.mix(0.25).filled())))?;
            strip.draw_series([
                PathElement::new(vec![(b.q1, 0.2), (b.q3, 0.2), (b.q3, 0.8), (b.q1, 0.8), (b.q1, 0.2)], line),
                PathElement::new(vec![(b.lower_whisker, 0.5), (b.q1, 0.5)], line),
                PathElement::new(vec![(b.q3, 0.5), (b.upper_whisker, 0.5)], line),
                PathElement::new(vec![(b.median, 0.2), (b.median, 0.8)], line),
            ])?;
            strip.draw_series(
                values
                    .iter()
                    .filter(|v| **v < b.lower_whisker || **v > b.upper_whisker)
                    .map(|v| Circle::new((*v, 0.5), 3, BOX_COLOR.filled())),
            )?;
        }

        let mut chart = ChartBuilder::on(&lower)
            .margin(8)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x_range.clone(), 0f64..y_top)?;
        chart
            .configure_mesh()
            .x_desc(variable)
            .y_desc("count")
            .x_label_formatter(&|v| tick_label(*v))
            .y_label_formatter(&|v| tick_label(*v))
            .draw()?;
        chart.draw_series(bins.iter().map(|b| {
            let mut bar = Rectangle::new([(b.start, 0.0), (b.end, b.count as f64)], BAR_COLOR.filled());
            bar.set_margin(0, 0, 1, 1);
            bar
        }))?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_chart_shares() {
        let counts = vec![("RES".to_string(), 3), ("COM".to_string(), 1)];
        let svg = bar_chart("Distribución de occtype_grp", "occtype_grp", &counts).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains(">0.750<"));
        assert!(svg.contains(">0.250<"));
        assert!(svg.contains(">RES<"));
        assert!(svg.contains("Distribución de occtype_grp"));
    }

    #[test]
    fn test_bar_chart_empty() {
        let svg = bar_chart("Distribución de city", "city", &[]).unwrap();
        assert!(svg.contains("Distribución de city"));
    }

    #[test]
    fn test_histogram_draws_every_bin() {
        let values: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let svg = histogram_with_box("Histograma y Boxplot de risk_load", "risk_load", &values, 10).unwrap();
        assert!(svg.contains("Histograma y Boxplot de risk_load"));
        // Ten bins plus the box and the background
        assert!(svg.matches("<rect").count() >= 12);
    }

    #[test]
    fn test_histogram_marks_outliers() {
        let values = [1.0, 2.0, 3.0, 4.0, 100.0];
        let svg = histogram_with_box("h", "risk_load", &values, 5).unwrap();
        assert_eq!(svg.matches("<circle").count(), 1);
        assert!(histogram_with_box("h", "risk_load", &[], 5).is_ok());
    }
}
