//! Scatter plot with one OLS trendline per colour group

use super::{category_color, padded_range, render_svg, tick_label, FONT, HEIGHT, WIDTH};
use crate::error::Result;
use crate::stats::{self, LinearFit};
use plotters::prelude::*;

/// Points sharing one colour label
#[derive(Debug, Clone, PartialEq)]
pub struct ScatterGroup {
    pub label: String,
    pub points: Vec<(f64, f64)>,
}

impl ScatterGroup {
    pub fn trendline(&self) -> Option<LinearFit> {
        stats::ols(&self.points)
    }
}

fn trend_label(group: &str, x_name: &str, y_name: &str, fit: &LinearFit) -> String {
    let equation = format!("{} = {:.4} * {} + {:.4}", y_name, fit.slope, x_name, fit.intercept);
    if group.is_empty() {
        equation
    } else {
        format!("{}: {}", group, equation)
    }
}

pub fn scatter_chart(
    title: &str,
    x_name: &str,
    y_name: &str,
    color_name: &str,
    groups: &[ScatterGroup],
) -> Result<String> {
    let all_x: Vec<f64> = groups.iter().flat_map(|g| g.points.iter().map(|p| p.0)).collect();
    let all_y: Vec<f64> = groups.iter().flat_map(|g| g.points.iter().map(|p| p.1)).collect();
    let (x0, x1) = stats::min_max(&all_x).unwrap_or((0.0, 1.0));
    let (y0, y1) = stats::min_max(&all_y).unwrap_or((0.0, 1.0));

    render_svg(WIDTH, HEIGHT, |root| {
        let mut chart = ChartBuilder::on(root)
            .caption(title, (FONT, 20))
            .margin(12)
            .x_label_area_size(45)
            .y_label_area_size(70)
            .build_cartesian_2d(padded_range(x0, x1, 0.05), padded_range(y0, y1, 0.05))?;

        chart
            .configure_mesh()
            .x_desc(x_name)
            .y_desc(y_name)
            .x_label_formatter(&|v| tick_label(*v))
            .y_label_formatter(&|v| tick_label(*v))
            .draw()?;

        let mut legend = false;
        for (i, group) in groups.iter().enumerate() {
            let color = category_color(i);
            let points = chart.draw_series(
                group
                    .points
                    .iter()
                    .map(|&(x, y)| Circle::new((x, y), 3, color.mix(0.7).filled())),
            )?;
            if !group.label.is_empty() {
                legend = true;
                points
                    .label(format!("{}={}", color_name, group.label))
                    .legend(move |(x, y)| Circle::new((x + 10, y), 4, color.filled()));
            }

            let Some(fit) = group.trendline() else { continue };
            let (gx0, gx1) = stats::min_max(&group.points.iter().map(|p| p.0).collect::<Vec<_>>())
                .unwrap_or((x0, x1));
            let line = ShapeStyle::from(&color).stroke_width(2);
            legend = true;
            chart
                .draw_series(LineSeries::new(
                    vec![(gx0, fit.predict(gx0)), (gx1, fit.predict(gx1))],
                    line,
                ))?
                .label(trend_label(&group.label, x_name, y_name, &fit))
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], line));
        }

        if legend {
            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::UpperLeft)
                .background_style(&WHITE.mix(0.85))
                .border_style(&BLACK)
                .label_font((FONT, 12))
                .draw()?;
        }
        Ok(())
    })
}
