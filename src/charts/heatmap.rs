//! Annotated correlation heatmap

use super::{centered, color_bar, is_dark, ramp, render_svg, COOLWARM, FONT, MISSING_COLOR};
use crate::error::Result;
use plotters::prelude::*;

const CELL: u32 = 64;
const LABEL_SPACE: u32 = 130;
const BAR_WIDTH: u32 = 90;

/// Square heatmap of a correlation matrix; `None` cells are left grey
///
/// The first variable is drawn in the top row.
pub fn correlation_heatmap(title: &str, names: &[String], matrix: &[Vec<Option<f64>>]) -> Result<String> {
    let n = names.len() as i32;
    let side = LABEL_SPACE + CELL * names.len().max(1) as u32;
    let width = side + BAR_WIDTH + 20;
    let height = side + 50;

    let label = |v: &SegmentValue<i32>, flip: bool| match v {
        SegmentValue::CenterOf(i) => {
            let idx = if flip { n - 1 - *i } else { *i };
            names.get(idx as usize).cloned().unwrap_or_default()
        }
        _ => String::new(),
    };

    render_svg(width, height, |root| {
        let (plot, bar) = root.split_horizontally(width - BAR_WIDTH);
        let mut chart = ChartBuilder::on(&plot)
            .caption(title, (FONT, 20))
            .margin(10)
            .x_label_area_size(LABEL_SPACE)
            .y_label_area_size(LABEL_SPACE)
            .build_cartesian_2d((0..n.max(1)).into_segmented(), (0..n.max(1)).into_segmented())?;

        chart
            .configure_mesh()
            .disable_mesh()
            .x_labels(names.len().max(1))
            .y_labels(names.len().max(1))
            .x_label_formatter(&|v| label(v, false))
            .y_label_formatter(&|v| label(v, true))
            .draw()?;

        let cells: Vec<(i32, i32, Option<f64>)> = matrix
            .iter()
            .take(names.len())
            .enumerate()
            .flat_map(|(i, row)| {
                row.iter()
                    .take(names.len())
                    .enumerate()
                    .map(move |(j, v)| (i as i32, j as i32, *v))
            })
            .collect();

        chart.draw_series(cells.iter().map(|&(i, j, value)| {
            let fill = match value {
                Some(r) => ramp(&COOLWARM, (r + 1.0) / 2.0),
                None => MISSING_COLOR,
            };
            let row = n - 1 - i;
            Rectangle::new(
                [
                    (SegmentValue::Exact(j), SegmentValue::Exact(row)),
                    (SegmentValue::Exact(j + 1), SegmentValue::Exact(row + 1)),
                ],
                fill.filled(),
            )
        }))?;

        chart.draw_series(cells.iter().filter_map(|&(i, j, value)| {
            let r = value?;
            let fill = ramp(&COOLWARM, (r + 1.0) / 2.0);
            let ink = if is_dark(&fill) { WHITE } else { BLACK };
            Some(Text::new(
                format!("{:.2}", r),
                (SegmentValue::CenterOf(j), SegmentValue::CenterOf(n - 1 - i)),
                centered(13, &ink),
            ))
        }))?;

        color_bar(&bar, "r", -1.0, 1.0, &COOLWARM)
    })
}
