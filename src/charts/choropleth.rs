//! Choropleth of boundary polygons coloured by an aggregate value
//!
//! Coordinates are projected equirectangularly with the longitude axis
//! shrunk by the cosine of the mid latitude. The chart ranges are padded so
//! the map keeps its aspect ratio inside the plotting area.

use super::{centered, color_bar, ramp, render_svg, FONT, PLASMA};
use crate::error::Result;
use crate::geo::{bounds_of, Feature};
use crate::stats;
use plotters::prelude::*;
use std::ops::Range;

const MAP_WIDTH: u32 = 720;
const MAP_HEIGHT: u32 = 900;
const LEGEND_SPACE: u32 = 120;
const MARGIN: u32 = 20;
const CAPTION_SPACE: u32 = 40;

/// One polygon feature to draw
#[derive(Debug, Clone)]
pub struct MapArea<'a> {
    pub feature: &'a Feature,
    /// Value mapped onto the colour scale
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct Projection {
    kx: f64,
    x: Range<f64>,
    y: Range<f64>,
}

impl Projection {
    /// Fit the features into a plotting area of `width` x `height` pixels
    fn fit<'a>(features: impl Iterator<Item = &'a Feature>, width: f64, height: f64) -> Option<Self> {
        let b = bounds_of(features)?;
        let mid_lat = (b.min_lat + b.max_lat) / 2.0;
        let kx = mid_lat.to_radians().cos().abs().max(0.1);

        let (x0, x1) = (b.min_lon * kx, b.max_lon * kx);
        let (y0, y1) = (b.min_lat, b.max_lat);
        let dx = (x1 - x0).max(1e-9);
        let dy = (y1 - y0).max(1e-9);
        // Units per pixel, taken from the tighter axis
        let unit = (dx / width).max(dy / height);
        let pad_x = (width * unit - dx) / 2.0;
        let pad_y = (height * unit - dy) / 2.0;

        Some(Self {
            kx,
            x: (x0 - pad_x)..(x1 + pad_x),
            y: (y0 - pad_y)..(y1 + pad_y),
        })
    }

    fn project(&self, position: &[f64]) -> Option<(f64, f64)> {
        match position {
            [lon, lat, ..] => Some((lon * self.kx, *lat)),
            _ => None,
        }
    }
}

/// Outer rings of a feature in chart coordinates; holes are not drawn
fn outer_rings(feature: &Feature, proj: &Projection) -> Vec<Vec<(f64, f64)>> {
    let Some(geometry) = &feature.geometry else { return Vec::new() };
    geometry
        .polygons()
        .into_iter()
        .filter_map(|rings| rings.first())
        .map(|ring| ring.iter().filter_map(|p| proj.project(p)).collect::<Vec<_>>())
        .filter(|points| points.len() >= 3)
        .collect()
}

pub fn choropleth(title: &str, value_name: &str, areas: &[MapArea]) -> Result<String> {
    let plot_w = (MAP_WIDTH - 2 * MARGIN) as f64;
    let plot_h = (MAP_HEIGHT - 2 * MARGIN - CAPTION_SPACE) as f64;
    let projection = Projection::fit(areas.iter().map(|a| a.feature), plot_w, plot_h);

    let values: Vec<f64> = areas.iter().map(|a| a.value).filter(|v| v.is_finite()).collect();
    let (vmin, vmax) = stats::min_max(&values).unwrap_or((0.0, 1.0));
    let span = if vmax > vmin { vmax - vmin } else { 1.0 };

    render_svg(MAP_WIDTH + LEGEND_SPACE, MAP_HEIGHT, |root| {
        let Some(proj) = projection else {
            root.titled(title, (FONT, 20))?.draw(&Text::new(
                "Sin geometrías para dibujar",
                ((MAP_WIDTH / 2) as i32, (MAP_HEIGHT / 2) as i32),
                centered(16, &BLACK),
            ))?;
            return Ok(());
        };

        let (map, bar) = root.split_horizontally(MAP_WIDTH);
        let mut chart = ChartBuilder::on(&map)
            .caption(title, (FONT, 20))
            .margin(MARGIN)
            .build_cartesian_2d(proj.x.clone(), proj.y.clone())?;

        for area in areas {
            let color = ramp(&PLASMA, (area.value - vmin) / span);
            for ring in outer_rings(area.feature, &proj) {
                chart.draw_series(std::iter::once(Polygon::new(ring.clone(), color.filled())))?;
                chart.draw_series(std::iter::once(PathElement::new(ring, WHITE.stroke_width(1))))?;
            }
        }

        color_bar(&bar, value_name, vmin, vmax, &PLASMA)
    })
}
