//! Rasterises a drawn chart into Braille layers, one per colour.

use crate::braille::{draw_circle, draw_marker, draw_polyline, BrailleCanvas};
use crate::map::chart::{MapChart, SELECTED_FILL};
use crate::map::elements::AxisOrientation;
use crate::map::graphics::Layer;
use crate::map::series::{SeriesType, COLOR_BUCKETS};

/// Text placed at a character cell.
pub type TextItem = (u16, u16, String);

/// Display toggles of the terminal viewer.
#[derive(Debug, Clone)]
pub struct DisplaySettings {
    pub show_fill: bool,
    pub show_labels: bool,
    pub show_markers: bool,
    pub show_grids: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            show_fill: true,
            show_labels: true,
            show_markers: true,
            show_grids: true,
        }
    }
}

/// One frame worth of canvases. Each canvas is drawn in its own colour.
pub struct MapLayers {
    /// Outlines of regions without data.
    pub outlines: BrailleCanvas,
    /// Choropleth regions, indexed by fill bucket.
    pub regions: Vec<BrailleCanvas>,
    pub selected: BrailleCanvas,
    pub grids: BrailleCanvas,
    pub markers: BrailleCanvas,
    pub selected_markers: BrailleCanvas,
    pub marquee: BrailleCanvas,
    pub labels: Vec<TextItem>,
    pub ticks: Vec<TextItem>,
    pub callouts: Vec<TextItem>,
    /// Crosshair cell and its lon/lat read-out.
    pub crosshair: Option<(u16, u16, String)>,
}

impl MapLayers {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            outlines: BrailleCanvas::new(width, height),
            regions: (0..COLOR_BUCKETS).map(|_| BrailleCanvas::new(width, height)).collect(),
            selected: BrailleCanvas::new(width, height),
            grids: BrailleCanvas::new(width, height),
            markers: BrailleCanvas::new(width, height),
            selected_markers: BrailleCanvas::new(width, height),
            marquee: BrailleCanvas::new(width, height),
            labels: Vec::new(),
            ticks: Vec::new(),
            callouts: Vec::new(),
            crosshair: None,
        }
    }

    fn canvas_for(&mut self, fill: Option<u8>) -> &mut BrailleCanvas {
        match fill {
            Some(SELECTED_FILL) => &mut self.selected,
            Some(bucket) => {
                let last = self.regions.len().saturating_sub(1);
                match self.regions.get_mut(usize::from(bucket).min(last)) {
                    Some(canvas) => canvas,
                    None => &mut self.outlines,
                }
            }
            None => &mut self.outlines,
        }
    }
}

fn to_cell(x: f64, y: f64) -> Option<(u16, u16)> {
    if !x.is_finite() || !y.is_finite() || x < 0.0 || y < 0.0 {
        return None;
    }
    let col = u16::try_from((x / 2.0) as i64).ok()?;
    let row = u16::try_from((y / 4.0) as i64).ok()?;
    Some((col, row))
}

/// Draws the visible scene of a chart. Pixels are Braille dots.
#[derive(Debug, Clone, Default)]
pub struct MapRenderer {
    pub settings: DisplaySettings,
}

impl MapRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rasterise `chart` into a `width` x `height` character grid.
    pub fn render(&self, chart: &MapChart, width: usize, height: usize) -> MapLayers {
        let mut layers = MapLayers::new(width, height);
        if !chart.is_visible() {
            return layers;
        }

        self.draw_layer(&mut layers, chart.map_layer());

        let elements = chart.elements();
        if self.settings.show_grids {
            for line in elements.grids.lines() {
                draw_polyline(&mut layers.grids, line.iter().copied());
            }
        }
        for tick in elements.axes.ticks() {
            let (x, y) = match tick.orientation {
                AxisOrientation::Bottom => (tick.x, tick.y - 4.0),
                AxisOrientation::Right => (tick.x - 2.0 * tick.label.chars().count() as f64, tick.y),
                AxisOrientation::Top | AxisOrientation::Left => (tick.x, tick.y),
            };
            if let Some((col, row)) = to_cell(x, y) {
                layers.ticks.push((col, row, tick.label.clone()));
            }
        }

        for series in chart.series().iter().filter(|s| s.enabled()) {
            if self.settings.show_markers {
                for marker in series.markers() {
                    let canvas = if marker.selected { &mut layers.selected_markers } else { &mut layers.markers };
                    let (x, y) = (marker.x.round() as i32, marker.y.round() as i32);
                    match series.series_type() {
                        SeriesType::Bubble => draw_circle(canvas, x, y, marker.radius.round().max(1.0) as i32),
                        _ => draw_marker(canvas, x, y, 1),
                    }
                }
            }
            if self.settings.show_labels {
                for glyph in series.labels() {
                    if let Some((col, row)) = to_cell(glyph.bounds.left, glyph.bounds.top) {
                        layers.labels.push((col, row, glyph.text));
                    }
                }
            }
        }

        for callout in &elements.callouts {
            let Some(bounds) = callout.bounds() else { continue };
            for (i, entry) in callout.entries().iter().enumerate() {
                let text = match entry.value {
                    Some(value) => format!("{}: {value}", entry.name),
                    None => entry.name.clone(),
                };
                if let Some((col, row)) = to_cell(bounds.left, bounds.top + 4.0 * i as f64) {
                    layers.callouts.push((col, row, text));
                }
            }
        }

        if let (Some((x, y)), Some(point)) = (elements.crosshair.pointer(), elements.crosshair.readout()) {
            if let Some((col, row)) = to_cell(x, y) {
                layers.crosshair = Some((col, row, format!("{:.2}, {:.2}", point.lat, point.long)));
            }
        }

        if let Some(marquee) = chart.marquee() {
            let r = marquee.rect();
            draw_polyline(
                &mut layers.marquee,
                [(r.left, r.top), (r.right(), r.top), (r.right(), r.bottom()), (r.left, r.bottom()), (r.left, r.top)],
            );
        }

        layers
    }

    /// Outline every visible path through the layer transform, shading filled ones.
    fn draw_layer(&self, layers: &mut MapLayers, layer: &Layer) {
        if !layer.is_visible() {
            return;
        }
        for path in layer.elements().iter().filter(|p| p.visible) {
            let canvas = layers.canvas_for(path.fill);
            let rings: Vec<Vec<(f64, f64)>> = path
                .subpaths()
                .into_iter()
                .map(|sub| sub.into_iter().map(|p| layer.apply(p.x, p.y)).collect())
                .collect();
            for ring in &rings {
                if let [(x, y)] = ring.as_slice() {
                    draw_marker(canvas, x.round() as i32, y.round() as i32, 1);
                } else if path.stroke {
                    draw_polyline(canvas, ring.iter().copied());
                }
            }
            if self.settings.show_fill && path.fill.is_some() {
                shade_rings(canvas, &rings);
            }
        }
    }
}

/// Sparse even-odd fill: every other dot on every other row.
fn shade_rings(canvas: &mut BrailleCanvas, rings: &[Vec<(f64, f64)>]) {
    let (width, height) = canvas.pixel_size();
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for &(_, y) in rings.iter().flatten() {
        min_y = min_y.min(y);
        max_y = max_y.max(y);
    }
    if !min_y.is_finite() || !max_y.is_finite() {
        return;
    }
    let first = (min_y.max(0.0) as usize) & !1;
    let last = (max_y.min(height as f64 - 1.0)).max(0.0) as usize;

    let mut crossings = Vec::new();
    for row in (first..=last).step_by(2) {
        let y = row as f64 + 0.5;
        crossings.clear();
        for ring in rings {
            for pair in ring.windows(2) {
                let ((x0, y0), (x1, y1)) = (pair[0], pair[1]);
                if (y0 > y) != (y1 > y) {
                    crossings.push(x0 + (y - y0) * (x1 - x0) / (y1 - y0));
                }
            }
        }
        crossings.sort_by(f64::total_cmp);
        for span in crossings.chunks_exact(2) {
            let from = span[0].max(0.0).ceil() as usize;
            let to = span[1].min(width as f64 - 1.0);
            if to < 0.0 {
                continue;
            }
            let mut x = from + (from + row / 2) % 2;
            while (x as f64) <= to {
                canvas.set_pixel(x, row);
                x += 2;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::chart::tests::chart;
    use crate::map::series::{DataPoint, MapSeries};

    #[test]
    fn test_unbound_regions_are_outlined() {
        let chart = chart();
        let layers = MapRenderer::new().render(&chart, 50, 25);
        assert!(!layers.outlines.is_blank());
        assert!(layers.regions.iter().all(BrailleCanvas::is_blank));
    }

    #[test]
    fn test_choropleth_goes_to_bucket_layers() {
        let mut chart = chart();
        chart.add_series(Box::new(MapSeries::choropleth(vec![
            DataPoint::region("FR", 1.0),
            DataPoint::region("DE", 9.0),
        ])));
        chart.draw();
        let layers = MapRenderer::new().render(&chart, 50, 25);
        let filled = layers.regions.iter().filter(|c| !c.is_blank()).count();
        assert_eq!(filled, 2);
        // IT has no data but stays outlined
        assert!(!layers.outlines.is_blank());
    }

    #[test]
    fn test_hidden_chart_renders_nothing() {
        let mut chart = chart();
        chart.set_visible(false);
        let layers = MapRenderer::new().render(&chart, 50, 25);
        assert!(layers.outlines.is_blank());
        assert!(layers.labels.is_empty());
    }

    #[test]
    fn test_shade_fills_inside_only() {
        let mut canvas = BrailleCanvas::new(4, 2);
        shade_rings(&mut canvas, &[vec![(0.0, 0.0), (4.0, 0.0), (4.0, 8.0), (0.0, 8.0), (0.0, 0.0)]]);
        assert!(!canvas.is_blank());
        assert_eq!(canvas.cell(3, 0), 0);
        assert_eq!(canvas.cell(3, 1), 0);
    }
}
