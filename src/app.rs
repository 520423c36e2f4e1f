use std::time::Duration;

use mapchart::geo::Rect;
use mapchart::map::{ChartEvent, Crs, MapChart, MapRenderer};

/// Left button behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerMode {
    Pan,
    Select,
}

pub struct App {
    pub chart: MapChart,
    pub map_renderer: MapRenderer,
    pub should_quit: bool,
    pub pointer_mode: PointerMode,
    /// Last mouse position for drag tracking
    pub last_mouse: Option<(u16, u16)>,
    /// Current mouse position for cursor marker
    pub mouse_pos: Option<(u16, u16)>,
    /// Latest chart event or warning, shown in the status bar
    pub status: Option<String>,
    inner_width: usize,
    inner_height: usize,
}

impl App {
    pub fn new(width: usize, height: usize, chart: MapChart) -> Self {
        let mut app = Self {
            chart,
            map_renderer: MapRenderer::new(),
            should_quit: false,
            pointer_mode: PointerMode::Pan,
            last_mouse: None,
            mouse_pos: None,
            status: None,
            inner_width: 0,
            inner_height: 0,
        };
        app.resize(width, height);
        app.chart.draw();
        app
    }

    /// Update chart bounds when the terminal resizes
    pub fn resize(&mut self, width: usize, height: usize) {
        // Account for border (2 chars horizontal, 2 chars vertical plus the status bar)
        self.inner_width = width.saturating_sub(2);
        self.inner_height = height.saturating_sub(3);
        let bounds = Rect::new(0.0, 0.0, (self.inner_width * 2) as f64, (self.inner_height * 4) as f64);
        self.chart.set_bounds(bounds);
    }

    pub fn inner_size(&self) -> (usize, usize) {
        (self.inner_width, self.inner_height)
    }

    /// Advance animations and redraw what changed.
    pub fn update(&mut self, dt: Duration) {
        self.chart.tick(dt);
        self.chart.draw();
        for event in self.chart.drain_events() {
            if let Some(text) = describe(&event) {
                self.status = Some(text);
            }
        }
        if let Some(warning) = self.chart.take_warnings().pop() {
            self.status = Some(warning.to_string());
        }
    }

    fn current(&mut self) -> Option<&mut MapChart> {
        self.chart.current_chart_mut()
    }

    /// Pan the map by braille pixels
    pub fn pan(&mut self, dx: i32, dy: i32) {
        if let Some(chart) = self.current() {
            chart.move_by(f64::from(dx), f64::from(dy));
        }
    }

    pub fn zoom_in(&mut self) {
        if let Some(chart) = self.current() {
            chart.zoom_in();
        }
    }

    pub fn zoom_out(&mut self) {
        if let Some(chart) = self.current() {
            chart.zoom_out();
        }
    }

    /// Zoom around a terminal cell
    pub fn zoom_at(&mut self, col: u16, row: u16, zoom_in: bool) {
        let (px, py) = to_pixel(col, row);
        if let Some(chart) = self.current() {
            let factor = chart.settings().zoom_factor;
            let factor = if zoom_in { factor } else { 1.0 / factor };
            chart.zoom(factor, Some(px), Some(py), None);
        }
    }

    pub fn zoom_home(&mut self) {
        if let Some(chart) = self.current() {
            chart.zoom_home(None);
        }
    }

    /// Id of the feature under the mouse cursor
    fn hovered_feature(&self) -> Option<String> {
        let (px, py) = self.mouse_pixel_pos()?;
        self.chart.current_chart().feature_at(px, py)?.id.clone()
    }

    /// Zoom to the hovered feature, or back out when already there
    pub fn toggle_feature_zoom(&mut self) {
        let Some(id) = self.hovered_feature() else { return };
        if let Some(chart) = self.current() {
            chart.zoom_to_feature(&[id.as_str()], None);
        }
    }

    pub fn drill_down(&mut self) {
        if let Some(id) = self.hovered_feature() {
            self.chart.drill_to(&id, None);
        }
    }

    pub fn drill_up(&mut self) {
        self.chart.drill_up();
    }

    /// Switch the current scene to the next projection
    pub fn cycle_crs(&mut self) {
        let Some(chart) = self.current() else { return };
        let current = chart.crs();
        let index = Crs::ALL.iter().position(|&crs| crs == current).unwrap_or(0);
        chart.set_crs(Crs::ALL[(index + 1) % Crs::ALL.len()]);
    }

    pub fn toggle_grids(&mut self) {
        if let Some(chart) = self.current() {
            let elements = chart.elements_mut();
            elements.grids.settings.enabled = !elements.grids.settings.enabled;
            elements.axes.settings.enabled = elements.grids.settings.enabled;
        }
    }

    pub fn toggle_crosshair(&mut self) {
        if let Some(chart) = self.current() {
            let crosshair = &mut chart.elements_mut().crosshair;
            crosshair.enabled = !crosshair.enabled;
        }
    }

    pub fn toggle_pointer_mode(&mut self) {
        self.pointer_mode = match self.pointer_mode {
            PointerMode::Pan => PointerMode::Select,
            PointerMode::Select => PointerMode::Pan,
        };
        if let Some(chart) = self.current() {
            chart.cancel_select_marquee();
        }
    }

    pub fn clear_selection(&mut self) {
        if let Some(chart) = self.current() {
            chart.clear_selection();
        }
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn press(&mut self, col: u16, row: u16) {
        self.last_mouse = Some((col, row));
        if self.pointer_mode == PointerMode::Select {
            let (px, py) = to_pixel(col, row);
            if let Some(chart) = self.current() {
                chart.start_select_marquee(px, py);
            }
        }
    }

    /// Handle mouse drag: pan, or grow the marquee
    pub fn handle_drag(&mut self, col: u16, row: u16) {
        match self.pointer_mode {
            PointerMode::Pan => {
                if let Some((last_x, last_y)) = self.last_mouse {
                    let dx = (i32::from(col) - i32::from(last_x)) * 2;
                    let dy = (i32::from(row) - i32::from(last_y)) * 4;
                    self.pan(dx, dy);
                }
            }
            PointerMode::Select => {
                let (px, py) = to_pixel(col, row);
                if let Some(chart) = self.current() {
                    chart.update_select_marquee(px, py);
                }
            }
        }
        self.last_mouse = Some((col, row));
    }

    /// Mouse button released: a click selects, a marquee closes.
    pub fn release(&mut self, col: u16, row: u16) {
        let clicked = self.last_mouse == Some((col, row));
        self.last_mouse = None;
        let mode = self.pointer_mode;
        let (px, py) = to_pixel(col, row);
        let Some(chart) = self.current() else { return };
        match mode {
            PointerMode::Select if chart.marquee().is_some() && !clicked => {
                chart.finish_select_marquee();
            }
            _ => {
                chart.cancel_select_marquee();
                if clicked {
                    chart.select_at(px, py);
                }
            }
        }
    }

    pub fn set_mouse_pos(&mut self, col: u16, row: u16) {
        self.mouse_pos = Some((col, row));
        let pointer = self.mouse_pixel_pos();
        if let Some(chart) = self.current() {
            chart.set_pointer(pointer);
        }
    }

    /// Mouse position in braille pixels inside the map frame
    pub fn mouse_pixel_pos(&self) -> Option<(f64, f64)> {
        self.mouse_pos.map(|(col, row)| to_pixel(col, row))
    }

    pub fn zoom_level(&self) -> String {
        format!("{:.1}x", self.chart.current_chart().zoom_level())
    }

    pub fn crs_name(&self) -> &'static str {
        self.chart.current_chart().crs().name()
    }

    /// Breadcrumbs of the drill path
    pub fn drill_path(&self) -> String {
        let path = self.chart.drilldown_path();
        if path.is_empty() {
            return "root".to_string();
        }
        path.iter().map(|point| point.feature_id.as_str()).collect::<Vec<_>>().join(" > ")
    }

    /// Lon/lat under the cursor
    pub fn pointer_coords(&self) -> Option<String> {
        let (px, py) = self.mouse_pixel_pos()?;
        let point = self.chart.current_chart().inverse_transform(px, py);
        if !point.long.is_finite() || !point.lat.is_finite() {
            return None;
        }
        Some(format!(
            "{:.1}°{}, {:.1}°{}",
            point.lat.abs(),
            if point.lat >= 0.0 { "N" } else { "S" },
            point.long.abs(),
            if point.long >= 0.0 { "E" } else { "W" }
        ))
    }
}

/// Terminal cell to braille pixel, accounting for the 1 cell border
fn to_pixel(col: u16, row: u16) -> (f64, f64) {
    (f64::from(col.saturating_sub(1)) * 2.0, f64::from(row.saturating_sub(1)) * 4.0)
}

fn describe(event: &ChartEvent) -> Option<String> {
    match event {
        ChartEvent::DrillChange { path, .. } => Some(match path.last() {
            Some(point) => format!("drilled into {}", point.feature_id),
            None => "back at the root".to_string(),
        }),
        ChartEvent::PointsSelect { points } => Some(format!("{} point(s) selected", points.len())),
        _ => None,
    }
}
