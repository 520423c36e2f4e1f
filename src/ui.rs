use crate::app::{App, PointerMode};
use mapchart::braille::BrailleCanvas;
use mapchart::map::renderer::TextItem;
use mapchart::map::MapLayers;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
    Frame,
};

/// Choropleth palette, low to high.
const BUCKET_COLORS: [Color; 5] = [Color::Blue, Color::Cyan, Color::Green, Color::Yellow, Color::Red];

/// Render the UI
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // Map
            Constraint::Length(1), // Status bar
        ])
        .split(area);

    render_map(frame, app, chunks[0]);
    render_status_bar(frame, app, chunks[1]);
}

fn render_map(frame: &mut Frame, app: &App, area: Rect) {
    let chart = app.chart.current_chart();
    let title = format!(" {} ", app.drill_path());
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(title, Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let layers = app.map_renderer.render(chart, inner.width as usize, inner.height as usize);

    let cursor_pos = app.mouse_pixel_pos().and_then(|(px, py)| {
        let cx = (px / 2.0) as u16;
        let cy = (py / 4.0) as u16;
        (cx < inner.width && cy < inner.height).then_some((cx, cy))
    });

    frame.render_widget(MapWidget { layers, cursor_pos }, inner);
}

/// Braille map with text overlays
struct MapWidget {
    layers: MapLayers,
    cursor_pos: Option<(u16, u16)>,
}

impl MapWidget {
    /// Render a braille canvas layer with a specific color
    fn render_layer(&self, canvas: &BrailleCanvas, color: Color, area: Rect, buf: &mut Buffer) {
        for (row_idx, row_str) in canvas.rows().enumerate() {
            if row_idx >= area.height as usize {
                break;
            }
            let y = area.y + row_idx as u16;

            for (col_idx, ch) in row_str.chars().enumerate() {
                if col_idx >= area.width as usize {
                    break;
                }
                // Skip empty braille characters (U+2800)
                if ch == '\u{2800}' {
                    continue;
                }
                let x = area.x + col_idx as u16;
                buf[(x, y)].set_char(ch).set_fg(color);
            }
        }
    }

    fn render_text(&self, items: &[TextItem], style: Style, area: Rect, buf: &mut Buffer) {
        for (lx, ly, text) in items {
            if *ly >= area.height || *lx >= area.width {
                continue;
            }
            let max_len = area.width.saturating_sub(*lx) as usize;
            for (i, ch) in text.chars().take(max_len).enumerate() {
                buf[(area.x + *lx + i as u16, area.y + *ly)].set_char(ch).set_style(style);
            }
        }
    }
}

impl Widget for MapWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Back to front
        self.render_layer(&self.layers.grids, Color::DarkGray, area, buf);
        self.render_layer(&self.layers.outlines, Color::Gray, area, buf);
        for (canvas, color) in self.layers.regions.iter().zip(BUCKET_COLORS) {
            self.render_layer(canvas, color, area, buf);
        }
        self.render_layer(&self.layers.selected, Color::Magenta, area, buf);
        self.render_layer(&self.layers.markers, Color::White, area, buf);
        self.render_layer(&self.layers.selected_markers, Color::Magenta, area, buf);
        self.render_layer(&self.layers.marquee, Color::LightRed, area, buf);

        self.render_text(&self.layers.ticks, Style::default().fg(Color::DarkGray), area, buf);
        self.render_text(&self.layers.labels, Style::default().fg(Color::White), area, buf);
        self.render_text(
            &self.layers.callouts,
            Style::default().fg(Color::Black).bg(Color::Gray),
            area,
            buf,
        );

        if let Some((cx, cy, text)) = &self.layers.crosshair {
            let readout = [(cx.saturating_add(2), *cy, text.clone())];
            self.render_text(&readout, Style::default().fg(Color::Red), area, buf);
        }

        if let Some((cx, cy)) = self.cursor_pos {
            buf[(area.x + cx, area.y + cy)].set_char('╋').set_fg(Color::Red);
        }
    }
}

fn toggle_span(label: &'static str, on: bool) -> Span<'static> {
    Span::styled(label, Style::default().fg(if on { Color::Green } else { Color::DarkGray }))
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let chart = app.chart.current_chart();
    let elements = chart.elements();

    let mut spans = vec![
        Span::styled(" Zoom: ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.zoom_level(), Style::default().fg(Color::Yellow)),
        Span::styled(" (", Style::default().fg(Color::DarkGray)),
        Span::styled(app.crs_name(), Style::default().fg(Color::Magenta)),
        Span::styled(") ", Style::default().fg(Color::DarkGray)),
        toggle_span("[g]rid ", elements.grids.settings.enabled),
        toggle_span("[x]hair ", elements.crosshair.enabled),
        toggle_span("[m]arquee ", app.pointer_mode == PointerMode::Select),
        Span::styled("| ", Style::default().fg(Color::DarkGray)),
    ];
    if let Some(coords) = app.pointer_coords() {
        spans.push(Span::styled(coords, Style::default().fg(Color::Cyan)));
        spans.push(Span::styled(" | ", Style::default().fg(Color::DarkGray)));
    }
    if let Some(status) = &app.status {
        spans.push(Span::styled(status.clone(), Style::default().fg(Color::Yellow)));
        spans.push(Span::styled(" | ", Style::default().fg(Color::DarkGray)));
    }
    spans.push(Span::styled(
        "hjkl:pan +/-:zoom f:focus enter:drill bksp:up c:crs r:home q:quit",
        Style::default().fg(Color::DarkGray),
    ));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
