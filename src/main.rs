mod app;
mod ui;

use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use app::App;
use clap::Parser;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseButton, MouseEvent,
    MouseEventKind,
};
use crossterm::execute;
use mapchart::data::{self, GeoData, GeoDataKind};
use mapchart::map::{MapChart, MapSeries};
use ratatui::DefaultTerminal;
use tracing_subscriber::EnvFilter;

const FRAME: Duration = Duration::from_millis(16);

#[derive(Parser, Debug)]
#[command(author, version, about = "Browse GeoJSON and TopoJSON maps in the terminal")]
struct Args {
    /// GeoJSON or TopoJSON file; a built-in world is used when omitted
    #[arg(long)]
    geo_data: Option<PathBuf>,

    /// Chart configuration in the serialized JSON layout
    #[arg(long)]
    config: Option<PathBuf>,

    /// Projection name, e.g. `mercator` or `robinson`
    #[arg(long)]
    crs: Option<String>,

    /// Write logs here, filtered by RUST_LOG
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // The terminal belongs to the UI, so logs only go to a file.
    if let Some(path) = &args.log_file {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    }

    let chart = build_chart(&args)?;

    let mut terminal = ratatui::init();
    terminal.clear()?;
    execute!(std::io::stdout(), EnableMouseCapture)?;

    let result = run(&mut terminal, chart);

    let _ = execute!(std::io::stdout(), DisableMouseCapture);
    ratatui::restore();

    result
}

/// The chart described by the command line, or the demo world.
fn build_chart(args: &Args) -> Result<MapChart> {
    let mut chart = MapChart::new();
    match &args.geo_data {
        Some(path) => {
            let geo_data = data::load_file(path, &chart.settings().geo_id_field)
                .with_context(|| format!("loading {}", path.display()))?;
            tracing::info!(path = %path.display(), features = geo_data.features.len(), "geo data loaded");
            chart.set_geo_data(geo_data);
        }
        None => demo(&mut chart),
    }

    if let Some(path) = &args.config {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let config = data::parse_json(&text)?;
        chart.setup_by_json(&config)?;
    }
    if let Some(name) = &args.crs {
        chart.set_crs_by_name(name);
    }
    for warning in chart.take_warnings() {
        tracing::warn!(%warning, "chart setup");
    }
    Ok(chart)
}

/// Continents coloured by population, cities as markers, one drill scene per continent.
fn demo(chart: &mut MapChart) {
    let world = data::demo_world();
    let scenes: Vec<(String, MapChart)> = world
        .features
        .iter()
        .filter_map(|feature| {
            let id = feature.id.clone()?;
            let mut scene = MapChart::new();
            scene.set_geo_data(GeoData::new(GeoDataKind::GeoJson, vec![feature.clone()]));
            scene.add_series(Box::new(MapSeries::marker(data::demo_cities()).with_name("cities")));
            Some((id, scene))
        })
        .collect();

    chart.set_geo_data(world);
    chart.add_series(Box::new(MapSeries::choropleth(data::demo_regions()).with_name("population")));
    chart.add_series(Box::new(MapSeries::bubble(data::demo_cities()).with_name("cities")));
    chart.set_drill_down_map(scenes);
}

fn handle_key(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Char('q') | KeyCode::Esc => app.quit(),

        // Pan with hjkl or arrow keys
        KeyCode::Left | KeyCode::Char('h') => app.pan(20, 0),
        KeyCode::Right | KeyCode::Char('l') => app.pan(-20, 0),
        KeyCode::Up | KeyCode::Char('k') => app.pan(0, 24),
        KeyCode::Down | KeyCode::Char('j') => app.pan(0, -24),

        KeyCode::Char('+') | KeyCode::Char('=') => app.zoom_in(),
        KeyCode::Char('-') | KeyCode::Char('_') => app.zoom_out(),
        KeyCode::Char('r') | KeyCode::Char('0') => app.zoom_home(),
        KeyCode::Char('f') => app.toggle_feature_zoom(),

        KeyCode::Enter => app.drill_down(),
        KeyCode::Backspace => app.drill_up(),

        KeyCode::Char('c') => app.cycle_crs(),
        KeyCode::Char('g') => app.toggle_grids(),
        KeyCode::Char('x') => app.toggle_crosshair(),
        KeyCode::Char('m') => app.toggle_pointer_mode(),
        KeyCode::Char('u') => app.clear_selection(),
        KeyCode::Char('L') => {
            app.map_renderer.settings.show_labels = !app.map_renderer.settings.show_labels;
        }
        _ => {}
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    app.set_mouse_pos(mouse.column, mouse.row);

    match mouse.kind {
        MouseEventKind::ScrollUp => app.zoom_at(mouse.column, mouse.row, true),
        MouseEventKind::ScrollDown => app.zoom_at(mouse.column, mouse.row, false),
        // Horizontal scroll for panning (trackpad two-finger swipe)
        MouseEventKind::ScrollLeft => app.pan(30, 0),
        MouseEventKind::ScrollRight => app.pan(-30, 0),
        MouseEventKind::Down(MouseButton::Left) => app.press(mouse.column, mouse.row),
        MouseEventKind::Drag(MouseButton::Left) => app.handle_drag(mouse.column, mouse.row),
        MouseEventKind::Up(MouseButton::Left) => app.release(mouse.column, mouse.row),
        MouseEventKind::Down(MouseButton::Right) => app.drill_down(),
        MouseEventKind::Down(MouseButton::Middle) => app.drill_up(),
        _ => {}
    }
}

fn run(terminal: &mut DefaultTerminal, chart: MapChart) -> Result<()> {
    let size = terminal.size()?;
    let mut app = App::new(size.width as usize, size.height as usize, chart);
    let mut last_frame = Instant::now();

    loop {
        terminal.draw(|frame| ui::render(frame, &app))?;

        // ~60fps
        if event::poll(FRAME)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => handle_key(&mut app, key.code),
                Event::Mouse(mouse) => handle_mouse(&mut app, mouse),
                Event::Resize(width, height) => app.resize(width as usize, height as usize),
                _ => {}
            }
        }

        let now = Instant::now();
        app.update(now - last_frame);
        last_frame = now;

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
