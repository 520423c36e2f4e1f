mod canvas;
mod draw;

pub use canvas::BrailleCanvas;
pub use draw::{draw_circle, draw_line, draw_marker, draw_polyline};
