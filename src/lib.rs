//! Map chart engine with a Braille terminal front end.

pub mod braille;
pub mod data;
pub mod error;
pub mod geo;
pub mod map;

pub use error::{MapError, Result};
pub use map::MapChart;
