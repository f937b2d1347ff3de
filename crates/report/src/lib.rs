pub mod colors;
pub mod draw;
pub mod widgets;

pub use colors::{StatusPalette, Theme};
pub use draw::{render_summary, Reporter};
