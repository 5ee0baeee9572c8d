pub mod text;

pub use text::normalize_lines;
