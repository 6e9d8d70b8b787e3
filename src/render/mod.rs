//! # Rendering
//!
//! Turns text into 1-bit raster graphics for the printer.
//!
//! - [`text`]: Glyph rendering onto a monochrome canvas

pub mod text;

pub use text::{GlyphSource, RasterRenderer};
