//! # Text Rasterization
//!
//! Renders a line of text onto a fixed-size monochrome canvas so the printer
//! can print characters its built-in font tables lack.
//!
//! ## Glyph Sources
//!
//! | Source | When | Edges |
//! |--------|------|-------|
//! | Outline (TTF/OTF via ab_glyph) | `font_path` set and loadable | Anti-aliased |
//! | Spleen 12×24 bitmap | Otherwise | Hard, scaled by whole pixels |
//!
//! Both sources are emboldened with a one-dot horizontal double strike.
//! The text is vertically centered and starts `left_inset` dots from the
//! left edge; anything past the right edge is clipped.
//!
//! ## Determinism
//!
//! Rendering uses no randomness or global state, so the same text with the
//! same settings always produces byte-identical raster output.

use std::fs;

use ab_glyph::{Font, FontArc, ScaleFont};
use image::{Rgb, RgbImage};
use spleen_font::{FONT_12X24, PSF2Font};
use tracing::{debug, warn};

use crate::printer::RasterSettings;
use crate::protocol::graphics;

/// Native cell size of the built-in bitmap face.
const BITMAP_CELL_WIDTH: usize = 12;
const BITMAP_CELL_HEIGHT: usize = 24;

/// Height of the calibration bar drawn above diagnostic raster text.
pub const MARKER_BAR_HEIGHT: u32 = 20;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Where glyph shapes come from.
#[derive(Clone)]
pub enum GlyphSource {
    /// Built-in Spleen bitmap face
    Bitmap,
    /// Scalable font loaded from disk
    Outline(FontArc),
}

impl std::fmt::Debug for GlyphSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GlyphSource::Bitmap => f.write_str("Bitmap"),
            GlyphSource::Outline(_) => f.write_str("Outline"),
        }
    }
}

/// Renders text into raster bit image commands.
#[derive(Debug, Clone)]
pub struct RasterRenderer {
    settings: RasterSettings,
    source: GlyphSource,
}

impl RasterRenderer {
    /// Build a renderer, loading the configured font if there is one.
    ///
    /// A font that cannot be read or parsed is logged and replaced by the
    /// built-in bitmap face.
    pub fn new(settings: RasterSettings) -> Self {
        let source = match &settings.font_path {
            Some(path) => match fs::read(path) {
                Ok(bytes) => match FontArc::try_from_vec(bytes) {
                    Ok(font) => {
                        debug!(path = %path.display(), "Loaded raster font");
                        GlyphSource::Outline(font)
                    }
                    Err(e) => {
                        warn!(path = %path.display(), "Invalid font file, using built-in face: {}", e);
                        GlyphSource::Bitmap
                    }
                },
                Err(e) => {
                    warn!(path = %path.display(), "Cannot read font file, using built-in face: {}", e);
                    GlyphSource::Bitmap
                }
            },
            None => GlyphSource::Bitmap,
        };
        Self { settings, source }
    }

    /// Renderer using the built-in bitmap face regardless of `font_path`.
    pub fn builtin(settings: RasterSettings) -> Self {
        Self {
            settings,
            source: GlyphSource::Bitmap,
        }
    }

    pub fn source(&self) -> &GlyphSource {
        &self.source
    }

    pub fn settings(&self) -> &RasterSettings {
        &self.settings
    }

    /// Draw `text` onto a white canvas.
    pub fn render(&self, text: &str) -> RgbImage {
        let mut canvas = RgbImage::from_pixel(
            self.settings.width as u32,
            self.settings.height as u32,
            WHITE,
        );
        match &self.source {
            GlyphSource::Bitmap => self.draw_bitmap(&mut canvas, text),
            GlyphSource::Outline(font) => self.draw_outline(&mut canvas, font, text),
        }
        canvas
    }

    /// Like [`render`](Self::render), with a solid bar across the top rows.
    ///
    /// The bar makes it obvious on paper whether the bitmap's first rows
    /// arrived, independent of the glyphs.
    pub fn render_marked(&self, text: &str) -> RgbImage {
        let mut canvas = self.render(text);
        let bar = MARKER_BAR_HEIGHT.min(canvas.height());
        for y in 0..bar {
            for x in 0..canvas.width() {
                canvas.put_pixel(x, y, Rgb([0, 0, 0]));
            }
        }
        canvas
    }

    /// Render and encode as a `GS v 0` raster command.
    pub fn rasterize(&self, text: &str) -> Vec<u8> {
        graphics::raster_from_image(&self.render(text))
    }

    /// Render with the top marker bar and encode.
    pub fn rasterize_marked(&self, text: &str) -> Vec<u8> {
        graphics::raster_from_image(&self.render_marked(text))
    }

    fn draw_bitmap(&self, canvas: &mut RgbImage, text: &str) {
        let mut spleen = match PSF2Font::new(FONT_12X24) {
            Ok(font) => font,
            Err(_) => {
                warn!("Built-in bitmap font failed to load");
                return;
            }
        };

        let scale = ((self.settings.font_size / BITMAP_CELL_HEIGHT as f32).round() as usize).max(1);
        let glyph_h = (BITMAP_CELL_HEIGHT * scale) as i64;
        let top = (canvas.height() as i64 - glyph_h) / 2;
        let mut caret = self.settings.left_inset as i64;

        for ch in text.chars() {
            if caret >= canvas.width() as i64 {
                break;
            }
            let utf8 = ch.to_string();
            if let Some(glyph) = spleen.glyph_for_utf8(utf8.as_bytes()) {
                for (row_y, row) in glyph.enumerate() {
                    for (col_x, on) in row.enumerate() {
                        if on {
                            let x = caret + (col_x * scale) as i64;
                            let y = top + (row_y * scale) as i64;
                            fill_block(canvas, x, y, scale as i64 + 1, scale as i64, 0);
                        }
                    }
                }
            } else {
                draw_box(canvas, caret, top, (BITMAP_CELL_WIDTH * scale) as i64, glyph_h);
            }
            caret += (BITMAP_CELL_WIDTH * scale) as i64;
        }
    }

    fn draw_outline(&self, canvas: &mut RgbImage, font: &FontArc, text: &str) {
        let px = self.settings.font_size;
        let scaled = font.as_scaled(px);

        let ascent = scaled.ascent();
        let descent = scaled.descent();
        let line_height = ascent - descent;
        let baseline = (canvas.height() as f32 - line_height) / 2.0 + ascent;

        let mut caret = self.settings.left_inset as f32;
        let mut previous = None;

        for ch in text.chars() {
            let glyph_id = font.glyph_id(ch);
            if let Some(prev) = previous {
                caret += scaled.kern(prev, glyph_id);
            }
            previous = Some(glyph_id);

            // Double strike for weight
            for offset in [0.0f32, 1.0] {
                let glyph =
                    glyph_id.with_scale_and_position(px, ab_glyph::point(caret + offset, baseline));
                if let Some(outlined) = font.outline_glyph(glyph) {
                    let bounds = outlined.px_bounds();
                    outlined.draw(|gx, gy, coverage| {
                        let x = gx as i64 + bounds.min.x as i64;
                        let y = gy as i64 + bounds.min.y as i64;
                        let value = (255.0 * (1.0 - coverage.clamp(0.0, 1.0))).round() as u8;
                        darken(canvas, x, y, value);
                    });
                }
            }

            caret += scaled.h_advance(glyph_id);
            if caret >= canvas.width() as f32 {
                break;
            }
        }
    }
}

/// Lower a pixel to `value` on all channels, keeping whichever is darker.
fn darken(canvas: &mut RgbImage, x: i64, y: i64, value: u8) {
    if x < 0 || y < 0 || x >= canvas.width() as i64 || y >= canvas.height() as i64 {
        return;
    }
    let pixel = canvas.get_pixel_mut(x as u32, y as u32);
    for channel in pixel.0.iter_mut() {
        *channel = (*channel).min(value);
    }
}

fn fill_block(canvas: &mut RgbImage, x: i64, y: i64, w: i64, h: i64, value: u8) {
    for dy in 0..h {
        for dx in 0..w {
            darken(canvas, x + dx, y + dy, value);
        }
    }
}

/// Outline placeholder for characters the bitmap face lacks.
fn draw_box(canvas: &mut RgbImage, x: i64, y: i64, w: i64, h: i64) {
    let (x0, y0, x1, y1) = (x + 2, y + 2, x + w - 3, y + h - 3);
    for cx in x0..=x1 {
        darken(canvas, cx, y0, 0);
        darken(canvas, cx, y1, 0);
    }
    for cy in y0..=y1 {
        darken(canvas, x0, cy, 0);
        darken(canvas, x1, cy, 0);
    }
}
