//! # ESC/POS Raster Graphics
//!
//! Bit packing and the `GS v 0` raster bit image command.
//!
//! ## Bit Packing
//!
//! Graphics data is packed as bytes where each bit represents one dot:
//! - Bit 7 (MSB) = leftmost dot
//! - Bit 0 (LSB) = rightmost dot
//! - 1 = black (print), 0 = white (no print)
//!
//! Rows are padded with zero bits up to a whole byte, so a row always takes
//! `ceil(width / 8)` bytes.
//!
//! ```text
//! Byte value 0xF0 = 11110000 = ████░░░░
//! Byte value 0x0F = 00001111 = ░░░░████
//! ```

use image::RgbImage;

use super::commands::{GS, u16_le};

/// Length of the `GS v 0` header preceding the bitmap.
pub const RASTER_HEADER_LEN: usize = 8;

/// Luminance below which a pixel prints black.
pub const BLACK_THRESHOLD: u32 = 128;

/// Perceptual luminance of an RGB pixel (ITU-R BT.601 weights), truncated.
#[inline]
pub fn luminance(r: u8, g: u8, b: u8) -> u32 {
    (0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64) as u32
}

/// Bytes per packed row for a width in dots.
#[inline]
pub fn row_bytes(width_dots: u32) -> usize {
    (width_dots as usize).div_ceil(8)
}

/// Pack an RGB canvas into a 1-bit bitmap, row-major, MSB first.
pub fn pack_image(image: &RgbImage) -> Vec<u8> {
    let (w, h) = image.dimensions();
    let width_bytes = row_bytes(w);
    let mut data = vec![0u8; width_bytes * h as usize];

    for (x, y, pixel) in image.enumerate_pixels() {
        let [r, g, b] = pixel.0;
        if luminance(r, g, b) < BLACK_THRESHOLD {
            let idx = y as usize * width_bytes + x as usize / 8;
            data[idx] |= 0x80 >> (x % 8);
        }
    }

    data
}

/// # Print Raster Bit Image (GS v 0 m xL xH yL yH d1...dk)
///
/// | Format  | Bytes |
/// |---------|-------|
/// | ASCII   | GS v 0 m xL xH yL yH d1...dk |
/// | Hex     | 1D 76 30 m xL xH yL yH d1...dk |
///
/// - `m`: 0 = normal density
/// - `xL, xH`: row width in **bytes**, little-endian
/// - `yL, yH`: height in dots, little-endian
/// - `k = width_bytes × height`
///
/// ```
/// use estafeta::protocol::graphics;
///
/// let data = vec![0xAA; 72 * 10];
/// let cmd = graphics::raster(72, 10, &data);
/// assert_eq!(&cmd[..8], &[0x1D, 0x76, 0x30, 0x00, 72, 0, 10, 0]);
/// assert_eq!(cmd.len(), 8 + 72 * 10);
/// ```
pub fn raster(width_bytes: u16, height: u16, data: &[u8]) -> Vec<u8> {
    debug_assert!(
        data.len() == width_bytes as usize * height as usize,
        "Raster data length mismatch. Expected {} ({} bytes × {} rows), got {}",
        width_bytes as usize * height as usize,
        width_bytes,
        height,
        data.len()
    );

    let [xl, xh] = u16_le(width_bytes);
    let [yl, yh] = u16_le(height);

    let mut cmd = Vec::with_capacity(RASTER_HEADER_LEN + data.len());
    cmd.push(GS);
    cmd.push(b'v');
    cmd.push(b'0');
    cmd.push(0); // m = 0 (normal)
    cmd.push(xl);
    cmd.push(xh);
    cmd.push(yl);
    cmd.push(yh);
    cmd.extend_from_slice(data);
    cmd
}

/// Pack a canvas and wrap it in a raster command.
///
/// Dimensions above `u16::MAX` are not representable in the header; callers
/// size canvases from [`RasterSettings`](crate::printer::RasterSettings),
/// which are `u16` already.
pub fn raster_from_image(image: &RgbImage) -> Vec<u8> {
    let (w, h) = image.dimensions();
    let data = pack_image(image);
    raster(row_bytes(w) as u16, h as u16, &data)
}

/// Read the declared (row bytes, rows) back out of a raster command.
pub fn parse_header(cmd: &[u8]) -> Option<(u16, u16)> {
    match cmd {
        [GS, b'v', b'0', _, xl, xh, yl, yh, ..] => Some((
            u16::from_le_bytes([*xl, *xh]),
            u16::from_le_bytes([*yl, *yh]),
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use pretty_assertions::assert_eq;

    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

    #[test]
    fn test_luminance_threshold() {
        assert_eq!(luminance(0, 0, 0), 0);
        assert!(luminance(255, 255, 255) >= 254);
        // Pure red: 0.299 * 255 = 76.2 -> black
        assert!(luminance(255, 0, 0) < BLACK_THRESHOLD);
        // Pure green: 0.587 * 255 = 149.7 -> white
        assert!(luminance(0, 255, 0) >= BLACK_THRESHOLD);
        assert!(luminance(130, 130, 130) >= BLACK_THRESHOLD);
        assert!(luminance(127, 127, 127) < BLACK_THRESHOLD);
    }

    #[test]
    fn test_row_bytes() {
        assert_eq!(row_bytes(576), 72);
        assert_eq!(row_bytes(1), 1);
        assert_eq!(row_bytes(8), 1);
        assert_eq!(row_bytes(9), 2);
        assert_eq!(row_bytes(10), 2);
    }

    #[test]
    fn test_pack_msb_first() {
        let mut img = RgbImage::from_pixel(8, 1, WHITE);
        img.put_pixel(0, 0, BLACK);
        img.put_pixel(7, 0, BLACK);
        assert_eq!(pack_image(&img), vec![0b1000_0001]);
    }

    #[test]
    fn test_pack_pads_rows() {
        // 10 wide: second byte holds 2 dots then 6 zero bits
        let mut img = RgbImage::from_pixel(10, 2, BLACK);
        img.put_pixel(0, 1, WHITE);
        let data = pack_image(&img);
        assert_eq!(data, vec![0xFF, 0b1100_0000, 0x7F, 0b1100_0000]);
    }

    #[test]
    fn test_raster_header() {
        let cmd = raster(72, 300, &vec![0; 72 * 300]);
        assert_eq!(&cmd[..8], &[0x1D, 0x76, 0x30, 0x00, 0x48, 0x00, 0x2C, 0x01]);
        assert_eq!(parse_header(&cmd), Some((72, 300)));
    }

    #[test]
    fn test_raster_from_image_lengths() {
        for (w, h) in [(576u32, 120u32), (10, 3), (1, 1), (385, 7)] {
            let img = RgbImage::from_pixel(w, h, WHITE);
            let cmd = raster_from_image(&img);
            let (rb, rows) = parse_header(&cmd).unwrap();
            assert_eq!(rb as usize, (w as usize).div_ceil(8));
            assert_eq!(rows as u32, h);
            assert_eq!(rb as usize * rows as usize + RASTER_HEADER_LEN, cmd.len());
        }
    }

    #[test]
    fn test_parse_header_rejects_other_commands() {
        assert_eq!(parse_header(&[0x1B, 0x40]), None);
        assert_eq!(parse_header(&[0x1D, 0x76, 0x30]), None);
    }
}
