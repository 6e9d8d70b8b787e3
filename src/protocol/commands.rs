//! # ESC/POS Commands
//!
//! The subset of ESC/POS the bridge needs: initialization, formatting reset,
//! bold toggle, feeds and paper cut.
//!
//! ## Escape Sequence Structure
//!
//! Commands follow these patterns:
//! - Single byte: `LF`
//! - Two bytes: `ESC @`, `ESC S`, `ESC 2`
//! - With parameter: `ESC a n`, `GS V m`
//!
//! ## Byte Order
//!
//! Multi-byte integers use **little-endian** encoding:
//! - `u16` value 0x1234 is sent as bytes `[0x34, 0x12]`

// ============================================================================
// ESCAPE SEQUENCE CONSTANTS
// ============================================================================

/// ESC (Escape) - Command prefix byte
pub const ESC: u8 = 0x1B;

/// GS (Group Separator) - Extended command prefix
pub const GS: u8 = 0x1D;

/// LF (Line Feed) - Print and advance one line
pub const LF: u8 = 0x0A;

/// FF (Form Feed) - With ESC prefix, prints the page-mode buffer
pub const FF: u8 = 0x0C;

/// NUL - Used as a wake-up preamble by some printers
pub const NUL: u8 = 0x00;

/// Number of blank lines fed before the cut so the last line clears the blade.
pub const FINAL_FEED_LINES: usize = 6;

// ============================================================================
// INITIALIZATION
// ============================================================================

/// # Initialize Printer (ESC @)
///
/// Clears the print buffer and resets modes to power-on defaults.
///
/// | Format  | Bytes |
/// |---------|-------|
/// | ASCII   | ESC @ |
/// | Hex     | 1B 40 |
///
/// ```
/// use estafeta::protocol::commands;
///
/// assert_eq!(commands::init(), vec![0x1B, 0x40]);
/// ```
#[inline]
pub fn init() -> Vec<u8> {
    vec![ESC, b'@']
}

/// Select standard mode (ESC S), leaving page mode if a previous job set it.
#[inline]
pub fn standard_mode() -> Vec<u8> {
    vec![ESC, b'S']
}

/// Cancel white/black reverse printing (GS B 0).
#[inline]
pub fn cancel_reverse() -> Vec<u8> {
    vec![GS, b'B', 0]
}

/// Left justification (ESC a 0).
#[inline]
pub fn align_left() -> Vec<u8> {
    vec![ESC, b'a', 0]
}

/// Default line spacing (ESC 2).
#[inline]
pub fn default_line_spacing() -> Vec<u8> {
    vec![ESC, b'2']
}

/// Select character code table (GS t n). Table 0 is PC437.
#[inline]
pub fn code_page(n: u8) -> Vec<u8> {
    vec![GS, b't', n]
}

/// # Mode Reset
///
/// Neutralizes sticky state left by a previous job. Sent right after
/// [`init`], in this fixed order:
///
/// | Step | Bytes | Effect |
/// |------|-------|--------|
/// | 1 | 1B 53 | Standard mode |
/// | 2 | 1D 42 00 | Cancel reverse |
/// | 3 | 1B 61 00 | Align left |
/// | 4 | 1B 32 | Default line spacing |
/// | 5 | 1D 74 00 | Code page 0 (PC437) |
pub fn mode_reset() -> Vec<u8> {
    let mut data = Vec::with_capacity(13);
    data.extend(standard_mode());
    data.extend(cancel_reverse());
    data.extend(align_left());
    data.extend(default_line_spacing());
    data.extend(code_page(0));
    data
}

/// Two NUL bytes. Some printers drop the first bytes after a link comes up.
#[inline]
pub fn wake() -> Vec<u8> {
    vec![NUL, NUL]
}

// ============================================================================
// TEXT STYLE
// ============================================================================

/// Emphasized (bold) on (ESC E 1).
#[inline]
pub fn bold_on() -> Vec<u8> {
    vec![ESC, b'E', 1]
}

/// Emphasized (bold) off (ESC E 0).
#[inline]
pub fn bold_off() -> Vec<u8> {
    vec![ESC, b'E', 0]
}

// ============================================================================
// PAPER CONTROL
// ============================================================================

/// `n` line feeds.
#[inline]
pub fn feed_lines(n: usize) -> Vec<u8> {
    vec![LF; n]
}

/// Print the page-mode buffer (ESC FF). A no-op in standard mode.
#[inline]
pub fn print_page() -> Vec<u8> {
    vec![ESC, FF]
}

/// # Partial Cut (GS V 1)
///
/// Leaves a small hinge so the receipt does not fall.
///
/// | Format  | Bytes    |
/// |---------|----------|
/// | ASCII   | GS V 1   |
/// | Hex     | 1D 56 01 |
#[inline]
pub fn cut_partial() -> Vec<u8> {
    vec![GS, b'V', 1]
}

/// Blank-line feed followed by a partial cut.
///
/// Appended after every encoded text job. Never appended after raw payloads,
/// which carry their own termination.
pub fn finalization() -> Vec<u8> {
    let mut data = feed_lines(FINAL_FEED_LINES);
    data.extend(cut_partial());
    data
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Encode a u16 value as little-endian bytes [low, high]
///
/// ```
/// use estafeta::protocol::commands::u16_le;
///
/// assert_eq!(u16_le(0x1234), [0x34, 0x12]);
/// assert_eq!(u16_le(72), [0x48, 0x00]);
/// ```
#[inline]
pub const fn u16_le(value: u16) -> [u8; 2] {
    [value as u8, (value >> 8) as u8]
}

// ============================================================================
// TESTS
// ============================================================================
