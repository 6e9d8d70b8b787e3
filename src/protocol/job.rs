//! # Print Jobs
//!
//! A [`PrintJob`] is what the caller wants printed; a [`Plan`] is the exact
//! sequence of writes and pauses that prints it.
//!
//! ## Framing Rules
//!
//! | Job | Prefix | Payload | Suffix |
//! |-----|--------|---------|--------|
//! | `Text` | init, mode reset | UTF-8, chunked | feed + cut |
//! | `RawBytes` | none | as given, chunked | drain pause only |
//! | `Alternative` | wake, init, mode reset | as given, chunked, page print | feed + cut |
//! | `RasterText` | init, mode reset | raster bit image, chunked | feed + cut |
//! | `Diagnostic` | init, mode reset | fixed self-test | cut |
//!
//! Raw payloads are complete command streams built by the caller (including
//! their own init and cut), so they are never wrapped.
//!
//! Encoding is pure: no I/O, no clocks. The executor in
//! [`transport::writer`](crate::transport::writer) turns a plan into writes.

use std::time::Duration;

use super::commands;
use crate::printer::BridgeSettings;
use crate::render::RasterRenderer;

/// Label printed by the diagnostic before the character set.
pub const DIAGNOSTIC_LABEL: &str = "TEST START\r\n";

/// Character set line printed in bold by the diagnostic.
pub const DIAGNOSTIC_CHARSET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789\r\n";

/// Text rasterized by the diagnostic.
pub const DIAGNOSTIC_RASTER_TEXT: &str = "RASTER TEST";

/// Something to print.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrintJob {
    /// Plain text, framed with init/reset and finalization
    Text(String),
    /// A complete caller-built command stream, sent untouched
    RawBytes(Vec<u8>),
    /// A caller-built payload wrapped in a wake/init preamble and finalization
    Alternative(Vec<u8>),
    /// Text rendered to a bitmap, for glyphs missing from the printer font
    RasterText(String),
    /// Fixed end-to-end self test
    Diagnostic,
}

/// One action against an open stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Write in one call, then flush
    Send(Vec<u8>),
    /// Write through the chunked, paced writer
    Stream(Vec<u8>),
    /// Sleep
    Pause(Duration),
}

/// Encoded form of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// Pause between the socket connecting and the first write.
    pub connect_settle: Duration,
    /// Setup and payload.
    pub body: Vec<Step>,
    /// Trailer (feed, cut, drain).
    pub finalize: Vec<Step>,
}

impl Plan {
    /// All bytes the plan writes, in order, ignoring pauses.
    pub fn bytes(&self) -> Vec<u8> {
        self.body
            .iter()
            .chain(self.finalize.iter())
            .flat_map(|step| match step {
                Step::Send(b) | Step::Stream(b) => b.as_slice(),
                Step::Pause(_) => &[][..],
            })
            .copied()
            .collect()
    }

    /// Total bytes the plan writes.
    pub fn len(&self) -> usize {
        self.body
            .iter()
            .chain(self.finalize.iter())
            .map(|step| match step {
                Step::Send(b) | Step::Stream(b) => b.len(),
                Step::Pause(_) => 0,
            })
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PrintJob {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PrintJob::Text(_) => "text",
            PrintJob::RawBytes(_) => "raw",
            PrintJob::Alternative(_) => "alternative",
            PrintJob::RasterText(_) => "raster",
            PrintJob::Diagnostic => "diagnostic",
        }
    }

    /// Encode the job into its write plan.
    pub fn encode(&self, settings: &BridgeSettings, renderer: &RasterRenderer) -> Plan {
        match self {
            PrintJob::Text(text) => Plan {
                connect_settle: settings.connect_settle(),
                body: vec![
                    Step::Send(commands::init()),
                    Step::Pause(settings.init_settle()),
                    Step::Send(commands::mode_reset()),
                    Step::Stream(text.as_bytes().to_vec()),
                ],
                finalize: standard_finalize(settings),
            },
            PrintJob::RawBytes(bytes) => Plan {
                connect_settle: settings.raw_connect_settle(),
                body: vec![Step::Stream(bytes.clone())],
                finalize: vec![Step::Pause(settings.raw_drain())],
            },
            PrintJob::Alternative(bytes) => Plan {
                connect_settle: settings.connect_settle(),
                body: vec![
                    Step::Send(commands::wake()),
                    Step::Pause(settings.init_settle()),
                    Step::Send(commands::init()),
                    Step::Pause(settings.init_settle()),
                    Step::Send(commands::mode_reset()),
                    Step::Pause(settings.init_settle()),
                    Step::Stream(bytes.clone()),
                    Step::Send(commands::print_page()),
                ],
                finalize: standard_finalize(settings),
            },
            PrintJob::RasterText(text) => Plan {
                connect_settle: settings.connect_settle(),
                body: vec![
                    Step::Send(commands::init()),
                    Step::Pause(settings.init_settle()),
                    Step::Send(commands::mode_reset()),
                    Step::Stream(renderer.rasterize(text)),
                ],
                finalize: standard_finalize(settings),
            },
            PrintJob::Diagnostic => diagnostic(settings, renderer),
        }
    }
}

/// Six line feeds, partial cut, settle.
fn standard_finalize(settings: &BridgeSettings) -> Vec<Step> {
    vec![
        Step::Send(commands::feed_lines(commands::FINAL_FEED_LINES)),
        Step::Send(commands::cut_partial()),
        Step::Pause(settings.finalize_settle()),
    ]
}

fn diagnostic(settings: &BridgeSettings, renderer: &RasterRenderer) -> Plan {
    let step = settings.diagnostic_step();

    let mut reset = commands::init();
    reset.extend(commands::mode_reset());

    let mut bold_line = commands::bold_on();
    bold_line.extend(DIAGNOSTIC_CHARSET.as_bytes());
    bold_line.extend(commands::bold_off());

    Plan {
        connect_settle: Duration::ZERO,
        body: vec![
            Step::Send(reset),
            Step::Pause(settings.diagnostic_reset()),
            Step::Send(DIAGNOSTIC_LABEL.as_bytes().to_vec()),
            Step::Pause(step),
            Step::Send(b"\r\n\r\n\r\n".to_vec()),
            Step::Pause(step),
            Step::Send(bold_line),
            Step::Pause(step),
            // Flushes a printer left in page mode
            Step::Send(commands::print_page()),
            Step::Pause(step),
            Step::Send(renderer.rasterize_marked(DIAGNOSTIC_RASTER_TEXT)),
            Step::Pause(step),
        ],
        finalize: vec![Step::Send(commands::cut_partial())],
    }
}
