//! # Paced Writer
//!
//! Cheap SPP printers have tiny receive buffers and drop bytes when flooded,
//! so payloads go out in fixed-size chunks with a pause after each.
//!
//! ```text
//! |<- chunk ->| flush | delay |<- chunk ->| flush | delay | ... |<- tail ->| flush | delay |
//! ```
//!
//! All functions here block and are meant to run on a blocking thread.
//! Cancellation is checked before every chunk and during every pause, so a
//! cancelled job stops within one chunk or one pause slice.

use std::io::Write;
use std::thread;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::EstafetaError;
use crate::protocol::Step;

/// Longest uninterrupted sleep inside [`pause`].
const PAUSE_SLICE: Duration = Duration::from_millis(25);

/// Position within a multi-step write, for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Bytes written so far.
    pub offset: usize,
    /// Bytes the whole plan writes.
    pub total: usize,
}

impl Progress {
    pub fn new(total: usize) -> Self {
        Self { offset: 0, total }
    }
}

/// Chunking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub chunk_size: usize,
    pub chunk_delay: Duration,
}

/// Write `data` in slices of at most `chunk_size` bytes, flushing and
/// sleeping `delay` after each.
///
/// A `chunk_size` of zero is treated as one. On a failed write the error
/// carries the offset of the chunk that failed and the payload length.
pub fn write_chunked<W: Write + ?Sized>(
    stream: &mut W,
    data: &[u8],
    chunk_size: usize,
    delay: Duration,
    cancel: &CancellationToken,
) -> Result<(), EstafetaError> {
    let pacing = Pacing {
        chunk_size,
        chunk_delay: delay,
    };
    let mut progress = Progress::new(data.len());
    stream_chunks(stream, data, pacing, &mut progress, cancel)
}

fn stream_chunks<W: Write + ?Sized>(
    stream: &mut W,
    data: &[u8],
    pacing: Pacing,
    progress: &mut Progress,
    cancel: &CancellationToken,
) -> Result<(), EstafetaError> {
    for chunk in data.chunks(pacing.chunk_size.max(1)) {
        if cancel.is_cancelled() {
            return Err(EstafetaError::Cancelled);
        }
        send(stream, chunk, progress)?;
        trace!(offset = progress.offset, total = progress.total, "Chunk written");
        pause(pacing.chunk_delay, cancel)?;
    }
    Ok(())
}

/// One write call plus flush, advancing `progress`.
fn send<W: Write + ?Sized>(
    stream: &mut W,
    bytes: &[u8],
    progress: &mut Progress,
) -> Result<(), EstafetaError> {
    let result = stream.write_all(bytes).and_then(|()| stream.flush());
    if let Err(source) = result {
        return Err(EstafetaError::WriteFailed {
            offset: progress.offset,
            total: progress.total,
            source,
        });
    }
    progress.offset += bytes.len();
    Ok(())
}

/// Sleep for `duration`, waking early with `Cancelled` if the token fires.
pub fn pause(duration: Duration, cancel: &CancellationToken) -> Result<(), EstafetaError> {
    let mut remaining = duration;
    while !remaining.is_zero() {
        if cancel.is_cancelled() {
            return Err(EstafetaError::Cancelled);
        }
        let slice = remaining.min(PAUSE_SLICE);
        thread::sleep(slice);
        remaining -= slice;
    }
    Ok(())
}

/// Run plan steps against an open stream.
///
/// `Send` steps go out in one write, `Stream` steps through the chunked
/// writer. `progress` spans every step so a failure reports its position in
/// the whole plan.
pub fn execute_steps<W: Write + ?Sized>(
    stream: &mut W,
    steps: &[Step],
    pacing: Pacing,
    progress: &mut Progress,
    cancel: &CancellationToken,
) -> Result<(), EstafetaError> {
    for step in steps {
        match step {
            Step::Send(bytes) => {
                if cancel.is_cancelled() {
                    return Err(EstafetaError::Cancelled);
                }
                send(stream, bytes, progress)?;
            }
            Step::Stream(bytes) => stream_chunks(stream, bytes, pacing, progress, cancel)?,
            Step::Pause(duration) => pause(*duration, cancel)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io;

    /// Records each write call separately.
    #[derive(Default)]
    struct Recorder {
        calls: Vec<Vec<u8>>,
        fail_on_call: Option<usize>,
    }

    impl Write for Recorder {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail_on_call == Some(self.calls.len()) {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
            }
            self.calls.push(buf.to_vec());
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn payload(n: usize) -> Vec<u8> {
        (0..n).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_chunk_boundaries() {
        let data = payload(300);
        let mut rec = Recorder::default();
        write_chunked(&mut rec, &data, 128, Duration::ZERO, &CancellationToken::new()).unwrap();
        let sizes: Vec<usize> = rec.calls.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![128, 128, 44]);
    }

    #[test]
    fn test_concatenation_for_any_chunk_size() {
        let data = payload(97);
        for chunk_size in 0..=100 {
            let mut rec = Recorder::default();
            write_chunked(&mut rec, &data, chunk_size, Duration::ZERO, &CancellationToken::new())
                .unwrap();
            assert_eq!(rec.calls.concat(), data, "chunk_size={}", chunk_size);
            assert!(rec.calls.iter().all(|c| c.len() <= chunk_size.max(1)));
        }
    }

    #[test]
    fn test_empty_payload_writes_nothing() {
        let mut rec = Recorder::default();
        write_chunked(&mut rec, &[], 256, Duration::ZERO, &CancellationToken::new()).unwrap();
        assert!(rec.calls.is_empty());
    }

    #[test]
    fn test_failure_reports_offset() {
        let data = payload(300);
        let mut rec = Recorder {
            fail_on_call: Some(2),
            ..Default::default()
        };
        let err = write_chunked(&mut rec, &data, 128, Duration::ZERO, &CancellationToken::new())
            .unwrap_err();
        match err {
            EstafetaError::WriteFailed { offset, total, .. } => {
                assert_eq!((offset, total), (256, 300));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_cancelled_before_first_chunk() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut rec = Recorder::default();
        let err = write_chunked(&mut rec, &payload(10), 4, Duration::ZERO, &cancel).unwrap_err();
        assert!(matches!(err, EstafetaError::Cancelled));
        assert!(rec.calls.is_empty());
    }

    #[test]
    fn test_pause_wakes_on_cancel() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let start = std::time::Instant::now();
        assert!(matches!(
            pause(Duration::from_secs(10), &cancel),
            Err(EstafetaError::Cancelled)
        ));
        assert!(start.elapsed() < Duration::from_secs(1));
        // Nothing to wait for, nothing to cancel
        assert!(pause(Duration::ZERO, &cancel).is_ok());
    }

    #[test]
    fn test_steps_share_progress() {
        let steps = vec![
            Step::Send(vec![1, 2, 3]),
            Step::Pause(Duration::ZERO),
            Step::Stream(payload(10)),
            Step::Send(vec![9]),
        ];
        let pacing = Pacing {
            chunk_size: 4,
            chunk_delay: Duration::ZERO,
        };
        let mut rec = Recorder::default();
        let mut progress = Progress::new(14);
        execute_steps(&mut rec, &steps, pacing, &mut progress, &CancellationToken::new()).unwrap();
        let sizes: Vec<usize> = rec.calls.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 4, 4, 2, 1]);
        assert_eq!(progress.offset, 14);
    }

    #[test]
    fn test_step_failure_offset_spans_plan() {
        let steps = vec![Step::Send(vec![0; 5]), Step::Stream(payload(8))];
        let pacing = Pacing {
            chunk_size: 4,
            chunk_delay: Duration::ZERO,
        };
        let mut rec = Recorder {
            fail_on_call: Some(2),
            ..Default::default()
        };
        let mut progress = Progress::new(13);
        let err = execute_steps(&mut rec, &steps, pacing, &mut progress, &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(
            err,
            EstafetaError::WriteFailed {
                offset: 9,
                total: 13,
                ..
            }
        ));
    }
}
