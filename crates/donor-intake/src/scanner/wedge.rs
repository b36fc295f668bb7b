//! Keyboard-wedge scanner support.
//!
//! USB and Bluetooth QR scanners usually present themselves as a keyboard:
//! they decode the code on the device and type the text followed by Enter.
//! Each line read is one decode attempt; an empty line (a trigger pull with
//! nothing in view) means the frame held no code.

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

use super::{ScanAttempt, ScanFailure, ScanSource};
use crate::error::{Error, Result};

const SOURCE_NAME: &str = "keyboard-wedge";

/// Line limit used until [`KeyboardWedgeSource::with_max_len`] says otherwise.
const DEFAULT_MAX_LEN: usize = 2_048;

/// How a bounded line read ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineRead {
    /// The reader had nothing left.
    Eof,
    /// A whole line is in the buffer.
    Complete,
    /// The line ran past the limit. The buffer holds its start and the rest
    /// of the line has been discarded.
    Truncated,
}

/// Read one line into `buf`, keeping at most `max_len` bytes of it.
///
/// Bytes past the limit are consumed and dropped up to the next newline, so
/// the following read starts on a fresh line.
pub(crate) async fn read_bounded_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max_len: usize,
) -> std::io::Result<LineRead> {
    buf.clear();
    let mut seen_any = false;
    let mut truncated = false;

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            break;
        }
        seen_any = true;

        let (chunk, end_of_line) = match available.iter().position(|&b| b == b'\n') {
            Some(newline) => (&available[..=newline], true),
            None => (available, false),
        };
        let room = max_len.saturating_sub(buf.len());
        if chunk.len() > room {
            truncated = true;
        }
        buf.extend_from_slice(&chunk[..chunk.len().min(room)]);

        let used = chunk.len();
        reader.consume(used);
        if end_of_line {
            break;
        }
    }

    Ok(match (seen_any, truncated) {
        (false, _) => LineRead::Eof,
        (true, true) => LineRead::Truncated,
        (true, false) => LineRead::Complete,
    })
}

/// A [`ScanSource`] that reads decoded codes line by line.
#[derive(Debug)]
pub struct KeyboardWedgeSource<R> {
    reader: R,
    line: Vec<u8>,
    max_len: usize,
    acquired: bool,
}

impl<R: AsyncBufRead + Unpin + Send> KeyboardWedgeSource<R> {
    /// Wrap a line-oriented reader, such as buffered stdin.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: Vec::new(),
            max_len: DEFAULT_MAX_LEN,
            acquired: false,
        }
    }

    /// Reject lines longer than `max_len` bytes without buffering them.
    #[must_use]
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    /// Whether the source is currently acquired.
    #[must_use]
    pub fn is_acquired(&self) -> bool {
        self.acquired
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> ScanSource for KeyboardWedgeSource<R> {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn acquire(&mut self) -> Result<()> {
        if self.acquired {
            return Err(Error::scanner_open(SOURCE_NAME, "already acquired"));
        }
        self.acquired = true;
        Ok(())
    }

    async fn next_attempt(&mut self) -> Result<ScanAttempt> {
        // Room for the line ending on top of the payload itself.
        let limit = self.max_len.saturating_add(2);
        match read_bounded_line(&mut self.reader, &mut self.line, limit).await? {
            LineRead::Eof => return Err(Error::ScannerClosed { name: SOURCE_NAME }),
            LineRead::Truncated => {
                debug!(max = self.max_len, "Scanner line exceeded the payload limit");
                return Ok(Err(ScanFailure::Other("payload too long".to_string())));
            }
            LineRead::Complete => {}
        }

        let Ok(line) = std::str::from_utf8(&self.line) else {
            debug!("Scanner sent bytes that are not UTF-8");
            return Ok(Err(ScanFailure::Other("payload is not valid UTF-8".to_string())));
        };
        let text = line.trim();
        if text.is_empty() {
            return Ok(Err(ScanFailure::NoCodeFound));
        }
        if text.chars().any(char::is_control) {
            debug!("Scanner sent control characters");
            return Ok(Err(ScanFailure::Other("control characters in payload".to_string())));
        }
        Ok(Ok(text.to_string()))
    }

    fn release(&mut self) {
        self.acquired = false;
    }
}
