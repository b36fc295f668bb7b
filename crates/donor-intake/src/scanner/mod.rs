//! QR acquisition.
//!
//! A [`ScanSource`] is the external device that decodes codes; this module
//! only turns its output into donor identifiers. Sources are opened through
//! [`Scanner::open`], which hands back a [`ScanSession`] guard. The device is
//! released when the guard drops, whichever way the screen is left.
//!
//! # Example
//!
//! ```
//! use donor_intake::scanner::extract_donor_id;
//!
//! let id = extract_donor_id("https://donate.example.org/donor/12345").unwrap();
//! assert_eq!(id.as_str(), "12345");
//! ```

mod wedge;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info, trace};
use url::Url;

use crate::config::ScannerConfig;
use crate::donor::DonorId;
use crate::error::Result;

pub use wedge::KeyboardWedgeSource;
pub(crate) use wedge::{read_bounded_line, LineRead};

/// Why a decode attempt produced no identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanFailure {
    /// The frame held no code at all. Routine while nobody is scanning.
    NoCodeFound,
    /// Something was read but it is not a donor code.
    Other(String),
}

impl ScanFailure {
    /// The message shown under the scanner.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NoCodeFound => {
                "No QR code was found. Please hold the code in front of the scanner and try again."
            }
            Self::Other(_) => "Something went wrong while scanning the QR code. Please try again.",
        }
    }
}

/// The result of one decode attempt: the decoded text, or why there was none.
pub type ScanAttempt = std::result::Result<String, ScanFailure>;

/// A device that decodes QR codes.
#[async_trait]
pub trait ScanSource: Send {
    /// The name of this source (for logging).
    fn name(&self) -> &'static str;

    /// Claim the device.
    ///
    /// # Errors
    ///
    /// Returns an error if the device is unavailable.
    async fn acquire(&mut self) -> Result<()>;

    /// Wait for the next decode attempt.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ScannerClosed`] once the device stops producing
    /// input, or an I/O error.
    async fn next_attempt(&mut self) -> Result<ScanAttempt>;

    /// Give the device back. Called exactly once per successful `acquire`.
    fn release(&mut self);
}

/// What a scan session produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// A donor code was read.
    Decoded(DonorId),
    /// An attempt failed; scanning continues.
    Failed(ScanFailure),
}

/// Opens scan sessions with shared settings.
#[derive(Debug, Clone)]
pub struct Scanner {
    debounce: Duration,
    max_payload_len: usize,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::from_config(&ScannerConfig::default())
    }
}

impl Scanner {
    /// Create a scanner from the `[scanner]` configuration section.
    #[must_use]
    pub fn from_config(config: &ScannerConfig) -> Self {
        Self {
            debounce: Duration::from_millis(config.debounce_ms),
            max_payload_len: config.max_payload_len,
        }
    }

    /// The longest decoded payload accepted, in bytes.
    #[must_use]
    pub fn max_payload_len(&self) -> usize {
        self.max_payload_len
    }

    /// Acquire `source` and start a session over it.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be acquired; nothing needs to be
    /// released in that case.
    pub async fn open<S: ScanSource>(&self, mut source: S) -> Result<ScanSession<S>> {
        source.acquire().await?;
        info!(source = source.name(), "Scanner opened");
        Ok(ScanSession {
            source,
            debounce: self.debounce,
            max_payload_len: self.max_payload_len,
            last_decoded: None,
        })
    }
}

/// An open scanner. Releases the device when dropped.
#[derive(Debug)]
pub struct ScanSession<S: ScanSource> {
    source: S,
    debounce: Duration,
    max_payload_len: usize,
    last_decoded: Option<(String, Instant)>,
}

impl<S: ScanSource> ScanSession<S> {
    /// Wait for the next meaningful event.
    ///
    /// Repeats of the code just read are swallowed for the debounce window.
    ///
    /// # Errors
    ///
    /// Returns an error only when the device itself goes away or fails.
    /// Dropping the future while it waits is safe; dropping the session
    /// releases the device.
    pub async fn next_event(&mut self) -> Result<ScanEvent> {
        loop {
            let attempt = self.source.next_attempt().await?;

            let text = match attempt {
                Ok(text) => text,
                Err(failure) => {
                    trace!(?failure, "Decode attempt failed");
                    return Ok(ScanEvent::Failed(failure));
                }
            };

            if text.len() > self.max_payload_len {
                debug!(
                    len = text.len(),
                    max = self.max_payload_len,
                    "Decoded payload too long"
                );
                return Ok(ScanEvent::Failed(ScanFailure::Other(
                    "payload too long".to_string(),
                )));
            }

            if self.is_repeat(&text) {
                trace!("Ignoring repeated scan");
                continue;
            }
            self.last_decoded = Some((text.clone(), Instant::now()));

            return Ok(match extract_donor_id(&text) {
                Some(id) => {
                    info!(donor_id = %id, "Donor code scanned");
                    ScanEvent::Decoded(id)
                }
                None => {
                    debug!("Decoded text is not a donor code");
                    ScanEvent::Failed(ScanFailure::Other("not a donor code".to_string()))
                }
            });
        }
    }

    fn is_repeat(&self, text: &str) -> bool {
        self.last_decoded
            .as_ref()
            .is_some_and(|(last, at)| last == text && at.elapsed() < self.debounce)
    }
}

impl<S: ScanSource> Drop for ScanSession<S> {
    fn drop(&mut self) {
        self.source.release();
        info!(source = self.source.name(), "Scanner released");
    }
}

/// Extract a donor identifier from decoded QR text.
///
/// An absolute URL yields its last non-empty path segment; anything else is
/// taken as the identifier itself.
#[must_use]
pub fn extract_donor_id(decoded: &str) -> Option<DonorId> {
    let text = decoded.trim();
    match Url::parse(text) {
        Ok(url) if !url.cannot_be_a_base() => url
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .and_then(|segment| DonorId::parse(segment).ok()),
        _ => DonorId::parse(text).ok(),
    }
}

/// The QR payload printed on a donor card: `<site>/donor/<id>`.
#[must_use]
pub fn donor_payload_url(site_base: &Url, id: &DonorId) -> Url {
    let mut url = site_base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(["donor", id.as_str()]);
    }
    url
}
