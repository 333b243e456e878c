//! DataSource trait - producer data source abstraction
//!
//! A source is opened once by its producer thread, read until it stops
//! yielding, then closed. The handle is owned by that one thread for the
//! whole run.

use crate::{SourceError, SourceId};

/// How the pipeline classifies running out of data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exhaustion {
    /// Expected end (file reader): request a graceful stop
    Graceful,
    /// Abnormal end (camera): raise the fatal signal
    Fatal,
    /// Only this producer ends; the rest of the run carries on
    Quiet,
}

/// Data source capability: `{open, read_next, close}`
///
/// Implemented by simulated sensors, camera capture and file frame readers.
/// `Producer` is generic over this trait, never over a concrete source.
pub trait DataSource: Send {
    /// Item produced per read
    type Item: Send + 'static;

    /// Resource acquired by `open` and released by `close`
    type Handle: Send;

    fn source_id(&self) -> &SourceId;

    /// Severity of `EndOfStream` and read failures for this source
    fn exhaustion(&self) -> Exhaustion;

    /// Total item count when known before reading (frame count of a file)
    fn expected_len(&self) -> Option<u64> {
        None
    }

    /// Acquire the underlying resource
    ///
    /// # Errors
    /// `SourceError::Open` when the resource is unavailable.
    fn open(&mut self) -> Result<Self::Handle, SourceError>;

    /// Read one item. May block (timed delay, device read, file read).
    ///
    /// # Errors
    /// `SourceError::EndOfStream` when exhausted, `SourceError::Read` on failure.
    fn read_next(&mut self, handle: &mut Self::Handle) -> Result<Self::Item, SourceError>;

    /// Release the resource. Called exactly once per successful `open`.
    fn close(&mut self, handle: Self::Handle);
}
