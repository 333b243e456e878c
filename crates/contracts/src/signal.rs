//! Broadcast stop signals
//!
//! Two process-scoped flags shared by every component of a run:
//! `stop_requested` (graceful, drain to completion) and `fatal_error`
//! (abnormal, abort without draining). Both are write-once: there is no
//! clear operation within a run.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Set-once boolean flag, safe for concurrent set and read.
#[derive(Debug, Default)]
pub struct Signal(AtomicBool);

impl Signal {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Set the flag. Returns `true` only for the caller that flipped it.
    pub fn set(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Diagnostic context attached to the first fatal error of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FatalCause {
    /// Component that raised it (`producer`, `worker`, `writer`, ...)
    pub component: String,
    /// Originating source, when the cause is tied to one
    pub source_id: Option<String>,
    /// Underlying cause
    pub message: String,
}

impl FatalCause {
    pub fn new(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            source_id: None,
            message: message.into(),
        }
    }

    pub fn with_source(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }
}

impl fmt::Display for FatalCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source_id {
            Some(id) => write!(f, "{} [{}]: {}", self.component, id, self.message),
            None => write!(f, "{}: {}", self.component, self.message),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    stop_requested: Signal,
    fatal_error: Signal,
    fatal_cause: OnceLock<FatalCause>,
}

/// The pair of broadcast signals for one pipeline run.
///
/// Cloning is cheap and every clone observes the same flags.
#[derive(Debug, Clone, Default)]
pub struct Signals {
    inner: Arc<Inner>,
}

impl Signals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a graceful stop. Returns `true` if this call set the flag.
    pub fn request_stop(&self) -> bool {
        self.inner.stop_requested.set()
    }

    /// Raise the fatal flag. The first cause wins; later ones are dropped.
    ///
    /// The cause is stored before the flag is published, so any thread that
    /// observes `is_fatal()` can also read `fatal_cause()`.
    pub fn raise_fatal(&self, cause: FatalCause) -> bool {
        let _ = self.inner.fatal_cause.set(cause);
        self.inner.fatal_error.set()
    }

    #[inline]
    pub fn stop_requested(&self) -> bool {
        self.inner.stop_requested.is_set()
    }

    #[inline]
    pub fn is_fatal(&self) -> bool {
        self.inner.fatal_error.is_set()
    }

    /// Either signal is set
    #[inline]
    pub fn should_stop(&self) -> bool {
        self.stop_requested() || self.is_fatal()
    }

    pub fn fatal_cause(&self) -> Option<&FatalCause> {
        self.inner.fatal_cause.get()
    }
}
