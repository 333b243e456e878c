//! In-memory sinks. Cloning shares the underlying buffer, so a test can keep a
//! clone while the pipeline owns the other.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use contracts::{BatchSink, LiveSink, LiveView, WriteError};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Batch sink that keeps the ordered sequence in memory
#[derive(Debug)]
pub struct MemorySink<T> {
    name: String,
    items: Arc<Mutex<Option<Vec<T>>>>,
}

impl<T> Clone for MemorySink<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            items: Arc::clone(&self.items),
        }
    }
}

impl<T: Clone> MemorySink<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Arc::new(Mutex::new(None)),
        }
    }

    /// `None` until `write_ordered` has been called
    pub fn items(&self) -> Option<Vec<T>> {
        lock(&self.items).clone()
    }

    pub fn was_written(&self) -> bool {
        lock(&self.items).is_some()
    }
}

impl<T: Clone + Send> BatchSink<T> for MemorySink<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn write_ordered(&mut self, items: &[T]) -> Result<(), WriteError> {
        let mut slot = lock(&self.items);
        if slot.is_some() {
            return Err(WriteError::new(&self.name, "sequence already written"));
        }
        *slot = Some(items.to_vec());
        Ok(())
    }
}

/// Live sink that records every rendered view
#[derive(Debug, Clone, Default)]
pub struct RecordingLiveSink {
    views: Arc<Mutex<Vec<LiveView>>>,
    closed: Arc<Mutex<bool>>,
}

impl RecordingLiveSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn views(&self) -> Vec<LiveView> {
        lock(&self.views).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.views).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last(&self) -> Option<LiveView> {
        lock(&self.views).last().cloned()
    }

    pub fn is_closed(&self) -> bool {
        *lock(&self.closed)
    }
}

impl LiveSink for RecordingLiveSink {
    fn name(&self) -> &str {
        "recording"
    }

    fn render(&mut self, view: &LiveView) {
        lock(&self.views).push(view.clone());
    }

    fn close(&mut self) {
        *lock(&self.closed) = true;
    }
}
