//! In-memory finite source with a known length.

use std::time::Duration;

use contracts::{DataSource, Exhaustion, SourceError, SourceId};

/// Yields a fixed list of items once, optionally pausing between reads.
#[derive(Debug, Clone)]
pub struct IterSource<T> {
    id: SourceId,
    items: Option<Vec<T>>,
    len: u64,
    exhaustion: Exhaustion,
    pause: Duration,
}

impl<T> IterSource<T> {
    pub fn new(id: impl Into<SourceId>, items: Vec<T>) -> Self {
        Self {
            id: id.into(),
            len: items.len() as u64,
            items: Some(items),
            exhaustion: Exhaustion::Graceful,
            pause: Duration::ZERO,
        }
    }

    pub fn with_exhaustion(mut self, exhaustion: Exhaustion) -> Self {
        self.exhaustion = exhaustion;
        self
    }

    /// Sleep before each read
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }
}

impl<T: Send + 'static> DataSource for IterSource<T> {
    type Item = T;
    type Handle = std::vec::IntoIter<T>;

    fn source_id(&self) -> &SourceId {
        &self.id
    }

    fn exhaustion(&self) -> Exhaustion {
        self.exhaustion
    }

    fn expected_len(&self) -> Option<u64> {
        Some(self.len)
    }

    fn open(&mut self) -> Result<Self::Handle, SourceError> {
        self.items
            .take()
            .map(Vec::into_iter)
            .ok_or_else(|| SourceError::open(&self.id, "already consumed"))
    }

    fn read_next(&mut self, handle: &mut Self::Handle) -> Result<T, SourceError> {
        if !self.pause.is_zero() {
            std::thread::sleep(self.pause);
        }
        handle
            .next()
            .ok_or_else(|| SourceError::end_of_stream(&self.id))
    }

    fn close(&mut self, _: Self::Handle) {}
}
