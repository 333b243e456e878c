//! Batch reassembly table.
//!
//! Pre-sized to the expected item count `N`. Each slot is a `OnceLock`, so
//! concurrent writers to different slots never contend, and a second write
//! to the same slot is rejected. A separate counter tracks how many slots are
//! filled; it is incremented only after the slot write succeeds, so
//! `is_complete()` never runs ahead of the data.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use contracts::IndexedItem;

use crate::AcceptError;

/// Final state of a table after work has stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReassemblyOutcome<T> {
    /// Every slot in `[0, N)` written; values in index order
    Complete(Vec<T>),
    /// Gaps remain. `present` is in index order.
    Incomplete {
        missing: Vec<u64>,
        present: Vec<IndexedItem<T>>,
    },
}

impl<T> ReassemblyOutcome<T> {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }

    pub fn missing(&self) -> &[u64] {
        match self {
            Self::Complete(_) => &[],
            Self::Incomplete { missing, .. } => missing,
        }
    }
}

/// Write-once table indexed by sequence number
pub struct ReassemblyTable<T> {
    slots: Box<[OnceLock<T>]>,
    filled: AtomicUsize,
}

impl<T> fmt::Debug for ReassemblyTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReassemblyTable")
            .field("len", &self.slots.len())
            .field("filled", &self.filled())
            .finish()
    }
}

impl<T> ReassemblyTable<T> {
    pub fn new(len: usize) -> Self {
        Self {
            slots: (0..len).map(|_| OnceLock::new()).collect(),
            filled: AtomicUsize::new(0),
        }
    }

    /// Expected item count `N`
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn filled(&self) -> usize {
        self.filled.load(Ordering::Acquire)
    }

    /// Write `item.value` into slot `item.index`.
    ///
    /// # Errors
    /// `OutOfRange` outside `[0, N)`, `Duplicate` if the slot is already written.
    /// The rejected value is dropped.
    pub fn accept(&self, item: IndexedItem<T>) -> Result<(), AcceptError> {
        let slot = usize::try_from(item.index)
            .ok()
            .and_then(|i| self.slots.get(i))
            .ok_or(AcceptError::OutOfRange {
                index: item.index,
                len: self.slots.len() as u64,
            })?;

        slot.set(item.value)
            .map_err(|_| AcceptError::Duplicate { index: item.index })?;
        self.filled.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.filled() == self.slots.len()
    }

    pub fn contains(&self, index: u64) -> bool {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.slots.get(i))
            .is_some_and(|slot| slot.get().is_some())
    }

    /// Indices not yet written, ascending
    pub fn missing(&self) -> Vec<u64> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.get().is_none())
            .map(|(i, _)| i as u64)
            .collect()
    }

    /// Consume the table into its ordered result.
    pub fn into_outcome(self) -> ReassemblyOutcome<T> {
        let complete = self.is_complete();
        let slots = self.slots.into_vec().into_iter().map(OnceLock::into_inner);

        if complete {
            return ReassemblyOutcome::Complete(slots.flatten().collect());
        }

        let mut missing = Vec::new();
        let mut present = Vec::new();
        for (index, value) in slots.enumerate() {
            match value {
                Some(value) => present.push(IndexedItem::new(index as u64, value)),
                None => missing.push(index as u64),
            }
        }
        ReassemblyOutcome::Incomplete { missing, present }
    }
}
