//! Single-slot latest-value holder.

use contracts::IndexedItem;

/// Last-writer-wins slot with a "has value" flag.
///
/// Owned by the render loop; producers reach it only through channels.
#[derive(Debug, Clone)]
pub struct LatestSlot<T> {
    value: Option<IndexedItem<T>>,
    overwritten: u64,
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self {
            value: None,
            overwritten: 0,
        }
    }
}

impl<T> LatestSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite unconditionally and mark present.
    pub fn accept(&mut self, item: IndexedItem<T>) {
        if self.value.replace(item).is_some() {
            self.overwritten += 1;
        }
    }

    /// Take the value if present, leaving the slot absent.
    pub fn consume_if_present(&mut self) -> Option<IndexedItem<T>> {
        self.value.take()
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    pub fn peek(&self) -> Option<&IndexedItem<T>> {
        self.value.as_ref()
    }

    /// Values replaced before anyone consumed them
    pub fn overwritten(&self) -> u64 {
        self.overwritten
    }
}
