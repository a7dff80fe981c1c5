//! Lock-free in-memory frame table.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use super::{FrameStore, StoreError};
use crate::frame::QuantizedFrame;

/// Frames per segment.
const SEGMENT_LEN: usize = 1024;

/// Segment table size; caps the store at ~4M frame indices (over 38 hours
/// at 30 fps).
const MAX_SEGMENTS: usize = 4096;

type Slot = OnceLock<Arc<QuantizedFrame>>;

/// Append-only, index-keyed frame table.
///
/// Each index is a write-once slot, so a reader either sees nothing or a
/// complete frame. Segments are allocated on first write, and the
/// `highest` watermark is only raised after the slot is published.
pub struct MemoryStore {
    segments: Box<[OnceLock<Box<[Slot]>>]>,
    count: AtomicUsize,
    /// Highest stored index + 1, 0 while empty
    watermark: AtomicU64,
    complete: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let segments = (0..MAX_SEGMENTS)
            .map(|_| OnceLock::new())
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            segments,
            count: AtomicUsize::new(0),
            watermark: AtomicU64::new(0),
            complete: AtomicBool::new(false),
        }
    }

    /// Largest index this store can hold.
    pub fn capacity() -> u64 {
        (SEGMENT_LEN * MAX_SEGMENTS) as u64
    }

    fn slot(&self, index: u64) -> Option<&Slot> {
        let index = usize::try_from(index).ok()?;
        let segment = self.segments.get(index / SEGMENT_LEN)?.get()?;
        segment.get(index % SEGMENT_LEN)
    }

    fn slot_or_alloc(&self, index: u64) -> Result<&Slot, StoreError> {
        let i = usize::try_from(index).map_err(|_| StoreError::CapacityExceeded(index))?;
        let segment = self
            .segments
            .get(i / SEGMENT_LEN)
            .ok_or(StoreError::CapacityExceeded(index))?
            .get_or_init(|| (0..SEGMENT_LEN).map(|_| OnceLock::new()).collect());
        Ok(&segment[i % SEGMENT_LEN])
    }
}

impl FrameStore for MemoryStore {
    fn put(&self, index: u64, frame: QuantizedFrame) -> Result<(), StoreError> {
        if frame.index() != index {
            return Err(StoreError::IndexMismatch {
                index,
                payload: frame.index(),
            });
        }

        let slot = self.slot_or_alloc(index)?;
        slot.set(Arc::new(frame))
            .map_err(|_| StoreError::DuplicateIndex(index))?;

        self.count.fetch_add(1, Ordering::AcqRel);
        self.watermark.fetch_max(index + 1, Ordering::AcqRel);
        Ok(())
    }

    fn get(&self, index: u64) -> Result<Arc<QuantizedFrame>, StoreError> {
        self.slot(index)
            .and_then(|slot| slot.get())
            .cloned()
            .ok_or(StoreError::NotFound(index))
    }

    fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    fn highest(&self) -> Option<u64> {
        match self.watermark.load(Ordering::Acquire) {
            0 => None,
            n => Some(n - 1),
        }
    }

    fn contains(&self, index: u64) -> bool {
        self.slot(index).is_some_and(|slot| slot.get().is_some())
    }

    fn mark_complete(&self) {
        self.complete.store(true, Ordering::Release);
    }

    fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Cell;
    use std::time::Duration;

    fn frame(index: u64) -> QuantizedFrame {
        QuantizedFrame::new(index, Duration::ZERO, 1, 1, vec![Cell::default()]).unwrap()
    }

    #[test]
    fn test_empty_store() {
        let store = MemoryStore::new();
        assert_eq!(store.count(), 0);
        assert_eq!(store.highest(), None);
        assert!(!store.is_complete());
        assert!(matches!(store.get(0), Err(StoreError::NotFound(0))));
    }

    #[test]
    fn test_put_get() {
        let store = MemoryStore::new();
        store.put(0, frame(0)).unwrap();
        store.put(5000, frame(5000)).unwrap();
        assert_eq!(store.count(), 2);
        assert_eq!(store.highest(), Some(5000));
        assert_eq!(store.get(5000).unwrap().index(), 5000);
        assert!(store.contains(0));
        assert!(!store.contains(1));
    }

    #[test]
    fn test_duplicate_rejected() {
        let store = MemoryStore::new();
        store.put(3, frame(3)).unwrap();
        assert!(matches!(store.put(3, frame(3)), Err(StoreError::DuplicateIndex(3))));
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_index_mismatch_rejected() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.put(2, frame(3)),
            Err(StoreError::IndexMismatch { index: 2, payload: 3 })
        ));
    }

    #[test]
    fn test_capacity() {
        let store = MemoryStore::new();
        let beyond = MemoryStore::capacity();
        assert!(matches!(
            store.put(beyond, frame(beyond)),
            Err(StoreError::CapacityExceeded(_))
        ));
        assert!(!store.contains(beyond));
    }

    #[test]
    fn test_mark_complete() {
        let store = MemoryStore::new();
        store.mark_complete();
        assert!(store.is_complete());
    }

    #[test]
    fn test_concurrent_puts_with_distinct_indices() {
        let store = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..4u64)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in (t..2000).step_by(4) {
                        store.put(i, frame(i)).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.count(), 2000);
        assert_eq!(store.highest(), Some(1999));
        assert!((0..2000).all(|i| store.get(i).map(|f| f.index()).ok() == Some(i)));
    }
}
