//! Frame store: the ordered collection of quantized frames.
//!
//! Two backings share the [`FrameStore`] contract:
//! - [`MemoryStore`] - write-once slots keyed by frame index, readable
//!   without locks while the producer is still filling it
//! - [`DiskStore`] - one PNG per frame under a cache directory, with a
//!   [`FrameManifest`] written only once every frame is on disk

mod codec;
mod disk;
mod manifest;
mod memory;

use std::sync::Arc;

use crate::frame::QuantizedFrame;

pub use codec::{decode_frame, encode_frame};
pub use disk::{CacheDir, DiskStore};
pub use manifest::{CacheKey, CacheMismatch, FrameManifest, MANIFEST_FILE, MANIFEST_VERSION};
pub use memory::MemoryStore;

/// Errors raised by frame store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("frame {0} not found")]
    NotFound(u64),

    #[error("frame {0} was already stored")]
    DuplicateIndex(u64),

    #[error("frame index {index} does not match frame payload index {payload}")]
    IndexMismatch { index: u64, payload: u64 },

    #[error("frame index {0} exceeds store capacity")]
    CapacityExceeded(u64),

    #[error("frame is {actual_width}x{actual_height}, store expects {width}x{height}")]
    DimensionMismatch {
        width: u16,
        height: u16,
        actual_width: u16,
        actual_height: u16,
    },

    #[error("corrupt cached frame {index}: {reason}")]
    Corrupt { index: u64, reason: String },

    #[error("cache manifest is missing")]
    ManifestMissing,

    #[error(transparent)]
    Mismatch(#[from] CacheMismatch),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("manifest error: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared contract of both store backings.
///
/// `put` may be called concurrently with distinct indices and concurrently
/// with `get`; `get` only ever returns completely written frames.
pub trait FrameStore: Send + Sync {
    /// Store the frame for `index`. Each index can be written once.
    fn put(&self, index: u64, frame: QuantizedFrame) -> Result<(), StoreError>;

    /// Fetch a stored frame.
    fn get(&self, index: u64) -> Result<Arc<QuantizedFrame>, StoreError>;

    /// Number of frames stored so far.
    fn count(&self) -> usize;

    /// Highest index stored so far.
    fn highest(&self) -> Option<u64>;

    /// Whether `index` has been stored.
    fn contains(&self, index: u64) -> bool {
        self.get(index).is_ok()
    }

    /// Producer signal: no more frames will be stored.
    fn mark_complete(&self);

    fn is_complete(&self) -> bool;

    /// Whether a persisted cache exists and matches `key`.
    fn is_cached(&self, _key: &CacheKey) -> bool {
        false
    }
}

impl<S: FrameStore + ?Sized> FrameStore for Arc<S> {
    fn put(&self, index: u64, frame: QuantizedFrame) -> Result<(), StoreError> {
        (**self).put(index, frame)
    }

    fn get(&self, index: u64) -> Result<Arc<QuantizedFrame>, StoreError> {
        (**self).get(index)
    }

    fn count(&self) -> usize {
        (**self).count()
    }

    fn highest(&self) -> Option<u64> {
        (**self).highest()
    }

    fn contains(&self, index: u64) -> bool {
        (**self).contains(index)
    }

    fn mark_complete(&self) {
        (**self).mark_complete()
    }

    fn is_complete(&self) -> bool {
        (**self).is_complete()
    }

    fn is_cached(&self, key: &CacheKey) -> bool {
        (**self).is_cached(key)
    }
}
