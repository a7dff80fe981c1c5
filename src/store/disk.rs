//! On-disk frame cache.

use image::ImageFormat;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::codec::{decode_frame, encode_frame};
use super::manifest::{CacheKey, FrameManifest, MANIFEST_FILE};
use super::{FrameStore, StoreError};
use crate::frame::{presentation_time, QuantizedFrame};

/// Layout of one source's cache directory.
///
/// ```text
/// <root>/frames/frame00000042.png     raw frames (pre-extract phase 1)
/// <root>/quantized/00000042.png       quantized frames
/// <root>/manifest.json                written last
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheDir {
    root: PathBuf,
}

impl CacheDir {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Cache directory for a source (local path or URL) under `cache_root`.
    pub fn for_source(cache_root: &Path, source: &str) -> Self {
        Self::new(cache_root.join(Self::hash_source(source)))
    }

    /// Deterministic directory name for a source.
    /// Returns a 32-character hex string (first 16 bytes of SHA256).
    pub fn hash_source(source: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        let result = hasher.finalize();
        hex::encode(&result[..16])
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn frames_dir(&self) -> PathBuf {
        self.root.join("frames")
    }

    pub fn quantized_dir(&self) -> PathBuf {
        self.root.join("quantized")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    /// Path of an extracted (not yet quantized) frame.
    pub fn raw_frame_path(&self, index: u64) -> PathBuf {
        self.frames_dir().join(format!("frame{:08}.png", index))
    }

    /// Manifest-relative path of a quantized frame.
    pub fn quantized_rel_path(index: u64) -> String {
        format!("quantized/{:08}.png", index)
    }

    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        std::fs::create_dir_all(self.frames_dir())?;
        std::fs::create_dir_all(self.quantized_dir())
    }
}

/// Frame store persisted as one PNG per frame.
///
/// Frame files are written under a temporary name and renamed, and the
/// manifest is only written by [`DiskStore::finalize`], so an interrupted
/// run never looks like a valid cache.
pub struct DiskStore {
    dir: CacheDir,
    key: CacheKey,
    source_fps: f64,
    /// `None` while a frame is being written
    entries: Mutex<BTreeMap<u64, Option<String>>>,
    manifest: Option<FrameManifest>,
    complete: AtomicBool,
}

impl DiskStore {
    /// Open an existing cache directory, reading its manifest if it has one.
    pub fn open(dir: CacheDir, key: CacheKey) -> Result<Self, StoreError> {
        let manifest = FrameManifest::load(&dir.manifest_path())?;
        let (entries, source_fps) = match &manifest {
            Some(m) => (
                m.frames
                    .iter()
                    .map(|(index, path)| (*index, Some(path.clone())))
                    .collect(),
                m.source_fps,
            ),
            None => (BTreeMap::new(), 0.0),
        };
        let complete = manifest.is_some();

        Ok(Self {
            dir,
            key,
            source_fps,
            entries: Mutex::new(entries),
            manifest,
            complete: AtomicBool::new(complete),
        })
    }

    /// Start a fresh cache for this session, invalidating whatever was there.
    pub fn create(dir: CacheDir, key: CacheKey, source_fps: f64) -> Result<Self, StoreError> {
        let manifest_path = dir.manifest_path();
        if manifest_path.exists() {
            std::fs::remove_file(&manifest_path)?;
            log::info!("Invalidated previous cache manifest {:?}", manifest_path);
        }
        let quantized = dir.quantized_dir();
        if quantized.exists() {
            std::fs::remove_dir_all(&quantized)?;
        }
        dir.ensure_dirs()?;

        Ok(Self {
            dir,
            key,
            source_fps,
            entries: Mutex::new(BTreeMap::new()),
            manifest: None,
            complete: AtomicBool::new(false),
        })
    }

    pub fn dir(&self) -> &CacheDir {
        &self.dir
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn source_fps(&self) -> f64 {
        self.source_fps
    }

    /// The manifest this store was opened with, if any.
    pub fn manifest(&self) -> Option<&FrameManifest> {
        self.manifest.as_ref()
    }

    /// Verify that the opened cache can serve this session.
    pub fn check(&self) -> Result<&FrameManifest, StoreError> {
        let manifest = self.manifest.as_ref().ok_or(StoreError::ManifestMissing)?;
        manifest.check(&self.key)?;
        Ok(manifest)
    }

    /// Write the manifest for every frame stored so far and mark the store
    /// complete. Call only after production has finished.
    pub fn finalize(&self) -> Result<FrameManifest, StoreError> {
        let frames: BTreeMap<u64, String> = self
            .lock_entries()
            .iter()
            .filter_map(|(index, path)| path.clone().map(|p| (*index, p)))
            .collect();
        let manifest = FrameManifest::new(&self.key, self.source_fps, frames);
        manifest.save(&self.dir.manifest_path())?;
        self.complete.store(true, Ordering::Release);

        log::info!(
            "Wrote cache manifest with {} frames to {:?}",
            manifest.frame_count,
            self.dir.manifest_path()
        );
        Ok(manifest)
    }

    /// Copy every cached frame into `target` (typically a [`MemoryStore`])
    /// so playback never decodes PNGs on the tick path.
    ///
    /// Frames that fail to decode are dropped and logged. Returns the number
    /// of frames loaded.
    ///
    /// [`MemoryStore`]: super::MemoryStore
    pub fn preload_into(
        &self,
        target: &dyn FrameStore,
        progress: &mut dyn FnMut(f64),
    ) -> Result<usize, StoreError> {
        let indices: Vec<u64> = self.lock_entries().keys().copied().collect();
        let total = indices.len().max(1) as f64;
        let mut loaded = 0;

        for (i, index) in indices.iter().enumerate() {
            match self.get(*index) {
                Ok(frame) => {
                    target.put(*index, Arc::unwrap_or_clone(frame))?;
                    loaded += 1;
                }
                Err(e) => log::warn!("Dropping cached frame {}: {}", index, e),
            }
            progress((i + 1) as f64 / total);
        }

        target.mark_complete();
        Ok(loaded)
    }

    fn lock_entries(&self) -> MutexGuard<'_, BTreeMap<u64, Option<String>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl FrameStore for DiskStore {
    fn put(&self, index: u64, frame: QuantizedFrame) -> Result<(), StoreError> {
        if frame.index() != index {
            return Err(StoreError::IndexMismatch {
                index,
                payload: frame.index(),
            });
        }
        if frame.width() != self.key.width || frame.height() != self.key.height {
            return Err(StoreError::DimensionMismatch {
                width: self.key.width,
                height: self.key.height,
                actual_width: frame.width(),
                actual_height: frame.height(),
            });
        }

        // Reserve the index so a second writer fails fast
        {
            let mut entries = self.lock_entries();
            if entries.contains_key(&index) {
                return Err(StoreError::DuplicateIndex(index));
            }
            entries.insert(index, None);
        }

        let rel = CacheDir::quantized_rel_path(index);
        let path = self.dir.root().join(&rel);
        let tmp = path.with_extension("png.tmp");
        let written = encode_frame(&frame)
            .save_with_format(&tmp, ImageFormat::Png)
            .map_err(StoreError::from)
            .and_then(|_| std::fs::rename(&tmp, &path).map_err(StoreError::from));

        let mut entries = self.lock_entries();
        match written {
            Ok(()) => {
                entries.insert(index, Some(rel));
                Ok(())
            }
            Err(e) => {
                entries.remove(&index);
                Err(e)
            }
        }
    }

    fn get(&self, index: u64) -> Result<Arc<QuantizedFrame>, StoreError> {
        let rel = self
            .lock_entries()
            .get(&index)
            .cloned()
            .flatten()
            .ok_or(StoreError::NotFound(index))?;

        let image = image::open(self.dir.root().join(rel))?.to_rgba8();
        let frame = decode_frame(&image, index, presentation_time(index, self.source_fps))?;
        Ok(Arc::new(frame))
    }

    fn count(&self) -> usize {
        self.lock_entries().values().filter(|p| p.is_some()).count()
    }

    fn highest(&self) -> Option<u64> {
        self.lock_entries()
            .iter()
            .rev()
            .find(|(_, path)| path.is_some())
            .map(|(index, _)| *index)
    }

    fn contains(&self, index: u64) -> bool {
        matches!(self.lock_entries().get(&index), Some(Some(_)))
    }

    fn mark_complete(&self) {
        self.complete.store(true, Ordering::Release);
    }

    fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    fn is_cached(&self, key: &CacheKey) -> bool {
        self.manifest.as_ref().is_some_and(|m| m.is_compatible(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Cell;
    use crate::glyph::{Charset, ColorMode};
    use std::time::Duration;
    use tempfile::TempDir;

    fn key() -> CacheKey {
        CacheKey {
            width: 2,
            height: 1,
            color: ColorMode::Off,
            charset: Charset::Standard,
            invert: false,
            stride: 1,
        }
    }

    fn frame(index: u64) -> QuantizedFrame {
        QuantizedFrame::new(
            index,
            presentation_time(index, 30.0),
            2,
            1,
            vec![Cell { glyph: '#', color: None }, Cell::default()],
        )
        .unwrap()
    }

    #[test]
    fn test_hash_source_deterministic() {
        let a = CacheDir::hash_source("/videos/movie.mp4");
        let b = CacheDir::hash_source("/videos/movie.mp4");
        let c = CacheDir::hash_source("/videos/other.mp4");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_cache_dir_layout() {
        let dir = CacheDir::new(PathBuf::from("/tmp/cache/abc"));
        assert_eq!(dir.frames_dir(), PathBuf::from("/tmp/cache/abc/frames"));
        assert_eq!(
            dir.raw_frame_path(42),
            PathBuf::from("/tmp/cache/abc/frames/frame00000042.png")
        );
        assert_eq!(CacheDir::quantized_rel_path(7), "quantized/00000007.png");
        assert_eq!(dir.manifest_path(), PathBuf::from("/tmp/cache/abc/manifest.json"));
    }

    #[test]
    fn test_unfinalized_store_is_not_cached() {
        let tmp = TempDir::new().unwrap();
        let dir = CacheDir::new(tmp.path().to_path_buf());
        let store = DiskStore::create(dir.clone(), key(), 30.0).unwrap();
        store.put(0, frame(0)).unwrap();

        let reopened = DiskStore::open(dir, key()).unwrap();
        assert!(!reopened.is_cached(&key()));
        assert!(matches!(reopened.check(), Err(StoreError::ManifestMissing)));
    }

    #[test]
    fn test_create_invalidates_existing_manifest() {
        let tmp = TempDir::new().unwrap();
        let dir = CacheDir::new(tmp.path().to_path_buf());
        let store = DiskStore::create(dir.clone(), key(), 30.0).unwrap();
        store.put(0, frame(0)).unwrap();
        store.finalize().unwrap();
        assert!(dir.manifest_path().exists());

        let _fresh = DiskStore::create(dir.clone(), key(), 30.0).unwrap();
        assert!(!dir.manifest_path().exists());
        assert!(!dir.root().join(CacheDir::quantized_rel_path(0)).exists());
    }

    #[test]
    fn test_put_rejects_wrong_dimensions() {
        let tmp = TempDir::new().unwrap();
        let dir = CacheDir::new(tmp.path().to_path_buf());
        let store = DiskStore::create(dir, key(), 30.0).unwrap();
        let wide = QuantizedFrame::new(0, Duration::ZERO, 3, 1, vec![Cell::default(); 3]).unwrap();
        assert!(matches!(
            store.put(0, wide),
            Err(StoreError::DimensionMismatch { .. })
        ));
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_put_duplicate() {
        let tmp = TempDir::new().unwrap();
        let store = DiskStore::create(CacheDir::new(tmp.path().to_path_buf()), key(), 30.0).unwrap();
        store.put(4, frame(4)).unwrap();
        assert!(matches!(store.put(4, frame(4)), Err(StoreError::DuplicateIndex(4))));
        assert_eq!(store.count(), 1);
        assert_eq!(store.highest(), Some(4));
        assert!(store.contains(4));
        assert!(!store.contains(3));
    }
}
