//! Cache manifest: the only record of whether a frame cache is usable.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::StoreError;
use crate::glyph::{Charset, ColorMode};

/// File name of the manifest inside a cache directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Bumped whenever the frame encoding or manifest layout changes.
pub const MANIFEST_VERSION: u32 = 1;

/// Session parameters a cache must have been captured with to be reused.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheKey {
    pub width: u16,
    pub height: u16,
    pub color: ColorMode,
    pub charset: Charset,
    pub invert: bool,
    /// Decimation stride (1 keeps every source frame)
    pub stride: u64,
}

/// A cache was captured with different session parameters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cached {field} is {cached}, this session needs {requested}")]
pub struct CacheMismatch {
    pub field: &'static str,
    pub cached: String,
    pub requested: String,
}

/// Persisted description of a complete frame cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameManifest {
    pub version: u32,
    pub width: u16,
    pub height: u16,
    pub color_enabled: bool,
    pub palette: String,
    pub charset: String,
    pub invert: bool,
    pub stride: u64,
    pub source_fps: f64,
    pub frame_count: u64,
    /// Frame index to file path, relative to the cache directory
    pub frames: BTreeMap<u64, String>,
}

impl FrameManifest {
    pub fn new(key: &CacheKey, source_fps: f64, frames: BTreeMap<u64, String>) -> Self {
        Self {
            version: MANIFEST_VERSION,
            width: key.width,
            height: key.height,
            color_enabled: key.color.is_enabled(),
            palette: key.color.name().to_string(),
            charset: key.charset.name().to_string(),
            invert: key.invert,
            stride: key.stride,
            source_fps,
            frame_count: frames.len() as u64,
            frames,
        }
    }

    /// Check that this cache was captured with the parameters in `key`.
    ///
    /// The first differing field is reported.
    pub fn check(&self, key: &CacheKey) -> Result<(), CacheMismatch> {
        fn differ<T: ToString + PartialEq>(
            field: &'static str,
            cached: T,
            requested: T,
        ) -> Result<(), CacheMismatch> {
            if cached == requested {
                Ok(())
            } else {
                Err(CacheMismatch {
                    field,
                    cached: cached.to_string(),
                    requested: requested.to_string(),
                })
            }
        }

        differ("manifest version", self.version, MANIFEST_VERSION)?;
        differ("width", self.width, key.width)?;
        differ("height", self.height, key.height)?;
        differ("color mode", self.color_enabled, key.color.is_enabled())?;
        differ("palette", self.palette.as_str(), key.color.name())?;
        differ("charset", self.charset.as_str(), key.charset.name())?;
        differ("invert", self.invert, key.invert)?;
        differ("frame stride", self.stride, key.stride)?;
        Ok(())
    }

    pub fn is_compatible(&self, key: &CacheKey) -> bool {
        self.check(key).is_ok()
    }

    /// Read a manifest, `Ok(None)` if there is none.
    pub fn load(path: &Path) -> Result<Option<Self>, StoreError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Write the manifest next to a temporary name and rename it into place,
    /// so readers never see a half-written manifest.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}
