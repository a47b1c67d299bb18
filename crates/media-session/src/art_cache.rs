//! Album art disk cache
//!
//! Thumbnails are stored once per track identity as
//! `<cache_dir>/<16-hex-hash>.png`. Files are keyed by (title, artist, album),
//! never by image content, and are never updated or deleted here.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use rhythm_core::TrackKey;
use thiserror::Error;
use tracing::{debug, warn};

use crate::ThumbnailRef;

/// Largest thumbnail payload accepted from a session (8 MiB)
pub const MAX_ALBUM_ART_BYTES: u64 = 8 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ArtError {
    #[error("session has no thumbnail")]
    NoThumbnail,

    #[error("album art cache is disabled")]
    CacheDisabled,

    #[error("thumbnail is empty")]
    Empty,

    #[error("thumbnail too large: {size} bytes (max {max})", max = MAX_ALBUM_ART_BYTES)]
    TooLarge { size: u64 },

    #[error("short thumbnail read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to check {}: {source}", path.display())]
    Probe {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("thumbnail source error: {0:#}")]
    Source(#[from] anyhow::Error),
}

/// Best-effort, content-addressed-by-track store for thumbnails
#[derive(Debug, Clone)]
pub struct AlbumArtCache {
    dir: Option<PathBuf>,
}

impl AlbumArtCache {
    /// Use `dir` as cache root, creating it if needed.
    ///
    /// If the directory cannot be created the cache is disabled for good.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        match fs::create_dir_all(&dir) {
            Ok(()) => {
                debug!("Album art cache at {}", dir.display());
                Self { dir: Some(dir) }
            }
            Err(e) => {
                warn!(
                    "Failed to create album art cache {}: {}; album art disabled",
                    dir.display(),
                    e
                );
                Self::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        Self { dir: None }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    /// Where the art for `track` lives (or would live)
    pub fn path_for(&self, track: &TrackKey) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.png", track.cache_stem())))
    }

    /// Cached art path for `track`, fetching the thumbnail if needed.
    ///
    /// Failures are logged and reported as `None`.
    pub fn resolve(&self, track: &TrackKey, thumbnail: Option<&dyn ThumbnailRef>) -> Option<PathBuf> {
        match self.fetch(track, thumbnail) {
            Ok(path) => Some(path),
            Err(ArtError::NoThumbnail) => {
                debug!("No thumbnail for {}", track);
                None
            }
            Err(ArtError::CacheDisabled) => None,
            Err(e) => {
                warn!("Album art unavailable for {}: {}", track, e);
                None
            }
        }
    }

    /// Like [`resolve`](Self::resolve), but reports why art is missing
    pub fn fetch(
        &self,
        track: &TrackKey,
        thumbnail: Option<&dyn ThumbnailRef>,
    ) -> Result<PathBuf, ArtError> {
        let thumbnail = thumbnail.ok_or(ArtError::NoThumbnail)?;
        let path = self.path_for(track).ok_or(ArtError::CacheDisabled)?;

        let exists = path.try_exists().map_err(|source| ArtError::Probe {
            path: path.clone(),
            source,
        })?;
        if exists {
            debug!("Album art cache hit: {}", path.display());
            return Ok(path);
        }

        let mut stream = thumbnail.open_read()?;
        let size = stream.size()?;
        if size == 0 {
            return Err(ArtError::Empty);
        }
        if size > MAX_ALBUM_ART_BYTES {
            return Err(ArtError::TooLarge { size });
        }

        let expected = u32::try_from(size).map_err(|_| ArtError::TooLarge { size })?;
        let bytes = stream.read_exact_len(expected)?;
        if bytes.len() != expected as usize {
            return Err(ArtError::ShortRead {
                expected: expected as usize,
                actual: bytes.len(),
            });
        }

        write_file(&path, &bytes)?;
        debug!("Cached {} bytes of album art at {}", bytes.len(), path.display());
        Ok(path)
    }
}

/// Write through a `.part` file so the final path only ever holds a complete image
fn write_file(path: &Path, bytes: &[u8]) -> Result<(), ArtError> {
    let mut part = path.as_os_str().to_owned();
    part.push(".part");
    let part = PathBuf::from(part);

    let result = fs::File::create(&part)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
        .and_then(|_| fs::rename(&part, path));

    result.map_err(|source| {
        let _ = fs::remove_file(&part);
        ArtError::Write {
            path: path.to_path_buf(),
            source,
        }
    })
}
