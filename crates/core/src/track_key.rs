//! Track identity
//!
//! A track is identified by its (title, artist, album) text. The identity is
//! used to notice track changes and to name cached album art, so the hash must
//! be stable across processes: FNV-1a 64, not `std`'s randomly seeded hasher.

use std::fmt;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a 64-bit over raw bytes
pub fn fnv1a64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// (title, artist, album) identity of a track
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct TrackKey {
    title: String,
    artist: String,
    album: String,
}

impl TrackKey {
    pub fn new(title: &str, artist: &str, album: &str) -> Self {
        Self {
            title: title.to_string(),
            artist: artist.to_string(),
            album: album.to_string(),
        }
    }

    /// Human readable key, `title|artist|album`
    pub fn song_key(&self) -> String {
        format!("{}|{}|{}", self.title, self.artist, self.album)
    }

    /// Stable 64-bit hash of the identity (fields joined by `\n`)
    pub fn stable_hash(&self) -> u64 {
        let combined = format!("{}\n{}\n{}", self.title, self.artist, self.album);
        fnv1a64(combined.as_bytes())
    }

    /// 16 lowercase hex characters, used as the album art file stem
    pub fn cache_stem(&self) -> String {
        format!("{:016x}", self.stable_hash())
    }

    /// True when all three fields are empty
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.artist.is_empty() && self.album.is_empty()
    }
}

impl fmt::Display for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.song_key())
    }
}
