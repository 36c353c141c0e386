//! Cache keys, namespaces and remote URLs for verse audio.

use std::fmt;

/// Structured identity of a cached verse.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AudioCacheKey {
    pub reciter_id: String,
    pub surah_id: u16,
    pub verse_id: u16,
}

impl AudioCacheKey {
    pub fn new(reciter_id: impl Into<String>, surah_id: u16, verse_id: u16) -> Self {
        Self {
            reciter_id: reciter_id.into(),
            surah_id,
            verse_id,
        }
    }

    /// Entry key inside the reciter's cache, `SSSVVV`.
    pub fn entry_key(&self) -> String {
        verse_code(self.surah_id, self.verse_id)
    }

    /// Name of the reciter's cache.
    pub fn namespace(&self, prefix: &str) -> String {
        namespace(prefix, &self.reciter_id)
    }
}

impl fmt::Display for AudioCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.reciter_id, self.entry_key())
    }
}

/// `SSSVVV`, surah and verse zero-padded to three digits.
pub fn verse_code(surah_id: u16, verse_id: u16) -> String {
    format!("{:03}{:03}", surah_id, verse_id)
}

pub fn namespace(prefix: &str, reciter_id: &str) -> String {
    format!("{}{}", prefix, reciter_id)
}

/// Splits an `SSSVVV` entry key back into `(surah, verse)`.
pub fn parse_entry_key(key: &str) -> Option<(u16, u16)> {
    if key.len() != 6 || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let surah = key[..3].parse().ok()?;
    let verse = key[3..].parse().ok()?;
    Some((surah, verse))
}

/// `<host>/data/<segment>/<SSSVVV>.mp3`
pub fn remote_url(audio_host: &str, path_segment: &str, surah_id: u16, verse_id: u16) -> String {
    format!(
        "{}/data/{}/{}.mp3",
        audio_host.trim_end_matches('/'),
        path_segment,
        verse_code(surah_id, verse_id)
    )
}
