//! Reciter profiles and the built-in registry.

use crate::error::{PlaybackError, Result};
use serde::{Deserialize, Serialize};

/// A narrator whose recitation can be played.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReciterProfile {
    /// Stable key, persisted as the active reciter
    pub id: String,
    pub display_name: String,
    /// Folder on the audio host, e.g. `Alafasy_128kbps`
    pub remote_path_segment: String,
}

impl ReciterProfile {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        remote_path_segment: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            remote_path_segment: remote_path_segment.into(),
        }
    }
}

/// Settings key holding the id of the active reciter.
pub const ACTIVE_RECITER_KEY: &str = "activeReciterId";

const BUILT_IN: &[(&str, &str, &str)] = &[
    ("alafasy", "Mishary Rashid Alafasy", "Alafasy_128kbps"),
    ("abdulbasit", "Abdul Basit Abdus Samad", "Abdul_Basit_Murattal_192kbps"),
    ("husary", "Mahmoud Khalil Al-Husary", "Husary_128kbps"),
    ("minshawi", "Mohamed Siddiq El-Minshawi", "Minshawy_Murattal_128kbps"),
    ("sudais", "Abdur-Rahman As-Sudais", "Abdurrahmaan_As-Sudais_192kbps"),
    ("muaiqly", "Maher Al-Muaiqly", "Maher_AlMuaiqly_64kbps"),
    ("shuraym", "Saud Ash-Shuraim", "Saood_ash-Shuraym_128kbps"),
    ("ghamadi", "Saad Al-Ghamdi", "Ghamadi_40kbps"),
];

/// Static registry of reciters, looked up by id.
#[derive(Debug, Clone)]
pub struct ReciterRegistry {
    reciters: Vec<ReciterProfile>,
    default_index: usize,
}

impl ReciterRegistry {
    /// Registry with the built-in everyayah.com reciters.
    pub fn built_in() -> Self {
        let reciters = BUILT_IN
            .iter()
            .map(|(id, name, segment)| ReciterProfile::new(*id, *name, *segment))
            .collect();
        Self {
            reciters,
            default_index: 0,
        }
    }

    /// Registry over a custom list. The first entry is the default.
    pub fn new(reciters: Vec<ReciterProfile>) -> Result<Self> {
        if reciters.is_empty() {
            return Err(PlaybackError::Internal(
                "Reciter registry cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            reciters,
            default_index: 0,
        })
    }

    /// Change which reciter is used when nothing is persisted.
    pub fn with_default(mut self, id: &str) -> Result<Self> {
        self.default_index = self
            .reciters
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| PlaybackError::UnknownReciter(id.to_string()))?;
        Ok(self)
    }

    pub fn get(&self, id: &str) -> Result<&ReciterProfile> {
        self.reciters
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| PlaybackError::UnknownReciter(id.to_string()))
    }

    pub fn default_reciter(&self) -> &ReciterProfile {
        &self.reciters[self.default_index]
    }

    pub fn all(&self) -> &[ReciterProfile] {
        &self.reciters
    }
}

impl Default for ReciterRegistry {
    fn default() -> Self {
        Self::built_in()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_built_in_lookup() {
        let registry = ReciterRegistry::built_in();
        let husary = registry.get("husary").unwrap();
        assert_eq!(husary.remote_path_segment, "Husary_128kbps");
        assert_eq!(registry.default_reciter().id, "alafasy");
        assert_eq!(registry.all().len(), 8);
    }

    #[test]
    fn test_unknown_reciter() {
        let registry = ReciterRegistry::built_in();
        assert!(matches!(
            registry.get("nobody"),
            Err(PlaybackError::UnknownReciter(id)) if id == "nobody"
        ));
        assert!(registry.with_default("nobody").is_err());
    }

    #[test]
    fn test_custom_default() {
        let registry = ReciterRegistry::built_in().with_default("sudais").unwrap();
        assert_eq!(registry.default_reciter().display_name, "Abdur-Rahman As-Sudais");
    }

    #[test]
    fn test_empty_registry_rejected() {
        assert!(ReciterRegistry::new(Vec::new()).is_err());
    }
}
