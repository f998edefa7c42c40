use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use super::settings::SettingsValue;

/// One TeX expression to convert, with the options and anchors it was written with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    tex: String,
    /// Per-request options; empty means "use the configured default".
    pub settings: Option<SettingsValue>,
    /// Formula label; labelled output links to the formula page.
    pub label: Option<String>,
    /// Element id for in-page references such as `Page#equation2`.
    pub tag_id: Option<String>,
    pub force_refresh: bool,
}

impl RenderRequest {
    pub fn new(tex: impl Into<String>) -> Self {
        Self {
            tex: tex.into(),
            settings: None,
            label: None,
            tag_id: None,
            force_refresh: false,
        }
    }

    pub fn with_settings(mut self, settings: SettingsValue) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_tag_id(mut self, tag_id: impl Into<String>) -> Self {
        self.tag_id = Some(tag_id.into());
        self
    }

    pub fn with_force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }

    pub fn tex(&self) -> &str {
        &self.tex
    }
}

/// Cache key derived from the TeX source and the encoded settings it renders with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn compute(tex: &str, encoded_settings: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(tex.as_bytes());
        hasher.update([0u8]);
        hasher.update(encoded_settings.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored conversion result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub tex: String,
    pub mathml: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl CacheEntry {
    pub fn new(tex: impl Into<String>, mathml: impl Into<String>, label: Option<String>) -> Self {
        Self {
            tex: tex.into(),
            mathml: mathml.into(),
            label,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_depends_on_tex_and_settings() {
        let base = Fingerprint::compute("x^2", "format=xhtml");

        assert_eq!(base, Fingerprint::compute("x^2", "format=xhtml"));
        assert_ne!(base, Fingerprint::compute("x^3", "format=xhtml"));
        assert_ne!(base, Fingerprint::compute("x^2", "format=html5"));
        assert_eq!(base.as_str().len(), 64);
    }

    #[test]
    fn fingerprint_separates_tex_from_settings() {
        assert_ne!(
            Fingerprint::compute("ab", "c"),
            Fingerprint::compute("a", "bc")
        );
    }

    #[test]
    fn cache_entry_round_trips_through_json() {
        let entry = CacheEntry::new("x", "<math><mi>x</mi></math>", Some("eq1".into()));
        let json = serde_json::to_string(&entry).expect("serialize entry");
        let restored: CacheEntry = serde_json::from_str(&json).expect("deserialize entry");

        assert_eq!(restored.mathml, entry.mathml);
        assert_eq!(restored.label.as_deref(), Some("eq1"));
        assert_eq!(restored.timestamp.unix_timestamp(), entry.timestamp.unix_timestamp());
    }
}
