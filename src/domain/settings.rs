//! LaTeXML conversion options and their query-string encoding.
//!
//! Options are either an already-encoded string, handed to the daemon as is,
//! or an ordered mapping from option name to one or more values. Mappings
//! encode to `key=value` pairs where multi-valued options repeat the key, the
//! shape LaTeXML expects for flags such as `preload`:
//!
//! ```text
//! preload=amsmath.sty&preload=amsthm.sty
//! ```

use std::borrow::Cow;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use url::form_urlencoded;

static ARRAY_INDEX_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%5B\d+%5D").expect("array index pattern must compile"));

/// A single option value: one string or an ordered list of strings.
///
/// Numbers and booleans are accepted when deserializing and kept in their
/// query-string form (`true` is `1`, `false` is `0`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SettingEntry {
    One(String),
    Many(Vec<String>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Flag(bool),
    Integer(i64),
    Float(f64),
}

impl From<Scalar> for String {
    fn from(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Text(text) => text,
            Scalar::Flag(true) => "1".to_string(),
            Scalar::Flag(false) => "0".to_string(),
            Scalar::Integer(value) => value.to_string(),
            Scalar::Float(value) => value.to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSettingEntry {
    One(Scalar),
    Many(Vec<Scalar>),
}

impl<'de> Deserialize<'de> for SettingEntry {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match RawSettingEntry::deserialize(deserializer)? {
            RawSettingEntry::One(value) => SettingEntry::One(value.into()),
            RawSettingEntry::Many(values) => {
                SettingEntry::Many(values.into_iter().map(String::from).collect())
            }
        })
    }
}

impl SettingEntry {
    fn values(&self) -> &[String] {
        match self {
            SettingEntry::One(value) => std::slice::from_ref(value),
            SettingEntry::Many(values) => values.as_slice(),
        }
    }
}

impl From<&str> for SettingEntry {
    fn from(value: &str) -> Self {
        SettingEntry::One(value.to_string())
    }
}

impl From<Vec<&str>> for SettingEntry {
    fn from(values: Vec<&str>) -> Self {
        SettingEntry::Many(values.into_iter().map(str::to_string).collect())
    }
}

/// Conversion options sent alongside every TeX expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingsValue {
    /// Pre-encoded query string.
    Encoded(String),
    /// Option name to value(s), kept in insertion order.
    Options(IndexMap<String, SettingEntry>),
}

impl SettingsValue {
    pub fn options<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<SettingEntry>,
    {
        SettingsValue::Options(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    /// Empty strings and empty mappings carry no options.
    pub fn is_empty(&self) -> bool {
        match self {
            SettingsValue::Encoded(raw) => raw.is_empty(),
            SettingsValue::Options(map) => map.is_empty(),
        }
    }

    /// Encode to the query-string fragment posted to the daemon.
    ///
    /// Encoded strings pass through untouched, so serializing is idempotent.
    pub fn serialize(&self) -> Cow<'_, str> {
        match self {
            SettingsValue::Encoded(raw) => Cow::Borrowed(raw.as_str()),
            SettingsValue::Options(map) => {
                let mut serializer = form_urlencoded::Serializer::new(String::new());
                for (key, entry) in map {
                    for value in entry.values() {
                        serializer.append_pair(key, value);
                    }
                }
                let encoded = serializer.finish();
                match ARRAY_INDEX_SUFFIX.replace_all(&encoded, "") {
                    Cow::Borrowed(_) => Cow::Owned(encoded),
                    Cow::Owned(stripped) => Cow::Owned(stripped),
                }
            }
        }
    }
}

impl Default for SettingsValue {
    fn default() -> Self {
        SettingsValue::Encoded(String::new())
    }
}

impl From<&str> for SettingsValue {
    fn from(raw: &str) -> Self {
        SettingsValue::Encoded(raw.to_string())
    }
}

/// Pick the per-request settings when they carry options, the default otherwise.
pub fn resolve_settings(instance: Option<&SettingsValue>, default: &SettingsValue) -> SettingsValue {
    match instance {
        Some(value) if !value.is_empty() => value.clone(),
        _ => default.clone(),
    }
}

/// Build the form body for a conversion request: encoded settings, then `tex`.
pub fn post_data(tex: &str, settings: &SettingsValue) -> String {
    let encoded_tex: String = form_urlencoded::byte_serialize(tex.as_bytes()).collect();
    let settings = settings.serialize();
    if settings.is_empty() {
        format!("tex={encoded_tex}")
    } else {
        format!("{settings}&tex={encoded_tex}")
    }
}

/// The option profile used when neither the request nor the config names one.
pub fn default_latexml_settings() -> SettingsValue {
    SettingsValue::options([
        ("format", SettingEntry::from("xhtml")),
        ("whatsin", SettingEntry::from("math")),
        ("whatsout", SettingEntry::from("math")),
        ("pmml", SettingEntry::from("")),
        ("cmml", SettingEntry::from("")),
        ("nodefaultresources", SettingEntry::from("")),
        (
            "preload",
            SettingEntry::from(vec![
                "LaTeX.pool",
                "article.cls",
                "amsmath.sty",
                "amsthm.sty",
                "amstext.sty",
                "amssymb.sty",
                "eucal.sty",
                "[dvipsnames]xcolor.sty",
                "url.sty",
                "hyperref.sty",
                "[ids]latexml.sty",
                "texvc",
            ]),
        ),
        ("linelength", SettingEntry::from("90")),
    ])
}
