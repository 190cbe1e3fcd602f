//! Hour-keyed rotation schedule.
//!
//! The schedule is a JSON object mapping two-digit hour strings
//! (`"00"`..`"23"`) to the assets intended for that hour. Two entry forms
//! are accepted and may coexist in one file:
//!
//! ```json
//! {
//!   "09": { "avatar": "bafkrei...a", "banner": "bafkrei...b" },
//!   "14": "bafkrei...c"
//! }
//! ```
//!
//! The structured form is canonical; the flat form is the older
//! avatar-only shape and is kept for compatibility. A `banner` key that is
//! absent requests no banner change; an explicit `null` or empty string
//! requests clearing the banner.
//!
//! The schedule is loaded fresh at the start of every cycle and is
//! immutable for the duration of the run. Keys that are not two-digit
//! hours, and entries without a usable avatar id, are skipped at load
//! time with a warning.

use crate::error::{Result, RotationError};
use chrono::{DateTime, Local, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::warn;

/// An opaque content-addressed blob identifier.
///
/// Equality is exact-string; the pipeline never inspects the hash inside.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    /// Create a content id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a schedule entry requests for the banner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BannerDirective {
    /// No banner key in the entry: leave the banner untouched.
    Keep,
    /// Explicit `null` or empty banner id: clear the banner.
    Clear,
    /// Set the banner to this blob.
    Set(ContentId),
}

/// The assets selected for one hour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSelection {
    /// Avatar blob id. Always present; entries without one are dropped
    /// at load time.
    pub avatar: ContentId,
    /// Banner request for this hour.
    pub banner: BannerDirective,
}

/// An hour-keyed schedule, loaded once per run.
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    entries: BTreeMap<u8, AssetSelection>,
}

impl Schedule {
    /// Load and lint a schedule file.
    ///
    /// Malformed hour keys and entries without a usable avatar id are
    /// skipped with a warning naming the key. A file that yields zero
    /// valid entries is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`RotationError::Config`] if the file cannot be read or
    /// parsed, or if no valid entry survives linting.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            RotationError::Config(format!("cannot read schedule {}: {e}", path.display()))
        })?;
        let value: serde_json::Value = serde_json::from_str(&raw).map_err(|e| {
            RotationError::Config(format!("cannot parse schedule {}: {e}", path.display()))
        })?;
        let schedule = Self::from_value(&value)?;
        if schedule.is_empty() {
            return Err(RotationError::Config(format!(
                "schedule {} contains no valid entries",
                path.display()
            )));
        }
        Ok(schedule)
    }

    /// Build a schedule from an already-parsed JSON value.
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        let Some(map) = value.as_object() else {
            return Err(RotationError::Config(
                "schedule root must be a JSON object".into(),
            ));
        };

        let mut entries = BTreeMap::new();
        for (key, entry) in map {
            let Some(hour) = parse_hour_key(key) else {
                warn!(key = %key, "ignoring schedule entry with malformed hour key");
                continue;
            };
            match parse_entry(entry) {
                Some(selection) => {
                    entries.insert(hour, selection);
                }
                None => {
                    warn!(key = %key, "ignoring schedule entry without a usable avatar id");
                }
            }
        }
        Ok(Self { entries })
    }

    /// Resolve the assets intended for the local hour of `now`.
    ///
    /// A missing hour is a legitimate "no update this cycle" outcome,
    /// not an error.
    pub fn resolve(&self, now: DateTime<Local>) -> Option<&AssetSelection> {
        self.entry_for_hour(now.hour() as u8)
    }

    /// Resolve by raw hour-of-day (0–23).
    pub fn entry_for_hour(&self, hour: u8) -> Option<&AssetSelection> {
        self.entries.get(&hour)
    }

    /// The hours that have an entry, ascending.
    pub fn hours(&self) -> Vec<u8> {
        self.entries.keys().copied().collect()
    }

    /// Number of valid entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the schedule has no valid entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse a two-digit hour key `"00"`..`"23"`.
fn parse_hour_key(key: &str) -> Option<u8> {
    if key.len() != 2 || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hour: u8 = key.parse().ok()?;
    (hour <= 23).then_some(hour)
}

/// Parse one schedule entry, either flat (`"cid"`) or structured
/// (`{"avatar": ..., "banner": ...}`). Returns `None` when no usable
/// avatar id is present.
fn parse_entry(entry: &serde_json::Value) -> Option<AssetSelection> {
    match entry {
        serde_json::Value::String(avatar) => {
            let avatar = avatar.trim();
            if avatar.is_empty() {
                return None;
            }
            Some(AssetSelection {
                avatar: ContentId::new(avatar),
                banner: BannerDirective::Keep,
            })
        }
        serde_json::Value::Object(fields) => {
            let avatar = fields.get("avatar")?.as_str()?.trim();
            if avatar.is_empty() {
                return None;
            }
            let banner = match fields.get("banner") {
                None => BannerDirective::Keep,
                Some(serde_json::Value::Null) => BannerDirective::Clear,
                Some(serde_json::Value::String(cid)) if cid.trim().is_empty() => {
                    BannerDirective::Clear
                }
                Some(serde_json::Value::String(cid)) => {
                    BannerDirective::Set(ContentId::new(cid.trim()))
                }
                Some(_) => return None,
            };
            Some(AssetSelection {
                avatar: ContentId::new(avatar),
                banner,
            })
        }
        _ => None,
    }
}
