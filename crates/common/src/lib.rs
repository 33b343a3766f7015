use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_ALBUM: &str = "Unknown Album";
pub const UNKNOWN_DURATION: &str = "0:00";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Beat {
    pub id: String,
    pub name: String,
    pub title: String,
    pub path: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub album: String,
    pub duration: String,
    #[serde(default)]
    pub bpm: u16,
    #[serde(default)]
    pub key: Option<String>,
    pub format: String,
    #[serde(default)]
    pub cover_art: Option<String>,
    pub size: u64,
    pub last_modified: u64,
    #[serde(default)]
    pub is_metadata_loaded: bool,
}

static ID_SEQ: AtomicU64 = AtomicU64::new(0);

/// Opaque, monotonically sortable id. Unique within a process via the
/// sequence suffix, across restarts via the millisecond prefix.
pub fn new_beat_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|value| value.as_millis())
        .unwrap_or(0);
    let seq = ID_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{:013}-{:06}", millis, seq)
}

/// Reconciliation key: separators unified, then case folded.
pub fn normalize_path(path: &str) -> String {
    slash_path(path).to_lowercase()
}

pub fn slash_path(path: &str) -> String {
    path.replace('\\', "/")
}

pub fn format_duration(total_secs: u64) -> String {
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}

/// Lowercase dotted extension from a file name, `None` when the name has no
/// dot at all.
pub fn extension_of(name: &str) -> Option<String> {
    name.rfind('.').map(|dot| name[dot..].to_lowercase())
}

pub fn file_stem_of(name: &str) -> &str {
    match name.rfind('.') {
        Some(dot) => &name[..dot],
        None => name,
    }
}
