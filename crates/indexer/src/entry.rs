use common::{
    extension_of, file_stem_of, new_beat_id, slash_path, Beat, UNKNOWN_ALBUM, UNKNOWN_ARTIST,
    UNKNOWN_DURATION,
};
use metadata::{extract_tags, ExtractedTags};
use tracing::warn;

use crate::scanner::RawEntry;

pub const SUPPORTED_FORMATS: &[&str] = &[".mp3", ".wav", ".flac", ".aiff", ".m4a", ".ogg"];

const PROJECT_FILE_EXT: &str = ".flp";

pub struct BuiltEntry {
    pub beat: Beat,
    pub extraction_error: Option<String>,
}

/// `None` means the entry is not indexable at all. Extraction failures still
/// produce a record, with filename and sentinel fallbacks and
/// `is_metadata_loaded` left false so the file can be retried later.
pub fn build_entry(entry: &RawEntry, existing: Option<&Beat>) -> Option<BuiltEntry> {
    if entry.name.is_empty() {
        return None;
    }
    if entry.name.to_lowercase().ends_with(PROJECT_FILE_EXT) {
        return None;
    }
    if entry.path.as_os_str().is_empty() {
        return None;
    }
    let format = extension_of(&entry.name)?;
    if !SUPPORTED_FORMATS.contains(&format.as_str()) {
        return None;
    }

    match extract_tags(&entry.path, &format) {
        Ok(tags) => Some(BuiltEntry {
            beat: merge(entry, &format, Some(&tags), existing),
            extraction_error: None,
        }),
        Err(err) => {
            warn!("Failed to extract tags from {:?}: {}", entry.path, err);
            Some(BuiltEntry {
                beat: merge(entry, &format, None, existing),
                extraction_error: Some(format!("{}: {}", entry.path.display(), err)),
            })
        }
    }
}

/// Field ownership: `id`, `bpm` and `key` come from the prior record when one
/// exists (user edits survive re-scans, ids stay stable); `name`, `path`,
/// `format`, `size` and `last_modified` always come from the live directory
/// entry; the display fields come from extraction when it succeeded, else
/// from filename and sentinel fallbacks.
fn merge(
    entry: &RawEntry,
    format: &str,
    tags: Option<&ExtractedTags>,
    existing: Option<&Beat>,
) -> Beat {
    let id = existing
        .map(|beat| beat.id.clone())
        .unwrap_or_else(new_beat_id);
    let bpm = existing.map(|beat| beat.bpm).unwrap_or(0);
    let key = existing.and_then(|beat| beat.key.clone());
    let path = slash_path(&entry.path.to_string_lossy());

    let (title, artist, album, duration, cover_art, is_metadata_loaded) = match tags {
        Some(tags) => {
            let title = if tags.title.trim().is_empty() {
                file_stem_of(&entry.name).to_string()
            } else {
                tags.title.clone()
            };
            let artist = if tags.artist.trim().is_empty() {
                UNKNOWN_ARTIST.to_string()
            } else {
                tags.artist.clone()
            };
            let album = tags
                .album
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| UNKNOWN_ALBUM.to_string());
            let cover_art = if tags.cover_art.is_empty() {
                None
            } else {
                Some(tags.cover_art.clone())
            };
            (title, artist, album, tags.duration.clone(), cover_art, true)
        }
        None => (
            file_stem_of(&entry.name).to_string(),
            UNKNOWN_ARTIST.to_string(),
            UNKNOWN_ALBUM.to_string(),
            UNKNOWN_DURATION.to_string(),
            None,
            false,
        ),
    };

    Beat {
        id,
        name: entry.name.clone(),
        title,
        path,
        artist,
        album,
        duration,
        bpm,
        key,
        format: format.to_string(),
        cover_art,
        size: entry.size,
        last_modified: entry.last_modified,
        is_metadata_loaded,
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use common::{new_beat_id, Beat, UNKNOWN_ALBUM, UNKNOWN_ARTIST};

    use super::build_entry;
    use crate::scanner::RawEntry;

    fn entry_named(name: &str) -> RawEntry {
        RawEntry {
            name: name.to_string(),
            path: PathBuf::from("/music/beats").join(name),
            is_file: true,
            is_dir: false,
            size: 2048,
            last_modified: 1700000000000,
        }
    }

    #[test]
    fn rejects_non_indexable_entries() {
        assert!(build_entry(&entry_named("project.flp"), None).is_none());
        assert!(build_entry(&entry_named("Project.FLP"), None).is_none());
        assert!(build_entry(&entry_named("notes.txt"), None).is_none());
        assert!(build_entry(&entry_named("no-extension"), None).is_none());

        let mut nameless = entry_named("kick.mp3");
        nameless.name = String::new();
        assert!(build_entry(&nameless, None).is_none());

        let mut pathless = entry_named("kick.mp3");
        pathless.path = PathBuf::new();
        assert!(build_entry(&pathless, None).is_none());
    }

    #[test]
    fn degraded_record_when_extraction_fails() {
        // the path does not exist, so extraction cannot succeed
        let built = build_entry(&entry_named("Dusty Break.mp3"), None).unwrap();
        assert!(built.extraction_error.is_some());

        let beat = built.beat;
        assert!(!beat.is_metadata_loaded);
        assert_eq!(beat.title, "Dusty Break");
        assert_eq!(beat.artist, UNKNOWN_ARTIST);
        assert_eq!(beat.album, UNKNOWN_ALBUM);
        assert_eq!(beat.duration, "0:00");
        assert_eq!(beat.cover_art, None);
        assert_eq!(beat.format, ".mp3");
        assert_eq!(beat.bpm, 0);
        assert_eq!(beat.key, None);
        assert_eq!(beat.size, 2048);
        assert_eq!(beat.path, "/music/beats/Dusty Break.mp3");
    }

    #[test]
    fn carries_forward_id_bpm_and_key() {
        let prior = Beat {
            id: new_beat_id(),
            name: "Dusty Break.mp3".to_string(),
            title: "Dusty Break".to_string(),
            path: "/music/beats/Dusty Break.mp3".to_string(),
            artist: UNKNOWN_ARTIST.to_string(),
            album: UNKNOWN_ALBUM.to_string(),
            duration: "0:00".to_string(),
            bpm: 128,
            key: Some("Am".to_string()),
            format: ".mp3".to_string(),
            cover_art: None,
            size: 1024,
            last_modified: 1,
            is_metadata_loaded: false,
        };

        let built = build_entry(&entry_named("Dusty Break.mp3"), Some(&prior)).unwrap();
        assert_eq!(built.beat.id, prior.id);
        assert_eq!(built.beat.bpm, 128);
        assert_eq!(built.beat.key, Some("Am".to_string()));
        // file attributes are refreshed from the live entry
        assert_eq!(built.beat.size, 2048);
        assert_eq!(built.beat.last_modified, 1700000000000);
    }
}
