use std::collections::HashMap;
use std::path::PathBuf;

use common::{normalize_path, Beat};

/// Prior records keyed by normalized path, limited to the folders being
/// scanned. Records under other roots are dropped here, which is what prunes
/// them from the snapshot once the scan result is persisted.
pub fn build_reconciliation_map(prior: Vec<Beat>, folders: &[PathBuf]) -> HashMap<String, Beat> {
    let prefixes: Vec<String> = folders
        .iter()
        .map(|folder| normalize_path(&folder.to_string_lossy()))
        .collect();

    let mut map = HashMap::new();
    for beat in prior {
        let key = normalize_path(&beat.path);
        if prefixes.iter().any(|prefix| key.starts_with(prefix.as_str())) {
            map.insert(key, beat);
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use common::{new_beat_id, Beat};

    use super::build_reconciliation_map;

    fn beat_at(path: &str) -> Beat {
        Beat {
            id: new_beat_id(),
            name: "track.mp3".to_string(),
            title: "track".to_string(),
            path: path.to_string(),
            artist: "Unknown Artist".to_string(),
            album: "Unknown Album".to_string(),
            duration: "0:00".to_string(),
            bpm: 0,
            key: None,
            format: ".mp3".to_string(),
            cover_art: None,
            size: 0,
            last_modified: 0,
            is_metadata_loaded: true,
        }
    }

    #[test]
    fn keeps_only_requested_folders() {
        let prior = vec![beat_at("/music/beats/kick.mp3"), beat_at("/music/other/snare.mp3")];
        let map = build_reconciliation_map(prior, &[PathBuf::from("/music/beats")]);
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("/music/beats/kick.mp3"));
    }

    #[test]
    fn matches_across_separator_and_case_differences() {
        let prior = vec![beat_at("C:\\Music\\Track.mp3")];
        let map = build_reconciliation_map(prior, &[PathBuf::from("c:/music")]);
        assert!(map.contains_key("c:/music/track.mp3"));
    }

    #[test]
    fn empty_prior_snapshot_is_fine() {
        let map = build_reconciliation_map(Vec::new(), &[PathBuf::from("/music")]);
        assert!(map.is_empty());
    }
}
