use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use lofty::error::LoftyError;
use lofty::file::{FileType, TaggedFile};
use lofty::picture::{Picture, PictureType};
use lofty::prelude::{AudioFile, ItemKey, TaggedFileExt};
use lofty::probe::Probe;

use common::format_duration;

#[derive(Debug, Default, Clone)]
pub struct ExtractedTags {
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub duration: String,
    pub cover_art: String,
}

#[derive(Debug)]
pub enum MetadataError {
    InvalidInput,
    Io(std::io::Error),
    Parse(LoftyError),
}

impl std::fmt::Display for MetadataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataError::InvalidInput => write!(f, "empty file path"),
            MetadataError::Io(err) => write!(f, "io error: {}", err),
            MetadataError::Parse(err) => write!(f, "parse error: {}", err),
        }
    }
}

impl std::error::Error for MetadataError {}

impl From<std::io::Error> for MetadataError {
    fn from(err: std::io::Error) -> Self {
        MetadataError::Io(err)
    }
}

impl From<LoftyError> for MetadataError {
    fn from(err: LoftyError) -> Self {
        MetadataError::Parse(err)
    }
}

/// Reads container-embedded tags. `format` is the lowercase dotted extension
/// used to pick the container parser; unrecognized extensions fall back to
/// content sniffing. Absent tags come back as empty strings / `None` — the
/// caller owns filename and sentinel fallbacks.
pub fn extract_tags(path: &Path, format: &str) -> Result<ExtractedTags, MetadataError> {
    if path.as_os_str().is_empty() {
        return Err(MetadataError::InvalidInput);
    }

    let tagged_file = read_container(path, format)?;
    let properties = tagged_file.properties();

    let mut tags = ExtractedTags {
        duration: format_duration(properties.duration().as_secs()),
        ..ExtractedTags::default()
    };

    if let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
        if let Some(title) = tag.get_string(&ItemKey::TrackTitle) {
            tags.title = title.to_string();
        }
        if let Some(artist) = tag.get_string(&ItemKey::TrackArtist) {
            if !artist.trim().is_empty() {
                tags.artist = artist.to_string();
            }
        }
        tags.album = tag.get_string(&ItemKey::AlbumTitle).map(|value| value.to_string());
        if let Some(picture) = pick_picture(tag.pictures()) {
            if let Some(uri) = data_uri(picture) {
                tags.cover_art = uri;
            }
        }
    }

    Ok(tags)
}

fn read_container(path: &Path, format: &str) -> Result<TaggedFile, MetadataError> {
    let reader = BufReader::new(File::open(path)?);
    let tagged_file = match file_type_hint(format) {
        Some(file_type) => Probe::with_file_type(reader, file_type).read()?,
        None => Probe::new(reader).guess_file_type()?.read()?,
    };
    Ok(tagged_file)
}

fn file_type_hint(format: &str) -> Option<FileType> {
    match format {
        ".mp3" => Some(FileType::Mpeg),
        ".wav" => Some(FileType::Wav),
        ".flac" => Some(FileType::Flac),
        ".aiff" => Some(FileType::Aiff),
        ".m4a" => Some(FileType::Mp4),
        ".ogg" => Some(FileType::Vorbis),
        _ => None,
    }
}

fn pick_picture(pictures: &[Picture]) -> Option<&Picture> {
    for picture in pictures {
        if picture.pic_type() == PictureType::CoverFront {
            return Some(picture);
        }
    }
    pictures.first()
}

fn data_uri(picture: &Picture) -> Option<String> {
    let data = picture.data();
    if data.is_empty() {
        return None;
    }
    let mime = guess_mime(data).unwrap_or("image/jpeg");
    Some(format!("data:{};base64,{}", mime, BASE64.encode(data)))
}

fn guess_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        Some("image/png")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};

    use super::{extract_tags, guess_mime, MetadataError};

    fn temp_file(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("beatcrate-metadata-{}", common::new_beat_id()));
        fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    // 8-bit mono PCM at 8000 Hz, so byte count == sample count == duration.
    fn write_minimal_wav(path: &Path, seconds: u32) {
        let data_len = seconds * 8000;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&8000u32.to_le_bytes());
        bytes.extend_from_slice(&8000u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&8u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        bytes.resize(bytes.len() + data_len as usize, 0x80);
        fs::write(path, bytes).unwrap();
    }

    #[test]
    fn rejects_empty_path() {
        let err = extract_tags(Path::new(""), ".mp3").unwrap_err();
        assert!(matches!(err, MetadataError::InvalidInput));
    }

    #[test]
    fn fails_on_unparseable_content() {
        let path = temp_file("broken.mp3");
        fs::write(&path, b"this is not audio").unwrap();
        let result = extract_tags(&path, ".mp3");
        assert!(result.is_err());
    }

    #[test]
    fn fails_on_missing_file() {
        let err = extract_tags(Path::new("/no/such/file.mp3"), ".mp3").unwrap_err();
        assert!(matches!(err, MetadataError::Io(_)));
    }

    #[test]
    fn reads_duration_from_untagged_wav() {
        let path = temp_file("tone.wav");
        write_minimal_wav(&path, 2);
        let tags = extract_tags(&path, ".wav").unwrap();
        assert_eq!(tags.duration, "0:02");
        assert_eq!(tags.title, "");
        assert_eq!(tags.artist, "");
        assert_eq!(tags.album, None);
        assert_eq!(tags.cover_art, "");
    }

    #[test]
    fn sniffs_image_mime() {
        assert_eq!(guess_mime(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(guess_mime(&[0x89, 0x50, 0x4E, 0x47, 0x0D]), Some("image/png"));
        assert_eq!(guess_mime(b"GIF89a"), None);
    }
}
