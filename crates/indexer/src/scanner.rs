use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use tracing::warn;

#[derive(Clone, Debug)]
pub struct RawEntry {
    pub name: String,
    pub path: PathBuf,
    pub is_file: bool,
    pub is_dir: bool,
    pub size: u64,
    pub last_modified: u64,
}

#[async_trait]
pub trait FolderScanner: Send + Sync {
    async fn list_dir(&self, path: &Path) -> io::Result<Vec<RawEntry>>;
}

pub struct FsScanner;

#[async_trait]
impl FolderScanner for FsScanner {
    async fn list_dir(&self, path: &Path) -> io::Result<Vec<RawEntry>> {
        let mut entries = Vec::new();
        let mut read_dir = tokio::fs::read_dir(path).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(err) => {
                    warn!("Skipping unreadable entry {:?}: {}", entry.path(), err);
                    continue;
                }
            };
            let last_modified = metadata
                .modified()
                .ok()
                .and_then(|value| value.duration_since(UNIX_EPOCH).ok())
                .map(|value| value.as_millis() as u64)
                .unwrap_or(0);
            entries.push(RawEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                path: entry.path(),
                is_file: metadata.is_file(),
                is_dir: metadata.is_dir(),
                size: metadata.len(),
                last_modified,
            });
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use super::{FolderScanner, FsScanner};

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("beatcrate-scanner-{}", common::new_beat_id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn lists_files_and_directories() {
        let dir = temp_dir();
        fs::write(dir.join("loop.wav"), b"1234").unwrap();
        fs::create_dir(dir.join("stems")).unwrap();

        let entries = FsScanner.list_dir(&dir).await.unwrap();
        assert_eq!(entries.len(), 2);

        let file = entries.iter().find(|entry| entry.name == "loop.wav").unwrap();
        assert!(file.is_file);
        assert_eq!(file.size, 4);
        assert!(file.last_modified > 0);

        let sub = entries.iter().find(|entry| entry.name == "stems").unwrap();
        assert!(sub.is_dir);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn missing_directory_is_an_error() {
        let missing = std::env::temp_dir().join("beatcrate-scanner-missing");
        assert!(FsScanner.list_dir(&missing).await.is_err());
    }
}
