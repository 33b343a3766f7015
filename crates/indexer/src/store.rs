use std::fs;
use std::path::Path;

use common::Beat;
use parking_lot::Mutex;
use redb::{
    CommitError, Database, DatabaseError, ReadableTable, StorageError, TableDefinition, TableError,
    TransactionError,
};
use tracing::warn;

pub const SNAPSHOT_VERSION: u32 = 1;

const SNAPSHOT_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("snapshot");
const BEATS_KEY: &str = "beats";
const VERSION_KEY: &str = "version";

/// Whole-array snapshot persistence. Reads and writes the full record list;
/// there is no per-record granularity.
pub trait SnapshotStore: Send + Sync {
    fn load(&self) -> Result<Vec<Beat>, StoreError>;
    fn save(&self, beats: &[Beat]) -> Result<(), StoreError>;
}

pub struct RedbSnapshotStore {
    db: Database,
}

impl RedbSnapshotStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let db = if path.exists() {
            Database::open(path)?
        } else {
            Database::create(path)?
        };
        Ok(Self { db })
    }
}

impl SnapshotStore for RedbSnapshotStore {
    fn load(&self) -> Result<Vec<Beat>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = match read_txn.open_table(SNAPSHOT_TABLE) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let version: u32 = match table.get(VERSION_KEY)? {
            Some(value) => bincode::deserialize(value.value())?,
            None => return Ok(Vec::new()),
        };
        if version != SNAPSHOT_VERSION {
            warn!("Snapshot version mismatch ({}); starting empty", version);
            return Ok(Vec::new());
        }
        let beats = match table.get(BEATS_KEY)? {
            Some(value) => bincode::deserialize(value.value())?,
            None => Vec::new(),
        };
        Ok(beats)
    }

    fn save(&self, beats: &[Beat]) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SNAPSHOT_TABLE)?;
            let version_bytes = bincode::serialize(&SNAPSHOT_VERSION)?;
            table.insert(VERSION_KEY, version_bytes.as_slice())?;
            let beat_bytes = bincode::serialize(&beats)?;
            table.insert(BEATS_KEY, beat_bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

/// In-memory stand-in for tests and previews; same whole-array contract.
#[derive(Default)]
pub struct MemorySnapshotStore {
    beats: Mutex<Vec<Beat>>,
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self) -> Result<Vec<Beat>, StoreError> {
        Ok(self.beats.lock().clone())
    }

    fn save(&self, beats: &[Beat]) -> Result<(), StoreError> {
        *self.beats.lock() = beats.to_vec();
        Ok(())
    }
}

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Redb(redb::Error),
    Bincode(Box<bincode::ErrorKind>),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(err) => write!(f, "io error: {}", err),
            StoreError::Redb(err) => write!(f, "db error: {}", err),
            StoreError::Bincode(err) => write!(f, "bincode error: {}", err),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl From<redb::Error> for StoreError {
    fn from(err: redb::Error) -> Self {
        StoreError::Redb(err)
    }
}

impl From<DatabaseError> for StoreError {
    fn from(err: DatabaseError) -> Self {
        StoreError::Redb(err.into())
    }
}

impl From<TableError> for StoreError {
    fn from(err: TableError) -> Self {
        StoreError::Redb(err.into())
    }
}

impl From<TransactionError> for StoreError {
    fn from(err: TransactionError) -> Self {
        StoreError::Redb(err.into())
    }
}

impl From<StorageError> for StoreError {
    fn from(err: StorageError) -> Self {
        StoreError::Redb(err.into())
    }
}

impl From<CommitError> for StoreError {
    fn from(err: CommitError) -> Self {
        StoreError::Redb(err.into())
    }
}

impl From<Box<bincode::ErrorKind>> for StoreError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        StoreError::Bincode(err)
    }
}
