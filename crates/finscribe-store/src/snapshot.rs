use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreError;

/// Writes JSON snapshots into a directory.
///
/// The directory is created lazily on first write so that a disabled or unused
/// writer never touches the file system.
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    dir: PathBuf,
}

impl SnapshotWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write `value` as pretty JSON to `{dir}/{prefix}_{timestamp}.json`.
    /// Returns the path written.
    pub fn write<T: Serialize>(
        &self,
        prefix: &str,
        at: DateTime<Utc>,
        value: &T,
    ) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{prefix}_{}.json", file_stamp(at)));
        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;
        Ok(path)
    }

    /// Append `item` to the JSON array stored in `{dir}/{file_name}`,
    /// creating the file when missing.
    pub fn append_to_array<T>(&self, file_name: &str, item: T) -> Result<PathBuf, StoreError>
    where
        T: Serialize + DeserializeOwned,
    {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file_name);

        let mut items: Vec<T> = if path.exists() {
            serde_json::from_reader(BufReader::new(File::open(&path)?))?
        } else {
            Vec::new()
        };
        items.push(item);

        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(&mut writer, &items)?;
        writer.flush()?;
        Ok(path)
    }
}

/// Sortable, file-name safe timestamp (`20260118_143005_123456`).
pub fn file_stamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d_%H%M%S_%6f").to_string()
}
