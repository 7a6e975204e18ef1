//! The directory layout of a store.

use crate::{PartitionFile, PartitionRange, StoreError};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tokio::fs;
use tracing::warn;

/// The consolidated compiled output file name.
const CONSOLIDATED_FILE: &str = "compiled-ddo.json";

/// Resolves the paths of a store rooted at a directory, and lists its partitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    /// Creates the layout of the store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The store root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The directory of raw event partitions.
    pub fn raw_dir(&self) -> PathBuf {
        self.root.join("raw")
    }

    /// The directory of decoded event partitions.
    pub fn event_dir(&self) -> PathBuf {
        self.root.join("event")
    }

    /// The directory of compiled partitions.
    pub fn compiled_dir(&self) -> PathBuf {
        self.root.join("compiled")
    }

    /// The consolidated compiled output file.
    pub fn consolidated_path(&self) -> PathBuf {
        self.root.join(CONSOLIDATED_FILE)
    }

    /// The raw partition file for `range`.
    pub fn raw_file(&self, range: PartitionRange) -> PathBuf {
        self.raw_dir().join(range.file_name())
    }

    /// The event partition file for `range`.
    pub fn event_file(&self, range: PartitionRange) -> PathBuf {
        self.event_dir().join(range.file_name())
    }

    /// The compiled partition file for `range`.
    pub fn compiled_file(&self, range: PartitionRange) -> PathBuf {
        self.compiled_dir().join(range.file_name())
    }

    /// Lists the raw partitions, ordered by start epoch.
    pub async fn list_raw_partitions(&self) -> Result<Vec<PartitionFile>, StoreError> {
        list_partitions(&self.raw_dir()).await
    }

    /// Lists the event partitions, ordered by start epoch.
    pub async fn list_event_partitions(&self) -> Result<Vec<PartitionFile>, StoreError> {
        list_partitions(&self.event_dir()).await
    }

    /// Lists the compiled partitions, ordered by start epoch.
    pub async fn list_compiled_partitions(&self) -> Result<Vec<PartitionFile>, StoreError> {
        list_partitions(&self.compiled_dir()).await
    }
}

/// Lists the partition files of `dir`. A missing directory holds no partitions.
///
/// Names are unpadded decimals, so the listing is ordered by the parsed start epoch rather than
/// by name.
async fn list_partitions(dir: &Path) -> Result<Vec<PartitionFile>, StoreError> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
        Err(e) => return Err(StoreError::io(dir)(e)),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(StoreError::io(dir))? {
        let path = entry.path();
        let Some(range) = entry.file_name().to_str().and_then(PartitionRange::parse) else {
            warn!(target: "store", path = %path.display(), "Ignoring unrecognized file");
            continue;
        };
        let modified = entry
            .metadata()
            .await
            .and_then(|metadata| metadata.modified())
            .map_err(StoreError::io(&path))?;
        files.push(PartitionFile { range, path, modified });
    }
    files.sort_unstable_by_key(|file| file.range);
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let layout = StoreLayout::new("/data/store");
        let range = PartitionRange::containing(2880);
        assert_eq!(layout.raw_file(range), PathBuf::from("/data/store/raw/2880-5759.json"));
        assert_eq!(layout.event_file(range), PathBuf::from("/data/store/event/2880-5759.json"));
        assert_eq!(
            layout.compiled_file(range),
            PathBuf::from("/data/store/compiled/2880-5759.json")
        );
        assert_eq!(layout.consolidated_path(), PathBuf::from("/data/store/compiled-ddo.json"));
    }

    #[tokio::test]
    async fn test_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        assert!(layout.list_compiled_partitions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_listing_orders_numerically() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        std::fs::create_dir_all(layout.event_dir()).unwrap();
        for start in [28800, 5760, 2880, 0] {
            let range = PartitionRange::containing(start);
            std::fs::write(layout.event_file(range), b"").unwrap();
        }
        std::fs::write(layout.event_dir().join("notes.txt"), b"").unwrap();

        let starts = layout
            .list_event_partitions()
            .await
            .unwrap()
            .into_iter()
            .map(|file| file.range.start)
            .collect::<Vec<_>>();
        assert_eq!(starts, vec![0, 2880, 5760, 28800]);
    }
}
