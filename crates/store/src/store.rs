//! The append-only, epoch-partitioned event store.

use crate::{PartitionFile, PartitionRange, StoreError, StoreLayout};
use serde::Deserialize;
use spacemon_derive::types::{DecodedEvent, RawEvent};
use std::path::{Path, PathBuf};
use tokio::{
    fs::{self, File, OpenOptions},
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
};
use tracing::{debug, info, trace};

/// What to do with the latest partition pair when opening a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepairPolicy {
    /// Resume after the last event of the latest pair, which must be consistent.
    ///
    /// Events of the last stored height that were never saved are not recovered.
    Resume,
    /// Truncate the latest pair to zero bytes and resume at its first epoch.
    #[default]
    TruncateLatest,
}

/// Persists raw and decoded events side by side, one line per event, in files partitioned by
/// [EPOCH_QUANTUM].
///
/// There is no transaction across the two files of a pair. A crash between the two writes
/// leaves the pair inconsistent, which [PartitionedStore::open] detects and
/// [RepairPolicy::TruncateLatest] recovers from.
///
/// [EPOCH_QUANTUM]: crate::EPOCH_QUANTUM
#[derive(Debug)]
pub struct PartitionedStore {
    layout: StoreLayout,
    current: Option<OpenPartition>,
}

impl PartitionedStore {
    /// Opens the store rooted at `root`, creating its directories if needed.
    ///
    /// Returns the store and the latest epoch it holds events for, if any.
    pub async fn open(
        root: impl Into<PathBuf>,
        policy: RepairPolicy,
    ) -> Result<(Self, Option<u64>), StoreError> {
        let layout = StoreLayout::new(root);
        let (raw_dir, event_dir) = (layout.raw_dir(), layout.event_dir());
        tokio::try_join!(create_dir(&raw_dir), create_dir(&event_dir))?;

        let (raw, event) =
            tokio::try_join!(layout.list_raw_partitions(), layout.list_event_partitions())?;
        check_pairs(&raw, &event)?;

        let latest_epoch = match (raw.last(), event.last()) {
            (Some(raw), Some(event)) => match policy {
                RepairPolicy::Resume => latest_epoch(raw, event).await?,
                RepairPolicy::TruncateLatest => {
                    tokio::try_join!(truncate(&raw.path), truncate(&event.path))?;
                    info!(target: "store", partition = %raw.range, "Truncated latest partition");
                    raw.range.start.checked_sub(1)
                }
            },
            _ => None,
        };
        debug!(
            target: "store",
            root = %layout.root().display(),
            partitions = raw.len(),
            ?latest_epoch,
            "Opened store"
        );

        Ok((Self { layout, current: None }, latest_epoch))
    }

    /// The layout of the store.
    pub const fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// The partition currently open for writing, if any.
    pub fn current_partition(&self) -> Option<PartitionRange> {
        self.current.as_ref().map(|open| open.range)
    }

    /// Appends a raw event and its decoded form to the partition pair of the event's height.
    ///
    /// Crossing into a new quantum closes the current pair and opens the next one, creating it if
    /// absent.
    pub async fn save(&mut self, raw: &RawEvent, event: &DecodedEvent) -> Result<(), StoreError> {
        let raw_line = json_line(raw)?;
        let event_line = json_line(event)?;

        let range = PartitionRange::containing(event.height);
        let partition = match self.current.take() {
            Some(open) if open.range == range => self.current.insert(open),
            previous => {
                if let Some(previous) = previous {
                    previous.close().await?;
                }
                let next = OpenPartition::open(&self.layout, range).await?;
                info!(target: "store", partition = %range, "Switched to partition");
                self.current.insert(next)
            }
        };

        tokio::try_join!(partition.raw.append(&raw_line), partition.event.append(&event_line))?;
        trace!(target: "store", height = event.height, kind = %event.kind, "Saved event");
        Ok(())
    }

    /// Flushes and closes the open partition pair.
    pub async fn close(&mut self) -> Result<(), StoreError> {
        match self.current.take() {
            Some(open) => open.close().await,
            None => Ok(()),
        }
    }
}

/// The raw and event files of the partition being written.
#[derive(Debug)]
struct OpenPartition {
    range: PartitionRange,
    raw: AppendFile,
    event: AppendFile,
}

impl OpenPartition {
    async fn open(layout: &StoreLayout, range: PartitionRange) -> Result<Self, StoreError> {
        let (raw, event) = tokio::try_join!(
            AppendFile::open(layout.raw_file(range)),
            AppendFile::open(layout.event_file(range))
        )?;
        Ok(Self { range, raw, event })
    }

    async fn close(self) -> Result<(), StoreError> {
        let Self { mut raw, mut event, .. } = self;
        tokio::try_join!(raw.sync(), event.sync())?;
        Ok(())
    }
}

#[derive(Debug)]
struct AppendFile {
    path: PathBuf,
    file: File,
}

impl AppendFile {
    async fn open(path: PathBuf) -> Result<Self, StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(StoreError::io(&path))?;
        Ok(Self { path, file })
    }

    async fn append(&mut self, line: &[u8]) -> Result<(), StoreError> {
        self.file.write_all(line).await.map_err(StoreError::io(&self.path))?;
        self.file.flush().await.map_err(StoreError::io(&self.path))
    }

    async fn sync(&mut self) -> Result<(), StoreError> {
        self.file.flush().await.map_err(StoreError::io(&self.path))?;
        self.file.sync_data().await.map_err(StoreError::io(&self.path))
    }
}

#[derive(Deserialize)]
struct Height {
    height: u64,
}

/// The line count and last height of a partition file.
#[derive(Debug, PartialEq, Eq)]
struct Tail {
    lines: usize,
    height: Option<u64>,
}

fn json_line<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    Ok(line)
}

async fn create_dir(dir: &Path) -> Result<(), StoreError> {
    fs::create_dir_all(dir).await.map_err(StoreError::io(dir))
}

async fn truncate(path: &Path) -> Result<(), StoreError> {
    OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(path)
        .await
        .map_err(StoreError::io(path))?;
    Ok(())
}

/// Both halves of the store must hold exactly the same partitions.
fn check_pairs(raw: &[PartitionFile], event: &[PartitionFile]) -> Result<(), StoreError> {
    let diverged = raw.iter().zip(event).find(|(raw, event)| raw.range != event.range);
    if let Some((raw, event)) = diverged {
        return Err(StoreError::Consistency(format!(
            "raw partition {} is paired with event partition {}",
            raw.range, event.range
        )));
    }
    if raw.len() != event.len() {
        return Err(StoreError::Consistency(format!(
            "{} raw partitions but {} event partitions",
            raw.len(),
            event.len()
        )));
    }
    Ok(())
}

/// Determines the latest stored epoch from the last partition pair.
async fn latest_epoch(raw: &PartitionFile, event: &PartitionFile) -> Result<Option<u64>, StoreError> {
    let (raw_tail, event_tail) = tokio::try_join!(read_tail(&raw.path), read_tail(&event.path))?;
    if raw_tail.lines != event_tail.lines {
        return Err(StoreError::Consistency(format!(
            "partition {} has {} raw lines but {} event lines",
            raw.range, raw_tail.lines, event_tail.lines
        )));
    }
    if raw_tail.height != event_tail.height {
        return Err(StoreError::Consistency(format!(
            "partition {} ends at raw height {:?} but event height {:?}",
            raw.range, raw_tail.height, event_tail.height
        )));
    }
    Ok(raw_tail.height.or_else(|| raw.range.start.checked_sub(1)))
}

async fn read_tail(path: &Path) -> Result<Tail, StoreError> {
    let file = File::open(path).await.map_err(StoreError::io(path))?;
    let mut lines = BufReader::new(file).lines();
    let mut tail = Tail { lines: 0, height: None };
    let mut last = None;
    while let Some(line) = lines.next_line().await.map_err(StoreError::io(path))? {
        tail.lines += 1;
        last = Some(line);
    }
    if let Some(line) = last {
        let Height { height } = serde_json::from_str::<Height>(&line).map_err(|e| {
            StoreError::Consistency(format!("last line of {} is unreadable: {e}", path.display()))
        })?;
        tail.height = Some(height);
    }
    Ok(tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use spacemon_derive::{
        decoder::EventDecoder,
        registry::SchemaRegistry,
        test_utils::{deal_published, sector_activated},
    };
    use std::sync::Arc;

    fn decoder() -> EventDecoder {
        EventDecoder::new(Arc::new(SchemaRegistry::builtin()))
    }

    async fn save_at(store: &mut PartitionedStore, height: u64) {
        let raw = sector_activated(height, &format!("msg-{height}"), height);
        let event = decoder().decode(&raw).unwrap();
        store.save(&raw, &event).await.unwrap();
    }

    fn line_count(path: &Path) -> usize {
        std::fs::read_to_string(path).unwrap().lines().count()
    }

    #[tokio::test]
    async fn test_open_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let (store, latest) = PartitionedStore::open(dir.path(), RepairPolicy::Resume).await.unwrap();
        assert_eq!(latest, None);
        assert!(store.layout().raw_dir().is_dir());
        assert!(store.layout().event_dir().is_dir());
        assert_eq!(store.current_partition(), None);
    }

    #[tokio::test]
    async fn test_save_writes_paired_lines() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, _) = PartitionedStore::open(dir.path(), RepairPolicy::Resume).await.unwrap();

        let raw = deal_published(100, "msg", 7);
        let event = decoder().decode(&raw).unwrap();
        store.save(&raw, &event).await.unwrap();
        store.close().await.unwrap();

        let range = PartitionRange::containing(100);
        let raw_lines = std::fs::read_to_string(store.layout().raw_file(range)).unwrap();
        let event_lines = std::fs::read_to_string(store.layout().event_file(range)).unwrap();
        assert_eq!(raw_lines, format!("{}\n", serde_json::to_string(&raw).unwrap()));
        assert!(event_lines.starts_with(r#"{"type":"deal-published","event":{"#));
        assert!(event_lines.ends_with("}\n"));
    }

    #[tokio::test]
    async fn test_quantum_switch_opens_next_pair() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, _) = PartitionedStore::open(dir.path(), RepairPolicy::Resume).await.unwrap();
        save_at(&mut store, 2878).await;
        save_at(&mut store, 2879).await;
        assert_eq!(store.current_partition(), Some(PartitionRange::containing(0)));
        save_at(&mut store, 2880).await;
        assert_eq!(store.current_partition(), Some(PartitionRange::containing(2880)));
        store.close().await.unwrap();

        let layout = store.layout();
        let names = layout
            .list_raw_partitions()
            .await
            .unwrap()
            .into_iter()
            .map(|file| file.range.file_name())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["0-2879.json", "2880-5759.json"]);
        assert_eq!(line_count(&layout.raw_file(PartitionRange::containing(0))), 2);
        assert_eq!(line_count(&layout.event_file(PartitionRange::containing(2880))), 1);
    }

    #[tokio::test]
    async fn test_reopen_resumes_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, _) = PartitionedStore::open(dir.path(), RepairPolicy::Resume).await.unwrap();
        save_at(&mut store, 10).await;
        save_at(&mut store, 12).await;
        store.close().await.unwrap();

        let (mut store, latest) =
            PartitionedStore::open(dir.path(), RepairPolicy::Resume).await.unwrap();
        assert_eq!(latest, Some(12));
        save_at(&mut store, 13).await;
        store.close().await.unwrap();

        let (_, latest) = PartitionedStore::open(dir.path(), RepairPolicy::Resume).await.unwrap();
        assert_eq!(latest, Some(13));
        let range = PartitionRange::containing(13);
        assert_eq!(line_count(&StoreLayout::new(dir.path()).event_file(range)), 3);
    }

    #[tokio::test]
    async fn test_repair_truncates_latest_pair() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, _) = PartitionedStore::open(dir.path(), RepairPolicy::Resume).await.unwrap();
        save_at(&mut store, 100).await;
        save_at(&mut store, 3000).await;
        save_at(&mut store, 3001).await;
        store.close().await.unwrap();

        let (store, latest) =
            PartitionedStore::open(dir.path(), RepairPolicy::TruncateLatest).await.unwrap();
        assert_eq!(latest, Some(2879));

        let layout = store.layout();
        let last = PartitionRange::containing(3000);
        assert_eq!(std::fs::metadata(layout.raw_file(last)).unwrap().len(), 0);
        assert_eq!(std::fs::metadata(layout.event_file(last)).unwrap().len(), 0);
        assert_eq!(line_count(&layout.raw_file(PartitionRange::containing(100))), 1);

        // An empty trailing pair resumes at its first epoch as well.
        let (_, latest) = PartitionedStore::open(dir.path(), RepairPolicy::Resume).await.unwrap();
        assert_eq!(latest, Some(2879));
    }

    #[tokio::test]
    async fn test_repair_first_partition() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, _) = PartitionedStore::open(dir.path(), RepairPolicy::Resume).await.unwrap();
        save_at(&mut store, 5).await;
        store.close().await.unwrap();

        let (_, latest) =
            PartitionedStore::open(dir.path(), RepairPolicy::TruncateLatest).await.unwrap();
        assert_eq!(latest, None);
    }

    #[tokio::test]
    async fn test_mismatched_file_names() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        std::fs::create_dir_all(layout.raw_dir()).unwrap();
        std::fs::create_dir_all(layout.event_dir()).unwrap();
        std::fs::write(layout.raw_file(PartitionRange::containing(0)), b"").unwrap();
        std::fs::write(layout.event_file(PartitionRange::containing(2880)), b"").unwrap();

        let err = PartitionedStore::open(dir.path(), RepairPolicy::TruncateLatest).await.unwrap_err();
        assert!(matches!(err, StoreError::Consistency(_)));

        std::fs::write(layout.event_file(PartitionRange::containing(0)), b"").unwrap();
        let err = PartitionedStore::open(dir.path(), RepairPolicy::Resume).await.unwrap_err();
        assert!(matches!(err, StoreError::Consistency(_)));
    }

    #[tokio::test]
    async fn test_interrupted_write_is_inconsistent() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, _) = PartitionedStore::open(dir.path(), RepairPolicy::Resume).await.unwrap();
        save_at(&mut store, 20).await;
        save_at(&mut store, 21).await;
        store.close().await.unwrap();

        // Drop the last event line, as if the process died between the paired writes.
        let event_file = store.layout().event_file(PartitionRange::containing(20));
        let content = std::fs::read_to_string(&event_file).unwrap();
        let first = content.lines().next().unwrap();
        std::fs::write(&event_file, format!("{first}\n")).unwrap();

        let err = PartitionedStore::open(dir.path(), RepairPolicy::Resume).await.unwrap_err();
        assert!(
            matches!(&err, StoreError::Consistency(msg) if msg.contains("2 raw lines but 1 event"))
        );

        let (_, latest) =
            PartitionedStore::open(dir.path(), RepairPolicy::TruncateLatest).await.unwrap();
        assert_eq!(latest, None);
    }

    #[tokio::test]
    async fn test_partial_last_line_is_inconsistent() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        let range = PartitionRange::containing(0);
        std::fs::create_dir_all(layout.raw_dir()).unwrap();
        std::fs::create_dir_all(layout.event_dir()).unwrap();
        std::fs::write(layout.raw_file(range), b"{\"height\":1}\n{\"heig").unwrap();
        std::fs::write(layout.event_file(range), b"{\"height\":1}\n{\"height\":2}\n").unwrap();

        let err = PartitionedStore::open(dir.path(), RepairPolicy::Resume).await.unwrap_err();
        assert!(matches!(&err, StoreError::Consistency(msg) if msg.contains("unreadable")));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn test_reopen_reports_last_saved_height(
            mut heights in proptest::collection::vec(0u64..20_000, 1..40)
        ) {
            heights.sort_unstable();
            let dir = tempfile::tempdir().unwrap();
            let runtime =
                tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            runtime.block_on(async {
                let (mut store, _) =
                    PartitionedStore::open(dir.path(), RepairPolicy::Resume).await.unwrap();
                for height in &heights {
                    save_at(&mut store, *height).await;
                }
                store.close().await.unwrap();

                let (store, latest) =
                    PartitionedStore::open(dir.path(), RepairPolicy::Resume).await.unwrap();
                let last = *heights.last().unwrap();
                assert_eq!(latest, Some(last));

                let range = PartitionRange::containing(last);
                let layout = store.layout();
                let expected = heights.iter().filter(|h| range.contains(**h)).count();
                assert_eq!(line_count(&layout.raw_file(range)), expected);
                assert_eq!(line_count(&layout.event_file(range)), expected);
            });
        }
    }
}
