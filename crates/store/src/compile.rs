//! Compilation of sector onboarding (DDO) records from stored events.
//!
//! Every `sector-activated` or `sector-updated` event that was not reverted and carries piece
//! manifest data becomes one [CompiledRecord]. Records are compiled per event partition into
//! `compiled/<start>-<end>.json` and then merged into the consolidated `compiled-ddo.json`.

use crate::{CompileError, PartitionFile, StoreError, StoreLayout};
use chrono::{DateTime, TimeDelta, Utc};
use cid::Cid;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use spacemon_derive::types::{serde_helpers::cid_json, DdoExtra, EventKind, ManifestPiece};
use std::path::{Path, PathBuf};
use tokio::{
    fs::{self, File},
    io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter},
};
use tracing::{debug, info};

/// The duration of one epoch, in seconds.
pub const EPOCH_DURATION_SECS: i64 = 30;

/// One proven sector with its piece manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledRecord {
    /// The wall-clock time of the epoch.
    pub time: DateTime<Utc>,
    /// The epoch the sector was proven at.
    pub epoch: u64,
    /// The prove message.
    #[serde(with = "cid_json")]
    pub msg: Cid,
    /// The miner actor that emitted the event.
    pub provider: String,
    /// The sector number.
    pub sector: u64,
    /// The miner method the sector was proven with.
    pub method: u64,
    /// The pieces of the sector.
    pub pieces: Vec<ManifestPiece>,
}

/// What a [Compactor::compile] run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileSummary {
    /// Partitions that were (re)compiled into a compiled partition.
    pub compiled: usize,
    /// Partitions whose compiled partition was up to date.
    pub skipped: usize,
    /// Partitions scanned that hold no qualifying records.
    pub empty: usize,
    /// The number of records in the consolidated file, if it was rewritten.
    pub merged: Option<usize>,
}

/// The fields of a stored event line the compactor reads.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredEvent {
    #[serde(rename = "type")]
    kind: EventKind,
    event: SectorFields,
    emitter: String,
    height: u64,
    #[serde(with = "cid_json")]
    msg_cid: Cid,
    reverted: bool,
    #[serde(default)]
    extra: Option<DdoExtra>,
}

#[derive(Debug, Deserialize)]
struct SectorFields {
    sector: u64,
}

/// Incrementally compiles event partitions into [CompiledRecord]s.
#[derive(Debug, Clone)]
pub struct Compactor {
    layout: StoreLayout,
    genesis: DateTime<Utc>,
}

impl Compactor {
    /// Creates a compactor over the store `layout`, dating epochs from `genesis`.
    pub const fn new(layout: StoreLayout, genesis: DateTime<Utc>) -> Self {
        Self { layout, genesis }
    }

    /// Compiles every stale event partition, then rewrites the consolidated file if any compiled
    /// partition changed.
    pub async fn compile(&self) -> Result<CompileSummary, CompileError> {
        let (events, compiled) = tokio::try_join!(
            self.layout.list_event_partitions(),
            self.layout.list_compiled_partitions()
        )?;
        info!(
            target: "compile",
            events = events.len(),
            compiled = compiled.len(),
            "Found partitions"
        );

        let mut summary = CompileSummary::default();
        let mut changed = false;
        let mut outputs = Vec::with_capacity(events.len());
        for (event, existing) in pair_partitions(events, compiled)? {
            if let Some(existing) = existing.as_ref().filter(|c| c.modified >= event.modified) {
                debug!(target: "compile", partition = %event.range, "Skipping up to date partition");
                summary.skipped += 1;
                outputs.push(existing.path.clone());
                continue;
            }

            let records = self.compile_partition(&event.path).await?;
            let target = self.layout.compiled_file(event.range);
            if records.is_empty() {
                debug!(target: "compile", partition = %event.range, "No records to compile");
                summary.empty += 1;
                if existing.is_some() {
                    fs::remove_file(&target).await.map_err(StoreError::io(&target))?;
                    changed = true;
                }
                continue;
            }

            let dir = self.layout.compiled_dir();
            fs::create_dir_all(&dir).await.map_err(StoreError::io(&dir))?;
            write_records(&target, &records).await?;
            info!(
                target: "compile",
                partition = %event.range,
                records = records.len(),
                "Compiled partition"
            );
            summary.compiled += 1;
            changed = true;
            outputs.push(target);
        }

        if !changed {
            info!(target: "compile", "No new events to compile");
            return Ok(summary);
        }
        let merged = self.merge(&outputs).await?;
        info!(
            target: "compile",
            records = merged,
            path = %self.layout.consolidated_path().display(),
            "Wrote consolidated output"
        );
        summary.merged = Some(merged);
        Ok(summary)
    }

    /// Reads the qualifying records of one event partition.
    pub async fn compile_partition(&self, path: &Path) -> Result<Vec<CompiledRecord>, CompileError> {
        let file = File::open(path).await.map_err(StoreError::io(path))?;
        let mut lines = BufReader::new(file).lines();
        let mut records = Vec::new();
        let mut number = 0;
        while let Some(line) = lines.next_line().await.map_err(StoreError::io(path))? {
            number += 1;
            if !is_ddo_candidate(&line) {
                continue;
            }
            let event: StoredEvent = serde_json::from_str(&line).map_err(|source| {
                CompileError::Parse { path: path.to_path_buf(), line: number, source }
            })?;
            records.extend(self.project(event));
        }
        Ok(records)
    }

    fn project(&self, event: StoredEvent) -> Option<CompiledRecord> {
        if event.reverted || !event.kind.has_pieces() {
            return None;
        }
        let DdoExtra { method, pieces } = event.extra?;
        Some(CompiledRecord {
            time: epoch_time(self.genesis, event.height)?,
            epoch: event.height,
            msg: event.msg_cid,
            provider: event.emitter,
            sector: event.event.sector,
            method,
            pieces,
        })
    }

    /// Concatenates the records of the compiled partitions, in order, into the consolidated
    /// file. Returns the number of records written.
    async fn merge(&self, sources: &[PathBuf]) -> Result<usize, CompileError> {
        let path = self.layout.consolidated_path();
        let file = File::create(&path).await.map_err(StoreError::io(&path))?;
        let mut out = JsonArrayWriter::new(BufWriter::new(file), &path);
        for source in sources {
            let file = File::open(source).await.map_err(StoreError::io(source))?;
            let mut lines = BufReader::new(file).lines();
            let mut number = 0;
            while let Some(line) = lines.next_line().await.map_err(StoreError::io(source))? {
                number += 1;
                if matches!(line.as_str(), "[" | "]" | "") {
                    continue;
                }
                let record = line.strip_suffix(',').unwrap_or(&line);
                let record = RawValue::from_string(record.to_string()).map_err(|e| {
                    CompileError::Parse { path: source.clone(), line: number, source: e }
                })?;
                out.push(record.get().as_bytes()).await?;
            }
        }
        Ok(out.finish().await?)
    }
}

/// Returns the wall-clock time of `epoch` on a chain started at `genesis`.
pub fn epoch_time(genesis: DateTime<Utc>, epoch: u64) -> Option<DateTime<Utc>> {
    let secs = i64::try_from(epoch).ok()?.checked_mul(EPOCH_DURATION_SECS)?;
    genesis.checked_add_signed(TimeDelta::try_seconds(secs)?)
}

/// Cheaply rejects lines that cannot be a non-reverted, enriched sector proof event, relying on
/// the field order of serialized events.
fn is_ddo_candidate(line: &str) -> bool {
    (line.starts_with(r#"{"type":"sector-activated","#)
        || line.starts_with(r#"{"type":"sector-updated","#))
        && line.contains(r#","reverted":false,"#)
        && line.contains(r#""extra":"#)
}

/// Pairs every event partition with the compiled partition of the same range, if any.
///
/// A compiled partition with no event partition at its position is a [CompileError::Mismatch].
fn pair_partitions(
    events: Vec<PartitionFile>,
    compiled: Vec<PartitionFile>,
) -> Result<Vec<(PartitionFile, Option<PartitionFile>)>, CompileError> {
    let mut compiled = compiled.into_iter().peekable();
    let mut pairs = Vec::with_capacity(events.len());
    for event in events {
        let existing = match compiled.peek() {
            Some(next) if next.range == event.range => compiled.next(),
            Some(next) if next.range < event.range => {
                return Err(CompileError::Mismatch { compiled: next.range, event: Some(event.range) })
            }
            _ => None,
        };
        pairs.push((event, existing));
    }
    match compiled.next() {
        Some(orphan) => Err(CompileError::Mismatch { compiled: orphan.range, event: None }),
        None => Ok(pairs),
    }
}

async fn write_records(path: &Path, records: &[CompiledRecord]) -> Result<(), CompileError> {
    let file = File::create(path).await.map_err(StoreError::io(path))?;
    let mut out = JsonArrayWriter::new(BufWriter::new(file), path);
    for record in records {
        out.push(&serde_json::to_vec(record).map_err(StoreError::Encode)?).await?;
    }
    out.finish().await?;
    Ok(())
}

/// Writes a JSON array with one element per line.
struct JsonArrayWriter<'a, W> {
    out: W,
    path: &'a Path,
    len: usize,
}

impl<'a, W: AsyncWrite + Unpin> JsonArrayWriter<'a, W> {
    const fn new(out: W, path: &'a Path) -> Self {
        Self { out, path, len: 0 }
    }

    async fn push(&mut self, element: &[u8]) -> Result<(), StoreError> {
        let separator: &[u8] = if self.len == 0 { b"[\n" } else { b",\n" };
        self.out.write_all(separator).await.map_err(StoreError::io(self.path))?;
        self.out.write_all(element).await.map_err(StoreError::io(self.path))?;
        self.len += 1;
        Ok(())
    }

    async fn finish(mut self) -> Result<usize, StoreError> {
        let end: &[u8] = if self.len == 0 { b"[\n]\n" } else { b"\n]\n" };
        self.out.write_all(end).await.map_err(StoreError::io(self.path))?;
        self.out.flush().await.map_err(StoreError::io(self.path))?;
        Ok(self.len)
    }
}
