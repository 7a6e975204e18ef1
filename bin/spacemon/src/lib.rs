#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod cli;
pub use cli::{init_tracing_subscriber, Cli, Command};

pub mod config;
pub use config::{Config, Network};

use anyhow::{Context, Result};
use chrono::DateTime;
use spacemon_derive::registry::SchemaRegistry;
use spacemon_driver::{IngestCursor, Ingestor};
use spacemon_providers_lotus::{DiskCache, LotusClient};
use spacemon_store::{Compactor, PartitionedStore, RepairPolicy, StoreLayout};
use std::sync::Arc;
use tracing::info;

/// Runs the ingestion loop until a critical error, opening the store under `policy`.
pub async fn ingest(config: &Config, policy: RepairPolicy) -> Result<()> {
    let cache_dir = config.api_cache_dir();
    let cache = DiskCache::open(&cache_dir)
        .await
        .with_context(|| format!("opening API cache at {}", cache_dir.display()))?;
    let api = Arc::new(LotusClient::new(config.lotus_http_rpc.clone(), Some(cache))?);
    let (store, cursor) = open_store(config, policy).await?;
    info!(target: "spacemon", network = %config.network, rpc = api.url(), "Connected");

    let registry = Arc::new(SchemaRegistry::builtin());
    let mut ingestor = Ingestor::new(api, registry, store, cursor);
    let result = ingestor.run().await;
    ingestor.close().await?;
    result.with_context(|| format!("ingestion stopped at epoch {}", ingestor.cursor().start()))
}

/// Opens the configured store under `policy` and positions the ingestion cursor after its
/// latest epoch.
///
/// With [RepairPolicy::TruncateLatest] the latest partition is ingested again, which also
/// recovers the remaining events of a height that was only partially saved.
pub async fn open_store(
    config: &Config,
    policy: RepairPolicy,
) -> Result<(PartitionedStore, IngestCursor)> {
    let (store, latest_epoch) = PartitionedStore::open(&config.store_path, policy)
        .await
        .with_context(|| format!("opening store at {}", config.store_path.display()))?;
    let cursor = IngestCursor::resume(latest_epoch, config.first_epoch(), config.filter_range());
    info!(
        target: "spacemon",
        ?policy,
        ?latest_epoch,
        start = cursor.start(),
        "Opened store"
    );
    Ok((store, cursor))
}

/// Compiles stored sector events into the consolidated DDO output.
pub async fn compile(config: &Config) -> Result<()> {
    let genesis = DateTime::from_timestamp(config.network.genesis_timestamp(), 0)
        .context("genesis timestamp out of range")?;
    let layout = StoreLayout::new(&config.store_path);
    let summary = Compactor::new(layout, genesis).compile().await?;
    info!(
        target: "spacemon",
        compiled = summary.compiled,
        skipped = summary.skipped,
        empty = summary.empty,
        merged = ?summary.merged,
        "Compilation complete"
    );
    Ok(())
}
