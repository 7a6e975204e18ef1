//! The ingestion loop.

use crate::{IngestCursor, IngestError, IngestErrorKind, StepOutcome};
use spacemon_derive::{
    decoder::EventDecoder, enrich::StateEnricher, registry::SchemaRegistry, traits::ChainApi,
    types::EventKind,
};
use spacemon_store::PartitionedStore;
use std::{sync::Arc, time::Duration};

/// The pause before re-polling an idle chain or retrying a failed window.
pub const LOOP_PAUSE: Duration = Duration::from_secs(10);

/// Progress is logged every this many saved events.
pub const PROGRESS_INTERVAL: u64 = 100;

/// Drives raw events through decoding, enrichment and storage, window by window.
#[derive(Debug)]
pub struct Ingestor<A: ChainApi> {
    /// The chain API.
    api: Arc<A>,
    /// Decodes raw events.
    decoder: EventDecoder,
    /// Attaches piece manifests to sector events.
    enricher: StateEnricher<A>,
    /// The event store.
    store: PartitionedStore,
    /// The epoch cursor.
    cursor: IngestCursor,
    /// The event types queried.
    kinds: Vec<EventKind>,
    /// The pause between idle or failed steps.
    pause: Duration,
    /// Events saved since startup.
    saved: u64,
}

impl<A: ChainApi> Ingestor<A> {
    /// Creates a new [Ingestor] querying every event type.
    pub fn new(
        api: Arc<A>,
        registry: Arc<SchemaRegistry>,
        store: PartitionedStore,
        cursor: IngestCursor,
    ) -> Self {
        Self {
            decoder: EventDecoder::new(registry.clone()),
            enricher: StateEnricher::new(api.clone(), registry),
            api,
            store,
            cursor,
            kinds: EventKind::ALL.to_vec(),
            pause: LOOP_PAUSE,
            saved: 0,
        }
    }

    /// Sets the pause between idle or failed steps.
    pub const fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Returns the cursor.
    pub const fn cursor(&self) -> &IngestCursor {
        &self.cursor
    }

    /// Returns the number of events saved since startup.
    pub const fn saved(&self) -> u64 {
        self.saved
    }

    /// Runs the loop until a critical error.
    pub async fn run(&mut self) -> Result<(), IngestError> {
        info!(
            target: "loop",
            start = self.cursor.start(),
            filter_range = self.cursor.filter_range(),
            kinds = self.kinds.len(),
            "Starting ingestion"
        );
        loop {
            let outcome = self.step().await?;
            if outcome.should_pause() {
                tokio::time::sleep(self.pause).await;
            }
        }
    }

    /// Performs one step: ingests the next window, or determines why it cannot be ingested yet.
    ///
    /// Only critical errors are returned as errors; the cursor is left on the failed window.
    pub async fn step(&mut self) -> Result<StepOutcome, IngestError> {
        let window = match self.cursor.pending() {
            Some(window) => window,
            None => {
                let head = match self.api.chain_head().await {
                    Ok(head) => head.height,
                    Err(err) => return self.recover(err.into()),
                };
                match self.cursor.window(head) {
                    Some(window) => window,
                    None => {
                        debug!(target: "loop", head, start = self.cursor.start(), "No final epochs");
                        return Ok(StepOutcome::Idle { head });
                    }
                }
            }
        };

        self.cursor.begin(window);
        if let Err(err) = self.ingest_window(window.from, window.to, window.persisted).await {
            return self.recover(err);
        }
        let completed = self.cursor.complete().unwrap_or(window);
        debug!(
            target: "loop",
            from = completed.from,
            to = completed.to,
            saved = completed.persisted,
            "Ingested window"
        );
        Ok(StepOutcome::Advanced {
            from: completed.from,
            to: completed.to,
            saved: completed.persisted,
        })
    }

    /// Fetches the events of `[from, to]` and persists them in order, skipping the first `skip`
    /// events already persisted by an earlier attempt.
    async fn ingest_window(&mut self, from: u64, to: u64, skip: usize) -> Result<(), IngestError> {
        let events = self.api.actor_events_raw(from, to, &self.kinds).await?;
        debug!(target: "loop", from, to, events = events.len(), skip, "Fetched events");

        for raw in events.iter().skip(skip) {
            let mut event = self.decoder.decode(raw)?;
            event.extra = self.enricher.enrich(&event).await?;
            self.store.save(raw, &event).await?;
            self.cursor.record_persisted(event.height);

            self.saved += 1;
            if self.saved % PROGRESS_INTERVAL == 0 {
                info!(target: "loop", saved = self.saved, height = event.height, "Saved events");
            }
        }
        Ok(())
    }

    fn recover(&mut self, err: IngestError) -> Result<StepOutcome, IngestError> {
        match err.classify() {
            IngestErrorKind::Saturated(err) => match self.cursor.shrink() {
                Some(filter_range) => {
                    warn!(target: "loop", filter_range, "{err}, shrinking filter range");
                    Ok(StepOutcome::Shrunk { filter_range })
                }
                None => {
                    error!(target: "loop", start = self.cursor.start(), "{err}");
                    Err(IngestError::RangeExhausted)
                }
            },
            IngestErrorKind::Temporary(err) => {
                warn!(
                    target: "loop",
                    start = self.cursor.start(),
                    "{err}, retrying after {:?}",
                    self.pause
                );
                Ok(StepOutcome::Retrying(err))
            }
            IngestErrorKind::Critical(err) => {
                error!(target: "loop", start = self.cursor.start(), "Critical error: {err}");
                Err(err)
            }
        }
    }

    /// Flushes the store.
    pub async fn close(&mut self) -> Result<(), IngestError> {
        Ok(self.store.close().await?)
    }
}
