//! Tracks the epoch windows of the ingestion loop.

/// The number of trailing epochs not yet considered final.
pub const FINALITY_DEPTH: u64 = 900;

/// The default event query width, half a day of epochs.
pub const DEFAULT_FILTER_RANGE: u64 = 1440;

/// An inclusive epoch window of one event query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochWindow {
    /// The first epoch of the window.
    pub from: u64,
    /// The last epoch of the window.
    pub to: u64,
    /// The number of events of the window already persisted.
    pub persisted: usize,
    /// The height of the last persisted event.
    pub last_persisted: Option<u64>,
}

/// The cursor of the ingestion loop.
///
/// Only ever moves forward: a window is either completed, which advances the start past it, or
/// retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestCursor {
    start: u64,
    filter_range: u64,
    pending: Option<EpochWindow>,
}

impl IngestCursor {
    /// Creates a cursor starting at `start`. The filter range is at least one.
    pub fn new(start: u64, filter_range: u64) -> Self {
        Self { start, filter_range: filter_range.max(1), pending: None }
    }

    /// Creates a cursor resuming after the `latest` stored epoch, never before `first_epoch`.
    pub fn resume(latest: Option<u64>, first_epoch: u64, filter_range: u64) -> Self {
        let start = latest.map_or(first_epoch, |latest| first_epoch.max(latest.saturating_add(1)));
        Self::new(start, filter_range)
    }

    /// The first epoch not yet ingested.
    pub const fn start(&self) -> u64 {
        self.start
    }

    /// The current filter range.
    pub const fn filter_range(&self) -> u64 {
        self.filter_range
    }

    /// The window being ingested, if one was started and not completed.
    pub const fn pending(&self) -> Option<EpochWindow> {
        self.pending
    }

    /// Computes the next window given the chain head height. Returns `None` if no final epoch
    /// remains to ingest.
    pub fn window(&self, head: u64) -> Option<EpochWindow> {
        let finalized = head.checked_sub(FINALITY_DEPTH)?;
        let to = self.start.saturating_add(self.filter_range).min(finalized);
        (to >= self.start).then_some(EpochWindow { from: self.start, to, persisted: 0, last_persisted: None })
    }

    /// Marks `window` as being ingested.
    pub fn begin(&mut self, window: EpochWindow) {
        self.pending = Some(window);
    }

    /// Records one persisted event at `height` of the pending window.
    pub fn record_persisted(&mut self, height: u64) {
        if let Some(window) = self.pending.as_mut() {
            window.persisted += 1;
            window.last_persisted = Some(height);
        }
    }

    /// Completes the pending window, advancing past it. Returns the completed window.
    pub fn complete(&mut self) -> Option<EpochWindow> {
        let window = self.pending.take()?;
        self.start = window.to + 1;
        Some(window)
    }

    /// Halves the filter range. Returns the new range, or `None` if the range is already one
    /// epoch.
    ///
    /// A pending window without persisted events is dropped. One with persisted events is
    /// narrowed instead, but never below the height of its last persisted event: event queries
    /// return events in height order, so the narrowed window still starts with the persisted
    /// events and they stay skipped.
    pub fn shrink(&mut self) -> Option<u64> {
        if self.filter_range <= 1 {
            return None;
        }
        self.filter_range = (self.filter_range / 2).max(1);
        let narrowed_to = self.start.saturating_add(self.filter_range);
        self.pending = self.pending.and_then(|window| {
            let last = window.last_persisted?;
            Some(EpochWindow { to: narrowed_to.max(last).min(window.to), ..window })
        });
        Some(self.filter_range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resume_start() {
        assert_eq!(IngestCursor::resume(None, 3855360, 1440).start(), 3855360);
        assert_eq!(IngestCursor::resume(Some(100), 3855360, 1440).start(), 3855360);
        assert_eq!(IngestCursor::resume(Some(3860000), 3855360, 1440).start(), 3860001);
        assert_eq!(IngestCursor::new(0, 0).filter_range(), 1);
    }

    #[test]
    fn test_window_bounds() {
        let cursor = IngestCursor::new(1000, 240);
        let window = |to| Some(EpochWindow { from: 1000, to, persisted: 0, last_persisted: None });
        assert_eq!(cursor.window(100_000), window(1240));
        assert_eq!(cursor.window(2000), window(1100));
        assert_eq!(cursor.window(1900), window(1000));
        assert_eq!(cursor.window(1899), None);
        assert_eq!(cursor.window(10), None);
    }

    #[test]
    fn test_complete_advances() {
        let mut cursor = IngestCursor::new(1000, 240);
        let window = cursor.window(100_000).unwrap();
        cursor.begin(window);
        cursor.record_persisted(1010);
        assert_eq!(cursor.pending().map(|w| w.persisted), Some(1));
        assert_eq!(
            cursor.complete(),
            Some(EpochWindow { persisted: 1, last_persisted: Some(1010), ..window })
        );
        assert_eq!(cursor.start(), 1241);
        assert_eq!(cursor.pending(), None);
        assert_eq!(cursor.complete(), None);
    }

    #[test]
    fn test_shrink_halves_to_floor() {
        let mut cursor = IngestCursor::new(0, 240);
        cursor.begin(cursor.window(10_000).unwrap());
        assert_eq!(cursor.shrink(), Some(120));
        assert_eq!(cursor.pending(), None);
        assert_eq!(cursor.shrink(), Some(60));
        assert_eq!(cursor.shrink(), Some(30));

        let mut cursor = IngestCursor::new(0, 3);
        assert_eq!(cursor.shrink(), Some(1));
        assert_eq!(cursor.shrink(), None);
        assert_eq!(cursor.filter_range(), 1);
    }

    #[test]
    fn test_shrink_keeps_persisted_prefix() {
        let mut cursor = IngestCursor::new(1000, 240);
        cursor.begin(cursor.window(100_000).unwrap());
        cursor.record_persisted(1000);
        cursor.record_persisted(1010);

        assert_eq!(cursor.shrink(), Some(120));
        assert_eq!(
            cursor.pending(),
            Some(EpochWindow { from: 1000, to: 1120, persisted: 2, last_persisted: Some(1010) })
        );

        // Never narrowed past the last persisted event.
        cursor.record_persisted(1100);
        assert_eq!(cursor.shrink(), Some(60));
        assert_eq!(cursor.shrink(), Some(30));
        assert_eq!(cursor.pending().map(|w| (w.to, w.persisted)), Some((1100, 3)));

        assert_eq!(cursor.complete().map(|w| w.to), Some(1100));
        assert_eq!(cursor.start(), 1101);
    }
}
