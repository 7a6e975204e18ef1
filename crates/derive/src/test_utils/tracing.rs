//! A subscriber layer for `tracing-subscriber` that collects emitted events with their level and
//! target.

use spin::Mutex;
use std::sync::Arc;
use tracing::{
    field::{Field, Visit},
    Event, Level, Subscriber,
};
use tracing_subscriber::{layer::Context, Layer};

/// A collected trace: its level, target and rendered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedTrace {
    /// The level of the event.
    pub level: Level,
    /// The target of the event.
    pub target: String,
    /// The message and fields of the event.
    pub message: String,
}

/// The storage for the collected traces.
#[derive(Debug, Default, Clone)]
pub struct TraceStorage(pub Arc<Mutex<Vec<CollectedTrace>>>);

impl TraceStorage {
    /// Returns the messages in the storage that match the specified level.
    pub fn get_by_level(&self, level: Level) -> Vec<String> {
        self.0
            .lock()
            .iter()
            .filter(|t| t.level == level)
            .map(|t| t.message.clone())
            .collect()
    }

    /// Returns the messages in the storage emitted under the specified target.
    pub fn get_by_target(&self, target: &str) -> Vec<String> {
        self.0.lock().iter().filter(|t| t.target == target).map(|t| t.message.clone()).collect()
    }

    /// Returns if the storage is empty.
    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }
}

/// A subscriber layer that collects traces.
#[derive(Debug, Default)]
pub struct CollectingLayer {
    /// The storage for the collected traces.
    pub storage: TraceStorage,
}

impl CollectingLayer {
    /// Creates a new collecting layer with the specified storage.
    pub const fn new(storage: TraceStorage) -> Self {
        Self { storage }
    }
}

#[derive(Default)]
struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn core::fmt::Debug) {
        if !self.0.is_empty() {
            self.0.push(' ');
        }
        if field.name() == "message" {
            self.0.push_str(&format!("{value:?}"));
        } else {
            self.0.push_str(&format!("{}={value:?}", field.name()));
        }
    }
}

impl<S: Subscriber> Layer<S> for CollectingLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        self.storage.0.lock().push(CollectedTrace {
            level: *metadata.level(),
            target: metadata.target().to_string(),
            message: visitor.0,
        });
    }
}

/// Installs a [CollectingLayer] as the default subscriber for the current thread, returning the
/// storage and the guard that keeps it installed.
pub fn collect_traces() -> (TraceStorage, ::tracing::subscriber::DefaultGuard) {
    use tracing_subscriber::layer::SubscriberExt;

    let storage = TraceStorage::default();
    let subscriber = tracing_subscriber::registry().with(CollectingLayer::new(storage.clone()));
    let guard = ::tracing::subscriber::set_default(subscriber);
    (storage, guard)
}
