//! Metrics helpers for the Lotus client. Without the `metrics` feature they expand to nothing.

/// Times a Lotus request with a [LOTUS_RPC_DURATION] timer. Failed requests are discarded so the
/// histogram only holds round trips that produced a result.
///
/// [LOTUS_RPC_DURATION]: crate::metrics::LOTUS_RPC_DURATION
#[macro_export]
macro_rules! timer {
    (START, $metric:ident, $labels:expr, $timer:ident) => {
        #[cfg(feature = "metrics")]
        let $timer = $crate::metrics::$metric.with_label_values($labels).start_timer();
    };
    (DISCARD, $timer:ident) => {
        #[cfg(feature = "metrics")]
        $timer.stop_and_discard();
    };
    (STOP, $timer:ident) => {
        #[cfg(feature = "metrics")]
        $timer.stop_and_record();
    };
}

/// Increments one of the Lotus client counters.
#[macro_export]
macro_rules! inc {
    ($metric:ident, $labels:expr) => {
        #[cfg(feature = "metrics")]
        $crate::metrics::$metric.with_label_values($labels).inc();
    };
}
