//! Diagnostic sink for non-fatal negotiation events

use std::fmt;

use tracing::{debug, error, info, warn};

/// Severity of a diagnostic message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Debug,
    Information,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Debug => "debug",
            Self::Information => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Receiver for diagnostics raised by the core
///
/// Handles work without a sink; diagnostics then go to `TracingSink`. An
/// attached sink replaces `tracing` output rather than adding to it.
pub trait DiagnosticSink: Send + Sync {
    fn log(&self, message: &str, severity: Severity, source: &str);
}

/// Sink that forwards diagnostics to `tracing` at the matching level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn log(&self, message: &str, severity: Severity, source: &str) {
        match severity {
            Severity::Debug => debug!(source, "{message}"),
            Severity::Information => info!(source, "{message}"),
            Severity::Warning => warn!(source, "{message}"),
            Severity::Error => error!(source, "{message}"),
        }
    }
}

/// Emit a warning to the sink, or to `tracing` when there is none
pub(crate) fn emit_warning(sink: Option<&dyn DiagnosticSink>, message: &str, source: &str) {
    sink.unwrap_or(&TracingSink).log(message, Severity::Warning, source);
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tracing::span::{Attributes, Id, Record};
    use tracing::{Event, Metadata, Subscriber};

    /// Counts tracing events emitted while installed
    struct EventCounter(Arc<AtomicUsize>);

    impl Subscriber for EventCounter {
        fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
            true
        }

        fn new_span(&self, _span: &Attributes<'_>) -> Id {
            Id::from_u64(1)
        }

        fn record(&self, _span: &Id, _values: &Record<'_>) {}

        fn record_follows_from(&self, _span: &Id, _follows: &Id) {}

        fn event(&self, _event: &Event<'_>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }

        fn enter(&self, _span: &Id) {}

        fn exit(&self, _span: &Id) {}
    }

    fn count_events(f: impl FnOnce()) -> usize {
        let count = Arc::new(AtomicUsize::new(0));
        tracing::subscriber::with_default(EventCounter(Arc::clone(&count)), f);
        count.load(Ordering::SeqCst)
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(String, Severity, String)>>);

    impl DiagnosticSink for Recorder {
        fn log(&self, message: &str, severity: Severity, source: &str) {
            self.0
                .lock()
                .push((message.to_string(), severity, source.to_string()));
        }
    }

    #[test]
    fn test_emit_warning_reaches_sink() {
        let recorder = Recorder::default();
        emit_warning(Some(&recorder), "fell back", "selector");
        let entries = recorder.0.lock();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].1, Severity::Warning);
        assert_eq!(entries[0].2, "selector");
    }

    #[test]
    fn test_emit_warning_without_sink_logs_once() {
        assert_eq!(count_events(|| emit_warning(None, "fell back", "selector")), 1);
    }

    #[test]
    fn test_tracing_sink_logs_once() {
        let events = count_events(|| emit_warning(Some(&TracingSink), "fell back", "selector"));
        assert_eq!(events, 1);
    }

    #[test]
    fn test_custom_sink_replaces_tracing() {
        let recorder = Recorder::default();
        let events = count_events(|| emit_warning(Some(&recorder), "fell back", "selector"));
        assert_eq!(events, 0);
        assert_eq!(recorder.0.lock().len(), 1);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Warning > Severity::Information);
        assert_eq!(Severity::Warning.to_string(), "warning");
    }
}
