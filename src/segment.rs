//! Datastore segments and the transactions that receive them.

use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use serde_json::Value;
use tracing::Span;

/// Identifies the kind of datastore a segment was recorded against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DatastoreProduct(&'static str);

impl DatastoreProduct {
    pub const DGRAPH: Self = Self("Dgraph");

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for DatastoreProduct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Dgraph client operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatastoreOperation {
    Query,
    Mutate,
    Alter,
    Commit,
    Abort,
    CheckVersion,
}

impl DatastoreOperation {
    /// `Abort` for an aborted transaction context, `Commit` otherwise.
    pub fn commit_or_abort(aborted: bool) -> Self {
        if aborted {
            DatastoreOperation::Abort
        } else {
            DatastoreOperation::Commit
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DatastoreOperation::Query => "Query",
            DatastoreOperation::Mutate => "Mutate",
            DatastoreOperation::Alter => "Alter",
            DatastoreOperation::Commit => "Commit",
            DatastoreOperation::Abort => "Abort",
            DatastoreOperation::CheckVersion => "CheckVersion",
        }
    }
}

impl fmt::Display for DatastoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// When a segment started, by both clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentStart {
    pub at: Instant,
    pub wall_time: SystemTime,
}

impl SegmentStart {
    pub fn now() -> Self {
        Self {
            at: Instant::now(),
            wall_time: SystemTime::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.at.elapsed()
    }
}

/// One timed datastore call recorded under a [`Transaction`].
#[derive(Debug, Clone, PartialEq)]
pub struct DatastoreSegment {
    pub start: SegmentStart,
    pub product: DatastoreProduct,
    pub operation: Option<DatastoreOperation>,
    /// What the call touched: query block, predicate, or type name.
    pub collection: Option<String>,
    pub parameterized_query: Option<String>,
    pub query_parameters: HashMap<String, Value>,
    pub host: Option<String>,
    pub port_path_or_id: Option<String>,
    pub database_name: Option<String>,
    /// Message of the error the call failed with, if any.
    pub error: Option<String>,
}

impl DatastoreSegment {
    pub fn new(start: SegmentStart, product: DatastoreProduct) -> Self {
        Self {
            start,
            product,
            operation: None,
            collection: None,
            parameterized_query: None,
            query_parameters: HashMap::new(),
            host: None,
            port_path_or_id: None,
            database_name: None,
            error: None,
        }
    }

    /// Start timing a new segment on `txn`.
    pub fn begin(txn: &dyn Transaction, product: DatastoreProduct) -> Self {
        Self::new(txn.start_segment_now(), product)
    }

    pub fn operation_name(&self) -> &'static str {
        self.operation.map_or("", |op| op.as_str())
    }

    /// Display name, e.g. `Query me` or `Alter`.
    pub fn span_name(&self) -> String {
        match &self.collection {
            Some(collection) => format!("{} {}", self.operation_name(), collection),
            None => self.operation_name().to_string(),
        }
    }
}

/// A monitoring transaction that datastore segments are recorded under.
pub trait Transaction: Send + Sync + fmt::Debug {
    /// Capture the start of a new segment.
    fn start_segment_now(&self) -> SegmentStart {
        SegmentStart::now()
    }

    /// Receive a finished segment. Called once per segment.
    fn end_segment(&self, segment: DatastoreSegment, duration: Duration);
}

/// Owns an open segment and hands it to its transaction exactly once,
/// either through [`SegmentGuard::end`] or when dropped.
#[derive(Debug)]
pub struct SegmentGuard {
    txn: Arc<dyn Transaction>,
    segment: Option<DatastoreSegment>,
}

impl SegmentGuard {
    pub fn new(txn: Arc<dyn Transaction>, segment: DatastoreSegment) -> Self {
        Self {
            txn,
            segment: Some(segment),
        }
    }

    /// Start timing a segment on `txn` and guard it.
    pub fn start(txn: Arc<dyn Transaction>, product: DatastoreProduct) -> Self {
        let segment = DatastoreSegment::begin(&*txn, product);
        Self::new(txn, segment)
    }

    pub fn record_error(&mut self, error: &dyn fmt::Display) {
        if let Some(segment) = self.segment.as_mut() {
            segment.error = Some(error.to_string());
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.segment
            .as_ref()
            .map_or(Duration::ZERO, |segment| segment.start.elapsed())
    }

    /// Close the segment now.
    pub fn end(mut self) {
        self.close();
    }

    fn close(&mut self) {
        if let Some(segment) = self.segment.take() {
            let duration = segment.start.elapsed();
            self.txn.end_segment(segment, duration);
        }
    }
}

impl Deref for SegmentGuard {
    type Target = DatastoreSegment;

    fn deref(&self) -> &DatastoreSegment {
        // Only taken by `close`, which runs from `end` or `drop`.
        self.segment.as_ref().expect("segment accessed after close")
    }
}

impl DerefMut for SegmentGuard {
    fn deref_mut(&mut self) -> &mut DatastoreSegment {
        self.segment.as_mut().expect("segment accessed after close")
    }
}

impl Drop for SegmentGuard {
    fn drop(&mut self) {
        self.close();
    }
}

/// Transaction that reports segments as `tracing` events under a span.
///
/// Events use OpenTelemetry database conventions so that an OTel layer
/// exports them alongside the parent request span.
#[derive(Debug, Clone)]
pub struct TracingTransaction {
    span: Span,
}

impl TracingTransaction {
    pub fn new(span: Span) -> Self {
        Self { span }
    }

    /// The current span, if a subscriber is interested in it.
    pub fn current() -> Option<Self> {
        let span = Span::current();
        if span.is_disabled() {
            None
        } else {
            Some(Self::new(span))
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}

impl Transaction for TracingTransaction {
    fn end_segment(&self, segment: DatastoreSegment, duration: Duration) {
        let parameters = if segment.query_parameters.is_empty() {
            None
        } else {
            serde_json::to_string(&segment.query_parameters).ok()
        };
        let status_code = if segment.error.is_some() { "ERROR" } else { "OK" };

        tracing::info!(
            parent: &self.span,
            otel.name = %segment.span_name(),
            db.system = %segment.product,
            db.operation = segment.operation_name(),
            db.collection = segment.collection.as_deref(),
            db.statement = segment.parameterized_query.as_deref(),
            db.parameters = parameters.as_deref(),
            db.name = segment.database_name.as_deref(),
            server.address = segment.host.as_deref(),
            server.port_path_or_id = segment.port_path_or_id.as_deref(),
            db.duration_ms = duration.as_millis() as u64,
            otel.status_code = status_code,
            "Datastore segment"
        );

        if let Some(error) = &segment.error {
            tracing::error!(
                parent: &self.span,
                db.operation = segment.operation_name(),
                error = %error,
                "Dgraph call failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    #[derive(Debug, Default)]
    struct RecordingTransaction {
        ended: Mutex<Vec<DatastoreSegment>>,
    }

    impl Transaction for RecordingTransaction {
        fn end_segment(&self, segment: DatastoreSegment, _duration: Duration) {
            self.ended.lock().unwrap().push(segment);
        }
    }

    #[derive(Clone, Default)]
    struct LevelCounter {
        info: Arc<AtomicUsize>,
        error: Arc<AtomicUsize>,
    }

    impl<S: Subscriber> Layer<S> for LevelCounter {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let level = *event.metadata().level();
            if level == Level::INFO {
                self.info.fetch_add(1, Ordering::SeqCst);
            } else if level == Level::ERROR {
                self.error.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn test_operation_names() {
        assert_eq!(DatastoreOperation::commit_or_abort(false).as_str(), "Commit");
        assert_eq!(DatastoreOperation::commit_or_abort(true).as_str(), "Abort");
        assert_eq!(DatastoreOperation::CheckVersion.to_string(), "CheckVersion");
        assert_eq!(DatastoreProduct::DGRAPH.as_str(), "Dgraph");
    }

    #[test]
    fn test_span_name() {
        let mut segment = DatastoreSegment::new(SegmentStart::now(), DatastoreProduct::DGRAPH);
        assert_eq!(segment.span_name(), "");

        segment.operation = Some(DatastoreOperation::Query);
        assert_eq!(segment.span_name(), "Query");

        segment.collection = Some("me".to_string());
        assert_eq!(segment.span_name(), "Query me");
    }

    #[test]
    fn test_guard_closes_on_drop() {
        let txn = Arc::new(RecordingTransaction::default());
        {
            let mut guard = SegmentGuard::start(txn.clone(), DatastoreProduct::DGRAPH);
            guard.operation = Some(DatastoreOperation::Alter);
        }

        let ended = txn.ended.lock().unwrap();
        assert_eq!(ended.len(), 1);
        assert_eq!(ended[0].operation, Some(DatastoreOperation::Alter));
    }

    #[test]
    fn test_guard_end_closes_once() {
        let txn = Arc::new(RecordingTransaction::default());
        let mut guard = SegmentGuard::start(txn.clone(), DatastoreProduct::DGRAPH);
        guard.record_error(&"boom");
        guard.end();

        let ended = txn.ended.lock().unwrap();
        assert_eq!(ended.len(), 1);
        assert_eq!(ended[0].error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_segment_composed_before_guard() {
        let txn = Arc::new(RecordingTransaction::default());
        let mut segment = DatastoreSegment::begin(&*txn, DatastoreProduct::DGRAPH);
        segment.operation = Some(DatastoreOperation::Mutate);
        segment.host = Some("db1".to_string());

        SegmentGuard::new(txn.clone(), segment).end();

        let ended = txn.ended.lock().unwrap();
        assert_eq!(ended.len(), 1);
        assert_eq!(ended[0].operation, Some(DatastoreOperation::Mutate));
        assert_eq!(ended[0].host.as_deref(), Some("db1"));
    }

    #[test]
    fn test_tracing_transaction_emits_events() {
        let counter = LevelCounter::default();
        let subscriber = tracing_subscriber::registry().with(counter.clone());

        tracing::subscriber::with_default(subscriber, || {
            let txn = TracingTransaction::new(tracing::info_span!("request"));

            let mut segment = DatastoreSegment::new(SegmentStart::now(), DatastoreProduct::DGRAPH);
            segment.operation = Some(DatastoreOperation::Query);
            segment
                .query_parameters
                .insert("start_ts".to_string(), Value::from(7u64));
            txn.end_segment(segment.clone(), Duration::from_millis(3));

            segment.error = Some("connection refused".to_string());
            txn.end_segment(segment, Duration::from_millis(3));
        });

        assert_eq!(counter.info.load(Ordering::SeqCst), 2);
        assert_eq!(counter.error.load(Ordering::SeqCst), 1);
    }
}
