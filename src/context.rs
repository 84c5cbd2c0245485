//! Per-call context and the strategies for finding the active transaction.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::segment::{Transaction, TracingTransaction};

/// Context passed alongside every client call.
///
/// The traced client only ever reads the attached transaction. Deadline and
/// metadata are forwarded to the wrapped client untouched.
#[derive(Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    metadata: HashMap<String, String>,
    transaction: Option<Arc<dyn Transaction>>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Attach a metadata entry, e.g. an auth header for the transport.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Attach the monitoring transaction for this call.
    pub fn with_transaction(mut self, txn: Arc<dyn Transaction>) -> Self {
        self.transaction = Some(txn);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    pub fn transaction(&self) -> Option<&Arc<dyn Transaction>> {
        self.transaction.as_ref()
    }
}

impl fmt::Debug for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("deadline", &self.deadline)
            .field("metadata", &self.metadata)
            .field("has_transaction", &self.transaction.is_some())
            .finish()
    }
}

/// Function deriving the transaction for one call from its context.
pub type TransactionResolver =
    Arc<dyn Fn(&CallContext) -> Option<Arc<dyn Transaction>> + Send + Sync>;

/// Where a [`TracedClient`](crate::TracedClient) gets the transaction that
/// segments are recorded under.
#[derive(Clone, Default)]
pub enum TransactionSource {
    /// Never record segments; every call is forwarded as-is.
    #[default]
    Disabled,
    /// Record every call under the same transaction.
    Fixed(Arc<dyn Transaction>),
    /// Look the transaction up on each call.
    Resolver(TransactionResolver),
}

impl TransactionSource {
    pub fn disabled() -> Self {
        Self::Disabled
    }

    /// Bind a single transaction, for a client scoped to one unit of work.
    pub fn fixed(txn: impl Transaction + 'static) -> Self {
        Self::Fixed(Arc::new(txn))
    }

    pub fn resolver<F>(resolve: F) -> Self
    where
        F: Fn(&CallContext) -> Option<Arc<dyn Transaction>> + Send + Sync + 'static,
    {
        Self::Resolver(Arc::new(resolve))
    }

    /// Use the transaction attached to each call's [`CallContext`].
    pub fn from_context() -> Self {
        Self::resolver(|ctx| ctx.transaction().cloned())
    }

    /// Record segments under whatever tracing span is current at call time.
    pub fn current_span() -> Self {
        Self::resolver(|_| {
            TracingTransaction::current().map(|txn| Arc::new(txn) as Arc<dyn Transaction>)
        })
    }

    pub fn resolve(&self, ctx: &CallContext) -> Option<Arc<dyn Transaction>> {
        match self {
            Self::Disabled => None,
            Self::Fixed(txn) => Some(Arc::clone(txn)),
            Self::Resolver(resolve) => resolve(ctx),
        }
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, Self::Disabled)
    }
}

impl fmt::Debug for TransactionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("Disabled"),
            Self::Fixed(txn) => f.debug_tuple("Fixed").field(txn).finish(),
            Self::Resolver(_) => f.write_str("Resolver(..)"),
        }
    }
}

impl<T: Transaction + 'static> From<Arc<T>> for TransactionSource {
    fn from(txn: Arc<T>) -> Self {
        Self::Fixed(txn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::DatastoreSegment;
    use std::time::Duration;

    #[derive(Debug)]
    struct NullTransaction;

    impl Transaction for NullTransaction {
        fn end_segment(&self, _segment: DatastoreSegment, _duration: Duration) {}
    }

    #[test]
    fn test_disabled_resolves_nothing() {
        let ctx = CallContext::new().with_transaction(Arc::new(NullTransaction));
        assert!(TransactionSource::disabled().resolve(&ctx).is_none());
        assert!(TransactionSource::default().is_disabled());
    }

    #[test]
    fn test_fixed_ignores_context() {
        let txn: Arc<dyn Transaction> = Arc::new(NullTransaction);
        let source = TransactionSource::Fixed(Arc::clone(&txn));

        let resolved = source.resolve(&CallContext::new()).unwrap();
        assert!(Arc::ptr_eq(&resolved, &txn));
    }

    #[test]
    fn test_from_context() {
        let source = TransactionSource::from_context();
        assert!(source.resolve(&CallContext::new()).is_none());

        let txn: Arc<dyn Transaction> = Arc::new(NullTransaction);
        let ctx = CallContext::new().with_transaction(Arc::clone(&txn));
        let resolved = source.resolve(&ctx).unwrap();
        assert!(Arc::ptr_eq(&resolved, &txn));
    }

    #[test]
    fn test_context_builder() {
        let deadline = Instant::now() + Duration::from_secs(5);
        let ctx = CallContext::new()
            .with_deadline(deadline)
            .with_metadata("auth-token", "secret");

        assert_eq!(ctx.deadline(), Some(deadline));
        assert_eq!(ctx.metadata().get("auth-token").map(String::as_str), Some("secret"));
        assert!(ctx.transaction().is_none());
    }

    #[test]
    fn test_current_span_outside_span() {
        let subscriber = tracing_subscriber::registry();
        tracing::subscriber::with_default(subscriber, || {
            let source = TransactionSource::current_span();
            assert!(source.resolve(&CallContext::new()).is_none());

            let span = tracing::info_span!("request");
            let _entered = span.enter();
            assert!(source.resolve(&CallContext::new()).is_some());
        });
    }
}
