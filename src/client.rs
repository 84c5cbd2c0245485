//! Traced Dgraph client wrapper.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::api::{
    Assigned, Check, DgraphClient, Mutation, Operation, Payload, Request, Response, TxnContext,
    Version,
};
use crate::config::TracingConfig;
use crate::context::{CallContext, TransactionSource};
use crate::parser;
use crate::segment::{DatastoreOperation, DatastoreProduct, SegmentGuard, Transaction};

/// A traced wrapper around any [`DgraphClient`].
///
/// `TracedClient` implements `DgraphClient` itself, making it a drop-in
/// replacement for the client it wraps. Each call made while a transaction
/// is available records one datastore segment under that transaction; calls
/// without one are forwarded untouched. Results and errors of the wrapped
/// client are always returned exactly as received.
///
/// # Transaction sources
///
/// - [`TransactionSource::Disabled`]: plain pass-through
/// - [`TransactionSource::Fixed`]: one transaction for every call, for a
///   client scoped to a single unit of work
/// - [`TransactionSource::Resolver`]: looked up per call, for a long-lived
///   client shared by many requests
///
/// # Example
///
/// ```rust,ignore
/// use dgraph_tracing::{CallContext, TracedClient, TracingConfig, TransactionSource};
///
/// let client = TracedClient::new(
///     dgraph,
///     TransactionSource::from_context(),
///     TracingConfig::default().with_host("db1").with_connection_id("9080"),
/// );
///
/// let ctx = CallContext::new().with_transaction(txn);
/// let response = client.query(&ctx, request).await?;
/// ```
#[derive(Debug, Clone)]
pub struct TracedClient<D> {
    inner: D,
    config: Arc<TracingConfig>,
    source: TransactionSource,
}

impl<D: DgraphClient> TracedClient<D> {
    /// Create a new traced client with the given transaction source and configuration.
    pub fn new(client: D, source: TransactionSource, config: TracingConfig) -> Self {
        Self {
            inner: client,
            config: Arc::new(config),
            source,
        }
    }

    /// Wrap a client without a transaction source. Calls are not recorded.
    pub fn wrap(client: D) -> Self {
        Self::new(client, TransactionSource::Disabled, TracingConfig::default())
    }

    /// Record every call under `txn`.
    pub fn with_transaction(client: D, txn: Arc<dyn Transaction>) -> Self {
        Self::new(client, TransactionSource::Fixed(txn), TracingConfig::default())
    }

    /// Record calls under the transaction attached to each [`CallContext`].
    pub fn from_context(client: D) -> Self {
        Self::new(client, TransactionSource::from_context(), TracingConfig::default())
    }

    /// Get a reference to the underlying client.
    pub fn inner(&self) -> &D {
        &self.inner
    }

    /// Get the tracing configuration.
    pub fn config(&self) -> &TracingConfig {
        &self.config
    }

    pub fn source(&self) -> &TransactionSource {
        &self.source
    }

    /// Consume the wrapper and return the underlying client.
    pub fn into_inner(self) -> D {
        self.inner
    }

    /// Open a segment for `operation` if a transaction is available for this call.
    fn start_segment(
        &self,
        ctx: &CallContext,
        operation: DatastoreOperation,
    ) -> Option<SegmentGuard> {
        let Some(txn) = self.source.resolve(ctx) else {
            tracing::trace!(
                db.operation = operation.as_str(),
                "No transaction for Dgraph call, skipping segment"
            );
            return None;
        };

        let mut segment = SegmentGuard::start(txn, DatastoreProduct::DGRAPH);
        segment.host = self.config.host.clone();
        segment.port_path_or_id = self.config.connection_id.clone();
        segment.database_name = self.config.database_name.clone();
        segment.operation = Some(operation);
        Some(segment)
    }

    /// Record the outcome of the wrapped call and close the segment.
    fn finish<T, E: Display>(&self, segment: Option<SegmentGuard>, result: &Result<T, E>) {
        let Some(mut segment) = segment else {
            return;
        };

        if let Err(e) = result {
            segment.record_error(e);
        }

        let elapsed = segment.elapsed();
        if elapsed > self.config.slow_segment_threshold {
            tracing::warn!(
                db.operation = segment.operation_name(),
                duration_ms = elapsed.as_millis() as u64,
                threshold_ms = self.config.slow_segment_threshold.as_millis() as u64,
                "Slow Dgraph call detected"
            );
        }

        segment.end();
    }
}

impl<D: DgraphClient> From<D> for TracedClient<D> {
    fn from(client: D) -> Self {
        Self::wrap(client)
    }
}

#[async_trait]
impl<D: DgraphClient> DgraphClient for TracedClient<D> {
    type Error = D::Error;

    async fn query(&self, ctx: &CallContext, request: Request) -> Result<Response, Self::Error> {
        let mut segment = self.start_segment(ctx, DatastoreOperation::Query);
        if let Some(segment) = segment.as_mut() {
            segment.collection = parser::query_collection(&request.query);
            if self.config.log_statements {
                segment.parameterized_query = Some(request.query.clone());
            }
            if self.config.log_parameters {
                segment.query_parameters = query_parameters(&request);
            }
        }

        let result = self.inner.query(ctx, request).await;
        self.finish(segment, &result);
        result
    }

    async fn mutate(
        &self,
        ctx: &CallContext,
        mutation: Mutation,
    ) -> Result<Assigned, Self::Error> {
        let mut segment = self.start_segment(ctx, DatastoreOperation::Mutate);
        if let Some(segment) = segment.as_mut() {
            segment.collection = parser::mutation_collection(&mutation);
            if self.config.log_parameters {
                segment.query_parameters = mutation_parameters(&mutation);
            }
        }

        let result = self.inner.mutate(ctx, mutation).await;
        self.finish(segment, &result);
        result
    }

    async fn alter(&self, ctx: &CallContext, operation: Operation) -> Result<Payload, Self::Error> {
        let mut segment = self.start_segment(ctx, DatastoreOperation::Alter);
        if let Some(segment) = segment.as_mut() {
            segment.collection = parser::alter_collection(&operation);
            if self.config.log_parameters {
                segment.query_parameters = alter_parameters(&operation);
            }
        }

        let result = self.inner.alter(ctx, operation).await;
        self.finish(segment, &result);
        result
    }

    async fn commit_or_abort(
        &self,
        ctx: &CallContext,
        txn: TxnContext,
    ) -> Result<TxnContext, Self::Error> {
        let operation = DatastoreOperation::commit_or_abort(txn.aborted);
        let mut segment = self.start_segment(ctx, operation);
        if let Some(segment) = segment.as_mut() {
            if self.config.log_parameters {
                segment.query_parameters = txn_parameters(&txn);
            }
        }

        let result = self.inner.commit_or_abort(ctx, txn).await;
        self.finish(segment, &result);
        result
    }

    async fn check_version(&self, ctx: &CallContext, check: Check) -> Result<Version, Self::Error> {
        let segment = self.start_segment(ctx, DatastoreOperation::CheckVersion);

        let result = self.inner.check_version(ctx, check).await;
        self.finish(segment, &result);
        result
    }
}

/// Render a message field as a parameter value. Unrepresentable values become `null`.
fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn text(bytes: &[u8]) -> Value {
    Value::String(String::from_utf8_lossy(bytes).into_owned())
}

/// Query variables plus `start_ts` and `lin_read`. The latter two win on a name clash.
fn query_parameters(request: &Request) -> HashMap<String, Value> {
    let mut params = HashMap::with_capacity(request.vars.len() + 2);
    for (name, value) in &request.vars {
        params.insert(name.clone(), Value::String(value.clone()));
    }
    params.insert("start_ts".to_string(), Value::from(request.start_ts));
    params.insert("lin_read".to_string(), to_value(&request.lin_read));
    params
}

fn mutation_parameters(mutation: &Mutation) -> HashMap<String, Value> {
    HashMap::from([
        ("set_json".to_string(), text(&mutation.set_json)),
        ("delete_json".to_string(), text(&mutation.delete_json)),
        ("set_nquads".to_string(), text(&mutation.set_nquads)),
        ("del_nquads".to_string(), text(&mutation.del_nquads)),
        ("set".to_string(), to_value(&mutation.set)),
        ("del".to_string(), to_value(&mutation.del)),
        ("start_ts".to_string(), Value::from(mutation.start_ts)),
        ("commit_now".to_string(), Value::from(mutation.commit_now)),
        (
            "ignore_index_conflict".to_string(),
            Value::from(mutation.ignore_index_conflict),
        ),
    ])
}

fn alter_parameters(operation: &Operation) -> HashMap<String, Value> {
    HashMap::from([
        ("drop_all".to_string(), Value::from(operation.drop_all)),
        ("drop_attr".to_string(), Value::from(operation.drop_attr.clone())),
        ("schema".to_string(), Value::from(operation.schema.clone())),
    ])
}

fn txn_parameters(txn: &TxnContext) -> HashMap<String, Value> {
    HashMap::from([
        ("start_ts".to_string(), Value::from(txn.start_ts)),
        ("commit_ts".to_string(), Value::from(txn.commit_ts)),
        ("keys".to_string(), to_value(&txn.keys)),
        ("lin_read".to_string(), to_value(&txn.lin_read)),
    ])
}

/// Extension trait for easy wrapping of Dgraph clients.
pub trait TracingExt: DgraphClient + Sized {
    /// Wrap this client, recording segments under `source`.
    fn with_tracing(self, source: TransactionSource) -> TracedClient<Self>;

    /// Wrap this client with a custom tracing configuration.
    fn with_tracing_config(
        self,
        source: TransactionSource,
        config: TracingConfig,
    ) -> TracedClient<Self>;
}

impl<D: DgraphClient> TracingExt for D {
    fn with_tracing(self, source: TransactionSource) -> TracedClient<Self> {
        TracedClient::new(self, source, TracingConfig::default())
    }

    fn with_tracing_config(
        self,
        source: TransactionSource,
        config: TracingConfig,
    ) -> TracedClient<Self> {
        TracedClient::new(self, source, config)
    }
}
