//! # dgraph-tracing
//!
//! Datastore segment instrumentation for Dgraph clients.
//!
//! This crate wraps any [`DgraphClient`] in a [`TracedClient`] that records a timed
//! datastore segment for each call made under an active monitoring transaction,
//! while returning the wrapped client's results and errors untouched.
//!
//! ## Features
//!
//! - **Drop-in Wrapper**: `TracedClient` implements `DgraphClient` itself
//! - **Pluggable Transactions**: fixed per client, per call from the `CallContext`,
//!   or taken from the current `tracing` span
//! - **Guaranteed Close**: segments close exactly once, on success, error, panic or
//!   when the call's future is dropped
//! - **Parameter Capture**: query variables, mutation payloads, schema changes and
//!   transaction timestamps are recorded as JSON values
//! - **Tracing Backend**: `TracingTransaction` reports segments as `tracing` events
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dgraph_tracing::prelude::*;
//!
//! let client = dgraph.with_tracing(TransactionSource::current_span());
//!
//! // Use it exactly like the wrapped client
//! let response = client.query(&CallContext::new(), request).await?;
//! ```
//!
//! ## Configuration
//!
//! ```rust,ignore
//! use dgraph_tracing::{TracedClient, TracingConfig, TransactionSource};
//!
//! let config = TracingConfig::default()
//!     .with_host("db1")
//!     .with_connection_id("9080")
//!     .with_database_name("prod")
//!     .with_parameter_logging(false); // Keep query variables out of traces
//!
//! let client = TracedClient::new(dgraph, TransactionSource::from_context(), config);
//! ```
//!
//! ## Segment Attributes
//!
//! | Operation | Parameters |
//! |-----------|------------|
//! | `Query` | query variables, `start_ts`, `lin_read` (plus the query text) |
//! | `Mutate` | `set_json`, `delete_json`, `set_nquads`, `del_nquads`, `set`, `del`, `start_ts`, `commit_now`, `ignore_index_conflict` |
//! | `Alter` | `drop_all`, `drop_attr`, `schema` |
//! | `Commit` / `Abort` | `start_ts`, `commit_ts`, `keys`, `lin_read` |
//! | `CheckVersion` | none |

pub mod api;
mod client;
mod config;
mod context;
mod parser;
mod segment;

pub use api::DgraphClient;
pub use client::{TracedClient, TracingExt};
pub use config::TracingConfig;
pub use context::{CallContext, TransactionResolver, TransactionSource};
pub use segment::{
    DatastoreOperation, DatastoreProduct, DatastoreSegment, SegmentGuard, SegmentStart,
    Transaction, TracingTransaction,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        CallContext, DgraphClient, TracedClient, TracingConfig, TracingExt, TracingTransaction,
        Transaction, TransactionSource,
    };
}
