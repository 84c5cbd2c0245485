//! Basic example showing how to use dgraph-tracing.
//!
//! Run with: cargo run --example basic

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use dgraph_tracing::api::{
    Assigned, Check, Mutation, Operation, Payload, Request, Response, TxnContext, Version,
};
use dgraph_tracing::prelude::*;
use tracing::Instrument;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Stand-in for a real Dgraph connection.
struct InMemoryDgraph;

#[derive(Debug)]
struct Unavailable;

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("dgraph unavailable")
    }
}

impl std::error::Error for Unavailable {}

#[async_trait]
impl DgraphClient for InMemoryDgraph {
    type Error = Unavailable;

    async fn query(&self, _ctx: &CallContext, _request: Request) -> Result<Response, Unavailable> {
        Ok(Response {
            json: br#"{"me":[{"name":"Alice"}]}"#.to_vec(),
            ..Default::default()
        })
    }

    async fn mutate(&self, _ctx: &CallContext, _mutation: Mutation) -> Result<Assigned, Unavailable> {
        Err(Unavailable)
    }

    async fn alter(&self, _ctx: &CallContext, _operation: Operation) -> Result<Payload, Unavailable> {
        Ok(Payload::default())
    }

    async fn commit_or_abort(
        &self,
        _ctx: &CallContext,
        txn: TxnContext,
    ) -> Result<TxnContext, Unavailable> {
        Ok(txn)
    }

    async fn check_version(&self, _ctx: &CallContext, _check: Check) -> Result<Version, Unavailable> {
        Ok(Version {
            tag: "v1.0.11".to_string(),
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Option 1: Segments go under whatever span is current when a call is made
    let client = InMemoryDgraph.with_tracing_config(
        TransactionSource::current_span(),
        TracingConfig::default()
            .with_host("localhost")
            .with_connection_id("9080")
            .with_database_name("demo"),
    );

    // Option 2: Transaction attached to each call's context
    // let client = TracedClient::from_context(InMemoryDgraph);
    // let ctx = CallContext::new().with_transaction(Arc::new(my_transaction));

    // Option 3: No transaction source, plain pass-through
    // let client = TracedClient::wrap(InMemoryDgraph);

    async {
        let ctx = CallContext::new();

        let version = client.check_version(&ctx, Check {}).await?;
        tracing::info!(tag = %version.tag, "Connected to Dgraph");

        let request = Request {
            query: "query people($name: string) { q(func: eq(name, $name)) { name } }".to_string(),
            vars: HashMap::from([("$name".to_string(), "Alice".to_string())]),
            ..Default::default()
        };
        let response = client.query(&ctx, request).await?;
        tracing::info!(bytes = response.json.len(), "Query returned");

        // Errors come back exactly as the wrapped client produced them
        let mutation = Mutation {
            set_nquads: b"_:bob <name> \"Bob\" .".to_vec(),
            commit_now: true,
            ..Default::default()
        };
        if let Err(e) = client.mutate(&ctx, mutation).await {
            tracing::warn!(error = %e, "Mutation failed");
        }

        Ok::<_, Unavailable>(())
    }
    .instrument(tracing::info_span!("handle_request", request_id = 1))
    .await?;

    Ok(())
}
