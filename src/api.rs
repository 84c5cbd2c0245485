//! Dgraph client capability trait and the messages it exchanges.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::context::CallContext;

/// The operations a Dgraph client exposes.
///
/// [`TracedClient`](crate::TracedClient) implements this trait on top of any
/// other implementation, so it can stand in for the wrapped client anywhere.
#[async_trait]
pub trait DgraphClient: Send + Sync {
    /// Error returned by the transport.
    type Error: Display + Send + Sync;

    async fn query(&self, ctx: &CallContext, request: Request) -> Result<Response, Self::Error>;

    async fn mutate(&self, ctx: &CallContext, mutation: Mutation)
        -> Result<Assigned, Self::Error>;

    async fn alter(&self, ctx: &CallContext, operation: Operation)
        -> Result<Payload, Self::Error>;

    async fn commit_or_abort(
        &self,
        ctx: &CallContext,
        txn: TxnContext,
    ) -> Result<TxnContext, Self::Error>;

    async fn check_version(&self, ctx: &CallContext, check: Check)
        -> Result<Version, Self::Error>;
}

#[async_trait]
impl<T: DgraphClient + ?Sized> DgraphClient for Arc<T> {
    type Error = T::Error;

    async fn query(&self, ctx: &CallContext, request: Request) -> Result<Response, Self::Error> {
        (**self).query(ctx, request).await
    }

    async fn mutate(
        &self,
        ctx: &CallContext,
        mutation: Mutation,
    ) -> Result<Assigned, Self::Error> {
        (**self).mutate(ctx, mutation).await
    }

    async fn alter(&self, ctx: &CallContext, operation: Operation) -> Result<Payload, Self::Error> {
        (**self).alter(ctx, operation).await
    }

    async fn commit_or_abort(
        &self,
        ctx: &CallContext,
        txn: TxnContext,
    ) -> Result<TxnContext, Self::Error> {
        (**self).commit_or_abort(ctx, txn).await
    }

    async fn check_version(&self, ctx: &CallContext, check: Check) -> Result<Version, Self::Error> {
        (**self).check_version(ctx, check).await
    }
}

/// Read consistency bookkeeping carried by requests and transactions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinRead {
    pub ids: HashMap<u32, u64>,
    pub sequencing: Sequencing,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Sequencing {
    #[default]
    ClientSide,
    ServerSide,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Request {
    pub query: String,
    pub vars: HashMap<String, String>,
    pub start_ts: u64,
    pub lin_read: Option<LinRead>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Latency {
    pub parsing_ns: u64,
    pub processing_ns: u64,
    pub encoding_ns: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Response {
    pub json: Vec<u8>,
    pub txn: Option<TxnContext>,
    pub latency: Option<Latency>,
}

/// Object side of a structured triple.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectValue {
    Default(String),
    Bytes(Vec<u8>),
    Int(i64),
    Bool(bool),
    Double(f64),
    Str(String),
    Datetime(Vec<u8>),
    Uid(u64),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NQuad {
    pub subject: String,
    pub predicate: String,
    pub object_id: String,
    pub object_value: Option<ObjectValue>,
    pub label: String,
    pub lang: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Mutation {
    pub set_json: Vec<u8>,
    pub delete_json: Vec<u8>,
    pub set_nquads: Vec<u8>,
    pub del_nquads: Vec<u8>,
    pub set: Vec<NQuad>,
    pub del: Vec<NQuad>,
    pub start_ts: u64,
    pub commit_now: bool,
    pub ignore_index_conflict: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Assigned {
    pub uids: HashMap<String, String>,
    pub context: Option<TxnContext>,
}

/// Schema change request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Operation {
    pub schema: String,
    pub drop_attr: String,
    pub drop_all: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Payload {
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TxnContext {
    pub start_ts: u64,
    pub commit_ts: u64,
    pub aborted: bool,
    pub keys: Vec<String>,
    pub lin_read: Option<LinRead>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Check {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Version {
    pub tag: String,
}
