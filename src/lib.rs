//! redis-cluster is the query dispatch and redirection engine of a Redis
//! Cluster client. Applications issue single commands or pipelines
//! against a logical cluster identified by name; the library locates the
//! correct shard, executes the command, and transparently follows the
//! cluster's MOVED/ASK redirection dialect, refreshing its slot map on
//! demand without stampeding the cluster.
//!
//! The raw transport is not part of this crate: connections are consumed
//! through the narrow [`Connect`] and [`ConnectionLike`] traits, so any
//! RESP implementation (or a mock, for testing) can be plugged in.
//!
//! # Basic Operation
//!
//! ```rust,no_run
//! use redis_cluster::{
//!     cmd, Cmd, ClusterRegistry, Connect, ConnectionLike, NodeAddr, RedisResult, Value,
//! };
//!
//! struct MyConnection; // wraps your transport
//!
//! impl Connect for MyConnection {
//!     fn connect(addr: &NodeAddr) -> RedisResult<Self> {
//!         unimplemented!()
//!     }
//! }
//!
//! impl ConnectionLike for MyConnection {
//!     fn req_command(&self, cmd: &Cmd) -> RedisResult<Value> {
//!         unimplemented!()
//!     }
//!     fn req_pipeline(&self, cmds: &[Cmd]) -> RedisResult<Vec<RedisResult<Value>>> {
//!         unimplemented!()
//!     }
//! }
//!
//! fn do_something() -> RedisResult<()> {
//!     let registry = ClusterRegistry::<MyConnection>::new();
//!     registry.start("main", &[NodeAddr::new("127.0.0.1", 7000)])?;
//!
//!     let _: Value = registry.q("main", cmd("SET").arg("test").arg("test_data"))?;
//!     let rv = registry.q("main", cmd("GET").arg("test"))?;
//!
//!     assert_eq!(rv, Value::Data(b"test_data".to_vec()));
//!     Ok(())
//! }
//! ```
//!
//! # Pipelining
//!
//! A pipeline is dispatched in one round trip when all its keys hash to
//! one slot (hash tags like `{user1}.field` arrange this). Commands that
//! get redirected are re-dispatched individually and the results are
//! reassembled in submission order, so the caller never observes the
//! split:
//!
//! ```rust,no_run
//! # use redis_cluster::{cmd, Cmd, ClusterRegistry, Connect, ConnectionLike, NodeAddr, RedisResult, Value};
//! # struct MyConnection;
//! # impl Connect for MyConnection {
//! #     fn connect(addr: &NodeAddr) -> RedisResult<Self> { unimplemented!() }
//! # }
//! # impl ConnectionLike for MyConnection {
//! #     fn req_command(&self, cmd: &Cmd) -> RedisResult<Value> { unimplemented!() }
//! #     fn req_pipeline(&self, cmds: &[Cmd]) -> RedisResult<Vec<RedisResult<Value>>> { unimplemented!() }
//! # }
//! # fn do_something() -> RedisResult<()> {
//! # let registry = ClusterRegistry::<MyConnection>::new();
//! let mut pipe = redis_cluster::cluster_pipe();
//! pipe.cmd("SET").arg("{t}.a").arg("1")
//!     .cmd("SET").arg("{t}.b").arg("2")
//!     .cmd("GET").arg("{t}.a");
//! let results = registry.qp("main", &pipe)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Redirections and retries
//!
//! A `MOVED` reply re-routes the command to the new slot owner and
//! schedules a topology refresh; an `ASK` reply re-routes one request
//! with an injected `ASKING` prefix and leaves the slot map alone. Other
//! server errors (`TRYAGAIN`, `CLUSTERDOWN`, ...) and transport failures
//! are retried in place. Every retry counts against a per-request TTL
//! ([`ClusterParams::request_ttl`]); when it runs out the last observed
//! error is returned verbatim. Refreshes are version-gated: concurrent
//! callers that observed the same slot map coalesce onto a single
//! `CLUSTER SLOTS` round trip.

#![deny(non_camel_case_types)]
#![warn(missing_docs)]

mod macros;

mod cluster;
mod cmd;
mod connection;
mod pipeline;
mod query;
mod registry;
mod routing;
mod topology;
mod types;

pub use crate::cluster::{ClusterParams, ClusterState, DEFAULT_REQUEST_TTL, DEFAULT_RETRY_DELAY};
pub use crate::cmd::{cmd, Cmd};
pub use crate::connection::{Connect, ConnectionLike, NodeAddr};
pub use crate::pipeline::{cluster_pipe, ClusterPipeline};
pub use crate::registry::ClusterRegistry;
pub use crate::routing::get_slot;
pub use crate::types::{make_server_error, ErrorKind, RedisError, RedisResult, Value};
