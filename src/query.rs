//! The per-call query engine.
//!
//! Each caller-visible operation drives one [`Query`] through a bounded
//! retry loop: resolve the slot, look up a connection, execute, classify
//! the response, and on redirection or transient failure re-dispatch
//! until the request TTL is exhausted. Pipelines are split into
//! per-command sub-queries on partial failure; the `indices` carried by
//! every sub-query let the terminal merge restore the caller's order no
//! matter how the pipeline was split and retried.

use std::str::FromStr;
use std::sync::Arc;
use std::thread;

use log::{debug, warn};

use crate::cluster::ClusterState;
use crate::cmd::{cmd, Cmd};
use crate::connection::{Connect, ConnectionLike, NodeAddr};
use crate::routing;
use crate::types::{ErrorKind, RedisError, RedisResult, Value};

/// Executes a single command against the cluster.
pub(crate) fn execute_command<C>(state: &ClusterState<C>, command: &Cmd) -> RedisResult<Value>
where
    C: Connect + ConnectionLike,
{
    let slot = match routing::slot_for_command(command) {
        Some(slot) => slot,
        None => fail!((
            ErrorKind::InvalidClusterKey,
            "No routable key in command"
        )),
    };

    let query = Query::single(command.clone(), slot);
    let mut results = run(state, query);
    match results.pop() {
        Some((_, result)) => result,
        None => Err(RedisError::from((
            ErrorKind::ResponseError,
            "Query produced no result"
        ))),
    }
}

/// Executes a pipeline against the cluster, returning one result per
/// command in submission order.
pub(crate) fn execute_pipeline<C>(
    state: &ClusterState<C>,
    commands: &[Cmd],
) -> RedisResult<Vec<RedisResult<Value>>>
where
    C: Connect + ConnectionLike,
{
    let slot = match routing::slot_for_pipeline(commands) {
        Some(slot) => slot,
        None => fail!((
            ErrorKind::InvalidClusterKey,
            "No routable key in pipeline"
        )),
    };

    let query = Query::pipeline(commands.to_vec(), slot);
    let mut results = run(state, query);
    results.sort_by_key(|(index, _)| *index);
    Ok(results.into_iter().map(|(_, result)| result).collect())
}

/// Request-scoped record threaded through the engine.
struct Query<C> {
    /// The commands dispatched on the next attempt. One entry for a
    /// single command, n for a pipeline, and `[ASKING, original]` for a
    /// sub-query promoted by an ASK redirection.
    commands: Vec<Cmd>,
    /// Caller-visible position of each real (non-ASKING) command.
    indices: Vec<usize>,
    slot: u16,
    /// Pinned connection. `None` until the slot map has been consulted;
    /// redirections pin the target connection directly.
    conn: Option<Arc<C>>,
    /// Map version observed when the connection was read.
    version: u64,
    retries: u32,
    /// Set when `commands` starts with an injected `ASKING`, so its
    /// synthetic reply can be dropped before reassembly.
    asking: bool,
    pipeline: bool,
    /// Most recently observed error; returned verbatim when the TTL is
    /// exhausted.
    last_error: Option<RedisError>,
}

impl<C> Query<C> {
    fn single(command: Cmd, slot: u16) -> Query<C> {
        Query {
            commands: vec![command],
            indices: vec![0],
            slot,
            conn: None,
            version: 0,
            retries: 0,
            asking: false,
            pipeline: false,
            last_error: None,
        }
    }

    fn pipeline(commands: Vec<Cmd>, slot: u16) -> Query<C> {
        let indices = (0..commands.len()).collect();
        Query {
            commands,
            indices,
            slot,
            conn: None,
            version: 0,
            retries: 0,
            asking: false,
            pipeline: true,
            last_error: None,
        }
    }

    /// A sub-query re-routed by a MOVED or ASK redirection.
    fn redirect(
        &self,
        command: Cmd,
        index: usize,
        slot: u16,
        conn: Arc<C>,
        asking: bool,
        err: RedisError,
    ) -> Query<C> {
        let commands = if asking {
            vec![cmd("ASKING"), command]
        } else {
            vec![command]
        };
        Query {
            commands,
            indices: vec![index],
            slot,
            conn: Some(conn),
            version: self.version,
            retries: self.retries + 1,
            asking,
            pipeline: false,
            last_error: Some(err),
        }
    }

    /// A sub-query retried without a routing change.
    fn transient(&self, command: Cmd, index: usize, err: RedisError) -> Query<C> {
        let commands = if self.asking {
            vec![cmd("ASKING"), command]
        } else {
            vec![command]
        };
        Query {
            commands,
            indices: vec![index],
            slot: self.slot,
            conn: self.conn.clone(),
            version: self.version,
            retries: self.retries + 1,
            asking: self.asking,
            pipeline: false,
            last_error: Some(err),
        }
    }
}

/// Drives a query to its terminal results, one `(index, result)` pair
/// per real command.
fn run<C>(state: &ClusterState<C>, mut query: Query<C>) -> Vec<(usize, RedisResult<Value>)>
where
    C: Connect + ConnectionLike,
{
    let ttl = state.params().request_ttl;
    loop {
        if query.retries >= ttl {
            return give_up(query);
        }

        let conn = match query.conn.clone() {
            Some(conn) => conn,
            None => match state.connection_for_slot(query.slot) {
                Some((conn, version)) => {
                    query.version = version;
                    query.conn = Some(conn.clone());
                    conn
                }
                None => {
                    let version = state.version();
                    if let Err(err) = state.refresh(version) {
                        warn!("cluster {}: slot map refresh failed: {}", state.name(), err);
                    }
                    query.last_error = Some(RedisError::from((
                        ErrorKind::NoConnection,
                        "No connection for slot"
                    )));
                    query.retries += 1;
                    continue;
                }
            },
        };

        if query.retries > 0 {
            thread::sleep(state.params().retry_delay);
        }

        let responses = match dispatch(conn.as_ref(), &query) {
            Ok(responses) if responses.len() == query.commands.len() => responses,
            Ok(responses) => {
                query.last_error = Some(RedisError::from((
                    ErrorKind::ResponseError,
                    "Pipeline reply length mismatch",
                    format!(
                        "expected {} replies, got {}",
                        query.commands.len(),
                        responses.len()
                    ),
                )));
                query.retries += 1;
                continue;
            }
            Err(err) => {
                // transport failed before producing per-command replies
                query.last_error = Some(err);
                query.retries += 1;
                continue;
            }
        };

        let (mut done, retries) = classify(state, &query, responses);
        if retries.is_empty() {
            return done;
        }

        if query.pipeline && !routing::is_same_slot(&query.commands) {
            warn!(
                "cluster {}: pipeline commands hash to multiple slots",
                state.name()
            );
        }
        for sub in retries {
            done.extend(run(state, sub));
        }
        return done;
    }
}

fn dispatch<C: ConnectionLike>(conn: &C, query: &Query<C>) -> RedisResult<Vec<RedisResult<Value>>> {
    if query.pipeline || query.asking {
        conn.req_pipeline(&query.commands)
    } else {
        Ok(vec![conn.req_command(&query.commands[0])])
    }
}

/// Splits the attempt's replies into terminal results and sub-queries
/// that must be re-dispatched.
fn classify<C>(
    state: &ClusterState<C>,
    query: &Query<C>,
    responses: Vec<RedisResult<Value>>,
) -> (Vec<(usize, RedisResult<Value>)>, Vec<Query<C>>)
where
    C: Connect + ConnectionLike,
{
    // an injected ASKING occupies the first command slot; its synthetic
    // OK must never reach the caller
    let offset = usize::from(query.asking);

    let mut done = Vec::new();
    let mut retries = Vec::new();
    for (pos, response) in responses.into_iter().skip(offset).enumerate() {
        let command = &query.commands[pos + offset];
        let index = query.indices[pos];

        let err = match response {
            Ok(value) => {
                done.push((index, Ok(value)));
                continue;
            }
            Err(err) => err,
        };

        match err.kind() {
            ErrorKind::Moved | ErrorKind::Ask => {
                let asking = err.kind() == ErrorKind::Ask;
                let target = match redirect_target(&err) {
                    Some(target) => target,
                    None => {
                        // malformed payload; the slot owner may still
                        // answer after a refresh, so keep retrying
                        retries.push(query.transient(command.clone(), index, err));
                        continue;
                    }
                };
                let (addr, slot) = target;
                match state.connection_for_node(&addr) {
                    Ok(conn) => {
                        debug!(
                            "cluster {}: {} slot {} to {}",
                            state.name(),
                            if asking { "ASK" } else { "MOVED" },
                            slot,
                            addr
                        );
                        if !asking {
                            if let Err(refresh_err) = state.refresh(query.version) {
                                warn!(
                                    "cluster {}: slot map refresh failed: {}",
                                    state.name(),
                                    refresh_err
                                );
                            }
                        }
                        retries.push(query.redirect(command.clone(), index, slot, conn, asking, err));
                    }
                    Err(open_err) => {
                        // redirection to an unreachable node is terminal
                        warn!(
                            "cluster {}: redirection target {} unreachable: {}",
                            state.name(),
                            addr,
                            open_err
                        );
                        done.push((index, Err(err)));
                    }
                }
            }
            _ => retries.push(query.transient(command.clone(), index, err)),
        }
    }
    (done, retries)
}

fn redirect_target(err: &RedisError) -> Option<(NodeAddr, u16)> {
    let (addr, slot) = err.redirect_node()?;
    let addr = NodeAddr::from_str(addr).ok()?;
    Some((addr, slot))
}

fn give_up<C>(query: Query<C>) -> Vec<(usize, RedisResult<Value>)> {
    let err = query.last_error.unwrap_or_else(|| {
        RedisError::from((ErrorKind::ResponseError, "Request retries exhausted"))
    });
    query
        .indices
        .iter()
        .map(|&index| (index, Err(err.clone())))
        .collect()
}
