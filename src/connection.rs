//! Node addressing and the transport interface consumed by the engine.

use std::fmt;
use std::str::FromStr;

use crate::cmd::Cmd;
use crate::types::{ErrorKind, RedisError, RedisResult, Value};

/// Address of one cluster node.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeAddr {
    /// Host name or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl NodeAddr {
    /// Creates a new node address.
    pub fn new(host: impl Into<String>, port: u16) -> NodeAddr {
        NodeAddr {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for NodeAddr {
    type Err = RedisError;

    /// Parses `host:port` notation as used by MOVED/ASK payloads.
    /// IPv6 hosts may be wrapped in brackets.
    fn from_str(s: &str) -> RedisResult<NodeAddr> {
        let (host, port) = match s.rsplit_once(':') {
            Some(parts) => parts,
            None => fail!((
                ErrorKind::ClientError,
                "Invalid node address",
                s.to_string()
            )),
        };
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            fail!((
                ErrorKind::ClientError,
                "Invalid node address",
                s.to_string()
            ));
        }
        let port = match port.parse() {
            Ok(port) => port,
            Err(_) => fail!((
                ErrorKind::ClientError,
                "Invalid node address",
                s.to_string()
            )),
        };
        Ok(NodeAddr::new(host, port))
    }
}

/// Opens a transport to one cluster node.
///
/// Implemented by the transport layer; the engine only ever opens
/// connections through this trait and never closes them (idle eviction
/// and reconnection belong to the transport).
pub trait Connect: Sized {
    /// Connect to a node, returning a handle for command execution.
    fn connect(addr: &NodeAddr) -> RedisResult<Self>;
}

/// A transport to one cluster node that can execute commands.
///
/// Handles are shared by reference between concurrent in-flight queries,
/// so implementations take `&self` and handle their own synchronization.
/// Server errors are reported as values (with the raw error line
/// preserved as the error detail, see
/// [`make_server_error`](crate::make_server_error)) so that the engine
/// can classify redirections.
pub trait ConnectionLike {
    /// Sends a single command and reads its reply.
    fn req_command(&self, cmd: &Cmd) -> RedisResult<Value>;

    /// Sends a pipeline of commands and reads one reply per command, in
    /// submission order. The outer error is reserved for transport-level
    /// failures; per-command server errors belong inside the vector.
    fn req_pipeline(&self, cmds: &[Cmd]) -> RedisResult<Vec<RedisResult<Value>>>;
}
