//! The process-wide mapping from cluster name to cluster state.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use log::warn;

use crate::cluster::{ClusterParams, ClusterState};
use crate::cmd::Cmd;
use crate::connection::{Connect, ConnectionLike, NodeAddr};
use crate::pipeline::ClusterPipeline;
use crate::query;
use crate::types::{ErrorKind, RedisResult, Value};

/// Registry of named clusters.
///
/// An application typically creates one registry for the process
/// lifetime (e.g. in a `OnceLock`) and addresses clusters by name from
/// any thread. Creation of a cluster state is idempotent per name;
/// concurrent first use produces exactly one state.
pub struct ClusterRegistry<C> {
    clusters: RwLock<HashMap<String, Arc<ClusterState<C>>>>,
    params: ClusterParams,
}

impl<C> Default for ClusterRegistry<C> {
    fn default() -> ClusterRegistry<C> {
        ClusterRegistry::with_params(ClusterParams::default())
    }
}

impl<C> ClusterRegistry<C> {
    /// Creates a registry with default tuning parameters.
    pub fn new() -> ClusterRegistry<C> {
        ClusterRegistry::default()
    }

    /// Creates a registry whose clusters use the given parameters.
    pub fn with_params(params: ClusterParams) -> ClusterRegistry<C> {
        ClusterRegistry {
            clusters: RwLock::new(HashMap::new()),
            params,
        }
    }

    /// Returns the state registered under `name`.
    pub fn lookup(&self, name: &str) -> Option<Arc<ClusterState<C>>> {
        self.clusters.read().unwrap().get(name).cloned()
    }

    fn state(&self, name: &str) -> RedisResult<Arc<ClusterState<C>>> {
        match self.lookup(name) {
            Some(state) => Ok(state),
            None => fail!((
                ErrorKind::ClientError,
                "Unknown cluster",
                name.to_string()
            )),
        }
    }
}

impl<C: Connect + ConnectionLike> ClusterRegistry<C> {
    /// Creates the cluster state for `name`, seeded by `seed_nodes`, or
    /// returns the existing one.
    ///
    /// The freshly created state attempts an initial topology load;
    /// failure to reach the seed nodes is logged but does not fail the
    /// registration, since queries keep requesting refreshes until the
    /// cluster becomes reachable.
    pub fn start(&self, name: &str, seed_nodes: &[NodeAddr]) -> RedisResult<Arc<ClusterState<C>>> {
        if seed_nodes.is_empty() {
            fail!((ErrorKind::ClientError, "Seed node list can't be empty"));
        }
        if let Some(state) = self.lookup(name) {
            return Ok(state);
        }

        let (state, created) = {
            let mut clusters = self.clusters.write().unwrap();
            match clusters.get(name) {
                // lost the race against a concurrent start
                Some(state) => (state.clone(), false),
                None => {
                    let state = Arc::new(ClusterState::new(name, seed_nodes, self.params.clone()));
                    clusters.insert(name.to_string(), state.clone());
                    (state, true)
                }
            }
        };

        if created {
            if let Err(err) = state.refresh(0) {
                warn!("cluster {name}: initial slot map load failed: {err}");
            }
        }
        Ok(state)
    }

    /// Executes a single command against the named cluster.
    pub fn q(&self, name: &str, command: &Cmd) -> RedisResult<Value> {
        let state = self.state(name)?;
        query::execute_command(&state, command)
    }

    /// Executes a pipeline against the named cluster, returning one
    /// result per command in submission order.
    pub fn qp(&self, name: &str, pipeline: &ClusterPipeline) -> RedisResult<Vec<RedisResult<Value>>> {
        if pipeline.is_empty() {
            fail!((ErrorKind::ClientError, "Pipeline can't be empty"));
        }
        let state = self.state(name)?;
        query::execute_pipeline(&state, pipeline.commands())
    }
}
