//! Per-cluster state: the slot table, the connection map, and the
//! serialized topology refresh.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arc_swap::ArcSwap;
use log::{trace, warn};
use rand::seq::SliceRandom;
use rand::thread_rng;

use crate::cmd::cmd;
use crate::connection::{Connect, ConnectionLike, NodeAddr};
use crate::topology;
use crate::types::{ErrorKind, RedisResult};

/// Maximum total retries per caller-visible operation.
pub const DEFAULT_REQUEST_TTL: u32 = 16;

/// Fixed sleep between attempts beyond the first.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Cluster specific tuning parameters.
#[derive(Clone, Debug)]
pub struct ClusterParams {
    /// Maximum total retries per caller-visible operation.
    pub request_ttl: u32,
    /// Fixed sleep between attempts beyond the first. Throttles
    /// redirection storms.
    pub retry_delay: Duration,
}

impl Default for ClusterParams {
    fn default() -> ClusterParams {
        ClusterParams {
            request_ttl: DEFAULT_REQUEST_TTL,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// One slot range's primary in a published table.
///
/// Every validated range gets an entry, so a `range(slot..)` lookup
/// always lands on the range that owns the slot. `conn` is `None` when
/// the primary could not be opened during the publishing refresh; those
/// slots resolve to missing.
struct SlotEntry<C> {
    primary: NodeAddr,
    conn: Option<Arc<C>>,
}

/// One published generation of the slot map.
///
/// Keys are range END slots, so the entry owning `slot` is the first
/// entry of `slots.range(slot..)`.
struct SlotTable<C> {
    version: u64,
    slots: BTreeMap<u16, SlotEntry<C>>,
}

impl<C> SlotTable<C> {
    fn empty() -> SlotTable<C> {
        SlotTable {
            version: 0,
            slots: BTreeMap::new(),
        }
    }
}

/// Authoritative owner of one cluster's routing state.
///
/// Readers take an immutable snapshot of the slot table through an
/// atomically swapped pointer and never block on a refresh. Mutating
/// operations (topology refresh, connection opening) are serialized by
/// one mutex, which also coalesces concurrent refresh requests: a
/// request whose observed map version is already stale when it acquires
/// the mutex returns without issuing `CLUSTER SLOTS`.
pub struct ClusterState<C> {
    name: String,
    seeds: Vec<NodeAddr>,
    params: ClusterParams,
    table: ArcSwap<SlotTable<C>>,
    connections: Mutex<HashMap<NodeAddr, Arc<C>>>,
}

impl<C> std::fmt::Debug for ClusterState<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterState")
            .field("name", &self.name)
            .field("seeds", &self.seeds)
            .field("version", &self.table.load().version)
            .finish()
    }
}

impl<C> ClusterState<C> {
    pub(crate) fn new(name: &str, seeds: &[NodeAddr], params: ClusterParams) -> ClusterState<C> {
        ClusterState {
            name: name.to_string(),
            seeds: seeds.to_vec(),
            params,
            table: ArcSwap::from_pointee(SlotTable::empty()),
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// The cluster name this state was registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn params(&self) -> &ClusterParams {
        &self.params
    }

    /// Current slot map version. Starts at 0 and is incremented exactly
    /// once per successful refresh.
    pub fn version(&self) -> u64 {
        self.table.load().version
    }

    /// Returns the connection owning `slot` together with the map
    /// version it was read from. Pure read; never blocks on a refresh.
    /// Missing when the slot map is empty or the owning primary could
    /// not be opened when the map was published.
    pub fn connection_for_slot(&self, slot: u16) -> Option<(Arc<C>, u64)> {
        let table = self.table.load();
        let entry = table.slots.range(slot..).next().map(|(_, entry)| entry)?;
        let conn = entry.conn.clone()?;
        Some((conn, table.version))
    }

    /// Returns the primary address that owns `slot` in the current map,
    /// whether or not a connection to it is open.
    pub fn node_for_slot(&self, slot: u16) -> Option<NodeAddr> {
        let table = self.table.load();
        table
            .slots
            .range(slot..)
            .next()
            .map(|(_, entry)| entry.primary.clone())
    }
}

impl<C: Connect + ConnectionLike> ClusterState<C> {
    /// Returns the connection to `addr`, opening one if none exists yet.
    /// Opening is serialized with refreshes; there is never more than
    /// one connection per node.
    pub fn connection_for_node(&self, addr: &NodeAddr) -> RedisResult<Arc<C>> {
        let mut connections = self.connections.lock().unwrap();
        Self::open_connection(&mut connections, addr)
    }

    fn open_connection(
        connections: &mut HashMap<NodeAddr, Arc<C>>,
        addr: &NodeAddr,
    ) -> RedisResult<Arc<C>> {
        if let Some(conn) = connections.get(addr) {
            return Ok(conn.clone());
        }
        let conn = Arc::new(C::connect(addr)?);
        connections.insert(addr.clone(), conn.clone());
        Ok(conn)
    }

    /// Rebuilds the slot map from a `CLUSTER SLOTS` round trip.
    ///
    /// `observed_version` is the map version the caller saw when it
    /// decided a refresh was needed. If a newer map has been published
    /// by the time the request is serviced, the request is a no-op; this
    /// is the only defense against refresh stampedes, so callers must
    /// pass the version they actually read.
    pub fn refresh(&self, observed_version: u64) -> RedisResult<()> {
        let mut connections = self.connections.lock().unwrap();
        let current = self.table.load().version;
        if current > observed_version {
            return Ok(());
        }

        let mut candidates: Vec<NodeAddr> = connections.keys().cloned().collect();
        candidates.shuffle(&mut thread_rng());
        for seed in &self.seeds {
            if !connections.contains_key(seed) {
                candidates.push(seed.clone());
            }
        }

        let mut slots_cmd = cmd("CLUSTER");
        slots_cmd.arg("SLOTS");
        let mut reply = None;
        for addr in &candidates {
            let conn = match Self::open_connection(&mut connections, addr) {
                Ok(conn) => conn,
                Err(err) => {
                    warn!("cluster {}: cannot reach {}: {}", self.name, addr, err);
                    continue;
                }
            };
            match conn.req_command(&slots_cmd) {
                Ok(value) => {
                    reply = Some(value);
                    break;
                }
                Err(err) => {
                    warn!(
                        "cluster {}: CLUSTER SLOTS on {} failed: {}",
                        self.name, addr, err
                    );
                }
            }
        }
        let reply = match reply {
            Some(reply) => reply,
            None => fail!((
                ErrorKind::ResponseError,
                "Slot refresh error",
                "no node returned a CLUSTER SLOTS reply".to_string()
            )),
        };

        let mut ranges = topology::parse_slots(&reply)?;
        if ranges.is_empty() {
            fail!((
                ErrorKind::ResponseError,
                "Slot refresh error",
                "didn't get any slots from server".to_string()
            ));
        }
        topology::validate_coverage(&mut ranges)?;

        let mut slots = BTreeMap::new();
        for range in &ranges {
            let conn = match Self::open_connection(&mut connections, &range.primary) {
                Ok(conn) => Some(conn),
                Err(err) => {
                    // the range keeps its entry; its slots report missing
                    // until a later refresh reaches the primary
                    warn!(
                        "cluster {}: cannot connect to primary {} for slots {}..={}: {}",
                        self.name, range.primary, range.start, range.end, err
                    );
                    None
                }
            };
            slots.insert(
                range.end,
                SlotEntry {
                    primary: range.primary.clone(),
                    conn,
                },
            );
        }

        let version = current + 1;
        trace!(
            "cluster {}: published slot map version {} ({} ranges)",
            self.name,
            version,
            ranges.len()
        );
        self.table.store(Arc::new(SlotTable { version, slots }));
        Ok(())
    }
}
