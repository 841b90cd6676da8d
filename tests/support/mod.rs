#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use once_cell::sync::Lazy;

use redis_cluster::{
    ClusterParams, ClusterRegistry, ClusterState, Cmd, Connect, ConnectionLike, NodeAddr,
    RedisResult, Value,
};

pub type Handler = Arc<dyn Fn(&Cmd, u16) -> Result<(), RedisResult<Value>> + Send + Sync>;

pub struct MockConnectionBehavior {
    pub id: String,
    pub handler: Handler,
    pub refused_ports: Vec<u16>,
}

impl MockConnectionBehavior {
    fn new(id: &str, handler: Handler) -> Self {
        Self {
            id: id.to_string(),
            handler,
            refused_ports: vec![],
        }
    }

    #[must_use]
    pub fn register_new(id: &str, handler: Handler) -> RemoveHandler {
        get_behaviors().insert(id.to_string(), Self::new(id, handler));
        RemoveHandler(vec![id.to_string()])
    }
}

static MOCK_CONN_BEHAVIORS: Lazy<RwLock<HashMap<String, MockConnectionBehavior>>> =
    Lazy::new(Default::default);

fn get_behaviors() -> std::sync::RwLockWriteGuard<'static, HashMap<String, MockConnectionBehavior>>
{
    MOCK_CONN_BEHAVIORS.write().unwrap()
}

pub fn modify_mock_connection_behavior(name: &str, func: impl FnOnce(&mut MockConnectionBehavior)) {
    func(
        get_behaviors()
            .get_mut(name)
            .expect("Behavior `{name}` was not installed"),
    );
}

pub struct RemoveHandler(Vec<String>);

impl Drop for RemoveHandler {
    fn drop(&mut self) {
        for id in &self.0 {
            get_behaviors().remove(id);
        }
    }
}

pub struct MockConnection {
    pub handler: Handler,
    pub port: u16,
}

impl Connect for MockConnection {
    fn connect(addr: &NodeAddr) -> RedisResult<Self> {
        let binding = MOCK_CONN_BEHAVIORS.read().unwrap();
        let behavior = binding
            .get(&addr.host)
            .unwrap_or_else(|| panic!("Behavior for `{}` was not installed", addr.host));
        if behavior.refused_ports.contains(&addr.port) {
            return Err(
                io::Error::new(io::ErrorKind::ConnectionRefused, "mock-io-error").into(),
            );
        }
        Ok(MockConnection {
            handler: behavior.handler.clone(),
            port: addr.port,
        })
    }
}

impl ConnectionLike for MockConnection {
    fn req_command(&self, cmd: &Cmd) -> RedisResult<Value> {
        (self.handler)(cmd, self.port).expect_err("Handler did not specify a response")
    }

    fn req_pipeline(&self, cmds: &[Cmd]) -> RedisResult<Vec<RedisResult<Value>>> {
        Ok(cmds
            .iter()
            .map(|cmd| {
                (self.handler)(cmd, self.port).expect_err("Handler did not specify a response")
            })
            .collect())
    }
}

pub fn cmd_is(command: &Cmd, name: &str) -> bool {
    command.name() == Some(name.to_ascii_uppercase().into_bytes())
}

pub fn is_cluster_slots(command: &Cmd) -> bool {
    cmd_is(command, "CLUSTER")
        && command
            .arg_idx(1)
            .is_some_and(|arg| arg.eq_ignore_ascii_case(b"SLOTS"))
}

pub fn key_of(command: &Cmd) -> &[u8] {
    command.arg_idx(1).unwrap_or(b"")
}

#[derive(Clone, Debug)]
pub struct MockSlotRange {
    pub primary_port: u16,
    pub slot_range: std::ops::Range<u16>,
}

pub fn create_topology_from_config(name: &str, slots_config: Vec<MockSlotRange>) -> Value {
    let slots_vec = slots_config
        .into_iter()
        .map(|slot_config| {
            Value::Bulk(vec![
                Value::Int(slot_config.slot_range.start as i64),
                Value::Int(slot_config.slot_range.end as i64),
                Value::Bulk(vec![
                    Value::Data(name.as_bytes().to_vec()),
                    Value::Int(slot_config.primary_port as i64),
                ]),
            ])
        })
        .collect();
    Value::Bulk(slots_vec)
}

pub fn respond_startup(name: &str, cmd: &Cmd) -> Result<(), RedisResult<Value>> {
    if is_cluster_slots(cmd) {
        Err(Ok(create_topology_from_config(
            name,
            vec![MockSlotRange {
                primary_port: 6379,
                slot_range: 0..16383,
            }],
        )))
    } else {
        Ok(())
    }
}

pub fn respond_startup_two_nodes(name: &str, cmd: &Cmd) -> Result<(), RedisResult<Value>> {
    if is_cluster_slots(cmd) {
        Err(Ok(create_topology_from_config(
            name,
            vec![
                MockSlotRange {
                    primary_port: 6379,
                    slot_range: 0..8191,
                },
                MockSlotRange {
                    primary_port: 6380,
                    slot_range: 8192..16383,
                },
            ],
        )))
    } else {
        Ok(())
    }
}

pub fn test_params() -> ClusterParams {
    ClusterParams {
        retry_delay: Duration::from_millis(0),
        ..ClusterParams::default()
    }
}

pub struct MockEnv {
    pub registry: ClusterRegistry<MockConnection>,
    pub name: String,
    #[allow(unused)]
    handler: RemoveHandler,
}

impl MockEnv {
    pub fn new(
        id: &str,
        handler: impl Fn(&Cmd, u16) -> Result<(), RedisResult<Value>> + Send + Sync + 'static,
    ) -> Self {
        Self::with_params(test_params(), id, handler)
    }

    pub fn with_params(
        params: ClusterParams,
        id: &str,
        handler: impl Fn(&Cmd, u16) -> Result<(), RedisResult<Value>> + Send + Sync + 'static,
    ) -> Self {
        let handler = MockConnectionBehavior::register_new(
            id,
            Arc::new(move |cmd: &Cmd, port| handler(cmd, port)),
        );
        let registry = ClusterRegistry::with_params(params);
        registry.start(id, &[NodeAddr::new(id, 6379)]).unwrap();
        MockEnv {
            registry,
            name: id.to_string(),
            handler,
        }
    }

    pub fn state(&self) -> Arc<ClusterState<MockConnection>> {
        self.registry.lookup(&self.name).unwrap()
    }
}
