//! 场景描述：一个服务端、若干客户端、各自到服务端的链路，以及注入的流量。
//!
//! 节点下标约定：0 是服务端，1.. 依次是 `clients` 中的客户端。

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use super::id::NodeId;
use super::inject_frame::InjectFrame;
use super::link::Link;
use super::set_enabled::SetEnabled;
use super::world::{TunnelWorld, WorldStats};
use crate::config::{ConfigError, TunnelConfig};
use crate::frame::{EthernetFrame, MacAddr};
use crate::sim::{SimTime, Simulator};
use crate::tunnel::{EndpointReport, TunnelClient, TunnelEndpoint, TunnelServer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSpec {
    #[serde(default = "default_latency_us")]
    pub latency_us: u64,
    /// 0 表示不限速
    #[serde(default = "default_bandwidth_mbps")]
    pub bandwidth_mbps: u64,
    #[serde(default)]
    pub drop_every: Option<u64>,
}

impl Default for LinkSpec {
    fn default() -> Self {
        Self {
            latency_us: default_latency_us(),
            bandwidth_mbps: default_bandwidth_mbps(),
            drop_every: None,
        }
    }
}

fn default_latency_us() -> u64 {
    500
}

fn default_bandwidth_mbps() -> u64 {
    100
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub address: SocketAddr,
    #[serde(default)]
    pub config: TunnelConfig,
    /// 客户端到服务端的链路；服务端忽略
    #[serde(default)]
    pub link: LinkSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficSpec {
    pub from: usize,
    /// 目的节点；缺省为广播
    #[serde(default)]
    pub to: Option<usize>,
    #[serde(default)]
    pub start_ms: u64,
    #[serde(default = "default_count")]
    pub count: u64,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_payload_bytes")]
    pub payload_bytes: usize,
    #[serde(default = "default_ether_type")]
    pub ether_type: u16,
}

fn default_count() -> u64 {
    1
}

fn default_interval_ms() -> u64 {
    10
}

fn default_payload_bytes() -> usize {
    100
}

fn default_ether_type() -> u16 {
    0x0800
}

/// 定时开关某个节点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchSpec {
    pub node: usize,
    pub at_ms: u64,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub server: NodeSpec,
    #[serde(default)]
    pub clients: Vec<NodeSpec>,
    #[serde(default)]
    pub traffic: Vec<TrafficSpec>,
    #[serde(default)]
    pub switches: Vec<SwitchSpec>,
    #[serde(default = "default_duration_ms")]
    pub duration_ms: u64,
}

fn default_duration_ms() -> u64 {
    5_000
}

/// 运行结束时的快照
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub now_ms: u64,
    pub world: WorldStats,
    pub endpoints: Vec<EndpointReport>,
    /// 每个节点上交的帧数
    pub received: Vec<usize>,
}

fn mac(last: u8) -> MacAddr {
    MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, last])
}

fn node_spec(addr: &str, id: MacAddr) -> Result<NodeSpec, ConfigError> {
    let address = addr.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
        field: "address",
        reason: e.to_string(),
    })?;
    Ok(NodeSpec {
        address,
        config: TunnelConfig::with_id(id),
        link: LinkSpec::default(),
    })
}

impl Scenario {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let scenario: Scenario = serde_json::from_str(raw)?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn from_path(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// 内置示例：两个客户端；小帧上行、超阈值的大帧下行（分片）、一次广播。
    pub fn demo(clients: usize, frames: u64, payload_bytes: usize) -> Result<Self, ConfigError> {
        let server = node_spec("10.0.0.1:4711", mac(1))?;
        let clients = (0..clients.min(200))
            .map(|i| node_spec(&format!("10.0.1.{}:4711", i + 1), mac(i as u8 + 2)))
            .collect::<Result<Vec<_>, _>>()?;
        let mut traffic = Vec::new();
        for i in 0..clients.len() {
            traffic.push(TrafficSpec {
                from: i + 1,
                to: Some(0),
                start_ms: 100,
                count: frames,
                interval_ms: 10,
                payload_bytes: 200,
                ether_type: default_ether_type(),
            });
            traffic.push(TrafficSpec {
                from: 0,
                to: Some(i + 1),
                start_ms: 150,
                count: frames,
                interval_ms: 10,
                payload_bytes,
                ether_type: default_ether_type(),
            });
        }
        if !clients.is_empty() {
            traffic.push(TrafficSpec {
                from: 0,
                to: None,
                start_ms: 200,
                count: 1,
                interval_ms: 10,
                payload_bytes: 64,
                ether_type: 0x0806,
            });
        }
        let scenario = Scenario {
            server,
            clients,
            traffic,
            switches: Vec::new(),
            duration_ms: default_duration_ms(),
        };
        scenario.validate()?;
        Ok(scenario)
    }

    fn node_count(&self) -> usize {
        1 + self.clients.len()
    }

    fn spec(&self, index: usize) -> Option<&NodeSpec> {
        if index == 0 {
            Some(&self.server)
        } else {
            self.clients.get(index - 1)
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.config.validate()?;
        for c in &self.clients {
            c.config.validate()?;
        }
        let n = self.node_count();
        for t in &self.traffic {
            if t.from >= n || t.to.is_some_and(|to| to >= n) {
                return Err(ConfigError::Invalid {
                    field: "traffic",
                    reason: format!("node index out of range (have {n} nodes)"),
                });
            }
        }
        if let Some(s) = self.switches.iter().find(|s| s.node >= n) {
            return Err(ConfigError::Invalid {
                field: "switches",
                reason: format!("node {} out of range (have {n} nodes)", s.node),
            });
        }
        Ok(())
    }

    /// 构造世界并调度全部初始事件。
    pub fn build(&self) -> Result<(Simulator, TunnelWorld), ConfigError> {
        self.validate()?;
        let mut sim = Simulator::default();
        let mut world = TunnelWorld::default();

        let server = world.add_endpoint(
            TunnelEndpoint::Server(TunnelServer::new(&self.server.config)),
            self.server.address,
        );
        for c in &self.clients {
            let mut config = c.config.clone();
            config.server_address.get_or_insert(self.server.address);
            let id = world.add_endpoint(TunnelEndpoint::Client(TunnelClient::new(&config)), c.address);
            world.add_link(
                Link::new(
                    id,
                    server,
                    SimTime::from_micros(c.link.latency_us),
                    c.link.bandwidth_mbps.saturating_mul(1_000_000),
                )
                .with_drop_every(c.link.drop_every),
            );
            // 客户端建好时是关闭的，由事件打开
            if config.enabled {
                sim.schedule(
                    SimTime::ZERO,
                    SetEnabled {
                        node: id,
                        enabled: true,
                    },
                );
            }
        }

        for s in &self.switches {
            sim.schedule(
                SimTime::from_millis(s.at_ms),
                SetEnabled {
                    node: NodeId(s.node),
                    enabled: s.enabled,
                },
            );
        }

        for t in &self.traffic {
            let (Some(from), to) = (self.spec(t.from), t.to.and_then(|i| self.spec(i))) else {
                continue;
            };
            let dst = to.map_or(MacAddr::BROADCAST, |s| s.config.interface_id);
            let payload: Vec<u8> = (0..t.payload_bytes).map(|i| (i % 251) as u8).collect();
            for k in 0..t.count {
                let at = SimTime::from_millis(t.start_ms.saturating_add(k.saturating_mul(t.interval_ms)));
                sim.schedule(
                    at,
                    InjectFrame {
                        node: NodeId(t.from),
                        frame: EthernetFrame::new(dst, from.config.interface_id, t.ether_type, &payload),
                    },
                );
            }
        }
        Ok((sim, world))
    }

    /// 跑到 `duration_ms` 为止
    pub fn run(&self) -> Result<(TunnelWorld, ScenarioReport), ConfigError> {
        let (mut sim, mut world) = self.build()?;
        let until = SimTime::from_millis(self.duration_ms);
        sim.run_until(until, &mut world);
        let report = ScenarioReport {
            now_ms: sim.now().as_millis(),
            world: world.stats,
            endpoints: world.reports(sim.now()),
            received: world.nodes().map(|(_, n)| n.received.len()).collect(),
        };
        Ok((world, report))
    }
}
