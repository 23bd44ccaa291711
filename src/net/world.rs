//! 隧道世界
//!
//! 持有若干隧道端点（各带一个内存套接字）和连接它们的虚拟链路。
//! 每个事件之后 `on_tick` 做两件事：把各套接字出站队列里的数据报放上链路，
//! 以及为定时器代数有变化的端点调度新的 `TimerFired`。

use std::any::Any;
use std::collections::HashMap;
use std::net::SocketAddr;

use serde::Serialize;
use tracing::{debug, trace};

use super::deliver_datagram::DeliverDatagram;
use super::id::{LinkId, NodeId};
use super::link::Link;
use super::timer_fired::TimerFired;
use crate::frame::EthernetFrame;
use crate::sim::{SimTime, Simulator, World};
use crate::socket::MemSocket;
use crate::tunnel::{EndpointReport, TunnelEndpoint};

/// 世界级计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorldStats {
    pub datagrams_sent: u64,
    pub datagrams_delivered: u64,
    pub datagrams_lost: u64,
    pub no_route: u64,
    pub frames_injected: u64,
    pub frames_rejected: u64,
}

#[derive(Debug)]
pub struct Node {
    pub endpoint: TunnelEndpoint,
    pub sock: MemSocket,
    /// 已为其调度 `TimerFired` 的定时器代数
    scheduled_generation: Option<u64>,
    /// 上交给本端的帧（隧道出口）
    pub received: Vec<EthernetFrame>,
}

impl Node {
    pub fn addr(&self) -> SocketAddr {
        self.sock.local_addr()
    }
}

#[derive(Debug, Default)]
pub struct TunnelWorld {
    nodes: Vec<Node>,
    links: Vec<Link>,
    by_addr: HashMap<SocketAddr, NodeId>,
    pub stats: WorldStats,
}

impl TunnelWorld {
    pub fn add_endpoint(&mut self, endpoint: TunnelEndpoint, addr: SocketAddr) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            endpoint,
            sock: MemSocket::new(addr),
            scheduled_generation: None,
            received: Vec::new(),
        });
        self.by_addr.insert(addr, id);
        id
    }

    pub fn add_link(&mut self, link: Link) -> LinkId {
        let id = LinkId(self.links.len());
        self.links.push(link);
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(id.0)
    }

    pub fn lookup(&self, addr: &SocketAddr) -> Option<NodeId> {
        self.by_addr.get(addr).copied()
    }

    pub fn reports(&self, now: SimTime) -> Vec<EndpointReport> {
        self.nodes.iter().map(|n| n.endpoint.report(now)).collect()
    }

    /// 把数据报交给目的端点的套接字，并读空它。
    pub(crate) fn deliver(&mut self, to: NodeId, from: SocketAddr, bytes: Vec<u8>, now: SimTime) {
        let Some(node) = self.nodes.get_mut(to.0) else {
            debug!(?to, "目的节点不存在");
            return;
        };
        self.stats.datagrams_delivered += 1;
        node.sock.push_inbound(from, bytes);
        while node.sock.has_inbound() {
            if let Some(frame) = node.endpoint.read_packet(&mut node.sock, now) {
                trace!(?to, size = frame.size(), src = %frame.source(), "帧上交");
                node.received.push(frame);
            }
        }
    }

    pub(crate) fn fire_timer(&mut self, id: NodeId, generation: u64, now: SimTime) {
        let Some(node) = self.nodes.get_mut(id.0) else {
            return;
        };
        if node.scheduled_generation == Some(generation) {
            node.scheduled_generation = None;
        }
        node.endpoint.on_timer(&mut node.sock, now, generation);
    }

    pub(crate) fn inject(&mut self, id: NodeId, frame: EthernetFrame) -> bool {
        let Some(node) = self.nodes.get_mut(id.0) else {
            return false;
        };
        let ok = node.endpoint.write_packet(&mut node.sock, frame);
        if ok {
            self.stats.frames_injected += 1;
        } else {
            self.stats.frames_rejected += 1;
        }
        ok
    }

    pub(crate) fn set_enabled(&mut self, id: NodeId, enabled: bool, now: SimTime) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.endpoint.set_enabled(&mut node.sock, enabled, now);
        }
    }

    /// 出站数据报放上链路
    fn route_outbound(&mut self, sim: &mut Simulator) {
        let now = sim.now();
        for i in 0..self.nodes.len() {
            let from = NodeId(i);
            let src_addr = self.nodes[i].addr();
            for (dst_addr, bytes) in self.nodes[i].sock.take_outbound() {
                self.stats.datagrams_sent += 1;
                let Some(to) = self.by_addr.get(&dst_addr).copied() else {
                    trace!(%dst_addr, "没有该地址的端点");
                    self.stats.no_route += 1;
                    continue;
                };
                let Some(link) = self.links.iter_mut().find(|l| l.connects(from, to)) else {
                    trace!(?from, ?to, "两端之间没有链路");
                    self.stats.no_route += 1;
                    continue;
                };
                match link.transmit(from, bytes.len(), now) {
                    Some(at) => sim.schedule(
                        at,
                        DeliverDatagram {
                            to,
                            from: src_addr,
                            bytes,
                        },
                    ),
                    None => {
                        trace!(?from, ?to, "链路丢弃数据报");
                        self.stats.datagrams_lost += 1;
                    }
                }
            }
        }
    }

    /// 定时器代数变了就补一个触发事件；旧事件到时会因代数不符被忽略。
    fn sync_timers(&mut self, sim: &mut Simulator) {
        for (i, node) in self.nodes.iter_mut().enumerate() {
            let timer = node.endpoint.timer();
            let Some(deadline) = timer.deadline() else {
                continue;
            };
            let generation = timer.generation();
            if node.scheduled_generation == Some(generation) {
                continue;
            }
            node.scheduled_generation = Some(generation);
            sim.schedule(
                deadline,
                TimerFired {
                    node: NodeId(i),
                    generation,
                },
            );
        }
    }
}

impl World for TunnelWorld {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn on_tick(&mut self, sim: &mut Simulator) {
        self.route_outbound(sim);
        self.sync_timers(sim);
    }
}
