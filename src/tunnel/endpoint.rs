//! 事件循环面对的统一端点

use serde::Serialize;

use super::client::{ClientStatus, TunnelClient};
use super::server::{SessionInfo, TunnelServer};
use super::stats::IoStats;
use crate::frame::{EthernetFrame, MacAddr};
use crate::sim::{SimTime, Timer};
use crate::socket::DatagramSocket;

/// 端点快照，供 `--json` 输出
#[derive(Debug, Clone, Serialize)]
pub struct EndpointReport {
    pub id: MacAddr,
    pub role: &'static str,
    pub enabled: bool,
    pub stats: IoStats,
    pub fragmented: u64,
    pub reassembled: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sessions: Option<Vec<SessionInfo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<ClientStatus>,
}

#[derive(Debug)]
pub enum TunnelEndpoint {
    Server(TunnelServer),
    Client(TunnelClient),
}

impl TunnelEndpoint {
    pub fn id(&self) -> MacAddr {
        match self {
            TunnelEndpoint::Server(s) => s.id(),
            TunnelEndpoint::Client(c) => c.id(),
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            TunnelEndpoint::Server(_) => "server",
            TunnelEndpoint::Client(_) => "client",
        }
    }

    pub fn enabled(&self) -> bool {
        match self {
            TunnelEndpoint::Server(s) => s.enabled(),
            TunnelEndpoint::Client(c) => c.enabled(),
        }
    }

    pub fn timer(&self) -> &Timer {
        match self {
            TunnelEndpoint::Server(s) => s.timer(),
            TunnelEndpoint::Client(c) => c.timer(),
        }
    }

    pub fn set_enabled(&mut self, sock: &mut dyn DatagramSocket, enabled: bool, now: SimTime) {
        match self {
            TunnelEndpoint::Server(s) => s.set_enabled(sock, enabled),
            TunnelEndpoint::Client(c) => c.set_enabled(sock, enabled, now),
        }
    }

    pub fn read_packet(&mut self, sock: &mut dyn DatagramSocket, now: SimTime) -> Option<EthernetFrame> {
        match self {
            TunnelEndpoint::Server(s) => s.read_packet(sock, now),
            TunnelEndpoint::Client(c) => c.read_packet(sock, now),
        }
    }

    pub fn write_packet(&mut self, sock: &mut dyn DatagramSocket, frame: EthernetFrame) -> bool {
        match self {
            TunnelEndpoint::Server(s) => s.write_packet(sock, frame),
            TunnelEndpoint::Client(c) => c.write_packet(sock, frame),
        }
    }

    pub fn on_timer(&mut self, sock: &mut dyn DatagramSocket, now: SimTime, generation: u64) {
        match self {
            TunnelEndpoint::Server(s) => s.on_timer(now, generation),
            TunnelEndpoint::Client(c) => c.on_timer(sock, now, generation),
        }
    }

    pub fn dump_info(&self, now: SimTime) -> String {
        match self {
            TunnelEndpoint::Server(s) => s.dump_info(now),
            TunnelEndpoint::Client(c) => c.dump_info(now),
        }
    }

    pub fn report(&self, now: SimTime) -> EndpointReport {
        let core = match self {
            TunnelEndpoint::Server(s) => s.core(),
            TunnelEndpoint::Client(c) => c.core(),
        };
        EndpointReport {
            id: self.id(),
            role: self.role(),
            enabled: self.enabled(),
            stats: *core.stats(),
            fragmented: core.fragmentation_count(),
            reassembled: core.reassembled_count(),
            sessions: match self {
                TunnelEndpoint::Server(s) => Some(s.sessions(now)),
                TunnelEndpoint::Client(_) => None,
            },
            client: match self {
                TunnelEndpoint::Client(c) => Some(c.status(now)),
                TunnelEndpoint::Server(_) => None,
            },
        }
    }
}
