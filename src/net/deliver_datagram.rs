//! 数据报到达事件

use std::net::SocketAddr;

use super::id::NodeId;
use super::world::TunnelWorld;
use crate::sim::{Event, Simulator, World};
use tracing::{trace, warn};

/// 事件：一个 UDP 数据报到达某个端点的套接字。
#[derive(Debug)]
pub struct DeliverDatagram {
    pub to: NodeId,
    pub from: SocketAddr,
    pub bytes: Vec<u8>,
}

impl Event for DeliverDatagram {
    #[tracing::instrument(skip(self, sim, world), fields(to = ?self.to, from = %self.from, len = self.bytes.len()))]
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let DeliverDatagram { to, from, bytes } = *self;
        let Some(w) = world.as_any_mut().downcast_mut::<TunnelWorld>() else {
            warn!("world is not a TunnelWorld");
            return;
        };
        trace!(now = ?sim.now(), "数据报到达");
        w.deliver(to, from, bytes, sim.now());
    }
}
