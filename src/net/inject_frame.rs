//! 帧注入事件（隧道入口）

use super::id::NodeId;
use super::world::TunnelWorld;
use crate::frame::EthernetFrame;
use crate::sim::{Event, Simulator, World};
use tracing::{debug, warn};

/// 事件：本地协议栈把一个以太网帧交给端点发送。
#[derive(Debug)]
pub struct InjectFrame {
    pub node: NodeId,
    pub frame: EthernetFrame,
}

impl Event for InjectFrame {
    #[tracing::instrument(skip(self, sim, world), fields(node = ?self.node, dst = %self.frame.destination(), size = self.frame.size()))]
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let InjectFrame { node, frame } = *self;
        let Some(w) = world.as_any_mut().downcast_mut::<TunnelWorld>() else {
            warn!("world is not a TunnelWorld");
            return;
        };
        if !w.inject(node, frame) {
            debug!(now = ?sim.now(), "端点拒绝发送");
        }
    }
}
