//! 定时器触发事件

use super::id::NodeId;
use super::world::TunnelWorld;
use crate::sim::{Event, Simulator, World};
use tracing::warn;

/// 事件：端点定时器到期。`generation` 不再匹配时端点会忽略它。
#[derive(Debug)]
pub struct TimerFired {
    pub node: NodeId,
    pub generation: u64,
}

impl Event for TimerFired {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let TimerFired { node, generation } = *self;
        let Some(w) = world.as_any_mut().downcast_mut::<TunnelWorld>() else {
            warn!("world is not a TunnelWorld");
            return;
        };
        w.fire_timer(node, generation, sim.now());
    }
}
