//! 接口开关事件

use super::id::NodeId;
use super::world::TunnelWorld;
use crate::sim::{Event, Simulator, World};
use tracing::{info, warn};

#[derive(Debug)]
pub struct SetEnabled {
    pub node: NodeId,
    pub enabled: bool,
}

impl Event for SetEnabled {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let SetEnabled { node, enabled } = *self;
        let Some(w) = world.as_any_mut().downcast_mut::<TunnelWorld>() else {
            warn!("world is not a TunnelWorld");
            return;
        };
        info!(?node, enabled, now = ?sim.now(), "切换接口状态");
        w.set_enabled(node, enabled, sim.now());
    }
}
