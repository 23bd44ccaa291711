//! 世界 trait
//!
//! 事件循环之外的全部状态（隧道端点、虚拟链路）都放在世界里。

use super::simulator::Simulator;
use std::any::Any;

/// 由业务层实现；`on_tick` 在每个事件之后调用，用于同步定时器。
pub trait World: Any {
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn on_tick(&mut self, _sim: &mut Simulator) {}
}
