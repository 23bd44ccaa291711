//! 虚拟网络
//!
//! 把隧道端点放进事件循环：每个端点一个内存套接字，端点之间是带时延、
//! 带宽和可选丢包的虚拟链路。`Scenario` 从 JSON 描述搭建整套环境。

mod deliver_datagram;
mod id;
mod inject_frame;
mod link;
mod scenario;
mod set_enabled;
mod timer_fired;
mod world;

pub use deliver_datagram::DeliverDatagram;
pub use id::{LinkId, NodeId};
pub use inject_frame::InjectFrame;
pub use link::Link;
pub use scenario::{LinkSpec, NodeSpec, Scenario, ScenarioReport, SwitchSpec, TrafficSpec};
pub use set_enabled::SetEnabled;
pub use timer_fired::TimerFired;
pub use world::{Node, TunnelWorld, WorldStats};
