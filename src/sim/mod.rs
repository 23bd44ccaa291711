//! 事件循环模块
//!
//! 单线程事件驱动循环：时间、事件、世界、定时器。

// 子模块声明
mod event;
mod scheduled_event;
mod simulator;
mod time;
mod timer;
mod world;

// 重新导出公共接口
pub use event::Event;
pub use scheduled_event::ScheduledEvent;
pub use simulator::Simulator;
pub use time::SimTime;
pub use timer::Timer;
pub use world::World;
