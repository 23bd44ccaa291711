//! 排队策略（Queue disciplines）
//!
//! 套接字不可写时，发送路径把帧交给排队策略；策略满了由它自己决定丢谁。
//! 默认是 `NoneQueue`：什么都不排，直接丢。

use serde::{Deserialize, Serialize};

use crate::frame::EthernetFrame;

mod drop_head;
mod drop_tail;
mod none;
mod priority;

pub use drop_head::DropHeadQueue;
pub use drop_tail::DropTailQueue;
pub use none::NoneQueue;
pub use priority::PriorityQueue;

/// 一个满长以太网帧
pub const DEFAULT_FRAME_BYTES: u64 = 1514;

pub fn mem_from_frames(frames: u64) -> u64 {
    frames.saturating_mul(DEFAULT_FRAME_BYTES)
}

/// 帧队列抽象
pub trait FrameQueue: std::fmt::Debug {
    /// 入队：成功返回 Ok；被丢弃的帧（不一定是新帧）放在 Err 里返回
    fn enqueue(&mut self, frame: EthernetFrame) -> Result<(), EthernetFrame>;
    /// 出队：按队列策略返回下一个帧
    fn dequeue(&mut self) -> Option<EthernetFrame>;

    fn len(&self) -> usize;
    fn bytes(&self) -> u64;
    fn capacity_bytes(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 运行时可选的策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueKind {
    #[default]
    None,
    DropTail,
    DropHead,
    Priority,
}

impl QueueKind {
    pub fn build(self, max_bytes: u64) -> Box<dyn FrameQueue> {
        match self {
            QueueKind::None => Box::new(NoneQueue),
            QueueKind::DropTail => Box::new(DropTailQueue::new(max_bytes)),
            QueueKind::DropHead => Box::new(DropHeadQueue::new(max_bytes)),
            QueueKind::Priority => Box::new(PriorityQueue::new(max_bytes)),
        }
    }
}
