//! 优先级队列（容量满时尾丢弃）
//!
//! 隧道控制帧先于已排队的数据帧出队。

use std::collections::VecDeque;

use crate::frame::EthernetFrame;
use crate::wire::is_tunnel_control;

use super::FrameQueue;

#[derive(Debug)]
pub struct PriorityQueue {
    max_bytes: u64,
    cur_bytes: u64,
    hi: VecDeque<EthernetFrame>,
    lo: VecDeque<EthernetFrame>,
}

impl PriorityQueue {
    pub fn new(max_bytes: u64) -> Self {
        Self {
            max_bytes,
            cur_bytes: 0,
            hi: VecDeque::new(),
            lo: VecDeque::new(),
        }
    }
}

impl FrameQueue for PriorityQueue {
    fn enqueue(&mut self, frame: EthernetFrame) -> Result<(), EthernetFrame> {
        let sz = frame.size() as u64;
        if self.cur_bytes.saturating_add(sz) > self.max_bytes {
            return Err(frame);
        }
        self.cur_bytes = self.cur_bytes.saturating_add(sz);
        if is_tunnel_control(&frame) {
            self.hi.push_back(frame);
        } else {
            self.lo.push_back(frame);
        }
        Ok(())
    }

    fn dequeue(&mut self) -> Option<EthernetFrame> {
        let frame = self.hi.pop_front().or_else(|| self.lo.pop_front())?;
        self.cur_bytes = self.cur_bytes.saturating_sub(frame.size() as u64);
        Some(frame)
    }

    fn len(&self) -> usize {
        self.hi.len().saturating_add(self.lo.len())
    }

    fn bytes(&self) -> u64 {
        self.cur_bytes
    }

    fn capacity_bytes(&self) -> u64 {
        self.max_bytes
    }
}
