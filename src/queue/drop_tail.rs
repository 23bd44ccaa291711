//! DropTail（尾丢弃）队列
//!
//! 当队列容量不足时，直接丢弃新到达的帧。

use std::collections::VecDeque;

use crate::frame::EthernetFrame;

use super::FrameQueue;

#[derive(Debug)]
pub struct DropTailQueue {
    max_bytes: u64,
    cur_bytes: u64,
    q: VecDeque<EthernetFrame>,
}

impl DropTailQueue {
    pub fn new(max_bytes: u64) -> Self {
        Self {
            max_bytes,
            cur_bytes: 0,
            q: VecDeque::new(),
        }
    }
}

impl FrameQueue for DropTailQueue {
    fn enqueue(&mut self, frame: EthernetFrame) -> Result<(), EthernetFrame> {
        let sz = frame.size() as u64;
        if self.cur_bytes.saturating_add(sz) > self.max_bytes {
            return Err(frame);
        }
        self.cur_bytes = self.cur_bytes.saturating_add(sz);
        self.q.push_back(frame);
        Ok(())
    }

    fn dequeue(&mut self) -> Option<EthernetFrame> {
        let frame = self.q.pop_front()?;
        self.cur_bytes = self.cur_bytes.saturating_sub(frame.size() as u64);
        Some(frame)
    }

    fn len(&self) -> usize {
        self.q.len()
    }

    fn bytes(&self) -> u64 {
        self.cur_bytes
    }

    fn capacity_bytes(&self) -> u64 {
        self.max_bytes
    }
}
