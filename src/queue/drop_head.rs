//! DropHead（头丢弃）队列
//!
//! 容量不足时丢弃最老的帧，为新帧腾出空间；单帧就超过容量时丢新帧。

use std::collections::VecDeque;

use crate::frame::EthernetFrame;

use super::FrameQueue;

#[derive(Debug)]
pub struct DropHeadQueue {
    max_bytes: u64,
    cur_bytes: u64,
    q: VecDeque<EthernetFrame>,
}

impl DropHeadQueue {
    pub fn new(max_bytes: u64) -> Self {
        Self {
            max_bytes,
            cur_bytes: 0,
            q: VecDeque::new(),
        }
    }
}

impl FrameQueue for DropHeadQueue {
    fn enqueue(&mut self, frame: EthernetFrame) -> Result<(), EthernetFrame> {
        let sz = frame.size() as u64;
        if sz > self.max_bytes {
            return Err(frame);
        }
        // 只把第一个被挤掉的帧交还给调用方计数
        let mut evicted = None;
        while self.cur_bytes.saturating_add(sz) > self.max_bytes {
            let Some(old) = self.q.pop_front() else {
                break;
            };
            self.cur_bytes = self.cur_bytes.saturating_sub(old.size() as u64);
            evicted.get_or_insert(old);
        }
        self.cur_bytes = self.cur_bytes.saturating_add(sz);
        self.q.push_back(frame);
        match evicted {
            Some(old) => Err(old),
            None => Ok(()),
        }
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
