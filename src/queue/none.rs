//! 不排队：任何帧都立即丢弃。

use crate::frame::EthernetFrame;

use super::FrameQueue;

#[derive(Debug, Default)]
pub struct NoneQueue;

impl FrameQueue for NoneQueue {
    fn enqueue(&mut self, frame: EthernetFrame) -> Result<(), EthernetFrame> {
        Err(frame)
    }

    fn dequeue(&mut self) -> Option<EthernetFrame> {
        None
    }

    fn len(&self) -> usize {
        0
    }

    fn bytes(&self) -> u64 {
        0
    }

    fn capacity_bytes(&self) -> u64 {
        0
    }
}
