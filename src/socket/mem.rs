//! 内存套接字
//!
//! 入站与出站各一个 FIFO；出站可设上限来模拟“不可写”，也可强制写失败。
//! 事件循环里的虚拟链路和单元测试都用它。

use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;

use super::DatagramSocket;

#[derive(Debug)]
pub struct MemSocket {
    local: SocketAddr,
    inbox: VecDeque<(SocketAddr, Vec<u8>)>,
    outbox: VecDeque<(SocketAddr, Vec<u8>)>,
    /// 出站 FIFO 达到该长度即不可写
    outbox_limit: Option<usize>,
    fail_writes: bool,
}

impl MemSocket {
    pub fn new(local: SocketAddr) -> Self {
        Self {
            local,
            inbox: VecDeque::new(),
            outbox: VecDeque::new(),
            outbox_limit: None,
            fail_writes: false,
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    pub fn set_outbox_limit(&mut self, limit: Option<usize>) {
        self.outbox_limit = limit;
    }

    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// 注入一个“从网络收到”的数据报
    pub fn push_inbound(&mut self, from: SocketAddr, bytes: Vec<u8>) {
        self.inbox.push_back((from, bytes));
    }

    pub fn has_inbound(&self) -> bool {
        !self.inbox.is_empty()
    }

    /// 取走全部已写出的数据报
    pub fn take_outbound(&mut self) -> Vec<(SocketAddr, Vec<u8>)> {
        self.outbox.drain(..).collect()
    }

    /// 取走最早写出的一个数据报
    pub fn pop_outbound(&mut self) -> Option<(SocketAddr, Vec<u8>)> {
        self.outbox.pop_front()
    }

    pub fn outbound_len(&self) -> usize {
        self.outbox.len()
    }
}

impl DatagramSocket for MemSocket {
    fn recv_from(&mut self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>> {
        let Some((from, bytes)) = self.inbox.pop_front() else {
            return Ok(None);
        };
        // 与 UDP 一致：缓冲区不够时截断
        let n = bytes.len().min(buf.len());
        buf[..n].copy_from_slice(&bytes[..n]);
        Ok(Some((n, from)))
    }

    fn send_to(&mut self, buf: &[u8], addr: SocketAddr) -> io::Result<usize> {
        if self.fail_writes {
            return Err(io::Error::other("write failure injected"));
        }
        if !self.writable() {
            return Err(io::ErrorKind::WouldBlock.into());
        }
        self.outbox.push_back((addr, buf.to_vec()));
        Ok(buf.len())
    }

    fn writable(&self) -> bool {
        self.outbox_limit.is_none_or(|limit| self.outbox.len() < limit)
    }
}
