//! `std::net::UdpSocket` 适配
//!
//! 调用方需先 `set_nonblocking(true)`。标准库无法查询可写性，
//! 这里总是报告可写；内核态缓冲满时 `send_to` 返回 `WouldBlock`，
//! 按写失败计数丢弃，与隧道“不重传”的语义一致。

use std::io;
use std::net::{SocketAddr, UdpSocket};

use super::DatagramSocket;

impl DatagramSocket for UdpSocket {
    fn recv_from(&mut self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>> {
        match UdpSocket::recv_from(self, buf) {
            Ok((n, from)) => Ok(Some((n, from))),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn send_to(&mut self, buf: &[u8], addr: SocketAddr) -> io::Result<usize> {
        UdpSocket::send_to(self, buf, addr)
    }

    fn writable(&self) -> bool {
        true
    }
}
