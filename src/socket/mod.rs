//! 数据报套接字边界
//!
//! 内核只需要三件事：读一个带源地址的数据报、向某地址写一个数据报、
//! 询问当前是否可写。真实 UDP 与内存套接字都实现同一个 trait。

use std::io;
use std::net::SocketAddr;

mod mem;
mod udp;

pub use mem::MemSocket;

/// 单个数据报的最大长度
pub const MAX_DATAGRAM: usize = 65_535;

/// 非阻塞数据报套接字
pub trait DatagramSocket {
    /// 读一个数据报；当前没有数据时返回 `Ok(None)`。
    fn recv_from(&mut self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>>;
    /// 写一个数据报。
    fn send_to(&mut self, buf: &[u8], addr: SocketAddr) -> io::Result<usize>;
    /// 轮询式可写判断。
    fn writable(&self) -> bool;
}
