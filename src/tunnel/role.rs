//! 角色能力
//!
//! 收发骨架归传输内核；凡是取决于对端是谁的部分（会话查找、序列号计数、
//! 控制状态机）都通过这个 trait 问角色。

use std::net::SocketAddr;

use crate::frame::{EthernetFrame, MacAddr};
use crate::sim::SimTime;
use crate::wire::{TunnelControl, TunnelHeader};

/// 帧发往哪里，以及超过多大要分片
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxInfo {
    pub addr: SocketAddr,
    /// 每个数据报的以太网载荷上限
    pub threshold: u32,
}

/// 角色要回的控制消息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlReply {
    pub dst: MacAddr,
    pub reply_to: SocketAddr,
    pub ctrl: TunnelControl,
}

pub trait TunnelRole {
    /// 把 `frame` 的隧道头写进 `out`。控制帧序列号为 0，
    /// 数据帧取目的对端计数器的下一个值。
    fn prepend_header(&mut self, frame: &EthernetFrame, out: &mut Vec<u8>);

    /// 对端（`frame.annotations.peer`）的 UDP 地址与分片阈值；对端未知时为 `None`。
    fn tx_info(&self, frame: &EthernetFrame) -> Option<TxInfo>;

    fn handle_control(
        &mut self,
        frame: &EthernetFrame,
        ctrl: TunnelControl,
        src: SocketAddr,
        now: SimTime,
    ) -> Option<ControlReply>;

    /// 按 `src` 对应的对端给隧道头的序列号分类，返回差值。
    fn process_sequence(&mut self, header: &TunnelHeader, src: SocketAddr) -> i32;

    fn is_established_for_write(&self, frame: &EthernetFrame) -> bool;

    fn dump_info(&self, now: SimTime, out: &mut String);
}
