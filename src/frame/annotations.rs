//! 帧注解：只在进程内随帧传递，不上线。

use std::net::SocketAddr;

use serde::Serialize;

use super::mac::MacAddr;
use crate::sim::SimTime;

/// 隧道链路没有射频测量，用固定基线（比原生以太网低一级）。
pub const TUNNEL_RSSI: i16 = 126;
pub const TUNNEL_NOISE: i16 = -128;

/// 链路质量注解
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Quality {
    pub rssi: i16,
    pub noise: i16,
    pub snr: i16,
    pub frame_length: u32,
    pub duplicate: bool,
    pub reordered: bool,
    /// 本帧之前估计丢失的帧数
    pub loss: u32,
}

impl Quality {
    pub fn tunnel_baseline(frame_length: usize) -> Self {
        Self {
            rssi: TUNNEL_RSSI,
            noise: TUNNEL_NOISE,
            snr: TUNNEL_RSSI - TUNNEL_NOISE,
            frame_length: frame_length.min(u32::MAX as usize) as u32,
            ..Self::default()
        }
    }

    pub fn add_loss(&mut self, n: u32) {
        self.loss = self.loss.saturating_add(n);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotations {
    /// 收方向：接收接口的标识。
    pub interface: MacAddr,
    /// 发方向：目的身份（会话的 MAC）。
    pub peer: MacAddr,
    /// 接收时间戳
    pub timestamp: Option<SimTime>,
    pub quality: Quality,
    /// 控制应答直接发回请求的源地址，不经过会话查找。
    pub reply_to: Option<SocketAddr>,
}
