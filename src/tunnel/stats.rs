//! 收发统计
//!
//! 每个收到的数据报恰好落进 data / control / ignored 之一；
//! 发送侧因为分片，一个帧可能对应多次 `tx_sent`。

use serde::Serialize;
use std::fmt::Write as _;

use crate::sim::SimTime;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IoStats {
    /// 本统计周期的起点
    pub since: SimTime,
    pub rx_packets: u64,
    pub rx_data: u64,
    pub rx_control: u64,
    pub rx_ignored: u64,
    pub tx_packets: u64,
    pub tx_sent: u64,
    pub tx_error: u64,
    pub tx_overrun: u64,
    pub tx_dropped: u64,
    /// 被切分发出的帧
    pub frag_out: u64,
    /// 重组完成的帧
    pub frag_in: u64,
}

impl IoStats {
    pub fn new(now: SimTime) -> Self {
        Self {
            since: now,
            ..Self::default()
        }
    }

    /// 返回当前统计并从 `now` 开始新的周期。
    pub fn take(&mut self, now: SimTime) -> IoStats {
        std::mem::replace(self, IoStats::new(now))
    }

    pub fn is_consistent(&self) -> bool {
        self.rx_control + self.rx_data + self.rx_ignored == self.rx_packets
    }

    pub fn dump(&self, now: SimTime) -> String {
        let ms = now.since(self.since).as_millis();
        // +1 避免除零
        let rate = |n: u64| n.saturating_mul(1000) / (ms + 1);
        let pct = |n: u64, of: u64| {
            if of == 0 {
                0.0
            } else {
                n as f64 / of as f64 * 100.0
            }
        };

        let mut s = String::new();
        let _ = write!(
            s,
            "(duration {ms} ms,rxRate {} pps,txRate {} pps,stats {}",
            rate(self.rx_packets),
            rate(self.tx_packets),
            if self.is_consistent() { "good" } else { "bad" }
        );
        let _ = write!(
            s,
            ";rxPackets {};rxData {} ({:.1}%),rxControl {} ({:.1}%),rxIgnored {} ({:.1}%)",
            self.rx_packets,
            self.rx_data,
            pct(self.rx_data, self.rx_packets),
            self.rx_control,
            pct(self.rx_control, self.rx_packets),
            self.rx_ignored,
            pct(self.rx_ignored, self.rx_packets),
        );
        let _ = write!(
            s,
            ";txPackets {},txSent {},txError {},txOverrun {},txDropped {}",
            self.tx_packets, self.tx_sent, self.tx_error, self.tx_overrun, self.tx_dropped,
        );
        let _ = write!(s, ";fragOut {},fragIn {})", self.frag_out, self.frag_in);
        s
    }
}
