//! 虚拟链路
//!
//! 两个端点之间的双向 UDP 路径：固定传播时延、按带宽串行化，
//! 可选的确定性丢包（每 N 个数据报丢一个），便于复现丢失/乱序场景。

use super::id::NodeId;
use crate::sim::SimTime;

#[derive(Debug)]
pub struct Link {
    pub a: NodeId,
    pub b: NodeId,
    pub latency: SimTime,
    /// 0 表示不限速
    pub bandwidth_bps: u64,
    /// 每个方向各自串行化：[a→b, b→a]
    busy_until: [SimTime; 2],
    /// 每个方向第 N、2N、… 个数据报被丢弃；None 不丢
    pub drop_every: Option<u64>,
    sent: [u64; 2],
}

impl Link {
    pub fn new(a: NodeId, b: NodeId, latency: SimTime, bandwidth_bps: u64) -> Self {
        Self {
            a,
            b,
            latency,
            bandwidth_bps,
            busy_until: [SimTime::ZERO; 2],
            drop_every: None,
            sent: [0; 2],
        }
    }

    pub fn with_drop_every(mut self, n: Option<u64>) -> Self {
        self.drop_every = n.filter(|n| *n > 0);
        self
    }

    pub fn connects(&self, x: NodeId, y: NodeId) -> bool {
        (self.a == x && self.b == y) || (self.a == y && self.b == x)
    }

    fn direction(&self, from: NodeId) -> usize {
        if from == self.a { 0 } else { 1 }
    }

    /// 传输指定字节数所需的时间
    pub(crate) fn tx_time(&self, bytes: usize) -> SimTime {
        // ceil(bytes*8 / bps) 秒 -> 纳秒
        if self.bandwidth_bps == 0 {
            return SimTime::ZERO;
        }
        let bits = (bytes as u128).saturating_mul(8);
        let nanos = (bits.saturating_mul(1_000_000_000u128) + (self.bandwidth_bps as u128 - 1))
            / self.bandwidth_bps as u128;
        SimTime(nanos.min(u64::MAX as u128) as u64)
    }

    /// 从 `from` 发出一个数据报：返回到达时刻；被丢弃返回 `None`。
    pub(crate) fn transmit(&mut self, from: NodeId, bytes: usize, now: SimTime) -> Option<SimTime> {
        let dir = self.direction(from);
        self.sent[dir] += 1;
        if self.drop_every.is_some_and(|n| self.sent[dir] % n == 0) {
            return None;
        }
        let start = now.max(self.busy_until[dir]);
        let depart = start.after(self.tx_time(bytes));
        self.busy_until[dir] = depart;
        Some(depart.after(self.latency))
    }

    /// [a→b, b→a] 各方向已发送（含丢弃）的数据报数
    pub fn sent(&self) -> [u64; 2] {
        self.sent
    }
}
