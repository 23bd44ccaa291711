//! 时间类型
//!
//! 隧道的所有超时（会话空闲超时、客户端保活）都以 `SimTime` 计量，
//! 由事件循环或调用方传入当前时刻，内核本身从不读取墙钟。

use serde::{Deserialize, Serialize};

/// 时间点 / 时长（纳秒）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct SimTime(pub u64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0);

    pub const fn from_micros(us: u64) -> SimTime {
        SimTime(us.saturating_mul(1_000))
    }
    pub const fn from_millis(ms: u64) -> SimTime {
        SimTime(ms.saturating_mul(1_000_000))
    }
    pub const fn from_secs(s: u64) -> SimTime {
        SimTime(s.saturating_mul(1_000_000_000))
    }

    pub fn as_millis(self) -> u64 {
        self.0 / 1_000_000
    }

    pub fn as_secs(self) -> u64 {
        self.0 / 1_000_000_000
    }

    /// `self + d`，溢出时饱和。
    pub fn after(self, d: SimTime) -> SimTime {
        SimTime(self.0.saturating_add(d.0))
    }

    /// 从 `earlier` 到 `self` 经过的时长；`earlier` 在未来时为 0。
    pub fn since(self, earlier: SimTime) -> SimTime {
        SimTime(self.0.saturating_sub(earlier.0))
    }
}

impl From<std::time::Duration> for SimTime {
    fn from(d: std::time::Duration) -> Self {
        SimTime(d.as_nanos().min(u64::MAX as u128) as u64)
    }
}
