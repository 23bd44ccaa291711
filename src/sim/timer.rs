//! 可取消定时器
//!
//! 定时器本身不持有回调，只记录截止时间与代数（generation）。
//! 每次 `arm`/`disable` 都会让代数加一，事件循环在触发时比较代数，
//! 旧的触发事件直接忽略，因此重复 arm 是幂等的。

use super::time::SimTime;
use tracing::trace;

#[derive(Debug, Clone)]
pub struct Timer {
    name: &'static str,
    deadline: Option<SimTime>,
    generation: u64,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            deadline: None,
            generation: 0,
        }
    }

    /// 设置（或重新设置）截止时间。
    pub fn arm(&mut self, at: SimTime) {
        self.deadline = Some(at);
        self.generation = self.generation.wrapping_add(1);
        trace!(timer = self.name, at = ?at, generation = self.generation, "定时器已设置");
    }

    /// 关闭定时器；已调度的触发事件会因代数不匹配而失效。
    pub fn disable(&mut self) {
        if self.deadline.take().is_some() {
            self.generation = self.generation.wrapping_add(1);
            trace!(timer = self.name, generation = self.generation, "定时器已关闭");
        }
    }

    pub fn deadline(&self) -> Option<SimTime> {
        self.deadline
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_enabled(&self) -> bool {
        self.deadline.is_some()
    }

    /// 截止时间已到（含等于）。
    pub fn is_due(&self, now: SimTime) -> bool {
        self.deadline.is_some_and(|d| d <= now)
    }
}
