//! 序列号跟踪
//!
//! 17 位模 131072 计数器：每个会话每个方向一个。收方向把
//! (收到的序列号, 上次记录的序列号) 映射成带符号的差值，用来
//! 区分按序、重复、丢失、乱序和重同步。这里全是纯函数，不依赖套接字或会话。

use serde::Serialize;

/// 序列号空间大小（2^17）
pub const SEQ_MODULUS: u32 = 0x20000;
const HALF_RANGE: i64 = (SEQ_MODULUS / 2) as i64;

/// 负跳变超过该值时视为对端重新开始计数
pub const RESYNC_THRESHOLD: i32 = 1024;

/// 模 131072 的带符号距离：`((incoming - last + 65536) mod 131072) - 65536`
pub fn seq_diff(incoming: u32, last: u32) -> i32 {
    let m = SEQ_MODULUS as i64;
    let d = (incoming as i64 - last as i64 + HALF_RANGE).rem_euclid(m) - HALF_RANGE;
    d as i32
}

/// 序列号加一（取模）
pub fn seq_next(seq: u32) -> u32 {
    (seq + 1) % SEQ_MODULUS
}

/// 一次分类的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqVerdict {
    pub diff: i32,
    /// 分类之后应记录的“上次序列号”
    pub last: u32,
    pub resync: bool,
}

impl SeqVerdict {
    pub fn is_in_order(&self) -> bool {
        self.diff == 1
    }

    pub fn is_duplicate(&self) -> bool {
        self.diff <= 0
    }

    pub fn is_reordered(&self) -> bool {
        self.diff < 0
    }

    pub fn loss(&self) -> u32 {
        loss_for_diff(self.diff)
    }
}

/// 由差值推出的丢失计数：前向跳变为 `diff - 1`，负跳变为 `-diff`。
pub fn loss_for_diff(diff: i32) -> u32 {
    match diff {
        d if d > 1 => (d - 1) as u32,
        d if d < 0 => d.unsigned_abs(),
        _ => 0,
    }
}

/// 分类 `incoming`；`last == None` 表示从未收到过该对端的数据。
pub fn classify(incoming: u32, last: Option<u32>) -> SeqVerdict {
    let incoming = incoming % SEQ_MODULUS;
    let Some(last) = last else {
        return SeqVerdict {
            diff: 1,
            last: incoming,
            resync: false,
        };
    };
    let diff = seq_diff(incoming, last);
    let resync = diff < -RESYNC_THRESHOLD;
    // 乱序/重复不回退基线；只有前进或重同步才更新
    let advance = diff > 0 || resync;
    SeqVerdict {
        diff,
        last: if advance { incoming } else { last },
        resync,
    }
}

/// 收方向状态：基线与各类计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RxSequence {
    pub last: Option<u32>,
    pub resyncs: u32,
    pub reordered: u32,
    pub duplicates: u32,
}

impl RxSequence {
    /// 分类并更新状态，返回差值。
    pub fn track(&mut self, incoming: u32) -> i32 {
        let v = classify(incoming, self.last);
        self.last = Some(v.last);
        if v.resync {
            self.resyncs = self.resyncs.saturating_add(1);
        }
        self.reordered = self.reordered.saturating_add((v.diff < 0) as u32);
        self.duplicates = self.duplicates.saturating_add((v.diff == 0) as u32);
        v.diff
    }
}

/// 发方向计数器
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TxSequence(pub u32);

impl TxSequence {
    /// 返回当前序列号并前进一步
    pub fn next(&mut self) -> u32 {
        let s = self.0;
        self.0 = seq_next(s);
        s
    }

    pub fn current(&self) -> u32 {
        self.0
    }
}
