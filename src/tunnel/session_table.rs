//! 服务端会话表
//!
//! 一个槽位数组 + 三个辅助索引：
//! - `by_mac`：MAC 唯一；
//! - `by_addr`：UDP 地址唯一，可变；
//! - `by_last_seen`：按最后活跃时间排序（非唯一，用插入戳打破并列），队头就是最该淘汰的会话。
//!
//! 会话的三个键只能经由本模块的方法修改，三个索引在每次调用内一起更新。
//! 外部拿到的是 `SessionKey`（槽位下标 + 代号），会话删除后旧键自动失效。

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;

use crate::frame::MacAddr;
use crate::seq::{RxSequence, TxSequence};
use crate::sim::SimTime;
use crate::wire::Capacity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey {
    index: usize,
    generation: u64,
}

/// 会话里不参与索引的部分
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionState {
    pub capacity: Capacity,
    pub tx: TxSequence,
    pub rx: RxSequence,
    pub fragmentation_threshold: u32,
}

impl SessionState {
    pub fn new(capacity: Capacity, fragmentation_threshold: u32) -> Self {
        Self {
            capacity,
            tx: TxSequence::default(),
            rx: RxSequence::default(),
            fragmentation_threshold,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    mac: MacAddr,
    addr: SocketAddr,
    last_seen: SimTime,
    stamp: u64,
    pub state: SessionState,
}

impl Session {
    pub fn mac(&self) -> MacAddr {
        self.mac
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn last_seen(&self) -> SimTime {
        self.last_seen
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    session: Option<Session>,
}

#[derive(Debug, Default)]
pub struct SessionTable {
    slots: Vec<Slot>,
    free: Vec<usize>,
    by_mac: HashMap<MacAddr, SessionKey>,
    by_addr: HashMap<SocketAddr, SessionKey>,
    by_last_seen: BTreeMap<(SimTime, u64), SessionKey>,
    next_stamp: u64,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_mac.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_mac.is_empty()
    }

    fn stamp(&mut self) -> u64 {
        let s = self.next_stamp;
        self.next_stamp += 1;
        s
    }

    /// 插入新会话；MAC 或地址已被占用时返回 `None`，表不变。
    pub fn insert(
        &mut self,
        mac: MacAddr,
        addr: SocketAddr,
        now: SimTime,
        state: SessionState,
    ) -> Option<SessionKey> {
        if self.by_mac.contains_key(&mac) || self.by_addr.contains_key(&addr) {
            return None;
        }
        let stamp = self.stamp();
        let session = Session {
            mac,
            addr,
            last_seen: now,
            stamp,
            state,
        };
        let index = match self.free.pop() {
            Some(i) => i,
            None => {
                self.slots.push(Slot::default());
                self.slots.len() - 1
            }
        };
        let slot = &mut self.slots[index];
        slot.session = Some(session);
        let key = SessionKey {
            index,
            generation: slot.generation,
        };
        self.by_mac.insert(mac, key);
        self.by_addr.insert(addr, key);
        self.by_last_seen.insert((now, stamp), key);
        Some(key)
    }

    pub fn get(&self, key: SessionKey) -> Option<&Session> {
        let slot = self.slots.get(key.index)?;
        if slot.generation != key.generation {
            return None;
        }
        slot.session.as_ref()
    }

    fn get_mut(&mut self, key: SessionKey) -> Option<&mut Session> {
        let slot = self.slots.get_mut(key.index)?;
        if slot.generation != key.generation {
            return None;
        }
        slot.session.as_mut()
    }

    /// 非索引字段可以直接改
    pub fn state_mut(&mut self, key: SessionKey) -> Option<&mut SessionState> {
        self.get_mut(key).map(|s| &mut s.state)
    }

    pub fn find_by_mac(&self, mac: &MacAddr) -> Option<SessionKey> {
        self.by_mac.get(mac).copied()
    }

    pub fn find_by_addr(&self, addr: &SocketAddr) -> Option<SessionKey> {
        self.by_addr.get(addr).copied()
    }

    /// 刷新最后活跃时间
    pub fn touch(&mut self, key: SessionKey, now: SimTime) -> bool {
        let stamp = self.stamp();
        let Some(session) = self.get_mut(key) else {
            return false;
        };
        let old = (session.last_seen, session.stamp);
        session.last_seen = now;
        session.stamp = stamp;
        self.by_last_seen.remove(&old);
        self.by_last_seen.insert((now, stamp), key);
        true
    }

    /// 修改会话地址；地址属于别的会话时拒绝。
    pub fn update_addr(&mut self, key: SessionKey, addr: SocketAddr) -> bool {
        match self.by_addr.get(&addr) {
            Some(owner) if *owner == key => return true,
            Some(_) => return false,
            None => {}
        }
        let Some(session) = self.get_mut(key) else {
            return false;
        };
        let old = std::mem::replace(&mut session.addr, addr);
        self.by_addr.remove(&old);
        self.by_addr.insert(addr, key);
        true
    }

    pub fn remove(&mut self, key: SessionKey) -> Option<Session> {
        let slot = self.slots.get_mut(key.index)?;
        if slot.generation != key.generation {
            return None;
        }
        let session = slot.session.take()?;
        slot.generation += 1;
        self.free.push(key.index);
        self.by_mac.remove(&session.mac);
        self.by_addr.remove(&session.addr);
        self.by_last_seen.remove(&(session.last_seen, session.stamp));
        Some(session)
    }

    /// 最久未活跃的会话
    pub fn oldest(&self) -> Option<SessionKey> {
        self.by_last_seen.values().next().copied()
    }

    pub fn pop_oldest(&mut self) -> Option<Session> {
        let key = self.oldest()?;
        self.remove(key)
    }

    pub fn clear(&mut self) {
        let keys: Vec<SessionKey> = self.by_mac.values().copied().collect();
        for key in keys {
            self.remove(key);
        }
    }

    /// 按最后活跃时间从旧到新遍历
    pub fn iter(&self) -> impl Iterator<Item = (SessionKey, &Session)> + '_ {
        self.by_last_seen
            .values()
            .filter_map(move |key| self.get(*key).map(|s| (*key, s)))
    }

    pub fn keys(&self) -> Vec<SessionKey> {
        self.by_last_seen.values().copied().collect()
    }

    /// 三个索引与槽位内容是否一致
    pub fn is_consistent(&self) -> bool {
        let live = self.slots.iter().filter(|s| s.session.is_some()).count();
        if live != self.by_mac.len()
            || live != self.by_addr.len()
            || live != self.by_last_seen.len()
        {
            return false;
        }
        self.by_last_seen.iter().all(|(&(seen, stamp), key)| {
            self.get(*key).is_some_and(|s| {
                s.last_seen == seen
                    && s.stamp == stamp
                    && self.by_mac.get(&s.mac) == Some(key)
                    && self.by_addr.get(&s.addr) == Some(key)
            })
        })
    }
}
