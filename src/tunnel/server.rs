//! 服务端会话管理
//!
//! `ServerSessions` 实现 `TunnelRole`：控制帧状态机、按会话的序列号、
//! 以及“最久未活跃会话”上的单个空闲淘汰定时器。
//! `TunnelServer` 把它和传输内核捆在一起，对外提供读、写、定时器入口。

use std::fmt::Write as _;
use std::net::SocketAddr;

use serde::Serialize;
use tracing::{debug, info, trace, warn};

use super::MIN_FRAGMENTATION_THRESHOLD;
use super::role::{ControlReply, TunnelRole, TxInfo};
use super::session_table::{Session, SessionState, SessionTable};
use super::stats::IoStats;
use super::transport::TransportCore;
use crate::config::TunnelConfig;
use crate::frame::{EthernetFrame, MacAddr};
use crate::queue::FrameQueue;
use crate::sim::{SimTime, Timer};
use crate::socket::DatagramSocket;
use crate::wire::{
    CapacityDirection, ControlCode, DEFAULT_FRAGMENTATION_THRESHOLD, TunnelControl, TunnelHeader,
    is_tunnel_control,
};

/// 会话表的一行快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub mac: MacAddr,
    pub addr: SocketAddr,
    pub fragmentation_threshold: u32,
    pub idle_ms: u64,
    pub capacity_to_client: u32,
    pub capacity_from_client: u32,
    pub tx_seq: u32,
    pub rx_seq: Option<u32>,
    pub resyncs: u32,
}

impl SessionInfo {
    fn from_session(s: &Session, now: SimTime) -> Self {
        Self {
            mac: s.mac(),
            addr: s.addr(),
            fragmentation_threshold: s.state.fragmentation_threshold,
            idle_ms: now.since(s.last_seen()).as_millis(),
            capacity_to_client: s.state.capacity.get(CapacityDirection::FromServerToClient),
            capacity_from_client: s.state.capacity.get(CapacityDirection::FromClientToServer),
            tx_seq: s.state.tx.current(),
            rx_seq: s.state.rx.last,
            resyncs: s.state.rx.resyncs,
        }
    }
}

fn normalize_threshold(ft: u32) -> u32 {
    if ft == 0 {
        DEFAULT_FRAGMENTATION_THRESHOLD
    } else {
        ft.max(MIN_FRAGMENTATION_THRESHOLD)
    }
}

/// 服务端角色
#[derive(Debug)]
pub struct ServerSessions {
    table: SessionTable,
    timer: Timer,
    timeout: SimTime,
    default_threshold: u32,
}

impl ServerSessions {
    pub fn new(timeout: SimTime, default_threshold: u32) -> Self {
        Self {
            table: SessionTable::new(),
            timer: Timer::new("tunnel.server.idle"),
            timeout,
            default_threshold: normalize_threshold(default_threshold),
        }
    }

    pub fn table(&self) -> &SessionTable {
        &self.table
    }

    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    pub fn timeout(&self) -> SimTime {
        self.timeout
    }

    /// 定时器跟着最久未活跃的会话走；表空则关闭。
    fn reset_timer(&mut self) {
        let oldest = self
            .table
            .oldest()
            .and_then(|k| self.table.get(k))
            .map(Session::last_seen);
        match oldest {
            Some(seen) => self.timer.arm(seen.after(self.timeout)),
            None => self.timer.disable(),
        }
    }

    /// 淘汰最久未活跃的会话并重新设置定时器。
    pub fn process_timeout(&mut self, now: SimTime) {
        match self.table.pop_oldest() {
            Some(s) => info!(
                mac = %s.mac(),
                addr = %s.addr(),
                idle_ms = now.since(s.last_seen()).as_millis(),
                "隧道客户端超时"
            ),
            None => debug!("空表上的超时事件"),
        }
        self.reset_timer();
    }

    pub fn set_timeout(&mut self, timeout: SimTime) {
        self.timeout = timeout;
        self.reset_timer();
    }

    pub fn capacity(&self, mac: &MacAddr, direction: CapacityDirection) -> u32 {
        self.table
            .find_by_mac(mac)
            .and_then(|k| self.table.get(k))
            .map_or(0, |s| s.state.capacity.get(direction))
    }

    /// 未知会话返回 0
    pub fn fragmentation_threshold(&self, mac: &MacAddr) -> u32 {
        self.table
            .find_by_mac(mac)
            .and_then(|k| self.table.get(k))
            .map_or(0, |s| s.state.fragmentation_threshold)
    }

    /// 设置分片阈值：`mac` 为某个已知会话时只改它，否则改全部会话。0 表示缺省值。
    pub fn set_fragmentation_threshold(&mut self, mac: Option<MacAddr>, ft: u32) {
        let ft = normalize_threshold(ft);
        let keys = match mac.and_then(|m| self.table.find_by_mac(&m)) {
            Some(key) => vec![key],
            None => self.table.keys(),
        };
        for key in keys {
            if let Some(state) = self.table.state_mut(key) {
                state.fragmentation_threshold = ft;
            }
        }
    }

    pub fn macs(&self) -> Vec<MacAddr> {
        self.table.iter().map(|(_, s)| s.mac()).collect()
    }

    /// 每个会话的 (MAC, 地址)
    pub fn peers(&self) -> Vec<(MacAddr, SocketAddr)> {
        self.table.iter().map(|(_, s)| (s.mac(), s.addr())).collect()
    }

    pub fn knows(&self, mac: &MacAddr) -> bool {
        self.table.find_by_mac(mac).is_some()
    }

    pub fn sessions(&self, now: SimTime) -> Vec<SessionInfo> {
        self.table
            .iter()
            .map(|(_, s)| SessionInfo::from_session(s, now))
            .collect()
    }

    pub fn clear(&mut self) {
        self.table.clear();
        self.timer.disable();
    }

    fn handle_setup_request(
        &mut self,
        mac: MacAddr,
        ctrl: &TunnelControl,
        src: SocketAddr,
        now: SimTime,
    ) -> ControlCode {
        let Some(capacity) = ctrl.capacity else {
            warn!(%mac, %src, "SetupRequest 没有容量，拒绝");
            return ControlCode::SetupReject;
        };
        let by_mac = self.table.find_by_mac(&mac);
        let by_addr = self.table.find_by_addr(&src);
        let key = match (by_mac, by_addr) {
            (None, None) => {
                let state = SessionState::new(capacity, self.default_threshold);
                let Some(key) = self.table.insert(mac, src, now, state) else {
                    return ControlCode::SetupReject;
                };
                info!(%mac, %src, "新隧道客户端");
                key
            }
            (None, Some(_)) => {
                warn!(%mac, %src, "地址已被其它 MAC 占用，拒绝");
                return ControlCode::SetupReject;
            }
            (Some(key), None) => {
                self.table.update_addr(key, src);
                info!(%mac, %src, "隧道客户端地址变更");
                key
            }
            (Some(key), Some(owner)) if key == owner => key,
            (Some(_), Some(_)) => {
                warn!(%mac, %src, "MAC 与地址属于不同会话，拒绝");
                return ControlCode::SetupReject;
            }
        };
        if let Some(state) = self.table.state_mut(key) {
            state.capacity = capacity;
        }
        self.table.touch(key, now);
        self.reset_timer();
        ControlCode::SetupAck
    }

    fn handle_echo_request(&mut self, mac: MacAddr, src: SocketAddr, now: SimTime) -> Option<ControlCode> {
        let Some(key) = self.table.find_by_mac(&mac) else {
            trace!(%mac, %src, "未知客户端的 EchoRequest，不应答");
            return None;
        };
        if self.table.find_by_addr(&src).is_none() {
            self.table.update_addr(key, src);
            info!(%mac, %src, "隧道客户端地址变更");
        }
        self.table.touch(key, now);
        self.reset_timer();
        Some(ControlCode::EchoReply)
    }

    fn handle_terminate_request(&mut self, mac: MacAddr, src: SocketAddr) -> Option<ControlCode> {
        let by_mac = self.table.find_by_mac(&mac)?;
        if self.table.find_by_addr(&src) != Some(by_mac) {
            debug!(%mac, %src, "TerminateRequest 与会话不匹配，忽略");
            return None;
        }
        self.table.remove(by_mac);
        info!(%mac, %src, "隧道客户端终止会话");
        self.reset_timer();
        Some(ControlCode::TerminateAck)
    }
}

impl TunnelRole for ServerSessions {
    fn prepend_header(&mut self, frame: &EthernetFrame, out: &mut Vec<u8>) {
        let seq = if is_tunnel_control(frame) {
            0
        } else {
            self.table
                .find_by_mac(&frame.annotations.peer)
                .and_then(|k| self.table.state_mut(k))
                .map_or(0, |state| state.tx.next())
        };
        out.extend_from_slice(&TunnelHeader::encode(seq));
    }

    fn tx_info(&self, frame: &EthernetFrame) -> Option<TxInfo> {
        let key = self.table.find_by_mac(&frame.annotations.peer)?;
        let s = self.table.get(key)?;
        Some(TxInfo {
            addr: s.addr(),
            threshold: s.state.fragmentation_threshold,
        })
    }

    #[tracing::instrument(level = "trace", skip(self, frame, ctrl), fields(code = ?ctrl.code, mac = %frame.source()))]
    fn handle_control(
        &mut self,
        frame: &EthernetFrame,
        ctrl: TunnelControl,
        src: SocketAddr,
        now: SimTime,
    ) -> Option<ControlReply> {
        let mac = frame.source();
        let reply = match ctrl.code {
            ControlCode::SetupRequest => Some(self.handle_setup_request(mac, &ctrl, src, now)),
            ControlCode::EchoRequest => self.handle_echo_request(mac, src, now),
            ControlCode::TerminateRequest => self.handle_terminate_request(mac, src),
            ControlCode::TerminateAck => None,
            code @ (ControlCode::SetupAck
            | ControlCode::SetupReject
            | ControlCode::EchoReply
            | ControlCode::Unknown(_)) => {
                warn!(code = code.as_u8(), %src, "收到无效的控制帧");
                None
            }
        };
        reply.map(|code| ControlReply {
            dst: mac,
            reply_to: src,
            ctrl: TunnelControl::new(code),
        })
    }

    fn process_sequence(&mut self, header: &TunnelHeader, src: SocketAddr) -> i32 {
        let Some(state) = self
            .table
            .find_by_addr(&src)
            .and_then(|k| self.table.state_mut(k))
        else {
            trace!(%src, "未知地址的数据帧，不做序列号分类");
            return 1;
        };
        let before = state.rx.resyncs;
        let diff = state.rx.track(header.seq);
        if state.rx.resyncs != before {
            debug!(%src, seq = header.seq, diff, "序列号重同步");
        }
        diff
    }

    fn is_established_for_write(&self, frame: &EthernetFrame) -> bool {
        let dst = frame.destination();
        if dst.is_multicast() {
            !self.table.is_empty()
        } else {
            self.knows(&dst)
        }
    }

    fn dump_info(&self, now: SimTime, out: &mut String) {
        let _ = writeln!(out, "Timeout: {} sec", self.timeout.as_secs());
        let _ = write!(out, "Clients:");
        if self.table.is_empty() {
            let _ = writeln!(out, " none");
            return;
        }
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{:<30}  {:<17}  {:>9}  {:>9}  {:>18} {:>18} {:>5} {:>5} {:>7}",
            "address",
            "MAC address",
            "FragThesh",
            "last seen",
            "capacity_to_client",
            "capacity_from_client",
            "TxSeq",
            "RxSeq",
            "ReSyncs"
        );
        for info in self.sessions(now) {
            let rx = info.rx_seq.map_or_else(|| "none".to_string(), |r| format!("{r:x}"));
            let _ = writeln!(
                out,
                "{:<30}  {:<17}  {:>9}  {:>5} sec.  {:>18} {:>18} {:>5x} {:>5} {:>7}",
                info.addr.to_string(),
                info.mac.to_string(),
                info.fragmentation_threshold,
                info.idle_ms / 1000,
                info.capacity_to_client,
                info.capacity_from_client,
                info.tx_seq,
                rx,
                info.resyncs
            );
        }
    }
}

/// 服务端隧道端点
#[derive(Debug)]
pub struct TunnelServer {
    core: TransportCore,
    sessions: ServerSessions,
    enabled: bool,
}

impl TunnelServer {
    pub fn new(config: &TunnelConfig) -> Self {
        let mut core = TransportCore::new(config.interface_id);
        core.set_queue(config.queue.build());
        Self {
            core,
            sessions: ServerSessions::new(config.timeout(), config.fragmentation_threshold),
            enabled: config.enabled,
        }
    }

    pub fn id(&self) -> MacAddr {
        self.core.id()
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn core(&self) -> &TransportCore {
        &self.core
    }

    pub fn sessions_role(&self) -> &ServerSessions {
        &self.sessions
    }

    pub fn stats(&self) -> &IoStats {
        self.core.stats()
    }

    pub fn timer(&self) -> &Timer {
        self.sessions.timer()
    }

    /// 关闭时先通知所有客户端，再清空会话表。
    pub fn set_enabled(&mut self, sock: &mut dyn DatagramSocket, enabled: bool) {
        if self.enabled == enabled {
            return;
        }
        if !enabled {
            self.terminate_all_clients(sock);
            self.sessions.clear();
        }
        self.enabled = enabled;
        info!(iface = %self.core.id(), enabled, "隧道服务端状态变更");
    }

    pub fn read_packet(&mut self, sock: &mut dyn DatagramSocket, now: SimTime) -> Option<EthernetFrame> {
        if !self.enabled {
            // 关闭前排队的 TerminateRequest 仍要发出去
            self.core.flush_queue(&mut self.sessions, sock);
            self.core.discard_packet(sock);
            return None;
        }
        self.core.read_packet(&mut self.sessions, sock, now)
    }

    /// 单播到已知会话；组播复制给每个会话；未知目的返回 false。
    pub fn write_packet(&mut self, sock: &mut dyn DatagramSocket, frame: EthernetFrame) -> bool {
        if !self.enabled {
            return false;
        }
        let dst = frame.destination();
        if dst.is_multicast() {
            for mac in self.sessions.macs() {
                self.core
                    .send_packet(&mut self.sessions, sock, mac, frame.clone());
            }
            return true;
        }
        if !self.sessions.is_established_for_write(&frame) {
            trace!(%dst, "没有该目的 MAC 的会话，丢弃");
            return false;
        }
        self.core.send_packet(&mut self.sessions, sock, dst, frame)
    }

    /// 定时器触发；代数不符或尚未到期的触发被忽略。
    pub fn on_timer(&mut self, now: SimTime, generation: u64) {
        let timer = self.sessions.timer();
        if timer.generation() != generation || !timer.is_due(now) {
            trace!(generation, "过期的定时器触发");
            return;
        }
        self.sessions.process_timeout(now);
    }

    /// 给每个会话发 TerminateRequest，不等待应答。
    ///
    /// 地址随帧带上，会话表随后被清空时排队中的帧照样能发出去。
    pub fn terminate_all_clients(&mut self, sock: &mut dyn DatagramSocket) {
        for (mac, addr) in self.sessions.peers() {
            self.core.send_control(
                &mut self.sessions,
                sock,
                mac,
                TunnelControl::new(ControlCode::TerminateRequest),
                Some(addr),
            );
        }
    }

    pub fn capacity(&self, mac: &MacAddr, direction: CapacityDirection) -> u32 {
        self.sessions.capacity(mac, direction)
    }

    pub fn fragmentation_threshold(&self, mac: &MacAddr) -> u32 {
        self.sessions.fragmentation_threshold(mac)
    }

    pub fn set_fragmentation_threshold(&mut self, mac: Option<MacAddr>, ft: u32) {
        self.sessions.set_fragmentation_threshold(mac, ft);
    }

    pub fn set_timeout(&mut self, timeout: SimTime) {
        self.sessions.set_timeout(timeout);
    }

    pub fn set_queue(&mut self, queue: Box<dyn FrameQueue>) {
        self.core.set_queue(queue);
    }

    pub fn sessions(&self, now: SimTime) -> Vec<SessionInfo> {
        self.sessions.sessions(now)
    }

    pub fn dump_info(&self, now: SimTime) -> String {
        self.core.dump_info(&self.sessions, self.enabled, now)
    }
}
