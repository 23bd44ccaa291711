//! 客户端会话管理
//!
//! 单会话状态机：Disconnected → AwaitingAck → Established。
//! 一个周期为 `echo_interval` 的定时器驱动一切：已建立时发 EchoRequest，
//! 服务端沉默超过 `timeout` 就断开，未建立时广播 SetupRequest。

use std::fmt::Write as _;
use std::net::SocketAddr;

use serde::Serialize;
use tracing::{debug, info, trace, warn};

use super::MIN_FRAGMENTATION_THRESHOLD;
use super::role::{ControlReply, TunnelRole, TxInfo};
use super::stats::IoStats;
use super::transport::TransportCore;
use crate::config::TunnelConfig;
use crate::frame::{EthernetFrame, MacAddr};
use crate::queue::FrameQueue;
use crate::seq::{RxSequence, TxSequence};
use crate::sim::{SimTime, Timer};
use crate::socket::DatagramSocket;
use crate::wire::{
    Capacity, ControlCode, DEFAULT_FRAGMENTATION_THRESHOLD, TunnelControl, TunnelHeader,
    is_tunnel_control,
};

/// 连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientState {
    Disconnected,
    AwaitingAck,
    Established,
}

/// 客户端状态快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientStatus {
    pub state: ClientState,
    pub established: bool,
    pub server_address: Option<SocketAddr>,
    pub server_mac: MacAddr,
    /// 距上次收到服务端控制帧的时间；从未收到为 `None`
    pub server_last_seen_ms: Option<u64>,
    pub tx_seq: u32,
    pub rx_seq: Option<u32>,
    pub resyncs: u32,
    pub reordered: u32,
    pub duplicates: u32,
    pub setup_requests: u32,
    pub fragmentation_threshold: u32,
}

/// 客户端角色
#[derive(Debug)]
pub struct ClientSession {
    established: bool,
    server_mac: MacAddr,
    server_addr: Option<SocketAddr>,
    server_last_seen: Option<SimTime>,
    tx: TxSequence,
    rx: RxSequence,
    setup_requests: u32,
    fragmentation_threshold: u32,
    /// 断开后恢复成的阈值（来自配置）
    default_threshold: u32,
    timer: Timer,
    timeout: SimTime,
    echo_interval: SimTime,
}

impl ClientSession {
    pub fn new(server_addr: Option<SocketAddr>, timeout: SimTime, echo_interval: SimTime) -> Self {
        Self {
            established: false,
            server_mac: MacAddr::NONE,
            server_addr,
            server_last_seen: None,
            tx: TxSequence::default(),
            rx: RxSequence::default(),
            setup_requests: 0,
            fragmentation_threshold: DEFAULT_FRAGMENTATION_THRESHOLD,
            default_threshold: DEFAULT_FRAGMENTATION_THRESHOLD,
            timer: Timer::new("tunnel.client.echo"),
            timeout,
            echo_interval,
        }
    }

    pub fn established(&self) -> bool {
        self.established
    }

    pub fn server_mac(&self) -> MacAddr {
        self.server_mac
    }

    pub fn server_addr(&self) -> Option<SocketAddr> {
        self.server_addr
    }

    pub fn setup_requests(&self) -> u32 {
        self.setup_requests
    }

    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    pub fn timeout(&self) -> SimTime {
        self.timeout
    }

    pub fn echo_interval(&self) -> SimTime {
        self.echo_interval
    }

    pub fn fragmentation_threshold(&self) -> u32 {
        self.fragmentation_threshold
    }

    /// 0 恢复缺省值
    pub fn set_fragmentation_threshold(&mut self, ft: u32) {
        self.fragmentation_threshold = if ft == 0 {
            self.default_threshold
        } else {
            ft.max(MIN_FRAGMENTATION_THRESHOLD)
        };
    }

    /// 同时设置当前阈值与断开后恢复的阈值
    pub fn set_default_fragmentation_threshold(&mut self, ft: u32) {
        self.default_threshold = if ft == 0 {
            DEFAULT_FRAGMENTATION_THRESHOLD
        } else {
            ft.max(MIN_FRAGMENTATION_THRESHOLD)
        };
        self.fragmentation_threshold = self.default_threshold;
    }

    pub fn state(&self) -> ClientState {
        if self.established {
            ClientState::Established
        } else if self.setup_requests > 0 {
            ClientState::AwaitingAck
        } else {
            ClientState::Disconnected
        }
    }

    /// 清掉会话状态；服务端地址与定时器不动。
    fn clear(&mut self) {
        self.established = false;
        self.server_mac = MacAddr::NONE;
        self.server_last_seen = None;
        self.tx = TxSequence::default();
        self.rx = RxSequence::default();
        self.setup_requests = 0;
        self.set_fragmentation_threshold(0);
    }

    pub fn status(&self, now: SimTime) -> ClientStatus {
        ClientStatus {
            state: self.state(),
            established: self.established,
            server_address: self.server_addr,
            server_mac: self.server_mac,
            server_last_seen_ms: self.server_last_seen.map(|t| now.since(t).as_millis()),
            tx_seq: self.tx.current(),
            rx_seq: self.rx.last,
            resyncs: self.rx.resyncs,
            reordered: self.rx.reordered,
            duplicates: self.rx.duplicates,
            setup_requests: self.setup_requests,
            fragmentation_threshold: self.fragmentation_threshold,
        }
    }

    /// 一次定时器逻辑；返回需要发出的控制帧（目的 MAC + 消息）。
    fn process_timeout(
        &mut self,
        now: SimTime,
        enabled: bool,
        capacity: Capacity,
    ) -> Option<(MacAddr, TunnelControl)> {
        self.timer.arm(now.after(self.echo_interval));
        if self.established {
            let silent = self.server_last_seen.map_or(now, |t| now.since(t));
            if silent < self.timeout {
                return Some((self.server_mac, TunnelControl::new(ControlCode::EchoRequest)));
            }
            info!(server = %self.server_mac, silent_ms = silent.as_millis(), "隧道服务端超时，断开");
            self.clear();
        }
        if self.server_addr.is_some() && enabled {
            self.setup_requests = self.setup_requests.saturating_add(1);
            debug!(attempt = self.setup_requests, "发送 SetupRequest");
            return Some((MacAddr::BROADCAST, TunnelControl::setup_request(capacity)));
        }
        None
    }
}

impl TunnelRole for ClientSession {
    fn prepend_header(&mut self, frame: &EthernetFrame, out: &mut Vec<u8>) {
        let seq = if is_tunnel_control(frame) {
            0
        } else {
            self.tx.next()
        };
        out.extend_from_slice(&TunnelHeader::encode(seq));
    }

    fn tx_info(&self, _frame: &EthernetFrame) -> Option<TxInfo> {
        self.server_addr.map(|addr| TxInfo {
            addr,
            threshold: self.fragmentation_threshold,
        })
    }

    #[tracing::instrument(level = "trace", skip(self, frame, ctrl), fields(code = ?ctrl.code))]
    fn handle_control(
        &mut self,
        frame: &EthernetFrame,
        ctrl: TunnelControl,
        src: SocketAddr,
        now: SimTime,
    ) -> Option<ControlReply> {
        if self.server_addr != Some(src) {
            debug!(%src, "忽略来自未知服务端的控制帧");
            return None;
        }
        self.server_last_seen = Some(now);
        match ctrl.code {
            ControlCode::SetupAck => {
                if !self.established {
                    info!(server = %frame.source(), "隧道已建立");
                }
                self.established = true;
                self.server_mac = frame.source();
            }
            ControlCode::SetupReject | ControlCode::TerminateRequest | ControlCode::TerminateAck => {
                if ctrl.code == ControlCode::SetupReject {
                    warn!(%src, "隧道建立被拒绝");
                }
                info!(%src, code = ctrl.code.as_u8(), "隧道已终止");
                self.established = false;
                self.server_mac = MacAddr::NONE;
            }
            ControlCode::EchoReply => {}
            code @ (ControlCode::EchoRequest | ControlCode::SetupRequest | ControlCode::Unknown(_)) => {
                warn!(code = code.as_u8(), %src, "收到无效的控制帧");
            }
        }
        None
    }

    fn process_sequence(&mut self, header: &TunnelHeader, _src: SocketAddr) -> i32 {
        let before = self.rx.resyncs;
        let diff = self.rx.track(header.seq);
        if self.rx.resyncs != before {
            debug!(seq = header.seq, diff, "序列号重同步");
        }
        diff
    }

    fn is_established_for_write(&self, _frame: &EthernetFrame) -> bool {
        self.established
    }

    fn dump_info(&self, now: SimTime, out: &mut String) {
        let status = self.status(now);
        let _ = writeln!(out, "Timeout: {} sec", self.timeout.as_secs());
        let _ = writeln!(
            out,
            "Server: {}",
            status
                .server_address
                .map_or_else(|| "none".to_string(), |a| a.to_string())
        );
        let _ = writeln!(out, "Established: {}", if status.established { "yes" } else { "no" });
        let _ = writeln!(out, "Server MAC: {}", status.server_mac);
        match status.server_last_seen_ms {
            Some(ms) => {
                let _ = writeln!(out, "Server last seen: {} sec.", ms / 1000);
            }
            None => {
                let _ = writeln!(out, "Server last seen: never");
            }
        }
        let _ = writeln!(out, "Setup requests: {}", status.setup_requests);
        let _ = writeln!(out, "Fragmentation threshold: {}", status.fragmentation_threshold);
        let _ = writeln!(out, "TxSeqNo: {:#x}", status.tx_seq);
        let _ = writeln!(
            out,
            "RxSeqNo: {}",
            status
                .rx_seq
                .map_or_else(|| "none".to_string(), |r| format!("{r:#x}"))
        );
        let _ = writeln!(
            out,
            "ReSyncs: {}, Reordered: {}, Duplicate: {}",
            status.resyncs, status.reordered, status.duplicates
        );
    }
}

/// 客户端隧道端点
#[derive(Debug)]
pub struct TunnelClient {
    core: TransportCore,
    session: ClientSession,
    enabled: bool,
    capacity: Capacity,
}

impl TunnelClient {
    /// 建好后处于关闭状态；调用 `set_enabled(true)` 或 `reset` 才开始握手。
    pub fn new(config: &TunnelConfig) -> Self {
        let mut core = TransportCore::new(config.interface_id);
        core.set_queue(config.queue.build());
        let mut session = ClientSession::new(
            config.server_address,
            config.timeout(),
            config.echo_interval(),
        );
        session.set_default_fragmentation_threshold(config.fragmentation_threshold);
        Self {
            core,
            session,
            enabled: false,
            capacity: config.capacity,
        }
    }

    pub fn id(&self) -> MacAddr {
        self.core.id()
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn established(&self) -> bool {
        self.session.established()
    }

    pub fn core(&self) -> &TransportCore {
        &self.core
    }

    pub fn session(&self) -> &ClientSession {
        &self.session
    }

    pub fn stats(&self) -> &IoStats {
        self.core.stats()
    }

    pub fn timer(&self) -> &Timer {
        self.session.timer()
    }

    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    pub fn set_enabled(&mut self, sock: &mut dyn DatagramSocket, enabled: bool, now: SimTime) {
        if self.enabled == enabled {
            return;
        }
        self.enabled = enabled;
        info!(iface = %self.core.id(), enabled, "隧道客户端状态变更");
        self.reset(sock, now);
    }

    /// 换服务端地址会重置会话
    pub fn set_server_address(&mut self, sock: &mut dyn DatagramSocket, addr: Option<SocketAddr>, now: SimTime) {
        if self.session.server_addr == addr {
            return;
        }
        // 旧服务端先收到 TerminateRequest（若已建立）
        if self.enabled && self.session.established {
            self.send_terminate(sock);
        }
        self.session.server_addr = addr;
        self.reset(sock, now);
    }

    pub fn set_fragmentation_threshold(&mut self, ft: u32) {
        self.session.set_fragmentation_threshold(ft);
    }

    pub fn set_queue(&mut self, queue: Box<dyn FrameQueue>) {
        self.core.set_queue(queue);
    }

    /// 目的地址在此刻定下：排队中的帧不能跟着后来的地址变更走。
    fn send_terminate(&mut self, sock: &mut dyn DatagramSocket) {
        let mac = self.session.server_mac;
        let addr = self.session.server_addr;
        self.session.established = false;
        self.core.send_control(
            &mut self.session,
            sock,
            mac,
            TunnelControl::new(ControlCode::TerminateRequest),
            addr,
        );
    }

    /// 清空会话后：启用则立即走一次定时器逻辑，关闭则（已建立时）通知服务端并停表。
    pub fn reset(&mut self, sock: &mut dyn DatagramSocket, now: SimTime) {
        if !self.enabled && self.session.established {
            self.send_terminate(sock);
        }
        self.session.clear();
        if self.enabled {
            self.run_timer(sock, now);
        } else {
            self.session.timer.disable();
        }
    }

    /// 定时器触发；代数不符或尚未到期的触发被忽略。
    pub fn on_timer(&mut self, sock: &mut dyn DatagramSocket, now: SimTime, generation: u64) {
        let timer = self.session.timer();
        if timer.generation() != generation || !timer.is_due(now) {
            trace!(generation, "过期的定时器触发");
            return;
        }
        self.run_timer(sock, now);
    }

    fn run_timer(&mut self, sock: &mut dyn DatagramSocket, now: SimTime) {
        if let Some((dst, ctrl)) = self.session.process_timeout(now, self.enabled, self.capacity) {
            self.core.send_control(&mut self.session, sock, dst, ctrl, None);
        }
    }

    /// 只有已建立时才能写；目的固定为服务端。
    pub fn write_packet(&mut self, sock: &mut dyn DatagramSocket, frame: EthernetFrame) -> bool {
        if !self.enabled || !self.session.is_established_for_write(&frame) {
            trace!(dst = %frame.destination(), "隧道未建立，丢弃");
            return false;
        }
        let server = self.session.server_mac;
        self.core.send_packet(&mut self.session, sock, server, frame)
    }

    pub fn read_packet(&mut self, sock: &mut dyn DatagramSocket, now: SimTime) -> Option<EthernetFrame> {
        if !self.enabled {
            // 关闭前排队的 TerminateRequest 仍要发出去
            self.core.flush_queue(&mut self.session, sock);
            self.core.discard_packet(sock);
            return None;
        }
        self.core.read_packet(&mut self.session, sock, now)
    }

    pub fn status(&self, now: SimTime) -> ClientStatus {
        self.session.status(now)
    }

    pub fn dump_info(&self, now: SimTime) -> String {
        self.core.dump_info(&self.session, self.enabled, now)
    }
}
