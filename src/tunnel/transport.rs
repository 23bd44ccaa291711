//! 传输内核
//!
//! 与角色无关的收发骨架：
//! - 收：剥隧道头 → 控制帧交给角色 → 数据帧做序列号分类、质量注解、分片重组；
//! - 发：先冲刷队列 → 可写则立即发送，否则交给排队策略 → 需要时分片，每片一个隧道头。
//!
//! 所有错误都在这一层吞掉（计数 + 日志），调用方只看到“有帧 / 没帧”。

use std::fmt::Write as _;
use std::net::SocketAddr;

use tracing::{debug, trace, warn};

use super::role::{TunnelRole, TxInfo};
use super::stats::IoStats;
use crate::frame::{ETH_HDR_LEN, EthernetFrame, Fragmenter, MacAddr, Quality, Reassembler};
use crate::queue::{FrameQueue, NoneQueue};
use crate::sim::SimTime;
use crate::socket::{DatagramSocket, MAX_DATAGRAM};
use crate::wire::{
    TUNNEL_HDR_LEN, TUNNEL_OVERHEAD, TunnelControl, TunnelHeader, is_fragment, is_tunnel_control,
};

/// 把序列号差值折算成质量注解。
pub fn annotate_quality(q: &mut Quality, diff: i32) {
    match diff {
        1 => {}
        0 => q.duplicate = true,
        d if d > 1 => q.add_loss((d - 1) as u32),
        d => {
            q.duplicate = true;
            q.reordered = true;
            q.add_loss(d.unsigned_abs());
        }
    }
}

/// 传输内核：独占排队策略、分片器、重组器与统计。
#[derive(Debug)]
pub struct TransportCore {
    id: MacAddr,
    queue: Box<dyn FrameQueue>,
    fragmenter: Fragmenter,
    reassembler: Reassembler,
    stats: IoStats,
    rx_buf: Vec<u8>,
}

impl TransportCore {
    pub fn new(id: MacAddr) -> Self {
        Self {
            id,
            queue: Box::new(NoneQueue),
            fragmenter: Fragmenter::default(),
            reassembler: Reassembler::default(),
            stats: IoStats::default(),
            rx_buf: vec![0u8; MAX_DATAGRAM],
        }
    }

    /// 本端接口标识（控制帧的源 MAC）
    pub fn id(&self) -> MacAddr {
        self.id
    }

    /// 替换排队策略；旧队列里的帧随之丢弃。
    pub fn set_queue(&mut self, queue: Box<dyn FrameQueue>) {
        if !self.queue.is_empty() {
            debug!(dropped = self.queue.len(), "替换排队策略，丢弃旧队列中的帧");
        }
        self.queue = queue;
    }

    pub fn queue(&self) -> &dyn FrameQueue {
        self.queue.as_ref()
    }

    pub fn stats(&self) -> &IoStats {
        &self.stats
    }

    pub fn take_stats(&mut self, now: SimTime) -> IoStats {
        self.stats.take(now)
    }

    pub fn fragmentation_count(&self) -> u64 {
        self.fragmenter.fragmentation_count()
    }

    pub fn reassembled_count(&self) -> u64 {
        self.reassembler.packets_reassembled()
    }

    /// 收一个数据报。控制帧、畸形数据报、未完成的分片都返回 `None`。
    #[tracing::instrument(skip(self, role, sock), fields(iface = %self.id))]
    pub fn read_packet<R: TunnelRole + ?Sized>(
        &mut self,
        role: &mut R,
        sock: &mut dyn DatagramSocket,
        now: SimTime,
    ) -> Option<EthernetFrame> {
        // 借读事件冲刷写队列
        self.flush_queue(role, sock);

        let (src, header, mut frame) = self.receive(sock)?;

        if is_tunnel_control(&frame) {
            self.stats.rx_control += 1;
            match TunnelControl::from_frame(&frame) {
                Ok(ctrl) => {
                    trace!(%src, code = ?ctrl.code, "收到控制帧");
                    if let Some(reply) = role.handle_control(&frame, ctrl, src, now) {
                        self.send_control(role, sock, reply.dst, reply.ctrl, Some(reply.reply_to));
                    }
                }
                Err(e) => debug!(%src, error = %e, "丢弃截断的控制帧"),
            }
            return None;
        }

        self.stats.rx_data += 1;
        // 控制帧没有有效序列号，所以只在数据帧上做分类
        let diff = role.process_sequence(&header, src);

        frame.annotations.interface = self.id;
        frame.annotations.timestamp = Some(now);
        let mut q = Quality::tunnel_baseline(frame.size());
        annotate_quality(&mut q, diff);
        frame.annotations.quality = q;
        trace!(%src, seq = header.seq, diff, "收到数据帧");

        if is_fragment(&frame) {
            let whole = self.reassembler.process(&frame, now)?;
            self.stats.frag_in += 1;
            return Some(whole);
        }
        Some(frame)
    }

    /// 接口关闭时仍要把套接字读空：读到的数据报一律计入 ignored。
    pub fn discard_packet(&mut self, sock: &mut dyn DatagramSocket) {
        if let Ok(Some((n, src))) = sock.recv_from(&mut self.rx_buf) {
            self.stats.rx_packets += 1;
            self.stats.rx_ignored += 1;
            trace!(%src, len = n, "接口关闭，丢弃数据报");
        }
    }

    /// 读一个数据报并剥掉隧道头；不合格的数据报计入 ignored。
    fn receive(
        &mut self,
        sock: &mut dyn DatagramSocket,
    ) -> Option<(SocketAddr, TunnelHeader, EthernetFrame)> {
        let (n, src) = match sock.recv_from(&mut self.rx_buf) {
            Ok(Some(v)) => v,
            Ok(None) => return None,
            Err(e) => {
                debug!(error = %e, "读套接字失败");
                return None;
            }
        };
        self.stats.rx_packets += 1;

        let datagram = &self.rx_buf[..n];
        if datagram.len() < TUNNEL_HDR_LEN + ETH_HDR_LEN {
            trace!(%src, len = n, "数据报过短");
            self.stats.rx_ignored += 1;
            return None;
        }
        let header = match TunnelHeader::decode(datagram) {
            Ok(h) if h.magic_valid => h,
            _ => {
                trace!(%src, "隧道头 magic 不匹配");
                self.stats.rx_ignored += 1;
                return None;
            }
        };
        match EthernetFrame::from_bytes(&datagram[TUNNEL_HDR_LEN..]) {
            Ok(frame) => Some((src, header, frame)),
            Err(e) => {
                trace!(%src, error = %e, "以太网帧无效");
                self.stats.rx_ignored += 1;
                None
            }
        }
    }

    /// 发送一个帧到目的身份 `dst`。总是返回 true：排队策略丢帧不算失败。
    #[tracing::instrument(skip(self, role, sock, frame), fields(iface = %self.id, %dst, size = frame.size()))]
    pub fn send_packet<R: TunnelRole + ?Sized>(
        &mut self,
        role: &mut R,
        sock: &mut dyn DatagramSocket,
        dst: MacAddr,
        mut frame: EthernetFrame,
    ) -> bool {
        self.flush_queue(role, sock);
        self.stats.tx_packets += 1;
        frame.annotations.peer = dst;

        if self.queue.is_empty() && sock.writable() {
            self.do_send(role, sock, &frame);
            return true;
        }

        // 整帧入队，出队时再分片：同一帧的分片要么全发，要么全丢
        self.stats.tx_overrun += 1;
        if let Err(dropped) = self.queue.enqueue(frame) {
            self.stats.tx_dropped += 1;
            trace!(dropped_size = dropped.size(), queued = self.queue.len(), "排队策略丢弃帧");
        }
        true
    }

    /// 构造并发送控制帧。`reply_to` 给出时直接发往该地址。
    pub fn send_control<R: TunnelRole + ?Sized>(
        &mut self,
        role: &mut R,
        sock: &mut dyn DatagramSocket,
        dst: MacAddr,
        ctrl: TunnelControl,
        reply_to: Option<SocketAddr>,
    ) {
        let mut frame = ctrl.to_frame(dst, self.id);
        frame.annotations.reply_to = reply_to;
        trace!(%dst, code = ?ctrl.code, ?reply_to, "发送控制帧");
        self.send_packet(role, sock, dst, frame);
    }

    /// 可写期间逐个出队发送
    pub fn flush_queue<R: TunnelRole + ?Sized>(&mut self, role: &mut R, sock: &mut dyn DatagramSocket) {
        while sock.writable() {
            let Some(frame) = self.queue.dequeue() else {
                break;
            };
            self.do_send(role, sock, &frame);
        }
    }

    fn do_send<R: TunnelRole + ?Sized>(
        &mut self,
        role: &mut R,
        sock: &mut dyn DatagramSocket,
        frame: &EthernetFrame,
    ) {
        let control = is_tunnel_control(frame);
        let tx = match (control, frame.annotations.reply_to) {
            (true, Some(addr)) => Some(TxInfo {
                addr,
                threshold: u32::MAX,
            }),
            _ => role.tx_info(frame),
        };
        let Some(tx) = tx else {
            debug!(peer = %frame.annotations.peer, "目的身份未知，丢弃帧");
            self.stats.tx_error += 1;
            return;
        };

        if control || !self.fragmenter.needs_fragmentation(frame, tx.threshold) {
            self.write_datagram(role, sock, frame, tx.addr);
            return;
        }
        let fragments = match self.fragmenter.fragment(frame, tx.threshold) {
            Ok(f) => f,
            Err(e) => {
                debug!(peer = %frame.annotations.peer, error = %e, "无法分片，丢弃帧");
                self.stats.tx_error += 1;
                return;
            }
        };
        self.stats.frag_out += 1;
        for fragment in fragments {
            self.write_datagram(role, sock, &fragment, tx.addr);
        }
    }

    fn write_datagram<R: TunnelRole + ?Sized>(
        &mut self,
        role: &mut R,
        sock: &mut dyn DatagramSocket,
        frame: &EthernetFrame,
        addr: SocketAddr,
    ) {
        let mut buf = Vec::with_capacity(TUNNEL_HDR_LEN + frame.size());
        role.prepend_header(frame, &mut buf);
        buf.extend_from_slice(frame.as_bytes());
        match sock.send_to(&buf, addr) {
            Ok(_) => self.stats.tx_sent += 1,
            Err(e) => {
                // 尽力而为：不重试，接收方的序列号跟踪会把它算作丢失
                self.stats.tx_error += 1;
                debug!(%addr, error = %e, "写数据报失败");
            }
        }
    }

    /// 内核部分的文本信息，后接角色自己的信息。
    pub fn dump_info<R: TunnelRole + ?Sized>(&self, role: &R, enabled: bool, now: SimTime) -> String {
        let mut s = String::new();
        let _ = writeln!(s, "Id: {}", self.id);
        let _ = writeln!(s, "Enabled: {}", if enabled { "yes" } else { "no" });
        let _ = writeln!(s, "IOStats: {}", self.stats.dump(now));
        let _ = writeln!(s, "qAlgo.size: {}", self.queue.len());
        let _ = writeln!(s, "Tunnel Overhead: {TUNNEL_OVERHEAD}");
        let _ = writeln!(
            s,
            "FragmentationStats: out {}, in {}, discarded {}",
            self.fragmenter.fragmentation_count(),
            self.reassembler.packets_reassembled(),
            self.reassembler.fragments_discarded()
        );
        role.dump_info(now, &mut s);
        if !self.stats.is_consistent() {
            warn!(iface = %self.id, "收包统计不一致");
        }
        s
    }
}
