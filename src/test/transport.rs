use super::{addr, data_frame, datagram, mac, split_datagram};
use crate::frame::{EthernetFrame, FRAGMENT_OVERHEAD, FragmentHeader, Quality};
use crate::queue::{DropTailQueue, mem_from_frames};
use crate::sim::SimTime;
use crate::socket::MemSocket;
use crate::tunnel::{ClientSession, TransportCore, annotate_quality};
use crate::wire::{
    ControlCode, ETHERTYPE_OUI_EXT, PROTO_TUNNEL_CTRL, TunnelControl, is_fragment, is_tunnel_control,
    oui_payload,
};

const PEER: &str = "10.0.0.1:4711";

fn role() -> ClientSession {
    ClientSession::new(Some(addr(PEER)), SimTime::from_secs(20), SimTime::from_secs(1))
}

fn setup() -> (TransportCore, ClientSession, MemSocket) {
    (
        TransportCore::new(mac(10)),
        role(),
        MemSocket::new(addr("10.0.1.1:5000")),
    )
}

#[test]
fn short_and_foreign_datagrams_are_ignored() {
    let (mut core, mut role, mut sock) = setup();
    let frame = data_frame(mac(10), mac(1), 20);

    sock.push_inbound(addr(PEER), vec![0u8; 10]);
    let mut bad_magic = datagram(0, &frame);
    bad_magic[0] ^= 0xff;
    sock.push_inbound(addr(PEER), bad_magic);
    // 隧道头 + 不足 14 字节的“帧”
    let mut runt = datagram(0, &frame);
    runt.truncate(4 + 13);
    sock.push_inbound(addr(PEER), runt);

    for _ in 0..3 {
        assert!(core.read_packet(&mut role, &mut sock, SimTime::ZERO).is_none());
    }
    let stats = core.stats();
    assert_eq!(stats.rx_packets, 3);
    assert_eq!(stats.rx_ignored, 3);
    assert_eq!(stats.rx_data, 0);
    assert!(stats.is_consistent());
}

#[test]
fn empty_socket_reads_nothing() {
    let (mut core, mut role, mut sock) = setup();
    assert!(core.read_packet(&mut role, &mut sock, SimTime::ZERO).is_none());
    assert_eq!(core.stats().rx_packets, 0);
}

#[test]
fn writable_socket_sends_immediately() {
    let (mut core, mut role, mut sock) = setup();
    assert!(core.send_packet(&mut role, &mut sock, mac(1), data_frame(mac(1), mac(10), 100)));
    let (to, bytes) = sock.pop_outbound().expect("datagram");
    assert_eq!(to, addr(PEER));
    let (hdr, frame) = split_datagram(&bytes);
    assert_eq!(hdr.seq, 0);
    assert_eq!(frame.payload_len(), 100);

    let stats = core.stats();
    assert_eq!(stats.tx_packets, 1);
    assert_eq!(stats.tx_sent, 1);
    assert_eq!(stats.tx_overrun, 0);
}

#[test]
fn unwritable_socket_with_none_queue_drops() {
    let (mut core, mut role, mut sock) = setup();
    sock.set_outbox_limit(Some(0));
    assert!(core.send_packet(&mut role, &mut sock, mac(1), data_frame(mac(1), mac(10), 100)));

    let stats = core.stats();
    assert_eq!(stats.tx_overrun, 1);
    assert_eq!(stats.tx_dropped, 1);
    assert_eq!(stats.tx_sent, 0);
    assert!(core.queue().is_empty());
}

#[test]
fn queued_frames_are_flushed_in_order() {
    let (mut core, mut role, mut sock) = setup();
    core.set_queue(Box::new(DropTailQueue::new(mem_from_frames(4))));
    sock.set_outbox_limit(Some(0));

    for len in [10, 20, 30] {
        core.send_packet(&mut role, &mut sock, mac(1), data_frame(mac(1), mac(10), len));
    }
    assert_eq!(core.queue().len(), 3);
    assert_eq!(core.stats().tx_overrun, 3);
    assert_eq!(core.stats().tx_dropped, 0);

    sock.set_outbox_limit(None);
    core.flush_queue(&mut role, &mut sock);
    assert!(core.queue().is_empty());

    let out = sock.take_outbound();
    let got: Vec<(u32, usize)> = out
        .iter()
        .map(|(_, b)| {
            let (hdr, frame) = split_datagram(b);
            (hdr.seq, frame.payload_len())
        })
        .collect();
    assert_eq!(got, vec![(0, 10), (1, 20), (2, 30)]);
    assert_eq!(core.stats().tx_sent, 3);
}

#[test]
fn a_non_empty_queue_keeps_order_even_when_writable() {
    let (mut core, mut role, mut sock) = setup();
    core.set_queue(Box::new(DropTailQueue::new(mem_from_frames(4))));
    sock.set_outbox_limit(Some(1));

    core.send_packet(&mut role, &mut sock, mac(1), data_frame(mac(1), mac(10), 10));
    core.send_packet(&mut role, &mut sock, mac(1), data_frame(mac(1), mac(10), 20));
    assert_eq!(core.queue().len(), 1);

    // 读事件顺带冲刷队列
    sock.set_outbox_limit(None);
    assert!(core.read_packet(&mut role, &mut sock, SimTime::ZERO).is_none());
    let lens: Vec<usize> = sock
        .take_outbound()
        .iter()
        .map(|(_, b)| split_datagram(b).1.payload_len())
        .collect();
    assert_eq!(lens, vec![10, 20]);
}

#[test]
fn write_failures_are_counted_not_retried() {
    let (mut core, mut role, mut sock) = setup();
    sock.set_fail_writes(true);
    assert!(core.send_packet(&mut role, &mut sock, mac(1), data_frame(mac(1), mac(10), 100)));
    assert_eq!(core.stats().tx_error, 1);
    assert_eq!(core.stats().tx_sent, 0);
    assert_eq!(sock.outbound_len(), 0);
}

#[test]
fn unknown_peer_is_a_tx_error() {
    let mut core = TransportCore::new(mac(10));
    let mut role = ClientSession::new(None, SimTime::from_secs(20), SimTime::from_secs(1));
    let mut sock = MemSocket::new(addr("10.0.1.1:5000"));
    core.send_packet(&mut role, &mut sock, mac(1), data_frame(mac(1), mac(10), 100));
    assert_eq!(core.stats().tx_error, 1);
    assert_eq!(sock.outbound_len(), 0);
}

#[test]
fn control_reply_goes_to_the_requesting_address() {
    let mut core = TransportCore::new(mac(10));
    let mut role = ClientSession::new(None, SimTime::from_secs(20), SimTime::from_secs(1));
    let mut sock = MemSocket::new(addr("10.0.1.1:5000"));
    let requester = addr("192.0.2.7:9000");

    core.send_control(
        &mut role,
        &mut sock,
        mac(1),
        TunnelControl::new(ControlCode::SetupReject),
        Some(requester),
    );
    let (to, bytes) = sock.pop_outbound().expect("reply");
    assert_eq!(to, requester);
    let (hdr, frame) = split_datagram(&bytes);
    assert_eq!(hdr.seq, 0);
    assert_eq!(frame.destination(), mac(1));
    assert_eq!(frame.source(), mac(10));
}

#[test]
fn large_frames_are_fragmented_and_reassembled() {
    let (mut core, mut role, mut sock) = setup();
    role.set_fragmentation_threshold(500);
    let original = data_frame(mac(1), mac(10), 1400);

    assert!(core.send_packet(&mut role, &mut sock, mac(1), original.clone()));
    let out = sock.take_outbound();
    let chunk = 500 - FRAGMENT_OVERHEAD;
    assert_eq!(out.len(), 1400usize.div_ceil(chunk));
    assert_eq!(core.fragmentation_count(), 1);
    assert_eq!(core.stats().frag_out, 1);
    assert_eq!(core.stats().tx_packets, 1);
    assert_eq!(core.stats().tx_sent, out.len() as u64);

    for (i, (to, bytes)) in out.iter().enumerate() {
        assert_eq!(*to, addr(PEER));
        let (hdr, frag) = split_datagram(bytes);
        assert!(hdr.magic_valid);
        assert_eq!(hdr.seq, i as u32);
        assert!(is_fragment(&frag));
        assert!(frag.payload_len() <= 500);
        let (fh, _) = FragmentHeader::parse(&frag).expect("fragment header");
        assert_eq!(fh.fragment_nr as usize, i + 1);
        assert_eq!(fh.more, i + 1 != out.len());
        assert_eq!(fh.type_length, 0x0800);
    }

    // 对端重组
    let mut peer = TransportCore::new(mac(1));
    let mut peer_role = ClientSession::new(
        Some(addr("10.0.1.1:5000")),
        SimTime::from_secs(20),
        SimTime::from_secs(1),
    );
    let mut peer_sock = MemSocket::new(addr(PEER));
    let mut delivered = Vec::new();
    for (_, bytes) in out {
        peer_sock.push_inbound(addr("10.0.1.1:5000"), bytes);
        if let Some(frame) = peer.read_packet(&mut peer_role, &mut peer_sock, SimTime::from_millis(1)) {
            delivered.push(frame);
        }
    }
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].as_bytes(), original.as_bytes());
    assert_eq!(delivered[0].annotations.interface, mac(1));
    assert_eq!(peer.reassembled_count(), 1);
    assert_eq!(peer.stats().frag_in, 1);
    assert_eq!(peer.stats().rx_data, 3);
}

#[test]
fn frames_too_large_to_fragment_are_send_errors() {
    let (mut core, mut role, mut sock) = setup();
    assert!(core.send_packet(&mut role, &mut sock, mac(1), data_frame(mac(1), mac(10), 70_000)));
    assert_eq!(sock.outbound_len(), 0);
    assert_eq!(core.stats().tx_error, 1);
    assert_eq!(core.stats().frag_out, 0);
    assert_eq!(core.fragmentation_count(), 0);
}

#[test]
fn control_frames_are_never_fragmented() {
    let (mut core, mut role, mut sock) = setup();
    role.set_fragmentation_threshold(128);
    // 带尾随字节、超过阈值的控制帧
    let mut body = vec![ControlCode::EchoRequest.as_u8()];
    body.resize(300, 0);
    let ctrl = EthernetFrame::new(mac(1), mac(10), ETHERTYPE_OUI_EXT, &oui_payload(PROTO_TUNNEL_CTRL, &body));
    assert!(is_tunnel_control(&ctrl));
    core.send_packet(&mut role, &mut sock, mac(1), ctrl);
    assert_eq!(sock.outbound_len(), 1);
    assert_eq!(core.fragmentation_count(), 0);
}

#[test]
fn quality_follows_sequence_diff() {
    let q = |diff| {
        let mut q = Quality::tunnel_baseline(100);
        annotate_quality(&mut q, diff);
        q
    };
    let in_order = q(1);
    assert_eq!((in_order.duplicate, in_order.reordered, in_order.loss), (false, false, 0));
    assert_eq!(in_order.rssi, 126);
    assert_eq!(in_order.noise, -128);
    assert_eq!(in_order.frame_length, 100);

    let dup = q(0);
    assert_eq!((dup.duplicate, dup.reordered, dup.loss), (true, false, 0));

    let gap = q(4);
    assert_eq!((gap.duplicate, gap.reordered, gap.loss), (false, false, 3));

    let late = q(-3);
    assert_eq!((late.duplicate, late.reordered, late.loss), (true, true, 3));
}

#[test]
fn take_stats_starts_a_new_period() {
    let (mut core, mut role, mut sock) = setup();
    core.send_packet(&mut role, &mut sock, mac(1), data_frame(mac(1), mac(10), 10));
    core.send_packet(&mut role, &mut sock, mac(1), data_frame(mac(1), mac(10), 3000));
    let old = core.take_stats(SimTime::from_secs(5));
    assert_eq!(old.tx_packets, 2);
    assert_eq!(old.frag_out, 1);
    assert_eq!(core.stats().tx_packets, 0);
    assert_eq!(core.stats().frag_out, 0);
    assert_eq!(core.stats().since, SimTime::from_secs(5));
    // 分片器的累计计数不随统计周期清零
    assert_eq!(core.fragmentation_count(), 1);
    assert!(core.dump_info(&role, true, SimTime::from_secs(5)).contains("fragOut 0,fragIn 0"));
}

#[test]
fn dump_info_includes_core_counters() {
    let (core, role, _sock) = setup();
    let dump = core.dump_info(&role, true, SimTime::from_secs(1));
    assert!(dump.contains("Id: 02:00:00:00:00:0a"));
    assert!(dump.contains("stats good"));
    assert!(dump.contains("Tunnel Overhead: 46"));
    assert!(dump.contains("qAlgo.size: 0"));
}
