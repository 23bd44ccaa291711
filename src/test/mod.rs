mod config;
mod queues;
mod session_table;
mod transport;
mod wire;

use std::net::SocketAddr;

use crate::frame::{EthernetFrame, MacAddr};
use crate::wire::TunnelHeader;

pub(crate) fn mac(last: u8) -> MacAddr {
    MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, last])
}

pub(crate) fn addr(s: &str) -> SocketAddr {
    s.parse().expect("socket addr")
}

pub(crate) fn data_frame(dst: MacAddr, src: MacAddr, payload_len: usize) -> EthernetFrame {
    let payload: Vec<u8> = (0..payload_len).map(|i| (i % 251) as u8).collect();
    EthernetFrame::new(dst, src, 0x0800, &payload)
}

/// 隧道头 + 帧，组成一个线上数据报
pub(crate) fn datagram(seq: u32, frame: &EthernetFrame) -> Vec<u8> {
    let mut out = TunnelHeader::encode(seq).to_vec();
    out.extend_from_slice(frame.as_bytes());
    out
}

/// 拆开一个线上数据报
pub(crate) fn split_datagram(bytes: &[u8]) -> (TunnelHeader, EthernetFrame) {
    let hdr = TunnelHeader::decode(bytes).expect("tunnel header");
    let frame = EthernetFrame::from_bytes(&bytes[4..]).expect("ethernet frame");
    (hdr, frame)
}
