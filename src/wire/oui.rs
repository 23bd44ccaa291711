//! OUI 扩展以太类型（IEEE 802 OUI Extended EtherType, 0x88B7）
//!
//! 隧道控制消息与以太网分片都用它承载：
//!
//! ```text
//! | dst(6) | src(6) | 0x88B7 | OUI(3) | protocol(2) | body ... |
//! ```

use crate::frame::EthernetFrame;

pub const ETHERTYPE_OUI_EXT: u16 = 0x88b7;
/// 本地管理位置 1 的私有 OUI。
pub const TUNNEL_OUI: [u8; 3] = [0x02, 0x00, 0x47];
pub const OUI_EXT_HDR_LEN: usize = 5;

/// OUI 扩展下的子协议号
pub const PROTO_TUNNEL_CTRL: u16 = 0x0001;
pub const PROTO_FRAGMENT: u16 = 0x0002;

/// 构造 OUI 扩展头 + body 组成的以太网载荷。
pub fn oui_payload(protocol: u16, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(OUI_EXT_HDR_LEN + body.len());
    out.extend_from_slice(&TUNNEL_OUI);
    out.extend_from_slice(&protocol.to_be_bytes());
    out.extend_from_slice(body);
    out
}

/// 若帧是本隧道 OUI 下的扩展帧，返回 (子协议号, body)。
pub fn oui_body(frame: &EthernetFrame) -> Option<(u16, &[u8])> {
    if frame.ether_type() != ETHERTYPE_OUI_EXT {
        return None;
    }
    let p = frame.payload();
    if p.len() < OUI_EXT_HDR_LEN || p[0..3] != TUNNEL_OUI {
        return None;
    }
    let protocol = u16::from_be_bytes([p[3], p[4]]);
    Some((protocol, &p[OUI_EXT_HDR_LEN..]))
}

/// 隧道控制帧（其 body 可能仍然是截断的）
pub fn is_tunnel_control(frame: &EthernetFrame) -> bool {
    matches!(oui_body(frame), Some((PROTO_TUNNEL_CTRL, _)))
}

pub fn is_fragment(frame: &EthernetFrame) -> bool {
    matches!(oui_body(frame), Some((PROTO_FRAGMENT, _)))
}
