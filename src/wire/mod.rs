//! 线上格式
//!
//! 隧道头、控制消息与 OUI 扩展头的编解码。纯数据变换，不做任何 I/O。

mod control;
mod header;
mod oui;

use thiserror::Error;

pub use control::{Capacity, CapacityDirection, ControlCode, TunnelControl};
pub use header::{TUNNEL_HDR_LEN, TUNNEL_MAGIC, TunnelHeader};
pub use oui::{
    ETHERTYPE_OUI_EXT, OUI_EXT_HDR_LEN, PROTO_FRAGMENT, PROTO_TUNNEL_CTRL, TUNNEL_OUI,
    is_fragment, is_tunnel_control, oui_body, oui_payload,
};

/// 解码错误；运行路径上只记录、不向上传播。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("buffer too short: {len} bytes, need {need}")]
    TooShort { len: usize, need: usize },
    #[error("setup request capacity truncated: {len} of 8 bytes")]
    TruncatedCapacity { len: usize },
    #[error("not a tunnel control frame")]
    NotControl,
}

/// 隧道开销：IPv4(20) + UDP(8) + 隧道头(4) + 内层以太网头(14)。
/// 分片器不计以太网头，而隧道里它要算作载荷。
pub const TUNNEL_OVERHEAD: u32 = 46;
/// 默认路径 MTU
pub const DEFAULT_PATH_MTU: u32 = 1280;
pub const DEFAULT_FRAGMENTATION_THRESHOLD: u32 = DEFAULT_PATH_MTU - TUNNEL_OVERHEAD;
