//! 隧道控制消息
//!
//! ```text
//! | code(1) | [SetupRequest only] fromClientToServer(4) fromServerToClient(4) |
//! ```
//!
//! 控制消息作为 OUI 扩展帧（子协议 `PROTO_TUNNEL_CTRL`）的 body 发送，
//! 隧道头序列号恒为 0。

use serde::{Deserialize, Serialize};

use super::CodecError;
use super::oui::{ETHERTYPE_OUI_EXT, PROTO_TUNNEL_CTRL, oui_body, oui_payload};
use crate::frame::{EthernetFrame, MacAddr};

const CAPACITY_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ControlCode {
    SetupRequest,
    SetupAck,
    SetupReject,
    TerminateRequest,
    TerminateAck,
    EchoRequest,
    EchoReply,
    /// 未定义的代码：能解码，但调用方必须当作无效消息记录。
    Unknown(u8),
}

impl ControlCode {
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::SetupRequest,
            2 => Self::SetupAck,
            3 => Self::SetupReject,
            4 => Self::TerminateRequest,
            5 => Self::TerminateAck,
            6 => Self::EchoRequest,
            7 => Self::EchoReply,
            other => Self::Unknown(other),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::SetupRequest => 1,
            Self::SetupAck => 2,
            Self::SetupReject => 3,
            Self::TerminateRequest => 4,
            Self::TerminateAck => 5,
            Self::EchoRequest => 6,
            Self::EchoReply => 7,
            Self::Unknown(v) => v,
        }
    }
}

/// 容量方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityDirection {
    FromClientToServer,
    FromServerToClient,
}

/// SetupRequest 携带的容量提示
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capacity {
    pub from_client_to_server: u32,
    pub from_server_to_client: u32,
}

impl Capacity {
    pub fn get(&self, direction: CapacityDirection) -> u32 {
        match direction {
            CapacityDirection::FromClientToServer => self.from_client_to_server,
            CapacityDirection::FromServerToClient => self.from_server_to_client,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TunnelControl {
    pub code: ControlCode,
    /// 只有 SetupRequest 才会编码/解码容量。
    pub capacity: Option<Capacity>,
}

impl TunnelControl {
    pub fn new(code: ControlCode) -> Self {
        Self {
            code,
            capacity: None,
        }
    }

    pub fn setup_request(capacity: Capacity) -> Self {
        Self {
            code: ControlCode::SetupRequest,
            capacity: Some(capacity),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + CAPACITY_LEN);
        out.push(self.code.as_u8());
        if let (ControlCode::SetupRequest, Some(c)) = (self.code, self.capacity) {
            out.extend_from_slice(&c.from_client_to_server.to_be_bytes());
            out.extend_from_slice(&c.from_server_to_client.to_be_bytes());
        }
        out
    }

    /// 解码控制消息 body。
    ///
    /// SetupRequest 后面没有字节时 `capacity` 为 `None`（协议上会被拒绝）；
    /// 有字节但不足 8 个则是截断。其它代码忽略尾随字节。
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let (&code, rest) = bytes.split_first().ok_or(CodecError::TooShort {
            len: 0,
            need: 1,
        })?;
        let code = ControlCode::from_u8(code);
        let capacity = match code {
            ControlCode::SetupRequest if rest.is_empty() => None,
            ControlCode::SetupRequest => {
                let c = rest
                    .get(..CAPACITY_LEN)
                    .ok_or(CodecError::TruncatedCapacity { len: rest.len() })?;
                Some(Capacity {
                    from_client_to_server: u32::from_be_bytes([c[0], c[1], c[2], c[3]]),
                    from_server_to_client: u32::from_be_bytes([c[4], c[5], c[6], c[7]]),
                })
            }
            _ => None,
        };
        Ok(Self { code, capacity })
    }

    /// 包装成控制帧。
    pub fn to_frame(&self, dst: MacAddr, src: MacAddr) -> EthernetFrame {
        EthernetFrame::new(
            dst,
            src,
            ETHERTYPE_OUI_EXT,
            &oui_payload(PROTO_TUNNEL_CTRL, &self.encode()),
        )
    }

    /// 从控制帧中解出控制消息。
    pub fn from_frame(frame: &EthernetFrame) -> Result<Self, CodecError> {
        match oui_body(frame) {
            Some((PROTO_TUNNEL_CTRL, body)) => Self::decode(body),
            _ => Err(CodecError::NotControl),
        }
    }
}
