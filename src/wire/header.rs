//! 隧道头
//!
//! 每个 UDP 载荷都以 4 字节隧道头开始（大端）：
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |       reserved / magic (15)   |     sequence number (17)      |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use super::CodecError;
use crate::seq::SEQ_MODULUS;

pub const TUNNEL_HDR_LEN: usize = 4;
pub const TUNNEL_MAGIC: u16 = 0x4711 & 0x7fff;

const SEQ_BITS: u32 = 17;
const SEQ_MASK: u32 = SEQ_MODULUS - 1;

/// 解码后的隧道头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TunnelHeader {
    pub magic_valid: bool,
    pub seq: u32,
}

impl TunnelHeader {
    /// 编码；`seq` 超出 17 位时按模截断。
    pub fn encode(seq: u32) -> [u8; TUNNEL_HDR_LEN] {
        let word = ((TUNNEL_MAGIC as u32) << SEQ_BITS) | (seq & SEQ_MASK);
        word.to_be_bytes()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let Some(head) = bytes.get(..TUNNEL_HDR_LEN) else {
            return Err(CodecError::TooShort {
                len: bytes.len(),
                need: TUNNEL_HDR_LEN,
            });
        };
        let word = u32::from_be_bytes([head[0], head[1], head[2], head[3]]);
        Ok(Self {
            magic_valid: (word >> SEQ_BITS) as u16 == TUNNEL_MAGIC,
            seq: word & SEQ_MASK,
        })
    }
}
