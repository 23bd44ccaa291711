//! 以太网帧
//!
//! 帧以原始字节保存：`dst(6) src(6) type(2) payload`，附带不上线的注解。

use super::annotations::Annotations;
use super::mac::MacAddr;
use thiserror::Error;

/// 以太网头长度（不含 VLAN）。
pub const ETH_HDR_LEN: usize = 14;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame too short: {len} bytes, need at least {min}")]
    TooShort { len: usize, min: usize },
    #[error("fragment header truncated")]
    TruncatedFragment,
    #[error("fragment number must start at 1")]
    BadFragmentNumber,
    #[error("payload of {len} bytes does not fit a fragment header")]
    TooLargeToFragment { len: usize },
}

/// 以太网帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthernetFrame {
    data: Vec<u8>,
    pub annotations: Annotations,
}

impl EthernetFrame {
    pub fn new(dst: MacAddr, src: MacAddr, ether_type: u16, payload: &[u8]) -> Self {
        let mut data = Vec::with_capacity(ETH_HDR_LEN + payload.len());
        data.extend_from_slice(&dst.0);
        data.extend_from_slice(&src.0);
        data.extend_from_slice(&ether_type.to_be_bytes());
        data.extend_from_slice(payload);
        Self {
            data,
            annotations: Annotations::default(),
        }
    }

    /// 从线上字节构造；不足一个以太网头时报错。
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < ETH_HDR_LEN {
            return Err(FrameError::TooShort {
                len: bytes.len(),
                min: ETH_HDR_LEN,
            });
        }
        Ok(Self {
            data: bytes.to_vec(),
            annotations: Annotations::default(),
        })
    }

    pub fn destination(&self) -> MacAddr {
        MacAddr(self.mac_at(0))
    }

    pub fn source(&self) -> MacAddr {
        MacAddr(self.mac_at(6))
    }

    pub fn set_destination(&mut self, mac: MacAddr) {
        self.data[0..6].copy_from_slice(&mac.0);
    }

    pub fn set_source(&mut self, mac: MacAddr) {
        self.data[6..12].copy_from_slice(&mac.0);
    }

    pub fn ether_type(&self) -> u16 {
        u16::from_be_bytes([self.data[12], self.data[13]])
    }

    pub fn payload(&self) -> &[u8] {
        &self.data[ETH_HDR_LEN..]
    }

    pub fn payload_len(&self) -> usize {
        self.data.len() - ETH_HDR_LEN
    }

    /// 整帧字节数（含以太网头）。
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn mac_at(&self, off: usize) -> [u8; 6] {
        let mut m = [0u8; 6];
        m.copy_from_slice(&self.data[off..off + 6]);
        m
    }
}
