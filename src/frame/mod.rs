//! 以太网帧模块
//!
//! MAC 地址、帧、注解，以及超大帧的分片/重组。

mod annotations;
mod ethernet;
mod fragment;
mod mac;

pub use annotations::{Annotations, Quality, TUNNEL_NOISE, TUNNEL_RSSI};
pub use ethernet::{ETH_HDR_LEN, EthernetFrame, FrameError};
pub use fragment::{
    FRAG_HDR_LEN, FRAGMENT_OVERHEAD, FragmentHeader, Fragmenter, MAX_PENDING_SEQUENCES,
    REASSEMBLY_TIMEOUT, Reassembler,
};
pub use mac::{MacAddr, MacAddrParseError};
