//! 隧道端点
//!
//! 传输内核 (`transport`) 负责与角色无关的收发；`server` / `client` 各自实现
//! `TunnelRole`，持有自己的会话状态。`TunnelEndpoint` 把两种角色收拢成一个
//! 封闭枚举，供事件循环统一调度。

mod client;
mod endpoint;
mod role;
mod server;
mod session_table;
mod stats;
mod transport;

pub use client::{ClientSession, ClientState, ClientStatus, TunnelClient};
pub use endpoint::{EndpointReport, TunnelEndpoint};
pub use role::{ControlReply, TunnelRole, TxInfo};
pub use server::{ServerSessions, SessionInfo, TunnelServer};
pub use session_table::{Session, SessionKey, SessionState, SessionTable};
pub use stats::IoStats;
pub use transport::{TransportCore, annotate_quality};

/// 分片阈值下限：再小每个分片就只剩几个字节的有效载荷
pub const MIN_FRAGMENTATION_THRESHOLD: u32 = 128;
