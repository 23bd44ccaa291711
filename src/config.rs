//! 隧道端点配置
//!
//! JSON 里每个字段都可省略，缺省值与运行时默认一致。

use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::frame::MacAddr;
use crate::queue::{FrameQueue, QueueKind, mem_from_frames};
use crate::sim::SimTime;
use crate::wire::{Capacity, DEFAULT_FRAGMENTATION_THRESHOLD};

pub const DEFAULT_TIMEOUT_MS: u64 = 20_000;
pub const DEFAULT_ECHO_INTERVAL_MS: u64 = 1_000;
/// 客户端缺省通告的容量（两个方向相同）
pub const DEFAULT_CAPACITY: u32 = 100_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default)]
    pub kind: QueueKind,
    #[serde(default = "default_queue_bytes")]
    pub max_bytes: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            kind: QueueKind::default(),
            max_bytes: default_queue_bytes(),
        }
    }
}

impl QueueConfig {
    pub fn build(&self) -> Box<dyn FrameQueue> {
        self.kind.build(self.max_bytes)
    }
}

fn default_queue_bytes() -> u64 {
    mem_from_frames(64)
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_echo_interval_ms() -> u64 {
    DEFAULT_ECHO_INTERVAL_MS
}

fn default_fragmentation_threshold() -> u32 {
    DEFAULT_FRAGMENTATION_THRESHOLD
}

fn default_capacity() -> Capacity {
    Capacity {
        from_client_to_server: DEFAULT_CAPACITY,
        from_server_to_client: DEFAULT_CAPACITY,
    }
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelConfig {
    #[serde(default)]
    pub interface_id: MacAddr,
    /// 服务端：会话空闲超时；客户端：服务端沉默超时
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_echo_interval_ms")]
    pub echo_interval_ms: u64,
    #[serde(default = "default_fragmentation_threshold")]
    pub fragmentation_threshold: u32,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default = "default_capacity")]
    pub capacity: Capacity,
    #[serde(default)]
    pub server_address: Option<SocketAddr>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            interface_id: MacAddr::NONE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            echo_interval_ms: DEFAULT_ECHO_INTERVAL_MS,
            fragmentation_threshold: DEFAULT_FRAGMENTATION_THRESHOLD,
            queue: QueueConfig::default(),
            capacity: default_capacity(),
            server_address: None,
            enabled: true,
        }
    }
}

impl TunnelConfig {
    pub fn with_id(interface_id: MacAddr) -> Self {
        Self {
            interface_id,
            ..Self::default()
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let cfg: TunnelConfig = serde_json::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms",
                reason: "must be positive".into(),
            });
        }
        if self.echo_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "echo_interval_ms",
                reason: "must be positive".into(),
            });
        }
        if self.interface_id.is_multicast() {
            return Err(ConfigError::Invalid {
                field: "interface_id",
                reason: format!("{} is a multicast address", self.interface_id),
            });
        }
        Ok(())
    }

    pub fn timeout(&self) -> SimTime {
        SimTime::from_millis(self.timeout_ms)
    }

    pub fn echo_interval(&self) -> SimTime {
        SimTime::from_millis(self.echo_interval_ms)
    }
}
