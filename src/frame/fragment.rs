//! 以太网分片与重组
//!
//! 超过分片阈值的帧被切成若干 OUI 扩展帧（子协议 `PROTO_FRAGMENT`），
//! 每个分片保留原帧的源/目的 MAC，载荷为：
//!
//! ```text
//! | OUI ext(5) | fragment_nr(2) | flags(1) | reserved(1) | size(2) | type_length(2) | chunk ... |
//! ```
//!
//! `size` 在第一个分片里是原载荷总长，其余分片是本分片 chunk 的长度。
//! 每个分片的以太网载荷（OUI 头 + 分片头 + chunk）不超过阈值。

use std::collections::HashMap;

use tracing::{debug, trace};

use super::ethernet::{EthernetFrame, FrameError};
use super::mac::MacAddr;
use crate::sim::SimTime;
use crate::wire::{
    ETHERTYPE_OUI_EXT, OUI_EXT_HDR_LEN, PROTO_FRAGMENT, oui_body, oui_payload,
};

pub const FRAG_HDR_LEN: usize = 8;
/// 每个分片在 chunk 之外额外占用的载荷字节
pub const FRAGMENT_OVERHEAD: usize = OUI_EXT_HDR_LEN + FRAG_HDR_LEN;

const FLAG_MORE: u8 = 0x01;

/// 未完成序列从第一个分片起最多保留这么久
pub const REASSEMBLY_TIMEOUT: SimTime = SimTime::from_secs(5);
/// 同时进行中的序列上限，超出时丢最老的
pub const MAX_PENDING_SEQUENCES: usize = 256;

/// 分片头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentHeader {
    pub fragment_nr: u16,
    pub more: bool,
    pub size: u16,
    pub type_length: u16,
}

impl FragmentHeader {
    fn encode(&self) -> [u8; FRAG_HDR_LEN] {
        let mut out = [0u8; FRAG_HDR_LEN];
        out[0..2].copy_from_slice(&self.fragment_nr.to_be_bytes());
        out[2] = if self.more { FLAG_MORE } else { 0 };
        out[4..6].copy_from_slice(&self.size.to_be_bytes());
        out[6..8].copy_from_slice(&self.type_length.to_be_bytes());
        out
    }

    /// 解析分片帧，返回分片头与 chunk。
    pub fn parse(frame: &EthernetFrame) -> Result<(Self, &[u8]), FrameError> {
        let Some((PROTO_FRAGMENT, body)) = oui_body(frame) else {
            return Err(FrameError::TruncatedFragment);
        };
        let h = body.get(..FRAG_HDR_LEN).ok_or(FrameError::TruncatedFragment)?;
        let hdr = Self {
            fragment_nr: u16::from_be_bytes([h[0], h[1]]),
            more: h[2] & FLAG_MORE != 0,
            size: u16::from_be_bytes([h[4], h[5]]),
            type_length: u16::from_be_bytes([h[6], h[7]]),
        };
        if hdr.fragment_nr == 0 {
            return Err(FrameError::BadFragmentNumber);
        }
        Ok((hdr, &body[FRAG_HDR_LEN..]))
    }
}

/// 分片器
#[derive(Debug, Default)]
pub struct Fragmenter {
    fragmented_frames: u64,
}

impl Fragmenter {
    /// 以太网载荷超过阈值即需要分片。
    pub fn needs_fragmentation(&self, frame: &EthernetFrame, threshold: u32) -> bool {
        frame.payload_len() > threshold as usize
    }

    /// 把帧切成有序分片；阈值过小时每片至少携带 1 字节。
    ///
    /// 分片头的 `size` 只有 16 位，载荷超过 65535 字节的帧无法分片。
    pub fn fragment(
        &mut self,
        frame: &EthernetFrame,
        threshold: u32,
    ) -> Result<Vec<EthernetFrame>, FrameError> {
        let payload = frame.payload();
        let total = payload.len();
        let Ok(total_field) = u16::try_from(total) else {
            return Err(FrameError::TooLargeToFragment { len: total });
        };
        let chunk_len = (threshold as usize).saturating_sub(FRAGMENT_OVERHEAD).max(1);
        self.fragmented_frames = self.fragmented_frames.saturating_add(1);

        let chunks: Vec<&[u8]> = if payload.is_empty() {
            vec![payload]
        } else {
            payload.chunks(chunk_len).collect()
        };
        let last = chunks.len() - 1;
        trace!(total, chunk_len, fragments = chunks.len(), "切分帧");

        // total ≤ u16::MAX 且每片至少 1 字节，分片号和 chunk 长度都放得进 u16
        let frags = chunks
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| {
                let hdr = FragmentHeader {
                    fragment_nr: (i + 1) as u16,
                    more: i != last,
                    size: if i == 0 { total_field } else { chunk.len() as u16 },
                    type_length: frame.ether_type(),
                };
                let mut body = Vec::with_capacity(FRAG_HDR_LEN + chunk.len());
                body.extend_from_slice(&hdr.encode());
                body.extend_from_slice(chunk);
                let mut frag = EthernetFrame::new(
                    frame.destination(),
                    frame.source(),
                    ETHERTYPE_OUI_EXT,
                    &oui_payload(PROTO_FRAGMENT, &body),
                );
                frag.annotations = frame.annotations.clone();
                frag
            })
            .collect();
        Ok(frags)
    }

    /// 读取并清零分片计数
    pub fn take_fragmentation_count(&mut self) -> u64 {
        std::mem::take(&mut self.fragmented_frames)
    }

    pub fn fragmentation_count(&self) -> u64 {
        self.fragmented_frames
    }
}

#[derive(Debug)]
struct Partial {
    /// 第一个分片到达的时刻
    started: SimTime,
    next_nr: u16,
    total: usize,
    type_length: u16,
    dst: MacAddr,
    buf: Vec<u8>,
}

/// 重组器：每个源 MAC 至多一个进行中的分片序列。
///
/// 未完成的序列超过 [`REASSEMBLY_TIMEOUT`] 被清掉；进行中的序列数
/// 不超过 `max_pending`，满了先丢最老的。被清掉的序列计入 discarded。
#[derive(Debug)]
pub struct Reassembler {
    pending: HashMap<MacAddr, Partial>,
    timeout: SimTime,
    max_pending: usize,
    reassembled: u64,
    discarded: u64,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::with_limits(REASSEMBLY_TIMEOUT, MAX_PENDING_SEQUENCES)
    }
}

impl Reassembler {
    pub fn with_limits(timeout: SimTime, max_pending: usize) -> Self {
        Self {
            pending: HashMap::new(),
            timeout,
            max_pending: max_pending.max(1),
            reassembled: 0,
            discarded: 0,
        }
    }

    /// 进行中的分片序列数
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// 清掉超时的序列
    pub fn expire(&mut self, now: SimTime) {
        let timeout = self.timeout;
        let before = self.pending.len();
        self.pending.retain(|_, p| now.since(p.started) < timeout);
        let expired = before - self.pending.len();
        if expired > 0 {
            debug!(expired, "清理超时的分片序列");
            self.discarded = self.discarded.saturating_add(expired as u64);
        }
    }

    /// 处理一个分片；序列完整时返回重组后的帧（注解取自最后一个分片）。
    pub fn process(&mut self, fragment: &EthernetFrame, now: SimTime) -> Option<EthernetFrame> {
        self.expire(now);
        let (hdr, chunk) = match FragmentHeader::parse(fragment) {
            Ok(v) => v,
            Err(e) => {
                debug!(error = %e, "丢弃无效分片");
                self.discarded = self.discarded.saturating_add(1);
                return None;
            }
        };
        let src = fragment.source();

        if hdr.fragment_nr == 1 {
            if self.pending.remove(&src).is_some() {
                self.discarded = self.discarded.saturating_add(1);
                debug!(%src, "新序列开始，丢弃未完成的分片序列");
            }
            while self.pending.len() >= self.max_pending {
                let Some(oldest) = self
                    .pending
                    .iter()
                    .min_by_key(|(_, p)| p.started)
                    .map(|(mac, _)| *mac)
                else {
                    break;
                };
                self.pending.remove(&oldest);
                self.discarded = self.discarded.saturating_add(1);
                debug!(src = %oldest, "分片序列过多，丢弃最老的一个");
            }
            self.pending.insert(
                src,
                Partial {
                    started: now,
                    next_nr: 1,
                    total: hdr.size as usize,
                    type_length: hdr.type_length,
                    dst: fragment.destination(),
                    // 按实际到达的 chunk 增长，不按声明的总长预留
                    buf: Vec::new(),
                },
            );
        }

        let Some(partial) = self.pending.get_mut(&src) else {
            debug!(%src, fragment_nr = hdr.fragment_nr, "没有对应的分片序列");
            self.discarded = self.discarded.saturating_add(1);
            return None;
        };
        if partial.next_nr != hdr.fragment_nr {
            debug!(%src, expected = partial.next_nr, got = hdr.fragment_nr, "分片乱序，丢弃整个序列");
            self.pending.remove(&src);
            self.discarded = self.discarded.saturating_add(1);
            return None;
        }

        let want = if hdr.fragment_nr == 1 {
            partial.total
        } else {
            hdr.size as usize
        };
        let room = partial.total - partial.buf.len();
        partial.buf.extend_from_slice(&chunk[..chunk.len().min(want).min(room)]);
        partial.next_nr = partial.next_nr.wrapping_add(1);

        if hdr.more {
            return None;
        }

        let partial = self.pending.remove(&src)?;
        if partial.buf.len() != partial.total {
            debug!(%src, got = partial.buf.len(), total = partial.total, "分片序列长度不符");
            self.discarded = self.discarded.saturating_add(1);
            return None;
        }
        self.reassembled = self.reassembled.saturating_add(1);
        let mut frame = EthernetFrame::new(partial.dst, src, partial.type_length, &partial.buf);
        frame.annotations = fragment.annotations.clone();
        Some(frame)
    }

    pub fn packets_reassembled(&self) -> u64 {
        self.reassembled
    }

    pub fn fragments_discarded(&self) -> u64 {
        self.discarded
    }
}
