//! 会话链路指标
//!
//! 零开销原子计数器，任意线程可安全读取，不引入锁竞争。
//! 用于监控链路健康状态，也是被拒绝帧的运行日志的计数来源。

use std::sync::atomic::{AtomicU64, Ordering};

/// 链路实时指标
#[derive(Debug, Default)]
pub struct LinkMetrics {
    /// 收到的完整帧总数（含随后被拒绝的）
    pub rx_frames_total: AtomicU64,
    /// 整帧拒绝（严格解析失败）的帧数
    pub rx_frames_rejected: AtomicU64,
    /// 发出的帧总数
    pub tx_frames_total: AtomicU64,
    /// 收到的字节总数
    pub rx_bytes_total: AtomicU64,
    /// 发出的字节总数
    pub tx_bytes_total: AtomicU64,
    /// 非致命链路错误次数
    pub link_errors: AtomicU64,
}

impl LinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取当前计数快照（Relaxed 读取，监控用途足够）
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rx_frames_total: self.rx_frames_total.load(Ordering::Relaxed),
            rx_frames_rejected: self.rx_frames_rejected.load(Ordering::Relaxed),
            tx_frames_total: self.tx_frames_total.load(Ordering::Relaxed),
            rx_bytes_total: self.rx_bytes_total.load(Ordering::Relaxed),
            tx_bytes_total: self.tx_bytes_total.load(Ordering::Relaxed),
            link_errors: self.link_errors.load(Ordering::Relaxed),
        }
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub rx_frames_total: u64,
    pub rx_frames_rejected: u64,
    pub tx_frames_total: u64,
    pub rx_bytes_total: u64,
    pub tx_bytes_total: u64,
    pub link_errors: u64,
}
