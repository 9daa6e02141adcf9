//! # Airlock Link Layer
//!
//! 字节通道硬件抽象层，提供统一的全双工字节流接口。
//!
//! 链路上跑的是 8-bit clean 的文本协议，本层不理解帧语法，只搬运字节。
//! 两个后端：
//!
//! - [`SerialChannel`]：真实串口（115200-8N1，非阻塞短超时读取）
//! - [`LoopbackChannel`]：进程内环回对，用于集成测试与无硬件演示
//!
//! 读写两端可通过 [`SplittableChannel::split`] 分离，由 Reader / Sender
//! 两个线程各自独占一半，互不阻塞。

use std::time::Duration;
use thiserror::Error;

pub mod loopback;
pub mod serial;

pub use loopback::{LoopbackChannel, LoopbackRx, LoopbackTx};
pub use serial::{SerialChannel, SerialRx, SerialTx};

/// 链路层统一错误类型
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Device Error: {0}")]
    Device(#[from] DeviceError),
    #[error("Read timeout")]
    Timeout,
    #[error("Channel closed by peer")]
    Closed,
}

impl LinkError {
    /// 是否为致命错误（致命错误会使会话停止收发并标记断开）
    ///
    /// 超时不是错误路径：空闲对端是正常状态。
    pub fn is_fatal(&self) -> bool {
        match self {
            LinkError::Timeout => false,
            LinkError::Io(_) | LinkError::Closed => true,
            LinkError::Device(e) => e.is_fatal(),
        }
    }
}

/// 设备/后端错误的结构化分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceErrorKind {
    Unknown,
    NotFound,
    NoDevice,
    AccessDenied,
    Busy,
    UnsupportedConfig,
}

/// 结构化设备错误
#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct DeviceError {
    pub kind: DeviceErrorKind,
    pub message: String,
}

impl DeviceError {
    pub fn new(kind: DeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            DeviceErrorKind::NoDevice | DeviceErrorKind::AccessDenied | DeviceErrorKind::NotFound
        )
    }
}

/// 全双工字节通道
///
/// 读取必须是非阻塞或短超时有界的；`Ok(0)` 表示对端暂无数据（正常状态）。
pub trait ByteChannel {
    /// 读取当前可用的字节，最多填满 `buf`，无数据时返回 `Ok(0)`
    fn try_read(&mut self, buf: &mut [u8]) -> Result<usize, LinkError>;
    /// 写出全部字节
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), LinkError>;
    /// 刷出写缓冲（默认空操作）
    fn flush(&mut self) -> Result<(), LinkError> {
        Ok(())
    }
}

/// 只读半通道
pub trait RxChannel: Send {
    fn try_read(&mut self, buf: &mut [u8]) -> Result<usize, LinkError>;
}

/// 只写半通道
pub trait TxChannel: Send {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), LinkError>;
    fn flush(&mut self) -> Result<(), LinkError> {
        Ok(())
    }
}

/// 可分离为独立读写两半的通道
pub trait SplittableChannel: ByteChannel {
    type Rx: RxChannel + 'static;
    type Tx: TxChannel + 'static;
    fn split(self) -> Result<(Self::Rx, Self::Tx), LinkError>;
}

/// 链路缺省波特率（与参考硬件一致）
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// 串口读取的缺省有界超时
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(10);
