//! 会话事件流
//!
//! 面向用户的运行日志来源：已发送 / 已接收 / 被拒绝的帧与连接状态变化。
//! 事件经有界 crossbeam 通道广播，发布端从不阻塞——无人消费或缓冲占满
//! 时事件被静默丢弃（计数指标不受影响，见 [`crate::metrics`]）。

/// 会话事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// 出站帧已写出（携带完整线上文本）
    FrameSent(String),
    /// 入站帧解码成功（含未携带请求键的帧）
    FrameReceived(String),
    /// 入站帧整帧拒绝
    FrameRejected(String),
    /// 会话进入连接状态
    Connected,
    /// 会话断开（显式断开或致命链路错误）
    Disconnected,
}

/// 事件缓冲容量（有界，发布端 `try_send` 永不阻塞）
pub(crate) const EVENT_BUFFER: usize = 256;
