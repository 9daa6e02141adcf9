//! 会话层错误类型定义

use airlock_link::LinkError;
use thiserror::Error;

/// 会话层错误类型
///
/// 协议解析错误不出现在这里：坏帧在编解码边界被丢弃并计数，
/// 不会向上传播（见 `airlock-protocol`）。
#[derive(Error, Debug)]
pub enum SessionError {
    /// 链路错误（打开/读/写失败）
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    /// 会话已处于连接状态
    #[error("Session already connected. Call `disconnect()` first")]
    AlreadyConnected,
}
