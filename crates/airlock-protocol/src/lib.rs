//! # Airlock Protocol
//!
//! 气闸 HIL 链路的帧语法与线上状态类型定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `keys`: 协议键名常量定义（出站传感器键 / 入站请求键）
//! - `state`: 固定字段的线上状态结构（`SensorSnapshot` / `RequestState`）
//! - `codec`: 帧编码与增量解码（`encode_snapshot` / `FrameDecoder`）
//!
//! ## 帧语法
//!
//! ```text
//! <KEY1:V1,KEY2:V2,...>
//! ```
//!
//! - 键为 ASCII token，值为单字符 `"0"` / `"1"`
//! - `<` `>` `,` `:` 不做转义，约定不会出现在键值中
//! - 解码端对 `<` 之前的字节直接丢弃，收到 `>` 即产出一帧
//!
//! ## 严格解析约定
//!
//! 含有非法值（非 `"0"`/`"1"`）的帧整帧丢弃，避免部分应用不一致状态；
//! 无 `:` 的键值对单独丢弃；未知键忽略（向前兼容）。

pub mod codec;
pub mod keys;
pub mod state;

// 重新导出常用类型
pub use codec::{FrameDecoder, RawFrame, encode_snapshot, parse_pairs};
pub use keys::{RequestKey, SensorKey};
pub use state::{RequestState, RequestUpdate, SensorSnapshot};

use thiserror::Error;

/// 帧起始标记
pub const START_MARKER: u8 = b'<';
/// 帧结束标记
pub const END_MARKER: u8 = b'>';
/// 键值对分隔符
pub const PAIR_SEPARATOR: u8 = b',';
/// 键与值的分隔符（只按第一个出现位置切分）
pub const KEY_VALUE_SEPARATOR: u8 = b':';

/// 协议解析错误类型
///
/// 解析失败只会丢弃当前帧，不会越过编解码层向上传播为致命错误。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// 键值对的值不是 `"0"` 或 `"1"`，整帧被拒绝
    #[error("Invalid value for key `{key}`: `{value}` (expected \"0\" or \"1\")")]
    InvalidValue { key: String, value: String },
}
