//! 帧编码与增量解码
//!
//! 编码端输出是确定性的：7 个传感器键按规范顺序产出，顺序本身是协议的一部分。
//!
//! 解码端是一个小型显式文法扫描器，按字节增量消费任意切分的输入流：
//!
//! - 未武装（disarmed）状态下，`<` 之前的所有字节被丢弃
//! - 收到 `<` 后武装，载荷字节开始累积
//! - 收到 `>` 即产出一帧并解除武装
//! - 武装状态下再次出现 `<` 时重置载荷缓冲，视为新帧的开始
//!
//! 文法限制：帧不可嵌套，重入的 `<` 不作为错误检测，仅重启缓冲。
//! 扫描器对任意字节输入都不得 panic（见 proptest 用例）。

use std::borrow::Cow;
use std::collections::VecDeque;

use crate::state::SensorSnapshot;
use crate::{END_MARKER, KEY_VALUE_SEPARATOR, PAIR_SEPARATOR, ProtocolError, START_MARKER};

/// 把传感器快照编码为一个完整帧
///
/// 输出形如 `<PRESENCE_FRONT:0,...,GATE_MOVING_B:1>`，键按规范顺序排列。
pub fn encode_snapshot(snapshot: &SensorSnapshot) -> String {
    let mut out = String::with_capacity(128);
    out.push(START_MARKER as char);
    for (i, (key, value)) in snapshot.iter().enumerate() {
        if i > 0 {
            out.push(PAIR_SEPARATOR as char);
        }
        out.push_str(key.as_str());
        out.push(KEY_VALUE_SEPARATOR as char);
        out.push(if value { '1' } else { '0' });
    }
    out.push(END_MARKER as char);
    out
}

/// 一个完整帧的原始载荷（不含 `<` `>` 标记）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    payload: Vec<u8>,
}

impl RawFrame {
    /// 载荷字节
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// 日志用的载荷文本（非 UTF-8 字节做替换处理）
    pub fn display(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// 增量帧解码器
///
/// 字节通过 [`extend`](FrameDecoder::extend) 入队，[`poll_frame`](FrameDecoder::poll_frame)
/// 每次调用至多产出一帧；缓冲中存在多帧时调用方需循环排空。
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// 已接收、尚未消费的字节
    pending: VecDeque<u8>,
    /// 武装后累积的载荷
    payload: Vec<u8>,
    /// 是否处于 `<` 与 `>` 之间
    armed: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一段新收到的字节（可以在任意位置切分）
    pub fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend(bytes.iter().copied());
    }

    /// 消费队列中的字节，至多产出一帧
    ///
    /// 返回 `None` 表示队列已耗尽且当前没有完整帧。
    pub fn poll_frame(&mut self) -> Option<RawFrame> {
        while let Some(byte) = self.pending.pop_front() {
            if self.armed {
                match byte {
                    END_MARKER => {
                        self.armed = false;
                        return Some(RawFrame {
                            payload: std::mem::take(&mut self.payload),
                        });
                    },
                    // 顶层重入的起始标记：重启载荷缓冲（文法限制，不报错）
                    START_MARKER => self.payload.clear(),
                    _ => self.payload.push(byte),
                }
            } else if byte == START_MARKER {
                self.armed = true;
                self.payload.clear();
            }
            // 未武装状态下的其他字节直接丢弃
        }
        None
    }

    /// 丢弃全部未消费字节与未完成的半帧（断开连接时调用）
    pub fn reset(&mut self) {
        self.pending.clear();
        self.payload.clear();
        self.armed = false;
    }

    /// 是否正处于一个未完成的帧内
    pub fn is_armed(&self) -> bool {
        self.armed
    }
}

/// 严格解析帧载荷为键值对列表
///
/// - 按 `,` 切分，再按**第一个** `:` 切分键与值
/// - 无 `:` 的键值对被丢弃（不报错）
/// - 值不是 `"0"`/`"1"` 时整帧拒绝，不返回任何键值对
/// - 键不做合法性判断（未知键由调用方忽略）；非 UTF-8 的键不可能是已知键，跳过
pub fn parse_pairs(payload: &[u8]) -> Result<Vec<(&str, bool)>, ProtocolError> {
    let mut pairs = Vec::new();
    for chunk in payload.split(|&b| b == PAIR_SEPARATOR) {
        let Some(sep) = chunk.iter().position(|&b| b == KEY_VALUE_SEPARATOR) else {
            // 无 ':' 的对：丢弃，继续
            continue;
        };
        let (key, value) = (&chunk[..sep], &chunk[sep + 1..]);
        let value = match value {
            b"0" => false,
            b"1" => true,
            other => {
                return Err(ProtocolError::InvalidValue {
                    key: String::from_utf8_lossy(key).into_owned(),
                    value: String::from_utf8_lossy(other).into_owned(),
                });
            },
        };
        if let Ok(key) = std::str::from_utf8(key) {
            pairs.push((key, value));
        }
    }
    Ok(pairs)
}
