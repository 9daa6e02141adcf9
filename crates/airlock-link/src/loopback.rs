//! 进程内环回通道
//!
//! 一对端点，各自的写端连到对方的读端。无任何 OS 资源，用于集成测试、
//! CI 与 `--sim` 演示模式。
//!
//! 任一端点（或其分离出的半通道）被丢弃时，会标记相应方向关闭：
//! 对端排空缓冲后读到 [`LinkError::Closed`]，写入立即失败。

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{ByteChannel, LinkError, RxChannel, SplittableChannel, TxChannel};

/// 单方向字节管道
#[derive(Debug, Default)]
struct Pipe {
    buf: VecDeque<u8>,
    closed: bool,
}

type SharedPipe = Arc<Mutex<Pipe>>;

fn pipe_read(pipe: &SharedPipe, buf: &mut [u8]) -> Result<usize, LinkError> {
    let mut pipe = pipe.lock();
    if pipe.buf.is_empty() {
        // 先排空再报告关闭
        return if pipe.closed { Err(LinkError::Closed) } else { Ok(0) };
    }
    let n = buf.len().min(pipe.buf.len());
    for slot in buf.iter_mut().take(n) {
        *slot = pipe.buf.pop_front().unwrap_or_default();
    }
    Ok(n)
}

fn pipe_write(pipe: &SharedPipe, bytes: &[u8]) -> Result<(), LinkError> {
    let mut pipe = pipe.lock();
    if pipe.closed {
        return Err(LinkError::Closed);
    }
    pipe.buf.extend(bytes.iter().copied());
    Ok(())
}

fn pipe_close(pipe: &SharedPipe) {
    pipe.lock().closed = true;
}

/// 环回通道端点
pub struct LoopbackChannel {
    rx: SharedPipe,
    tx: SharedPipe,
}

impl LoopbackChannel {
    /// 创建互联的一对端点
    pub fn pair() -> (LoopbackChannel, LoopbackChannel) {
        let a_to_b: SharedPipe = Arc::default();
        let b_to_a: SharedPipe = Arc::default();
        (
            LoopbackChannel {
                rx: b_to_a.clone(),
                tx: a_to_b.clone(),
            },
            LoopbackChannel {
                rx: a_to_b,
                tx: b_to_a,
            },
        )
    }
}

impl ByteChannel for LoopbackChannel {
    fn try_read(&mut self, buf: &mut [u8]) -> Result<usize, LinkError> {
        pipe_read(&self.rx, buf)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        pipe_write(&self.tx, bytes)
    }
}

impl SplittableChannel for LoopbackChannel {
    type Rx = LoopbackRx;
    type Tx = LoopbackTx;

    fn split(self) -> Result<(Self::Rx, Self::Tx), LinkError> {
        Ok((LoopbackRx { pipe: self.rx }, LoopbackTx { pipe: self.tx }))
    }
}

/// 环回只读半通道
pub struct LoopbackRx {
    pipe: SharedPipe,
}

impl RxChannel for LoopbackRx {
    fn try_read(&mut self, buf: &mut [u8]) -> Result<usize, LinkError> {
        pipe_read(&self.pipe, buf)
    }
}

impl Drop for LoopbackRx {
    fn drop(&mut self) {
        // 读端释放后，对端写入应当失败
        pipe_close(&self.pipe);
    }
}

/// 环回只写半通道
pub struct LoopbackTx {
    pipe: SharedPipe,
}

impl TxChannel for LoopbackTx {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        pipe_write(&self.pipe, bytes)
    }
}

impl Drop for LoopbackTx {
    fn drop(&mut self) {
        pipe_close(&self.pipe);
    }
}
