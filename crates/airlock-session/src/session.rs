//! 会话 API
//!
//! [`LinkSession`] 是对外入口：创建一次、显式 `connect` / `disconnect`，
//! 可多次重连，门位置跨连接保留。通道在 `connect` 时分离为读写两半并
//! 移交给后台线程，线程退出即释放——错误路径上资源同样不泄漏。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{JoinHandle, spawn};
use std::time::Duration;

use tracing::{info, warn};

use airlock_link::SplittableChannel;
use airlock_protocol::{RequestState, SensorSnapshot};
use airlock_sim::{GateId, SimConfig};

use crate::error::SessionError;
use crate::event::SessionEvent;
use crate::metrics::MetricsSnapshot;
use crate::pipeline::{reader_loop, sender_loop, ticker_loop, wait_for_ready};
use crate::state::{GateStatus, SessionContext};

/// 连接握手配置
///
/// 嵌入式对端在串口打开时往往会复位，需要等它的就绪横幅再开始正常
/// 交换。超时只告警不报错：对端缺席是正常的台架状态。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeConfig {
    /// 在入站字节流中扫描的哨兵子串
    pub sentinel: String,
    /// 等待上限
    pub timeout: Duration,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            sentinel: "READY".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// 会话配置
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Reader 周期
    pub read_period: Duration,
    /// Ticker 周期
    pub tick_period: Duration,
    /// Sender 周期
    pub send_period: Duration,
    /// 连接握手（`None` = 立即开始交换；串口部署通常启用）
    pub handshake: Option<HandshakeConfig>,
    /// 仿真核心配置
    pub sim: SimConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_period: Duration::from_millis(50),
            tick_period: Duration::from_millis(100),
            send_period: Duration::from_millis(100),
            handshake: None,
            sim: SimConfig::default(),
        }
    }
}

/// 链路会话（对外 API）
///
/// 持有共享上下文与三个后台线程的句柄。`Drop` 时自动断开并等待线程
/// 退出（各循环的睡眠都有界，join 不会悬挂）。
pub struct LinkSession {
    ctx: Arc<SessionContext>,
    config: SessionConfig,
    running: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl LinkSession {
    /// 创建会话（两扇门全关；尚未连接）
    pub fn new(config: SessionConfig) -> Self {
        let ctx = Arc::new(SessionContext::new(config.sim.clone()));
        Self {
            ctx,
            config,
            running: Arc::new(AtomicBool::new(false)),
            threads: Vec::new(),
        }
    }

    /// 共享上下文句柄（展示层等协作方任意频率读取）
    pub fn context(&self) -> Arc<SessionContext> {
        self.ctx.clone()
    }

    /// 连接到一条字节通道并启动三个周期活动
    ///
    /// 通道被分离为读写两半，分别移交 Reader / Sender 线程。已连接时
    /// 返回 [`SessionError::AlreadyConnected`]。
    pub fn connect<C: SplittableChannel>(&mut self, channel: C) -> Result<(), SessionError> {
        if !self.threads.is_empty() {
            return Err(SessionError::AlreadyConnected);
        }

        let (mut rx, tx) = channel.split()?;

        if let Some(handshake) = &self.config.handshake {
            if wait_for_ready(&mut rx, handshake.sentinel.as_bytes(), handshake.timeout)? {
                info!(sentinel = %handshake.sentinel, "peer ready");
            } else {
                warn!(
                    sentinel = %handshake.sentinel,
                    timeout_ms = handshake.timeout.as_millis() as u64,
                    "handshake timed out, continuing anyway"
                );
            }
        }

        let running = Arc::new(AtomicBool::new(true));
        self.running = running.clone();

        let reader = {
            let (ctx, running) = (self.ctx.clone(), running.clone());
            let period = self.config.read_period;
            spawn(move || reader_loop(rx, ctx, running, period))
        };
        let ticker = {
            let (ctx, running) = (self.ctx.clone(), running.clone());
            let period = self.config.tick_period;
            spawn(move || ticker_loop(ctx, running, period))
        };
        let sender = {
            let (ctx, running) = (self.ctx.clone(), running);
            let period = self.config.send_period;
            spawn(move || sender_loop(tx, ctx, running, period))
        };

        self.threads = vec![reader, ticker, sender];
        self.ctx.mark_connected();
        Ok(())
    }

    /// 断开连接：通知三个活动停止并等待退出，释放通道
    ///
    /// 半截入站帧随 Reader 的解码器一起丢弃；门状态保留，重连后从
    /// 原位置继续。未连接时是空操作。
    pub fn disconnect(&mut self) {
        self.running.store(false, Ordering::Release);
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                warn!("session thread panicked during shutdown");
            }
        }
        self.ctx.mark_disconnected();
    }

    /// 当前是否连接（致命链路错误会使其自动转为 false）
    pub fn is_connected(&self) -> bool {
        self.ctx.is_connected()
    }

    /// 最近一次出站快照（无锁读取）
    pub fn snapshot(&self) -> SensorSnapshot {
        self.ctx.snapshot()
    }

    /// 门状态读数
    pub fn gate(&self, id: GateId) -> GateStatus {
        self.ctx.gate_status(id)
    }

    /// 对端请求状态
    pub fn requests(&self) -> RequestState {
        self.ctx.requests()
    }

    /// 链路指标快照
    pub fn metrics(&self) -> MetricsSnapshot {
        self.ctx.metrics()
    }

    /// 订阅事件流（收发帧与连接状态的运行日志）
    pub fn events(&self) -> crossbeam_channel::Receiver<SessionEvent> {
        self.ctx.events()
    }

    /// 更新车辆占据区间
    pub fn set_vehicle_span(&self, left: f64, right: f64) {
        self.ctx.set_vehicle_span(left, right);
    }
}

impl Drop for LinkSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airlock_link::LoopbackChannel;

    fn fast_config() -> SessionConfig {
        SessionConfig {
            read_period: Duration::from_millis(5),
            tick_period: Duration::from_millis(5),
            send_period: Duration::from_millis(5),
            ..Default::default()
        }
    }

    #[test]
    fn test_connect_twice_is_rejected() {
        let (local, _peer) = LoopbackChannel::pair();
        let mut session = LinkSession::new(fast_config());
        session.connect(local).unwrap();
        assert!(session.is_connected());

        let (another, _peer2) = LoopbackChannel::pair();
        assert!(matches!(
            session.connect(another),
            Err(SessionError::AlreadyConnected)
        ));
        session.disconnect();
        assert!(!session.is_connected());
    }

    #[test]
    fn test_disconnect_without_connect_is_noop() {
        let mut session = LinkSession::new(fast_config());
        session.disconnect();
        assert!(!session.is_connected());
    }

    #[test]
    fn test_drop_joins_threads() {
        let (local, _peer) = LoopbackChannel::pair();
        let mut session = LinkSession::new(fast_config());
        session.connect(local).unwrap();
        drop(session);
    }
}
