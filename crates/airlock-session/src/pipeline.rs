//! 周期活动循环
//!
//! Reader / Ticker / Sender 三个循环各跑在自己的线程上，通过
//! `Arc<SessionContext>` 访问共享状态，通过 `Arc<AtomicBool>` 联动退出：
//! 任一循环遇到致命链路错误时清掉运行标志，其余循环在下一个周期退出，
//! 会话被标记断开。门状态保留在上下文里，等待重连。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, error, trace, warn};

use airlock_link::{RxChannel, TxChannel};
use airlock_protocol::{FrameDecoder, RequestUpdate, encode_snapshot};
use airlock_sim::{GateController, GateState, SensorModel};

use crate::event::SessionEvent;
use crate::state::SessionContext;

/// 读取缓冲大小（单次 `try_read` 的上限）
const READ_BUF_SIZE: usize = 256;

/// Reader 循环：拉取字节 → 解码 → 应用请求
///
/// 每个周期先排空通道当前可用的字节，再排空解码器里攒出的所有完整帧。
/// 坏帧整帧丢弃并计数，解码从后续字节继续；未携带请求键的帧只计数。
pub fn reader_loop<R: RxChannel>(
    mut rx: R,
    ctx: Arc<SessionContext>,
    running: Arc<AtomicBool>,
    period: Duration,
) {
    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; READ_BUF_SIZE];

    while running.load(Ordering::Acquire) {
        // 排空当前可用字节
        loop {
            match rx.try_read(&mut buf) {
                Ok(0) => break, // 对端空闲，正常
                Ok(n) => {
                    ctx.metrics.rx_bytes_total.fetch_add(n as u64, Ordering::Relaxed);
                    decoder.extend(&buf[..n]);
                },
                Err(e) if e.is_fatal() => {
                    error!(error = %e, "reader stopping on fatal link error");
                    running.store(false, Ordering::Release);
                    ctx.mark_disconnected();
                    return;
                },
                Err(e) => {
                    warn!(error = %e, "transient read error");
                    ctx.metrics.link_errors.fetch_add(1, Ordering::Relaxed);
                    break;
                },
            }
        }

        // 每次 poll 至多一帧，循环排空
        while let Some(frame) = decoder.poll_frame() {
            ctx.metrics.rx_frames_total.fetch_add(1, Ordering::Relaxed);
            match RequestUpdate::parse(frame.payload()) {
                Ok(update) if update.is_empty() => {
                    trace!(frame = %frame.display(), "frame carried no request keys");
                    ctx.emit(SessionEvent::FrameReceived(frame.display().into_owned()));
                },
                Ok(update) => {
                    let mut state = ctx.state.lock();
                    state.requests.apply(update);
                    // 请求立即转发给对应的门控制器
                    if let Some(open) = update.gate_a {
                        state.gate_a.receive_request(open);
                    }
                    if let Some(open) = update.gate_b {
                        state.gate_b.receive_request(open);
                    }
                    drop(state);
                    debug!(frame = %frame.display(), "request frame applied");
                    ctx.emit(SessionEvent::FrameReceived(frame.display().into_owned()));
                },
                Err(e) => {
                    ctx.metrics.rx_frames_rejected.fetch_add(1, Ordering::Relaxed);
                    warn!(frame = %frame.display(), error = %e, "rejecting malformed frame");
                    ctx.emit(SessionEvent::FrameRejected(frame.display().into_owned()));
                },
            }
        }

        spin_sleep::sleep(period);
    }
}

/// Ticker 循环：按真实墙钟增量推进两扇门
///
/// 用上一次 tick 以来的实测 `Instant` 差值，而不是固定量：固定量在
/// 调度抖动下会漂移。安全联锁开启时，安全传感器触发会暂停对应门的
/// **关门**运动；开门永不阻塞。
pub fn ticker_loop(ctx: Arc<SessionContext>, running: Arc<AtomicBool>, period: Duration) {
    let mut last = Instant::now();

    while running.load(Ordering::Acquire) {
        spin_sleep::sleep(period);
        let now = Instant::now();
        let dt = now - last;
        last = now;

        let mut state = ctx.state.lock();
        let (block_a, block_b) = if ctx.sim.safety_stop {
            let readings = SensorModel::compute(&state.vehicle, &ctx.sim.geometry);
            (readings.gate_safety_a, readings.gate_safety_b)
        } else {
            (false, false)
        };
        tick_gate(&mut state.gate_a, dt, block_a);
        tick_gate(&mut state.gate_b, dt, block_b);
    }
}

fn tick_gate(gate: &mut GateController, dt: Duration, safety_blocked: bool) {
    if safety_blocked && gate.state() == GateState::Closing {
        trace!(gate = %gate.id(), "closing paused while safety sensor is triggered");
        return;
    }
    gate.tick(dt);
}

/// Sender 循环：重算出站快照 → 发布 → 编码 → 写出
///
/// 连接建立后立即发送第一帧，此后按周期发送。
pub fn sender_loop<T: TxChannel>(
    mut tx: T,
    ctx: Arc<SessionContext>,
    running: Arc<AtomicBool>,
    period: Duration,
) {
    while running.load(Ordering::Acquire) {
        let snapshot = ctx.compute_outbound();
        ctx.last_snapshot.store(Arc::new(snapshot));

        let wire = encode_snapshot(&snapshot);
        match tx.write_all(wire.as_bytes()).and_then(|_| tx.flush()) {
            Ok(()) => {
                ctx.metrics.tx_frames_total.fetch_add(1, Ordering::Relaxed);
                ctx.metrics.tx_bytes_total.fetch_add(wire.len() as u64, Ordering::Relaxed);
                trace!(frame = %wire, "snapshot frame sent");
                ctx.emit(SessionEvent::FrameSent(wire));
            },
            Err(e) if e.is_fatal() => {
                error!(error = %e, "sender stopping on fatal link error");
                running.store(false, Ordering::Release);
                ctx.mark_disconnected();
                return;
            },
            Err(e) => {
                warn!(error = %e, "transient write error");
                ctx.metrics.link_errors.fetch_add(1, Ordering::Relaxed);
            },
        }

        spin_sleep::sleep(period);
    }
}

/// 握手：在有界超时内等待对端的哨兵字节串
///
/// 对端复位/上电需要时间，且复位前可能残留半截输出；这里只做子串扫描，
/// 扫过的字节全部丢弃（帧解码器反正会丢弃 `<` 之前的噪声）。
/// 返回 `Ok(true)` = 看到哨兵；`Ok(false)` = 超时（调用方记告警后照常
/// 继续——对端缺席不算连接失败）；致命链路错误原样上抛。
pub fn wait_for_ready<R: RxChannel>(
    rx: &mut R,
    sentinel: &[u8],
    timeout: Duration,
) -> Result<bool, airlock_link::LinkError> {
    if sentinel.is_empty() {
        return Ok(true);
    }
    let deadline = Instant::now() + timeout;
    let mut window: Vec<u8> = Vec::with_capacity(sentinel.len() * 2);
    let mut buf = [0u8; READ_BUF_SIZE];

    while Instant::now() < deadline {
        match rx.try_read(&mut buf) {
            Ok(0) => spin_sleep::sleep(Duration::from_millis(20)),
            Ok(n) => {
                window.extend_from_slice(&buf[..n]);
                if window.windows(sentinel.len()).any(|w| w == sentinel) {
                    return Ok(true);
                }
                // 只保留可能与后续字节拼成哨兵的尾部
                if window.len() > sentinel.len() {
                    window.drain(..window.len() - sentinel.len() + 1);
                }
            },
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(error = %e, "transient read error during handshake");
            },
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use airlock_link::{ByteChannel, LoopbackChannel, SplittableChannel};
    use airlock_sim::SimConfig;

    #[test]
    fn test_wait_for_ready_sees_sentinel_split_across_reads() {
        let (mut peer, local) = LoopbackChannel::pair();
        let (mut rx, _tx) = local.split().unwrap();
        peer.write_all(b"boot noise... REA").unwrap();
        peer.write_all(b"DY\r\n").unwrap();

        let seen = wait_for_ready(&mut rx, b"READY", Duration::from_millis(500)).unwrap();
        assert!(seen);
    }

    #[test]
    fn test_wait_for_ready_times_out_quietly() {
        let (_peer, local) = LoopbackChannel::pair();
        let (mut rx, _tx) = local.split().unwrap();
        let seen = wait_for_ready(&mut rx, b"READY", Duration::from_millis(50)).unwrap();
        assert!(!seen);
    }

    #[test]
    fn test_wait_for_ready_empty_sentinel_is_immediate() {
        let (_peer, local) = LoopbackChannel::pair();
        let (mut rx, _tx) = local.split().unwrap();
        assert!(wait_for_ready(&mut rx, b"", Duration::from_secs(1)).unwrap());
    }

    #[test]
    fn test_safety_stop_pauses_closing_only() {
        let sim = SimConfig {
            safety_stop: true,
            ..Default::default()
        };
        let geometry = sim.geometry;
        let ctx = SessionContext::new(sim);

        // 车辆停在门 A 的安全窗口里
        let gate_a_x = geometry.gate_a_x();
        ctx.set_vehicle_span(gate_a_x - 10.0, gate_a_x + 10.0);

        {
            let mut state = ctx.state.lock();
            // 门 A 先开到一半再请求关门
            state.gate_a.receive_request(true);
            state.gate_a.tick(Duration::from_millis(1500));
            state.gate_a.receive_request(false);
        }

        // 模拟 ticker 的单步：安全触发时关门被暂停
        {
            let mut state = ctx.state.lock();
            let readings = SensorModel::compute(&state.vehicle, &geometry);
            assert!(readings.gate_safety_a);
            tick_gate(&mut state.gate_a, Duration::from_millis(500), readings.gate_safety_a);
            assert!((state.gate_a.progress() - 0.5).abs() < 1e-9, "closing must be paused");
        }

        // 车辆移开后关门继续
        ctx.set_vehicle_span(-300.0, -45.0);
        {
            let mut state = ctx.state.lock();
            let readings = SensorModel::compute(&state.vehicle, &geometry);
            assert!(!readings.gate_safety_a);
            tick_gate(&mut state.gate_a, Duration::from_millis(300), readings.gate_safety_a);
            assert!((state.gate_a.progress() - 0.4).abs() < 1e-9);
        }
    }

    #[test]
    fn test_safety_stop_never_blocks_opening() {
        let mut gate = GateController::new(airlock_sim::GateId::A, Duration::from_secs(3));
        gate.receive_request(true);
        tick_gate(&mut gate, Duration::from_millis(600), true);
        assert!((gate.progress() - 0.2).abs() < 1e-9, "opening proceeds under safety");
    }
}
