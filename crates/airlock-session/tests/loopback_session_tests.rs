//! 会话端到端测试（环回通道）
//!
//! 验证三个周期活动在真实线程上的协同：
//! 1. 对端请求帧驱动门运动，出站帧反映运动标志
//! 2. 坏帧整帧拒绝且不中断会话
//! 3. 运动中途换向平滑
//! 4. 断开/重连保留门位置
//! 5. 致命链路错误使会话自动断开

use std::time::{Duration, Instant};

use airlock_link::{ByteChannel, LoopbackChannel, SplittableChannel};
use airlock_protocol::{FrameDecoder, SensorKey, SensorSnapshot, parse_pairs};
use airlock_session::{LinkSession, SessionConfig, SessionEvent};
use airlock_sim::{GateId, GateState, SimConfig};

/// 测试用快周期配置：行程 0.3s，全部周期 5ms
fn fast_config() -> SessionConfig {
    SessionConfig {
        read_period: Duration::from_millis(5),
        tick_period: Duration::from_millis(5),
        send_period: Duration::from_millis(5),
        handshake: None,
        sim: SimConfig {
            gate_travel_secs: 0.3,
            ..Default::default()
        },
    }
}

/// 轮询等待条件成立（避免固定 sleep 引入的不稳定）
fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

/// 从对端读出下一帧快照（解析出站帧的 7 个键）
fn read_snapshot(peer: &mut LoopbackChannel, timeout: Duration) -> Option<SensorSnapshot> {
    let mut decoder = FrameDecoder::new();
    let deadline = Instant::now() + timeout;
    let mut buf = [0u8; 512];
    while Instant::now() < deadline {
        match peer.try_read(&mut buf) {
            Ok(0) => std::thread::sleep(Duration::from_millis(2)),
            Ok(n) => decoder.extend(&buf[..n]),
            Err(_) => return None,
        }
        if let Some(frame) = decoder.poll_frame() {
            let mut snapshot = SensorSnapshot::default();
            for (name, value) in parse_pairs(frame.payload()).ok()? {
                snapshot.set(SensorKey::from_name(name)?, value);
            }
            return Some(snapshot);
        }
    }
    None
}

#[test]
fn test_request_frame_opens_gate_end_to_end() {
    let (local, mut peer) = LoopbackChannel::pair();
    let mut session = LinkSession::new(fast_config());
    session.connect(local).unwrap();

    peer.write_all(b"<GATE_REQUEST_A:1>").unwrap();

    assert!(wait_until(Duration::from_secs(2), || {
        session.gate(GateId::A).state == GateState::Open
    }));
    let status = session.gate(GateId::A);
    assert_eq!(status.progress, 1.0);
    assert!(!status.moving);
    assert!(session.requests().gate_request_a);
    // 门 B 从未被请求
    assert_eq!(session.gate(GateId::B).state, GateState::Closed);

    session.disconnect();
}

#[test]
fn test_outbound_frames_reflect_moving_flag() {
    let (local, mut peer) = LoopbackChannel::pair();
    let mut session = LinkSession::new(fast_config());
    session.connect(local).unwrap();

    // 静止时快照全 false
    let idle = read_snapshot(&mut peer, Duration::from_secs(1)).unwrap();
    assert!(!idle.gate_moving_b);

    peer.write_all(b"<GATE_REQUEST_B:1>").unwrap();

    // 运动期间必然出现 GATE_MOVING_B:1 的帧
    assert!(wait_until(Duration::from_secs(2), || {
        read_snapshot(&mut peer, Duration::from_millis(200))
            .is_some_and(|s| s.gate_moving_b)
    }));

    // 到位后运动标志回落
    assert!(wait_until(Duration::from_secs(2), || {
        session.gate(GateId::B).state == GateState::Open
    }));
    assert!(wait_until(Duration::from_secs(1), || {
        read_snapshot(&mut peer, Duration::from_millis(200))
            .is_some_and(|s| !s.gate_moving_b)
    }));

    session.disconnect();
}

#[test]
fn test_malformed_frame_rejected_session_continues() {
    let (local, mut peer) = LoopbackChannel::pair();
    let mut session = LinkSession::new(fast_config());
    session.connect(local).unwrap();

    peer.write_all(b"<GATE_REQUEST_A:1,GATE_REQUEST_B:x>").unwrap();

    assert!(wait_until(Duration::from_secs(1), || {
        session.metrics().rx_frames_rejected >= 1
    }));
    // 整帧拒绝：A 虽然值合法也不得被应用
    assert_eq!(session.gate(GateId::A).state, GateState::Closed);
    assert!(!session.requests().gate_request_a);

    // 后续合法帧照常工作
    peer.write_all(b"<GATE_REQUEST_A:1>").unwrap();
    assert!(wait_until(Duration::from_secs(2), || {
        session.gate(GateId::A).state == GateState::Open
    }));

    session.disconnect();
}

#[test]
fn test_mid_motion_reversal_is_smooth_over_the_wire() {
    let (local, mut peer) = LoopbackChannel::pair();
    let mut session = LinkSession::new(fast_config());
    session.connect(local).unwrap();

    peer.write_all(b"<GATE_REQUEST_A:1>").unwrap();
    // 等门走到中途
    assert!(wait_until(Duration::from_secs(1), || {
        let s = session.gate(GateId::A);
        s.state == GateState::Opening && s.progress > 0.3
    }));

    let before = session.gate(GateId::A).progress;
    peer.write_all(b"<GATE_REQUEST_A:0>").unwrap();
    assert!(wait_until(Duration::from_secs(1), || {
        session.gate(GateId::A).state == GateState::Closing
    }));

    // 换向瞬间不跳变：progress 不会离开换向点突跳（请求传播期间的少量
    // 正常推进除外，留出调度余量）
    let after = session.gate(GateId::A).progress;
    assert!(
        after <= before + 0.3,
        "progress jumped away from reversal point: {before} -> {after}"
    );

    assert!(wait_until(Duration::from_secs(2), || {
        session.gate(GateId::A).state == GateState::Closed
    }));
    assert_eq!(session.gate(GateId::A).progress, 0.0);

    session.disconnect();
}

#[test]
fn test_reconnect_preserves_gate_position() {
    let (local, mut peer) = LoopbackChannel::pair();
    let mut session = LinkSession::new(fast_config());
    session.connect(local).unwrap();

    peer.write_all(b"<GATE_REQUEST_A:1>").unwrap();
    assert!(wait_until(Duration::from_secs(2), || {
        session.gate(GateId::A).state == GateState::Open
    }));

    session.disconnect();
    assert!(!session.is_connected());
    // 断开后门位置保留
    assert_eq!(session.gate(GateId::A).state, GateState::Open);
    assert_eq!(session.gate(GateId::A).progress, 1.0);

    // 重连一条新通道，状态从原位置继续
    let (local2, mut peer2) = LoopbackChannel::pair();
    session.connect(local2).unwrap();
    assert!(session.is_connected());
    assert_eq!(session.gate(GateId::A).state, GateState::Open);

    // 新对端立即请求关门，从全开位置开始关
    peer2.write_all(b"<GATE_REQUEST_A:0>").unwrap();
    assert!(wait_until(Duration::from_secs(2), || {
        session.gate(GateId::A).state == GateState::Closed
    }));

    session.disconnect();
    drop(peer);
}

#[test]
fn test_idle_peer_is_normal_operation() {
    let (local, _peer) = LoopbackChannel::pair();
    let mut session = LinkSession::new(fast_config());
    session.connect(local).unwrap();

    // 对端从不发字节：会话保持连接，出站帧持续产生
    std::thread::sleep(Duration::from_millis(100));
    assert!(session.is_connected());
    assert!(session.metrics().tx_frames_total >= 2);
    assert_eq!(session.metrics().rx_frames_total, 0);

    session.disconnect();
}

#[test]
fn test_fatal_link_error_marks_disconnected() {
    let (local, peer) = LoopbackChannel::pair();
    let mut session = LinkSession::new(fast_config());
    session.connect(local).unwrap();
    assert!(session.is_connected());

    // 对端两半全部释放 → 管道关闭 → 会话侧读/写报致命错误
    let (peer_rx, peer_tx) = peer.split().unwrap();
    drop(peer_rx);
    drop(peer_tx);

    assert!(wait_until(Duration::from_secs(2), || !session.is_connected()));

    // 门状态保持最后有效值，进程不受影响
    assert_eq!(session.gate(GateId::A).state, GateState::Closed);
    session.disconnect();
}

#[test]
fn test_event_feed_logs_traffic() {
    let (local, mut peer) = LoopbackChannel::pair();
    let mut session = LinkSession::new(fast_config());
    let events = session.events();
    session.connect(local).unwrap();

    peer.write_all(b"<GATE_REQUEST_A:1><BAD:x>").unwrap();
    assert!(wait_until(Duration::from_secs(1), || {
        session.metrics().rx_frames_rejected >= 1 && session.metrics().tx_frames_total >= 1
    }));
    session.disconnect();

    let collected: Vec<SessionEvent> = events.try_iter().collect();
    assert!(collected.contains(&SessionEvent::Connected));
    assert!(collected.contains(&SessionEvent::Disconnected));
    assert!(
        collected
            .iter()
            .any(|e| matches!(e, SessionEvent::FrameReceived(f) if f == "GATE_REQUEST_A:1"))
    );
    assert!(
        collected
            .iter()
            .any(|e| matches!(e, SessionEvent::FrameRejected(f) if f == "BAD:x"))
    );
    assert!(
        collected
            .iter()
            .any(|e| matches!(e, SessionEvent::FrameSent(f) if f.starts_with("<PRESENCE_FRONT:")))
    );
}

#[test]
fn test_both_gates_independent() {
    let (local, mut peer) = LoopbackChannel::pair();
    let mut session = LinkSession::new(fast_config());
    session.connect(local).unwrap();

    peer.write_all(b"<GATE_REQUEST_A:1,GATE_REQUEST_B:1>").unwrap();
    assert!(wait_until(Duration::from_secs(2), || {
        session.gate(GateId::A).state == GateState::Open
            && session.gate(GateId::B).state == GateState::Open
    }));

    // 只关 B，A 不受影响
    peer.write_all(b"<GATE_REQUEST_B:0>").unwrap();
    assert!(wait_until(Duration::from_secs(2), || {
        session.gate(GateId::B).state == GateState::Closed
    }));
    assert_eq!(session.gate(GateId::A).state, GateState::Open);

    session.disconnect();
}
