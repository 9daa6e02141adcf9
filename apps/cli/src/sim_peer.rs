//! 脚本化对端控制器（--sim 模式）
//!
//! 在环回通道另一端扮演嵌入式控制器：上电先发就绪横幅，然后解析入站
//! 快照帧，用一条简单控制律回发门请求——车辆逼近哪扇门就请求哪扇开，
//! 离开即请求关。仅用于无硬件演示，走的帧语法与真实控制器完全相同。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use airlock_link::{ByteChannel, LoopbackChannel};
use airlock_protocol::{FrameDecoder, SensorKey, SensorSnapshot, parse_pairs};

/// 对端线程句柄
pub struct PeerHandle {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PeerHandle {
    /// 停止对端线程并等待退出
    pub fn stop(mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!("sim peer thread panicked");
        }
    }
}

/// 启动脚本化对端
pub fn spawn(channel: LoopbackChannel) -> PeerHandle {
    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    let handle = std::thread::spawn(move || peer_loop(channel, flag));
    PeerHandle {
        running,
        handle: Some(handle),
    }
}

fn peer_loop(mut channel: LoopbackChannel, running: Arc<AtomicBool>) {
    // 就绪横幅（配合 --handshake）
    if channel.write_all(b"READY\r\n").is_err() {
        return;
    }

    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; 256];
    let mut last_sent: Option<(bool, bool)> = None;
    let mut last_write = Instant::now();

    while running.load(Ordering::Acquire) {
        match channel.try_read(&mut buf) {
            Ok(0) => {},
            Ok(n) => decoder.extend(&buf[..n]),
            Err(_) => break,
        }

        // 只按最新快照决策
        let mut latest = None;
        while let Some(frame) = decoder.poll_frame() {
            if let Some(snapshot) = snapshot_from_payload(frame.payload()) {
                latest = Some(snapshot);
            }
        }

        if let Some(snapshot) = latest {
            let want_a = snapshot.presence_front || snapshot.gate_safety_a;
            let want_b = snapshot.presence_middle || snapshot.gate_safety_b;
            let keepalive_due = last_write.elapsed() >= Duration::from_millis(500);
            if last_sent != Some((want_a, want_b)) || keepalive_due {
                let frame = format!(
                    "<GATE_REQUEST_A:{},GATE_REQUEST_B:{}>",
                    want_a as u8, want_b as u8
                );
                if channel.write_all(frame.as_bytes()).is_err() {
                    break;
                }
                debug!(frame, "sim peer request sent");
                last_sent = Some((want_a, want_b));
                last_write = Instant::now();
            }
        }

        std::thread::sleep(Duration::from_millis(20));
    }
}

fn snapshot_from_payload(payload: &[u8]) -> Option<SensorSnapshot> {
    let mut snapshot = SensorSnapshot::default();
    for (name, value) in parse_pairs(payload).ok()? {
        if let Some(key) = SensorKey::from_name(name) {
            snapshot.set(key, value);
        }
    }
    Some(snapshot)
}
