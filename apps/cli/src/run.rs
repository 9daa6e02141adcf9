//! `run` 子命令：完整会话 + 车辆扫掠
//!
//! 车辆在气闸前后往返移动，传感器状态按周期发往对端；对端的门请求
//! 驱动门状态机。每秒打印一行状态摘要。

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Args;
use tracing::{debug, info, warn};

use airlock_link::{LoopbackChannel, SerialChannel};
use airlock_session::{HandshakeConfig, LinkSession, SessionConfig, SessionEvent};
use airlock_sim::{GateId, SimConfig};

use crate::{STEP, install_ctrlc, sim_peer};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// 串口设备（如 /dev/ttyUSB0；与 --sim 二选一）
    #[arg(long, conflicts_with = "sim")]
    pub port: Option<String>,

    /// 波特率
    #[arg(long, default_value_t = airlock_link::DEFAULT_BAUD_RATE)]
    pub baud: u32,

    /// 无硬件模式：进程内环回 + 脚本化对端控制器
    #[arg(long)]
    pub sim: bool,

    /// 等待对端就绪横幅后再开始交换
    #[arg(long)]
    pub handshake: bool,

    /// 就绪哨兵子串
    #[arg(long, default_value = "READY")]
    pub sentinel: String,

    /// 握手超时（秒）
    #[arg(long, default_value_t = 10)]
    pub handshake_timeout: u64,

    /// 车辆宽度（模型单位）
    #[arg(long, default_value_t = 255.0)]
    pub vehicle_width: f64,

    /// 车辆扫掠速度（模型单位/秒）
    #[arg(long, default_value_t = 120.0)]
    pub sweep_speed: f64,

    /// 运行时长（秒，缺省一直运行到 ctrl-c）
    #[arg(long)]
    pub duration: Option<u64>,
}

pub fn run(args: RunArgs, sim: SimConfig) -> Result<()> {
    let config = SessionConfig {
        handshake: args.handshake.then(|| HandshakeConfig {
            sentinel: args.sentinel.clone(),
            timeout: Duration::from_secs(args.handshake_timeout),
        }),
        sim,
        ..Default::default()
    };

    let mut session = LinkSession::new(config);
    let mut peer_handle = None;

    if args.sim {
        let (local, peer) = LoopbackChannel::pair();
        peer_handle = Some(sim_peer::spawn(peer));
        session.connect(local).context("failed to connect loopback session")?;
    } else {
        let port = args.port.as_deref().context("either --port or --sim is required")?;
        let channel = SerialChannel::open_with(
            port,
            args.baud,
            airlock_link::DEFAULT_READ_TIMEOUT,
        )
        .with_context(|| format!("failed to open serial port {port}"))?;
        session.connect(channel).context("failed to connect serial session")?;
    }

    let stop = install_ctrlc()?;
    sweep_vehicle(&session, &args, &stop)?;

    session.disconnect();
    if let Some(handle) = peer_handle {
        handle.stop();
    }
    info!("session closed");
    Ok(())
}

/// 车辆往返扫掠主循环
fn sweep_vehicle(
    session: &LinkSession,
    args: &RunArgs,
    stop: &Arc<std::sync::atomic::AtomicBool>,
) -> Result<()> {
    let total = session.context().sim().geometry.total_width();
    let margin = args.vehicle_width + 60.0;
    let (min_x, max_x) = (-margin, total + margin);

    let started = Instant::now();
    let mut last_report = Instant::now();
    let mut left = min_x;
    let mut direction = 1.0;
    let events = session.events();

    loop {
        // 运行日志：帧收发与拒绝
        for event in events.try_iter() {
            match event {
                SessionEvent::FrameRejected(frame) => warn!(frame = %frame, "frame rejected"),
                event => debug!(?event, "link event"),
            }
        }
        if stop.load(Ordering::Acquire) {
            info!("interrupted, shutting down");
            break;
        }
        if let Some(secs) = args.duration
            && started.elapsed() >= Duration::from_secs(secs)
        {
            break;
        }
        if !session.is_connected() {
            info!("link lost, stopping sweep");
            break;
        }

        left += direction * args.sweep_speed * STEP.as_secs_f64();
        if left >= max_x {
            direction = -1.0;
        } else if left <= min_x {
            direction = 1.0;
        }
        session.set_vehicle_span(left, left + args.vehicle_width);

        if last_report.elapsed() >= Duration::from_secs(1) {
            last_report = Instant::now();
            report(session);
        }
        std::thread::sleep(STEP);
    }
    Ok(())
}

fn report(session: &LinkSession) {
    let snapshot = session.snapshot();
    let requests = session.requests();
    let gate_a = session.gate(GateId::A);
    let gate_b = session.gate(GateId::B);
    let metrics = session.metrics();
    info!(
        presence = %format!(
            "{}{}{}",
            snapshot.presence_front as u8,
            snapshot.presence_middle as u8,
            snapshot.presence_back as u8
        ),
        gate_a = %format!("{:?}@{:.2}", gate_a.state, gate_a.progress),
        gate_b = %format!("{:?}@{:.2}", gate_b.state, gate_b.progress),
        req_a = requests.gate_request_a as u8,
        req_b = requests.gate_request_b as u8,
        tx = metrics.tx_frames_total,
        rx = metrics.rx_frames_total,
        rejected = metrics.rx_frames_rejected,
        "status"
    );
}
