//! `panel` 子命令：手动引脚面板
//!
//! 参考台架的手动测试流程：7 个出站布尔量由用户直接开关，帧从开关值
//! 构造，**绕过**传感器模型；入站请求帧实时解码打印。与核心走同一套
//! 帧语法与通道抽象。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use parking_lot::Mutex;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use airlock_link::{
    LoopbackChannel, RxChannel, SerialChannel, SplittableChannel, TxChannel,
};
use airlock_protocol::{
    FrameDecoder, RequestState, RequestUpdate, SensorKey, SensorSnapshot, encode_snapshot,
};

use crate::sim_peer;

#[derive(Args, Debug)]
pub struct PanelArgs {
    /// 串口设备（与 --sim 二选一）
    #[arg(long, conflicts_with = "sim")]
    pub port: Option<String>,

    /// 波特率
    #[arg(long, default_value_t = airlock_link::DEFAULT_BAUD_RATE)]
    pub baud: u32,

    /// 无硬件模式：进程内环回 + 脚本化对端控制器
    #[arg(long)]
    pub sim: bool,
}

pub fn run(args: PanelArgs) -> Result<()> {
    let mut peer_handle = None;
    let (rx, tx): (Box<dyn RxChannel>, Box<dyn TxChannel>) = if args.sim {
        let (local, peer) = LoopbackChannel::pair();
        peer_handle = Some(sim_peer::spawn(peer));
        let (rx, tx) = local.split()?;
        (Box::new(rx), Box::new(tx))
    } else {
        let port = args.port.as_deref().context("either --port or --sim is required")?;
        let channel = SerialChannel::open_with(
            port,
            args.baud,
            airlock_link::DEFAULT_READ_TIMEOUT,
        )
        .with_context(|| format!("failed to open serial port {port}"))?;
        let (rx, tx) = channel.split()?;
        (Box::new(rx), Box::new(tx))
    };

    let requests = Arc::new(Mutex::new(RequestState::default()));
    let running = Arc::new(AtomicBool::new(true));
    let reader = spawn_reader(rx, requests.clone(), running.clone());

    let result = repl(tx, &requests);

    running.store(false, Ordering::Release);
    let _ = reader.join();
    if let Some(handle) = peer_handle {
        handle.stop();
    }
    result
}

/// 入站线程：解码请求帧、更新共享请求状态并打印
fn spawn_reader(
    mut rx: Box<dyn RxChannel>,
    requests: Arc<Mutex<RequestState>>,
    running: Arc<AtomicBool>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let mut decoder = FrameDecoder::new();
        let mut buf = [0u8; 256];
        while running.load(Ordering::Acquire) {
            match rx.try_read(&mut buf) {
                Ok(0) => {},
                Ok(n) => decoder.extend(&buf[..n]),
                Err(e) if e.is_fatal() => {
                    println!("!! link error: {e}");
                    return;
                },
                Err(_) => {},
            }
            while let Some(frame) = decoder.poll_frame() {
                match RequestUpdate::parse(frame.payload()) {
                    Ok(update) => {
                        requests.lock().apply(update);
                        println!("<< {}", frame.display());
                    },
                    Err(e) => println!("!! rejected frame `{}`: {e}", frame.display()),
                }
            }
            std::thread::sleep(Duration::from_millis(50));
        }
    })
}

fn repl(mut tx: Box<dyn TxChannel>, requests: &Mutex<RequestState>) -> Result<()> {
    let mut editor = DefaultEditor::new().context("failed to start line editor")?;
    let mut pins = SensorSnapshot::default();

    println!("airlock manual panel - type `help` for commands");
    loop {
        match editor.readline("panel> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line);
                match dispatch(line, &mut pins, tx.as_mut(), requests) {
                    Ok(true) => break,
                    Ok(false) => {},
                    Err(e) => println!("!! {e}"),
                }
            },
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("line editor failure"),
        }
    }
    Ok(())
}

/// 处理一条命令；返回 `true` 表示退出
fn dispatch(
    line: &str,
    pins: &mut SensorSnapshot,
    tx: &mut dyn TxChannel,
    requests: &Mutex<RequestState>,
) -> Result<bool> {
    let mut parts = line.split_whitespace();
    match parts.next().unwrap_or_default() {
        "help" => {
            println!("  set <PIN> <0|1>   toggle an outbound pin and send the frame");
            println!("  send              resend the current pin frame");
            println!("  raw <payload>     send a raw payload (markers added automatically)");
            println!("  status            show pin and request states");
            println!("  quit | exit       leave the panel");
        },
        "set" => {
            let name = parts.next().context("usage: set <PIN> <0|1>")?;
            let value = parts.next().context("usage: set <PIN> <0|1>")?;
            let key = SensorKey::from_name(&name.to_uppercase())
                .with_context(|| format!("unknown pin `{name}`"))?;
            let value = match value {
                "0" => false,
                "1" => true,
                other => anyhow::bail!("invalid value `{other}` (expected 0 or 1)"),
            };
            pins.set(key, value);
            send_pins(pins, tx)?;
        },
        "send" => send_pins(pins, tx)?,
        "raw" => {
            let payload = line.strip_prefix("raw").unwrap_or_default().trim();
            let frame = format!("<{payload}>");
            tx.write_all(frame.as_bytes()).context("write failed")?;
            println!(">> {frame}");
        },
        "status" => {
            for (key, value) in pins.iter() {
                println!("  {:<16} {}", key.as_str(), if value { "HIGH" } else { "LOW" });
            }
            let requests = *requests.lock();
            println!("  {:<16} {}", "GATE_REQUEST_A", requests.gate_request_a as u8);
            println!("  {:<16} {}", "GATE_REQUEST_B", requests.gate_request_b as u8);
        },
        "quit" | "exit" => return Ok(true),
        other => println!("unknown command `{other}` - try `help`"),
    }
    Ok(false)
}

fn send_pins(pins: &SensorSnapshot, tx: &mut dyn TxChannel) -> Result<()> {
    let frame = encode_snapshot(pins);
    tx.write_all(frame.as_bytes()).context("write failed")?;
    tx.flush().context("flush failed")?;
    println!(">> {frame}");
    Ok(())
}
