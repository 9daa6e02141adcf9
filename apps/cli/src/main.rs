//! # Airlock CLI
//!
//! 气闸 HIL 仿真的无界面测试工具，与 GUI 走完全相同的帧语法和通道抽象。
//!
//! ```bash
//! # 列出串口
//! airlock-cli ports
//!
//! # 连接嵌入式控制器，车辆自动往返扫掠
//! airlock-cli run --port /dev/ttyUSB0 --handshake
//!
//! # 无硬件演示：进程内环回 + 脚本化对端控制器
//! airlock-cli run --sim
//!
//! # 手动引脚面板（REPL）
//! airlock-cli panel --port /dev/ttyUSB0
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use airlock_sim::SimConfig;

mod panel;
mod run;
mod sim_peer;

/// Airlock CLI - 气闸 HIL 仿真命令行工具
#[derive(Parser, Debug)]
#[command(name = "airlock-cli")]
#[command(about = "Headless harness for the airlock HIL simulator", long_about = None)]
#[command(version)]
struct Cli {
    /// 配置文件路径（TOML，缺省读取用户配置目录下的 airlock-hil/config.toml）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 列出系统串口
    Ports,

    /// 运行完整会话（串口或 --sim 环回），车辆自动往返扫掠
    Run {
        #[command(flatten)]
        args: run::RunArgs,
    },

    /// 手动引脚面板：直接从开关构造出站帧，绕过传感器模型
    Panel {
        #[command(flatten)]
        args: panel::PanelArgs,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let sim = load_sim_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Ports => {
            let ports = airlock_link::serial::list_ports().context("failed to enumerate ports")?;
            if ports.is_empty() {
                println!("no serial ports found");
            } else {
                for port in ports {
                    println!("{port}");
                }
            }
            Ok(())
        },
        Commands::Run { args } => run::run(args, sim),
        Commands::Panel { args } => panel::run(args),
    }
}

/// 载入仿真配置：显式路径 > 用户配置目录 > 内置缺省
fn load_sim_config(path: Option<&std::path::Path>) -> Result<SimConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let Some(dir) = dirs::config_dir() else {
                return Ok(SimConfig::default());
            };
            let candidate = dir.join("airlock-hil").join("config.toml");
            if !candidate.exists() {
                return Ok(SimConfig::default());
            }
            candidate
        },
    };
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: SimConfig = toml::from_str(&text)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    tracing::info!(path = %path.display(), "loaded simulator config");
    Ok(config)
}

/// 安装 ctrl-c 处理：第一次按下请求退出，返回检查用的标志
pub(crate) fn install_ctrlc() -> Result<std::sync::Arc<std::sync::atomic::AtomicBool>> {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::Release);
    })
    .context("failed to install ctrl-c handler")?;
    Ok(stop)
}

/// 通用的短睡眠步长
pub(crate) const STEP: Duration = Duration::from_millis(50);
