//! # Airlock Link Session
//!
//! 会话层：持有字节通道，驱动三个独立周期的活动，并把协议流量接到
//! 仿真核心上。
//!
//! ## 三个周期活动
//!
//! - **Reader**（50ms）：拉取可用字节 → 帧解码 → 请求应用到门控制器
//! - **Ticker**（100ms）：用真实墙钟增量推进两扇门
//! - **Sender**（100ms）：重算出站快照 → 编码 → 写出
//!
//! 三者并发访问同一个共享状态块（两个 `GateController` + 请求状态 +
//! 车辆位置），统一用一把 `parking_lot::Mutex` 串行化；最近一次出站
//! 快照通过 `ArcSwap` 无锁发布，展示层可以任意频率读取。
//!
//! ## 一致性与失败语义
//!
//! 任何活动都不会无限阻塞：通道读写是非阻塞或短超时有界的，空闲对端
//! 是正常状态。一致性是最终的而非线性化的：每个出站帧反映发送时刻
//! 已应用的最近一次 tick / 请求结果。致命链路错误停止所有活动并标记
//! 断开；门状态保留，重连后从原位置继续。

pub mod error;
pub mod event;
pub mod metrics;
pub mod pipeline;
pub mod session;
pub mod state;

// 重新导出常用类型
pub use error::SessionError;
pub use event::SessionEvent;
pub use metrics::{LinkMetrics, MetricsSnapshot};
pub use session::{HandshakeConfig, LinkSession, SessionConfig};
pub use state::{AirlockState, GateStatus, SessionContext};
