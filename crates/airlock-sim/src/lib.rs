//! # Airlock Simulation Core
//!
//! 气闸仿真核心：双门电机状态机、传感器推导模型与几何配置。
//!
//! ## 模块
//!
//! - `gate`: 单门状态机（`GateController`），支持运动中途换向
//! - `sensors`: 纯函数传感器模型（车辆位置 + 固定几何 → 快照）
//! - `config`: 仿真配置（行程时长、安全传感器联锁开关、几何）
//!
//! 本层不做任何 IO，也不抛错误：非法门标识在会话边界就被拒绝，
//! 到达这里的输入都是类型安全的。

pub mod config;
pub mod gate;
pub mod sensors;

pub use config::SimConfig;
pub use gate::{GateController, GateId, GateState};
pub use sensors::{AirlockGeometry, SensorModel, VehicleSpan, ease_in_out_cubic};
