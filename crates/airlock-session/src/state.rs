//! 共享状态块
//!
//! 三个周期活动并发触碰的全部可变状态集中在 [`AirlockState`]，由
//! [`SessionContext`] 里的一把 `parking_lot::Mutex` 统一守护——单一
//! 所有权纪律，不做字段级细分。最近一次出站快照经 `ArcSwap` 发布，
//! 展示层读取无锁。

use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwap;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::info;

use airlock_protocol::{RequestState, SensorSnapshot};
use airlock_sim::{GateController, GateId, GateState, SensorModel, SimConfig, VehicleSpan};

use crate::event::{EVENT_BUFFER, SessionEvent};
use crate::metrics::{LinkMetrics, MetricsSnapshot};

/// 三个活动共享的可变状态
#[derive(Debug)]
pub struct AirlockState {
    pub gate_a: GateController,
    pub gate_b: GateController,
    pub requests: RequestState,
    pub vehicle: VehicleSpan,
}

impl AirlockState {
    /// 会话启动状态：两扇门全关，车辆停在气闸外
    pub fn new(sim: &SimConfig) -> Self {
        Self {
            gate_a: GateController::new(GateId::A, sim.gate_travel()),
            gate_b: GateController::new(GateId::B, sim.gate_travel()),
            requests: RequestState::default(),
            vehicle: VehicleSpan::new(-300.0, -45.0),
        }
    }

    pub fn gate(&self, id: GateId) -> &GateController {
        match id {
            GateId::A => &self.gate_a,
            GateId::B => &self.gate_b,
        }
    }

    pub fn gate_mut(&mut self, id: GateId) -> &mut GateController {
        match id {
            GateId::A => &mut self.gate_a,
            GateId::B => &mut self.gate_b,
        }
    }
}

/// 门状态读数（展示层用）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateStatus {
    pub state: GateState,
    /// 线性 progress；展示层如需缓动自行做只读变换
    pub progress: f64,
    pub moving: bool,
}

/// 会话共享上下文
///
/// 会话创建时分配一次，贯穿所有连接周期存活：门位置跨越断开/重连保留。
pub struct SessionContext {
    pub(crate) state: Mutex<AirlockState>,
    /// 最近一次出站快照（无锁发布/读取）
    pub(crate) last_snapshot: ArcSwap<SensorSnapshot>,
    pub(crate) metrics: LinkMetrics,
    pub(crate) connected: AtomicBool,
    pub(crate) sim: SimConfig,
    /// 事件广播（有界，发布端不阻塞）
    events_tx: Sender<SessionEvent>,
    events_rx: Receiver<SessionEvent>,
}

impl SessionContext {
    pub fn new(sim: SimConfig) -> Self {
        let (events_tx, events_rx) = crossbeam_channel::bounded(EVENT_BUFFER);
        Self {
            state: Mutex::new(AirlockState::new(&sim)),
            last_snapshot: ArcSwap::from_pointee(SensorSnapshot::default()),
            metrics: LinkMetrics::new(),
            connected: AtomicBool::new(false),
            sim,
            events_tx,
            events_rx,
        }
    }

    /// 订阅事件流（运行日志：收发帧与连接状态变化）
    pub fn events(&self) -> Receiver<SessionEvent> {
        self.events_rx.clone()
    }

    /// 发布事件；缓冲占满时静默丢弃，从不阻塞周期活动
    pub(crate) fn emit(&self, event: SessionEvent) {
        let _ = self.events_tx.try_send(event);
    }

    /// 最近一次出站快照（无锁）
    pub fn snapshot(&self) -> SensorSnapshot {
        **self.last_snapshot.load()
    }

    /// 门状态读数
    pub fn gate_status(&self, id: GateId) -> GateStatus {
        let state = self.state.lock();
        let gate = state.gate(id);
        GateStatus {
            state: gate.state(),
            progress: gate.progress(),
            moving: gate.is_moving(),
        }
    }

    /// 对端请求状态
    pub fn requests(&self) -> RequestState {
        self.state.lock().requests
    }

    /// 更新车辆占据区间（展示层/脚本提供）
    pub fn set_vehicle_span(&self, left: f64, right: f64) {
        self.state.lock().vehicle = VehicleSpan::new(left, right);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// 仿真配置
    pub fn sim(&self) -> &SimConfig {
        &self.sim
    }

    /// 计算出站快照：传感器模型输出 + 两扇门的运动标志
    pub(crate) fn compute_outbound(&self) -> SensorSnapshot {
        let state = self.state.lock();
        let mut snapshot = SensorModel::compute(&state.vehicle, &self.sim.geometry);
        snapshot.gate_moving_a = state.gate_a.is_moving();
        snapshot.gate_moving_b = state.gate_b.is_moving();
        snapshot
    }

    pub(crate) fn mark_connected(&self) {
        self.connected.store(true, Ordering::Release);
        self.emit(SessionEvent::Connected);
        info!("session connected");
    }

    pub(crate) fn mark_disconnected(&self) {
        if self.connected.swap(false, Ordering::AcqRel) {
            self.emit(SessionEvent::Disconnected);
            info!("session disconnected");
        }
    }
}
