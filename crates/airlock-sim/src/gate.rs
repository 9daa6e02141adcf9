//! 门状态机
//!
//! 每扇门是一个独立实例：固定行程时长，`progress ∈ [0,1]`（0 = 全关，1 = 全开），
//! 运动期间 `progress` 对经过时间严格线性。展示层如需缓动，只能对读出的
//! `progress` 做只读变换（见 [`crate::sensors::ease_in_out_cubic`]），
//! 不能反馈回控制逻辑——换向计算依赖未失真的 progress。
//!
//! 状态不变量：
//! - `Open ⇔ progress == 1`，`Closed ⇔ progress == 0`
//! - `Opening`/`Closing` 是瞬态，`raw >= 1` 的那次 tick 立即落入终态
//! - 运动期间有且仅有一个方向（`target_open`）生效

use std::fmt;
use std::time::Duration;

use tracing::{info, trace};

/// 门标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateId {
    A,
    B,
}

impl GateId {
    pub const fn as_str(self) -> &'static str {
        match self {
            GateId::A => "A",
            GateId::B => "B",
        }
    }
}

impl fmt::Display for GateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 门运动状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Closed,
    Opening,
    Closing,
    Open,
}

/// 单门电机状态机
///
/// 会话启动时创建一次（初始 `Closed`），进程生命周期内只被
/// [`receive_request`](GateController::receive_request) 与
/// [`tick`](GateController::tick) 修改，从不销毁，只能 [`reset`](GateController::reset)。
#[derive(Debug, Clone)]
pub struct GateController {
    id: GateId,
    state: GateState,
    /// 归一化位置，运动期间对经过时间线性
    progress: f64,
    /// 当前运动方向（true = 开门）
    target_open: bool,
    /// 当前段运动已经过的时间
    elapsed: Duration,
    /// 全行程时长
    travel: Duration,
}

impl GateController {
    /// 创建全关状态的门
    pub fn new(id: GateId, travel: Duration) -> Self {
        Self {
            id,
            state: GateState::Closed,
            progress: 0.0,
            target_open: false,
            elapsed: Duration::ZERO,
            travel,
        }
    }

    pub fn id(&self) -> GateId {
        self.id
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// 归一化位置（0 = 全关，1 = 全开）
    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// 当前运动方向（仅在运动期间有意义）
    pub fn target_open(&self) -> bool {
        self.target_open
    }

    pub fn is_moving(&self) -> bool {
        matches!(self.state, GateState::Opening | GateState::Closing)
    }

    /// 处理对端的开/关请求（last-value-wins）
    ///
    /// - 未运动且请求已满足：空操作
    /// - 未运动且请求不同：开始运动，`elapsed` 由当前 `progress` 反推
    /// - 运动中且方向相同：空操作（继续）
    /// - 运动中且方向相反：换向——用同一公式从**当前** progress 重算
    ///   `elapsed`，下一次 tick 从门当前所在位置平滑继续，无跳变
    pub fn receive_request(&mut self, open: bool) {
        if self.is_moving() {
            if open == self.target_open {
                return;
            }
            self.begin_motion(open);
            info!(
                gate = %self.id,
                progress = self.progress,
                opening = open,
                "gate reversing direction mid-motion"
            );
        } else {
            let satisfied = (open && self.state == GateState::Open)
                || (!open && self.state == GateState::Closed);
            if satisfied {
                trace!(gate = %self.id, open, "request already satisfied");
                return;
            }
            self.begin_motion(open);
            info!(gate = %self.id, opening = open, "gate starting to move");
        }
    }

    /// 推进时间（未运动时空操作）
    ///
    /// `raw = min(elapsed / travel, 1)`；开门时 `progress = raw`，
    /// 关门时 `progress = 1 - raw`。`raw >= 1` 落入终态并清零 `elapsed`。
    pub fn tick(&mut self, dt: Duration) {
        if !self.is_moving() {
            return;
        }
        self.elapsed += dt;

        let travel = self.travel.as_secs_f64();
        let raw = if travel > 0.0 {
            (self.elapsed.as_secs_f64() / travel).min(1.0)
        } else {
            1.0
        };
        self.progress = if self.target_open { raw } else { 1.0 - raw };

        if raw >= 1.0 {
            self.state = if self.target_open {
                GateState::Open
            } else {
                GateState::Closed
            };
            self.elapsed = Duration::ZERO;
            info!(gate = %self.id, state = ?self.state, "gate reached terminal position");
        }
    }

    /// 回到初始全关状态
    pub fn reset(&mut self) {
        self.state = GateState::Closed;
        self.progress = 0.0;
        self.target_open = false;
        self.elapsed = Duration::ZERO;
    }

    fn begin_motion(&mut self, open: bool) {
        self.target_open = open;
        // 开门段已走过 progress*travel；关门段已走过 (1-progress)*travel
        let frac = if open { self.progress } else { 1.0 - self.progress };
        self.elapsed = Duration::from_secs_f64(frac * self.travel.as_secs_f64());
        self.state = if open {
            GateState::Opening
        } else {
            GateState::Closing
        };
    }
}
