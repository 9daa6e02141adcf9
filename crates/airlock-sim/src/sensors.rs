//! 传感器推导模型
//!
//! 纯函数：车辆占据区间 + 固定几何 → 传感器快照。无副作用，
//! 可以任意频率、任意顺序调用；相同输入永远得到相同输出。
//!
//! 布局（x 轴，单位与参考台架一致）：
//!
//! ```text
//! |---- front ----|A|---- middle ----|B|---- back ----|
//!        ^前哨线           ^中哨线            ^后哨线
//! ```
//!
//! 哨线位于各区中心；门 A/B 位于区边界；安全传感器是以门为中心的
//! 固定宽度窗口。

use serde::{Deserialize, Serialize};

use airlock_protocol::SensorSnapshot;

/// 车辆占据的 x 区间
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleSpan {
    pub left: f64,
    pub right: f64,
}

impl VehicleSpan {
    pub fn new(left: f64, right: f64) -> Self {
        Self { left, right }
    }

    /// 哨线是否落在区间内（含边界）
    fn covers(&self, x: f64) -> bool {
        self.left <= x && x <= self.right
    }

    /// 与开区间 (lo, hi) 是否重叠
    fn overlaps(&self, lo: f64, hi: f64) -> bool {
        self.right > lo && self.left < hi
    }
}

/// 气闸固定几何
///
/// 缺省值取自参考台架：前/中/后区宽 408 / 560 / 408，安全窗口宽 60。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AirlockGeometry {
    pub front_zone_width: f64,
    pub middle_zone_width: f64,
    pub back_zone_width: f64,
    pub safety_window_width: f64,
}

impl Default for AirlockGeometry {
    fn default() -> Self {
        Self {
            front_zone_width: 408.0,
            middle_zone_width: 560.0,
            back_zone_width: 408.0,
            safety_window_width: 60.0,
        }
    }
}

impl AirlockGeometry {
    /// 门 A 的 x 坐标（前区/中区边界）
    pub fn gate_a_x(&self) -> f64 {
        self.front_zone_width
    }

    /// 门 B 的 x 坐标（中区/后区边界）
    pub fn gate_b_x(&self) -> f64 {
        self.front_zone_width + self.middle_zone_width
    }

    /// 前区哨线
    pub fn front_sensor_x(&self) -> f64 {
        self.front_zone_width / 2.0
    }

    /// 中区哨线
    pub fn middle_sensor_x(&self) -> f64 {
        self.front_zone_width + self.middle_zone_width / 2.0
    }

    /// 后区哨线
    pub fn back_sensor_x(&self) -> f64 {
        self.front_zone_width + self.middle_zone_width + self.back_zone_width / 2.0
    }

    /// 总宽
    pub fn total_width(&self) -> f64 {
        self.front_zone_width + self.middle_zone_width + self.back_zone_width
    }
}

/// 传感器模型
pub struct SensorModel;

impl SensorModel {
    /// 由车辆位置与几何推导传感器快照
    ///
    /// `gate_moving_*` 恒为 false——运动标志由调度器从门控制器填入。
    /// 越界/退化的几何不会报错，只会得到全 false 的快照。
    pub fn compute(vehicle: &VehicleSpan, geometry: &AirlockGeometry) -> SensorSnapshot {
        let half = geometry.safety_window_width / 2.0;
        let gate_a = geometry.gate_a_x();
        let gate_b = geometry.gate_b_x();

        SensorSnapshot {
            presence_front: vehicle.covers(geometry.front_sensor_x()),
            presence_middle: vehicle.covers(geometry.middle_sensor_x()),
            presence_back: vehicle.covers(geometry.back_sensor_x()),
            gate_safety_a: vehicle.overlaps(gate_a - half, gate_a + half),
            gate_safety_b: vehicle.overlaps(gate_b - half, gate_b + half),
            gate_moving_a: false,
            gate_moving_b: false,
        }
    }
}

/// 三次缓入缓出（展示专用）
///
/// 展示层可以用它平滑渲染读出的 progress。控制逻辑必须使用未变换的
/// 线性 progress——换向计算依赖它。
pub fn ease_in_out_cubic(t: f64) -> f64 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}
