//! 仿真配置
//!
//! 所有字段都带缺省值，TOML 中只需写出想覆盖的项。

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::sensors::AirlockGeometry;

/// 仿真核心配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// 单扇门全行程时长（秒）
    pub gate_travel_secs: f64,
    /// 关门安全联锁
    ///
    /// `false`（缺省）时安全传感器只上报、不参与联锁，与现役台架的
    /// 线上行为一致；`true` 时安全传感器触发会暂停**关门**方向的运动，
    /// 开门永不阻塞。
    pub safety_stop: bool,
    /// 气闸几何
    pub geometry: AirlockGeometry,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            gate_travel_secs: 3.0,
            safety_stop: false,
            geometry: AirlockGeometry::default(),
        }
    }
}

impl SimConfig {
    /// 行程时长
    pub fn gate_travel(&self) -> Duration {
        Duration::from_secs_f64(self.gate_travel_secs.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = SimConfig::default();
        assert_eq!(config.gate_travel(), Duration::from_secs(3));
        assert!(!config.safety_stop);
        assert_eq!(config.geometry.gate_a_x(), 408.0);
        assert_eq!(config.geometry.gate_b_x(), 968.0);
    }

    #[test]
    fn test_negative_travel_clamps_to_zero() {
        let config = SimConfig {
            gate_travel_secs: -1.0,
            ..Default::default()
        };
        assert_eq!(config.gate_travel(), Duration::ZERO);
    }
}
