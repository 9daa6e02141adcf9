//! 线上状态结构定义
//!
//! 传感器快照与门请求状态都采用固定字段结构，而不是开放的名字→布尔映射：
//! 非法键由此成为编译期问题，而不是运行期问题。

use crate::keys::{RequestKey, SensorKey};
use crate::{ProtocolError, parse_pairs};

/// 出站传感器快照
///
/// 7 个布尔量的完整集合，由仿真端整体计算、整体覆盖，绝不逐字段陈旧。
/// `gate_moving_*` 由调度器从门控制器填入，传感器模型本身返回 false。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SensorSnapshot {
    pub presence_front: bool,
    pub presence_middle: bool,
    pub presence_back: bool,
    pub gate_safety_a: bool,
    pub gate_safety_b: bool,
    pub gate_moving_a: bool,
    pub gate_moving_b: bool,
}

impl SensorSnapshot {
    /// 按键读取
    pub fn get(&self, key: SensorKey) -> bool {
        match key {
            SensorKey::PresenceFront => self.presence_front,
            SensorKey::PresenceMiddle => self.presence_middle,
            SensorKey::PresenceBack => self.presence_back,
            SensorKey::GateSafetyA => self.gate_safety_a,
            SensorKey::GateSafetyB => self.gate_safety_b,
            SensorKey::GateMovingA => self.gate_moving_a,
            SensorKey::GateMovingB => self.gate_moving_b,
        }
    }

    /// 按键写入（手动面板使用；核心路径总是整体覆盖）
    pub fn set(&mut self, key: SensorKey, value: bool) {
        match key {
            SensorKey::PresenceFront => self.presence_front = value,
            SensorKey::PresenceMiddle => self.presence_middle = value,
            SensorKey::PresenceBack => self.presence_back = value,
            SensorKey::GateSafetyA => self.gate_safety_a = value,
            SensorKey::GateSafetyB => self.gate_safety_b = value,
            SensorKey::GateMovingA => self.gate_moving_a = value,
            SensorKey::GateMovingB => self.gate_moving_b = value,
        }
    }

    /// 规范顺序遍历全部键值
    pub fn iter(&self) -> impl Iterator<Item = (SensorKey, bool)> + '_ {
        SensorKey::CANONICAL.into_iter().map(|k| (k, self.get(k)))
    }
}

/// 对端提供的门请求状态（last-value-wins）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RequestState {
    pub gate_request_a: bool,
    pub gate_request_b: bool,
}

impl RequestState {
    /// 应用一次解码出的请求更新（帧里缺席的键保持原值）
    pub fn apply(&mut self, update: RequestUpdate) {
        if let Some(open) = update.gate_a {
            self.gate_request_a = open;
        }
        if let Some(open) = update.gate_b {
            self.gate_request_b = open;
        }
    }
}

/// 一帧解码出的请求更新
///
/// `None` 表示该键在帧中缺席（不改变现有请求状态）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestUpdate {
    pub gate_a: Option<bool>,
    pub gate_b: Option<bool>,
}

impl RequestUpdate {
    /// 严格解析一帧载荷中的请求键
    ///
    /// 遵循整帧拒绝约定：任意键值对的值非法时返回错误，不应用任何键。
    /// 未知键（包括出站传感器键的回声）被忽略。
    pub fn parse(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut update = RequestUpdate::default();
        for (name, value) in parse_pairs(payload)? {
            match RequestKey::from_name(name) {
                Some(RequestKey::GateRequestA) => update.gate_a = Some(value),
                Some(RequestKey::GateRequestB) => update.gate_b = Some(value),
                None => {},
            }
        }
        Ok(update)
    }

    /// 帧中是否不含任何请求键
    pub fn is_empty(&self) -> bool {
        self.gate_a.is_none() && self.gate_b.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_get_set_round_trip() {
        let mut snapshot = SensorSnapshot::default();
        for key in SensorKey::CANONICAL {
            assert!(!snapshot.get(key));
            snapshot.set(key, true);
            assert!(snapshot.get(key));
        }
    }

    #[test]
    fn test_snapshot_iter_canonical_order() {
        let snapshot = SensorSnapshot {
            presence_middle: true,
            gate_moving_b: true,
            ..Default::default()
        };
        let pairs: Vec<(SensorKey, bool)> = snapshot.iter().collect();
        assert_eq!(pairs.len(), 7);
        assert_eq!(pairs[0], (SensorKey::PresenceFront, false));
        assert_eq!(pairs[1], (SensorKey::PresenceMiddle, true));
        assert_eq!(pairs[6], (SensorKey::GateMovingB, true));
    }

    #[test]
    fn test_request_update_parse_both_keys() {
        let update = RequestUpdate::parse(b"GATE_REQUEST_A:1,GATE_REQUEST_B:0").unwrap();
        assert_eq!(update.gate_a, Some(true));
        assert_eq!(update.gate_b, Some(false));
    }

    #[test]
    fn test_request_update_parse_absent_key_is_none() {
        let update = RequestUpdate::parse(b"GATE_REQUEST_B:1").unwrap();
        assert_eq!(update.gate_a, None);
        assert_eq!(update.gate_b, Some(true));
        assert!(!update.is_empty());
    }

    #[test]
    fn test_request_update_ignores_unknown_keys() {
        let update = RequestUpdate::parse(b"PRESENCE_FRONT:1,UNKNOWN:0").unwrap();
        assert!(update.is_empty());
    }

    #[test]
    fn test_request_update_rejects_whole_frame_on_bad_value() {
        // GATE_REQUEST_A 本身合法，但同帧中 B 的值非法，整帧丢弃
        let result = RequestUpdate::parse(b"GATE_REQUEST_A:1,GATE_REQUEST_B:x");
        assert!(matches!(
            result,
            Err(ProtocolError::InvalidValue { ref key, ref value })
                if key == "GATE_REQUEST_B" && value == "x"
        ));
    }

    #[test]
    fn test_request_state_apply_last_value_wins() {
        let mut state = RequestState::default();
        state.apply(RequestUpdate {
            gate_a: Some(true),
            gate_b: None,
        });
        assert!(state.gate_request_a);
        assert!(!state.gate_request_b);

        // gate_a 缺席时保持原值
        state.apply(RequestUpdate {
            gate_a: None,
            gate_b: Some(true),
        });
        assert!(state.gate_request_a);
        assert!(state.gate_request_b);

        state.apply(RequestUpdate {
            gate_a: Some(false),
            gate_b: Some(false),
        });
        assert!(!state.gate_request_a);
        assert!(!state.gate_request_b);
    }
}
