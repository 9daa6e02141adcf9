//! 协议键名定义
//!
//! 出站（仿真端 → 嵌入式控制器）与入站（控制器 → 仿真端）的全部合法键。
//! 键集合是封闭的：非法键在编译期就不可能被构造，运行期收到的未知键
//! 在解析层被忽略。

/// 出站传感器键（规范顺序）
///
/// 编码时必须按 [`SensorKey::CANONICAL`] 的顺序产出，输出顺序是协议的一部分。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKey {
    PresenceFront,
    PresenceMiddle,
    PresenceBack,
    GateSafetyA,
    GateSafetyB,
    GateMovingA,
    GateMovingB,
}

impl SensorKey {
    /// 规范编码顺序（共 7 个键）
    pub const CANONICAL: [SensorKey; 7] = [
        SensorKey::PresenceFront,
        SensorKey::PresenceMiddle,
        SensorKey::PresenceBack,
        SensorKey::GateSafetyA,
        SensorKey::GateSafetyB,
        SensorKey::GateMovingA,
        SensorKey::GateMovingB,
    ];

    /// 线上键名
    pub const fn as_str(self) -> &'static str {
        match self {
            SensorKey::PresenceFront => "PRESENCE_FRONT",
            SensorKey::PresenceMiddle => "PRESENCE_MIDDLE",
            SensorKey::PresenceBack => "PRESENCE_BACK",
            SensorKey::GateSafetyA => "GATE_SAFETY_A",
            SensorKey::GateSafetyB => "GATE_SAFETY_B",
            SensorKey::GateMovingA => "GATE_MOVING_A",
            SensorKey::GateMovingB => "GATE_MOVING_B",
        }
    }

    /// 从线上键名解析（未知键返回 `None`）
    pub fn from_name(name: &str) -> Option<Self> {
        Self::CANONICAL.iter().copied().find(|k| k.as_str() == name)
    }
}

/// 入站请求键
///
/// 值语义：`1` = 请求开门，`0` = 请求关门。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKey {
    GateRequestA,
    GateRequestB,
}

impl RequestKey {
    /// 线上键名
    pub const fn as_str(self) -> &'static str {
        match self {
            RequestKey::GateRequestA => "GATE_REQUEST_A",
            RequestKey::GateRequestB => "GATE_REQUEST_B",
        }
    }

    /// 从线上键名解析（未知键返回 `None`）
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "GATE_REQUEST_A" => Some(RequestKey::GateRequestA),
            "GATE_REQUEST_B" => Some(RequestKey::GateRequestB),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_order_is_stable() {
        let names: Vec<&str> = SensorKey::CANONICAL.iter().map(|k| k.as_str()).collect();
        assert_eq!(
            names,
            [
                "PRESENCE_FRONT",
                "PRESENCE_MIDDLE",
                "PRESENCE_BACK",
                "GATE_SAFETY_A",
                "GATE_SAFETY_B",
                "GATE_MOVING_A",
                "GATE_MOVING_B",
            ]
        );
    }

    #[test]
    fn test_sensor_key_round_trip() {
        for key in SensorKey::CANONICAL {
            assert_eq!(SensorKey::from_name(key.as_str()), Some(key));
        }
        assert_eq!(SensorKey::from_name("GATE_REQUEST_A"), None);
        assert_eq!(SensorKey::from_name(""), None);
    }

    #[test]
    fn test_request_key_round_trip() {
        assert_eq!(
            RequestKey::from_name("GATE_REQUEST_A"),
            Some(RequestKey::GateRequestA)
        );
        assert_eq!(
            RequestKey::from_name("GATE_REQUEST_B"),
            Some(RequestKey::GateRequestB)
        );
        assert_eq!(RequestKey::from_name("PRESENCE_FRONT"), None);
    }
}
