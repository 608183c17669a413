//! 规范事件类型
//!
//! 历史数据按名称引用这些代码，序列化形式必须保持稳定。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 规范 UPS 事件代码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventCode {
    Online,
    Onbatt,
    Lowbatt,
    Replbatt,
    Commfault,
    Commok,
    Fsd,
    Shutdown,
    Overload,
    Charging,
    Discharging,
    Bypass,
    Cal,
    Fault,
    Overheat,
    Overvoltage,
    Undervoltage,
    Off,
    Startup,
    Trim,
    Boost,
    Nobatt,
    Dataold,
    Unknown,
}

impl EventCode {
    /// 除 `UNKNOWN` 以外的所有代码（用于规则初始化）
    pub const KNOWN: [EventCode; 23] = [
        EventCode::Online,
        EventCode::Onbatt,
        EventCode::Lowbatt,
        EventCode::Replbatt,
        EventCode::Commfault,
        EventCode::Commok,
        EventCode::Fsd,
        EventCode::Shutdown,
        EventCode::Overload,
        EventCode::Charging,
        EventCode::Discharging,
        EventCode::Bypass,
        EventCode::Cal,
        EventCode::Fault,
        EventCode::Overheat,
        EventCode::Overvoltage,
        EventCode::Undervoltage,
        EventCode::Off,
        EventCode::Startup,
        EventCode::Trim,
        EventCode::Boost,
        EventCode::Nobatt,
        EventCode::Dataold,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventCode::Online => "ONLINE",
            EventCode::Onbatt => "ONBATT",
            EventCode::Lowbatt => "LOWBATT",
            EventCode::Replbatt => "REPLBATT",
            EventCode::Commfault => "COMMFAULT",
            EventCode::Commok => "COMMOK",
            EventCode::Fsd => "FSD",
            EventCode::Shutdown => "SHUTDOWN",
            EventCode::Overload => "OVERLOAD",
            EventCode::Charging => "CHARGING",
            EventCode::Discharging => "DISCHARGING",
            EventCode::Bypass => "BYPASS",
            EventCode::Cal => "CAL",
            EventCode::Fault => "FAULT",
            EventCode::Overheat => "OVERHEAT",
            EventCode::Overvoltage => "OVERVOLTAGE",
            EventCode::Undervoltage => "UNDERVOLTAGE",
            EventCode::Off => "OFF",
            EventCode::Startup => "STARTUP",
            EventCode::Trim => "TRIM",
            EventCode::Boost => "BOOST",
            EventCode::Nobatt => "NOBATT",
            EventCode::Dataold => "DATAOLD",
            EventCode::Unknown => "UNKNOWN",
        }
    }

    /// 从 upsmon 的 NOTIFYTYPE 或状态标志解析代码
    ///
    /// 同时接受规范名称和 NUT 的别名（`COMMBAD`、`NOCOMM`、`OB`、`OL`、`LB` 等）。
    /// 无法识别时返回 `None`，由调用方决定是否降级为 `UNKNOWN`。
    pub fn from_token(token: &str) -> Option<Self> {
        let upper = token.trim().to_ascii_uppercase();
        let code = match upper.as_str() {
            "ONLINE" | "OL" => EventCode::Online,
            "ONBATT" | "OB" => EventCode::Onbatt,
            "LOWBATT" | "LB" => EventCode::Lowbatt,
            "REPLBATT" | "RB" => EventCode::Replbatt,
            "COMMFAULT" | "COMMBAD" | "NOCOMM" => EventCode::Commfault,
            "COMMOK" => EventCode::Commok,
            "FSD" => EventCode::Fsd,
            "SHUTDOWN" => EventCode::Shutdown,
            "OVERLOAD" | "OVER" => EventCode::Overload,
            "CHARGING" | "CHRG" => EventCode::Charging,
            "DISCHARGING" | "DISCHRG" => EventCode::Discharging,
            "BYPASS" => EventCode::Bypass,
            "CAL" => EventCode::Cal,
            "FAULT" => EventCode::Fault,
            "OVERHEAT" => EventCode::Overheat,
            "OVERVOLTAGE" => EventCode::Overvoltage,
            "UNDERVOLTAGE" => EventCode::Undervoltage,
            "OFF" => EventCode::Off,
            "STARTUP" => EventCode::Startup,
            "TRIM" => EventCode::Trim,
            "BOOST" => EventCode::Boost,
            "NOBATT" => EventCode::Nobatt,
            "DATAOLD" => EventCode::Dataold,
            "UNKNOWN" => EventCode::Unknown,
            _ => return None,
        };
        Some(code)
    }
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_token(s).ok_or_else(|| format!("unknown event code: {}", s))
    }
}
