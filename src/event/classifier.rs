//! 事件分类 - 将 upsmon 的自由文本消息映射为规范事件代码

use regex::Regex;
use tracing::warn;

use super::code::EventCode;

/// 有序的子串匹配表，首个命中即返回。
///
/// 顺序即优先级：已存储的历史消息依赖这里的顺序，不要重新排序。
/// 例如 `discharging` 必须排在 `charging` 前面，`forced shutdown` 排在
/// `shutdown` 前面，`no battery` 排在 `on battery` 前面。
const PATTERNS: &[(&str, EventCode)] = &[
    ("on line power", EventCode::Online),
    ("no battery", EventCode::Nobatt),
    ("battery missing", EventCode::Nobatt),
    ("on battery", EventCode::Onbatt),
    ("battery is low", EventCode::Lowbatt),
    ("low battery", EventCode::Lowbatt),
    ("battery needs to be replaced", EventCode::Replbatt),
    ("replace battery", EventCode::Replbatt),
    ("forced shutdown", EventCode::Fsd),
    ("shutting down", EventCode::Shutdown),
    ("shutdown", EventCode::Shutdown),
    ("communications with ups established", EventCode::Commok),
    ("communications restored", EventCode::Commok),
    ("communications with ups lost", EventCode::Commfault),
    ("communications lost", EventCode::Commfault),
    ("communication lost", EventCode::Commfault),
    ("is unavailable", EventCode::Commfault),
    ("overload", EventCode::Overload),
    ("discharging", EventCode::Discharging),
    ("charging", EventCode::Charging),
    ("bypass", EventCode::Bypass),
    ("test in progress", EventCode::Cal),
    ("calibrat", EventCode::Cal),
    ("ups failed", EventCode::Fault),
    ("fault", EventCode::Fault),
    ("overheat", EventCode::Overheat),
    ("over temperature", EventCode::Overheat),
    ("overvoltage", EventCode::Overvoltage),
    ("over voltage", EventCode::Overvoltage),
    ("undervoltage", EventCode::Undervoltage),
    ("under voltage", EventCode::Undervoltage),
    ("administratively off", EventCode::Off),
    ("output off", EventCode::Off),
    ("is off", EventCode::Off),
    ("turned off", EventCode::Off),
    ("starting up", EventCode::Startup),
    ("startup", EventCode::Startup),
    ("trimming", EventCode::Trim),
    ("trim", EventCode::Trim),
    ("boosting", EventCode::Boost),
    ("boost", EventCode::Boost),
    ("data stale", EventCode::Dataold),
    ("data is old", EventCode::Dataold),
    ("stale", EventCode::Dataold),
    ("online", EventCode::Online),
];

/// 事件分类器
///
/// 纯函数：不做 I/O，同一输入总是得到同一结果。
pub struct EventClassifier {
    /// 设备前缀：`ups ups@host:`、`ups ups@host`、`ups:`、`ups@host:`
    prefix: Regex,
    /// 消息中间出现的设备标识
    embedded_device: Regex,
}

impl EventClassifier {
    pub fn new() -> Self {
        Self {
            prefix: Regex::new(
                r"^\s*(?:ups\s+[^\s@]+@[^\s:]+(?::\d+)?\s*:?|ups\s*:|[^\s@]+@[^\s:]+(?::\d+)?\s*:)\s*",
            )
            .expect("device prefix pattern is valid"),
            embedded_device: Regex::new(r"[^\s@]+@\S+").expect("device token pattern is valid"),
        }
    }

    /// 分类原始消息，无法匹配时返回 `UNKNOWN`
    pub fn classify(&self, raw_message: &str) -> EventCode {
        let normalized = raw_message.to_lowercase();
        let body = self.strip_prefix(&normalized);
        let body = self.embedded_device.replace_all(body, " ");
        let body = body.split_whitespace().collect::<Vec<_>>().join(" ");

        for (pattern, code) in PATTERNS {
            if body.contains(pattern) {
                return *code;
            }
        }

        warn!(message = %raw_message, "Unrecognised UPS status message, classified as UNKNOWN");
        EventCode::Unknown
    }

    /// 去掉开头的设备标识（容忍只出现一部分）
    fn strip_prefix<'a>(&self, normalized: &'a str) -> &'a str {
        match self.prefix.find(normalized) {
            Some(m) => &normalized[m.end()..],
            None => normalized.trim_start(),
        }
    }

    /// 每个规范代码的定义短语（表中第一个指向该代码的模式）
    pub fn defining_phrase(code: EventCode) -> Option<&'static str> {
        PATTERNS
            .iter()
            .find(|(_, c)| *c == code)
            .map(|(pattern, _)| *pattern)
    }
}

impl Default for EventClassifier {
    fn default() -> Self {
        Self::new()
    }
}
