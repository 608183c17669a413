//! Severity classification for UPS events
//!
//! The severity decides how loud a notification is:
//! - HIGH: power is at risk (on battery, low battery, forced shutdown, faults)
//! - MEDIUM: operator should know (communication loss, overload, battery replacement)
//! - LOW: informational (back online, charging, self test)

use super::code::EventCode;

/// Severity level for UPS events
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
        }
    }

    /// ntfy / gotify 的优先级（1-5）
    pub fn push_priority(&self) -> u8 {
        match self {
            Severity::High => 5,
            Severity::Medium => 4,
            Severity::Low => 2,
        }
    }
}

/// Classify severity for an event code
pub fn get_severity(code: EventCode) -> Severity {
    match code {
        // Load is no longer protected by mains power
        EventCode::Onbatt
        | EventCode::Lowbatt
        | EventCode::Fsd
        | EventCode::Shutdown
        | EventCode::Fault
        | EventCode::Overheat
        | EventCode::Nobatt
        | EventCode::Off => Severity::High,
        // Degraded but still protected
        EventCode::Commfault
        | EventCode::Replbatt
        | EventCode::Overload
        | EventCode::Bypass
        | EventCode::Overvoltage
        | EventCode::Undervoltage
        | EventCode::Dataold
        | EventCode::Unknown => Severity::Medium,
        EventCode::Online
        | EventCode::Commok
        | EventCode::Charging
        | EventCode::Discharging
        | EventCode::Cal
        | EventCode::Startup
        | EventCode::Trim
        | EventCode::Boost => Severity::Low,
    }
}
