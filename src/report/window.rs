//! 报表时间窗口 - 把报表周期换算成 UTC 的 `[from, to)` 区间
//!
//! 所有周期都以本地午夜为边界，再转换成 UTC。夏令时规则：
//! - 重叠的本地时间取较早的那个瞬间
//! - 不存在的本地时间（拨快的那一小时）顺延一小时

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 报表窗口错误
#[derive(Debug, Error, PartialEq)]
pub enum WindowError {
    #[error("invalid range: to ({to}) is before from ({from})")]
    InvalidRange { from: DateTime<Utc>, to: DateTime<Utc> },

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("unknown timezone: {0}")]
    UnknownTimezone(String),
}

/// 报表周期类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    Yesterday,
    LastWeek,
    LastMonth,
    Range,
}

impl PeriodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodType::Yesterday => "yesterday",
            PeriodType::LastWeek => "last_week",
            PeriodType::LastMonth => "last_month",
            PeriodType::Range => "range",
        }
    }
}

impl std::fmt::Display for PeriodType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 请求的报表周期；`Range` 带调用方给的原始边界
#[derive(Debug, Clone, PartialEq)]
pub enum ReportPeriod {
    Yesterday,
    LastWeek,
    LastMonth,
    Range { from: String, to: String },
}

impl ReportPeriod {
    pub fn period_type(&self) -> PeriodType {
        match self {
            ReportPeriod::Yesterday => PeriodType::Yesterday,
            ReportPeriod::LastWeek => PeriodType::LastWeek,
            ReportPeriod::LastMonth => PeriodType::LastMonth,
            ReportPeriod::Range { .. } => PeriodType::Range,
        }
    }
}

/// UTC 半开区间 `[from_utc, to_utc)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportWindow {
    pub from_utc: DateTime<Utc>,
    pub to_utc: DateTime<Utc>,
    pub period_type: PeriodType,
}

impl ReportWindow {
    fn new(from_utc: DateTime<Utc>, to_utc: DateTime<Utc>, period_type: PeriodType) -> Result<Self, WindowError> {
        if to_utc < from_utc {
            return Err(WindowError::InvalidRange {
                from: from_utc,
                to: to_utc,
            });
        }
        Ok(Self {
            from_utc,
            to_utc,
            period_type,
        })
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.from_utc && instant < self.to_utc
    }

    pub fn duration(&self) -> Duration {
        self.to_utc - self.from_utc
    }
}

/// 解析 IANA 时区名
pub fn parse_timezone(name: &str) -> Result<Tz, WindowError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| WindowError::UnknownTimezone(name.to_string()))
}

/// 计算报表窗口
pub fn window(period: &ReportPeriod, reference_now_local: DateTime<Tz>, tz: Tz) -> Result<ReportWindow, WindowError> {
    let today = reference_now_local.with_timezone(&tz).date_naive();
    let period_type = period.period_type();

    let (from, to) = match period {
        ReportPeriod::Yesterday => {
            let yesterday = previous_day(today)?;
            (local_midnight(yesterday, tz)?, local_midnight(today, tz)?)
        }
        ReportPeriod::LastWeek => {
            let start = today
                .checked_sub_signed(Duration::days(7))
                .ok_or_else(|| WindowError::InvalidTimestamp(format!("{} minus 7 days", today)))?;
            (local_midnight(start, tz)?, local_midnight(today, tz)?)
        }
        ReportPeriod::LastMonth => {
            let this_month = first_of_month(today)?;
            let last_month = first_of_month(previous_day(this_month)?)?;
            (local_midnight(last_month, tz)?, local_midnight(this_month, tz)?)
        }
        ReportPeriod::Range { from, to } => (parse_bound(from, tz)?, parse_bound(to, tz)?),
    };

    ReportWindow::new(from, to, period_type)
}

/// 把本地时间换算成 UTC（按模块文档里的夏令时规则）
pub fn localize(naive: NaiveDateTime, tz: Tz) -> Result<DateTime<Utc>, WindowError> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(a, b) => Ok(a.min(b).with_timezone(&Utc)),
        LocalResult::None => tz
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| WindowError::InvalidTimestamp(format!("{} does not exist in {}", naive, tz))),
    }
}

/// 解析区间边界：RFC 3339（带时区），或按 `tz` 解释的本地时间
pub fn parse_bound(value: &str, tz: Tz) -> Result<DateTime<Utc>, WindowError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(WindowError::InvalidTimestamp("empty range bound".to_string()));
    }

    if let Ok(aware) = DateTime::parse_from_rfc3339(value) {
        return Ok(aware.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: [&str; 4] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"];
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return localize(naive, tz);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return local_midnight(date, tz);
    }

    Err(WindowError::InvalidTimestamp(value.to_string()))
}

fn local_midnight(date: NaiveDate, tz: Tz) -> Result<DateTime<Utc>, WindowError> {
    localize(date.and_time(NaiveTime::MIN), tz)
}

fn previous_day(date: NaiveDate) -> Result<NaiveDate, WindowError> {
    date.pred_opt()
        .ok_or_else(|| WindowError::InvalidTimestamp(format!("no day before {}", date)))
}

fn first_of_month(date: NaiveDate) -> Result<NaiveDate, WindowError> {
    date.with_day(1)
        .ok_or_else(|| WindowError::InvalidTimestamp(format!("no first day for {}", date)))
}
