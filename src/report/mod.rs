//! 报表 - 时间窗口计算与事件汇总

pub mod summary;
pub mod window;

pub use summary::ReportSummary;
pub use window::{localize, parse_bound, parse_timezone, window, PeriodType, ReportPeriod, ReportWindow, WindowError};
