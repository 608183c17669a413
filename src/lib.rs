//! UPS Monitor - 记录 UPS 状态变化事件，分发通知并计算报表窗口

pub mod cli;
pub mod clock;
pub mod config;
pub mod event;
pub mod notification;
pub mod pipeline;
pub mod report;
pub mod secret;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::AppConfig;
pub use event::{
    get_severity, ArgumentParser, Event, EventClassifier, EventCode, EventRecorder, NotificationRule, ParseError,
    ParsedNotification, Severity,
};
pub use notification::{
    ChannelBuilder, ChannelConfig, ChannelResult, ChannelSender, DispatchReport, NotificationDispatcher, RealtimePush,
    SenderFactory,
};
pub use pipeline::{compute_report_window, NotificationOutcome, Pipeline, PipelineError, ReportParams};
pub use report::{PeriodType, ReportPeriod, ReportSummary, ReportWindow, WindowError};
pub use secret::{Secret, SecretError, SecretKey};
pub use store::{seed_rules, FileStore, MemoryStore, Storage, StoreError};
