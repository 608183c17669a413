//! 入口流程
//!
//! `handle_notification`：解析 → 分类 → 写入 → 分发。写入之前的失败中止整个流程，
//! 写入之后的失败（实时推送、渠道发送）只体现在结果里。

use chrono_tz::Tz;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::event::{
    ArgumentParser, Event, EventClassifier, EventCode, EventRecorder, NotificationForm, ParseError,
    ParsedNotification,
};
use crate::notification::{DispatchReport, NotificationDispatcher, RealtimePush, SenderFactory};
use crate::report::{parse_timezone, window, PeriodType, ReportPeriod, ReportSummary, ReportWindow, WindowError};
use crate::store::{Storage, StoreError};

/// 中止流程的错误
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    MalformedInput(#[from] ParseError),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl PipelineError {
    /// CLI 退出码：输入错误 2，存储错误 1
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::MalformedInput(_) => 2,
            PipelineError::Storage(_) => 1,
        }
    }
}

/// 一次通知的处理结果
#[derive(Debug, Clone, Serialize)]
pub struct NotificationOutcome {
    /// 事件已写入即为 true，渠道失败不影响
    pub success: bool,
    pub message: String,
    pub event: Event,
    pub dispatch: DispatchReport,
}

/// 通知处理流程
pub struct Pipeline {
    parser: ArgumentParser,
    classifier: EventClassifier,
    recorder: EventRecorder,
    dispatcher: NotificationDispatcher,
    clock: Arc<dyn Clock>,
}

impl Pipeline {
    pub fn new(
        storage: Arc<dyn Storage>,
        push: Arc<dyn RealtimePush>,
        factory: Arc<dyn SenderFactory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            parser: ArgumentParser::new(),
            classifier: EventClassifier::new(),
            recorder: EventRecorder::new(Arc::clone(&storage), push),
            dispatcher: NotificationDispatcher::new(storage, factory),
            clock,
        }
    }

    pub fn with_channel_timeout(mut self, timeout: Duration) -> Self {
        self.dispatcher = self.dispatcher.with_timeout(timeout);
        self
    }

    pub fn with_push_timeout(mut self, timeout: Duration) -> Self {
        self.recorder = self.recorder.with_push_timeout(timeout);
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dispatcher = self.dispatcher.with_dry_run(dry_run);
        self
    }

    /// 处理一次 upsmon 通知
    pub async fn handle_notification<S: AsRef<str>>(&self, raw_args: &[S]) -> Result<NotificationOutcome, PipelineError> {
        let parsed = self.parser.parse(raw_args)?;
        let code = self.event_code(&parsed);

        let event = self
            .recorder
            .record(&parsed.ups_id, code, &parsed.raw_message(), self.clock.now_utc())
            .await?;

        let dispatch = self.dispatcher.dispatch(&event).await;
        let message = match (&dispatch.skipped, dispatch.failed_count()) {
            (Some(reason), _) => format!("recorded {} event #{} ({})", code, event.id, reason),
            (None, 0) => format!(
                "recorded {} event #{}, notified {} channel(s)",
                code,
                event.id,
                dispatch.sent_count()
            ),
            (None, failed) => format!(
                "recorded {} event #{}, {} channel(s) ok, {} failed",
                code,
                event.id,
                dispatch.sent_count(),
                failed
            ),
        };
        info!(ups = %event.ups_name, event_type = %code, "{}", message);

        Ok(NotificationOutcome {
            success: true,
            message,
            event,
            dispatch,
        })
    }

    fn event_code(&self, parsed: &ParsedNotification) -> EventCode {
        match parsed.form {
            NotificationForm::Standard => {
                let token = parsed.event_code.as_deref().unwrap_or_default();
                EventCode::from_token(token).unwrap_or_else(|| {
                    warn!(ups = %parsed.ups_id, token, "Unrecognised event code, recording as UNKNOWN");
                    EventCode::Unknown
                })
            }
            NotificationForm::Sentence => self.classifier.classify(&parsed.residual),
        }
    }
}

/// 报表请求参数
#[derive(Debug, Clone, Default)]
pub struct ReportParams {
    pub from: Option<String>,
    pub to: Option<String>,
    /// IANA 时区名
    pub timezone: String,
}

/// 按时钟的当前时间计算报表窗口
pub fn compute_report_window(
    period_type: PeriodType,
    params: &ReportParams,
    clock: &dyn Clock,
) -> Result<ReportWindow, WindowError> {
    let tz: Tz = parse_timezone(&params.timezone)?;
    let period = match period_type {
        PeriodType::Yesterday => ReportPeriod::Yesterday,
        PeriodType::LastWeek => ReportPeriod::LastWeek,
        PeriodType::LastMonth => ReportPeriod::LastMonth,
        PeriodType::Range => ReportPeriod::Range {
            from: required_bound(params.from.as_deref(), "from")?,
            to: required_bound(params.to.as_deref(), "to")?,
        },
    };
    window(&period, clock.now_utc().with_timezone(&tz), tz)
}

fn required_bound(value: Option<&str>, name: &str) -> Result<String, WindowError> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| WindowError::InvalidTimestamp(format!("range needs a `{}` bound", name)))
}

/// 查询窗口内的事件并汇总
pub fn summarize(storage: &dyn Storage, window: ReportWindow) -> Result<ReportSummary, StoreError> {
    let events = storage.events_between(window.from_utc, window.to_utc)?;
    Ok(ReportSummary::from_events(window, &events))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::notification::{ChannelConfig, ChannelError, ChannelSender, NoopPush};
    use crate::store::MemoryStore;

    struct NoChannels;

    impl SenderFactory for NoChannels {
        fn create(&self, config: &ChannelConfig) -> Result<Arc<dyn ChannelSender>, ChannelError> {
            Err(ChannelError::Config(format!("no sender for {}", config.id)))
        }
    }

    fn pipeline(store: Arc<MemoryStore>, clock: Arc<FixedClock>) -> Pipeline {
        Pipeline::new(store, Arc::new(NoopPush), Arc::new(NoChannels), clock)
    }

    fn clock(at: &str) -> Arc<FixedClock> {
        Arc::new(FixedClock::new(at.parse().unwrap()))
    }

    #[tokio::test]
    async fn test_standard_form_is_recorded() {
        let store = Arc::new(MemoryStore::new());
        let p = pipeline(store.clone(), clock("2024-03-14T10:00:00Z"));

        let outcome = p.handle_notification(&["ups@localhost", "onbatt"]).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.event.event_type, EventCode::Onbatt);
        assert_eq!(outcome.event.ups_name, "ups@localhost");
        assert_eq!(outcome.event.raw_message, "ups@localhost ONBATT");
        assert!(outcome.dispatch.skipped.is_some());
    }

    #[tokio::test]
    async fn test_sentence_form_is_classified() {
        let store = Arc::new(MemoryStore::new());
        let p = pipeline(store.clone(), clock("2024-03-14T10:00:00Z"));

        let outcome = p
            .handle_notification(&["Communications with UPS ups@127.0.0.1 lost"])
            .await
            .unwrap();
        assert_eq!(outcome.event.event_type, EventCode::Commfault);
        assert_eq!(outcome.event.source_ip.as_deref(), Some("127.0.0.1"));
        assert_eq!(outcome.event.raw_message, "Communications with UPS ups@127.0.0.1 lost");
    }

    #[tokio::test]
    async fn test_unknown_token_is_recorded_as_unknown() {
        let store = Arc::new(MemoryStore::new());
        let p = pipeline(store.clone(), clock("2024-03-14T10:00:00Z"));

        let outcome = p.handle_notification(&["ups@localhost", "WOBBLE"]).await.unwrap();
        assert_eq!(outcome.event.event_type, EventCode::Unknown);
    }

    #[tokio::test]
    async fn test_malformed_input_writes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let p = pipeline(store.clone(), clock("2024-03-14T10:00:00Z"));

        let err = p.handle_notification(&["no device token here"]).await.unwrap_err();
        assert!(matches!(err, PipelineError::MalformedInput(_)));
        assert_eq!(err.exit_code(), 2);
        assert!(store.recent_events(10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_online_closes_battery_episode() {
        let store = Arc::new(MemoryStore::new());
        let clock = clock("2024-03-14T10:00:00Z");
        let p = pipeline(store.clone(), clock.clone());

        let onbatt = p.handle_notification(&["ups@localhost", "ONBATT"]).await.unwrap().event;
        clock.advance(chrono::Duration::minutes(3));
        p.handle_notification(&["UPS ups@localhost: on line power"]).await.unwrap();

        let events = store.recent_events(10).unwrap();
        let closed = events.iter().find(|e| e.id == onbatt.id).unwrap();
        assert_eq!(closed.timestamp_utc_end, Some("2024-03-14T10:03:00Z".parse().unwrap()));
    }

    #[test]
    fn test_compute_report_window() {
        let clock = FixedClock::new("2024-03-15T09:00:00Z".parse().unwrap());
        let params = ReportParams {
            timezone: "Europe/Berlin".to_string(),
            ..ReportParams::default()
        };
        let w = compute_report_window(PeriodType::Yesterday, &params, &clock).unwrap();
        assert_eq!(w.from_utc, "2024-03-13T23:00:00Z".parse::<chrono::DateTime<chrono::Utc>>().unwrap());
    }

    #[test]
    fn test_range_requires_both_bounds() {
        let clock = FixedClock::new("2024-03-15T09:00:00Z".parse().unwrap());
        let params = ReportParams {
            from: Some("2024-01-01".to_string()),
            to: None,
            timezone: "UTC".to_string(),
        };
        let result = compute_report_window(PeriodType::Range, &params, &clock);
        assert!(matches!(result, Err(WindowError::InvalidTimestamp(_))));
    }
}
