//! 通知分发器 - 按规则把事件发送到各渠道
//!
//! 每个渠道在独立的阻塞任务中执行，并有自己的超时；一个渠道失败不影响其他渠道，
//! 也不会回滚已经写入的事件。

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use super::builder::SenderFactory;
use super::channel::{ChannelConfig, ChannelContext, ChannelError, ChannelResponse, ChannelResult};
use crate::event::{Event, EventCode};
use crate::store::Storage;

/// 默认单渠道超时
pub const DEFAULT_CHANNEL_TIMEOUT: Duration = Duration::from_secs(5);

/// 一次分发的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub event_id: u64,
    pub event_type: EventCode,
    /// 未分发的原因（无规则、规则禁用、dry-run 等）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
    pub results: Vec<ChannelResult>,
}

impl DispatchReport {
    fn skipped(event: &Event, reason: impl Into<String>) -> Self {
        Self {
            event_id: event.id,
            event_type: event.event_type,
            skipped: Some(reason.into()),
            results: Vec::new(),
        }
    }

    pub fn sent_count(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }
}

/// 通知分发器
pub struct NotificationDispatcher {
    storage: Arc<dyn Storage>,
    factory: Arc<dyn SenderFactory>,
    timeout: Duration,
    dry_run: bool,
}

impl NotificationDispatcher {
    pub fn new(storage: Arc<dyn Storage>, factory: Arc<dyn SenderFactory>) -> Self {
        Self {
            storage,
            factory,
            timeout: DEFAULT_CHANNEL_TIMEOUT,
            dry_run: false,
        }
    }

    /// 设置单渠道超时
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 设置 dry-run 模式
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// 分发事件
    pub async fn dispatch(&self, event: &Event) -> DispatchReport {
        let rule = match self.storage.get_rule(event.event_type) {
            Ok(Some(rule)) => rule,
            Ok(None) => return DispatchReport::skipped(event, format!("no rule for {}", event.event_type)),
            Err(e) => {
                warn!(event_type = %event.event_type, error = %e, "Rule lookup failed");
                return DispatchReport::skipped(event, format!("rule lookup failed: {}", e));
            }
        };

        if !rule.enabled {
            return DispatchReport::skipped(event, format!("rule for {} is disabled", event.event_type));
        }

        let mut results = Vec::new();
        let targets = match self.resolve_targets(rule.channel_ref.as_deref(), &mut results) {
            Ok(targets) => targets,
            Err(reason) => return DispatchReport::skipped(event, reason),
        };

        if targets.is_empty() && results.is_empty() {
            return DispatchReport::skipped(event, "no enabled channels");
        }

        if self.dry_run {
            let names: Vec<&str> = targets.iter().map(|c| c.id.as_str()).collect();
            eprintln!("[DRY-RUN] Would send {} to channels: {}", event.event_type, names.join(", "));
            // 无效的渠道引用在 dry-run 下也要报告出来
            let mut report = DispatchReport::skipped(event, format!("dry-run: {}", names.join(", ")));
            report.results = results;
            return report;
        }

        results.extend(self.send_all(event, targets).await);

        let report = DispatchReport {
            event_id: event.id,
            event_type: event.event_type,
            skipped: None,
            results,
        };
        info!(
            id = event.id,
            event_type = %event.event_type,
            sent = report.sent_count(),
            failed = report.failed_count(),
            "Notification dispatch finished"
        );
        report
    }

    /// 规则指定渠道 → 该渠道；未指定 → 所有启用的渠道
    ///
    /// 引用了不存在的渠道时记一条失败结果。
    fn resolve_targets(
        &self,
        channel_ref: Option<&str>,
        results: &mut Vec<ChannelResult>,
    ) -> Result<Vec<ChannelConfig>, String> {
        match channel_ref {
            Some(id) => match self.storage.get_channel_config(id) {
                Ok(Some(config)) => Ok(vec![config]),
                Ok(None) => {
                    warn!(channel = %id, "Rule references unknown channel");
                    results.push(ChannelResult::failed(
                        id,
                        "unknown",
                        &ChannelError::Config(format!("channel '{}' is not configured", id)),
                    ));
                    Ok(Vec::new())
                }
                Err(e) => Err(format!("channel lookup failed: {}", e)),
            },
            None => self
                .storage
                .list_channel_configs()
                .map(|configs| configs.into_iter().filter(|c| c.enabled).collect())
                .map_err(|e| format!("channel lookup failed: {}", e)),
        }
    }

    /// 并发发送，每个渠道独立超时
    async fn send_all(&self, event: &Event, targets: Vec<ChannelConfig>) -> Vec<ChannelResult> {
        let context = ChannelContext::from_event(event);
        let event_type = event.event_type;
        let deadline = Instant::now() + self.timeout;

        let handles: Vec<_> = targets
            .into_iter()
            .map(|config| {
                let factory = Arc::clone(&self.factory);
                let context = context.clone();
                let name = config.id.clone();
                let kind = config.kind.name().to_string();
                // 超时后阻塞任务不会被取消，由渠道客户端自身的超时和 `cli::run_bounded` 兜底
                let handle = tokio::task::spawn_blocking(move || -> Result<ChannelResponse, ChannelError> {
                    let sender = factory.create(&config)?;
                    sender.send(event_type, &context)
                });
                (name, kind, handle)
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (name, kind, handle) in handles {
            let outcome = match tokio::time::timeout_at(deadline, handle).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => Err(ChannelError::Task(e.to_string())),
                Err(_) => Err(ChannelError::Timeout(self.timeout)),
            };

            let result = match outcome {
                Ok(response) => ChannelResult::sent(&name, &kind, response),
                Err(e) => {
                    warn!(channel = %name, kind = %kind, error = %e, "Channel send failed");
                    ChannelResult::failed(&name, &kind, &e)
                }
            };
            results.push(result);
        }
        results
    }
}
