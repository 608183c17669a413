// src/cli/notify.rs
//! Notify 命令 - upsmon NOTIFYCMD 入口
//!
//! upsmon 调用方式：`upsm notify "UPS ups@localhost on battery"`，同时设置
//! `UPSNAME` / `NOTIFYTYPE` 环境变量。没有位置参数时使用这两个环境变量。

use anyhow::Result;
use clap::Args;
use std::sync::Arc;
use tracing::error;

use super::output::{format_dispatch, format_json};
use super::AppContext;
use crate::clock::SystemClock;
use crate::notification::{ChannelBuilder, HttpPush, NoopPush, RealtimePush};
use crate::pipeline::Pipeline;

/// Notify 命令参数
#[derive(Args)]
pub struct NotifyArgs {
    /// upsmon 传入的参数：`<ups>@<host> <CODE>` 或整句消息
    #[arg(allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// 输出 JSON 格式
    #[arg(long)]
    pub json: bool,

    /// Dry-run 模式（只记录事件，不发送通知）
    #[arg(long)]
    pub dry_run: bool,
}

/// 没有位置参数时从 NUT 环境变量补齐
pub fn resolve_notify_args<F>(args: Vec<String>, lookup: F) -> Vec<String>
where
    F: Fn(&str) -> Option<String>,
{
    if !args.is_empty() {
        return args;
    }
    ["UPSNAME", "NOTIFYTYPE"]
        .iter()
        .filter_map(|name| lookup(name))
        .filter(|v| !v.trim().is_empty())
        .collect()
}

/// 处理 notify 命令
pub async fn handle_notify(ctx: &AppContext, args: NotifyArgs) -> Result<()> {
    let raw_args = resolve_notify_args(args.args, |name| std::env::var(name).ok());
    let config = &ctx.config;

    let push: Arc<dyn RealtimePush> = match &config.realtime {
        Some(realtime) => Arc::new(HttpPush::new(realtime)),
        None => Arc::new(NoopPush),
    };
    let factory = ChannelBuilder::new()
        .timeout(config.channel_timeout())
        .secret_key(config.secret_key());

    let mut pipeline = Pipeline::new(ctx.store.clone(), push, Arc::new(factory), Arc::new(SystemClock))
        .with_channel_timeout(config.channel_timeout())
        .with_dry_run(args.dry_run || config.dry_run);
    if let Some(realtime) = &config.realtime {
        pipeline = pipeline.with_push_timeout(std::time::Duration::from_millis(realtime.timeout_ms));
    }

    match pipeline.handle_notification(raw_args.as_slice()).await {
        Ok(outcome) => {
            if args.json {
                println!("{}", format_json(&outcome));
            } else {
                println!("✅ {}", outcome.message);
                let details = format_dispatch(&outcome.dispatch);
                if !details.is_empty() {
                    println!("{}", details);
                }
            }
            Ok(())
        }
        Err(e) => {
            error!(args = ?raw_args, error = %e, "Notification rejected");
            eprintln!("❌ 通知处理失败: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}
