// src/cli/report.rs
//! Report 命令 - 按周期汇总历史事件

use anyhow::Result;
use clap::Args;

use super::output::{format_event_line, format_json, format_summary};
use super::{AppContext, EXIT_FAILURE, EXIT_USAGE};
use crate::clock::SystemClock;
use crate::pipeline::{compute_report_window, summarize, ReportParams};
use crate::report::{parse_timezone, PeriodType};
use crate::store::Storage;

/// Report 命令参数
#[derive(Args)]
pub struct ReportArgs {
    /// 报表周期
    #[arg(long, value_enum, default_value = "yesterday")]
    pub period: PeriodType,

    /// range 起点（RFC 3339 或本地时间 `YYYY-MM-DD[ HH:MM[:SS]]`）
    #[arg(long)]
    pub from: Option<String>,

    /// range 终点
    #[arg(long)]
    pub to: Option<String>,

    /// IANA 时区（默认使用配置中的 timezone）
    #[arg(long)]
    pub timezone: Option<String>,

    /// 同时列出窗口内的事件
    #[arg(long)]
    pub events: bool,

    /// 输出 JSON 格式
    #[arg(long)]
    pub json: bool,
}

/// 处理 report 命令
pub fn handle_report(ctx: &AppContext, args: ReportArgs) -> Result<()> {
    let timezone = args.timezone.unwrap_or_else(|| ctx.config.timezone.clone());
    let params = ReportParams {
        from: args.from,
        to: args.to,
        timezone,
    };

    let window = match compute_report_window(args.period, &params, &SystemClock) {
        Ok(window) => window,
        Err(e) => {
            eprintln!("❌ 无效的报表周期: {}", e);
            std::process::exit(EXIT_USAGE);
        }
    };
    // compute_report_window 已校验过时区
    let tz = parse_timezone(&params.timezone)?;

    let summary = match summarize(ctx.store.as_ref(), window) {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("❌ 读取事件失败: {}", e);
            std::process::exit(EXIT_FAILURE);
        }
    };

    if args.json {
        println!("{}", format_json(&summary));
        return Ok(());
    }

    println!("{}", format_summary(&summary, tz));
    if args.events {
        let events = ctx.store.events_between(window.from_utc, window.to_utc)?;
        println!();
        for event in &events {
            println!("{}", format_event_line(event, tz));
        }
    }
    Ok(())
}
