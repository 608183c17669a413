// src/cli/rules.rs
//! 通知规则管理：seed-rules / rules / rule-set

use anyhow::Result;
use clap::{ArgAction, Args};
use tracing::warn;

use super::output::{format_json, format_rule_line};
use super::{AppContext, EXIT_USAGE};
use crate::event::{EventCode, NotificationRule};
use crate::store::{seed_rules, Storage};

/// rule-set 命令参数
#[derive(Args)]
pub struct RuleSetArgs {
    /// 事件代码，例如 ONBATT、LOWBATT（也接受 OB、LB 等别名）
    pub code: String,

    /// 是否启用
    #[arg(long, action = ArgAction::Set)]
    pub enabled: bool,

    /// 指定渠道 ID；不指定时发送到所有启用的渠道
    #[arg(long, conflicts_with = "all_channels")]
    pub channel: Option<String>,

    /// 清除渠道指定，发送到所有启用的渠道
    #[arg(long)]
    pub all_channels: bool,
}

/// 处理 seed-rules 命令
pub fn handle_seed_rules(ctx: &AppContext) -> Result<()> {
    let inserted = seed_rules(ctx.store.as_ref())?;
    if inserted == 0 {
        println!("规则已初始化，无需变更");
    } else {
        println!("已初始化 {} 条规则（默认禁用）", inserted);
    }
    Ok(())
}

/// 处理 rules 命令
pub fn handle_rules(ctx: &AppContext, json: bool) -> Result<()> {
    let rules = ctx.store.list_rules()?;
    if json {
        println!("{}", format_json(&rules));
        return Ok(());
    }

    if rules.is_empty() {
        println!("没有通知规则，先运行 `upsm seed-rules`");
        return Ok(());
    }
    for rule in &rules {
        println!("{}", format_rule_line(rule));
    }
    Ok(())
}

/// 处理 rule-set 命令
pub fn handle_rule_set(ctx: &AppContext, args: RuleSetArgs) -> Result<()> {
    let code = match args.code.parse::<EventCode>() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(EXIT_USAGE);
        }
    };

    if let Some(channel) = &args.channel {
        if ctx.store.get_channel_config(channel)?.is_none() {
            warn!(channel = %channel, "Rule references a channel that is not configured");
            eprintln!("⚠️ 渠道 {} 未在配置中定义，通知时会记为失败", channel);
        }
    }

    let rule = apply_rule_change(ctx.store.as_ref(), code, &args)?;
    println!("{}", format_rule_line(&rule));
    Ok(())
}

/// 更新规则，不存在时插入
pub fn apply_rule_change(storage: &dyn Storage, code: EventCode, args: &RuleSetArgs) -> Result<NotificationRule> {
    let existing = storage.get_rule(code)?;
    let channel_ref = match (&args.channel, args.all_channels) {
        (Some(channel), _) => Some(channel.clone()),
        (None, true) => None,
        (None, false) => existing.as_ref().and_then(|r| r.channel_ref.clone()),
    };

    let rule = NotificationRule {
        event_type: code,
        enabled: args.enabled,
        channel_ref,
    };
    if existing.is_some() {
        storage.update_rule(rule.clone())?;
    } else {
        storage.insert_rule(rule.clone())?;
    }
    Ok(rule)
}
