//! UPS Monitor CLI
//!
//! 接收 upsmon (NUT) 的状态变化通知，记录事件并按规则分发到邮件、webhook 和推送渠道。

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};
use ups_monitor::cli::{
    handle_ack, handle_events, handle_notify, handle_report, handle_rule_set, handle_rules, handle_secret,
    handle_seed_rules, run_bounded, AppContext, NotifyArgs, ReportArgs, RuleSetArgs, SecretArgs, EXIT_FAILURE,
    SHUTDOWN_GRACE,
};

#[derive(Parser)]
#[command(name = "upsm")]
#[command(about = "UPS Monitor - 记录 UPS 事件并发送通知")]
#[command(version)]
struct Cli {
    /// 配置文件路径（默认 $UPSM_CONFIG 或 ~/.config/ups-monitor/config.json）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 处理 upsmon 通知（NOTIFYCMD 入口）
    Notify(NotifyArgs),
    /// 生成事件报表
    Report(ReportArgs),
    /// 为每个事件类型初始化禁用的通知规则
    SeedRules,
    /// 列出通知规则
    Rules {
        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
    },
    /// 修改通知规则
    RuleSet(RuleSetArgs),
    /// 查看最近的事件
    Events {
        /// 显示最近 N 条事件
        #[arg(long, short, default_value = "20")]
        limit: usize,
        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
    },
    /// 确认事件
    Ack {
        /// 事件 ID
        id: u64,
    },
    /// 加密/解密配置中的敏感值
    Secret(SecretArgs),
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ups_monitor=info,upsm=info"));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let cli = Cli::parse();

    let ctx = match AppContext::open(cli.config.as_deref()) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("❌ 加载配置失败: {:#}", e);
            std::process::exit(EXIT_FAILURE);
        }
    };
    debug!(data_dir = %ctx.config.data_dir.display(), "Loaded configuration");

    match cli.command {
        Commands::Notify(args) => run_bounded(handle_notify(&ctx, args), SHUTDOWN_GRACE)??,
        Commands::Report(args) => handle_report(&ctx, args)?,
        Commands::SeedRules => handle_seed_rules(&ctx)?,
        Commands::Rules { json } => handle_rules(&ctx, json)?,
        Commands::RuleSet(args) => handle_rule_set(&ctx, args)?,
        Commands::Events { limit, json } => handle_events(&ctx, limit, json)?,
        Commands::Ack { id } => handle_ack(&ctx, id)?,
        Commands::Secret(args) => handle_secret(&ctx, args)?,
    }

    Ok(())
}
