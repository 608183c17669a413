// src/cli/events.rs
//! 事件查看与确认

use anyhow::Result;

use super::output::{format_event_line, format_json};
use super::{AppContext, EXIT_FAILURE, EXIT_USAGE};
use crate::store::{Storage, StoreError};

/// 处理 events 命令
pub fn handle_events(ctx: &AppContext, limit: usize, json: bool) -> Result<()> {
    let events = ctx.store.recent_events(limit)?;
    if json {
        println!("{}", format_json(&events));
        return Ok(());
    }

    if events.is_empty() {
        println!("暂无事件");
        return Ok(());
    }

    let tz = match ctx.config.timezone() {
        Ok(tz) => tz,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(EXIT_USAGE);
        }
    };
    for event in &events {
        println!("{}", format_event_line(event, tz));
    }
    Ok(())
}

/// 处理 ack 命令
pub fn handle_ack(ctx: &AppContext, id: u64) -> Result<()> {
    match ctx.store.acknowledge(id) {
        Ok(event) => {
            println!("已确认事件 #{} ({} {})", event.id, event.event_type, event.ups_name);
            Ok(())
        }
        Err(StoreError::NotFound(_)) => {
            eprintln!("未找到事件 #{}", id);
            std::process::exit(EXIT_FAILURE);
        }
        Err(e) => Err(e.into()),
    }
}
