// src/cli/secret.rs
//! Secret 命令 - 加密/解密配置里的敏感值
//!
//! 密钥来自 `UPSM_SECRET_KEY`；加密结果直接填进 config.json 的 password/token 字段。

use anyhow::Result;
use clap::{Args, Subcommand};

use super::{AppContext, EXIT_FAILURE};
use crate::config::AppConfig;
use crate::secret::{Secret, SecretError};

/// Secret 命令参数
#[derive(Args)]
pub struct SecretArgs {
    #[command(subcommand)]
    pub action: SecretAction,
}

#[derive(Subcommand)]
pub enum SecretAction {
    /// 加密明文，输出 `enc:...`
    Conceal {
        value: String,
    },
    /// 解密 `enc:...`
    Reveal {
        value: String,
    },
}

/// 处理 secret 命令
pub fn handle_secret(ctx: &AppContext, args: SecretArgs) -> Result<()> {
    match run_secret(&ctx.config, &args.action) {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(EXIT_FAILURE);
        }
    }
}

pub fn run_secret(config: &AppConfig, action: &SecretAction) -> Result<String, SecretError> {
    let key = config.secret_key().ok_or(SecretError::MissingKey)?;
    match action {
        SecretAction::Conceal { value } => Secret::conceal(value, &key).map(|s| s.encoded()),
        SecretAction::Reveal { value } => Secret::try_from(value.clone())?.reveal(&key),
    }
}
