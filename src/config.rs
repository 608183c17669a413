//! 配置加载
//!
//! 查找顺序：`--config <path>` → `$UPSM_CONFIG` → `~/.config/ups-monitor/config.json`。
//! 文件不存在时使用默认值；之后再应用环境变量覆盖。

use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::notification::{ChannelConfig, RealtimeConfig};
use crate::report::{parse_timezone, WindowError};
use crate::secret::SecretKey;

pub const ENV_CONFIG: &str = "UPSM_CONFIG";
pub const ENV_DATA_DIR: &str = "UPSM_DATA_DIR";
pub const ENV_TIMEZONE: &str = "UPSM_TIMEZONE";
pub const ENV_SECRET_KEY: &str = "UPSM_SECRET_KEY";

/// 应用配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 事件和规则的存放目录
    pub data_dir: PathBuf,
    /// IANA 时区名，报表窗口按它计算本地午夜
    pub timezone: String,
    pub channel_timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realtime: Option<RealtimeConfig>,
    pub channels: Vec<ChannelConfig>,
    pub dry_run: bool,
    /// 只从环境变量读取，不落盘
    #[serde(skip)]
    pub secret_key_material: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            timezone: "UTC".to_string(),
            channel_timeout_secs: 5,
            realtime: None,
            channels: Vec::new(),
            dry_run: false,
            secret_key_material: None,
        }
    }
}

impl AppConfig {
    /// 按查找顺序加载配置并应用环境变量覆盖
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(ENV_CONFIG).map(PathBuf::from))
            .or_else(default_config_path);

        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// 读取单个配置文件；文件不存在时返回默认配置
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// 应用环境变量覆盖；`lookup` 方便测试时不改动进程环境
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(dir) = non_empty(ENV_DATA_DIR) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(tz) = non_empty(ENV_TIMEZONE) {
            self.timezone = tz;
        }
        if let Some(material) = non_empty(ENV_SECRET_KEY) {
            self.secret_key_material = Some(material);
        }
    }

    pub fn timezone(&self) -> Result<Tz, WindowError> {
        parse_timezone(&self.timezone)
    }

    pub fn channel_timeout(&self) -> Duration {
        Duration::from_secs(self.channel_timeout_secs.max(1))
    }

    /// 没有配置密钥时返回 `None`，加密过的凭据将无法解密
    pub fn secret_key(&self) -> Option<SecretKey> {
        self.secret_key_material.as_deref().map(SecretKey::derive)
    }
}

/// `~/.config/ups-monitor/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config/ups-monitor/config.json"))
}

/// `~/.local/share/ups-monitor`
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".local/share/ups-monitor"))
        .unwrap_or_else(|| PathBuf::from(".ups-monitor"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::from_file(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.timezone, "UTC");
        assert_eq!(config.channel_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_parse_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "data_dir": "/var/lib/ups",
                "timezone": "Europe/Berlin",
                "channel_timeout_secs": 3,
                "realtime": { "url": "http://127.0.0.1:8080/push" },
                "channels": [
                    { "id": "hook", "kind": "webhook", "url": "https://example.com/hook" }
                ]
            }"#,
        )
        .unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/ups"));
        assert_eq!(config.timezone().unwrap(), chrono_tz::Europe::Berlin);
        assert_eq!(config.channel_timeout(), Duration::from_secs(3));
        assert_eq!(config.realtime.as_ref().unwrap().timeout_ms, 500);
        assert_eq!(config.channels.len(), 1);
        assert!(!config.dry_run);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(AppConfig::from_file(&path).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_DATA_DIR, "/tmp/ups-data"),
            (ENV_TIMEZONE, "America/New_York"),
            (ENV_SECRET_KEY, "hunter2"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.data_dir, PathBuf::from("/tmp/ups-data"));
        assert_eq!(config.timezone, "America/New_York");
        assert!(config.secret_key().is_some());
    }

    #[test]
    fn test_unknown_timezone() {
        let config = AppConfig {
            timezone: "Nowhere/Special".to_string(),
            ..AppConfig::default()
        };
        assert!(matches!(config.timezone(), Err(WindowError::UnknownTimezone(_))));
    }
}
