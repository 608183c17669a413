//! CLI command handling

pub mod events;
pub mod notify;
pub mod output;
pub mod report;
pub mod rules;
pub mod secret;

pub use events::*;
pub use notify::*;
pub use output::*;
pub use report::*;
pub use rules::*;
pub use secret::*;

use anyhow::{Context, Result};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::store::FileStore;

/// 退出码：输入错误
pub const EXIT_USAGE: i32 = 2;
/// 退出码：存储或其他错误
pub const EXIT_FAILURE: i32 = 1;

/// 命令结束后等待残留阻塞任务的上限
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// 在新的运行时上执行命令，结束时最多等待 `grace`
///
/// 渠道或实时推送超时后，对应的 `spawn_blocking` 任务仍在运行；
/// 直接 drop 运行时会一直等它们结束，这里改为有上限的关闭。
pub fn run_bounded<F>(future: F, grace: Duration) -> Result<F::Output>
where
    F: Future,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start tokio runtime")?;
    let output = runtime.block_on(future);
    runtime.shutdown_timeout(grace);
    Ok(output)
}

/// 命令共享的配置和存储
pub struct AppContext {
    pub config: AppConfig,
    pub store: Arc<FileStore>,
}

impl AppContext {
    pub fn open(config_path: Option<&Path>) -> Result<Self> {
        let config = AppConfig::load(config_path)?;
        let store = FileStore::open(&config.data_dir, config.channels.clone())
            .with_context(|| format!("Failed to open data dir {}", config.data_dir.display()))?;
        Ok(Self {
            config,
            store: Arc::new(store),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_run_bounded_does_not_wait_for_stuck_blocking_task() {
        let started = Instant::now();
        let output = run_bounded(
            async {
                let stuck = tokio::task::spawn_blocking(|| std::thread::sleep(Duration::from_secs(5)));
                tokio::time::timeout(Duration::from_millis(20), stuck).await.is_err()
            },
            Duration::from_millis(50),
        )
        .unwrap();

        assert!(output, "blocking task should have timed out");
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
