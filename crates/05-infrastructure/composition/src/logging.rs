//! 日志初始化

use infrastructure_common::{InfrastructureError, InfrastructureResult};
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// 日志配置
///
/// 设置了 `RUST_LOG` 时以环境变量中的过滤规则为准。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别
    #[serde(with = "level_name")]
    pub level: tracing::Level,
    /// 是否显示目标
    pub show_target: bool,
    /// 是否显示线程ID
    pub show_thread_ids: bool,
    /// 是否显示文件名
    pub show_file: bool,
    /// 是否显示行号
    pub show_line_number: bool,
    /// 是否使用 JSON 格式
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: tracing::Level::INFO,
            show_target: true,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// 创建开发环境日志配置
    pub fn development() -> Self {
        Self {
            level: tracing::Level::DEBUG,
            show_target: true,
            show_thread_ids: true,
            show_file: true,
            show_line_number: true,
            json_format: false,
        }
    }

    /// 创建生产环境日志配置
    pub fn production() -> Self {
        Self {
            level: tracing::Level::INFO,
            show_target: false,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
            json_format: true,
        }
    }

    /// 设置日志级别
    pub fn with_level(mut self, level: tracing::Level) -> Self {
        self.level = level;
        self
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::from_level(self.level).into())
            .from_env_lossy()
    }
}

/// 初始化全局日志订阅者
///
/// 每个进程只能成功初始化一次，重复初始化返回 [`InfrastructureError::BootstrapFailed`]。
pub fn init_logging(config: &LoggingConfig) -> InfrastructureResult<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(config.filter())
        .with_target(config.show_target)
        .with_thread_ids(config.show_thread_ids)
        .with_file(config.show_file)
        .with_line_number(config.show_line_number);

    if config.json_format {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    }
    .map_err(|e| InfrastructureError::BootstrapFailed {
        message: format!("日志初始化失败: {}", e),
    })?;

    info!("日志系统初始化完成, 级别: {}", config.level);
    Ok(())
}

mod level_name {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(level: &tracing::Level, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(level)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<tracing::Level, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}
