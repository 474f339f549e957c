//! 容器设置
//!
//! 设置来自可选的配置文件（TOML/JSON/YAML），再叠加 `LORN_IOC__` 前缀的环境变量，
//! 例如 `LORN_IOC__CONTAINER__NAME=orders` 覆盖 `container.name`。

use crate::logging::LoggingConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use di_abstractions::ContainerConfig;
use di_impl::CachingPolicy;
use infrastructure_common::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, error};

/// 环境变量前缀
pub const ENV_PREFIX: &str = "LORN_IOC";

/// 监视器种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorKind {
    /// 不观察任何事件
    #[default]
    Null,
    /// 把事件写入日志
    Tracing,
    /// 收集生命周期失败并在遍历结束后统一报告
    Collecting,
}

/// 生命周期策略种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleKind {
    /// 组件没有生命周期
    None,
    /// 依据 `Startable` / `Disposable` 契约
    #[default]
    Startable,
    /// 依据命名操作
    NamingConvention,
    /// 契约与命名操作都生效
    Composite,
}

/// 生命周期设置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleSettings {
    /// 策略种类
    pub strategy: LifecycleKind,
    /// 启动操作名
    pub start_method: String,
    /// 停止操作名
    pub stop_method: String,
    /// 释放操作名
    pub dispose_method: String,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            strategy: LifecycleKind::default(),
            start_method: "start".to_string(),
            stop_method: "stop".to_string(),
            dispose_method: "dispose".to_string(),
        }
    }
}

/// 容器设置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerSettings {
    /// 容器配置
    pub container: ContainerConfig,
    /// 缓存策略
    pub caching: CachingPolicy,
    /// 监视器
    pub monitor: MonitorKind,
    /// 生命周期策略
    pub lifecycle: LifecycleSettings,
    /// 日志配置，未设置时不初始化日志
    pub logging: Option<LoggingConfig>,
    /// 启动前校验所有注册
    pub verify: bool,
    /// 注册完成后立即启动容器
    pub auto_start: bool,
}

impl Default for ContainerSettings {
    fn default() -> Self {
        Self {
            container: ContainerConfig::default(),
            caching: CachingPolicy::default(),
            monitor: MonitorKind::default(),
            lifecycle: LifecycleSettings::default(),
            logging: None,
            verify: true,
            auto_start: false,
        }
    }
}

impl ContainerSettings {
    /// 从配置文件加载，格式由扩展名决定
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        debug!("加载容器设置: {}", path.display());
        Self::build(Config::builder().add_source(File::from(path)), Self::environment())
    }

    /// 只从环境变量加载
    pub fn from_env() -> ConfigResult<Self> {
        Self::build(Config::builder(), Self::environment())
    }

    /// 从 TOML 文本加载
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Self::build(
            Config::builder().add_source(File::from_str(content, FileFormat::Toml)),
            Self::environment(),
        )
    }

    /// 校验设置
    pub fn validate(&self) -> ConfigResult<()> {
        self.container
            .validate()
            .map_err(|e| ConfigError::validation(e.to_string()))?;

        let lifecycle = &self.lifecycle;
        if matches!(
            lifecycle.strategy,
            LifecycleKind::NamingConvention | LifecycleKind::Composite
        ) {
            for (field, method) in [
                ("start_method", &lifecycle.start_method),
                ("stop_method", &lifecycle.stop_method),
                ("dispose_method", &lifecycle.dispose_method),
            ] {
                if method.trim().is_empty() {
                    return Err(ConfigError::validation(format!(
                        "lifecycle.{field} 不能为空"
                    )));
                }
            }
        }
        Ok(())
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
    }

    fn build(builder: ConfigBuilder<DefaultState>, environment: Environment) -> ConfigResult<Self> {
        let settings: Self = builder
            .add_source(environment)
            .build()
            .and_then(Config::try_deserialize)
            .map_err(|e| {
                error!("容器设置解析失败: {}", e);
                ConfigError::parse(e)
            })?;
        settings.validate()?;
        Ok(settings)
    }
}
