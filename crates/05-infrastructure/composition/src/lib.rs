//! # 基础设施组合层
//!
//! 这个 crate 负责把组件容器接入应用：从配置文件和环境变量读取设置、
//! 初始化日志，然后按设置组装并启动容器。
//!
//! ## 主要功能
//!
//! - **容器设置**: 基于 `config` crate 的分层设置（文件 + `LORN_IOC__` 环境变量）
//! - **日志初始化**: 基于 `tracing-subscriber` 的开发与生产预设
//! - **容器启动器**: 选择监视器、生命周期策略和缓存策略，注册模块并校验
//!
//! ## 基本使用
//!
//! ```rust,no_run
//! use di_abstractions::{MutableContainer, MutableContainerExt};
//! use infrastructure_composition::{ContainerBootstrapper, ContainerSettings, FnModule};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = ContainerSettings::load("config/container.toml")?;
//!     let container = ContainerBootstrapper::new(settings)
//!         .with_module(FnModule::new("settings", |container: &dyn MutableContainer| {
//!             container.add_config("region", "cn-east".to_string())?;
//!             Ok(())
//!         }))
//!         .bootstrap()?;
//!
//!     container.start()?;
//!     container.stop()?;
//!     container.dispose()?;
//!     Ok(())
//! }
//! ```

pub mod bootstrapper;
pub mod logging;
pub mod settings;

pub use bootstrapper::{ComponentModule, ContainerBootstrapper, FnModule};
pub use logging::{init_logging, LoggingConfig};
pub use settings::{ContainerSettings, LifecycleKind, LifecycleSettings, MonitorKind, ENV_PREFIX};

// 重新导出错误类型
pub use infrastructure_common::InfrastructureError;
