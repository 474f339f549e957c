//! 容器启动器

use crate::logging::{init_logging, LoggingConfig};
use crate::settings::{ContainerSettings, LifecycleKind, MonitorKind};
use di_abstractions::{ComponentMonitor, Container, LifecycleStrategy, MutableContainer};
use di_impl::{
    CachingPolicy, CompositeLifecycleStrategy, ContainerBuilder, DefaultContainer,
    LifecycleComponentMonitor, NamingConventionLifecycleStrategy, NullComponentMonitor,
    NullLifecycleStrategy, StartableLifecycleStrategy, TracingComponentMonitor,
};
use infrastructure_common::{DependencyResult, InfrastructureError, InfrastructureResult};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};

/// 向容器注册一组组件
pub trait ComponentModule: Send + Sync {
    /// 模块名称
    fn name(&self) -> &str;

    /// 注册组件
    fn register(&self, container: &dyn MutableContainer) -> DependencyResult<()>;
}

/// 由闭包实现的模块
pub struct FnModule<F> {
    name: String,
    register: F,
}

impl<F> FnModule<F>
where
    F: Fn(&dyn MutableContainer) -> DependencyResult<()> + Send + Sync,
{
    /// 创建模块
    pub fn new(name: impl Into<String>, register: F) -> Self {
        Self {
            name: name.into(),
            register,
        }
    }
}

impl<F> ComponentModule for FnModule<F>
where
    F: Fn(&dyn MutableContainer) -> DependencyResult<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn register(&self, container: &dyn MutableContainer) -> DependencyResult<()> {
        (self.register)(container)
    }
}

/// 容器启动器
///
/// 按设置初始化日志、选择监视器和生命周期策略、构建容器，
/// 然后依次注册模块，校验通过后按需启动容器。
pub struct ContainerBootstrapper {
    settings: ContainerSettings,
    logging: Option<LoggingConfig>,
    modules: Vec<Box<dyn ComponentModule>>,
}

impl ContainerBootstrapper {
    /// 创建启动器，日志配置取自设置
    pub fn new(settings: ContainerSettings) -> Self {
        let logging = settings.logging.clone();
        Self {
            settings,
            logging,
            modules: Vec::new(),
        }
    }

    /// 覆盖日志配置
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    /// 不初始化日志
    pub fn without_logging(mut self) -> Self {
        self.logging = None;
        self
    }

    /// 设置是否在启动前校验
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.settings.verify = enabled;
        self
    }

    /// 添加模块
    pub fn with_module(mut self, module: impl ComponentModule + 'static) -> Self {
        self.modules.push(Box::new(module));
        self
    }

    /// 设置
    pub fn settings(&self) -> &ContainerSettings {
        &self.settings
    }

    /// 构建容器
    pub fn bootstrap(self) -> InfrastructureResult<Arc<DefaultContainer>> {
        if let Some(logging) = &self.logging {
            init_logging(logging)?;
        }
        info!("开始启动组件容器");

        let container = self.build_container()?;
        for module in &self.modules {
            debug!(container = %container.name(), "注册模块: {}", module.name());
            module.register(&*container).map_err(|e| {
                error!("模块 {} 注册失败: {}", module.name(), e);
                e
            })?;
        }

        if self.settings.verify {
            self.verify(&container)?;
        }
        if self.settings.auto_start {
            container.start()?;
        }

        info!(
            container = %container.name(),
            "组件容器启动完成, 共 {} 个组件",
            container.component_adapters().len()
        );
        Ok(container)
    }

    fn build_container(&self) -> InfrastructureResult<Arc<DefaultContainer>> {
        let builder = ContainerBuilder::new()
            .with_config(self.settings.container.clone())
            .with_monitor(self.monitor())
            .with_lifecycle_strategy(self.lifecycle_strategy());
        let builder = match self.settings.caching {
            CachingPolicy::OptOut => builder.with_caching(),
            CachingPolicy::OptIn => builder.with_opt_in_caching(),
        };
        Ok(builder.build()?)
    }

    fn verify(&self, container: &DefaultContainer) -> InfrastructureResult<()> {
        container.verify().map_err(|errors| {
            for e in &errors {
                error!("组件校验失败: {}", e);
            }
            InfrastructureError::BootstrapFailed {
                message: format!(
                    "{} 个组件校验失败: {}",
                    errors.len(),
                    errors
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join("; ")
                ),
            }
        })
    }

    fn monitor(&self) -> Arc<dyn ComponentMonitor> {
        match self.settings.monitor {
            MonitorKind::Null => Arc::new(NullComponentMonitor),
            MonitorKind::Tracing => Arc::new(TracingComponentMonitor::new()),
            MonitorKind::Collecting => Arc::new(
                LifecycleComponentMonitor::new()
                    .with_delegate(Arc::new(TracingComponentMonitor::new())),
            ),
        }
    }

    fn lifecycle_strategy(&self) -> Arc<dyn LifecycleStrategy> {
        let lifecycle = &self.settings.lifecycle;
        let naming = || {
            NamingConventionLifecycleStrategy::new().with_methods(
                lifecycle.start_method.as_str(),
                lifecycle.stop_method.as_str(),
                lifecycle.dispose_method.as_str(),
            )
        };
        match lifecycle.strategy {
            LifecycleKind::None => Arc::new(NullLifecycleStrategy),
            LifecycleKind::Startable => Arc::new(StartableLifecycleStrategy),
            LifecycleKind::NamingConvention => Arc::new(naming()),
            LifecycleKind::Composite => Arc::new(
                CompositeLifecycleStrategy::new(vec![Arc::new(StartableLifecycleStrategy)])
                    .with_strategy(Arc::new(naming())),
            ),
        }
    }
}

impl Default for ContainerBootstrapper {
    fn default() -> Self {
        Self::new(ContainerSettings::default())
    }
}

impl fmt::Debug for ContainerBootstrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerBootstrapper")
            .field("settings", &self.settings)
            .field("logging", &self.logging)
            .field(
                "modules",
                &self.modules.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
