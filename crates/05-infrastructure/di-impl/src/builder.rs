//! 容器构建器

use crate::behaviors::{AdaptingBehavior, BehaviorSpec, Behaviors, CacheScope, CachingPolicy};
use crate::container::{ContainerParts, DefaultContainer};
use crate::injectors::InjectionFactory;
use crate::lifecycle::StartableLifecycleStrategy;
use crate::monitors::NullComponentMonitor;
use di_abstractions::{
    Characteristic, Characteristics, ComponentFactory, ComponentMonitor, Container,
    ContainerConfig, InjectionType, LifecycleStrategy,
};
use infrastructure_common::DependencyResult;
use std::sync::{Arc, Weak};
use tracing::debug;

/// 容器构建器
///
/// 未指定显式行为链时，行为由 [`AdaptingBehavior`] 按注册特性推导。
/// 父容器只以弱引用保存，调用方需要保持父容器存活。
pub struct ContainerBuilder {
    config: ContainerConfig,
    parent: Option<Arc<dyn Container>>,
    monitor: Option<Arc<dyn ComponentMonitor>>,
    lifecycle_strategy: Option<Arc<dyn LifecycleStrategy>>,
    caching: CachingPolicy,
    cache_scope: CacheScope,
    injection: Option<InjectionType>,
    behaviors: Option<Vec<BehaviorSpec>>,
    characteristics: Characteristics,
}

impl ContainerBuilder {
    /// 创建构建器
    pub fn new() -> Self {
        Self {
            config: ContainerConfig::default(),
            parent: None,
            monitor: None,
            lifecycle_strategy: None,
            caching: CachingPolicy::default(),
            cache_scope: CacheScope::default(),
            injection: None,
            behaviors: None,
            characteristics: Characteristics::default(),
        }
    }

    /// 设置容器配置
    pub fn with_config(mut self, config: ContainerConfig) -> Self {
        self.config = config;
        self
    }

    /// 设置容器名称
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.config.name = Some(name.into());
        self
    }

    /// 设置父容器
    pub fn with_parent(mut self, parent: Arc<dyn Container>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// 设置监视器
    pub fn with_monitor(mut self, monitor: Arc<dyn ComponentMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// 设置生命周期策略
    pub fn with_lifecycle_strategy(mut self, strategy: Arc<dyn LifecycleStrategy>) -> Self {
        self.lifecycle_strategy = Some(strategy);
        self
    }

    /// 默认缓存所有组件
    pub fn with_caching(mut self) -> Self {
        self.caching = CachingPolicy::OptOut;
        self
    }

    /// 只缓存注册时要求缓存的组件
    pub fn with_opt_in_caching(mut self) -> Self {
        self.caching = CachingPolicy::OptIn;
        self
    }

    /// 把缓存的实例保存在外部存储中
    pub fn with_storing(mut self, store: Arc<crate::behaviors::Store>) -> Self {
        self.cache_scope = CacheScope::Stored(store);
        self
    }

    /// 每个线程缓存一个实例
    pub fn with_thread_local_caching(mut self) -> Self {
        self.cache_scope = CacheScope::ThreadLocal;
        self
    }

    /// 固定注入方式
    pub fn with_injection(mut self, injection: InjectionType) -> Self {
        self.injection = Some(injection);
        self
    }

    /// 默认在构造期间加锁
    pub fn with_locking(self) -> Self {
        self.with_characteristic(Characteristic::Lock)
    }

    /// 默认同步构造和方法分派
    pub fn with_synchronizing(self) -> Self {
        self.with_characteristic(Characteristic::Synchronize)
    }

    /// 默认隐藏实现类型
    pub fn with_hidden_implementations(self) -> Self {
        self.with_characteristic(Characteristic::HideImpl)
    }

    /// 默认自动参与生命周期
    pub fn with_automatic(self) -> Self {
        self.with_characteristic(Characteristic::Automatic)
    }

    /// 默认按参数名称消歧
    pub fn with_use_names(self) -> Self {
        self.with_characteristic(Characteristic::UseNames)
    }

    /// 默认允许 setter 循环依赖
    pub fn with_circular(self) -> Self {
        self.with_characteristic(Characteristic::EnableCircular)
    }

    /// 使用显式行为链，由外到内排列
    pub fn with_behaviors(mut self, behaviors: Vec<BehaviorSpec>) -> Self {
        self.behaviors = Some(behaviors);
        self
    }

    /// 合并默认特性
    pub fn with_characteristics(mut self, characteristics: Characteristics) -> Self {
        self.characteristics = self.characteristics.merged_with(&characteristics);
        self
    }

    fn with_characteristic(mut self, characteristic: Characteristic) -> Self {
        self.characteristics = self.characteristics.with(characteristic);
        self
    }

    /// 构建容器
    pub fn build(self) -> DependencyResult<Arc<DefaultContainer>> {
        self.config.validate()?;

        let injection = match self.injection {
            Some(injection) => InjectionFactory::new().with_injection(injection),
            None => InjectionFactory::new(),
        };
        let injection: Arc<dyn ComponentFactory> = Arc::new(injection);
        let factory: Arc<dyn ComponentFactory> = match self.behaviors {
            Some(behaviors) => {
                debug!("使用显式行为链: {:?}", behaviors);
                Behaviors::chain(behaviors, injection)
            }
            None => Arc::new(
                AdaptingBehavior::new(injection)
                    .with_caching(self.caching)
                    .with_cache_scope(self.cache_scope),
            ),
        };

        let mut config = self.config;
        config.characteristics = config.characteristics.merged_with(&self.characteristics);

        let parts = ContainerParts {
            config,
            factory,
            lifecycle_strategy: self
                .lifecycle_strategy
                .unwrap_or_else(|| Arc::new(StartableLifecycleStrategy)),
            monitor: self
                .monitor
                .unwrap_or_else(|| Arc::new(NullComponentMonitor)),
        };
        let parent: Option<Weak<dyn Container>> = self.parent.as_ref().map(Arc::downgrade);
        Ok(DefaultContainer::from_parts(parts, parent))
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behaviors::{Cached, Locked, Store, Stored};
    use di_abstractions::{
        ContainerExt, DescribeComponent, Implementation, Key, MutableContainer, Registration,
    };
    use infrastructure_common::DependencyError;

    #[derive(Default)]
    struct Clock;

    fn clock() -> Implementation<Clock> {
        Implementation::<Clock>::new().default_constructor()
    }

    #[test]
    fn test_default_builder_caches() {
        let container = ContainerBuilder::new().with_name("app").build().unwrap();
        container
            .register(Registration::new(Key::of::<Clock>(), clock()))
            .unwrap();

        assert_eq!(container.name(), "app");
        let adapter = container.component_adapter(&Key::of::<Clock>()).unwrap();
        assert!(adapter.find_adapter_of_type::<Cached>().is_some());
    }

    #[test]
    fn test_default_characteristics_apply_to_registrations() {
        let container = ContainerBuilder::new().with_locking().build().unwrap();
        container
            .register(Registration::new(Key::of::<Clock>(), clock()))
            .unwrap();

        let adapter = container.component_adapter(&Key::of::<Clock>()).unwrap();
        assert!(adapter.find_adapter_of_type::<Locked>().is_some());
    }

    #[test]
    fn test_storing_scope() {
        let store = Arc::new(Store::new());
        let container = ContainerBuilder::new()
            .with_storing(Arc::clone(&store))
            .build()
            .unwrap();
        container
            .register(Registration::new(Key::of::<Clock>(), clock()))
            .unwrap();

        let adapter = container.component_adapter(&Key::of::<Clock>()).unwrap();
        assert!(adapter.find_adapter_of_type::<Stored>().is_some());
        container.get::<Clock>().unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_parent_is_used_for_lookup() {
        let parent = ContainerBuilder::new().build().unwrap();
        parent
            .register(Registration::new(Key::of::<Clock>(), clock()))
            .unwrap();
        let child = ContainerBuilder::new()
            .with_parent(parent.clone())
            .build()
            .unwrap();

        assert!(child.get::<Clock>().unwrap().is_some());
        assert!(child.component_adapters().is_empty());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = ContainerBuilder::new()
            .with_config(ContainerConfig::default().with_max_resolution_depth(0))
            .build();
        assert!(matches!(
            result,
            Err(DependencyError::RegistrationError { .. })
        ));
    }
}
