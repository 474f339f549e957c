//! 行为
//!
//! 行为是包装在注入器或实例适配器外层的适配器。[`BehaviorSpec`] 列出所有行为，
//! [`Behaviors::chain`] 按由外到内的顺序把它们组合成工厂；
//! [`AdaptingBehavior`] 则根据每次注册的特性推导出行为链。

mod automated;
mod cached;
mod hiding;
mod stored;
mod synchronized;
mod thread_local;

pub use automated::Automated;
pub use cached::Cached;
pub use hiding::HiddenImplementation;
pub use stored::{Store, StoreSnapshot, Stored, StoredEntry};
pub use synchronized::{Locked, Synchronized};
pub use thread_local::ThreadLocalized;

use di_abstractions::{
    Characteristics, ComponentAdapter, ComponentFactory, ComponentRecipe, Key, Parameter,
};
use infrastructure_common::DependencyResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// 行为种类
#[derive(Clone)]
pub enum BehaviorSpec {
    /// 缓存，除非注册时拒绝缓存
    Caching,
    /// 缓存，只在注册时要求缓存才生效
    OptInCaching,
    /// 保存在外部存储中
    Storing(Arc<Store>),
    /// 每个线程一个实例
    ThreadLocalizing,
    /// 隐藏实现类型
    ImplementationHiding,
    /// 同步构造和方法分派
    Synchronizing,
    /// 构造期间加锁
    Locking,
    /// 自动参与生命周期
    Automating,
}

impl BehaviorSpec {
    /// 在显式行为链中是否对该次注册生效
    ///
    /// 除按需缓存外，显式列出的行为默认生效，注册时可以用对应的反向特性关闭。
    pub fn applies(&self, characteristics: &Characteristics) -> bool {
        match self {
            Self::Caching | Self::Storing(_) | Self::ThreadLocalizing => {
                characteristics.cache != Some(false)
            }
            Self::OptInCaching => characteristics.wants_cache(),
            Self::ImplementationHiding => characteristics.hide_impl != Some(false),
            Self::Synchronizing => characteristics.synchronize != Some(false),
            Self::Locking => characteristics.lock != Some(false),
            Self::Automating => true,
        }
    }

    /// 能否包装已持有实例的适配器
    pub fn wraps_instances(&self) -> bool {
        matches!(self, Self::ImplementationHiding | Self::Synchronizing)
    }

    /// 用本行为包装适配器
    pub fn decorate(
        &self,
        adapter: Box<dyn ComponentAdapter>,
    ) -> DependencyResult<Box<dyn ComponentAdapter>> {
        debug!("为 {} 添加 {} 行为", adapter.key(), self);
        Ok(match self {
            Self::Caching | Self::OptInCaching => Box::new(Cached::new(adapter)),
            Self::Storing(store) => Box::new(Stored::new(adapter, Arc::clone(store))),
            Self::ThreadLocalizing => Box::new(ThreadLocalized::new(adapter)),
            Self::ImplementationHiding => Box::new(HiddenImplementation::new(adapter)?),
            Self::Synchronizing => Box::new(Synchronized::new(adapter)),
            Self::Locking => Box::new(Locked::new(adapter)),
            Self::Automating => Box::new(Automated::new(adapter)),
        })
    }

    /// 包装内层工厂
    pub fn wrap(self, inner: Arc<dyn ComponentFactory>) -> BehaviorFactory {
        BehaviorFactory { spec: self, inner }
    }
}

impl fmt::Display for BehaviorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Caching => "Caching",
            Self::OptInCaching => "OptInCaching",
            Self::Storing(_) => "Storing",
            Self::ThreadLocalizing => "ThreadLocalizing",
            Self::ImplementationHiding => "ImplementationHiding",
            Self::Synchronizing => "Synchronizing",
            Self::Locking => "Locking",
            Self::Automating => "Automating",
        };
        f.write_str(name)
    }
}

impl fmt::Debug for BehaviorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// 单个行为的工厂
pub struct BehaviorFactory {
    spec: BehaviorSpec,
    inner: Arc<dyn ComponentFactory>,
}

impl BehaviorFactory {
    /// 行为种类
    pub fn spec(&self) -> &BehaviorSpec {
        &self.spec
    }
}

impl ComponentFactory for BehaviorFactory {
    fn create_adapter(
        &self,
        key: Key,
        recipe: ComponentRecipe,
        parameters: Option<Vec<Parameter>>,
        characteristics: &Characteristics,
    ) -> DependencyResult<Box<dyn ComponentAdapter>> {
        let adapter = self
            .inner
            .create_adapter(key, recipe, parameters, characteristics)?;
        if characteristics.is_bare() || !self.spec.applies(characteristics) {
            return Ok(adapter);
        }
        self.spec.decorate(adapter)
    }

    fn wrap_adapter(
        &self,
        adapter: Box<dyn ComponentAdapter>,
        characteristics: &Characteristics,
    ) -> DependencyResult<Box<dyn ComponentAdapter>> {
        let adapter = self.inner.wrap_adapter(adapter, characteristics)?;
        if characteristics.is_bare() || !self.spec.applies(characteristics) {
            return Ok(adapter);
        }
        if adapter.lifecycle().is_some() && !self.spec.wraps_instances() {
            return Ok(adapter);
        }
        self.spec.decorate(adapter)
    }
}

/// 行为链组合
pub struct Behaviors;

impl Behaviors {
    /// 按由外到内的顺序组合行为，最内层是 `innermost`
    pub fn chain(
        specs: impl IntoIterator<Item = BehaviorSpec>,
        innermost: Arc<dyn ComponentFactory>,
    ) -> Arc<dyn ComponentFactory> {
        let specs: Vec<BehaviorSpec> = specs.into_iter().collect();
        specs
            .into_iter()
            .rev()
            .fold(innermost, |inner, spec| Arc::new(spec.wrap(inner)))
    }
}

/// 缓存策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachingPolicy {
    /// 默认缓存，注册时可以拒绝
    #[default]
    OptOut,
    /// 默认不缓存，注册时可以要求
    OptIn,
}

/// 缓存位置
#[derive(Clone, Default)]
pub enum CacheScope {
    /// 适配器内部
    #[default]
    Shared,
    /// 外部存储
    Stored(Arc<Store>),
    /// 每个线程
    ThreadLocal,
}

impl fmt::Debug for CacheScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shared => f.write_str("Shared"),
            Self::Stored(store) => write!(f, "Stored({} entries)", store.len()),
            Self::ThreadLocal => f.write_str("ThreadLocal"),
        }
    }
}

/// 根据注册特性推导行为链的工厂
///
/// 由外到内依次为：缓存、隐藏实现、自动生命周期、加锁、同步、注入器。
/// 缓存以外的行为只在注册时显式要求才生效。
pub struct AdaptingBehavior {
    caching: CachingPolicy,
    cache_scope: CacheScope,
    injection: Arc<dyn ComponentFactory>,
}

impl AdaptingBehavior {
    /// 创建工厂
    pub fn new(injection: Arc<dyn ComponentFactory>) -> Self {
        Self {
            caching: CachingPolicy::default(),
            cache_scope: CacheScope::default(),
            injection,
        }
    }

    /// 设置缓存策略
    pub fn with_caching(mut self, caching: CachingPolicy) -> Self {
        self.caching = caching;
        self
    }

    /// 设置缓存位置
    pub fn with_cache_scope(mut self, cache_scope: CacheScope) -> Self {
        self.cache_scope = cache_scope;
        self
    }

    fn caches(&self, characteristics: &Characteristics) -> bool {
        match self.caching {
            CachingPolicy::OptOut => !characteristics.refuses_cache(),
            CachingPolicy::OptIn => characteristics.wants_cache(),
        }
    }

    fn cache_spec(&self) -> BehaviorSpec {
        match &self.cache_scope {
            CacheScope::Shared => BehaviorSpec::Caching,
            CacheScope::Stored(store) => BehaviorSpec::Storing(Arc::clone(store)),
            CacheScope::ThreadLocal => BehaviorSpec::ThreadLocalizing,
        }
    }

    /// 由内到外需要添加的行为
    fn derive(&self, characteristics: &Characteristics, holds_instance: bool) -> Vec<BehaviorSpec> {
        let mut specs = Vec::new();
        if characteristics.synchronizes() {
            specs.push(BehaviorSpec::Synchronizing);
        }
        if !holds_instance {
            if characteristics.locks() {
                specs.push(BehaviorSpec::Locking);
            }
            if characteristics.is_automatic() {
                specs.push(BehaviorSpec::Automating);
            }
        }
        if characteristics.hides_implementation() {
            specs.push(BehaviorSpec::ImplementationHiding);
        }
        if !holds_instance && self.caches(characteristics) {
            specs.push(self.cache_spec());
        }
        specs
    }

    fn decorate(
        &self,
        adapter: Box<dyn ComponentAdapter>,
        characteristics: &Characteristics,
    ) -> DependencyResult<Box<dyn ComponentAdapter>> {
        if characteristics.is_bare() {
            return Ok(adapter);
        }
        let holds_instance = adapter.lifecycle().is_some();
        self.derive(characteristics, holds_instance)
            .iter()
            .try_fold(adapter, |adapter, spec| spec.decorate(adapter))
    }
}

impl ComponentFactory for AdaptingBehavior {
    fn create_adapter(
        &self,
        key: Key,
        recipe: ComponentRecipe,
        parameters: Option<Vec<Parameter>>,
        characteristics: &Characteristics,
    ) -> DependencyResult<Box<dyn ComponentAdapter>> {
        let adapter = self
            .injection
            .create_adapter(key, recipe, parameters, characteristics)?;
        self.decorate(adapter, characteristics)
    }

    fn wrap_adapter(
        &self,
        adapter: Box<dyn ComponentAdapter>,
        characteristics: &Characteristics,
    ) -> DependencyResult<Box<dyn ComponentAdapter>> {
        self.decorate(adapter, characteristics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InstanceAdapter;
    use crate::injectors::InjectionFactory;
    use di_abstractions::{AdapterKind, Characteristic, DescribeComponent, Implementation, Instance};

    trait Greeter: Send + Sync {}

    #[derive(Default)]
    struct English;
    impl Greeter for English {}

    fn recipe() -> ComponentRecipe {
        Implementation::<English>::new()
            .default_constructor()
            .provides::<dyn Greeter>(|e| e)
            .into_recipe()
    }

    fn kinds(adapter: &dyn ComponentAdapter) -> Vec<AdapterKind> {
        adapter.chain().map(|a| a.kind()).collect()
    }

    #[test]
    fn test_adapting_chain_order_from_outermost() {
        let factory = AdaptingBehavior::new(Arc::new(InjectionFactory::new()));
        let characteristics: Characteristics = [
            Characteristic::HideImpl,
            Characteristic::Automatic,
            Characteristic::Lock,
            Characteristic::Synchronize,
        ]
        .into_iter()
        .collect();

        let adapter = factory
            .create_adapter(Key::of::<dyn Greeter>(), recipe(), None, &characteristics)
            .unwrap();

        assert_eq!(
            kinds(adapter.as_ref()),
            vec![
                AdapterKind::Cached,
                AdapterKind::HiddenImplementation,
                AdapterKind::Automated,
                AdapterKind::Locked,
                AdapterKind::Synchronized,
                AdapterKind::Injector(di_abstractions::InjectionType::Constructor),
            ]
        );
    }

    #[test]
    fn test_opt_in_caching_requires_characteristic() {
        let factory = AdaptingBehavior::new(Arc::new(InjectionFactory::new()))
            .with_caching(CachingPolicy::OptIn);

        let plain = factory
            .create_adapter(Key::of::<English>(), recipe(), None, &Characteristics::new())
            .unwrap();
        assert!(plain.find_adapter_of_kind(AdapterKind::Cached).is_none());

        let cached = factory
            .create_adapter(
                Key::of::<English>(),
                recipe(),
                None,
                &Characteristic::Cache.into(),
            )
            .unwrap();
        assert!(cached.find_adapter_of_type::<Cached>().is_some());
    }

    #[test]
    fn test_bare_registration_skips_behaviors() {
        let factory = AdaptingBehavior::new(Arc::new(InjectionFactory::new()));
        let adapter = factory
            .create_adapter(
                Key::of::<English>(),
                recipe(),
                None,
                &Characteristic::None.into(),
            )
            .unwrap();
        assert_eq!(adapter.chain().count(), 1);
    }

    #[test]
    fn test_instances_only_get_hiding_and_synchronizing() {
        let factory = AdaptingBehavior::new(Arc::new(InjectionFactory::new()));
        let instance = Instance::builder(English)
            .provides::<dyn Greeter>(|e| e)
            .build();
        let characteristics: Characteristics = [
            Characteristic::HideImpl,
            Characteristic::Lock,
            Characteristic::Synchronize,
        ]
        .into_iter()
        .collect();

        let adapter = factory
            .wrap_adapter(
                Box::new(InstanceAdapter::new(Key::of::<dyn Greeter>(), instance)),
                &characteristics,
            )
            .unwrap();

        assert_eq!(
            kinds(adapter.as_ref()),
            vec![
                AdapterKind::HiddenImplementation,
                AdapterKind::Synchronized,
                AdapterKind::Instance,
            ]
        );
    }

    #[test]
    fn test_explicit_chain_lists_outermost_first() {
        let factory = Behaviors::chain(
            [BehaviorSpec::Locking, BehaviorSpec::Caching],
            Arc::new(InjectionFactory::new()),
        );
        let adapter = factory
            .create_adapter(Key::of::<English>(), recipe(), None, &Characteristics::new())
            .unwrap();
        assert_eq!(
            kinds(adapter.as_ref())[..2],
            [AdapterKind::Locked, AdapterKind::Cached]
        );

        // 显式列出的行为可以被反向特性关闭
        let uncached = factory
            .create_adapter(
                Key::of::<English>(),
                recipe(),
                None,
                &Characteristic::NoCache.into(),
            )
            .unwrap();
        assert!(uncached.find_adapter_of_kind(AdapterKind::Cached).is_none());
    }

    #[test]
    fn test_hiding_without_interface_is_rejected() {
        #[derive(Default)]
        struct Plain;
        let recipe = Implementation::<Plain>::new().default_constructor().into_recipe();
        let factory = AdaptingBehavior::new(Arc::new(InjectionFactory::new()));

        let result = factory.create_adapter(
            Key::of::<Plain>(),
            recipe,
            None,
            &Characteristic::HideImpl.into(),
        );
        assert!(matches!(
            result,
            Err(infrastructure_common::DependencyError::RegistrationError { .. })
        ));
    }
}
