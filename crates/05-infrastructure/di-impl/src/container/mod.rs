//! 默认容器实现
//!
//! [`DefaultContainer`] 按注册顺序保存适配器，持有父容器的弱引用（只用于查找），
//! 拥有子容器，并通过 [`LifecycleState`] 状态机驱动生命周期遍历。

mod lifecycle;

use crate::adapters::InstanceAdapter;
use crate::behaviors::AdaptingBehavior;
use crate::injectors::InjectionFactory;
use crate::lifecycle::StartableLifecycleStrategy;
use crate::monitors::NullComponentMonitor;
use di_abstractions::{
    Characteristics, CircularDependencyDetector, ComponentAdapter, ComponentFactory,
    ComponentMonitor, ComponentSource, Container, ContainerConfig, ContainerStats,
    DefaultCircularDependencyDetector, DuplicateKeyPolicy, Instance, Key, LifecycleStrategy,
    MonitorStrategy, MutableContainer, Registration, Resolution, ResolveOptions,
};
use infrastructure_common::{DependencyError, DependencyResult, LifecycleOperation, LifecycleState};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 容器的组成部分，子容器与父容器共享
#[derive(Clone)]
pub(crate) struct ContainerParts {
    pub(crate) config: ContainerConfig,
    pub(crate) factory: Arc<dyn ComponentFactory>,
    pub(crate) lifecycle_strategy: Arc<dyn LifecycleStrategy>,
    pub(crate) monitor: Arc<dyn ComponentMonitor>,
}

impl ContainerParts {
    pub(crate) fn with_config(config: ContainerConfig) -> Self {
        Self {
            config,
            factory: Arc::new(AdaptingBehavior::new(Arc::new(InjectionFactory::new()))),
            lifecycle_strategy: Arc::new(StartableLifecycleStrategy),
            monitor: Arc::new(NullComponentMonitor),
        }
    }
}

#[derive(Default)]
struct Registry {
    order: Vec<Arc<dyn ComponentAdapter>>,
    by_key: HashMap<Key, Arc<dyn ComponentAdapter>>,
}

/// 默认容器
pub struct DefaultContainer {
    id: Uuid,
    name: String,
    config: ContainerConfig,
    self_ref: Weak<DefaultContainer>,
    parent: Option<Weak<dyn Container>>,
    factory: Arc<dyn ComponentFactory>,
    lifecycle_strategy: Arc<dyn LifecycleStrategy>,
    monitor: RwLock<Arc<dyn ComponentMonitor>>,
    registry: RwLock<Registry>,
    children: RwLock<Vec<Arc<dyn MutableContainer>>>,
    started_children: Mutex<HashSet<Uuid>>,
    state: Mutex<LifecycleState>,
    characteristics: RwLock<Characteristics>,
}

impl DefaultContainer {
    /// 使用默认配置创建顶层容器
    pub fn new() -> Arc<Self> {
        Self::from_parts(ContainerParts::with_config(ContainerConfig::default()), None)
    }

    /// 使用指定配置创建顶层容器
    pub fn with_config(config: ContainerConfig) -> DependencyResult<Arc<Self>> {
        config.validate()?;
        Ok(Self::from_parts(ContainerParts::with_config(config), None))
    }

    pub(crate) fn from_parts(parts: ContainerParts, parent: Option<Weak<dyn Container>>) -> Arc<Self> {
        let id = Uuid::new_v4();
        let name = parts
            .config
            .name
            .clone()
            .unwrap_or_else(|| format!("container-{}", &id.simple().to_string()[..8]));
        let container = Arc::new_cyclic(|self_ref| Self {
            id,
            name,
            self_ref: self_ref.clone(),
            parent,
            factory: parts.factory,
            lifecycle_strategy: parts.lifecycle_strategy,
            monitor: RwLock::new(parts.monitor),
            registry: RwLock::new(Registry::default()),
            children: RwLock::new(Vec::new()),
            started_children: Mutex::new(HashSet::new()),
            state: Mutex::new(LifecycleState::default()),
            characteristics: RwLock::new(parts.config.characteristics.clone()),
            config: parts.config,
        });
        info!(container = %container.name, "创建容器");
        container
    }

    /// 容器配置
    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// 当前的默认特性
    pub fn characteristics(&self) -> Characteristics {
        self.characteristics.read().clone()
    }

    /// 子容器
    pub fn children(&self) -> Vec<Arc<dyn MutableContainer>> {
        self.children.read().clone()
    }

    /// 统计信息
    pub fn stats(&self) -> ContainerStats {
        let adapters = self.component_adapters();
        ContainerStats {
            registered_components: adapters.len(),
            instantiated_components: adapters
                .iter()
                .filter(|adapter| {
                    adapter
                        .lifecycle()
                        .is_some_and(|lifecycle| lifecycle.has_instance())
                })
                .count(),
            child_containers: self.children.read().len(),
            state: self.lifecycle_state(),
        }
    }

    /// 在不构造实例的前提下检查所有组件
    ///
    /// 先检查每个适配器是否可满足，全部可满足时再在静态依赖图上查找构造期的环。
    pub fn verify(&self) -> Result<(), Vec<DependencyError>> {
        let mut errors: Vec<DependencyError> = self
            .component_adapters()
            .iter()
            .filter_map(|adapter| adapter.verify(self).err())
            .collect();

        if errors.is_empty() {
            let detector = DefaultCircularDependencyDetector;
            if let Err(error) = detector
                .build_dependency_graph(self)
                .and_then(|graph| detector.detect_circular_dependencies(&graph))
            {
                errors.push(error);
            }
        }

        if errors.is_empty() {
            debug!(container = %self.name, "容器校验通过");
            Ok(())
        } else {
            warn!(container = %self.name, "容器校验失败: {} 个错误", errors.len());
            Err(errors)
        }
    }

    fn parts(&self) -> ContainerParts {
        ContainerParts {
            config: self.config.clone(),
            factory: Arc::clone(&self.factory),
            lifecycle_strategy: Arc::clone(&self.lifecycle_strategy),
            monitor: self.current_monitor(),
        }
    }

    fn ancestors(&self) -> impl Iterator<Item = Arc<dyn Container>> {
        std::iter::successors(self.parent(), |container| container.parent())
    }

    fn install(&self, adapter: Box<dyn ComponentAdapter>) -> DependencyResult<()> {
        let adapter: Arc<dyn ComponentAdapter> = Arc::from(adapter);
        let key = adapter.key().clone();
        {
            let mut registry = self.registry.write();
            match registry.order.iter().position(|existing| existing.key() == &key) {
                Some(_) if self.config.duplicate_keys == DuplicateKeyPolicy::Reject => {
                    return Err(DependencyError::DuplicateKey {
                        key: key.to_string(),
                    });
                }
                Some(position) => {
                    warn!(container = %self.name, "替换已注册的组件: {}", key);
                    registry.order[position] = Arc::clone(&adapter);
                }
                None => registry.order.push(Arc::clone(&adapter)),
            }
            registry.by_key.insert(key, Arc::clone(&adapter));
        }
        info!(container = %self.name, "注册组件: {}", adapter.describe());

        if self.lifecycle_state().is_started() && adapter.is_automatic() {
            self.start_adapter(&adapter)?;
        }
        Ok(())
    }
}

impl fmt::Debug for DefaultContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultContainer")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.lifecycle_state())
            .field("components", &self.registry.read().order.len())
            .field("children", &self.children.read().len())
            .finish()
    }
}

impl Container for DefaultContainer {
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn parent(&self) -> Option<Arc<dyn Container>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    fn shared(&self) -> Option<Arc<dyn Container>> {
        self.self_ref
            .upgrade()
            .map(|container| container as Arc<dyn Container>)
    }

    fn as_container(&self) -> &dyn Container {
        self
    }

    fn local_adapter(&self, key: &Key) -> Option<Arc<dyn ComponentAdapter>> {
        self.registry.read().by_key.get(key).cloned()
    }

    fn component_adapters(&self) -> Vec<Arc<dyn ComponentAdapter>> {
        self.registry.read().order.clone()
    }

    fn resolve_adapter(
        &self,
        adapter: &Arc<dyn ComponentAdapter>,
        resolution: &mut Resolution,
    ) -> DependencyResult<Instance> {
        adapter.resolve(self, resolution)
    }

    fn lifecycle_strategy(&self) -> Arc<dyn LifecycleStrategy> {
        Arc::clone(&self.lifecycle_strategy)
    }

    fn current_monitor(&self) -> Arc<dyn ComponentMonitor> {
        Arc::clone(&self.monitor.read())
    }

    fn resolve_options(&self) -> ResolveOptions {
        self.config.resolve_options()
    }

    fn as_monitor_strategy(&self) -> Option<&dyn MonitorStrategy> {
        Some(self)
    }
}

impl MutableContainer for DefaultContainer {
    fn register(&self, registration: Registration) -> DependencyResult<&dyn MutableContainer> {
        let Registration {
            key,
            source,
            parameters,
            characteristics,
        } = registration;
        let characteristics = self.characteristics.read().merged_with(&characteristics);

        let adapter = match source {
            ComponentSource::Recipe(recipe) => {
                self.factory
                    .create_adapter(key, recipe, parameters, &characteristics)?
            }
            ComponentSource::Instance(instance) => {
                if let Some(target) = key.type_info() {
                    if !instance.is_assignable_to(target) {
                        return Err(DependencyError::registration(
                            instance.implementation().to_string(),
                            format!("实例无法赋值给键 {key}"),
                        ));
                    }
                }
                self.factory.wrap_adapter(
                    Box::new(InstanceAdapter::new(key, instance)),
                    &characteristics,
                )?
            }
        };
        self.install(adapter)?;
        Ok(self)
    }

    fn add_adapter(
        &self,
        adapter: Box<dyn ComponentAdapter>,
        characteristics: Characteristics,
    ) -> DependencyResult<&dyn MutableContainer> {
        let characteristics = self.characteristics.read().merged_with(&characteristics);
        let adapter = self.factory.wrap_adapter(adapter, &characteristics)?;
        self.install(adapter)?;
        Ok(self)
    }

    fn remove_component(&self, key: &Key) -> DependencyResult<Option<Arc<dyn ComponentAdapter>>> {
        let state = self.lifecycle_state();
        if state.is_started() {
            return Err(DependencyError::StateMismatch {
                operation: LifecycleOperation::Remove,
                state,
            });
        }

        let mut registry = self.registry.write();
        let removed = registry.by_key.remove(key);
        if removed.is_some() {
            registry.order.retain(|adapter| adapter.key() != key);
            info!(container = %self.name, "移除组件: {}", key);
        }
        Ok(removed)
    }

    fn remove_component_by_instance(
        &self,
        instance: &Instance,
    ) -> DependencyResult<Option<Arc<dyn ComponentAdapter>>> {
        let found = self.component_adapters().into_iter().find(|adapter| {
            adapter
                .lifecycle()
                .and_then(|lifecycle| lifecycle.instance())
                .is_some_and(|held| held.ptr_eq(instance))
        });
        match found {
            Some(adapter) => self.remove_component(adapter.key()),
            None => Ok(None),
        }
    }

    fn make_child_container(&self) -> DependencyResult<Arc<dyn MutableContainer>> {
        let mut parts = self.parts();
        let ordinal = self.children.read().len() + 1;
        parts.config.name = Some(format!("{}/child-{}", self.name, ordinal));
        parts.config.characteristics = self.characteristics();

        let parent: Weak<dyn Container> = self.self_ref.clone();
        let child: Arc<dyn MutableContainer> = Self::from_parts(parts, Some(parent));
        self.children.write().push(Arc::clone(&child));
        debug!(container = %self.name, "创建子容器: {}", child.name());
        Ok(child)
    }

    fn add_child_container(
        &self,
        child: Arc<dyn MutableContainer>,
    ) -> DependencyResult<&dyn MutableContainer> {
        let child_id = child.id();
        if child_id == self.id {
            return Err(DependencyError::IllegalChildContainer {
                message: format!("容器 {} 不能成为自身的子容器", self.name),
            });
        }
        if self.ancestors().any(|ancestor| ancestor.id() == child_id) {
            return Err(DependencyError::IllegalChildContainer {
                message: format!("容器 {} 是 {} 的祖先", child.name(), self.name),
            });
        }

        let mut children = self.children.write();
        if !children.iter().any(|existing| existing.id() == child_id) {
            debug!(container = %self.name, "添加子容器: {}", child.name());
            children.push(child);
        }
        Ok(self)
    }

    fn remove_child_container(&self, child: Uuid) -> DependencyResult<bool> {
        let mut children = self.children.write();
        let before = children.len();
        children.retain(|existing| existing.id() != child);
        self.started_children.lock().remove(&child);
        Ok(children.len() != before)
    }

    fn change(&self, characteristics: Characteristics) -> DependencyResult<&dyn MutableContainer> {
        let mut defaults = self.characteristics.write();
        *defaults = defaults.merged_with(&characteristics);
        Ok(self)
    }

    fn start(&self) -> DependencyResult<()> {
        self.transition(LifecycleOperation::Start, Self::start_walk)
    }

    fn stop(&self) -> DependencyResult<()> {
        self.transition(LifecycleOperation::Stop, Self::stop_walk)
    }

    fn dispose(&self) -> DependencyResult<()> {
        self.transition(LifecycleOperation::Dispose, Self::dispose_walk)
    }

    fn lifecycle_state(&self) -> LifecycleState {
        *self.state.lock()
    }
}

impl MonitorStrategy for DefaultContainer {
    fn change_monitor(&self, monitor: Arc<dyn ComponentMonitor>) -> DependencyResult<()> {
        *self.monitor.write() = Arc::clone(&monitor);
        debug!(container = %self.name, "更换监视器");
        for child in self.children() {
            match di_abstractions::change_monitor(child.as_container(), Arc::clone(&monitor)) {
                Ok(()) | Err(DependencyError::MonitorStrategyNotFound { .. }) => {}
                Err(error) => return Err(error),
            }
        }
        Ok(())
    }

    fn monitor(&self) -> Arc<dyn ComponentMonitor> {
        self.current_monitor()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use di_abstractions::{
        Characteristic, ContainerExt, DescribeComponent, Implementation, MutableContainerExt,
    };

    trait Store: Send + Sync {}

    #[derive(Default)]
    struct MemoryStore;
    impl Store for MemoryStore {}

    fn store_recipe() -> Implementation<MemoryStore> {
        Implementation::<MemoryStore>::new()
            .default_constructor()
            .provides::<dyn Store>(|s| s)
    }

    #[test]
    fn test_duplicate_key_is_rejected_by_default() {
        let container = DefaultContainer::new();
        container
            .register(Registration::new(Key::of::<dyn Store>(), store_recipe()))
            .unwrap();

        let result = container.register(Registration::new(Key::of::<dyn Store>(), store_recipe()));
        assert!(matches!(result, Err(DependencyError::DuplicateKey { .. })));
    }

    #[test]
    fn test_replace_policy_keeps_registration_order() {
        let config = ContainerConfig::default().with_duplicate_keys(DuplicateKeyPolicy::Replace);
        let container = DefaultContainer::with_config(config).unwrap();
        container
            .add_config("first", 1_u32)
            .unwrap()
            .add_config("second", 2_u32)
            .unwrap()
            .add_config("first", 3_u32)
            .unwrap();

        let keys: Vec<Key> = container
            .component_adapters()
            .iter()
            .map(|adapter| adapter.key().clone())
            .collect();
        assert_eq!(keys, vec![Key::named("first"), Key::named("second")]);
        assert_eq!(*container.get_named::<u32>("first").unwrap().unwrap(), 3);
    }

    #[test]
    fn test_instance_must_match_type_key() {
        let container = DefaultContainer::new();
        let result = container.register(Registration::new(
            Key::of::<dyn Store>(),
            Instance::of(MemoryStore),
        ));
        assert!(matches!(
            result,
            Err(DependencyError::RegistrationError { .. })
        ));
    }

    #[test]
    fn test_change_applies_to_later_registrations() {
        let container = DefaultContainer::new();
        container
            .change(Characteristic::NoCache.into())
            .unwrap()
            .register(Registration::new(Key::of::<dyn Store>(), store_recipe()))
            .unwrap();

        let first = container.get::<dyn Store>().unwrap().unwrap();
        let second = container.get::<dyn Store>().unwrap().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_remove_by_instance_matches_identity() {
        let container = DefaultContainer::new();
        container
            .register(Registration::new(Key::of::<dyn Store>(), store_recipe()))
            .unwrap();
        let instance = container
            .component(&Key::of::<dyn Store>())
            .unwrap()
            .unwrap();

        let stranger = Instance::of(MemoryStore);
        assert!(container
            .remove_component_by_instance(&stranger)
            .unwrap()
            .is_none());
        assert!(container
            .remove_component_by_instance(&instance)
            .unwrap()
            .is_some());
        assert!(container.component_adapters().is_empty());
    }

    #[test]
    fn test_child_container_cannot_adopt_ancestor() {
        let parent = DefaultContainer::new();
        let child = parent.make_child_container().unwrap();

        let adopted = child.add_child_container(parent.clone() as Arc<dyn MutableContainer>);
        assert!(matches!(
            adopted,
            Err(DependencyError::IllegalChildContainer { .. })
        ));

        let itself = parent.add_child_container(parent.clone() as Arc<dyn MutableContainer>);
        assert!(matches!(
            itself,
            Err(DependencyError::IllegalChildContainer { .. })
        ));
    }

    #[test]
    fn test_child_sees_parent_but_not_reverse() {
        let parent = DefaultContainer::new();
        parent
            .register(Registration::new(Key::of::<dyn Store>(), store_recipe()))
            .unwrap();
        let child = parent.make_child_container().unwrap();
        child.add_config("local", "child-only".to_string()).unwrap();

        assert!(child.get::<dyn Store>().unwrap().is_some());
        assert!(parent.get_named::<String>("local").unwrap().is_none());
        assert!(parent.remove_child_container(child.id()).unwrap());
        assert!(!parent.remove_child_container(child.id()).unwrap());
    }

    #[test]
    fn test_stats_counts_instantiated_components() {
        let container = DefaultContainer::new();
        container
            .register(Registration::new(Key::of::<dyn Store>(), store_recipe()))
            .unwrap()
            .add_config("port", 8080_u16)
            .unwrap();

        let before = container.stats();
        assert_eq!(before.registered_components, 2);
        assert_eq!(before.instantiated_components, 1);

        container.get::<dyn Store>().unwrap();
        assert_eq!(container.stats().instantiated_components, 2);
    }
}
