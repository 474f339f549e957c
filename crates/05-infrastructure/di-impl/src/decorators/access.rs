use di_abstractions::{
    Characteristics, ComponentAdapter, ComponentMonitor, Container, Instance, Key,
    LifecycleStrategy, MutableContainer, Registration, Resolution, ResolveOptions,
};
use infrastructure_common::{DependencyError, DependencyResult, LifecycleState, TypeInfo};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// 访问类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    /// 查找和解析
    Read,
    /// 注册、移除、子容器和生命周期
    Write,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

/// 访问策略
pub trait AccessPolicy: Send + Sync {
    /// 作用域是否允许对键（整个容器时为 `None`）执行该访问
    fn permits(&self, scope: &str, key: Option<&Key>, access: Access) -> bool;
}

impl<F> AccessPolicy for F
where
    F: Fn(&str, Option<&Key>, Access) -> bool + Send + Sync,
{
    fn permits(&self, scope: &str, key: Option<&Key>, access: Access) -> bool {
        self(scope, key, access)
    }
}

/// 按作用域授予的访问权限
#[derive(Debug, Clone, Default)]
pub struct ScopeGrants {
    grants: HashMap<String, HashSet<Access>>,
}

impl ScopeGrants {
    /// 不授予任何权限
    pub fn new() -> Self {
        Self::default()
    }

    /// 授予作用域一种访问
    pub fn grant(mut self, scope: impl Into<String>, access: Access) -> Self {
        self.grants.entry(scope.into()).or_default().insert(access);
        self
    }
}

impl AccessPolicy for ScopeGrants {
    fn permits(&self, scope: &str, _key: Option<&Key>, access: Access) -> bool {
        self.grants
            .get(scope)
            .is_some_and(|granted| granted.contains(&access))
    }
}

/// 按作用域检查读写权限的容器
///
/// 被拒绝的查找不会暴露适配器，被拒绝的操作返回 [`DependencyError::AccessDenied`]。
pub struct AccessControlledContainer {
    inner: Arc<dyn MutableContainer>,
    scope: String,
    policy: Arc<dyn AccessPolicy>,
}

impl AccessControlledContainer {
    /// 包装容器
    pub fn new(
        inner: Arc<dyn MutableContainer>,
        scope: impl Into<String>,
        policy: Arc<dyn AccessPolicy>,
    ) -> Self {
        Self {
            inner,
            scope: scope.into(),
            policy,
        }
    }

    /// 作用域
    pub fn scope(&self) -> &str {
        &self.scope
    }

    fn permits(&self, key: Option<&Key>, access: Access) -> bool {
        self.policy.permits(&self.scope, key, access)
    }

    /// 祖先容器，从父容器开始
    fn ancestors(&self) -> Vec<Arc<dyn Container>> {
        let mut ancestors = Vec::new();
        let mut next = self.parent();
        while let Some(container) = next {
            next = container.parent();
            ancestors.push(container);
        }
        ancestors
    }

    /// 在祖先容器中按类型解析，选中的适配器仍要经过策略检查
    fn resolve_inherited(
        &self,
        target: &TypeInfo,
        resolution: &mut Resolution,
    ) -> DependencyResult<Option<Instance>> {
        for ancestor in self.ancestors() {
            if let Some(adapter) = ancestor.local_adapter_of_type(target, None, None)? {
                self.check(Some(adapter.key()), Access::Read)?;
                return ancestor.resolve_adapter(&adapter, resolution).map(Some);
            }
        }
        Ok(None)
    }

    fn check(&self, key: Option<&Key>, access: Access) -> DependencyResult<()> {
        if self.permits(key, access) {
            return Ok(());
        }
        let access = match key {
            Some(key) => format!("{access} {key}"),
            None => access.to_string(),
        };
        warn!("访问被拒绝: 作用域 {} 不允许 {}", self.scope, access);
        Err(DependencyError::AccessDenied {
            scope: self.scope.clone(),
            access,
        })
    }
}

impl Container for AccessControlledContainer {
    fn id(&self) -> Uuid {
        self.inner.id()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn parent(&self) -> Option<Arc<dyn Container>> {
        self.inner.parent()
    }

    fn as_container(&self) -> &dyn Container {
        self
    }

    fn local_adapter(&self, key: &Key) -> Option<Arc<dyn ComponentAdapter>> {
        if !self.permits(Some(key), Access::Read) {
            return None;
        }
        self.inner.local_adapter(key)
    }

    fn component_adapters(&self) -> Vec<Arc<dyn ComponentAdapter>> {
        self.inner
            .component_adapters()
            .into_iter()
            .filter(|adapter| self.permits(Some(adapter.key()), Access::Read))
            .collect()
    }

    fn resolve_adapter(
        &self,
        adapter: &Arc<dyn ComponentAdapter>,
        resolution: &mut Resolution,
    ) -> DependencyResult<Instance> {
        self.check(Some(adapter.key()), Access::Read)?;
        self.inner.resolve_adapter(adapter, resolution)
    }

    fn lifecycle_strategy(&self) -> Arc<dyn LifecycleStrategy> {
        self.inner.lifecycle_strategy()
    }

    fn current_monitor(&self) -> Arc<dyn ComponentMonitor> {
        self.inner.current_monitor()
    }

    fn resolve_options(&self) -> ResolveOptions {
        self.inner.resolve_options()
    }

    fn delegate(&self) -> Option<&dyn Container> {
        Some(self.inner.as_container())
    }

    fn component(&self, key: &Key) -> DependencyResult<Option<Instance>> {
        self.check(Some(key), Access::Read)?;
        self.inner.component(key)
    }

    /// 按类型获取组件，策略拒绝的键不参与选择
    fn component_of_type(&self, target: &TypeInfo) -> DependencyResult<Option<Instance>> {
        let exact = Key::for_type(*target);
        self.check(Some(&exact), Access::Read)?;
        let mut resolution = self.new_resolution();
        let found = match self.local_adapter_of_type(target, None, None)? {
            Some(adapter) => Some(self.resolve_adapter(&adapter, &mut resolution)?),
            None => self.resolve_inherited(target, &mut resolution)?,
        };
        resolution.complete()?;
        Ok(found.or_else(|| self.current_monitor().no_component_found(&exact)))
    }

    fn components(&self) -> DependencyResult<Vec<Instance>> {
        self.check(None, Access::Read)?;
        let mut resolution = self.new_resolution();
        let mut instances = Vec::new();
        for adapter in self.component_adapters() {
            instances.push(self.resolve_adapter(&adapter, &mut resolution)?);
        }
        resolution.complete()?;
        Ok(instances)
    }

    /// 本容器及祖先中可赋值且被允许读取的全部组件，祖先的排在前面
    fn components_of_type(&self, target: &TypeInfo) -> DependencyResult<Vec<Instance>> {
        self.check(None, Access::Read)?;
        let mut resolution = self.new_resolution();
        let mut instances = Vec::new();
        for ancestor in self.ancestors().iter().rev() {
            for adapter in ancestor.component_adapters() {
                if adapter.component_type().is_assignable_to(target)
                    && self.permits(Some(adapter.key()), Access::Read)
                {
                    instances.push(ancestor.resolve_adapter(&adapter, &mut resolution)?);
                }
            }
        }
        for adapter in self.component_adapters() {
            if adapter.component_type().is_assignable_to(target) {
                instances.push(self.resolve_adapter(&adapter, &mut resolution)?);
            }
        }
        resolution.complete()?;
        Ok(instances)
    }
}

impl MutableContainer for AccessControlledContainer {
    fn register(&self, registration: Registration) -> DependencyResult<&dyn MutableContainer> {
        self.check(Some(&registration.key), Access::Write)?;
        self.inner.register(registration)?;
        Ok(self)
    }

    fn add_adapter(
        &self,
        adapter: Box<dyn ComponentAdapter>,
        characteristics: Characteristics,
    ) -> DependencyResult<&dyn MutableContainer> {
        self.check(Some(adapter.key()), Access::Write)?;
        self.inner.add_adapter(adapter, characteristics)?;
        Ok(self)
    }

    fn remove_component(&self, key: &Key) -> DependencyResult<Option<Arc<dyn ComponentAdapter>>> {
        self.check(Some(key), Access::Write)?;
        self.inner.remove_component(key)
    }

    fn remove_component_by_instance(
        &self,
        instance: &Instance,
    ) -> DependencyResult<Option<Arc<dyn ComponentAdapter>>> {
        self.check(None, Access::Write)?;
        self.inner.remove_component_by_instance(instance)
    }

    fn make_child_container(&self) -> DependencyResult<Arc<dyn MutableContainer>> {
        self.check(None, Access::Write)?;
        self.inner.make_child_container()
    }

    fn add_child_container(
        &self,
        child: Arc<dyn MutableContainer>,
    ) -> DependencyResult<&dyn MutableContainer> {
        self.check(None, Access::Write)?;
        self.inner.add_child_container(child)?;
        Ok(self)
    }

    fn remove_child_container(&self, child: Uuid) -> DependencyResult<bool> {
        self.check(None, Access::Write)?;
        self.inner.remove_child_container(child)
    }

    fn change(&self, characteristics: Characteristics) -> DependencyResult<&dyn MutableContainer> {
        self.check(None, Access::Write)?;
        self.inner.change(characteristics)?;
        Ok(self)
    }

    fn start(&self) -> DependencyResult<()> {
        self.check(None, Access::Write)?;
        self.inner.start()
    }

    fn stop(&self) -> DependencyResult<()> {
        self.check(None, Access::Write)?;
        self.inner.stop()
    }

    fn dispose(&self) -> DependencyResult<()> {
        self.check(None, Access::Write)?;
        self.inner.dispose()
    }

    fn lifecycle_state(&self) -> LifecycleState {
        self.inner.lifecycle_state()
    }
}
