use di_abstractions::{
    ComponentAdapter, ComponentMonitor, Container, Instance, Key, LifecycleStrategy, Resolution,
    ResolveOptions,
};
use infrastructure_common::DependencyResult;
use std::sync::Arc;
use uuid::Uuid;

/// 容器的只读视图
///
/// 不暴露注册、生命周期和监视器更换，`change_monitor` 在它上面会失败。
pub struct ImmutableContainer {
    inner: Arc<dyn Container>,
}

impl ImmutableContainer {
    /// 包装容器
    pub fn new(inner: Arc<dyn Container>) -> Self {
        Self { inner }
    }
}

impl Container for ImmutableContainer {
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
        self.inner.local_adapter(key)
    }

    fn component_adapters(&self) -> Vec<Arc<dyn ComponentAdapter>> {
        self.inner.component_adapters()
    }

    fn resolve_adapter(
        &self,
        adapter: &Arc<dyn ComponentAdapter>,
        resolution: &mut Resolution,
    ) -> DependencyResult<Instance> {
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
}
