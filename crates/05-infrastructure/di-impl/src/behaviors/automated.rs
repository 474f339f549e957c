use di_abstractions::{
    AdapterKind, ComponentAdapter, ComponentType, Container, Instance, Key, Resolution,
};
use infrastructure_common::DependencyResult;
use std::any::Any;

/// 自动参与生命周期的标记行为
///
/// 容器启动时会先解析带有该行为的组件，再按生命周期启动它。
pub struct Automated {
    delegate: Box<dyn ComponentAdapter>,
}

impl Automated {
    /// 包装内层适配器
    pub fn new(delegate: Box<dyn ComponentAdapter>) -> Self {
        Self { delegate }
    }
}

impl ComponentAdapter for Automated {
    fn key(&self) -> &Key {
        self.delegate.key()
    }

    fn component_type(&self) -> &ComponentType {
        self.delegate.component_type()
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::Automated
    }

    fn resolve(
        &self,
        container: &dyn Container,
        resolution: &mut Resolution,
    ) -> DependencyResult<Instance> {
        self.delegate.resolve(container, resolution)
    }

    fn delegate(&self) -> Option<&dyn ComponentAdapter> {
        Some(self.delegate.as_ref())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
