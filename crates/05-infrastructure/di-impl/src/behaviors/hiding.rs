use di_abstractions::{
    AdapterKind, ComponentAdapter, ComponentType, Container, Instance, Key, Resolution,
};
use infrastructure_common::{DependencyError, DependencyResult};
use std::any::Any;
use std::sync::Arc;

/// 隐藏实现类型的行为
///
/// 解析结果只保留接口契约，无法再转换回具体实现类型。
pub struct HiddenImplementation {
    delegate: Box<dyn ComponentAdapter>,
    hidden: Arc<ComponentType>,
}

impl HiddenImplementation {
    /// 包装内层适配器，没有可暴露的接口时注册失败
    pub fn new(delegate: Box<dyn ComponentAdapter>) -> DependencyResult<Self> {
        let hidden = delegate.component_type().hidden().ok_or_else(|| {
            DependencyError::registration(
                delegate.component_type().implementation().to_string(),
                "隐藏实现需要至少声明一个接口契约",
            )
        })?;
        Ok(Self {
            delegate,
            hidden: Arc::new(hidden),
        })
    }
}

impl ComponentAdapter for HiddenImplementation {
    fn key(&self) -> &Key {
        self.delegate.key()
    }

    fn component_type(&self) -> &ComponentType {
        &self.hidden
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::HiddenImplementation
    }

    fn resolve(
        &self,
        container: &dyn Container,
        resolution: &mut Resolution,
    ) -> DependencyResult<Instance> {
        let instance = self.delegate.resolve(container, resolution)?;
        Ok(instance.with_component_type(Arc::clone(&self.hidden)))
    }

    fn delegate(&self) -> Option<&dyn ComponentAdapter> {
        Some(self.delegate.as_ref())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
