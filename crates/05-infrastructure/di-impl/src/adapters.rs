//! 持有实例的适配器
//!
//! [`InstanceAdapter`] 直接持有注册时提供的实例。
//! 这里的生命周期辅助函数也被缓存类行为复用：每个实例各自记录是否已启动、是否已释放。

use di_abstractions::{
    invoke_lifecycle, AdapterKind, ComponentAdapter, ComponentLifecycle, ComponentType, Container,
    Instance, Key, LifecycleStrategy, Resolution,
};
use infrastructure_common::{DependencyError, DependencyResult, LifecycleOperation};
use parking_lot::Mutex;
use std::any::Any;

/// 单个实例的生命周期标记
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct LifecycleFlags {
    pub(crate) started: bool,
    pub(crate) disposed: bool,
}

/// 启动实例，已启动时跳过，已释放时报错
pub(crate) fn start_instance(
    container: &dyn Container,
    adapter: &dyn ComponentAdapter,
    instance: &Instance,
    flags: LifecycleFlags,
) -> DependencyResult<LifecycleFlags> {
    if flags.disposed {
        return Err(DependencyError::ComponentStateMismatch {
            key: adapter.key().to_string(),
            message: "组件已释放, 无法启动".to_string(),
        });
    }
    if flags.started || !has_lifecycle(container, instance) {
        return Ok(flags);
    }
    invoke_lifecycle(container, adapter, LifecycleOperation::Start, instance)?;
    Ok(LifecycleFlags {
        started: true,
        ..flags
    })
}

/// 停止实例，未启动时跳过
pub(crate) fn stop_instance(
    container: &dyn Container,
    adapter: &dyn ComponentAdapter,
    instance: &Instance,
    flags: LifecycleFlags,
) -> DependencyResult<LifecycleFlags> {
    if !flags.started || !has_lifecycle(container, instance) {
        return Ok(flags);
    }
    invoke_lifecycle(container, adapter, LifecycleOperation::Stop, instance)?;
    Ok(LifecycleFlags {
        started: false,
        ..flags
    })
}

/// 释放实例，已释放时跳过
pub(crate) fn dispose_instance(
    container: &dyn Container,
    adapter: &dyn ComponentAdapter,
    instance: &Instance,
    flags: LifecycleFlags,
) -> DependencyResult<LifecycleFlags> {
    if flags.disposed || !has_lifecycle(container, instance) {
        return Ok(flags);
    }
    invoke_lifecycle(container, adapter, LifecycleOperation::Dispose, instance)?;
    Ok(LifecycleFlags {
        started: false,
        disposed: true,
    })
}

fn has_lifecycle(container: &dyn Container, instance: &Instance) -> bool {
    container
        .lifecycle_strategy()
        .has_lifecycle(instance.component_type())
}

/// 直接持有实例的适配器
pub struct InstanceAdapter {
    key: Key,
    instance: Instance,
    flags: Mutex<LifecycleFlags>,
}

impl InstanceAdapter {
    /// 创建实例适配器
    pub fn new(key: Key, instance: Instance) -> Self {
        Self {
            key,
            instance,
            flags: Mutex::new(LifecycleFlags::default()),
        }
    }
}

impl ComponentAdapter for InstanceAdapter {
    fn key(&self) -> &Key {
        &self.key
    }

    fn component_type(&self) -> &ComponentType {
        self.instance.component_type()
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::Instance
    }

    fn resolve(
        &self,
        _container: &dyn Container,
        _resolution: &mut Resolution,
    ) -> DependencyResult<Instance> {
        Ok(self.instance.clone())
    }

    fn lifecycle(&self) -> Option<&dyn ComponentLifecycle> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ComponentLifecycle for InstanceAdapter {
    fn start(&self, container: &dyn Container) -> DependencyResult<()> {
        let flags = *self.flags.lock();
        let next = start_instance(container, self, &self.instance, flags)?;
        *self.flags.lock() = next;
        Ok(())
    }

    fn stop(&self, container: &dyn Container) -> DependencyResult<()> {
        let flags = *self.flags.lock();
        let next = stop_instance(container, self, &self.instance, flags)?;
        *self.flags.lock() = next;
        Ok(())
    }

    fn dispose(&self, container: &dyn Container) -> DependencyResult<()> {
        let flags = *self.flags.lock();
        let next = dispose_instance(container, self, &self.instance, flags)?;
        *self.flags.lock() = next;
        Ok(())
    }

    fn component_has_lifecycle(&self, strategy: &dyn LifecycleStrategy) -> bool {
        strategy.has_lifecycle(self.instance.component_type())
    }

    fn instance(&self) -> Option<Instance> {
        Some(self.instance.clone())
    }

    fn is_started(&self) -> bool {
        self.flags.lock().started
    }

    fn is_disposed(&self) -> bool {
        self.flags.lock().disposed
    }
}
