//! 生命周期策略抽象
//!
//! 策略负责判断一个组件类型是否具备生命周期，以及如何在实例上执行
//! start / stop / dispose。判断是结构化的：依据组件声明的契约或命名操作，
//! 而不是某个固定的名义类型。

use crate::adapter::ComponentAdapter;
use crate::container::Container;
use crate::instance::{ComponentType, Instance};
use crate::key::Key;
use infrastructure_common::{BoxError, DependencyError, LifecycleOperation};
use std::time::Instant;

/// 生命周期策略
pub trait LifecycleStrategy: Send + Sync {
    /// 启动实例
    fn start(&self, instance: &Instance) -> Result<(), BoxError>;

    /// 停止实例
    fn stop(&self, instance: &Instance) -> Result<(), BoxError>;

    /// 释放实例
    fn dispose(&self, instance: &Instance) -> Result<(), BoxError>;

    /// 组件类型是否具备该策略识别的生命周期
    fn has_lifecycle(&self, component_type: &ComponentType) -> bool;

    /// 按操作分派
    fn invoke(&self, operation: LifecycleOperation, instance: &Instance) -> Result<(), BoxError> {
        match operation {
            LifecycleOperation::Start => self.start(instance),
            LifecycleOperation::Stop => self.stop(instance),
            LifecycleOperation::Dispose => self.dispose(instance),
            LifecycleOperation::Remove => Ok(()),
        }
    }
}

/// 适配器持有的组件级生命周期
///
/// 由持有实例的适配器（缓存、存储、实例适配器）实现，
/// 每个实例单独记录是否已启动、是否已释放。
pub trait ComponentLifecycle: Send + Sync {
    /// 启动当前实例
    fn start(&self, container: &dyn Container) -> Result<(), DependencyError>;

    /// 停止当前实例
    fn stop(&self, container: &dyn Container) -> Result<(), DependencyError>;

    /// 释放当前实例
    fn dispose(&self, container: &dyn Container) -> Result<(), DependencyError>;

    /// 组件是否具备生命周期
    fn component_has_lifecycle(&self, strategy: &dyn LifecycleStrategy) -> bool;

    /// 当前持有的实例
    fn instance(&self) -> Option<Instance>;

    /// 是否已有实例
    fn has_instance(&self) -> bool {
        self.instance().is_some()
    }

    /// 当前实例是否已启动
    fn is_started(&self) -> bool;

    /// 当前实例是否已释放
    fn is_disposed(&self) -> bool;
}

/// 在实例上执行一次生命周期调用并通知监视器
///
/// 失败会被包装为 [`DependencyError::LifecycleInvocationFailed`] 交给监视器，
/// 监视器返回 `Err` 时中止遍历，返回 `Ok` 时表示失败已被记录。
pub fn invoke_lifecycle(
    container: &dyn Container,
    adapter: &dyn ComponentAdapter,
    operation: LifecycleOperation,
    instance: &Instance,
) -> Result<(), DependencyError> {
    let key: &Key = adapter.key();
    let strategy = container.lifecycle_strategy();
    let monitor = container.current_monitor();

    monitor.invoking(container, key, operation.as_str(), instance);
    let started = Instant::now();
    match instance.dispatch(|| strategy.invoke(operation, instance)) {
        Ok(()) => {
            monitor.invoked(container, key, operation.as_str(), instance, started.elapsed());
            Ok(())
        }
        Err(source) => {
            let failure = DependencyError::LifecycleInvocationFailed {
                key: key.to_string(),
                operation,
                instance: instance.describe(),
                source,
            };
            monitor.lifecycle_invocation_failed(container, key, operation, instance, failure)
        }
    }
}
