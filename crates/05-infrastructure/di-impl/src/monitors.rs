//! 组件监视器实现

use di_abstractions::{ComponentAdapter, ComponentMonitor, Constructor, Container, Instance, Key};
use infrastructure_common::{DependencyError, LifecycleOperation};
use parking_lot::Mutex;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 不做任何事的监视器
#[derive(Debug, Clone, Copy, Default)]
pub struct NullComponentMonitor;

impl ComponentMonitor for NullComponentMonitor {}

/// 把事件写入 tracing 日志后交给内层监视器
pub struct TracingComponentMonitor {
    delegate: Arc<dyn ComponentMonitor>,
}

impl TracingComponentMonitor {
    /// 以空监视器为内层
    pub fn new() -> Self {
        Self {
            delegate: Arc::new(NullComponentMonitor),
        }
    }

    /// 设置内层监视器
    pub fn with_delegate(mut self, delegate: Arc<dyn ComponentMonitor>) -> Self {
        self.delegate = delegate;
        self
    }
}

impl Default for TracingComponentMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentMonitor for TracingComponentMonitor {
    fn instantiating(
        &self,
        container: &dyn Container,
        adapter: &dyn ComponentAdapter,
        constructor: &Constructor,
    ) -> Option<Constructor> {
        debug!(
            container = container.name(),
            "正在构造 {}: {}",
            adapter.key(),
            constructor
        );
        self.delegate.instantiating(container, adapter, constructor)
    }

    fn instantiated(
        &self,
        container: &dyn Container,
        adapter: &dyn ComponentAdapter,
        constructor: &Constructor,
        instance: &Instance,
        duration: Duration,
    ) {
        info!(
            container = container.name(),
            "构造完成 {}: {}, 耗时 {:?}",
            adapter.key(),
            instance.describe(),
            duration
        );
        self.delegate
            .instantiated(container, adapter, constructor, instance, duration);
    }

    fn instantiation_failed(
        &self,
        container: &dyn Container,
        adapter: &dyn ComponentAdapter,
        constructor: &Constructor,
        cause: &(dyn Error + Send + Sync + 'static),
    ) {
        warn!(
            container = container.name(),
            "构造失败 {}: {}, 原因: {}",
            adapter.key(),
            constructor,
            cause
        );
        self.delegate
            .instantiation_failed(container, adapter, constructor, cause);
    }

    fn invoking(&self, container: &dyn Container, key: &Key, member: &str, instance: &Instance) {
        debug!(container = container.name(), "正在调用 {}::{}", key, member);
        self.delegate.invoking(container, key, member, instance);
    }

    fn invoked(
        &self,
        container: &dyn Container,
        key: &Key,
        member: &str,
        instance: &Instance,
        duration: Duration,
    ) {
        debug!(
            container = container.name(),
            "调用完成 {}::{}, 耗时 {:?}",
            key,
            member,
            duration
        );
        self.delegate
            .invoked(container, key, member, instance, duration);
    }

    fn invocation_failed(
        &self,
        container: &dyn Container,
        key: &Key,
        member: &str,
        instance: &Instance,
        cause: &(dyn Error + Send + Sync + 'static),
    ) {
        warn!(
            container = container.name(),
            "调用失败 {}::{}, 原因: {}",
            key,
            member,
            cause
        );
        self.delegate
            .invocation_failed(container, key, member, instance, cause);
    }

    fn lifecycle_invocation_failed(
        &self,
        container: &dyn Container,
        key: &Key,
        operation: LifecycleOperation,
        instance: &Instance,
        failure: DependencyError,
    ) -> Result<(), DependencyError> {
        warn!(container = container.name(), "{}", failure);
        self.delegate
            .lifecycle_invocation_failed(container, key, operation, instance, failure)
    }

    fn no_component_found(&self, key: &Key) -> Option<Instance> {
        debug!("未找到组件: {}", key);
        self.delegate.no_component_found(key)
    }

    fn take_lifecycle_failures(&self) -> Vec<DependencyError> {
        self.delegate.take_lifecycle_failures()
    }
}

/// 记录生命周期失败而不中止遍历的监视器
///
/// 遍历结束后容器通过 [`ComponentMonitor::take_lifecycle_failures`] 取走失败，
/// 汇总为 [`DependencyError::LifecycleFailures`]。其他事件交给内层监视器。
pub struct LifecycleComponentMonitor {
    delegate: Arc<dyn ComponentMonitor>,
    failures: Mutex<Vec<DependencyError>>,
}

impl LifecycleComponentMonitor {
    /// 以空监视器为内层
    pub fn new() -> Self {
        Self {
            delegate: Arc::new(NullComponentMonitor),
            failures: Mutex::new(Vec::new()),
        }
    }

    /// 设置内层监视器
    pub fn with_delegate(mut self, delegate: Arc<dyn ComponentMonitor>) -> Self {
        self.delegate = delegate;
        self
    }

    /// 已记录的失败数
    pub fn failure_count(&self) -> usize {
        self.failures.lock().len()
    }

    /// 存在记录的失败时取走并返回汇总错误
    pub fn rethrow_lifecycle_failures(&self) -> Result<(), DependencyError> {
        let failures = std::mem::take(&mut *self.failures.lock());
        if failures.is_empty() {
            Ok(())
        } else {
            Err(DependencyError::LifecycleFailures { failures })
        }
    }
}

impl Default for LifecycleComponentMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentMonitor for LifecycleComponentMonitor {
    fn instantiating(
        &self,
        container: &dyn Container,
        adapter: &dyn ComponentAdapter,
        constructor: &Constructor,
    ) -> Option<Constructor> {
        self.delegate.instantiating(container, adapter, constructor)
    }

    fn instantiated(
        &self,
        container: &dyn Container,
        adapter: &dyn ComponentAdapter,
        constructor: &Constructor,
        instance: &Instance,
        duration: Duration,
    ) {
        self.delegate
            .instantiated(container, adapter, constructor, instance, duration);
    }

    fn instantiation_failed(
        &self,
        container: &dyn Container,
        adapter: &dyn ComponentAdapter,
        constructor: &Constructor,
        cause: &(dyn Error + Send + Sync + 'static),
    ) {
        self.delegate
            .instantiation_failed(container, adapter, constructor, cause);
    }

    fn invoking(&self, container: &dyn Container, key: &Key, member: &str, instance: &Instance) {
        self.delegate.invoking(container, key, member, instance);
    }

    fn invoked(
        &self,
        container: &dyn Container,
        key: &Key,
        member: &str,
        instance: &Instance,
        duration: Duration,
    ) {
        self.delegate
            .invoked(container, key, member, instance, duration);
    }

    fn invocation_failed(
        &self,
        container: &dyn Container,
        key: &Key,
        member: &str,
        instance: &Instance,
        cause: &(dyn Error + Send + Sync + 'static),
    ) {
        self.delegate
            .invocation_failed(container, key, member, instance, cause);
    }

    fn lifecycle_invocation_failed(
        &self,
        _container: &dyn Container,
        key: &Key,
        operation: LifecycleOperation,
        _instance: &Instance,
        failure: DependencyError,
    ) -> Result<(), DependencyError> {
        warn!("记录生命周期失败 {} ({}): {}", key, operation, failure);
        self.failures.lock().push(failure);
        Ok(())
    }

    fn no_component_found(&self, key: &Key) -> Option<Instance> {
        self.delegate.no_component_found(key)
    }

    fn take_lifecycle_failures(&self) -> Vec<DependencyError> {
        let mut failures = std::mem::take(&mut *self.failures.lock());
        failures.extend(self.delegate.take_lifecycle_failures());
        failures
    }
}
