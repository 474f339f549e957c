use di_abstractions::{
    AdapterKind, ComponentAdapter, ComponentType, Container, DispatchLock, Instance, Key,
    Resolution,
};
use infrastructure_common::DependencyResult;
use parking_lot::ReentrantMutex;
use std::any::Any;
use std::sync::Arc;

/// 同步构造和方法分派的行为
///
/// 同一把可重入锁既包住解析，也作为分派锁附加到实例上，
/// 经由 `invoke` 或 [`Instance::dispatch`] 的调用因此串行执行。
pub struct Synchronized {
    delegate: Box<dyn ComponentAdapter>,
    lock: DispatchLock,
}

impl Synchronized {
    /// 包装内层适配器
    pub fn new(delegate: Box<dyn ComponentAdapter>) -> Self {
        Self {
            delegate,
            lock: Arc::new(ReentrantMutex::new(())),
        }
    }

    /// 分派锁
    pub fn dispatch_lock(&self) -> &DispatchLock {
        &self.lock
    }
}

impl ComponentAdapter for Synchronized {
    fn key(&self) -> &Key {
        self.delegate.key()
    }

    fn component_type(&self) -> &ComponentType {
        self.delegate.component_type()
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::Synchronized
    }

    fn resolve(
        &self,
        container: &dyn Container,
        resolution: &mut Resolution,
    ) -> DependencyResult<Instance> {
        let _guard = self.lock.lock();
        let instance = self.delegate.resolve(container, resolution)?;
        Ok(instance.with_dispatch_lock(Arc::clone(&self.lock)))
    }

    fn delegate(&self) -> Option<&dyn ComponentAdapter> {
        Some(self.delegate.as_ref())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// 只在解析期间加锁的行为
pub struct Locked {
    delegate: Box<dyn ComponentAdapter>,
    lock: ReentrantMutex<()>,
}

impl Locked {
    /// 包装内层适配器
    pub fn new(delegate: Box<dyn ComponentAdapter>) -> Self {
        Self {
            delegate,
            lock: ReentrantMutex::new(()),
        }
    }
}

impl ComponentAdapter for Locked {
    fn key(&self) -> &Key {
        self.delegate.key()
    }

    fn component_type(&self) -> &ComponentType {
        self.delegate.component_type()
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::Locked
    }

    fn resolve(
        &self,
        container: &dyn Container,
        resolution: &mut Resolution,
    ) -> DependencyResult<Instance> {
        let _guard = self.lock.lock();
        self.delegate.resolve(container, resolution)
    }

    fn delegate(&self) -> Option<&dyn ComponentAdapter> {
        Some(self.delegate.as_ref())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
