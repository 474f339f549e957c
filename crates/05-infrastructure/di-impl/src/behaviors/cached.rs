use crate::adapters::{dispose_instance, start_instance, stop_instance, LifecycleFlags};
use di_abstractions::{
    AdapterKind, ComponentAdapter, ComponentLifecycle, ComponentType, Container, Instance, Key,
    LifecycleStrategy, Resolution,
};
use infrastructure_common::DependencyResult;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::sync::Arc;
use tracing::trace;

/// 缓存首次解析结果的行为
///
/// 缓存本身不加锁，并发的首次解析可能各自构造，最先写入的实例胜出。
/// 写入时仍有延迟填充未完成的实例，在本次解析失败时被移出缓存。
pub struct Cached {
    delegate: Box<dyn ComponentAdapter>,
    slot: Arc<RwLock<Option<Instance>>>,
    flags: Mutex<LifecycleFlags>,
}

impl Cached {
    /// 包装内层适配器
    pub fn new(delegate: Box<dyn ComponentAdapter>) -> Self {
        Self {
            delegate,
            slot: Arc::new(RwLock::new(None)),
            flags: Mutex::new(LifecycleFlags::default()),
        }
    }

    /// 是否已缓存实例
    pub fn is_cached(&self) -> bool {
        self.slot.read().is_some()
    }

    /// 当前缓存的实例
    pub fn cached_instance(&self) -> Option<Instance> {
        self.slot.read().clone()
    }

    /// 按实例状态停止、释放后清空缓存
    pub fn flush(&self, container: &dyn Container) -> DependencyResult<()> {
        let Some(instance) = self.cached_instance() else {
            return Ok(());
        };
        let flags = *self.flags.lock();
        let flags = stop_instance(container, self, &instance, flags)?;
        dispose_instance(container, self, &instance, flags)?;
        *self.slot.write() = None;
        *self.flags.lock() = LifecycleFlags::default();
        Ok(())
    }
}

impl ComponentAdapter for Cached {
    fn key(&self) -> &Key {
        self.delegate.key()
    }

    fn component_type(&self) -> &ComponentType {
        self.delegate.component_type()
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::Cached
    }

    fn resolve(
        &self,
        container: &dyn Container,
        resolution: &mut Resolution,
    ) -> DependencyResult<Instance> {
        if let Some(instance) = self.cached_instance() {
            trace!("缓存命中: {}", self.key());
            return Ok(instance);
        }
        let instance = self.delegate.resolve(container, resolution)?;
        let cached = self.slot.write().get_or_insert(instance).clone();
        if resolution.is_populating() {
            let slot = Arc::clone(&self.slot);
            let key = self.key().clone();
            let partial = cached.clone();
            resolution.on_abort(Box::new(move || {
                let mut slot = slot.write();
                if slot.as_ref().is_some_and(|held| held.ptr_eq(&partial)) {
                    trace!("移除未填充完成的缓存实例: {}", key);
                    *slot = None;
                }
            }));
        }
        Ok(cached)
    }

    fn delegate(&self) -> Option<&dyn ComponentAdapter> {
        Some(self.delegate.as_ref())
    }

    fn lifecycle(&self) -> Option<&dyn ComponentLifecycle> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ComponentLifecycle for Cached {
    fn start(&self, container: &dyn Container) -> DependencyResult<()> {
        let Some(instance) = self.cached_instance() else {
            return Ok(());
        };
        let flags = *self.flags.lock();
        let next = start_instance(container, self, &instance, flags)?;
        *self.flags.lock() = next;
        Ok(())
    }

    fn stop(&self, container: &dyn Container) -> DependencyResult<()> {
        let Some(instance) = self.cached_instance() else {
            return Ok(());
        };
        let flags = *self.flags.lock();
        let next = stop_instance(container, self, &instance, flags)?;
        *self.flags.lock() = next;
        Ok(())
    }

    fn dispose(&self, container: &dyn Container) -> DependencyResult<()> {
        let Some(instance) = self.cached_instance() else {
            return Ok(());
        };
        let flags = *self.flags.lock();
        let next = dispose_instance(container, self, &instance, flags)?;
        *self.flags.lock() = next;
        Ok(())
    }

    fn component_has_lifecycle(&self, strategy: &dyn LifecycleStrategy) -> bool {
        strategy.has_lifecycle(self.component_type())
    }

    fn instance(&self) -> Option<Instance> {
        self.cached_instance()
    }

    fn is_started(&self) -> bool {
        self.flags.lock().started
    }

    fn is_disposed(&self) -> bool {
        self.flags.lock().disposed
    }
}
