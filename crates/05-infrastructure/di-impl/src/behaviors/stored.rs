use crate::adapters::{dispose_instance, start_instance, stop_instance, LifecycleFlags};
use dashmap::DashMap;
use di_abstractions::{
    AdapterKind, ComponentAdapter, ComponentLifecycle, ComponentType, Container, Instance, Key,
    LifecycleStrategy, Resolution,
};
use infrastructure_common::DependencyResult;
use parking_lot::RwLock;
use std::any::Any;
use std::sync::Arc;
use tracing::{debug, trace};
use uuid::Uuid;

/// 存储中的一个条目
#[derive(Clone)]
pub struct StoredEntry {
    instance: Instance,
    flags: LifecycleFlags,
}

/// 一个存储作用域的快照
pub type StoreSnapshot = Arc<DashMap<Uuid, StoredEntry>>;

/// 外部存储
///
/// 多个 [`Stored`] 适配器共享同一个存储；`reset` / `restore` 可以在请求之间切换作用域。
#[derive(Default)]
pub struct Store {
    scope: RwLock<StoreSnapshot>,
}

impl Store {
    /// 创建空存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 清空当前作用域，重复调用没有副作用
    pub fn invalidate(&self) {
        self.scope.read().clear();
        debug!("存储已失效");
    }

    /// 换上新的空作用域，返回旧作用域
    pub fn reset(&self) -> StoreSnapshot {
        std::mem::take(&mut *self.scope.write())
    }

    /// 恢复之前的作用域
    pub fn restore(&self, snapshot: StoreSnapshot) {
        *self.scope.write() = snapshot;
    }

    /// 当前作用域
    pub fn snapshot(&self) -> StoreSnapshot {
        Arc::clone(&self.scope.read())
    }

    /// 当前作用域中的条目数
    pub fn len(&self) -> usize {
        self.scope.read().len()
    }

    /// 当前作用域是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, slot: Uuid) -> Option<StoredEntry> {
        self.scope.read().get(&slot).map(|entry| entry.value().clone())
    }

    fn put_if_absent(&self, slot: Uuid, instance: Instance) -> Instance {
        self.scope
            .read()
            .entry(slot)
            .or_insert_with(|| StoredEntry {
                instance,
                flags: LifecycleFlags::default(),
            })
            .instance
            .clone()
    }

    fn set_flags(&self, slot: Uuid, flags: LifecycleFlags) {
        if let Some(mut entry) = self.scope.read().get_mut(&slot) {
            entry.flags = flags;
        }
    }

    fn remove(&self, slot: Uuid) {
        self.scope.read().remove(&slot);
    }
}

fn remove_if_same(scope: &StoreSnapshot, slot: Uuid, instance: &Instance) {
    scope.remove_if(&slot, |_, entry| entry.instance.ptr_eq(instance));
}

/// 把实例保存在外部存储中的行为
pub struct Stored {
    delegate: Box<dyn ComponentAdapter>,
    store: Arc<Store>,
    slot: Uuid,
}

impl Stored {
    /// 包装内层适配器
    pub fn new(delegate: Box<dyn ComponentAdapter>, store: Arc<Store>) -> Self {
        Self {
            delegate,
            store,
            slot: Uuid::new_v4(),
        }
    }

    /// 丢弃当前作用域中本组件的实例，重复调用没有副作用
    pub fn invalidate(&self) {
        self.store.remove(self.slot);
    }

    /// 所属的存储
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// 当前作用域中的实例
    pub fn stored_instance(&self) -> Option<Instance> {
        self.store.get(self.slot).map(|entry| entry.instance)
    }

    fn apply(
        &self,
        container: &dyn Container,
        step: impl FnOnce(
            &dyn Container,
            &dyn ComponentAdapter,
            &Instance,
            LifecycleFlags,
        ) -> DependencyResult<LifecycleFlags>,
    ) -> DependencyResult<()> {
        let Some(entry) = self.store.get(self.slot) else {
            return Ok(());
        };
        let adapter: &dyn ComponentAdapter = self;
        let flags = step(container, adapter, &entry.instance, entry.flags)?;
        self.store.set_flags(self.slot, flags);
        Ok(())
    }
}

impl ComponentAdapter for Stored {
    fn key(&self) -> &Key {
        self.delegate.key()
    }

    fn component_type(&self) -> &ComponentType {
        self.delegate.component_type()
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::Stored
    }

    fn resolve(
        &self,
        container: &dyn Container,
        resolution: &mut Resolution,
    ) -> DependencyResult<Instance> {
        if let Some(instance) = self.stored_instance() {
            trace!("存储命中: {}", self.key());
            return Ok(instance);
        }
        let instance = self.delegate.resolve(container, resolution)?;
        let stored = self.store.put_if_absent(self.slot, instance);
        if resolution.is_populating() {
            let scope = self.store.snapshot();
            let slot = self.slot;
            let partial = stored.clone();
            resolution.on_abort(Box::new(move || remove_if_same(&scope, slot, &partial)));
        }
        Ok(stored)
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

impl ComponentLifecycle for Stored {
    fn start(&self, container: &dyn Container) -> DependencyResult<()> {
        self.apply(container, start_instance)
    }

    /// 停止并释放当前作用域中的实例，然后清除条目
    fn stop(&self, container: &dyn Container) -> DependencyResult<()> {
        self.apply(container, |container, adapter, instance, flags| {
            let flags = stop_instance(container, adapter, instance, flags)?;
            dispose_instance(container, adapter, instance, flags)
        })?;
        self.invalidate();
        Ok(())
    }

    fn dispose(&self, container: &dyn Container) -> DependencyResult<()> {
        self.apply(container, dispose_instance)?;
        self.invalidate();
        Ok(())
    }

    fn component_has_lifecycle(&self, strategy: &dyn LifecycleStrategy) -> bool {
        strategy.has_lifecycle(self.component_type())
    }

    fn instance(&self) -> Option<Instance> {
        self.stored_instance()
    }

    fn is_started(&self) -> bool {
        self.store
            .get(self.slot)
            .is_some_and(|entry| entry.flags.started)
    }

    fn is_disposed(&self) -> bool {
        self.store
            .get(self.slot)
            .is_some_and(|entry| entry.flags.disposed)
    }
}
