use crate::adapters::{dispose_instance, start_instance, stop_instance, LifecycleFlags};
use dashmap::DashMap;
use di_abstractions::{
    AdapterKind, ComponentAdapter, ComponentLifecycle, ComponentType, Container, Instance, Key,
    LifecycleStrategy, Resolution,
};
use infrastructure_common::DependencyResult;
use parking_lot::Mutex;
use std::any::Any;
use std::cell::RefCell;
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use tracing::{debug, trace};

#[derive(Clone)]
struct ThreadSlot {
    instance: Instance,
    flags: LifecycleFlags,
}

type Slots = DashMap<ThreadId, ThreadSlot>;

/// 线程结束时从各个适配器中移除本线程的条目
struct ExitHooks {
    thread: ThreadId,
    watched: Vec<Weak<Slots>>,
}

impl ExitHooks {
    fn watch(&mut self, slots: &Arc<Slots>) {
        self.watched.retain(|watched| watched.strong_count() > 0);
        self.watched.push(Arc::downgrade(slots));
    }
}

impl Drop for ExitHooks {
    fn drop(&mut self) {
        for slots in self.watched.drain(..) {
            if let Some(slots) = slots.upgrade() {
                slots.remove(&self.thread);
            }
        }
    }
}

thread_local! {
    static EXIT_HOOKS: RefCell<ExitHooks> = RefCell::new(ExitHooks {
        thread: thread::current().id(),
        watched: Vec::new(),
    });
}

/// 每个线程缓存一个实例的行为
///
/// 线程结束时它的实例随之从缓存中移除，不经过停止和释放。
/// 生命周期调用作用于所有仍存活线程的实例；`dispose` 之后缓存被清空。
pub struct ThreadLocalized {
    delegate: Box<dyn ComponentAdapter>,
    slots: Arc<Slots>,
    disposed: Mutex<bool>,
}

impl ThreadLocalized {
    /// 包装内层适配器
    pub fn new(delegate: Box<dyn ComponentAdapter>) -> Self {
        Self {
            delegate,
            slots: Arc::new(DashMap::new()),
            disposed: Mutex::new(false),
        }
    }

    /// 当前线程的实例
    pub fn current_instance(&self) -> Option<Instance> {
        self.slots
            .get(&thread::current().id())
            .map(|entry| entry.instance.clone())
    }

    /// 已创建实例且仍存活的线程数
    pub fn thread_count(&self) -> usize {
        self.slots.len()
    }

    /// 停止、释放所有线程的实例后清空缓存
    pub fn flush(&self, container: &dyn Container) -> DependencyResult<()> {
        self.for_each_slot(|adapter, slot| {
            let flags = stop_instance(container, adapter, &slot.instance, slot.flags)?;
            dispose_instance(container, adapter, &slot.instance, flags)
        })?;
        self.slots.clear();
        debug!("线程局部缓存已清空: {}", self.key());
        Ok(())
    }

    fn store(&self, instance: Instance, resolution: &mut Resolution) -> Instance {
        let thread = thread::current().id();
        let mut inserted = false;
        let stored = self
            .slots
            .entry(thread)
            .or_insert_with(|| {
                inserted = true;
                ThreadSlot {
                    instance,
                    flags: LifecycleFlags::default(),
                }
            })
            .instance
            .clone();
        if !inserted {
            return stored;
        }

        // 线程正在退出时无法登记，条目留待 flush 或 dispose 清理
        let _ = EXIT_HOOKS.try_with(|hooks| hooks.borrow_mut().watch(&self.slots));
        if resolution.is_populating() {
            let slots = Arc::downgrade(&self.slots);
            let partial = stored.clone();
            resolution.on_abort(Box::new(move || {
                if let Some(slots) = slots.upgrade() {
                    slots.remove_if(&thread, |_, slot| slot.instance.ptr_eq(&partial));
                }
            }));
        }
        stored
    }

    fn for_each_slot(
        &self,
        step: impl Fn(&dyn ComponentAdapter, &ThreadSlot) -> DependencyResult<LifecycleFlags>,
    ) -> DependencyResult<()> {
        let threads: Vec<ThreadId> = self.slots.iter().map(|entry| *entry.key()).collect();
        for thread in threads {
            // 不在持有分片锁时回调组件
            let Some(slot) = self.slots.get(&thread).map(|entry| entry.value().clone()) else {
                continue;
            };
            let flags = step(self, &slot)?;
            if let Some(mut entry) = self.slots.get_mut(&thread) {
                entry.flags = flags;
            }
        }
        Ok(())
    }
}

impl ComponentAdapter for ThreadLocalized {
    fn key(&self) -> &Key {
        self.delegate.key()
    }

    fn component_type(&self) -> &ComponentType {
        self.delegate.component_type()
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::ThreadLocalized
    }

    fn resolve(
        &self,
        container: &dyn Container,
        resolution: &mut Resolution,
    ) -> DependencyResult<Instance> {
        if let Some(instance) = self.current_instance() {
            trace!("线程局部缓存命中: {}", self.key());
            return Ok(instance);
        }
        let instance = self.delegate.resolve(container, resolution)?;
        Ok(self.store(instance, resolution))
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

impl ComponentLifecycle for ThreadLocalized {
    fn start(&self, container: &dyn Container) -> DependencyResult<()> {
        self.for_each_slot(|adapter, slot| {
            start_instance(container, adapter, &slot.instance, slot.flags)
        })
    }

    fn stop(&self, container: &dyn Container) -> DependencyResult<()> {
        self.for_each_slot(|adapter, slot| {
            stop_instance(container, adapter, &slot.instance, slot.flags)
        })
    }

    fn dispose(&self, container: &dyn Container) -> DependencyResult<()> {
        self.for_each_slot(|adapter, slot| {
            dispose_instance(container, adapter, &slot.instance, slot.flags)
        })?;
        self.slots.clear();
        *self.disposed.lock() = true;
        Ok(())
    }

    fn component_has_lifecycle(&self, strategy: &dyn LifecycleStrategy) -> bool {
        strategy.has_lifecycle(self.component_type())
    }

    /// 当前线程的实例
    fn instance(&self) -> Option<Instance> {
        self.current_instance()
    }

    fn has_instance(&self) -> bool {
        !self.slots.is_empty()
    }

    fn is_started(&self) -> bool {
        self.slots.iter().any(|entry| entry.flags.started)
    }

    fn is_disposed(&self) -> bool {
        *self.disposed.lock()
    }
}
