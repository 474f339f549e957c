//! 生命周期策略实现
//!
//! - [`NullLifecycleStrategy`] - 没有任何组件具备生命周期
//! - [`StartableLifecycleStrategy`] - 依据 [`Startable`] / [`Disposable`] 契约
//! - [`NamingConventionLifecycleStrategy`] - 依据命名操作
//! - [`CompositeLifecycleStrategy`] - 组合多个策略

use di_abstractions::{ComponentType, Instance, LifecycleStrategy};
use infrastructure_common::{BoxError, Disposable, Startable};
use std::sync::Arc;

/// 空策略
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLifecycleStrategy;

impl LifecycleStrategy for NullLifecycleStrategy {
    fn start(&self, _instance: &Instance) -> Result<(), BoxError> {
        Ok(())
    }

    fn stop(&self, _instance: &Instance) -> Result<(), BoxError> {
        Ok(())
    }

    fn dispose(&self, _instance: &Instance) -> Result<(), BoxError> {
        Ok(())
    }

    fn has_lifecycle(&self, _component_type: &ComponentType) -> bool {
        false
    }
}

/// 基于 [`Startable`] / [`Disposable`] 契约的策略
#[derive(Debug, Clone, Copy, Default)]
pub struct StartableLifecycleStrategy;

impl LifecycleStrategy for StartableLifecycleStrategy {
    fn start(&self, instance: &Instance) -> Result<(), BoxError> {
        match instance.cast::<dyn Startable>() {
            Some(startable) => startable.start(),
            None => Ok(()),
        }
    }

    fn stop(&self, instance: &Instance) -> Result<(), BoxError> {
        match instance.cast::<dyn Startable>() {
            Some(startable) => startable.stop(),
            None => Ok(()),
        }
    }

    fn dispose(&self, instance: &Instance) -> Result<(), BoxError> {
        match instance.cast::<dyn Disposable>() {
            Some(disposable) => disposable.dispose(),
            None => Ok(()),
        }
    }

    fn has_lifecycle(&self, component_type: &ComponentType) -> bool {
        component_type.provides::<dyn Startable>() || component_type.provides::<dyn Disposable>()
    }
}

/// 按操作名称调用生命周期方法的策略
#[derive(Debug, Clone)]
pub struct NamingConventionLifecycleStrategy {
    start: String,
    stop: String,
    dispose: String,
}

impl NamingConventionLifecycleStrategy {
    /// 使用 `start` / `stop` / `dispose`
    pub fn new() -> Self {
        Self::default()
    }

    /// 自定义方法名
    pub fn with_methods(
        mut self,
        start: impl Into<String>,
        stop: impl Into<String>,
        dispose: impl Into<String>,
    ) -> Self {
        self.start = start.into();
        self.stop = stop.into();
        self.dispose = dispose.into();
        self
    }

    fn call(instance: &Instance, name: &str) -> Result<(), BoxError> {
        instance.call_operation(name).unwrap_or(Ok(()))
    }
}

impl Default for NamingConventionLifecycleStrategy {
    fn default() -> Self {
        Self {
            start: "start".to_string(),
            stop: "stop".to_string(),
            dispose: "dispose".to_string(),
        }
    }
}

impl LifecycleStrategy for NamingConventionLifecycleStrategy {
    fn start(&self, instance: &Instance) -> Result<(), BoxError> {
        Self::call(instance, &self.start)
    }

    fn stop(&self, instance: &Instance) -> Result<(), BoxError> {
        Self::call(instance, &self.stop)
    }

    fn dispose(&self, instance: &Instance) -> Result<(), BoxError> {
        Self::call(instance, &self.dispose)
    }

    fn has_lifecycle(&self, component_type: &ComponentType) -> bool {
        [&self.start, &self.stop, &self.dispose]
            .into_iter()
            .any(|name| component_type.has_operation(name))
    }
}

/// 组合策略，按顺序委托给识别该组件的每个策略
#[derive(Clone, Default)]
pub struct CompositeLifecycleStrategy {
    strategies: Vec<Arc<dyn LifecycleStrategy>>,
}

impl CompositeLifecycleStrategy {
    /// 创建组合策略
    pub fn new(strategies: Vec<Arc<dyn LifecycleStrategy>>) -> Self {
        Self { strategies }
    }

    /// 追加策略
    pub fn with_strategy(mut self, strategy: Arc<dyn LifecycleStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    fn each(
        &self,
        instance: &Instance,
        call: impl Fn(&dyn LifecycleStrategy) -> Result<(), BoxError>,
    ) -> Result<(), BoxError> {
        self.strategies
            .iter()
            .filter(|strategy| strategy.has_lifecycle(instance.component_type()))
            .try_for_each(|strategy| call(strategy.as_ref()))
    }
}

impl LifecycleStrategy for CompositeLifecycleStrategy {
    fn start(&self, instance: &Instance) -> Result<(), BoxError> {
        self.each(instance, |strategy| strategy.start(instance))
    }

    fn stop(&self, instance: &Instance) -> Result<(), BoxError> {
        self.each(instance, |strategy| strategy.stop(instance))
    }

    fn dispose(&self, instance: &Instance) -> Result<(), BoxError> {
        self.each(instance, |strategy| strategy.dispose(instance))
    }

    fn has_lifecycle(&self, component_type: &ComponentType) -> bool {
        self.strategies
            .iter()
            .any(|strategy| strategy.has_lifecycle(component_type))
    }
}
