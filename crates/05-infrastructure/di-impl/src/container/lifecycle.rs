//! 容器生命周期遍历

use super::DefaultContainer;
use di_abstractions::{ChildOrder, ComponentAdapter, Container, MutableContainer};
use infrastructure_common::{DependencyError, DependencyResult, LifecycleOperation, LifecycleState};
use std::sync::Arc;
use tracing::{debug, info, warn};

type Failures = Vec<DependencyError>;

/// 子容器返回的批量失败并入当前遍历，其他错误中止遍历
fn absorb(result: DependencyResult<()>, failures: &mut Failures) -> DependencyResult<()> {
    match result {
        Err(DependencyError::LifecycleFailures { failures: nested }) => {
            failures.extend(nested);
            Ok(())
        }
        other => other,
    }
}

impl DefaultContainer {
    /// 执行一次状态转换
    ///
    /// 无论遍历是否成功，状态都会推进到目标状态。
    pub(super) fn transition(
        &self,
        operation: LifecycleOperation,
        walk: fn(&Self, &mut Failures) -> DependencyResult<()>,
    ) -> DependencyResult<()> {
        {
            let mut state = self.state.lock();
            *state = state.begin(operation)?;
        }
        info!(container = %self.name, "容器开始 {}", operation);

        let mut failures = Failures::new();
        let outcome = walk(self, &mut failures);
        failures.extend(self.current_monitor().take_lifecycle_failures());

        let reached = {
            let mut state = self.state.lock();
            *state = state.complete();
            *state
        };

        outcome?;
        if failures.is_empty() {
            info!(container = %self.name, "容器已进入 {} 状态", reached);
            Ok(())
        } else {
            warn!(
                container = %self.name,
                "容器 {} 过程中有 {} 个生命周期调用失败",
                operation,
                failures.len()
            );
            Err(DependencyError::LifecycleFailures { failures })
        }
    }

    pub(super) fn start_walk(&self, failures: &mut Failures) -> DependencyResult<()> {
        let adapters = self.component_adapters();
        let children = self.children();
        match self.config.child_order {
            ChildOrder::ChildrenLast => {
                self.start_adapters(&adapters)?;
                self.start_children(&children, failures)
            }
            ChildOrder::ChildrenFirst => {
                self.start_children(&children, failures)?;
                self.start_adapters(&adapters)
            }
        }
    }

    pub(super) fn stop_walk(&self, failures: &mut Failures) -> DependencyResult<()> {
        let adapters = self.component_adapters();
        let children = self.children();
        match self.config.child_order {
            ChildOrder::ChildrenLast => {
                self.stop_children(&children, failures)?;
                self.stop_adapters(&adapters)
            }
            ChildOrder::ChildrenFirst => {
                self.stop_adapters(&adapters)?;
                self.stop_children(&children, failures)
            }
        }
    }

    pub(super) fn dispose_walk(&self, failures: &mut Failures) -> DependencyResult<()> {
        let adapters = self.component_adapters();
        let children = self.children();
        match self.config.child_order {
            ChildOrder::ChildrenLast => {
                self.dispose_children(&children, failures)?;
                self.dispose_adapters(&adapters)
            }
            ChildOrder::ChildrenFirst => {
                self.dispose_adapters(&adapters)?;
                self.dispose_children(&children, failures)
            }
        }
    }

    /// 启动单个适配器
    ///
    /// 自动组件会先被解析；开启 `instantiate_on_start` 时，
    /// 具备生命周期但尚无实例的组件也会先被解析。
    pub(super) fn start_adapter(&self, adapter: &Arc<dyn ComponentAdapter>) -> DependencyResult<()> {
        if self.needs_instance(adapter) {
            debug!(container = %self.name, "启动前解析组件: {}", adapter.key());
            let mut resolution = self.new_resolution();
            self.resolve_adapter(adapter, &mut resolution)?;
            resolution.complete()?;
        }
        match adapter.lifecycle() {
            Some(lifecycle) if lifecycle.has_instance() => lifecycle.start(self),
            _ => Ok(()),
        }
    }

    fn needs_instance(&self, adapter: &Arc<dyn ComponentAdapter>) -> bool {
        if adapter.is_automatic() {
            return true;
        }
        self.config.instantiate_on_start
            && adapter.lifecycle().is_some_and(|lifecycle| {
                !lifecycle.has_instance()
                    && lifecycle.component_has_lifecycle(self.lifecycle_strategy.as_ref())
            })
    }

    fn start_adapters(&self, adapters: &[Arc<dyn ComponentAdapter>]) -> DependencyResult<()> {
        adapters
            .iter()
            .try_for_each(|adapter| self.start_adapter(adapter))
    }

    fn stop_adapters(&self, adapters: &[Arc<dyn ComponentAdapter>]) -> DependencyResult<()> {
        for adapter in adapters.iter().rev() {
            if let Some(lifecycle) = adapter.lifecycle() {
                if lifecycle.has_instance() {
                    lifecycle.stop(self)?;
                }
            }
        }
        Ok(())
    }

    fn dispose_adapters(&self, adapters: &[Arc<dyn ComponentAdapter>]) -> DependencyResult<()> {
        for adapter in adapters.iter().rev() {
            if let Some(lifecycle) = adapter.lifecycle() {
                if lifecycle.has_instance() {
                    lifecycle.dispose(self)?;
                }
            }
        }
        Ok(())
    }

    /// 子容器共用监视器时只汇总自己遍历产生的失败
    fn collect_recorded(&self, failures: &mut Failures) {
        failures.extend(self.current_monitor().take_lifecycle_failures());
    }

    fn start_children(
        &self,
        children: &[Arc<dyn MutableContainer>],
        failures: &mut Failures,
    ) -> DependencyResult<()> {
        self.collect_recorded(failures);
        for child in children {
            if !matches!(
                child.lifecycle_state(),
                LifecycleState::Constructed | LifecycleState::Stopped
            ) {
                continue;
            }
            let result = child.start();
            self.started_children.lock().insert(child.id());
            absorb(result, failures)?;
        }
        Ok(())
    }

    fn stop_children(
        &self,
        children: &[Arc<dyn MutableContainer>],
        failures: &mut Failures,
    ) -> DependencyResult<()> {
        self.collect_recorded(failures);
        let started = std::mem::take(&mut *self.started_children.lock());
        for child in children.iter().rev() {
            if started.contains(&child.id()) && child.lifecycle_state().is_started() {
                absorb(child.stop(), failures)?;
            }
        }
        Ok(())
    }

    fn dispose_children(
        &self,
        children: &[Arc<dyn MutableContainer>],
        failures: &mut Failures,
    ) -> DependencyResult<()> {
        self.collect_recorded(failures);
        for child in children.iter().rev() {
            if matches!(
                child.lifecycle_state(),
                LifecycleState::Constructed | LifecycleState::Stopped
            ) {
                absorb(child.dispose(), failures)?;
            }
        }
        Ok(())
    }
}
