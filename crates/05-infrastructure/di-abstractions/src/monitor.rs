//! 组件监视器抽象
//!
//! 每一次构造、成员调用和生命周期调用都会经过容器当前的监视器。
//! 监视器只能观察结果，唯一可以改变行为的钩子是 [`ComponentMonitor::instantiating`]，
//! 它可以在构造前替换构造函数。

use crate::adapter::ComponentAdapter;
use crate::container::Container;
use crate::instance::Instance;
use crate::key::Key;
use crate::recipe::Constructor;
use infrastructure_common::{DependencyError, LifecycleOperation};
use std::error::Error;
use std::time::Duration;

/// 组件监视器
pub trait ComponentMonitor: Send + Sync {
    /// 即将构造组件，可以返回替换的构造函数
    fn instantiating(
        &self,
        _container: &dyn Container,
        _adapter: &dyn ComponentAdapter,
        _constructor: &Constructor,
    ) -> Option<Constructor> {
        None
    }

    /// 组件构造成功
    fn instantiated(
        &self,
        _container: &dyn Container,
        _adapter: &dyn ComponentAdapter,
        _constructor: &Constructor,
        _instance: &Instance,
        _duration: Duration,
    ) {
    }

    /// 组件构造失败，错误随后会向调用方传播
    fn instantiation_failed(
        &self,
        _container: &dyn Container,
        _adapter: &dyn ComponentAdapter,
        _constructor: &Constructor,
        _cause: &(dyn Error + Send + Sync + 'static),
    ) {
    }

    /// 即将调用成员
    fn invoking(&self, _container: &dyn Container, _key: &Key, _member: &str, _instance: &Instance) {}

    /// 成员调用成功
    fn invoked(
        &self,
        _container: &dyn Container,
        _key: &Key,
        _member: &str,
        _instance: &Instance,
        _duration: Duration,
    ) {
    }

    /// 成员调用失败
    fn invocation_failed(
        &self,
        _container: &dyn Container,
        _key: &Key,
        _member: &str,
        _instance: &Instance,
        _cause: &(dyn Error + Send + Sync + 'static),
    ) {
    }

    /// 生命周期调用失败
    ///
    /// 默认把错误原样返回，中止当前的生命周期遍历。
    fn lifecycle_invocation_failed(
        &self,
        _container: &dyn Container,
        _key: &Key,
        _operation: LifecycleOperation,
        _instance: &Instance,
        failure: DependencyError,
    ) -> Result<(), DependencyError> {
        Err(failure)
    }

    /// 容器中找不到组件时调用，可以提供一个替代实例
    fn no_component_found(&self, _key: &Key) -> Option<Instance> {
        None
    }

    /// 取走遍历期间记录的生命周期失败
    fn take_lifecycle_failures(&self) -> Vec<DependencyError> {
        Vec::new()
    }
}
