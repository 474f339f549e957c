//! 组件适配器抽象
//!
//! 适配器为一个键提供实例。行为适配器通过 [`ComponentAdapter::delegate`]
//! 包装内层适配器，形成一条以注入器或实例适配器结尾的链。

use crate::characteristics::InjectionType;
use crate::container::Container;
use crate::instance::{ComponentType, Instance};
use crate::key::Key;
use crate::lifecycle::ComponentLifecycle;
use crate::resolver::Resolution;
use infrastructure_common::DependencyError;
use std::any::Any;
use std::fmt;

/// 适配器种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterKind {
    /// 直接持有实例
    Instance,
    /// 按配方构造
    Injector(InjectionType),
    /// 由提供函数产出
    Provider,
    /// 缓存实例
    Cached,
    /// 在外部存储中保存实例
    Stored,
    /// 每个线程一个实例
    ThreadLocalized,
    /// 隐藏实现类型
    HiddenImplementation,
    /// 同步构造和方法分派
    Synchronized,
    /// 构造期间加锁
    Locked,
    /// 自动参与生命周期
    Automated,
    /// 扩展适配器
    Custom(&'static str),
}

impl AdapterKind {
    /// 是否为注入器，提供者也算作注入器
    pub fn is_injector(self) -> bool {
        matches!(self, Self::Injector(_) | Self::Provider)
    }
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instance => f.write_str("Instance"),
            Self::Injector(injection) => write!(f, "{injection:?}Injector"),
            Self::Provider => f.write_str("Provider"),
            Self::Cached => f.write_str("Cached"),
            Self::Stored => f.write_str("Stored"),
            Self::ThreadLocalized => f.write_str("ThreadLocalized"),
            Self::HiddenImplementation => f.write_str("HiddenImplementation"),
            Self::Synchronized => f.write_str("Synchronized"),
            Self::Locked => f.write_str("Locked"),
            Self::Automated => f.write_str("Automated"),
            Self::Custom(name) => f.write_str(name),
        }
    }
}

/// 组件适配器
pub trait ComponentAdapter: Send + Sync {
    /// 注册键
    fn key(&self) -> &Key;

    /// 对外暴露的组件类型
    fn component_type(&self) -> &ComponentType;

    /// 适配器种类
    fn kind(&self) -> AdapterKind;

    /// 在给定容器中解析实例
    fn resolve(
        &self,
        container: &dyn Container,
        resolution: &mut Resolution,
    ) -> Result<Instance, DependencyError>;

    /// 被包装的内层适配器
    fn delegate(&self) -> Option<&dyn ComponentAdapter> {
        None
    }

    /// 在不构造实例的前提下校验依赖是否可满足
    fn verify(&self, container: &dyn Container) -> Result<(), DependencyError> {
        match self.delegate() {
            Some(inner) => inner.verify(container),
            None => Ok(()),
        }
    }

    /// 构造时会用到的依赖键
    fn dependencies(&self, container: &dyn Container) -> Result<Vec<Key>, DependencyError> {
        match self.delegate() {
            Some(inner) => inner.dependencies(container),
            None => Ok(Vec::new()),
        }
    }

    /// 链上最外层的组件生命周期
    fn lifecycle(&self) -> Option<&dyn ComponentLifecycle> {
        self.delegate().and_then(|inner| inner.lifecycle())
    }

    /// 用于按具体类型查找
    fn as_any(&self) -> &dyn Any;
}

impl<'a> dyn ComponentAdapter + 'a {
    /// 从当前适配器开始遍历整条链
    pub fn chain(&self) -> AdapterChain<'_> {
        AdapterChain { next: Some(self) }
    }

    /// 查找链上第一个指定种类的适配器
    pub fn find_adapter_of_kind(&self, kind: AdapterKind) -> Option<&dyn ComponentAdapter> {
        self.chain().find(|adapter| adapter.kind() == kind)
    }

    /// 查找链上第一个指定具体类型的适配器
    pub fn find_adapter_of_type<A: ComponentAdapter + 'static>(&self) -> Option<&A> {
        self.chain()
            .find_map(|adapter| adapter.as_any().downcast_ref::<A>())
    }

    /// 链末端的注入器
    pub fn injector(&self) -> Option<&dyn ComponentAdapter> {
        self.chain().find(|adapter| adapter.kind().is_injector())
    }

    /// 是否带有自动生命周期
    pub fn is_automatic(&self) -> bool {
        self.find_adapter_of_kind(AdapterKind::Automated).is_some()
    }

    /// 由外到内的种类列表
    pub fn describe(&self) -> String {
        let kinds = self
            .chain()
            .map(|adapter| adapter.kind().to_string())
            .collect::<Vec<_>>()
            .join(" -> ");
        format!("{}[{}]", self.key(), kinds)
    }
}

impl fmt::Debug for dyn ComponentAdapter + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// 适配器链迭代器
pub struct AdapterChain<'a> {
    next: Option<&'a dyn ComponentAdapter>,
}

impl<'a> Iterator for AdapterChain<'a> {
    type Item = &'a dyn ComponentAdapter;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.delegate();
        Some(current)
    }
}
