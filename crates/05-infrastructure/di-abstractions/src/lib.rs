//! # Dependency Injection Abstractions
//!
//! 依赖注入抽象层，定义组件注册、依赖解析和生命周期的核心接口。
//!
//! ## 核心接口
//!
//! - [`Key`] - 组件键
//! - [`Instance`] / [`ComponentType`] - 类型擦除的实例及其契约
//! - [`Implementation`] / [`Injectable`] - 组件声明自身的构造方式
//! - [`ComponentAdapter`] - 为一个键提供实例的适配器链
//! - [`ComponentFactory`] - 根据配方和特性创建适配器
//! - [`Container`] / [`MutableContainer`] - 容器接口
//! - [`ComponentMonitor`] - 构造、调用和生命周期事件的监视器
//! - [`LifecycleStrategy`] - 生命周期策略

pub mod adapter;
pub mod characteristics;
pub mod container;
pub mod factory;
pub mod instance;
pub mod key;
pub mod lifecycle;
pub mod monitor;
pub mod parameter;
pub mod recipe;
pub mod registry;
pub mod resolver;

pub use adapter::*;
pub use characteristics::*;
pub use container::*;
pub use factory::*;
pub use instance::*;
pub use key::*;
pub use lifecycle::*;
pub use monitor::*;
pub use parameter::*;
pub use recipe::*;
pub use registry::*;
pub use resolver::*;
