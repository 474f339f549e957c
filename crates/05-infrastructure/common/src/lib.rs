//! # Infrastructure Common
//!
//! 这个 crate 提供了组件容器各层共享的基础类型。
//!
//! ## 核心组件
//!
//! - [`DependencyError`] - 组件解析、构造与生命周期的错误分类
//! - [`TypeInfo`] - 可用于 trait 对象的类型标识
//! - [`LifecycleState`] - 容器生命周期状态机
//! - [`Startable`] / [`Disposable`] - 组件生命周期约定
//!
//! ## 设计原则
//!
//! - 基于 Rust 类型系统的编译时安全
//! - 同步执行，所有操作都在调用线程上完成
//! - 错误显式传播，不做隐式重试

pub mod errors;
pub mod lifecycle;
pub mod metadata;

pub use errors::*;
pub use lifecycle::*;
pub use metadata::*;
