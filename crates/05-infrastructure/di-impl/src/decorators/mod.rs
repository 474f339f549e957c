//! 容器装饰器
//!
//! - [`ImmutableContainer`] - 只读视图
//! - [`AccessControlledContainer`] - 按作用域检查读写权限

mod access;
mod immutable;

pub use access::{Access, AccessControlledContainer, AccessPolicy, ScopeGrants};
pub use immutable::ImmutableContainer;
