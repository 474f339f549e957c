//! # 依赖注入具体实现
//!
//! 提供容器、注入器、行为、监视器和生命周期策略的具体实现。
//!
//! ## 核心组件
//!
//! - [`DefaultContainer`] - 按注册顺序保存适配器、驱动生命周期遍历的容器
//! - [`ContainerBuilder`] - 组合行为、监视器和生命周期策略
//! - [`Injector`] / [`InjectionFactory`] - 选择构造函数并注入成员
//! - [`ProviderAdapter`] - 由提供函数产出组件
//! - [`AdaptingBehavior`] / [`BehaviorSpec`] - 缓存、隐藏实现、同步等行为
//! - [`TracingComponentMonitor`] / [`LifecycleComponentMonitor`] - 监视器
//! - [`ImmutableContainer`] / [`AccessControlledContainer`] - 容器装饰器
//!
//! ## 示例
//!
//! ```
//! use di_abstractions::{ContainerExt, MutableContainerExt};
//! use di_impl::DefaultContainer;
//!
//! let container = DefaultContainer::new();
//! container.add_config("port", 8080_u16).unwrap();
//! assert_eq!(*container.get_named::<u16>("port").unwrap().unwrap(), 8080);
//! ```

pub mod adapters;
pub mod behaviors;
pub mod builder;
pub mod container;
pub mod decorators;
pub mod injectors;
pub mod lifecycle;
pub mod monitors;

pub use adapters::InstanceAdapter;
pub use behaviors::*;
pub use builder::ContainerBuilder;
pub use container::DefaultContainer;
pub use decorators::*;
pub use injectors::{InjectionFactory, Injector, ProviderAdapter};
pub use lifecycle::*;
pub use monitors::*;
