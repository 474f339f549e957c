//! 参数
//!
//! 参数决定构造函数或注入成员的某个实参从哪里来：按类型查找、按键查找、
//! 使用常量，或者收集所有可赋值的组件。

use crate::container::Container;
use crate::instance::Instance;
use crate::key::Key;
use crate::recipe::{Argument, Dependency, Shape};
use crate::resolver::Resolution;
use infrastructure_common::DependencyError;

/// 参数
#[derive(Debug, Clone, Default)]
pub enum Parameter {
    /// 按声明类型解析，启用名称消歧时参考参数名称
    #[default]
    Default,
    /// 解析指定键的组件
    Key(Key),
    /// 使用常量
    Constant(Instance),
    /// 收集所有可赋值的组件
    Collect {
        /// 额外排除的键
        exclude: Option<Key>,
        /// 是否允许空集合
        allow_empty: bool,
    },
}

/// 参数解析时的上下文
#[derive(Clone, Copy)]
pub struct ParameterContext<'a> {
    /// 依赖所在的容器
    pub container: &'a dyn Container,
    /// 请求依赖的组件键，不会被解析为自身的依赖
    pub requester: &'a Key,
    /// 是否按参数名称消歧
    pub use_names: bool,
}

impl<'a> ParameterContext<'a> {
    /// 创建上下文
    pub fn new(container: &'a dyn Container, requester: &'a Key, use_names: bool) -> Self {
        Self {
            container,
            requester,
            use_names,
        }
    }

    fn name_hint<'d>(&self, dependency: &'d Dependency) -> Option<&'d str> {
        if self.use_names {
            dependency.name()
        } else {
            None
        }
    }

    fn unsatisfiable(&self, missing: impl ToString) -> DependencyError {
        DependencyError::unsatisfiable(self.requester.to_string(), missing.to_string())
    }
}

impl Parameter {
    /// 按键解析
    pub fn key(key: impl Into<Key>) -> Self {
        Self::Key(key.into())
    }

    /// 常量参数
    pub fn constant<T: Send + Sync + 'static>(value: T) -> Self {
        Self::Constant(Instance::of(value))
    }

    /// 收集参数，至少需要一个元素
    pub fn collect() -> Self {
        Self::Collect {
            exclude: None,
            allow_empty: false,
        }
    }

    /// 允许空集合的收集参数
    pub fn collect_allowing_empty() -> Self {
        Self::Collect {
            exclude: None,
            allow_empty: true,
        }
    }

    /// 排除指定键的收集参数
    pub fn collect_excluding(key: impl Into<Key>) -> Self {
        Self::Collect {
            exclude: Some(key.into()),
            allow_empty: false,
        }
    }

    /// 在不构造实例的前提下判断能否满足依赖
    ///
    /// 存在多个候选且无法按名称消歧时返回 [`DependencyError::AmbiguousResolution`]。
    pub fn is_resolvable(
        &self,
        context: &ParameterContext<'_>,
        dependency: &Dependency,
    ) -> Result<bool, DependencyError> {
        match self {
            Self::Default => match dependency.shape {
                Shape::Single => Ok(context
                    .container
                    .adapter_of_type(
                        &dependency.target,
                        Some(context.requester),
                        context.name_hint(dependency),
                    )?
                    .is_some()),
                Shape::Optional => context
                    .container
                    .adapter_of_type(
                        &dependency.target,
                        Some(context.requester),
                        context.name_hint(dependency),
                    )
                    .map(|_| true),
                Shape::Collection => Ok(context
                    .container
                    .count_of_type(&dependency.target, &[context.requester.clone()])
                    > 0),
            },
            Self::Key(key) => Ok(dependency.shape == Shape::Optional
                || context.container.component_adapter(key).is_some()),
            Self::Constant(value) => Ok(value.is_assignable_to(&dependency.target)),
            Self::Collect {
                exclude,
                allow_empty,
            } => Ok(*allow_empty
                || context
                    .container
                    .count_of_type(&dependency.target, &Self::excluded(context, exclude.as_ref()))
                    > 0),
        }
    }

    /// 解析实参
    pub fn resolve(
        &self,
        context: &ParameterContext<'_>,
        dependency: &Dependency,
        resolution: &mut Resolution,
    ) -> Result<Argument, DependencyError> {
        match self {
            Self::Default => match dependency.shape {
                Shape::Single => context
                    .container
                    .resolve_type(
                        &dependency.target,
                        Some(context.requester),
                        context.name_hint(dependency),
                        resolution,
                    )?
                    .map(Argument::Single)
                    .ok_or_else(|| context.unsatisfiable(dependency.label())),
                Shape::Optional => Ok(context
                    .container
                    .resolve_type(
                        &dependency.target,
                        Some(context.requester),
                        context.name_hint(dependency),
                        resolution,
                    )?
                    .map_or(Argument::Absent, Argument::Single)),
                Shape::Collection => {
                    Self::gather(context, dependency, &[context.requester.clone()], false, resolution)
                }
            },
            Self::Key(key) => match context.container.resolve_key(key, resolution)? {
                Some(instance) => Ok(Argument::Single(instance)),
                None if dependency.shape == Shape::Optional => Ok(Argument::Absent),
                None => Err(context.unsatisfiable(key)),
            },
            Self::Constant(value) => Ok(Argument::Single(value.clone())),
            Self::Collect {
                exclude,
                allow_empty,
            } => Self::gather(
                context,
                dependency,
                &Self::excluded(context, exclude.as_ref()),
                *allow_empty,
                resolution,
            ),
        }
    }

    fn gather(
        context: &ParameterContext<'_>,
        dependency: &Dependency,
        exclude: &[Key],
        allow_empty: bool,
        resolution: &mut Resolution,
    ) -> Result<Argument, DependencyError> {
        let instances = context
            .container
            .resolve_all(&dependency.target, exclude, resolution)?;
        if instances.is_empty() && !allow_empty {
            return Err(context.unsatisfiable(dependency.label()));
        }
        Ok(Argument::Many(instances))
    }

    fn excluded(context: &ParameterContext<'_>, extra: Option<&Key>) -> Vec<Key> {
        let mut keys = vec![context.requester.clone()];
        keys.extend(extra.cloned());
        keys
    }
}
