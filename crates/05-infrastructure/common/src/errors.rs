//! 错误类型定义

use crate::lifecycle::{LifecycleOperation, LifecycleState};
use thiserror::Error;

/// 组件构造、成员调用或生命周期回调返回的原始错误
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    #[error("配置文件读取失败: {source}")]
    FileReadError {
        #[from]
        source: std::io::Error,
    },

    #[error("配置解析失败: {source}")]
    ParseError { source: BoxError },

    #[error("配置验证失败: {message}")]
    ValidationError { message: String },
}

impl ConfigError {
    /// 创建解析错误
    pub fn parse(source: impl Into<BoxError>) -> Self {
        Self::ParseError {
            source: source.into(),
        }
    }

    /// 创建验证错误
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }
}

/// 依赖注入错误类型
#[derive(Error, Debug)]
pub enum DependencyError {
    #[error("无法满足的依赖: {requester} 需要 {missing}, 但没有可用的绑定")]
    UnsatisfiableDependency { requester: String, missing: String },

    #[error("解析存在歧义: {requested} 有多个候选 {candidates:?}")]
    AmbiguousResolution {
        requested: String,
        candidates: Vec<String>,
    },

    #[error("循环依赖检测到: {dependency_chain}")]
    CircularDependency { dependency_chain: String },

    #[error("组件创建失败: {type_name}, 原因: {source}")]
    InstantiationFailed { type_name: String, source: BoxError },

    #[error("成员调用失败: {type_name}::{member}, 原因: {source}")]
    InvocationFailed {
        type_name: String,
        member: String,
        source: BoxError,
    },

    #[error("生命周期调用失败: {key} 执行 {operation} 时出错 (实例 {instance}), 原因: {source}")]
    LifecycleInvocationFailed {
        key: String,
        operation: LifecycleOperation,
        instance: String,
        source: BoxError,
    },

    #[error("生命周期调用失败 {} 次: {}", .failures.len(), join_messages(.failures))]
    LifecycleFailures { failures: Vec<DependencyError> },

    #[error("生命周期状态不匹配: 无法在 {state} 状态下执行 {operation}")]
    StateMismatch {
        operation: LifecycleOperation,
        state: LifecycleState,
    },

    #[error("组件状态不匹配: {key}, 原因: {message}")]
    ComponentStateMismatch { key: String, message: String },

    #[error("访问被拒绝: 作用域 {scope} 不允许 {access} 操作")]
    AccessDenied { scope: String, access: String },

    #[error("组件键重复: {key}")]
    DuplicateKey { key: String },

    #[error("组件类型不匹配: {key} 无法转换为 {expected}")]
    TypeMismatch { key: String, expected: String },

    #[error("组件注册失败: {type_name}, 原因: {message}")]
    RegistrationError { type_name: String, message: String },

    #[error("解析深度超过上限 {depth}: {chain}")]
    ResolutionDepthExceeded { depth: usize, chain: String },

    #[error("容器 {container} 及其委托链都不支持替换监视器")]
    MonitorStrategyNotFound { container: String },

    #[error("非法的子容器操作: {message}")]
    IllegalChildContainer { message: String },
}

impl DependencyError {
    /// 创建注册错误
    pub fn registration(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RegistrationError {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// 创建无法满足的依赖错误
    pub fn unsatisfiable(requester: impl Into<String>, missing: impl Into<String>) -> Self {
        Self::UnsatisfiableDependency {
            requester: requester.into(),
            missing: missing.into(),
        }
    }

    /// 展开批量生命周期错误，单个错误返回自身
    pub fn into_failures(self) -> Vec<DependencyError> {
        match self {
            Self::LifecycleFailures { failures } => failures,
            other => vec![other],
        }
    }
}

fn join_messages(failures: &[DependencyError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// 基础设施错误类型
#[derive(Error, Debug)]
pub enum InfrastructureError {
    #[error("配置错误: {source}")]
    ConfigError {
        #[from]
        source: ConfigError,
    },

    #[error("依赖注入错误: {source}")]
    DependencyError {
        #[from]
        source: DependencyError,
    },

    #[error("基础设施启动失败: {message}")]
    BootstrapFailed { message: String },
}

/// 结果类型别名
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type DependencyResult<T> = Result<T, DependencyError>;
pub type InfrastructureResult<T> = Result<T, InfrastructureError>;
