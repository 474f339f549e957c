//! 组件生命周期管理
//!
//! 容器级状态机以及组件侧的 [`Startable`] / [`Disposable`] 约定。

use crate::errors::{BoxError, DependencyError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 可启动组件
///
/// 实现该 trait 并通过 `startable()` 声明契约的组件会参与容器的启动和停止遍历。
pub trait Startable: Send + Sync {
    /// 启动组件
    fn start(&self) -> Result<(), BoxError>;

    /// 停止组件
    fn stop(&self) -> Result<(), BoxError>;
}

/// 可释放组件
pub trait Disposable: Send + Sync {
    /// 释放组件持有的资源
    fn dispose(&self) -> Result<(), BoxError>;
}

/// 生命周期操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleOperation {
    /// 启动
    Start,
    /// 停止
    Stop,
    /// 释放
    Dispose,
    /// 移除组件
    Remove,
}

impl LifecycleOperation {
    /// 操作名称
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Dispose => "dispose",
            Self::Remove => "remove",
        }
    }
}

impl fmt::Display for LifecycleOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 容器生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    /// 已构造，尚未启动
    #[default]
    Constructed,
    /// 启动中
    Starting,
    /// 已启动
    Started,
    /// 停止中
    Stopping,
    /// 已停止
    Stopped,
    /// 释放中
    Disposing,
    /// 已释放
    Disposed,
}

impl LifecycleState {
    /// 开始一次转换，返回中间状态
    ///
    /// 非法转换返回 [`DependencyError::StateMismatch`]，其中携带当前（源）状态。
    pub fn begin(self, operation: LifecycleOperation) -> Result<Self, DependencyError> {
        let next = match (self, operation) {
            (Self::Constructed | Self::Stopped, LifecycleOperation::Start) => Self::Starting,
            (Self::Started, LifecycleOperation::Stop) => Self::Stopping,
            (Self::Constructed | Self::Stopped, LifecycleOperation::Dispose) => Self::Disposing,
            _ => {
                return Err(DependencyError::StateMismatch {
                    operation,
                    state: self,
                })
            }
        };
        Ok(next)
    }

    /// 完成一次转换，返回目标状态
    pub fn complete(self) -> Self {
        match self {
            Self::Starting => Self::Started,
            Self::Stopping => Self::Stopped,
            Self::Disposing => Self::Disposed,
            settled => settled,
        }
    }

    /// 是否处于已启动状态
    pub fn is_started(self) -> bool {
        self == Self::Started
    }

    /// 是否已释放
    pub fn is_disposed(self) -> bool {
        self == Self::Disposed
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Constructed => "CONSTRUCTED",
            Self::Starting => "STARTING",
            Self::Started => "STARTED",
            Self::Stopping => "STOPPING",
            Self::Stopped => "STOPPED",
            Self::Disposing => "DISPOSING",
            Self::Disposed => "DISPOSED",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(state: LifecycleState, operation: LifecycleOperation) -> LifecycleState {
        state.begin(operation).unwrap().complete()
    }

    #[test]
    fn test_full_round_trip_with_restart() {
        let state = LifecycleState::default();
        let state = run(state, LifecycleOperation::Start);
        assert_eq!(state, LifecycleState::Started);
        let state = run(state, LifecycleOperation::Stop);
        let state = run(state, LifecycleOperation::Start);
        let state = run(state, LifecycleOperation::Stop);
        assert_eq!(run(state, LifecycleOperation::Dispose), LifecycleState::Disposed);
    }

    #[test]
    fn test_dispose_without_start_is_allowed() {
        assert_eq!(
            run(LifecycleState::Constructed, LifecycleOperation::Dispose),
            LifecycleState::Disposed
        );
    }

    #[test]
    fn test_illegal_transitions_report_source_state() {
        let cases = [
            (LifecycleState::Constructed, LifecycleOperation::Stop),
            (LifecycleState::Started, LifecycleOperation::Start),
            (LifecycleState::Started, LifecycleOperation::Dispose),
            (LifecycleState::Disposed, LifecycleOperation::Start),
            (LifecycleState::Starting, LifecycleOperation::Stop),
        ];

        for (state, operation) in cases {
            match state.begin(operation) {
                Err(DependencyError::StateMismatch { state: source, .. }) => {
                    assert_eq!(source, state)
                }
                other => panic!("期望状态不匹配错误, 实际: {other:?}"),
            }
        }
    }
}
