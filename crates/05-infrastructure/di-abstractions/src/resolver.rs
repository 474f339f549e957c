//! 解析上下文
//!
//! 一次顶层解析请求对应一个 [`Resolution`]，在整棵依赖树的递归中显式传递：
//! 记录正在解析的 (容器, 键) 链以检测循环依赖，保存允许循环的组件的已分配实例，
//! 并维护待填充队列，由最外层请求在返回前清空。
//!
//! 解析失败（或上下文未完成就被丢弃）时执行登记的回滚动作，
//! 缓存行为借此丢弃尚未填充完成的实例。

use crate::instance::Instance;
use crate::key::Key;
use infrastructure_common::DependencyError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use tracing::trace;
use uuid::Uuid;

/// 解析选项
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveOptions {
    /// 最大递归深度
    pub max_depth: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self { max_depth: 100 }
    }
}

/// 延迟的成员填充
///
/// 允许循环依赖的组件先分配、后填充；填充动作进入队列，在解析链退出后执行。
pub trait PendingPopulation: Send {
    /// 执行填充
    fn populate(self: Box<Self>, resolution: &mut Resolution) -> Result<(), DependencyError>;

    /// 被填充组件的描述
    fn describe(&self) -> String;
}

/// 解析失败时的回滚动作
pub type Rollback = Box<dyn FnOnce() + Send>;

#[derive(Debug, Clone)]
struct Frame {
    container: Uuid,
    key: Key,
}

/// 解析上下文
pub struct Resolution {
    chain: Vec<Frame>,
    allocated: HashMap<(Uuid, Key), Instance>,
    pending: VecDeque<Box<dyn PendingPopulation>>,
    rollbacks: Vec<Rollback>,
    options: ResolveOptions,
}

impl Resolution {
    /// 创建新的解析上下文
    pub fn new(options: ResolveOptions) -> Self {
        Self {
            chain: Vec::new(),
            allocated: HashMap::new(),
            pending: VecDeque::new(),
            rollbacks: Vec::new(),
            options,
        }
    }

    /// 进入一个组件的解析
    ///
    /// 同一容器中的同一键已在链上时返回 [`DependencyError::CircularDependency`]。
    pub fn enter(&mut self, container: Uuid, key: &Key) -> Result<(), DependencyError> {
        if self
            .chain
            .iter()
            .any(|frame| frame.container == container && frame.key == *key)
        {
            return Err(DependencyError::CircularDependency {
                dependency_chain: format!("{} -> {}", self.describe_chain(), key),
            });
        }
        if self.chain.len() >= self.options.max_depth {
            return Err(DependencyError::ResolutionDepthExceeded {
                depth: self.options.max_depth,
                chain: self.describe_chain(),
            });
        }
        self.chain.push(Frame {
            container,
            key: key.clone(),
        });
        Ok(())
    }

    /// 退出当前组件的解析
    pub fn exit(&mut self) {
        self.chain.pop();
    }

    /// 当前解析深度
    pub fn depth(&self) -> usize {
        self.chain.len()
    }

    /// 正在消费当前组件的上层组件
    pub fn consumer(&self) -> Option<&Key> {
        self.chain.iter().rev().nth(1).map(|frame| &frame.key)
    }

    /// 已分配但可能尚未填充的实例
    pub fn allocated(&self, container: Uuid, key: &Key) -> Option<Instance> {
        self.allocated.get(&(container, key.clone())).cloned()
    }

    /// 记录已分配的实例
    pub fn record_allocated(&mut self, container: Uuid, key: &Key, instance: Instance) {
        self.allocated.insert((container, key.clone()), instance);
    }

    /// 延迟填充
    pub fn defer(&mut self, population: Box<dyn PendingPopulation>) {
        trace!("延迟填充组件: {}", population.describe());
        self.pending.push_back(population);
    }

    /// 待填充数量
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// 是否还有未完成的延迟填充
    pub fn is_populating(&self) -> bool {
        !self.pending.is_empty()
    }

    /// 登记解析失败时的回滚动作
    pub fn on_abort(&mut self, rollback: Rollback) {
        self.rollbacks.push(rollback);
    }

    /// 清空待填充队列
    ///
    /// 填充过程中产生的新任务会继续被处理，直到队列为空。
    /// 任一填充失败时丢弃剩余任务并按登记的逆序执行回滚。
    pub fn complete(&mut self) -> Result<(), DependencyError> {
        while let Some(population) = self.pending.pop_front() {
            if let Err(error) = population.populate(self) {
                self.abort();
                return Err(error);
            }
        }
        self.rollbacks.clear();
        Ok(())
    }

    /// 放弃本次解析：丢弃待填充任务并执行回滚
    pub fn abort(&mut self) {
        self.pending.clear();
        if !self.rollbacks.is_empty() {
            trace!("解析失败, 回滚 {} 个缓存实例", self.rollbacks.len());
        }
        while let Some(rollback) = self.rollbacks.pop() {
            rollback();
        }
    }

    fn describe_chain(&self) -> String {
        self.chain
            .iter()
            .map(|frame| frame.key.to_string())
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::new(ResolveOptions::default())
    }
}

impl Drop for Resolution {
    fn drop(&mut self) {
        self.abort();
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolution")
            .field("chain", &self.describe_chain())
            .field("allocated", &self.allocated.len())
            .field("pending", &self.pending.len())
            .field("rollbacks", &self.rollbacks.len())
            .field("options", &self.options)
            .finish()
    }
}
