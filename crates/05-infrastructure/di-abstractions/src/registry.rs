//! 依赖图与循环依赖检测
//!
//! 运行时解析通过 [`crate::Resolution`] 检测循环；这里提供的是不构造实例的静态检查，
//! 供容器的 `verify()` 使用。

use crate::container::Container;
use crate::key::Key;
use infrastructure_common::DependencyError;
use std::collections::HashSet;

/// 依赖图节点
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyGraphNode {
    /// 组件键
    pub key: Key,
    /// 选定构造方式所依赖的组件键
    pub dependencies: Vec<Key>,
}

/// 循环依赖检测器
pub trait CircularDependencyDetector: Send + Sync {
    /// 检测循环依赖
    fn detect_circular_dependencies(&self, graph: &[DependencyGraphNode]) -> Result<(), DependencyError>;

    /// 构建依赖图
    fn build_dependency_graph(
        &self,
        container: &dyn Container,
    ) -> Result<Vec<DependencyGraphNode>, DependencyError>;
}

/// 默认循环依赖检测器
#[derive(Debug, Default)]
pub struct DefaultCircularDependencyDetector;

impl CircularDependencyDetector for DefaultCircularDependencyDetector {
    fn detect_circular_dependencies(&self, graph: &[DependencyGraphNode]) -> Result<(), DependencyError> {
        // 使用深度优先搜索检测循环依赖
        let mut visited = HashSet::new();
        let mut path = Vec::new();

        for node in graph {
            if !visited.contains(&node.key) {
                self.dfs_check(&node.key, graph, &mut visited, &mut path)?;
            }
        }

        Ok(())
    }

    fn build_dependency_graph(
        &self,
        container: &dyn Container,
    ) -> Result<Vec<DependencyGraphNode>, DependencyError> {
        container
            .component_adapters()
            .iter()
            .map(|adapter| {
                Ok(DependencyGraphNode {
                    key: adapter.key().clone(),
                    dependencies: adapter.dependencies(container)?,
                })
            })
            .collect()
    }
}

impl DefaultCircularDependencyDetector {
    fn dfs_check(
        &self,
        current: &Key,
        graph: &[DependencyGraphNode],
        visited: &mut HashSet<Key>,
        path: &mut Vec<Key>,
    ) -> Result<(), DependencyError> {
        if let Some(start) = path.iter().position(|key| key == current) {
            // 检测到循环依赖
            let chain = path[start..]
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" -> ");

            return Err(DependencyError::CircularDependency {
                dependency_chain: format!("{chain} -> {current}"),
            });
        }

        if visited.contains(current) {
            return Ok(());
        }

        path.push(current.clone());

        // 查找当前节点的依赖
        if let Some(node) = graph.iter().find(|n| n.key == *current) {
            for dependency in &node.dependencies {
                self.dfs_check(dependency, graph, visited, path)?;
            }
        }

        path.pop();
        visited.insert(current.clone());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(key: &str, dependencies: &[&str]) -> DependencyGraphNode {
        DependencyGraphNode {
            key: Key::named(key),
            dependencies: dependencies.iter().map(Key::named).collect(),
        }
    }

    #[test]
    fn test_acyclic_graph_passes() {
        let graph = vec![node("a", &["b", "c"]), node("b", &["c"]), node("c", &[])];
        assert!(DefaultCircularDependencyDetector
            .detect_circular_dependencies(&graph)
            .is_ok());
    }

    #[test]
    fn test_cycle_reports_only_the_loop() {
        let graph = vec![node("root", &["a"]), node("a", &["b"]), node("b", &["a"])];
        let error = DefaultCircularDependencyDetector
            .detect_circular_dependencies(&graph)
            .unwrap_err();

        match error {
            DependencyError::CircularDependency { dependency_chain } => {
                assert_eq!(dependency_chain, "\"a\" -> \"b\" -> \"a\"");
            }
            other => panic!("期望循环依赖错误, 实际: {other:?}"),
        }
    }
}
