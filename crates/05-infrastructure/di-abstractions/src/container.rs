//! 依赖注入容器抽象接口
//!
//! [`Container`] 是只读视图，负责按键、按类型查找和解析组件；
//! [`MutableContainer`] 在此之上提供注册、子容器管理和生命周期。
//! 容器装饰器只需实现必需方法并转发给内层容器，查找算法由默认方法提供。

use crate::adapter::ComponentAdapter;
use crate::characteristics::Characteristics;
use crate::instance::Instance;
use crate::key::Key;
use crate::lifecycle::LifecycleStrategy;
use crate::monitor::ComponentMonitor;
use crate::parameter::Parameter;
use crate::recipe::{ComponentSource, Injectable};
use crate::resolver::{Resolution, ResolveOptions};
use infrastructure_common::{BoxError, DependencyError, DependencyResult, LifecycleState, TypeInfo};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// 只读容器
pub trait Container: Send + Sync {
    /// 容器标识
    fn id(&self) -> Uuid;

    /// 容器名称
    fn name(&self) -> &str;

    /// 父容器
    fn parent(&self) -> Option<Arc<dyn Container>>;

    /// 当前容器的共享引用，用于延迟填充
    fn shared(&self) -> Option<Arc<dyn Container>> {
        None
    }

    /// 以 trait 对象形式返回自身
    fn as_container(&self) -> &dyn Container;

    /// 本容器中指定键的适配器
    fn local_adapter(&self, key: &Key) -> Option<Arc<dyn ComponentAdapter>>;

    /// 本容器中按注册顺序排列的适配器
    fn component_adapters(&self) -> Vec<Arc<dyn ComponentAdapter>>;

    /// 通过本容器解析适配器
    fn resolve_adapter(
        &self,
        adapter: &Arc<dyn ComponentAdapter>,
        resolution: &mut Resolution,
    ) -> DependencyResult<Instance>;

    /// 生命周期策略
    fn lifecycle_strategy(&self) -> Arc<dyn LifecycleStrategy>;

    /// 当前监视器
    fn current_monitor(&self) -> Arc<dyn ComponentMonitor>;

    /// 解析选项
    fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions::default()
    }

    /// 被装饰的内层容器
    fn delegate(&self) -> Option<&dyn Container> {
        None
    }

    /// 支持更换监视器时返回自身
    fn as_monitor_strategy(&self) -> Option<&dyn MonitorStrategy> {
        None
    }

    /// 按键查找适配器，本容器没有时查找父容器
    fn component_adapter(&self, key: &Key) -> Option<Arc<dyn ComponentAdapter>> {
        self.local_adapter(key)
            .or_else(|| self.parent().and_then(|parent| parent.component_adapter(key)))
    }

    /// 在本容器中按类型查找唯一的适配器
    ///
    /// 与目标类型同名的类型键优先；否则在可赋值的适配器中查找，
    /// 多于一个时用 `name_hint` 匹配名称键，仍无法确定则返回歧义错误。
    fn local_adapter_of_type(
        &self,
        target: &TypeInfo,
        exclude: Option<&Key>,
        name_hint: Option<&str>,
    ) -> DependencyResult<Option<Arc<dyn ComponentAdapter>>> {
        let exact = Key::for_type(*target);
        if exclude != Some(&exact) {
            if let Some(adapter) = self.local_adapter(&exact) {
                return Ok(Some(adapter));
            }
        }

        let candidates: Vec<Arc<dyn ComponentAdapter>> = self
            .component_adapters()
            .into_iter()
            .filter(|adapter| Some(adapter.key()) != exclude)
            .filter(|adapter| adapter.component_type().is_assignable_to(target))
            .collect();

        if candidates.len() <= 1 {
            return Ok(candidates.into_iter().next());
        }
        if let Some(name) = name_hint {
            if let Some(found) = candidates
                .iter()
                .find(|adapter| adapter.key().name() == Some(name))
            {
                return Ok(Some(Arc::clone(found)));
            }
        }
        Err(DependencyError::AmbiguousResolution {
            requested: target.to_string(),
            candidates: candidates
                .iter()
                .map(|adapter| adapter.key().to_string())
                .collect(),
        })
    }

    /// 按类型查找唯一的适配器，本容器没有时查找父容器
    fn adapter_of_type(
        &self,
        target: &TypeInfo,
        exclude: Option<&Key>,
        name_hint: Option<&str>,
    ) -> DependencyResult<Option<Arc<dyn ComponentAdapter>>> {
        if let Some(adapter) = self.local_adapter_of_type(target, exclude, name_hint)? {
            return Ok(Some(adapter));
        }
        match self.parent() {
            Some(parent) => parent.adapter_of_type(target, None, name_hint),
            None => Ok(None),
        }
    }

    /// 本容器及祖先中可赋值给目标类型的适配器数量
    fn count_of_type(&self, target: &TypeInfo, exclude: &[Key]) -> usize {
        let local = self
            .component_adapters()
            .iter()
            .filter(|adapter| !exclude.contains(adapter.key()))
            .filter(|adapter| adapter.component_type().is_assignable_to(target))
            .count();
        local
            + self
                .parent()
                .map_or(0, |parent| parent.count_of_type(target, &[]))
    }

    /// 在一次解析中按键解析
    fn resolve_key(&self, key: &Key, resolution: &mut Resolution) -> DependencyResult<Option<Instance>> {
        if let Some(adapter) = self.local_adapter(key) {
            return self.resolve_adapter(&adapter, resolution).map(Some);
        }
        match self.parent() {
            Some(parent) => parent.resolve_key(key, resolution),
            None => Ok(None),
        }
    }

    /// 在一次解析中按类型解析
    fn resolve_type(
        &self,
        target: &TypeInfo,
        exclude: Option<&Key>,
        name_hint: Option<&str>,
        resolution: &mut Resolution,
    ) -> DependencyResult<Option<Instance>> {
        if let Some(adapter) = self.local_adapter_of_type(target, exclude, name_hint)? {
            return self.resolve_adapter(&adapter, resolution).map(Some);
        }
        match self.parent() {
            Some(parent) => parent.resolve_type(target, None, name_hint, resolution),
            None => Ok(None),
        }
    }

    /// 在一次解析中收集所有可赋值的组件，祖先容器的组件排在前面
    fn resolve_all(
        &self,
        target: &TypeInfo,
        exclude: &[Key],
        resolution: &mut Resolution,
    ) -> DependencyResult<Vec<Instance>> {
        let mut instances = match self.parent() {
            Some(parent) => parent.resolve_all(target, &[], resolution)?,
            None => Vec::new(),
        };
        let local: Vec<Arc<dyn ComponentAdapter>> = self
            .component_adapters()
            .into_iter()
            .filter(|adapter| !exclude.contains(adapter.key()))
            .filter(|adapter| adapter.component_type().is_assignable_to(target))
            .collect();
        for adapter in &local {
            instances.push(self.resolve_adapter(adapter, resolution)?);
        }
        Ok(instances)
    }

    /// 新的顶层解析上下文
    fn new_resolution(&self) -> Resolution {
        Resolution::new(self.resolve_options())
    }

    /// 按键获取组件
    ///
    /// 找不到时询问监视器，监视器也无法提供时返回 `Ok(None)`。
    fn component(&self, key: &Key) -> DependencyResult<Option<Instance>> {
        let mut resolution = self.new_resolution();
        let found = self.resolve_key(key, &mut resolution)?;
        resolution.complete()?;
        Ok(found.or_else(|| self.current_monitor().no_component_found(key)))
    }

    /// 按类型获取组件
    fn component_of_type(&self, target: &TypeInfo) -> DependencyResult<Option<Instance>> {
        let mut resolution = self.new_resolution();
        let found = self.resolve_type(target, None, None, &mut resolution)?;
        resolution.complete()?;
        Ok(found.or_else(|| {
            self.current_monitor()
                .no_component_found(&Key::for_type(*target))
        }))
    }

    /// 本容器中的全部组件
    fn components(&self) -> DependencyResult<Vec<Instance>> {
        let mut resolution = self.new_resolution();
        let mut instances = Vec::new();
        for adapter in self.component_adapters() {
            instances.push(self.resolve_adapter(&adapter, &mut resolution)?);
        }
        resolution.complete()?;
        Ok(instances)
    }

    /// 本容器及祖先中可赋值给目标类型的全部组件
    fn components_of_type(&self, target: &TypeInfo) -> DependencyResult<Vec<Instance>> {
        let mut resolution = self.new_resolution();
        let instances = self.resolve_all(target, &[], &mut resolution)?;
        resolution.complete()?;
        Ok(instances)
    }
}

/// 可变容器
pub trait MutableContainer: Container {
    /// 注册组件
    fn register(&self, registration: Registration) -> DependencyResult<&dyn MutableContainer>;

    /// 注册已构建的适配器，容器的行为工厂仍会按特性包装它
    fn add_adapter(
        &self,
        adapter: Box<dyn ComponentAdapter>,
        characteristics: Characteristics,
    ) -> DependencyResult<&dyn MutableContainer>;

    /// 移除组件
    fn remove_component(&self, key: &Key) -> DependencyResult<Option<Arc<dyn ComponentAdapter>>>;

    /// 移除当前解析结果与给定实例相同的组件
    fn remove_component_by_instance(
        &self,
        instance: &Instance,
    ) -> DependencyResult<Option<Arc<dyn ComponentAdapter>>>;

    /// 创建并挂载子容器
    fn make_child_container(&self) -> DependencyResult<Arc<dyn MutableContainer>>;

    /// 挂载已有容器为子容器
    fn add_child_container(
        &self,
        child: Arc<dyn MutableContainer>,
    ) -> DependencyResult<&dyn MutableContainer>;

    /// 卸载子容器
    fn remove_child_container(&self, child: Uuid) -> DependencyResult<bool>;

    /// 修改后续注册的默认特性
    fn change(&self, characteristics: Characteristics) -> DependencyResult<&dyn MutableContainer>;

    /// 启动
    fn start(&self) -> DependencyResult<()>;

    /// 停止
    fn stop(&self) -> DependencyResult<()>;

    /// 释放
    fn dispose(&self) -> DependencyResult<()>;

    /// 生命周期状态
    fn lifecycle_state(&self) -> LifecycleState;
}

/// 一次注册请求
#[derive(Debug, Clone)]
pub struct Registration {
    /// 注册键
    pub key: Key,
    /// 配方或实例
    pub source: ComponentSource,
    /// 显式参数，`None` 表示全部按默认方式解析
    pub parameters: Option<Vec<Parameter>>,
    /// 本次注册的特性
    pub characteristics: Characteristics,
}

impl Registration {
    /// 创建注册请求
    pub fn new(key: impl Into<Key>, source: impl Into<ComponentSource>) -> Self {
        Self {
            key: key.into(),
            source: source.into(),
            parameters: None,
            characteristics: Characteristics::default(),
        }
    }

    /// 设置显式参数
    pub fn parameters(mut self, parameters: Vec<Parameter>) -> Self {
        self.parameters = Some(parameters);
        self
    }

    /// 添加单个特性
    pub fn with(mut self, characteristic: crate::characteristics::Characteristic) -> Self {
        self.characteristics = self.characteristics.with(characteristic);
        self
    }

    /// 覆盖特性
    pub fn characteristics(mut self, characteristics: Characteristics) -> Self {
        self.characteristics = characteristics;
        self
    }
}

/// 类型化的查询
pub trait ContainerExt: Container {
    /// 按类型获取组件
    fn get<T: ?Sized + 'static>(&self) -> DependencyResult<Option<Arc<T>>> {
        let target = TypeInfo::of::<T>();
        match self.component_of_type(&target)? {
            Some(instance) => cast::<T>(&Key::for_type(target), &instance).map(Some),
            None => Ok(None),
        }
    }

    /// 按键获取组件并转换为 `T`
    fn get_by_key<T: ?Sized + 'static>(&self, key: &Key) -> DependencyResult<Option<Arc<T>>> {
        match self.component(key)? {
            Some(instance) => cast::<T>(key, &instance).map(Some),
            None => Ok(None),
        }
    }

    /// 按名称获取组件
    fn get_named<T: ?Sized + 'static>(&self, name: &str) -> DependencyResult<Option<Arc<T>>> {
        self.get_by_key(&Key::named(name))
    }

    /// 获取所有可赋值给 `T` 的组件
    fn get_all<T: ?Sized + 'static>(&self) -> DependencyResult<Vec<Arc<T>>> {
        let target = TypeInfo::of::<T>();
        self.components_of_type(&target)?
            .iter()
            .map(|instance| cast::<T>(&Key::for_type(target), instance))
            .collect()
    }

    /// 在组件上调用方法，经过监视器和分派锁
    fn invoke<T, R>(
        &self,
        key: &Key,
        member: &str,
        call: impl FnOnce(&T) -> Result<R, BoxError>,
    ) -> DependencyResult<R>
    where
        T: ?Sized + 'static,
    {
        let instance = self
            .component(key)?
            .ok_or_else(|| DependencyError::unsatisfiable(member, key.to_string()))?;
        let target = cast::<T>(key, &instance)?;
        let container = self.as_container();
        let monitor = self.current_monitor();

        monitor.invoking(container, key, member, &instance);
        let started = Instant::now();
        match instance.dispatch(|| call(target.as_ref())) {
            Ok(value) => {
                monitor.invoked(container, key, member, &instance, started.elapsed());
                Ok(value)
            }
            Err(source) => {
                monitor.invocation_failed(container, key, member, &instance, source.as_ref());
                Err(DependencyError::InvocationFailed {
                    type_name: instance.implementation().to_string(),
                    member: member.to_string(),
                    source,
                })
            }
        }
    }
}

impl<C: Container + ?Sized> ContainerExt for C {}

fn cast<T: ?Sized + 'static>(key: &Key, instance: &Instance) -> DependencyResult<Arc<T>> {
    instance.cast::<T>().ok_or_else(|| DependencyError::TypeMismatch {
        key: key.to_string(),
        expected: TypeInfo::of::<T>().to_string(),
    })
}

/// 类型化的注册
pub trait MutableContainerExt: MutableContainer {
    /// 以键、来源和参数注册
    fn add_component(
        &self,
        key: impl Into<Key>,
        source: impl Into<ComponentSource>,
        parameters: Vec<Parameter>,
    ) -> DependencyResult<&dyn MutableContainer> {
        let registration = Registration::new(key, source);
        if parameters.is_empty() {
            self.register(registration)
        } else {
            self.register(registration.parameters(parameters))
        }
    }

    /// 以自身类型为键注册可注入组件
    fn add_type<T: Injectable>(&self) -> DependencyResult<&dyn MutableContainer> {
        self.register(Registration::new(Key::of::<T>(), T::implementation()))
    }

    /// 以 `K` 为键注册可注入组件
    fn add_type_as<K: ?Sized + 'static, T: Injectable>(
        &self,
    ) -> DependencyResult<&dyn MutableContainer> {
        self.register(Registration::new(Key::of::<K>(), T::implementation()))
    }

    /// 以自身类型为键注册实例
    fn add_instance<T: Send + Sync + 'static>(
        &self,
        value: T,
    ) -> DependencyResult<&dyn MutableContainer> {
        self.register(Registration::new(Key::of::<T>(), Instance::of(value)))
    }

    /// 以名称为键注册配置值
    fn add_config<T: Send + Sync + 'static>(
        &self,
        name: &str,
        value: T,
    ) -> DependencyResult<&dyn MutableContainer> {
        self.register(Registration::new(Key::named(name), Instance::of(value)))
    }
}

impl<C: MutableContainer + ?Sized> MutableContainerExt for C {}

/// 可更换监视器的容器
pub trait MonitorStrategy: Send + Sync {
    /// 更换监视器，已创建的适配器随之生效
    fn change_monitor(&self, monitor: Arc<dyn ComponentMonitor>) -> DependencyResult<()>;

    /// 当前监视器
    fn monitor(&self) -> Arc<dyn ComponentMonitor>;
}

/// 沿装饰链查找并更换监视器
pub fn change_monitor(
    container: &dyn Container,
    monitor: Arc<dyn ComponentMonitor>,
) -> DependencyResult<()> {
    let mut current = Some(container);
    while let Some(candidate) = current {
        if let Some(strategy) = candidate.as_monitor_strategy() {
            return strategy.change_monitor(monitor);
        }
        current = candidate.delegate();
    }
    Err(DependencyError::MonitorStrategyNotFound {
        container: container.name().to_string(),
    })
}

/// 重复键的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateKeyPolicy {
    /// 拒绝重复注册
    #[default]
    Reject,
    /// 后注册的替换先注册的
    Replace,
}

/// 子容器参与生命周期的顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildOrder {
    /// 启动时先自身后子容器，停止和释放时反过来
    #[default]
    ChildrenLast,
    /// 启动时先子容器后自身，停止和释放时反过来
    ChildrenFirst,
}

/// 容器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// 容器名称
    pub name: Option<String>,
    /// 最大解析深度
    pub max_resolution_depth: usize,
    /// 重复键的处理方式
    pub duplicate_keys: DuplicateKeyPolicy,
    /// 子容器参与生命周期的顺序
    pub child_order: ChildOrder,
    /// 启动时是否实例化所有具备生命周期的组件
    pub instantiate_on_start: bool,
    /// 默认特性
    pub characteristics: Characteristics,
}

impl ContainerConfig {
    /// 设置名称
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// 设置最大解析深度
    pub fn with_max_resolution_depth(mut self, depth: usize) -> Self {
        self.max_resolution_depth = depth;
        self
    }

    /// 设置重复键的处理方式
    pub fn with_duplicate_keys(mut self, policy: DuplicateKeyPolicy) -> Self {
        self.duplicate_keys = policy;
        self
    }

    /// 设置子容器顺序
    pub fn with_child_order(mut self, order: ChildOrder) -> Self {
        self.child_order = order;
        self
    }

    /// 设置启动时是否实例化
    pub fn with_instantiate_on_start(mut self, enabled: bool) -> Self {
        self.instantiate_on_start = enabled;
        self
    }

    /// 设置默认特性
    pub fn with_characteristics(mut self, characteristics: Characteristics) -> Self {
        self.characteristics = characteristics;
        self
    }

    /// 解析选项
    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            max_depth: self.max_resolution_depth,
        }
    }

    /// 校验配置
    pub fn validate(&self) -> DependencyResult<()> {
        if self.max_resolution_depth == 0 {
            return Err(DependencyError::registration(
                "ContainerConfig",
                "max_resolution_depth 必须大于 0",
            ));
        }
        Ok(())
    }
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            name: None,
            max_resolution_depth: ResolveOptions::default().max_depth,
            duplicate_keys: DuplicateKeyPolicy::default(),
            child_order: ChildOrder::default(),
            instantiate_on_start: false,
            characteristics: Characteristics::default(),
        }
    }
}

/// 容器统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContainerStats {
    /// 已注册组件数量
    pub registered_components: usize,
    /// 已持有实例的组件数量
    pub instantiated_components: usize,
    /// 子容器数量
    pub child_containers: usize,
    /// 生命周期状态
    pub state: LifecycleState,
}
