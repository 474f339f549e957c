//! 提供者适配器
//!
//! 组件由一个提供函数产出：函数的参数按类型从容器解析，返回类型就是默认的注册键。
//! 提供函数可以捕获工厂对象的状态，适合组件本身无法描述构造过程的场景。

use di_abstractions::{
    AdapterKind, Arguments, ComponentAdapter, ComponentType, Constructor, Container, Instance, Key,
    Parameter, ParameterContext, Resolution, Shape,
};
use infrastructure_common::{DependencyError, DependencyResult, TypeInfo};
use std::any::Any;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// 由提供函数产出组件的适配器
///
/// 产出的实例只暴露自身类型，不带生命周期操作；是否缓存由容器的行为决定。
pub struct ProviderAdapter {
    key: Key,
    component_type: Arc<ComponentType>,
    provide: Constructor,
    use_names: bool,
}

impl ProviderAdapter {
    /// 以 `T` 为键创建，提供函数必须产出 `T`
    pub fn new<T: Send + Sync + 'static>(provide: Constructor) -> DependencyResult<Self> {
        let produced = TypeInfo::of::<T>();
        if provide.produces() != produced {
            return Err(DependencyError::registration(
                produced.to_string(),
                format!("提供函数 {} 产出的是 {}", provide, provide.produces()),
            ));
        }
        Ok(Self {
            key: Key::for_type(produced),
            component_type: Arc::new(ComponentType::of::<T>()),
            provide,
            use_names: false,
        })
    }

    /// 改用其他注册键
    pub fn with_key(mut self, key: Key) -> Self {
        self.key = key;
        self
    }

    /// 按参数名称消歧
    pub fn with_use_names(mut self, enabled: bool) -> Self {
        self.use_names = enabled;
        self
    }

    /// 提供函数
    pub fn provider(&self) -> &Constructor {
        &self.provide
    }

    fn context<'a>(&'a self, container: &'a dyn Container) -> ParameterContext<'a> {
        ParameterContext::new(container, &self.key, self.use_names)
    }

    fn provide_with(
        &self,
        container: &dyn Container,
        resolution: &mut Resolution,
    ) -> DependencyResult<Instance> {
        let context = self.context(container);
        let mut values = Vec::with_capacity(self.provide.arity());
        for dependency in self.provide.dependencies() {
            values.push(Parameter::Default.resolve(&context, dependency, resolution)?);
        }
        let mut arguments = Arguments::new(self.component_type.implementation(), values);

        let monitor = container.current_monitor();
        let started = Instant::now();
        match self.provide.invoke(&mut arguments) {
            Ok(value) => {
                let instance = Instance::from_parts(value, Arc::clone(&self.component_type));
                let elapsed = started.elapsed();
                monitor.instantiated(container, self, &self.provide, &instance, elapsed);
                debug!("提供者产出组件 {}, 耗时 {:?}", self.key, elapsed);
                Ok(instance)
            }
            Err(source) => {
                monitor.instantiation_failed(container, self, &self.provide, source.as_ref());
                Err(DependencyError::InstantiationFailed {
                    type_name: self.component_type.implementation().to_string(),
                    source,
                })
            }
        }
    }
}

impl ComponentAdapter for ProviderAdapter {
    fn key(&self) -> &Key {
        &self.key
    }

    fn component_type(&self) -> &ComponentType {
        &self.component_type
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::Provider
    }

    fn resolve(
        &self,
        container: &dyn Container,
        resolution: &mut Resolution,
    ) -> DependencyResult<Instance> {
        resolution.enter(container.id(), &self.key)?;
        let outcome = self.provide_with(container, resolution);
        resolution.exit();
        outcome
    }

    fn verify(&self, container: &dyn Container) -> DependencyResult<()> {
        let context = self.context(container);
        for dependency in self.provide.dependencies() {
            if !Parameter::Default.is_resolvable(&context, dependency)? {
                return Err(DependencyError::unsatisfiable(
                    self.key.to_string(),
                    dependency.label(),
                ));
            }
        }
        Ok(())
    }

    fn dependencies(&self, container: &dyn Container) -> DependencyResult<Vec<Key>> {
        let mut keys = Vec::new();
        for dependency in self.provide.dependencies() {
            if dependency.shape == Shape::Collection {
                keys.extend(
                    container
                        .component_adapters()
                        .iter()
                        .filter(|adapter| adapter.key() != &self.key)
                        .filter(|adapter| {
                            adapter.component_type().is_assignable_to(&dependency.target)
                        })
                        .map(|adapter| adapter.key().clone()),
                );
                continue;
            }
            let hint = if self.use_names { dependency.name() } else { None };
            if let Some(adapter) =
                container.local_adapter_of_type(&dependency.target, Some(&self.key), hint)?
            {
                keys.push(adapter.key().clone());
            }
        }
        Ok(keys)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
