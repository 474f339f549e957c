//! 注入器
//!
//! 注入器是适配器链的最内层：选择构造函数、解析实参、构造实例，
//! 然后按注入方式填充 setter、字段和注入方法。

mod factory;
mod provider;

pub use factory::InjectionFactory;
pub use provider::ProviderAdapter;

use di_abstractions::{
    AdapterKind, Arguments, ComponentAdapter, ComponentRecipe, ComponentType, Constructor,
    Container, Dependency, InjectionType, Instance, Key, Member, MemberKind, Parameter,
    ParameterContext, PendingPopulation, Resolution, Shape,
};
use infrastructure_common::{DependencyError, DependencyResult};
use std::any::Any;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

static DEFAULT_PARAMETER: Parameter = Parameter::Default;

/// 按配方构造组件的注入器
#[derive(Clone)]
pub struct Injector {
    key: Key,
    recipe: Arc<ComponentRecipe>,
    component_type: Arc<ComponentType>,
    parameters: Option<Arc<[Parameter]>>,
    injection: InjectionType,
    use_names: bool,
    enable_circular: bool,
}

impl Injector {
    /// 创建注入器
    pub fn new(
        key: Key,
        recipe: ComponentRecipe,
        parameters: Option<Vec<Parameter>>,
        injection: InjectionType,
    ) -> Self {
        let component_type = Arc::new(recipe.component_type().clone());
        Self {
            key,
            recipe: Arc::new(recipe),
            component_type,
            parameters: parameters.map(Arc::from),
            injection,
            use_names: false,
            enable_circular: false,
        }
    }

    /// 按参数名称消歧
    pub fn with_use_names(mut self, enabled: bool) -> Self {
        self.use_names = enabled;
        self
    }

    /// 允许 setter 循环依赖
    pub fn with_circular(mut self, enabled: bool) -> Self {
        self.enable_circular = enabled;
        self
    }

    /// 注入方式
    pub fn injection(&self) -> InjectionType {
        self.injection
    }

    /// 是否允许循环依赖
    pub fn allows_circular(&self) -> bool {
        self.enable_circular
    }

    /// 在不构造实例的前提下选出将要使用的构造函数
    pub fn select_constructor(&self, container: &dyn Container) -> DependencyResult<Constructor> {
        let context = self.context(container);
        self.greediest_satisfiable(&context)
    }

    fn context<'a>(&'a self, container: &'a dyn Container) -> ParameterContext<'a> {
        ParameterContext::new(container, &self.key, self.use_names)
    }

    fn parameter(&self, index: usize) -> &Parameter {
        self.parameters
            .as_deref()
            .and_then(|parameters| parameters.get(index))
            .unwrap_or(&DEFAULT_PARAMETER)
    }

    /// 在参数数量匹配的候选中选择可满足且参数最多的构造函数
    fn greediest_satisfiable(&self, context: &ParameterContext<'_>) -> DependencyResult<Constructor> {
        let explicit = self.parameters.as_deref().map(<[Parameter]>::len);
        let mut candidates: Vec<&Constructor> = self
            .recipe
            .constructors()
            .iter()
            .filter(|constructor| explicit.map_or(true, |count| constructor.arity() == count))
            .collect();
        if candidates.is_empty() {
            let missing = match explicit {
                Some(count) => format!("接受 {count} 个参数的构造函数"),
                None => "构造函数".to_string(),
            };
            return Err(DependencyError::unsatisfiable(self.key.to_string(), missing));
        }
        candidates.sort_by(|a, b| b.arity().cmp(&a.arity()));

        let mut satisfied: Vec<&Constructor> = Vec::new();
        let mut first_missing: Option<DependencyError> = None;
        for constructor in candidates {
            if satisfied
                .first()
                .is_some_and(|best| constructor.arity() < best.arity())
            {
                break;
            }
            match self.first_unsatisfied(context, constructor.dependencies(), true)? {
                None => satisfied.push(constructor),
                Some(missing) => {
                    first_missing.get_or_insert(missing);
                }
            }
        }

        match satisfied.as_slice() {
            [] => Err(first_missing.unwrap_or_else(|| {
                DependencyError::unsatisfiable(self.key.to_string(), "可满足的构造函数")
            })),
            [only] => Ok((*only).clone()),
            tied => Err(DependencyError::AmbiguousResolution {
                requested: self.key.to_string(),
                candidates: tied.iter().map(ToString::to_string).collect(),
            }),
        }
    }

    fn first_unsatisfied(
        &self,
        context: &ParameterContext<'_>,
        dependencies: &[Dependency],
        explicit: bool,
    ) -> DependencyResult<Option<DependencyError>> {
        for (index, dependency) in dependencies.iter().enumerate() {
            let parameter = if explicit {
                self.parameter(index)
            } else {
                &DEFAULT_PARAMETER
            };
            if !parameter.is_resolvable(context, dependency)? {
                return Ok(Some(DependencyError::unsatisfiable(
                    self.key.to_string(),
                    dependency.label(),
                )));
            }
        }
        Ok(None)
    }

    fn resolve_arguments(
        &self,
        context: &ParameterContext<'_>,
        dependencies: &[Dependency],
        explicit: bool,
        resolution: &mut Resolution,
    ) -> DependencyResult<Arguments> {
        let mut values = Vec::with_capacity(dependencies.len());
        for (index, dependency) in dependencies.iter().enumerate() {
            let parameter = if explicit {
                self.parameter(index)
            } else {
                &DEFAULT_PARAMETER
            };
            values.push(parameter.resolve(context, dependency, resolution)?);
        }
        Ok(Arguments::new(self.component_type.implementation(), values))
    }

    fn instantiate(
        &self,
        container: &dyn Container,
        resolution: &mut Resolution,
    ) -> DependencyResult<Instance> {
        let context = self.context(container);
        let selected = self.greediest_satisfiable(&context)?;
        let monitor = container.current_monitor();
        let constructor = monitor
            .instantiating(container, self, &selected)
            .unwrap_or(selected);

        let mut arguments =
            self.resolve_arguments(&context, constructor.dependencies(), true, resolution)?;
        let started = Instant::now();
        match constructor.invoke(&mut arguments) {
            Ok(value) => {
                let instance = Instance::from_parts(value, Arc::clone(&self.component_type));
                let elapsed = started.elapsed();
                monitor.instantiated(container, self, &constructor, &instance, elapsed);
                debug!("构造组件 {} 使用 {}, 耗时 {:?}", self.key, constructor, elapsed);
                Ok(instance)
            }
            Err(source) => {
                monitor.instantiation_failed(container, self, &constructor, source.as_ref());
                Err(DependencyError::InstantiationFailed {
                    type_name: self.component_type.implementation().to_string(),
                    source,
                })
            }
        }
    }

    fn injects(&self, member: &Member) -> bool {
        match self.injection {
            InjectionType::Constructor => false,
            InjectionType::Setter => member.kind() == MemberKind::Setter,
            InjectionType::Field => member.kind() == MemberKind::Field,
            InjectionType::Method => member.kind() == MemberKind::Method,
            InjectionType::Composite => true,
        }
    }

    fn first_unsatisfied_member(
        &self,
        context: &ParameterContext<'_>,
    ) -> DependencyResult<Option<DependencyError>> {
        for member in self.members() {
            if let Some(missing) = self.first_unsatisfied(context, member.dependencies(), false)? {
                return Ok(Some(missing));
            }
        }
        Ok(None)
    }

    fn members(&self) -> impl Iterator<Item = &Member> + '_ {
        self.recipe
            .members()
            .iter()
            .filter(move |member| self.injects(member))
    }

    /// 把成员依赖注入到已分配的实例
    fn populate(
        &self,
        container: &dyn Container,
        instance: &Instance,
        resolution: &mut Resolution,
    ) -> DependencyResult<()> {
        let context = self.context(container);
        let monitor = container.current_monitor();
        for member in self.members() {
            let mut arguments =
                self.resolve_arguments(&context, member.dependencies(), false, resolution)?;

            monitor.invoking(container, &self.key, member.name(), instance);
            let started = Instant::now();
            match instance.dispatch(|| member.apply(instance, &mut arguments)) {
                Ok(()) => {
                    monitor.invoked(container, &self.key, member.name(), instance, started.elapsed());
                }
                Err(source) => {
                    monitor.invocation_failed(
                        container,
                        &self.key,
                        member.name(),
                        instance,
                        source.as_ref(),
                    );
                    return Err(DependencyError::InvocationFailed {
                        type_name: self.component_type.implementation().to_string(),
                        member: member.name().to_string(),
                        source,
                    });
                }
            }
        }
        Ok(())
    }

    fn instantiate_and_populate(
        &self,
        container: &dyn Container,
        resolution: &mut Resolution,
    ) -> DependencyResult<Instance> {
        // 延迟填充前成员依赖必须全部可满足
        if self.enable_circular {
            if let Some(missing) = self.first_unsatisfied_member(&self.context(container))? {
                return Err(missing);
            }
        }

        let instance = self.instantiate(container, resolution)?;
        if self.members().next().is_none() {
            return Ok(instance);
        }

        if self.enable_circular {
            if let Some(shared) = container.shared() {
                resolution.record_allocated(container.id(), &self.key, instance.clone());
                resolution.defer(Box::new(DeferredPopulation {
                    injector: self.clone(),
                    container: shared,
                    instance: instance.clone(),
                }));
                return Ok(instance);
            }
        }

        self.populate(container, &instance, resolution)?;
        Ok(instance)
    }

    fn dependency_keys(
        &self,
        container: &dyn Container,
        dependencies: &[Dependency],
        explicit: bool,
    ) -> DependencyResult<Vec<Key>> {
        let mut keys = Vec::new();
        for (index, dependency) in dependencies.iter().enumerate() {
            let parameter = if explicit {
                self.parameter(index)
            } else {
                &DEFAULT_PARAMETER
            };
            match parameter {
                Parameter::Key(key) => keys.push(key.clone()),
                Parameter::Constant(_) => {}
                Parameter::Default if dependency.shape != Shape::Collection => {
                    let hint = if self.use_names { dependency.name() } else { None };
                    if let Some(adapter) =
                        container.local_adapter_of_type(&dependency.target, Some(&self.key), hint)?
                    {
                        keys.push(adapter.key().clone());
                    }
                }
                Parameter::Default | Parameter::Collect { .. } => {
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
                }
            }
        }
        Ok(keys)
    }
}

impl ComponentAdapter for Injector {
    fn key(&self) -> &Key {
        &self.key
    }

    fn component_type(&self) -> &ComponentType {
        &self.component_type
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::Injector(self.injection)
    }

    fn resolve(
        &self,
        container: &dyn Container,
        resolution: &mut Resolution,
    ) -> DependencyResult<Instance> {
        if self.enable_circular {
            if let Some(allocated) = resolution.allocated(container.id(), &self.key) {
                trace!("返回已分配但尚未填充的组件: {}", self.key);
                return Ok(allocated);
            }
        }

        resolution.enter(container.id(), &self.key)?;
        let outcome = self.instantiate_and_populate(container, resolution);
        resolution.exit();
        outcome
    }

    fn verify(&self, container: &dyn Container) -> DependencyResult<()> {
        let context = self.context(container);
        self.greediest_satisfiable(&context)?;
        match self.first_unsatisfied_member(&context)? {
            Some(missing) => Err(missing),
            None => Ok(()),
        }
    }

    fn dependencies(&self, container: &dyn Container) -> DependencyResult<Vec<Key>> {
        let constructor = self.select_constructor(container)?;
        let mut keys = self.dependency_keys(container, constructor.dependencies(), true)?;
        // 允许循环时成员依赖不会形成构造期的环
        if !self.enable_circular {
            for member in self.members() {
                keys.extend(self.dependency_keys(container, member.dependencies(), false)?);
            }
        }
        Ok(keys)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// 延迟的成员填充
struct DeferredPopulation {
    injector: Injector,
    container: Arc<dyn Container>,
    instance: Instance,
}

impl PendingPopulation for DeferredPopulation {
    fn populate(self: Box<Self>, resolution: &mut Resolution) -> Result<(), DependencyError> {
        trace!("填充延迟的组件: {}", self.injector.key);
        self.injector
            .populate(self.container.as_container(), &self.instance, resolution)
    }

    fn describe(&self) -> String {
        self.injector.key.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ContainerBuilder;
    use crate::container::DefaultContainer;
    use di_abstractions::{
        Characteristic, ComponentMonitor, ContainerConfig, ContainerExt, Implementation,
        MutableContainer, MutableContainerExt, Registration,
    };
    use infrastructure_common::BoxError;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Gauge {
        injected: Mutex<Vec<&'static str>>,
    }

    impl Gauge {
        fn record(&self, member: &'static str) {
            self.injected.lock().push(member);
        }

        fn injected(&self) -> Vec<&'static str> {
            self.injected.lock().clone()
        }
    }

    fn gauge() -> Implementation<Gauge> {
        Implementation::<Gauge>::new()
            .default_constructor()
            .setter::<u32>("set_limit", |gauge, _| {
                gauge.record("setter");
                Ok(())
            })
            .field::<u32>("limit", |gauge, _| {
                gauge.record("field");
                Ok(())
            })
            .method(
                Member::method("init")
                    .arg::<u32>("limit")
                    .build(|gauge: &Gauge, args| {
                        args.next::<u32>()?;
                        gauge.record("method");
                        Ok(())
                    }),
            )
    }

    fn injected_with(characteristic: Option<Characteristic>) -> Vec<&'static str> {
        let container = DefaultContainer::new();
        container.add_config("limit", 5_u32).unwrap();
        let registration = Registration::new(Key::of::<Gauge>(), gauge());
        let registration = match characteristic {
            Some(characteristic) => registration.with(characteristic),
            None => registration,
        };
        container.register(registration).unwrap();
        container.get::<Gauge>().unwrap().unwrap().injected()
    }

    #[test]
    fn test_members_present_select_composite_injection() {
        assert_eq!(injected_with(None), vec!["setter", "field", "method"]);

        let container = DefaultContainer::new();
        container
            .register(Registration::new(Key::of::<Gauge>(), gauge()))
            .unwrap();
        let adapter = container.component_adapter(&Key::of::<Gauge>()).unwrap();
        assert_eq!(
            adapter.injector().map(|injector| injector.kind()),
            Some(AdapterKind::Injector(InjectionType::Composite))
        );
    }

    #[test]
    fn test_characteristics_force_injection_type() {
        assert!(injected_with(Some(Characteristic::Cdi)).is_empty());
        assert_eq!(injected_with(Some(Characteristic::Sdi)), vec!["setter"]);
        assert_eq!(
            injected_with(Some(Characteristic::FieldInjection)),
            vec!["field"]
        );
        assert_eq!(
            injected_with(Some(Characteristic::MethodInjection)),
            vec!["method"]
        );
    }

    struct Fragile;

    #[test]
    fn test_constructor_failure_keeps_cause() {
        let container = DefaultContainer::new();
        container
            .register(Registration::new(
                Key::of::<Fragile>(),
                Implementation::<Fragile>::new().constructor(
                    Constructor::new("new")
                        .build(|_| -> Result<Fragile, BoxError> { Err("磁盘已满".into()) }),
                ),
            ))
            .unwrap();

        match container.get::<Fragile>() {
            Err(DependencyError::InstantiationFailed { source, .. }) => {
                assert_eq!(source.to_string(), "磁盘已满");
            }
            other => panic!("期望构造失败, 实际: {:?}", other.map(|found| found.is_some())),
        }
    }

    #[test]
    fn test_member_failure_names_member() {
        let container = DefaultContainer::new();
        container.add_config("limit", 5_u32).unwrap();
        container
            .register(Registration::new(
                Key::of::<Gauge>(),
                Implementation::<Gauge>::new()
                    .default_constructor()
                    .setter::<u32>("set_limit", |_, _| Err("超出范围".into())),
            ))
            .unwrap();

        match container.get::<Gauge>() {
            Err(DependencyError::InvocationFailed { member, .. }) => {
                assert_eq!(member, "set_limit");
            }
            other => panic!("期望调用失败, 实际: {:?}", other.map(|found| found.is_some())),
        }
    }

    #[test]
    fn test_invalid_recipes_are_rejected_at_registration() {
        let container = DefaultContainer::new();
        let no_constructor =
            container.register(Registration::new(Key::of::<Gauge>(), Implementation::<Gauge>::new()));
        assert!(matches!(
            no_constructor,
            Err(DependencyError::RegistrationError { .. })
        ));

        // 键的类型不是组件声明的契约
        let wrong_key = container.register(Registration::new(Key::of::<String>(), gauge()));
        assert!(matches!(
            wrong_key,
            Err(DependencyError::RegistrationError { .. })
        ));
    }

    struct Substituting;

    impl ComponentMonitor for Substituting {
        fn instantiating(
            &self,
            _container: &dyn Container,
            _adapter: &dyn ComponentAdapter,
            _constructor: &Constructor,
        ) -> Option<Constructor> {
            Some(Constructor::new("substitute").build(|_| {
                let gauge = Gauge::default();
                gauge.record("substitute");
                Ok(gauge)
            }))
        }
    }

    #[test]
    fn test_monitor_can_substitute_constructor() {
        let container = ContainerBuilder::new()
            .with_monitor(Arc::new(Substituting))
            .build()
            .unwrap();
        container
            .register(Registration::new(Key::of::<Gauge>(), gauge()).with(Characteristic::Cdi))
            .unwrap();

        let gauge = container.get::<Gauge>().unwrap().unwrap();
        assert_eq!(gauge.injected(), vec!["substitute"]);
    }

    struct Outer {
        _gauge: Arc<Gauge>,
    }

    fn outer() -> Implementation<Outer> {
        Implementation::<Outer>::new().constructor(
            Constructor::new("with_gauge")
                .arg::<Gauge>("gauge")
                .build(|args| {
                    Ok(Outer {
                        _gauge: args.next::<Gauge>()?,
                    })
                }),
        )
    }

    #[test]
    fn test_resolution_depth_is_limited() {
        let shallow = ContainerBuilder::new()
            .with_config(ContainerConfig::default().with_max_resolution_depth(1))
            .build()
            .unwrap();
        shallow
            .register(Registration::new(Key::of::<Gauge>(), gauge()).with(Characteristic::Cdi))
            .unwrap()
            .register(Registration::new(Key::of::<Outer>(), outer()))
            .unwrap();
        assert!(matches!(
            shallow.get::<Outer>(),
            Err(DependencyError::ResolutionDepthExceeded { depth: 1, .. })
        ));

        let deep = DefaultContainer::new();
        deep.register(Registration::new(Key::of::<Gauge>(), gauge()).with(Characteristic::Cdi))
            .unwrap()
            .register(Registration::new(Key::of::<Outer>(), outer()))
            .unwrap();
        assert!(deep.get::<Outer>().unwrap().is_some());
    }

    struct Unregistered;

    #[derive(Default)]
    struct Needy {
        wired: Mutex<bool>,
    }

    #[test]
    fn test_circular_member_with_missing_dependency_fails_before_allocation() {
        let built = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = built.clone();
        let container = DefaultContainer::new();
        container
            .register(
                Registration::new(
                    Key::of::<Needy>(),
                    Implementation::<Needy>::new()
                        .constructor(Constructor::new("new").build(move |_| {
                            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                            Ok(Needy::default())
                        }))
                        .setter::<Unregistered>("set_missing", |needy, _| {
                            *needy.wired.lock() = true;
                            Ok(())
                        }),
                )
                .with(Characteristic::EnableCircular),
            )
            .unwrap();

        for _ in 0..2 {
            assert!(matches!(
                container.get::<Needy>(),
                Err(DependencyError::UnsatisfiableDependency { .. })
            ));
        }
        assert_eq!(built.load(std::sync::atomic::Ordering::SeqCst), 0);
    }
}
