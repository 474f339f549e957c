//! 组件解析的集成测试

use di_abstractions::{
    change_monitor, AdapterKind, Characteristic, Constructor, Container, ContainerExt,
    DescribeComponent, Implementation, Key, MonitorStrategy, MutableContainer,
    MutableContainerExt, Parameter, Registration,
};
use di_impl::{
    Access, AccessControlledContainer, BehaviorSpec, Cached, ContainerBuilder, DefaultContainer,
    ImmutableContainer, LifecycleComponentMonitor, ScopeGrants, Synchronized,
};
use infrastructure_common::DependencyError;
use std::sync::{Arc, OnceLock};

trait Repository: Send + Sync {
    fn table(&self) -> &str;
}

#[derive(Default)]
struct OrderRepository;

impl Repository for OrderRepository {
    fn table(&self) -> &str {
        "orders"
    }
}

#[derive(Default)]
struct CustomerRepository;

impl Repository for CustomerRepository {
    fn table(&self) -> &str {
        "customers"
    }
}

struct OrderService {
    repository: Arc<dyn Repository>,
}

fn orders() -> Implementation<OrderRepository> {
    Implementation::<OrderRepository>::new()
        .default_constructor()
        .provides::<dyn Repository>(|r| r)
}

fn customers() -> Implementation<CustomerRepository> {
    Implementation::<CustomerRepository>::new()
        .default_constructor()
        .provides::<dyn Repository>(|r| r)
}

fn order_service() -> Implementation<OrderService> {
    Implementation::<OrderService>::new().constructor(
        Constructor::new("with_repository")
            .arg::<dyn Repository>("repository")
            .build(|args| {
                Ok(OrderService {
                    repository: args.next::<dyn Repository>()?,
                })
            }),
    )
}

#[test]
fn test_dependency_is_the_cached_instance() -> anyhow::Result<()> {
    let container = DefaultContainer::new();
    container
        .register(Registration::new(Key::of::<dyn Repository>(), orders()))?
        .register(Registration::new(Key::of::<OrderService>(), order_service()))?;

    let service = container.get::<OrderService>()?.expect("服务应已注册");
    let repository = container.get::<dyn Repository>()?.expect("仓储应已注册");

    assert!(Arc::ptr_eq(&service.repository, &repository));
    assert_eq!(service.repository.table(), "orders");
    Ok(())
}

#[test]
fn test_cached_component_is_identical_across_lookups() -> anyhow::Result<()> {
    let container = DefaultContainer::new();
    container.register(Registration::new(Key::of::<OrderRepository>(), orders()))?;

    let first = container.get::<OrderRepository>()?.unwrap();
    let second = container.get::<OrderRepository>()?.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    Ok(())
}

#[test]
fn test_no_cache_builds_a_new_instance_per_lookup() -> anyhow::Result<()> {
    let container = DefaultContainer::new();
    container.register(
        Registration::new(Key::of::<OrderRepository>(), orders()).with(Characteristic::NoCache),
    )?;

    let first = container.get::<OrderRepository>()?.unwrap();
    let second = container.get::<OrderRepository>()?.unwrap();
    assert!(!Arc::ptr_eq(&first, &second));

    let adapter = container
        .component_adapter(&Key::of::<OrderRepository>())
        .unwrap();
    assert!(adapter.find_adapter_of_type::<Cached>().is_none());
    Ok(())
}

#[test]
fn test_same_typed_components_are_ambiguous_by_type() -> anyhow::Result<()> {
    let container = DefaultContainer::new();
    container
        .register(Registration::new("orders", orders()))?
        .register(Registration::new("customers", customers()))?;

    let result = container.get::<dyn Repository>();
    match result {
        Err(DependencyError::AmbiguousResolution { candidates, .. }) => {
            assert_eq!(candidates.len(), 2);
        }
        other => panic!("期望歧义错误, 实际: {:?}", other.map(|found| found.is_some())),
    }

    // 按键查找不受影响
    let customers = container.get_named::<dyn Repository>("customers")?.unwrap();
    assert_eq!(customers.table(), "customers");
    Ok(())
}

#[test]
fn test_use_names_matches_parameter_name_to_key() -> anyhow::Result<()> {
    let container = DefaultContainer::new();
    container
        .register(Registration::new("orders", orders()))?
        .register(Registration::new("repository", customers()))?;

    container.register(Registration::new(Key::of::<OrderService>(), order_service()))?;
    assert!(matches!(
        container.get::<OrderService>(),
        Err(DependencyError::AmbiguousResolution { .. })
    ));

    container.remove_component(&Key::of::<OrderService>())?;
    container.register(
        Registration::new(Key::of::<OrderService>(), order_service())
            .with(Characteristic::UseNames),
    )?;
    let service = container.get::<OrderService>()?.unwrap();
    assert_eq!(service.repository.table(), "customers");
    Ok(())
}

#[test]
fn test_explicit_key_parameter_selects_dependency() -> anyhow::Result<()> {
    let container = DefaultContainer::new();
    container
        .register(Registration::new("orders", orders()))?
        .register(Registration::new("customers", customers()))?
        .add_component(
            Key::of::<OrderService>(),
            order_service(),
            vec![Parameter::key("orders")],
        )?;

    let service = container.get::<OrderService>()?.unwrap();
    assert_eq!(service.repository.table(), "orders");
    Ok(())
}

struct Greeting {
    text: Arc<String>,
}

#[test]
fn test_constant_parameter_is_passed_through() -> anyhow::Result<()> {
    let greeting = Implementation::<Greeting>::new().constructor(
        Constructor::new("with_text")
            .arg::<String>("text")
            .build(|args| {
                Ok(Greeting {
                    text: args.next::<String>()?,
                })
            }),
    );
    let container = DefaultContainer::new();
    container.add_component(
        Key::of::<Greeting>(),
        greeting,
        vec![Parameter::constant("你好".to_string())],
    )?;

    assert_eq!(container.get::<Greeting>()?.unwrap().text.as_str(), "你好");
    Ok(())
}

#[derive(Default)]
struct Clock;

#[derive(Default)]
struct Feed;

struct Dashboard {
    constructor: &'static str,
}

fn dashboard() -> Implementation<Dashboard> {
    Implementation::<Dashboard>::new()
        .constructor(Constructor::new("empty").build(|_| {
            Ok(Dashboard {
                constructor: "empty",
            })
        }))
        .constructor(Constructor::new("with_clock").arg::<Clock>("clock").build(|args| {
            args.next::<Clock>()?;
            Ok(Dashboard {
                constructor: "with_clock",
            })
        }))
        .constructor(
            Constructor::new("with_clock_and_feed")
                .arg::<Clock>("clock")
                .arg::<Feed>("feed")
                .build(|args| {
                    args.next::<Clock>()?;
                    args.next::<Feed>()?;
                    Ok(Dashboard {
                        constructor: "with_clock_and_feed",
                    })
                }),
        )
}

#[test]
fn test_greediest_satisfiable_constructor_wins() -> anyhow::Result<()> {
    let container = DefaultContainer::new();
    container
        .add_instance(Clock)?
        .register(Registration::new(Key::of::<Dashboard>(), dashboard()))?;
    assert_eq!(container.get::<Dashboard>()?.unwrap().constructor, "with_clock");

    let richer = DefaultContainer::new();
    richer
        .add_instance(Clock)?
        .add_instance(Feed)?
        .register(Registration::new(Key::of::<Dashboard>(), dashboard()))?;
    assert_eq!(
        richer.get::<Dashboard>()?.unwrap().constructor,
        "with_clock_and_feed"
    );

    let bare = DefaultContainer::new();
    bare.register(Registration::new(Key::of::<Dashboard>(), dashboard()))?;
    assert_eq!(bare.get::<Dashboard>()?.unwrap().constructor, "empty");
    Ok(())
}

#[test]
fn test_equally_greedy_constructors_are_ambiguous() -> anyhow::Result<()> {
    let split = Implementation::<Dashboard>::new()
        .constructor(Constructor::new("from_clock").arg::<Clock>("clock").build(|_| {
            Ok(Dashboard {
                constructor: "from_clock",
            })
        }))
        .constructor(Constructor::new("from_feed").arg::<Feed>("feed").build(|_| {
            Ok(Dashboard {
                constructor: "from_feed",
            })
        }));
    let container = DefaultContainer::new();
    container
        .add_instance(Clock)?
        .add_instance(Feed)?
        .register(Registration::new(Key::of::<Dashboard>(), split))?;

    assert!(matches!(
        container.get::<Dashboard>(),
        Err(DependencyError::AmbiguousResolution { .. })
    ));
    Ok(())
}

#[test]
fn test_missing_dependency_is_unsatisfiable() -> anyhow::Result<()> {
    let container = DefaultContainer::new();
    container.register(Registration::new(Key::of::<OrderService>(), order_service()))?;

    assert!(matches!(
        container.get::<OrderService>(),
        Err(DependencyError::UnsatisfiableDependency { .. })
    ));
    let errors = container.verify().unwrap_err();
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        errors[0],
        DependencyError::UnsatisfiableDependency { .. }
    ));
    Ok(())
}

struct Auditor {
    repositories: Vec<Arc<dyn Repository>>,
}

#[test]
fn test_collection_parameter_gathers_all_assignable_components() -> anyhow::Result<()> {
    let auditor = Implementation::<Auditor>::new().constructor(
        Constructor::new("with_repositories")
            .all::<dyn Repository>("repositories")
            .build(|args| {
                Ok(Auditor {
                    repositories: args.next_all::<dyn Repository>()?,
                })
            }),
    );
    let container = DefaultContainer::new();
    container
        .register(Registration::new("orders", orders()))?
        .register(Registration::new("customers", customers()))?
        .register(Registration::new(Key::of::<Auditor>(), auditor))?;

    let auditor = container.get::<Auditor>()?.unwrap();
    let mut tables: Vec<&str> = auditor
        .repositories
        .iter()
        .map(|repository| repository.table())
        .collect();
    tables.sort_unstable();
    assert_eq!(tables, vec!["customers", "orders"]);
    Ok(())
}

struct Chicken {
    _egg: Arc<Egg>,
}

struct Egg {
    _chicken: Arc<Chicken>,
}

#[test]
fn test_constructor_cycle_is_rejected() -> anyhow::Result<()> {
    let chicken = Implementation::<Chicken>::new().constructor(
        Constructor::new("from_egg").arg::<Egg>("egg").build(|args| {
            Ok(Chicken {
                _egg: args.next::<Egg>()?,
            })
        }),
    );
    let egg = Implementation::<Egg>::new().constructor(
        Constructor::new("from_chicken")
            .arg::<Chicken>("chicken")
            .build(|args| {
                Ok(Egg {
                    _chicken: args.next::<Chicken>()?,
                })
            }),
    );
    let container = DefaultContainer::new();
    container
        .register(Registration::new(Key::of::<Chicken>(), chicken))?
        .register(Registration::new(Key::of::<Egg>(), egg))?;

    assert!(matches!(
        container.get::<Chicken>(),
        Err(DependencyError::CircularDependency { .. })
    ));
    assert!(container.verify().is_err());
    // 失败的解析不会留下半成品
    assert_eq!(container.stats().instantiated_components, 0);
    Ok(())
}

#[derive(Default)]
struct Husband {
    wife: OnceLock<Arc<Wife>>,
}

#[derive(Default)]
struct Wife {
    husband: OnceLock<Arc<Husband>>,
}

fn husband() -> Implementation<Husband> {
    Implementation::<Husband>::new()
        .default_constructor()
        .setter::<Wife>("set_wife", |husband, wife| {
            let _ = husband.wife.set(wife);
            Ok(())
        })
}

fn wife() -> Implementation<Wife> {
    Implementation::<Wife>::new()
        .default_constructor()
        .setter::<Husband>("set_husband", |wife, husband| {
            let _ = wife.husband.set(husband);
            Ok(())
        })
}

#[test]
fn test_setter_cycle_without_opt_in_is_rejected() -> anyhow::Result<()> {
    let container = DefaultContainer::new();
    container
        .register(Registration::new(Key::of::<Husband>(), husband()))?
        .register(Registration::new(Key::of::<Wife>(), wife()))?;

    assert!(matches!(
        container.get::<Husband>(),
        Err(DependencyError::CircularDependency { .. })
    ));
    Ok(())
}

#[test]
fn test_setter_cycle_with_circular_enabled_resolves_both_sides() -> anyhow::Result<()> {
    let container = DefaultContainer::new();
    container
        .register(
            Registration::new(Key::of::<Husband>(), husband()).with(Characteristic::EnableCircular),
        )?
        .register(Registration::new(Key::of::<Wife>(), wife()).with(Characteristic::EnableCircular))?;

    let husband = container.get::<Husband>()?.unwrap();
    let wife = husband.wife.get().expect("妻子应已注入");
    let back = wife.husband.get().expect("丈夫应已注入");

    assert!(Arc::ptr_eq(&husband, back));
    assert!(Arc::ptr_eq(wife, &container.get::<Wife>()?.unwrap()));
    assert!(container.verify().is_ok());
    Ok(())
}

struct Mailer;

#[derive(Default)]
struct Notifier {
    mailer: OnceLock<Arc<Mailer>>,
}

#[test]
fn test_circular_component_with_unsatisfiable_setter_is_never_cached() -> anyhow::Result<()> {
    let container = DefaultContainer::new();
    container.register(
        Registration::new(
            Key::of::<Notifier>(),
            Implementation::<Notifier>::new()
                .default_constructor()
                .setter::<Mailer>("set_mailer", |notifier, mailer| {
                    let _ = notifier.mailer.set(mailer);
                    Ok(())
                }),
        )
        .with(Characteristic::EnableCircular),
    )?;

    // 第二次请求不能拿到未注入 setter 的实例
    for _ in 0..2 {
        assert!(matches!(
            container.get::<Notifier>(),
            Err(DependencyError::UnsatisfiableDependency { .. })
        ));
    }
    let adapter = container.component_adapter(&Key::of::<Notifier>()).unwrap();
    assert!(!adapter.find_adapter_of_type::<Cached>().unwrap().is_cached());
    Ok(())
}

#[test]
fn test_failed_deferred_setter_leaves_no_half_built_cycle() -> anyhow::Result<()> {
    let container = DefaultContainer::new();
    container
        .register(
            Registration::new(Key::of::<Husband>(), husband()).with(Characteristic::EnableCircular),
        )?
        .register(
            Registration::new(
                Key::of::<Wife>(),
                Implementation::<Wife>::new()
                    .default_constructor()
                    .setter::<Husband>("set_husband", |_, _| Err("拒绝注入".into())),
            )
            .with(Characteristic::EnableCircular),
        )?;

    for _ in 0..2 {
        assert!(matches!(
            container.get::<Husband>(),
            Err(DependencyError::InvocationFailed { .. })
        ));
    }
    for key in [Key::of::<Husband>(), Key::of::<Wife>()] {
        let adapter = container.component_adapter(&key).unwrap();
        assert!(!adapter.find_adapter_of_type::<Cached>().unwrap().is_cached());
    }
    Ok(())
}

#[test]
fn test_per_key_policy_hides_denied_component_from_type_lookups() -> anyhow::Result<()> {
    let inner = DefaultContainer::new();
    inner.add_config("secret", 42_u32)?;
    let policy = |_: &str, key: Option<&Key>, access: Access| {
        access == Access::Read && key != Some(&Key::named("secret"))
    };
    let guarded = AccessControlledContainer::new(inner.clone(), "app", Arc::new(policy));

    assert!(matches!(
        guarded.get_named::<u32>("secret"),
        Err(DependencyError::AccessDenied { .. })
    ));
    assert!(guarded.get::<u32>()?.is_none());
    assert!(guarded.get_all::<u32>()?.is_empty());
    assert!(guarded.components()?.is_empty());

    inner.add_config("public", 7_u32)?;
    assert_eq!(*guarded.get::<u32>()?.unwrap(), 7);
    let visible: Vec<u32> = guarded.get_all::<u32>()?.iter().map(|value| **value).collect();
    assert_eq!(visible, vec![7]);
    assert_eq!(guarded.components()?.len(), 1);
    Ok(())
}

#[test]
fn test_removed_component_is_not_found() -> anyhow::Result<()> {
    let container = DefaultContainer::new();
    container.register(Registration::new(Key::of::<OrderRepository>(), orders()))?;
    container.get::<OrderRepository>()?;

    let removed = container.remove_component(&Key::of::<OrderRepository>())?;
    assert!(removed.is_some());
    assert!(container.get::<OrderRepository>()?.is_none());
    assert!(container.component(&Key::of::<OrderRepository>())?.is_none());
    assert!(container
        .remove_component(&Key::of::<OrderRepository>())?
        .is_none());
    Ok(())
}

#[test]
fn test_explicit_chain_walks_caching_before_synchronizing() -> anyhow::Result<()> {
    let container = ContainerBuilder::new()
        .with_behaviors(vec![BehaviorSpec::Caching, BehaviorSpec::Synchronizing])
        .build()?;
    container.register(Registration::new(Key::of::<OrderRepository>(), orders()))?;

    let adapter = container
        .component_adapter(&Key::of::<OrderRepository>())
        .unwrap();
    assert!(adapter.find_adapter_of_type::<Cached>().is_some());
    assert!(adapter.find_adapter_of_type::<Synchronized>().is_some());

    let position = |kind: AdapterKind| adapter.chain().position(|link| link.kind() == kind);
    let caching = position(AdapterKind::Cached).unwrap();
    let synchronizing = position(AdapterKind::Synchronized).unwrap();
    assert!(caching < synchronizing);
    assert!(adapter.injector().is_some());
    Ok(())
}

#[test]
fn test_child_container_resolves_through_parent() -> anyhow::Result<()> {
    let parent = DefaultContainer::new();
    parent.register(Registration::new(Key::of::<dyn Repository>(), orders()))?;
    let child = parent.make_child_container()?;
    child.register(Registration::new(Key::of::<OrderService>(), order_service()))?;

    let service = child.get::<OrderService>()?.unwrap();
    let shared = parent.get::<dyn Repository>()?.unwrap();
    assert!(Arc::ptr_eq(&service.repository, &shared));
    assert!(parent.get::<OrderService>()?.is_none());
    Ok(())
}

#[test]
fn test_change_monitor_walks_delegates_and_children() -> anyhow::Result<()> {
    let parent = DefaultContainer::new();
    let child = parent.make_child_container()?;
    let facade = AccessControlledContainer::new(
        parent.clone(),
        "ops",
        Arc::new(ScopeGrants::new().grant("ops", Access::Write)),
    );

    let monitor = Arc::new(LifecycleComponentMonitor::new());
    change_monitor(&facade, monitor.clone())?;

    let expected = Arc::as_ptr(&monitor).cast::<()>();
    assert_eq!(Arc::as_ptr(&parent.monitor()).cast::<()>(), expected);
    assert_eq!(Arc::as_ptr(&child.current_monitor()).cast::<()>(), expected);
    Ok(())
}

#[test]
fn test_change_monitor_fails_on_read_only_view() -> anyhow::Result<()> {
    let view = ImmutableContainer::new(DefaultContainer::new());
    let result = change_monitor(&view, Arc::new(LifecycleComponentMonitor::new()));

    assert!(matches!(
        result,
        Err(DependencyError::MonitorStrategyNotFound { .. })
    ));
    Ok(())
}
