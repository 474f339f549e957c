//! 容器生命周期的集成测试

use di_abstractions::{
    Characteristic, Constructor, Container, ContainerConfig, ContainerExt, DescribeComponent,
    Implementation, Key, MutableContainer, MutableContainerExt, Registration,
};
use di_impl::{
    CompositeLifecycleStrategy, ContainerBuilder, DefaultContainer, LifecycleComponentMonitor,
    NamingConventionLifecycleStrategy, StartableLifecycleStrategy,
};
use infrastructure_common::{
    BoxError, DependencyError, Disposable, LifecycleOperation, LifecycleState, Startable,
};
use std::sync::{Arc, Mutex};

/// 记录生命周期调用顺序
#[derive(Default)]
struct Journal {
    entries: Mutex<Vec<String>>,
}

impl Journal {
    fn write(&self, entry: impl Into<String>) {
        self.entries.lock().unwrap().push(entry.into());
    }

    fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }
}

struct Service {
    name: &'static str,
    journal: Arc<Journal>,
    fail_on_start: bool,
}

impl Startable for Service {
    fn start(&self) -> Result<(), BoxError> {
        if self.fail_on_start {
            return Err(format!("{} 无法启动", self.name).into());
        }
        self.journal.write(format!("{}.start", self.name));
        Ok(())
    }

    fn stop(&self) -> Result<(), BoxError> {
        self.journal.write(format!("{}.stop", self.name));
        Ok(())
    }
}

impl Disposable for Service {
    fn dispose(&self) -> Result<(), BoxError> {
        self.journal.write(format!("{}.dispose", self.name));
        Ok(())
    }
}

fn service(name: &'static str, fail_on_start: bool) -> Implementation<Service> {
    Implementation::<Service>::new()
        .constructor(
            Constructor::new("with_journal")
                .arg::<Journal>("journal")
                .build(move |args| {
                    Ok(Service {
                        name,
                        journal: args.next::<Journal>()?,
                        fail_on_start,
                    })
                }),
        )
        .startable()
        .disposable()
}

fn journaled(container: &dyn MutableContainer) -> anyhow::Result<Arc<Journal>> {
    container.add_instance(Journal::default())?;
    Ok(container.get::<Journal>()?.expect("日志应已注册"))
}

#[test]
fn test_start_stop_dispose_runs_each_once_in_order() -> anyhow::Result<()> {
    let container = DefaultContainer::new();
    let journal = journaled(&*container)?;
    container.register(Registration::new("db", service("db", false)))?;
    container.component(&Key::named("db"))?;

    container.start()?;
    container.stop()?;
    container.dispose()?;

    assert_eq!(journal.entries(), vec!["db.start", "db.stop", "db.dispose"]);
    assert_eq!(container.lifecycle_state(), LifecycleState::Disposed);
    Ok(())
}

#[test]
fn test_stop_before_start_is_a_state_mismatch() {
    let container = DefaultContainer::new();
    match container.stop() {
        Err(DependencyError::StateMismatch { operation, state }) => {
            assert_eq!(operation, LifecycleOperation::Stop);
            assert_eq!(state, LifecycleState::Constructed);
        }
        other => panic!("期望状态不匹配错误, 实际: {other:?}"),
    }
    assert_eq!(container.lifecycle_state(), LifecycleState::Constructed);
}

#[test]
fn test_container_can_restart_after_stop() -> anyhow::Result<()> {
    let container = DefaultContainer::new();
    let journal = journaled(&*container)?;
    container.register(Registration::new("db", service("db", false)))?;
    container.component(&Key::named("db"))?;

    container.start()?;
    container.stop()?;
    container.start()?;
    assert_eq!(container.lifecycle_state(), LifecycleState::Started);
    assert!(matches!(
        container.dispose(),
        Err(DependencyError::StateMismatch { .. })
    ));
    container.stop()?;
    container.dispose()?;

    assert_eq!(
        journal.entries(),
        vec!["db.start", "db.stop", "db.start", "db.stop", "db.dispose"]
    );
    assert!(matches!(
        container.start(),
        Err(DependencyError::StateMismatch { .. })
    ));
    Ok(())
}

#[test]
fn test_components_stop_in_reverse_order() -> anyhow::Result<()> {
    let container = DefaultContainer::new();
    let journal = journaled(&*container)?;
    container
        .register(Registration::new("db", service("db", false)))?
        .register(Registration::new("cache", service("cache", false)))?;
    container.components()?;

    container.start()?;
    container.stop()?;

    assert_eq!(
        journal.entries(),
        vec!["db.start", "cache.start", "cache.stop", "db.stop"]
    );
    Ok(())
}

#[test]
fn test_unresolved_components_are_not_started() -> anyhow::Result<()> {
    let container = DefaultContainer::new();
    let journal = journaled(&*container)?;
    container.register(Registration::new("db", service("db", false)))?;

    container.start()?;
    assert!(journal.entries().is_empty());
    Ok(())
}

#[test]
fn test_instantiate_on_start_resolves_lifecycle_components() -> anyhow::Result<()> {
    let container = ContainerBuilder::new()
        .with_config(ContainerConfig::default().with_instantiate_on_start(true))
        .build()?;
    let journal = journaled(&*container)?;
    container.register(Registration::new("db", service("db", false)))?;

    container.start()?;
    assert_eq!(journal.entries(), vec!["db.start"]);
    Ok(())
}

#[test]
fn test_automatic_component_starts_without_lookup() -> anyhow::Result<()> {
    let container = DefaultContainer::new();
    let journal = journaled(&*container)?;
    container
        .register(Registration::new("db", service("db", false)).with(Characteristic::Automatic))?;

    container.start()?;
    assert_eq!(journal.entries(), vec!["db.start"]);
    Ok(())
}

#[test]
fn test_default_monitor_aborts_on_first_failure() -> anyhow::Result<()> {
    let container = DefaultContainer::new();
    let journal = journaled(&*container)?;
    container
        .register(Registration::new("broken", service("broken", true)))?
        .register(Registration::new("db", service("db", false)))?;
    container.components()?;

    match container.start() {
        Err(DependencyError::LifecycleInvocationFailed { key, operation, .. }) => {
            assert_eq!(key, Key::named("broken").to_string());
            assert_eq!(operation, LifecycleOperation::Start);
        }
        other => panic!("期望生命周期调用失败, 实际: {other:?}"),
    }
    assert!(journal.entries().is_empty());
    Ok(())
}

#[test]
fn test_collecting_monitor_reports_all_failures() -> anyhow::Result<()> {
    let monitor = Arc::new(LifecycleComponentMonitor::new());
    let container = ContainerBuilder::new().with_monitor(monitor.clone()).build()?;
    let journal = journaled(&*container)?;
    container
        .register(Registration::new("broken", service("broken", true)))?
        .register(Registration::new("db", service("db", false)))?;
    container.components()?;

    match container.start() {
        Err(DependencyError::LifecycleFailures { failures }) => {
            assert_eq!(failures.len(), 1);
        }
        other => panic!("期望批量失败, 实际: {other:?}"),
    }
    assert_eq!(journal.entries(), vec!["db.start"]);
    assert_eq!(container.lifecycle_state(), LifecycleState::Started);
    assert_eq!(monitor.failure_count(), 0);
    Ok(())
}

#[test]
fn test_children_start_after_and_stop_before_parent() -> anyhow::Result<()> {
    let parent = DefaultContainer::new();
    let journal = journaled(&*parent)?;
    parent.register(Registration::new("parent", service("parent", false)))?;
    let child = parent.make_child_container()?;
    child.register(Registration::new("child", service("child", false)))?;
    parent.component(&Key::named("parent"))?;
    child.component(&Key::named("child"))?;

    parent.start()?;
    assert_eq!(child.lifecycle_state(), LifecycleState::Started);
    parent.stop()?;
    parent.dispose()?;

    assert_eq!(
        journal.entries(),
        vec![
            "parent.start",
            "child.start",
            "child.stop",
            "parent.stop",
            "child.dispose",
            "parent.dispose",
        ]
    );
    Ok(())
}

#[test]
fn test_removing_while_started_is_rejected() -> anyhow::Result<()> {
    let container = DefaultContainer::new();
    journaled(&*container)?;
    container.register(Registration::new("db", service("db", false)))?;
    container.start()?;

    assert!(matches!(
        container.remove_component(&Key::named("db")),
        Err(DependencyError::StateMismatch { .. })
    ));
    container.stop()?;
    assert!(container.remove_component(&Key::named("db"))?.is_some());
    Ok(())
}

/// 只声明命名操作的组件
struct Worker {
    journal: Arc<Journal>,
}

fn worker() -> Implementation<Worker> {
    Implementation::<Worker>::new()
        .constructor(
            Constructor::new("with_journal")
                .arg::<Journal>("journal")
                .build(|args| {
                    Ok(Worker {
                        journal: args.next::<Journal>()?,
                    })
                }),
        )
        .operation("open", |worker| {
            worker.journal.write("worker.open");
            Ok(())
        })
        .operation("close", |worker| {
            worker.journal.write("worker.close");
            Ok(())
        })
}

#[test]
fn test_naming_convention_strategy_alongside_contracts() -> anyhow::Result<()> {
    let strategy = CompositeLifecycleStrategy::new(vec![Arc::new(StartableLifecycleStrategy)])
        .with_strategy(Arc::new(
            NamingConventionLifecycleStrategy::new().with_methods("open", "close", "release"),
        ));
    let container = ContainerBuilder::new()
        .with_lifecycle_strategy(Arc::new(strategy))
        .build()?;
    let journal = journaled(&*container)?;
    container
        .register(Registration::new("worker", worker()))?
        .register(Registration::new("db", service("db", false)))?;
    container.components()?;

    container.start()?;
    container.stop()?;

    assert_eq!(
        journal.entries(),
        vec!["worker.open", "db.start", "db.stop", "worker.close"]
    );
    Ok(())
}
