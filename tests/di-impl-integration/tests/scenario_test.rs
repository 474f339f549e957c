//! 按名称注入的端到端场景

use di_abstractions::{
    Characteristic, ContainerExt, DescribeComponent, Implementation, Key, MutableContainer,
    Registration,
};
use di_impl::{ContainerBuilder, DefaultContainer};
use infrastructure_common::DependencyError;
use std::sync::{Arc, OnceLock};

trait Fruit: Send + Sync {
    fn taste(&self) -> String;
}

#[derive(Default)]
struct Apple;

impl Fruit for Apple {
    fn taste(&self) -> String {
        "apple".to_string()
    }
}

#[derive(Default)]
struct Pear;

impl Fruit for Pear {
    fn taste(&self) -> String {
        "pear".to_string()
    }
}

trait Target: Send + Sync {
    fn eat1(&self) -> String;
    fn eat2(&self) -> String;
}

#[derive(Default)]
struct TargetImpl {
    x: OnceLock<Arc<dyn Fruit>>,
    y: OnceLock<Arc<dyn Fruit>>,
}

impl TargetImpl {
    fn eat(slot: &OnceLock<Arc<dyn Fruit>>) -> String {
        slot.get().map(|fruit| fruit.taste()).unwrap_or_default()
    }
}

impl Target for TargetImpl {
    fn eat1(&self) -> String {
        Self::eat(&self.x)
    }

    fn eat2(&self) -> String {
        Self::eat(&self.y)
    }
}

fn apple() -> Implementation<Apple> {
    Implementation::<Apple>::new()
        .default_constructor()
        .provides::<dyn Fruit>(|apple| apple)
}

fn pear() -> Implementation<Pear> {
    Implementation::<Pear>::new()
        .default_constructor()
        .provides::<dyn Fruit>(|pear| pear)
}

fn target() -> Implementation<TargetImpl> {
    Implementation::<TargetImpl>::new()
        .default_constructor()
        .provides::<dyn Target>(|target| target)
        .setter::<dyn Fruit>("set_x", |target, fruit| {
            let _ = target.x.set(fruit);
            Ok(())
        })
        .setter::<dyn Fruit>("set_y", |target, fruit| {
            let _ = target.y.set(fruit);
            Ok(())
        })
}

fn orchard(container: &dyn MutableContainer) -> anyhow::Result<()> {
    container
        .register(Registration::new("x", apple()))?
        .register(Registration::new("y", pear()))?;
    Ok(())
}

#[test]
fn test_setters_are_matched_to_keys_by_name() -> anyhow::Result<()> {
    let container = DefaultContainer::new();
    orchard(&*container)?;
    container.register(
        Registration::new(Key::of::<dyn Target>(), target()).with(Characteristic::UseNames),
    )?;

    let target = container.get::<dyn Target>()?.expect("目标组件应已注册");
    assert_eq!(target.eat1(), "apple");
    assert_eq!(target.eat2(), "pear");
    Ok(())
}

#[test]
fn test_setters_are_ambiguous_without_names() -> anyhow::Result<()> {
    let container = DefaultContainer::new();
    orchard(&*container)?;
    container.register(Registration::new(Key::of::<dyn Target>(), target()))?;

    assert!(matches!(
        container.get::<dyn Target>(),
        Err(DependencyError::AmbiguousResolution { .. })
    ));
    Ok(())
}

#[test]
fn test_container_wide_use_names() -> anyhow::Result<()> {
    let container = ContainerBuilder::new().with_use_names().build()?;
    orchard(&*container)?;
    container.register(Registration::new(Key::of::<dyn Target>(), target()))?;

    let target = container.get::<dyn Target>()?.unwrap();
    assert_eq!(target.eat1(), "apple");
    assert_eq!(target.eat2(), "pear");
    assert!(container.verify().is_ok());
    Ok(())
}
