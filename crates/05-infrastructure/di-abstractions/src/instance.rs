//! 组件实例与组件类型描述
//!
//! [`Instance`] 是容器内部流转的类型擦除实例；[`ComponentType`] 记录实现类型、
//! 可暴露的契约（可转换成的 trait 对象）以及按名称调用的无参操作。

use infrastructure_common::{BoxError, Disposable, Startable, TypeInfo};
use parking_lot::ReentrantMutex;
use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// 类型擦除后的组件值
pub type AnyValue = Arc<dyn Any + Send + Sync>;

/// 方法分派锁
pub type DispatchLock = Arc<ReentrantMutex<()>>;

type CastFn = Arc<dyn Fn(&AnyValue) -> Option<Box<dyn Any>> + Send + Sync>;
type OperationFn = Arc<dyn Fn(&AnyValue) -> Result<(), BoxError> + Send + Sync>;

/// 组件契约
///
/// 记录实例可以被视为的一个类型，以及从具体值到该视图的转换。
#[derive(Clone)]
pub struct Contract {
    info: TypeInfo,
    cast: CastFn,
}

impl Contract {
    /// 创建从 `T` 到 `C` 的契约
    pub fn new<T, C>(convert: impl Fn(Arc<T>) -> Arc<C> + Send + Sync + 'static) -> Self
    where
        T: Send + Sync + 'static,
        C: ?Sized + 'static,
    {
        let cast: CastFn = Arc::new(move |value: &AnyValue| {
            let concrete = Arc::clone(value).downcast::<T>().ok()?;
            let view: Arc<C> = convert(concrete);
            Some(Box::new(view) as Box<dyn Any>)
        });
        Self {
            info: TypeInfo::of::<C>(),
            cast,
        }
    }

    /// 契约类型
    pub fn type_info(&self) -> TypeInfo {
        self.info
    }
}

impl fmt::Debug for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Contract").field(&self.info.name).finish()
    }
}

/// 按名称调用的无参操作
#[derive(Clone)]
pub struct NamedOperation {
    name: Arc<str>,
    call: OperationFn,
}

impl NamedOperation {
    /// 操作名称
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for NamedOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NamedOperation").field(&self.name).finish()
    }
}

/// 组件类型描述
#[derive(Clone)]
pub struct ComponentType {
    implementation: TypeInfo,
    contracts: Vec<Contract>,
    operations: Vec<NamedOperation>,
    hidden: bool,
}

impl ComponentType {
    /// 描述实现类型 `T`，默认只暴露 `T` 自身
    pub fn of<T: Send + Sync + 'static>() -> Self {
        Self {
            implementation: TypeInfo::of::<T>(),
            contracts: vec![Contract::new::<T, T>(|value| value)],
            operations: Vec::new(),
            hidden: false,
        }
    }

    /// 实现类型
    pub fn implementation(&self) -> TypeInfo {
        self.implementation
    }

    /// 所有可暴露的契约类型
    pub fn contracts(&self) -> impl Iterator<Item = TypeInfo> + '_ {
        self.contracts.iter().map(Contract::type_info)
    }

    /// 是否可以视为目标类型
    pub fn is_assignable_to(&self, target: &TypeInfo) -> bool {
        self.contracts.iter().any(|c| c.info == *target)
    }

    /// 是否声明了契约 `C`
    pub fn provides<C: ?Sized + 'static>(&self) -> bool {
        self.is_assignable_to(&TypeInfo::of::<C>())
    }

    /// 是否隐藏了实现类型
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// 查找命名操作
    pub fn operation(&self, name: &str) -> Option<&NamedOperation> {
        self.operations.iter().find(|op| op.name() == name)
    }

    /// 是否存在命名操作
    pub fn has_operation(&self, name: &str) -> bool {
        self.operation(name).is_some()
    }

    /// 添加契约，同类型契约会被替换
    pub fn add_contract(&mut self, contract: Contract) {
        self.contracts.retain(|c| c.info != contract.info);
        self.contracts.push(contract);
    }

    /// 添加命名操作，同名操作会被替换
    pub fn add_operation<T, F>(&mut self, name: &str, operation: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let call: OperationFn = Arc::new(move |value: &AnyValue| match value.downcast_ref::<T>() {
            Some(target) => operation(target),
            None => Err(format!("实例不是 {}", std::any::type_name::<T>()).into()),
        });
        self.operations.retain(|op| op.name() != name);
        self.operations.push(NamedOperation {
            name: Arc::from(name),
            call,
        });
    }

    /// 只保留接口契约的视图
    ///
    /// 没有可暴露的接口时返回 `None`。
    pub fn hidden(&self) -> Option<Self> {
        let contracts: Vec<Contract> = self
            .contracts
            .iter()
            .filter(|c| c.info != self.implementation)
            .cloned()
            .collect();
        if contracts.is_empty() {
            return None;
        }
        Some(Self {
            implementation: self.implementation,
            contracts,
            operations: self.operations.clone(),
            hidden: true,
        })
    }

    fn cast_value(&self, value: &AnyValue, target: TypeId) -> Option<Box<dyn Any>> {
        self.contracts
            .iter()
            .find(|c| c.info.id == target)
            .and_then(|c| (c.cast)(value))
    }
}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentType")
            .field("implementation", &self.implementation.name)
            .field("contracts", &self.contracts)
            .field("operations", &self.operations)
            .field("hidden", &self.hidden)
            .finish()
    }
}

/// 以类型化方式描述组件契约
///
/// 由 [`crate::Implementation`] 和 [`InstanceBuilder`] 实现。
pub trait DescribeComponent<T: Send + Sync + 'static>: Sized {
    /// 正在构建的组件类型描述
    fn component_type_mut(&mut self) -> &mut ComponentType;

    /// 声明实例可以被视为 `C`
    fn provides<C: ?Sized + 'static>(
        mut self,
        convert: impl Fn(Arc<T>) -> Arc<C> + Send + Sync + 'static,
    ) -> Self {
        self.component_type_mut()
            .add_contract(Contract::new::<T, C>(convert));
        self
    }

    /// 声明 [`Startable`] 契约
    fn startable(self) -> Self
    where
        T: Startable,
    {
        self.provides::<dyn Startable>(|value: Arc<T>| -> Arc<dyn Startable> { value })
    }

    /// 声明 [`Disposable`] 契约
    fn disposable(self) -> Self
    where
        T: Disposable,
    {
        self.provides::<dyn Disposable>(|value: Arc<T>| -> Arc<dyn Disposable> { value })
    }

    /// 声明按名称调用的无参操作
    fn operation(
        mut self,
        name: &str,
        operation: impl Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
    ) -> Self {
        self.component_type_mut().add_operation::<T, _>(name, operation);
        self
    }
}

/// 组件实例
#[derive(Clone)]
pub struct Instance {
    value: AnyValue,
    component_type: Arc<ComponentType>,
    dispatch_lock: Option<DispatchLock>,
}

impl Instance {
    /// 包装一个值，只暴露其自身类型
    pub fn of<T: Send + Sync + 'static>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// 包装一个共享值
    pub fn from_arc<T: Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            value,
            component_type: Arc::new(ComponentType::of::<T>()),
            dispatch_lock: None,
        }
    }

    /// 以构建器方式声明实例的契约
    pub fn builder<T: Send + Sync + 'static>(value: T) -> InstanceBuilder<T> {
        InstanceBuilder {
            value: Arc::new(value),
            component_type: ComponentType::of::<T>(),
            _marker: PhantomData,
        }
    }

    /// 由已擦除的值和类型描述组装实例
    pub fn from_parts(value: AnyValue, component_type: Arc<ComponentType>) -> Self {
        Self {
            value,
            component_type,
            dispatch_lock: None,
        }
    }

    /// 组件类型描述
    pub fn component_type(&self) -> &ComponentType {
        &self.component_type
    }

    /// 实现类型
    pub fn implementation(&self) -> TypeInfo {
        self.component_type.implementation()
    }

    /// 是否可以视为目标类型
    pub fn is_assignable_to(&self, target: &TypeInfo) -> bool {
        self.component_type.is_assignable_to(target)
    }

    /// 转换为指定的契约视图
    pub fn cast<T: ?Sized + 'static>(&self) -> Option<Arc<T>> {
        self.component_type
            .cast_value(&self.value, TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast::<Arc<T>>().ok())
            .map(|arc| *arc)
    }

    /// 是否与另一个实例指向同一个对象
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::as_ptr(&self.value).cast::<()>() == Arc::as_ptr(&other.value).cast::<()>()
    }

    /// 使用新的类型描述包装同一个对象
    pub fn with_component_type(&self, component_type: Arc<ComponentType>) -> Self {
        Self {
            value: Arc::clone(&self.value),
            component_type,
            dispatch_lock: self.dispatch_lock.clone(),
        }
    }

    /// 附加方法分派锁
    pub fn with_dispatch_lock(mut self, lock: DispatchLock) -> Self {
        self.dispatch_lock = Some(lock);
        self
    }

    /// 方法分派锁
    pub fn dispatch_lock(&self) -> Option<&DispatchLock> {
        self.dispatch_lock.as_ref()
    }

    /// 在分派锁（如果存在）保护下执行调用
    pub fn dispatch<R>(&self, call: impl FnOnce() -> R) -> R {
        match &self.dispatch_lock {
            Some(lock) => {
                let _guard = lock.lock();
                call()
            }
            None => call(),
        }
    }

    /// 调用命名操作，不存在时返回 `None`
    pub fn call_operation(&self, name: &str) -> Option<Result<(), BoxError>> {
        let operation = self.component_type.operation(name)?;
        Some(self.dispatch(|| (operation.call)(&self.value)))
    }

    /// 用于错误信息的实例描述
    pub fn describe(&self) -> String {
        format!(
            "{}@{:p}",
            self.implementation().short_name(),
            Arc::as_ptr(&self.value).cast::<()>()
        )
    }

    pub(crate) fn value(&self) -> &AnyValue {
        &self.value
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("implementation", &self.implementation().name)
            .field("hidden", &self.component_type.is_hidden())
            .field("synchronized", &self.dispatch_lock.is_some())
            .finish()
    }
}

/// 实例构建器
pub struct InstanceBuilder<T> {
    value: Arc<T>,
    component_type: ComponentType,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> InstanceBuilder<T> {
    /// 完成构建
    pub fn build(self) -> Instance {
        Instance {
            value: self.value,
            component_type: Arc::new(self.component_type),
            dispatch_lock: None,
        }
    }
}

impl<T: Send + Sync + 'static> DescribeComponent<T> for InstanceBuilder<T> {
    fn component_type_mut(&mut self) -> &mut ComponentType {
        &mut self.component_type
    }
}

impl<T: Send + Sync + 'static> From<InstanceBuilder<T>> for Instance {
    fn from(builder: InstanceBuilder<T>) -> Self {
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    trait Fruit: Send + Sync {
        fn name(&self) -> &'static str;
    }

    #[derive(Default)]
    struct Apple {
        bites: AtomicUsize,
    }

    impl Fruit for Apple {
        fn name(&self) -> &'static str {
            "apple"
        }
    }

    #[test]
    fn test_cast_through_declared_contracts() {
        let instance = Instance::builder(Apple::default())
            .provides::<dyn Fruit>(|a| a)
            .build();

        let fruit = instance.cast::<dyn Fruit>().unwrap();
        assert_eq!(fruit.name(), "apple");
        assert!(instance.cast::<Apple>().is_some());
        assert!(instance.cast::<String>().is_none());
    }

    #[test]
    fn test_hidden_view_drops_implementation_contract() {
        let instance = Instance::builder(Apple::default())
            .provides::<dyn Fruit>(|a| a)
            .build();
        let hidden_type = instance.component_type().hidden().unwrap();
        let hidden = instance.with_component_type(Arc::new(hidden_type));

        assert!(hidden.cast::<Apple>().is_none());
        assert!(hidden.cast::<dyn Fruit>().is_some());
        assert!(hidden.ptr_eq(&instance));
        assert!(ComponentType::of::<Apple>().hidden().is_none());
    }

    #[test]
    fn test_named_operation_dispatch() {
        let instance = Instance::builder(Apple::default())
            .operation("bite", |apple: &Apple| {
                apple.bites.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .build();

        assert!(instance.call_operation("bite").unwrap().is_ok());
        assert!(instance.call_operation("peel").is_none());
        assert_eq!(instance.cast::<Apple>().unwrap().bites.load(Ordering::SeqCst), 1);
    }
}
