//! 构造配方
//!
//! 组件通过 [`Implementation`] 声明自己的候选构造函数和注入成员，
//! 容器只依赖这些声明来选择构造方式，不做任何运行时反射。

use crate::instance::{AnyValue, ComponentType, DescribeComponent, Instance};
use infrastructure_common::{BoxError, TypeInfo};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// 依赖形态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// 必需的单个组件
    Single,
    /// 可选的单个组件
    Optional,
    /// 所有可赋值的组件
    Collection,
}

/// 一个参数声明
#[derive(Debug, Clone)]
pub struct Dependency {
    /// 参数名称，启用 `USE_NAMES` 时用于按名称消歧
    pub name: Option<Arc<str>>,
    /// 声明类型，集合形态下为元素类型
    pub target: TypeInfo,
    /// 依赖形态
    pub shape: Shape,
}

impl Dependency {
    /// 创建依赖声明
    pub fn new(name: Option<&str>, target: TypeInfo, shape: Shape) -> Self {
        Self {
            name: name.map(Arc::from),
            target,
            shape,
        }
    }

    /// 参数名称
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// 带参数名称的描述，用于错误信息
    pub fn label(&self) -> String {
        match self.name() {
            Some(name) => format!("{self} ({name})"),
            None => self.to_string(),
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.shape {
            Shape::Single => write!(f, "{}", self.target),
            Shape::Optional => write!(f, "Option<{}>", self.target),
            Shape::Collection => write!(f, "Vec<{}>", self.target),
        }
    }
}

/// 参数列表
#[derive(Debug, Clone, Default)]
pub struct Signature {
    dependencies: Vec<Dependency>,
}

impl Signature {
    /// 追加必需参数
    pub fn arg<T: ?Sized + 'static>(mut self, name: &str) -> Self {
        self.push::<T>(name, Shape::Single);
        self
    }

    /// 追加可选参数
    pub fn optional<T: ?Sized + 'static>(mut self, name: &str) -> Self {
        self.push::<T>(name, Shape::Optional);
        self
    }

    /// 追加集合参数，收集所有可赋值给 `T` 的组件
    pub fn all<T: ?Sized + 'static>(mut self, name: &str) -> Self {
        self.push::<T>(name, Shape::Collection);
        self
    }

    /// 参数声明
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// 参数个数
    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    /// 是否无参
    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    fn push<T: ?Sized + 'static>(&mut self, name: &str, shape: Shape) {
        self.dependencies
            .push(Dependency::new(Some(name), TypeInfo::of::<T>(), shape));
    }
}

/// 已解析的实参
#[derive(Debug, Clone)]
pub enum Argument {
    /// 单个组件
    Single(Instance),
    /// 组件集合
    Many(Vec<Instance>),
    /// 可选参数未解析到组件
    Absent,
}

/// 传给构造函数或注入成员的实参序列
#[derive(Debug)]
pub struct Arguments {
    requester: TypeInfo,
    values: Vec<Argument>,
    position: usize,
}

impl Arguments {
    /// 创建实参序列
    pub fn new(requester: TypeInfo, values: Vec<Argument>) -> Self {
        Self {
            requester,
            values,
            position: 0,
        }
    }

    /// 实参个数
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// 是否没有实参
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 取出下一个必需组件
    pub fn next<T: ?Sized + 'static>(&mut self) -> Result<Arc<T>, BoxError> {
        let instance = self.next_instance()?;
        self.cast(&instance)
    }

    /// 取出下一个可选组件
    pub fn next_optional<T: ?Sized + 'static>(&mut self) -> Result<Option<Arc<T>>, BoxError> {
        match self.take()? {
            Argument::Single(instance) => self.cast(&instance).map(Some),
            Argument::Absent => Ok(None),
            Argument::Many(_) => Err(self.shape_error("可选组件")),
        }
    }

    /// 取出下一个组件集合
    pub fn next_all<T: ?Sized + 'static>(&mut self) -> Result<Vec<Arc<T>>, BoxError> {
        match self.take()? {
            Argument::Many(instances) => instances.iter().map(|i| self.cast(i)).collect(),
            Argument::Single(instance) => Ok(vec![self.cast(&instance)?]),
            Argument::Absent => Ok(Vec::new()),
        }
    }

    /// 取出下一个常量值的副本
    pub fn next_value<V: Clone + 'static>(&mut self) -> Result<V, BoxError> {
        self.next::<V>().map(|value| (*value).clone())
    }

    /// 取出下一个未转换的实例
    pub fn next_instance(&mut self) -> Result<Instance, BoxError> {
        match self.take()? {
            Argument::Single(instance) => Ok(instance),
            Argument::Absent => Err(format!(
                "{} 的第 {} 个参数没有解析到组件",
                self.requester,
                self.position
            )
            .into()),
            Argument::Many(_) => Err(self.shape_error("单个组件")),
        }
    }

    fn take(&mut self) -> Result<Argument, BoxError> {
        let argument = self
            .values
            .get(self.position)
            .cloned()
            .ok_or_else(|| -> BoxError {
                format!(
                    "{} 只有 {} 个参数, 无法读取第 {} 个",
                    self.requester,
                    self.values.len(),
                    self.position + 1
                )
                .into()
            })?;
        self.position += 1;
        Ok(argument)
    }

    fn cast<T: ?Sized + 'static>(&self, instance: &Instance) -> Result<Arc<T>, BoxError> {
        instance.cast::<T>().ok_or_else(|| {
            format!(
                "{} 的第 {} 个参数 {} 无法转换为 {}",
                self.requester,
                self.position,
                instance.implementation(),
                TypeInfo::of::<T>()
            )
            .into()
        })
    }

    fn shape_error(&self, expected: &str) -> BoxError {
        format!(
            "{} 的第 {} 个参数不是{}",
            self.requester, self.position, expected
        )
        .into()
    }
}

type BuildFn = Arc<dyn Fn(&mut Arguments) -> Result<AnyValue, BoxError> + Send + Sync>;
type ApplyFn = Arc<dyn Fn(&AnyValue, &mut Arguments) -> Result<(), BoxError> + Send + Sync>;

/// 候选构造函数
#[derive(Clone)]
pub struct Constructor {
    name: Arc<str>,
    produces: TypeInfo,
    signature: Signature,
    build: BuildFn,
}

impl Constructor {
    /// 开始声明构造函数
    pub fn new(name: &str) -> ConstructorBuilder {
        ConstructorBuilder {
            name: Arc::from(name),
            signature: Signature::default(),
        }
    }

    /// 构造函数名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 产出的实现类型
    pub fn produces(&self) -> TypeInfo {
        self.produces
    }

    /// 参数声明
    pub fn dependencies(&self) -> &[Dependency] {
        self.signature.dependencies()
    }

    /// 参数个数
    pub fn arity(&self) -> usize {
        self.signature.len()
    }

    /// 执行构造
    pub fn invoke(&self, arguments: &mut Arguments) -> Result<AnyValue, BoxError> {
        (self.build)(arguments)
    }
}

impl fmt::Display for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params = self
            .dependencies()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{}::{}({})", self.produces, self.name, params)
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Constructor({self})")
    }
}

/// 构造函数构建器
#[derive(Debug)]
pub struct ConstructorBuilder {
    name: Arc<str>,
    signature: Signature,
}

impl ConstructorBuilder {
    /// 追加必需参数
    pub fn arg<T: ?Sized + 'static>(mut self, name: &str) -> Self {
        self.signature = self.signature.arg::<T>(name);
        self
    }

    /// 追加可选参数
    pub fn optional<T: ?Sized + 'static>(mut self, name: &str) -> Self {
        self.signature = self.signature.optional::<T>(name);
        self
    }

    /// 追加集合参数
    pub fn all<T: ?Sized + 'static>(mut self, name: &str) -> Self {
        self.signature = self.signature.all::<T>(name);
        self
    }

    /// 提供构造逻辑
    pub fn build<T: Send + Sync + 'static>(
        self,
        build: impl Fn(&mut Arguments) -> Result<T, BoxError> + Send + Sync + 'static,
    ) -> Constructor {
        Constructor {
            name: self.name,
            produces: TypeInfo::of::<T>(),
            signature: self.signature,
            build: Arc::new(move |arguments: &mut Arguments| {
                build(arguments).map(|value| Arc::new(value) as AnyValue)
            }),
        }
    }
}

/// 注入成员的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// setter 方法
    Setter,
    /// 字段
    Field,
    /// 注入方法
    Method,
}

/// 构造之后再注入的成员
#[derive(Clone)]
pub struct Member {
    name: Arc<str>,
    kind: MemberKind,
    signature: Signature,
    apply: ApplyFn,
}

impl Member {
    /// 开始声明注入方法
    pub fn method(name: &str) -> MethodBuilder {
        MethodBuilder {
            name: Arc::from(name),
            signature: Signature::default(),
        }
    }

    /// 成员名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 成员种类
    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    /// 参数声明
    pub fn dependencies(&self) -> &[Dependency] {
        self.signature.dependencies()
    }

    /// 把实参应用到实例上
    pub fn apply(&self, instance: &Instance, arguments: &mut Arguments) -> Result<(), BoxError> {
        (self.apply)(instance.value(), arguments)
    }

    fn typed<T, F>(name: &str, kind: MemberKind, signature: Signature, apply: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&T, &mut Arguments) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let apply: ApplyFn = Arc::new(move |value: &AnyValue, arguments: &mut Arguments| {
            let target = value
                .downcast_ref::<T>()
                .ok_or_else(|| -> BoxError { format!("实例不是 {}", TypeInfo::of::<T>()).into() })?;
            apply(target, arguments)
        });
        Self {
            name: Arc::from(name),
            kind,
            signature,
            apply,
        }
    }
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Member")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("signature", &self.signature)
            .finish()
    }
}

/// 注入方法构建器
#[derive(Debug)]
pub struct MethodBuilder {
    name: Arc<str>,
    signature: Signature,
}

impl MethodBuilder {
    /// 追加必需参数
    pub fn arg<T: ?Sized + 'static>(mut self, name: &str) -> Self {
        self.signature = self.signature.arg::<T>(name);
        self
    }

    /// 追加可选参数
    pub fn optional<T: ?Sized + 'static>(mut self, name: &str) -> Self {
        self.signature = self.signature.optional::<T>(name);
        self
    }

    /// 追加集合参数
    pub fn all<T: ?Sized + 'static>(mut self, name: &str) -> Self {
        self.signature = self.signature.all::<T>(name);
        self
    }

    /// 提供注入逻辑
    pub fn build<T: Send + Sync + 'static>(
        self,
        apply: impl Fn(&T, &mut Arguments) -> Result<(), BoxError> + Send + Sync + 'static,
    ) -> Member {
        Member::typed(&self.name, MemberKind::Method, self.signature, apply)
    }
}

/// 类型擦除后的组件配方
#[derive(Clone, Debug)]
pub struct ComponentRecipe {
    component_type: ComponentType,
    constructors: Vec<Constructor>,
    members: Vec<Member>,
}

impl ComponentRecipe {
    /// 组件类型描述
    pub fn component_type(&self) -> &ComponentType {
        &self.component_type
    }

    /// 候选构造函数
    pub fn constructors(&self) -> &[Constructor] {
        &self.constructors
    }

    /// 注入成员
    pub fn members(&self) -> &[Member] {
        &self.members
    }
}

/// 类型化的组件实现声明
pub struct Implementation<T> {
    recipe: ComponentRecipe,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Implementation<T> {
    /// 创建空声明
    pub fn new() -> Self {
        Self {
            recipe: ComponentRecipe {
                component_type: ComponentType::of::<T>(),
                constructors: Vec::new(),
                members: Vec::new(),
            },
            _marker: PhantomData,
        }
    }

    /// 添加候选构造函数
    pub fn constructor(mut self, constructor: Constructor) -> Self {
        self.recipe.constructors.push(constructor);
        self
    }

    /// 以 `Default` 作为无参构造函数
    pub fn default_constructor(self) -> Self
    where
        T: Default,
    {
        self.constructor(Constructor::new("default").build(|_| Ok(T::default())))
    }

    /// 添加 setter 注入，名称中的 `set_` 前缀不参与按名称匹配
    pub fn setter<D: ?Sized + 'static>(
        self,
        name: &str,
        apply: impl Fn(&T, Arc<D>) -> Result<(), BoxError> + Send + Sync + 'static,
    ) -> Self {
        let binding = name.strip_prefix("set_").unwrap_or(name);
        let signature = Signature::default().arg::<D>(binding);
        self.member(Member::typed(
            name,
            MemberKind::Setter,
            signature,
            move |target: &T, arguments: &mut Arguments| apply(target, arguments.next::<D>()?),
        ))
    }

    /// 添加可选 setter 注入
    pub fn optional_setter<D: ?Sized + 'static>(
        self,
        name: &str,
        apply: impl Fn(&T, Option<Arc<D>>) -> Result<(), BoxError> + Send + Sync + 'static,
    ) -> Self {
        let binding = name.strip_prefix("set_").unwrap_or(name);
        let signature = Signature::default().optional::<D>(binding);
        self.member(Member::typed(
            name,
            MemberKind::Setter,
            signature,
            move |target: &T, arguments: &mut Arguments| {
                apply(target, arguments.next_optional::<D>()?)
            },
        ))
    }

    /// 添加字段注入
    pub fn field<D: ?Sized + 'static>(
        self,
        name: &str,
        assign: impl Fn(&T, Arc<D>) -> Result<(), BoxError> + Send + Sync + 'static,
    ) -> Self {
        let signature = Signature::default().arg::<D>(name);
        self.member(Member::typed(
            name,
            MemberKind::Field,
            signature,
            move |target: &T, arguments: &mut Arguments| assign(target, arguments.next::<D>()?),
        ))
    }

    /// 添加注入方法
    pub fn method(self, member: Member) -> Self {
        self.member(member)
    }

    /// 转换为类型擦除的配方
    pub fn into_recipe(self) -> ComponentRecipe {
        self.recipe
    }

    fn member(mut self, member: Member) -> Self {
        self.recipe.members.push(member);
        self
    }
}

impl<T: Send + Sync + 'static> Default for Implementation<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> DescribeComponent<T> for Implementation<T> {
    fn component_type_mut(&mut self) -> &mut ComponentType {
        &mut self.recipe.component_type
    }
}

/// 能够描述自身构造方式的组件
pub trait Injectable: Send + Sync + Sized + 'static {
    /// 返回组件的实现声明
    fn implementation() -> Implementation<Self>;
}

/// 注册来源：构造配方或现成实例
#[derive(Clone, Debug)]
pub enum ComponentSource {
    /// 由容器按配方构造
    Recipe(ComponentRecipe),
    /// 直接使用的实例
    Instance(Instance),
}

impl<T: Send + Sync + 'static> From<Implementation<T>> for ComponentSource {
    fn from(implementation: Implementation<T>) -> Self {
        Self::Recipe(implementation.into_recipe())
    }
}

impl From<ComponentRecipe> for ComponentSource {
    fn from(recipe: ComponentRecipe) -> Self {
        Self::Recipe(recipe)
    }
}

impl From<Instance> for ComponentSource {
    fn from(instance: Instance) -> Self {
        Self::Instance(instance)
    }
}
