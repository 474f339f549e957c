//! 注册特性
//!
//! 每次注册都显式携带一份 [`Characteristics`]，决定该组件被哪些行为包装、
//! 使用哪种注入方式。容器级默认值与单次注册的值按字段合并。

use serde::{Deserialize, Serialize};

/// 注入方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectionType {
    /// 只使用构造函数
    Constructor,
    /// 构造后注入 setter
    Setter,
    /// 构造后注入字段
    Field,
    /// 构造后调用注入方法
    Method,
    /// 构造后注入所有成员
    Composite,
}

/// 单个特性开关
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Characteristic {
    /// 缓存实例
    Cache,
    /// 不缓存实例
    NoCache,
    /// 隐藏实现类型
    HideImpl,
    /// 不隐藏实现类型
    NoHideImpl,
    /// 同步构造和方法分派
    Synchronize,
    /// 不同步
    NoSynchronize,
    /// 构造期间加锁
    Lock,
    /// 不加锁
    NoLock,
    /// 允许 setter 注入形成的循环依赖
    EnableCircular,
    /// 按参数名称消歧
    UseNames,
    /// 自动参与生命周期
    Automatic,
    /// 构造函数注入
    Cdi,
    /// setter 注入
    Sdi,
    /// 字段注入
    FieldInjection,
    /// 方法注入
    MethodInjection,
    /// 不应用任何行为
    None,
}

/// 一次注册的特性集合
///
/// 三态字段中 `None` 表示未指定，交由容器默认值或行为工厂的策略决定。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Characteristics {
    /// 是否缓存
    pub cache: Option<bool>,
    /// 是否隐藏实现
    pub hide_impl: Option<bool>,
    /// 是否同步
    pub synchronize: Option<bool>,
    /// 是否加锁
    pub lock: Option<bool>,
    /// 是否允许循环依赖
    pub enable_circular: Option<bool>,
    /// 是否按名称消歧
    pub use_names: Option<bool>,
    /// 是否自动参与生命周期
    pub automatic: Option<bool>,
    /// 强制的注入方式
    pub injection: Option<InjectionType>,
    /// 是否跳过所有行为
    pub bare: Option<bool>,
}

impl Characteristics {
    /// 空集合
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加一个特性
    pub fn with(mut self, characteristic: Characteristic) -> Self {
        match characteristic {
            Characteristic::Cache => self.cache = Some(true),
            Characteristic::NoCache => self.cache = Some(false),
            Characteristic::HideImpl => self.hide_impl = Some(true),
            Characteristic::NoHideImpl => self.hide_impl = Some(false),
            Characteristic::Synchronize => self.synchronize = Some(true),
            Characteristic::NoSynchronize => self.synchronize = Some(false),
            Characteristic::Lock => self.lock = Some(true),
            Characteristic::NoLock => self.lock = Some(false),
            Characteristic::EnableCircular => self.enable_circular = Some(true),
            Characteristic::UseNames => self.use_names = Some(true),
            Characteristic::Automatic => self.automatic = Some(true),
            Characteristic::Cdi => self.injection = Some(InjectionType::Constructor),
            Characteristic::Sdi => self.injection = Some(InjectionType::Setter),
            Characteristic::FieldInjection => self.injection = Some(InjectionType::Field),
            Characteristic::MethodInjection => self.injection = Some(InjectionType::Method),
            Characteristic::None => self.bare = Some(true),
        }
        self
    }

    /// 以 `overrides` 中已指定的字段覆盖当前值
    pub fn merged_with(&self, overrides: &Self) -> Self {
        Self {
            cache: overrides.cache.or(self.cache),
            hide_impl: overrides.hide_impl.or(self.hide_impl),
            synchronize: overrides.synchronize.or(self.synchronize),
            lock: overrides.lock.or(self.lock),
            enable_circular: overrides.enable_circular.or(self.enable_circular),
            use_names: overrides.use_names.or(self.use_names),
            automatic: overrides.automatic.or(self.automatic),
            injection: overrides.injection.or(self.injection),
            bare: overrides.bare.or(self.bare),
        }
    }

    /// 显式要求缓存
    pub fn wants_cache(&self) -> bool {
        self.cache == Some(true)
    }

    /// 显式拒绝缓存
    pub fn refuses_cache(&self) -> bool {
        self.cache == Some(false)
    }

    /// 是否隐藏实现
    pub fn hides_implementation(&self) -> bool {
        self.hide_impl == Some(true)
    }

    /// 是否同步
    pub fn synchronizes(&self) -> bool {
        self.synchronize == Some(true)
    }

    /// 是否加锁
    pub fn locks(&self) -> bool {
        self.lock == Some(true)
    }

    /// 是否允许循环依赖
    pub fn allows_circular(&self) -> bool {
        self.enable_circular == Some(true)
    }

    /// 是否按名称消歧
    pub fn uses_names(&self) -> bool {
        self.use_names == Some(true)
    }

    /// 是否自动参与生命周期
    pub fn is_automatic(&self) -> bool {
        self.automatic == Some(true)
    }

    /// 是否跳过所有行为
    pub fn is_bare(&self) -> bool {
        self.bare == Some(true)
    }
}

impl FromIterator<Characteristic> for Characteristics {
    fn from_iter<I: IntoIterator<Item = Characteristic>>(iter: I) -> Self {
        iter.into_iter().fold(Self::new(), Self::with)
    }
}

impl From<Characteristic> for Characteristics {
    fn from(characteristic: Characteristic) -> Self {
        Self::new().with(characteristic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_later_characteristic_wins() {
        let characteristics: Characteristics =
            [Characteristic::Cache, Characteristic::NoCache, Characteristic::UseNames]
                .into_iter()
                .collect();

        assert!(characteristics.refuses_cache());
        assert!(characteristics.uses_names());
        assert!(!characteristics.locks());
    }

    #[test]
    fn test_merge_keeps_defaults_for_unspecified_fields() {
        let defaults = Characteristics::new()
            .with(Characteristic::Lock)
            .with(Characteristic::Cache);
        let call = Characteristics::new().with(Characteristic::NoCache);

        let merged = defaults.merged_with(&call);
        assert!(merged.locks());
        assert!(merged.refuses_cache());
    }
}
