//! 组件键
//!
//! 组件在容器中的唯一标识，按类型或名称区分，可附加限定符。

use infrastructure_common::TypeInfo;
use std::fmt;
use std::sync::Arc;

/// 键的主体部分
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyId {
    /// 按类型标识
    Type(TypeInfo),
    /// 按名称标识
    Name(Arc<str>),
}

/// 组件键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    id: KeyId,
    qualifier: Option<Arc<str>>,
}

impl Key {
    /// 以类型为键
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::for_type(TypeInfo::of::<T>())
    }

    /// 以已有的类型信息为键
    pub fn for_type(type_info: TypeInfo) -> Self {
        Self {
            id: KeyId::Type(type_info),
            qualifier: None,
        }
    }

    /// 以名称为键
    pub fn named(name: impl AsRef<str>) -> Self {
        Self {
            id: KeyId::Name(Arc::from(name.as_ref())),
            qualifier: None,
        }
    }

    /// 附加限定符
    pub fn qualified(mut self, qualifier: impl AsRef<str>) -> Self {
        self.qualifier = Some(Arc::from(qualifier.as_ref()));
        self
    }

    /// 键的主体
    pub fn id(&self) -> &KeyId {
        &self.id
    }

    /// 类型键对应的类型信息
    pub fn type_info(&self) -> Option<&TypeInfo> {
        match &self.id {
            KeyId::Type(info) => Some(info),
            KeyId::Name(_) => None,
        }
    }

    /// 名称键对应的名称
    pub fn name(&self) -> Option<&str> {
        match &self.id {
            KeyId::Name(name) => Some(name),
            KeyId::Type(_) => None,
        }
    }

    /// 限定符
    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            KeyId::Type(info) => write!(f, "{info}")?,
            KeyId::Name(name) => write!(f, "\"{name}\"")?,
        }
        if let Some(qualifier) = &self.qualifier {
            write!(f, "@{qualifier}")?;
        }
        Ok(())
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Self::named(name)
    }
}

impl From<TypeInfo> for Key {
    fn from(type_info: TypeInfo) -> Self {
        Self::for_type(type_info)
    }
}
