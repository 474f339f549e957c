//! 元数据定义
//!
//! 提供组件和类型的元数据信息

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// 类型信息
///
/// 同时适用于具体类型和 trait 对象（`TypeInfo::of::<dyn Service>()`），
/// 相等性只由 [`TypeId`] 决定。
#[derive(Debug, Clone, Copy)]
pub struct TypeInfo {
    /// 完整类型名称
    pub name: &'static str,
    /// 类型ID
    pub id: TypeId,
}

impl TypeInfo {
    /// 从类型获取类型信息
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            name: std::any::type_name::<T>(),
            id: TypeId::of::<T>(),
        }
    }

    /// 获取简短的类型名称（不包含模块路径）
    pub fn short_name(&self) -> &'static str {
        short_type_name(self.name)
    }

    /// 判断是否为指定类型
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl Hash for TypeInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// 去掉泛型参数之前的模块路径
fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rfind("::").map_or(full, |index| &full[index + 2..])
}
