//! 组件工厂抽象接口
//!
//! 工厂根据配方和特性创建适配器链。行为工厂包装内层工厂，
//! 在 [`ComponentFactory::create_adapter`] 中构建内层适配器后按特性决定是否装饰。

use crate::adapter::ComponentAdapter;
use crate::characteristics::Characteristics;
use crate::key::Key;
use crate::parameter::Parameter;
use crate::recipe::ComponentRecipe;
use infrastructure_common::DependencyResult;

/// 组件工厂 trait
pub trait ComponentFactory: Send + Sync {
    /// 为配方创建适配器
    ///
    /// `parameters` 为 `None` 时所有依赖都按默认方式解析。
    fn create_adapter(
        &self,
        key: Key,
        recipe: ComponentRecipe,
        parameters: Option<Vec<Parameter>>,
        characteristics: &Characteristics,
    ) -> DependencyResult<Box<dyn ComponentAdapter>>;

    /// 按特性包装一个已构建的适配器
    fn wrap_adapter(
        &self,
        adapter: Box<dyn ComponentAdapter>,
        _characteristics: &Characteristics,
    ) -> DependencyResult<Box<dyn ComponentAdapter>> {
        Ok(adapter)
    }
}
