use super::Injector;
use di_abstractions::{
    Characteristics, ComponentAdapter, ComponentFactory, ComponentRecipe, InjectionType, Key,
    Parameter,
};
use infrastructure_common::{DependencyError, DependencyResult};
use tracing::debug;

/// 注入器工厂
///
/// 未指定注入方式时：组件声明了注入成员则使用组合注入，否则只用构造函数。
#[derive(Debug, Clone, Default)]
pub struct InjectionFactory {
    forced: Option<InjectionType>,
}

impl InjectionFactory {
    /// 根据特性自动选择注入方式
    pub fn new() -> Self {
        Self::default()
    }

    /// 固定注入方式，单次注册的特性仍可覆盖
    pub fn with_injection(mut self, injection: InjectionType) -> Self {
        self.forced = Some(injection);
        self
    }

    fn validate(key: &Key, recipe: &ComponentRecipe) -> DependencyResult<()> {
        let component_type = recipe.component_type();
        let implementation = component_type.implementation();
        if recipe.constructors().is_empty() {
            return Err(DependencyError::registration(
                implementation.to_string(),
                "没有声明构造函数",
            ));
        }
        if let Some(constructor) = recipe
            .constructors()
            .iter()
            .find(|constructor| constructor.produces() != implementation)
        {
            return Err(DependencyError::registration(
                implementation.to_string(),
                format!("构造函数 {constructor} 产出的类型与实现类型不一致"),
            ));
        }
        if let Some(target) = key.type_info() {
            if !component_type.is_assignable_to(target) {
                return Err(DependencyError::registration(
                    implementation.to_string(),
                    format!("未声明可赋值给键 {key} 的契约"),
                ));
            }
        }
        Ok(())
    }
}

impl ComponentFactory for InjectionFactory {
    fn create_adapter(
        &self,
        key: Key,
        recipe: ComponentRecipe,
        parameters: Option<Vec<Parameter>>,
        characteristics: &Characteristics,
    ) -> DependencyResult<Box<dyn ComponentAdapter>> {
        Self::validate(&key, &recipe)?;

        let injection = characteristics
            .injection
            .or(self.forced)
            .unwrap_or(if recipe.members().is_empty() {
                InjectionType::Constructor
            } else {
                InjectionType::Composite
            });
        debug!("为 {} 创建 {:?} 注入器", key, injection);

        let injector = Injector::new(key, recipe, parameters, injection)
            .with_use_names(characteristics.uses_names())
            .with_circular(characteristics.allows_circular());
        Ok(Box::new(injector))
    }
}
