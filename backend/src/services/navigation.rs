use serde::Serialize;

use crate::services::{dependency::EnabledSet, module_registry::ModuleRegistry};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavItem {
    pub module: String,
    pub label: String,
    pub route: String,
    pub icon: Option<String>,
}

/// Navigation entries for the enabled, routable modules in registry declaration order.
pub fn project(registry: &ModuleRegistry, enabled: &EnabledSet) -> Vec<NavItem> {
    registry
        .modules()
        .iter()
        .filter(|module| enabled.contains(&module.name))
        .filter_map(|module| {
            module.route.as_ref().map(|route| NavItem {
                module: module.name.clone(),
                label: module.display_name.clone(),
                route: route.clone(),
                icon: module.icon.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_enabled_routable_modules_are_listed() {
        let registry = ModuleRegistry::builtin().expect("builtin registry");
        let enabled: EnabledSet = ["tts", "payroll", "employees"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let items = project(&registry, &enabled);
        let modules: Vec<_> = items.iter().map(|item| item.module.as_str()).collect();
        assert_eq!(modules, vec!["employees", "payroll"]);
        assert_eq!(items[1].route, "/admin/payroll");
        assert_eq!(items[1].label, "Payroll");
    }

    #[test]
    fn nothing_enabled_means_empty_navigation() {
        let registry = ModuleRegistry::builtin().expect("builtin registry");
        assert!(project(&registry, &EnabledSet::new()).is_empty());
    }
}
