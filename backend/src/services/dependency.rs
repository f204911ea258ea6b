//! Pure dependency checks over the registry and a snapshot of enabled modules.

use std::collections::BTreeSet;

use crate::{
    models::module::{ConflictDescription, ConflictKind, Direction, ModuleConfig},
    services::module_registry::ModuleRegistry,
};

/// Names of the modules currently enabled.
pub type EnabledSet = BTreeSet<String>;

pub fn enabled_set<'a>(configs: impl IntoIterator<Item = &'a ModuleConfig>) -> EnabledSet {
    configs
        .into_iter()
        .filter(|config| config.enabled)
        .map(|config| config.name.clone())
        .collect()
}

/// Conflicts that would block moving `module` in `direction`. Empty means the transition is
/// safe. Modules missing from the registry have no dependencies and no dependents.
pub fn check_transition(
    registry: &ModuleRegistry,
    enabled: &EnabledSet,
    module: &str,
    direction: Direction,
) -> Vec<ConflictDescription> {
    match direction {
        Direction::Enable => registry
            .dependencies_of(module)
            .iter()
            .filter(|dep| !enabled.contains(dep.as_str()))
            .map(|dep| {
                ConflictDescription::new(
                    dep,
                    ConflictKind::MissingDependency,
                    &format!(
                        "Cannot enable {}: it requires {} to be enabled",
                        display_name(registry, module),
                        display_name(registry, dep)
                    ),
                )
            })
            .collect(),
        Direction::Disable => registry
            .dependents_of(module)
            .iter()
            .filter(|dependent| enabled.contains(dependent.as_str()))
            .map(|dependent| {
                ConflictDescription::new(
                    dependent,
                    ConflictKind::ActiveDependent,
                    &format!(
                        "Cannot disable {}: {} depends on it",
                        display_name(registry, module),
                        display_name(registry, dependent)
                    ),
                )
            })
            .collect(),
    }
}

fn display_name<'a>(registry: &'a ModuleRegistry, name: &'a str) -> &'a str {
    registry
        .get(name)
        .map(|module| module.display_name.as_str())
        .unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::module::ModuleDescriptor;

    fn registry() -> ModuleRegistry {
        ModuleRegistry::new(vec![
            ModuleDescriptor::new("a", "Alpha", &[]),
            ModuleDescriptor::new("b", "Beta", &["a"]),
            ModuleDescriptor::new("c", "Gamma", &["a", "b"]),
        ])
        .expect("registry")
    }

    fn enabled(names: &[&str]) -> EnabledSet {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn enable_blocked_until_dependency_enabled() {
        let registry = registry();
        let conflicts = check_transition(&registry, &enabled(&[]), "b", Direction::Enable);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].module, "a");
        assert_eq!(conflicts[0].kind, ConflictKind::MissingDependency);
        assert_eq!(
            conflicts[0].message,
            "Cannot enable Beta: it requires Alpha to be enabled"
        );

        assert!(check_transition(&registry, &enabled(&["a"]), "b", Direction::Enable).is_empty());
    }

    #[test]
    fn enable_reports_every_missing_dependency() {
        let conflicts = check_transition(&registry(), &enabled(&[]), "c", Direction::Enable);
        let names: Vec<_> = conflicts.iter().map(|c| c.module.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn disable_blocked_by_enabled_dependents() {
        let registry = registry();
        let conflicts = check_transition(&registry, &enabled(&["a", "b"]), "a", Direction::Disable);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].module, "b");
        assert_eq!(conflicts[0].kind, ConflictKind::ActiveDependent);

        assert!(check_transition(&registry, &enabled(&["a"]), "a", Direction::Disable).is_empty());
    }

    #[test]
    fn unregistered_module_always_allowed() {
        let registry = registry();
        assert!(check_transition(&registry, &enabled(&[]), "ghost", Direction::Enable).is_empty());
        assert!(
            check_transition(&registry, &enabled(&["ghost"]), "ghost", Direction::Disable)
                .is_empty()
        );
    }

    #[test]
    fn unregistered_dependency_can_always_be_disabled() {
        let registry = ModuleRegistry::new(vec![ModuleDescriptor::new("b", "Beta", &["ext"])])
            .expect("registry");
        let state = enabled(&["ext", "b"]);
        assert!(check_transition(&registry, &state, "ext", Direction::Disable).is_empty());
        assert!(check_transition(&registry, &state, "b", Direction::Disable).is_empty());
    }

    #[test]
    fn check_is_repeatable() {
        let registry = registry();
        let state = enabled(&["a"]);
        let first = check_transition(&registry, &state, "c", Direction::Enable);
        let second = check_transition(&registry, &state, "c", Direction::Enable);
        assert_eq!(first, second);
    }

    #[test]
    fn enabled_set_collects_enabled_configs_only() {
        let mut on = ModuleConfig::implicit("a");
        on.enabled = true;
        let off = ModuleConfig::implicit("b");
        assert_eq!(enabled_set([&on, &off]), enabled(&["a"]));
    }
}
