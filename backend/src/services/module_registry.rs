//! Declarative catalogue of toggleable modules, held as a dependency graph built once at
//! startup.

use std::{collections::HashMap, path::Path};

use serde::Deserialize;

use crate::{models::module::ModuleDescriptor, validation::rules::validate_identifier};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("module `{0}` is declared more than once")]
    Duplicate(String),
    #[error("module name `{name}` is invalid: {reason}")]
    InvalidName { name: String, reason: &'static str },
    #[error("module `{0}` depends on itself")]
    SelfDependency(String),
    #[error("failed to load module registry: {0}")]
    Load(#[from] config::ConfigError),
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    modules: Vec<ModuleDescriptor>,
}

#[derive(Debug, Clone)]
pub struct ModuleRegistry {
    modules: Vec<ModuleDescriptor>,
    index: HashMap<String, usize>,
    /// Registered modules that list the key among their dependencies, in declaration order.
    dependents: HashMap<String, Vec<String>>,
    /// Indices into `modules`, prerequisites before dependents.
    order: Vec<usize>,
}

impl ModuleRegistry {
    pub fn new(modules: Vec<ModuleDescriptor>) -> Result<Self, RegistryError> {
        let mut index = HashMap::with_capacity(modules.len());
        for (i, module) in modules.iter().enumerate() {
            validate_identifier(&module.name).map_err(|reason| RegistryError::InvalidName {
                name: module.name.clone(),
                reason,
            })?;
            if module.dependencies.iter().any(|dep| dep == &module.name) {
                return Err(RegistryError::SelfDependency(module.name.clone()));
            }
            if index.insert(module.name.clone(), i).is_some() {
                return Err(RegistryError::Duplicate(module.name.clone()));
            }
        }

        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
        for module in &modules {
            for dep in module.dependencies.iter().filter(|dep| index.contains_key(*dep)) {
                dependents
                    .entry(dep.clone())
                    .or_default()
                    .push(module.name.clone());
            }
        }

        let order = dependency_order(&modules, &index);
        Ok(Self {
            modules,
            index,
            dependents,
            order,
        })
    }

    /// Reads a `modules = [...]` list from a TOML, JSON or YAML file.
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let file: RegistryFile = config::Config::builder()
            .add_source(config::File::from(path))
            .build()?
            .try_deserialize()?;
        Self::new(file.modules)
    }

    /// The catalogue shipped with the console.
    pub fn builtin() -> Result<Self, RegistryError> {
        let modules = vec![
            ModuleDescriptor::new("employees", "Employees", &[])
                .with_description("Employee directory and profiles")
                .with_icon("users")
                .with_route("/admin/employees"),
            ModuleDescriptor::new("payroll", "Payroll", &["employees"])
                .with_description("Salary runs and payslips")
                .with_icon("wallet")
                .with_route("/admin/payroll"),
            ModuleDescriptor::new("leaves", "Leave Management", &["employees"])
                .with_description("Leave requests and balances")
                .with_icon("calendar")
                .with_route("/admin/leaves"),
            ModuleDescriptor::new("applications", "Applications", &[])
                .with_description("Job applications inbox")
                .with_icon("inbox")
                .with_route("/admin/applications"),
            ModuleDescriptor::new("recruitment", "Recruitment", &["applications"])
                .with_description("Hiring pipeline")
                .with_icon("briefcase")
                .with_route("/admin/recruitment"),
            ModuleDescriptor::new("clients", "Clients", &[])
                .with_description("Client accounts")
                .with_icon("building")
                .with_route("/admin/clients"),
            ModuleDescriptor::new("proposals", "Proposals", &["clients"])
                .with_description("Client proposals and quotes")
                .with_icon("file-text")
                .with_route("/admin/proposals"),
            ModuleDescriptor::new("training", "Training", &["employees"])
                .with_description("Courses and certifications")
                .with_icon("book")
                .with_route("/admin/training"),
            ModuleDescriptor::new("reports", "Reports", &["payroll", "leaves"])
                .with_description("Workforce reporting")
                .with_icon("bar-chart")
                .with_route("/admin/reports"),
            ModuleDescriptor::new("tts", "Text to Speech", &[])
                .with_description("Spoken announcements")
                .with_icon("volume"),
        ];
        Self::new(modules)
    }

    pub fn get(&self, name: &str) -> Option<&ModuleDescriptor> {
        self.index.get(name).map(|&i| &self.modules[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Declaration order.
    pub fn modules(&self) -> &[ModuleDescriptor] {
        &self.modules
    }

    /// Hard dependencies of `name`; empty for unregistered modules.
    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.get(name)
            .map(|module| module.dependencies.as_slice())
            .unwrap_or(&[])
    }

    /// Registered modules that require `name`; empty for unregistered modules.
    pub fn dependents_of(&self, name: &str) -> &[String] {
        self.dependents
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Prerequisites first. Modules caught in a cycle keep their declaration order.
    pub fn dependency_order(&self) -> impl DoubleEndedIterator<Item = &ModuleDescriptor> {
        self.order.iter().map(|&i| &self.modules[i])
    }
}

/// Kahn's algorithm that always emits the earliest-declared ready module, so the result is
/// deterministic and equals declaration order when that order is already valid. Dependencies
/// on unregistered modules do not constrain ordering.
fn dependency_order(modules: &[ModuleDescriptor], index: &HashMap<String, usize>) -> Vec<usize> {
    let mut emitted = vec![false; modules.len()];
    let mut order = Vec::with_capacity(modules.len());

    while order.len() < modules.len() {
        let ready = (0..modules.len()).find(|&i| {
            !emitted[i]
                && modules[i]
                    .dependencies
                    .iter()
                    .filter_map(|dep| index.get(dep))
                    .all(|&d| emitted[d])
        });
        // On a cycle nothing is ready; fall back to the earliest pending module.
        let next = match ready {
            Some(i) => i,
            None => match (0..modules.len()).find(|&i| !emitted[i]) {
                Some(i) => {
                    tracing::warn!(
                        module = %modules[i].name,
                        "dependency cycle in module registry"
                    );
                    i
                }
                None => break,
            },
        };
        emitted[next] = true;
        order.push(next);
    }

    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names<'a>(iter: impl Iterator<Item = &'a ModuleDescriptor>) -> Vec<&'a str> {
        iter.map(|m| m.name.as_str()).collect()
    }

    #[test]
    fn dependency_order_puts_prerequisites_first() {
        let registry = ModuleRegistry::new(vec![
            ModuleDescriptor::new("b", "B", &["a"]),
            ModuleDescriptor::new("a", "A", &[]),
        ])
        .expect("registry");
        assert_eq!(names(registry.dependency_order()), vec!["a", "b"]);
        assert_eq!(names(registry.dependency_order().rev()), vec!["b", "a"]);
    }

    #[test]
    fn dependency_order_keeps_declaration_order_when_valid() {
        let registry = ModuleRegistry::new(vec![
            ModuleDescriptor::new("a", "A", &[]),
            ModuleDescriptor::new("c", "C", &[]),
            ModuleDescriptor::new("b", "B", &["a"]),
        ])
        .expect("registry");
        assert_eq!(names(registry.dependency_order()), vec!["a", "c", "b"]);
    }

    #[test]
    fn dependency_order_survives_cycles() {
        let registry = ModuleRegistry::new(vec![
            ModuleDescriptor::new("x", "X", &["y"]),
            ModuleDescriptor::new("y", "Y", &["x"]),
            ModuleDescriptor::new("z", "Z", &[]),
        ])
        .expect("registry");
        assert_eq!(names(registry.dependency_order()), vec!["z", "x", "y"]);
    }

    #[test]
    fn dependents_are_indexed() {
        let registry = ModuleRegistry::builtin().expect("builtin registry");
        assert_eq!(registry.dependents_of("clients"), ["proposals".to_string()]);
        assert!(registry.dependents_of("reports").is_empty());
        assert!(registry.dependencies_of("unknown").is_empty());
    }

    #[test]
    fn unregistered_dependencies_have_no_dependents() {
        let registry = ModuleRegistry::new(vec![ModuleDescriptor::new("b", "B", &["ext"])])
            .expect("registry");
        assert_eq!(registry.dependencies_of("b"), ["ext".to_string()]);
        assert!(registry.dependents_of("ext").is_empty());
    }

    #[test]
    fn rejects_duplicates_and_self_dependencies() {
        let duplicate = ModuleRegistry::new(vec![
            ModuleDescriptor::new("a", "A", &[]),
            ModuleDescriptor::new("a", "A again", &[]),
        ]);
        assert!(matches!(duplicate, Err(RegistryError::Duplicate(name)) if name == "a"));

        let selfish = ModuleRegistry::new(vec![ModuleDescriptor::new("a", "A", &["a"])]);
        assert!(matches!(selfish, Err(RegistryError::SelfDependency(_))));

        let invalid = ModuleRegistry::new(vec![ModuleDescriptor::new("Bad Name", "?", &[])]);
        assert!(matches!(invalid, Err(RegistryError::InvalidName { .. })));
    }

    #[test]
    fn loads_registry_from_toml_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("modules.toml");
        std::fs::write(
            &path,
            r#"
            [[modules]]
            name = "crm"
            display_name = "CRM"

            [[modules]]
            name = "campaigns"
            display_name = "Campaigns"
            dependencies = ["crm"]
            route = "/admin/campaigns"
            "#,
        )
        .expect("write registry");

        let registry = ModuleRegistry::load(&path).expect("load");
        assert_eq!(registry.dependencies_of("campaigns"), ["crm".to_string()]);
        assert_eq!(
            registry.get("campaigns").and_then(|m| m.route.as_deref()),
            Some("/admin/campaigns")
        );
    }
}
