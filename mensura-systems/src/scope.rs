//! System scope - the systems and groups defined against one registry

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;

use mensura_core::{Result, UnitError};
use mensura_units::Registry;
use tracing::warn;

use crate::definition::SystemDefinition;
use crate::group::{Group, GroupTable};
use crate::lister::{guard_attribute, suggest, Lister};
use crate::system::{RootResolver, System};

const SYSTEMS: &str = "systems";

/// Systems and groups sharing one registry
#[derive(Debug)]
pub struct SystemScope {
    registry: Arc<dyn Registry>,
    groups: Arc<GroupTable>,
    systems: BTreeMap<String, System>,
}

impl SystemScope {
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        Self {
            registry,
            groups: Arc::new(GroupTable::new()),
            systems: BTreeMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<dyn Registry> {
        &self.registry
    }

    pub fn group_table(&self) -> &Arc<GroupTable> {
        &self.groups
    }

    /// Register (or replace) a group; systems using it see the change
    pub fn add_group(&self, name: impl Into<String>, group: Arc<dyn Group>) -> Result<()> {
        let name = name.into();
        if self.groups.insert(name.clone(), group)?.is_some() {
            warn!("Redefining group '{}'", name);
        }
        Ok(())
    }

    /// Build and register a system, resolving root units through the registry
    pub fn define_system(&mut self, definition: &SystemDefinition) -> Result<&System> {
        let registry = Arc::clone(&self.registry);
        self.define_system_with(definition, |name: &str| registry.root_units_of(name))
    }

    /// Build and register a system with a custom root-unit resolver.
    ///
    /// Nothing is registered when construction fails.
    pub fn define_system_with<F: RootResolver>(&mut self, definition: &SystemDefinition, resolver: F) -> Result<&System> {
        let system = System::from_definition(definition, resolver, Arc::clone(&self.groups))?;
        let system = match self.systems.entry(definition.name.clone()) {
            Entry::Occupied(mut entry) => {
                warn!("Redefining system '{}'", definition.name);
                entry.insert(system);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(system),
        };
        Ok(system)
    }

    pub fn define_system_from_lines(&mut self, text: &str) -> Result<&System> {
        let definition = SystemDefinition::from_lines(text)?;
        self.define_system(&definition)
    }

    fn unknown_system(&self, name: &str) -> UnitError {
        UnitError::UnknownAttribute {
            owner: SYSTEMS.to_string(),
            name: name.to_string(),
            suggestions: suggest(name, self.systems.keys().map(|k| k.as_str())),
        }
    }

    pub fn system(&self, name: &str) -> Result<&System> {
        self.systems().get(name).copied()
    }

    pub fn system_mut(&mut self, name: &str) -> Result<&mut System> {
        guard_attribute(SYSTEMS, name)?;
        if !self.systems.contains_key(name) {
            return Err(self.unknown_system(name));
        }
        self.systems
            .get_mut(name)
            .ok_or_else(|| UnitError::Internal(format!("system '{}' disappeared", name)))
    }

    pub fn systems(&self) -> Lister<&System> {
        Lister::new(SYSTEMS, self.systems.iter().map(|(name, system)| (name.clone(), system)).collect())
    }

    pub fn groups(&self) -> Result<Lister<Arc<dyn Group>>> {
        Ok(Lister::new("groups", self.groups.snapshot()?))
    }

    /// The registry's default system, when it names one defined here
    pub fn default_system(&self) -> Option<&System> {
        let name = self.registry.default_system()?;
        let system = self.systems.get(&name);
        if system.is_none() {
            warn!("Default system '{}' is not defined", name);
        }
        system
    }

    /// Registry name for `item`, preferring the default system's own units
    pub fn resolve(&self, item: &str) -> Result<String> {
        match self.default_system() {
            Some(system) => system.resolve(item, &*self.registry),
            None if self.registry.contains(item) => Ok(item.to_string()),
            None => Err(UnitError::UndefinedUnit(item.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::UnitGroup;
    use crate::system::tests::registry;
    use mensura_units::{RegistryConfig, UnitRegistry};

    fn scope() -> SystemScope {
        SystemScope::new(Arc::new(registry()))
    }

    #[test]
    fn test_define_and_lookup() {
        let mut scope = scope();
        let system = scope.define_system_from_lines("@system mks using international\n    kilogram : gram\n@end").unwrap();
        assert_eq!(system.name(), "mks");

        assert_eq!(scope.system("mks").unwrap().base_units().len(), 1);
        assert_eq!(scope.systems().names().collect::<Vec<_>>(), vec!["mks"]);
        scope.system_mut("mks").unwrap().add_groups(["extra"]);
        assert!(scope.system("mks").unwrap().used_groups().contains("extra"));
    }

    #[test]
    fn test_failed_definition_registers_nothing() {
        let mut scope = scope();
        assert!(scope.define_system_from_lines("@system bad\n    newton\n").is_err());
        assert!(scope.systems().is_empty());
        assert!(scope.system("bad").is_err());
    }

    #[test]
    fn test_unknown_system_suggestions() {
        let mut scope = scope();
        scope.define_system_from_lines("@system imperial").unwrap();
        match scope.system("imperal") {
            Err(UnitError::UnknownAttribute { suggestions, .. }) => assert_eq!(suggestions, vec!["imperial"]),
            other => panic!("unexpected: {:?}", other.map(|s| s.name())),
        }
        assert!(matches!(scope.system_mut("_hidden"), Err(UnitError::UnknownAttribute { .. })));
        assert!(scope.system_mut("metric").is_err());
    }

    #[test]
    fn test_redefinition_replaces() {
        let mut scope = scope();
        scope.define_system_from_lines("@system s\n    centimeter").unwrap();
        scope.define_system_from_lines("@system s\n    foot").unwrap();
        assert_eq!(scope.systems().len(), 1);
        assert!(scope.system("s").unwrap().base_units()["meter"].contains_key("foot"));
    }

    #[test]
    fn test_groups_shared_with_systems() {
        let mut scope = scope();
        scope.add_group("root", Arc::new(UnitGroup::new(["meter", "second"]))).unwrap();
        scope.define_system_from_lines("@system plain").unwrap();
        assert_eq!(scope.system("plain").unwrap().members().unwrap().len(), 2);

        scope.add_group("root", Arc::new(UnitGroup::new(["gram"]))).unwrap();
        let members = scope.system("plain").unwrap().members().unwrap();
        assert!(members.contains("gram"));
        assert!(!members.contains("meter"));

        let groups = scope.groups().unwrap();
        assert_eq!(groups.names().collect::<Vec<_>>(), vec!["root"]);
        assert!(groups.get("roots").is_err());
    }

    #[test]
    fn test_resolve_through_default_system() {
        let plain = scope();
        assert_eq!(plain.resolve("foot").unwrap(), "foot");
        assert!(matches!(plain.resolve("furlong"), Err(UnitError::UndefinedUnit(_))));

        let mut registry = UnitRegistry::with_config(RegistryConfig::new().with_default_system("US"));
        registry.define_base_unit("meter", "m", "[length]").unwrap();
        registry.define_unit("foot", "ft", "0.3048 meter").unwrap();
        registry.define_unit("US_foot", "", "1200/3937 meter").unwrap();
        let mut scope = SystemScope::new(Arc::new(registry));
        assert_eq!(scope.resolve("foot").unwrap(), "foot");

        scope.define_system_from_lines("@system US").unwrap();
        assert_eq!(scope.default_system().map(|s| s.name()), Some("US"));
        assert_eq!(scope.resolve("foot").unwrap(), "US_foot");
        assert_eq!(scope.resolve("meter").unwrap(), "meter");
    }
}
