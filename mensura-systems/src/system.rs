//! Systems - groups of units plus root-unit substitution rules
//!
//! A system uses a set of groups (its members are their union) and rewrites
//! some root units in terms of preferred units: `kilogram : gram` makes
//! kilogram the system's mass unit in place of the root unit gram.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError};

use mensura_core::{Exponent, Number, Result, UnitError, UnitsContainer};
use mensura_units::Registry;
use tracing::{debug, warn};

use crate::definition::SystemDefinition;
use crate::group::{GroupTable, GroupVersion};
use crate::lister::guard_attribute;

/// Expansion of a unit name into root units (see `Registry::root_units_of`)
pub trait RootResolver: Fn(&str) -> Result<(Number, UnitsContainer)> {}

impl<F> RootResolver for F where F: Fn(&str) -> Result<(Number, UnitsContainer)> {}

#[derive(Debug)]
struct MemberCache {
    versions: BTreeMap<String, Option<GroupVersion>>,
    members: Arc<BTreeSet<String>>,
}

#[derive(Debug)]
pub struct System {
    name: String,
    used_groups: BTreeSet<String>,
    /// Root unit name -> replacement units and their exponents
    base_units: BTreeMap<String, BTreeMap<String, Exponent>>,
    derived_units: BTreeSet<String>,
    groups: Arc<GroupTable>,
    members: Mutex<Option<MemberCache>>,
}

fn cache_poisoned<T>(_: PoisonError<T>) -> UnitError {
    UnitError::Internal("system member cache lock poisoned".to_string())
}

impl System {
    /// Empty system using no groups
    pub fn new(name: impl Into<String>, groups: Arc<GroupTable>) -> Self {
        Self {
            name: name.into(),
            used_groups: BTreeSet::new(),
            base_units: BTreeMap::new(),
            derived_units: BTreeSet::new(),
            groups,
            members: Mutex::new(None),
        }
    }

    /// Build a system from its definition, resolving units with `resolver`
    pub fn from_definition<F: RootResolver>(
        definition: &SystemDefinition,
        resolver: F,
        groups: Arc<GroupTable>,
    ) -> Result<Self> {
        let mut base_units: BTreeMap<String, BTreeMap<String, Exponent>> = BTreeMap::new();

        for rule in &definition.unit_replacements {
            let (old_unit, replacement) = match &rule.old_unit {
                None => {
                    let (_, root) = resolver(rule.new_unit.as_str())?;
                    let mut terms = root.iter();
                    let (old_unit, exp) = match (terms.next(), terms.next()) {
                        (Some(term), None) => term,
                        _ => {
                            return Err(UnitError::system_definition(
                                rule.line,
                                format!(
                                    "'{}' must expand to a single root unit when no replaced unit is given",
                                    rule.new_unit
                                ),
                            ))
                        }
                    };
                    let replacement = BTreeMap::from([(rule.new_unit.clone(), exp.recip())]);
                    (old_unit.to_string(), replacement)
                }
                Some(old_unit) => {
                    let (_, old_root) = resolver(old_unit.as_str())?;
                    if old_root != UnitsContainer::single(old_unit.as_str()) {
                        return Err(UnitError::system_definition(
                            rule.line,
                            format!("the unit at the right of the `:` ({}) must be a root unit", old_unit),
                        ));
                    }

                    let (_, expanded) = resolver(rule.new_unit.as_str())?;
                    let old_exp = expanded.get(old_unit);
                    if old_exp == Exponent::from_integer(0) {
                        return Err(UnitError::system_definition(
                            rule.line,
                            format!("'{}' is not a component of '{}'", old_unit, rule.new_unit),
                        ));
                    }

                    // new = old^k * prod(other^v)  =>  old = new^(1/k) * prod(other^(-v/k))
                    let mut replacement: BTreeMap<String, Exponent> = expanded
                        .iter()
                        .filter(|(name, _)| *name != old_unit.as_str())
                        .map(|(name, exp)| (name.to_string(), -exp / old_exp))
                        .collect();
                    replacement.insert(rule.new_unit.clone(), old_exp.recip());
                    (old_unit.clone(), replacement)
                }
            };

            if base_units.insert(old_unit.clone(), replacement).is_some() {
                debug!(system = %definition.name, line = rule.line, "Overwriting base unit rule for '{}'", old_unit);
            }
        }

        let mut system = Self::new(definition.name.clone(), groups);
        system.add_groups(definition.using_group_names.iter().cloned());
        system.base_units = base_units;
        Ok(system)
    }

    /// Parse a definition block and build the system from it
    pub fn from_lines<F: RootResolver>(text: &str, resolver: F, groups: Arc<GroupTable>) -> Result<Self> {
        let definition = SystemDefinition::from_lines(text)?;
        Self::from_definition(&definition, resolver, groups)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn used_groups(&self) -> &BTreeSet<String> {
        &self.used_groups
    }

    pub fn base_units(&self) -> &BTreeMap<String, BTreeMap<String, Exponent>> {
        &self.base_units
    }

    pub fn derived_units(&self) -> &BTreeSet<String> {
        &self.derived_units
    }

    /// Replacement for a root unit, as a container
    pub fn base_unit(&self, root: &str) -> Option<UnitsContainer> {
        self.base_units
            .get(root)
            .map(|terms| terms.iter().map(|(name, exp)| (name.as_str(), *exp)).collect())
    }

    pub fn add_groups<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.used_groups.extend(names.into_iter().map(Into::into));
        self.clear_cache();
    }

    pub fn remove_groups<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) {
        for name in names {
            self.used_groups.remove(name);
        }
        self.clear_cache();
    }

    fn clear_cache(&mut self) {
        *self.members.get_mut().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Drop the cached member set; the next `members` call recomputes it
    pub fn invalidate_members(&self) -> Result<()> {
        *self.members.lock().map_err(cache_poisoned)? = None;
        Ok(())
    }

    fn group_versions(&self) -> Result<BTreeMap<String, Option<GroupVersion>>> {
        self.used_groups
            .iter()
            .map(|name| -> Result<_> { Ok((name.clone(), self.groups.version_of(name)?)) })
            .collect()
    }

    /// Union of the members of every used group.
    ///
    /// Unknown groups are skipped with a warning. The result is cached until
    /// the used groups change or any of them reports a new version.
    pub fn members(&self) -> Result<Arc<BTreeSet<String>>> {
        let mut cache = self.members.lock().map_err(cache_poisoned)?;
        let versions = self.group_versions()?;
        if let Some(cached) = cache.as_ref() {
            if cached.versions == versions {
                return Ok(Arc::clone(&cached.members));
            }
        }

        let mut members = BTreeSet::new();
        for name in &self.used_groups {
            match self.groups.get(name)? {
                Some(group) => members.extend(group.members()),
                None => warn!("Could not resolve {} in System {}", name, self.name),
            }
        }
        debug!(system = %self.name, count = members.len(), "Recomputed system members");

        let members = Arc::new(members);
        *cache = Some(MemberCache { versions, members: Arc::clone(&members) });
        Ok(members)
    }

    /// Registry name of `item` within this system: `{system}_{item}` when
    /// defined, otherwise `item` itself
    pub fn resolve(&self, item: &str, registry: &dyn Registry) -> Result<String> {
        guard_attribute(&self.name, item)?;
        let prefixed = format!("{}_{}", self.name, item);
        if registry.contains(&prefixed) {
            return Ok(prefixed);
        }
        if registry.contains(item) {
            return Ok(item.to_string());
        }
        Err(UnitError::UnknownAttribute {
            owner: format!("System {}", self.name),
            name: item.to_string(),
            suggestions: Vec::new(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::group::UnitGroup;
    use mensura_units::UnitRegistry;

    pub(crate) fn registry() -> UnitRegistry {
        let mut registry = UnitRegistry::new();
        registry.define_base_unit("meter", "m", "[length]").unwrap();
        registry.define_base_unit("second", "s", "[time]").unwrap();
        registry.define_base_unit("gram", "g", "[mass]").unwrap();
        registry.define_unit("kilogram", "kg", "1000 gram").unwrap();
        registry.define_unit("centimeter", "cm", "0.01 meter").unwrap();
        registry.define_unit("foot", "ft", "0.3048 meter").unwrap();
        registry.define_unit("hertz", "Hz", "1 / second").unwrap();
        registry.define_unit("newton", "N", "kilogram * meter / second ** 2").unwrap();
        registry.define_unit("imperial_foot", "", "0.3048 meter").unwrap();
        registry
    }

    fn build(text: &str) -> Result<System> {
        let registry = registry();
        System::from_lines(text, |name: &str| registry.root_units_of(name), Arc::new(GroupTable::new()))
    }

    fn exps(pairs: &[(&str, i64, i64)]) -> BTreeMap<String, Exponent> {
        pairs.iter().map(|(name, n, d)| (name.to_string(), Exponent::new(*n, *d))).collect()
    }

    #[test]
    fn test_explicit_replacement() {
        let system = build("@system mks using international\n    kilogram : gram\n@end").unwrap();
        assert_eq!(system.name(), "mks");
        assert_eq!(system.base_units()["gram"], exps(&[("kilogram", 1, 1)]));
        assert_eq!(system.used_groups(), &BTreeSet::from(["international".to_string()]));
        assert!(system.derived_units().is_empty());
    }

    #[test]
    fn test_default_root_group() {
        let system = build("@system mysys").unwrap();
        assert_eq!(system.used_groups(), &BTreeSet::from(["root".to_string()]));
        assert!(system.base_units().is_empty());
    }

    #[test]
    fn test_bare_replacement_inverts_exponent() {
        let system = build("@system cgs\n    centimeter\n    hertz\n@end").unwrap();
        assert_eq!(system.base_units()["meter"], exps(&[("centimeter", 1, 1)]));
        assert_eq!(system.base_units()["second"], exps(&[("hertz", -1, 1)]));
    }

    #[test]
    fn test_composite_replacement() {
        // newton = gram * meter / second^2  =>  gram = newton * meter^-1 * second^2
        let system = build("@system force\n    newton : gram\n@end").unwrap();
        assert_eq!(
            system.base_units()["gram"],
            exps(&[("newton", 1, 1), ("meter", -1, 1), ("second", 2, 1)])
        );
        let replacement = system.base_unit("gram").unwrap();
        assert_eq!(replacement.get("second"), Exponent::from_integer(2));
        assert!(system.base_unit("meter").is_none());
    }

    #[test]
    fn test_last_rule_wins() {
        let system = build("@system s\n    centimeter\n    foot\n@end").unwrap();
        assert_eq!(system.base_units()["meter"], exps(&[("foot", 1, 1)]));
    }

    #[test]
    fn test_rule_errors() {
        let err = build("@system s\n    newton\n@end").unwrap_err();
        assert!(matches!(err, UnitError::SystemDefinition { line: 2, .. }));

        let err = build("@system s\n    newton : kilogram\n@end").unwrap_err();
        assert!(err.to_string().contains("must be a root unit"));

        let err = build("@system s\n\n    foot : second\n@end").unwrap_err();
        assert!(matches!(err, UnitError::SystemDefinition { line: 3, .. }));
        assert!(err.to_string().contains("not a component"));

        assert!(matches!(build("@system s\n    furlong\n"), Err(UnitError::UndefinedUnit(_))));
        assert!(build("@sys s").is_err());
    }

    #[test]
    fn test_members_union_and_groups() {
        let table = Arc::new(GroupTable::new());
        table.insert("length", Arc::new(UnitGroup::new(["meter", "foot"]))).unwrap();
        table.insert("time", Arc::new(UnitGroup::new(["second"]))).unwrap();

        let mut system = System::new("s", Arc::clone(&table));
        system.add_groups(["length"]);
        assert!(!system.members().unwrap().contains("second"));

        system.add_groups(["time", "missing"]);
        let members = system.members().unwrap();
        assert!(members.contains("second"));
        assert!(members.contains("meter"));
        assert_eq!(members.len(), 3);

        system.remove_groups(["time"]);
        assert!(!system.members().unwrap().contains("second"));
    }

    #[test]
    fn test_members_track_group_changes() {
        let table = Arc::new(GroupTable::new());
        let length = Arc::new(UnitGroup::new(["meter"]));
        table.insert("length", length.clone()).unwrap();

        let mut system = System::new("s", Arc::clone(&table));
        system.add_groups(["length"]);
        let first = system.members().unwrap();
        assert!(Arc::ptr_eq(&first, &system.members().unwrap()));

        length.add_units(["foot"]);
        assert!(system.members().unwrap().contains("foot"));

        table.insert("length", Arc::new(UnitGroup::new(["centimeter"]))).unwrap();
        let members = system.members().unwrap();
        assert_eq!(members.iter().collect::<Vec<_>>(), vec!["centimeter"]);

        system.invalidate_members().unwrap();
        assert!(!Arc::ptr_eq(&members, &system.members().unwrap()));
    }

    #[test]
    fn test_resolve_prefers_system_name() {
        let registry = registry();
        let system = System::new("imperial", Arc::new(GroupTable::new()));
        assert_eq!(system.resolve("foot", &registry).unwrap(), "imperial_foot");
        assert_eq!(system.resolve("meter", &registry).unwrap(), "meter");
        assert!(matches!(system.resolve("furlong", &registry), Err(UnitError::UnknownAttribute { .. })));
        assert!(system.resolve("_secret", &registry).is_err());
    }
}
