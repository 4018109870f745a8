//! Unit groups and the shared group table

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use mensura_core::{Result, UnitError};

/// A named, possibly changing set of unit names
pub trait Group: fmt::Debug + Send + Sync {
    fn members(&self) -> BTreeSet<String>;

    /// Bumped whenever `members` changes; systems recompute their cache on change
    fn version(&self) -> u64 {
        0
    }
}

/// Group with an explicit, editable member list
#[derive(Debug, Default)]
pub struct UnitGroup {
    members: RwLock<BTreeSet<String>>,
    version: AtomicU64,
}

impl UnitGroup {
    pub fn new<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            members: RwLock::new(members.into_iter().map(Into::into).collect()),
            version: AtomicU64::new(0),
        }
    }

    pub fn add_units<I, S>(&self, units: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut members = self.members.write().unwrap_or_else(PoisonError::into_inner);
        members.extend(units.into_iter().map(Into::into));
        self.version.fetch_add(1, Ordering::SeqCst);
    }

    pub fn remove_units<'a>(&self, units: impl IntoIterator<Item = &'a str>) {
        let mut members = self.members.write().unwrap_or_else(PoisonError::into_inner);
        for unit in units {
            members.remove(unit);
        }
        self.version.fetch_add(1, Ordering::SeqCst);
    }
}

impl Group for UnitGroup {
    fn members(&self) -> BTreeSet<String> {
        self.members.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }
}

/// Change marker for one group table entry: slot replacement plus the group's own version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupVersion {
    pub stamp: u64,
    pub version: u64,
}

#[derive(Debug, Clone)]
struct Slot {
    group: Arc<dyn Group>,
    stamp: u64,
}

/// Named groups shared by every system of a scope
#[derive(Debug, Default)]
pub struct GroupTable {
    slots: RwLock<BTreeMap<String, Slot>>,
    clock: AtomicU64,
}

fn poisoned<T>(_: PoisonError<T>) -> UnitError {
    UnitError::Internal("group table lock poisoned".to_string())
}

impl GroupTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, Slot>>> {
        self.slots.read().map_err(poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, Slot>>> {
        self.slots.write().map_err(poisoned)
    }

    /// Register `group` under `name`, returning the group it replaces
    pub fn insert(&self, name: impl Into<String>, group: Arc<dyn Group>) -> Result<Option<Arc<dyn Group>>> {
        let stamp = self.clock.fetch_add(1, Ordering::SeqCst) + 1;
        let previous = self.write()?.insert(name.into(), Slot { group, stamp });
        Ok(previous.map(|slot| slot.group))
    }

    pub fn remove(&self, name: &str) -> Result<Option<Arc<dyn Group>>> {
        Ok(self.write()?.remove(name).map(|slot| slot.group))
    }

    pub fn get(&self, name: &str) -> Result<Option<Arc<dyn Group>>> {
        Ok(self.read()?.get(name).map(|slot| Arc::clone(&slot.group)))
    }

    pub fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.read()?.contains_key(name))
    }

    /// `None` when no group is registered under `name`
    pub fn version_of(&self, name: &str) -> Result<Option<GroupVersion>> {
        Ok(self.read()?.get(name).map(|slot| GroupVersion {
            stamp: slot.stamp,
            version: slot.group.version(),
        }))
    }

    pub fn names(&self) -> Result<Vec<String>> {
        Ok(self.read()?.keys().cloned().collect())
    }

    /// Current groups by name
    pub fn snapshot(&self) -> Result<BTreeMap<String, Arc<dyn Group>>> {
        Ok(self
            .read()?
            .iter()
            .map(|(name, slot)| (name.clone(), Arc::clone(&slot.group)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(set: &BTreeSet<String>) -> Vec<&str> {
        set.iter().map(|s| s.as_str()).collect()
    }

    #[test]
    fn test_unit_group_versions() {
        let group = UnitGroup::new(["meter", "second"]);
        assert_eq!(group.version(), 0);
        group.add_units(["gram"]);
        assert_eq!(group.version(), 1);
        group.remove_units(["meter"]);
        assert_eq!(group.version(), 2);
        assert_eq!(names(&group.members()), vec!["gram", "second"]);
    }

    #[test]
    fn test_table_insert_replace_remove() {
        let table = GroupTable::new();
        assert!(table.insert("si", Arc::new(UnitGroup::new(["meter"]))).unwrap().is_none());
        let first = table.version_of("si").unwrap().unwrap();

        let replaced = table.insert("si", Arc::new(UnitGroup::new(["second"]))).unwrap();
        assert_eq!(names(&replaced.unwrap().members()), vec!["meter"]);
        let second = table.version_of("si").unwrap().unwrap();
        assert_ne!(first, second);

        assert!(table.contains("si").unwrap());
        assert_eq!(table.names().unwrap(), vec!["si"]);
        assert!(table.remove("si").unwrap().is_some());
        assert_eq!(table.version_of("si").unwrap(), None);
        assert!(table.get("si").unwrap().is_none());
    }

    #[test]
    fn test_version_tracks_group_edits() {
        let table = GroupTable::new();
        let group = Arc::new(UnitGroup::new(["meter"]));
        table.insert("si", group.clone()).unwrap();
        let before = table.version_of("si").unwrap();
        group.add_units(["second"]);
        assert_ne!(table.version_of("si").unwrap(), before);
    }
}
