use std::{collections::HashMap, sync::Arc};

use parking_lot::{lock_api::ArcMutexGuard, Mutex, RawMutex, RwLock};
use support::names::ClassName;
use tracing::{trace, warn};

use crate::definition::Definition;

/// Definitions created by one loader, keyed by name.
///
/// Entries are never replaced or removed. Reads take a shared lock and never wait on
/// a definition in progress; the per-name locks only serialise local definition.
#[derive(Default)]
pub struct DefinitionCache {
    definitions: RwLock<HashMap<ClassName, Arc<Definition>>>,
    in_flight: Mutex<HashMap<ClassName, Arc<Mutex<()>>>>,
}

/// Outcome of an insert. `Raced` means another definition got there first and is
/// the one to use.
enum Insertion {
    Inserted(Arc<Definition>),
    Raced(Arc<Definition>),
}

impl DefinitionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &ClassName) -> Option<Arc<Definition>> {
        self.definitions.read().get(name).cloned()
    }

    pub fn contains(&self, name: &ClassName) -> bool {
        self.definitions.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.definitions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.read().is_empty()
    }

    pub fn names(&self) -> Vec<ClassName> {
        let mut names: Vec<ClassName> = self.definitions.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Store `definition` unless `name` is already present. Returns whichever
    /// definition ends up in the cache; a losing `definition` is dropped.
    pub fn put_if_absent(&self, name: &ClassName, definition: Definition) -> Arc<Definition> {
        match self.insert(name, definition) {
            Insertion::Inserted(def) => {
                trace!("Stored {}", name);
                def
            }
            Insertion::Raced(def) => {
                warn!("Duplicate definition of {}, keeping the first", name);
                def
            }
        }
    }

    fn insert(&self, name: &ClassName, definition: Definition) -> Insertion {
        let mut definitions = self.definitions.write();

        if let Some(existing) = definitions.get(name) {
            return Insertion::Raced(Arc::clone(existing));
        }

        let definition = Arc::new(definition);
        definitions.insert(name.clone(), Arc::clone(&definition));
        Insertion::Inserted(definition)
    }

    /// Enter the critical section for defining `name` at this cache's loader.
    pub(crate) fn lock_name(&self, name: &ClassName) -> NameGuard<'_> {
        let lock = Arc::clone(self.in_flight.lock().entry(name.clone()).or_default());

        NameGuard {
            cache: self,
            name: name.clone(),
            guard: Some(lock.lock_arc()),
            lock: Some(lock),
        }
    }

    #[cfg(test)]
    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// References to the lock for `name`: the map's own plus two per holder and
    /// one per waiter.
    #[cfg(test)]
    pub(crate) fn lock_references(&self, name: &ClassName) -> usize {
        self.in_flight.lock().get(name).map_or(0, Arc::strong_count)
    }
}

pub(crate) struct NameGuard<'a> {
    cache: &'a DefinitionCache,
    name: ClassName,
    guard: Option<ArcMutexGuard<RawMutex, ()>>,
    lock: Option<Arc<Mutex<()>>>,
}

impl Drop for NameGuard<'_> {
    fn drop(&mut self) {
        // Waiters clone the lock while holding the map, so the count is stable here
        let mut in_flight = self.cache.in_flight.lock();

        drop(self.guard.take());
        drop(self.lock.take());

        // Only the map's reference left: nobody holds or waits on this name
        if in_flight.get(&self.name).map_or(false, |lock| Arc::strong_count(lock) == 1) {
            in_flight.remove(&self.name);
        }
    }
}
