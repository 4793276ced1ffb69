//! Entity/component registry.
//!
//! A deliberately small ECS suitable for deterministic simulation and net
//! replication. It is not archetype-based; each component type lives in its
//! own dense storage keyed by entity id.
//!
//! Contracts:
//! - Entity ids are assigned monotonically and never recycled, so an id held
//!   by the network layer can never silently refer to a different entity.
//! - Per-type iteration follows insertion order. Structural changes
//!   (despawn/remove) may reorder a storage; spawning or despawning while a
//!   view is live is not done inside an update tick.
//! - Multi-component views iterate the narrowest listed storage and yield
//!   only entities possessing every listed type.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
};

use serde::{Deserialize, Serialize};

/// Opaque entity id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct EntityId(pub u64);

/// Dense per-type storage: entries in insertion order plus an id -> slot map.
struct Storage<T> {
    slots: HashMap<EntityId, usize>,
    entries: Vec<(EntityId, T)>,
}

impl<T> Default for Storage<T> {
    fn default() -> Self {
        Self {
            slots: HashMap::new(),
            entries: Vec::new(),
        }
    }
}

impl<T> Storage<T> {
    fn insert(&mut self, entity: EntityId, component: T) {
        if let Some(&slot) = self.slots.get(&entity) {
            self.entries[slot].1 = component;
        } else {
            self.slots.insert(entity, self.entries.len());
            self.entries.push((entity, component));
        }
    }

    fn remove(&mut self, entity: EntityId) -> Option<T> {
        let slot = self.slots.remove(&entity)?;
        let (_, component) = self.entries.swap_remove(slot);
        if slot < self.entries.len() {
            let moved = self.entries[slot].0;
            self.slots.insert(moved, slot);
        }
        Some(component)
    }

    fn get(&self, entity: EntityId) -> Option<&T> {
        self.slots.get(&entity).map(|&slot| &self.entries[slot].1)
    }

    fn get_mut(&mut self, entity: EntityId) -> Option<&mut T> {
        let slot = *self.slots.get(&entity)?;
        Some(&mut self.entries[slot].1)
    }
}

/// Object-safe view of a storage, for type-erased bookkeeping.
trait AnyStorage: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn remove_entity(&mut self, entity: EntityId);
    fn len(&self) -> usize;
    fn entity_ids(&self) -> Vec<EntityId>;
}

impl<T: 'static + Send + Sync> AnyStorage for Storage<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn remove_entity(&mut self, entity: EntityId) {
        self.remove(entity);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn entity_ids(&self) -> Vec<EntityId> {
        self.entries.iter().map(|(e, _)| *e).collect()
    }
}

/// The world registry: exclusive owner of all component storage.
#[derive(Default)]
pub struct World {
    next_id: u64,
    storages: HashMap<TypeId, Box<dyn AnyStorage>>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new entity. Ids are monotonic and never reused.
    pub fn spawn(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Destroys an entity, invalidating all of its components.
    pub fn despawn(&mut self, entity: EntityId) {
        for storage in self.storages.values_mut() {
            storage.remove_entity(entity);
        }
    }

    /// Inserts a component, replacing any existing component of that type.
    pub fn insert<T: 'static + Send + Sync>(&mut self, entity: EntityId, component: T) {
        self.storage_mut::<T>().insert(entity, component);
    }

    /// Removes a single component from an entity.
    pub fn remove<T: 'static + Send + Sync>(&mut self, entity: EntityId) -> Option<T> {
        self.try_storage_mut::<T>()?.remove(entity)
    }

    pub fn get<T: 'static + Send + Sync>(&self, entity: EntityId) -> Option<&T> {
        self.try_storage::<T>()?.get(entity)
    }

    pub fn get_mut<T: 'static + Send + Sync>(&mut self, entity: EntityId) -> Option<&mut T> {
        self.try_storage_mut::<T>()?.get_mut(entity)
    }

    /// Number of entities holding a component of type `T`.
    pub fn count<T: 'static + Send + Sync>(&self) -> usize {
        self.try_storage::<T>().map_or(0, |s| s.entries.len())
    }

    /// Iterates entities with a given component, in insertion order.
    pub fn iter<T: 'static + Send + Sync>(&self) -> impl Iterator<Item = (EntityId, &T)> {
        self.try_storage::<T>()
            .into_iter()
            .flat_map(|s| s.entries.iter().map(|(e, c)| (*e, c)))
    }

    /// Mutable variant of [`World::iter`].
    pub fn iter_mut<T: 'static + Send + Sync>(
        &mut self,
    ) -> impl Iterator<Item = (EntityId, &mut T)> {
        self.try_storage_mut::<T>()
            .into_iter()
            .flat_map(|s| s.entries.iter_mut().map(|(e, c)| (*e, &mut *c)))
    }

    /// Read-only view over entities possessing both listed component types.
    ///
    /// Iteration order is the insertion order of the narrowest storage. The
    /// view is lazy and restartable (call again for a fresh pass); write
    /// access goes through [`World::get_mut`] by id.
    pub fn view2<A, B>(&self) -> impl Iterator<Item = (EntityId, &A, &B)>
    where
        A: 'static + Send + Sync,
        B: 'static + Send + Sync,
    {
        let ids = self.narrowest_ids(&[TypeId::of::<A>(), TypeId::of::<B>()]);
        ids.into_iter()
            .filter_map(move |e| Some((e, self.get::<A>(e)?, self.get::<B>(e)?)))
    }

    /// Read-only view over entities possessing all three listed types.
    pub fn view3<A, B, C>(&self) -> impl Iterator<Item = (EntityId, &A, &B, &C)>
    where
        A: 'static + Send + Sync,
        B: 'static + Send + Sync,
        C: 'static + Send + Sync,
    {
        let ids = self.narrowest_ids(&[TypeId::of::<A>(), TypeId::of::<B>(), TypeId::of::<C>()]);
        ids.into_iter().filter_map(move |e| {
            Some((e, self.get::<A>(e)?, self.get::<B>(e)?, self.get::<C>(e)?))
        })
    }

    /// Entity ids of the smallest storage among `types`, in insertion order.
    /// A missing storage means the view is empty.
    fn narrowest_ids(&self, types: &[TypeId]) -> Vec<EntityId> {
        let mut narrowest: Option<&dyn AnyStorage> = None;
        for type_id in types {
            match self.storages.get(type_id) {
                Some(storage) => {
                    if narrowest.map_or(true, |n| storage.len() < n.len()) {
                        narrowest = Some(storage.as_ref());
                    }
                }
                None => return Vec::new(),
            }
        }
        narrowest.map_or_else(Vec::new, |s| s.entity_ids())
    }

    fn storage_mut<T: 'static + Send + Sync>(&mut self) -> &mut Storage<T> {
        self.storages
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(Storage::<T>::default()))
            .as_any_mut()
            .downcast_mut::<Storage<T>>()
            .expect("storage type mismatch")
    }

    fn try_storage<T: 'static + Send + Sync>(&self) -> Option<&Storage<T>> {
        self.storages
            .get(&TypeId::of::<T>())
            .and_then(|s| s.as_any().downcast_ref::<Storage<T>>())
    }

    fn try_storage_mut<T: 'static + Send + Sync>(&mut self) -> Option<&mut Storage<T>> {
        self.storages
            .get_mut(&TypeId::of::<T>())
            .and_then(|s| s.as_any_mut().downcast_mut::<Storage<T>>())
    }
}
