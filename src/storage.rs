//! Descriptor storage
//!
//! Uses DashMap for lock-free reads once the registry is configured.

use crate::TypeKey;
use crate::descriptor::ManagedClass;
use ahash::RandomState;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::HashSet;
use std::sync::Arc;

/// Descriptors keyed by every contract they declare, plus a creation-ordered view
pub(crate) struct DescriptorStorage {
    by_contract: DashMap<TypeId, Arc<ManagedClass>, RandomState>,
    ordered: RwLock<Vec<Arc<ManagedClass>>>,
}

impl DescriptorStorage {
    /// Create empty storage.
    ///
    /// Uses 8 shards; registries rarely hold more than a few hundred descriptors.
    #[inline]
    pub(crate) fn new() -> Self {
        Self {
            by_contract: DashMap::with_capacity_and_hasher_and_shard_amount(0, RandomState::new(), 8),
            ordered: RwLock::new(Vec::new()),
        }
    }

    /// Install a complete set of descriptors, sorted by id.
    ///
    /// Contracts no longer declared by any descriptor are dropped.
    pub(crate) fn install(&self, mut classes: Vec<Arc<ManagedClass>>) {
        classes.sort_by_key(|c| c.id());
        let declared: HashSet<TypeId> = classes
            .iter()
            .flat_map(|c| c.contracts().iter().map(|k| k.id()))
            .collect();
        self.by_contract.retain(|id, _| declared.contains(id));
        for class in &classes {
            for contract in class.contracts() {
                self.by_contract.insert(contract.id(), Arc::clone(class));
            }
        }
        *self.ordered.write() = classes;
    }

    #[inline]
    pub(crate) fn get(&self, contract: &TypeKey) -> Option<Arc<ManagedClass>> {
        self.by_contract.get(&contract.id()).map(|entry| Arc::clone(entry.value()))
    }

    #[inline]
    pub(crate) fn contains(&self, contract: &TypeKey) -> bool {
        self.by_contract.contains_key(&contract.id())
    }

    /// Snapshot in ascending id order
    pub(crate) fn ordered(&self) -> Vec<Arc<ManagedClass>> {
        self.ordered.read().clone()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.ordered.read().len()
    }

    pub(crate) fn clear(&self) {
        self.by_contract.clear();
        self.ordered.write().clear();
    }
}
