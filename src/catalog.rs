//! Catalog of type metadata
//!
//! The catalog is the registry's view of "what types exist": every implementation
//! named by a binding, every contract carrying tags or adapters, and every plain
//! class the resolver may build on the fly must be described here.

use crate::meta::ClassMeta;
use crate::{IocError, Result, TypeKey};
use ahash::RandomState;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

/// Immutable collection of [`ClassMeta`] records keyed by type.
#[derive(Default)]
pub struct TypeCatalog {
    types: HashMap<TypeId, Arc<ClassMeta>, RandomState>,
    /// Full and simple names; a simple name shared by two types maps to `None`
    names: HashMap<String, Option<TypeKey>, RandomState>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a type description. Describing a type twice is a bug.
    pub fn register(&mut self, meta: ClassMeta) -> Result<()> {
        let key = *meta.key();
        if self.types.contains_key(&key.id()) {
            return Err(IocError::bug(format!("type {key} described twice")));
        }

        self.names.insert(key.name().trim_start_matches("dyn ").to_string(), Some(key));
        self.names
            .entry(key.simple_name().to_string())
            .and_modify(|existing| {
                if *existing != Some(key) {
                    *existing = None;
                }
            })
            .or_insert(Some(key));

        self.types.insert(key.id(), Arc::new(meta));
        Ok(())
    }

    /// Builder-style [`register`](Self::register)
    pub fn with(mut self, meta: ClassMeta) -> Result<Self> {
        self.register(meta)?;
        Ok(self)
    }

    #[inline]
    pub fn get(&self, key: &TypeKey) -> Option<&Arc<ClassMeta>> {
        self.types.get(&key.id())
    }

    #[inline]
    pub fn contains(&self, key: &TypeKey) -> bool {
        self.types.contains_key(&key.id())
    }

    /// Look a type up by its full path or by its unambiguous simple name
    pub fn by_name(&self, name: &str) -> Option<TypeKey> {
        self.names.get(name.trim_start_matches("dyn ")).copied().flatten()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl std::fmt::Debug for TypeCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeCatalog")
            .field("count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Car: Send + Sync {}

    struct Sedan;

    mod other {
        pub struct Sedan;
    }

    #[test]
    fn test_duplicate_description_is_bug() {
        let mut catalog = TypeCatalog::new();
        catalog.register(ClassMeta::class::<Sedan>().build()).unwrap();
        let err = catalog.register(ClassMeta::class::<Sedan>().build()).unwrap_err();
        assert!(matches!(err, IocError::Bug(_)));
    }

    #[test]
    fn test_lookup_by_name() {
        let catalog = TypeCatalog::new()
            .with(ClassMeta::interface::<dyn Car>().build())
            .unwrap()
            .with(ClassMeta::class::<Sedan>().build())
            .unwrap();

        assert_eq!(catalog.by_name("Car"), Some(TypeKey::of::<dyn Car>()));
        assert_eq!(catalog.by_name("dyn Car"), Some(TypeKey::of::<dyn Car>()));
        assert_eq!(
            catalog.by_name(std::any::type_name::<Sedan>()),
            Some(TypeKey::of::<Sedan>())
        );
        assert_eq!(catalog.by_name("Truck"), None);
    }

    #[test]
    fn test_ambiguous_simple_name() {
        let catalog = TypeCatalog::new()
            .with(ClassMeta::class::<Sedan>().build())
            .unwrap()
            .with(ClassMeta::class::<other::Sedan>().build())
            .unwrap();

        assert_eq!(catalog.by_name("Sedan"), None);
        assert_eq!(
            catalog.by_name(std::any::type_name::<other::Sedan>()),
            Some(TypeKey::of::<other::Sedan>())
        );
    }
}
