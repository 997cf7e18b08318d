//! Metadata scanning
//!
//! The descriptor builder never reads tags directly; it asks a [`MetadataScanner`],
//! so the lookup convention is a pluggable strategy.

use crate::catalog::TypeCatalog;
use crate::meta::{ClassMeta, MethodMeta, Tag};
use crate::TypeKey;

/// Strategy deciding which tags apply to a type or a method.
pub trait MetadataScanner: Send + Sync {
    /// Type level tags for an implementation declaring `contracts`
    fn class_tags(&self, catalog: &TypeCatalog, class: Option<&ClassMeta>, contracts: &[TypeKey])
    -> Vec<Tag>;

    /// Method level tags for `method` of an implementation declaring `contracts`
    fn method_tags(&self, catalog: &TypeCatalog, method: &MethodMeta, contracts: &[TypeKey]) -> Vec<Tag>;
}

/// Default scanner.
///
/// Precedence is per tag kind: the implementation first, then its superclass
/// chain, then each contract in declaration order. Contracts are not climbed.
/// Method tags come from the implementation method, then the matching method
/// (same name and arity) of each contract.
#[derive(Debug, Default, Clone, Copy)]
pub struct TagScanner;

/// Upper bound on superclass chain length, guards against cyclic `extends`
const MAX_HIERARCHY_DEPTH: usize = 32;

fn merge(into: &mut Vec<Tag>, from: &[Tag]) {
    for tag in from {
        if !into.iter().any(|t| t.kind() == tag.kind()) {
            into.push(tag.clone());
        }
    }
}

impl MetadataScanner for TagScanner {
    fn class_tags(
        &self,
        catalog: &TypeCatalog,
        class: Option<&ClassMeta>,
        contracts: &[TypeKey],
    ) -> Vec<Tag> {
        let mut tags = Vec::new();

        if let Some(class) = class {
            merge(&mut tags, class.tags());

            let mut parent = class.superclass().copied();
            let mut depth = 0;
            while let Some(key) = parent {
                let Some(meta) = catalog.get(&key) else { break };
                merge(&mut tags, meta.tags());
                parent = meta.superclass().copied();
                depth += 1;
                if depth >= MAX_HIERARCHY_DEPTH {
                    break;
                }
            }
        }

        for contract in contracts {
            if class.is_some_and(|c| c.key() == contract) {
                continue;
            }
            if let Some(meta) = catalog.get(contract) {
                merge(&mut tags, meta.tags());
            }
        }

        tags
    }

    fn method_tags(&self, catalog: &TypeCatalog, method: &MethodMeta, contracts: &[TypeKey]) -> Vec<Tag> {
        let mut tags = method.tags().to_vec();

        for contract in contracts {
            let Some(meta) = catalog.get(contract) else { continue };
            if let Some(declared) = meta.methods().iter().find(|m| method.overrides(m)) {
                merge(&mut tags, declared.tags());
            }
        }

        tags
    }
}
