//! Component facing traits
//!
//! These traits define what types can be managed, how managed components reach
//! back into the registry, and the one-method lifecycle contracts.

use crate::binding::Properties;
use crate::{BoxError, Instance, IocError, Result, TypeKey, Value};
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;

/// Marker trait for types that can be managed by the registry.
///
/// Automatically implemented for all types that are `Send + Sync + 'static`.
pub trait Component: Send + Sync + 'static {
    /// Returns the type name for debugging
    #[inline]
    fn type_name_of() -> &'static str
    where
        Self: Sized,
    {
        std::any::type_name::<Self>()
    }
}

// Blanket implementation - everything that's Send + Sync + 'static is a Component
impl<T: Send + Sync + 'static> Component for T {}

/// The factory abstraction handed to components that depend on the registry itself.
///
/// The registry is never a managed component; a dependency on `dyn AppFactory`
/// is satisfied with a reference to the registry that is resolving it.
pub trait AppFactory: Send + Sync {
    /// Retrieve the instance bound to `contract`, failing if it is not managed
    fn instance_of(&self, contract: &TypeKey, name: Option<&str>, args: Vec<Value>)
    -> Result<Instance>;

    /// Retrieve the instance bound to `contract`, `None` if unmanaged or unprovided
    fn optional_instance_of(&self, contract: &TypeKey, args: Vec<Value>) -> Result<Option<Instance>>;

    /// Whether a descriptor exists for `contract`
    fn is_managed_contract(&self, contract: &TypeKey) -> bool;
}

/// Typed helpers over any [`AppFactory`]
pub trait AppFactoryExt: AppFactory {
    fn get<C: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<C>> {
        self.instance_of(&TypeKey::of::<C>(), None, Vec::new())?
            .downcast::<C>()
    }

    fn get_optional<C: ?Sized + Send + Sync + 'static>(&self) -> Result<Option<Arc<C>>> {
        match self.optional_instance_of(&TypeKey::of::<C>(), Vec::new())? {
            Some(instance) => instance.downcast::<C>().map(Some),
            None => Ok(None),
        }
    }
}

impl<F: AppFactory + ?Sized> AppFactoryExt for F {}

/// Hook run once after a cached instance is created and its fields injected.
pub trait PostConstruct {
    fn post_construct(&self) -> std::result::Result<(), BoxError>;
}

/// Hook run when the registry is destroyed, in reverse declaration order.
pub trait PreDestroy {
    fn pre_destroy(&self) -> std::result::Result<(), BoxError>;
}

/// Callback receiving the binding properties of a freshly created instance.
pub trait Configurable {
    fn configure(&self, properties: &Properties) -> std::result::Result<(), BoxError>;
}

// =============================================================================
// Late-bound fields
// =============================================================================

/// Component field filled by field injection after construction.
///
/// Pair with [`ClassMetaBuilder::inject_late`](crate::meta::ClassMetaBuilder::inject_late).
pub struct Late<C: ?Sized>(OnceCell<Arc<C>>);

impl<C: ?Sized> Late<C> {
    pub const fn new() -> Self {
        Self(OnceCell::new())
    }

    /// Fill the field; a second injection is rejected
    pub fn set(&self, dependency: Arc<C>) -> std::result::Result<(), BoxError> {
        self.0
            .set(dependency)
            .map_err(|_| format!("{} injected twice", std::any::type_name::<C>()).into())
    }

    /// The injected component; reading before injection is a bug
    pub fn get(&self) -> Result<&Arc<C>> {
        self.0.get().ok_or_else(|| {
            IocError::bug(format!(
                "{} read before field injection",
                std::any::type_name::<C>()
            ))
        })
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.0.get().is_some()
    }
}

impl<C: ?Sized> Default for Late<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ?Sized> fmt::Debug for Late<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Late")
            .field("type", &std::any::type_name::<C>())
            .field("set", &self.is_set())
            .finish()
    }
}
