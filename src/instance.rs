//! Managed instances and intercepting wrappers
//!
//! What a scope store caches and what retrieval returns is an [`Instance`]: a bare
//! object with its type metadata, a [`ManagedProxy`] routing calls through the
//! invocation pipeline, or an opaque contract object produced by a service
//! provider or remote factory.

use crate::container::WeakRegistry;
use crate::descriptor::ManagedClass;
use crate::meta::ClassMeta;
use crate::{IocError, Object, Result, TypeKey, Value, take_value};
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

// =============================================================================
// Contract objects
// =============================================================================

/// An instance known only through one contract, typically a `dyn Trait`.
#[derive(Clone)]
pub struct ContractObject {
    contract: TypeKey,
    erased: Object,
    clone_fn: fn(&Object) -> Option<Value>,
    ptr_fn: fn(&Object) -> *const (),
}

fn clone_contract<C: ?Sized + Send + Sync + 'static>(erased: &Object) -> Option<Value> {
    erased
        .downcast_ref::<Arc<C>>()
        .map(|arc| Box::new(Arc::clone(arc)) as Value)
}

fn contract_ptr<C: ?Sized + Send + Sync + 'static>(erased: &Object) -> *const () {
    erased
        .downcast_ref::<Arc<C>>()
        .map_or(std::ptr::null(), |arc| Arc::as_ptr(arc) as *const ())
}

impl ContractObject {
    pub fn new<C: ?Sized + Send + Sync + 'static>(instance: Arc<C>) -> Self {
        Self {
            contract: TypeKey::of::<C>(),
            erased: Arc::new(instance),
            clone_fn: clone_contract::<C>,
            ptr_fn: contract_ptr::<C>,
        }
    }

    #[inline]
    pub fn contract(&self) -> &TypeKey {
        &self.contract
    }

    fn cast(&self, contract: &TypeKey) -> Option<Value> {
        if *contract == self.contract {
            (self.clone_fn)(&self.erased)
        } else {
            None
        }
    }
}

impl fmt::Debug for ContractObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractObject")
            .field("contract", &self.contract)
            .finish()
    }
}

// =============================================================================
// Instance
// =============================================================================

/// A retrieved component instance
#[derive(Clone)]
pub enum Instance {
    /// Concrete object handed out as is
    Bare { object: Object, class: Arc<ClassMeta> },
    /// Intercepting wrapper around a concrete object
    Proxy(Arc<ManagedProxy>),
    /// Object known only by its contract
    Contract(ContractObject),
}

impl Instance {
    /// View the instance as `contract`, yielding a value carrying `Arc<contract>`
    pub fn cast(&self, contract: &TypeKey) -> Result<Value> {
        let cast = match self {
            Instance::Bare { object, class } => class.cast(object, contract),
            Instance::Proxy(proxy) => proxy
                .class
                .proxy_adapter(contract)
                .map(|adapt| adapt(Arc::clone(proxy))),
            Instance::Contract(c) => c.cast(contract),
        };
        cast.ok_or_else(|| IocError::bug(format!("{} cannot be handed out as {contract}", self.type_name())))
    }

    /// Typed [`cast`](Self::cast)
    pub fn downcast<C: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<C>> {
        let contract = TypeKey::of::<C>();
        let value = self.cast(&contract)?;
        value
            .downcast::<Arc<C>>()
            .map(|arc| *arc)
            .map_err(|_| IocError::bug(format!("cast to {contract} produced a foreign value")))
    }

    /// The bare object behind any intercepting wrapper
    pub fn bare(&self) -> Option<&Object> {
        match self {
            Instance::Bare { object, .. } => Some(object),
            Instance::Proxy(proxy) => Some(&proxy.target),
            Instance::Contract(_) => None,
        }
    }

    /// Whether both handles refer to the same underlying object
    pub fn same(&self, other: &Instance) -> bool {
        self.data_ptr() == other.data_ptr()
    }

    fn data_ptr(&self) -> *const () {
        match self {
            Instance::Bare { object, .. } => Arc::as_ptr(object) as *const (),
            Instance::Proxy(proxy) => Arc::as_ptr(&proxy.target) as *const (),
            Instance::Contract(c) => (c.ptr_fn)(&c.erased),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Instance::Bare { class, .. } => class.name(),
            Instance::Proxy(proxy) => proxy.class.name(),
            Instance::Contract(c) => c.contract.name(),
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instance::Bare { class, .. } => f.debug_tuple("Bare").field(&class.name()).finish(),
            Instance::Proxy(proxy) => f.debug_tuple("Proxy").field(&proxy.class.name()).finish(),
            Instance::Contract(c) => f.debug_tuple("Contract").field(&c.contract).finish(),
        }
    }
}

// =============================================================================
// ManagedProxy
// =============================================================================

/// Intercepting wrapper: every call runs the invocation pipeline of the
/// matching method descriptor.
///
/// Contracts of a proxied component hand the proxy to their proxy adapter, a
/// small delegating type implementing the contract:
///
/// ```rust
/// use ioc_runtime::{ManagedProxy, Result, args};
/// use std::sync::Arc;
///
/// trait Car: Send + Sync {
///     fn drive(&self, km: u32) -> Result<String>;
/// }
///
/// struct CarProxy(Arc<ManagedProxy>);
///
/// impl Car for CarProxy {
///     fn drive(&self, km: u32) -> Result<String> {
///         self.0.call("drive", args![km])
///     }
/// }
/// ```
pub struct ManagedProxy {
    class: Arc<ManagedClass>,
    target: Object,
    registry: WeakRegistry,
}

impl ManagedProxy {
    pub(crate) fn new(class: Arc<ManagedClass>, target: Object, registry: WeakRegistry) -> Self {
        Self {
            class,
            target,
            registry,
        }
    }

    #[inline]
    pub fn descriptor(&self) -> &Arc<ManagedClass> {
        &self.class
    }

    #[inline]
    pub fn target(&self) -> &Object {
        &self.target
    }

    /// Call `name` through its processor chain
    pub fn invoke(&self, name: &str, args: Vec<Value>) -> Result<Option<Value>> {
        let method = self
            .class
            .find_method(name, &args)
            .ok_or_else(|| IocError::NoSuchMethod {
                class: self.class.name(),
                method: name.to_string(),
            })?;
        let registry = self.registry.upgrade()?;
        registry.ensure_usable()?;
        method.invoke(&registry, Arc::clone(&self.target), args)
    }

    /// Call a method returning `R`
    pub fn call<R: Any>(&self, name: &str, args: Vec<Value>) -> Result<R> {
        match self.invoke(name, args)? {
            Some(value) => take_value(value, name),
            None => Err(IocError::invocation(name, "method returned no value")),
        }
    }

    /// Call a void method; asynchronous methods return once dispatched
    pub fn run(&self, name: &str, args: Vec<Value>) -> Result<()> {
        self.invoke(name, args).map(|_| ())
    }
}

impl fmt::Debug for ManagedProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedProxy")
            .field("class", &self.class.name())
            .field("id", &self.class.id())
            .finish()
    }
}

// =============================================================================
// Scope adaptation
// =============================================================================

/// Registry link handed to scope adapters
#[derive(Clone)]
pub struct ScopeLink {
    registry: WeakRegistry,
    contract: TypeKey,
}

impl ScopeLink {
    pub(crate) fn new(registry: WeakRegistry, contract: TypeKey) -> Self {
        Self { registry, contract }
    }
}

/// Lazy handle re-resolving `C` on every [`get`](Self::get).
///
/// Injected through a scope adapter when a wider-scoped host depends on a thread
/// or session scoped component, so the host never pins one instance.
pub struct ScopedHandle<C: ?Sized> {
    link: ScopeLink,
    _marker: PhantomData<fn() -> Arc<C>>,
}

impl<C: ?Sized + Send + Sync + 'static> ScopedHandle<C> {
    pub(crate) fn new(link: ScopeLink) -> Self {
        Self {
            link,
            _marker: PhantomData,
        }
    }

    /// The instance visible in the caller's current context
    pub fn get(&self) -> Result<Arc<C>> {
        let registry = self.link.registry.upgrade()?;
        registry
            .get_instance_by_key(&self.link.contract, None, Vec::new())?
            .downcast::<C>()
    }
}

impl<C: ?Sized> Clone for ScopedHandle<C> {
    fn clone(&self) -> Self {
        Self {
            link: self.link.clone(),
            _marker: PhantomData,
        }
    }
}

impl<C: ?Sized> fmt::Debug for ScopedHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedHandle")
            .field("contract", &self.link.contract)
            .finish()
    }
}
