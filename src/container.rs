//! Managed component registry
//!
//! The `Registry` turns bindings into component descriptors at config time, then
//! hands out instances through the scope store and instantiation strategy each
//! descriptor selects. It is a cheap handle; clones share one registry.

use crate::binding::{Binding, InstanceType, Scope};
use crate::catalog::TypeCatalog;
use crate::descriptor::{BuildContext, ManagedClass};
use crate::factory::{
    InstanceFactory, LocalInstanceFactory, ProxyInstanceFactory, RemoteFactories, RemoteFactory,
    RemoteInstanceFactory, ServiceInstanceFactory, ServiceProviders,
};
use crate::method::ManagedMethod;
use crate::pipeline::{InvocationProcessor, Priority};
use crate::processor::{
    ConfigFieldsProcessor, ConfigurableProcessor, FieldInjectionProcessor, InstancePostProcessor,
    LoggingContextProcessor, PostConstructProcessor,
};
use crate::resolver;
use crate::scanner::{MetadataScanner, TagScanner};
use crate::scope::{
    ApplicationScopeFactory, InstanceKey, ScopeFactory, SessionScopeFactory, ThreadScopeFactory,
};
use crate::services::{
    AsyncProcessor, InterceptorProcessor, MeterProcessor, SecurityContext, SecurityProcessor,
    TransactionManager, TransactionProcessor,
};
use crate::{AppFactory, Instance, IocError, Result, TypeKey, Value};
use ahash::RandomState;
use parking_lot::ReentrantMutex;
use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

#[cfg(feature = "logging")]
use tracing::{debug, trace, warn};

// =============================================================================
// Strategies
// =============================================================================

/// Pluggable strategies of one registry, fixed once the registry is built
#[derive(Default)]
pub(crate) struct Strategies {
    scopes: HashMap<Scope, Box<dyn ScopeFactory>, RandomState>,
    factories: HashMap<InstanceType, Box<dyn InstanceFactory>, RandomState>,
    post_processors: Vec<(TypeId, Box<dyn InstancePostProcessor>)>,
    processors: Vec<Arc<dyn InvocationProcessor>>,
}

impl Strategies {
    #[inline]
    pub(crate) fn has_scope(&self, scope: Scope) -> bool {
        self.scopes.contains_key(&scope)
    }

    #[inline]
    pub(crate) fn has_factory(&self, instance_type: InstanceType) -> bool {
        self.factories.contains_key(&instance_type)
    }

    #[inline]
    pub(crate) fn processors(&self) -> &[Arc<dyn InvocationProcessor>] {
        &self.processors
    }

    fn scope(&self, scope: Scope) -> Result<&dyn ScopeFactory> {
        self.scopes
            .get(&scope)
            .map(|store| store.as_ref())
            .ok_or_else(|| IocError::bug(format!("no store for {scope} scope")))
    }

    fn factory(&self, instance_type: InstanceType) -> Result<&dyn InstanceFactory> {
        self.factories
            .get(&instance_type)
            .map(|factory| factory.as_ref())
            .ok_or_else(|| IocError::bug(format!("no factory for {instance_type} instances")))
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Lifecycle state of a registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RegistryState {
    Created = 0,
    Configured = 1,
    Started = 2,
    Destroyed = 3,
}

impl RegistryState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => RegistryState::Created,
            1 => RegistryState::Configured,
            2 => RegistryState::Started,
            _ => RegistryState::Destroyed,
        }
    }
}

struct RegistryInner {
    id: u64,
    catalog: TypeCatalog,
    scanner: Box<dyn MetadataScanner>,
    strategies: Strategies,
    classes: crate::storage::DescriptorStorage,
    /// Serializes lookup-or-create in scope stores; reentrant because
    /// construction resolves dependencies on the same thread
    lock: ReentrantMutex<()>,
    state: AtomicU8,
    next_id: AtomicU64,
}

/// The managed component registry.
///
/// # Examples
///
/// ```rust
/// use ioc_runtime::meta::{ClassMeta, Constructor};
/// use ioc_runtime::{Binding, RegistryBuilder, TypeCatalog};
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
///
/// #[derive(Default)]
/// struct English;
///
/// impl Greeter for English {
///     fn greet(&self) -> String { "hello".into() }
/// }
///
/// let catalog = TypeCatalog::new()
///     .with(
///         ClassMeta::class::<English>()
///             .implements(|e| e as Arc<dyn Greeter>)
///             .constructor(Constructor::default_of::<English>())
///             .build(),
///     )
///     .unwrap();
///
/// let registry = RegistryBuilder::new().catalog(catalog).build();
/// registry.config(vec![Binding::new::<dyn Greeter>().to::<English>()]).unwrap();
///
/// let greeter = registry.get_instance::<dyn Greeter>().unwrap();
/// assert_eq!(greeter.greet(), "hello");
/// assert!(Arc::ptr_eq(&greeter, &registry.get_instance::<dyn Greeter>().unwrap()));
/// ```
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

/// Non-owning registry link held by proxies and scope adapters
#[derive(Clone)]
pub(crate) struct WeakRegistry(Weak<RegistryInner>);

impl WeakRegistry {
    pub(crate) fn upgrade(&self) -> Result<Registry> {
        self.0
            .upgrade()
            .map(|inner| Registry { inner })
            .ok_or_else(|| IocError::bug("registry dropped while its components are still in use"))
    }
}

/// A binding waiting to be built, with the id it will carry
struct Planned {
    id: u64,
    binding: Binding,
    contracts: Vec<TypeKey>,
}

fn contracts_of(binding: &Binding) -> Vec<TypeKey> {
    match (binding.contracts(), binding.implementation_type()) {
        ([], Some(implementation)) => vec![*implementation],
        (contracts, _) => contracts.to_vec(),
    }
}

impl Registry {
    /// Registry with the default strategies and an empty catalog
    pub fn new() -> Self {
        RegistryBuilder::new().build()
    }

    #[inline]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    #[inline]
    pub fn catalog(&self) -> &TypeCatalog {
        &self.inner.catalog
    }

    #[inline]
    pub fn state(&self) -> RegistryState {
        RegistryState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: RegistryState) {
        self.inner.state.store(state as u8, Ordering::Release);
    }

    pub(crate) fn downgrade(&self) -> WeakRegistry {
        WeakRegistry(Arc::downgrade(&self.inner))
    }

    pub(crate) fn ensure_usable(&self) -> Result<()> {
        if self.state() == RegistryState::Destroyed {
            return Err(IocError::bug(format!("registry {} used after destroy", self.id())));
        }
        Ok(())
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Build descriptors for `bindings` and make them available.
    ///
    /// A binding for exactly one contract replaces an earlier binding for that
    /// same single contract. Any other contract overlap, or a repeated binding
    /// name, is a configuration error. Nothing is installed if any binding fails.
    pub fn config(&self, bindings: Vec<Binding>) -> Result<()> {
        let _guard = self.inner.lock.lock();
        match self.state() {
            RegistryState::Created | RegistryState::Configured => {}
            state => {
                return Err(IocError::bug(format!("config called on a {state:?} registry")));
            }
        }

        let existing = self.inner.classes.ordered();
        let mut replaced: HashSet<u64> = HashSet::new();
        let mut plan: Vec<Planned> = Vec::with_capacity(bindings.len());

        for binding in bindings {
            let contracts = contracts_of(&binding);

            if let [contract] = contracts.as_slice() {
                if let Some(position) = plan.iter().position(|p| p.contracts == [*contract]) {
                    #[cfg(feature = "logging")]
                    debug!(target: "ioc_runtime", contract = contract.name(), "Binding overrides an earlier one");

                    plan.remove(position);
                    plan.push(Planned {
                        id: self.inner.next_id.fetch_add(1, Ordering::Relaxed),
                        binding,
                        contracts,
                    });
                    continue;
                }
                if let Some(class) = existing
                    .iter()
                    .find(|c| !replaced.contains(&c.id()) && c.contracts() == [*contract])
                {
                    #[cfg(feature = "logging")]
                    debug!(target: "ioc_runtime", contract = contract.name(), "Binding overrides a configured one");

                    replaced.insert(class.id());
                    plan.push(Planned {
                        id: self.inner.next_id.fetch_add(1, Ordering::Relaxed),
                        binding,
                        contracts,
                    });
                    continue;
                }
            }

            for contract in &contracts {
                let taken = plan.iter().any(|p| p.contracts.contains(contract))
                    || existing
                        .iter()
                        .any(|c| !replaced.contains(&c.id()) && c.contracts().contains(contract));
                if taken {
                    return Err(IocError::config(format!("contract {contract} is bound more than once")));
                }
            }

            if let Some(name) = binding.name() {
                let taken = plan.iter().any(|p| p.binding.name() == Some(name))
                    || existing
                        .iter()
                        .any(|c| !replaced.contains(&c.id()) && c.binding_name() == Some(name));
                if taken {
                    return Err(IocError::config(format!("binding name {name:?} is used more than once")));
                }
            }

            plan.push(Planned {
                id: self.inner.next_id.fetch_add(1, Ordering::Relaxed),
                binding,
                contracts,
            });
        }

        let ctx = BuildContext {
            catalog: &self.inner.catalog,
            scanner: self.inner.scanner.as_ref(),
            strategies: &self.inner.strategies,
        };
        let mut classes: Vec<Arc<ManagedClass>> = existing
            .into_iter()
            .filter(|c| !replaced.contains(&c.id()))
            .collect();
        for planned in &plan {
            let class = ManagedClass::build(planned.id, &planned.binding, &ctx)?;
            self.inner
                .strategies
                .factory(class.instance_type())
                .map_err(|_| IocError::config(format!("no factory for {} instances", class.instance_type())))?
                .validate(&class)?;
            classes.push(Arc::new(class));
        }

        #[cfg(feature = "logging")]
        debug!(
            target: "ioc_runtime",
            registry = self.id(),
            added = plan.len(),
            replaced = replaced.len(),
            total = classes.len(),
            "Registry configured"
        );

        self.inner.classes.install(classes);
        self.set_state(RegistryState::Configured);
        Ok(())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Instantiate every auto-start component in declaration order
    pub fn start(&self) -> Result<()> {
        {
            let _guard = self.inner.lock.lock();
            if self.state() != RegistryState::Configured {
                return Err(IocError::bug(format!("start called on a {:?} registry", self.state())));
            }
            self.set_state(RegistryState::Started);
        }

        let auto_start: Vec<_> = self
            .inner
            .classes
            .ordered()
            .into_iter()
            .filter(|c| c.is_auto_start())
            .collect();

        #[cfg(feature = "logging")]
        debug!(target: "ioc_runtime", registry = self.id(), components = auto_start.len(), "Starting registry");

        for class in &auto_start {
            self.retrieve(class, None, Vec::new())?;
        }
        Ok(())
    }

    /// Run pre-destroy hooks in reverse declaration order, then drop every
    /// cached instance. The registry is unusable afterwards.
    ///
    /// A failing hook is logged and teardown continues.
    pub fn destroy(&self) -> Result<()> {
        let guard = self.inner.lock.lock();
        self.ensure_usable()?;

        #[cfg(feature = "logging")]
        debug!(target: "ioc_runtime", registry = self.id(), "Destroying registry");

        for class in self.inner.classes.ordered().iter().rev() {
            let Some(hook) = class.pre_destroy() else { continue };
            if class.scope() == Scope::Local {
                continue;
            }
            let Ok(store) = self.inner.strategies.scope(class.scope()) else {
                continue;
            };
            // instances never created, or living in an inactive context, are skipped
            let Ok(Some(instance)) = store.get(class.instance_key()) else {
                continue;
            };
            let Some(object) = instance.bare() else { continue };

            if let Err(_err) = hook.run(object, class.simple_name()) {
                #[cfg(feature = "logging")]
                warn!(target: "ioc_runtime", class = class.name(), error = %_err, "Pre-destroy hook failed");
            }
        }

        self.set_state(RegistryState::Destroyed);
        for store in self.inner.strategies.scopes.values() {
            store.clear();
        }
        // in-flight asynchronous calls may still be waiting for the lock
        drop(guard);

        for processor in &self.inner.strategies.processors {
            processor.shutdown();
        }
        self.inner.classes.clear();
        Ok(())
    }

    // =========================================================================
    // Retrieval
    // =========================================================================

    /// Instance of `C`, failing with `NotFound` if `C` is not managed
    pub fn get_instance<C: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<C>> {
        self.get_instance_with::<C>(Vec::new())
    }

    /// Instance of `C` built from explicit constructor arguments when it is created
    pub fn get_instance_with<C: ?Sized + Send + Sync + 'static>(&self, args: Vec<Value>) -> Result<Arc<C>> {
        self.get_instance_by_key(&TypeKey::of::<C>(), None, args)?
            .downcast::<C>()
    }

    /// Instance of `C` cached under `name` instead of the descriptor's own key
    pub fn get_named_instance<C: ?Sized + Send + Sync + 'static>(
        &self,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Arc<C>> {
        self.get_instance_by_key(&TypeKey::of::<C>(), Some(name), args)?
            .downcast::<C>()
    }

    /// Instance of `C`, `None` when `C` is unmanaged or its service has no provider
    pub fn get_optional_instance<C: ?Sized + Send + Sync + 'static>(
        &self,
        args: Vec<Value>,
    ) -> Result<Option<Arc<C>>> {
        match self.optional_instance_of(&TypeKey::of::<C>(), args)? {
            Some(instance) => instance.downcast::<C>().map(Some),
            None => Ok(None),
        }
    }

    pub fn get_instance_by_key(&self, contract: &TypeKey, name: Option<&str>, args: Vec<Value>) -> Result<Instance> {
        self.ensure_usable()?;
        let class = self
            .descriptor_for(contract)
            .ok_or_else(|| IocError::not_found(contract))?;
        self.retrieve(&class, name, args)
    }

    pub fn get_instance_by_descriptor(&self, class: &Arc<ManagedClass>, args: Vec<Value>) -> Result<Instance> {
        self.retrieve(class, None, args)
    }

    /// Lookup-or-create in the descriptor's scope store, then post-process
    /// instances created by this call
    pub(crate) fn retrieve(&self, class: &Arc<ManagedClass>, name: Option<&str>, args: Vec<Value>) -> Result<Instance> {
        self.ensure_usable()?;
        let factory = self.inner.strategies.factory(class.instance_type())?;

        if class.scope() == Scope::Local {
            let args = resolver::preprocess(self, &class.host(), class.constructor_params(), args)?;

            #[cfg(feature = "logging")]
            trace!(target: "ioc_runtime", class = class.name(), "Creating local instance");

            return factory.create(class, args, self);
        }

        let store = self.inner.strategies.scope(class.scope())?;
        let key = match name {
            Some(name) => InstanceKey::qualified(class.id(), name),
            None => class.instance_key().clone(),
        };

        let (instance, created) = {
            let _guard = self.inner.lock.lock();
            self.ensure_usable()?;
            match store.get(&key)? {
                Some(instance) => (instance, false),
                None => {
                    let args = resolver::preprocess(self, &class.host(), class.constructor_params(), args)?;
                    let instance = factory.create(class, args, self)?;

                    #[cfg(feature = "logging")]
                    trace!(
                        target: "ioc_runtime",
                        class = class.name(),
                        scope = %class.scope(),
                        key = %key,
                        "Created instance"
                    );

                    (store.put(key, instance)?, true)
                }
            }
        };

        if created {
            self.post_process(class, &instance)?;
        }
        Ok(instance)
    }

    fn post_process(&self, class: &ManagedClass, instance: &Instance) -> Result<()> {
        let Some(object) = instance.bare() else {
            return Ok(());
        };
        for (_, processor) in &self.inner.strategies.post_processors {
            processor.process(self, class, object)?;
        }
        Ok(())
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    #[inline]
    pub fn is_managed(&self, contract: &TypeKey) -> bool {
        self.inner.classes.contains(contract)
    }

    #[inline]
    pub fn get_descriptor(&self, contract: &TypeKey) -> Option<Arc<ManagedClass>> {
        self.inner.classes.get(contract)
    }

    #[inline]
    pub(crate) fn descriptor_for(&self, contract: &TypeKey) -> Option<Arc<ManagedClass>> {
        self.inner.classes.get(contract)
    }

    /// Descriptors in declaration order
    pub fn all_descriptors(&self) -> Vec<Arc<ManagedClass>> {
        self.inner.classes.ordered()
    }

    /// Every method descriptor; asking an empty registry is a bug
    pub fn all_methods(&self) -> Result<Vec<Arc<ManagedMethod>>> {
        let classes = self.inner.classes.ordered();
        if classes.is_empty() {
            return Err(IocError::bug("all_methods called on a registry without descriptors"));
        }
        Ok(classes
            .iter()
            .flat_map(|c| c.methods().iter().cloned())
            .collect())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.classes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop the session scoped instances of `session`
    pub fn end_session(&self, session: &str) {
        for store in self.inner.strategies.scopes.values() {
            store.end_context(session);
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl AppFactory for Registry {
    fn instance_of(&self, contract: &TypeKey, name: Option<&str>, args: Vec<Value>) -> Result<Instance> {
        self.get_instance_by_key(contract, name, args)
    }

    fn optional_instance_of(&self, contract: &TypeKey, args: Vec<Value>) -> Result<Option<Instance>> {
        self.ensure_usable()?;
        let Some(class) = self.descriptor_for(contract) else {
            return Ok(None);
        };
        match self.retrieve(&class, None, args) {
            Ok(instance) => Ok(Some(instance)),
            Err(e) if e.is_absence() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn is_managed_contract(&self, contract: &TypeKey) -> bool {
        self.is_managed(contract)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("descriptors", &self.len())
            .field("catalog", &self.inner.catalog.len())
            .finish()
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Explicit strategy registration for a [`Registry`].
///
/// [`RegistryBuilder::new`] registers the default strategies: application,
/// thread and session scope stores; local, proxied, service and remote
/// factories; the five instance post-processors; the security, interceptor and
/// asynchronous invocation processors. Registering a second strategy for the
/// same key is a bug.
pub struct RegistryBuilder {
    catalog: TypeCatalog,
    scanner: Box<dyn MetadataScanner>,
    strategies: Strategies,
    services: Arc<ServiceProviders>,
    remotes: Arc<RemoteFactories>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        let mut builder = Self::empty();
        let services = Arc::clone(&builder.services);
        let remotes = Arc::clone(&builder.remotes);
        let strategies = &mut builder.strategies;

        for store in [
            Box::new(ApplicationScopeFactory::new()) as Box<dyn ScopeFactory>,
            Box::new(ThreadScopeFactory::new()),
            Box::new(SessionScopeFactory::new()),
        ] {
            strategies.scopes.insert(store.scope(), store);
        }
        for factory in [
            Box::new(LocalInstanceFactory) as Box<dyn InstanceFactory>,
            Box::new(ProxyInstanceFactory),
            Box::new(ServiceInstanceFactory::new(services)),
            Box::new(RemoteInstanceFactory::new(remotes)),
        ] {
            strategies.factories.insert(factory.instance_type(), factory);
        }
        strategies.post_processors = vec![
            (TypeId::of::<FieldInjectionProcessor>(), Box::new(FieldInjectionProcessor)),
            (TypeId::of::<ConfigFieldsProcessor>(), Box::new(ConfigFieldsProcessor)),
            (TypeId::of::<ConfigurableProcessor>(), Box::new(ConfigurableProcessor)),
            (TypeId::of::<PostConstructProcessor>(), Box::new(PostConstructProcessor)),
            (TypeId::of::<LoggingContextProcessor>(), Box::new(LoggingContextProcessor)),
        ];
        strategies.processors = vec![
            Arc::new(SecurityProcessor::default()),
            Arc::new(InterceptorProcessor::new()),
            Arc::new(AsyncProcessor::default()),
        ];
        builder
    }

    /// Builder without any strategy
    pub fn empty() -> Self {
        Self {
            catalog: TypeCatalog::new(),
            scanner: Box::new(TagScanner),
            strategies: Strategies::default(),
            services: Arc::new(ServiceProviders::new()),
            remotes: Arc::new(RemoteFactories::new()),
        }
    }

    pub fn catalog(mut self, catalog: TypeCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn scanner<S: MetadataScanner + 'static>(mut self, scanner: S) -> Self {
        self.scanner = Box::new(scanner);
        self
    }

    pub fn scope_factory<S: ScopeFactory + 'static>(mut self, store: S) -> Result<Self> {
        let scope = store.scope();
        if self.strategies.scopes.contains_key(&scope) {
            return Err(IocError::bug(format!("store for {scope} scope registered twice")));
        }
        self.strategies.scopes.insert(scope, Box::new(store));
        Ok(self)
    }

    pub fn instance_factory<F: InstanceFactory + 'static>(mut self, factory: F) -> Result<Self> {
        let instance_type = factory.instance_type();
        if self.strategies.factories.contains_key(&instance_type) {
            return Err(IocError::bug(format!("factory for {instance_type} instances registered twice")));
        }
        self.strategies.factories.insert(instance_type, Box::new(factory));
        Ok(self)
    }

    /// Append a post-processor; runs after the ones already registered
    pub fn post_processor<P: InstancePostProcessor + 'static>(mut self, processor: P) -> Result<Self> {
        let id = TypeId::of::<P>();
        if self.strategies.post_processors.iter().any(|(existing, _)| *existing == id) {
            return Err(IocError::bug(format!(
                "post-processor {} registered twice",
                processor.name()
            )));
        }
        self.strategies.post_processors.push((id, Box::new(processor)));
        Ok(self)
    }

    pub fn with_processor(mut self, processor: Arc<dyn InvocationProcessor>) -> Result<Self> {
        if self.strategies.processors.iter().any(|p| p.name() == processor.name()) {
            return Err(IocError::bug(format!(
                "invocation processor {} registered twice",
                processor.name()
            )));
        }
        self.strategies.processors.push(processor);
        Ok(self)
    }

    /// Register `processor`, dropping any processor of the same name
    pub fn replace_processor(mut self, processor: Arc<dyn InvocationProcessor>) -> Self {
        self.strategies.processors.retain(|p| p.name() != processor.name());
        self.strategies.processors.push(processor);
        self
    }

    /// Enable transactional methods
    pub fn transaction_manager(self, manager: Arc<dyn TransactionManager>) -> Result<Self> {
        if self
            .strategies
            .processors
            .iter()
            .any(|p| p.priority() == Priority::Transaction)
        {
            return Err(IocError::bug("transaction manager registered twice"));
        }
        self.with_processor(Arc::new(TransactionProcessor::new(manager)))
    }

    pub fn security_context(self, context: Arc<dyn SecurityContext>) -> Self {
        self.replace_processor(Arc::new(SecurityProcessor::new(context)))
    }

    /// Size of the worker pool running asynchronous methods
    pub fn async_workers(self, workers: usize) -> Self {
        self.replace_processor(Arc::new(AsyncProcessor::new(workers)))
    }

    pub fn metering(self, meter: Arc<MeterProcessor>) -> Result<Self> {
        self.with_processor(meter)
    }

    /// Runtime implementation of service contract `C`
    pub fn service<C, F>(self, provider: F) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
        F: Fn() -> Arc<C> + Send + Sync + 'static,
    {
        self.services.provide::<C, F>(provider);
        self
    }

    pub fn remote_factory(self, factory: Arc<dyn RemoteFactory>) -> Result<Self> {
        self.remotes.register(factory)?;
        Ok(self)
    }

    /// Providers consulted by the default service factory
    pub fn service_providers(&self) -> Arc<ServiceProviders> {
        Arc::clone(&self.services)
    }

    /// Protocols known to the default remote factory
    pub fn remote_factories(&self) -> Arc<RemoteFactories> {
        Arc::clone(&self.remotes)
    }

    pub fn build(self) -> Registry {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        let id = COUNTER.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "logging")]
        debug!(
            target: "ioc_runtime",
            registry = id,
            scopes = self.strategies.scopes.len(),
            factories = self.strategies.factories.len(),
            post_processors = self.strategies.post_processors.len(),
            processors = self.strategies.processors.len(),
            types = self.catalog.len(),
            "Creating registry"
        );

        Registry {
            inner: Arc::new(RegistryInner {
                id,
                catalog: self.catalog,
                scanner: self.scanner,
                strategies: self.strategies,
                classes: crate::storage::DescriptorStorage::new(),
                lock: ReentrantMutex::new(()),
                state: AtomicU8::new(RegistryState::Created as u8),
                next_id: AtomicU64::new(1),
            }),
        }
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let processors: Vec<_> = self.strategies.processors.iter().map(|p| p.name()).collect();
        f.debug_struct("RegistryBuilder")
            .field("catalog", &self.catalog)
            .field("scopes", &self.strategies.scopes.keys().collect::<Vec<_>>())
            .field("factories", &self.strategies.factories.keys().collect::<Vec<_>>())
            .field("processors", &processors)
            .finish()
    }
}
