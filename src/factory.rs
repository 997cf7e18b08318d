//! Instantiation strategies
//!
//! An [`InstanceFactory`] turns a descriptor and its pre-processed constructor
//! arguments into a bare [`Instance`]. One factory is registered per
//! [`InstanceType`]; the registry picks it from the descriptor.

use crate::binding::InstanceType;
use crate::descriptor::ManagedClass;
use crate::instance::{ContractObject, ManagedProxy};
use crate::{Instance, IocError, Registry, Result, TypeKey, Value};
use ahash::RandomState;
use dashmap::DashMap;
use std::any::TypeId;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Strategy producing bare instances for one [`InstanceType`]
pub trait InstanceFactory: Send + Sync {
    fn instance_type(&self) -> InstanceType;

    /// Config time check of a freshly built descriptor
    fn validate(&self, _class: &ManagedClass) -> Result<()> {
        Ok(())
    }

    fn create(&self, class: &Arc<ManagedClass>, args: Vec<Value>, registry: &Registry) -> Result<Instance>;
}

// =============================================================================
// Local and proxied
// =============================================================================

/// Direct construction, instance handed out as is
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalInstanceFactory;

impl InstanceFactory for LocalInstanceFactory {
    fn instance_type(&self) -> InstanceType {
        InstanceType::Local
    }

    fn create(&self, class: &Arc<ManagedClass>, args: Vec<Value>, _registry: &Registry) -> Result<Instance> {
        let (object, meta) = class.construct(args)?;
        Ok(Instance::Bare { object, class: meta })
    }
}

/// Direct construction wrapped in a [`ManagedProxy`]
#[derive(Debug, Default, Clone, Copy)]
pub struct ProxyInstanceFactory;

impl InstanceFactory for ProxyInstanceFactory {
    fn instance_type(&self) -> InstanceType {
        InstanceType::Proxied
    }

    fn create(&self, class: &Arc<ManagedClass>, args: Vec<Value>, registry: &Registry) -> Result<Instance> {
        let (object, _) = class.construct(args)?;

        #[cfg(feature = "logging")]
        trace!(
            target: "ioc_runtime",
            class = class.name(),
            methods = class.methods().len(),
            "Wrapping instance in managed proxy"
        );

        Ok(Instance::Proxy(Arc::new(ManagedProxy::new(
            Arc::clone(class),
            object,
            registry.downgrade(),
        ))))
    }
}

fn single_contract(class: &ManagedClass) -> Result<&TypeKey> {
    match class.contracts() {
        [contract] => Ok(contract),
        _ => Err(IocError::config(format!(
            "{} binding for {} must declare exactly one contract",
            class.instance_type(),
            class.name()
        ))),
    }
}

// =============================================================================
// Service providers
// =============================================================================

type ProviderFn = Arc<dyn Fn() -> ContractObject + Send + Sync>;

/// Runtime implementations of service contracts, first registration wins.
#[derive(Default)]
pub struct ServiceProviders {
    providers: DashMap<TypeId, Vec<ProviderFn>, RandomState>,
}

impl ServiceProviders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider for contract `C`
    pub fn provide<C, F>(&self, provider: F)
    where
        C: ?Sized + Send + Sync + 'static,
        F: Fn() -> Arc<C> + Send + Sync + 'static,
    {
        #[cfg(feature = "logging")]
        debug!(
            target: "ioc_runtime",
            contract = std::any::type_name::<C>(),
            "Registering service provider"
        );

        let provider: ProviderFn = Arc::new(move || ContractObject::new(provider()));
        self.providers.entry(TypeId::of::<C>()).or_default().push(provider);
    }

    #[inline]
    pub fn has_provider(&self, contract: &TypeKey) -> bool {
        self.providers.get(&contract.id()).is_some_and(|list| !list.is_empty())
    }

    fn lookup(&self, contract: &TypeKey) -> Option<ProviderFn> {
        self.providers
            .get(&contract.id())
            .and_then(|list| list.first().cloned())
    }
}

/// Instances looked up among [`ServiceProviders`]
pub struct ServiceInstanceFactory {
    providers: Arc<ServiceProviders>,
}

impl ServiceInstanceFactory {
    pub fn new(providers: Arc<ServiceProviders>) -> Self {
        Self { providers }
    }
}

impl InstanceFactory for ServiceInstanceFactory {
    fn instance_type(&self) -> InstanceType {
        InstanceType::Service
    }

    fn validate(&self, class: &ManagedClass) -> Result<()> {
        single_contract(class).map(|_| ())
    }

    fn create(&self, class: &Arc<ManagedClass>, _args: Vec<Value>, _registry: &Registry) -> Result<Instance> {
        let contract = single_contract(class)?;
        let provider = self
            .providers
            .lookup(contract)
            .ok_or_else(|| IocError::no_provider(contract))?;
        Ok(Instance::Contract(provider()))
    }
}

// =============================================================================
// Remote
// =============================================================================

/// Builds client stubs for one address protocol, e.g. `http`
pub trait RemoteFactory: Send + Sync {
    fn protocol(&self) -> &str;

    fn create(&self, contract: &TypeKey, address: &str) -> Result<ContractObject>;
}

/// Registered remote factories keyed by protocol
#[derive(Default)]
pub struct RemoteFactories {
    factories: DashMap<String, Arc<dyn RemoteFactory>, RandomState>,
}

impl RemoteFactories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory; a second factory for the same protocol is a bug
    pub fn register(&self, factory: Arc<dyn RemoteFactory>) -> Result<()> {
        let protocol = factory.protocol().to_ascii_lowercase();
        match self.factories.entry(protocol) {
            dashmap::mapref::entry::Entry::Occupied(entry) => Err(IocError::bug(format!(
                "remote factory for protocol {:?} registered twice",
                entry.key()
            ))),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(factory);
                Ok(())
            }
        }
    }

    fn for_address(&self, address: &str) -> Result<Arc<dyn RemoteFactory>> {
        let protocol = protocol_of(address)?;
        self.factories
            .get(&protocol)
            .map(|f| Arc::clone(f.value()))
            .ok_or_else(|| IocError::config(format!("no remote factory for protocol {protocol:?}")))
    }
}

fn protocol_of(address: &str) -> Result<String> {
    address
        .split_once("://")
        .map(|(protocol, _)| protocol.to_ascii_lowercase())
        .filter(|p| !p.is_empty())
        .ok_or_else(|| IocError::config(format!("remote address {address:?} names no protocol")))
}

/// Stubs for components living behind a remote address
pub struct RemoteInstanceFactory {
    factories: Arc<RemoteFactories>,
}

impl RemoteInstanceFactory {
    pub fn new(factories: Arc<RemoteFactories>) -> Self {
        Self { factories }
    }
}

impl InstanceFactory for RemoteInstanceFactory {
    fn instance_type(&self) -> InstanceType {
        InstanceType::Remote
    }

    fn validate(&self, class: &ManagedClass) -> Result<()> {
        single_contract(class)?;
        let address = class
            .remote_address()
            .ok_or_else(|| IocError::config(format!("remote binding for {} has no address", class.name())))?;
        self.factories.for_address(address).map(|_| ())
    }

    fn create(&self, class: &Arc<ManagedClass>, _args: Vec<Value>, _registry: &Registry) -> Result<Instance> {
        let contract = single_contract(class)?;
        let address = class
            .remote_address()
            .ok_or_else(|| IocError::bug(format!("remote descriptor {} lost its address", class.name())))?;
        let stub = self.factories.for_address(address)?.create(contract, address)?;
        if stub.contract() != contract {
            return Err(IocError::bug(format!(
                "remote factory returned a {} stub for {contract}",
                stub.contract()
            )));
        }
        Ok(Instance::Contract(stub))
    }
}
