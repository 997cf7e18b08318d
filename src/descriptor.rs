//! Component descriptors
//!
//! A [`ManagedClass`] is built once per binding at config time and never changes
//! afterwards. Construction validates the binding against the type catalog,
//! scans tags through the registry's [`MetadataScanner`] and builds a
//! [`ManagedMethod`] for every method that needs interception.

use crate::binding::{Binding, InstanceType, Properties, Scope};
use crate::catalog::TypeCatalog;
use crate::container::Strategies;
use crate::meta::{
    ClassMeta, Constructor, HookFn, InvokeFn, MethodMeta, Param, ProxyAdapterFn, ScopeAdapterFn, Tag,
    TypeShape, Visibility, has_kind,
};
use crate::method::{ManagedMethod, MethodProfile};
use crate::pipeline::Priority;
use crate::resolver::HostRef;
use crate::scanner::MetadataScanner;
use crate::scope::InstanceKey;
use crate::{Args, IocError, Object, Result, TypeKey, Value};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::debug;

/// Everything descriptor construction reads besides the binding
pub(crate) struct BuildContext<'a> {
    pub(crate) catalog: &'a TypeCatalog,
    pub(crate) scanner: &'a dyn MetadataScanner,
    pub(crate) strategies: &'a Strategies,
}

/// Post-construct or pre-destroy hook, from the lifecycle trait or a tagged method
#[derive(Clone)]
pub(crate) enum LifecycleHook {
    Contract { label: &'static str, hook: HookFn },
    Method { name: &'static str, invoker: InvokeFn },
}

impl LifecycleHook {
    pub(crate) fn run(&self, object: &Object, class: &str) -> Result<()> {
        match self {
            LifecycleHook::Contract { label, hook } => {
                hook(object).map_err(|e| IocError::invocation(format!("{class}::{label}"), e))
            }
            LifecycleHook::Method { name, invoker } => invoker(object, Args::empty())
                .map(|_| ())
                .map_err(|e| IocError::invocation(format!("{class}::{name}"), e)),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            LifecycleHook::Contract { label, .. } => label,
            LifecycleHook::Method { name, .. } => name,
        }
    }
}

/// Adapters attached to one contract interface
#[derive(Clone)]
struct ContractAdapters {
    contract: TypeKey,
    proxy: Option<ProxyAdapterFn>,
    scope: Option<ScopeAdapterFn>,
}

/// Immutable descriptor of one managed component
pub struct ManagedClass {
    id: u64,
    key: TypeKey,
    contracts: Vec<TypeKey>,
    class: Option<Arc<ClassMeta>>,
    scope: Scope,
    instance_type: InstanceType,
    instance_key: InstanceKey,
    binding_name: Option<String>,
    constructor: Option<Constructor>,
    properties: Properties,
    tags: Vec<Tag>,
    methods: Vec<Arc<ManagedMethod>>,
    adapters: Vec<ContractAdapters>,
    post_construct: Option<LifecycleHook>,
    pre_destroy: Option<LifecycleHook>,
    remote: bool,
    auto_start: bool,
    remote_address: Option<String>,
}

impl ManagedClass {
    /// Build and validate the descriptor for `binding`
    pub(crate) fn build(id: u64, binding: &Binding, ctx: &BuildContext<'_>) -> Result<Self> {
        // strategies
        let scope = binding.scope_or_default();
        let instance_type = binding.resolved_instance_type()?;
        if scope != Scope::Local && !ctx.strategies.has_scope(scope) {
            return Err(IocError::config(format!("no store registered for {scope} scope")));
        }
        if !ctx.strategies.has_factory(instance_type) {
            return Err(IocError::config(format!("no factory registered for {instance_type} instances")));
        }

        // implementation and constructor
        let class = match (instance_type.requires_implementation(), binding.implementation_type()) {
            (true, Some(key)) => Some(implementation(ctx.catalog, key)?),
            (true, None) => {
                return Err(IocError::config(format!(
                    "{instance_type} binding for {:?} needs an implementation",
                    binding.contracts()
                )));
            }
            (false, Some(key)) => {
                return Err(IocError::config(format!(
                    "{instance_type} binding must not name implementation {key}"
                )));
            }
            (false, None) => None,
        };
        let constructor = match &class {
            Some(meta) => Some(select_constructor(meta)?.clone()),
            None => None,
        };
        if instance_type == InstanceType::Remote && binding.remote_address().is_none() {
            return Err(IocError::config(format!(
                "remote binding for {:?} has no address",
                binding.contracts()
            )));
        }

        // contracts
        let mut contracts: Vec<TypeKey> = Vec::new();
        for contract in binding.contracts() {
            if !contracts.contains(contract) {
                contracts.push(*contract);
            }
        }
        if contracts.is_empty() {
            match &class {
                Some(meta) => contracts.push(*meta.key()),
                None => return Err(IocError::config("binding declares neither contract nor implementation")),
            }
        }
        if let Some(meta) = &class {
            if let Some(contract) = contracts.iter().find(|c| !meta.is_kind_of(c)) {
                return Err(IocError::config(format!("{} does not implement {contract}", meta.name())));
            }
        }

        let mut adapters = Vec::with_capacity(contracts.len());
        for contract in &contracts {
            let meta = ctx.catalog.get(contract);
            if instance_type == InstanceType::Proxied {
                let proxiable = meta
                    .is_some_and(|m| m.shape() == TypeShape::Interface && m.proxy_adapter().is_some());
                if !proxiable {
                    return Err(IocError::config(format!(
                        "proxied contract {contract} must be an interface with a proxy adapter"
                    )));
                }
            }
            adapters.push(ContractAdapters {
                contract: *contract,
                proxy: meta.and_then(|m| m.proxy_adapter().cloned()),
                scope: meta.and_then(|m| m.scope_adapter().cloned()),
            });
        }

        // class level tags
        let key = class.as_ref().map_or(contracts[0], |meta| *meta.key());
        let tags = ctx.scanner.class_tags(ctx.catalog, class.as_deref(), &contracts);
        let remote = has_kind(&tags, "remote");
        let auto_start = has_kind(&tags, "auto-start");

        // methods
        let processors = ctx.strategies.processors();
        let has_transactions = processors.iter().any(|p| p.priority() == Priority::Transaction);
        let candidates: Vec<MethodMeta> = match &class {
            Some(meta) => meta.methods().to_vec(),
            None => contracts
                .iter()
                .filter_map(|c| ctx.catalog.get(c))
                .flat_map(|m| m.methods().iter().cloned())
                .collect(),
        };

        let mut methods = Vec::new();
        let mut post_construct_methods = Vec::new();
        let mut pre_destroy_methods = Vec::new();
        for method in candidates {
            let method_tags = ctx.scanner.method_tags(ctx.catalog, &method, &contracts);

            if has_kind(&method_tags, "post-construct") {
                post_construct_methods.push(method);
                continue;
            }
            if has_kind(&method_tags, "pre-destroy") {
                pre_destroy_methods.push(method);
                continue;
            }
            if method.visibility() == Visibility::Private && method_tags.is_empty() {
                continue;
            }

            let profile = MethodProfile::derive(key.name(), method.name(), method_tags, &tags);
            if profile.is_asynchronous() && method.return_type().is_some() {
                return Err(IocError::bug(format!(
                    "asynchronous method {}::{} must not return a value",
                    key.simple_name(),
                    method.name()
                )));
            }
            if profile.is_transactional() && !has_transactions {
                return Err(IocError::config(format!(
                    "{}::{} is transactional but no transaction manager is registered",
                    key.simple_name(),
                    method.name()
                )));
            }

            let warranted = profile.is_remote()
                || instance_type == InstanceType::Proxied
                || processors.iter().any(|p| p.claims(&profile));
            if warranted {
                methods.push(Arc::new(ManagedMethod::new(id, scope, method, profile, processors)));
            }
        }

        let mut remote_names = HashSet::new();
        for method in methods.iter().filter(|m| m.profile().is_remote()) {
            if !remote_names.insert(method.name()) {
                return Err(IocError::bug(format!(
                    "{} exposes remote method {} more than once",
                    key.name(),
                    method.name()
                )));
            }
        }

        // lifecycle
        let post_construct = lifecycle_hook(
            key,
            "post_construct",
            class.as_ref().and_then(|m| m.post_construct_hook()).cloned(),
            post_construct_methods,
        )?;
        let pre_destroy = lifecycle_hook(
            key,
            "pre_destroy",
            class.as_ref().and_then(|m| m.pre_destroy_hook()).cloned(),
            pre_destroy_methods,
        )?;

        let instance_key = match binding.name() {
            Some(name) => InstanceKey::named(name),
            None => InstanceKey::for_descriptor(id),
        };

        #[cfg(feature = "logging")]
        debug!(
            target: "ioc_runtime",
            id = id,
            class = key.name(),
            contracts = contracts.len(),
            scope = %scope,
            kind = %instance_type,
            methods = methods.len(),
            remote = remote,
            auto_start = auto_start,
            "Built component descriptor"
        );

        Ok(Self {
            id,
            key,
            contracts,
            class,
            scope,
            instance_type,
            instance_key,
            binding_name: binding.name().map(str::to_string),
            constructor,
            properties: binding.props().clone(),
            tags,
            methods,
            adapters,
            post_construct,
            pre_destroy,
            remote,
            auto_start,
            remote_address: binding.remote_address().map(str::to_string),
        })
    }

    /// Creation order key; startup ascends, shutdown descends
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Implementation type name, or the contract name for service and remote descriptors
    #[inline]
    pub fn name(&self) -> &'static str {
        self.key.name()
    }

    #[inline]
    pub fn simple_name(&self) -> &'static str {
        self.key.simple_name()
    }

    #[inline]
    pub fn contracts(&self) -> &[TypeKey] {
        &self.contracts
    }

    pub fn implementation(&self) -> Option<&TypeKey> {
        self.class.as_ref().map(|meta| meta.key())
    }

    #[inline]
    pub fn class_meta(&self) -> Option<&Arc<ClassMeta>> {
        self.class.as_ref()
    }

    #[inline]
    pub fn scope(&self) -> Scope {
        self.scope
    }

    #[inline]
    pub fn instance_type(&self) -> InstanceType {
        self.instance_type
    }

    #[inline]
    pub fn instance_key(&self) -> &InstanceKey {
        &self.instance_key
    }

    #[inline]
    pub fn binding_name(&self) -> Option<&str> {
        self.binding_name.as_deref()
    }

    #[inline]
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Class level tags after scanning
    #[inline]
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Metadata of pluggable services attached at class level
    pub fn service_tags(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.tags.iter().filter_map(|t| match t {
            Tag::Custom { name, value } => Some((*name, value.as_str())),
            _ => None,
        })
    }

    #[inline]
    pub fn methods(&self) -> &[Arc<ManagedMethod>] {
        &self.methods
    }

    /// First method descriptor named `name`
    pub fn method(&self, name: &str) -> Option<&Arc<ManagedMethod>> {
        self.methods.iter().find(|m| m.name() == name)
    }

    #[inline]
    pub fn is_remote(&self) -> bool {
        self.remote
    }

    #[inline]
    pub fn is_auto_start(&self) -> bool {
        self.auto_start
    }

    #[inline]
    pub fn has_post_construct(&self) -> bool {
        self.post_construct.is_some()
    }

    #[inline]
    pub fn has_pre_destroy(&self) -> bool {
        self.pre_destroy.is_some()
    }

    #[inline]
    pub fn remote_address(&self) -> Option<&str> {
        self.remote_address.as_deref()
    }

    pub(crate) fn post_construct(&self) -> Option<&LifecycleHook> {
        self.post_construct.as_ref()
    }

    pub(crate) fn pre_destroy(&self) -> Option<&LifecycleHook> {
        self.pre_destroy.as_ref()
    }

    pub(crate) fn host(&self) -> HostRef {
        HostRef::new(self.key.name(), self.scope)
    }

    pub(crate) fn constructor_params(&self) -> &[Param] {
        self.constructor.as_ref().map_or(&[], |c| c.params())
    }

    pub(crate) fn proxy_adapter(&self, contract: &TypeKey) -> Option<&ProxyAdapterFn> {
        self.adapters
            .iter()
            .find(|a| a.contract == *contract)
            .and_then(|a| a.proxy.as_ref())
    }

    pub(crate) fn scope_adapter(&self, contract: &TypeKey) -> Option<&ScopeAdapterFn> {
        self.adapters
            .iter()
            .find(|a| a.contract == *contract)
            .and_then(|a| a.scope.as_ref())
    }

    /// Build a bare instance from pre-processed arguments
    pub(crate) fn construct(&self, args: Vec<Value>) -> Result<(Object, Arc<ClassMeta>)> {
        let (Some(meta), Some(constructor)) = (&self.class, &self.constructor) else {
            return Err(IocError::bug(format!("{} has no implementation to construct", self.name())));
        };
        let object = constructor
            .invoke(args)
            .map_err(|e| IocError::invocation(format!("{}::new", self.simple_name()), e))?;
        Ok((object, Arc::clone(meta)))
    }

    /// Method descriptor for a call by name: an exact parameter match first, then any
    /// overload of the same arity (validated later), then for an empty argument
    /// list the first overload, whose parameters get injected
    pub(crate) fn find_method(&self, name: &str, args: &[Value]) -> Option<&Arc<ManagedMethod>> {
        let mut named = self.methods.iter().filter(|m| m.name() == name);
        if let Some(exact) = named.clone().find(|m| m.accepts(args)) {
            return Some(exact);
        }
        if let Some(same_arity) = named.clone().find(|m| m.params().len() == args.len()) {
            return Some(same_arity);
        }
        if args.is_empty() {
            return named.next();
        }
        None
    }
}

impl fmt::Debug for ManagedClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedClass")
            .field("id", &self.id)
            .field("class", &self.key)
            .field("contracts", &self.contracts)
            .field("scope", &self.scope)
            .field("kind", &self.instance_type)
            .field("methods", &self.methods.len())
            .field("post_construct", &self.post_construct.as_ref().map(LifecycleHook::label))
            .field("pre_destroy", &self.pre_destroy.as_ref().map(LifecycleHook::label))
            .finish()
    }
}

fn implementation(catalog: &TypeCatalog, key: &TypeKey) -> Result<Arc<ClassMeta>> {
    let meta = catalog
        .get(key)
        .ok_or_else(|| IocError::config(format!("implementation {key} is not described in the catalog")))?;
    match meta.shape() {
        TypeShape::Class => Ok(Arc::clone(meta)),
        TypeShape::Interface => Err(IocError::config(format!("implementation {key} is an interface"))),
        TypeShape::Abstract => Err(IocError::config(format!("implementation {key} is abstract"))),
    }
}

/// The single constructor, or the single tagged one among several
fn select_constructor(meta: &ClassMeta) -> Result<&Constructor> {
    match meta.constructors() {
        [] => Err(IocError::config(format!("{} declares no constructor", meta.name()))),
        [only] => Ok(only),
        several => {
            let mut tagged = several.iter().filter(|c| c.is_tagged());
            match (tagged.next(), tagged.next()) {
                (Some(chosen), None) => Ok(chosen),
                (None, _) => Err(IocError::bug(format!(
                    "{} declares {} constructors and none is tagged",
                    meta.name(),
                    several.len()
                ))),
                (Some(_), Some(_)) => Err(IocError::bug(format!(
                    "{} tags more than one constructor",
                    meta.name()
                ))),
            }
        }
    }
}

fn lifecycle_hook(
    key: TypeKey,
    label: &'static str,
    contract: Option<HookFn>,
    tagged: Vec<MethodMeta>,
) -> Result<Option<LifecycleHook>> {
    match (contract, tagged.as_slice()) {
        (Some(hook), []) => Ok(Some(LifecycleHook::Contract { label, hook })),
        (None, []) => Ok(None),
        (None, [method]) => {
            if !method.params().is_empty() {
                return Err(IocError::config(format!(
                    "{} hook {}::{} must take no parameters",
                    label,
                    key.simple_name(),
                    method.name()
                )));
            }
            let invoker = method.invoker().cloned().ok_or_else(|| {
                IocError::config(format!(
                    "{} hook {}::{} has no handler",
                    label,
                    key.simple_name(),
                    method.name()
                ))
            })?;
            Ok(Some(LifecycleHook::Method {
                name: method.name(),
                invoker,
            }))
        }
        (Some(_), [_, ..]) => Err(IocError::bug(format!(
            "{} declares {label} both through the lifecycle trait and a tagged method",
            key.name()
        ))),
        (None, [..]) => Err(IocError::bug(format!(
            "{} tags {} methods as {label}",
            key.name(),
            tagged.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::RegistryBuilder;
    use crate::instance::ManagedProxy;
    use crate::meta::ClassMetaBuilder;
    use crate::provider::PostConstruct;
    use crate::services::transaction::{Transaction, TransactionManager};
    use crate::{BoxError, Registry, value};

    trait Shop: Send + Sync {}
    trait Audit: Send + Sync {}

    #[derive(Default)]
    struct Store;
    impl Shop for Store {}

    #[derive(Default)]
    struct Ledger;
    impl Audit for Ledger {}

    struct ShopProxy(#[allow(dead_code)] Arc<ManagedProxy>);
    impl Shop for ShopProxy {}

    impl PostConstruct for Store {
        fn post_construct(&self) -> std::result::Result<(), BoxError> {
            Ok(())
        }
    }

    struct NoopTx;
    impl Transaction for NoopTx {
        fn commit(&mut self) -> std::result::Result<(), BoxError> {
            Ok(())
        }
        fn rollback(&mut self) -> std::result::Result<(), BoxError> {
            Ok(())
        }
        fn close(&mut self) {}
    }

    struct NoopManager;
    impl TransactionManager for NoopManager {
        fn begin(&self, _read_only: bool) -> std::result::Result<Box<dyn Transaction>, BoxError> {
            Ok(Box::new(NoopTx))
        }
    }

    fn store_meta() -> ClassMetaBuilder<Store> {
        ClassMeta::class::<Store>()
            .implements(|s| s as Arc<dyn Shop>)
            .constructor(Constructor::default_of::<Store>())
    }

    fn shop_interface() -> ClassMeta {
        ClassMeta::interface::<dyn Shop>()
            .proxy_adapter(|p| Arc::new(ShopProxy(p)) as Arc<dyn Shop>)
            .build()
    }

    fn configure(store: ClassMetaBuilder<Store>, binding: Binding) -> Result<Registry> {
        let catalog = TypeCatalog::new()
            .with(shop_interface())
            .and_then(|c| c.with(store.build()))
            .and_then(|c| c.with(ClassMeta::class::<Ledger>().implements(|l| l as Arc<dyn Audit>).build()))?;
        let registry = RegistryBuilder::new().catalog(catalog).build();
        registry.config(vec![binding])?;
        Ok(registry)
    }

    fn shop() -> Binding {
        Binding::new::<dyn Shop>().to::<Store>()
    }

    fn descriptor(registry: &Registry) -> Arc<ManagedClass> {
        registry.get_descriptor(&TypeKey::of::<dyn Shop>()).unwrap()
    }

    #[test]
    fn test_constructor_selection() {
        let err = configure(
            store_meta().constructor(Constructor::default_of::<Store>()),
            shop(),
        )
        .unwrap_err();
        assert!(matches!(err, IocError::Bug(_)));

        let registry = configure(
            store_meta().constructor(Constructor::default_of::<Store>().tagged()),
            shop(),
        )
        .unwrap();
        assert!(registry.get_instance::<dyn Shop>().is_ok());

        let err = configure(
            store_meta()
                .constructor(Constructor::default_of::<Store>().tagged())
                .constructor(Constructor::default_of::<Store>().tagged()),
            shop(),
        )
        .unwrap_err();
        assert!(matches!(err, IocError::Bug(_)));

        let err = configure(
            ClassMeta::class::<Store>().implements(|s| s as Arc<dyn Shop>),
            shop(),
        )
        .unwrap_err();
        assert!(matches!(err, IocError::Config(_)));
    }

    #[test]
    fn test_implementation_shape_and_contracts() {
        let err = configure(store_meta(), Binding::new::<dyn Shop>().to::<Ledger>()).unwrap_err();
        assert!(matches!(err, IocError::Config(_)));

        let err = configure(store_meta(), Binding::new::<dyn Audit>().to::<Store>()).unwrap_err();
        assert!(matches!(err, IocError::Config(_)));

        let err = configure(
            store_meta(),
            Binding::new::<dyn Shop>().to_key(TypeKey::of::<dyn Shop>()),
        )
        .unwrap_err();
        assert!(matches!(err, IocError::Config(_)));

        let registry = configure(store_meta(), Binding::implementation::<Store>()).unwrap();
        let class = registry.get_descriptor(&TypeKey::of::<Store>()).unwrap();
        assert_eq!(class.contracts(), &[TypeKey::of::<Store>()]);
        assert_eq!(class.instance_type(), InstanceType::Local);
        assert_eq!(class.scope(), Scope::Application);
    }

    #[test]
    fn test_kind_requirements() {
        let err = configure(store_meta(), shop().instance_type(InstanceType::Service)).unwrap_err();
        assert!(matches!(err, IocError::Config(_)));

        let err = configure(store_meta(), Binding::new::<dyn Shop>().instance_type(InstanceType::Remote))
            .unwrap_err();
        assert!(matches!(err, IocError::Config(_)));

        let err = configure(
            store_meta(),
            Binding::implementation::<Store>().instance_type(InstanceType::Proxied),
        )
        .unwrap_err();
        assert!(matches!(err, IocError::Config(_)));

        let registry = configure(store_meta(), shop().instance_type(InstanceType::Proxied)).unwrap();
        assert!(matches!(
            registry.get_instance_by_key(&TypeKey::of::<dyn Shop>(), None, Vec::new()),
            Ok(crate::Instance::Proxy(_))
        ));
    }

    #[test]
    fn test_unregistered_strategy_is_config_error() {
        let catalog = TypeCatalog::new().with(store_meta().build()).unwrap();
        let registry = RegistryBuilder::empty()
            .catalog(catalog)
            .instance_factory(crate::factory::LocalInstanceFactory)
            .unwrap()
            .build();

        let err = registry
            .config(vec![Binding::implementation::<Store>().scope(Scope::Thread)])
            .unwrap_err();
        assert!(matches!(err, IocError::Config(_)));
    }

    #[test]
    fn test_method_descriptors_only_when_warranted() {
        let registry = configure(
            store_meta()
                .method(MethodMeta::new("browse"))
                .method(MethodMeta::new("restock").private())
                .method(MethodMeta::new("nightly").private().tag(Tag::Scheduled("0 0 * * *".into())))
                .method(MethodMeta::new("order").tag(Tag::Remote)),
            shop(),
        )
        .unwrap();
        let class = descriptor(&registry);
        let names: Vec<_> = class.methods().iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["order"]);
        assert!(!class.is_remote());

        let registry = configure(
            store_meta()
                .method(MethodMeta::new("browse"))
                .method(MethodMeta::new("restock").private())
                .method(MethodMeta::new("nightly").private().tag(Tag::Scheduled("0 0 * * *".into()))),
            shop().instance_type(InstanceType::Proxied),
        )
        .unwrap();
        let names: Vec<_> = descriptor(&registry).methods().iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["browse", "nightly"]);
    }

    #[test]
    fn test_duplicate_remote_names_rejected() {
        let err = configure(
            store_meta()
                .tag(Tag::Remote)
                .method(MethodMeta::new("order"))
                .method(MethodMeta::new("order").param(Param::value::<u32>())),
            shop(),
        )
        .unwrap_err();
        assert!(matches!(err, IocError::Bug(_)));
    }

    #[test]
    fn test_asynchronous_must_be_void() {
        let err = configure(
            store_meta().method(
                MethodMeta::new("report")
                    .returns::<String>()
                    .tag(Tag::Asynchronous)
                    .handler(|_: &Store, _| Ok(Some(value(String::new())))),
            ),
            shop(),
        )
        .unwrap_err();
        assert!(matches!(err, IocError::Bug(_)));
    }

    #[test]
    fn test_transactional_needs_manager() {
        let meta = || store_meta().method(MethodMeta::new("checkout").tag(Tag::Transactional));
        let err = configure(meta(), shop()).unwrap_err();
        assert!(matches!(err, IocError::Config(_)));

        let catalog = TypeCatalog::new().with(meta().build()).unwrap();
        let registry = RegistryBuilder::new()
            .catalog(catalog)
            .transaction_manager(Arc::new(NoopManager))
            .unwrap()
            .build();
        registry.config(vec![shop()]).unwrap();
        let class = descriptor(&registry);
        assert_eq!(class.method("checkout").unwrap().processors(), vec!["transaction"]);
    }

    #[test]
    fn test_lifecycle_conflicts() {
        let hook = || {
            MethodMeta::new("init")
                .tag(Tag::PostConstruct)
                .handler(|_: &Store, _| Ok(None))
        };

        let err = configure(store_meta().post_construct().method(hook()), shop()).unwrap_err();
        assert!(matches!(err, IocError::Bug(_)));

        let err = configure(store_meta().method(hook()).method(hook()), shop()).unwrap_err();
        assert!(matches!(err, IocError::Bug(_)));

        let registry = configure(store_meta().method(hook()), shop()).unwrap();
        let class = descriptor(&registry);
        assert!(class.has_post_construct());
        assert!(!class.has_pre_destroy());
        assert!(class.methods().is_empty());
    }

    #[test]
    fn test_class_flags_and_service_tags() {
        let registry = configure(
            store_meta()
                .tag(Tag::AutoStart)
                .tag(Tag::Custom {
                    name: "cache",
                    value: "60s".into(),
                }),
            shop().named("main-shop"),
        )
        .unwrap();
        let class = descriptor(&registry);
        assert!(class.is_auto_start());
        assert_eq!(class.service_tags().collect::<Vec<_>>(), vec![("cache", "60s")]);
        assert_eq!(class.instance_key(), &InstanceKey::named("main-shop"));
        assert_eq!(class.binding_name(), Some("main-shop"));
    }
}
