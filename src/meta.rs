//! Declarative type metadata
//!
//! Rust has no runtime reflection, so every managed implementation type, and every
//! contract that carries tags or adapters, is described once by a [`ClassMeta`]:
//! its shape, the contracts it can be cast to, its constructors, methods, injectable
//! fields and attached [`Tag`]s. The descriptor builder reads these records instead
//! of scanning bytecode.
//!
//! ```rust
//! use ioc_runtime::meta::{ClassMeta, Constructor, MethodMeta, Param, Tag};
//! use ioc_runtime::value;
//! use std::sync::Arc;
//!
//! trait Engine: Send + Sync {
//!     fn power(&self) -> u32;
//! }
//!
//! struct Diesel;
//!
//! impl Engine for Diesel {
//!     fn power(&self) -> u32 { 90 }
//! }
//!
//! let meta = ClassMeta::class::<Diesel>()
//!     .implements(|d| d as Arc<dyn Engine>)
//!     .constructor(Constructor::new(vec![], |_| Ok(Diesel)))
//!     .method(
//!         MethodMeta::new("power")
//!             .returns::<u32>()
//!             .handler(|this: &Diesel, _| Ok(Some(value(this.power())))),
//!     )
//!     .tag(Tag::AutoStart)
//!     .build();
//!
//! assert!(meta.is_kind_of(&ioc_runtime::TypeKey::of::<dyn Engine>()));
//! ```

use crate::binding::Properties;
use crate::instance::{ManagedProxy, ScopeLink, ScopedHandle};
use crate::provider::{Configurable, Late, PostConstruct, PreDestroy};
use crate::{Args, BoxError, Component, Object, TypeKey, Value};
use ahash::RandomState;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

pub(crate) type BuildFn =
    Arc<dyn Fn(&mut Args) -> std::result::Result<Object, BoxError> + Send + Sync>;
pub(crate) type InvokeFn =
    Arc<dyn Fn(&Object, Args) -> std::result::Result<Option<Value>, BoxError> + Send + Sync>;
pub(crate) type HookFn = Arc<dyn Fn(&Object) -> std::result::Result<(), BoxError> + Send + Sync>;
pub(crate) type ConfigureFn =
    Arc<dyn Fn(&Object, &Properties) -> std::result::Result<(), BoxError> + Send + Sync>;
pub(crate) type CastFn = Arc<dyn Fn(&Object) -> Option<Value> + Send + Sync>;
pub(crate) type ProxyAdapterFn = Arc<dyn Fn(Arc<ManagedProxy>) -> Value + Send + Sync>;
pub(crate) type ScopeAdapterFn = Arc<dyn Fn(ScopeLink) -> Value + Send + Sync>;
type InjectSetter = Arc<dyn Fn(&Object, Value) -> std::result::Result<(), BoxError> + Send + Sync>;
type ConfigSetter = Arc<dyn Fn(&Object, &str) -> std::result::Result<(), BoxError> + Send + Sync>;

// =============================================================================
// Tags
// =============================================================================

/// Declarative tag attached to a type or a method
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tag {
    /// Accessible to remote callers
    Remote,
    /// Remote access without authorization checks
    Unchecked,
    /// Runs inside a transaction
    Transactional,
    /// Read-only transaction
    Immutable,
    /// Read-write transaction, overrides a type level `Immutable`
    Mutable,
    /// Dispatched on a worker, caller does not wait
    Asynchronous,
    /// Instantiated by `Registry::start`
    AutoStart,
    /// Method is the post-construct hook
    PostConstruct,
    /// Method is the pre-destroy hook
    PreDestroy,
    /// Roles allowed to invoke
    RolesAllowed(Vec<String>),
    /// Interceptor component wrapped around the call
    Intercepted(TypeKey),
    /// Invocations are metered
    Meter,
    /// Triggered by an external scheduler; may be non-public
    Scheduled(String),
    /// Metadata for a pluggable cross-cutting service
    Custom { name: &'static str, value: String },
}

impl Tag {
    /// Tag kind used for precedence during scanning; custom tags are keyed by name
    pub fn kind(&self) -> &'static str {
        match self {
            Tag::Remote => "remote",
            Tag::Unchecked => "unchecked",
            Tag::Transactional => "transactional",
            Tag::Immutable => "immutable",
            Tag::Mutable => "mutable",
            Tag::Asynchronous => "asynchronous",
            Tag::AutoStart => "auto-start",
            Tag::PostConstruct => "post-construct",
            Tag::PreDestroy => "pre-destroy",
            Tag::RolesAllowed(_) => "roles-allowed",
            Tag::Intercepted(_) => "intercepted",
            Tag::Meter => "meter",
            Tag::Scheduled(_) => "scheduled",
            Tag::Custom { name, .. } => *name,
        }
    }

    pub fn roles(roles: &[&str]) -> Self {
        Tag::RolesAllowed(roles.iter().map(|r| r.to_string()).collect())
    }

    pub fn intercepted<I: ?Sized + 'static>() -> Self {
        Tag::Intercepted(TypeKey::of::<I>())
    }
}

/// Find a tag of the same kind in a list
pub(crate) fn has_kind(tags: &[Tag], kind: &str) -> bool {
    tags.iter().any(|t| t.kind() == kind)
}

/// Shape of a described type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeShape {
    Class,
    Abstract,
    Interface,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

// =============================================================================
// Parameters
// =============================================================================

#[derive(Clone, Copy)]
struct OptionalCodec {
    some: fn(Value) -> Value,
    none: fn() -> Value,
}

fn wrap_some<C: ?Sized + Send + Sync + 'static>(value: Value) -> Value {
    match value.downcast::<Arc<C>>() {
        Ok(arc) => Box::new(Some(*arc)),
        Err(other) => other,
    }
}

fn wrap_none<C: ?Sized + Send + Sync + 'static>() -> Value {
    Box::new(Option::<Arc<C>>::None)
}

/// One constructor, method or field parameter.
///
/// Records the type of the value the slot carries and, for component parameters,
/// the contract the resolver injects when the caller leaves the slot empty.
#[derive(Clone)]
pub struct Param {
    value_type: TypeKey,
    contract: Option<TypeKey>,
    optional: Option<OptionalCodec>,
}

impl Param {
    /// Plain value of type `T`, never injected
    pub fn value<T: Any + Send>() -> Self {
        Self {
            value_type: TypeKey::of::<T>(),
            contract: None,
            optional: None,
        }
    }

    /// Component dependency carried as `Arc<C>`
    pub fn component<C: ?Sized + Send + Sync + 'static>() -> Self {
        Self {
            value_type: TypeKey::of::<Arc<C>>(),
            contract: Some(TypeKey::of::<C>()),
            optional: None,
        }
    }

    /// Component dependency carried as `Option<Arc<C>>`; a missing provider is a soft null
    pub fn optional<C: ?Sized + Send + Sync + 'static>() -> Self {
        Self {
            value_type: TypeKey::of::<Option<Arc<C>>>(),
            contract: Some(TypeKey::of::<C>()),
            optional: Some(OptionalCodec {
                some: wrap_some::<C>,
                none: wrap_none::<C>,
            }),
        }
    }

    #[inline]
    pub fn value_type(&self) -> &TypeKey {
        &self.value_type
    }

    #[inline]
    pub fn contract(&self) -> Option<&TypeKey> {
        self.contract.as_ref()
    }

    #[inline]
    pub fn is_optional(&self) -> bool {
        self.optional.is_some()
    }

    /// Whether `value` has the type this slot carries
    #[inline]
    pub fn accepts(&self, value: &Value) -> bool {
        (**value).type_id() == self.value_type.id()
    }

    pub(crate) fn wrap_resolved(&self, value: Option<Value>) -> Option<Value> {
        match (self.optional, value) {
            (Some(codec), Some(v)) => Some((codec.some)(v)),
            (Some(codec), None) => Some((codec.none)()),
            (None, v) => v,
        }
    }
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Param")
            .field("value_type", &self.value_type)
            .field("contract", &self.contract)
            .field("optional", &self.is_optional())
            .finish()
    }
}

// =============================================================================
// Constructors, methods, fields
// =============================================================================

/// A constructor: parameter list plus the erased build closure.
#[derive(Clone)]
pub struct Constructor {
    params: Vec<Param>,
    tagged: bool,
    build: BuildFn,
}

impl Constructor {
    pub fn new<T, F>(params: Vec<Param>, build: F) -> Self
    where
        T: Component,
        F: Fn(&mut Args) -> std::result::Result<T, BoxError> + Send + Sync + 'static,
    {
        Self {
            params,
            tagged: false,
            build: Arc::new(move |args| build(args).map(|t| Arc::new(t) as Object)),
        }
    }

    /// No-argument constructor backed by `Default`
    pub fn default_of<T: Component + Default>() -> Self {
        Self::new(Vec::new(), |_| Ok(T::default()))
    }

    /// Mark as the constructor to use when a type declares several
    pub fn tagged(mut self) -> Self {
        self.tagged = true;
        self
    }

    #[inline]
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    #[inline]
    pub fn is_tagged(&self) -> bool {
        self.tagged
    }

    pub(crate) fn invoke(&self, args: Vec<Value>) -> std::result::Result<Object, BoxError> {
        let mut args = Args::new(args);
        (self.build)(&mut args)
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor")
            .field("params", &self.params)
            .field("tagged", &self.tagged)
            .finish()
    }
}

/// A method: signature, tags and, on classes, the erased handler.
///
/// Methods declared on interfaces carry no handler; they exist so tags can be
/// attached to the contract.
#[derive(Clone)]
pub struct MethodMeta {
    name: &'static str,
    visibility: Visibility,
    params: Vec<Param>,
    returns: Option<TypeKey>,
    tags: Vec<Tag>,
    invoker: Option<InvokeFn>,
}

impl MethodMeta {
    /// Public, void, parameterless method
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            visibility: Visibility::Public,
            params: Vec::new(),
            returns: None,
            tags: Vec::new(),
            invoker: None,
        }
    }

    pub fn private(mut self) -> Self {
        self.visibility = Visibility::Private;
        self
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn returns<R: Any + Send>(mut self) -> Self {
        self.returns = Some(TypeKey::of::<R>());
        self
    }

    pub fn tag(mut self, tag: Tag) -> Self {
        self.tags.push(tag);
        self
    }

    /// Attach the implementation, called with the bare instance of `T`
    pub fn handler<T, F>(mut self, handler: F) -> Self
    where
        T: Component,
        F: Fn(&T, &mut Args) -> std::result::Result<Option<Value>, BoxError> + Send + Sync + 'static,
    {
        let name = self.name;
        self.invoker = Some(Arc::new(move |object, mut args| {
            let this = object.downcast_ref::<T>().ok_or_else(|| {
                BoxError::from(format!(
                    "{} invoked on an instance that is not a {}",
                    name,
                    std::any::type_name::<T>()
                ))
            })?;
            handler(this, &mut args)
        }));
        self
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    #[inline]
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    #[inline]
    pub fn return_type(&self) -> Option<&TypeKey> {
        self.returns.as_ref()
    }

    #[inline]
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// `name(Type, Type)` using simple parameter type names
    pub fn signature(&self) -> String {
        let params: Vec<&str> = self.params.iter().map(|p| p.value_type.simple_name()).collect();
        format!("{}({})", self.name, params.join(", "))
    }

    pub(crate) fn invoker(&self) -> Option<&InvokeFn> {
        self.invoker.as_ref()
    }

    /// Same name and arity; used to match implementation methods with contract methods
    pub(crate) fn overrides(&self, other: &MethodMeta) -> bool {
        self.name == other.name && self.params.len() == other.params.len()
    }
}

impl fmt::Debug for MethodMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodMeta")
            .field("signature", &self.signature())
            .field("visibility", &self.visibility)
            .field("tags", &self.tags)
            .finish()
    }
}

/// A field receiving a component dependency after construction
#[derive(Clone)]
pub struct InjectField {
    name: &'static str,
    param: Param,
    setter: InjectSetter,
}

impl InjectField {
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn param(&self) -> &Param {
        &self.param
    }

    pub(crate) fn set(&self, object: &Object, value: Value) -> std::result::Result<(), BoxError> {
        (self.setter)(object, value)
    }
}

/// A field initialized from a binding property
#[derive(Clone)]
pub struct ConfigField {
    name: &'static str,
    property: &'static str,
    setter: ConfigSetter,
}

impl ConfigField {
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn property(&self) -> &'static str {
        self.property
    }

    pub(crate) fn set(&self, object: &Object, raw: &str) -> std::result::Result<(), BoxError> {
        (self.setter)(object, raw)
    }
}

// =============================================================================
// ClassMeta
// =============================================================================

/// Metadata record for one type.
pub struct ClassMeta {
    key: TypeKey,
    shape: TypeShape,
    superclass: Option<TypeKey>,
    interfaces: Vec<TypeKey>,
    casts: HashMap<TypeId, CastFn, RandomState>,
    constructors: Vec<Constructor>,
    methods: Vec<MethodMeta>,
    inject_fields: Vec<InjectField>,
    config_fields: Vec<ConfigField>,
    tags: Vec<Tag>,
    post_construct: Option<HookFn>,
    pre_destroy: Option<HookFn>,
    configure: Option<ConfigureFn>,
    proxy_adapter: Option<ProxyAdapterFn>,
    scope_adapter: Option<ScopeAdapterFn>,
}

impl ClassMeta {
    /// Describe a concrete class
    pub fn class<T: Component>() -> ClassMetaBuilder<T> {
        let mut builder = ClassMetaBuilder::with_shape(TypeShape::Class);
        let self_cast: CastFn = Arc::new(|object: &Object| {
            Arc::clone(object)
                .downcast::<T>()
                .ok()
                .map(|t| Box::new(t) as Value)
        });
        builder.meta.casts.insert(TypeId::of::<T>(), self_cast);
        builder
    }

    /// Describe an abstract class; it can carry tags but never be instantiated
    pub fn abstract_class<T: Component>() -> ClassMetaBuilder<T> {
        ClassMetaBuilder::with_shape(TypeShape::Abstract)
    }

    /// Describe a contract interface, normally a `dyn Trait`
    pub fn interface<C: ?Sized + Send + Sync + 'static>() -> ClassMetaBuilder<C> {
        ClassMetaBuilder::with_shape(TypeShape::Interface)
    }

    #[inline]
    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.key.name()
    }

    #[inline]
    pub fn shape(&self) -> TypeShape {
        self.shape
    }

    #[inline]
    pub fn superclass(&self) -> Option<&TypeKey> {
        self.superclass.as_ref()
    }

    /// Contracts declared through `implements`, in declaration order
    #[inline]
    pub fn interfaces(&self) -> &[TypeKey] {
        &self.interfaces
    }

    #[inline]
    pub fn constructors(&self) -> &[Constructor] {
        &self.constructors
    }

    #[inline]
    pub fn methods(&self) -> &[MethodMeta] {
        &self.methods
    }

    #[inline]
    pub fn inject_fields(&self) -> &[InjectField] {
        &self.inject_fields
    }

    #[inline]
    pub fn config_fields(&self) -> &[ConfigField] {
        &self.config_fields
    }

    #[inline]
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Whether instances of this type can be handed out as `contract`
    pub fn is_kind_of(&self, contract: &TypeKey) -> bool {
        self.key == *contract || self.casts.contains_key(&contract.id())
    }

    /// Cast a bare instance of this type to `contract`, yielding `Arc<contract>`
    pub(crate) fn cast(&self, object: &Object, contract: &TypeKey) -> Option<Value> {
        self.casts.get(&contract.id()).and_then(|cast| cast(object))
    }

    /// No-argument constructor if the type is a concrete class that has one
    pub(crate) fn default_constructor(&self) -> Option<&Constructor> {
        if self.shape != TypeShape::Class {
            return None;
        }
        self.constructors.iter().find(|c| c.params().is_empty())
    }

    pub(crate) fn post_construct_hook(&self) -> Option<&HookFn> {
        self.post_construct.as_ref()
    }

    pub(crate) fn pre_destroy_hook(&self) -> Option<&HookFn> {
        self.pre_destroy.as_ref()
    }

    pub(crate) fn configure_hook(&self) -> Option<&ConfigureFn> {
        self.configure.as_ref()
    }

    pub(crate) fn proxy_adapter(&self) -> Option<&ProxyAdapterFn> {
        self.proxy_adapter.as_ref()
    }

    pub(crate) fn scope_adapter(&self) -> Option<&ScopeAdapterFn> {
        self.scope_adapter.as_ref()
    }
}

impl fmt::Debug for ClassMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassMeta")
            .field("key", &self.key)
            .field("shape", &self.shape)
            .field("interfaces", &self.interfaces)
            .field("constructors", &self.constructors.len())
            .field("methods", &self.methods.len())
            .field("tags", &self.tags)
            .finish()
    }
}

/// Builder for [`ClassMeta`], typed by the described type so adapters and hooks
/// are checked at compile time.
pub struct ClassMetaBuilder<T: ?Sized> {
    meta: ClassMeta,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized + 'static> ClassMetaBuilder<T> {
    fn with_shape(shape: TypeShape) -> Self {
        Self {
            meta: ClassMeta {
                key: TypeKey::of::<T>(),
                shape,
                superclass: None,
                interfaces: Vec::new(),
                casts: HashMap::with_hasher(RandomState::new()),
                constructors: Vec::new(),
                methods: Vec::new(),
                inject_fields: Vec::new(),
                config_fields: Vec::new(),
                tags: Vec::new(),
                post_construct: None,
                pre_destroy: None,
                configure: None,
                proxy_adapter: None,
                scope_adapter: None,
            },
            _marker: PhantomData,
        }
    }

    pub fn tag(mut self, tag: Tag) -> Self {
        self.meta.tags.push(tag);
        self
    }

    pub fn method(mut self, method: MethodMeta) -> Self {
        self.meta.methods.push(method);
        self
    }

    /// Parent type whose class level tags are inherited
    pub fn extends<S: ?Sized + 'static>(mut self) -> Self {
        self.meta.superclass = Some(TypeKey::of::<S>());
        self
    }

    pub fn build(self) -> ClassMeta {
        self.meta
    }
}

impl<T: Component> ClassMetaBuilder<T> {
    /// Declare that `T` satisfies contract `C`; `cast` performs the unsizing coercion
    pub fn implements<C>(
        mut self,
        cast: impl Fn(Arc<T>) -> Arc<C> + Send + Sync + 'static,
    ) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
    {
        let contract = TypeKey::of::<C>();
        let cast_fn: CastFn = Arc::new(move |object: &Object| {
            Arc::clone(object)
                .downcast::<T>()
                .ok()
                .map(|t| Box::new(cast(t)) as Value)
        });
        self.meta.casts.insert(contract.id(), cast_fn);
        if !self.meta.interfaces.contains(&contract) {
            self.meta.interfaces.push(contract);
        }
        self
    }

    pub fn constructor(mut self, constructor: Constructor) -> Self {
        self.meta.constructors.push(constructor);
        self
    }

    /// Field receiving component `C` once the instance is cached
    pub fn inject_field<C>(
        mut self,
        name: &'static str,
        set: impl Fn(&T, Arc<C>) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    ) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
    {
        let setter: InjectSetter = Arc::new(move |object, value| {
            let this = downcast_this::<T>(object)?;
            let dependency = value
                .downcast::<Arc<C>>()
                .map_err(|_| format!("{name} expects {}", std::any::type_name::<C>()))?;
            set(this, *dependency)
        });
        self.meta.inject_fields.push(InjectField {
            name,
            param: Param::component::<C>(),
            setter,
        });
        self
    }

    /// Field injection into a [`Late`] field of `T`
    pub fn inject_late<C>(self, name: &'static str, field: fn(&T) -> &Late<C>) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
    {
        self.inject_field::<C>(name, move |this, dependency| field(this).set(dependency))
    }

    /// Field initialized from the binding property `property`
    pub fn config_field<F>(mut self, name: &'static str, property: &'static str, set: F) -> Self
    where
        F: Fn(&T, &str) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        let setter: ConfigSetter = Arc::new(move |object, raw| set(downcast_this::<T>(object)?, raw));
        self.meta.config_fields.push(ConfigField {
            name,
            property,
            setter,
        });
        self
    }

    /// Use the [`PostConstruct`] lifecycle contract
    pub fn post_construct(mut self) -> Self
    where
        T: PostConstruct,
    {
        self.meta.post_construct = Some(Arc::new(|object| downcast_this::<T>(object)?.post_construct()));
        self
    }

    /// Use the [`PreDestroy`] lifecycle contract
    pub fn pre_destroy(mut self) -> Self
    where
        T: PreDestroy,
    {
        self.meta.pre_destroy = Some(Arc::new(|object| downcast_this::<T>(object)?.pre_destroy()));
        self
    }

    /// Use the [`Configurable`] callback
    pub fn configurable(mut self) -> Self
    where
        T: Configurable,
    {
        self.meta.configure = Some(Arc::new(|object, properties| {
            downcast_this::<T>(object)?.configure(properties)
        }));
        self
    }
}

impl<C: ?Sized + Send + Sync + 'static> ClassMetaBuilder<C> {
    /// Delegating object routing calls on contract `C` through a [`ManagedProxy`]
    pub fn proxy_adapter<F>(mut self, adapt: F) -> Self
    where
        F: Fn(Arc<ManagedProxy>) -> Arc<C> + Send + Sync + 'static,
    {
        self.meta.proxy_adapter = Some(Arc::new(move |proxy| Box::new(adapt(proxy)) as Value));
        self
    }

    /// Delegating object that re-resolves `C` on every call
    pub fn scope_adapter<F>(mut self, adapt: F) -> Self
    where
        F: Fn(ScopedHandle<C>) -> Arc<C> + Send + Sync + 'static,
    {
        self.meta.scope_adapter = Some(Arc::new(move |link| {
            Box::new(adapt(ScopedHandle::new(link))) as Value
        }));
        self
    }
}

fn downcast_this<T: Component>(object: &Object) -> std::result::Result<&T, BoxError> {
    object
        .downcast_ref::<T>()
        .ok_or_else(|| BoxError::from(format!("instance is not a {}", std::any::type_name::<T>())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value;
    use once_cell::sync::OnceCell;

    trait Engine: Send + Sync {
        fn power(&self) -> u32;
    }

    #[derive(Default)]
    struct Diesel;

    impl Engine for Diesel {
        fn power(&self) -> u32 {
            90
        }
    }

    #[derive(Default)]
    struct Truck {
        engine: OnceCell<Arc<dyn Engine>>,
    }

    #[test]
    fn test_cast_to_declared_contract() {
        let meta = ClassMeta::class::<Diesel>()
            .implements(|d| d as Arc<dyn Engine>)
            .constructor(Constructor::default_of::<Diesel>())
            .build();

        let object = meta.default_constructor().unwrap().invoke(Vec::new()).unwrap();
        let value = meta.cast(&object, &TypeKey::of::<dyn Engine>()).unwrap();
        let engine = value.downcast::<Arc<dyn Engine>>().unwrap();
        assert_eq!(engine.power(), 90);

        assert!(meta.is_kind_of(&TypeKey::of::<Diesel>()));
        assert!(!meta.is_kind_of(&TypeKey::of::<Truck>()));
        assert_eq!(meta.interfaces(), &[TypeKey::of::<dyn Engine>()]);
    }

    #[test]
    fn test_inject_field_setter() {
        let meta = ClassMeta::class::<Truck>()
            .inject_field::<dyn Engine>("engine", |this, engine| {
                this.engine.set(engine).map_err(|_| "engine already set".into())
            })
            .build();

        let object: Object = Arc::new(Truck::default());
        let engine: Arc<dyn Engine> = Arc::new(Diesel);
        meta.inject_fields()[0].set(&object, value(engine)).unwrap();

        let truck = object.downcast_ref::<Truck>().unwrap();
        assert_eq!(truck.engine.get().unwrap().power(), 90);
    }

    #[test]
    fn test_method_handler_and_signature() {
        let method = MethodMeta::new("boost")
            .param(Param::value::<u32>())
            .returns::<u32>()
            .handler(|this: &Diesel, args| Ok(Some(value(this.power() + args.take::<u32>(0)?))));

        assert_eq!(method.signature(), "boost(u32)");
        let object: Object = Arc::new(Diesel);
        let result = (method.invoker().unwrap())(&object, Args::new(vec![value(10u32)])).unwrap();
        assert_eq!(*result.unwrap().downcast::<u32>().unwrap(), 100);
    }

    #[test]
    fn test_optional_param_wrapping() {
        let param = Param::optional::<dyn Engine>();
        let none = param.wrap_resolved(None).unwrap();
        assert!(param.accepts(&none));
        assert!(none.downcast::<Option<Arc<dyn Engine>>>().unwrap().is_none());

        let engine: Arc<dyn Engine> = Arc::new(Diesel);
        let some = param.wrap_resolved(Some(value(engine))).unwrap();
        assert!(param.accepts(&some));
    }

    #[test]
    fn test_abstract_has_no_default_constructor() {
        let meta = ClassMeta::abstract_class::<Diesel>().build();
        assert!(meta.default_constructor().is_none());
        assert_eq!(meta.shape(), TypeShape::Abstract);
    }
}
