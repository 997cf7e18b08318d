//! Binding records
//!
//! A binding maps one or more contracts to an implementation together with the
//! scope and instantiation strategy. Bindings arrive already parsed, in declaration
//! order; the order decides creation order, destruction order and overrides.

use crate::catalog::TypeCatalog;
use crate::{IocError, Result, TypeKey};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Lifetime and visibility of a cached instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    /// One instance per registry, shared by all threads
    #[default]
    Application,
    /// One instance per worker thread
    Thread,
    /// One instance per session
    Session,
    /// Never cached, fresh instance on every retrieval
    Local,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Application => "application",
            Scope::Thread => "thread",
            Scope::Session => "session",
            Scope::Local => "local",
        }
    }

    /// Whether a host in this scope holding a `dependency` directly would pin
    /// an instance that belongs to a narrower context
    pub fn needs_adapter_for(&self, dependency: Scope) -> bool {
        matches!(dependency, Scope::Thread | Scope::Session)
            && *self != dependency
            && *self != Scope::Local
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = IocError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "application" => Ok(Scope::Application),
            "thread" => Ok(Scope::Thread),
            "session" => Ok(Scope::Session),
            "local" => Ok(Scope::Local),
            other => Err(IocError::config(format!("unknown scope {other:?}"))),
        }
    }
}

/// Strategy producing bare instances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceType {
    /// Plain construction, instance handed out as is
    Local,
    /// Construction plus an intercepting wrapper
    Proxied,
    /// Looked up among registered service providers
    Service,
    /// Stub for a component living behind a remote address
    Remote,
}

impl InstanceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceType::Local => "local",
            InstanceType::Proxied => "proxied",
            InstanceType::Service => "service",
            InstanceType::Remote => "remote",
        }
    }

    /// Whether instances are built from an implementation type
    #[inline]
    pub fn requires_implementation(&self) -> bool {
        matches!(self, InstanceType::Local | InstanceType::Proxied)
    }
}

impl fmt::Display for InstanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstanceType {
    type Err = IocError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "local" | "pojo" => Ok(InstanceType::Local),
            "proxied" | "proxy" => Ok(InstanceType::Proxied),
            "service" => Ok(InstanceType::Service),
            "remote" => Ok(InstanceType::Remote),
            other => Err(IocError::config(format!("unknown instance type {other:?}"))),
        }
    }
}

/// Ordered string properties attached to a binding
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Properties(BTreeMap<String, String>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Parse a property, `None` when absent
    pub fn parse<T: FromStr>(&self, key: &str) -> Result<Option<T>>
    where
        T::Err: fmt::Display,
    {
        match self.get(key) {
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|e| IocError::config(format!("property {key}={raw:?}: {e}"))),
            None => Ok(None),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Declared mapping from contracts to an implementation.
///
/// # Examples
///
/// ```rust
/// use ioc_runtime::{Binding, InstanceType, Scope};
///
/// trait Car: Send + Sync {}
/// struct Sedan;
///
/// let binding = Binding::new::<dyn Car>()
///     .to::<Sedan>()
///     .scope(Scope::Thread)
///     .instance_type(InstanceType::Proxied)
///     .property("speed", "120");
///
/// assert_eq!(binding.contracts().len(), 1);
/// assert_eq!(binding.scope_or_default(), Scope::Thread);
/// ```
#[derive(Debug, Clone)]
pub struct Binding {
    contracts: Vec<TypeKey>,
    implementation: Option<TypeKey>,
    scope: Option<Scope>,
    instance_type: Option<InstanceType>,
    name: Option<String>,
    remote_address: Option<String>,
    properties: Properties,
}

impl Binding {
    /// Binding for contract `C`
    pub fn new<C: ?Sized + 'static>() -> Self {
        Self::for_contracts(vec![TypeKey::of::<C>()])
    }

    /// Binding for implementation `T` exposed under its own type
    pub fn implementation<T: 'static>() -> Self {
        Self::for_contracts(Vec::new()).to::<T>()
    }

    pub fn for_contracts(contracts: Vec<TypeKey>) -> Self {
        Self {
            contracts,
            implementation: None,
            scope: None,
            instance_type: None,
            name: None,
            remote_address: None,
            properties: Properties::default(),
        }
    }

    /// Add another contract
    pub fn and<C: ?Sized + 'static>(mut self) -> Self {
        self.contracts.push(TypeKey::of::<C>());
        self
    }

    pub fn to<T: 'static>(mut self) -> Self {
        self.implementation = Some(TypeKey::of::<T>());
        self
    }

    pub fn to_key(mut self, implementation: TypeKey) -> Self {
        self.implementation = Some(implementation);
        self
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn instance_type(mut self, instance_type: InstanceType) -> Self {
        self.instance_type = Some(instance_type);
        self
    }

    /// Explicit instance key for the descriptor's default slot
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn remote(mut self, address: impl Into<String>) -> Self {
        self.instance_type = Some(InstanceType::Remote);
        self.remote_address = Some(address.into());
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key, value);
        self
    }

    pub fn properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    #[inline]
    pub fn contracts(&self) -> &[TypeKey] {
        &self.contracts
    }

    #[inline]
    pub fn implementation_type(&self) -> Option<&TypeKey> {
        self.implementation.as_ref()
    }

    #[inline]
    pub fn scope_or_default(&self) -> Scope {
        self.scope.unwrap_or_default()
    }

    /// Declared instance type, defaulting to `Local` when an implementation is present
    pub fn resolved_instance_type(&self) -> Result<InstanceType> {
        match (self.instance_type, self.implementation) {
            (Some(kind), _) => Ok(kind),
            (None, Some(_)) => Ok(InstanceType::Local),
            (None, None) => Err(IocError::config(format!(
                "binding for {:?} has no implementation and no service or remote type",
                self.contracts
            ))),
        }
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    pub fn remote_address(&self) -> Option<&str> {
        self.remote_address.as_deref()
    }

    #[inline]
    pub fn props(&self) -> &Properties {
        &self.properties
    }
}

/// A binding as produced by a declarative source, with types named by string.
///
/// Resolved against a [`TypeCatalog`] into a [`Binding`]; names may be full
/// type paths or unambiguous simple names.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "kebab-case"))]
pub struct BindingSpec {
    pub contracts: Vec<String>,
    pub implementation: Option<String>,
    pub scope: Option<String>,
    #[cfg_attr(feature = "serde", serde(alias = "type"))]
    pub kind: Option<String>,
    pub name: Option<String>,
    pub remote_address: Option<String>,
    pub properties: Properties,
}

impl BindingSpec {
    pub fn resolve(&self, catalog: &TypeCatalog) -> Result<Binding> {
        let lookup = |name: &str| {
            catalog
                .by_name(name)
                .ok_or_else(|| IocError::config(format!("unknown or ambiguous type {name:?}")))
        };

        let contracts = self
            .contracts
            .iter()
            .map(|c| lookup(c))
            .collect::<Result<Vec<_>>>()?;

        let mut binding = Binding::for_contracts(contracts).properties(self.properties.clone());
        if let Some(implementation) = &self.implementation {
            binding = binding.to_key(lookup(implementation)?);
        }
        if let Some(scope) = &self.scope {
            binding = binding.scope(scope.parse()?);
        }
        if let Some(kind) = &self.kind {
            binding = binding.instance_type(kind.parse()?);
        }
        if let Some(name) = &self.name {
            binding = binding.named(name.clone());
        }
        binding.remote_address = self.remote_address.clone();
        Ok(binding)
    }
}
