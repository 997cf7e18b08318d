//! Method descriptors
//!
//! A [`ManagedMethod`] wraps one callable of a managed component together with the
//! flags derived from its tags and the ordered chain of invocation processors
//! that claimed it.

use crate::binding::Scope;
use crate::meta::{InvokeFn, MethodMeta, Param, Tag, has_kind};
use crate::pipeline::{Invocation, InvocationProcessor, Next};
use crate::resolver::HostRef;
use crate::{Object, Registry, Result, TypeKey, Value};
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::trace;

/// Flags of one method, derived from method tags with class tags as fallback.
///
/// Processors decide from the profile whether they join a method's chain.
#[derive(Debug, Clone)]
pub struct MethodProfile {
    class: &'static str,
    name: &'static str,
    remote: bool,
    unchecked: bool,
    transactional: bool,
    immutable: bool,
    asynchronous: bool,
    roles: Option<Vec<String>>,
    tags: Vec<Tag>,
    class_tags: Vec<Tag>,
}

fn roles_of(tags: &[Tag]) -> Option<Vec<String>> {
    tags.iter().find_map(|t| match t {
        Tag::RolesAllowed(roles) => Some(roles.clone()),
        _ => None,
    })
}

impl MethodProfile {
    pub(crate) fn derive(class: &'static str, name: &'static str, tags: Vec<Tag>, class_tags: &[Tag]) -> Self {
        let method_roles = roles_of(&tags);
        let unchecked = has_kind(&tags, "unchecked")
            || (has_kind(class_tags, "unchecked") && method_roles.is_none());
        let roles = method_roles.or_else(|| roles_of(class_tags));

        Self {
            class,
            name,
            remote: has_kind(class_tags, "remote") || has_kind(&tags, "remote"),
            unchecked,
            transactional: has_kind(&tags, "transactional") || has_kind(class_tags, "transactional"),
            immutable: has_kind(&tags, "immutable")
                || (has_kind(class_tags, "immutable") && !has_kind(&tags, "mutable")),
            asynchronous: has_kind(&tags, "asynchronous"),
            roles,
            tags,
            class_tags: class_tags.to_vec(),
        }
    }

    #[inline]
    pub fn class_name(&self) -> &'static str {
        self.class
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn is_remote(&self) -> bool {
        self.remote
    }

    #[inline]
    pub fn is_unchecked(&self) -> bool {
        self.unchecked
    }

    #[inline]
    pub fn is_transactional(&self) -> bool {
        self.transactional
    }

    /// Read-only transaction
    #[inline]
    pub fn is_immutable(&self) -> bool {
        self.immutable
    }

    #[inline]
    pub fn is_asynchronous(&self) -> bool {
        self.asynchronous
    }

    #[inline]
    pub fn roles(&self) -> Option<&[String]> {
        self.roles.as_deref()
    }

    /// Tags found on the method itself
    #[inline]
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    #[inline]
    pub fn class_tags(&self) -> &[Tag] {
        &self.class_tags
    }

    /// Tag kind present on the method or, failing that, on its class
    pub fn has_tag(&self, kind: &str) -> bool {
        has_kind(&self.tags, kind) || has_kind(&self.class_tags, kind)
    }

    /// Interceptor types, method level first
    pub fn interceptors(&self) -> Vec<TypeKey> {
        let mut keys = Vec::new();
        for tag in self.tags.iter().chain(&self.class_tags) {
            match tag {
                Tag::Intercepted(key) if !keys.contains(key) => keys.push(*key),
                _ => {}
            }
        }
        keys
    }

    /// Value of a custom service tag, method level first
    pub fn custom(&self, name: &str) -> Option<&str> {
        self.tags.iter().chain(&self.class_tags).find_map(|t| match t {
            Tag::Custom { name: n, value } if *n == name => Some(value.as_str()),
            _ => None,
        })
    }
}

/// Immutable descriptor of one intercepted callable
pub struct ManagedMethod {
    class_id: u64,
    class_scope: Scope,
    meta: MethodMeta,
    profile: MethodProfile,
    chain: Arc<[Arc<dyn InvocationProcessor>]>,
}

impl ManagedMethod {
    pub(crate) fn new(
        class_id: u64,
        class_scope: Scope,
        meta: MethodMeta,
        profile: MethodProfile,
        processors: &[Arc<dyn InvocationProcessor>],
    ) -> Self {
        let mut chain: Vec<Arc<dyn InvocationProcessor>> = processors
            .iter()
            .filter(|p| p.claims(&profile))
            .cloned()
            .collect();
        chain.sort_by(|a, b| a.priority().cmp(&b.priority()).then_with(|| a.name().cmp(b.name())));

        Self {
            class_id,
            class_scope,
            meta,
            profile,
            chain: chain.into(),
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.meta.name()
    }

    #[inline]
    pub fn class_name(&self) -> &'static str {
        self.profile.class
    }

    /// Id of the declaring descriptor
    #[inline]
    pub fn class_id(&self) -> u64 {
        self.class_id
    }

    /// `Class::method`
    pub fn qualified_name(&self) -> String {
        format!("{}::{}", short(self.profile.class), self.meta.name())
    }

    pub fn signature(&self) -> String {
        self.meta.signature()
    }

    #[inline]
    pub fn params(&self) -> &[Param] {
        self.meta.params()
    }

    #[inline]
    pub fn return_type(&self) -> Option<&TypeKey> {
        self.meta.return_type()
    }

    #[inline]
    pub fn profile(&self) -> &MethodProfile {
        &self.profile
    }

    /// Whether a callable handle is attached; contract-only methods have none
    #[inline]
    pub fn is_accessible(&self) -> bool {
        self.meta.invoker().is_some()
    }

    /// Names of the processors in chain order
    pub fn processors(&self) -> Vec<&'static str> {
        self.chain.iter().map(|p| p.name()).collect()
    }

    pub(crate) fn invoker(&self) -> Option<&InvokeFn> {
        self.meta.invoker()
    }

    pub(crate) fn host(&self) -> HostRef {
        HostRef::new(self.profile.class, self.class_scope)
    }

    /// Whether `args` fit the parameter list exactly
    pub(crate) fn accepts(&self, args: &[Value]) -> bool {
        let params = self.meta.params();
        params.len() == args.len() && params.iter().zip(args).all(|(p, a)| p.accepts(a))
    }

    /// Run the processor chain, ending in the real call on `target`
    pub fn invoke(self: &Arc<Self>, registry: &Registry, target: Object, args: Vec<Value>) -> Result<Option<Value>> {
        #[cfg(feature = "logging")]
        trace!(
            target: "ioc_runtime",
            method = %self.qualified_name(),
            processors = self.chain.len(),
            "Invoking managed method"
        );

        let invocation = Invocation::new(Arc::clone(self), target, args, registry.clone());
        Next::new(Arc::clone(&self.chain)).proceed(invocation)
    }
}

fn short(name: &str) -> &str {
    let base = name.split('<').next().unwrap_or(name);
    match base.rfind("::") {
        Some(pos) => &name[pos + 2..],
        None => name.trim_start_matches("dyn "),
    }
}

impl fmt::Debug for ManagedMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedMethod")
            .field("method", &self.qualified_name())
            .field("signature", &self.signature())
            .field("remote", &self.profile.remote)
            .field("processors", &self.processors())
            .finish()
    }
}
