//! Component interceptors
//!
//! `Tag::Intercepted` names an interceptor type on a method or its class. The
//! interceptor is taken from the registry when it is managed, otherwise built once
//! from its catalog entry.

use crate::method::MethodProfile;
use crate::pipeline::{Invocation, InvocationProcessor, Next, Priority};
use crate::{IocError, Registry, Result, TypeKey, Value, take_value};
use ahash::RandomState;
use dashmap::DashMap;
use std::any::TypeId;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::trace;

/// Around advice for a managed method.
///
/// Call `next.proceed(invocation)` to continue, or return without it to
/// short-circuit the call.
pub trait Interceptor: Send + Sync {
    fn intercept(&self, invocation: Invocation, next: Next) -> Result<Option<Value>>;
}

/// Runs the interceptors named by a method's tags, method tags first
#[derive(Default)]
pub struct InterceptorProcessor {
    built: DashMap<TypeId, Arc<dyn Interceptor>, RandomState>,
}

impl InterceptorProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    fn interceptor(&self, registry: &Registry, key: &TypeKey) -> Result<Arc<dyn Interceptor>> {
        let contract = TypeKey::of::<dyn Interceptor>();

        if registry.is_managed(key) {
            let value = registry.get_instance_by_key(key, None, Vec::new())?.cast(&contract)?;
            return take_value(value, key.name());
        }

        if let Some(built) = self.built.get(&key.id()) {
            return Ok(Arc::clone(built.value()));
        }

        let meta = registry
            .catalog()
            .get(key)
            .ok_or_else(|| IocError::config(format!("interceptor {key} is neither managed nor described")))?;
        let constructor = meta
            .default_constructor()
            .ok_or_else(|| IocError::config(format!("interceptor {key} has no no-argument constructor")))?;
        let object = constructor
            .invoke(Vec::new())
            .map_err(|e| IocError::invocation(format!("{}::new", key.simple_name()), e))?;
        let value = meta
            .cast(&object, &contract)
            .ok_or_else(|| IocError::config(format!("{key} does not implement Interceptor")))?;
        let interceptor: Arc<dyn Interceptor> = take_value(value, key.name())?;

        #[cfg(feature = "logging")]
        trace!(target: "ioc_runtime", interceptor = key.name(), "Built unmanaged interceptor");

        Ok(Arc::clone(
            self.built.entry(key.id()).or_insert(interceptor).value(),
        ))
    }
}

impl InvocationProcessor for InterceptorProcessor {
    fn name(&self) -> &'static str {
        "interceptor"
    }

    fn priority(&self) -> Priority {
        Priority::Interception
    }

    fn claims(&self, profile: &MethodProfile) -> bool {
        profile.has_tag("intercepted")
    }

    fn process(&self, invocation: Invocation, next: Next) -> Result<Option<Value>> {
        let keys = invocation.method().profile().interceptors();
        let mut interceptors = Vec::with_capacity(keys.len());
        for key in &keys {
            interceptors.push(self.interceptor(invocation.registry(), key)?);
        }
        next.with_interceptors(interceptors).proceed(invocation)
    }
}
