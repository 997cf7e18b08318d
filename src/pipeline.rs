//! Invocation pipeline
//!
//! A call on an intercepted component runs through the processors that claimed the
//! method, in [`Priority`] order, and ends in the terminal step that fills missing
//! arguments and performs the real call. Each processor decides whether to call
//! [`Next::proceed`], short-circuit or transform the result.

use crate::method::{ManagedMethod, MethodProfile};
use crate::resolver;
use crate::services::interceptor::Interceptor;
use crate::{Args, IocError, Object, Registry, Result, Value};
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::trace;

/// Position of a processor in the chain; lower runs first (outermost)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Security,
    Transaction,
    Interception,
    Asynchronous,
    Metering,
}

/// A cross-cutting service wrapped around method calls.
pub trait InvocationProcessor: Send + Sync {
    /// Stable name, breaks priority ties
    fn name(&self) -> &'static str;

    fn priority(&self) -> Priority;

    /// Whether the processor joins the chain of a method, decided at config time
    fn claims(&self, profile: &MethodProfile) -> bool;

    fn process(&self, invocation: Invocation, next: Next) -> Result<Option<Value>>;

    /// Release resources when the registry is destroyed
    fn shutdown(&self) {}
}

/// Call context handed along the chain
pub struct Invocation {
    method: Arc<ManagedMethod>,
    target: Object,
    args: Vec<Value>,
    registry: Registry,
}

impl Invocation {
    pub(crate) fn new(method: Arc<ManagedMethod>, target: Object, args: Vec<Value>, registry: Registry) -> Self {
        Self {
            method,
            target,
            args,
            registry,
        }
    }

    #[inline]
    pub fn method(&self) -> &Arc<ManagedMethod> {
        &self.method
    }

    /// Bare instance the call lands on
    #[inline]
    pub fn target(&self) -> &Object {
        &self.target
    }

    #[inline]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Replace the arguments; the terminal step validates them again
    pub fn set_args(&mut self, args: Vec<Value>) {
        self.args = args;
    }

    #[inline]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("method", &self.method.qualified_name())
            .field("args", &self.args.len())
            .finish()
    }
}

/// Remainder of the chain.
///
/// Interceptors pushed by the interception processor run before the chain
/// resumes with the next processor.
pub struct Next {
    chain: Arc<[Arc<dyn InvocationProcessor>]>,
    index: usize,
    pending: Vec<Arc<dyn Interceptor>>,
}

impl Next {
    pub(crate) fn new(chain: Arc<[Arc<dyn InvocationProcessor>]>) -> Self {
        Self {
            chain,
            index: 0,
            pending: Vec::new(),
        }
    }

    /// Run `interceptors`, in order, ahead of the rest of the chain
    pub(crate) fn with_interceptors(mut self, interceptors: Vec<Arc<dyn Interceptor>>) -> Self {
        self.pending.extend(interceptors.into_iter().rev());
        self
    }

    pub fn proceed(mut self, invocation: Invocation) -> Result<Option<Value>> {
        if let Some(interceptor) = self.pending.pop() {
            return interceptor.intercept(invocation, self);
        }

        match self.chain.get(self.index).cloned() {
            Some(processor) => {
                self.index += 1;

                #[cfg(feature = "logging")]
                trace!(
                    target: "ioc_runtime",
                    processor = processor.name(),
                    method = %invocation.method.qualified_name(),
                    "Entering invocation processor"
                );

                processor.process(invocation, self)
            }
            None => invoke_terminal(invocation),
        }
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &(self.chain.len() - self.index.min(self.chain.len())))
            .field("pending_interceptors", &self.pending.len())
            .finish()
    }
}

/// Argument pre-processing and the real call
fn invoke_terminal(invocation: Invocation) -> Result<Option<Value>> {
    let Invocation {
        method,
        target,
        args,
        registry,
    } = invocation;

    let invoker = method.invoker().ok_or_else(|| {
        IocError::bug(format!(
            "{} reached the terminal invoker without an accessible handle",
            method.qualified_name()
        ))
    })?;

    let args = resolver::preprocess(&registry, &method.host(), method.params(), args)?;
    invoker(&target, Args::new(args)).map_err(|source| IocError::invocation(method.qualified_name(), source))
}
