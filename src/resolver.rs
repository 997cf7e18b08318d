//! Dependency resolution
//!
//! Fills constructor parameters, method arguments and injected fields. Every
//! resolution of a component dependency is tracked on a per-thread stack so
//! dependency cycles are reported instead of recursing forever.

use crate::binding::Scope;
use crate::instance::ScopeLink;
use crate::meta::Param;
use crate::provider::AppFactory;
use crate::{IocError, Registry, Result, TypeKey, Value, value};
use std::cell::RefCell;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

thread_local! {
    /// Contracts currently being resolved on this thread, outermost first
    static IN_FLIGHT: RefCell<Vec<TypeKey>> = const { RefCell::new(Vec::new()) };
}

/// The component on whose behalf a dependency is resolved
#[derive(Debug, Clone, Copy)]
pub(crate) struct HostRef {
    name: &'static str,
    scope: Scope,
}

impl HostRef {
    pub(crate) fn new(name: &'static str, scope: Scope) -> Self {
        Self { name, scope }
    }
}

/// Pops the in-flight entry when a resolution frame ends
struct InFlight;

impl Drop for InFlight {
    fn drop(&mut self) {
        IN_FLIGHT.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Push `contract`, failing with the full chain when it is already in flight.
/// The stack is emptied on failure so later resolutions on this thread start clean.
fn enter(contract: &TypeKey) -> Result<InFlight> {
    IN_FLIGHT.with(|stack| {
        let mut stack = stack.borrow_mut();
        if stack.contains(contract) {
            let mut chain: Vec<&'static str> = stack.iter().map(TypeKey::name).collect();
            chain.push(contract.name());
            stack.clear();

            #[cfg(feature = "logging")]
            debug!(
                target: "ioc_runtime",
                chain = %chain.join(" -> "),
                "Circular dependency detected"
            );

            return Err(IocError::CircularDependency { chain });
        }
        stack.push(*contract);
        Ok(InFlight)
    })
}

/// Depth of the in-flight stack on this thread
#[cfg(test)]
pub(crate) fn depth() -> usize {
    IN_FLIGHT.with(|stack| stack.borrow().len())
}

/// Resolve `contract` for `host`, yielding a value carrying `Arc<contract>`.
///
/// `Ok(None)` only when `optional` and nothing can provide the contract.
pub(crate) fn resolve(
    registry: &Registry,
    host: &HostRef,
    contract: &TypeKey,
    optional: bool,
) -> Result<Option<Value>> {
    // The registry is never a managed component
    if contract.is::<dyn AppFactory>() {
        let factory: Arc<dyn AppFactory> = Arc::new(registry.clone());
        return Ok(Some(value(factory)));
    }
    if contract.is::<Registry>() {
        return Ok(Some(value(Arc::new(registry.clone()))));
    }

    let _frame = enter(contract)?;

    if let Some(class) = registry.descriptor_for(contract) {
        if host.scope.needs_adapter_for(class.scope()) {
            let adapt = class.scope_adapter(contract).ok_or_else(|| {
                IocError::config(format!(
                    "{} ({}) depends on {} ({}) which has no scope adapter",
                    host.name,
                    host.scope,
                    contract,
                    class.scope()
                ))
            })?;

            #[cfg(feature = "logging")]
            trace!(
                target: "ioc_runtime",
                host = host.name,
                dependency = contract.name(),
                scope = %class.scope(),
                "Injecting scope adapter"
            );

            return Ok(Some(adapt(ScopeLink::new(registry.downgrade(), *contract))));
        }

        return match registry.retrieve(&class, None, Vec::new()).and_then(|i| i.cast(contract)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if optional && e.is_absence() => Ok(None),
            Err(e) => Err(e),
        };
    }

    if let Some(meta) = registry.catalog().get(contract) {
        if let Some(constructor) = meta.default_constructor() {
            #[cfg(feature = "logging")]
            trace!(
                target: "ioc_runtime",
                host = host.name,
                dependency = contract.name(),
                "Building unmanaged dependency"
            );

            let object = constructor
                .invoke(Vec::new())
                .map_err(|e| IocError::invocation(format!("{}::new", contract.simple_name()), e))?;
            return meta
                .cast(&object, contract)
                .map(Some)
                .ok_or_else(|| IocError::bug(format!("{contract} cannot be cast to itself")));
        }
    }

    if optional {
        return Ok(None);
    }

    Err(IocError::UnresolvedDependency {
        dependency: contract.name(),
        host: host.name.to_string(),
    })
}

/// Value for one injectable parameter
pub(crate) fn inject(registry: &Registry, host: &HostRef, param: &Param) -> Result<Value> {
    let contract = param.contract().ok_or_else(|| {
        IocError::illegal_argument(format!(
            "{} requires an explicit {} argument",
            host.name,
            param.value_type().simple_name()
        ))
    })?;
    let resolved = resolve(registry, host, contract, param.is_optional())?;
    param.wrap_resolved(resolved).ok_or_else(|| IocError::UnresolvedDependency {
        dependency: contract.name(),
        host: host.name.to_string(),
    })
}

/// Argument pre-processing: an empty list against a non-empty parameter list is
/// filled by injection, anything else must match count and types exactly.
pub(crate) fn preprocess(
    registry: &Registry,
    host: &HostRef,
    params: &[Param],
    args: Vec<Value>,
) -> Result<Vec<Value>> {
    if args.is_empty() {
        return params.iter().map(|p| inject(registry, host, p)).collect();
    }

    if args.len() != params.len() {
        return Err(IocError::illegal_argument(format!(
            "{} expects {} arguments, got {}",
            host.name,
            params.len(),
            args.len()
        )));
    }

    for (index, (param, arg)) in params.iter().zip(&args).enumerate() {
        if !param.accepts(arg) {
            return Err(IocError::illegal_argument(format!(
                "{} argument #{index} must be a {}",
                host.name,
                param.value_type().simple_name()
            )));
        }
    }

    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Binding;
    use crate::catalog::TypeCatalog;
    use crate::container::RegistryBuilder;
    use crate::meta::{ClassMeta, Constructor};

    trait Ping: Send + Sync {}
    trait Pong: Send + Sync {}

    struct PingImpl;
    struct PongImpl;

    impl Ping for PingImpl {}
    impl Pong for PongImpl {}

    #[derive(Default)]
    struct Clock;

    struct Stand {
        clock: Arc<Clock>,
    }

    struct Lookout {
        factory: Arc<dyn AppFactory>,
    }

    fn cyclic_catalog() -> TypeCatalog {
        TypeCatalog::new()
            .with(
                ClassMeta::class::<PingImpl>()
                    .implements(|p| p as Arc<dyn Ping>)
                    .constructor(Constructor::new(vec![Param::component::<dyn Pong>()], |args| {
                        args.component::<dyn Pong>(0)?;
                        Ok(PingImpl)
                    }))
                    .build(),
            )
            .unwrap()
            .with(
                ClassMeta::class::<PongImpl>()
                    .implements(|p| p as Arc<dyn Pong>)
                    .constructor(Constructor::new(vec![Param::component::<dyn Ping>()], |args| {
                        args.component::<dyn Ping>(0)?;
                        Ok(PongImpl)
                    }))
                    .build(),
            )
            .unwrap()
            .with(
                ClassMeta::class::<Clock>()
                    .constructor(Constructor::default_of::<Clock>())
                    .build(),
            )
            .unwrap()
            .with(
                ClassMeta::class::<Stand>()
                    .constructor(Constructor::new(vec![Param::component::<Clock>()], |args| {
                        Ok(Stand {
                            clock: args.component::<Clock>(0)?,
                        })
                    }))
                    .build(),
            )
            .unwrap()
            .with(
                ClassMeta::class::<Lookout>()
                    .constructor(Constructor::new(vec![Param::component::<dyn AppFactory>()], |args| {
                        Ok(Lookout {
                            factory: args.component::<dyn AppFactory>(0)?,
                        })
                    }))
                    .build(),
            )
            .unwrap()
    }

    fn registry() -> Registry {
        let registry = RegistryBuilder::new().catalog(cyclic_catalog()).build();
        registry
            .config(vec![
                Binding::new::<dyn Ping>().to::<PingImpl>(),
                Binding::new::<dyn Pong>().to::<PongImpl>(),
                Binding::implementation::<Stand>(),
                Binding::implementation::<Lookout>(),
            ])
            .unwrap();
        registry
    }

    #[test]
    fn test_cycle_reports_chain_and_clears_stack() {
        let registry = registry();

        match registry.get_instance::<dyn Ping>() {
            Err(IocError::CircularDependency { chain }) => {
                assert!(chain.len() >= 3);
                assert_eq!(chain.first(), chain.last());
                assert!(chain.iter().any(|n| n.ends_with("Ping")));
                assert!(chain.iter().any(|n| n.ends_with("Pong")));
            }
            other => panic!("expected circular dependency, got {:?}", other.map(|_| ())),
        }
        assert_eq!(depth(), 0);

        // unrelated resolution on the same thread is unaffected
        let stand = registry.get_instance::<Stand>().unwrap();
        let _ = &stand.clock;
        assert_eq!(depth(), 0);
    }

    #[test]
    fn test_factory_itself_is_injected() {
        let registry = registry();
        let lookout = registry.get_instance::<Lookout>().unwrap();
        assert!(lookout.factory.is_managed_contract(&TypeKey::of::<Stand>()));
        assert!(!lookout.factory.is_managed_contract(&TypeKey::of::<Clock>()));
    }

    #[test]
    fn test_unresolved_names_dependency_and_host() {
        struct Orphan;
        struct NeedsOrphan;

        let catalog = TypeCatalog::new()
            .with(
                ClassMeta::class::<NeedsOrphan>()
                    .constructor(Constructor::new(vec![Param::component::<Orphan>()], |args| {
                        args.component::<Orphan>(0)?;
                        Ok(NeedsOrphan)
                    }))
                    .build(),
            )
            .unwrap();
        let registry = RegistryBuilder::new().catalog(catalog).build();
        registry
            .config(vec![Binding::implementation::<NeedsOrphan>()])
            .unwrap();

        match registry.get_instance::<NeedsOrphan>() {
            Err(IocError::UnresolvedDependency { dependency, host }) => {
                assert!(dependency.ends_with("Orphan"));
                assert!(host.ends_with("NeedsOrphan"));
            }
            other => panic!("expected unresolved dependency, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_explicit_arguments_validated() {
        let registry = registry();
        let host = HostRef::new("Test", Scope::Local);
        let params = [Param::value::<u32>(), Param::value::<String>()];

        let ok = preprocess(&registry, &host, &params, crate::args![1u32, String::from("a")]).unwrap();
        assert_eq!(ok.len(), 2);

        let short = preprocess(&registry, &host, &params, crate::args![1u32]);
        assert!(matches!(short, Err(IocError::IllegalArgument(_))));

        let swapped = preprocess(&registry, &host, &params, crate::args![String::from("a"), 1u32]);
        assert!(matches!(swapped, Err(IocError::IllegalArgument(_))));

        let plain = preprocess(&registry, &host, &params, Vec::new());
        assert!(matches!(plain, Err(IocError::IllegalArgument(_))));
    }
}
