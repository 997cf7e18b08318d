//! # ioc-runtime
//!
//! An inversion-of-control runtime: a registry of managed components, built from
//! external bindings and hand-written type metadata, that resolves dependencies,
//! caches instances per scope and routes calls on proxied components through an
//! ordered chain of invocation processors.
//!
//! ## Features
//!
//! - **Scopes** - application, thread, session and local (never cached) instances
//! - **Instance types** - local objects, intercepting proxies, runtime services, remote stubs
//! - **Dependency resolution** - constructor and field injection with cycle detection
//!   and scope adapters for narrower-scoped dependencies
//! - **Invocation pipeline** - security, interception, transactions, asynchronous
//!   dispatch and metering, in fixed priority order
//! - **Lifecycle** - post-construct and pre-destroy hooks, auto-start components
//! - **Observable** - optional tracing integration with JSON or pretty output
//!
//! ## Quick Start
//!
//! ```rust
//! use ioc_runtime::meta::{ClassMeta, Constructor, Param};
//! use ioc_runtime::{Binding, RegistryBuilder, Scope, TypeCatalog};
//! use std::sync::Arc;
//!
//! trait Engine: Send + Sync {
//!     fn power(&self) -> u32;
//! }
//!
//! #[derive(Default)]
//! struct V8;
//!
//! impl Engine for V8 {
//!     fn power(&self) -> u32 { 450 }
//! }
//!
//! struct Car {
//!     engine: Arc<dyn Engine>,
//! }
//!
//! let catalog = TypeCatalog::new()
//!     .with(
//!         ClassMeta::class::<V8>()
//!             .implements(|e| e as Arc<dyn Engine>)
//!             .constructor(Constructor::default_of::<V8>())
//!             .build(),
//!     )?
//!     .with(
//!         ClassMeta::class::<Car>()
//!             .constructor(Constructor::new(vec![Param::component::<dyn Engine>()], |args| {
//!                 Ok(Car { engine: args.component::<dyn Engine>(0)? })
//!             }))
//!             .build(),
//!     )?;
//!
//! let registry = RegistryBuilder::new().catalog(catalog).build();
//! registry.config(vec![
//!     Binding::new::<dyn Engine>().to::<V8>(),
//!     Binding::implementation::<Car>().scope(Scope::Local),
//! ])?;
//!
//! // every car is new, the engine is shared
//! let a = registry.get_instance::<Car>()?;
//! let b = registry.get_instance::<Car>()?;
//! assert!(!Arc::ptr_eq(&a, &b));
//! assert!(Arc::ptr_eq(&a.engine, &b.engine));
//! assert_eq!(a.engine.power(), 450);
//! # Ok::<(), ioc_runtime::IocError>(())
//! ```
//!
//! ## Proxied components
//!
//! A component bound with [`InstanceType::Proxied`] is handed out as the
//! contract's proxy adapter, a small hand-written type that forwards each trait
//! method to [`ManagedProxy::invoke`]. The proxy runs the processors that claim
//! the method before the real call.
//!
//! ## Performance
//!
//! - Descriptor lookups and application scoped instances live in `DashMap`s keyed
//!   by `TypeId` with `ahash`
//! - Creation of cached instances is serialized per registry; hits are not

mod binding;
mod catalog;
mod container;
mod descriptor;
mod error;
mod factory;
mod instance;
#[cfg(feature = "logging")]
pub mod logging;
pub mod meta;
mod method;
mod pipeline;
mod processor;
mod provider;
mod resolver;
mod scanner;
pub mod scope;
pub mod services;
mod storage;
#[cfg(test)]
mod testing;
mod types;

pub use binding::{Binding, BindingSpec, InstanceType, Properties, Scope};
pub use catalog::TypeCatalog;
pub use container::{Registry, RegistryBuilder, RegistryState};
pub use descriptor::ManagedClass;
pub use error::{BoxError, IocError, Result};
pub use factory::{
    InstanceFactory, LocalInstanceFactory, ProxyInstanceFactory, RemoteFactories, RemoteFactory,
    RemoteInstanceFactory, ServiceInstanceFactory, ServiceProviders,
};
pub use instance::{ContractObject, Instance, ManagedProxy, ScopeLink, ScopedHandle};
pub use method::{ManagedMethod, MethodProfile};
pub use pipeline::{Invocation, InvocationProcessor, Next, Priority};
pub use processor::{
    ConfigFieldsProcessor, ConfigurableProcessor, FieldInjectionProcessor, InstancePostProcessor,
    LoggingContextProcessor, PostConstructProcessor,
};
pub use provider::{
    AppFactory, AppFactoryExt, Component, Configurable, Late, PostConstruct, PreDestroy,
};
pub use scanner::{MetadataScanner, TagScanner};
pub use scope::{InstanceKey, ScopeFactory, enter_session};
pub use types::{Args, Object, TypeKey, Value, take_value, value};

// Re-export for convenience
pub use std::sync::Arc;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::meta::{ClassMeta, Constructor, MethodMeta, Param, Tag};
    pub use crate::{
        AppFactory, AppFactoryExt, Binding, Configurable, InstanceType, IocError, Late, ManagedProxy,
        PostConstruct, PreDestroy, Registry, RegistryBuilder, Result, Scope, ScopedHandle,
        TypeCatalog, args, value,
    };
    pub use std::sync::Arc;
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    trait Counter: Send + Sync {
        fn add(&self, n: u64) -> Result<u64>;
    }

    struct CounterProxy(Arc<ManagedProxy>);

    impl Counter for CounterProxy {
        fn add(&self, n: u64) -> Result<u64> {
            self.0.call("add", args![n])
        }
    }

    #[derive(Default)]
    struct Tally {
        total: std::sync::atomic::AtomicU64,
    }

    impl Counter for Tally {
        fn add(&self, n: u64) -> Result<u64> {
            Ok(self.total.fetch_add(n, std::sync::atomic::Ordering::SeqCst) + n)
        }
    }

    fn catalog() -> TypeCatalog {
        TypeCatalog::new()
            .with(
                ClassMeta::interface::<dyn Counter>()
                    .proxy_adapter(|p| Arc::new(CounterProxy(p)) as Arc<dyn Counter>)
                    .build(),
            )
            .unwrap()
            .with(
                ClassMeta::class::<Tally>()
                    .implements(|t| t as Arc<dyn Counter>)
                    .constructor(Constructor::default_of::<Tally>())
                    .method(
                        MethodMeta::new("add")
                            .param(Param::value::<u64>())
                            .returns::<u64>()
                            .handler(|tally: &Tally, args| {
                                Ok(Some(value(tally.add(args.take::<u64>(0)?)?)))
                            }),
                    )
                    .build(),
            )
            .unwrap()
    }

    #[test]
    fn test_proxied_component_through_prelude() {
        let registry = RegistryBuilder::new().catalog(catalog()).build();
        registry
            .config(vec![
                Binding::new::<dyn Counter>()
                    .to::<Tally>()
                    .instance_type(InstanceType::Proxied),
            ])
            .unwrap();
        registry.start().unwrap();

        let counter = registry.get_instance::<dyn Counter>().unwrap();
        assert_eq!(counter.add(2).unwrap(), 2);
        assert_eq!(counter.add(3).unwrap(), 5);
        assert_eq!(registry.get::<dyn Counter>().unwrap().add(0).unwrap(), 5);

        registry.destroy().unwrap();
        assert!(matches!(counter.add(1), Err(IocError::Bug(_))));
    }

    #[test]
    fn test_wrong_argument_type_rejected() {
        let registry = RegistryBuilder::new().catalog(catalog()).build();
        registry
            .config(vec![
                Binding::new::<dyn Counter>()
                    .to::<Tally>()
                    .instance_type(InstanceType::Proxied),
            ])
            .unwrap();
        let Ok(crate::Instance::Proxy(proxy)) =
            registry.get_instance_by_key(&crate::TypeKey::of::<dyn Counter>(), None, Vec::new())
        else {
            panic!("expected a proxy");
        };
        assert!(proxy.invoke("add", args!["two"]).is_err());
        assert!(matches!(
            proxy.invoke("subtract", args![1u64]),
            Err(IocError::NoSuchMethod { .. })
        ));
    }
}
