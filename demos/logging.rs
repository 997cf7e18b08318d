//! Registry events as structured logs
//!
//! Run with JSON logging (production):
//! ```bash
//! cargo run --example logging --features logging-json
//! ```
//!
//! Run with pretty logging (development):
//! ```bash
//! cargo run --example logging --features logging-pretty
//! ```
//!
//! `IOC_LOG=ioc_runtime=debug` narrows the output without recompiling.

use ioc_runtime::meta::{ClassMeta, Constructor, Param};
use ioc_runtime::{Binding, IocError, RegistryBuilder, Scope, TypeCatalog, enter_session};
use std::sync::Arc;

#[derive(Default)]
struct Database;

#[derive(Default)]
struct RequestContext;

trait Clock: Send + Sync {}

#[derive(Default)]
struct SystemClock;

impl Clock for SystemClock {}

struct UserService {
    _db: Arc<Database>,
}

fn main() -> ioc_runtime::Result<()> {
    ioc_runtime::logging::builder()
        .trace()
        .registry_only()
        .with_thread_names()
        .pretty()
        .init();

    println!("=== ioc-runtime logging demo ===\n");

    let catalog = TypeCatalog::new()
        .with(
            ClassMeta::class::<Database>()
                .constructor(Constructor::default_of::<Database>())
                .build(),
        )?
        .with(
            ClassMeta::class::<RequestContext>()
                .constructor(Constructor::default_of::<RequestContext>())
                .build(),
        )?
        .with(
            ClassMeta::class::<SystemClock>()
                .implements(|c| c as Arc<dyn Clock>)
                .constructor(Constructor::default_of::<SystemClock>())
                .build(),
        )?
        .with(
            ClassMeta::class::<UserService>()
                .constructor(Constructor::new(vec![Param::component::<Database>()], |args| {
                    Ok(UserService {
                        _db: args.component::<Database>(0)?,
                    })
                }))
                .build(),
        )?;

    // logs: "Creating registry"
    let registry = RegistryBuilder::new().catalog(catalog).build();

    // logs: "Registry configured", then "Binding overrides an earlier one" for the clock
    registry.config(vec![
        Binding::implementation::<Database>(),
        Binding::implementation::<UserService>().scope(Scope::Thread),
        Binding::implementation::<RequestContext>().scope(Scope::Session),
        Binding::new::<dyn Clock>().to::<SystemClock>(),
        Binding::new::<dyn Clock>().to::<SystemClock>().scope(Scope::Local),
    ])?;

    // logs: "Created instance" for the database and the service, then "Instance ready"
    let _users = registry.get_instance::<UserService>()?;
    let _clock = registry.get_instance::<dyn Clock>()?;

    // outside a session the session store refuses
    if let Err(IocError::InactiveScope { scope }) = registry.get_instance::<RequestContext>() {
        println!("no active {scope}");
    }
    {
        let _session = enter_session("req-12345");
        let _ctx = registry.get_instance::<RequestContext>()?;
    }
    registry.end_session("req-12345");

    // logs: "Destroying registry"
    registry.destroy()?;

    println!("\n=== Demo Complete ===");
    println!("Tip: Use --features logging-json for production (JSON output)");
    println!("     Use --features logging-pretty for development (colorful output)");
    Ok(())
}
