//! A small fleet wired by the registry
//!
//! - `ManagedCar` is proxied: driving it needs the `driver` role and is metered
//! - `Tracker` lives behind a `car://` address and is served by a remote stub
//! - `App` starts with the registry and reports the odometer on shutdown
//!
//! ```bash
//! cargo run --example cars
//! cargo run --example cars --features logging-pretty
//! ```

use ioc_runtime::meta::{ClassMeta, Constructor, MethodMeta, Param, Tag};
use ioc_runtime::services::{MeterProcessor, ThreadSecurityContext};
use ioc_runtime::{
    Binding, BoxError, ContractObject, InstanceType, IocError, ManagedProxy, PostConstruct,
    PreDestroy, RegistryBuilder, RemoteFactory, Result, TypeCatalog, TypeKey, args, value,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

trait Vehicle: Send + Sync {
    fn drive(&self, km: u32) -> Result<u32>;
    fn odometer(&self) -> Result<u32>;
}

struct VehicleProxy(Arc<ManagedProxy>);

impl Vehicle for VehicleProxy {
    fn drive(&self, km: u32) -> Result<u32> {
        self.0.call("drive", args![km])
    }

    fn odometer(&self) -> Result<u32> {
        self.0.call("odometer", args![])
    }
}

#[derive(Default)]
struct ManagedCar {
    km: AtomicU32,
}

impl Vehicle for ManagedCar {
    fn drive(&self, km: u32) -> Result<u32> {
        Ok(self.km.fetch_add(km, Ordering::SeqCst) + km)
    }

    fn odometer(&self) -> Result<u32> {
        Ok(self.km.load(Ordering::SeqCst))
    }
}

trait Tracker: Send + Sync {
    fn position(&self) -> Result<String>;
}

struct NetCar {
    address: String,
}

impl Tracker for NetCar {
    fn position(&self) -> Result<String> {
        Ok(format!("{} is parked at 52.37N 4.90E", self.address))
    }
}

/// Serves `car://` addresses
struct Garage;

impl RemoteFactory for Garage {
    fn protocol(&self) -> &str {
        "car"
    }

    fn create(&self, _contract: &TypeKey, address: &str) -> Result<ContractObject> {
        Ok(ContractObject::new(Arc::new(NetCar {
            address: address.to_string(),
        }) as Arc<dyn Tracker>))
    }
}

struct App {
    car: Arc<dyn Vehicle>,
}

impl PostConstruct for App {
    fn post_construct(&self) -> std::result::Result<(), BoxError> {
        println!("[app] started");
        Ok(())
    }
}

impl PreDestroy for App {
    fn pre_destroy(&self) -> std::result::Result<(), BoxError> {
        println!("[app] stopping, car has done {} km", self.car.odometer()?);
        Ok(())
    }
}

fn catalog() -> Result<TypeCatalog> {
    TypeCatalog::new()
        .with(
            ClassMeta::interface::<dyn Vehicle>()
                .proxy_adapter(|p| Arc::new(VehicleProxy(p)) as Arc<dyn Vehicle>)
                .build(),
        )?
        .with(
            ClassMeta::class::<ManagedCar>()
                .implements(|c| c as Arc<dyn Vehicle>)
                .constructor(Constructor::default_of::<ManagedCar>())
                .tag(Tag::Remote)
                .tag(Tag::roles(&["driver"]))
                .method(
                    MethodMeta::new("drive")
                        .param(Param::value::<u32>())
                        .returns::<u32>()
                        .tag(Tag::Meter)
                        .handler(|car: &ManagedCar, args| {
                            Ok(Some(value(car.drive(args.take::<u32>(0)?)?)))
                        }),
                )
                .method(
                    MethodMeta::new("odometer")
                        .returns::<u32>()
                        .tag(Tag::Unchecked)
                        .handler(|car: &ManagedCar, _| Ok(Some(value(car.odometer()?)))),
                )
                .build(),
        )?
        .with(
            ClassMeta::class::<App>()
                .tag(Tag::AutoStart)
                .constructor(Constructor::new(vec![Param::component::<dyn Vehicle>()], |args| {
                    Ok(App {
                        car: args.component::<dyn Vehicle>(0)?,
                    })
                }))
                .post_construct()
                .pre_destroy()
                .build(),
        )
}

fn main() -> Result<()> {
    #[cfg(feature = "logging")]
    ioc_runtime::logging::init();

    println!("=== ioc-runtime cars demo ===\n");

    let meter = Arc::new(MeterProcessor::new());
    let registry = RegistryBuilder::new()
        .catalog(catalog()?)
        .metering(Arc::clone(&meter))?
        .remote_factory(Arc::new(Garage))?
        .build();

    registry.config(vec![
        Binding::new::<dyn Vehicle>()
            .to::<ManagedCar>()
            .instance_type(InstanceType::Proxied),
        Binding::new::<dyn Tracker>().remote("car://fleet/42"),
        Binding::implementation::<App>(),
    ])?;
    registry.start()?;

    let car = registry.get_instance::<dyn Vehicle>()?;
    match car.drive(10) {
        Err(IocError::Authorization { method, reason }) => {
            println!("[anonymous] may not call {method}: {reason}");
        }
        other => println!("[anonymous] unexpected outcome: {:?}", other.map_err(|e| e.to_string())),
    }

    {
        let _driver = ThreadSecurityContext::login("alice", &["driver"]);
        car.drive(120)?;
        println!("[alice] odometer at {} km", car.drive(35)?);
    }

    let tracker = registry.get_instance::<dyn Tracker>()?;
    println!("[tracker] {}", tracker.position()?);

    println!("\nMeters:");
    for reading in meter.snapshot() {
        println!(
            "  {:<20} calls={} failures={} avg={:?}",
            reading.method,
            reading.invocations,
            reading.failures,
            reading.average()
        );
    }
    println!();

    registry.destroy()
}
