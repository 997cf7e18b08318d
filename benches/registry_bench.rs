//! Benchmarks for the registry

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use ioc_runtime::meta::{ClassMeta, Constructor, MethodMeta, Param, Tag};
use ioc_runtime::services::MeterProcessor;
use ioc_runtime::{
    Binding, InstanceType, ManagedProxy, Registry, RegistryBuilder, Result, Scope, TypeCatalog,
    args, value,
};
use std::hint::black_box;
use std::sync::Arc;

#[derive(Default)]
struct Config;

#[derive(Default)]
struct Pool;

struct Repository {
    _config: Arc<Config>,
    _pool: Arc<Pool>,
}

trait Adder: Send + Sync {
    fn add(&self, a: u64, b: u64) -> Result<u64>;
}

struct AdderProxy(Arc<ManagedProxy>);

impl Adder for AdderProxy {
    fn add(&self, a: u64, b: u64) -> Result<u64> {
        self.0.call("add", args![a, b])
    }
}

#[derive(Default)]
struct Calculator;

impl Adder for Calculator {
    fn add(&self, a: u64, b: u64) -> Result<u64> {
        Ok(a + b)
    }
}

fn catalog() -> TypeCatalog {
    TypeCatalog::new()
        .with(ClassMeta::class::<Config>().constructor(Constructor::default_of::<Config>()).build())
        .unwrap()
        .with(ClassMeta::class::<Pool>().constructor(Constructor::default_of::<Pool>()).build())
        .unwrap()
        .with(
            ClassMeta::class::<Repository>()
                .constructor(Constructor::new(
                    vec![Param::component::<Config>(), Param::component::<Pool>()],
                    |args| {
                        Ok(Repository {
                            _config: args.component::<Config>(0)?,
                            _pool: args.component::<Pool>(1)?,
                        })
                    },
                ))
                .build(),
        )
        .unwrap()
        .with(
            ClassMeta::interface::<dyn Adder>()
                .proxy_adapter(|p| Arc::new(AdderProxy(p)) as Arc<dyn Adder>)
                .build(),
        )
        .unwrap()
        .with(
            ClassMeta::class::<Calculator>()
                .implements(|c| c as Arc<dyn Adder>)
                .constructor(Constructor::default_of::<Calculator>())
                .method(
                    MethodMeta::new("add")
                        .param(Param::value::<u64>())
                        .param(Param::value::<u64>())
                        .returns::<u64>()
                        .tag(Tag::Meter)
                        .handler(|calculator: &Calculator, args| {
                            let a = args.take::<u64>(0)?;
                            let b = args.take::<u64>(1)?;
                            Ok(Some(value(calculator.add(a, b)?)))
                        }),
                )
                .build(),
        )
        .unwrap()
}

fn registry(repository_scope: Scope) -> Registry {
    let registry = RegistryBuilder::new()
        .catalog(catalog())
        .metering(Arc::new(MeterProcessor::new()))
        .unwrap()
        .build();
    registry
        .config(vec![
            Binding::implementation::<Config>(),
            Binding::implementation::<Pool>(),
            Binding::implementation::<Repository>().scope(repository_scope),
            Binding::new::<dyn Adder>()
                .to::<Calculator>()
                .instance_type(InstanceType::Proxied),
        ])
        .unwrap();
    registry
}

fn bench_config(c: &mut Criterion) {
    let mut group = c.benchmark_group("config");

    group.bench_function("four_bindings", |b| {
        b.iter(|| black_box(registry(Scope::Application)))
    });

    group.finish();
}

fn bench_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolution");
    group.throughput(Throughput::Elements(1));

    let application = registry(Scope::Application);
    application.get_instance::<Repository>().unwrap();
    group.bench_function("application_hit", |b| {
        b.iter(|| black_box(application.get_instance::<Repository>()))
    });

    let thread = registry(Scope::Thread);
    thread.get_instance::<Repository>().unwrap();
    group.bench_function("thread_hit", |b| {
        b.iter(|| black_box(thread.get_instance::<Repository>()))
    });

    let local = registry(Scope::Local);
    group.bench_function("local_with_two_dependencies", |b| {
        b.iter(|| black_box(local.get_instance::<Repository>()))
    });

    group.bench_function("proxy_handle", |b| {
        b.iter(|| black_box(application.get_instance::<dyn Adder>()))
    });

    group.finish();
}

fn bench_invocation(c: &mut Criterion) {
    let mut group = c.benchmark_group("invocation");
    group.throughput(Throughput::Elements(1));

    let registry = registry(Scope::Application);
    let adder = registry.get_instance::<dyn Adder>().unwrap();

    group.bench_function("metered_proxy_call", |b| {
        b.iter(|| black_box(adder.add(black_box(2), black_box(3))))
    });

    group.finish();
}

fn bench_concurrent(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent");
    let registry = registry(Scope::Application);
    registry.get_instance::<Repository>().unwrap();

    for threads in [2usize, 4, 8] {
        group.throughput(Throughput::Elements(threads as u64 * 1000));
        group.bench_function(format!("application_hit_{threads}_threads"), |b| {
            b.iter(|| {
                std::thread::scope(|s| {
                    for _ in 0..threads {
                        s.spawn(|| {
                            for _ in 0..1000 {
                                black_box(registry.get_instance::<Repository>().unwrap());
                            }
                        });
                    }
                });
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_config,
    bench_resolution,
    bench_invocation,
    bench_concurrent,
);

criterion_main!(benches);
