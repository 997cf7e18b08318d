//! Invocation meters

use crate::method::MethodProfile;
use crate::pipeline::{Invocation, InvocationProcessor, Next, Priority};
use crate::{Result, Value};
use ahash::RandomState;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Default)]
struct Meter {
    invocations: AtomicU64,
    failures: AtomicU64,
    total_nanos: AtomicU64,
    max_nanos: AtomicU64,
}

impl Meter {
    fn record(&self, elapsed: Duration, failed: bool) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.invocations.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        self.total_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.max_nanos.fetch_max(nanos, Ordering::Relaxed);
    }
}

/// Point-in-time reading of one method's meter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeterSnapshot {
    /// `Class::method`
    pub method: String,
    pub invocations: u64,
    pub failures: u64,
    pub total: Duration,
    pub max: Duration,
}

impl MeterSnapshot {
    pub fn average(&self) -> Duration {
        match u32::try_from(self.invocations) {
            Ok(0) => Duration::ZERO,
            Ok(n) => self.total / n,
            Err(_) => Duration::from_nanos(self.total.as_nanos() as u64 / self.invocations),
        }
    }
}

/// Counts invocations, failures and processing time per method.
///
/// Claims methods tagged `Meter`, or every intercepted method when global.
#[derive(Default)]
pub struct MeterProcessor {
    global: bool,
    meters: DashMap<String, Arc<Meter>, RandomState>,
}

impl MeterProcessor {
    /// Meter methods tagged `Meter`
    pub fn new() -> Self {
        Self::default()
    }

    /// Meter every method that gets a descriptor
    pub fn global() -> Self {
        Self {
            global: true,
            ..Self::default()
        }
    }

    /// Readings sorted by method name
    pub fn snapshot(&self) -> Vec<MeterSnapshot> {
        let mut readings: Vec<MeterSnapshot> = self
            .meters
            .iter()
            .map(|entry| {
                let meter = entry.value();
                MeterSnapshot {
                    method: entry.key().clone(),
                    invocations: meter.invocations.load(Ordering::Relaxed),
                    failures: meter.failures.load(Ordering::Relaxed),
                    total: Duration::from_nanos(meter.total_nanos.load(Ordering::Relaxed)),
                    max: Duration::from_nanos(meter.max_nanos.load(Ordering::Relaxed)),
                }
            })
            .collect();
        readings.sort_by(|a, b| a.method.cmp(&b.method));
        readings
    }

    /// Reading for one `Class::method`
    pub fn reading(&self, method: &str) -> Option<MeterSnapshot> {
        self.snapshot().into_iter().find(|s| s.method == method)
    }

    fn meter(&self, method: String) -> Arc<Meter> {
        if let Some(meter) = self.meters.get(&method) {
            return Arc::clone(meter.value());
        }
        Arc::clone(self.meters.entry(method).or_default().value())
    }
}

impl InvocationProcessor for MeterProcessor {
    fn name(&self) -> &'static str {
        "meter"
    }

    fn priority(&self) -> Priority {
        Priority::Metering
    }

    fn claims(&self, profile: &MethodProfile) -> bool {
        self.global || profile.has_tag("meter")
    }

    fn process(&self, invocation: Invocation, next: Next) -> Result<Option<Value>> {
        let meter = self.meter(invocation.method().qualified_name());
        let started = Instant::now();
        let result = next.proceed(invocation);
        meter.record(started.elapsed(), result.is_err());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{Binding, InstanceType};
    use crate::catalog::TypeCatalog;
    use crate::container::RegistryBuilder;
    use crate::instance::ManagedProxy;
    use crate::meta::{ClassMeta, Constructor, MethodMeta, Param, Tag};
    use crate::{Registry, value};

    trait Parser: Send + Sync {
        fn parse(&self, input: &str) -> crate::Result<u32>;
        fn reset(&self) -> crate::Result<()>;
    }

    struct ParserProxy(Arc<ManagedProxy>);

    impl Parser for ParserProxy {
        fn parse(&self, input: &str) -> crate::Result<u32> {
            self.0.call("parse", vec![value(input.to_string())])
        }
        fn reset(&self) -> crate::Result<()> {
            self.0.run("reset", Vec::new())
        }
    }

    #[derive(Default)]
    struct Decimal;

    impl Parser for Decimal {
        fn parse(&self, input: &str) -> crate::Result<u32> {
            input
                .parse()
                .map_err(|e| crate::IocError::invocation("Decimal::parse", e))
        }
        fn reset(&self) -> crate::Result<()> {
            Ok(())
        }
    }

    fn registry(meter: Arc<MeterProcessor>) -> Registry {
        let catalog = TypeCatalog::new()
            .with(
                ClassMeta::interface::<dyn Parser>()
                    .proxy_adapter(|p| Arc::new(ParserProxy(p)) as Arc<dyn Parser>)
                    .build(),
            )
            .unwrap()
            .with(
                ClassMeta::class::<Decimal>()
                    .implements(|d| d as Arc<dyn Parser>)
                    .constructor(Constructor::default_of::<Decimal>())
                    .method(
                        MethodMeta::new("parse")
                            .param(Param::value::<String>())
                            .returns::<u32>()
                            .tag(Tag::Meter)
                            .handler(|decimal: &Decimal, args| {
                                let input = args.take::<String>(0)?;
                                Ok(Some(value(decimal.parse(&input)?)))
                            }),
                    )
                    .method(MethodMeta::new("reset").handler(|decimal: &Decimal, _| {
                        decimal.reset()?;
                        Ok(None)
                    }))
                    .build(),
            )
            .unwrap();

        let registry = RegistryBuilder::new()
            .catalog(catalog)
            .with_processor(meter)
            .unwrap()
            .build();
        registry
            .config(vec![
                Binding::new::<dyn Parser>()
                    .to::<Decimal>()
                    .instance_type(InstanceType::Proxied),
            ])
            .unwrap();
        registry
    }

    #[test]
    fn test_tagged_methods_metered() {
        let meter = Arc::new(MeterProcessor::new());
        let registry = registry(Arc::clone(&meter));
        let parser = registry.get_instance::<dyn Parser>().unwrap();

        assert_eq!(parser.parse("42").unwrap(), 42);
        assert!(parser.parse("forty-two").is_err());
        parser.reset().unwrap();

        let readings = meter.snapshot();
        assert_eq!(readings.len(), 1);
        let parse = &readings[0];
        assert_eq!(parse.method, "Decimal::parse");
        assert_eq!(parse.invocations, 2);
        assert_eq!(parse.failures, 1);
        assert!(parse.max <= parse.total);
    }

    #[test]
    fn test_global_meters_everything() {
        let meter = Arc::new(MeterProcessor::global());
        let registry = registry(Arc::clone(&meter));
        let parser = registry.get_instance::<dyn Parser>().unwrap();

        parser.reset().unwrap();
        parser.reset().unwrap();

        let reset = meter.reading("Decimal::reset").unwrap();
        assert_eq!(reset.invocations, 2);
        assert_eq!(reset.failures, 0);
        assert!(meter.reading("Decimal::parse").is_none());
    }

    #[test]
    fn test_average() {
        let snapshot = MeterSnapshot {
            method: "A::b".into(),
            invocations: 4,
            failures: 0,
            total: Duration::from_millis(40),
            max: Duration::from_millis(20),
        };
        assert_eq!(snapshot.average(), Duration::from_millis(10));
    }
}
