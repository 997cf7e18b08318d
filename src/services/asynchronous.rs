//! Fire-and-forget dispatch of asynchronous methods
//!
//! Calls run on the blocking pool of a tokio multi-thread runtime that is started
//! on first use. The caller gets `None` back immediately; failures are counted and
//! logged, never propagated.

use crate::method::MethodProfile;
use crate::pipeline::{Invocation, InvocationProcessor, Next, Priority};
use crate::{IocError, Result, Value};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};

#[cfg(feature = "logging")]
use tracing::{debug, warn};

/// Default size of the blocking pool
pub const DEFAULT_WORKERS: usize = 4;

/// Grace period for in-flight calls at shutdown
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

enum RuntimeState {
    Idle,
    Running(Runtime),
    Stopped,
}

#[derive(Default)]
struct Counters {
    dispatched: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

/// Dispatches methods tagged `Asynchronous` to worker threads
pub struct AsyncProcessor {
    workers: usize,
    state: Mutex<RuntimeState>,
    counters: Arc<Counters>,
}

impl AsyncProcessor {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            state: Mutex::new(RuntimeState::Idle),
            counters: Arc::default(),
        }
    }

    fn handle(&self) -> Result<Handle> {
        let mut state = self.state.lock();
        match &*state {
            RuntimeState::Running(runtime) => return Ok(runtime.handle().clone()),
            RuntimeState::Stopped => {
                return Err(IocError::bug("asynchronous dispatch after the registry was destroyed"));
            }
            RuntimeState::Idle => {}
        }

        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(self.workers)
            .thread_name("ioc-async")
            .build()
            .map_err(|e| IocError::config(format!("cannot start asynchronous workers: {e}")))?;

        #[cfg(feature = "logging")]
        debug!(target: "ioc_runtime", workers = self.workers, "Started asynchronous workers");

        let handle = runtime.handle().clone();
        *state = RuntimeState::Running(runtime);
        Ok(handle)
    }

    /// Calls handed to a worker so far
    #[inline]
    pub fn dispatched(&self) -> u64 {
        self.counters.dispatched.load(Ordering::Acquire)
    }

    /// Calls that finished successfully
    #[inline]
    pub fn completed(&self) -> u64 {
        self.counters.completed.load(Ordering::Acquire)
    }

    /// Calls that failed on their worker
    #[inline]
    pub fn failed(&self) -> u64 {
        self.counters.failed.load(Ordering::Acquire)
    }
}

impl Default for AsyncProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}

impl InvocationProcessor for AsyncProcessor {
    fn name(&self) -> &'static str {
        "asynchronous"
    }

    fn priority(&self) -> Priority {
        Priority::Asynchronous
    }

    fn claims(&self, profile: &MethodProfile) -> bool {
        profile.is_asynchronous()
    }

    fn process(&self, invocation: Invocation, next: Next) -> Result<Option<Value>> {
        let handle = self.handle()?;
        let counters = Arc::clone(&self.counters);
        counters.dispatched.fetch_add(1, Ordering::AcqRel);

        #[cfg(feature = "logging")]
        let method = invocation.method().qualified_name();

        handle.spawn_blocking(move || match next.proceed(invocation) {
            Ok(_) => {
                counters.completed.fetch_add(1, Ordering::AcqRel);
            }
            Err(_err) => {
                counters.failed.fetch_add(1, Ordering::AcqRel);

                #[cfg(feature = "logging")]
                warn!(target: "ioc_runtime", method = %method, error = %_err, "Asynchronous call failed");
            }
        });

        Ok(None)
    }

    fn shutdown(&self) {
        let previous = std::mem::replace(&mut *self.state.lock(), RuntimeState::Stopped);
        if let RuntimeState::Running(runtime) = previous {
            #[cfg(feature = "logging")]
            debug!(
                target: "ioc_runtime",
                dispatched = self.dispatched(),
                failed = self.failed(),
                "Stopping asynchronous workers"
            );

            // dropping a runtime may not block inside another runtime
            if Handle::try_current().is_ok() {
                runtime.shutdown_background();
            } else {
                runtime.shutdown_timeout(SHUTDOWN_TIMEOUT);
            }
        }
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
    use crate::{Instance, Registry, TypeKey, value};
    use std::sync::mpsc::{Receiver, Sender, channel};
    use std::thread::ThreadId;
    use std::time::Instant;

    trait Mailer: Send + Sync {
        fn send(&self, fail: bool) -> Result<()>;
    }

    struct MailerProxy(Arc<ManagedProxy>);

    impl Mailer for MailerProxy {
        fn send(&self, fail: bool) -> Result<()> {
            self.0.run("send", vec![value(fail)])
        }
    }

    struct Outbox {
        sent: Mutex<Sender<ThreadId>>,
        seen: Mutex<Receiver<ThreadId>>,
    }

    impl Default for Outbox {
        fn default() -> Self {
            let (tx, rx) = channel();
            Self {
                sent: Mutex::new(tx),
                seen: Mutex::new(rx),
            }
        }
    }

    impl Mailer for Outbox {
        fn send(&self, fail: bool) -> Result<()> {
            if fail {
                return Err(IocError::invocation("Outbox::send", "mail server down"));
            }
            self.sent
                .lock()
                .send(std::thread::current().id())
                .map_err(|e| IocError::invocation("Outbox::send", e))
        }
    }

    fn registry(processor: Arc<AsyncProcessor>) -> Registry {
        let catalog = TypeCatalog::new()
            .with(
                ClassMeta::interface::<dyn Mailer>()
                    .proxy_adapter(|p| Arc::new(MailerProxy(p)) as Arc<dyn Mailer>)
                    .build(),
            )
            .unwrap()
            .with(
                ClassMeta::class::<Outbox>()
                    .implements(|o| o as Arc<dyn Mailer>)
                    .constructor(Constructor::default_of::<Outbox>())
                    .method(
                        MethodMeta::new("send")
                            .param(Param::value::<bool>())
                            .tag(Tag::Asynchronous)
                            .handler(|outbox: &Outbox, args| {
                                outbox.send(args.take::<bool>(0)?)?;
                                Ok(None)
                            }),
                    )
                    .build(),
            )
            .unwrap();

        let registry = RegistryBuilder::new()
            .catalog(catalog)
            .replace_processor(processor)
            .build();
        registry
            .config(vec![
                Binding::new::<dyn Mailer>()
                    .to::<Outbox>()
                    .instance_type(InstanceType::Proxied),
            ])
            .unwrap();
        registry
    }

    fn wait_for(mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_runs_on_worker_and_returns_immediately() {
        let processor = Arc::new(AsyncProcessor::new(2));
        let registry = registry(Arc::clone(&processor));

        let Instance::Proxy(proxy) = registry
            .get_instance_by_key(&TypeKey::of::<dyn Mailer>(), None, Vec::new())
            .unwrap()
        else {
            panic!("expected a proxy");
        };
        assert!(proxy.invoke("send", vec![value(false)]).unwrap().is_none());

        let outbox = proxy.target().downcast_ref::<Outbox>().unwrap();
        let worker = outbox.seen.lock().recv_timeout(Duration::from_secs(5)).unwrap();
        assert_ne!(worker, std::thread::current().id());
        assert!(wait_for(|| processor.completed() == 1));
    }

    #[test]
    fn test_failures_are_counted_not_propagated() {
        let processor = Arc::new(AsyncProcessor::new(1));
        let registry = registry(Arc::clone(&processor));

        let mailer = registry.get_instance::<dyn Mailer>().unwrap();
        mailer.send(true).unwrap();
        assert!(wait_for(|| processor.failed() == 1));
        assert_eq!(processor.dispatched(), 1);
    }

    #[test]
    fn test_destroy_from_async_context() {
        let processor = Arc::new(AsyncProcessor::new(1));
        let registry = registry(Arc::clone(&processor));
        let mailer = registry.get_instance::<dyn Mailer>().unwrap();
        mailer.send(false).unwrap();
        assert!(wait_for(|| processor.completed() == 1));

        let app = Builder::new_current_thread().build().unwrap();
        app.block_on(async { registry.destroy().unwrap() });

        assert!(matches!(processor.handle(), Err(IocError::Bug(_))));
        assert!(matches!(mailer.send(false), Err(IocError::Bug(_))));
    }

    #[test]
    fn test_dispatch_after_shutdown_is_bug() {
        let processor = Arc::new(AsyncProcessor::new(1));
        let registry = registry(Arc::clone(&processor));
        let mailer = registry.get_instance::<dyn Mailer>().unwrap();

        processor.shutdown();
        assert!(matches!(mailer.send(false), Err(IocError::Bug(_))));
    }
}
