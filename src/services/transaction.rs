//! Transaction demarcation
//!
//! The outermost transactional call on a thread opens a transaction, commits or
//! rolls it back, and closes it. Nested transactional calls on the same thread
//! join the open transaction.

use crate::method::MethodProfile;
use crate::pipeline::{Invocation, InvocationProcessor, Next, Priority};
use crate::{BoxError, IocError, Result, Value};
use std::cell::RefCell;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "logging")]
use tracing::{trace, warn};

/// One open transaction
pub trait Transaction: Send {
    fn commit(&mut self) -> std::result::Result<(), BoxError>;

    fn rollback(&mut self) -> std::result::Result<(), BoxError>;

    /// Release the transaction; called exactly once
    fn close(&mut self);
}

/// Opens transactions for the transaction processor
pub trait TransactionManager: Send + Sync {
    fn begin(&self, read_only: bool) -> std::result::Result<Box<dyn Transaction>, BoxError>;
}

thread_local! {
    /// Processors with a transaction open on this thread
    static ACTIVE: RefCell<HashSet<u64>> = RefCell::new(HashSet::new());
}

struct ActiveGuard(u64);

impl ActiveGuard {
    fn enter(processor: u64) -> Self {
        ACTIVE.with(|active| active.borrow_mut().insert(processor));
        Self(processor)
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        let _ = ACTIVE.try_with(|active| active.borrow_mut().remove(&self.0));
    }
}

/// Closes the transaction on every exit path
struct OpenTransaction(Box<dyn Transaction>);

impl Drop for OpenTransaction {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Wraps transactional methods in a transaction of the registered manager
pub struct TransactionProcessor {
    id: u64,
    manager: Arc<dyn TransactionManager>,
}

impl TransactionProcessor {
    pub fn new(manager: Arc<dyn TransactionManager>) -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self {
            id: COUNTER.fetch_add(1, Ordering::Relaxed),
            manager,
        }
    }

    fn is_active(&self) -> bool {
        ACTIVE.with(|active| active.borrow().contains(&self.id))
    }
}

impl InvocationProcessor for TransactionProcessor {
    fn name(&self) -> &'static str {
        "transaction"
    }

    fn priority(&self) -> Priority {
        Priority::Transaction
    }

    fn claims(&self, profile: &MethodProfile) -> bool {
        profile.is_transactional()
    }

    fn process(&self, invocation: Invocation, next: Next) -> Result<Option<Value>> {
        if self.is_active() {
            return next.proceed(invocation);
        }

        let method = invocation.method().qualified_name();
        let read_only = invocation.method().profile().is_immutable();

        #[cfg(feature = "logging")]
        trace!(target: "ioc_runtime", method = %method, read_only = read_only, "Beginning transaction");

        let mut transaction = OpenTransaction(
            self.manager
                .begin(read_only)
                .map_err(|e| IocError::invocation(format!("{method} (begin transaction)"), e))?,
        );
        let _active = ActiveGuard::enter(self.id);

        let result = next.proceed(invocation);
        if read_only {
            return result;
        }

        match result {
            Ok(value) => {
                transaction
                    .0
                    .commit()
                    .map_err(|e| IocError::invocation(format!("{method} (commit)"), e))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(_rollback) = transaction.0.rollback() {
                    #[cfg(feature = "logging")]
                    warn!(target: "ioc_runtime", method = %method, error = %_rollback, "Rollback failed");
                }
                Err(err)
            }
        }
    }
}
