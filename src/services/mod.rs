//! Built-in invocation processors
//!
//! Each service plugs into the invocation pipeline as an
//! [`InvocationProcessor`](crate::pipeline::InvocationProcessor) and claims the
//! methods whose profile asks for it.

pub mod asynchronous;
pub mod interceptor;
pub mod meter;
pub mod security;
pub mod transaction;

pub use asynchronous::AsyncProcessor;
pub use interceptor::{Interceptor, InterceptorProcessor};
pub use meter::{MeterProcessor, MeterSnapshot};
pub use security::{LoginGuard, SecurityContext, SecurityProcessor, ThreadSecurityContext};
pub use transaction::{Transaction, TransactionManager, TransactionProcessor};
