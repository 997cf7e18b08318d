//! Access checks for remote methods

use crate::method::MethodProfile;
use crate::pipeline::{Invocation, InvocationProcessor, Next, Priority};
use crate::{IocError, Result, Value};
use std::cell::RefCell;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, warn};

/// Caller identity seen by the security processor
pub trait SecurityContext: Send + Sync {
    /// Authenticated principal of the current call, if any
    fn principal(&self) -> Option<String>;

    fn has_role(&self, role: &str) -> bool;
}

#[derive(Debug, Clone)]
struct Principal {
    name: String,
    roles: Vec<String>,
}

thread_local! {
    static PRINCIPAL: RefCell<Option<Principal>> = const { RefCell::new(None) };
}

/// Principal bound to the calling thread
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSecurityContext;

impl ThreadSecurityContext {
    /// Authenticate the calling thread until the guard is dropped
    pub fn login(name: impl Into<String>, roles: &[&str]) -> LoginGuard {
        let principal = Principal {
            name: name.into(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        };
        let previous = PRINCIPAL.with(|current| current.borrow_mut().replace(principal));
        LoginGuard { previous }
    }
}

impl SecurityContext for ThreadSecurityContext {
    fn principal(&self) -> Option<String> {
        PRINCIPAL.with(|current| current.borrow().as_ref().map(|p| p.name.clone()))
    }

    fn has_role(&self, role: &str) -> bool {
        PRINCIPAL.with(|current| {
            current
                .borrow()
                .as_ref()
                .is_some_and(|p| p.roles.iter().any(|r| r == role))
        })
    }
}

/// Restores the previous principal on drop
#[must_use = "the thread is logged out when the guard is dropped"]
pub struct LoginGuard {
    previous: Option<Principal>,
}

impl Drop for LoginGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        PRINCIPAL.with(|current| *current.borrow_mut() = previous);
    }
}

/// Rejects remote calls from unauthenticated callers or callers outside the allowed roles
pub struct SecurityProcessor {
    context: Arc<dyn SecurityContext>,
}

impl SecurityProcessor {
    pub fn new(context: Arc<dyn SecurityContext>) -> Self {
        Self { context }
    }
}

impl Default for SecurityProcessor {
    fn default() -> Self {
        Self::new(Arc::new(ThreadSecurityContext))
    }
}

impl InvocationProcessor for SecurityProcessor {
    fn name(&self) -> &'static str {
        "security"
    }

    fn priority(&self) -> Priority {
        Priority::Security
    }

    fn claims(&self, profile: &MethodProfile) -> bool {
        profile.is_remote() && !profile.is_unchecked()
    }

    fn process(&self, invocation: Invocation, next: Next) -> Result<Option<Value>> {
        let method = invocation.method();
        let Some(principal) = self.context.principal() else {
            #[cfg(feature = "logging")]
            warn!(target: "ioc_runtime", method = %method.qualified_name(), "Unauthenticated call rejected");

            return Err(IocError::Authorization {
                method: method.qualified_name(),
                reason: "caller is not authenticated".into(),
            });
        };

        if let Some(roles) = method.profile().roles() {
            if !roles.iter().any(|role| self.context.has_role(role)) {
                #[cfg(feature = "logging")]
                warn!(
                    target: "ioc_runtime",
                    method = %method.qualified_name(),
                    principal = %principal,
                    "Call rejected, role missing"
                );

                return Err(IocError::Authorization {
                    method: method.qualified_name(),
                    reason: format!("{principal} has none of the roles {roles:?}"),
                });
            }
        }

        #[cfg(feature = "logging")]
        debug!(target: "ioc_runtime", method = %method.qualified_name(), principal = %principal, "Call authorized");

        next.proceed(invocation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::Tag;

    fn profile(method: &[Tag], class: &[Tag]) -> MethodProfile {
        MethodProfile::derive("Vault", "open", method.to_vec(), class)
    }

    #[test]
    fn test_claims_remote_checked_methods() {
        let processor = SecurityProcessor::default();
        assert!(processor.claims(&profile(&[Tag::Remote], &[])));
        assert!(processor.claims(&profile(&[], &[Tag::Remote])));
        assert!(!processor.claims(&profile(&[Tag::Remote, Tag::Unchecked], &[])));
        assert!(!processor.claims(&profile(&[], &[])));
    }

    #[test]
    fn test_login_guard_nests() {
        let context = ThreadSecurityContext;
        assert!(context.principal().is_none());
        {
            let _alice = ThreadSecurityContext::login("alice", &["admin"]);
            assert!(context.has_role("admin"));
            {
                let _bob = ThreadSecurityContext::login("bob", &[]);
                assert_eq!(context.principal().as_deref(), Some("bob"));
                assert!(!context.has_role("admin"));
            }
            assert_eq!(context.principal().as_deref(), Some("alice"));
        }
        assert!(context.principal().is_none());
    }

    #[test]
    fn test_principal_is_per_thread() {
        let _alice = ThreadSecurityContext::login("alice", &["admin"]);
        let seen = std::thread::spawn(|| ThreadSecurityContext.principal()).join().unwrap();
        assert!(seen.is_none());
    }
}
