//! Instance post-construction processors
//!
//! Run once per cached instance, right after the instance is persisted in its
//! scope store and outside the registry critical section, in registration order.
//! `Local` scoped instances skip them.

use crate::descriptor::ManagedClass;
use crate::resolver;
use crate::{IocError, Object, Registry, Result};

#[cfg(feature = "logging")]
use tracing::debug;

/// Step applied to a freshly created bare instance
pub trait InstancePostProcessor: Send + Sync {
    fn name(&self) -> &'static str;

    fn process(&self, registry: &Registry, class: &ManagedClass, instance: &Object) -> Result<()>;
}

/// Injects declared dependency fields
#[derive(Debug, Default, Clone, Copy)]
pub struct FieldInjectionProcessor;

impl InstancePostProcessor for FieldInjectionProcessor {
    fn name(&self) -> &'static str {
        "field-injection"
    }

    fn process(&self, registry: &Registry, class: &ManagedClass, instance: &Object) -> Result<()> {
        let Some(meta) = class.class_meta() else {
            return Ok(());
        };
        let host = class.host();
        for field in meta.inject_fields() {
            let dependency = resolver::inject(registry, &host, field.param())?;
            field
                .set(instance, dependency)
                .map_err(|e| IocError::invocation(format!("{}.{}", class.simple_name(), field.name()), e))?;
        }
        Ok(())
    }
}

/// Initializes fields from binding properties; absent properties leave the field untouched
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigFieldsProcessor;

impl InstancePostProcessor for ConfigFieldsProcessor {
    fn name(&self) -> &'static str {
        "config-fields"
    }

    fn process(&self, _registry: &Registry, class: &ManagedClass, instance: &Object) -> Result<()> {
        let Some(meta) = class.class_meta() else {
            return Ok(());
        };
        for field in meta.config_fields() {
            if let Some(raw) = class.properties().get(field.property()) {
                field.set(instance, raw).map_err(|e| {
                    IocError::config(format!(
                        "{}.{} cannot take property {}={raw:?}: {e}",
                        class.simple_name(),
                        field.name(),
                        field.property()
                    ))
                })?;
            }
        }
        Ok(())
    }
}

/// Hands non-empty binding properties to [`Configurable`](crate::Configurable) components
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigurableProcessor;

impl InstancePostProcessor for ConfigurableProcessor {
    fn name(&self) -> &'static str {
        "configurable"
    }

    fn process(&self, _registry: &Registry, class: &ManagedClass, instance: &Object) -> Result<()> {
        let Some(configure) = class.class_meta().and_then(|m| m.configure_hook()) else {
            return Ok(());
        };
        if class.properties().is_empty() {
            return Ok(());
        }
        configure(instance, class.properties())
            .map_err(|e| IocError::invocation(format!("{}::configure", class.simple_name()), e))
    }
}

/// Runs the post-construct hook
#[derive(Debug, Default, Clone, Copy)]
pub struct PostConstructProcessor;

impl InstancePostProcessor for PostConstructProcessor {
    fn name(&self) -> &'static str {
        "post-construct"
    }

    fn process(&self, _registry: &Registry, class: &ManagedClass, instance: &Object) -> Result<()> {
        match class.post_construct() {
            Some(hook) => hook.run(instance, class.simple_name()),
            None => Ok(()),
        }
    }
}

/// Records the instance in the log once it is ready
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingContextProcessor;

impl InstancePostProcessor for LoggingContextProcessor {
    fn name(&self) -> &'static str {
        "logging-context"
    }

    #[allow(unused_variables)]
    fn process(&self, registry: &Registry, class: &ManagedClass, instance: &Object) -> Result<()> {
        #[cfg(feature = "logging")]
        debug!(
            target: "ioc_runtime",
            registry = registry.id(),
            descriptor = class.id(),
            class = class.name(),
            scope = %class.scope(),
            kind = %class.instance_type(),
            "Instance ready"
        );
        Ok(())
    }
}
