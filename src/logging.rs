//! Logging setup for ioc-runtime
//!
//! Every registry event is emitted with `target: "ioc_runtime"`: registry
//! creation and configuration, instance creation, scope adapter injection, and
//! teardown. This module installs a `tracing-subscriber` for them.
//!
//! # Features
//!
//! - `logging` - emit events (default)
//! - `logging-json` - JSON subscriber for production
//! - `logging-pretty` - human readable subscriber for development
//!
//! # Example
//!
//! ```rust,ignore
//! use ioc_runtime::logging;
//!
//! // JSON if logging-json, pretty if logging-pretty
//! logging::init();
//!
//! logging::builder()
//!     .trace()
//!     .registry_only()
//!     .with_thread_names()
//!     .compact()
//!     .init();
//! ```

#[cfg(feature = "logging")]
use tracing::Level;

/// Target of every event this crate emits
pub const TARGET: &str = "ioc_runtime";

/// Environment variable overriding the configured filter, in `EnvFilter` syntax
pub const ENV_FILTER: &str = "IOC_LOG";

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
    /// Single line per event
    Compact,
}

/// Subscriber configuration
#[cfg(feature = "logging")]
#[derive(Debug, Clone)]
pub struct LoggingBuilder {
    level: Level,
    format: LogFormat,
    target: Option<&'static str>,
    env_override: bool,
    with_file: bool,
    with_line_number: bool,
    with_thread_ids: bool,
    with_thread_names: bool,
}

#[cfg(feature = "logging")]
impl Default for LoggingBuilder {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            format: LogFormat::Json,
            target: None,
            env_override: true,
            with_file: false,
            with_line_number: false,
            with_thread_ids: false,
            with_thread_names: false,
        }
    }
}

#[cfg(feature = "logging")]
impl LoggingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Also shows per-instance creation and scope adapter events
    pub fn trace(mut self) -> Self {
        self.level = Level::TRACE;
        self
    }

    pub fn debug(mut self) -> Self {
        self.level = Level::DEBUG;
        self
    }

    pub fn info(mut self) -> Self {
        self.level = Level::INFO;
        self
    }

    /// Only failed hooks and failed asynchronous calls
    pub fn warn(mut self) -> Self {
        self.level = Level::WARN;
        self
    }

    pub fn error(mut self) -> Self {
        self.level = Level::ERROR;
        self
    }

    /// Show events of `target` only
    pub fn with_target_filter(mut self, target: &'static str) -> Self {
        self.target = Some(target);
        self
    }

    /// Show registry events only
    pub fn registry_only(self) -> Self {
        self.with_target_filter(TARGET)
    }

    /// Ignore [`ENV_FILTER`] even when set
    pub fn ignore_env(mut self) -> Self {
        self.env_override = false;
        self
    }

    pub fn with_file(mut self) -> Self {
        self.with_file = true;
        self
    }

    pub fn with_line_number(mut self) -> Self {
        self.with_line_number = true;
        self
    }

    pub fn with_thread_ids(mut self) -> Self {
        self.with_thread_ids = true;
        self
    }

    /// Worker threads of asynchronous methods are named `ioc-async`
    pub fn with_thread_names(mut self) -> Self {
        self.with_thread_names = true;
        self
    }

    pub fn json(mut self) -> Self {
        self.format = LogFormat::Json;
        self
    }

    pub fn pretty(mut self) -> Self {
        self.format = LogFormat::Pretty;
        self
    }

    pub fn compact(mut self) -> Self {
        self.format = LogFormat::Compact;
        self
    }

    /// Filter directive for the configured level and target
    pub fn directive(&self) -> String {
        match self.target {
            Some(target) => format!("{}={}", target, self.level),
            None => self.level.to_string(),
        }
    }

    /// Install the subscriber; does nothing if one is already installed
    #[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
    pub fn init(self) {
        let _ = self.try_init();
    }

    /// Install the subscriber, failing if one is already installed
    #[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
    pub fn try_init(self) -> crate::Result<()> {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};

        let env = if self.env_override {
            EnvFilter::try_from_env(ENV_FILTER).ok()
        } else {
            None
        };
        let filter = env.unwrap_or_else(|| EnvFilter::new(self.directive()));

        let layer = fmt::layer()
            .with_file(self.with_file)
            .with_line_number(self.with_line_number)
            .with_thread_ids(self.with_thread_ids)
            .with_thread_names(self.with_thread_names)
            .with_target(true);

        let registry = tracing_subscriber::registry().with(filter);
        let installed = match self.format {
            #[cfg(feature = "logging-json")]
            LogFormat::Json => registry.with(layer.json()).try_init(),
            // without logging-json the plain formatter stands in
            #[cfg(not(feature = "logging-json"))]
            LogFormat::Json => registry.with(layer).try_init(),
            LogFormat::Pretty => registry.with(layer.pretty()).try_init(),
            LogFormat::Compact => registry.with(layer.compact()).try_init(),
        };
        installed.map_err(|e| crate::IocError::config(format!("cannot install log subscriber: {e}")))
    }

    /// No subscriber without `logging-json` or `logging-pretty`
    #[cfg(not(any(feature = "logging-json", feature = "logging-pretty")))]
    pub fn init(self) {}
}

#[cfg(feature = "logging")]
pub fn builder() -> LoggingBuilder {
    LoggingBuilder::new()
}

/// JSON if `logging-json` is enabled, pretty otherwise
#[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
pub fn init() {
    #[cfg(feature = "logging-json")]
    init_json();
    #[cfg(not(feature = "logging-json"))]
    init_pretty();
}

#[cfg(not(any(feature = "logging-json", feature = "logging-pretty")))]
pub fn init() {}

/// JSON lines, one object per event.
///
/// ```json
/// {"timestamp":"2026-01-01T00:00:00.000Z","level":"DEBUG","fields":{"message":"Registry configured","registry":1,"added":3,"replaced":0,"total":3},"target":"ioc_runtime"}
/// ```
#[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
pub fn init_json() {
    builder().json().debug().init();
}

#[cfg(not(any(feature = "logging-json", feature = "logging-pretty")))]
pub fn init_json() {}

#[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
pub fn init_pretty() {
    builder().pretty().debug().init();
}

#[cfg(not(any(feature = "logging-json", feature = "logging-pretty")))]
pub fn init_pretty() {}

/// Registry events only, other crates filtered out
#[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
pub fn init_registry_only() {
    builder().registry_only().debug().init();
}

#[cfg(not(any(feature = "logging-json", feature = "logging-pretty")))]
pub fn init_registry_only() {}
