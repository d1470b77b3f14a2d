//! Configuration module for the termbox server.
//!
//! This module handles server configuration including:
//! - The listen address
//! - Where the image catalog lives
//! - Which container runtime backs the boxes
//! - Garbage collection and image prefetch timing

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use chrono::NaiveTime;
use getset::Getters;
use termbox_core::{
    config::{
        DEFAULT_CATALOG_PATH, DEFAULT_GC_INTERVAL, DEFAULT_PREFETCH_TIME, DEFAULT_PULL_TIMEOUT,
        DEFAULT_RUNTIME_URL, DEFAULT_SERVER_PORT,
    },
    management::GcPolicy,
    runtime::{HttpRuntimeClient, InMemoryRuntime, RuntimeClient},
};
use typed_builder::TypedBuilder;

use crate::{ServerError, ServerResult};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The address the server binds to by default
pub const LOCALHOST_IP: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Configuration structure that holds all the application settings
#[derive(Debug, Clone, Getters, TypedBuilder)]
#[getset(get = "pub with_prefix")]
pub struct Config {
    /// Address to listen on
    #[builder(default = SocketAddr::new(LOCALHOST_IP, DEFAULT_SERVER_PORT))]
    addr: SocketAddr,

    /// Path of the image catalog file
    #[builder(default = PathBuf::from(DEFAULT_CATALOG_PATH), setter(into))]
    catalog_path: PathBuf,

    /// The container runtime boxes run in
    #[builder(default)]
    runtime: RuntimeBackend,

    /// TTL and runtime call settings for garbage collection
    #[builder(default)]
    gc_policy: GcPolicy,

    /// How often garbage collection runs
    #[builder(default = DEFAULT_GC_INTERVAL)]
    gc_interval: Duration,

    /// Upper bound for pulling one image
    #[builder(default = DEFAULT_PULL_TIMEOUT)]
    pull_timeout: Duration,

    /// Local time of day the image prefetch runs
    #[builder(default = DEFAULT_PREFETCH_TIME)]
    prefetch_at: NaiveTime,

    /// Whether to also prefetch images right after start-up
    #[builder(default)]
    prefetch_on_start: bool,
}

/// Which container runtime implementation to use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeBackend {
    /// A runtime daemon reachable over HTTP at the given base URL.
    Http(String),

    /// An in-process runtime, for development.
    InMemory,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Config {
    /// Checks that every duration and limit is usable.
    pub fn validate(self) -> ServerResult<Self> {
        let policy = &self.gc_policy;
        let zero_checks = [
            (policy.ttl.is_zero(), "box TTL"),
            (policy.call_timeout.is_zero(), "runtime call timeout"),
            (self.gc_interval.is_zero(), "garbage collection interval"),
            (self.pull_timeout.is_zero(), "image pull timeout"),
        ];

        for (is_zero, what) in zero_checks {
            if is_zero {
                return Err(ServerError::ConfigError(format!("{} must not be zero", what)));
            }
        }

        if policy.concurrency == 0 {
            return Err(ServerError::ConfigError(
                "garbage collection concurrency must not be zero".to_string(),
            ));
        }

        if policy.sandbox_name.trim().is_empty() || policy.sandbox_name.contains(':') {
            return Err(ServerError::ConfigError(format!(
                "invalid sandbox name {:?}",
                policy.sandbox_name
            )));
        }

        Ok(self)
    }
}

impl RuntimeBackend {
    /// Creates the runtime client for this backend.
    pub fn connect(&self) -> ServerResult<Arc<dyn RuntimeClient>> {
        match self {
            RuntimeBackend::Http(url) => {
                let client = HttpRuntimeClient::new(url)
                    .map_err(|e| ServerError::ConfigError(e.to_string()))?;
                tracing::info!("using container runtime at {}", url);
                Ok(Arc::new(client))
            }
            RuntimeBackend::InMemory => {
                tracing::warn!("using the in-memory runtime, boxes are not isolated");
                Ok(Arc::new(InMemoryRuntime::new()))
            }
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for RuntimeBackend {
    fn default() -> Self {
        RuntimeBackend::Http(DEFAULT_RUNTIME_URL.to_string())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_match_reference_policy() {
        let config = Config::builder().build().validate().unwrap();

        assert_eq!(config.get_addr().port(), 7842);
        assert_eq!(config.get_catalog_path(), &PathBuf::from("images/images.json"));
        assert_eq!(config.get_gc_policy().ttl, Duration::from_secs(21600));
        assert_eq!(config.get_gc_policy().sandbox_name, "termbox");
        assert_eq!(*config.get_gc_interval(), Duration::from_secs(60));
        assert_eq!(*config.get_prefetch_at(), NaiveTime::MIN);
        assert!(!config.get_prefetch_on_start());
    }

    #[test]
    fn test_config_rejects_zero_durations() {
        let result = Config::builder()
            .gc_interval(Duration::ZERO)
            .build()
            .validate();
        assert!(matches!(result, Err(ServerError::ConfigError(_))));

        let result = Config::builder()
            .gc_policy(GcPolicy::builder().ttl(Duration::ZERO).build())
            .build()
            .validate();
        assert!(matches!(result, Err(ServerError::ConfigError(_))));
    }

    #[test]
    fn test_config_rejects_bad_sandbox_name() {
        let result = Config::builder()
            .gc_policy(GcPolicy::builder().sandbox_name("term:box").build())
            .build()
            .validate();
        assert!(matches!(result, Err(ServerError::ConfigError(_))));
    }

    #[test]
    fn test_runtime_backend_rejects_invalid_url() {
        let result = RuntimeBackend::Http("::nope::".to_string()).connect();
        assert!(matches!(result, Err(ServerError::ConfigError(_))));
    }
}
