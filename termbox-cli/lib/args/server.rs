use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    time::Duration,
};

use chrono::NaiveTime;
use clap::Parser;
use termbox_core::{
    config::{
        DEFAULT_BOX_TTL, DEFAULT_CATALOG_PATH, DEFAULT_GC_CONCURRENCY, DEFAULT_GC_INTERVAL,
        DEFAULT_PULL_TIMEOUT, DEFAULT_RUNTIME_CALL_TIMEOUT, DEFAULT_RUNTIME_URL,
        DEFAULT_SANDBOX_NAME, DEFAULT_SERVER_PORT,
    },
    management::GcPolicy,
};
use termbox_server::{Config, RuntimeBackend, ServerResult, LOCALHOST_IP};

use crate::styles;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Arguments for the termbox-server command
#[derive(Debug, Parser)]
#[command(name = "termbox-server", author, version, styles=styles::styles())]
pub struct ServerArgs {
    /// Address to listen on
    #[arg(long, env = "TERMBOX_HOST", default_value_t = LOCALHOST_IP)]
    pub host: IpAddr,

    /// Port number to listen on
    #[arg(long, env = "TERMBOX_PORT", default_value_t = DEFAULT_SERVER_PORT)]
    pub port: u16,

    /// Path of the image catalog
    #[arg(long, env = "TERMBOX_CATALOG", default_value = DEFAULT_CATALOG_PATH)]
    pub catalog: PathBuf,

    /// Base URL of the container runtime
    #[arg(long, env = "TERMBOX_RUNTIME_URL", default_value = DEFAULT_RUNTIME_URL)]
    pub runtime_url: String,

    /// Run against an in-process runtime instead of a real one
    #[arg(long = "dev", env = "TERMBOX_DEV", default_value_t = false)]
    pub dev_mode: bool,

    /// Pod name that marks a pod as a box
    #[arg(long, env = "TERMBOX_SANDBOX_NAME", default_value = DEFAULT_SANDBOX_NAME)]
    pub sandbox_name: String,

    /// Seconds a box may live before it is collected
    #[arg(long, env = "TERMBOX_BOX_TTL_SECS", default_value_t = DEFAULT_BOX_TTL.as_secs())]
    pub ttl_secs: u64,

    /// Seconds between garbage collection runs
    #[arg(long, env = "TERMBOX_GC_INTERVAL_SECS", default_value_t = DEFAULT_GC_INTERVAL.as_secs())]
    pub gc_interval_secs: u64,

    /// Seconds a single runtime call may take
    #[arg(
        long,
        env = "TERMBOX_CALL_TIMEOUT_SECS",
        default_value_t = DEFAULT_RUNTIME_CALL_TIMEOUT.as_secs()
    )]
    pub call_timeout_secs: u64,

    /// Seconds a single image pull may take
    #[arg(
        long,
        env = "TERMBOX_PULL_TIMEOUT_SECS",
        default_value_t = DEFAULT_PULL_TIMEOUT.as_secs()
    )]
    pub pull_timeout_secs: u64,

    /// How many boxes garbage collection inspects at once
    #[arg(long, env = "TERMBOX_GC_CONCURRENCY", default_value_t = DEFAULT_GC_CONCURRENCY)]
    pub gc_concurrency: usize,

    /// Local time of day (HH:MM) to prefetch images
    #[arg(
        long,
        env = "TERMBOX_PREFETCH_AT",
        default_value = "00:00",
        value_parser = parse_time_of_day
    )]
    pub prefetch_at: NaiveTime,

    /// Also prefetch images right after start-up
    #[arg(long, env = "TERMBOX_PREFETCH_ON_START", default_value_t = false)]
    pub prefetch_on_start: bool,

    /// Log more (debug level)
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Log less (warnings and errors only)
    #[arg(short, long)]
    pub quiet: bool,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ServerArgs {
    /// The log filter used when `RUST_LOG` is not set.
    pub fn default_log_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }

    /// Builds and validates the server configuration.
    pub fn to_config(&self) -> ServerResult<Config> {
        let runtime = if self.dev_mode {
            RuntimeBackend::InMemory
        } else {
            RuntimeBackend::Http(self.runtime_url.clone())
        };

        let gc_policy = GcPolicy::builder()
            .ttl(Duration::from_secs(self.ttl_secs))
            .sandbox_name(self.sandbox_name.clone())
            .call_timeout(Duration::from_secs(self.call_timeout_secs))
            .concurrency(self.gc_concurrency)
            .build();

        Config::builder()
            .addr(SocketAddr::new(self.host, self.port))
            .catalog_path(self.catalog.clone())
            .runtime(runtime)
            .gc_policy(gc_policy)
            .gc_interval(Duration::from_secs(self.gc_interval_secs))
            .pull_timeout(Duration::from_secs(self.pull_timeout_secs))
            .prefetch_at(self.prefetch_at)
            .prefetch_on_start(self.prefetch_on_start)
            .build()
            .validate()
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn parse_time_of_day(value: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| format!("expected a time of day like 00:00, got {:?}", value))
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
