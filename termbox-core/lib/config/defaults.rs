use std::time::Duration;

use chrono::NaiveTime;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The pod name every box is created with. Only pods with this name are ever reaped.
pub const DEFAULT_SANDBOX_NAME: &str = "termbox";

/// Maximum age of a box before it is reclaimed.
pub const DEFAULT_BOX_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// How often the garbage collector runs.
pub const DEFAULT_GC_INTERVAL: Duration = Duration::from_secs(60);

/// Upper bound for a single runtime call made by a background job.
pub const DEFAULT_RUNTIME_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound for pulling a single image into the runtime's cache.
pub const DEFAULT_PULL_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// How many boxes the garbage collector inspects at once.
pub const DEFAULT_GC_CONCURRENCY: usize = 4;

/// Local time of day the image prefetch job runs.
pub const DEFAULT_PREFETCH_TIME: NaiveTime = NaiveTime::MIN;

/// Where the image catalog is read from.
pub const DEFAULT_CATALOG_PATH: &str = "images/images.json";

/// The address of the container runtime daemon's REST API.
pub const DEFAULT_RUNTIME_URL: &str = "http://127.0.0.1:12345";

/// The port the termbox server listens on.
pub const DEFAULT_SERVER_PORT: u16 = 7842;

/// The command run when attaching to a box without an explicit one.
pub const DEFAULT_EXEC_COMMAND: &str = "/bin/sh";
