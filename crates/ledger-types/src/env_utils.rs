//! Environment variable helpers for runtime tuning knobs.
//!
//! ```
//! use ledger_types::env_utils::{env_bool, env_var_or};
//!
//! let retries: u32 = env_var_or("LEDGER_IMPORT_POLL_RETRIES", 10);
//! let verbose = env_bool("LEDGER_IMPORT_VERBOSE");
//! # let _ = (retries, verbose);
//! ```

use std::str::FromStr;
use std::time::Duration;

/// Parse an environment variable; `None` when unset or unparsable.
pub fn env_var<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

pub fn env_var_or<T: FromStr>(key: &str, default: T) -> T {
    env_var(key).unwrap_or(default)
}

/// True for "1", "true", "yes" or "on" (case-insensitive).
pub fn env_bool(key: &str) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

/// A millisecond count from the environment as a `Duration`.
pub fn env_millis_or(key: &str, default: Duration) -> Duration {
    env_var::<u64>(key)
        .map(Duration::from_millis)
        .unwrap_or(default)
}
