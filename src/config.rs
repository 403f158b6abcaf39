use serde::{Deserialize, Serialize};

/// Configures retry bookkeeping and the interceptor timeout.
///
/// Applied once at [`LoadingBar`](crate::LoadingBar) construction; the bar
/// never mutates it afterwards. Derives serde so host applications can load
/// it from their own configuration files, with missing fields falling back
/// to the defaults.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadingBarConfig {
    /// Number of consecutive retry-bookkeeping calls tolerated before the
    /// in-flight counter self-corrects. `0` disables retry holding entirely.
    pub max_retry_count: usize,
    /// Per-request timeout in milliseconds applied by the interceptor.
    /// `0` disables the timeout.
    pub timeout_ms: u64,
}

impl Default for LoadingBarConfig {
    fn default() -> Self {
        Self {
            max_retry_count: 0,
            timeout_ms: 30_000,
        }
    }
}
