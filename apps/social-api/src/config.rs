use std::time::Duration;

/// Server configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Allowed CORS origin. `None` allows any origin.
    pub cors_origin: Option<String>,
    /// How often the socket task pings an idle client.
    pub ping_interval: Duration,
    /// A socket that has been silent this long is closed.
    pub ping_timeout: Duration,
    /// Per-connection outbound queue depth. Events beyond it are dropped.
    pub outbound_queue: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            cors_origin: None,
            ping_interval: Duration::from_secs(25),
            ping_timeout: Duration::from_secs(60),
            outbound_queue: 256,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: parsed_var("PORT").unwrap_or(defaults.port),
            cors_origin: std::env::var("CORS_ORIGIN").ok().filter(|s| !s.is_empty()),
            ping_interval: positive_secs("PING_INTERVAL_SECS").unwrap_or(defaults.ping_interval),
            ping_timeout: positive_secs("PING_TIMEOUT_SECS").unwrap_or(defaults.ping_timeout),
            outbound_queue: parsed_var("OUTBOUND_QUEUE")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.outbound_queue),
        }
    }
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// A whole number of seconds. Zero is treated as unset.
fn positive_secs(name: &str) -> Option<Duration> {
    parsed_var::<u64>(name)
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}
