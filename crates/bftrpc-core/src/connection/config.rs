use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ConfigError;

// ==============================================================================
// Defaults
// ==============================================================================

pub const DEFAULT_WRITE_WAIT: Duration = Duration::from_secs(10);
pub const DEFAULT_READ_WAIT: Duration = Duration::from_secs(30);
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;
/// Upper bound for the read and write waits. Deadlines are computed as
/// `now + wait`, which must stay representable.
pub const MAX_WAIT: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Callback fired once with the remote address when a connection stops.
pub type DisconnectHook = Arc<dyn Fn(&str) + Send + Sync>;

// ==============================================================================
// Connection Config
// ==============================================================================

/// Per-connection settings, fixed when the connection manager is built.
#[derive(Clone)]
pub struct ConnectionConfig {
    write_wait: Duration,
    read_wait: Duration,
    ping_period: Option<Duration>,
    queue_capacity: usize,
    max_frame_size: Option<usize>,
    on_disconnect: Option<DisconnectHook>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            write_wait: DEFAULT_WRITE_WAIT,
            read_wait: DEFAULT_READ_WAIT,
            ping_period: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_frame_size: None,
            on_disconnect: None,
        }
    }
}

impl ConnectionConfig {
    /// Every write must complete within this long.
    pub fn with_write_wait(mut self, write_wait: Duration) -> Self {
        self.write_wait = write_wait;
        self
    }

    /// The connection is dropped if nothing at all (not even a pong) arrives
    /// for this long.
    pub fn with_read_wait(mut self, read_wait: Duration) -> Self {
        self.read_wait = read_wait;
        self
    }

    /// Pings go out this often. Must be shorter than the read wait so the
    /// peer can answer before the read deadline fires.
    pub fn with_ping_period(mut self, ping_period: Duration) -> Self {
        self.ping_period = Some(ping_period);
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = Some(max_frame_size);
        self
    }

    pub fn with_on_disconnect<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_disconnect = Some(Arc::new(hook));
        self
    }

    pub fn write_wait(&self) -> Duration {
        self.write_wait
    }

    pub fn read_wait(&self) -> Duration {
        self.read_wait
    }

    /// The configured ping period, or 9/10 of the read wait.
    pub fn ping_period(&self) -> Duration {
        self.ping_period
            .unwrap_or_else(|| self.read_wait.mul_f64(0.9))
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    pub fn max_frame_size(&self) -> Option<usize> {
        self.max_frame_size
    }

    pub fn on_disconnect(&self) -> Option<&DisconnectHook> {
        self.on_disconnect.as_ref()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (setting, wait) in [("read wait", self.read_wait), ("write wait", self.write_wait)] {
            if wait > MAX_WAIT {
                return Err(ConfigError::WaitTooLong {
                    setting,
                    wait,
                    max: MAX_WAIT,
                });
            }
        }
        let ping_period = self.ping_period();
        if ping_period.is_zero() {
            return Err(ConfigError::ZeroPingPeriod);
        }
        if ping_period >= self.read_wait {
            return Err(ConfigError::PingNotBeforeReadDeadline {
                ping_period,
                read_wait: self.read_wait,
            });
        }
        if self.write_wait.is_zero() {
            return Err(ConfigError::ZeroWriteWait);
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        Ok(())
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("write_wait", &self.write_wait)
            .field("read_wait", &self.read_wait)
            .field("ping_period", &self.ping_period())
            .field("queue_capacity", &self.queue_capacity)
            .field("max_frame_size", &self.max_frame_size)
            .field("on_disconnect", &self.on_disconnect.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ConnectionConfig::default();
        assert_eq!(config.write_wait(), Duration::from_secs(10));
        assert_eq!(config.read_wait(), Duration::from_secs(30));
        assert_eq!(config.ping_period(), Duration::from_secs(27));
        assert_eq!(config.queue_capacity(), 1000);
        assert_eq!(config.max_frame_size(), None);
        assert!(config.on_disconnect().is_none());
        config.validate().expect("defaults are valid");
    }

    #[test]
    fn ping_period_follows_read_wait_unless_set() {
        let config = ConnectionConfig::default().with_read_wait(Duration::from_secs(10));
        assert_eq!(config.ping_period(), Duration::from_secs(9));

        let config = config.with_ping_period(Duration::from_secs(2));
        assert_eq!(config.ping_period(), Duration::from_secs(2));
    }

    #[test]
    fn ping_period_must_precede_read_deadline() {
        let err = ConnectionConfig::default()
            .with_ping_period(Duration::from_secs(30))
            .validate()
            .expect_err("ping == read wait");
        assert!(matches!(err, ConfigError::PingNotBeforeReadDeadline { .. }));
    }

    #[test]
    fn oversized_waits_are_rejected() {
        let err = ConnectionConfig::default()
            .with_read_wait(Duration::from_secs(u64::MAX))
            .validate()
            .expect_err("read wait beyond the cap");
        assert!(matches!(err, ConfigError::WaitTooLong { setting: "read wait", .. }));

        let err = ConnectionConfig::default()
            .with_write_wait(MAX_WAIT + Duration::from_secs(1))
            .validate()
            .expect_err("write wait beyond the cap");
        assert!(matches!(err, ConfigError::WaitTooLong { setting: "write wait", .. }));

        ConnectionConfig::default()
            .with_read_wait(MAX_WAIT)
            .with_write_wait(MAX_WAIT)
            .validate()
            .expect("waits at the cap are valid");
    }

    #[test]
    fn zero_values_are_rejected() {
        assert!(matches!(
            ConnectionConfig::default().with_queue_capacity(0).validate(),
            Err(ConfigError::ZeroQueueCapacity)
        ));
        assert!(matches!(
            ConnectionConfig::default()
                .with_ping_period(Duration::ZERO)
                .validate(),
            Err(ConfigError::ZeroPingPeriod)
        ));
        assert!(matches!(
            ConnectionConfig::default()
                .with_write_wait(Duration::ZERO)
                .validate(),
            Err(ConfigError::ZeroWriteWait)
        ));
    }
}
