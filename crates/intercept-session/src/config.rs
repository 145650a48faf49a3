use std::time::Duration;

/// Tuning knobs for the interception session.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// How long attach waits for the tab to finish loading.
    pub tab_load_timeout: Duration,
    /// Poll interval while waiting for the tab to finish loading.
    pub load_poll_interval: Duration,
    /// Capacity of the captured-response broadcast channel.
    pub capture_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tab_load_timeout: Duration::from_secs(10),
            load_poll_interval: Duration::from_millis(500),
            capture_buffer: 64,
        }
    }
}
