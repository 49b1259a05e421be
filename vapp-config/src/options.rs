use std::time::Duration;

/// Per-run knobs. Defaults match an interactive launch: power on, delete
/// anything created if the run fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub power_on: bool,
    /// Keep partially created vApps for inspection instead of deleting them.
    pub retain_on_failure: bool,
    /// Keep launching the remaining vApps of a launch file after one fails.
    pub continue_on_error: bool,
    /// Budget for a single control-plane task, not for the whole run.
    pub task_timeout: Duration,
    pub poll_interval: Duration,
    /// Extra attempts for a request that failed with a transport error.
    pub request_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            power_on: true,
            retain_on_failure: false,
            continue_on_error: false,
            task_timeout: Duration::from_secs(600),
            poll_interval: Duration::from_secs(2),
            request_retries: 3,
            retry_backoff: Duration::from_secs(1),
        }
    }
}

impl RunOptions {
    pub fn with_power_on(mut self, power_on: bool) -> Self {
        self.power_on = power_on;
        self
    }

    pub fn with_retain_on_failure(mut self, retain: bool) -> Self {
        self.retain_on_failure = retain;
        self
    }

    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    /// Zero would spin against the control plane, so it is clamped to 1 ms.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn with_request_retries(mut self, retries: u32, backoff: Duration) -> Self {
        self.request_retries = retries;
        self.retry_backoff = backoff;
        self
    }
}
