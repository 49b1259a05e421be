//! Waiting on control-plane tasks and retrying the requests that start them.

use std::time::Duration;

use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use vapp_config::RunOptions;
use vapp_core::error::{LaunchError, Result};
use vapp_provider::{ClientError, ControlPlane, RejectReason, TaskHandle, TaskStatus};

/// Polls a single task until it finishes, fails, times out or is cancelled.
///
/// Holds no state besides its settings, so one waiter can serve any number
/// of concurrent waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskWaiter {
    timeout: Duration,
    poll_interval: Duration,
}

impl TaskWaiter {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    pub fn from_options(options: &RunOptions) -> Self {
        Self::new(options.task_timeout, options.poll_interval)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Consumes the handle: a task is awaited once.
    ///
    /// Transport errors while polling are logged and polling continues until
    /// the deadline. The request that produced the task is never re-issued.
    /// A poll still in flight at the deadline or on cancellation is dropped.
    pub async fn wait(
        &self,
        control_plane: &dyn ControlPlane,
        task: TaskHandle,
        resource: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let deadline = self.deadline();
        let mut polls: u32 = 0;

        loop {
            polls += 1;
            let polled = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(resource)),
                result = control_plane.get_task(&task) => result,
                _ = sleep_until(deadline) => return Err(self.timed_out(resource)),
            };
            match polled {
                Ok(TaskStatus::Success) => {
                    debug!(task = task.id(), operation = task.operation(), polls, "Task succeeded");
                    return Ok(());
                }
                Ok(TaskStatus::Error(failure)) => {
                    return Err(LaunchError::remote(
                        resource,
                        format!(
                            "{} failed: {} ({}, {})",
                            task.operation(),
                            failure.message,
                            failure.major_code,
                            failure.minor_code
                        ),
                    ));
                }
                Ok(TaskStatus::Aborted) => {
                    return Err(LaunchError::remote(
                        resource,
                        format!("{} was aborted", task.operation()),
                    ));
                }
                Ok(status) => {
                    trace!(task = task.id(), ?status, polls, "Task still running");
                }
                Err(err) if err.is_transient() => {
                    warn!(task = task.id(), error = %err, "Polling failed, will poll again");
                }
                Err(err) => return Err(client_error(err, resource)),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(self.timed_out(resource));
            }
            let pause = self.poll_interval.min(deadline - now);
            tokio::select! {
                _ = cancel.cancelled() => return Err(cancelled(resource)),
                _ = sleep(pause) => {}
            }
        }
    }

    /// Timeouts too large to represent end up thirty years out.
    fn deadline(&self) -> Instant {
        let now = Instant::now();
        now.checked_add(self.timeout).unwrap_or_else(|| now + FAR_FUTURE)
    }

    fn timed_out(&self, resource: &str) -> LaunchError {
        LaunchError::Timeout {
            resource: resource.to_string(),
            waited: self.timeout,
        }
    }
}

const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

fn cancelled(resource: &str) -> LaunchError {
    LaunchError::Cancelled {
        resource: resource.to_string(),
    }
}

/// How often a request that failed in transit is sent again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            retries: 0,
            backoff: Duration::ZERO,
        }
    }

    pub fn from_options(options: &RunOptions) -> Self {
        Self {
            retries: options.request_retries,
            backoff: options.retry_backoff,
        }
    }
}

/// Translates a client error into a launch error about `resource`.
pub fn client_error(err: ClientError, resource: &str) -> LaunchError {
    match err {
        ClientError::NotFound { kind, name } => {
            LaunchError::not_found(resource, format!("{kind} {name} does not exist"))
        }
        ClientError::Conflict(detail) => LaunchError::conflict(resource, detail),
        ClientError::Rejected {
            reason: RejectReason::InsufficientCapacity,
            message,
        } => LaunchError::Capacity {
            resource: resource.to_string(),
            detail: message,
        },
        ClientError::Rejected {
            reason: RejectReason::InvalidRequest,
            message,
        } => LaunchError::validation(resource, message),
        ClientError::Rejected {
            reason: RejectReason::Busy,
            message,
        } => LaunchError::remote(resource, message),
        ClientError::Transport(detail) => LaunchError::Transport {
            resource: resource.to_string(),
            detail,
        },
        ClientError::Unexpected(detail) => LaunchError::remote(resource, detail),
    }
}
