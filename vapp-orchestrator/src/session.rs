//! One orchestration run's view of the control plane.

use std::future::Future;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use vapp_config::RunOptions;
use vapp_core::error::{LaunchError, Result};
use vapp_provider::{Accepted, ClientResult, ControlPlane, TaskHandle};

use crate::journal::{Journal, OperationType};
use crate::task::{client_error, RetryPolicy, TaskWaiter};

/// A resource whose creation request was accepted. The resource exists on
/// the control plane whatever `outcome` says and must be cleaned up if the
/// run fails.
#[derive(Debug)]
pub struct Created<T> {
    pub resource: T,
    pub outcome: Result<()>,
}

/// Everything a run needs to talk to the control plane: the client, the
/// waiter and retry settings, the run's cancellation token and its journal.
pub struct Session<'a> {
    control_plane: &'a dyn ControlPlane,
    waiter: TaskWaiter,
    retry: RetryPolicy,
    cancel: CancellationToken,
    journal: Journal,
}

impl<'a> Session<'a> {
    pub fn new(
        control_plane: &'a dyn ControlPlane,
        options: &RunOptions,
        cancel: CancellationToken,
        journal: Journal,
    ) -> Self {
        Self {
            control_plane,
            waiter: TaskWaiter::from_options(options),
            retry: RetryPolicy::from_options(options),
            cancel,
            journal,
        }
    }

    pub fn control_plane(&self) -> &'a dyn ControlPlane {
        self.control_plane
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    fn check_cancelled(&self, resource: &str) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(LaunchError::Cancelled {
                resource: resource.to_string(),
            });
        }
        Ok(())
    }

    /// Sends a request, resending it only after transport errors.
    ///
    /// Any other error is an answer from the control plane and is returned
    /// at once.
    pub async fn request<T, F, Fut>(&self, resource: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ClientResult<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            self.check_cancelled(resource)?;
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.retry.retries => {
                    attempt += 1;
                    warn!(
                        resource,
                        attempt,
                        max = self.retry.retries,
                        error = %err,
                        "Request failed in transit, retrying"
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => {
                            return Err(LaunchError::Cancelled { resource: resource.to_string() });
                        }
                        _ = sleep(self.retry.backoff) => {}
                    }
                }
                Err(err) => return Err(client_error(err, resource)),
            }
        }
    }

    pub async fn wait(&self, task: TaskHandle, resource: &str) -> Result<()> {
        self.waiter
            .wait(self.control_plane, task, resource, &self.cancel)
            .await
    }

    /// Requests a mutation and waits for its task, journaling the step.
    pub async fn execute<F, Fut>(
        &self,
        operation: OperationType,
        resource: &str,
        call: F,
    ) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ClientResult<TaskHandle>>,
    {
        let entry = self.journal.start(operation, resource);
        let result = match self.request(resource, call).await {
            Ok(task) => {
                self.journal.running(entry);
                self.wait(task, resource).await
            }
            Err(err) => Err(err),
        };
        self.journal.finish(entry, &result);
        result
    }

    /// Like [`Session::execute`] for requests that create a resource.
    ///
    /// The outer error means nothing was created.
    pub async fn create<T, F, Fut>(
        &self,
        operation: OperationType,
        resource: &str,
        call: F,
    ) -> Result<Created<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ClientResult<Accepted<T>>>,
    {
        let entry = self.journal.start(operation, resource);
        let accepted = match self.request(resource, call).await {
            Ok(accepted) => accepted,
            Err(err) => {
                self.journal.finish(entry, &Err::<(), _>(&err));
                return Err(err);
            }
        };
        self.journal.running(entry);
        let outcome = self.wait(accepted.task, resource).await;
        self.journal.finish(entry, &outcome);
        Ok(Created {
            resource: accepted.resource,
            outcome,
        })
    }
}
