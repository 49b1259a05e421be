//! Waiting, timeouts, cancellation and request retries. Run on a paused
//! clock so long timeouts cost nothing.

mod common;

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use vapp_core::error::LaunchError;
use vapp_core::ErrorKind;
use vapp_orchestrator::{LaunchState, TaskWaiter};
use vapp_provider::simulator::{Fault, Operation};
use vapp_provider::{ControlPlane, InstantiateVappRequest};

use common::*;

fn request(name: &str) -> InstantiateVappRequest {
    InstantiateVappRequest {
        vdc_name: VDC.into(),
        name: name.into(),
        catalog: "test-catalog".into(),
        template: "ubuntu-precise".into(),
        networks: vec!["network-1".into()],
    }
}

#[tokio::test(start_paused = true)]
async fn waiter_times_out_on_a_task_that_never_finishes() {
    let cp = control_plane();
    cp.inject(Fault::hang(Operation::InstantiateVapp));
    let accepted = cp.instantiate_vapp(&request("stuck")).await.unwrap();

    let waiter = TaskWaiter::new(Duration::from_secs(10), Duration::from_secs(1));
    let started = Instant::now();
    let err = waiter
        .wait(&cp, accepted.task, "stuck", &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    match err {
        LaunchError::Timeout { resource, waited } => {
            assert_eq!(resource, "stuck");
            assert_eq!(waited, Duration::from_secs(10));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(started.elapsed(), Duration::from_secs(10));
    assert_eq!(cp.calls(Operation::GetTask), 11);
    assert_eq!(cp.calls(Operation::InstantiateVapp), 1);
}

#[tokio::test(start_paused = true)]
async fn waiter_keeps_polling_through_transport_errors() {
    let cp = control_plane().with_task_latency(2);
    cp.inject(Fault::transport(Operation::GetTask).times(3));
    let accepted = cp.instantiate_vapp(&request("flaky")).await.unwrap();

    let waiter = TaskWaiter::new(Duration::from_secs(60), Duration::from_secs(2));
    waiter
        .wait(&cp, accepted.task, "flaky", &CancellationToken::new())
        .await
        .expect("task completes despite flaky polls");

    assert_eq!(cp.calls(Operation::GetTask), 5);
    assert_eq!(cp.calls(Operation::InstantiateVapp), 1);
}

#[tokio::test(start_paused = true)]
async fn aborted_task_is_a_remote_failure() {
    let cp = control_plane();
    cp.inject(Fault::abort(Operation::InstantiateVapp));
    let accepted = cp.instantiate_vapp(&request("aborted")).await.unwrap();

    let err = TaskWaiter::new(Duration::from_secs(10), Duration::from_secs(1))
        .wait(&cp, accepted.task, "aborted", &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RemoteFailure);
    assert!(err.to_string().contains("aborted"));
}

#[tokio::test(start_paused = true)]
async fn waiter_gives_up_on_a_poll_that_never_answers() {
    let cp = control_plane();
    let accepted = cp.instantiate_vapp(&request("silent")).await.unwrap();
    cp.inject(Fault::stalled_poll());

    let started = Instant::now();
    let err = TaskWaiter::new(Duration::from_secs(5), Duration::from_secs(1))
        .wait(&cp, accepted.task, "silent", &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(started.elapsed(), Duration::from_secs(5));
    assert_eq!(cp.calls(Operation::GetTask), 1);
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_a_poll_that_never_answers() {
    let cp = control_plane();
    let accepted = cp.instantiate_vapp(&request("interrupted")).await.unwrap();
    cp.inject(Fault::stalled_poll());
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = TaskWaiter::new(Duration::from_secs(3600), Duration::from_secs(1))
        .wait(&cp, accepted.task, "interrupted", &cancel)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(started.elapsed(), Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn huge_timeouts_still_wait_normally() {
    let cp = control_plane().with_task_latency(3);
    let accepted = cp.instantiate_vapp(&request("patient")).await.unwrap();

    TaskWaiter::new(Duration::from_secs(u64::MAX), Duration::from_secs(1))
        .wait(&cp, accepted.task, "patient", &CancellationToken::new())
        .await
        .expect("task completes");
    assert_eq!(cp.calls(Operation::GetTask), 3);
}

#[tokio::test(start_paused = true)]
async fn hung_step_times_out_without_reissuing_the_request() {
    let cp = control_plane();
    cp.inject(Fault::hang(Operation::SetStorageProfile));
    let options = fast_options()
        .with_task_timeout(Duration::from_secs(120))
        .with_poll_interval(Duration::from_secs(5));

    let failure = launcher(&cp, options)
        .run(&full_spec("hung"), CancellationToken::new())
        .await
        .expect_err("storage profile never finishes");

    assert_eq!(failure.kind(), ErrorKind::Timeout);
    assert_eq!(failure.failed_in, LaunchState::VmsProvisioning);
    assert_eq!(cp.calls(Operation::SetStorageProfile), 1);
    assert!(failure.cleanup.is_none());
    assert!(cp.vapp(VDC, "hung").is_none());
}

#[tokio::test(start_paused = true)]
async fn cancellation_at_a_poll_boundary_cleans_up() {
    let cp = control_plane();
    cp.inject(Fault::hang(Operation::SetStorageProfile));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        trigger.cancel();
    });

    let options = fast_options().with_task_timeout(Duration::from_secs(3600));
    let failure = launcher(&cp, options)
        .run(&full_spec("cancelled"), cancel)
        .await
        .expect_err("run is cancelled");

    assert_eq!(failure.kind(), ErrorKind::Cancelled);
    assert!(failure.cleanup.is_none());
    assert!(cp.vapp(VDC, "cancelled").is_none());
}

#[tokio::test(start_paused = true)]
async fn cancelled_before_start_creates_nothing() {
    let cp = control_plane();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let failure = launcher(&cp, fast_options())
        .run(&minimal_spec("never"), cancel)
        .await
        .expect_err("already cancelled");

    assert_eq!(failure.kind(), ErrorKind::Cancelled);
    assert_eq!(failure.failed_in, LaunchState::Pending);
    assert_eq!(cp.calls(Operation::InstantiateVapp), 0);
}

#[tokio::test(start_paused = true)]
async fn transient_request_errors_are_retried() {
    let cp = control_plane();
    cp.inject(Fault::transport(Operation::CreateVm).times(2));
    let options = fast_options().with_request_retries(3, Duration::from_secs(1));

    let outcome = launcher(&cp, options)
        .run(&minimal_spec("retried"), CancellationToken::new())
        .await
        .expect("retries succeed");

    assert_eq!(outcome.vms.len(), 1);
    assert_eq!(cp.calls(Operation::CreateVm), 3);
    assert_eq!(cp.vapp(VDC, "retried").unwrap().children.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn retries_give_up_after_the_limit() {
    let cp = control_plane();
    cp.inject(Fault::transport(Operation::InstantiateVapp).times(10));
    let options = fast_options().with_request_retries(2, Duration::from_secs(1));

    let failure = launcher(&cp, options)
        .run(&minimal_spec("offline"), CancellationToken::new())
        .await
        .expect_err("control plane unreachable");

    assert_eq!(failure.kind(), ErrorKind::Transport);
    assert_eq!(cp.calls(Operation::InstantiateVapp), 3);
    assert_eq!(cp.vapp_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn rejections_are_never_retried() {
    let cp = control_plane();
    cp.inject(Fault::reject(
        Operation::CreateVm,
        vapp_provider::RejectReason::InvalidRequest,
        "bad template",
    ));

    let failure = launcher(&cp, fast_options())
        .run(&minimal_spec("rejected"), CancellationToken::new())
        .await
        .expect_err("request rejected");

    assert_eq!(failure.kind(), ErrorKind::Validation);
    assert_eq!(cp.calls(Operation::CreateVm), 1);
    assert!(cp.vapp(VDC, "rejected").is_none());
}
