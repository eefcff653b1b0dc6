// ABOUTME: Tests for the scheduler polling waits on a paused clock.
// ABOUTME: Covers timeouts, cancellation and the read-error asymmetry between waits.

mod support;

use marathon_bluegreen::marathon::{HealthCheck, WaitError, Waiter};
use marathon_bluegreen::types::{AppId, DeploymentId};
use std::time::Duration;
use support::{FakeCluster, web_app};
use tokio::sync::watch;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn deployment_that_never_finishes_times_out() {
    let cluster = FakeCluster::new();
    cluster.set_deployment_active("d-1", true);

    let err = Waiter::new(&*cluster)
        .wait_for_deployment(&DeploymentId::new("d-1"), Duration::from_secs(1))
        .await
        .unwrap_err();

    assert!(err.is_timeout(), "expected timeout, got {err:?}");
    assert!(matches!(err, WaitError::Timeout(d) if d == Duration::from_secs(1)));
}

#[tokio::test(start_paused = true)]
async fn finished_deployment_returns_immediately() {
    let cluster = FakeCluster::new();
    let started = Instant::now();

    Waiter::new(&*cluster)
        .wait_for_deployment(&DeploymentId::new("d-1"), Duration::from_secs(30))
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn deployment_wait_polls_until_it_disappears() {
    let cluster = FakeCluster::new();
    cluster.set_deployment_active("d-1", true);

    let clear = {
        let cluster = cluster.clone();
        async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            cluster.set_deployment_active("d-1", false);
        }
    };
    let waiter = Waiter::new(&*cluster);
    let id = DeploymentId::new("d-1");
    let wait = waiter.wait_for_deployment(&id, Duration::from_secs(60));

    let (result, ()) = tokio::join!(wait, clear);
    result.unwrap();
}

#[tokio::test(start_paused = true)]
async fn application_wait_treats_read_errors_as_not_yet() {
    let cluster = FakeCluster::new();
    cluster.insert(web_app(1));
    cluster.fail_next_gets(3);

    Waiter::new(&*cluster)
        .wait_for_application(&AppId::new("/web"), Duration::from_secs(60))
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn healthy_wait_surfaces_read_errors() {
    let cluster = FakeCluster::new();
    cluster.insert(web_app(1));
    cluster.fail_next_gets(1);

    let err = Waiter::new(&*cluster)
        .wait_for_application_healthy(&AppId::new("/web"), Duration::from_secs(60))
        .await
        .unwrap_err();

    assert!(matches!(err, WaitError::Cluster(_)));
}

#[tokio::test(start_paused = true)]
async fn application_wait_checks_health_when_declared() {
    let cluster = FakeCluster::new();
    let mut app = web_app(2);
    app.health_checks.push(HealthCheck {
        grace_period_seconds: 30,
        ..Default::default()
    });
    cluster.insert(app);
    cluster.set_pending("/web", false, 1);

    let err = Waiter::new(&*cluster)
        .wait_for_application(&AppId::new("/web"), Duration::from_secs(5))
        .await
        .unwrap_err();

    assert!(err.is_timeout());
}

#[tokio::test(start_paused = true)]
async fn application_wait_skips_health_without_checks() {
    let cluster = FakeCluster::new();
    cluster.insert(web_app(2));
    cluster.set_pending("/web", false, 0);

    Waiter::new(&*cluster)
        .wait_for_application(&AppId::new("/web"), Duration::from_secs(5))
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn pending_application_times_out() {
    let cluster = FakeCluster::new();
    cluster.insert(web_app(1));
    cluster.set_pending("/web", true, 1);

    let err = Waiter::new(&*cluster)
        .wait_for_application(&AppId::new("/web"), Duration::from_secs(3))
        .await
        .unwrap_err();

    assert!(err.is_timeout());
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_a_wait() {
    let cluster = FakeCluster::new();
    cluster.set_deployment_active("d-1", true);
    let (tx, rx) = watch::channel(false);

    let cancel = async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        tx.send(true).unwrap();
    };
    let waiter = Waiter::new(&*cluster).with_shutdown(rx);
    let id = DeploymentId::new("d-1");
    let wait = waiter.wait_for_deployment(&id, Duration::from_secs(600));

    let (result, ()) = tokio::join!(wait, cancel);
    assert!(matches!(result, Err(WaitError::Cancelled)));
}
