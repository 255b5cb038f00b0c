//! Operation engine and poller behavior against a scripted gate.

mod common;

use common::{closed, no_faults, open, opening, stopped};
use gatelink_core::Error;
use gatelink_service::{GateService, Operation, ServiceConfig, mock::MockGate};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc::error::TryRecvError;
use tokio_util::sync::CancellationToken;

fn service(gate: &Arc<MockGate>) -> GateService<MockGate> {
    GateService::new(gate.clone(), ServiceConfig::default())
}

#[tokio::test(start_paused = true)]
async fn test_push_button_open_completes_on_third_poll() {
    let gate = Arc::new(MockGate::new());
    for status in [closed(), opening(), open()] {
        gate.push_status(status).await;
    }
    let service = service(&gate);

    service
        .run_operation(Operation::PushButtonOpen, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(gate.status_calls(), 3);
    assert_eq!(gate.control_calls(), 1);
    let requests = gate.control_requests().await;
    assert!(requests[0].push_button_open);
    assert!(!requests[0].push_button_close);

    let stats = service.stats();
    assert_eq!(stats.operations, 1);
    assert_eq!(stats.operations_failed, 0);
    assert_eq!(stats.gate_up, 1);
    assert_eq!(stats.transactions, 4);
}

#[tokio::test(start_paused = true)]
async fn test_stopped_gate_faults_open() {
    let gate = Arc::new(MockGate::new());
    gate.push_status(opening()).await;
    gate.push_status(stopped()).await;
    let service = service(&gate);

    let result = service
        .run_operation(Operation::PushButtonOpen, &CancellationToken::new())
        .await;

    match result {
        Err(Error::OperationFault { operation, status }) => {
            assert_eq!(operation, "PushButtonOpen");
            assert_eq!(status, "STOPPED");
        }
        other => panic!("expected OperationFault, got {other:?}"),
    }
    assert_eq!(gate.status_calls(), 2);
    assert_eq!(service.stats().operations_failed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_completes_when_stopped() {
    let gate = Arc::new(MockGate::new());
    gate.push_status(stopped()).await;
    let service = service(&gate);

    service
        .run_operation(Operation::PushButtonStop, &CancellationToken::new())
        .await
        .unwrap();
    assert!(gate.control_requests().await[0].push_button_stop);
}

#[tokio::test(start_paused = true)]
async fn test_gate_up_down_counters() {
    let gate = Arc::new(MockGate::new());
    gate.push_status(closed()).await;
    gate.push_status(stopped()).await;
    gate.push_status(open()).await;
    let service = service(&gate);
    let cancel = CancellationToken::new();

    service.run_operation(Operation::PushButtonClose, &cancel).await.unwrap();
    service.run_operation(Operation::PushButtonStop, &cancel).await.unwrap();
    service.run_operation(Operation::EmergencyOpen, &cancel).await.unwrap();

    let stats = service.stats();
    assert_eq!(stats.operations, 3);
    assert_eq!(stats.gate_up, 0);
    assert_eq!(stats.gate_down, 1);
}

#[tokio::test]
async fn test_control_failure_ends_operation() {
    let gate = Arc::new(MockGate::new());
    gate.fail_next_control(Error::WriteTimeout { timeout_ms: 500 }).await;
    let service = service(&gate);

    let result = service
        .run_operation(Operation::PushButtonClose, &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(Error::WriteTimeout { .. })));
    assert_eq!(gate.status_calls(), 0);
}

#[tokio::test]
async fn test_status_failure_ends_operation() {
    let gate = Arc::new(MockGate::new());
    gate.push_status_error(Error::LinkClosed).await;
    let service = service(&gate);

    let result = service
        .run_operation(Operation::EmergencyOpen, &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(Error::LinkClosed)));
    assert_eq!(gate.status_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_operation_times_out() {
    let gate = Arc::new(MockGate::new());
    gate.push_status(opening()).await;
    let service = service(&gate);

    let result = service
        .run_operation(Operation::PushButtonOpen, &CancellationToken::new())
        .await;

    assert!(matches!(
        result,
        Err(Error::OperationTimeout {
            timeout_ms: 10_000,
            ..
        })
    ));
    assert!(gate.status_calls() > 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_stops_polling() {
    let gate = Arc::new(MockGate::new());
    gate.push_status(opening()).await;
    let service = service(&gate);
    let cancel = CancellationToken::new();

    let (result, ()) = tokio::join!(
        service.run_operation(Operation::PushButtonOpen, &cancel),
        async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        }
    );
    assert!(matches!(result, Err(Error::Cancelled)));

    let polls = gate.status_calls();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(gate.status_calls(), polls);
}

#[tokio::test]
async fn test_cancelled_token_skips_device() {
    let gate = Arc::new(MockGate::new());
    let service = service(&gate);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = service.run_operation(Operation::OpenPartial, &cancel).await;

    assert!(matches!(result, Err(Error::Cancelled)));
    assert_eq!(gate.control_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_poller_publishes_only_changes() {
    let gate = Arc::new(MockGate::new());
    for status in [closed(), closed(), open()] {
        gate.push_status(status).await;
    }
    gate.push_fault(no_faults()).await;
    let service = service(&gate);

    let mut sub = service.subscribe().await;
    service.start().await.unwrap();

    assert_eq!(sub.statuses.recv().await.unwrap(), closed());
    assert_eq!(sub.statuses.recv().await.unwrap(), open());
    assert!(gate.status_calls() >= 3);

    assert_eq!(sub.faults.recv().await.unwrap(), no_faults());
    assert!(matches!(sub.faults.try_recv(), Err(TryRecvError::Empty)));

    service.shutdown().await;
    let last = service.publisher().last_status().await.unwrap();
    assert_eq!(last.value, open());
    assert!(matches!(sub.statuses.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test(start_paused = true)]
async fn test_poller_publishes_errors_and_continues() {
    let gate = Arc::new(MockGate::new());
    gate.push_status_error(Error::ResponseTimeout { timeout_ms: 500 }).await;
    gate.push_status(closed()).await;
    gate.push_fault(no_faults()).await;
    let service = service(&gate);

    let mut sub = service.subscribe().await;
    service.start().await.unwrap();

    let error = sub.errors.recv().await.unwrap();
    assert!(matches!(*error, Error::ResponseTimeout { .. }));
    assert_eq!(sub.statuses.recv().await.unwrap(), closed());
    assert_eq!(sub.faults.recv().await.unwrap(), no_faults());

    service.shutdown().await;
    let stats = service.stats();
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.faults_observed, 0);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_is_idempotent() {
    let gate = Arc::new(MockGate::new());
    gate.push_status(closed()).await;
    gate.push_fault(no_faults()).await;
    let service = service(&gate);

    service.start().await.unwrap();
    service.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    service.shutdown().await;
    service.shutdown().await;

    assert!(!service.is_running());
    assert!(matches!(service.start().await, Err(Error::NotRunning)));
    assert!(matches!(
        service
            .run_operation(Operation::PushButtonOpen, &CancellationToken::new())
            .await,
        Err(Error::NotRunning)
    ));

    let polls = gate.status_calls();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(gate.status_calls(), polls);
}

#[tokio::test]
async fn test_passthrough_requests() {
    let gate = Arc::new(MockGate::with_version("2.4"));
    let service = service(&gate);

    assert_eq!(service.version().await.unwrap().version, "2.4");
    service.reset().await.unwrap();
    assert_eq!(gate.reset_calls(), 1);
    assert_eq!(service.stats().transactions, 2);
}
