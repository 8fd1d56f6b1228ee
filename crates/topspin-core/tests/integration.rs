//! Integration tests for topspin-core.
//!
//! These run entirely against the mock transports, so they need no BLE or
//! WiFi hardware. Hardware-backed tests live in `hardware_tests.rs`.

use std::sync::Arc;
use std::time::Duration;

use topspin_core::{
    BleTransport, BulkCoordinator, BulkOptions, BulkPhase, ConnectionState, DeviceEvent, Error,
    EventDispatcher, MockBle, MockWifi, ScanOptions, Session,
};

fn bulk_options() -> BulkOptions {
    // Unroutable local port so the fetch step fails fast offline
    BulkOptions::new()
        .base_url("http://127.0.0.1:1")
        .settle_delay(Duration::from_millis(10))
}

#[tokio::test]
async fn full_session_lifecycle_with_spontaneous_drop() {
    let ble = Arc::new(MockBle::new());
    let session = Session::new(Arc::clone(&ble));

    // Idle -> scan finds the tracker -> back to Idle
    let devices = session.scan(ScanOptions::default()).await.unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(session.state(), ConnectionState::Idle);

    // connect -> subscribe -> Streaming
    session.connect(&devices[0].id).await.unwrap();
    session.start_streaming().await.unwrap();
    assert_eq!(session.state(), ConnectionState::Streaming);

    // three notifications arrive in order
    for count in [10u32, 20, 30] {
        ble.push_notification(&count.to_le_bytes());
    }
    assert_eq!(session.samples().snapshot(), vec![10, 20, 30]);

    // spontaneous drop forces Disconnected, samples preserved
    ble.inject_disconnect();
    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert_eq!(session.samples().snapshot(), vec![10, 20, 30]);

    // a late notification from the dead link is discarded
    ble.push_notification(&40u32.to_le_bytes());
    assert_eq!(session.samples().snapshot(), vec![10, 20, 30]);

    // the drop handler clears the transport link in the background
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!ble.is_connected().await);

    // a new connection clears the old session's samples
    session.connect(&devices[0].id).await.unwrap();
    assert!(session.samples().is_empty());
}

#[tokio::test]
async fn malformed_notification_is_dropped_without_breaking_stream() {
    let ble = Arc::new(MockBle::new());
    let session = Session::new(Arc::clone(&ble));

    session.connect("AA:BB").await.unwrap();
    session.start_streaming().await.unwrap();

    ble.push_notification(&42u32.to_le_bytes());
    ble.push_notification(&[0xDE, 0xAD]); // wrong length, dropped
    ble.push_notification(&43u32.to_le_bytes());

    assert_eq!(session.samples().snapshot(), vec![42, 43]);
    assert_eq!(session.samples().dropped_count(), 1);
    assert_eq!(session.state(), ConnectionState::Streaming);
}

#[tokio::test]
async fn disconnect_twice_reaches_same_terminal_state() {
    let ble = Arc::new(MockBle::new());
    let session = Session::new(ble);

    session.connect("AA:BB").await.unwrap();

    session.disconnect().await.unwrap();
    assert_eq!(session.state(), ConnectionState::Disconnected);

    session.disconnect().await.unwrap();
    assert_eq!(session.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn write_while_idle_fails_with_not_connected() {
    let ble = MockBle::new();
    let err = ble.write_command(&[0u8; 20]).await.unwrap_err();
    assert!(matches!(err, Error::NotConnected));
}

#[tokio::test]
async fn bulk_transfer_rejects_second_attempt_while_in_flight() {
    let wifi = Arc::new(MockWifi::new());
    let coordinator = Arc::new(BulkCoordinator::new(
        wifi,
        bulk_options().settle_delay(Duration::from_millis(250)),
        EventDispatcher::default(),
    ));

    let first = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.run().await })
    };

    // Let the first transfer reach its settle window
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(coordinator.is_in_flight());
    let err = coordinator.run().await.unwrap_err();
    assert!(matches!(err, Error::Busy(_)));

    // After the first attempt terminates, a new one is accepted
    let _ = first.await.unwrap();
    assert!(!coordinator.is_in_flight());
    let second = coordinator.run().await;
    assert!(!matches!(second, Err(Error::Busy(_))));
}

#[tokio::test]
async fn bulk_transfer_permission_denied_terminates_coordinator() {
    let wifi = Arc::new(MockWifi::new().deny_permission());
    let events = EventDispatcher::default();
    let coordinator = BulkCoordinator::new(wifi, bulk_options(), events.clone());
    let mut rx = events.subscribe();

    let err = coordinator.run().await.unwrap_err();
    assert!(matches!(err, Error::PermissionDenied(_)));
    assert!(matches!(coordinator.phase(), BulkPhase::Failed { .. }));

    let mut phases = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let DeviceEvent::BulkPhaseChanged { phase } = event {
            phases.push(phase);
        }
    }
    assert_eq!(phases.first(), Some(&BulkPhase::AwaitingNetwork));
    assert!(matches!(phases.last(), Some(BulkPhase::Failed { .. })));
}

#[tokio::test]
async fn bulk_transfer_does_not_auto_retry_failed_join() {
    let wifi = Arc::new(MockWifi::new().fail_joins());
    let coordinator = BulkCoordinator::new(
        Arc::clone(&wifi),
        bulk_options(),
        EventDispatcher::default(),
    );

    assert!(coordinator.run().await.is_err());
    assert_eq!(wifi.join_count(), 1);
}

#[tokio::test]
async fn concurrent_transitions_are_rejected_not_queued() {
    let ble = Arc::new(MockBle::new().connect_latency(Duration::from_millis(200)));
    let session = Arc::new(Session::new(ble));

    let slow = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.connect("AA:BB").await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(session.state(), ConnectionState::Connecting);

    let err = session.connect("CC:DD").await.unwrap_err();
    assert!(matches!(err, Error::Busy(_)));

    slow.await.unwrap().unwrap();
    assert_eq!(session.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn events_arrive_in_transition_order() {
    let ble = Arc::new(MockBle::new());
    let session = Session::new(Arc::clone(&ble));
    let mut rx = session.subscribe_events();

    session.connect("AA:BB").await.unwrap();
    session.start_streaming().await.unwrap();
    ble.push_notification(&7u32.to_le_bytes());
    session.disconnect().await.unwrap();

    let mut names = Vec::new();
    while let Ok(event) = rx.try_recv() {
        names.push(match event {
            DeviceEvent::StateChanged { to, .. } => format!("state:{}", to.name()),
            DeviceEvent::Sample { count, .. } => format!("sample:{}", count),
            DeviceEvent::Disconnected { .. } => "disconnected".to_string(),
            other => format!("{:?}", other),
        });
    }
    assert_eq!(
        names,
        vec![
            "state:connecting",
            "state:connected",
            "state:streaming",
            "sample:7",
            "state:disconnected",
            "disconnected",
        ]
    );
}
