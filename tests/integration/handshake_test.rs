// tests/integration/handshake_test.rs

//! Integration tests for the connection handshake
//! Tests: message order, credentials, heartbeat negotiation, failures, timeout

use super::test_helpers::{
    Exchange, FakeBroker, Fault, Observed, RecordingObserver, default_start, default_tune,
    guest_options,
};
use bytes::Bytes;
use spinelmq::core::protocol::{ConnectionOpen, FieldValue, TuneParams};
use spinelmq::{Connection, ConnectionOptions, ConnectionState, SessionError, open_connection};
use std::time::Duration;

#[tokio::test]
async fn test_handshake_exchanges_in_order() {
    let broker = FakeBroker::new();
    let conn = open_connection(broker.clone(), broker.clone(), guest_options())
        .await
        .unwrap();

    assert_eq!(conn.state(), ConnectionState::Open);

    let journal = broker.journal();
    assert_eq!(journal.len(), 7);
    assert_eq!(journal[0], Exchange::TransportStart);
    assert_eq!(journal[1], Exchange::ReceiveStart);
    assert!(matches!(journal[2], Exchange::SendStartOk(_)));
    assert_eq!(journal[3], Exchange::ReceiveTune);
    assert_eq!(journal[4], Exchange::SendTuneOk(default_tune()));
    assert_eq!(journal[5], Exchange::TuneHeartbeat(60));
    assert_eq!(
        journal[6],
        Exchange::SendOpen(ConnectionOpen {
            virtual_host: "/".to_string()
        })
    );
}

#[tokio::test]
async fn test_start_ok_carries_plain_credentials() {
    let broker = FakeBroker::new();
    let _conn = open_connection(broker.clone(), broker.clone(), guest_options())
        .await
        .unwrap();

    let start_ok = broker
        .journal()
        .into_iter()
        .find_map(|e| match e {
            Exchange::SendStartOk(args) => Some(args),
            _ => None,
        })
        .expect("start-ok was not sent");

    assert_eq!(start_ok.response, Bytes::from_static(b"\0guest\0guest"));
    assert_eq!(start_ok.mechanism, "PLAIN");
    assert_eq!(start_ok.locale, "en_US");
    assert_eq!(
        start_ok.client_properties.get("product"),
        Some(&FieldValue::LongString("spinelmq".to_string()))
    );
    match start_ok.client_properties.get("capabilities") {
        Some(FieldValue::Table(caps)) => assert_eq!(
            caps.get("authentication_failure_close"),
            Some(&FieldValue::Bool(true))
        ),
        other => panic!("Expected a capabilities table, got {other:?}"),
    }
}

#[tokio::test]
async fn test_client_properties_include_connection_name() {
    let broker = FakeBroker::new();
    let mut options = guest_options().with_connection_name("orders-worker");
    options
        .client_properties
        .insert("team".to_string(), "payments".to_string());
    let _conn = open_connection(broker.clone(), broker.clone(), options)
        .await
        .unwrap();

    let props = broker
        .journal()
        .into_iter()
        .find_map(|e| match e {
            Exchange::SendStartOk(args) => Some(args.client_properties),
            _ => None,
        })
        .unwrap();
    assert_eq!(
        props.get("connection_name"),
        Some(&FieldValue::LongString("orders-worker".to_string()))
    );
    assert_eq!(
        props.get("team"),
        Some(&FieldValue::LongString("payments".to_string()))
    );
}

#[tokio::test]
async fn test_server_heartbeat_used_without_override() {
    let broker = FakeBroker::with_tune(TuneParams {
        channel_max: 100,
        frame_max: 4096,
        heartbeat: 15,
    });
    let conn = open_connection(broker.clone(), broker.clone(), guest_options())
        .await
        .unwrap();

    assert_eq!(conn.limits().heartbeat, 15);
    assert_eq!(conn.limits().channel_max, 100);
    assert_eq!(conn.limits().frame_max, 4096);
    assert_eq!(broker.count(|e| *e == Exchange::TuneHeartbeat(15)), 1);
}

#[tokio::test]
async fn test_heartbeat_override_wins() {
    let broker = FakeBroker::new();
    let conn = open_connection(
        broker.clone(),
        broker.clone(),
        guest_options().with_heartbeat(5),
    )
    .await
    .unwrap();

    let expected = TuneParams {
        heartbeat: 5,
        ..default_tune()
    };
    assert_eq!(conn.limits(), expected);
    assert_eq!(broker.count(|e| *e == Exchange::SendTuneOk(expected)), 1);
    assert_eq!(broker.count(|e| *e == Exchange::TuneHeartbeat(5)), 1);
}

#[tokio::test]
async fn test_heartbeat_override_zero_disables() {
    let broker = FakeBroker::new();
    let conn = open_connection(
        broker.clone(),
        broker.clone(),
        guest_options().with_heartbeat(0),
    )
    .await
    .unwrap();
    assert_eq!(conn.limits().heartbeat, 0);
    assert_eq!(broker.count(|e| *e == Exchange::TuneHeartbeat(0)), 1);
}

#[tokio::test]
async fn test_virtual_host_sent_in_open() {
    let broker = FakeBroker::new();
    let _conn = open_connection(
        broker.clone(),
        broker.clone(),
        guest_options().with_virtual_host("billing"),
    )
    .await
    .unwrap();
    let open = Exchange::SendOpen(ConnectionOpen {
        virtual_host: "billing".to_string(),
    });
    assert_eq!(broker.count(|e| *e == open), 1);
}

#[tokio::test]
async fn test_transport_start_failure_is_handshake_failure() {
    let broker = FakeBroker::with_fault(Fault::FailAt("transport.start"));
    let observer = RecordingObserver::new();
    let err = Connection::builder(guest_options())
        .observer(observer.clone())
        .open(broker.clone(), broker.clone())
        .await
        .unwrap_err();

    match &err {
        SessionError::HandshakeFailure { step, .. } => assert_eq!(*step, "transport.start"),
        other => panic!("Expected HandshakeFailure, got {other:?}"),
    }
    assert_eq!(observer.events(), vec![Observed::HandshakeFailed(err)]);
    assert!(!broker.journal().contains(&Exchange::ReceiveStart));
}

#[tokio::test]
async fn test_failure_at_each_step_stops_the_handshake() {
    let steps = [
        "connection.start",
        "connection.start-ok",
        "connection.tune",
        "connection.tune-ok",
        "connection.open",
    ];
    for step in steps {
        let broker = FakeBroker::with_fault(Fault::FailAt(step));
        let err = open_connection(broker.clone(), broker.clone(), guest_options())
            .await
            .unwrap_err();
        match err {
            SessionError::HandshakeFailure { step: failed, .. } => assert_eq!(failed, step),
            other => panic!("Expected HandshakeFailure at {step}, got {other:?}"),
        }
        // The transport is released after a failed handshake.
        assert_eq!(broker.transport_closes(), 1);
    }
}

#[tokio::test]
async fn test_open_failure_after_tuning() {
    let broker = FakeBroker::with_fault(Fault::FailAt("connection.open"));
    let _ = open_connection(broker.clone(), broker.clone(), guest_options()).await;
    let journal = broker.journal();
    assert!(journal.contains(&Exchange::SendTuneOk(default_tune())));
    assert!(journal.contains(&Exchange::TuneHeartbeat(60)));
    assert!(!journal.iter().any(|e| matches!(e, Exchange::SendOpen(_))));
}

#[tokio::test]
async fn test_missing_plain_mechanism_fails() {
    let mut start = default_start();
    start.mechanisms = "AMQPLAIN EXTERNAL".to_string();
    let broker = FakeBroker::scripted(start, default_tune(), Fault::None);
    let err = open_connection(broker.clone(), broker.clone(), guest_options())
        .await
        .unwrap_err();
    match err {
        SessionError::HandshakeFailure { step, reason } => {
            assert_eq!(step, "connection.start");
            assert!(reason.contains("PLAIN"));
        }
        other => panic!("Expected HandshakeFailure, got {other:?}"),
    }
    assert!(
        !broker
            .journal()
            .iter()
            .any(|e| matches!(e, Exchange::SendStartOk(_)))
    );
}

#[tokio::test]
async fn test_unsupported_locale_falls_back_to_server_offer() {
    let mut start = default_start();
    start.locales = "de_DE fr_FR".to_string();
    let broker = FakeBroker::scripted(start, default_tune(), Fault::None);
    let conn = open_connection(broker.clone(), broker.clone(), guest_options())
        .await
        .unwrap();

    assert!(conn.is_open());
    let locale = broker
        .journal()
        .into_iter()
        .find_map(|e| match e {
            Exchange::SendStartOk(args) => Some(args.locale),
            _ => None,
        })
        .unwrap();
    assert_eq!(locale, "de_DE");
}

#[tokio::test]
async fn test_empty_locale_offer_keeps_configured() {
    let mut start = default_start();
    start.locales = String::new();
    let broker = FakeBroker::scripted(start, default_tune(), Fault::None);
    let _conn = open_connection(broker.clone(), broker.clone(), guest_options())
        .await
        .unwrap();

    assert_eq!(
        broker.count(|e| matches!(e, Exchange::SendStartOk(args) if args.locale == "en_US")),
        1
    );
}

#[tokio::test]
async fn test_handshake_timeout() {
    let broker = FakeBroker::with_fault(Fault::HangAt("connection.tune"));
    let options = guest_options().with_handshake_timeout(Duration::from_millis(50));
    let err = open_connection(broker.clone(), broker.clone(), options)
        .await
        .unwrap_err();
    assert_eq!(err, SessionError::HandshakeTimeout(Duration::from_millis(50)));
    assert_eq!(broker.transport_closes(), 1);
}

#[tokio::test]
async fn test_invalid_options_rejected_before_transport_start() {
    let broker = FakeBroker::new();
    let options = ConnectionOptions {
        username: String::new(),
        ..guest_options()
    };
    let err = open_connection(broker.clone(), broker.clone(), options)
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::InvalidConfig(_)));
    assert!(broker.journal().is_empty());
}

#[tokio::test]
async fn test_observer_sees_open() {
    let broker = FakeBroker::new();
    let observer = RecordingObserver::new();
    let _conn = Connection::builder(guest_options())
        .observer(observer.clone())
        .open(broker.clone(), broker.clone())
        .await
        .unwrap();
    assert_eq!(observer.events(), vec![Observed::Opened(default_tune())]);
}
