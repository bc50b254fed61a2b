//! Connection lifecycle against the in-process broker

use std::time::Duration;

use krolik::{Connection, OpenError, SaslProfile};

mod common;
use common::{BrokerEvent, MockBroker};

#[tokio::test]
async fn open_and_close() {
    let (stream, _events) = MockBroker::default().spawn();
    let mut connection = Connection::builder()
        .open_with_stream(stream)
        .await
        .unwrap();
    assert!(!connection.is_closed());
    connection.close().await.unwrap();
}

#[tokio::test]
async fn close_twice_resolves_twice() {
    let mut connection = common::connect().await;
    connection.close().await.unwrap();
    // no second shutdown is started; the call simply resolves again
    connection.close().await.unwrap();
}

#[tokio::test]
async fn wrong_credentials_are_rejected() {
    let (stream, _events) = MockBroker {
        username: "svc".to_string(),
        password: "secret".to_string(),
        ..Default::default()
    }
    .spawn();

    let result = Connection::builder()
        .sasl_profile(SaslProfile::Plain {
            username: "guest".to_string(),
            password: "guest".to_string(),
        })
        .open_with_stream(stream)
        .await;

    match result {
        Err(OpenError::SaslRejected { code, text }) => {
            assert_eq!(u16::from(code), 403);
            assert!(text.starts_with("ACCESS_REFUSED"));
        }
        other => panic!("expected SaslRejected, got {other:?}"),
    }
}

#[tokio::test]
async fn unsupported_mechanism_is_refused_locally() {
    let (stream, _events) = MockBroker {
        mechanisms: "AMQPLAIN".to_string(),
        ..Default::default()
    }
    .spawn();

    let result = Connection::builder().open_with_stream(stream).await;
    match result {
        Err(OpenError::MechanismNotSupported(offered)) => {
            assert_eq!(offered, "AMQPLAIN");
        }
        other => panic!("expected MechanismNotSupported, got {other:?}"),
    }
}

#[tokio::test]
async fn header_rejection_surfaces_the_server_version() {
    let (stream, _events) = MockBroker {
        reject_header: Some(*b"AMQP\x00\x00\x08\x00"),
        ..Default::default()
    }
    .spawn();

    let result = Connection::builder().open_with_stream(stream).await;
    match result {
        Err(OpenError::ProtocolHeaderMismatch(header)) => {
            assert_eq!(&header, b"AMQP\x00\x00\x08\x00");
        }
        other => panic!("expected ProtocolHeaderMismatch, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn idle_connection_sends_heartbeats() {
    let (stream, mut events) = MockBroker {
        heartbeat: 1,
        ..Default::default()
    }
    .spawn();
    let mut connection = Connection::builder()
        .heartbeat(1)
        .open_with_stream(stream)
        .await
        .unwrap();

    // nothing else is written, so the next timer fire must produce one
    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("heartbeat within a few intervals")
        .expect("broker alive");
    assert_eq!(event, BrokerEvent::Heartbeat);

    connection.close().await.unwrap();
}
