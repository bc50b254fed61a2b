//! Channel operations and error surfaces against the in-process broker

use krolik::channel::Error as ChannelError;
use krolik::QueueDeclareOptions;
use krolik_types::FieldTable;

mod common;

#[tokio::test]
async fn channels_get_sequential_ids() {
    let mut connection = common::connect().await;
    let first = connection.open_channel().await.unwrap();
    let second = connection.open_channel().await.unwrap();
    assert_eq!(first.id(), 1);
    assert_eq!(second.id(), 2);
    connection.close().await.unwrap();
}

#[tokio::test]
async fn overlapping_calls_resolve_in_issue_order() {
    let mut connection = common::connect().await;
    let channel = connection.open_channel().await.unwrap();

    // both calls are in flight on the same channel; FIFO matching must give
    // each caller its own reply even though the replies are distinguishable
    // only by order
    let (alpha, beta) = tokio::join!(
        channel.queue_declare("alpha", QueueDeclareOptions::default()),
        channel.queue_declare("beta", QueueDeclareOptions::default()),
    );
    assert_eq!(alpha.unwrap().queue, "alpha");
    assert_eq!(beta.unwrap().queue, "beta");

    connection.close().await.unwrap();
}

#[tokio::test]
async fn broker_names_the_queue_when_asked() {
    let mut connection = common::connect().await;
    let channel = connection.open_channel().await.unwrap();

    let ok = channel
        .queue_declare("", QueueDeclareOptions::default())
        .await
        .unwrap();
    assert!(ok.queue.starts_with("amq.gen-"));

    connection.close().await.unwrap();
}

#[tokio::test]
async fn passive_declare_of_a_missing_queue_is_a_soft_error() {
    let mut connection = common::connect().await;
    let channel = connection.open_channel().await.unwrap();

    let options = QueueDeclareOptions {
        passive: true,
        ..Default::default()
    };
    match channel.queue_declare("nowhere", options).await {
        Err(ChannelError::ServerClosed { code, .. }) => assert_eq!(u16::from(code), 404),
        other => panic!("expected ServerClosed, got {other:?}"),
    }

    // the channel is gone with it
    match channel
        .queue_declare("after", QueueDeclareOptions::default())
        .await
    {
        Err(ChannelError::ChannelClosed) => {}
        other => panic!("expected ChannelClosed, got {other:?}"),
    }

    // but the connection survived a soft error
    let replacement = connection.open_channel().await.unwrap();
    replacement
        .queue_declare("after", QueueDeclareOptions::default())
        .await
        .unwrap();

    connection.close().await.unwrap();
}

#[tokio::test]
async fn transactions_enforce_select_ordering() {
    let mut connection = common::connect().await;
    let channel = connection.open_channel().await.unwrap();

    assert!(matches!(
        channel.tx_commit().await,
        Err(ChannelError::TxNotSelected)
    ));
    assert!(matches!(
        channel.tx_rollback().await,
        Err(ChannelError::TxNotSelected)
    ));

    channel.tx_select().await.unwrap();
    assert!(matches!(
        channel.tx_select().await,
        Err(ChannelError::TxAlreadySelected)
    ));

    channel.tx_commit().await.unwrap();
    channel.tx_rollback().await.unwrap();

    connection.close().await.unwrap();
}

#[tokio::test]
async fn flow_round_trips_the_brokers_answer() {
    let mut connection = common::connect().await;
    let channel = connection.open_channel().await.unwrap();

    assert!(!channel.flow(false).await.unwrap());
    assert!(channel.flow(true).await.unwrap());

    connection.close().await.unwrap();
}

#[tokio::test]
async fn queue_maintenance_calls() {
    let mut connection = common::connect().await;
    let channel = connection.open_channel().await.unwrap();

    channel
        .queue_declare("chores", QueueDeclareOptions::default())
        .await
        .unwrap();
    channel
        .queue_bind("chores", "amq.direct", "chores", FieldTable::new())
        .await
        .unwrap();
    channel.qos(0, 25, false).await.unwrap();
    assert_eq!(channel.queue_purge("chores").await.unwrap(), 0);
    assert_eq!(channel.queue_delete("chores", false, false).await.unwrap(), 0);

    connection.close().await.unwrap();
}

#[tokio::test]
async fn operations_after_close_fail_cleanly() {
    let mut connection = common::connect().await;
    let mut channel = connection.open_channel().await.unwrap();

    channel.close().await.unwrap();
    assert!(matches!(
        channel
            .queue_declare("late", QueueDeclareOptions::default())
            .await,
        Err(ChannelError::ChannelClosed)
    ));
    // closing again is a no-op
    channel.close().await.unwrap();

    connection.close().await.unwrap();
}

#[tokio::test]
async fn pending_calls_fail_when_the_connection_goes_away() {
    let mut connection = common::connect().await;
    let mut channel = connection.open_channel().await.unwrap();
    channel
        .queue_declare("q", QueueDeclareOptions::default())
        .await
        .unwrap();

    connection.close().await.unwrap();

    // the channel engine learned about the teardown; calls cannot hang
    let result = channel
        .queue_declare("again", QueueDeclareOptions::default())
        .await;
    assert!(matches!(
        result,
        Err(ChannelError::ChannelClosed | ChannelError::ConnectionClosed)
    ));
}
