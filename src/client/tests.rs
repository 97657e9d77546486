use bytes::Bytes;
use tokio::sync::mpsc;
use tungstenite::protocol::Message as WsMessage;

use super::Client;
use crate::session::PacketSink;
use crate::utils::DeliveryError;

#[test]
fn test_client_new() {
    let (tx, _) = mpsc::unbounded_channel::<WsMessage>();
    let client = Client::new(tx);
    assert!(!client.id.is_empty());
}

#[test]
fn test_send_queues_binary_frame() {
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
    let client = Client::new(tx);

    client.send(Bytes::from_static(b"frame")).unwrap();
    match rx.try_recv().unwrap() {
        WsMessage::Binary(data) => assert_eq!(data.as_ref(), b"frame"),
        other => panic!("Expected a binary message, got {other:?}"),
    }
}

#[test]
fn test_send_after_receiver_dropped_is_closed() {
    let (tx, rx) = mpsc::unbounded_channel::<WsMessage>();
    let client = Client::new(tx);
    assert!(!client.is_closed());

    drop(rx);
    assert!(client.is_closed());
    assert_eq!(client.send(Bytes::from_static(b"x")).unwrap_err(), DeliveryError::Closed);
}

#[test]
fn test_close_queues_close_frame() {
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
    let client = Client::new(tx);
    client.close();
    assert!(matches!(rx.try_recv().unwrap(), WsMessage::Close(None)));
}
