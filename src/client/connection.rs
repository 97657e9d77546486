use bytes::Bytes;
use tokio::sync::mpsc::UnboundedSender;
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

use crate::session::PacketSink;
use crate::utils::DeliveryError;

/// Represents the server side of one connected WebSocket client.
///
/// Frames are queued on `sender`; the connection's writer task drains the
/// channel onto the socket. Cloning shares the same channel.
#[derive(Debug, Clone)]
pub struct Client {
    /// Connection id used in transport logs.
    pub id: String,

    /// Channel to send WebSocket messages to the client.
    pub sender: UnboundedSender<WsMessage>,
}

impl Client {
    pub fn new(sender: UnboundedSender<WsMessage>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender,
        }
    }

    /// True once the writer task has gone away.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Queues a close frame; the writer stops after sending it.
    pub fn close(&self) {
        let _ = self.sender.send(WsMessage::Close(None));
    }
}

impl PacketSink for Client {
    fn send(&self, frame: Bytes) -> Result<(), DeliveryError> {
        self.sender
            .send(WsMessage::binary(frame))
            .map_err(|_| DeliveryError::Closed)
    }
}
