use bytes::Bytes;

use crate::utils::DeliveryError;

/// Outbound half of a connection, as seen by the session layer.
///
/// Implementations must not block: queue the frame and return. An error
/// means the frame was not accepted, typically because the connection is
/// already closing.
pub trait PacketSink: Send + Sync {
    fn send(&self, frame: Bytes) -> Result<(), DeliveryError>;
}
