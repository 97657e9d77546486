//! Minimal binary-protocol client, used by the `client` subcommand and the
//! end-to-end tests.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;
use tungstenite::protocol::Message as WsMessage;

use crate::broker::room_topic;
use crate::protocol::payload::{ChatText, LoginRequest, LoginResponse, RoomRequest};
use crate::protocol::{self, FixedString, Id, MessageType, Packet, PacketFlags, PacketHeader, TypedPayload};
use crate::utils::ClientError;

pub struct ChatClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    sender: String,
    next_message_id: u32,
}

impl ChatClient {
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let (stream, _response) = connect_async(url).await?;
        debug!(url, "connected");
        Ok(Self {
            stream,
            sender: String::new(),
            next_message_id: 1,
        })
    }

    /// Builds a header for the next outbound request.
    pub fn header(&mut self, kind: MessageType, topic: &str) -> Result<PacketHeader, ClientError> {
        let id = self.next_message_id;
        self.next_message_id = self.next_message_id.wrapping_add(1);
        Ok(PacketHeader::new(kind, &self.sender, topic)?.with_message_id(id))
    }

    pub async fn send(&mut self, packet: &Packet) -> Result<(), ClientError> {
        self.stream.send(WsMessage::binary(packet.encode()?)).await?;
        Ok(())
    }

    /// Sends raw bytes as one binary frame.
    pub async fn send_raw(&mut self, bytes: impl Into<bytes::Bytes>) -> Result<(), ClientError> {
        self.stream.send(WsMessage::binary(bytes)).await?;
        Ok(())
    }

    /// Next packet from the server, or `None` once the connection closed.
    pub async fn recv(&mut self) -> Result<Option<Packet>, ClientError> {
        while let Some(msg) = self.stream.next().await {
            match msg? {
                WsMessage::Binary(data) => return Ok(Some(protocol::decode(data)?)),
                WsMessage::Close(_) => return Ok(None),
                _ => continue,
            }
        }
        Ok(None)
    }

    /// Next packet, failing if the server closed the connection.
    pub async fn expect_packet(&mut self) -> Result<Packet, ClientError> {
        self.recv().await?.ok_or(ClientError::Closed)
    }

    /// Logs in and adopts the returned user id as the sender for later packets.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<LoginResponse, ClientError> {
        let request = TypedPayload::Login(LoginRequest {
            username: Id::new(username)?,
            password_hash: FixedString::new(password)?,
        });
        let header = self.header(MessageType::LoginRequest, "")?;
        self.send(&Packet::from_payload(header, &request)?).await?;

        let reply = self.expect_packet().await?;
        match reply.interpret()? {
            TypedPayload::LoginResponse(response) => {
                if response.success {
                    self.sender = response.user_id.to_string();
                }
                Ok(response)
            }
            other => Err(ClientError::Unexpected(format!("{other:?}"))),
        }
    }

    pub async fn join_room(&mut self, room_id: &str) -> Result<(), ClientError> {
        self.room_request(MessageType::JoinRoom, room_id).await
    }

    pub async fn leave_room(&mut self, room_id: &str) -> Result<(), ClientError> {
        self.room_request(MessageType::LeaveRoom, room_id).await
    }

    /// Sends chat text to `room:<room_id>`, asking for an acknowledgement.
    pub async fn send_text(&mut self, room_id: &str, text: &str) -> Result<u32, ClientError> {
        let body = TypedPayload::ChatText(ChatText {
            room_id: Id::new(room_id)?,
            message_id: Id::default(),
            reply_to_id: Id::default(),
            text: text.to_string(),
        });
        let header = self
            .header(MessageType::ChatText, &room_topic(room_id))?
            .with_flags(PacketFlags::REQUIRE_ACK);
        let message_id = header.message_id;
        self.send(&Packet::from_payload(header, &body)?).await?;
        Ok(message_id)
    }

    pub async fn close(mut self) -> Result<(), ClientError> {
        self.stream.close(None).await?;
        Ok(())
    }

    async fn room_request(&mut self, kind: MessageType, room_id: &str) -> Result<(), ClientError> {
        let body = TypedPayload::Room(RoomRequest {
            room_id: Id::new(room_id)?,
            room_name: FixedString::default(),
        });
        let header = self.header(kind, &room_topic(room_id))?;
        self.send(&Packet::from_payload(header, &body)?).await
    }
}
