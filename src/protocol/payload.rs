//! Typed payload variants.
//!
//! Each layout is a run of fixed-width fields, optionally closed by one
//! length-prefixed variable field. Integers are big endian; strings are
//! NUL-padded to their width. A payload must be consumed exactly: short input
//! and leftover bytes are both `MalformedPayload`.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::fixed::{FixedString, Id, ensure, get_text_u16, put_text_u16};
use super::message_type::MessageType;
use crate::utils::ProtocolError;

type Result<T> = std::result::Result<T, ProtocolError>;

trait Layout: Sized {
    fn write(&self, buf: &mut BytesMut) -> Result<()>;
    fn read(buf: &mut &[u8]) -> Result<Self>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterRequest {
    pub username: Id,
    pub password_hash: FixedString<64>,
    pub email: FixedString<128>,
}

impl Layout for RegisterRequest {
    fn write(&self, buf: &mut BytesMut) -> Result<()> {
        self.username.write_to(buf);
        self.password_hash.write_to(buf);
        self.email.write_to(buf);
        Ok(())
    }

    fn read(buf: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            username: FixedString::read_from(buf, "username")?,
            password_hash: FixedString::read_from(buf, "password_hash")?,
            email: FixedString::read_from(buf, "email")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRequest {
    pub username: Id,
    pub password_hash: FixedString<64>,
}

impl Layout for LoginRequest {
    fn write(&self, buf: &mut BytesMut) -> Result<()> {
        self.username.write_to(buf);
        self.password_hash.write_to(buf);
        Ok(())
    }

    fn read(buf: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            username: FixedString::read_from(buf, "username")?,
            password_hash: FixedString::read_from(buf, "password_hash")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginResponse {
    pub success: bool,
    pub token: FixedString<256>,
    pub user_id: Id,
    pub error_message: FixedString<256>,
}

impl Layout for LoginResponse {
    fn write(&self, buf: &mut BytesMut) -> Result<()> {
        buf.put_u8(u8::from(self.success));
        self.token.write_to(buf);
        self.user_id.write_to(buf);
        self.error_message.write_to(buf);
        Ok(())
    }

    fn read(buf: &mut &[u8]) -> Result<Self> {
        ensure(buf, 1)?;
        Ok(Self {
            success: buf.get_u8() != 0,
            token: FixedString::read_from(buf, "token")?,
            user_id: FixedString::read_from(buf, "user_id")?,
            error_message: FixedString::read_from(buf, "error_message")?,
        })
    }
}

/// Chat text, also used for replies, forwards and edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatText {
    pub room_id: Id,
    pub message_id: Id,
    pub reply_to_id: Id,
    pub text: String,
}

impl Layout for ChatText {
    fn write(&self, buf: &mut BytesMut) -> Result<()> {
        self.room_id.write_to(buf);
        self.message_id.write_to(buf);
        self.reply_to_id.write_to(buf);
        put_text_u16(buf, &self.text)
    }

    fn read(buf: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            room_id: FixedString::read_from(buf, "room_id")?,
            message_id: FixedString::read_from(buf, "message_id")?,
            reply_to_id: FixedString::read_from(buf, "reply_to_id")?,
            text: get_text_u16(buf, "text")?,
        })
    }
}

/// Reference to an existing message (delete, read/delivered receipts, pins).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef {
    pub room_id: Id,
    pub message_id: Id,
}

impl Layout for MessageRef {
    fn write(&self, buf: &mut BytesMut) -> Result<()> {
        self.room_id.write_to(buf);
        self.message_id.write_to(buf);
        Ok(())
    }

    fn read(buf: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            room_id: FixedString::read_from(buf, "room_id")?,
            message_id: FixedString::read_from(buf, "message_id")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatFile {
    pub room_id: Id,
    pub message_id: Id,
    pub file_id: Id,
    pub filename: FixedString<256>,
    pub file_size: u64,
    pub file_type: u8,
    pub caption: FixedString<512>,
}

impl Layout for ChatFile {
    fn write(&self, buf: &mut BytesMut) -> Result<()> {
        self.room_id.write_to(buf);
        self.message_id.write_to(buf);
        self.file_id.write_to(buf);
        self.filename.write_to(buf);
        buf.put_u64(self.file_size);
        buf.put_u8(self.file_type);
        self.caption.write_to(buf);
        Ok(())
    }

    fn read(buf: &mut &[u8]) -> Result<Self> {
        let room_id = FixedString::read_from(buf, "room_id")?;
        let message_id = FixedString::read_from(buf, "message_id")?;
        let file_id = FixedString::read_from(buf, "file_id")?;
        let filename = FixedString::read_from(buf, "filename")?;
        ensure(buf, 9)?;
        Ok(Self {
            room_id,
            message_id,
            file_id,
            filename,
            file_size: buf.get_u64(),
            file_type: buf.get_u8(),
            caption: FixedString::read_from(buf, "caption")?,
        })
    }
}

/// Room create/join/leave/info request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomRequest {
    pub room_id: Id,
    pub room_name: FixedString<128>,
}

impl Layout for RoomRequest {
    fn write(&self, buf: &mut BytesMut) -> Result<()> {
        self.room_id.write_to(buf);
        self.room_name.write_to(buf);
        Ok(())
    }

    fn read(buf: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            room_id: FixedString::read_from(buf, "room_id")?,
            room_name: FixedString::read_from(buf, "room_name")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    pub message_id: Id,
    pub emoji: FixedString<16>,
    /// `false` removes the reaction.
    pub add: bool,
}

impl Layout for Reaction {
    fn write(&self, buf: &mut BytesMut) -> Result<()> {
        self.message_id.write_to(buf);
        self.emoji.write_to(buf);
        buf.put_u8(u8::from(self.add));
        Ok(())
    }

    fn read(buf: &mut &[u8]) -> Result<Self> {
        let message_id = FixedString::read_from(buf, "message_id")?;
        let emoji = FixedString::read_from(buf, "emoji")?;
        ensure(buf, 1)?;
        Ok(Self {
            message_id,
            emoji,
            add: buf.get_u8() != 0,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInit {
    pub transfer_id: Id,
    pub filename: FixedString<256>,
    pub total_size: u64,
    pub total_chunks: u32,
    pub file_type: u8,
    pub recipient_id: Id,
}

impl Layout for FileInit {
    fn write(&self, buf: &mut BytesMut) -> Result<()> {
        self.transfer_id.write_to(buf);
        self.filename.write_to(buf);
        buf.put_u64(self.total_size);
        buf.put_u32(self.total_chunks);
        buf.put_u8(self.file_type);
        self.recipient_id.write_to(buf);
        Ok(())
    }

    fn read(buf: &mut &[u8]) -> Result<Self> {
        let transfer_id = FixedString::read_from(buf, "transfer_id")?;
        let filename = FixedString::read_from(buf, "filename")?;
        ensure(buf, 13)?;
        Ok(Self {
            transfer_id,
            filename,
            total_size: buf.get_u64(),
            total_chunks: buf.get_u32(),
            file_type: buf.get_u8(),
            recipient_id: FixedString::read_from(buf, "recipient_id")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChunk {
    pub transfer_id: Id,
    pub chunk_index: u32,
    pub data: Bytes,
}

impl Layout for FileChunk {
    fn write(&self, buf: &mut BytesMut) -> Result<()> {
        let len = u32::try_from(self.data.len()).map_err(|_| ProtocolError::FieldTooLong {
            len: self.data.len(),
            max: u32::MAX as usize,
        })?;
        self.transfer_id.write_to(buf);
        buf.put_u32(self.chunk_index);
        buf.put_u32(len);
        buf.put_slice(&self.data);
        Ok(())
    }

    fn read(buf: &mut &[u8]) -> Result<Self> {
        let transfer_id = FixedString::read_from(buf, "transfer_id")?;
        ensure(buf, 8)?;
        let chunk_index = buf.get_u32();
        let len = buf.get_u32() as usize;
        ensure(buf, len)?;
        let data = buf.copy_to_bytes(len);
        Ok(Self {
            transfer_id,
            chunk_index,
            data,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileComplete {
    pub transfer_id: Id,
    pub url: FixedString<512>,
}

impl Layout for FileComplete {
    fn write(&self, buf: &mut BytesMut) -> Result<()> {
        self.transfer_id.write_to(buf);
        self.url.write_to(buf);
        Ok(())
    }

    fn read(buf: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            transfer_id: FixedString::read_from(buf, "transfer_id")?,
            url: FixedString::read_from(buf, "url")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOffer {
    pub call_id: Id,
    pub callee_id: Id,
    pub sdp: String,
}

impl Layout for CallOffer {
    fn write(&self, buf: &mut BytesMut) -> Result<()> {
        self.call_id.write_to(buf);
        self.callee_id.write_to(buf);
        put_text_u16(buf, &self.sdp)
    }

    fn read(buf: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            call_id: FixedString::read_from(buf, "call_id")?,
            callee_id: FixedString::read_from(buf, "callee_id")?,
            sdp: get_text_u16(buf, "sdp")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallAnswer {
    pub call_id: Id,
    pub sdp: String,
}

impl Layout for CallAnswer {
    fn write(&self, buf: &mut BytesMut) -> Result<()> {
        self.call_id.write_to(buf);
        put_text_u16(buf, &self.sdp)
    }

    fn read(buf: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            call_id: FixedString::read_from(buf, "call_id")?,
            sdp: get_text_u16(buf, "sdp")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IceCandidate {
    pub call_id: Id,
    pub candidate: String,
}

impl Layout for IceCandidate {
    fn write(&self, buf: &mut BytesMut) -> Result<()> {
        self.call_id.write_to(buf);
        put_text_u16(buf, &self.candidate)
    }

    fn read(buf: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            call_id: FixedString::read_from(buf, "call_id")?,
            candidate: get_text_u16(buf, "candidate")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameInvite {
    pub game_id: Id,
    pub game_type: u8,
    pub opponent_id: Id,
}

impl Layout for GameInvite {
    fn write(&self, buf: &mut BytesMut) -> Result<()> {
        self.game_id.write_to(buf);
        buf.put_u8(self.game_type);
        self.opponent_id.write_to(buf);
        Ok(())
    }

    fn read(buf: &mut &[u8]) -> Result<Self> {
        let game_id = FixedString::read_from(buf, "game_id")?;
        ensure(buf, 1)?;
        Ok(Self {
            game_id,
            game_type: buf.get_u8(),
            opponent_id: FixedString::read_from(buf, "opponent_id")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameMove {
    pub game_id: Id,
    pub row: u8,
    pub col: u8,
    pub board_state: FixedString<256>,
}

impl Layout for GameMove {
    fn write(&self, buf: &mut BytesMut) -> Result<()> {
        self.game_id.write_to(buf);
        buf.put_u8(self.row);
        buf.put_u8(self.col);
        self.board_state.write_to(buf);
        Ok(())
    }

    fn read(buf: &mut &[u8]) -> Result<Self> {
        let game_id = FixedString::read_from(buf, "game_id")?;
        ensure(buf, 2)?;
        Ok(Self {
            game_id,
            row: buf.get_u8(),
            col: buf.get_u8(),
            board_state: FixedString::read_from(buf, "board_state")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSync {
    pub session_id: Id,
    pub video_url: FixedString<512>,
    pub current_time_millis: u64,
    pub is_playing: bool,
}

impl Layout for WatchSync {
    fn write(&self, buf: &mut BytesMut) -> Result<()> {
        self.session_id.write_to(buf);
        self.video_url.write_to(buf);
        buf.put_u64(self.current_time_millis);
        buf.put_u8(u8::from(self.is_playing));
        Ok(())
    }

    fn read(buf: &mut &[u8]) -> Result<Self> {
        let session_id = FixedString::read_from(buf, "session_id")?;
        let video_url = FixedString::read_from(buf, "video_url")?;
        ensure(buf, 9)?;
        Ok(Self {
            session_id,
            video_url,
            current_time_millis: buf.get_u64(),
            is_playing: buf.get_u8() != 0,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollCreate {
    pub poll_id: Id,
    pub room_id: Id,
    pub question: FixedString<512>,
    pub options: Vec<FixedString<256>>,
}

impl Layout for PollCreate {
    fn write(&self, buf: &mut BytesMut) -> Result<()> {
        let count = u8::try_from(self.options.len()).map_err(|_| ProtocolError::FieldTooLong {
            len: self.options.len(),
            max: u8::MAX as usize,
        })?;
        self.poll_id.write_to(buf);
        self.room_id.write_to(buf);
        self.question.write_to(buf);
        buf.put_u8(count);
        for option in &self.options {
            option.write_to(buf);
        }
        Ok(())
    }

    fn read(buf: &mut &[u8]) -> Result<Self> {
        let poll_id = FixedString::read_from(buf, "poll_id")?;
        let room_id = FixedString::read_from(buf, "room_id")?;
        let question = FixedString::read_from(buf, "question")?;
        ensure(buf, 1)?;
        let count = buf.get_u8() as usize;
        let options = (0..count)
            .map(|_| FixedString::read_from(buf, "option"))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            poll_id,
            room_id,
            question,
            options,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollVote {
    pub poll_id: Id,
    pub option_index: u8,
}

impl Layout for PollVote {
    fn write(&self, buf: &mut BytesMut) -> Result<()> {
        self.poll_id.write_to(buf);
        buf.put_u8(self.option_index);
        Ok(())
    }

    fn read(buf: &mut &[u8]) -> Result<Self> {
        let poll_id = FixedString::read_from(buf, "poll_id")?;
        ensure(buf, 1)?;
        Ok(Self {
            poll_id,
            option_index: buf.get_u8(),
        })
    }
}

/// AI conversation request or response text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiText {
    pub conversation_id: Id,
    pub text: String,
}

impl Layout for AiText {
    fn write(&self, buf: &mut BytesMut) -> Result<()> {
        self.conversation_id.write_to(buf);
        put_text_u16(buf, &self.text)
    }

    fn read(buf: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            conversation_id: FixedString::read_from(buf, "conversation_id")?,
            text: get_text_u16(buf, "text")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presence {
    pub user_id: Id,
    /// 0 offline, 1 online, 2 away, 3 do-not-disturb, 4 invisible.
    pub status: u8,
    pub status_message: FixedString<256>,
}

impl Layout for Presence {
    fn write(&self, buf: &mut BytesMut) -> Result<()> {
        self.user_id.write_to(buf);
        buf.put_u8(self.status);
        self.status_message.write_to(buf);
        Ok(())
    }

    fn read(buf: &mut &[u8]) -> Result<Self> {
        let user_id = FixedString::read_from(buf, "user_id")?;
        ensure(buf, 1)?;
        Ok(Self {
            user_id,
            status: buf.get_u8(),
            status_message: FixedString::read_from(buf, "status_message")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub code: u32,
    pub message: FixedString<512>,
}

impl ErrorReport {
    /// Builds a report, cutting `message` at a char boundary to fit the field.
    pub fn new(code: u32, message: &str) -> Self {
        let mut end = message.len().min(512);
        while !message.is_char_boundary(end) {
            end -= 1;
        }
        let cleaned = message[..end].replace('\0', " ");
        Self {
            code,
            message: FixedString::new(&cleaned).unwrap_or_default(),
        }
    }
}

impl Layout for ErrorReport {
    fn write(&self, buf: &mut BytesMut) -> Result<()> {
        buf.put_u32(self.code);
        self.message.write_to(buf);
        Ok(())
    }

    fn read(buf: &mut &[u8]) -> Result<Self> {
        ensure(buf, 4)?;
        Ok(Self {
            code: buf.get_u32(),
            message: FixedString::read_from(buf, "error_message")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub acked_message_id: u32,
    pub success: bool,
}

impl Layout for Ack {
    fn write(&self, buf: &mut BytesMut) -> Result<()> {
        buf.put_u32(self.acked_message_id);
        buf.put_u8(u8::from(self.success));
        Ok(())
    }

    fn read(buf: &mut &[u8]) -> Result<Self> {
        ensure(buf, 5)?;
        Ok(Self {
            acked_message_id: buf.get_u32(),
            success: buf.get_u8() != 0,
        })
    }
}

/// A payload interpreted according to its header's message type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedPayload {
    Register(RegisterRequest),
    Login(LoginRequest),
    LoginResponse(LoginResponse),
    ChatText(ChatText),
    EditMessage(ChatText),
    DeleteMessage(MessageRef),
    MessageRef(MessageRef),
    ChatFile(ChatFile),
    Room(RoomRequest),
    Reaction(Reaction),
    FileInit(FileInit),
    FileChunk(FileChunk),
    FileComplete(FileComplete),
    CallOffer(CallOffer),
    CallAnswer(CallAnswer),
    IceCandidate(IceCandidate),
    GameInvite(GameInvite),
    GameMove(GameMove),
    WatchSync(WatchSync),
    PollCreate(PollCreate),
    PollVote(PollVote),
    AiText(AiText),
    Presence(Presence),
    Error(ErrorReport),
    Ack(Ack),
    /// Control types that carry no payload (heartbeat, ping, subscribe...).
    Empty,
    /// A recognised type without a fixed layout; bytes are left to the caller.
    Opaque(Bytes),
}

impl TypedPayload {
    /// Parses `bytes` with the layout `kind` uses.
    pub fn parse(kind: MessageType, bytes: &[u8]) -> Result<Self> {
        use MessageType as M;

        let mut buf = bytes;
        match kind {
            M::RegisterRequest => read_all(kind, &mut buf).map(Self::Register),
            M::LoginRequest => read_all(kind, &mut buf).map(Self::Login),
            M::RegisterResponse | M::LoginResponse => read_all(kind, &mut buf).map(Self::LoginResponse),
            M::ChatText | M::ReplyMessage | M::ForwardMessage => read_all(kind, &mut buf).map(Self::ChatText),
            M::EditMessage => read_all(kind, &mut buf).map(Self::EditMessage),
            M::DeleteMessage => read_all(kind, &mut buf).map(Self::DeleteMessage),
            M::MessageRead | M::MessageDelivered | M::PinMessage | M::UnpinMessage => {
                read_all(kind, &mut buf).map(Self::MessageRef)
            }
            M::ChatImage | M::ChatVideo | M::ChatAudio | M::ChatFile => read_all(kind, &mut buf).map(Self::ChatFile),
            M::CreateRoom | M::JoinRoom | M::LeaveRoom | M::RoomInfoRequest => read_all(kind, &mut buf).map(Self::Room),
            M::AddReaction | M::RemoveReaction | M::ReactionUpdate => read_all(kind, &mut buf).map(Self::Reaction),
            M::FileInit => read_all(kind, &mut buf).map(Self::FileInit),
            M::FileChunk => read_all(kind, &mut buf).map(Self::FileChunk),
            M::FileComplete => read_all(kind, &mut buf).map(Self::FileComplete),
            M::CallOffer => read_all(kind, &mut buf).map(Self::CallOffer),
            M::CallAnswer => read_all(kind, &mut buf).map(Self::CallAnswer),
            M::CallIceCandidate => read_all(kind, &mut buf).map(Self::IceCandidate),
            M::GameInvite => read_all(kind, &mut buf).map(Self::GameInvite),
            M::GameMove | M::GameState => read_all(kind, &mut buf).map(Self::GameMove),
            M::WatchCreate
            | M::WatchJoin
            | M::WatchLeave
            | M::WatchPlay
            | M::WatchPause
            | M::WatchSeek
            | M::WatchSync
            | M::WatchEnd => read_all(kind, &mut buf).map(Self::WatchSync),
            M::PollCreate => read_all(kind, &mut buf).map(Self::PollCreate),
            M::PollVote => read_all(kind, &mut buf).map(Self::PollVote),
            M::AiRequest | M::AiResponse => read_all(kind, &mut buf).map(Self::AiText),
            M::PresenceUpdate | M::PresenceResponse => read_all(kind, &mut buf).map(Self::Presence),
            M::Error => read_all(kind, &mut buf).map(Self::Error),
            M::Ack | M::Nack | M::SubAck | M::UnsubAck | M::PublishAck => read_all(kind, &mut buf).map(Self::Ack),
            M::Heartbeat | M::Ping | M::Pong | M::Logout | M::Subscribe | M::Unsubscribe => {
                if bytes.is_empty() {
                    Ok(Self::Empty)
                } else {
                    Err(ProtocolError::MalformedPayload {
                        kind,
                        reason: "expected an empty payload",
                    })
                }
            }
            _ => Ok(Self::Opaque(Bytes::copy_from_slice(bytes))),
        }
    }

    /// Serializes the variant into its wire layout.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        match self {
            Self::Register(p) => p.write(&mut buf)?,
            Self::Login(p) => p.write(&mut buf)?,
            Self::LoginResponse(p) => p.write(&mut buf)?,
            Self::ChatText(p) | Self::EditMessage(p) => p.write(&mut buf)?,
            Self::DeleteMessage(p) | Self::MessageRef(p) => p.write(&mut buf)?,
            Self::ChatFile(p) => p.write(&mut buf)?,
            Self::Room(p) => p.write(&mut buf)?,
            Self::Reaction(p) => p.write(&mut buf)?,
            Self::FileInit(p) => p.write(&mut buf)?,
            Self::FileChunk(p) => p.write(&mut buf)?,
            Self::FileComplete(p) => p.write(&mut buf)?,
            Self::CallOffer(p) => p.write(&mut buf)?,
            Self::CallAnswer(p) => p.write(&mut buf)?,
            Self::IceCandidate(p) => p.write(&mut buf)?,
            Self::GameInvite(p) => p.write(&mut buf)?,
            Self::GameMove(p) => p.write(&mut buf)?,
            Self::WatchSync(p) => p.write(&mut buf)?,
            Self::PollCreate(p) => p.write(&mut buf)?,
            Self::PollVote(p) => p.write(&mut buf)?,
            Self::AiText(p) => p.write(&mut buf)?,
            Self::Presence(p) => p.write(&mut buf)?,
            Self::Error(p) => p.write(&mut buf)?,
            Self::Ack(p) => p.write(&mut buf)?,
            Self::Empty => {}
            Self::Opaque(bytes) => return Ok(bytes.clone()),
        }
        Ok(buf.freeze())
    }
}

fn read_all<T: Layout>(kind: MessageType, buf: &mut &[u8]) -> Result<T> {
    let value = T::read(buf).map_err(|err| match err {
        ProtocolError::Truncated { .. } => ProtocolError::MalformedPayload {
            kind,
            reason: "payload shorter than its layout",
        },
        other => other,
    })?;
    if buf.has_remaining() {
        return Err(ProtocolError::MalformedPayload {
            kind,
            reason: "bytes left over after the layout",
        });
    }
    Ok(value)
}
