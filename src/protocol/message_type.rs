//! Message type catalogue.
//!
//! The numeric values are the wire enumerants carried in
//! `PacketHeader::message_type`; groups are laid out in fixed ranges so new
//! types can be added inside a range without renumbering the others.

use crate::utils::ProtocolError;

macro_rules! message_types {
    ($($name:ident = $value:literal),+ $(,)?) => {
        /// Every message type the protocol defines.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u32)]
        pub enum MessageType {
            $($name = $value),+
        }

        impl MessageType {
            /// Wire value of this type.
            pub const fn as_u32(self) -> u32 {
                self as u32
            }
        }

        impl TryFrom<u32> for MessageType {
            type Error = ProtocolError;

            fn try_from(value: u32) -> Result<Self, ProtocolError> {
                match value {
                    $($value => Ok(Self::$name),)+
                    other => Err(ProtocolError::UnknownMessageType(other)),
                }
            }
        }
    };
}

message_types! {
    // authentication
    RegisterRequest = 1,
    RegisterResponse = 2,
    LoginRequest = 3,
    LoginResponse = 4,
    Logout = 5,
    Heartbeat = 6,
    SessionExpired = 7,
    TwoFactorChallenge = 8,
    TwoFactorResponse = 9,

    // pub/sub core
    Subscribe = 20,
    Unsubscribe = 21,
    Publish = 22,
    SubAck = 23,
    UnsubAck = 24,
    PublishAck = 25,

    // chat
    ChatText = 40,
    ChatImage = 41,
    ChatVideo = 42,
    ChatAudio = 43,
    ChatFile = 44,
    ChatSticker = 45,
    ChatLocation = 46,
    ChatContact = 47,
    EditMessage = 48,
    DeleteMessage = 49,
    ReplyMessage = 50,
    ForwardMessage = 51,
    TypingStart = 52,
    TypingStop = 53,
    MessageRead = 54,
    MessageDelivered = 55,

    // rooms
    CreateRoom = 70,
    JoinRoom = 71,
    LeaveRoom = 72,
    InviteUser = 73,
    KickUser = 74,
    RoomInfoRequest = 75,
    RoomInfoResponse = 76,
    UpdateRoomSettings = 77,
    PinMessage = 78,
    UnpinMessage = 79,

    // reactions
    AddReaction = 90,
    RemoveReaction = 91,
    ReactionUpdate = 92,

    // file transfer
    FileInit = 100,
    FileChunk = 101,
    FileComplete = 102,
    FileError = 103,
    FileRequest = 104,
    FileCancel = 105,
    FileProgress = 106,

    // call signaling
    CallInit = 120,
    CallOffer = 121,
    CallAnswer = 122,
    CallIceCandidate = 123,
    CallAccept = 124,
    CallReject = 125,
    CallHangup = 126,
    CallMuteAudio = 127,
    CallUnmuteAudio = 128,
    CallMuteVideo = 129,
    CallUnmuteVideo = 130,

    // games
    GameInvite = 140,
    GameAccept = 141,
    GameReject = 142,
    GameMove = 143,
    GameState = 144,
    GameEnd = 145,
    GameForfeit = 146,

    // watch together
    WatchCreate = 160,
    WatchJoin = 161,
    WatchLeave = 162,
    WatchPlay = 163,
    WatchPause = 164,
    WatchSeek = 165,
    WatchSync = 166,
    WatchEnd = 167,

    // polls
    PollCreate = 180,
    PollVote = 181,
    PollClose = 182,
    PollResult = 183,

    // workflows
    WorkflowCreate = 190,
    WorkflowUpdate = 191,
    WorkflowDelete = 192,
    WorkflowTrigger = 193,
    WorkflowExecute = 194,

    // ai
    AiRequest = 200,
    AiResponse = 201,
    AiTyping = 202,
    AiError = 203,

    // presence
    PresenceUpdate = 220,
    PresenceRequest = 221,
    PresenceResponse = 222,

    // user management
    UserProfileRequest = 230,
    UserProfileResponse = 231,
    UserProfileUpdate = 232,
    UserSearch = 233,
    UserBlock = 234,
    UserUnblock = 235,

    // system
    Error = 250,
    Ack = 251,
    Nack = 252,
    Ping = 253,
    Pong = 254,
}

impl MessageType {
    /// Types that carry conversation traffic scoped to the header topic and
    /// are relayed to that topic's subscribers as-is.
    pub fn is_topic_traffic(self) -> bool {
        matches!(
            self.as_u32(),
            22 | 40..=55 | 78..=79 | 90..=92 | 100..=106 | 120..=130 | 140..=146 | 160..=167
                | 180..=183 | 220
        )
    }
}
