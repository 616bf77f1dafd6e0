//! Chat transport
//!
//! The bot keeps no database: each chat's conversation state lives in a
//! message pinned in that chat, read and written through [`ChatTransport`].

pub mod mock;
pub mod traits;

pub use mock::MockTransport;
pub use traits::{
    ButtonOrigin, ChannelId, ChatKind, ChatTransport, EventKind, InboundEvent, MessageId,
    PersistedHandle, PinnedMessage, ReplyOption, TransportError, TransportResult, UserId,
};
